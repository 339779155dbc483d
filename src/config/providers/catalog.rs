use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use url::Url;

use crate::providers::ProviderFamily;

/// One known upstream provider.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CatalogEntry {
    /// Request/response dialect spoken by this provider.
    pub family: ProviderFamily,

    /// Generation endpoint. Chat endpoints get `/chat/completions` appended when missing.
    pub endpoint: Url,

    /// Model requested from this provider.
    pub model: String,
}

impl CatalogEntry {
    fn new(family: ProviderFamily, endpoint: &str, model: &str) -> Self {
        Self {
            family,
            endpoint: Url::parse(endpoint).expect("invalid fixed provider endpoint"),
            model: model.to_string(),
        }
    }
}

pub(super) fn default_catalog() -> BTreeMap<String, CatalogEntry> {
    use ProviderFamily::{ChatCompletions, GenerateContent};

    BTreeMap::from([
        (
            "groq".to_string(),
            CatalogEntry::new(
                ChatCompletions,
                "https://api.groq.com/openai/v1/chat/completions",
                "llama3-8b-8192",
            ),
        ),
        (
            "nvidia".to_string(),
            CatalogEntry::new(
                ChatCompletions,
                "https://integrate.api.nvidia.com/v1/chat/completions",
                "meta/llama-3.1-8b-instruct",
            ),
        ),
        (
            "huggingface".to_string(),
            CatalogEntry::new(
                ChatCompletions,
                "https://router.huggingface.co/v1/chat/completions",
                "mistralai/Mistral-7B-Instruct-v0.2",
            ),
        ),
        (
            "google_gemini".to_string(),
            CatalogEntry::new(
                GenerateContent,
                "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-pro-latest:generateContent",
                "gemini-1.5-pro-latest",
            ),
        ),
        (
            "google_ai_studio".to_string(),
            CatalogEntry::new(
                GenerateContent,
                "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-flash-latest:generateContent",
                "gemini-1.5-flash-latest",
            ),
        ),
    ])
}
