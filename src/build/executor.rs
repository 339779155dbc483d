use std::sync::Arc;
use tracing::{debug, info};
use url::Url;

use super::artifacts::{ArtifactPath, ArtifactStore, new_build_id};
use super::prompt::{Platform, compose_prompt};
use super::strip::strip_code_fences;
use crate::config::ThemesConfig;
use crate::error::YoddaError;
use crate::providers::{ProviderFamily, ResolvedCredential, UpstreamClient};

/// A stored build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredArtifact {
    pub path: ArtifactPath,
    pub url: Url,
}

/// Turns a request into a stored artifact: prompt, one upstream call,
/// extraction, fence stripping, one write.
#[derive(Clone)]
pub struct BuildExecutor {
    upstream: UpstreamClient,
    artifacts: Arc<dyn ArtifactStore>,
    themes: ThemesConfig,
    public_base_url: Url,
}

impl BuildExecutor {
    pub fn new(
        upstream: UpstreamClient,
        artifacts: Arc<dyn ArtifactStore>,
        themes: ThemesConfig,
        public_base_url: Url,
    ) -> Self {
        Self {
            upstream,
            artifacts,
            themes,
            public_base_url,
        }
    }

    pub fn prompt(&self, platform: Platform, query: &str, theme: &str) -> String {
        compose_prompt(platform, query, theme, self.themes.hint(theme))
    }

    /// Exactly one upstream request, no retries.
    pub async fn call_upstream(
        &self,
        cred: &ResolvedCredential,
        prompt: &str,
    ) -> Result<Vec<u8>, YoddaError> {
        self.upstream.call(cred, prompt).await
    }

    /// Generated code with fences removed; blank results are extraction failures.
    pub fn extract(&self, family: ProviderFamily, body: &[u8]) -> Result<String, YoddaError> {
        let raw = family.extract_text(body)?;
        let code = strip_code_fences(&raw);
        if code.is_empty() {
            return Err(YoddaError::Extraction(
                "generated content was empty after removing code fences".to_string(),
            ));
        }
        debug!(raw_len = raw.len(), code_len = code.len(), "Extracted generated code");
        Ok(code)
    }

    /// Writes `code` under a fresh build id.
    pub async fn store(&self, platform: Platform, code: &str) -> Result<StoredArtifact, YoddaError> {
        let path = ArtifactPath::new(new_build_id(), platform);
        let url = path.public_url(&self.public_base_url)?;
        self.artifacts.write(&path, code.as_bytes()).await?;
        info!(build_id = %path.build_id, %url, bytes = code.len(), "Build artifact stored");
        Ok(StoredArtifact { path, url })
    }
}
