use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;
use yodda_schema::{
    ChatCompletionRequest, ChatCompletionResponse, GeminiGenerateContentRequest,
    GeminiResponseBody, GenerationConfig,
};

use crate::error::YoddaError;

const CHAT_COMPLETIONS_SUFFIX: &str = "/chat/completions";
const GENERATE_CONTENT_SUFFIX: &str = ":generateContent";

/// Pretty-prints an outgoing body at DEBUG; skipped entirely otherwise.
fn log_payload<T: Serialize>(family: ProviderFamily, body: &T) {
    if !tracing::enabled!(tracing::Level::DEBUG) {
        return;
    }
    match serde_json::to_string_pretty(body) {
        Ok(pretty) => debug!(family = family.as_str(), "Upstream payload:\n{pretty}"),
        Err(e) => debug!(family = family.as_str(), error = %e, "Upstream payload not serializable"),
    }
}

/// Sampling knobs forwarded to every provider.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationParams {
    pub temperature: f64,
    pub max_tokens: u32,
}

/// Request/response dialect spoken by an upstream provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderFamily {
    /// OpenAI-compatible `chat/completions` with bearer auth.
    ChatCompletions,
    /// Google `generateContent` with the key in the query string.
    GenerateContent,
}

impl ProviderFamily {
    /// Guesses the dialect of a bare endpoint URL.
    pub fn infer_from_endpoint(endpoint: &Url) -> Self {
        if endpoint.path().ends_with(GENERATE_CONTENT_SUFFIX) {
            ProviderFamily::GenerateContent
        } else {
            ProviderFamily::ChatCompletions
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ProviderFamily::ChatCompletions => "chat_completions",
            ProviderFamily::GenerateContent => "generate_content",
        }
    }

    /// URL the generation request is posted to.
    ///
    /// The key is only placed in the URL for `GenerateContent`; callers must
    /// not log the returned value for that family.
    pub fn request_url(self, endpoint: &Url, key: &str) -> Url {
        match self {
            ProviderFamily::ChatCompletions => {
                if endpoint.path().ends_with(CHAT_COMPLETIONS_SUFFIX) {
                    return endpoint.clone();
                }
                let mut url = endpoint.clone();
                let path = format!(
                    "{}{CHAT_COMPLETIONS_SUFFIX}",
                    endpoint.path().trim_end_matches('/')
                );
                url.set_path(&path);
                url
            }
            ProviderFamily::GenerateContent => {
                let mut url = endpoint.clone();
                url.query_pairs_mut().append_pair("key", key);
                url
            }
        }
    }

    /// Builds the POST request for one single-turn generation.
    pub fn build_request(
        self,
        http: &reqwest::Client,
        endpoint: &Url,
        key: &str,
        model: &str,
        prompt: &str,
        params: GenerationParams,
    ) -> reqwest::RequestBuilder {
        let url = self.request_url(endpoint, key);
        match self {
            ProviderFamily::ChatCompletions => {
                let body = ChatCompletionRequest::single_turn(
                    model,
                    prompt,
                    Some(params.temperature),
                    Some(params.max_tokens),
                );
                log_payload(self, &body);
                http.post(url).bearer_auth(key).json(&body)
            }
            ProviderFamily::GenerateContent => {
                let config = GenerationConfig {
                    temperature: Some(params.temperature),
                    max_output_tokens: Some(params.max_tokens),
                    ..GenerationConfig::default()
                };
                let body = GeminiGenerateContentRequest::from_prompt(prompt, Some(config));
                log_payload(self, &body);
                http.post(url).json(&body)
            }
        }
    }

    /// Pulls the generated text out of a success body.
    ///
    /// Non-JSON bodies, missing fields and blank text are all extraction
    /// failures.
    pub fn extract_text(self, body: &[u8]) -> Result<String, YoddaError> {
        let text = match self {
            ProviderFamily::ChatCompletions => {
                let parsed: ChatCompletionResponse = serde_json::from_slice(body)
                    .map_err(|e| YoddaError::Extraction(format!("invalid chat response: {e}")))?;
                parsed.first_text().map(str::to_string).ok_or_else(|| {
                    YoddaError::Extraction("missing choices[0].message.content".to_string())
                })?
            }
            ProviderFamily::GenerateContent => {
                let parsed: GeminiResponseBody = serde_json::from_slice(body).map_err(|e| {
                    YoddaError::Extraction(format!("invalid generateContent response: {e}"))
                })?;
                parsed.first_text().map(str::to_string).ok_or_else(|| {
                    YoddaError::Extraction(
                        "missing candidates[0].content.parts[0].text".to_string(),
                    )
                })?
            }
        };

        if text.trim().is_empty() {
            return Err(YoddaError::Extraction(
                "upstream returned empty content".to_string(),
            ));
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn infers_generate_content_from_path_suffix() {
        assert_eq!(
            ProviderFamily::infer_from_endpoint(&url(
                "https://generativelanguage.googleapis.com/v1beta/models/gemini-pro:generateContent"
            )),
            ProviderFamily::GenerateContent
        );
        assert_eq!(
            ProviderFamily::infer_from_endpoint(&url("https://api.example.com/v1")),
            ProviderFamily::ChatCompletions
        );
    }

    #[test]
    fn chat_url_appends_completions_path_once() {
        let family = ProviderFamily::ChatCompletions;
        assert_eq!(
            family
                .request_url(&url("https://api.example.com/v1/"), "k")
                .as_str(),
            "https://api.example.com/v1/chat/completions"
        );
        assert_eq!(
            family
                .request_url(&url("https://api.example.com/v1/chat/completions"), "k")
                .as_str(),
            "https://api.example.com/v1/chat/completions"
        );
    }

    #[test]
    fn generate_content_url_carries_key() {
        let out = ProviderFamily::GenerateContent.request_url(
            &url("https://g.example.com/v1beta/models/m:generateContent"),
            "AIza-test",
        );
        assert_eq!(out.query(), Some("key=AIza-test"));
    }

    #[test]
    fn extract_chat_text() {
        let body = json!({
            "choices": [{ "message": { "role": "assistant", "content": "<html></html>" } }]
        });
        let text = ProviderFamily::ChatCompletions
            .extract_text(&serde_json::to_vec(&body).unwrap())
            .unwrap();
        assert_eq!(text, "<html></html>");
    }

    #[test]
    fn extract_generate_content_text() {
        let body = json!({
            "candidates": [{ "content": { "parts": [{ "text": "<p>hi</p>" }] } }]
        });
        let text = ProviderFamily::GenerateContent
            .extract_text(&serde_json::to_vec(&body).unwrap())
            .unwrap();
        assert_eq!(text, "<p>hi</p>");
    }

    #[test]
    fn extraction_failures() {
        let family = ProviderFamily::ChatCompletions;
        let bodies: [&[u8]; 3] = [
            b"not json",
            br#"{"choices":[]}"#,
            br#"{"choices":[{"message":{"content":"   "}}]}"#,
        ];
        for body in bodies {
            assert!(matches!(
                family.extract_text(body),
                Err(YoddaError::Extraction(_))
            ));
        }
        assert!(matches!(
            ProviderFamily::GenerateContent.extract_text(br#"{"candidates":[{}]}"#),
            Err(YoddaError::Extraction(_))
        ));
    }
}
