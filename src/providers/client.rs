use reqwest::header::{CONNECTION, HeaderMap, HeaderValue};
use std::time::{Duration, Instant};
use tracing::{info, warn};

use super::family::GenerationParams;
use super::resolver::ResolvedCredential;
use crate::config::ProviderDefaults;
use crate::error::{UPSTREAM_BODY_PREVIEW_CHARS, YoddaError};

const YODDA_USER_AGENT: &str = concat!("yodda/", env!("CARGO_PKG_VERSION"));
const KEY_CHECK_PROMPT: &str = "Reply with the single word: pong";
const KEY_CHECK_MAX_TOKENS: u32 = 8;

/// Shared reqwest client for every upstream provider.
pub fn build_http_client(defaults: &ProviderDefaults) -> Result<reqwest::Client, YoddaError> {
    let mut headers = HeaderMap::new();

    let mut builder = reqwest::Client::builder()
        .user_agent(YODDA_USER_AGENT)
        .redirect(reqwest::redirect::Policy::none())
        .connect_timeout(Duration::from_secs(10));

    if let Some(proxy_url) = defaults.proxy.as_ref() {
        let proxy = reqwest::Proxy::all(proxy_url.as_str())
            .map_err(|e| YoddaError::Configuration(format!("invalid upstream proxy url: {e}")))?;
        builder = builder.proxy(proxy);
    }

    if defaults.enable_multiplexing {
        builder = builder.http2_adaptive_window(true);
    } else {
        headers.insert(CONNECTION, HeaderValue::from_static("close"));

        builder = builder
            .http1_only()
            .pool_max_idle_per_host(0)
            .pool_idle_timeout(Duration::from_secs(0));
    }

    builder
        .default_headers(headers)
        .build()
        .map_err(|e| YoddaError::Configuration(format!("failed to build http client: {e}")))
}

fn preview(body: &str) -> String {
    body.chars().take(UPSTREAM_BODY_PREVIEW_CHARS).collect()
}

/// Issues single, unretried generation calls against resolved credentials.
#[derive(Clone)]
pub struct UpstreamClient {
    http: reqwest::Client,
    timeout: Duration,
    key_check_timeout: Duration,
    params: GenerationParams,
}

impl UpstreamClient {
    pub fn new(http: reqwest::Client, defaults: &ProviderDefaults) -> Self {
        Self {
            http,
            timeout: Duration::from_secs(defaults.request_timeout_secs),
            key_check_timeout: Duration::from_secs(defaults.key_check_timeout_secs),
            params: GenerationParams {
                temperature: defaults.temperature,
                max_tokens: defaults.max_tokens,
            },
        }
    }

    /// Sends `prompt` and returns the raw success body.
    pub async fn call(
        &self,
        cred: &ResolvedCredential,
        prompt: &str,
    ) -> Result<Vec<u8>, YoddaError> {
        self.send(cred, prompt, self.params, self.timeout).await
    }

    /// Cheap round trip that checks a key is accepted by its provider.
    pub async fn check_key(&self, cred: &ResolvedCredential) -> Result<(), YoddaError> {
        let params = GenerationParams {
            temperature: 0.0,
            max_tokens: KEY_CHECK_MAX_TOKENS,
        };
        let body = self
            .send(cred, KEY_CHECK_PROMPT, params, self.key_check_timeout)
            .await?;
        cred.family.extract_text(&body).map(|_| ())
    }

    async fn send(
        &self,
        cred: &ResolvedCredential,
        prompt: &str,
        params: GenerationParams,
        timeout: Duration,
    ) -> Result<Vec<u8>, YoddaError> {
        let start = Instant::now();
        let resp = cred
            .family
            .build_request(
                &self.http,
                &cred.endpoint,
                &cred.key,
                &cred.model,
                prompt,
                params,
            )
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| {
                // The generate-content URL carries the key.
                let e = e.without_url();
                warn!(
                    provider = cred.provider.as_deref().unwrap_or("<custom>"),
                    family = cred.family.as_str(),
                    timeout = e.is_timeout(),
                    "Upstream transport error: {e}"
                );
                YoddaError::UpstreamCall {
                    status: None,
                    body: e.to_string(),
                }
            })?;

        let status = resp.status();
        let bytes = resp.bytes().await.map_err(|e| YoddaError::UpstreamCall {
            status: Some(status.as_u16()),
            body: format!("failed to read upstream body: {}", e.without_url()),
        })?;

        info!(
            provider = cred.provider.as_deref().unwrap_or("<custom>"),
            family = cred.family.as_str(),
            model = %cred.model,
            status = status.as_u16(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Upstream call finished"
        );

        if !status.is_success() {
            return Err(YoddaError::UpstreamCall {
                status: Some(status.as_u16()),
                body: preview(&String::from_utf8_lossy(&bytes)),
            });
        }
        Ok(bytes.to_vec())
    }
}
