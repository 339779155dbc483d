#![allow(dead_code)]

use axum::{
    Router,
    body::{Body, to_bytes},
    extract::{Request, State},
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    response::{IntoResponse, Response},
};
use serde_json::Value;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tower::ServiceExt;
use url::Url;
use yodda::auth::{TokenIssuer, hash_password};
use yodda::build::FsArtifactStore;
use yodda::config::{CatalogEntry, Config};
use yodda::providers::ProviderFamily;
use yodda::store::{MemoryStore, NewUser, UserStore};
use yodda::{YoddaState, yodda_router};

pub const JWT_SECRET: &str = "test-secret";
pub const PASSWORD: &str = "hunter22";

/// One request as seen by the fake provider.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub path: String,
    pub query: Option<String>,
    pub authorization: Option<String>,
    pub body: Value,
}

#[derive(Clone)]
struct UpstreamState {
    status: StatusCode,
    body: Arc<str>,
    delay: Duration,
    hits: Arc<Mutex<Vec<Recorded>>>,
}

/// A local stand-in for an LLM provider that replies with a canned body.
#[derive(Clone)]
pub struct FakeUpstream {
    pub addr: SocketAddr,
    hits: Arc<Mutex<Vec<Recorded>>>,
}

impl FakeUpstream {
    pub fn hits(&self) -> Vec<Recorded> {
        self.hits.lock().unwrap().clone()
    }

    pub fn base(&self) -> String {
        format!("http://{}", self.addr)
    }
}

async fn fake_provider(State(state): State<UpstreamState>, req: Request) -> Response {
    let path = req.uri().path().to_string();
    let query = req.uri().query().map(str::to_string);
    let authorization = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let bytes = to_bytes(req.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    state.hits.lock().unwrap().push(Recorded {
        path,
        query,
        authorization,
        body,
    });

    if !state.delay.is_zero() {
        tokio::time::sleep(state.delay).await;
    }
    (
        state.status,
        [("content-type", "application/json")],
        state.body.to_string(),
    )
        .into_response()
}

pub async fn spawn_upstream(status: StatusCode, body: Value) -> FakeUpstream {
    spawn_upstream_with_delay(status, body, Duration::ZERO).await
}

pub async fn spawn_upstream_with_delay(
    status: StatusCode,
    body: Value,
    delay: Duration,
) -> FakeUpstream {
    let hits = Arc::new(Mutex::new(Vec::new()));
    let state = UpstreamState {
        status,
        body: Arc::from(body.to_string()),
        delay,
        hits: hits.clone(),
    };
    let app = Router::new().fallback(fake_provider).with_state(state);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    FakeUpstream { addr, hits }
}

pub fn chat_reply(content: &str) -> Value {
    serde_json::json!({
        "id": "cmpl-1",
        "choices": [{ "index": 0, "message": { "role": "assistant", "content": content } }]
    })
}

pub fn gemini_reply(text: &str) -> Value {
    serde_json::json!({
        "candidates": [{ "content": { "role": "model", "parts": [{ "text": text }] } }]
    })
}

pub fn temp_dir(tag: &str) -> PathBuf {
    std::env::temp_dir().join(format!(
        "yodda-{tag}-{}-{}",
        std::process::id(),
        uuid::Uuid::new_v4().simple()
    ))
}

/// Config whose catalog points `fake_chat` and `fake_gemini` at `upstream`,
/// with `fake_chat` as the fallback provider.
pub fn test_config(upstream: &FakeUpstream, builds_dir: PathBuf) -> Config {
    let mut cfg = Config::default();
    cfg.basic.jwt_secret = JWT_SECRET.to_string();
    cfg.basic.builds_dir = builds_dir;
    cfg.basic.public_base_url = Url::parse("http://yodda.test/").unwrap();
    cfg.providers.defaults.request_timeout_secs = 5;
    cfg.providers.defaults.key_check_timeout_secs = 5;

    cfg.providers.catalog.insert(
        "fake_chat".to_string(),
        CatalogEntry {
            family: ProviderFamily::ChatCompletions,
            endpoint: Url::parse(&format!("{}/v1", upstream.base())).unwrap(),
            model: "fake-chat-model".to_string(),
        },
    );
    cfg.providers.catalog.insert(
        "fake_gemini".to_string(),
        CatalogEntry {
            family: ProviderFamily::GenerateContent,
            endpoint: Url::parse(&format!(
                "{}/v1beta/models/fake-gemini:generateContent",
                upstream.base()
            ))
            .unwrap(),
            model: "fake-gemini".to_string(),
        },
    );
    cfg.providers.fallback.provider = "fake_chat".to_string();
    cfg.providers.fallback.api_key = Some("fallback-key".to_string());
    cfg
}

pub struct Harness {
    pub app: Router,
    pub store: Arc<MemoryStore>,
    pub artifacts: FsArtifactStore,
    pub tokens: TokenIssuer,
    pub cfg: Config,
}

impl Harness {
    pub fn new(cfg: Config) -> Self {
        let store = Arc::new(MemoryStore::new());
        let artifacts = FsArtifactStore::new(cfg.basic.builds_dir.clone());
        let state = YoddaState::new(&cfg, store.clone(), Arc::new(artifacts.clone())).unwrap();
        Self {
            app: yodda_router(state),
            store,
            artifacts,
            tokens: TokenIssuer::new(JWT_SECRET, 60),
            cfg,
        }
    }

    pub async fn for_upstream(upstream: &FakeUpstream) -> Self {
        let builds = temp_dir("builds");
        tokio::fs::create_dir_all(&builds).await.unwrap();
        Self::new(test_config(upstream, builds))
    }

    /// Creates a user on `tier` with `used` builds already counted; returns a token.
    pub async fn user(&self, email: &str, tier: &str, used: u32) -> String {
        self.store
            .create_user(NewUser {
                email: email.to_string(),
                name: None,
                password_hash: hash_password(PASSWORD).unwrap(),
                is_admin: false,
                tier: tier.to_string(),
            })
            .await
            .unwrap();
        for n in 0..used {
            assert!(
                self.store
                    .compare_and_swap_builds(email, n, n + 1)
                    .await
                    .unwrap()
            );
        }
        self.tokens.issue(email, false).unwrap()
    }

    pub async fn builds_used(&self, email: &str) -> u32 {
        self.store
            .get_user(email)
            .await
            .unwrap()
            .unwrap()
            .builds_used
    }

    /// Number of build directories written so far.
    pub fn artifact_count(&self) -> usize {
        std::fs::read_dir(self.artifacts.root())
            .map(|entries| entries.count())
            .unwrap_or(0)
    }

    pub async fn send(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, HeaderMap, Value) {
        send(&self.app, method, uri, token, body).await
    }
}

pub async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, HeaderMap, Value) {
    let mut builder = axum::http::Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string())),
        None => builder.body(Body::empty()),
    }
    .expect("failed to build request");

    let resp = app.clone().oneshot(request).await.expect("request failed");
    let status = resp.status();
    let headers = resp.headers().clone();
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, headers, json)
}
