use crate::auth::TokenIssuer;
use crate::build::{ArtifactStore, BUILDS_ROUTE, BuildExecutor};
use crate::config::{Config, QuotaConfig, ThemesConfig};
use crate::error::YoddaError;
use crate::orchestrator::{AgentRoster, BUILD_STAGE_HEADER, Orchestrator};
use crate::providers::{CredentialResolver, UpstreamClient, build_http_client};
use crate::quota::{QuotaGate, TierTable};
use crate::server::routes;
use crate::store::UserStore;

use axum::{
    Router,
    extract::Request,
    http::{HeaderName, HeaderValue, StatusCode, Version, header::USER_AGENT},
    middleware::{self, Next},
    response::Response,
};
use base64::Engine as _;
use rand::RngCore;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tracing::{error, info, warn};

const MAX_REQUEST_ID_LEN: usize = 128;
const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

fn generate_request_id() -> String {
    // 96 bits => 16 chars base64url (no padding).
    let mut bytes = [0u8; 12];
    rand::rng().fill_bytes(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

fn format_http_version(version: Version) -> &'static str {
    match version {
        Version::HTTP_09 => "HTTP/0.9",
        Version::HTTP_10 => "HTTP/1.0",
        Version::HTTP_11 => "HTTP/1.1",
        Version::HTTP_2 => "HTTP/2",
        Version::HTTP_3 => "HTTP/3",
        _ => "HTTP/?",
    }
}

/// Shared handler state. Cheap to clone.
#[derive(Clone)]
pub struct YoddaState {
    pub store: Arc<dyn UserStore>,
    pub tokens: TokenIssuer,
    pub resolver: CredentialResolver,
    pub upstream: UpstreamClient,
    pub quota: QuotaGate,
    pub orchestrator: Orchestrator,
    pub themes: Arc<ThemesConfig>,
    pub quota_cfg: Arc<QuotaConfig>,
    pub builds_dir: PathBuf,
}

impl YoddaState {
    pub fn new(
        cfg: &Config,
        store: Arc<dyn UserStore>,
        artifacts: Arc<dyn ArtifactStore>,
    ) -> Result<Self, YoddaError> {
        let http = build_http_client(&cfg.providers.defaults)?;
        let upstream = UpstreamClient::new(http, &cfg.providers.defaults);
        let resolver = CredentialResolver::new(&cfg.providers);
        let quota = QuotaGate::new(store.clone(), TierTable::new(&cfg.quota));
        let executor = BuildExecutor::new(
            upstream.clone(),
            artifacts,
            cfg.themes.clone(),
            cfg.basic.public_base_url.clone(),
        );
        let orchestrator = Orchestrator::new(
            store.clone(),
            resolver.clone(),
            quota.clone(),
            executor,
            Arc::new(AgentRoster::new()),
        );

        Ok(Self {
            store,
            tokens: TokenIssuer::new(&cfg.basic.jwt_secret, cfg.basic.token_ttl_minutes),
            resolver,
            upstream,
            quota,
            orchestrator,
            themes: Arc::new(cfg.themes.clone()),
            quota_cfg: Arc::new(cfg.quota.clone()),
            builds_dir: cfg.basic.builds_dir.clone(),
        })
    }

    pub fn tiers(&self) -> &TierTable {
        self.quota.tiers()
    }
}

async fn not_found_handler() -> StatusCode {
    StatusCode::NOT_FOUND
}

async fn access_log(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let uri = req.uri().clone();
    let version = req.version();

    let request_id = req
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty() && v.len() <= MAX_REQUEST_ID_LEN)
        .map(str::to_string)
        .unwrap_or_else(generate_request_id);

    let user_agent = req
        .headers()
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
        .to_string();

    let start = Instant::now();
    let mut resp = next.run(req).await;

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        resp.headers_mut().insert(X_REQUEST_ID, value);
    }

    let status = resp.status();
    let latency_ms = start.elapsed().as_millis() as u64;
    let path = uri.path();
    let protocol = format_http_version(version);
    // Only failed builds carry a stage.
    let stage = resp
        .headers()
        .get(BUILD_STAGE_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-");

    macro_rules! access_line {
        ($level:ident) => {
            $level!(
                "| {:>3} | {} | {:^7} | {:<8} | {} | {}ms | {} | {}",
                status.as_u16(),
                request_id,
                method.as_str(),
                protocol,
                path,
                latency_ms,
                stage,
                user_agent
            )
        };
    }

    if status.is_server_error() {
        access_line!(error);
    } else if status.is_client_error() {
        access_line!(warn);
    } else {
        access_line!(info);
    }

    resp
}

pub fn yodda_router(state: YoddaState) -> Router {
    let builds = ServeDir::new(&state.builds_dir);

    Router::new()
        .merge(routes::health::router())
        .merge(routes::auth::router())
        .merge(routes::admin::router())
        .merge(routes::plugins::router())
        .merge(routes::payments::router())
        .merge(routes::themes::router())
        .merge(routes::swarm::router())
        .nest_service(&format!("/{BUILDS_ROUTE}"), builds)
        .fallback(not_found_handler)
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(middleware::from_fn(access_log))
}
