use super::MessageBody;
use super::auth::{normalize_email, require_password};
use crate::auth::hash_password;
use crate::error::YoddaError;
use crate::server::guards::auth::RequireAdmin;
use crate::server::router::YoddaState;
use crate::store::{NewUser, Plugin, PluginKind};

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    routing::post,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::info;
use url::Url;

#[derive(Debug, Deserialize)]
pub struct AdminSetupRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AdminSetupResponse {
    pub message: &'static str,
    pub token: String,
    pub user: Value,
}

#[derive(Debug, Deserialize)]
pub struct AdminPluginRequest {
    /// Defaults to the calling admin.
    #[serde(default)]
    pub user_email: Option<String>,
    pub provider: String,
    pub key: String,
    #[serde(alias = "type", default = "default_kind")]
    pub kind: PluginKind,
    #[serde(default)]
    pub endpoint: Option<Url>,
}

fn default_kind() -> PluginKind {
    PluginKind::Text
}

#[derive(Debug, Deserialize)]
pub struct ValidateKeyRequest {
    pub provider: String,
    pub key: String,
}

async fn setup(
    State(state): State<YoddaState>,
    payload: Result<Json<AdminSetupRequest>, JsonRejection>,
) -> Result<Json<AdminSetupResponse>, YoddaError> {
    let Json(req) = payload?;
    let email = normalize_email(&req.email)?;
    require_password(&req.password)?;

    if state.store.admin_exists().await? {
        return Err(YoddaError::Conflict("Admin already exists".to_string()));
    }

    // The early check skips hashing; the insert below is what decides a race.
    let user = state
        .store
        .create_admin_if_none(NewUser {
            email,
            name: req.name,
            password_hash: hash_password(&req.password)?,
            is_admin: true,
            tier: state.quota_cfg.admin_tier.clone(),
        })
        .await?;
    let token = state.tokens.issue(&user.email, true)?;

    info!(email = %user.email, tier = %user.tier, "Admin account created");
    Ok(Json(AdminSetupResponse {
        message: "Admin created successfully",
        token,
        user: json!({ "email": user.email, "is_admin": true }),
    }))
}

async fn manage_plugins(
    State(state): State<YoddaState>,
    RequireAdmin(admin): RequireAdmin,
    payload: Result<Json<AdminPluginRequest>, JsonRejection>,
) -> Result<Json<MessageBody>, YoddaError> {
    let Json(req) = payload?;
    let target = match req.user_email.as_deref() {
        Some(raw) => normalize_email(raw)?,
        None => admin.email.clone(),
    };

    let plugin = Plugin {
        provider: Some(req.provider.trim().to_string()),
        endpoint: req.endpoint,
        key: req.key.trim().to_string(),
        kind: req.kind,
    };
    state.resolver.validate_plugin(&plugin)?;
    state.store.save_plugin(&target, plugin).await?;

    info!(admin = %admin.email, target = %target, provider = %req.provider, kind = %req.kind, "Plugin saved by admin");
    Ok(Json(MessageBody::new(format!(
        "API key for '{}' saved.",
        req.provider.trim()
    ))))
}

async fn validate_key(
    State(state): State<YoddaState>,
    RequireAdmin(admin): RequireAdmin,
    payload: Result<Json<ValidateKeyRequest>, JsonRejection>,
) -> Result<Json<MessageBody>, YoddaError> {
    let Json(req) = payload?;
    let cred = state
        .resolver
        .for_provider(req.provider.trim(), req.key.trim())?;
    state.upstream.check_key(&cred).await?;

    info!(admin = %admin.email, provider = %req.provider, "Provider key validated");
    Ok(Json(MessageBody::new("API key is valid.")))
}

pub fn router() -> Router<YoddaState> {
    Router::new()
        .route("/admin/setup", post(setup))
        .route("/api/v1/admin/plugins", post(manage_plugins))
        .route("/api/v1/admin/validate_key", post(validate_key))
}
