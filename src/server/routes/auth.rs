use crate::auth::{hash_password, verify_password};
use crate::error::YoddaError;
use crate::licensing::issue_license;
use crate::quota::Remaining;
use crate::server::guards::auth::RequireCaller;
use crate::server::router::YoddaState;
use crate::store::{NewUser, PluginKind};

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use url::Url;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub message: &'static str,
    pub token: String,
    pub license_key: String,
    pub tier: String,
}

#[derive(Debug, Serialize)]
pub struct UserSummary {
    pub email: String,
    pub is_admin: bool,
    pub tier: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub message: &'static str,
    pub token: String,
    pub user: UserSummary,
}

/// Plugin as shown to its owner: key masked.
#[derive(Debug, Serialize)]
pub struct PluginView {
    pub index: usize,
    pub provider: Option<String>,
    pub endpoint: Option<Url>,
    pub kind: PluginKind,
    pub key: String,
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub email: String,
    pub name: Option<String>,
    pub tier: String,
    pub is_admin: bool,
    pub builds_used: u32,
    pub builds_remaining: Option<Remaining>,
    pub plugins: Vec<PluginView>,
}

/// Trimmed, lowercased email; rejects obviously malformed input.
pub(crate) fn normalize_email(raw: &str) -> Result<String, YoddaError> {
    let email = raw.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(email),
        _ => Err(YoddaError::InvalidRequest("A valid email is required".to_string())),
    }
}

pub(crate) fn require_password(password: &str) -> Result<(), YoddaError> {
    if password.is_empty() {
        return Err(YoddaError::InvalidRequest("Password is required".to_string()));
    }
    Ok(())
}

async fn register(
    State(state): State<YoddaState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<Json<RegisterResponse>, YoddaError> {
    let Json(req) = payload?;
    let email = normalize_email(&req.email)?;
    require_password(&req.password)?;

    let tier = state.quota_cfg.default_tier.clone();
    let user = state
        .store
        .create_user(NewUser {
            email: email.clone(),
            name: req.name.filter(|n| !n.trim().is_empty()),
            password_hash: hash_password(&req.password)?,
            is_admin: false,
            tier: tier.clone(),
        })
        .await?;
    // The license row references the user, so the user has to exist first.
    let license = issue_license(state.store.as_ref(), &user.email, &tier, false)
        .await
        .inspect_err(|e| {
            error!(email = %user.email, error = %e, "User created but license issuance failed");
        })?;
    let token = state.tokens.issue(&user.email, false)?;

    info!(email = %user.email, tier = %tier, "User registered");
    Ok(Json(RegisterResponse {
        message: "Registration successful",
        token,
        license_key: license.license_key,
        tier,
    }))
}

async fn login(
    State(state): State<YoddaState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, YoddaError> {
    let Json(req) = payload?;
    let invalid = || YoddaError::Authentication("Invalid credentials".to_string());

    let email = normalize_email(&req.email).map_err(|_| invalid())?;
    let user = state.store.get_user(&email).await?.ok_or_else(invalid)?;
    if !verify_password(&req.password, &user.password_hash) {
        return Err(invalid());
    }

    let token = state.tokens.issue(&user.email, user.is_admin)?;
    Ok(Json(LoginResponse {
        message: "Login successful",
        token,
        user: UserSummary {
            email: user.email,
            is_admin: user.is_admin,
            tier: user.tier,
        },
    }))
}

async fn me(
    State(state): State<YoddaState>,
    RequireCaller(caller): RequireCaller,
) -> Result<Json<ProfileResponse>, YoddaError> {
    let user = state
        .store
        .get_user(&caller.email)
        .await?
        .ok_or_else(|| YoddaError::UserNotFound("User not found".to_string()))?;

    // An unknown tier only fails builds; the profile still renders.
    let builds_remaining = state.tiers().remaining(&user.tier, user.builds_used).ok();
    let plugins = plugin_views(&user.plugins);

    Ok(Json(ProfileResponse {
        email: user.email,
        name: user.name,
        tier: user.tier,
        is_admin: user.is_admin,
        builds_used: user.builds_used,
        builds_remaining,
        plugins,
    }))
}

pub(crate) fn plugin_views(plugins: &[crate::store::Plugin]) -> Vec<PluginView> {
    plugins
        .iter()
        .enumerate()
        .map(|(index, p)| PluginView {
            index,
            provider: p.provider.clone(),
            endpoint: p.endpoint.clone(),
            kind: p.kind,
            key: p.masked_key(),
        })
        .collect()
}

pub fn router() -> Router<YoddaState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/me", get(me))
}
