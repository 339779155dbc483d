use crate::config::TierSpec;
use crate::error::YoddaError;
use crate::licensing::issue_license;
use crate::server::guards::auth::RequireCaller;
use crate::server::router::YoddaState;
use crate::store::License;

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
pub struct SubscribeRequest {
    pub tier: String,
    #[serde(default)]
    pub lifetime: bool,
}

#[derive(Debug, Deserialize)]
pub struct ProcessPaymentRequest {
    pub tier: String,
    #[serde(default)]
    pub card_number: String,
    #[serde(default)]
    pub expiry: String,
    #[serde(default)]
    pub cvv: String,
}

#[derive(Debug, Serialize)]
pub struct SubscribeResponse {
    pub message: String,
    pub tier: String,
    pub license_key: String,
    pub price: u32,
    pub lifetime: bool,
}

#[derive(Debug, Serialize)]
pub struct TierList {
    pub tiers: BTreeMap<String, TierSpec>,
}

#[derive(Debug, Serialize)]
pub struct LicenseHistory {
    pub licenses: Vec<License>,
}

async fn tiers(State(state): State<YoddaState>) -> Json<TierList> {
    Json(TierList {
        tiers: state
            .tiers()
            .iter()
            .map(|(name, spec)| (name.to_string(), spec.clone()))
            .collect(),
    })
}

/// Moves the caller to `tier` and issues a license. Usage is left as is.
async fn subscribe_caller(
    state: &YoddaState,
    email: &str,
    tier: &str,
    lifetime: bool,
) -> Result<SubscribeResponse, YoddaError> {
    let tier = tier.trim().to_uppercase();
    let spec = state
        .tiers()
        .get(&tier)
        .cloned()
        .ok_or_else(|| YoddaError::InvalidRequest("Invalid tier".to_string()))?;

    let lifetime = lifetime || spec.lifetime;
    // License first: a failed issue must not leave the caller on the new tier.
    let license = issue_license(state.store.as_ref(), email, &tier, lifetime).await?;
    state.store.set_tier(email, &tier).await.inspect_err(|e| {
        warn!(email, tier = %tier, license_key = %license.license_key, error = %e, "License issued but tier unchanged");
    })?;

    info!(email, tier = %tier, price = spec.price, lifetime, "Subscription changed");
    Ok(SubscribeResponse {
        message: format!("Subscribed to {tier}"),
        tier,
        license_key: license.license_key,
        price: spec.price,
        lifetime,
    })
}

async fn subscribe(
    State(state): State<YoddaState>,
    RequireCaller(caller): RequireCaller,
    payload: Result<Json<SubscribeRequest>, JsonRejection>,
) -> Result<Json<SubscribeResponse>, YoddaError> {
    let Json(req) = payload?;
    subscribe_caller(&state, &caller.email, &req.tier, req.lifetime)
        .await
        .map(Json)
}

async fn process_payment(
    State(state): State<YoddaState>,
    RequireCaller(caller): RequireCaller,
    payload: Result<Json<ProcessPaymentRequest>, JsonRejection>,
) -> Result<Json<SubscribeResponse>, YoddaError> {
    let Json(req) = payload?;
    if [&req.card_number, &req.expiry, &req.cvv]
        .iter()
        .any(|field| field.trim().is_empty())
    {
        return Err(YoddaError::InvalidRequest("Invalid card info".to_string()));
    }
    subscribe_caller(&state, &caller.email, &req.tier, false)
        .await
        .map(Json)
}

async fn history(
    State(state): State<YoddaState>,
    RequireCaller(caller): RequireCaller,
) -> Result<Json<LicenseHistory>, YoddaError> {
    let licenses = state.store.list_licenses(&caller.email).await?;
    Ok(Json(LicenseHistory { licenses }))
}

pub fn router() -> Router<YoddaState> {
    Router::new()
        .route("/payments/tiers", get(tiers))
        .route("/payments/subscribe", post(subscribe))
        .route("/payments/process", post(process_payment))
        .route("/payments/history", get(history))
}
