use crate::server::router::YoddaState;
use axum::{Json, Router, routing::get};
use serde_json::{Value, json};

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") }))
}

pub fn router() -> Router<YoddaState> {
    Router::new().route("/health", get(health))
}
