use super::MessageBody;
use super::auth::{PluginView, plugin_views};
use crate::error::YoddaError;
use crate::server::guards::auth::RequireCaller;
use crate::server::router::YoddaState;
use crate::store::{Plugin, PluginKind};

use axum::{
    Json, Router,
    extract::{
        Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    routing::{delete, get, post},
};
use serde::{Deserialize, Serialize};
use tracing::info;
use url::Url;

#[derive(Debug, Deserialize)]
pub struct AddPluginRequest {
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub endpoint: Option<Url>,
    pub key: String,
    #[serde(alias = "type")]
    pub kind: PluginKind,
}

#[derive(Debug, Deserialize)]
pub struct DeleteQuery {
    pub index: usize,
}

#[derive(Debug, Serialize)]
pub struct PluginList {
    pub plugins: Vec<PluginView>,
}

async fn list_plugins(
    State(state): State<YoddaState>,
    RequireCaller(caller): RequireCaller,
) -> Result<Json<PluginList>, YoddaError> {
    let user = state
        .store
        .get_user(&caller.email)
        .await?
        .ok_or_else(|| YoddaError::UserNotFound("User not found".to_string()))?;
    Ok(Json(PluginList {
        plugins: plugin_views(&user.plugins),
    }))
}

async fn add_plugin(
    State(state): State<YoddaState>,
    RequireCaller(caller): RequireCaller,
    payload: Result<Json<AddPluginRequest>, JsonRejection>,
) -> Result<Json<MessageBody>, YoddaError> {
    let Json(req) = payload?;
    let plugin = Plugin {
        provider: req
            .provider
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty()),
        endpoint: req.endpoint,
        key: req.key.trim().to_string(),
        kind: req.kind,
    };
    state.resolver.validate_plugin(&plugin)?;
    let kind = plugin.kind;
    state.store.save_plugin(&caller.email, plugin).await?;

    info!(email = %caller.email, %kind, "Plugin saved");
    Ok(Json(MessageBody::new("Plugin added")))
}

async fn delete_plugin(
    State(state): State<YoddaState>,
    RequireCaller(caller): RequireCaller,
    query: Result<Query<DeleteQuery>, QueryRejection>,
) -> Result<Json<MessageBody>, YoddaError> {
    let Query(DeleteQuery { index }) =
        query.map_err(|e| YoddaError::InvalidRequest(e.body_text()))?;
    let removed = state.store.delete_plugin(&caller.email, index).await?;

    info!(email = %caller.email, index, kind = %removed.kind, "Plugin deleted");
    Ok(Json(MessageBody::new("Plugin deleted")))
}

pub fn router() -> Router<YoddaState> {
    Router::new()
        .route("/plugins", get(list_plugins))
        .route("/plugins/add", post(add_plugin))
        .route("/plugins/delete", delete(delete_plugin))
}
