use crate::error::YoddaError;
use crate::orchestrator::{AgentStatus, BuildFailure, BuildReport, BuildStage, OrchestrateRequest};
use crate::server::guards::auth::RequireCaller;
use crate::server::router::YoddaState;

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    routing::{get, post},
};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct AgentList {
    pub agents: Vec<AgentStatus>,
}

async fn list_agents(State(state): State<YoddaState>) -> Json<AgentList> {
    Json(AgentList {
        agents: state.orchestrator.agents().list(),
    })
}

async fn orchestrate(
    State(state): State<YoddaState>,
    RequireCaller(caller): RequireCaller,
    payload: Result<Json<OrchestrateRequest>, JsonRejection>,
) -> Result<Json<BuildReport>, BuildFailure> {
    let Json(request) = payload.map_err(|rejection| BuildFailure {
        stage: BuildStage::Received,
        error: YoddaError::from(rejection),
    })?;
    state
        .orchestrator
        .orchestrate(&caller, request)
        .await
        .map(Json)
}

pub fn router() -> Router<YoddaState> {
    Router::new()
        .route("/api/v1/swarm/agents", get(list_agents))
        .route("/api/v1/swarm/orchestrate", post(orchestrate))
}
