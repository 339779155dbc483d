//! The build pipeline: authenticate, resolve credential, admit against the
//! quota, generate, store, commit.
//!
//! Stages advance strictly in [`BuildStage`] order. Upstream and extraction
//! failures leave no artifact behind, and the quota is only committed once the
//! artifact is stored.

pub mod agents;

pub use agents::{Agent, AgentRoster, AgentStatus};

use axum::http::HeaderValue;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

use crate::build::{BuildExecutor, Platform};
use crate::error::YoddaError;
use crate::providers::CredentialResolver;
use crate::quota::{QuotaGate, Remaining};
use crate::store::UserStore;

const DEFAULT_THEME: &str = "dark-pro";
const SUCCESS_MESSAGE: &str = "Build complete! Your project is ready.";
/// Response header naming the last stage a failed build reached.
pub const BUILD_STAGE_HEADER: &str = "x-yodda-build-stage";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BuildStage {
    Received,
    Authenticated,
    CredentialResolved,
    QuotaAdmitted,
    UpstreamCalled,
    ContentExtracted,
    ArtifactStored,
    Responded,
}

impl BuildStage {
    pub fn as_str(self) -> &'static str {
        match self {
            BuildStage::Received => "RECEIVED",
            BuildStage::Authenticated => "AUTHENTICATED",
            BuildStage::CredentialResolved => "CREDENTIAL_RESOLVED",
            BuildStage::QuotaAdmitted => "QUOTA_ADMITTED",
            BuildStage::UpstreamCalled => "UPSTREAM_CALLED",
            BuildStage::ContentExtracted => "CONTENT_EXTRACTED",
            BuildStage::ArtifactStored => "ARTIFACT_STORED",
            BuildStage::Responded => "RESPONDED",
        }
    }
}

impl fmt::Display for BuildStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct StageLog {
    pub stage: BuildStage,
    pub agent: &'static str,
    pub action: String,
    pub timestamp: DateTime<Utc>,
}

fn default_theme() -> String {
    DEFAULT_THEME.to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrchestrateRequest {
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub platform: Platform,
    #[serde(default = "default_theme")]
    pub theme: String,
}

/// The authenticated identity a build runs for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub email: String,
    pub is_admin: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct BuildReport {
    pub status: &'static str,
    pub build_id: String,
    pub query: String,
    pub response: &'static str,
    pub generated_code: String,
    pub generated_url: String,
    pub agents_used: Vec<&'static str>,
    pub agent_logs: Vec<StageLog>,
    pub builds_remaining: Remaining,
}

/// A build that stopped early.
#[derive(Debug)]
pub struct BuildFailure {
    /// Last stage reached before the failure.
    pub stage: BuildStage,
    pub error: YoddaError,
}

impl fmt::Display for BuildFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "build failed after {}: {}", self.stage, self.error)
    }
}

impl std::error::Error for BuildFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

impl IntoResponse for BuildFailure {
    fn into_response(self) -> Response {
        let mut resp = self.error.into_response();
        resp.headers_mut()
            .insert(BUILD_STAGE_HEADER, HeaderValue::from_static(self.stage.as_str()));
        resp
    }
}

/// Accumulates stage logs and remembers how far a build got.
struct StageTracker<'a> {
    agents: &'a AgentRoster,
    reached: BuildStage,
    logs: Vec<StageLog>,
}

impl<'a> StageTracker<'a> {
    fn new(agents: &'a AgentRoster) -> Self {
        Self {
            agents,
            reached: BuildStage::Received,
            logs: Vec::new(),
        }
    }

    fn advance(&mut self, stage: BuildStage, entries: &[(Agent, String)]) {
        self.reached = stage;
        let timestamp = Utc::now();
        for (agent, action) in entries {
            self.agents.record(*agent);
            self.logs.push(StageLog {
                stage,
                agent: agent.name(),
                action: action.clone(),
                timestamp,
            });
        }
    }

    fn fail(&self, error: YoddaError) -> BuildFailure {
        BuildFailure {
            stage: self.reached,
            error,
        }
    }

    fn agents_used(&self) -> Vec<&'static str> {
        let mut used: Vec<&'static str> = Vec::with_capacity(self.logs.len());
        for log in &self.logs {
            if !used.contains(&log.agent) {
                used.push(log.agent);
            }
        }
        used
    }
}

#[derive(Clone)]
pub struct Orchestrator {
    store: Arc<dyn UserStore>,
    resolver: CredentialResolver,
    quota: QuotaGate,
    executor: BuildExecutor,
    agents: Arc<AgentRoster>,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn UserStore>,
        resolver: CredentialResolver,
        quota: QuotaGate,
        executor: BuildExecutor,
        agents: Arc<AgentRoster>,
    ) -> Self {
        Self {
            store,
            resolver,
            quota,
            executor,
            agents,
        }
    }

    pub fn agents(&self) -> &AgentRoster {
        &self.agents
    }

    pub async fn orchestrate(
        &self,
        caller: &Caller,
        request: OrchestrateRequest,
    ) -> Result<BuildReport, BuildFailure> {
        let mut tracker = StageTracker::new(&self.agents);
        let query = request.query.trim();
        if query.is_empty() {
            return Err(tracker.fail(YoddaError::InvalidRequest(
                "No query provided".to_string(),
            )));
        }

        let user = self
            .store
            .get_user(&caller.email)
            .await
            .and_then(|found| {
                found.ok_or_else(|| {
                    YoddaError::UserNotFound(format!("User '{}' not found", caller.email))
                })
            })
            .map_err(|e| tracker.fail(e))?;
        tracker.advance(
            BuildStage::Authenticated,
            &[(
                Agent::Orchestrator,
                format!("Accepted {} build request.", request.platform),
            )],
        );

        let cred = self.resolver.resolve(&user).map_err(|e| tracker.fail(e))?;
        info!(
            email = %caller.email,
            source = ?cred.source,
            provider = cred.provider.as_deref().unwrap_or("<custom>"),
            family = cred.family.as_str(),
            "[Build] credential resolved"
        );
        tracker.advance(
            BuildStage::CredentialResolved,
            &[(
                Agent::Architect,
                "Parsed request and selected high-level architecture.".to_string(),
            )],
        );

        let reservation = self
            .quota
            .reserve(&caller.email)
            .await
            .map_err(|e| tracker.fail(e))?;
        tracker.advance(
            BuildStage::QuotaAdmitted,
            &[(
                Agent::Planner,
                format!("Planned build flow for theme '{}'.", request.theme),
            )],
        );

        let prompt = self.executor.prompt(request.platform, query, &request.theme);
        let body = self
            .executor
            .call_upstream(&cred, &prompt)
            .await
            .map_err(|e| tracker.fail(e))?;
        tracker.advance(
            BuildStage::UpstreamCalled,
            &[(
                Agent::Coder,
                format!(
                    "Generated application code via {} endpoint.",
                    cred.provider.as_deref().unwrap_or("custom")
                ),
            )],
        );

        let code = self
            .executor
            .extract(cred.family, &body)
            .map_err(|e| tracker.fail(e))?;
        tracker.advance(
            BuildStage::ContentExtracted,
            &[
                (
                    Agent::Reviewer,
                    "Reviewed generated code for consistency.".to_string(),
                ),
                (Agent::Tester, "Virtually tested main flows.".to_string()),
            ],
        );

        let artifact = self
            .executor
            .store(request.platform, &code)
            .await
            .map_err(|e| tracker.fail(e))?;
        tracker.advance(
            BuildStage::ArtifactStored,
            &[
                (
                    Agent::Ops,
                    "Prepared build artifact for deployment.".to_string(),
                ),
                (
                    Agent::Security,
                    "Performed basic security sanity checks.".to_string(),
                ),
            ],
        );

        let remaining = reservation.commit().await.map_err(|e| {
            warn!(
                email = %caller.email,
                build_id = %artifact.path.build_id,
                error = %e,
                "[Build] artifact stored but quota commit failed"
            );
            tracker.fail(e)
        })?;
        tracker.advance(
            BuildStage::Responded,
            &[(Agent::Orchestrator, "Build complete.".to_string())],
        );

        info!(
            email = %caller.email,
            build_id = %artifact.path.build_id,
            url = %artifact.url,
            remaining = ?remaining,
            "[Build] complete"
        );

        Ok(BuildReport {
            status: "success",
            build_id: artifact.path.build_id,
            query: request.query.clone(),
            response: SUCCESS_MESSAGE,
            generated_code: code,
            generated_url: artifact.url.to_string(),
            agents_used: tracker.agents_used(),
            agent_logs: tracker.logs,
            builds_remaining: remaining,
        })
    }
}
