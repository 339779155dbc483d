use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// The cosmetic build agents. Each is a label plus a task counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Agent {
    Architect,
    Planner,
    Coder,
    Reviewer,
    Tester,
    Ops,
    Security,
    Orchestrator,
}

impl Agent {
    pub const ALL: [Agent; 8] = [
        Agent::Architect,
        Agent::Planner,
        Agent::Coder,
        Agent::Reviewer,
        Agent::Tester,
        Agent::Ops,
        Agent::Security,
        Agent::Orchestrator,
    ];

    pub fn id(self) -> &'static str {
        match self {
            Agent::Architect => "architect",
            Agent::Planner => "planner",
            Agent::Coder => "coder",
            Agent::Reviewer => "reviewer",
            Agent::Tester => "tester",
            Agent::Ops => "ops",
            Agent::Security => "security",
            Agent::Orchestrator => "orchestrator",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Agent::Architect => "Architect",
            Agent::Planner => "Planner",
            Agent::Coder => "Coder",
            Agent::Reviewer => "Reviewer",
            Agent::Tester => "Tester",
            Agent::Ops => "Ops & Deploy",
            Agent::Security => "Security",
            Agent::Orchestrator => "Swarm Orchestrator",
        }
    }

    fn slot(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct AgentStatus {
    pub id: &'static str,
    pub name: &'static str,
    pub state: &'static str,
    pub completed_tasks: u64,
}

/// Process-wide completed-task counters.
#[derive(Debug, Default)]
pub struct AgentRoster {
    completed: [AtomicU64; 8],
}

impl AgentRoster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, agent: Agent) {
        self.completed[agent.slot()].fetch_add(1, Ordering::Relaxed);
    }

    pub fn list(&self) -> Vec<AgentStatus> {
        Agent::ALL
            .iter()
            .map(|&agent| AgentStatus {
                id: agent.id(),
                name: agent.name(),
                state: "IDLE",
                completed_tasks: self.completed[agent.slot()].load(Ordering::Relaxed),
            })
            .collect()
    }
}
