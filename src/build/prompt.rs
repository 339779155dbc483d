use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::YoddaError;

/// Target platform of a generated build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    #[default]
    Web,
    Desktop,
    Android,
    Ios,
}

impl Platform {
    pub fn as_str(self) -> &'static str {
        match self {
            Platform::Web => "web",
            Platform::Desktop => "desktop",
            Platform::Android => "android",
            Platform::Ios => "ios",
        }
    }

    /// Artifact file extension: `html` for web, otherwise the platform name.
    pub fn extension(self) -> &'static str {
        match self {
            Platform::Web => "html",
            other => other.as_str(),
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = YoddaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "web" => Ok(Platform::Web),
            "desktop" => Ok(Platform::Desktop),
            "android" => Ok(Platform::Android),
            "ios" => Ok(Platform::Ios),
            other => Err(YoddaError::InvalidRequest(format!(
                "unknown platform '{other}' (expected web, desktop, android or ios)"
            ))),
        }
    }
}

/// Prompt sent upstream for one build.
pub fn compose_prompt(platform: Platform, query: &str, theme: &str, theme_hint: &str) -> String {
    format!(
        "You are a swarm of 8 expert agents (Architect, Planner, Coder, Reviewer, \
         Tester, Ops, Security, Orchestrator) collaborating on a {platform} build.\n\
         User request: {query}\n\
         Selected theme: {theme}.\n\
         Theme specification: {theme_hint}\n\
         Produce a complete, single-file implementation matching the theme and platform. \
         Return only the raw code (no markdown)."
    )
}
