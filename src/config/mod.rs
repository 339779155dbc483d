mod basic;
mod providers;
mod quota;
mod themes;

pub use basic::BasicConfig;
pub use providers::{
    CatalogEntry, FallbackConfig, PluginModels, PluginSelection, ProviderDefaults,
    ProvidersConfig,
};
pub use quota::{QuotaConfig, TierSpec};
pub use themes::{ThemeEntry, ThemesConfig};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::YoddaError;

/// Application configuration managed by Figment.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    /// Core server configuration (see `basic` table in config.toml).
    #[serde(default)]
    pub basic: BasicConfig,

    /// Upstream LLM provider settings (see `providers` table in config.toml).
    #[serde(default)]
    pub providers: ProvidersConfig,

    /// Subscription tiers and their build allowances.
    #[serde(default)]
    pub quota: QuotaConfig,

    /// Theme list and prompt hints.
    #[serde(default)]
    pub themes: ThemesConfig,
}

const DEFAULT_CONFIG_FILE: &str = "config.toml";
const ENV_PREFIX: &str = "YODDA_";

impl Config {
    /// Builds a Figment that merges defaults, `config.toml` (if present) and
    /// `YODDA_`-prefixed environment variables (`__` separates nested keys,
    /// e.g. `YODDA_PROVIDERS__FALLBACK__API_KEY`).
    pub fn figment() -> Figment {
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));
        if PathBuf::from(DEFAULT_CONFIG_FILE).is_file() {
            figment = figment.merge(Toml::file(DEFAULT_CONFIG_FILE));
        }
        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Loads and validates configuration for the server binary.
    pub fn load() -> Result<Self, YoddaError> {
        let cfg: Self = Self::figment()
            .extract()
            .map_err(|e| YoddaError::Configuration(format!("failed to extract configuration: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Checks cross-field invariants the serde layer cannot express.
    pub fn validate(&self) -> Result<(), YoddaError> {
        if self.basic.jwt_secret.trim().is_empty() {
            return Err(YoddaError::Configuration(
                "basic.jwt_secret must be set and non-empty".to_string(),
            ));
        }
        for tier in [&self.quota.default_tier, &self.quota.admin_tier] {
            if !self.quota.tiers.contains_key(tier) {
                return Err(YoddaError::Configuration(format!(
                    "tier '{tier}' is referenced but not defined in quota.tiers"
                )));
            }
        }
        Ok(())
    }
}
