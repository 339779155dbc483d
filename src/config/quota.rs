use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One subscription tier.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct TierSpec {
    /// Build allowance; any negative value (conventionally `-1`) means unlimited.
    pub builds: i64,

    /// Price in whole currency units.
    pub price: u32,

    #[serde(default)]
    pub description: String,

    /// Lifetime license rather than a recurring subscription.
    #[serde(default)]
    pub lifetime: bool,
}

impl TierSpec {
    fn new(builds: i64, price: u32, description: &str, lifetime: bool) -> Self {
        Self {
            builds,
            price,
            description: description.to_string(),
            lifetime,
        }
    }
}

/// Tier table plus the tiers assigned on registration and admin setup.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QuotaConfig {
    /// TOML: `[quota.tiers.<NAME>]`. Entries merge over the built-in table.
    #[serde(default = "default_tiers")]
    pub tiers: BTreeMap<String, TierSpec>,

    /// Tier given to self-registered users.
    /// TOML: `quota.default_tier`. Default: `FREE`.
    #[serde(default = "default_tier")]
    pub default_tier: String,

    /// Tier given to the admin created by `/admin/setup`.
    /// TOML: `quota.admin_tier`. Default: `ENTERPRISE`.
    #[serde(default = "admin_tier")]
    pub admin_tier: String,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            tiers: default_tiers(),
            default_tier: default_tier(),
            admin_tier: admin_tier(),
        }
    }
}

fn default_tiers() -> BTreeMap<String, TierSpec> {
    BTreeMap::from([
        ("FREE".to_string(), TierSpec::new(3, 0, "3 builds total", false)),
        (
            "BASIC".to_string(),
            TierSpec::new(20, 15, "20 builds/month (monthly)", false),
        ),
        ("PRO".to_string(), TierSpec::new(100, 50, "100 builds/month", false)),
        (
            "ENTERPRISE".to_string(),
            TierSpec::new(-1, 149, "Unlimited (1 year)", false),
        ),
        (
            "PREMIUM".to_string(),
            TierSpec::new(-1, 249, "Lifetime Unlimited", true),
        ),
    ])
}

fn default_tier() -> String {
    "FREE".to_string()
}

fn admin_tier() -> String {
    "ENTERPRISE".to_string()
}
