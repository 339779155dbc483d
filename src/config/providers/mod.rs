mod catalog;

pub use catalog::CatalogEntry;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use url::Url;

/// Global upstream defaults shared by every provider.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProviderDefaults {
    /// Optional upstream HTTP proxy. If set, used for the reqwest client.
    /// TOML: `providers.defaults.proxy`. Example: `http://127.0.0.1:1080`.
    #[serde(default)]
    pub proxy: Option<Url>,

    /// Allow HTTP/2 multiplexing for the reqwest client; disabled forces HTTP/1.
    /// TOML: `providers.defaults.enable_multiplexing`. Default: `false`.
    #[serde(default = "default_enable_multiplexing")]
    pub enable_multiplexing: bool,

    /// Upper bound for one generation call, in seconds.
    /// TOML: `providers.defaults.request_timeout_secs`. Default: `45`.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Upper bound for a key validation call, in seconds.
    /// TOML: `providers.defaults.key_check_timeout_secs`. Default: `10`.
    #[serde(default = "default_key_check_timeout_secs")]
    pub key_check_timeout_secs: u64,

    /// Sampling temperature sent upstream.
    /// TOML: `providers.defaults.temperature`. Default: `0.7`.
    #[serde(default = "default_temperature")]
    pub temperature: f64,

    /// Output token cap sent upstream.
    /// TOML: `providers.defaults.max_tokens`. Default: `1024`.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl Default for ProviderDefaults {
    fn default() -> Self {
        Self {
            proxy: None,
            enable_multiplexing: default_enable_multiplexing(),
            request_timeout_secs: default_request_timeout_secs(),
            key_check_timeout_secs: default_key_check_timeout_secs(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

/// Built-in credential used when a user has no usable plugin.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FallbackConfig {
    /// Catalog id of the fallback provider.
    /// TOML: `providers.fallback.provider`. Default: `nvidia`.
    #[serde(default = "default_fallback_provider")]
    pub provider: String,

    /// Secret key for the fallback provider. Unset or empty disables the fallback.
    /// TOML: `providers.fallback.api_key`.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Overrides the catalog model for the fallback provider.
    /// TOML: `providers.fallback.model`.
    #[serde(default)]
    pub model: Option<String>,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            provider: default_fallback_provider(),
            api_key: None,
            model: None,
        }
    }
}

/// Which saved plugin wins when a user has several.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PluginSelection {
    /// First `text` plugin, otherwise the first plugin in list order.
    #[default]
    TextThenFirst,
    /// First `text` plugin, otherwise the fallback credential.
    TextOnly,
    /// First plugin in list order regardless of kind.
    First,
}

/// Models used for endpoint-only plugins, per plugin kind.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PluginModels {
    #[serde(default = "default_text_model")]
    pub text: String,

    #[serde(default = "default_vision_model")]
    pub vision: String,
}

impl Default for PluginModels {
    fn default() -> Self {
        Self {
            text: default_text_model(),
            vision: default_vision_model(),
        }
    }
}

/// All provider configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub defaults: ProviderDefaults,

    /// Known providers keyed by id (`nvidia`, `google_gemini`, ...).
    /// TOML: `[providers.catalog.<id>]`. Entries merge over the built-in table.
    #[serde(default = "catalog::default_catalog")]
    pub catalog: BTreeMap<String, CatalogEntry>,

    #[serde(default)]
    pub fallback: FallbackConfig,

    /// TOML: `providers.plugin_selection`. Default: `text_then_first`.
    #[serde(default)]
    pub plugin_selection: PluginSelection,

    #[serde(default)]
    pub plugin_models: PluginModels,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            defaults: ProviderDefaults::default(),
            catalog: catalog::default_catalog(),
            fallback: FallbackConfig::default(),
            plugin_selection: PluginSelection::default(),
            plugin_models: PluginModels::default(),
        }
    }
}

fn default_enable_multiplexing() -> bool {
    false
}

fn default_request_timeout_secs() -> u64 {
    45
}

fn default_key_check_timeout_secs() -> u64 {
    10
}

fn default_temperature() -> f64 {
    0.7
}

fn default_max_tokens() -> u32 {
    1024
}

fn default_fallback_provider() -> String {
    "nvidia".to_string()
}

fn default_text_model() -> String {
    "gpt-3.5-turbo".to_string()
}

fn default_vision_model() -> String {
    "gpt-4-vision-preview".to_string()
}
