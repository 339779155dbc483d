use std::collections::BTreeMap;
use std::fmt;
use url::Url;

use super::ProviderFamily;
use crate::config::{CatalogEntry, FallbackConfig, PluginModels, PluginSelection, ProvidersConfig};
use crate::error::YoddaError;
use crate::store::{Plugin, PluginKind, User, mask_secret};

/// Where a resolved credential came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    /// The user's plugin at this list index.
    Plugin { index: usize },
    /// The service-wide fallback credential.
    Fallback,
}

/// Everything needed to issue one upstream generation request.
#[derive(Clone, PartialEq)]
pub struct ResolvedCredential {
    pub source: CredentialSource,
    /// Catalog id, when the credential maps to a known provider.
    pub provider: Option<String>,
    pub family: ProviderFamily,
    pub endpoint: Url,
    pub key: String,
    pub model: String,
}

impl fmt::Debug for ResolvedCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedCredential")
            .field("source", &self.source)
            .field("provider", &self.provider)
            .field("family", &self.family)
            .field("endpoint", &self.endpoint.as_str())
            .field("key", &mask_secret(&self.key))
            .field("model", &self.model)
            .finish()
    }
}

/// Picks the upstream credential for a user. Never mutates anything.
#[derive(Debug, Clone)]
pub struct CredentialResolver {
    catalog: BTreeMap<String, CatalogEntry>,
    fallback: FallbackConfig,
    selection: PluginSelection,
    plugin_models: PluginModels,
}

impl CredentialResolver {
    pub fn new(cfg: &ProvidersConfig) -> Self {
        Self {
            catalog: cfg.catalog.clone(),
            fallback: cfg.fallback.clone(),
            selection: cfg.plugin_selection,
            plugin_models: cfg.plugin_models.clone(),
        }
    }

    pub fn resolve(&self, user: &User) -> Result<ResolvedCredential, YoddaError> {
        if let Some((index, plugin)) = self.select_plugin(&user.plugins) {
            return self.from_plugin(index, plugin);
        }
        self.fallback().ok_or_else(|| {
            YoddaError::Configuration(
                "No upstream credential available: user has no usable plugin and no fallback key is configured"
                    .to_string(),
            )
        })
    }

    /// Applies the configured tie-break to the user's plugin list.
    pub fn select_plugin<'a>(&self, plugins: &'a [Plugin]) -> Option<(usize, &'a Plugin)> {
        let first_text = || {
            plugins
                .iter()
                .enumerate()
                .find(|(_, p)| p.kind == PluginKind::Text)
        };
        match self.selection {
            PluginSelection::TextThenFirst => first_text().or_else(|| plugins.iter().enumerate().next()),
            PluginSelection::TextOnly => first_text(),
            PluginSelection::First => plugins.iter().enumerate().next(),
        }
    }

    /// Checks that a plugin could be turned into a credential.
    pub fn validate_plugin(&self, plugin: &Plugin) -> Result<(), YoddaError> {
        self.from_plugin(0, plugin).map(|_| ()).map_err(|e| match e {
            YoddaError::Configuration(reason) => YoddaError::InvalidRequest(reason),
            other => other,
        })
    }

    /// Credential for a catalog provider with an explicit key, used by key validation.
    pub fn for_provider(&self, provider: &str, key: &str) -> Result<ResolvedCredential, YoddaError> {
        let entry = self.catalog.get(provider).ok_or_else(|| {
            YoddaError::InvalidRequest(format!("Unknown provider '{provider}'"))
        })?;
        if key.trim().is_empty() {
            return Err(YoddaError::InvalidRequest("API key must not be empty".to_string()));
        }
        Ok(ResolvedCredential {
            source: CredentialSource::Fallback,
            provider: Some(provider.to_string()),
            family: entry.family,
            endpoint: entry.endpoint.clone(),
            key: key.to_string(),
            model: entry.model.clone(),
        })
    }

    pub fn providers(&self) -> impl Iterator<Item = (&str, &CatalogEntry)> {
        self.catalog.iter().map(|(id, entry)| (id.as_str(), entry))
    }

    fn from_plugin(&self, index: usize, plugin: &Plugin) -> Result<ResolvedCredential, YoddaError> {
        if plugin.key.trim().is_empty() {
            return Err(YoddaError::Configuration(format!(
                "Plugin #{index} has an empty key"
            )));
        }
        let source = CredentialSource::Plugin { index };
        let catalog_entry = plugin
            .provider
            .as_deref()
            .and_then(|id| self.catalog.get(id).map(|entry| (id, entry)));

        match (catalog_entry, &plugin.endpoint) {
            (Some((id, entry)), endpoint) => Ok(ResolvedCredential {
                source,
                provider: Some(id.to_string()),
                family: entry.family,
                endpoint: endpoint.clone().unwrap_or_else(|| entry.endpoint.clone()),
                key: plugin.key.clone(),
                model: entry.model.clone(),
            }),
            (None, Some(endpoint)) => Ok(ResolvedCredential {
                source,
                provider: plugin.provider.clone(),
                family: ProviderFamily::infer_from_endpoint(endpoint),
                endpoint: endpoint.clone(),
                key: plugin.key.clone(),
                model: match plugin.kind {
                    PluginKind::Text => self.plugin_models.text.clone(),
                    PluginKind::Vision => self.plugin_models.vision.clone(),
                },
            }),
            (None, None) => Err(YoddaError::Configuration(match &plugin.provider {
                Some(id) => format!("Plugin #{index} names unknown provider '{id}' and has no endpoint"),
                None => format!("Plugin #{index} has neither a provider nor an endpoint"),
            })),
        }
    }

    fn fallback(&self) -> Option<ResolvedCredential> {
        let key = self.fallback.api_key.as_deref()?.trim();
        if key.is_empty() {
            return None;
        }
        let entry = self.catalog.get(&self.fallback.provider)?;
        Some(ResolvedCredential {
            source: CredentialSource::Fallback,
            provider: Some(self.fallback.provider.clone()),
            family: entry.family,
            endpoint: entry.endpoint.clone(),
            key: key.to_string(),
            model: self
                .fallback
                .model
                .clone()
                .unwrap_or_else(|| entry.model.clone()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn user_with(plugins: Vec<Plugin>) -> User {
        User {
            email: "u@x.io".to_string(),
            name: None,
            password_hash: String::new(),
            is_admin: false,
            tier: "FREE".to_string(),
            builds_used: 0,
            plugins,
            created_at: Utc::now(),
        }
    }

    fn plugin(provider: Option<&str>, endpoint: Option<&str>, kind: PluginKind) -> Plugin {
        Plugin {
            provider: provider.map(str::to_string),
            endpoint: endpoint.map(|e| Url::parse(e).unwrap()),
            key: "plugin-key".to_string(),
            kind,
        }
    }

    fn config_with_fallback(key: Option<&str>) -> ProvidersConfig {
        let mut cfg = ProvidersConfig::default();
        cfg.fallback.api_key = key.map(str::to_string);
        cfg
    }

    #[test]
    fn prefers_first_text_plugin() {
        let resolver = CredentialResolver::new(&config_with_fallback(Some("fb")));
        let user = user_with(vec![
            plugin(Some("groq"), None, PluginKind::Vision),
            plugin(Some("google_gemini"), None, PluginKind::Text),
        ]);

        let cred = resolver.resolve(&user).unwrap();
        assert_eq!(cred.source, CredentialSource::Plugin { index: 1 });
        assert_eq!(cred.family, ProviderFamily::GenerateContent);
        assert_eq!(cred.model, "gemini-1.5-pro-latest");
    }

    #[test]
    fn selection_policy_controls_vision_only_users() {
        let user = user_with(vec![plugin(Some("groq"), None, PluginKind::Vision)]);

        let resolver = CredentialResolver::new(&config_with_fallback(Some("fb")));
        assert_eq!(
            resolver.resolve(&user).unwrap().source,
            CredentialSource::Plugin { index: 0 }
        );

        let mut cfg = config_with_fallback(Some("fb"));
        cfg.plugin_selection = PluginSelection::TextOnly;
        let resolver = CredentialResolver::new(&cfg);
        assert_eq!(resolver.resolve(&user).unwrap().source, CredentialSource::Fallback);
    }

    #[test]
    fn falls_back_to_default_credential() {
        let resolver = CredentialResolver::new(&config_with_fallback(Some("nvapi-fb")));
        let cred = resolver.resolve(&user_with(vec![])).unwrap();

        assert_eq!(cred.source, CredentialSource::Fallback);
        assert_eq!(cred.provider.as_deref(), Some("nvidia"));
        assert_eq!(cred.key, "nvapi-fb");
        assert_eq!(cred.family, ProviderFamily::ChatCompletions);
    }

    #[test]
    fn no_plugin_and_no_fallback_is_configuration_error() {
        for key in [None, Some(""), Some("  ")] {
            let resolver = CredentialResolver::new(&config_with_fallback(key));
            assert!(matches!(
                resolver.resolve(&user_with(vec![])),
                Err(YoddaError::Configuration(_))
            ));
        }
    }

    #[test]
    fn endpoint_only_plugin_infers_family_and_kind_model() {
        let resolver = CredentialResolver::new(&config_with_fallback(None));
        let user = user_with(vec![plugin(
            None,
            Some("https://llm.example.com/v1"),
            PluginKind::Text,
        )]);

        let cred = resolver.resolve(&user).unwrap();
        assert_eq!(cred.family, ProviderFamily::ChatCompletions);
        assert_eq!(cred.model, "gpt-3.5-turbo");
        assert_eq!(cred.endpoint.as_str(), "https://llm.example.com/v1");
    }

    #[test]
    fn plugin_endpoint_overrides_catalog_endpoint() {
        let resolver = CredentialResolver::new(&config_with_fallback(None));
        let user = user_with(vec![plugin(
            Some("nvidia"),
            Some("http://127.0.0.1:9/v1/chat/completions"),
            PluginKind::Text,
        )]);

        let cred = resolver.resolve(&user).unwrap();
        assert_eq!(cred.endpoint.as_str(), "http://127.0.0.1:9/v1/chat/completions");
        assert_eq!(cred.model, "meta/llama-3.1-8b-instruct");
    }

    #[test]
    fn unknown_provider_without_endpoint_is_rejected() {
        let resolver = CredentialResolver::new(&config_with_fallback(Some("fb")));
        let user = user_with(vec![plugin(Some("acme"), None, PluginKind::Text)]);

        assert!(matches!(
            resolver.resolve(&user),
            Err(YoddaError::Configuration(_))
        ));
        assert!(matches!(
            resolver.validate_plugin(&user.plugins[0]),
            Err(YoddaError::InvalidRequest(_))
        ));
    }

    #[test]
    fn debug_output_masks_key() {
        let resolver = CredentialResolver::new(&config_with_fallback(Some("nvapi-secret-9876")));
        let cred = resolver.resolve(&user_with(vec![])).unwrap();
        let rendered = format!("{cred:?}");
        assert!(!rendered.contains("nvapi-secret"));
        assert!(rendered.contains("9876"));
    }
}
