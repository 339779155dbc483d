use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ThemeEntry {
    pub id: String,
    pub name: String,
}

/// Themes offered to clients and the prompt guidance injected for each.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ThemesConfig {
    /// TOML: `[[themes.list]]`.
    #[serde(default = "default_list")]
    pub list: Vec<ThemeEntry>,

    /// TOML: `[themes.hints]`, theme id -> guidance string.
    #[serde(default = "default_hints")]
    pub hints: BTreeMap<String, String>,
}

impl ThemesConfig {
    /// Guidance for `theme`; unknown themes get an empty hint.
    pub fn hint(&self, theme: &str) -> &str {
        self.hints.get(theme).map_or("", String::as_str)
    }
}

impl Default for ThemesConfig {
    fn default() -> Self {
        Self {
            list: default_list(),
            hints: default_hints(),
        }
    }
}

const BUILTIN_THEMES: [(&str, &str, &str); 6] = [
    (
        "website-builder",
        "Website Builder",
        "Build a full production-ready marketing website with responsive layout, navigation, sections for features, pricing, and contact.",
    ),
    (
        "presentation-mode",
        "Presentation Mode",
        "Generate an HTML-based presentation/slides experience suitable for pitching to stakeholders.",
    ),
    (
        "saas-boilerplate",
        "SaaS Boilerplate",
        "Create a SaaS application boilerplate with auth scaffolding, pricing, and feature overview sections.",
    ),
    (
        "dashboard-suite",
        "Dashboard Suite",
        "Produce a data-centric dashboard UI with cards, charts placeholders, and filters for an internal tool.",
    ),
    (
        "landing-funnel",
        "Landing Funnel",
        "Optimize for a high-conversion landing page with hero, social proof, benefits, and clear call-to-action.",
    ),
    (
        "knowledge-base",
        "Knowledge Base",
        "Generate a documentation / knowledge base style layout with sidebar navigation and content sections.",
    ),
];

fn default_list() -> Vec<ThemeEntry> {
    BUILTIN_THEMES
        .iter()
        .map(|(id, name, _)| ThemeEntry {
            id: (*id).to_string(),
            name: (*name).to_string(),
        })
        .collect()
}

fn default_hints() -> BTreeMap<String, String> {
    BUILTIN_THEMES
        .iter()
        .map(|(id, _, hint)| ((*id).to_string(), (*hint).to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_theme_has_empty_hint() {
        let themes = ThemesConfig::default();
        assert_eq!(themes.hint("dark-pro"), "");
        assert!(themes.hint("landing-funnel").contains("call-to-action"));
    }
}
