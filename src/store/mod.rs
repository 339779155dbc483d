//! User, plugin and license persistence behind one injectable trait.
//!
//! Two implementations ship with the crate:
//! - [`crate::db::DbActorHandle`]: durable SQLite storage owned by an actor;
//! - [`MemoryStore`]: process-local maps, used by tests and ephemeral runs.

mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use url::Url;

use crate::error::YoddaError;

/// Declared capability of a plugin credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PluginKind {
    Text,
    Vision,
}

impl PluginKind {
    pub fn as_str(self) -> &'static str {
        match self {
            PluginKind::Text => "text",
            PluginKind::Vision => "vision",
        }
    }
}

impl fmt::Display for PluginKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PluginKind {
    type Err = YoddaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(PluginKind::Text),
            "vision" => Ok(PluginKind::Vision),
            other => Err(YoddaError::InvalidRequest(format!(
                "unknown plugin kind '{other}' (expected 'text' or 'vision')"
            ))),
        }
    }
}

/// A user-supplied alternate upstream credential.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plugin {
    /// Provider catalog id (`nvidia`, `google_gemini`, ...).
    pub provider: Option<String>,
    /// Overrides the catalog endpoint when set.
    pub endpoint: Option<Url>,
    pub key: String,
    pub kind: PluginKind,
}

impl Plugin {
    /// Key with everything but the last four characters hidden.
    pub fn masked_key(&self) -> String {
        mask_secret(&self.key)
    }
}

impl fmt::Debug for Plugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Plugin")
            .field("provider", &self.provider)
            .field("endpoint", &self.endpoint.as_ref().map(Url::as_str))
            .field("key", &self.masked_key())
            .field("kind", &self.kind)
            .finish()
    }
}

pub(crate) fn mask_secret(secret: &str) -> String {
    let count = secret.chars().count();
    if count <= 4 {
        return "*".repeat(count);
    }
    let tail: String = secret.chars().skip(count - 4).collect();
    format!("{}{tail}", "*".repeat(count - 4))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub email: String,
    pub name: Option<String>,
    pub password_hash: String,
    pub is_admin: bool,
    pub tier: String,
    /// Builds consumed; only the quota gate increases it.
    pub builds_used: u32,
    /// Ordered; at most one entry per [`PluginKind`].
    pub plugins: Vec<Plugin>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub name: Option<String>,
    pub password_hash: String,
    pub is_admin: bool,
    pub tier: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct License {
    pub license_key: String,
    pub email: String,
    pub tier: String,
    pub status: String,
    pub lifetime: bool,
    pub created_at: DateTime<Utc>,
}

/// Storage contract consumed by the auth, quota and build flows.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn get_user(&self, email: &str) -> Result<Option<User>, YoddaError>;

    /// Fails with [`YoddaError::Conflict`] when the email is taken.
    async fn create_user(&self, user: NewUser) -> Result<User, YoddaError>;

    async fn admin_exists(&self) -> Result<bool, YoddaError>;

    /// Inserts `user` as an admin only while no admin exists. The check and
    /// the insert are one step; losers get [`YoddaError::Conflict`].
    async fn create_admin_if_none(&self, user: NewUser) -> Result<User, YoddaError>;

    /// Sets `builds_used` to `new` only if it currently equals `expected`.
    /// Returns `false` when the stored value moved underneath the caller.
    async fn compare_and_swap_builds(
        &self,
        email: &str,
        expected: u32,
        new: u32,
    ) -> Result<bool, YoddaError>;

    async fn set_tier(&self, email: &str, tier: &str) -> Result<(), YoddaError>;

    /// Saves `plugin`, replacing any existing plugin of the same kind.
    /// The saved plugin goes to the end of the list.
    async fn save_plugin(&self, email: &str, plugin: Plugin) -> Result<(), YoddaError>;

    /// Removes the plugin at `index` (list order) and returns it.
    async fn delete_plugin(&self, email: &str, index: usize) -> Result<Plugin, YoddaError>;

    async fn create_license(&self, license: License) -> Result<(), YoddaError>;

    async fn list_licenses(&self, email: &str) -> Result<Vec<License>, YoddaError>;
}
