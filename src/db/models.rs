use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use url::Url;

use crate::error::YoddaError;
use crate::store::{License, Plugin, User};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
pub struct DbUser {
    pub id: i64,
    pub email: String,
    pub name: Option<String>,
    pub password_hash: String,
    pub is_admin: bool,
    pub tier: String,
    pub builds_used: i64,
    pub created_at: DateTime<Utc>,
}

impl DbUser {
    pub fn into_user(self, plugins: Vec<Plugin>) -> Result<User, YoddaError> {
        let builds_used = u32::try_from(self.builds_used).map_err(|_| {
            YoddaError::UnexpectedError(format!(
                "user '{}' has out-of-range builds_used {}",
                self.email, self.builds_used
            ))
        })?;
        Ok(User {
            email: self.email,
            name: self.name,
            password_hash: self.password_hash,
            is_admin: self.is_admin,
            tier: self.tier,
            builds_used,
            plugins,
            created_at: self.created_at,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
pub struct DbPlugin {
    pub id: i64,
    pub user_email: String,
    pub provider: Option<String>,
    pub endpoint: Option<String>,
    pub api_key: String,
    pub kind: String,
}

impl TryFrom<DbPlugin> for Plugin {
    type Error = YoddaError;

    fn try_from(row: DbPlugin) -> Result<Self, Self::Error> {
        let endpoint = row
            .endpoint
            .as_deref()
            .map(Url::parse)
            .transpose()
            .map_err(|e| {
                YoddaError::UnexpectedError(format!("plugin {} has invalid endpoint: {e}", row.id))
            })?;
        Ok(Plugin {
            provider: row.provider,
            endpoint,
            key: row.api_key,
            kind: row.kind.parse()?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
pub struct DbLicense {
    pub id: i64,
    pub license_key: String,
    pub email: String,
    pub tier: String,
    pub status: String,
    pub lifetime: bool,
    pub created_at: DateTime<Utc>,
}

impl From<DbLicense> for License {
    fn from(row: DbLicense) -> Self {
        License {
            license_key: row.license_key,
            email: row.email,
            tier: row.tier,
            status: row.status,
            lifetime: row.lifetime,
            created_at: row.created_at,
        }
    }
}
