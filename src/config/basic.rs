use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use url::Url;

/// Basic (core) configuration managed by Figment.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BasicConfig {
    /// HTTP server listen address (e.g., "0.0.0.0", "127.0.0.1").
    /// TOML: `basic.listen_addr`. Default: `0.0.0.0`.
    #[serde(default = "default_listen_ip")]
    pub listen_addr: IpAddr,

    /// HTTP server listen port.
    /// TOML: `basic.listen_port`. Default: `5000`.
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,

    /// Database URL for SQLite.
    /// TOML: `basic.database_url`. Default: `sqlite://yodda.db`.
    #[serde(default = "default_database_url")]
    pub database_url: String,

    /// Log level for tracing subscriber initialization (e.g., "error", "warn", "info", "debug", "trace").
    /// TOML: `basic.loglevel`. Default: `info`.
    #[serde(default = "default_loglevel")]
    pub loglevel: String,

    /// HMAC secret used to sign bearer tokens (required, non-empty).
    /// TOML: `basic.jwt_secret`. Must be provided.
    #[serde(default)]
    #[serde(deserialize_with = "deserialize_string_lax")]
    pub jwt_secret: String,

    /// Bearer token lifetime in minutes.
    /// TOML: `basic.token_ttl_minutes`. Default: `1440`.
    #[serde(default = "default_token_ttl_minutes")]
    pub token_ttl_minutes: u64,

    /// Base URL that generated build artifacts are published under.
    /// TOML: `basic.public_base_url`. Default: `http://127.0.0.1:5000/`.
    #[serde(default = "default_public_base_url")]
    pub public_base_url: Url,

    /// Directory build artifacts are written to and served from.
    /// TOML: `basic.builds_dir`. Default: `builds`.
    #[serde(default = "default_builds_dir")]
    pub builds_dir: PathBuf,
}

impl Default for BasicConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_ip(),
            listen_port: default_listen_port(),
            database_url: default_database_url(),
            loglevel: default_loglevel(),
            // No insecure default. `Config::validate()` enforces non-empty.
            jwt_secret: String::new(),
            token_ttl_minutes: default_token_ttl_minutes(),
            public_base_url: default_public_base_url(),
            builds_dir: default_builds_dir(),
        }
    }
}

fn deserialize_string_lax<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Value::deserialize(deserializer)?;

    match v {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        _ => Err(serde::de::Error::custom(
            "expected a string or a number for basic.jwt_secret",
        )),
    }
}

fn default_listen_ip() -> IpAddr {
    Ipv4Addr::new(0, 0, 0, 0).into()
}

fn default_listen_port() -> u16 {
    5000
}

fn default_database_url() -> String {
    "sqlite://yodda.db".to_string()
}

fn default_loglevel() -> String {
    "info".to_string()
}

fn default_token_ttl_minutes() -> u64 {
    24 * 60
}

fn default_public_base_url() -> Url {
    Url::parse("http://127.0.0.1:5000/").expect("invalid fixed default public base url")
}

fn default_builds_dir() -> PathBuf {
    PathBuf::from("builds")
}
