//! SQL DDL for initializing the database schema.

/// SQLite schema includes:
/// - `users` table (one row per email; `builds_used` only moves through compare-and-swap)
/// - `plugins` table (per-user upstream credentials, list order = `id` order)
/// - `licenses` table (dummy subscription licenses)
pub const SQLITE_INIT: &str = r#"
-- ---------------------------------------------------------------------------
-- Users
-- ---------------------------------------------------------------------------
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY NOT NULL,
    email TEXT NOT NULL UNIQUE,
    name TEXT NULL,
    password_hash TEXT NOT NULL, -- argon2 PHC string
    is_admin INTEGER NOT NULL DEFAULT 0,
    tier TEXT NOT NULL,
    builds_used INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL -- RFC3339
);

CREATE INDEX IF NOT EXISTS idx_users_is_admin ON users(is_admin);

-- ---------------------------------------------------------------------------
-- Plugins (at most one per (user_email, kind))
-- ---------------------------------------------------------------------------
CREATE TABLE IF NOT EXISTS plugins (
    id INTEGER PRIMARY KEY NOT NULL,
    user_email TEXT NOT NULL REFERENCES users(email) ON DELETE CASCADE,
    provider TEXT NULL,
    endpoint TEXT NULL,
    api_key TEXT NOT NULL,
    kind TEXT NOT NULL, -- 'text' | 'vision'
    created_at TEXT NOT NULL, -- RFC3339
    UNIQUE(user_email, kind)
);

CREATE INDEX IF NOT EXISTS idx_plugins_user ON plugins(user_email);

-- ---------------------------------------------------------------------------
-- Licenses
-- ---------------------------------------------------------------------------
CREATE TABLE IF NOT EXISTS licenses (
    id INTEGER PRIMARY KEY NOT NULL,
    license_key TEXT NOT NULL UNIQUE,
    email TEXT NOT NULL,
    tier TEXT NOT NULL,
    status TEXT NOT NULL,
    lifetime INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL -- RFC3339
);

CREATE INDEX IF NOT EXISTS idx_licenses_email ON licenses(email);
"#;
