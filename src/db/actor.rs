use crate::db::models::{DbLicense, DbPlugin, DbUser};
use crate::db::schema::SQLITE_INIT;
use crate::error::YoddaError;
use crate::store::{License, NewUser, Plugin, User, UserStore};
use async_trait::async_trait;
use chrono::Utc;
use ractor::{Actor, ActorProcessingErr, ActorRef, RpcReplyPort};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use std::{str::FromStr, time::Duration};
use tracing::{debug, info};

#[derive(Debug)]
pub enum DbActorMessage {
    /// Load a user and their plugins by email.
    GetUser(String, RpcReplyPort<Result<Option<User>, YoddaError>>),

    /// Insert a new user; duplicate emails are a conflict.
    CreateUser(NewUser, RpcReplyPort<Result<User, YoddaError>>),

    AdminExists(RpcReplyPort<Result<bool, YoddaError>>),

    /// Insert an admin only while none exists.
    CreateAdminIfNone(NewUser, RpcReplyPort<Result<User, YoddaError>>),

    /// (email, expected, new) compare-and-swap on `builds_used`.
    CasBuilds(String, u32, u32, RpcReplyPort<Result<bool, YoddaError>>),

    SetTier(String, String, RpcReplyPort<Result<(), YoddaError>>),

    /// Replace-by-kind plugin save.
    SavePlugin(String, Plugin, RpcReplyPort<Result<(), YoddaError>>),

    /// Delete the plugin at list index.
    DeletePlugin(String, usize, RpcReplyPort<Result<Plugin, YoddaError>>),

    CreateLicense(License, RpcReplyPort<Result<(), YoddaError>>),

    ListLicenses(String, RpcReplyPort<Result<Vec<License>, YoddaError>>),
}

/// Cloneable handle to the actor that owns the SQLite pool.
#[derive(Clone)]
pub struct DbActorHandle {
    actor: ActorRef<DbActorMessage>,
}

fn rpc_failed(op: &str, e: impl std::fmt::Display) -> YoddaError {
    YoddaError::RactorError(format!("DbActor {op} RPC failed: {e}"))
}

#[async_trait]
impl UserStore for DbActorHandle {
    async fn get_user(&self, email: &str) -> Result<Option<User>, YoddaError> {
        ractor::call!(self.actor, DbActorMessage::GetUser, email.to_string())
            .map_err(|e| rpc_failed("GetUser", e))?
    }

    async fn create_user(&self, user: NewUser) -> Result<User, YoddaError> {
        ractor::call!(self.actor, DbActorMessage::CreateUser, user)
            .map_err(|e| rpc_failed("CreateUser", e))?
    }

    async fn admin_exists(&self) -> Result<bool, YoddaError> {
        ractor::call!(self.actor, DbActorMessage::AdminExists)
            .map_err(|e| rpc_failed("AdminExists", e))?
    }

    async fn create_admin_if_none(&self, user: NewUser) -> Result<User, YoddaError> {
        ractor::call!(self.actor, DbActorMessage::CreateAdminIfNone, user)
            .map_err(|e| rpc_failed("CreateAdminIfNone", e))?
    }

    async fn compare_and_swap_builds(
        &self,
        email: &str,
        expected: u32,
        new: u32,
    ) -> Result<bool, YoddaError> {
        ractor::call!(
            self.actor,
            DbActorMessage::CasBuilds,
            email.to_string(),
            expected,
            new
        )
        .map_err(|e| rpc_failed("CasBuilds", e))?
    }

    async fn set_tier(&self, email: &str, tier: &str) -> Result<(), YoddaError> {
        ractor::call!(
            self.actor,
            DbActorMessage::SetTier,
            email.to_string(),
            tier.to_string()
        )
        .map_err(|e| rpc_failed("SetTier", e))?
    }

    async fn save_plugin(&self, email: &str, plugin: Plugin) -> Result<(), YoddaError> {
        ractor::call!(
            self.actor,
            DbActorMessage::SavePlugin,
            email.to_string(),
            plugin
        )
        .map_err(|e| rpc_failed("SavePlugin", e))?
    }

    async fn delete_plugin(&self, email: &str, index: usize) -> Result<Plugin, YoddaError> {
        ractor::call!(
            self.actor,
            DbActorMessage::DeletePlugin,
            email.to_string(),
            index
        )
        .map_err(|e| rpc_failed("DeletePlugin", e))?
    }

    async fn create_license(&self, license: License) -> Result<(), YoddaError> {
        ractor::call!(self.actor, DbActorMessage::CreateLicense, license)
            .map_err(|e| rpc_failed("CreateLicense", e))?
    }

    async fn list_licenses(&self, email: &str) -> Result<Vec<License>, YoddaError> {
        ractor::call!(self.actor, DbActorMessage::ListLicenses, email.to_string())
            .map_err(|e| rpc_failed("ListLicenses", e))?
    }
}

struct DbActorState {
    pool: SqlitePool,
}

struct DbActor;

#[ractor::async_trait]
impl Actor for DbActor {
    type Msg = DbActorMessage;
    type State = DbActorState;
    type Arguments = String;

    async fn pre_start(
        &self,
        _myself: ActorRef<Self::Msg>,
        database_url: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        let connect_opts = SqliteConnectOptions::from_str(database_url.as_str())
            .map_err(|e| ActorProcessingErr::from(format!("invalid database url: {e}")))?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5))
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .connect_with(connect_opts)
            .await
            .map_err(|e| ActorProcessingErr::from(format!("db connect failed: {e}")))?;

        apply_schema(&pool)
            .await
            .map_err(|e| ActorProcessingErr::from(format!("db schema init failed: {e}")))?;

        info!("DbActor initialized");
        Ok(DbActorState { pool })
    }

    async fn handle(
        &self,
        _myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        let pool = &state.pool;
        match message {
            DbActorMessage::GetUser(email, reply) => {
                let _ = reply.send(get_user(pool, &email).await);
            }
            DbActorMessage::CreateUser(user, reply) => {
                let _ = reply.send(create_user(pool, user).await);
            }
            DbActorMessage::AdminExists(reply) => {
                let _ = reply.send(admin_exists(pool).await);
            }
            DbActorMessage::CreateAdminIfNone(user, reply) => {
                let _ = reply.send(create_admin_if_none(pool, user).await);
            }
            DbActorMessage::CasBuilds(email, expected, new, reply) => {
                let _ = reply.send(cas_builds(pool, &email, expected, new).await);
            }
            DbActorMessage::SetTier(email, tier, reply) => {
                let _ = reply.send(set_tier(pool, &email, &tier).await);
            }
            DbActorMessage::SavePlugin(email, plugin, reply) => {
                let _ = reply.send(save_plugin(pool, &email, plugin).await);
            }
            DbActorMessage::DeletePlugin(email, index, reply) => {
                let _ = reply.send(delete_plugin(pool, &email, index).await);
            }
            DbActorMessage::CreateLicense(license, reply) => {
                let _ = reply.send(create_license(pool, license).await);
            }
            DbActorMessage::ListLicenses(email, reply) => {
                let _ = reply.send(list_licenses(pool, &email).await);
            }
        }
        Ok(())
    }
}

fn user_not_found(email: &str) -> YoddaError {
    YoddaError::UserNotFound(format!("User '{email}' not found"))
}

async fn user_exists(pool: &SqlitePool, email: &str) -> Result<bool, YoddaError> {
    let found: Option<i64> = sqlx::query_scalar("SELECT id FROM users WHERE email = ?")
        .bind(email)
        .fetch_optional(pool)
        .await?;
    Ok(found.is_some())
}

async fn list_plugins(pool: &SqlitePool, email: &str) -> Result<Vec<DbPlugin>, YoddaError> {
    let rows = sqlx::query_as::<_, DbPlugin>(
        r#"
        SELECT id, user_email, provider, endpoint, api_key, kind
        FROM plugins
        WHERE user_email = ?
        ORDER BY id ASC
        "#,
    )
    .bind(email)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

async fn get_user(pool: &SqlitePool, email: &str) -> Result<Option<User>, YoddaError> {
    let row = sqlx::query_as::<_, DbUser>(
        r#"
        SELECT id, email, name, password_hash, is_admin, tier, builds_used, created_at
        FROM users
        WHERE email = ?
        "#,
    )
    .bind(email)
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };
    let plugins = list_plugins(pool, email)
        .await?
        .into_iter()
        .map(Plugin::try_from)
        .collect::<Result<Vec<_>, _>>()?;
    row.into_user(plugins).map(Some)
}

async fn create_user(pool: &SqlitePool, user: NewUser) -> Result<User, YoddaError> {
    let now = Utc::now();
    let inserted = sqlx::query(
        r#"
        INSERT INTO users (email, name, password_hash, is_admin, tier, builds_used, created_at)
        VALUES (?, ?, ?, ?, ?, 0, ?)
        "#,
    )
    .bind(&user.email)
    .bind(&user.name)
    .bind(&user.password_hash)
    .bind(user.is_admin)
    .bind(&user.tier)
    .bind(now)
    .execute(pool)
    .await;

    match inserted {
        Ok(_) => {}
        Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
            return Err(YoddaError::Conflict("Email already registered".to_string()));
        }
        Err(e) => return Err(e.into()),
    }

    debug!(email = %user.email, tier = %user.tier, "User created");
    get_user(pool, &user.email)
        .await?
        .ok_or_else(|| YoddaError::UnexpectedError("inserted user vanished".to_string()))
}

async fn create_admin_if_none(pool: &SqlitePool, user: NewUser) -> Result<User, YoddaError> {
    let now = Utc::now();
    let inserted = sqlx::query(
        r#"
        INSERT INTO users (email, name, password_hash, is_admin, tier, builds_used, created_at)
        SELECT ?, ?, ?, 1, ?, 0, ?
        WHERE NOT EXISTS (SELECT 1 FROM users WHERE is_admin = 1)
        "#,
    )
    .bind(&user.email)
    .bind(&user.name)
    .bind(&user.password_hash)
    .bind(&user.tier)
    .bind(now)
    .execute(pool)
    .await;

    match inserted {
        Ok(done) if done.rows_affected() == 0 => {
            return Err(YoddaError::Conflict("Admin already exists".to_string()));
        }
        Ok(_) => {}
        Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
            return Err(YoddaError::Conflict("Email already registered".to_string()));
        }
        Err(e) => return Err(e.into()),
    }

    info!(email = %user.email, "Admin user created");
    get_user(pool, &user.email)
        .await?
        .ok_or_else(|| YoddaError::UnexpectedError("inserted admin vanished".to_string()))
}

async fn admin_exists(pool: &SqlitePool) -> Result<bool, YoddaError> {
    let found: Option<i64> = sqlx::query_scalar("SELECT id FROM users WHERE is_admin = 1 LIMIT 1")
        .fetch_optional(pool)
        .await?;
    Ok(found.is_some())
}

async fn cas_builds(
    pool: &SqlitePool,
    email: &str,
    expected: u32,
    new: u32,
) -> Result<bool, YoddaError> {
    let result = sqlx::query("UPDATE users SET builds_used = ? WHERE email = ? AND builds_used = ?")
        .bind(i64::from(new))
        .bind(email)
        .bind(i64::from(expected))
        .execute(pool)
        .await?;

    if result.rows_affected() == 1 {
        return Ok(true);
    }
    if user_exists(pool, email).await? {
        Ok(false)
    } else {
        Err(user_not_found(email))
    }
}

async fn set_tier(pool: &SqlitePool, email: &str, tier: &str) -> Result<(), YoddaError> {
    let result = sqlx::query("UPDATE users SET tier = ? WHERE email = ?")
        .bind(tier)
        .bind(email)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(user_not_found(email));
    }
    Ok(())
}

async fn save_plugin(pool: &SqlitePool, email: &str, plugin: Plugin) -> Result<(), YoddaError> {
    if !user_exists(pool, email).await? {
        return Err(user_not_found(email));
    }

    let mut tx = pool.begin().await?;
    sqlx::query("DELETE FROM plugins WHERE user_email = ? AND kind = ?")
        .bind(email)
        .bind(plugin.kind.as_str())
        .execute(&mut *tx)
        .await?;
    sqlx::query(
        r#"
        INSERT INTO plugins (user_email, provider, endpoint, api_key, kind, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(email)
    .bind(&plugin.provider)
    .bind(plugin.endpoint.as_ref().map(url::Url::as_str))
    .bind(&plugin.key)
    .bind(plugin.kind.as_str())
    .bind(Utc::now())
    .execute(&mut *tx)
    .await?;
    tx.commit().await?;
    Ok(())
}

async fn delete_plugin(pool: &SqlitePool, email: &str, index: usize) -> Result<Plugin, YoddaError> {
    if !user_exists(pool, email).await? {
        return Err(user_not_found(email));
    }
    let row = list_plugins(pool, email)
        .await?
        .into_iter()
        .nth(index)
        .ok_or_else(|| YoddaError::InvalidRequest("Invalid index".to_string()))?;

    sqlx::query("DELETE FROM plugins WHERE id = ?")
        .bind(row.id)
        .execute(pool)
        .await?;
    Plugin::try_from(row)
}

async fn create_license(pool: &SqlitePool, license: License) -> Result<(), YoddaError> {
    let inserted = sqlx::query(
        r#"
        INSERT INTO licenses (license_key, email, tier, status, lifetime, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&license.license_key)
    .bind(&license.email)
    .bind(&license.tier)
    .bind(&license.status)
    .bind(license.lifetime)
    .bind(license.created_at)
    .execute(pool)
    .await;

    match inserted {
        Ok(_) => Ok(()),
        Err(sqlx::Error::Database(db)) if db.is_unique_violation() => Err(YoddaError::Conflict(
            "License key already issued".to_string(),
        )),
        Err(e) => Err(e.into()),
    }
}

async fn list_licenses(pool: &SqlitePool, email: &str) -> Result<Vec<License>, YoddaError> {
    let rows = sqlx::query_as::<_, DbLicense>(
        r#"
        SELECT id, license_key, email, tier, status, lifetime, created_at
        FROM licenses
        WHERE email = ?
        ORDER BY id ASC
        "#,
    )
    .bind(email)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(License::from).collect())
}

/// Spawns the database actor and applies the schema.
pub async fn spawn(database_url: &str) -> Result<DbActorHandle, YoddaError> {
    let (actor, _jh) = ractor::Actor::spawn(None, DbActor, database_url.to_string())
        .await
        .map_err(|e| YoddaError::RactorError(format!("failed to spawn DbActor: {e}")))?;

    Ok(DbActorHandle { actor })
}

async fn apply_schema(pool: &SqlitePool) -> Result<(), YoddaError> {
    for stmt in SQLITE_INIT.split(';') {
        let s = stmt.trim();
        if s.is_empty() {
            continue;
        }
        sqlx::query(s).execute(pool).await?;
    }
    Ok(())
}
