mod common;

use async_trait::async_trait;
use axum::http::StatusCode;
use common::{Harness, PASSWORD, chat_reply, spawn_upstream, temp_dir, test_config};
use serde_json::json;
use std::sync::Arc;
use yodda::auth::TokenIssuer;
use yodda::build::FsArtifactStore;
use yodda::store::{License, MemoryStore, NewUser, Plugin, User, UserStore};
use yodda::{YoddaError, YoddaState, yodda_router};

async fn harness() -> Harness {
    let upstream = spawn_upstream(StatusCode::OK, chat_reply("pong")).await;
    Harness::for_upstream(&upstream).await
}

#[tokio::test]
async fn register_login_and_profile() {
    let h = harness().await;

    let (status, _, body) = h
        .send(
            "POST",
            "/auth/register",
            None,
            Some(json!({ "email": " New@X.io ", "password": PASSWORD, "name": "New" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tier"], "FREE");
    assert!(body["license_key"].as_str().unwrap().starts_with("YP-FREE-"));
    let token = body["token"].as_str().unwrap().to_string();

    // Same email again.
    let (status, _, body) = h
        .send(
            "POST",
            "/auth/register",
            None,
            Some(json!({ "email": "new@x.io", "password": "other" })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "CONFLICT");

    let (status, _, body) = h
        .send(
            "POST",
            "/auth/login",
            None,
            Some(json!({ "email": "new@x.io", "password": "wrong" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["message"], "Invalid credentials");

    let (status, _, body) = h
        .send(
            "POST",
            "/auth/login",
            None,
            Some(json!({ "email": "nobody@x.io", "password": PASSWORD })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["message"], "Invalid credentials");

    let (status, _, body) = h
        .send(
            "POST",
            "/auth/login",
            None,
            Some(json!({ "email": "new@x.io", "password": PASSWORD })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["email"], "new@x.io");
    assert_eq!(body["user"]["is_admin"], false);

    let (status, _, body) = h.send("GET", "/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["email"], "new@x.io");
    assert_eq!(body["name"], "New");
    assert_eq!(body["builds_used"], 0);
    assert_eq!(body["builds_remaining"], 3);

    let (status, _, body) = h.send("GET", "/auth/me", Some("garbage"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["message"], "Invalid or expired token");
}

#[tokio::test]
async fn admin_setup_runs_once_and_guards_admin_routes() {
    let h = harness().await;

    let (status, _, body) = h
        .send(
            "POST",
            "/admin/setup",
            None,
            Some(json!({ "email": "root@x.io", "password": PASSWORD })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["is_admin"], true);
    let admin_token = body["token"].as_str().unwrap().to_string();
    let admin = h.store.get_user("root@x.io").await.unwrap().unwrap();
    assert_eq!(admin.tier, "ENTERPRISE");

    let (status, _, _) = h
        .send(
            "POST",
            "/admin/setup",
            None,
            Some(json!({ "email": "second@x.io", "password": PASSWORD })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let user_token = h.user("plain@x.io", "FREE", 0).await;
    let payload = json!({ "user_email": "plain@x.io", "provider": "groq", "key": "gsk-123" });

    let (status, _, body) = h
        .send("POST", "/api/v1/admin/plugins", Some(&user_token), Some(payload.clone()))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["message"], "Admin only");

    let (status, _, body) = h
        .send("POST", "/api/v1/admin/plugins", Some(&admin_token), Some(payload))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "API key for 'groq' saved.");
    let plain = h.store.get_user("plain@x.io").await.unwrap().unwrap();
    assert_eq!(plain.plugins.len(), 1);
    assert_eq!(plain.plugins[0].provider.as_deref(), Some("groq"));

    let (status, _, _) = h
        .send(
            "POST",
            "/api/v1/admin/plugins",
            Some(&admin_token),
            Some(json!({ "user_email": "ghost@x.io", "provider": "groq", "key": "k" })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_admin_setup_creates_exactly_one_admin() {
    let h = harness().await;
    let emails: Vec<String> = (0..8).map(|n| format!("root{n}@x.io")).collect();

    let tasks: Vec<_> = emails
        .iter()
        .map(|email| {
            let app = h.app.clone();
            let payload = json!({ "email": email, "password": PASSWORD });
            tokio::spawn(async move {
                common::send(&app, "POST", "/admin/setup", None, Some(payload))
                    .await
                    .0
            })
        })
        .collect();

    let mut statuses = Vec::new();
    for task in tasks {
        statuses.push(task.await.unwrap());
    }
    assert_eq!(statuses.iter().filter(|s| **s == StatusCode::OK).count(), 1);
    assert_eq!(
        statuses
            .iter()
            .filter(|s| **s == StatusCode::CONFLICT)
            .count(),
        7
    );

    let mut admins = 0;
    for email in &emails {
        if let Some(user) = h.store.get_user(email).await.unwrap() {
            assert!(user.is_admin);
            admins += 1;
        }
    }
    assert_eq!(admins, 1);
}

#[tokio::test]
async fn admin_validate_key_checks_the_provider() {
    let upstream = spawn_upstream(StatusCode::OK, chat_reply("pong")).await;
    let h = Harness::for_upstream(&upstream).await;
    let (_, _, body) = h
        .send(
            "POST",
            "/admin/setup",
            None,
            Some(json!({ "email": "root@x.io", "password": PASSWORD })),
        )
        .await;
    let admin_token = body["token"].as_str().unwrap().to_string();

    let (status, _, body) = h
        .send(
            "POST",
            "/api/v1/admin/validate_key",
            Some(&admin_token),
            Some(json!({ "provider": "fake_chat", "key": "candidate-key" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "API key is valid.");
    let hits = upstream.hits();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].authorization.as_deref(), Some("Bearer candidate-key"));

    let (status, _, _) = h
        .send(
            "POST",
            "/api/v1/admin/validate_key",
            Some(&admin_token),
            Some(json!({ "provider": "no_such_provider", "key": "k" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn plugins_add_list_replace_and_delete() {
    let h = harness().await;
    let token = h.user("p@x.io", "FREE", 0).await;

    let (status, _, _) = h
        .send(
            "POST",
            "/plugins/add",
            Some(&token),
            Some(json!({ "provider": "groq", "key": "gsk-secret-1234", "type": "text" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _, _) = h
        .send(
            "POST",
            "/plugins/add",
            Some(&token),
            Some(json!({
                "endpoint": "https://llm.example/v1",
                "key": "vision-key-9876",
                "kind": "vision"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    // Replaces the text plugin, which moves to the end.
    let (status, _, _) = h
        .send(
            "POST",
            "/plugins/add",
            Some(&token),
            Some(json!({ "provider": "nvidia", "key": "nv-key-5555", "kind": "text" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _, body) = h.send("GET", "/plugins", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    let plugins = body["plugins"].as_array().unwrap();
    assert_eq!(plugins.len(), 2);
    assert_eq!(plugins[0]["kind"], "vision");
    assert_eq!(plugins[1]["provider"], "nvidia");
    let shown = plugins[1]["key"].as_str().unwrap();
    assert!(shown.ends_with("5555"));
    assert!(!shown.contains("nv-key"));

    let (status, _, _) = h
        .send(
            "POST",
            "/plugins/add",
            Some(&token),
            Some(json!({ "provider": "mystery", "key": "k", "kind": "text" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _, body) = h
        .send("DELETE", "/plugins/delete?index=5", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["message"], "Invalid index");

    let (status, _, _) = h
        .send("DELETE", "/plugins/delete?index=abc", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _, _) = h
        .send("DELETE", "/plugins/delete?index=0", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let user = h.store.get_user("p@x.io").await.unwrap().unwrap();
    assert_eq!(user.plugins.len(), 1);
    assert_eq!(user.plugins[0].provider.as_deref(), Some("nvidia"));
}

#[tokio::test]
async fn payments_change_tier_without_resetting_usage() {
    let h = harness().await;
    let token = h.user("pay@x.io", "FREE", 3).await;

    let (status, _, body) = h.send("GET", "/payments/tiers", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tiers"]["FREE"]["builds"], 3);
    assert_eq!(body["tiers"]["PREMIUM"]["lifetime"], true);

    let (status, _, body) = h
        .send(
            "POST",
            "/payments/subscribe",
            Some(&token),
            Some(json!({ "tier": "gold" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["message"], "Invalid tier");

    let (status, _, body) = h
        .send(
            "POST",
            "/payments/subscribe",
            Some(&token),
            Some(json!({ "tier": "pro" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Subscribed to PRO");
    assert_eq!(body["price"], 50);
    assert!(body["license_key"].as_str().unwrap().starts_with("YP-PRO-"));

    let user = h.store.get_user("pay@x.io").await.unwrap().unwrap();
    assert_eq!(user.tier, "PRO");
    assert_eq!(user.builds_used, 3);

    let (status, _, body) = h
        .send(
            "POST",
            "/payments/process",
            Some(&token),
            Some(json!({ "tier": "PREMIUM", "card_number": "", "expiry": "12/30", "cvv": "123" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["message"], "Invalid card info");

    let (status, _, body) = h
        .send(
            "POST",
            "/payments/process",
            Some(&token),
            Some(json!({
                "tier": "PREMIUM",
                "card_number": "4242424242424242",
                "expiry": "12/30",
                "cvv": "123"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["lifetime"], true);

    let (status, _, body) = h.send("GET", "/payments/history", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    let licenses = body["licenses"].as_array().unwrap();
    assert_eq!(licenses.len(), 2);
    assert!(licenses.iter().all(|l| l["email"] == "pay@x.io"));
}

#[tokio::test]
async fn public_endpoints_and_unknown_paths() {
    let h = harness().await;

    let (status, _, body) = h.send("GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, _, body) = h.send("GET", "/api/v1/pw/themes", None, None).await;
    assert_eq!(status, StatusCode::OK);
    let themes = body["themes"].as_array().unwrap();
    assert!(themes.iter().any(|t| t["id"] == "landing-funnel"));

    let (status, headers, _) = h.send("GET", "/does/not/exist", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(headers.contains_key("x-request-id"));
}

/// Delegates to a [`MemoryStore`] but cannot write licenses.
struct LicenseOutage {
    inner: Arc<MemoryStore>,
}

#[async_trait]
impl UserStore for LicenseOutage {
    async fn get_user(&self, email: &str) -> Result<Option<User>, YoddaError> {
        self.inner.get_user(email).await
    }

    async fn create_user(&self, user: NewUser) -> Result<User, YoddaError> {
        self.inner.create_user(user).await
    }

    async fn admin_exists(&self) -> Result<bool, YoddaError> {
        self.inner.admin_exists().await
    }

    async fn create_admin_if_none(&self, user: NewUser) -> Result<User, YoddaError> {
        self.inner.create_admin_if_none(user).await
    }

    async fn compare_and_swap_builds(
        &self,
        email: &str,
        expected: u32,
        new: u32,
    ) -> Result<bool, YoddaError> {
        self.inner.compare_and_swap_builds(email, expected, new).await
    }

    async fn set_tier(&self, email: &str, tier: &str) -> Result<(), YoddaError> {
        self.inner.set_tier(email, tier).await
    }

    async fn save_plugin(&self, email: &str, plugin: Plugin) -> Result<(), YoddaError> {
        self.inner.save_plugin(email, plugin).await
    }

    async fn delete_plugin(&self, email: &str, index: usize) -> Result<Plugin, YoddaError> {
        self.inner.delete_plugin(email, index).await
    }

    async fn create_license(&self, _license: License) -> Result<(), YoddaError> {
        Err(YoddaError::UnexpectedError("license table unavailable".to_string()))
    }

    async fn list_licenses(&self, email: &str) -> Result<Vec<License>, YoddaError> {
        self.inner.list_licenses(email).await
    }
}

#[tokio::test]
async fn failed_license_issue_does_not_change_the_tier() {
    let upstream = spawn_upstream(StatusCode::OK, chat_reply("pong")).await;
    let cfg = test_config(&upstream, temp_dir("builds"));
    let inner = Arc::new(MemoryStore::new());
    let store = Arc::new(LicenseOutage {
        inner: inner.clone(),
    });
    let artifacts = Arc::new(FsArtifactStore::new(cfg.basic.builds_dir.clone()));
    let app = yodda_router(YoddaState::new(&cfg, store, artifacts).unwrap());

    inner
        .create_user(NewUser {
            email: "pay@x.io".to_string(),
            name: None,
            password_hash: String::new(),
            is_admin: false,
            tier: "FREE".to_string(),
        })
        .await
        .unwrap();
    let token = TokenIssuer::new(common::JWT_SECRET, 60)
        .issue("pay@x.io", false)
        .unwrap();

    let (status, _, body) = common::send(
        &app,
        "POST",
        "/payments/subscribe",
        Some(&token),
        Some(json!({ "tier": "PRO" })),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"]["code"], "INTERNAL_ERROR");
    assert_eq!(inner.get_user("pay@x.io").await.unwrap().unwrap().tier, "FREE");

    // Registration cannot issue the license either; the account stays without one.
    let (status, _, _) = common::send(
        &app,
        "POST",
        "/auth/register",
        None,
        Some(json!({ "email": "new@x.io", "password": PASSWORD })),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(inner.get_user("new@x.io").await.unwrap().is_some());
    assert!(inner.list_licenses("new@x.io").await.unwrap().is_empty());
}
