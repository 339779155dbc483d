use ahash::AHashMap;
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{License, NewUser, Plugin, User, UserStore};
use crate::error::YoddaError;

#[derive(Default)]
struct MemoryState {
    users: AHashMap<String, User>,
    licenses: Vec<License>,
}

/// In-process store; contents are lost on restart.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn insert_user(state: &mut MemoryState, user: NewUser) -> Result<User, YoddaError> {
    if state.users.contains_key(&user.email) {
        return Err(YoddaError::Conflict("Email already registered".to_string()));
    }
    let created = User {
        email: user.email.clone(),
        name: user.name,
        password_hash: user.password_hash,
        is_admin: user.is_admin,
        tier: user.tier,
        builds_used: 0,
        plugins: Vec::new(),
        created_at: Utc::now(),
    };
    state.users.insert(user.email, created.clone());
    Ok(created)
}

fn not_found(email: &str) -> YoddaError {
    YoddaError::UserNotFound(format!("User '{email}' not found"))
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn get_user(&self, email: &str) -> Result<Option<User>, YoddaError> {
        Ok(self.state.read().await.users.get(email).cloned())
    }

    async fn create_user(&self, user: NewUser) -> Result<User, YoddaError> {
        let mut state = self.state.write().await;
        insert_user(&mut state, user)
    }

    async fn create_admin_if_none(&self, user: NewUser) -> Result<User, YoddaError> {
        let mut state = self.state.write().await;
        if state.users.values().any(|u| u.is_admin) {
            return Err(YoddaError::Conflict("Admin already exists".to_string()));
        }
        insert_user(
            &mut state,
            NewUser {
                is_admin: true,
                ..user
            },
        )
    }

    async fn admin_exists(&self) -> Result<bool, YoddaError> {
        Ok(self.state.read().await.users.values().any(|u| u.is_admin))
    }

    async fn compare_and_swap_builds(
        &self,
        email: &str,
        expected: u32,
        new: u32,
    ) -> Result<bool, YoddaError> {
        let mut state = self.state.write().await;
        let user = state.users.get_mut(email).ok_or_else(|| not_found(email))?;
        if user.builds_used != expected {
            return Ok(false);
        }
        user.builds_used = new;
        Ok(true)
    }

    async fn set_tier(&self, email: &str, tier: &str) -> Result<(), YoddaError> {
        let mut state = self.state.write().await;
        let user = state.users.get_mut(email).ok_or_else(|| not_found(email))?;
        user.tier = tier.to_string();
        Ok(())
    }

    async fn save_plugin(&self, email: &str, plugin: Plugin) -> Result<(), YoddaError> {
        let mut state = self.state.write().await;
        let user = state.users.get_mut(email).ok_or_else(|| not_found(email))?;
        user.plugins.retain(|p| p.kind != plugin.kind);
        user.plugins.push(plugin);
        Ok(())
    }

    async fn delete_plugin(&self, email: &str, index: usize) -> Result<Plugin, YoddaError> {
        let mut state = self.state.write().await;
        let user = state.users.get_mut(email).ok_or_else(|| not_found(email))?;
        if index >= user.plugins.len() {
            return Err(YoddaError::InvalidRequest("Invalid index".to_string()));
        }
        Ok(user.plugins.remove(index))
    }

    async fn create_license(&self, license: License) -> Result<(), YoddaError> {
        let mut state = self.state.write().await;
        if state
            .licenses
            .iter()
            .any(|l| l.license_key == license.license_key)
        {
            return Err(YoddaError::Conflict("License key already issued".to_string()));
        }
        state.licenses.push(license);
        Ok(())
    }

    async fn list_licenses(&self, email: &str) -> Result<Vec<License>, YoddaError> {
        Ok(self
            .state
            .read()
            .await
            .licenses
            .iter()
            .filter(|l| l.email == email)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::PluginKind;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            email: email.to_string(),
            name: None,
            password_hash: "hash".to_string(),
            is_admin: false,
            tier: "FREE".to_string(),
        }
    }

    fn plugin(provider: &str, kind: PluginKind) -> Plugin {
        Plugin {
            provider: Some(provider.to_string()),
            endpoint: None,
            key: format!("{provider}-key"),
            kind,
        }
    }

    #[tokio::test]
    async fn create_user_rejects_duplicate_email() {
        let store = MemoryStore::new();
        store.create_user(new_user("a@x.io")).await.unwrap();
        let err = store.create_user(new_user("a@x.io")).await.unwrap_err();
        assert!(matches!(err, YoddaError::Conflict(_)));
    }

    #[tokio::test]
    async fn only_the_first_admin_is_created() {
        let store = MemoryStore::new();
        let first = store.create_admin_if_none(new_user("root@x.io")).await.unwrap();
        assert!(first.is_admin);

        let err = store
            .create_admin_if_none(new_user("other@x.io"))
            .await
            .unwrap_err();
        assert!(matches!(err, YoddaError::Conflict(_)));
        assert!(store.get_user("other@x.io").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn save_plugin_replaces_same_kind_and_appends() {
        let store = MemoryStore::new();
        store.create_user(new_user("a@x.io")).await.unwrap();

        store
            .save_plugin("a@x.io", plugin("groq", PluginKind::Text))
            .await
            .unwrap();
        store
            .save_plugin("a@x.io", plugin("nvidia", PluginKind::Vision))
            .await
            .unwrap();
        store
            .save_plugin("a@x.io", plugin("google_gemini", PluginKind::Text))
            .await
            .unwrap();

        let user = store.get_user("a@x.io").await.unwrap().unwrap();
        let providers: Vec<_> = user
            .plugins
            .iter()
            .map(|p| p.provider.as_deref().unwrap())
            .collect();
        assert_eq!(providers, vec!["nvidia", "google_gemini"]);
    }

    #[tokio::test]
    async fn compare_and_swap_only_applies_on_expected_value() {
        let store = MemoryStore::new();
        store.create_user(new_user("a@x.io")).await.unwrap();

        assert!(store.compare_and_swap_builds("a@x.io", 0, 1).await.unwrap());
        assert!(!store.compare_and_swap_builds("a@x.io", 0, 1).await.unwrap());
        let user = store.get_user("a@x.io").await.unwrap().unwrap();
        assert_eq!(user.builds_used, 1);

        let err = store
            .compare_and_swap_builds("ghost@x.io", 0, 1)
            .await
            .unwrap_err();
        assert!(matches!(err, YoddaError::UserNotFound(_)));
    }

    #[tokio::test]
    async fn delete_plugin_checks_bounds() {
        let store = MemoryStore::new();
        store.create_user(new_user("a@x.io")).await.unwrap();
        store
            .save_plugin("a@x.io", plugin("groq", PluginKind::Text))
            .await
            .unwrap();

        assert!(matches!(
            store.delete_plugin("a@x.io", 3).await,
            Err(YoddaError::InvalidRequest(_))
        ));
        let removed = store.delete_plugin("a@x.io", 0).await.unwrap();
        assert_eq!(removed.provider.as_deref(), Some("groq"));
    }
}
