//! Dummy license issuance for registrations and subscriptions.

use chrono::Utc;
use tracing::info;

use crate::build::new_build_id;
use crate::error::YoddaError;
use crate::store::{License, UserStore};

pub const LICENSE_STATUS_ACTIVE: &str = "active";

/// `YP-{TIER}-{8 uppercase hex}`.
pub fn license_key(tier: &str) -> String {
    format!("YP-{tier}-{}", new_build_id().to_uppercase())
}

/// Creates and stores an active license for `email`.
pub async fn issue_license(
    store: &dyn UserStore,
    email: &str,
    tier: &str,
    lifetime: bool,
) -> Result<License, YoddaError> {
    let license = License {
        license_key: license_key(tier),
        email: email.to_string(),
        tier: tier.to_string(),
        status: LICENSE_STATUS_ACTIVE.to_string(),
        lifetime,
        created_at: Utc::now(),
    };
    store.create_license(license.clone()).await?;
    info!(email, tier, license_key = %license.license_key, lifetime, "License issued");
    Ok(license)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn license_key_format() {
        let key = license_key("PRO");
        let suffix = key.strip_prefix("YP-PRO-").unwrap();
        assert_eq!(suffix.len(), 8);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_lowercase()));
    }

    #[tokio::test]
    async fn issued_license_is_listed_for_owner() {
        let store = MemoryStore::new();
        let license = issue_license(&store, "a@x.io", "FREE", false).await.unwrap();

        let listed = store.list_licenses("a@x.io").await.unwrap();
        assert_eq!(listed, vec![license]);
        assert!(store.list_licenses("b@x.io").await.unwrap().is_empty());
    }
}
