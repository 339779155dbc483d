//! Tier-based build quota with per-user serialized reserve/commit.
//!
//! A build first takes a [`QuotaReservation`] (admission check plus an
//! in-flight slot), performs the slow upstream work without any lock, and
//! only then commits, which bumps `builds_used` by exactly one. Dropping an
//! uncommitted reservation hands the slot back untouched.

use ahash::AHashMap;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, warn};

use crate::config::{QuotaConfig, TierSpec};
use crate::error::YoddaError;
use crate::store::UserStore;

const COMMIT_CAS_ATTEMPTS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildLimit {
    Limited(u32),
    Unlimited,
}

/// Builds left after a commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Remaining {
    Count(u32),
    Unlimited,
}

impl Serialize for Remaining {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Remaining::Count(n) => serializer.serialize_u32(*n),
            Remaining::Unlimited => serializer.serialize_str("unlimited"),
        }
    }
}

/// Read-only view of the configured tiers.
#[derive(Debug, Clone)]
pub struct TierTable {
    tiers: BTreeMap<String, TierSpec>,
}

impl TierTable {
    pub fn new(cfg: &QuotaConfig) -> Self {
        Self {
            tiers: cfg.tiers.clone(),
        }
    }

    pub fn get(&self, tier: &str) -> Option<&TierSpec> {
        self.tiers.get(tier)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TierSpec)> {
        self.tiers.iter().map(|(name, spec)| (name.as_str(), spec))
    }

    pub fn limit(&self, tier: &str) -> Result<BuildLimit, YoddaError> {
        let spec = self
            .get(tier)
            .ok_or_else(|| YoddaError::UnknownTier(tier.to_string()))?;
        Ok(match u32::try_from(spec.builds) {
            Ok(n) => BuildLimit::Limited(n),
            Err(_) if spec.builds < 0 => BuildLimit::Unlimited,
            Err(_) => BuildLimit::Limited(u32::MAX),
        })
    }

    pub fn remaining(&self, tier: &str, used: u32) -> Result<Remaining, YoddaError> {
        Ok(match self.limit(tier)? {
            BuildLimit::Limited(limit) => Remaining::Count(limit.saturating_sub(used)),
            BuildLimit::Unlimited => Remaining::Unlimited,
        })
    }
}

#[derive(Default)]
struct UserSlot {
    lock: tokio::sync::Mutex<()>,
    in_flight: AtomicU32,
}

struct GateInner {
    store: Arc<dyn UserStore>,
    tiers: TierTable,
    slots: Mutex<AHashMap<String, Arc<UserSlot>>>,
}

/// Admission control for builds. Cheap to clone.
#[derive(Clone)]
pub struct QuotaGate {
    inner: Arc<GateInner>,
}

impl QuotaGate {
    pub fn new(store: Arc<dyn UserStore>, tiers: TierTable) -> Self {
        Self {
            inner: Arc::new(GateInner {
                store,
                tiers,
                slots: Mutex::new(AHashMap::new()),
            }),
        }
    }

    pub fn tiers(&self) -> &TierTable {
        &self.inner.tiers
    }

    fn slot(&self, email: &str) -> Arc<UserSlot> {
        let mut slots = self
            .inner
            .slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        slots.entry(email.to_string()).or_default().clone()
    }

    /// Removes the entry for `email` once only the map and `slot` refer to it.
    fn forget_if_idle(&self, email: &str, slot: &Arc<UserSlot>) {
        let mut slots = self
            .inner
            .slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let idle = slots.get(email).is_some_and(|held| Arc::ptr_eq(held, slot))
            && Arc::strong_count(slot) == 2
            && slot.in_flight.load(Ordering::Acquire) == 0;
        if idle {
            slots.remove(email);
        }
    }

    /// Admits one build for `email` or rejects it without mutating anything.
    pub async fn reserve(&self, email: &str) -> Result<QuotaReservation, YoddaError> {
        let slot = self.slot(email);
        let admitted = self.admit(&slot, email).await;
        if admitted.is_err() {
            self.forget_if_idle(email, &slot);
        }
        admitted
    }

    async fn admit(
        &self,
        slot: &Arc<UserSlot>,
        email: &str,
    ) -> Result<QuotaReservation, YoddaError> {
        let _guard = slot.lock.lock().await;

        let user = self
            .inner
            .store
            .get_user(email)
            .await?
            .ok_or_else(|| YoddaError::UserNotFound(format!("User '{email}' not found")))?;
        let limit = self.inner.tiers.limit(&user.tier)?;
        let in_flight = slot.in_flight.load(Ordering::Acquire);

        if let BuildLimit::Limited(limit) = limit {
            if user.builds_used.saturating_add(in_flight) < limit {
                slot.in_flight.fetch_add(1, Ordering::AcqRel);
                debug!(email, tier = %user.tier, used = user.builds_used, "Quota reserved");
                return Ok(self.reservation(slot.clone(), email));
            }
            debug!(
                email,
                tier = %user.tier,
                used = user.builds_used,
                in_flight,
                limit,
                "Quota rejected build"
            );
            return Err(YoddaError::QuotaExceeded {
                tier: user.tier,
                used: user.builds_used,
                limit,
            });
        }

        slot.in_flight.fetch_add(1, Ordering::AcqRel);
        debug!(email, tier = %user.tier, used = user.builds_used, "Quota reserved (unlimited)");
        Ok(self.reservation(slot.clone(), email))
    }

    fn reservation(&self, slot: Arc<UserSlot>, email: &str) -> QuotaReservation {
        QuotaReservation {
            gate: self.clone(),
            slot,
            email: email.to_string(),
            released: false,
        }
    }
}

/// An admitted, not yet counted build.
pub struct QuotaReservation {
    gate: QuotaGate,
    slot: Arc<UserSlot>,
    email: String,
    released: bool,
}

impl QuotaReservation {
    /// Counts the build: `builds_used` goes up by exactly one.
    pub async fn commit(mut self) -> Result<Remaining, YoddaError> {
        let slot = self.slot.clone();
        let _guard = slot.lock.lock().await;
        let inner = self.gate.inner.clone();

        for attempt in 1..=COMMIT_CAS_ATTEMPTS {
            let user = inner
                .store
                .get_user(&self.email)
                .await?
                .ok_or_else(|| YoddaError::UserNotFound(format!("User '{}' not found", self.email)))?;
            let new = user.builds_used.checked_add(1).ok_or_else(|| {
                YoddaError::UnexpectedError(format!("builds_used overflow for '{}'", self.email))
            })?;

            if inner
                .store
                .compare_and_swap_builds(&self.email, user.builds_used, new)
                .await?
            {
                self.release();
                let remaining = inner.tiers.remaining(&user.tier, new)?;
                debug!(email = %self.email, used = new, ?remaining, "Quota committed");
                return Ok(remaining);
            }
            warn!(email = %self.email, attempt, "builds_used changed during commit, retrying");
        }

        Err(YoddaError::UnexpectedError(format!(
            "could not commit build for '{}': builds_used kept changing",
            self.email
        )))
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.slot.in_flight.fetch_sub(1, Ordering::AcqRel);
        }
    }
}

impl Drop for QuotaReservation {
    fn drop(&mut self) {
        self.release();
        self.gate.forget_if_idle(&self.email, &self.slot);
    }
}
