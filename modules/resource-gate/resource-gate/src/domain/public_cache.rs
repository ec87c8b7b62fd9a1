//! Public-role grant cache with single-flight population.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use resource_gate_sdk::Grants;
use tokio::sync::Mutex;

/// Lazily populated, TTL-bound cache of the anonymous role's grants.
///
/// Reads take a sync lock and never await. Population is single-flight: even
/// under concurrent callers the fetch runs at most once per expiry, and callers
/// that queued behind it observe its outcome. A failed fetch yields empty
/// grants and leaves nothing cached, so the next caller simply refetches.
pub struct PublicPermissionCache {
    ttl: Duration,
    state: RwLock<CacheState>,
    /// Held across the fetch only; no other I/O happens under it.
    populate_lock: Mutex<()>,
}

#[derive(Default)]
struct CacheState {
    grants: Option<Arc<Grants>>,
    fetched_at: Option<Instant>,
    /// Bumped after every completed fetch attempt, successful or not.
    epoch: u64,
    last_failed: bool,
}

impl CacheState {
    fn fresh(&self, now: Instant, ttl: Duration) -> Option<Arc<Grants>> {
        let grants = self.grants.as_ref()?;
        let at = self.fetched_at?;
        // a clock reading earlier than the fetch counts as fresh
        now.checked_duration_since(at)
            .is_none_or(|age| age < ttl)
            .then(|| Arc::clone(grants))
    }
}

impl PublicPermissionCache {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            state: RwLock::new(CacheState::default()),
            populate_lock: Mutex::new(()),
        }
    }

    /// Cached grants if still valid at `now`.
    #[must_use]
    pub fn get(&self, now: Instant) -> Option<Arc<Grants>> {
        self.state.read().fresh(now, self.ttl)
    }

    /// Returns cached grants, or populates them with `fetch`.
    ///
    /// A populated entry is stamped with `now` plus the time spent waiting
    /// for and running the fetch, so its lifetime starts when it arrived.
    /// Never fails: a fetch error is logged and treated as "no public grants".
    pub async fn get_or_populate<F, Fut>(&self, now: Instant, fetch: F) -> Arc<Grants>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<Grants>>,
    {
        let started = Instant::now();

        // Fast path
        if let Some(grants) = self.get(now) {
            return grants;
        }
        let observed_epoch = self.state.read().epoch;

        let _populate_guard = self.populate_lock.lock().await;

        // Re-check: a concurrent caller may have finished a fetch while we waited
        {
            let state = self.state.read();
            if let Some(grants) = state.fresh(now, self.ttl) {
                return grants;
            }
            if state.epoch != observed_epoch && state.last_failed {
                return Arc::new(Grants::new());
            }
        }

        // If this future is dropped here the guard is released and the state is untouched
        let outcome = fetch().await;

        let mut state = self.state.write();
        state.epoch = state.epoch.wrapping_add(1);
        match outcome {
            Ok(grants) => {
                let grants = Arc::new(grants);
                state.grants = Some(Arc::clone(&grants));
                state.fetched_at = Some(now + started.elapsed());
                state.last_failed = false;
                tracing::debug!(
                    resources = grants.resources().count(),
                    "Public grants refreshed"
                );
                grants
            }
            Err(e) => {
                state.last_failed = true;
                tracing::warn!(error = %e, "Failed to fetch public grants; treating as none");
                Arc::new(Grants::new())
            }
        }
    }
}
