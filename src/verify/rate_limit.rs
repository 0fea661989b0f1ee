//! Per-identity fixed-window admission control.
//!
//! Windows live in a [`WindowStore`]. The bundled [`MemoryWindowStore`] is
//! process-local, so limits become per-instance when several verifier
//! processes run side by side without a shared store.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Default number of calls admitted per window.
pub const DEFAULT_LIMIT: u32 = 10;

/// Default window length.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

/// Window state for one identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitEntry {
    /// Identity the window belongs to.
    pub identity: String,
    /// Calls admitted in the current window.
    pub window_count: u32,
    /// When the window expires.
    pub window_reset_at: Instant,
}

/// Decision for one call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The call may proceed.
    Admitted,
    /// The window is full.
    Rejected {
        /// Time until the window resets.
        retry_after: Duration,
    },
}

impl Admission {
    /// True if the call may proceed.
    #[must_use]
    pub fn is_admitted(&self) -> bool {
        matches!(self, Self::Admitted)
    }
}

/// Storage for rate-limit windows.
///
/// `with_entry` must run the closure atomically with respect to other calls
/// for the same identity. `None` in the slot means no window exists; leaving
/// `None` after the closure removes the entry.
pub trait WindowStore: Send + Sync {
    /// Apply `f` to the window slot of `identity`.
    fn with_entry(
        &self,
        identity: &str,
        f: &mut dyn FnMut(&mut Option<RateLimitEntry>) -> Admission,
    ) -> Admission;

    /// Drop windows that expired before `now`. Returns how many were removed.
    fn prune(&self, now: Instant) -> usize;

    /// Number of tracked identities.
    fn len(&self) -> usize;

    /// True if no identity is tracked.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-process window table.
#[derive(Default)]
pub struct MemoryWindowStore {
    entries: Mutex<HashMap<String, RateLimitEntry>>,
}

impl MemoryWindowStore {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl WindowStore for MemoryWindowStore {
    fn with_entry(
        &self,
        identity: &str,
        f: &mut dyn FnMut(&mut Option<RateLimitEntry>) -> Admission,
    ) -> Admission {
        let mut entries = self.entries.lock();
        let mut slot = entries.remove(identity);
        let admission = f(&mut slot);
        if let Some(entry) = slot {
            entries.insert(identity.to_string(), entry);
        }
        admission
    }

    fn prune(&self, now: Instant) -> usize {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, entry| now <= entry.window_reset_at);
        before - entries.len()
    }

    fn len(&self) -> usize {
        self.entries.lock().len()
    }
}

/// Fixed-window rate limiter keyed by identity.
#[derive(Clone)]
pub struct RateLimiter {
    limit: u32,
    window: Duration,
    store: Arc<dyn WindowStore>,
}

impl RateLimiter {
    /// Create a limiter backed by an in-process table.
    #[must_use]
    pub fn new(limit: u32, window: Duration) -> Self {
        Self::with_store(limit, window, Arc::new(MemoryWindowStore::new()))
    }

    /// Create a limiter backed by the given store.
    #[must_use]
    pub fn with_store(limit: u32, window: Duration, store: Arc<dyn WindowStore>) -> Self {
        Self {
            limit,
            window,
            store,
        }
    }

    /// Admit or reject a call for `identity` now.
    pub fn admit(&self, identity: &str) -> bool {
        self.check(identity).is_admitted()
    }

    /// Admit or reject a call for `identity` now, with the retry hint.
    pub fn check(&self, identity: &str) -> Admission {
        self.check_at(identity, Instant::now())
    }

    /// Admit or reject a call for `identity` at `now`.
    pub fn check_at(&self, identity: &str, now: Instant) -> Admission {
        let limit = self.limit;
        let window = self.window;

        self.store.with_entry(identity, &mut |slot| match slot {
            Some(entry) if now <= entry.window_reset_at => {
                if entry.window_count >= limit {
                    debug!("Rate limit hit for {}", entry.identity);
                    Admission::Rejected {
                        retry_after: entry.window_reset_at.saturating_duration_since(now),
                    }
                } else {
                    entry.window_count += 1;
                    Admission::Admitted
                }
            }
            _ => {
                *slot = Some(RateLimitEntry {
                    identity: identity.to_string(),
                    window_count: 1,
                    window_reset_at: now + window,
                });
                Admission::Admitted
            }
        })
    }

    /// Drop expired windows.
    pub fn prune(&self) -> usize {
        self.store.prune(Instant::now())
    }

    /// Calls admitted per window.
    #[must_use]
    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Window length.
    #[must_use]
    pub fn window(&self) -> Duration {
        self.window
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_LIMIT, DEFAULT_WINDOW)
    }
}
