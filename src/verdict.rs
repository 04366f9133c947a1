//! Authorization verdicts and the per-pull-request verdict cache.
//!
//! A [`Verdict`] answers "may this merge proceed as-is?" for one pull
//! request at one point in time. Verdicts are cached per instance id with a
//! fixed TTL so re-renders do not hammer the remote API; the cache is
//! process-local and rebuilt from nothing on restart.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::policy::PolicyCheck;

/// How long a cached verdict stays fresh.
pub const CACHE_TTL: Duration = Duration::from_millis(30_000);

/// The authorization decision for one pull request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    /// Destination branch the decision was computed against, when known.
    pub destination: Option<String>,
    /// Whether the merge may proceed without confirmation.
    pub allowed: bool,
    /// The configured allowed list, when a rule exists.
    pub allowed_set: Option<Vec<String>>,
    /// `true` when no information was available (no destination, no rule,
    /// or upstream failure) — always paired with `allowed = true`.
    pub no_info: bool,
    /// When the verdict was computed (drives cache freshness).
    pub computed_at: Instant,
}

impl Verdict {
    /// Fail-open verdict: allowed, flagged as carrying no information.
    pub fn fail_open(destination: Option<String>) -> Self {
        Self {
            destination,
            allowed: true,
            allowed_set: None,
            no_info: true,
            computed_at: Instant::now(),
        }
    }

    /// Verdict from a policy check against a known destination.
    ///
    /// Upholds the invariants: an absent/empty rule yields an allowing
    /// verdict with `no_info` set; otherwise `allowed` mirrors set
    /// membership and `no_info` is clear.
    pub fn from_policy(destination: String, check: PolicyCheck) -> Self {
        if check.no_rules {
            return Self::fail_open(Some(destination));
        }
        Self {
            destination: Some(destination),
            allowed: check.allowed,
            allowed_set: Some(check.allowed_destinations),
            no_info: false,
            computed_at: Instant::now(),
        }
    }

    /// Whether the merge may proceed without user confirmation.
    pub fn is_allowing(&self) -> bool {
        self.allowed || self.no_info
    }
}

/// TTL'd verdict cache keyed by pull-request instance id.
///
/// Uses a sync [`Mutex`] since the critical sections are brief (no awaits).
#[derive(Debug, Default)]
pub struct VerdictCache {
    entries: Mutex<HashMap<String, Verdict>>,
}

impl VerdictCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached verdict for an instance id if still fresh.
    ///
    /// Expiry is lazy: a stale entry is removed here, on read. There is no
    /// background sweep.
    pub fn fresh(&self, instance_id: &str) -> Option<Verdict> {
        let mut entries = self.entries.lock().ok()?;
        match entries.get(instance_id) {
            Some(v) if v.computed_at.elapsed() < CACHE_TTL => Some(v.clone()),
            Some(_) => {
                entries.remove(instance_id);
                None
            }
            None => None,
        }
    }

    /// Store a verdict for an instance id.
    pub fn insert(&self, instance_id: &str, verdict: Verdict) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(instance_id.to_owned(), verdict);
        }
    }

    /// Drop the entry for an instance id, if any.
    pub fn invalidate(&self, instance_id: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.remove(instance_id);
        }
    }

    /// Drop every entry.
    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }

    /// Access the underlying entry map (for testing expiry manipulation).
    ///
    /// Returns a `MutexGuard` wrapped in `Result`.
    pub fn entries_mut(&self) -> Result<MutexGuard<'_, HashMap<String, Verdict>>, String> {
        self.entries.lock().map_err(|e| format!("lock poisoned: {e}"))
    }
}
