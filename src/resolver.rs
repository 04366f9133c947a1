//! Verdict resolution: cache, then live page, then remote API, then policy.
//!
//! [`PolicyResolver::resolve`] is infallible by contract — every failure
//! path collapses into a fail-open [`Verdict`]. A broken token, a dead
//! network or a missing rule must be invisible to the user, never
//! obstructive; the only hard "no" this engine ever produces is an explicit
//! policy deny.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::attribute::AttributeReader;
use crate::context::Context;
use crate::page::PageModel;
use crate::policy;
use crate::remote::DecisionSource;
use crate::settings::{SettingsKey, SettingsStore};
use crate::verdict::{Verdict, VerdictCache};

/// Resolves and caches authorization verdicts for pull requests.
pub struct PolicyResolver {
    cache: VerdictCache,
    reader: AttributeReader,
    source: Arc<dyn DecisionSource>,
    settings: Arc<dyn SettingsStore>,
}

impl PolicyResolver {
    /// Build a resolver over the given collaborators.
    pub fn new(
        reader: AttributeReader,
        source: Arc<dyn DecisionSource>,
        settings: Arc<dyn SettingsStore>,
    ) -> Self {
        Self {
            cache: VerdictCache::new(),
            reader,
            source,
            settings,
        }
    }

    /// The verdict cache, shared with the change watcher for invalidation.
    pub fn cache(&self) -> &VerdictCache {
        &self.cache
    }

    /// The attribute reader, shared with the change watcher for detection.
    pub fn reader(&self) -> &AttributeReader {
        &self.reader
    }

    /// Resolve the verdict for one pull request.
    ///
    /// Order: fresh cache entry → live destination from the page, falling
    /// back to the remote API → policy lookup. Returns a fail-open verdict
    /// (and caches nothing) when no destination can be determined; caches
    /// the result keyed by instance id otherwise.
    pub async fn resolve(&self, context: &Context, page: &PageModel) -> Verdict {
        if let Some(cached) = self.cache.fresh(&context.instance_id) {
            return cached;
        }

        let Some(destination) = self.destination(context, page).await else {
            // No destination to key correctness on: fail open, uncached.
            return Verdict::fail_open(None);
        };

        let policy_map = match self.settings.get(&[SettingsKey::PolicyMap]).await {
            Ok(record) => record.policy_map.unwrap_or_default(),
            Err(e) => {
                warn!(error = %e, "policy read failed, proceeding");
                return Verdict::fail_open(Some(destination));
            }
        };

        let check = policy::check_destination(&policy_map, &context.full_resource_key, &destination);
        let verdict = Verdict::from_policy(destination, check);
        self.cache.insert(&context.instance_id, verdict.clone());
        verdict
    }

    /// Destination branch: live page value first, remote API second.
    async fn destination(&self, context: &Context, page: &PageModel) -> Option<String> {
        if let Some(branch) = self.reader.read(page) {
            return Some(branch);
        }

        match self.source.destination(context).await {
            Ok(found) => {
                debug!(instance = %context.instance_id, ?found, "destination from API");
                found
            }
            Err(e) => {
                warn!(error = %e, "destination fetch failed, proceeding");
                None
            }
        }
    }
}

impl std::fmt::Debug for PolicyResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicyResolver")
            .field("reader", &self.reader)
            .finish_non_exhaustive()
    }
}
