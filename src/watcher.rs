//! Change detection across mutation batches.
//!
//! The host page is a single-page app: it swaps DOM subtrees without full
//! reloads, so detection cannot happen once at load time. [`ChangeWatcher`]
//! keeps the last observed URL and destination branch and, on every
//! mutation batch, reports what changed so the controller can invalidate
//! stale verdicts before re-painting.

use crate::context::extract_instance_id;

/// What changed between two consecutive observations.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PageDelta {
    /// The URL differs from the last observation.
    pub navigated: bool,
    /// Instance id of the page navigated away from, when it had one.
    /// Its cache entry must be invalidated.
    pub previous_instance: Option<String>,
    /// The destination branch changed on the current page (only reported
    /// when not navigating). The current instance's cache entry must be
    /// invalidated.
    pub destination_changed: bool,
}

/// Tracks the last observed URL and destination branch.
#[derive(Debug, Default)]
pub struct ChangeWatcher {
    last_url: String,
    last_destination: Option<String>,
}

impl ChangeWatcher {
    /// Watcher that has observed nothing yet; the first observation reports
    /// a navigation from nowhere.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one observation and report the delta since the previous one.
    pub fn observe(&mut self, url: &str, destination: Option<&str>) -> PageDelta {
        let navigated = url != self.last_url;
        let mut delta = PageDelta::default();

        if navigated {
            delta.navigated = true;
            delta.previous_instance = extract_instance_id(&self.last_url);
            self.last_url = url.to_owned();
            self.last_destination = None;
        }

        // A destination edit is only meaningful within the same page; on
        // navigation the destination is expected to differ.
        if !navigated {
            if let Some(dest) = destination {
                if self.last_destination.as_deref() != Some(dest) {
                    delta.destination_changed = true;
                    self.last_destination = Some(dest.to_owned());
                }
            }
        } else if let Some(dest) = destination {
            self.last_destination = Some(dest.to_owned());
        }

        delta
    }

    /// Forget everything observed so far.
    pub fn reset(&mut self) {
        self.last_url.clear();
        self.last_destination = None;
    }
}
