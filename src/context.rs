//! Pull-request context extraction from the page location.
//!
//! A [`Context`] identifies which pull request the current page shows. It is
//! a transient value object: recomputed from the location string on every
//! call, never persisted, and compared only by its fields.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Identifiers for the pull request the current page is showing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Context {
    /// Workspace (namespace) segment of the URL.
    pub namespace_id: String,
    /// Repository (resource) segment of the URL.
    pub resource_id: String,
    /// Numeric pull-request identifier, kept as a string (cache key).
    pub instance_id: String,
    /// `"{namespace_id}/{resource_id}"` — the policy-map key.
    pub full_resource_key: String,
}

/// Matches `<host>/<workspace>/<repo>/pull-requests/<digits>` anywhere in the
/// location string. Query strings and fragments after the id are ignored.
fn pull_request_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"bitbucket\.org/([^/]+)/([^/]+)/pull-requests/(\d+)")
            .expect("pull-request pattern is a valid regex")
    })
}

/// Derive a [`Context`] from the current location URL.
///
/// Returns `None` when the URL does not look like a pull-request page.
/// Callers must treat `None` as "nothing to guard here", never as a failure.
pub fn extract_context(location_url: &str) -> Option<Context> {
    let captures = pull_request_pattern().captures(location_url)?;
    let namespace_id = captures.get(1)?.as_str().to_owned();
    let resource_id = captures.get(2)?.as_str().to_owned();
    let instance_id = captures.get(3)?.as_str().to_owned();
    let full_resource_key = format!("{namespace_id}/{resource_id}");

    Some(Context {
        namespace_id,
        resource_id,
        instance_id,
        full_resource_key,
    })
}

/// Extract only the instance id from a location URL.
///
/// Used by the change watcher to invalidate the cache entry of the page we
/// are navigating away from, where the full context is not needed.
pub fn extract_instance_id(location_url: &str) -> Option<String> {
    extract_context(location_url).map(|ctx| ctx.instance_id)
}
