//! Engine configuration.

use std::time::Duration;

/// Tunables for the guard engine and its remote API client.
///
/// Constructed programmatically by the embedding host; there is no config
/// file. [`Default`] matches the Bitbucket Cloud v2 API.
#[derive(Debug, Clone)]
pub struct GuardConfig {
    /// Base URL of the remote decision API, without a trailing slash.
    pub api_base: String,
    /// Hard deadline for any single remote call. A call that exceeds it
    /// degrades through the fail-open path instead of pending forever.
    pub remote_timeout: Duration,
    /// Page size for workspace listings.
    pub namespace_page_len: u32,
    /// Page size for repository listings.
    pub resource_page_len: u32,
    /// Page size for branch listings.
    pub ref_page_len: u32,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.bitbucket.org/2.0".to_owned(),
            remote_timeout: Duration::from_secs(10),
            namespace_page_len: 50,
            resource_page_len: 100,
            ref_page_len: 100,
        }
    }
}
