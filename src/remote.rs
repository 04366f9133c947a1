//! Remote decision source: the code host's REST API.
//!
//! [`DecisionSource`] is the seam the resolver and the command surface talk
//! through; [`HttpDecisionSource`] implements it against a Bitbucket-style
//! v2 API with Basic credentials read from the settings store. Listings
//! follow the API's `next`-cursor convention until exhausted and return a
//! [`Listing`]: a failure mid-pagination keeps the values of the pages
//! already fetched alongside the stopping error. Every call carries a hard
//! client-side timeout so a stalled network degrades through the caller's
//! fail-open path instead of pending forever.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::GuardConfig;
use crate::context::Context;
use crate::settings::{SettingsKey, SettingsStore};

/// Errors from the remote decision source.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    /// Credentials are not configured; no unauthenticated call was made.
    #[error("credentials not configured")]
    NotConfigured,

    /// Credentials were rejected (HTTP 401).
    #[error("credentials invalid or expired (401)")]
    Unauthorized,

    /// Credentials lack the required scopes (HTTP 403).
    #[error("access refused, check token scopes (403)")]
    Forbidden,

    /// Any other non-success HTTP status.
    #[error("API error: HTTP {0}")]
    HttpStatus(u16),

    /// Transport-level failure (connect, timeout, decode).
    #[error("transport failure: {0}")]
    Transport(#[from] reqwest::Error),

    /// The settings store could not be read for credentials.
    #[error("settings read failed: {0}")]
    Settings(#[from] crate::settings::SettingsError),

    /// The configured API base is not a valid URL.
    #[error("invalid API base URL: {0}")]
    InvalidBaseUrl(#[from] url::ParseError),
}

/// Workspace summary from a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceSummary {
    /// URL slug.
    pub slug: String,
    /// Display name, when the API provides one.
    #[serde(default)]
    pub name: Option<String>,
}

/// Repository summary from a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceSummary {
    /// URL slug.
    pub slug: String,
    /// Display name, when the API provides one.
    #[serde(default)]
    pub name: Option<String>,
}

/// Branch summary from a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefSummary {
    /// Branch name.
    pub name: String,
}

/// Account identity returned by credential validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountProfile {
    /// Human-readable account name (falls back to the account id).
    pub display_name: String,
    /// Stable account identifier.
    pub account_id: String,
}

/// Outcome of a paginated listing.
///
/// Failure never discards work already done: `values` holds everything
/// fetched before the error, and `error` is set when pagination stopped
/// early (including before the first page, on missing credentials).
#[derive(Debug)]
pub struct Listing<T> {
    /// Items fetched so far (partial when `error` is set).
    pub values: Vec<T>,
    /// The failure that stopped pagination, if any.
    pub error: Option<RemoteError>,
}

impl<T> Listing<T> {
    /// Listing that ran to exhaustion without error.
    pub fn complete(values: Vec<T>) -> Self {
        Self {
            values,
            error: None,
        }
    }

    /// Listing that failed before fetching anything.
    pub fn failed(error: RemoteError) -> Self {
        Self {
            values: Vec::new(),
            error: Some(error),
        }
    }
}

/// Read-only view of the code host consulted for authorization decisions.
#[async_trait]
pub trait DecisionSource: Send + Sync {
    /// Destination branch of one pull request, if the API knows it.
    async fn destination(&self, context: &Context) -> Result<Option<String>, RemoteError>;

    /// All workspaces visible to the credentials. Partial on failure.
    async fn list_namespaces(&self) -> Listing<NamespaceSummary>;

    /// All repositories in a workspace. Partial on failure.
    async fn list_resources(&self, namespace: &str) -> Listing<ResourceSummary>;

    /// All branches of a repository. Partial on failure.
    async fn list_refs(&self, namespace: &str, resource: &str) -> Listing<RefSummary>;

    /// Validate the stored credentials against the identity endpoint.
    async fn validate_credentials(&self) -> Result<AccountProfile, RemoteError>;
}

// ---------------------------------------------------------------------------
// Wire types (pub for integration testing)
// ---------------------------------------------------------------------------

/// One page of a paginated listing.
#[doc(hidden)]
#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct Page<T> {
    /// Items on this page.
    #[serde(default)]
    pub values: Vec<T>,
    /// Absolute URL of the next page, absent on the last page.
    #[serde(default)]
    pub next: Option<String>,
}

/// Pull-request body, reduced to the destination branch.
#[doc(hidden)]
#[derive(Debug, Deserialize)]
pub struct PullRequestBody {
    /// Destination half of the pull request.
    #[serde(default)]
    pub destination: Option<PullRequestEndpoint>,
}

/// One endpoint (source or destination) of a pull request.
#[doc(hidden)]
#[derive(Debug, Deserialize)]
pub struct PullRequestEndpoint {
    /// Branch at this endpoint.
    #[serde(default)]
    pub branch: Option<RefSummary>,
}

/// Identity endpoint body.
#[doc(hidden)]
#[derive(Debug, Deserialize)]
pub struct UserBody {
    /// Display name, absent for some account types.
    #[serde(default)]
    pub display_name: Option<String>,
    /// Stable account identifier.
    pub account_id: String,
}

// ---------------------------------------------------------------------------
// HTTP implementation
// ---------------------------------------------------------------------------

/// Basic credentials loaded from the settings store.
#[derive(Clone)]
struct BasicCredentials {
    email: String,
    token: String,
}

/// [`DecisionSource`] backed by the code host's REST API over reqwest.
pub struct HttpDecisionSource {
    client: reqwest::Client,
    config: GuardConfig,
    settings: Arc<dyn SettingsStore>,
}

impl HttpDecisionSource {
    /// Build a client for the given API base and settings store.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::InvalidBaseUrl`] for an unparseable API base,
    /// or [`RemoteError::Transport`] if the underlying HTTP client cannot
    /// be constructed.
    pub fn new(config: GuardConfig, settings: Arc<dyn SettingsStore>) -> Result<Self, RemoteError> {
        url::Url::parse(&config.api_base)?;
        let client = reqwest::Client::builder()
            .timeout(config.remote_timeout)
            .build()?;
        Ok(Self {
            client,
            config,
            settings,
        })
    }

    /// Load credentials, erroring when either half is missing.
    async fn credentials(&self) -> Result<BasicCredentials, RemoteError> {
        let record = self
            .settings
            .get(&[SettingsKey::CredentialEmail, SettingsKey::CredentialToken])
            .await?;
        match (record.credential_email, record.credential_token) {
            (Some(email), Some(token)) if !email.is_empty() && !token.is_empty() => {
                Ok(BasicCredentials { email, token })
            }
            _ => Err(RemoteError::NotConfigured),
        }
    }

    /// Issue an authenticated GET and map non-success statuses.
    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        creds: &BasicCredentials,
    ) -> Result<T, RemoteError> {
        let response = self
            .client
            .get(url)
            .basic_auth(&creds.email, Some(&creds.token))
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;

        match response.status().as_u16() {
            200..=299 => Ok(response.json::<T>().await?),
            401 => Err(RemoteError::Unauthorized),
            403 => Err(RemoteError::Forbidden),
            status => Err(RemoteError::HttpStatus(status)),
        }
    }

    /// Fetch every page of a listing, following `next` cursors.
    ///
    /// A failure on any page stops pagination but returns the values
    /// accumulated from the pages before it.
    async fn fetch_all_pages<T: serde::de::DeserializeOwned>(
        &self,
        first_url: String,
    ) -> Listing<T> {
        let creds = match self.credentials().await {
            Ok(creds) => creds,
            Err(e) => return Listing::failed(e),
        };
        let mut values = Vec::new();
        let mut url = Some(first_url);

        while let Some(current) = url.take() {
            match self.get_json::<Page<T>>(&current, &creds).await {
                Ok(page) => {
                    values.extend(page.values);
                    url = page.next;
                }
                Err(e) => {
                    warn!(error = %e, fetched = values.len(), "pagination stopped early");
                    return Listing {
                        values,
                        error: Some(e),
                    };
                }
            }
        }
        Listing::complete(values)
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.api_base, path)
    }
}

#[async_trait]
impl DecisionSource for HttpDecisionSource {
    async fn destination(&self, context: &Context) -> Result<Option<String>, RemoteError> {
        let creds = self.credentials().await?;
        let url = self.endpoint(&format!(
            "repositories/{}/{}/pullrequests/{}",
            context.namespace_id, context.resource_id, context.instance_id
        ));

        let body: PullRequestBody = self.get_json(&url, &creds).await.inspect_err(|e| {
            warn!(instance = %context.instance_id, error = %e, "destination fetch failed");
        })?;

        Ok(body
            .destination
            .and_then(|d| d.branch)
            .map(|b| b.name))
    }

    async fn list_namespaces(&self) -> Listing<NamespaceSummary> {
        let url = self.endpoint(&format!(
            "workspaces?pagelen={}",
            self.config.namespace_page_len
        ));
        self.fetch_all_pages(url).await
    }

    async fn list_resources(&self, namespace: &str) -> Listing<ResourceSummary> {
        let url = self.endpoint(&format!(
            "repositories/{namespace}?pagelen={}&sort=slug",
            self.config.resource_page_len
        ));
        self.fetch_all_pages(url).await
    }

    async fn list_refs(&self, namespace: &str, resource: &str) -> Listing<RefSummary> {
        let url = self.endpoint(&format!(
            "repositories/{namespace}/{resource}/refs/branches?pagelen={}&sort=name",
            self.config.ref_page_len
        ));
        self.fetch_all_pages(url).await
    }

    async fn validate_credentials(&self) -> Result<AccountProfile, RemoteError> {
        let creds = self.credentials().await?;
        let url = self.endpoint("user");
        let body: UserBody = self.get_json(&url, &creds).await?;

        Ok(AccountProfile {
            display_name: body
                .display_name
                .unwrap_or_else(|| body.account_id.clone()),
            account_id: body.account_id,
        })
    }
}

impl std::fmt::Debug for HttpDecisionSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpDecisionSource")
            .field("api_base", &self.config.api_base)
            .finish_non_exhaustive()
    }
}
