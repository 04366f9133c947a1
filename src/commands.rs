//! Request/response command surface for the settings UI.
//!
//! The settings UI talks to the engine through serialized [`Command`]s and
//! gets a [`CommandReply`] back. Errors never cross this boundary as `Err`:
//! each reply shape carries its own optional error text, and listings keep
//! whatever partial `values` were fetched before the failure. This is the
//! only place raw error text is allowed to reach the user.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::context::Context;
use crate::policy::{self, PolicyCheck};
use crate::remote::{DecisionSource, NamespaceSummary, RefSummary, RemoteError, ResourceSummary};
use crate::settings::{SettingsKey, SettingsStore};

/// A request from the settings UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Command {
    /// Destination branch of one pull request, via the API.
    GetDestinationAttribute {
        /// Which pull request.
        context: Context,
    },
    /// Check a destination against the stored policy for a repository.
    CheckPolicy {
        /// `"workspace/repo"` policy key.
        resource_key: String,
        /// Candidate destination branch.
        destination: String,
    },
    /// Validate the stored credentials against the identity endpoint.
    ValidateCredentials,
    /// List workspaces visible to the credentials.
    ListNamespaces,
    /// List repositories in a workspace.
    ListResources {
        /// Workspace slug.
        namespace: String,
    },
    /// List branches of a repository.
    ListRefs {
        /// Workspace slug.
        namespace: String,
        /// Repository slug.
        resource: String,
    },
}

/// A reply to a [`Command`]. Failure is data, never an `Err`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum CommandReply {
    /// Reply to [`Command::GetDestinationAttribute`].
    Destination {
        /// The destination branch, when the API knew it.
        destination: Option<String>,
        /// Error text, when the fetch failed.
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    /// Reply to [`Command::CheckPolicy`].
    PolicyCheck(PolicyCheck),
    /// Reply to [`Command::ValidateCredentials`].
    Credentials {
        /// Whether the credentials were accepted.
        valid: bool,
        /// Account display name, on success.
        #[serde(skip_serializing_if = "Option::is_none")]
        display_name: Option<String>,
        /// Stable account id, on success.
        #[serde(skip_serializing_if = "Option::is_none")]
        account_id: Option<String>,
        /// Error text, on failure.
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    /// Reply to [`Command::ListNamespaces`].
    Namespaces {
        /// Workspaces fetched (possibly partial on error).
        values: Vec<NamespaceSummary>,
        /// Error text, when fetching stopped early.
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    /// Reply to [`Command::ListResources`].
    Resources {
        /// Repositories fetched (possibly partial on error).
        values: Vec<ResourceSummary>,
        /// Error text, when fetching stopped early.
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    /// Reply to [`Command::ListRefs`].
    Refs {
        /// Branches fetched (possibly partial on error).
        values: Vec<RefSummary>,
        /// Error text, when fetching stopped early.
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}

/// Dispatches settings-UI commands to the store and the decision source.
pub struct CommandSurface {
    source: Arc<dyn DecisionSource>,
    settings: Arc<dyn SettingsStore>,
}

impl CommandSurface {
    /// Build a surface over the given collaborators.
    pub fn new(source: Arc<dyn DecisionSource>, settings: Arc<dyn SettingsStore>) -> Self {
        Self { source, settings }
    }

    /// Handle one command. Infallible: failures come back inside the reply.
    pub async fn handle(&self, command: Command) -> CommandReply {
        match command {
            Command::GetDestinationAttribute { context } => {
                match self.source.destination(&context).await {
                    Ok(destination) => CommandReply::Destination {
                        destination,
                        error: None,
                    },
                    Err(e) => CommandReply::Destination {
                        destination: None,
                        error: Some(e.to_string()),
                    },
                }
            }

            Command::CheckPolicy {
                resource_key,
                destination,
            } => {
                let policy_map = match self.settings.get(&[SettingsKey::PolicyMap]).await {
                    Ok(record) => record.policy_map.unwrap_or_default(),
                    // An unreadable store is the same as no rules: fail open.
                    Err(_) => Default::default(),
                };
                CommandReply::PolicyCheck(policy::check_destination(
                    &policy_map,
                    &resource_key,
                    &destination,
                ))
            }

            Command::ValidateCredentials => match self.source.validate_credentials().await {
                Ok(profile) => CommandReply::Credentials {
                    valid: true,
                    display_name: Some(profile.display_name),
                    account_id: Some(profile.account_id),
                    error: None,
                },
                Err(e) => CommandReply::Credentials {
                    valid: false,
                    display_name: None,
                    account_id: None,
                    error: Some(credential_error_text(&e)),
                },
            },

            Command::ListNamespaces => {
                let listing = self.source.list_namespaces().await;
                CommandReply::Namespaces {
                    values: listing.values,
                    error: listing.error.map(|e| e.to_string()),
                }
            }

            Command::ListResources { namespace } => {
                let listing = self.source.list_resources(&namespace).await;
                CommandReply::Resources {
                    values: listing.values,
                    error: listing.error.map(|e| e.to_string()),
                }
            }

            Command::ListRefs {
                namespace,
                resource,
            } => {
                let listing = self.source.list_refs(&namespace, &resource).await;
                CommandReply::Refs {
                    values: listing.values,
                    error: listing.error.map(|e| e.to_string()),
                }
            }
        }
    }
}

/// Credential-validation error text, distinguishing the auth cases the
/// options page renders differently.
fn credential_error_text(error: &RemoteError) -> String {
    match error {
        RemoteError::NotConfigured => "email and token required".to_owned(),
        other => other.to_string(),
    }
}

impl std::fmt::Debug for CommandSurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandSurface").finish_non_exhaustive()
    }
}
