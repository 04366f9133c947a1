//! Per-repository destination-branch policy.
//!
//! The policy map lives in the settings store and is owned by the settings
//! UI; this module only reads it. A missing or empty allowed list means "no
//! rule configured", which is deliberately distinct from "denied" — absence
//! of policy never blocks anyone.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// `"workspace/repo"` → ordered list of allowed destination branches.
pub type PolicyMap = BTreeMap<String, Vec<String>>;

/// Outcome of checking a destination branch against the policy map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyCheck {
    /// Whether the destination is permitted.
    pub allowed: bool,
    /// `true` when no rule is configured for the repository.
    pub no_rules: bool,
    /// The configured allowed list (empty when `no_rules`).
    pub allowed_destinations: Vec<String>,
}

/// Check a destination branch against the policy for one repository.
///
/// No entry or an empty entry yields `allowed = true, no_rules = true`; a
/// non-empty entry yields `allowed = list contains destination`.
pub fn check_destination(policy: &PolicyMap, resource_key: &str, destination: &str) -> PolicyCheck {
    let allowed_destinations = policy.get(resource_key).cloned().unwrap_or_default();

    if allowed_destinations.is_empty() {
        return PolicyCheck {
            allowed: true,
            no_rules: true,
            allowed_destinations,
        };
    }

    PolicyCheck {
        allowed: allowed_destinations.iter().any(|b| b == destination),
        no_rules: false,
        allowed_destinations,
    }
}

/// Normalize a policy map before persisting it.
///
/// Trims branch names, suppresses duplicates while keeping user entry order,
/// and drops repositories whose list ends up empty.
pub fn normalize(policy: PolicyMap) -> PolicyMap {
    policy
        .into_iter()
        .filter_map(|(repo, branches)| {
            let mut seen = Vec::new();
            for branch in branches {
                let trimmed = branch.trim().to_owned();
                if !trimmed.is_empty() && !seen.contains(&trimmed) {
                    seen.push(trimmed);
                }
            }
            (!seen.is_empty()).then_some((repo, seen))
        })
        .collect()
}
