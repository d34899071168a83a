//! Role table configuration schema.
//!
//! A `RoleTableConfig` is deserialized from TOML and lists, per role, the
//! actions that role permits. Labels stay as strings until `validate`, so a
//! typo in a policy file is reported with the offending entry.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use repoguard_contracts::{
    error::{AuthzError, AuthzResult},
    role::{Action, Role, RoleActionMap},
};

/// One `[[roles]]` entry.
///
/// Example in TOML:
/// ```toml
/// [[roles]]
/// role = "writer"
/// actions = ["write", "read"]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleEntry {
    pub role: String,
    pub actions: Vec<String>,
}

/// The top-level structure deserialized from a TOML role table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleTableConfig {
    /// Author-chosen version label, recorded on every decision.
    pub version: String,

    #[serde(default)]
    pub description: Option<String>,

    pub roles: Vec<RoleEntry>,
}

impl RoleTableConfig {
    /// Check the table and convert it to a `RoleActionMap`.
    ///
    /// Rejects an empty version, an empty table, unknown role or action
    /// labels, a role listed twice, and a role with no actions. Roles
    /// absent from the table permit nothing.
    pub fn validate(&self) -> AuthzResult<RoleActionMap> {
        if self.version.trim().is_empty() {
            return Err(config("role table version must not be empty"));
        }
        if self.roles.is_empty() {
            return Err(config("role table lists no roles"));
        }

        let mut seen: BTreeSet<Role> = BTreeSet::new();
        let mut map = RoleActionMap::new();

        for entry in &self.roles {
            let role: Role = entry
                .role
                .parse()
                .map_err(|e: AuthzError| config(format!("roles entry '{}': {}", entry.role, e)))?;
            if !seen.insert(role) {
                return Err(config(format!("role '{}' is listed more than once", role)));
            }
            if entry.actions.is_empty() {
                return Err(config(format!("role '{}' permits no actions", role)));
            }

            let actions = entry
                .actions
                .iter()
                .map(|label| {
                    label
                        .parse::<Action>()
                        .map_err(|e| config(format!("role '{}': {}", role, e)))
                })
                .collect::<AuthzResult<Vec<Action>>>()?;
            map.set(role, actions);
        }

        Ok(map)
    }

    /// The config describing `map` under `version`.
    pub fn from_map(version: &str, map: &RoleActionMap) -> Self {
        Self {
            version: version.to_string(),
            description: None,
            roles: map
                .iter()
                .map(|(role, actions)| RoleEntry {
                    role: role.label().to_string(),
                    actions: actions.iter().map(|a| a.label().to_string()).collect(),
                })
                .collect(),
        }
    }
}

fn config(reason: impl Into<String>) -> AuthzError {
    AuthzError::ConfigError { reason: reason.into() }
}
