//! Role→action decision engine.
//!
//! `RoleActionPolicy` holds a validated, versioned role table and implements
//! the `DecisionPolicy` trait from repoguard-core.
//!
//! Decision algorithm:
//!
//! 1. Walk the relevant assignments in the order given.
//! 2. The first assignment whose role permits the action justifies `Allow`.
//! 3. Otherwise `Deny`. There is no explicit deny; absence is deny.

use std::path::Path;

use sha2::{Digest, Sha256};
use tracing::debug;

use repoguard_contracts::{
    error::{AuthzError, AuthzResult},
    request::Verdict,
    role::{Action, RoleActionMap, RoleAssignment},
};
use repoguard_core::traits::DecisionPolicy;

use crate::table::RoleTableConfig;

/// Version label of the built-in table.
pub const STANDARD_VERSION: &str = "standard-1";

/// A `DecisionPolicy` backed by a role table.
///
/// ```rust,ignore
/// use repoguard_policy::RoleActionPolicy;
///
/// let policy = RoleActionPolicy::from_file(Path::new("policies/standard.toml"))?;
/// ```
#[derive(Debug, Clone)]
pub struct RoleActionPolicy {
    name: String,
    table: RoleActionMap,
    fingerprint: String,
    label: String,
}

impl RoleActionPolicy {
    /// Build a policy from an already-typed table.
    ///
    /// Returns `ConfigError` for an empty version or an empty table.
    pub fn new(version: &str, table: RoleActionMap) -> AuthzResult<Self> {
        if version.trim().is_empty() {
            return Err(AuthzError::ConfigError {
                reason: "role table version must not be empty".to_string(),
            });
        }
        if table.is_empty() {
            return Err(AuthzError::ConfigError {
                reason: "role table lists no roles".to_string(),
            });
        }

        let fingerprint = fingerprint(&table)?;
        let label = format!("{}+{}", version, &fingerprint[..12]);
        debug!(version = %version, fingerprint = %fingerprint, "role table loaded");

        Ok(Self {
            name: version.to_string(),
            table,
            fingerprint,
            label,
        })
    }

    /// The built-in forge table: owner ⊃ writer ⊃ reader.
    pub fn standard() -> Self {
        let table = RoleActionMap::standard();
        let fingerprint = fingerprint(&table).unwrap_or_default();
        let label = format!("{}+{}", STANDARD_VERSION, fingerprint.get(..12).unwrap_or(""));
        Self {
            name: STANDARD_VERSION.to_string(),
            table,
            fingerprint,
            label,
        }
    }

    /// Parse `s` as a TOML role table.
    ///
    /// Returns `ConfigError` if the TOML is malformed or the table is invalid.
    pub fn from_toml_str(s: &str) -> AuthzResult<Self> {
        let config: RoleTableConfig = toml::from_str(s).map_err(|e| AuthzError::ConfigError {
            reason: format!("failed to parse role table TOML: {}", e),
        })?;
        let table = config.validate()?;
        Self::new(&config.version, table)
    }

    /// Read the file at `path` and parse it as a TOML role table.
    pub fn from_file(path: &Path) -> AuthzResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| AuthzError::ConfigError {
            reason: format!("failed to read role table '{}': {}", path.display(), e),
        })?;
        Self::from_toml_str(&contents)
    }

    /// The version label declared by the table's author.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Hex SHA-256 of the table's canonical JSON form.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// The table as TOML, in the same schema `from_toml_str` reads.
    pub fn to_toml(&self) -> AuthzResult<String> {
        toml::to_string(&RoleTableConfig::from_map(&self.name, &self.table)).map_err(|e| {
            AuthzError::ConfigError {
                reason: format!("failed to render role table: {}", e),
            }
        })
    }
}

impl DecisionPolicy for RoleActionPolicy {
    fn decide(&self, assignments: &[RoleAssignment], action: Action) -> AuthzResult<Verdict> {
        if let Some(grant) = assignments.iter().find(|a| self.table.permits(a.role, action)) {
            debug!(grant = %grant, action = %action, "assignment permits action");
            return Ok(Verdict::Allow { grant: *grant });
        }

        let reason = if assignments.is_empty() {
            "no relevant role assignment".to_string()
        } else {
            format!(
                "none of {} relevant role assignments permits '{}'",
                assignments.len(),
                action
            )
        };
        debug!(action = %action, assignments = assignments.len(), "denying by default");
        Ok(Verdict::Deny { reason })
    }

    fn role_actions(&self) -> &RoleActionMap {
        &self.table
    }

    fn version(&self) -> &str {
        &self.label
    }
}

fn fingerprint(table: &RoleActionMap) -> AuthzResult<String> {
    let canonical = serde_json::to_vec(table).map_err(|e| AuthzError::ConfigError {
        reason: format!("failed to serialize role table: {}", e),
    })?;
    Ok(hex::encode(Sha256::digest(&canonical)))
}
