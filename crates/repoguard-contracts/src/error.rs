//! Error types for the repoguard decision pipeline.
//!
//! All fallible operations return `AuthzResult<T>`. A deny verdict is not an
//! error; every variant here aborts the decision request it occurred in.

use thiserror::Error;

/// The unified error type for repoguard.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthzError {
    /// A principal or resource identity is absent from the store.
    #[error("{entity} '{key}' not found")]
    NotFound { entity: String, key: String },

    /// A store lookup failed or timed out. The caller may retry the request.
    #[error("relationship store unavailable: {reason}")]
    StoreUnavailable { reason: String },

    /// A stored role assignment names a role its resource kind cannot carry.
    #[error("role '{role}' cannot be assigned on a {resource}")]
    InvalidRoleForResourceType { role: String, resource: String },

    /// A stored or supplied tag did not decode to a known value.
    #[error("unrecognized {kind} label '{label}'")]
    UnrecognizedLabel { kind: String, label: String },

    /// The policy evaluator could not parse or run the fact set.
    #[error("policy evaluation failed: {reason}")]
    PolicyEvaluationFailed { reason: String },

    /// A configuration value is missing or invalid.
    #[error("configuration error: {reason}")]
    ConfigError { reason: String },
}

impl AuthzError {
    pub fn not_found(entity: impl Into<String>, key: impl ToString) -> Self {
        AuthzError::NotFound {
            entity: entity.into(),
            key: key.to_string(),
        }
    }

    pub fn store(reason: impl ToString) -> Self {
        AuthzError::StoreUnavailable {
            reason: reason.to_string(),
        }
    }

    pub fn evaluation(reason: impl ToString) -> Self {
        AuthzError::PolicyEvaluationFailed {
            reason: reason.to_string(),
        }
    }

    /// True for failures a caller may retry by re-running the whole request.
    pub fn is_transient(&self) -> bool {
        matches!(self, AuthzError::StoreUnavailable { .. })
    }
}

/// Convenience alias used throughout the repoguard crates.
pub type AuthzResult<T> = Result<T, AuthzError>;
