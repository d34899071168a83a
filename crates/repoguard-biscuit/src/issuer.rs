//! Token issuance and attenuation.
//!
//! A token's authority block carries one fact, `user("userid:N")`. Every
//! attenuation appends a block holding a single check; checks can only
//! narrow what the token authorizes.

use std::fmt;
use std::time::SystemTime;

use biscuit_auth::{
    macros::{biscuit, block},
    Biscuit, KeyPair, PublicKey,
};
use chrono::{DateTime, SecondsFormat, Utc};
use tracing::debug;

use repoguard_contracts::{
    entity::{RepoId, UserId},
    error::{AuthzError, AuthzResult},
    request::Credential,
    role::Action,
};

/// A restriction appended to an issued token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attenuation {
    /// Valid only while the evaluation time is at or before the instant.
    ExpiresAt(DateTime<Utc>),
    /// Valid only for operations on this repo.
    OnlyRepo(RepoId),
    /// Valid only for this action.
    OnlyAction(Action),
}

impl fmt::Display for Attenuation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Attenuation::ExpiresAt(at) => {
                write!(f, "expires at {}", at.to_rfc3339_opts(SecondsFormat::Secs, true))
            }
            Attenuation::OnlyRepo(repo) => write!(f, "only {}", repo.namespaced()),
            Attenuation::OnlyAction(action) => write!(f, "only {}", action.namespaced()),
        }
    }
}

/// Issues credentials signed with one root key pair.
pub struct TokenIssuer {
    root: KeyPair,
}

impl TokenIssuer {
    /// An issuer with a freshly generated ed25519 root key.
    pub fn new() -> Self {
        Self { root: KeyPair::new() }
    }

    /// The key evaluators verify credentials against.
    pub fn public_key(&self) -> PublicKey {
        self.root.public()
    }

    /// Issue a credential asserting `user`.
    pub fn issue(&self, user: UserId) -> AuthzResult<Credential> {
        let token = biscuit!("user({user});", user = user.namespaced())
            .build(&self.root)
            .map_err(|e| token_err("failed to sign token", e))?;
        debug!(user_id = user.0, "credential issued");
        serialize(&token)
    }

    /// Append `restriction` to `credential`.
    ///
    /// The credential must have been issued by this issuer.
    pub fn attenuate(&self, credential: &Credential, restriction: Attenuation) -> AuthzResult<Credential> {
        let token = Biscuit::from(credential.as_bytes(), self.root.public())
            .map_err(|e| token_err("failed to parse credential", e))?;

        let restriction_block = match restriction {
            Attenuation::ExpiresAt(at) => block!(
                "check if time($time), $time <= {expiry};",
                expiry = SystemTime::from(at)
            ),
            Attenuation::OnlyRepo(repo) => block!(
                "check if operation($action, {repo});",
                repo = repo.namespaced()
            ),
            Attenuation::OnlyAction(action) => block!(
                "check if operation({action}, $repo);",
                action = action.namespaced()
            ),
        };

        let token = token
            .append(restriction_block)
            .map_err(|e| token_err("failed to append attenuation", e))?;
        debug!(restriction = %restriction, blocks = token.block_count(), "credential attenuated");
        serialize(&token)
    }
}

impl Default for TokenIssuer {
    fn default() -> Self {
        Self::new()
    }
}

fn serialize(token: &Biscuit) -> AuthzResult<Credential> {
    token
        .to_vec()
        .map(Credential)
        .map_err(|e| token_err("failed to serialize token", e))
}

fn token_err(context: &str, e: biscuit_auth::error::Token) -> AuthzError {
    AuthzError::evaluation(format!("{context}: {e}"))
}
