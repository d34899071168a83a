//! Typed fact set handed to an external policy evaluator.
//!
//! Facts are built from a `RequestContext` as tagged records rather than
//! text. An evaluator adapter turns each `Fact` into its own term syntax via
//! `Fact::predicate` and `Fact::terms`; identifiers never pass through a
//! string template. Every symbol carries its kind namespace (`userid:4`,
//! `repo:3`, `role:owner`, ...) so ids of different kinds cannot collide.

use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    entity::{PrincipalRef, RepoId, RepogroupId, UserId, UsergroupId},
    request::RequestContext,
    role::{Action, Role, RoleActionMap, RoleAssignment},
};

/// One term of a fact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FactTerm {
    /// A namespaced string symbol.
    Symbol(String),
    Date(DateTime<Utc>),
    /// A set of namespaced string symbols.
    Set(Vec<String>),
}

impl fmt::Display for FactTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FactTerm::Symbol(s) => write!(f, "\"{}\"", escape(s)),
            FactTerm::Date(d) => f.write_str(&d.to_rfc3339_opts(SecondsFormat::Secs, true)),
            FactTerm::Set(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "\"{}\"", escape(item))?;
                }
                f.write_str("]")
            }
        }
    }
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

/// A single ground fact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Fact {
    /// The user the request is resolved for.
    Subject { user: UserId },
    /// The requested action on the target repo.
    Operation { action: Action, repo: RepoId },
    /// Evaluation time, checked by time-bound attenuations.
    Time { at: DateTime<Utc> },
    /// One row of the role→action table.
    RoleActions { role: Role, actions: Vec<Action> },
    /// `member` (a user or a nested usergroup) belongs to `group`.
    Usergroup { group: UsergroupId, member: PrincipalRef },
    /// `repo` belongs to `group`.
    Repogroup { group: RepogroupId, repo: RepoId },
    /// A relevant role assignment.
    Role(RoleAssignment),
}

impl Fact {
    /// The predicate name the fact is asserted under.
    pub fn predicate(&self) -> &'static str {
        match self {
            Fact::Subject { .. } => "subject",
            Fact::Operation { .. } => "operation",
            Fact::Time { .. } => "time",
            Fact::RoleActions { .. } => "repo_role_actions",
            Fact::Usergroup { .. } => "usergroup",
            Fact::Repogroup { .. } => "repogroup",
            Fact::Role(_) => "role",
        }
    }

    pub fn terms(&self) -> Vec<FactTerm> {
        match self {
            Fact::Subject { user } => vec![FactTerm::Symbol(user.namespaced())],
            Fact::Operation { action, repo } => vec![
                FactTerm::Symbol(action.namespaced()),
                FactTerm::Symbol(repo.namespaced()),
            ],
            Fact::Time { at } => vec![FactTerm::Date(*at)],
            Fact::RoleActions { role, actions } => vec![
                FactTerm::Symbol(role.namespaced()),
                FactTerm::Set(actions.iter().map(Action::namespaced).collect()),
            ],
            Fact::Usergroup { group, member } => vec![
                FactTerm::Symbol(group.namespaced()),
                FactTerm::Symbol(member.namespaced()),
            ],
            Fact::Repogroup { group, repo } => vec![
                FactTerm::Symbol(group.namespaced()),
                FactTerm::Symbol(repo.namespaced()),
            ],
            Fact::Role(a) => vec![
                FactTerm::Symbol(a.principal.namespaced()),
                FactTerm::Symbol(a.resource.namespaced()),
                FactTerm::Symbol(a.role.namespaced()),
            ],
        }
    }
}

impl fmt::Display for Fact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.predicate())?;
        for (i, term) in self.terms().iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{term}")?;
        }
        f.write_str(");")
    }
}

/// The full set of facts describing one decision request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactSet {
    facts: Vec<Fact>,
}

impl FactSet {
    /// Describe `ctx` as facts, evaluated at `now` under `table`.
    pub fn from_context(ctx: &RequestContext, table: &RoleActionMap, now: DateTime<Utc>) -> Self {
        let mut facts = Vec::new();

        facts.push(Fact::Subject { user: ctx.user.id });
        for (role, actions) in table.iter() {
            facts.push(Fact::RoleActions {
                role,
                actions: actions.to_vec(),
            });
        }
        facts.push(Fact::Operation {
            action: ctx.action,
            repo: ctx.repo.id,
        });
        facts.push(Fact::Time { at: now });

        for m in &ctx.closure.direct {
            facts.push(Fact::Usergroup {
                group: m.usergroup_id,
                member: PrincipalRef::User(m.user_id),
            });
        }
        for n in &ctx.closure.nesting {
            facts.push(Fact::Usergroup {
                group: n.parent,
                member: PrincipalRef::Usergroup(n.child),
            });
        }
        for m in &ctx.repogroups {
            facts.push(Fact::Repogroup {
                group: m.repogroup_id,
                repo: m.repo_id,
            });
        }
        for a in &ctx.assignments {
            facts.push(Fact::Role(*a));
        }

        Self { facts }
    }

    pub fn facts(&self) -> &[Fact] {
        &self.facts
    }

    pub fn len(&self) -> usize {
        self.facts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }

    /// The facts named `predicate`.
    pub fn with_predicate<'a>(&'a self, predicate: &'a str) -> impl Iterator<Item = &'a Fact> {
        self.facts.iter().filter(move |f| f.predicate() == predicate)
    }

    /// One fact per line, in Datalog notation.
    pub fn render(&self) -> String {
        self.facts
            .iter()
            .map(|f| f.to_string())
            .collect::<Vec<_>>()
            .join("\n")
    }
}
