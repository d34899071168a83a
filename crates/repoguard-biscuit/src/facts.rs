//! Conversion of typed facts into biscuit facts.
//!
//! Terms are built through the biscuit builder, never by formatting Datalog
//! source, so no identifier can change the shape of a fact.

use std::collections::BTreeSet;
use std::time::SystemTime;

use biscuit_auth::builder::{self, Term};

use repoguard_contracts::facts::{Fact, FactSet, FactTerm};

pub fn term(t: &FactTerm) -> Term {
    match t {
        FactTerm::Symbol(s) => builder::string(s),
        FactTerm::Date(at) => builder::date(&SystemTime::from(*at)),
        FactTerm::Set(items) => {
            builder::set(items.iter().map(|s| builder::string(s)).collect::<BTreeSet<Term>>())
        }
    }
}

pub fn fact(f: &Fact) -> builder::Fact {
    let terms: Vec<Term> = f.terms().iter().map(term).collect();
    builder::fact(f.predicate(), &terms)
}

/// Every fact of `facts`, in order.
pub fn facts(facts: &FactSet) -> Vec<builder::Fact> {
    facts.facts().iter().map(fact).collect()
}
