//! Narrowing evaluator: pick a branch for a union-typed value.
//!
//! Rules are tried in declaration order and the first guard that holds wins.
//! Exhaustiveness is not enforced here; [`uncovered_members`] lets a caller
//! ask which union members no rule can select.
use std::fmt;

use serde_json::Value;
use tracing::trace;

use crate::descriptor::{Primitive, TypeDescriptor, Union};
use crate::error::{Result, TypeError};
use crate::value::{has_field, kind_of};

/// Identifier of the branch a rule selects.
pub type BranchId = String;

/// The two runtime discriminations available: `typeof v === "<p>"` and `"<f>" in v`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Guard {
    IsTypeofPrimitive(Primitive),
    HasField(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardRule {
    pub guard: Guard,
    pub branch: BranchId,
}

impl GuardRule {
    pub fn new(guard: Guard, branch: impl Into<BranchId>) -> Self {
        GuardRule { guard, branch: branch.into() }
    }
}

impl Guard {
    /// Does the predicate hold for this runtime value?
    pub fn holds(&self, value: &Value) -> bool {
        match self {
            Guard::IsTypeofPrimitive(p) => kind_of(value) == p.kind(),
            Guard::HasField(name) => has_field(value, name),
        }
    }

    /// Could a value of declared type `member` pass this guard?
    pub fn admits(&self, member: &TypeDescriptor) -> bool {
        match self {
            Guard::IsTypeofPrimitive(p) => member.kinds().contains(p.kind()),
            Guard::HasField(name) => member.declares_field(name),
        }
    }
}

impl fmt::Display for Guard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Guard::IsTypeofPrimitive(p) => write!(f, "typeof {p}"),
            Guard::HasField(name) => write!(f, "{} in", Value::from(name.as_str())),
        }
    }
}

impl fmt::Display for GuardRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} => {}", self.guard, self.branch)
    }
}

/// Select the branch of the first rule whose guard holds for `value`.
pub fn narrow<'r>(value: &Value, union: &Union, rules: &'r [GuardRule]) -> Result<&'r str> {
    for rule in rules {
        if rule.guard.holds(value) {
            trace!(rule = %rule, "guard matched");
            return Ok(rule.branch.as_str());
        }
    }
    Err(TypeError::UnhandledVariant {
        kind: kind_of(value).to_string(),
        union: union.to_string(),
    })
}

/// Members of `union` that `guard` can select, in declaration order.
pub fn narrow_members<'u>(union: &'u Union, guard: &Guard) -> Vec<&'u TypeDescriptor> {
    union.members().iter().filter(|m| guard.admits(m)).collect()
}

/// Members of `union` that no rule in `rules` can select.
pub fn uncovered_members<'u>(union: &'u Union, rules: &[GuardRule]) -> Vec<&'u TypeDescriptor> {
    union.members()
        .iter()
        .filter(|m| !rules.iter().any(|r| r.guard.admits(m)))
        .collect()
}
