//! Runtime side of the model: what a `serde_json::Value` looks like to the checker.
//!
//! Values are never retained. The checker only asks two questions of them:
//! which [`ValueKind`] they are, and (for objects) which fields are present.
use serde_json::Value;

/// The six JSON value kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ValueKind { Null, Boolean, Number, String, Array, Object }

impl ValueKind {
    pub fn name(self) -> &'static str {
        match self {
            ValueKind::Null    => "null",
            ValueKind::Boolean => "boolean",
            ValueKind::Number  => "number",
            ValueKind::String  => "string",
            ValueKind::Array   => "array",
            ValueKind::Object  => "object",
        }
    }

    fn bit(self) -> u8 { 1 << (self as u8) }
}

impl std::fmt::Display for ValueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

pub fn kind_of(v: &Value) -> ValueKind {
    match v {
        Value::Null      => ValueKind::Null,
        Value::Bool(_)   => ValueKind::Boolean,
        Value::Number(_) => ValueKind::Number,
        Value::String(_) => ValueKind::String,
        Value::Array(_)  => ValueKind::Array,
        Value::Object(_) => ValueKind::Object,
    }
}

/// `"name" in value`: true only for objects carrying the key.
pub fn has_field(v: &Value, name: &str) -> bool {
    v.as_object().is_some_and(|m| m.contains_key(name))
}

/// A small set of [`ValueKind`]s, used to decide whether two descriptors can
/// ever be inhabited by the same runtime value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KindSet(u8);

impl KindSet {
    pub const EMPTY: KindSet = KindSet(0);
    pub const FULL: KindSet = KindSet(0b11_1111);

    pub fn of(kind: ValueKind) -> Self { KindSet(kind.bit()) }
    pub fn union(self, other: Self) -> Self { KindSet(self.0 | other.0) }
    pub fn intersect(self, other: Self) -> Self { KindSet(self.0 & other.0) }
    pub fn contains(self, kind: ValueKind) -> bool { self.0 & kind.bit() != 0 }
    pub fn is_empty(self) -> bool { self.0 == 0 }
}
