//! Check JSON values against TypeScript-style type descriptors and narrow
//! union-typed values with `typeof` / `in` guards.
//!
//! ```
//! use json_narrow::{is_assignable, narrow, parse_guard, parse_type};
//! use serde_json::json;
//!
//! let ty = parse_type("string | number").unwrap();
//! assert!(is_assignable(&json!("abc"), &ty));
//!
//! let rules = vec![
//!     parse_guard("typeof string => A").unwrap(),
//!     parse_guard("typeof number => B").unwrap(),
//! ];
//! let union = ty.as_union().unwrap();
//! assert_eq!(narrow(&json!(3), union, &rules).unwrap(), "B");
//! ```
pub mod check;
pub mod cli;
pub mod descriptor;
pub mod error;
pub mod inference;
pub mod jq_exec;
pub mod narrow;
pub mod path_de;
pub mod schema;
pub mod syntax;
pub mod value;

pub use check::{check, intersection_conflicts, is_assignable, try_assignable, Verdict};
pub use descriptor::{Intersection, Primitive, Shape, TypeDescriptor, Union};
pub use error::{Result, TypeError};
pub use inference::{infer_from_values, Inference};
pub use narrow::{narrow, narrow_members, uncovered_members, BranchId, Guard, GuardRule};
pub use schema::schema_for;
pub use syntax::{parse_guard, parse_type};
pub use value::{kind_of, ValueKind};
