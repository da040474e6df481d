use thiserror::Error;

/// Crate-local result type.
pub type Result<T> = std::result::Result<T, TypeError>;

/// Everything the descriptor model, checker and narrowing evaluator can report.
///
/// None of these are retried; they are deterministic functions of the input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypeError {
    /// Malformed descriptor (bad arity, unknown primitive, syntax error, ...).
    #[error("invalid descriptor: {reason}")]
    InvalidDescriptor {
        /// Human readable cause.
        reason: String,
    },
    /// Two intersected shapes declare the same field with types no value can satisfy at once.
    #[error("incompatible intersection: field `{field}` is `{left}` on one side and `{right}` on the other")]
    IncompatibleIntersection {
        /// Dotted path of the conflicting field.
        field: String,
        /// Rendering of the first declaration.
        left: String,
        /// Rendering of the conflicting declaration.
        right: String,
    },
    /// No guard rule matched the value.
    #[error("unhandled variant: no guard matched a {kind} value of `{union}`")]
    UnhandledVariant {
        /// Runtime kind of the unmatched value.
        kind: String,
        /// Rendering of the union being narrowed.
        union: String,
    },
}

impl TypeError {
    pub fn invalid(reason: impl Into<String>) -> Self {
        TypeError::InvalidDescriptor { reason: reason.into() }
    }

    pub fn error_name(&self) -> &'static str {
        match self {
            TypeError::InvalidDescriptor { .. } => "InvalidDescriptor",
            TypeError::IncompatibleIntersection { .. } => "IncompatibleIntersection",
            TypeError::UnhandledVariant { .. } => "UnhandledVariant",
        }
    }
}
