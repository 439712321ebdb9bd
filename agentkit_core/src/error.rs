//! Registration and dispatch errors.

use std::fmt::{Display, Formatter};

use thiserror::Error;

/// One problem found while checking arguments against a schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    /// The arguments were not a key/value mapping at all.
    NotAnObject { found: &'static str },
    Missing { field: String },
    Unknown { field: String },
    Mistyped {
        field: String,
        expected: String,
        found: String,
    },
}

impl Violation {
    /// The field this violation is about, if any.
    pub fn field(&self) -> Option<&str> {
        match self {
            Violation::NotAnObject { .. } => None,
            Violation::Missing { field }
            | Violation::Unknown { field }
            | Violation::Mistyped { field, .. } => Some(field),
        }
    }
}

impl Display for Violation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Violation::NotAnObject { found } => {
                write!(f, "arguments must be an object, got {found}")
            }
            Violation::Missing { field } => write!(f, "missing required field '{field}'"),
            Violation::Unknown { field } => write!(f, "unknown field '{field}'"),
            Violation::Mistyped {
                field,
                expected,
                found,
            } => write!(f, "field '{field}' expected {expected}, got {found}"),
        }
    }
}

/// Every violation found for one dispatch, in reporting order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub mode: String,
    pub violations: Vec<Violation>,
}

impl ValidationError {
    pub fn new(mode: impl Into<String>, violations: Vec<Violation>) -> Self {
        Self {
            mode: mode.into(),
            violations,
        }
    }

    pub fn missing_fields(&self) -> Vec<&str> {
        self.violations
            .iter()
            .filter_map(|violation| match violation {
                Violation::Missing { field } => Some(field.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn mentions(&self, field: &str) -> bool {
        self.violations
            .iter()
            .any(|violation| violation.field() == Some(field))
    }
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid arguments for '{}': ", self.mode)?;
        for (index, violation) in self.violations.iter().enumerate() {
            if index > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{violation}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug, Error)]
pub enum ActionError {
    #[error("unknown mode '{mode}'")]
    UnknownMode { mode: String },

    #[error("mode '{mode}' is already registered")]
    DuplicateMode { mode: String },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("action '{mode}' failed: {source:#}")]
    Invocation {
        mode: String,
        #[source]
        source: anyhow::Error,
    },
}

impl ActionError {
    pub fn mode(&self) -> &str {
        match self {
            ActionError::UnknownMode { mode }
            | ActionError::DuplicateMode { mode }
            | ActionError::Invocation { mode, .. } => mode,
            ActionError::Validation(err) => &err.mode,
        }
    }

    /// Errors the caller can fix by changing the request.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            ActionError::UnknownMode { .. } | ActionError::Validation(_)
        )
    }
}
