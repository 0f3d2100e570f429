//! Error taxonomy for the translation layer.
//!
//! Four kinds matter to callers:
//!
//! - [`Error::Configuration`]: invalid setup (missing pool, bad primary-key
//!   declaration), fatal before any statement executes.
//! - [`Error::Conflict`]: a unique or primary-key violation on create,
//!   translated from the backend's SQLSTATE.
//! - [`Error::Schema`]: the caller referenced a type or field the declared
//!   schema does not contain, including bad relation-filter paths.
//! - [`Error::Query`]: everything the backend reports, passed through with
//!   its SQLSTATE so callers (and this layer) can branch on it.

use std::fmt;

/// Convenience result alias for synchronous paths.
pub type Result<T> = std::result::Result<T, Error>;

/// SQLSTATE for a unique constraint violation.
pub const SQLSTATE_UNIQUE_VIOLATION: &str = "23505";

/// SQLSTATE for a reference to an undefined column.
pub const SQLSTATE_UNDEFINED_COLUMN: &str = "42703";

/// Top-level error type.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Invalid adapter configuration, surfaced before any statement runs.
    Configuration(ConfigurationError),
    /// Unique constraint violated on create.
    Conflict(ConflictError),
    /// The declared schema does not contain a referenced type or field.
    Schema(SchemaError),
    /// A backend statement failed.
    Query(QueryError),
}

/// Invalid adapter configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigurationError {
    /// Human-readable description.
    pub message: String,
}

/// Unique constraint violation, translated to the domain level.
#[derive(Debug, Clone, PartialEq)]
pub struct ConflictError {
    /// Human-readable description.
    pub message: String,
}

/// Reference to an undeclared type or field.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaError {
    /// Human-readable description.
    pub message: String,
}

/// Classification of backend statement failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryErrorKind {
    /// Generic backend error.
    Database,
    /// Constraint violation other than the translated unique case.
    Constraint,
    /// Statement could not be parsed by the backend.
    Syntax,
    /// A result value could not be decoded.
    Decode,
}

/// A backend statement failure with its SQLSTATE, when known.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryError {
    /// Failure classification.
    pub kind: QueryErrorKind,
    /// Backend-reported message.
    pub message: String,
    /// Five-character SQLSTATE code, if the backend supplied one.
    pub sqlstate: Option<String>,
}

impl Error {
    /// Build a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Error::Configuration(ConfigurationError {
            message: message.into(),
        })
    }

    /// Build a conflict error.
    pub fn conflict(message: impl Into<String>) -> Self {
        Error::Conflict(ConflictError {
            message: message.into(),
        })
    }

    /// Build a schema error.
    pub fn schema(message: impl Into<String>) -> Self {
        Error::Schema(SchemaError {
            message: message.into(),
        })
    }

    /// Build a generic backend error without an SQLSTATE.
    pub fn database(message: impl Into<String>) -> Self {
        Error::Query(QueryError {
            kind: QueryErrorKind::Database,
            message: message.into(),
            sqlstate: None,
        })
    }

    /// Build a backend error carrying an SQLSTATE code.
    pub fn backend(message: impl Into<String>, sqlstate: impl Into<String>) -> Self {
        Error::Query(QueryError {
            kind: QueryErrorKind::Database,
            message: message.into(),
            sqlstate: Some(sqlstate.into()),
        })
    }

    /// Build a decode error.
    pub fn decode(message: impl Into<String>) -> Self {
        Error::Query(QueryError {
            kind: QueryErrorKind::Decode,
            message: message.into(),
            sqlstate: None,
        })
    }

    /// The SQLSTATE code attached to this error, if any.
    pub fn sqlstate(&self) -> Option<&str> {
        match self {
            Error::Query(q) => q.sqlstate.as_deref(),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Configuration(e) => write!(f, "configuration error: {}", e.message),
            Error::Conflict(e) => write!(f, "conflict: {}", e.message),
            Error::Schema(e) => write!(f, "schema error: {}", e.message),
            Error::Query(e) => match &e.sqlstate {
                Some(code) => write!(f, "query error ({code}): {}", e.message),
                None => write!(f, "query error: {}", e.message),
            },
        }
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sqlstate_surfaced() {
        let err = Error::backend("duplicate key", SQLSTATE_UNIQUE_VIOLATION);
        assert_eq!(err.sqlstate(), Some("23505"));
        assert_eq!(Error::configuration("no pool").sqlstate(), None);
    }

    #[test]
    fn test_display() {
        let err = Error::backend("boom", "42703");
        assert_eq!(err.to_string(), "query error (42703): boom");
        let err = Error::conflict("unique constraint violated");
        assert_eq!(err.to_string(), "conflict: unique constraint violated");
    }
}
