//! Core types and traits for rowmap.
//!
//! `rowmap-core` is the contract layer for the workspace. It defines the
//! data model shared by the schema reconciler, the query compiler, and the
//! adapter facade:
//!
//! - **Record-type schema**: [`RecordSchema`], [`FieldDefinition`], and
//!   [`KeyConfig`] describe record types as runtime data, with link targets
//!   resolved by name so cyclic type graphs stay representable.
//! - **Values and rows**: [`Value`] and [`Row`] carry statement parameters
//!   and decoded results across the executor boundary.
//! - **Codec**: [`codec`] encodes records for storage (hex-tagged binary,
//!   native arrays, key generation) and decodes rows back into records.
//! - **Executor boundary**: [`Executor`] and [`ExecutorPool`] are the only
//!   things this layer needs from a driver or pool.
//! - **Structured concurrency**: re-exports `Cx` and `Outcome` from
//!   asupersync so every async operation is cancel-correct.

// Re-export asupersync primitives for structured concurrency
pub use asupersync::{Cx, Outcome};

pub mod codec;
pub mod error;
pub mod executor;
pub mod identifiers;
pub mod row;
pub mod schema;
pub mod value;

pub use error::{
    ConfigurationError, ConflictError, Error, QueryError, QueryErrorKind, Result, SchemaError,
    SQLSTATE_UNDEFINED_COLUMN, SQLSTATE_UNIQUE_VIOLATION,
};
pub use executor::{Executor, ExecutorPool};
pub use identifiers::quote_ident;
pub use row::{ColumnInfo, Row};
pub use schema::{
    AdapterContext, AdapterOptions, FieldDefinition, FieldKind, FieldMap, KeyConfig,
    KeyGeneration, KeyGenerator, PrimaryKeyDecl, Primitive, Record, RecordSchema,
};
pub use value::Value;
