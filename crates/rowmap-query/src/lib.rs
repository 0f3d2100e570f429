//! Query compilation for rowmap.
//!
//! Turns abstract find options and mutation specs into parameterized SQL
//! and runs them through an [`Executor`](rowmap_core::Executor). All
//! user-supplied identifiers are quoted and all values travel as positional
//! parameters; the only text merged verbatim is the caller's configured raw
//! condition.

pub mod builder;
pub mod find;
pub mod mutate;
pub mod relation;

pub use builder::StatementBuilder;
pub use find::{
    Bounds, FieldSelection, FindOptions, FindResult, FindStatements, SortOrder, build_find, find,
};
pub use mutate::{
    InsertStatement, UpdateSpec, build_delete, build_insert, build_update, create, delete, update,
};
pub use relation::PATH_DELIMITER;
