//! rowmap: a translation layer between backend-agnostic record-type
//! schemas and a PostgreSQL-style relational engine.
//!
//! Given a declarative description of record types, rowmap reconciles
//! physical tables and columns additively at connect time, compiles
//! abstract find and mutation operations into parameterized SQL, encodes
//! and decodes values across the storage boundary, and scopes transactions
//! over dedicated pooled connections. The driver transport stays behind the
//! [`Executor`]/[`ExecutorPool`] traits.
//!
//! ```no_run
//! use rowmap::{AdapterBuilder, FindOptions, RecordSchema};
//! # use rowmap::{Cx, Outcome};
//! # async fn example<P: rowmap::ExecutorPool>(cx: &Cx, pool: P, schema: RecordSchema) {
//! let adapter = match AdapterBuilder::new(schema).pool(pool).connect(cx).await {
//!     Outcome::Ok(adapter) => adapter,
//!     _ => return,
//! };
//! let result = adapter
//!     .find(cx, "user", None, &FindOptions::default())
//!     .await;
//! # let _ = result;
//! # }
//! ```

pub mod adapter;
pub mod transaction;

pub use adapter::{Adapter, AdapterBuilder};
pub use transaction::TransactionScope;

pub use rowmap_core::{
    ColumnInfo, Cx, Error, Executor, ExecutorPool, FieldDefinition, FieldKind, KeyConfig,
    KeyGeneration, Outcome, PrimaryKeyDecl, Primitive, Record, RecordSchema, Result, Row, Value,
};
pub use rowmap_query::{
    Bounds, FieldSelection, FindOptions, FindResult, SortOrder, UpdateSpec,
};
