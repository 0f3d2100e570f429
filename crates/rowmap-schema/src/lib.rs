//! Schema reconciliation and type mapping for rowmap.
//!
//! Translates declared record types into physical tables and columns. The
//! reconciler is additive only: it creates what is missing and never drops
//! or alters existing columns.

pub mod reconcile;
pub mod types;

pub use reconcile::reconcile;
pub use types::{column_type, foreign_key_type, primary_key_type};
