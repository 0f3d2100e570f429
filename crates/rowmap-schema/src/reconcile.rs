//! Additive schema reconciliation.
//!
//! Runs once at connect time. The policy is strictly non-destructive:
//! tables and columns may be added, never modified or removed. Anything
//! beyond that is a migration and out of scope.

use std::collections::HashSet;

use asupersync::{Cx, Outcome};
use futures::future::join_all;

use rowmap_core::{
    AdapterContext, Error, Executor, FieldDefinition, FieldKind, Value, quote_ident,
};

use crate::types::{column_type, foreign_key_type, primary_key_type};

const INTROSPECT_COLUMNS: &str =
    "SELECT column_name FROM information_schema.columns WHERE table_name = $1";

/// Reconcile physical tables and columns with the declared schema.
///
/// Three phases: per-type `CREATE TABLE IF NOT EXISTS` (sequential), column
/// introspection (sequential, one read per type), then all missing
/// column-adds dispatched concurrently. The first failing statement fails
/// the pass; partial schema state is never considered good enough, so the
/// caller treats any error as fatal to connect.
pub async fn reconcile<E: Executor>(
    cx: &Cx,
    executor: &E,
    ctx: &AdapterContext,
) -> Outcome<(), Error> {
    let pk_type = match primary_key_type(&ctx.options.primary_key) {
        Ok(t) => t,
        Err(e) => return Outcome::Err(e),
    };
    let fk_type = foreign_key_type(&pk_type).to_string();

    tracing::debug!(
        types = ctx.schema.type_names().count(),
        primary_key_type = %pk_type,
        "reconciling schema"
    );

    // Tables first: the primary key column must exist before any other.
    for type_name in ctx.schema.type_names() {
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} ({} {pk_type} PRIMARY KEY)",
            quote_ident(ctx.table(type_name)),
            quote_ident(&ctx.keys.primary)
        );
        tracing::trace!(sql = %sql, "creating table");
        match executor.execute(cx, &sql, &[]).await {
            Outcome::Ok(_) => {}
            Outcome::Err(e) => return Outcome::Err(e),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        }
    }

    // Discover existing columns, one read per type. The column set is
    // never cached beyond this pass.
    let mut add_statements = Vec::new();
    for type_name in ctx.schema.type_names() {
        let table = ctx.table(type_name);
        let rows = match executor
            .query(cx, INTROSPECT_COLUMNS, &[Value::Text(table.to_string())])
            .await
        {
            Outcome::Ok(rows) => rows,
            Outcome::Err(e) => return Outcome::Err(e),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        };
        let existing: HashSet<String> = rows
            .iter()
            .filter_map(|row| row.get_named("column_name"))
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect();

        let fields = match ctx.fields(type_name) {
            Ok(fields) => fields,
            Err(e) => return Outcome::Err(e),
        };
        for (field, definition) in fields {
            if existing.contains(field) {
                continue;
            }
            add_statements.push(add_column_sql(ctx, type_name, field, definition, &fk_type));
        }
    }

    // All column-adds run concurrently; any failure is fatal for the pass.
    let outcomes = join_all(
        add_statements
            .iter()
            .map(|sql| {
                tracing::trace!(sql = %sql, "adding column");
                executor.execute(cx, sql, &[])
            })
            .collect::<Vec<_>>(),
    )
    .await;
    for outcome in outcomes {
        match outcome {
            Outcome::Ok(_) => {}
            Outcome::Err(e) => return Outcome::Err(e),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        }
    }

    Outcome::Ok(())
}

fn add_column_sql(
    ctx: &AdapterContext,
    type_name: &str,
    field: &str,
    definition: &FieldDefinition,
    fk_type: &str,
) -> String {
    let data_type = match &definition.kind {
        FieldKind::Scalar(primitive) => column_type(*primitive),
        FieldKind::Link(_) => fk_type,
    };

    let mut sql = format!(
        "ALTER TABLE {} ADD COLUMN {} {data_type}",
        quote_ident(ctx.table(type_name)),
        quote_ident(field)
    );
    if definition.is_array {
        sql.push_str("[] DEFAULT '{}' NOT NULL");
    }
    if definition.is_foreign_key() && ctx.options.use_foreign_keys {
        if let Some(target) = definition.link_target() {
            sql.push_str(&format!(
                " REFERENCES {} ON DELETE SET NULL",
                quote_ident(ctx.table(target))
            ));
        }
    }
    sql
}
