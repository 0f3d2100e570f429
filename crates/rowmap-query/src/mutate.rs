//! Compilation and execution of create, update, and delete operations.

use asupersync::{Cx, Outcome};
use futures::future::join_all;
use rowmap_core::{
    AdapterContext, Error, Executor, Record, Result, Row, SQLSTATE_UNDEFINED_COLUMN,
    SQLSTATE_UNIQUE_VIOLATION, Value, codec, quote_ident,
};

use crate::builder::StatementBuilder;

/// One record's sparse update: values to set, elements to append to array
/// fields, elements to remove from array fields.
#[derive(Debug, Clone, Default)]
pub struct UpdateSpec {
    /// Primary key of the record to update.
    pub id: Value,
    /// Fields to overwrite.
    pub replace: Record,
    /// Array fields to append to. An array operand concatenates all its
    /// elements, a scalar operand appends one.
    pub push: Record,
    /// Array fields to remove from. An array operand removes every matching
    /// element, a scalar operand removes one.
    pub pull: Record,
}

impl UpdateSpec {
    /// An empty update for the record with the given primary key.
    pub fn new(id: impl Into<Value>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }
}

/// A compiled batch insert.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertStatement {
    /// The INSERT text.
    pub sql: String,
    /// Row values, in fixed column order across the batch.
    pub params: Vec<Value>,
    /// Whether the statement requests backend-generated keys back.
    pub returns_keys: bool,
}

/// Compile a batch insert over already-encoded records.
///
/// Column order is lexicographic and identical for every row. When every
/// record carries a primary key the key column is inserted explicitly;
/// otherwise it is omitted and generated keys are requested back.
pub fn build_insert(
    ctx: &AdapterContext,
    type_name: &str,
    records: &[Record],
) -> Result<InsertStatement> {
    let fields = ctx.fields(type_name)?;
    let primary = &ctx.keys.primary;
    let returns_keys = !records.iter().all(|record| record.contains_key(primary));

    let mut columns: Vec<&str> = Vec::with_capacity(fields.len() + 1);
    if !returns_keys {
        columns.push(primary);
    }
    columns.extend(fields.keys().map(String::as_str));

    let mut builder = StatementBuilder::new();
    let mut tuples = Vec::with_capacity(records.len());
    for record in records {
        let placeholders = columns
            .iter()
            .map(|column| {
                builder.placeholder(record.get(*column).cloned().unwrap_or(Value::Null))
            })
            .collect::<Vec<_>>()
            .join(", ");
        tuples.push(format!("({placeholders})"));
    }

    let column_list = columns
        .iter()
        .map(|column| quote_ident(column))
        .collect::<Vec<_>>()
        .join(", ");
    let mut sql = format!(
        "INSERT INTO {} ({column_list}) VALUES {}",
        quote_ident(ctx.table(type_name)),
        tuples.join(", ")
    );
    if returns_keys {
        sql.push_str(&format!(" RETURNING {}", quote_ident(primary)));
    }

    Ok(InsertStatement {
        sql,
        params: builder.into_params(),
        returns_keys,
    })
}

/// Compile one record's update. Returns `None` when the spec carries no
/// sub-operation at all.
pub fn build_update(
    ctx: &AdapterContext,
    type_name: &str,
    update: &UpdateSpec,
) -> Result<Option<(String, Vec<Value>)>> {
    ctx.fields(type_name)?;
    let mut builder = StatementBuilder::new();
    let mut assignments = Vec::new();

    for (field, value) in &update.replace {
        let encoded = match value.clone() {
            Value::Array(items) => {
                Value::Array(items.into_iter().map(codec::encode_value).collect())
            }
            single => codec::encode_value(single),
        };
        assignments.push(format!(
            "{} = {}",
            quote_ident(field),
            builder.placeholder(encoded)
        ));
    }

    for (field, value) in &update.push {
        let column = quote_ident(field);
        match value.clone() {
            Value::Array(items) => {
                let param = builder.placeholder(Value::Array(
                    items.into_iter().map(codec::encode_value).collect(),
                ));
                assignments.push(format!("{column} = array_cat({column}, {param})"));
            }
            single => {
                let param = builder.placeholder(codec::encode_value(single));
                assignments.push(format!("{column} = array_append({column}, {param})"));
            }
        }
    }

    for (field, value) in &update.pull {
        let column = quote_ident(field);
        match value.clone() {
            Value::Array(items) => {
                if items.is_empty() {
                    continue;
                }
                // Set difference that preserves the relative order of the
                // surviving elements.
                let list = items
                    .into_iter()
                    .map(|item| builder.placeholder(codec::encode_value(item)))
                    .collect::<Vec<_>>()
                    .join(", ");
                assignments.push(format!(
                    "{column} = array(SELECT x FROM unnest({column}) x \
                     WHERE x NOT IN ({list}))"
                ));
            }
            single => {
                let param = builder.placeholder(codec::encode_value(single));
                assignments.push(format!("{column} = array_remove({column}, {param})"));
            }
        }
    }

    if assignments.is_empty() {
        return Ok(None);
    }

    let id_param = builder.placeholder(codec::encode_value(update.id.clone()));
    let sql = format!(
        "UPDATE {} SET {} WHERE {} = {id_param}",
        quote_ident(ctx.table(type_name)),
        assignments.join(", "),
        quote_ident(&ctx.keys.primary)
    );
    Ok(Some((sql, builder.into_params())))
}

/// Compile a delete. Returns `None` for the empty explicit id list.
pub fn build_delete(
    ctx: &AdapterContext,
    type_name: &str,
    ids: Option<&[Value]>,
) -> Result<Option<(String, Vec<Value>)>> {
    ctx.fields(type_name)?;
    if let Some(ids) = ids {
        if ids.is_empty() {
            return Ok(None);
        }
    }

    let mut builder = StatementBuilder::new();
    let mut sql = format!("DELETE FROM {}", quote_ident(ctx.table(type_name)));
    if let Some(ids) = ids {
        let list = ids
            .iter()
            .map(|id| builder.placeholder(codec::encode_value(id.clone())))
            .collect::<Vec<_>>()
            .join(", ");
        sql.push_str(&format!(
            " WHERE {} IN ({list})",
            quote_ident(&ctx.keys.primary)
        ));
    }
    Ok(Some((sql, builder.into_params())))
}

/// Insert a batch of records, returning them with assigned primary keys and
/// decoded values. A unique-constraint violation surfaces as a conflict.
pub async fn create<E: Executor>(
    cx: &Cx,
    executor: &E,
    ctx: &AdapterContext,
    type_name: &str,
    records: Vec<Record>,
) -> Outcome<Vec<Record>, Error> {
    if records.is_empty() {
        return Outcome::Ok(Vec::new());
    }

    let mut encoded = Vec::with_capacity(records.len());
    for record in records {
        match codec::encode_record(ctx, type_name, record) {
            Ok(record) => encoded.push(record),
            Err(e) => return Outcome::Err(e),
        }
    }
    let statement = match build_insert(ctx, type_name, &encoded) {
        Ok(statement) => statement,
        Err(e) => return Outcome::Err(e),
    };
    tracing::debug!(sql = %statement.sql, rows = encoded.len(), "create");

    if statement.returns_keys {
        let rows = match executor.query(cx, &statement.sql, &statement.params).await {
            Outcome::Ok(rows) => rows,
            Outcome::Err(e) => return Outcome::Err(translate_conflict(e)),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        };
        for (record, row) in encoded.iter_mut().zip(&rows) {
            if let Some(id) = row.get_named(&ctx.keys.primary) {
                record.insert(ctx.keys.primary.clone(), id.clone());
            }
        }
    } else {
        match executor.execute(cx, &statement.sql, &statement.params).await {
            Outcome::Ok(_) => {}
            Outcome::Err(e) => return Outcome::Err(translate_conflict(e)),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        }
    }

    let mut out = Vec::with_capacity(encoded.len());
    for record in &encoded {
        let row = Row::from_pairs(
            record
                .iter()
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect(),
        );
        match codec::decode_record(ctx, type_name, &row) {
            Ok(record) => out.push(record),
            Err(e) => return Outcome::Err(e),
        }
    }
    Outcome::Ok(out)
}

fn translate_conflict(error: Error) -> Error {
    if error.sqlstate() == Some(SQLSTATE_UNIQUE_VIOLATION) {
        Error::conflict("unique constraint violated")
    } else {
        error
    }
}

/// Apply a batch of sparse updates, one statement per record, all
/// dispatched concurrently. Returns the summed affected-row count. A
/// statement failing on a missing column counts as zero rows.
pub async fn update<E: Executor>(
    cx: &Cx,
    executor: &E,
    ctx: &AdapterContext,
    type_name: &str,
    updates: &[UpdateSpec],
) -> Outcome<u64, Error> {
    let mut statements = Vec::with_capacity(updates.len());
    for spec in updates {
        match build_update(ctx, type_name, spec) {
            Ok(Some(statement)) => statements.push(statement),
            Ok(None) => {}
            Err(e) => return Outcome::Err(e),
        }
    }
    if statements.is_empty() {
        return Outcome::Ok(0);
    }
    tracing::debug!(statements = statements.len(), "update");

    let outcomes = join_all(
        statements
            .iter()
            .map(|(sql, params)| {
                tracing::trace!(sql = %sql, "update statement");
                executor.execute(cx, sql, params)
            })
            .collect::<Vec<_>>(),
    )
    .await;

    let mut total = 0u64;
    for outcome in outcomes {
        match outcome {
            Outcome::Ok(count) => total += count,
            // The target column may not exist yet if reconciliation is
            // racing; treated as zero rows affected.
            Outcome::Err(e) if e.sqlstate() == Some(SQLSTATE_UNDEFINED_COLUMN) => {}
            Outcome::Err(e) => return Outcome::Err(e),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        }
    }
    Outcome::Ok(total)
}

/// Delete records by id list, or all records of the type when no ids are
/// given. Returns the affected-row count.
pub async fn delete<E: Executor>(
    cx: &Cx,
    executor: &E,
    ctx: &AdapterContext,
    type_name: &str,
    ids: Option<&[Value]>,
) -> Outcome<u64, Error> {
    let statement = match build_delete(ctx, type_name, ids) {
        Ok(Some(statement)) => statement,
        Ok(None) => return Outcome::Ok(0),
        Err(e) => return Outcome::Err(e),
    };
    tracing::debug!(sql = %statement.0, "delete");
    executor.execute(cx, &statement.0, &statement.1).await
}

#[cfg(test)]
mod tests {
    use rowmap_core::KeyGeneration;

    use super::*;
    use crate::testing::{ScriptedExecutor, context, run, unwrap_outcome};

    fn record(pairs: &[(&str, Value)]) -> Record {
        pairs
            .iter()
            .map(|(name, value)| ((*name).to_string(), value.clone()))
            .collect()
    }

    #[test]
    fn test_insert_with_explicit_keys() {
        let ctx = context();
        let records = vec![
            record(&[
                ("id", Value::Text("a".into())),
                ("name", Value::Text("Rex".into())),
                ("owner", Value::Null),
                ("tags", Value::Array(vec![])),
            ]),
            record(&[
                ("id", Value::Text("b".into())),
                ("name", Value::Text("Fido".into())),
                ("owner", Value::Text("a".into())),
                ("tags", Value::Array(vec![])),
            ]),
        ];
        let statement = build_insert(&ctx, "pet", &records).unwrap();
        assert_eq!(
            statement.sql,
            "INSERT INTO \"pet\" (\"id\", \"name\", \"owner\", \"tags\") \
             VALUES ($1, $2, $3, $4), ($5, $6, $7, $8)"
        );
        assert!(!statement.returns_keys);
        assert_eq!(statement.params.len(), 8);
        assert_eq!(statement.params[4], Value::Text("b".into()));
    }

    #[test]
    fn test_insert_without_keys_requests_them_back() {
        let ctx = context();
        let records = vec![record(&[
            ("name", Value::Text("Rex".into())),
            ("owner", Value::Null),
            ("tags", Value::Array(vec![])),
        ])];
        let statement = build_insert(&ctx, "pet", &records).unwrap();
        assert_eq!(
            statement.sql,
            "INSERT INTO \"pet\" (\"name\", \"owner\", \"tags\") \
             VALUES ($1, $2, $3) RETURNING \"id\""
        );
        assert!(statement.returns_keys);
    }

    #[test]
    fn test_update_replace_push_pull() {
        let ctx = context();
        let mut spec = UpdateSpec::new("k");
        spec.replace
            .insert("name".to_string(), Value::Text("Max".into()));
        spec.push.insert(
            "tags".to_string(),
            Value::Array(vec![Value::Text("x".into())]),
        );
        spec.pull.insert(
            "tags".to_string(),
            Value::Array(vec![Value::Text("a".into()), Value::Text("b".into())]),
        );

        let (sql, params) = build_update(&ctx, "pet", &spec).unwrap().unwrap();
        assert_eq!(
            sql,
            "UPDATE \"pet\" SET \"name\" = $1, \
             \"tags\" = array_cat(\"tags\", $2), \
             \"tags\" = array(SELECT x FROM unnest(\"tags\") x \
             WHERE x NOT IN ($3, $4)) WHERE \"id\" = $5"
        );
        assert_eq!(params.len(), 5);
        assert_eq!(params[4], Value::Text("k".into()));
    }

    #[test]
    fn test_update_scalar_operands() {
        let ctx = context();
        let mut spec = UpdateSpec::new("k");
        spec.push
            .insert("tags".to_string(), Value::Text("new".into()));
        spec.pull
            .insert("tags".to_string(), Value::Text("old".into()));

        let (sql, _) = build_update(&ctx, "pet", &spec).unwrap().unwrap();
        assert_eq!(
            sql,
            "UPDATE \"pet\" SET \"tags\" = array_append(\"tags\", $1), \
             \"tags\" = array_remove(\"tags\", $2) WHERE \"id\" = $3"
        );
    }

    #[test]
    fn test_empty_update_spec_compiles_to_nothing() {
        let ctx = context();
        let statement = build_update(&ctx, "pet", &UpdateSpec::new("k")).unwrap();
        assert!(statement.is_none());
    }

    #[test]
    fn test_delete_statements() {
        let ctx = context();
        let ids = vec![Value::Text("a".into()), Value::Text("b".into())];
        let (sql, params) = build_delete(&ctx, "pet", Some(&ids)).unwrap().unwrap();
        assert_eq!(sql, "DELETE FROM \"pet\" WHERE \"id\" IN ($1, $2)");
        assert_eq!(params, ids);

        let (sql, params) = build_delete(&ctx, "pet", None).unwrap().unwrap();
        assert_eq!(sql, "DELETE FROM \"pet\"");
        assert!(params.is_empty());

        assert!(build_delete(&ctx, "pet", Some(&[])).unwrap().is_none());
    }

    #[test]
    fn test_create_splices_generated_keys_in_order() {
        let mut ctx = context();
        ctx.options.key_generation = KeyGeneration::Backend;
        let executor = ScriptedExecutor::new();
        executor.script_query(Ok(vec![
            Row::from_pairs(vec![("id".to_string(), Value::Int(1))]),
            Row::from_pairs(vec![("id".to_string(), Value::Int(2))]),
        ]));

        let cx = Cx::for_testing();
        let created = unwrap_outcome(run(create(
            &cx,
            &executor,
            &ctx,
            "user",
            vec![
                record(&[("name", Value::Text("A".into()))]),
                record(&[("name", Value::Text("B".into()))]),
            ],
        )));
        assert_eq!(created[0].get("id"), Some(&Value::Int(1)));
        assert_eq!(created[1].get("id"), Some(&Value::Int(2)));
        assert_eq!(created[1].get("name"), Some(&Value::Text("B".into())));
    }

    #[test]
    fn test_create_empty_batch_issues_no_statement() {
        let ctx = context();
        let executor = ScriptedExecutor::new();
        let cx = Cx::for_testing();
        let created = unwrap_outcome(run(create(&cx, &executor, &ctx, "user", Vec::new())));
        assert!(created.is_empty());
        assert!(executor.statements().is_empty());
    }

    #[test]
    fn test_unique_violation_surfaces_as_conflict() {
        let ctx = context();
        let executor = ScriptedExecutor::new();
        executor.script_execute(Err(Error::backend(
            "duplicate key value violates unique constraint",
            SQLSTATE_UNIQUE_VIOLATION,
        )));

        let cx = Cx::for_testing();
        let outcome = run(create(
            &cx,
            &executor,
            &ctx,
            "user",
            vec![record(&[("name", Value::Text("A".into()))])],
        ));
        assert!(matches!(outcome, Outcome::Err(Error::Conflict(_))));
    }

    #[test]
    fn test_update_tolerates_missing_column() {
        let ctx = context();
        let executor = ScriptedExecutor::new();
        executor.script_execute(Err(Error::backend(
            "column \"name\" does not exist",
            SQLSTATE_UNDEFINED_COLUMN,
        )));
        executor.script_execute(Ok(1));

        let mut first = UpdateSpec::new("a");
        first
            .replace
            .insert("name".to_string(), Value::Text("X".into()));
        let mut second = UpdateSpec::new("b");
        second
            .replace
            .insert("name".to_string(), Value::Text("Y".into()));

        let cx = Cx::for_testing();
        let total = unwrap_outcome(run(update(
            &cx,
            &executor,
            &ctx,
            "user",
            &[first, second],
        )));
        assert_eq!(total, 1);
        assert_eq!(executor.statements().len(), 2);
    }
}
