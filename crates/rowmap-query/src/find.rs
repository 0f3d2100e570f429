//! Compilation and execution of find operations.
//!
//! One find produces two statements sharing a single WHERE clause: the
//! SELECT for records and a `count(*)` over the same filter, dispatched
//! concurrently so the reported total is independent of pagination.

use std::collections::{BTreeMap, BTreeSet};

use asupersync::{Cx, Outcome};
use rowmap_core::{
    AdapterContext, Error, Executor, Record, Result, Value, codec, quote_ident,
};

use crate::builder::StatementBuilder;
use crate::relation;

/// Column projection: either an explicit inclusion set or an exclusion set
/// whose complement is selected. The primary key is always included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldSelection {
    /// Select only these fields (plus the primary key).
    Include(BTreeSet<String>),
    /// Select every declared field except these (plus the primary key).
    Exclude(BTreeSet<String>),
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    /// Ascending by value, or by length for array fields.
    Ascending,
    /// Descending by value, or by length for array fields.
    Descending,
}

/// Inclusive range bounds; either end may be absent. Applied to the value
/// for scalar fields and to the array length for array fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bounds {
    /// Lower bound (`>=`).
    pub lower: Option<Value>,
    /// Upper bound (`<=`).
    pub upper: Option<Value>,
}

impl Bounds {
    /// A lower bound only.
    pub fn at_least(value: impl Into<Value>) -> Self {
        Self {
            lower: Some(value.into()),
            upper: None,
        }
    }

    /// An upper bound only.
    pub fn at_most(value: impl Into<Value>) -> Self {
        Self {
            lower: None,
            upper: Some(value.into()),
        }
    }

    /// Both bounds.
    pub fn between(lower: impl Into<Value>, upper: impl Into<Value>) -> Self {
        Self {
            lower: Some(lower.into()),
            upper: Some(upper.into()),
        }
    }

    fn is_unbounded(&self) -> bool {
        self.lower.is_none() && self.upper.is_none()
    }
}

/// Abstract find options, compiled to one SELECT/COUNT statement pair.
///
/// Filter field names in `matching`, `exists`, and `range` may be relation
/// paths (see [`crate::relation`]). All present filters combine as a
/// conjunction.
#[derive(Debug, Clone, Default)]
pub struct FindOptions {
    /// Column projection; `None` selects `*`.
    pub fields: Option<FieldSelection>,
    /// Equality/membership filters. A scalar field matches a single value
    /// or any of a list of candidates; an array field matches by
    /// containment of the supplied element(s).
    pub matching: BTreeMap<String, Value>,
    /// Existence filters: non-NULL for scalar fields, non-empty for array
    /// fields.
    pub exists: BTreeMap<String, bool>,
    /// Range filters.
    pub range: BTreeMap<String, Bounds>,
    /// Sort fields and directions.
    pub sort: BTreeMap<String, SortOrder>,
    /// Maximum number of records.
    pub limit: Option<u64>,
    /// Number of records to skip.
    pub offset: Option<u64>,
}

/// A compiled find: the record SELECT and the count statement, sharing one
/// parameter list.
#[derive(Debug, Clone, PartialEq)]
pub struct FindStatements {
    /// The record SELECT, with projection, ordering, and pagination.
    pub select: String,
    /// `count(*)` over the identical WHERE clause.
    pub count: String,
    /// Parameters, valid for both statements.
    pub params: Vec<Value>,
}

/// Result of a find: decoded records plus the filter-wide total.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindResult {
    /// Decoded records, in result order.
    pub records: Vec<Record>,
    /// Matching-row count, independent of limit and offset.
    pub count: u64,
}

/// Compile a find into its statement pair. Returns `None` for the empty
/// explicit id list, which must not reach the backend.
pub fn build_find(
    ctx: &AdapterContext,
    type_name: &str,
    ids: Option<&[Value]>,
    options: &FindOptions,
) -> Result<Option<FindStatements>> {
    if let Some(ids) = ids {
        if ids.is_empty() {
            return Ok(None);
        }
    }

    let fields = ctx.fields(type_name)?;
    let primary = quote_ident(&ctx.keys.primary);
    let table = quote_ident(ctx.table(type_name));

    let columns = match &options.fields {
        None => "*".to_string(),
        Some(FieldSelection::Include(include)) => {
            let mut columns = vec![primary.clone()];
            for field in include {
                if field == &ctx.keys.primary {
                    continue;
                }
                ctx.schema.field(type_name, field)?;
                columns.push(quote_ident(field));
            }
            columns.join(", ")
        }
        Some(FieldSelection::Exclude(exclude)) => {
            let mut columns = vec![primary.clone()];
            for field in fields.keys() {
                if !exclude.contains(field) {
                    columns.push(quote_ident(field));
                }
            }
            columns.join(", ")
        }
    };

    let mut builder = StatementBuilder::new();
    let mut predicates = Vec::new();

    if let Some(ids) = ids {
        let list = ids
            .iter()
            .map(|id| builder.placeholder(codec::encode_value(id.clone())))
            .collect::<Vec<_>>()
            .join(", ");
        predicates.push(format!("{primary} IN ({list})"));
    }

    for (field, value) in &options.matching {
        let predicate = if relation::is_path(field) {
            let value = value.clone();
            relation::resolve(ctx, type_name, field, &mut builder, |builder, t, f| {
                match_predicate(ctx, t, f, value, builder)
            })?
        } else {
            match_predicate(ctx, type_name, field, value.clone(), &mut builder)?
        };
        predicates.push(predicate);
    }

    for (field, &present) in &options.exists {
        let predicate = if relation::is_path(field) {
            relation::resolve(ctx, type_name, field, &mut builder, |_, t, f| {
                exists_predicate(ctx, t, f, present)
            })?
        } else {
            exists_predicate(ctx, type_name, field, present)?
        };
        predicates.push(predicate);
    }

    for (field, bounds) in &options.range {
        if bounds.is_unbounded() {
            continue;
        }
        let predicate = if relation::is_path(field) {
            let bounds = bounds.clone();
            relation::resolve(ctx, type_name, field, &mut builder, |builder, t, f| {
                range_predicate(ctx, t, f, &bounds, builder)
            })?
        } else {
            range_predicate(ctx, type_name, field, bounds, &mut builder)?
        };
        predicates.push(predicate);
    }

    if let Some(raw) = &ctx.options.raw_condition {
        predicates.push(raw.clone());
    }

    let where_clause = if predicates.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", predicates.join(" AND "))
    };

    let mut order = Vec::new();
    for (field, direction) in &options.sort {
        let definition = ctx.schema.field(type_name, field)?;
        let expression = if definition.is_array {
            format!("coalesce(array_length({}, 1), 0)", quote_ident(field))
        } else {
            quote_ident(field)
        };
        let direction = match direction {
            SortOrder::Ascending => "ASC",
            SortOrder::Descending => "DESC",
        };
        order.push(format!("{expression} {direction}"));
    }
    let order_clause = if order.is_empty() {
        String::new()
    } else {
        format!(" ORDER BY {}", order.join(", "))
    };

    let mut slice = String::new();
    if let Some(limit) = options.limit {
        slice.push_str(&format!(" LIMIT {limit}"));
    }
    if let Some(offset) = options.offset {
        slice.push_str(&format!(" OFFSET {offset}"));
    }

    Ok(Some(FindStatements {
        select: format!("SELECT {columns} FROM {table}{where_clause}{order_clause}{slice}"),
        count: format!("SELECT count(*) FROM {table}{where_clause}"),
        params: builder.into_params(),
    }))
}

fn match_predicate(
    ctx: &AdapterContext,
    type_name: &str,
    field: &str,
    value: Value,
    builder: &mut StatementBuilder,
) -> Result<String> {
    let definition = ctx.schema.field(type_name, field)?;
    let column = quote_ident(field);

    if definition.is_array {
        // Containment against a literal array; binary and whole-number
        // elements carry an explicit cast so operator resolution is
        // unambiguous.
        let elements = match value {
            Value::Array(items) => items,
            single => vec![single],
        };
        let literals = elements
            .into_iter()
            .map(|element| {
                let cast = if matches!(element, Value::Bytes(_)) {
                    "::bytea"
                } else if element.is_whole_number() {
                    "::int"
                } else {
                    ""
                };
                format!("{}{cast}", builder.placeholder(codec::encode_value(element)))
            })
            .collect::<Vec<_>>()
            .join(", ");
        return Ok(format!("{column} @> ARRAY[{literals}]"));
    }

    match value {
        Value::Array(candidates) => {
            let list = candidates
                .into_iter()
                .map(|candidate| builder.placeholder(codec::encode_value(candidate)))
                .collect::<Vec<_>>()
                .join(", ");
            Ok(format!("{column} IN ({list})"))
        }
        single => Ok(format!(
            "{column} = {}",
            builder.placeholder(codec::encode_value(single))
        )),
    }
}

fn exists_predicate(
    ctx: &AdapterContext,
    type_name: &str,
    field: &str,
    present: bool,
) -> Result<String> {
    let definition = ctx.schema.field(type_name, field)?;
    let column = quote_ident(field);
    if definition.is_array {
        let comparison = if present { "> 0" } else { "= 0" };
        Ok(format!("coalesce(array_length({column}, 1), 0) {comparison}"))
    } else if present {
        Ok(format!("{column} IS NOT NULL"))
    } else {
        Ok(format!("{column} IS NULL"))
    }
}

fn range_predicate(
    ctx: &AdapterContext,
    type_name: &str,
    field: &str,
    bounds: &Bounds,
    builder: &mut StatementBuilder,
) -> Result<String> {
    let definition = ctx.schema.field(type_name, field)?;
    let subject = if definition.is_array {
        format!("coalesce(array_length({}, 1), 0)", quote_ident(field))
    } else {
        quote_ident(field)
    };

    let mut parts = Vec::new();
    if let Some(lower) = &bounds.lower {
        parts.push(format!(
            "{subject} >= {}",
            builder.placeholder(codec::encode_value(lower.clone()))
        ));
    }
    if let Some(upper) = &bounds.upper {
        parts.push(format!(
            "{subject} <= {}",
            builder.placeholder(codec::encode_value(upper.clone()))
        ));
    }
    Ok(parts.join(" AND "))
}

/// Execute a find: compile, dispatch the SELECT and the count concurrently,
/// decode the rows.
pub async fn find<E: Executor>(
    cx: &Cx,
    executor: &E,
    ctx: &AdapterContext,
    type_name: &str,
    ids: Option<&[Value]>,
    options: &FindOptions,
) -> Outcome<FindResult, Error> {
    let statements = match build_find(ctx, type_name, ids, options) {
        Ok(Some(statements)) => statements,
        Ok(None) => return Outcome::Ok(FindResult::default()),
        Err(e) => return Outcome::Err(e),
    };
    tracing::debug!(sql = %statements.select, params = statements.params.len(), "find");

    let (rows, count_rows) = futures::join!(
        executor.query(cx, &statements.select, &statements.params),
        executor.query(cx, &statements.count, &statements.params)
    );
    let rows = match rows {
        Outcome::Ok(rows) => rows,
        Outcome::Err(e) => return Outcome::Err(e),
        Outcome::Cancelled(r) => return Outcome::Cancelled(r),
        Outcome::Panicked(p) => return Outcome::Panicked(p),
    };
    let count_rows = match count_rows {
        Outcome::Ok(rows) => rows,
        Outcome::Err(e) => return Outcome::Err(e),
        Outcome::Cancelled(r) => return Outcome::Cancelled(r),
        Outcome::Panicked(p) => return Outcome::Panicked(p),
    };

    let mut records = Vec::with_capacity(rows.len());
    for row in &rows {
        match codec::decode_record(ctx, type_name, row) {
            Ok(record) => records.push(record),
            Err(e) => return Outcome::Err(e),
        }
    }

    // Some backends report count(*) as text.
    let count = count_rows
        .first()
        .and_then(|row| row.get(0))
        .and_then(Value::as_i64)
        .and_then(|n| u64::try_from(n).ok());
    let Some(count) = count else {
        return Outcome::Err(Error::decode("count query returned no numeric value"));
    };

    Outcome::Ok(FindResult { records, count })
}

#[cfg(test)]
mod tests {
    use rowmap_core::Row;

    use super::*;
    use crate::testing::{ScriptedExecutor, context, run, unwrap_outcome};

    fn ids(values: &[&str]) -> Vec<Value> {
        values.iter().map(|v| Value::Text((*v).to_string())).collect()
    }

    #[test]
    fn test_empty_id_list_compiles_to_nothing() {
        let ctx = context();
        let statements = build_find(&ctx, "user", Some(&[]), &FindOptions::default()).unwrap();
        assert!(statements.is_none());
    }

    #[test]
    fn test_id_filter_and_star_projection() {
        let ctx = context();
        let id_values = ids(&["a", "b"]);
        let statements = build_find(&ctx, "user", Some(&id_values), &FindOptions::default())
            .unwrap()
            .unwrap();
        assert_eq!(
            statements.select,
            "SELECT * FROM \"user\" WHERE \"id\" IN ($1, $2)"
        );
        assert_eq!(
            statements.count,
            "SELECT count(*) FROM \"user\" WHERE \"id\" IN ($1, $2)"
        );
        assert_eq!(statements.params, id_values);
    }

    #[test]
    fn test_inclusion_projection_always_carries_primary_key() {
        let ctx = context();
        let options = FindOptions {
            fields: Some(FieldSelection::Include(
                ["name".to_string()].into_iter().collect(),
            )),
            ..FindOptions::default()
        };
        let statements = build_find(&ctx, "user", None, &options).unwrap().unwrap();
        assert_eq!(statements.select, "SELECT \"id\", \"name\" FROM \"user\"");
    }

    #[test]
    fn test_exclusion_projection_selects_the_complement() {
        let ctx = context();
        let options = FindOptions {
            fields: Some(FieldSelection::Exclude(
                ["age".to_string(), "picture".to_string()]
                    .into_iter()
                    .collect(),
            )),
            ..FindOptions::default()
        };
        let statements = build_find(&ctx, "user", None, &options).unwrap().unwrap();
        assert_eq!(
            statements.select,
            "SELECT \"id\", \"name\", \"nicknames\", \"pets\" FROM \"user\""
        );
    }

    #[test]
    fn test_scalar_match_equality_and_membership() {
        let ctx = context();
        let options = FindOptions {
            matching: [
                (
                    "age".to_string(),
                    Value::Array(vec![Value::Int(30), Value::Int(40)]),
                ),
                ("name".to_string(), Value::Text("Alice".into())),
            ]
            .into_iter()
            .collect(),
            ..FindOptions::default()
        };
        let statements = build_find(&ctx, "user", None, &options).unwrap().unwrap();
        assert_eq!(
            statements.select,
            "SELECT * FROM \"user\" WHERE \"age\" IN ($1, $2) AND \"name\" = $3"
        );
        assert_eq!(
            statements.params,
            vec![Value::Int(30), Value::Int(40), Value::Text("Alice".into())]
        );
    }

    #[test]
    fn test_array_match_containment_with_casts() {
        let ctx = context();
        let options = FindOptions {
            matching: [(
                "nicknames".to_string(),
                Value::Array(vec![
                    Value::Text("Al".into()),
                    Value::Int(3),
                    Value::Bytes(vec![0xca, 0xfe]),
                ]),
            )]
            .into_iter()
            .collect(),
            ..FindOptions::default()
        };
        let statements = build_find(&ctx, "user", None, &options).unwrap().unwrap();
        assert_eq!(
            statements.select,
            "SELECT * FROM \"user\" WHERE \"nicknames\" @> ARRAY[$1, $2::int, $3::bytea]"
        );
        // Binary elements crossed the boundary as tagged hex literals.
        assert_eq!(statements.params[2], Value::Text("\\xcafe".into()));
    }

    #[test]
    fn test_single_value_containment_wraps_into_array() {
        let ctx = context();
        let options = FindOptions {
            matching: [("nicknames".to_string(), Value::Text("Al".into()))]
                .into_iter()
                .collect(),
            ..FindOptions::default()
        };
        let statements = build_find(&ctx, "user", None, &options).unwrap().unwrap();
        assert_eq!(
            statements.select,
            "SELECT * FROM \"user\" WHERE \"nicknames\" @> ARRAY[$1]"
        );
    }

    #[test]
    fn test_exists_and_range_filters() {
        let ctx = context();
        let options = FindOptions {
            exists: [
                ("name".to_string(), true),
                ("nicknames".to_string(), false),
            ]
            .into_iter()
            .collect(),
            range: [
                ("age".to_string(), Bounds::between(18i64, 65i64)),
                ("nicknames".to_string(), Bounds::at_least(1i64)),
            ]
            .into_iter()
            .collect(),
            ..FindOptions::default()
        };
        let statements = build_find(&ctx, "user", None, &options).unwrap().unwrap();
        assert_eq!(
            statements.select,
            "SELECT * FROM \"user\" WHERE \"name\" IS NOT NULL \
             AND coalesce(array_length(\"nicknames\", 1), 0) = 0 \
             AND \"age\" >= $1 AND \"age\" <= $2 \
             AND coalesce(array_length(\"nicknames\", 1), 0) >= $3"
        );
        assert_eq!(
            statements.params,
            vec![Value::Int(18), Value::Int(65), Value::Int(1)]
        );
    }

    #[test]
    fn test_sort_and_pagination() {
        let ctx = context();
        let options = FindOptions {
            sort: [
                ("age".to_string(), SortOrder::Descending),
                ("nicknames".to_string(), SortOrder::Ascending),
            ]
            .into_iter()
            .collect(),
            limit: Some(10),
            offset: Some(5),
            ..FindOptions::default()
        };
        let statements = build_find(&ctx, "user", None, &options).unwrap().unwrap();
        assert_eq!(
            statements.select,
            "SELECT * FROM \"user\" ORDER BY \"age\" DESC, \
             coalesce(array_length(\"nicknames\", 1), 0) ASC LIMIT 10 OFFSET 5"
        );
        // Pagination never leaks into the count statement.
        assert_eq!(statements.count, "SELECT count(*) FROM \"user\"");
    }

    #[test]
    fn test_relation_path_in_match() {
        let ctx = context();
        let options = FindOptions {
            matching: [("owner:name".to_string(), Value::Text("Alice".into()))]
                .into_iter()
                .collect(),
            ..FindOptions::default()
        };
        let statements = build_find(&ctx, "pet", None, &options).unwrap().unwrap();
        assert_eq!(
            statements.select,
            "SELECT * FROM \"pet\" WHERE \"id\" IN (SELECT \"id\" FROM \"pet\" \
             WHERE \"owner\" IN (SELECT \"id\" FROM \"user\" WHERE \"name\" = $1))"
        );
        assert_eq!(statements.params, vec![Value::Text("Alice".into())]);
    }

    #[test]
    fn test_relation_path_validation_fails_eagerly() {
        let ctx = context();
        let options = FindOptions {
            matching: [("name:anything".to_string(), Value::Int(1))]
                .into_iter()
                .collect(),
            ..FindOptions::default()
        };
        let err = build_find(&ctx, "user", None, &options).unwrap_err();
        assert!(matches!(err, Error::Schema(_)));
    }

    #[test]
    fn test_raw_condition_appended_verbatim() {
        let mut ctx = context();
        ctx.options.raw_condition = Some("\"deleted\" IS NULL".to_string());
        let options = FindOptions {
            matching: [("name".to_string(), Value::Text("A".into()))]
                .into_iter()
                .collect(),
            ..FindOptions::default()
        };
        let statements = build_find(&ctx, "user", None, &options).unwrap().unwrap();
        assert_eq!(
            statements.select,
            "SELECT * FROM \"user\" WHERE \"name\" = $1 AND \"deleted\" IS NULL"
        );
    }

    #[test]
    fn test_find_decodes_records_and_count() {
        let ctx = context();
        let executor = ScriptedExecutor::new();
        executor.script_query(Ok(vec![Row::from_pairs(vec![
            ("id".to_string(), Value::Text("a".into())),
            ("name".to_string(), Value::Text("Alice".into())),
        ])]));
        executor.script_query(Ok(vec![Row::from_pairs(vec![(
            "count".to_string(),
            Value::Text("7".into()),
        )])]));

        let cx = Cx::for_testing();
        let result = unwrap_outcome(run(find(
            &cx,
            &executor,
            &ctx,
            "user",
            None,
            &FindOptions::default(),
        )));
        assert_eq!(result.records.len(), 1);
        assert_eq!(
            result.records[0].get("name"),
            Some(&Value::Text("Alice".into()))
        );
        assert_eq!(result.count, 7);
        assert_eq!(executor.statements().len(), 2);
    }

    #[test]
    fn test_find_with_empty_ids_issues_no_statement() {
        let ctx = context();
        let executor = ScriptedExecutor::new();
        let cx = Cx::for_testing();
        let result = unwrap_outcome(run(find(
            &cx,
            &executor,
            &ctx,
            "user",
            Some(&[]),
            &FindOptions::default(),
        )));
        assert_eq!(result, FindResult::default());
        assert!(executor.statements().is_empty());
    }
}
