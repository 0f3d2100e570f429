//! Relation-path filters compiled to nested subqueries.
//!
//! A filter field name may carry a delimiter-separated path such as
//! `owner:name`: every segment but the last names a link field to follow,
//! the last names the leaf field being compared. The path is validated
//! against the declared schema before any SQL is produced, so a bad path
//! surfaces as a schema error rather than a backend syntax error.

use rowmap_core::{AdapterContext, Error, Result, quote_ident};

use crate::builder::StatementBuilder;

/// Delimiter separating hops in a relation filter path.
pub const PATH_DELIMITER: char = ':';

/// Whether a filter field name is a relation path.
pub(crate) fn is_path(field: &str) -> bool {
    field.contains(PATH_DELIMITER)
}

/// Compile a relation path into a predicate on the filtered type's primary
/// key.
///
/// Construction is innermost-first: the leaf comparison (built by the
/// caller-supplied closure, which pushes its own parameters) seeds a
/// `SELECT "id" FROM <leaf table>` subquery, and each hop going outward
/// wraps it behind the hop's link column, `IN (…)` for scalar links and
/// `&& ARRAY(…)` for array links. The returned predicate is
/// `"id" IN (<outermost subquery>)`.
pub(crate) fn resolve<F>(
    ctx: &AdapterContext,
    type_name: &str,
    path: &str,
    builder: &mut StatementBuilder,
    leaf: F,
) -> Result<String>
where
    F: FnOnce(&mut StatementBuilder, &str, &str) -> Result<String>,
{
    let segments: Vec<&str> = path.split(PATH_DELIMITER).collect();
    let (leaf_field, hops) = segments
        .split_last()
        .ok_or_else(|| Error::schema(format!("empty relation path \"{path}\"")))?;

    // Follow every hop through the schema before building anything.
    let mut traversed = Vec::with_capacity(hops.len());
    let mut current = type_name;
    for segment in hops {
        let definition = ctx.schema.field(current, segment)?;
        let target = definition.link_target().ok_or_else(|| {
            Error::schema(format!(
                "relation path \"{path}\": \"{current}.{segment}\" is not a link field"
            ))
        })?;
        if !ctx.schema.contains_type(target) {
            return Err(Error::schema(format!(
                "relation path \"{path}\": link target \"{target}\" is not a declared type"
            )));
        }
        traversed.push((current, *segment, definition.is_array));
        current = target;
    }

    let primary = quote_ident(&ctx.keys.primary);
    let condition = leaf(builder, current, *leaf_field)?;
    let mut subquery = format!(
        "SELECT {primary} FROM {} WHERE {condition}",
        quote_ident(ctx.table(current))
    );
    for (owner, field, is_array) in traversed.into_iter().rev() {
        let predicate = if is_array {
            format!("{} && ARRAY({subquery})", quote_ident(field))
        } else {
            format!("{} IN ({subquery})", quote_ident(field))
        };
        subquery = format!(
            "SELECT {primary} FROM {} WHERE {predicate}",
            quote_ident(ctx.table(owner))
        );
    }

    Ok(format!("{primary} IN ({subquery})"))
}

#[cfg(test)]
mod tests {
    use rowmap_core::Value;

    use super::*;
    use crate::testing::context;

    fn leaf_equals(
        value: &str,
    ) -> impl FnOnce(&mut StatementBuilder, &str, &str) -> Result<String> {
        let value = Value::Text(value.to_string());
        move |builder, _leaf_type, leaf_field| {
            Ok(format!(
                "{} = {}",
                quote_ident(leaf_field),
                builder.placeholder(value)
            ))
        }
    }

    #[test]
    fn test_single_hop_scalar_link() {
        let ctx = context();
        let mut builder = StatementBuilder::new();
        let predicate =
            resolve(&ctx, "pet", "owner:name", &mut builder, leaf_equals("Alice")).unwrap();
        assert_eq!(
            predicate,
            "\"id\" IN (SELECT \"id\" FROM \"pet\" WHERE \"owner\" IN \
             (SELECT \"id\" FROM \"user\" WHERE \"name\" = $1))"
        );
        assert_eq!(builder.into_params(), vec![Value::Text("Alice".into())]);
    }

    #[test]
    fn test_array_link_uses_overlap_operator() {
        let ctx = context();
        let mut builder = StatementBuilder::new();
        let predicate =
            resolve(&ctx, "user", "pets:name", &mut builder, leaf_equals("Rex")).unwrap();
        assert_eq!(
            predicate,
            "\"id\" IN (SELECT \"id\" FROM \"user\" WHERE \"pets\" && \
             ARRAY(SELECT \"id\" FROM \"pet\" WHERE \"name\" = $1))"
        );
    }

    #[test]
    fn test_two_hop_path_nests_one_subquery_per_segment() {
        let ctx = context();
        let mut builder = StatementBuilder::new();
        let predicate = resolve(
            &ctx,
            "pet",
            "owner:pets:name",
            &mut builder,
            leaf_equals("Rex"),
        )
        .unwrap();
        assert_eq!(predicate.matches("SELECT").count(), 3);
        assert!(predicate.ends_with("\"name\" = $1)))"));
    }

    #[test]
    fn test_non_link_segment_is_a_schema_error() {
        let ctx = context();
        let mut builder = StatementBuilder::new();
        let err = resolve(&ctx, "user", "name:foo", &mut builder, leaf_equals("x")).unwrap_err();
        assert!(matches!(err, Error::Schema(_)));
        assert!(err.to_string().contains("not a link field"));
    }

    #[test]
    fn test_unknown_leaf_field_is_a_schema_error() {
        let ctx = context();
        let mut builder = StatementBuilder::new();
        let err = resolve(
            &ctx,
            "pet",
            "owner:bogus",
            &mut builder,
            |builder, leaf_type, leaf_field| {
                let ctx = context();
                ctx.schema.field(leaf_type, leaf_field)?;
                Ok(format!(
                    "{} = {}",
                    quote_ident(leaf_field),
                    builder.placeholder(Value::Null)
                ))
            },
        )
        .unwrap_err();
        assert!(matches!(err, Error::Schema(_)));
    }
}
