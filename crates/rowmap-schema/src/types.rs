//! Mapping from abstract field kinds to physical column types.

use rowmap_core::{Error, PrimaryKeyDecl, Primitive, Result};

/// The physical column type for a primitive field kind.
pub fn column_type(primitive: Primitive) -> &'static str {
    match primitive {
        Primitive::Text => "text",
        Primitive::Number => "double precision",
        Primitive::Boolean => "boolean",
        Primitive::Timestamp => "timestamp",
        Primitive::Binary => "bytea",
        Primitive::Structured => "jsonb",
    }
}

/// Resolve the declared primary-key type to a physical column type.
///
/// Only text-like and numeric-like primitive kinds make sense as primary
/// keys; anything else must be declared as an explicit physical type name.
pub fn primary_key_type(declaration: &PrimaryKeyDecl) -> Result<String> {
    match declaration {
        PrimaryKeyDecl::Kind(Primitive::Text) => Ok("text".to_string()),
        PrimaryKeyDecl::Kind(Primitive::Number) => Ok("double precision".to_string()),
        PrimaryKeyDecl::Kind(kind) => Err(Error::configuration(format!(
            "invalid primary key kind {kind:?}; use Text, Number, or a physical type name"
        ))),
        PrimaryKeyDecl::Physical(name) => Ok(name.to_lowercase()),
    }
}

/// The column type used for foreign-key columns referencing a primary key
/// of the given type. Serial kinds are auto-increment pseudo-types and
/// cannot be reused as a referenced column, so they downgrade to their
/// plain integer base.
pub fn foreign_key_type(primary_key_type: &str) -> &str {
    match primary_key_type {
        "smallserial" => "smallint",
        "serial" => "integer",
        "bigserial" => "bigint",
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitive_mapping() {
        assert_eq!(column_type(Primitive::Text), "text");
        assert_eq!(column_type(Primitive::Number), "double precision");
        assert_eq!(column_type(Primitive::Binary), "bytea");
        assert_eq!(column_type(Primitive::Structured), "jsonb");
    }

    #[test]
    fn test_primary_key_declaration() {
        assert_eq!(
            primary_key_type(&PrimaryKeyDecl::Kind(Primitive::Text)).unwrap(),
            "text"
        );
        assert_eq!(
            primary_key_type(&PrimaryKeyDecl::Physical("BIGSERIAL".to_string())).unwrap(),
            "bigserial"
        );
        assert!(matches!(
            primary_key_type(&PrimaryKeyDecl::Kind(Primitive::Boolean)),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_serial_downgrade() {
        assert_eq!(foreign_key_type("serial"), "integer");
        assert_eq!(foreign_key_type("bigserial"), "bigint");
        assert_eq!(foreign_key_type("smallserial"), "smallint");
        assert_eq!(foreign_key_type("text"), "text");
    }
}
