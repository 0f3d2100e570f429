//! The declared record-type schema and adapter configuration.
//!
//! Record types are runtime data: a type name mapped to field definitions.
//! Field shape is an exhaustively matched tagged union ([`FieldKind`]) plus
//! orthogonal flags, so nothing downstream ever inspects values to learn a
//! field's shape. Link targets are stored by name and resolved by lookup at
//! use time, which keeps self-referential and cyclic type graphs
//! representable without reference cycles.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::value::Value;

/// Primitive field kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Primitive {
    /// Arbitrary text.
    Text,
    /// Double-precision number.
    Number,
    /// Boolean.
    Boolean,
    /// Point in time.
    Timestamp,
    /// Raw binary payload.
    Binary,
    /// Structured (JSON) value.
    Structured,
}

impl Primitive {
    /// Parse a primitive kind name (case-insensitive).
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "text" | "string" => Some(Primitive::Text),
            "number" => Some(Primitive::Number),
            "boolean" => Some(Primitive::Boolean),
            "timestamp" | "date" => Some(Primitive::Timestamp),
            "binary" | "buffer" => Some(Primitive::Binary),
            "structured" | "object" => Some(Primitive::Structured),
            _ => None,
        }
    }
}

/// What a field holds: a primitive value or a link to another record type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    /// A primitive value.
    Scalar(Primitive),
    /// A reference to another record type, by name.
    Link(String),
}

/// Per-field metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDefinition {
    /// Scalar or link.
    pub kind: FieldKind,
    /// Whether the field is array-valued.
    pub is_array: bool,
    /// Whether the field's value is materialized from the inverse side of a
    /// relation and passed through rather than derived here.
    pub denormalized_inverse: bool,
}

impl FieldDefinition {
    /// A scalar field of the given primitive kind.
    pub fn scalar(primitive: Primitive) -> Self {
        Self {
            kind: FieldKind::Scalar(primitive),
            is_array: false,
            denormalized_inverse: false,
        }
    }

    /// A link field referencing the given record type.
    pub fn link(target: impl Into<String>) -> Self {
        Self {
            kind: FieldKind::Link(target.into()),
            is_array: false,
            denormalized_inverse: false,
        }
    }

    /// Mark as array-valued.
    pub fn array(mut self) -> Self {
        self.is_array = true;
        self
    }

    /// Mark as denormalized-inverse.
    pub fn denormalized(mut self) -> Self {
        self.denormalized_inverse = true;
        self
    }

    /// Singular links are stored as foreign-key columns. Array links are
    /// plain array columns (no array-of-foreign-keys support in the
    /// backend).
    pub fn is_foreign_key(&self) -> bool {
        matches!(self.kind, FieldKind::Link(_)) && !self.is_array
    }

    /// The link target type name, for link fields.
    pub fn link_target(&self) -> Option<&str> {
        match &self.kind {
            FieldKind::Link(target) => Some(target),
            FieldKind::Scalar(_) => None,
        }
    }

    /// The primitive kind, for scalar fields.
    pub fn primitive(&self) -> Option<Primitive> {
        match self.kind {
            FieldKind::Scalar(p) => Some(p),
            FieldKind::Link(_) => None,
        }
    }
}

/// Field definitions of one record type, keyed by field name.
pub type FieldMap = BTreeMap<String, FieldDefinition>;

/// A record as it crosses the adapter boundary: field name to value.
/// `BTreeMap` gives the fixed lexicographic field order that batched
/// inserts rely on.
pub type Record = BTreeMap<String, Value>;

/// Field names used by schema descriptions supplied as data. The host
/// framework chooses these names; nothing in this layer hardcodes them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyConfig {
    /// Primary key field name.
    pub primary: String,
    /// Marker naming a field's primitive kind.
    pub kind: String,
    /// Marker naming a field's link target.
    pub link: String,
    /// Marker flagging an array-valued field.
    pub is_array: String,
    /// Marker flagging a denormalized-inverse field.
    pub denormalized_inverse: String,
}

impl Default for KeyConfig {
    fn default() -> Self {
        Self {
            primary: "id".to_string(),
            kind: "type".to_string(),
            link: "link".to_string(),
            is_array: "isArray".to_string(),
            denormalized_inverse: "denormalizedInverse".to_string(),
        }
    }
}

/// The full declared schema: record type name to field definitions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordSchema {
    types: BTreeMap<String, FieldMap>,
}

impl RecordSchema {
    /// An empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a record type. Replaces any previous definition of the same name.
    pub fn insert_type(&mut self, name: impl Into<String>, fields: FieldMap) -> &mut Self {
        self.types.insert(name.into(), fields);
        self
    }

    /// Declared type names, in lexicographic order.
    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }

    /// Whether a type is declared.
    pub fn contains_type(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    /// Field definitions of a type.
    pub fn fields(&self, type_name: &str) -> Result<&FieldMap> {
        self.types
            .get(type_name)
            .ok_or_else(|| Error::schema(format!("unknown record type \"{type_name}\"")))
    }

    /// A single field definition.
    pub fn field(&self, type_name: &str, field: &str) -> Result<&FieldDefinition> {
        self.fields(type_name)?.get(field).ok_or_else(|| {
            Error::schema(format!(
                "record type \"{type_name}\" has no field \"{field}\""
            ))
        })
    }

    /// Parse a schema from a JSON description using the marker names in
    /// `keys`. The expected shape is a map of type name to field map, where
    /// each field carries either the kind marker (a primitive kind name) or
    /// the link marker (a target type name), plus optional array and
    /// denormalized-inverse flags:
    ///
    /// ```json
    /// {
    ///   "user": {
    ///     "name": { "type": "text" },
    ///     "pets": { "link": "pet", "isArray": true }
    ///   }
    /// }
    /// ```
    pub fn from_description(description: &serde_json::Value, keys: &KeyConfig) -> Result<Self> {
        let types = description
            .as_object()
            .ok_or_else(|| Error::schema("schema description must be an object"))?;

        let mut schema = Self::new();
        for (type_name, fields_value) in types {
            let fields_obj = fields_value.as_object().ok_or_else(|| {
                Error::schema(format!("record type \"{type_name}\" must be an object"))
            })?;

            let mut fields = FieldMap::new();
            for (field_name, definition) in fields_obj {
                fields.insert(
                    field_name.clone(),
                    parse_field(type_name, field_name, definition, keys)?,
                );
            }
            schema.insert_type(type_name.clone(), fields);
        }
        Ok(schema)
    }
}

fn parse_field(
    type_name: &str,
    field_name: &str,
    definition: &serde_json::Value,
    keys: &KeyConfig,
) -> Result<FieldDefinition> {
    let object = definition.as_object().ok_or_else(|| {
        Error::schema(format!(
            "field \"{type_name}.{field_name}\" must be an object"
        ))
    })?;

    let kind = match (object.get(&keys.kind), object.get(&keys.link)) {
        (Some(kind_value), None) => {
            let name = kind_value.as_str().ok_or_else(|| {
                Error::schema(format!(
                    "field \"{type_name}.{field_name}\": kind must be a string"
                ))
            })?;
            let primitive = Primitive::parse(name).ok_or_else(|| {
                Error::schema(format!(
                    "field \"{type_name}.{field_name}\": unknown kind \"{name}\""
                ))
            })?;
            FieldKind::Scalar(primitive)
        }
        (None, Some(link_value)) => {
            let target = link_value.as_str().ok_or_else(|| {
                Error::schema(format!(
                    "field \"{type_name}.{field_name}\": link target must be a string"
                ))
            })?;
            FieldKind::Link(target.to_string())
        }
        _ => {
            return Err(Error::schema(format!(
                "field \"{type_name}.{field_name}\" needs exactly one of \
                 \"{}\" or \"{}\"",
                keys.kind, keys.link
            )));
        }
    };

    Ok(FieldDefinition {
        kind,
        is_array: object
            .get(&keys.is_array)
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false),
        denormalized_inverse: object
            .get(&keys.denormalized_inverse)
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false),
    })
}

/// Declared primary-key column type: a primitive kind or an explicit
/// physical type name (e.g. `serial`, `bigserial`, `uuid`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrimaryKeyDecl {
    /// One of the supported primitive kinds (text-like or numeric-like).
    Kind(Primitive),
    /// A physical column type name, passed through lowercased.
    Physical(String),
}

impl Default for PrimaryKeyDecl {
    fn default() -> Self {
        PrimaryKeyDecl::Kind(Primitive::Text)
    }
}

/// Generates a primary key for a record of the given type.
pub type KeyGenerator = Arc<dyn Fn(&str) -> Value + Send + Sync>;

/// How primary keys are assigned to records created without one.
#[derive(Clone, Default)]
pub enum KeyGeneration {
    /// Cryptographically random URL-safe base64 keys.
    #[default]
    Random,
    /// Leave the key absent and let the backend assign one.
    Backend,
    /// Caller-supplied generator.
    Custom(KeyGenerator),
}

impl fmt::Debug for KeyGeneration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyGeneration::Random => f.write_str("Random"),
            KeyGeneration::Backend => f.write_str("Backend"),
            KeyGeneration::Custom(_) => f.write_str("Custom(<fn>)"),
        }
    }
}

/// Caller-supplied adapter options.
#[derive(Debug, Clone, Default)]
pub struct AdapterOptions {
    /// Per-type physical table name overrides; identity when absent.
    pub type_map: BTreeMap<String, String>,
    /// Declared primary-key column type.
    pub primary_key: PrimaryKeyDecl,
    /// Whether singular link columns get a references-constraint with
    /// `ON DELETE SET NULL`.
    pub use_foreign_keys: bool,
    /// How primary keys are assigned when a created record carries none.
    pub key_generation: KeyGeneration,
    /// Raw filter fragment merged verbatim into every find's WHERE clause.
    pub raw_condition: Option<String>,
}

/// Immutable state threaded through every codec and compiler call.
#[derive(Debug, Clone)]
pub struct AdapterContext {
    /// The declared record-type schema.
    pub schema: RecordSchema,
    /// Schema-description key names; `keys.primary` is the primary-key
    /// column of every table.
    pub keys: KeyConfig,
    /// Caller-supplied options.
    pub options: AdapterOptions,
}

impl AdapterContext {
    /// The physical table name for a record type.
    pub fn table<'a>(&'a self, type_name: &'a str) -> &'a str {
        self.options
            .type_map
            .get(type_name)
            .map_or(type_name, String::as_str)
    }

    /// Field definitions of a type.
    pub fn fields(&self, type_name: &str) -> Result<&FieldMap> {
        self.schema.fields(type_name)
    }
}
