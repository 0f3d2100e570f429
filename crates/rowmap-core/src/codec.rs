//! Encoding and decoding of records across the storage boundary.
//!
//! Binary payloads cross the boundary as escaped hexadecimal literals
//! (`\x...`) because the backend expects that encoding for bytea
//! parameters. Array-valued inputs stay native arrays so the backend's
//! array type and operators apply; only their *elements* are encoded.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE;
use rand::RngCore;
use rand::rngs::OsRng;

use crate::error::{Error, Result};
use crate::row::Row;
use crate::schema::{AdapterContext, KeyGeneration, Primitive, Record};
use crate::value::Value;

/// Number of random bytes in a default-generated primary key.
const KEY_BYTES: usize = 15;

/// Encode a single value for use as a statement parameter. Binary payloads
/// become tagged hex literals; everything else passes through unchanged.
pub fn encode_value(value: Value) -> Value {
    match value {
        Value::Bytes(bytes) => Value::Text(format!("\\x{}", hex_encode(&bytes))),
        other => other,
    }
}

/// Decode a binary column value. Already-binary values are returned as-is;
/// text values are stripped of the `\x` tag and hex-decoded.
pub fn decode_binary(value: &Value) -> Result<Vec<u8>> {
    match value {
        Value::Bytes(bytes) => Ok(bytes.clone()),
        Value::Text(text) => hex_decode(text.strip_prefix("\\x").unwrap_or(text)),
        other => Err(Error::decode(format!(
            "expected binary or hex literal, got {other:?}"
        ))),
    }
}

/// Prepare a record for insertion: assign a primary key when absent (unless
/// key generation is delegated to the backend), materialize missing fields
/// as empty arrays or NULL, and encode every present value.
pub fn encode_record(ctx: &AdapterContext, type_name: &str, record: Record) -> Result<Record> {
    let fields = ctx.fields(type_name)?;
    let mut encoded = record;

    if !encoded.contains_key(&ctx.keys.primary) {
        match &ctx.options.key_generation {
            KeyGeneration::Random => {
                encoded.insert(ctx.keys.primary.clone(), default_primary_key());
            }
            KeyGeneration::Custom(generate) => {
                encoded.insert(ctx.keys.primary.clone(), generate(type_name));
            }
            KeyGeneration::Backend => {}
        }
    }

    for (name, definition) in fields {
        let Some(value) = encoded.remove(name) else {
            let fill = if definition.is_array {
                Value::Array(Vec::new())
            } else {
                Value::Null
            };
            encoded.insert(name.clone(), fill);
            continue;
        };

        let value = if definition.is_array {
            match value {
                Value::Array(items) => {
                    Value::Array(items.into_iter().map(encode_value).collect())
                }
                Value::Null => Value::Array(Vec::new()),
                other => {
                    return Err(Error::schema(format!(
                        "field \"{type_name}.{name}\" is array-valued, got {other:?}"
                    )));
                }
            }
        } else {
            encode_value(value)
        };
        encoded.insert(name.clone(), value);
    }

    Ok(encoded)
}

/// Decode a result row into a record. Denormalized-inverse fields are
/// copied through as materialized; binary fields that arrive as hex
/// literals are decoded back to bytes; the primary key is always set from
/// the row.
pub fn decode_record(ctx: &AdapterContext, type_name: &str, row: &Row) -> Result<Record> {
    let fields = ctx.fields(type_name)?;
    let mut record = Record::new();

    for (name, definition) in fields {
        let value = row.get_named(name);

        if definition.denormalized_inverse {
            if let Some(value) = value {
                record.insert(name.clone(), value.clone());
            }
            continue;
        }

        if definition.primitive() == Some(Primitive::Binary) {
            if let Some(value) = value {
                if !value.is_null() {
                    let decoded = if definition.is_array {
                        let items = value.as_array().ok_or_else(|| {
                            Error::decode(format!(
                                "field \"{type_name}.{name}\": expected array row value"
                            ))
                        })?;
                        let mut out = Vec::with_capacity(items.len());
                        for item in items {
                            out.push(decode_binary_element(item)?);
                        }
                        Value::Array(out)
                    } else {
                        decode_binary_element(value)?
                    };
                    record.insert(name.clone(), decoded);
                    continue;
                }
            }
        }

        if let Some(value) = value {
            record.insert(name.clone(), value.clone());
        }
    }

    let primary = row
        .get_named(&ctx.keys.primary)
        .cloned()
        .unwrap_or(Value::Null);
    record.insert(ctx.keys.primary.clone(), primary);

    Ok(record)
}

fn decode_binary_element(value: &Value) -> Result<Value> {
    match value {
        Value::Bytes(_) => Ok(value.clone()),
        other => Ok(Value::Bytes(decode_binary(other)?)),
    }
}

/// The default primary-key generator: URL-safe base64 over
/// cryptographically random bytes.
pub fn default_primary_key() -> Value {
    let mut bytes = [0u8; KEY_BYTES];
    OsRng.fill_bytes(&mut bytes);
    Value::Text(URL_SAFE.encode(bytes))
}

fn hex_encode(bytes: &[u8]) -> String {
    use std::fmt::Write as _;
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        let _ = write!(out, "{byte:02x}");
    }
    out
}

fn hex_decode(text: &str) -> Result<Vec<u8>> {
    if text.len() % 2 != 0 {
        return Err(Error::decode("hex literal has odd length"));
    }
    // Hex digits are ASCII; anything else makes byte slicing unsafe below.
    if !text.is_ascii() {
        return Err(Error::decode(format!("invalid hex literal \"{text}\"")));
    }
    (0..text.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&text[i..i + 2], 16)
                .map_err(|_| Error::decode(format!("invalid hex literal \"{text}\"")))
        })
        .collect()
}
