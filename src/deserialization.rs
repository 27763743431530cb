//! JSON / CBOR -> Record, and the multi-format parse chain.
//!
//! Imports are type-aware: the declared type of each field decides how a
//! document value is read (base64 for binary fields, element-id keys for
//! arrays, positional parts for POIDs).

use std::rc::Rc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use smol_str::SmolStr;
use tracing::debug;

use crate::error::{FlistError, Result};
use crate::flist::{FlistContext, Record};
use crate::flist_value::{FlistMap, FlistValue, Key, json_key};
use crate::types::{FieldDescriptor, FieldType};

// ─── DocumentValue Trait ────────────────────────────────────────────────────

/// A node of a decoded document (`serde_json::Value`, `cbor4ii::core::Value`)
/// that records can be imported from.
pub trait DocumentValue: Sized {
    fn is_null(&self) -> bool;

    fn as_bool(&self) -> Option<bool>;

    fn as_i64(&self) -> Option<i64>;

    fn as_f64(&self) -> Option<f64>;

    fn as_str(&self) -> Option<&str>;

    fn as_bytes(&self) -> Option<&[u8]>;

    fn as_list(&self) -> Option<&[Self]>;

    /// Object entries with their keys converted; `None` if not an object.
    fn entries(&self) -> Option<Vec<(Key, &Self)>>;
}

// ─── DocumentValue for serde_json::Value ────────────────────────────────────

impl DocumentValue for serde_json::Value {
    #[inline]
    fn is_null(&self) -> bool {
        self.is_null()
    }

    #[inline]
    fn as_bool(&self) -> Option<bool> {
        self.as_bool()
    }

    #[inline]
    fn as_i64(&self) -> Option<i64> {
        self.as_i64()
    }

    #[inline]
    fn as_f64(&self) -> Option<f64> {
        self.as_f64()
    }

    #[inline]
    fn as_str(&self) -> Option<&str> {
        self.as_str()
    }

    #[inline]
    fn as_bytes(&self) -> Option<&[u8]> {
        None
    }

    #[inline]
    fn as_list(&self) -> Option<&[Self]> {
        self.as_array().map(Vec::as_slice)
    }

    fn entries(&self) -> Option<Vec<(Key, &Self)>> {
        self.as_object()
            .map(|obj| obj.iter().map(|(k, v)| (json_key(k.clone()), v)).collect())
    }
}

// ─── DocumentValue for cbor4ii::core::Value ─────────────────────────────────

impl DocumentValue for cbor4ii::core::Value {
    #[inline]
    fn is_null(&self) -> bool {
        matches!(self, cbor4ii::core::Value::Null)
    }

    #[inline]
    fn as_bool(&self) -> Option<bool> {
        match self {
            cbor4ii::core::Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[inline]
    fn as_i64(&self) -> Option<i64> {
        match self {
            cbor4ii::core::Value::Integer(i) => i64::try_from(*i).ok(),
            _ => None,
        }
    }

    #[inline]
    fn as_f64(&self) -> Option<f64> {
        match self {
            cbor4ii::core::Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    #[inline]
    fn as_str(&self) -> Option<&str> {
        match self {
            cbor4ii::core::Value::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    #[inline]
    fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            cbor4ii::core::Value::Bytes(b) => Some(b.as_slice()),
            _ => None,
        }
    }

    #[inline]
    fn as_list(&self) -> Option<&[Self]> {
        match self {
            cbor4ii::core::Value::Array(items) => Some(items.as_slice()),
            _ => None,
        }
    }

    fn entries(&self) -> Option<Vec<(Key, &Self)>> {
        let cbor4ii::core::Value::Map(entries) = self else {
            return None;
        };
        entries
            .iter()
            .map(|(k, v)| {
                let key = match k {
                    cbor4ii::core::Value::Text(s) => json_key(s.clone()),
                    cbor4ii::core::Value::Integer(i) => Key::Id(i64::try_from(*i).ok()?),
                    _ => return None,
                };
                Some((key, v))
            })
            .collect()
    }
}

// ─── Import ─────────────────────────────────────────────────────────────────

/// Builds a record from a decoded document whose root is an object.
pub fn import_record<V: DocumentValue>(ctx: &Rc<FlistContext>, doc: &V) -> Result<Record> {
    let data = import_object(ctx, doc)?;
    Record::from_data(ctx, data)
}

/// Converts a document object into detached data, reading each value
/// according to its field's declared type.
pub fn import_object<V: DocumentValue>(ctx: &FlistContext, doc: &V) -> Result<FlistValue> {
    let entries = doc
        .entries()
        .ok_or_else(|| FlistError::InvalidInput("document root must be an object".into()))?;
    let mut map = FlistMap::default();
    for (key, value) in entries {
        let desc = ctx.resolve(key.to_field_id()?)?;
        let converted = import_value(ctx, &desc, value)?;
        map.insert(Key::Name(desc.name), converted);
    }
    Ok(FlistValue::Object(map))
}

fn import_value<V: DocumentValue>(ctx: &FlistContext, desc: &FieldDescriptor, value: &V) -> Result<FlistValue> {
    if value.is_null() {
        return Ok(FlistValue::Null);
    }
    match desc.field_type {
        FieldType::Substruct if value.entries().is_some() => import_object(ctx, value),
        FieldType::Array => {
            if let Some(entries) = value.entries() {
                let mut elems = FlistMap::default();
                for (key, elem) in entries {
                    elems.insert(key, import_element(ctx, elem)?);
                }
                Ok(FlistValue::Object(elems))
            } else if let Some(items) = value.as_list() {
                items
                    .iter()
                    .map(|elem| import_element(ctx, elem))
                    .collect::<Result<Vec<_>>>()
                    .map(FlistValue::List)
            } else {
                Ok(plain(value))
            }
        }
        FieldType::BinaryString | FieldType::Buffer => match (value.as_bytes(), value.as_str()) {
            (Some(bytes), _) => Ok(FlistValue::Bytes(bytes.to_vec())),
            (None, Some(text)) => BASE64.decode(text).map(FlistValue::Bytes).map_err(|e| {
                FlistError::InvalidValue(format!("{} is not base64: {e}", desc.name))
            }),
            _ => Ok(plain(value)),
        },
        FieldType::Poid => match value.as_list() {
            Some(parts) => Ok(FlistValue::Tuple(parts.iter().map(plain).collect())),
            None => Ok(plain(value)),
        },
        _ => Ok(plain(value)),
    }
}

fn import_element<V: DocumentValue>(ctx: &FlistContext, elem: &V) -> Result<FlistValue> {
    if elem.is_null() {
        Ok(FlistValue::Null)
    } else {
        import_object(ctx, elem)
    }
}

/// Type-blind conversion; the record setter reports a mismatch if the
/// result does not fit the field.
fn plain<V: DocumentValue>(value: &V) -> FlistValue {
    if value.is_null() {
        FlistValue::Null
    } else if let Some(b) = value.as_bool() {
        FlistValue::from(b)
    } else if let Some(i) = value.as_i64() {
        FlistValue::Int(i)
    } else if let Some(f) = value.as_f64() {
        FlistValue::Float(f)
    } else if let Some(s) = value.as_str() {
        FlistValue::Str(SmolStr::new(s))
    } else if let Some(b) = value.as_bytes() {
        FlistValue::Bytes(b.to_vec())
    } else if let Some(items) = value.as_list() {
        FlistValue::List(items.iter().map(plain).collect())
    } else if let Some(entries) = value.entries() {
        FlistValue::Object(entries.into_iter().map(|(k, v)| (k, plain(v))).collect())
    } else {
        FlistValue::Null
    }
}

// ════════════════════════════════════════════════════════════════════════
// Decoders
// ════════════════════════════════════════════════════════════════════════

/// Text that is not JSON fails with `InvalidInput`; JSON that does not fit
/// the field catalog fails with the field's own error.
pub fn from_json(ctx: &Rc<FlistContext>, text: &str) -> Result<Record> {
    let doc: serde_json::Value =
        serde_json::from_str(text).map_err(|e| FlistError::InvalidInput(e.to_string()))?;
    import_record(ctx, &doc)
}

pub fn from_json_value(ctx: &Rc<FlistContext>, doc: &serde_json::Value) -> Result<Record> {
    import_record(ctx, doc)
}

pub fn from_cbor(ctx: &Rc<FlistContext>, bytes: &[u8]) -> Result<Record> {
    let doc: cbor4ii::core::Value =
        cbor4ii::serde::from_slice(bytes).map_err(|e| FlistError::InvalidInput(e.to_string()))?;
    import_record(ctx, &doc)
}

/// Tries JSON, then XML, then the legacy text form decoded by `legacy`.
///
/// A format is skipped only when the text is not in that format at all
/// (`InvalidInput`); a well-formed document with a bad field fails right
/// away.
pub fn parse<F>(ctx: &Rc<FlistContext>, text: &str, legacy: F) -> Result<Record>
where
    F: FnOnce(&str) -> Result<FlistValue>,
{
    match from_json(ctx, text) {
        Err(FlistError::InvalidInput(e)) => debug!(error = %e, "input is not JSON"),
        other => return other,
    }
    match crate::xml::from_xml(ctx, text) {
        Err(FlistError::InvalidInput(e)) => debug!(error = %e, "input is not XML"),
        other => return other,
    }
    match legacy(text) {
        Ok(data) => Record::from_data(ctx, data),
        Err(FlistError::InvalidInput(e)) => {
            debug!(error = %e, "input is not flist text");
            Err(FlistError::InvalidInput("illegal flist string".into()))
        }
        Err(e) => Err(e),
    }
}
