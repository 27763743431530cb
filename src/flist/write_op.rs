use chrono::DateTime;
use indexmap::IndexMap;
use smol_str::SmolStr;

use super::FlistContext;
use super::node::{ArrayData, FieldEntry, FlistNode, NodeRef, Slot, new_node};
use super::record::Record;
use super::value::Value;
use crate::error::{FlistError, Result};
use crate::flags;
use crate::flist_value::{FlistMap, FlistValue};
use crate::poid::{Poid, TYPE_ONLY_ID, parse_database};
use crate::types::{ELEMID_ANY, FieldDescriptor, FieldId, FieldType};

/// The one Int32 field that also takes symbolic flag names.
const FLAGS_FIELD: &str = "PIN_FLD_FLAGS";

impl Record {
    // ════════════════════════════════════════════════════════════════════════
    // Setters
    // ════════════════════════════════════════════════════════════════════════

    /// Stores `value`, converted to the field's declared type.
    ///
    /// Null marks the field present but unset; on an array field it becomes
    /// a single null element at id 0. An empty mapping or list makes an
    /// array field virtual-empty.
    pub fn set(&self, field: impl Into<FieldId>, value: impl Into<FlistValue>) -> Result<()> {
        let desc = self.resolve(field)?;
        let slot = coerce(&self.ctx, &desc, value.into())?;
        self.store(desc, slot);
        Ok(())
    }

    /// Stores a copy of `record` in a substruct field, or an explicit null.
    pub fn set_flist(&self, field: impl Into<FieldId>, record: Option<&Record>) -> Result<()> {
        let desc = self.resolve(field)?;
        let value = record.map_or(Value::Null, |r| Value::Flist(r.clone()));
        self.set_resolved_value(&desc, &value)
    }

    /// Stores a value read from another record. Containers are deep-copied.
    pub fn set_value(&self, field: impl Into<FieldId>, value: &Value) -> Result<()> {
        let desc = self.resolve(field)?;
        self.set_resolved_value(&desc, value)
    }

    pub(crate) fn set_resolved_value(&self, desc: &FieldDescriptor, value: &Value) -> Result<()> {
        let slot = match (desc.field_type, value) {
            (FieldType::Substruct, Value::Flist(r)) => {
                Slot::Flist(new_node(r.node.borrow().deep_copy()))
            }
            (FieldType::Array, Value::Array(a)) => Slot::Array(a.data_copy()),
            (expected, Value::Flist(_) | Value::Array(_)) => {
                let actual = value.field_type().map_or("null", FieldType::as_str);
                return Err(FlistError::conflict(&desc.name, expected, actual));
            }
            _ => coerce(&self.ctx, desc, value.to_flist_value())?,
        };
        self.store(desc.clone(), slot);
        Ok(())
    }

    fn store(&self, desc: FieldDescriptor, slot: Slot) {
        self.node
            .borrow_mut()
            .fields
            .insert(desc.number, FieldEntry { desc, slot });
    }
}

// ─── Coercion ───────────────────────────────────────────────────────────────

pub(crate) fn coerce(ctx: &FlistContext, desc: &FieldDescriptor, value: FlistValue) -> Result<Slot> {
    if value.is_null() {
        return Ok(match desc.field_type {
            FieldType::Array => Slot::Array(ArrayData::single_null()),
            _ => Slot::Null,
        });
    }
    let nested = match &value {
        FlistValue::Object(_) => true,
        // positional POID parts may come as a list
        FlistValue::List(_) => desc.field_type != FieldType::Poid,
        _ => false,
    };
    if nested && !desc.field_type.is_container() {
        return Err(FlistError::conflict(&desc.name, desc.field_type, value.kind()));
    }

    match desc.field_type {
        FieldType::Int32 => coerce_int(desc, value, true).map(Slot::Int),
        FieldType::Enum => coerce_int(desc, value, false).map(Slot::Enum),
        FieldType::String => coerce_str(desc, value).map(Slot::Str),
        FieldType::Timestamp => coerce_timestamp(desc, value).map(Slot::Timestamp),
        FieldType::Decimal => coerce_decimal(desc, value).map(Slot::Decimal),
        FieldType::Poid => coerce_poid(ctx, desc, value).map(Slot::Poid),
        FieldType::BinaryString => coerce_bytes(desc, value).map(Slot::BinStr),
        FieldType::Buffer => coerce_bytes(desc, value).map(Slot::Buf),
        FieldType::Substruct => match value {
            FlistValue::Object(map) => Ok(Slot::Flist(new_node(build_node(ctx, map)?))),
            FlistValue::List(names) => Ok(Slot::Flist(new_node(node_from_names(ctx, names)?))),
            other => Err(FlistError::conflict(&desc.name, desc.field_type, other.kind())),
        },
        FieldType::Array => build_array(ctx, desc, value).map(Slot::Array),
    }
}

fn coerce_int(desc: &FieldDescriptor, value: FlistValue, allow_flags: bool) -> Result<i32> {
    let wide: i128 = match value {
        FlistValue::Int(i) => i128::from(i),
        FlistValue::Float(f) if f.is_finite() && f.fract() == 0.0 => f as i128,
        FlistValue::Str(s) => match s.trim().parse::<i128>() {
            Ok(i) => i,
            Err(_) if allow_flags && desc.name == FLAGS_FIELD => flags::lookup(s.trim())
                .map(i128::from)
                .ok_or_else(|| FlistError::UnknownFlag(s.clone()))?,
            Err(_) => return Err(FlistError::mismatch(&desc.name, desc.field_type, format!("{s:?}"))),
        },
        other => return Err(FlistError::mismatch(&desc.name, desc.field_type, other.kind())),
    };
    i32::try_from(wide).map_err(|_| FlistError::Overflow {
        field: desc.name.clone(),
        value: wide,
    })
}

fn coerce_str(desc: &FieldDescriptor, value: FlistValue) -> Result<SmolStr> {
    Ok(match value {
        FlistValue::Str(s) | FlistValue::Decimal(s) => s,
        FlistValue::Int(i) | FlistValue::Timestamp(i) => SmolStr::new(i.to_string()),
        FlistValue::Float(f) => SmolStr::new(f.to_string()),
        FlistValue::Poid(p) => SmolStr::new(p.to_string()),
        FlistValue::Bytes(b) => match String::from_utf8(b) {
            Ok(s) => SmolStr::from(s),
            Err(_) => return Err(FlistError::mismatch(&desc.name, desc.field_type, "non-UTF-8 bytes")),
        },
        other => return Err(FlistError::mismatch(&desc.name, desc.field_type, other.kind())),
    })
}

fn coerce_timestamp(desc: &FieldDescriptor, value: FlistValue) -> Result<i64> {
    match value {
        FlistValue::Int(i) | FlistValue::Timestamp(i) => Ok(i),
        // time_t has no fraction
        FlistValue::Float(f) if f.is_finite() => Ok(f.trunc() as i64),
        FlistValue::Str(s) => {
            let text = s.trim();
            if let Ok(secs) = text.parse::<i64>() {
                return Ok(secs);
            }
            DateTime::parse_from_rfc3339(text)
                .map(|t| t.timestamp())
                .map_err(|_| FlistError::InvalidValue(format!("bad timestamp {text:?} for {}", desc.name)))
        }
        other => Err(FlistError::mismatch(&desc.name, desc.field_type, other.kind())),
    }
}

fn coerce_decimal(desc: &FieldDescriptor, value: FlistValue) -> Result<SmolStr> {
    let bad = |text: &str| FlistError::InvalidValue(format!("bad decimal {text:?} for {}", desc.name));
    match value {
        FlistValue::Int(i) => Ok(SmolStr::new(i.to_string())),
        FlistValue::Float(f) if f.is_finite() => Ok(SmolStr::new(f.to_string())),
        FlistValue::Float(f) => Err(bad(&f.to_string())),
        FlistValue::Str(s) | FlistValue::Decimal(s) => {
            let text = s.trim();
            match text.parse::<f64>() {
                Ok(f) if f.is_finite() => Ok(SmolStr::new(text)),
                _ => Err(bad(text)),
            }
        }
        other => Err(FlistError::mismatch(&desc.name, desc.field_type, other.kind())),
    }
}

fn coerce_bytes(desc: &FieldDescriptor, value: FlistValue) -> Result<Vec<u8>> {
    match value {
        FlistValue::Bytes(b) => Ok(b),
        FlistValue::Str(s) => Ok(s.as_bytes().to_vec()),
        other => Err(FlistError::mismatch(&desc.name, desc.field_type, other.kind())),
    }
}

/// POIDs come as a `Poid`, a `"type"` or 4-token string, or 1 to 4
/// positional parts `(type, id, revision, database)`.
fn coerce_poid(ctx: &FlistContext, desc: &FieldDescriptor, value: FlistValue) -> Result<Poid> {
    match value {
        FlistValue::Poid(p) => Ok(p),
        FlistValue::Str(s) => match s.split_whitespace().count() {
            4 => Poid::parse(&s),
            1 => Poid::type_only(ctx.database(), s.trim()),
            _ => Err(FlistError::InvalidValue(format!(
                "POID text {s:?} for {} is neither a type nor \"database type id revision\"",
                desc.name
            ))),
        },
        FlistValue::Tuple(parts) | FlistValue::List(parts) => poid_from_parts(ctx, parts),
        other => Err(FlistError::mismatch(&desc.name, desc.field_type, other.kind())),
    }
}

fn poid_from_parts(ctx: &FlistContext, parts: Vec<FlistValue>) -> Result<Poid> {
    if parts.is_empty() || parts.len() > 4 {
        return Err(FlistError::InvalidValue(format!(
            "a POID has 1 to 4 parts, got {}",
            parts.len()
        )));
    }
    let mut parts = parts.into_iter();
    let poid_type = match parts.next() {
        Some(FlistValue::Str(s)) => s,
        other => {
            let kind = other.as_ref().map_or("nothing", FlistValue::kind);
            return Err(FlistError::InvalidValue(format!("POID type must be a string, got {kind}")));
        }
    };
    let id = part_int(parts.next(), TYPE_ONLY_ID, "id")?;
    let revision = part_int(parts.next(), 0, "revision")?;
    let database = match parts.next() {
        None | Some(FlistValue::Null) => ctx.database(),
        Some(FlistValue::Int(n)) => u64::try_from(n)
            .map_err(|_| FlistError::InvalidValue(format!("bad POID database {n}")))?,
        Some(FlistValue::Str(s)) => parse_database(&s)?,
        Some(other) => {
            return Err(FlistError::InvalidValue(format!(
                "POID database must be a number or dotted string, got {}",
                other.kind()
            )));
        }
    };
    Poid::new(database, &poid_type, id, revision)
}

fn part_int(part: Option<FlistValue>, default: i64, what: &str) -> Result<i64> {
    match part {
        None | Some(FlistValue::Null) => Ok(default),
        Some(FlistValue::Int(i)) => Ok(i),
        Some(FlistValue::Str(s)) => s
            .trim()
            .parse()
            .map_err(|_| FlistError::InvalidValue(format!("POID {what} {s:?} is not an integer"))),
        Some(other) => Err(FlistError::InvalidValue(format!(
            "POID {what} must be an integer, got {}",
            other.kind()
        ))),
    }
}

// ─── Containers ─────────────────────────────────────────────────────────────

pub(crate) fn build_node(ctx: &FlistContext, map: FlistMap) -> Result<FlistNode> {
    let mut node = FlistNode::default();
    for (key, value) in map {
        let desc = ctx.resolve(key.to_field_id()?)?;
        let slot = coerce(ctx, &desc, value)?;
        node.fields.insert(desc.number, FieldEntry { desc, slot });
    }
    Ok(node)
}

/// Each listed field is set to null (arrays: one null element).
pub(crate) fn node_from_names(ctx: &FlistContext, names: Vec<FlistValue>) -> Result<FlistNode> {
    let mut node = FlistNode::default();
    for name in names {
        let field = match name {
            FlistValue::Str(s) => FieldId::Name(s),
            FlistValue::Int(n) => u32::try_from(n)
                .map(FieldId::Number)
                .map_err(|_| FlistError::FieldNotFound(SmolStr::new(n.to_string())))?,
            other => {
                return Err(FlistError::InvalidValue(format!(
                    "expected a field name, got {}",
                    other.kind()
                )));
            }
        };
        let desc = ctx.resolve(field)?;
        let slot = coerce(ctx, &desc, FlistValue::Null)?;
        node.fields.insert(desc.number, FieldEntry { desc, slot });
    }
    Ok(node)
}

/// A whole array from a list (ids `0..`) or a mapping of element ids.
///
/// Wildcard spellings in a mapping collapse to one entry (the last one
/// wins), which is applied before the explicit ids.
fn build_array(ctx: &FlistContext, desc: &FieldDescriptor, value: FlistValue) -> Result<ArrayData> {
    let mut data = ArrayData::default();
    match value {
        FlistValue::List(items) => {
            for (id, item) in (0i64..).zip(items) {
                data.elems.insert(id, build_element(ctx, desc, item)?);
            }
        }
        FlistValue::Object(map) => {
            let mut wildcard = None;
            let mut explicit = IndexMap::new();
            for (key, item) in map {
                let id = key.to_elem_id().normalize()?;
                if id == ELEMID_ANY {
                    wildcard = Some(item);
                } else {
                    explicit.insert(id, item);
                }
            }
            if let Some(item) = wildcard {
                data.elems.insert(ELEMID_ANY, build_element(ctx, desc, item)?);
            }
            for (id, item) in explicit {
                data.elems.insert(id, build_element(ctx, desc, item)?);
            }
        }
        other => return Err(FlistError::conflict(&desc.name, desc.field_type, other.kind())),
    }
    Ok(data)
}

pub(crate) fn build_element(
    ctx: &FlistContext,
    desc: &FieldDescriptor,
    item: FlistValue,
) -> Result<Option<NodeRef>> {
    match item {
        FlistValue::Null => Ok(None),
        FlistValue::Object(map) => Ok(Some(new_node(build_node(ctx, map)?))),
        FlistValue::List(names) => Ok(Some(new_node(node_from_names(ctx, names)?))),
        other => Err(FlistError::conflict(&desc.name, desc.field_type, other.kind())),
    }
}
