//! Record -> JSON / CBOR.
//!
//! Both encoders walk the live record through one `serde::Serialize` impl,
//! so they produce the same document shape:
//!
//! - substructs are nested objects, explicit nulls are `null`
//! - arrays are objects keyed by the stringified element id (`"-1"` for
//!   the wildcard element)
//! - POIDs are their four-token string, timestamps are epoch seconds
//! - decimals are strings, binary fields are base64

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::error::{FlistError, Result};
use crate::flist::{ArrayField, Record, Value};

// ─── Serialize impls ────────────────────────────────────────────────────────

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (desc, value) in self.iter() {
            map.serialize_entry(desc.name.as_str(), &value)?;
        }
        map.end()
    }
}

impl Serialize for ArrayField {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let items = self.items();
        let mut map = serializer.serialize_map(Some(items.len()))?;
        for (elem_id, elem) in &items {
            map.serialize_entry(&elem_id.to_string(), elem)?;
        }
        map.end()
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_none(),
            Value::Int(i) | Value::Enum(i) => serializer.serialize_i32(*i),
            Value::Str(s) | Value::Decimal(s) => serializer.serialize_str(s),
            Value::Timestamp(t) => serializer.serialize_i64(*t),
            Value::Poid(p) => p.serialize(serializer),
            Value::BinStr(b) | Value::Buf(b) => serializer.serialize_str(&BASE64.encode(b)),
            Value::Flist(r) => r.serialize(serializer),
            Value::Array(a) => a.serialize(serializer),
        }
    }
}

// ════════════════════════════════════════════════════════════════════════
// Encoders
// ════════════════════════════════════════════════════════════════════════

pub fn to_json(record: &Record) -> Result<String> {
    Ok(serde_json::to_string(record)?)
}

pub fn to_json_pretty(record: &Record) -> Result<String> {
    Ok(serde_json::to_string_pretty(record)?)
}

pub fn to_json_value(record: &Record) -> Result<serde_json::Value> {
    Ok(serde_json::to_value(record)?)
}

/// CBOR encoding of the JSON document shape.
pub fn to_cbor(record: &Record) -> Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(record.count(true) * 24);
    cbor4ii::serde::to_writer(&mut buf, record)
        .map_err(|e| FlistError::Serialization(e.to_string()))?;
    Ok(buf)
}

impl Record {
    pub fn to_json(&self) -> Result<String> {
        to_json(self)
    }

    pub fn to_cbor(&self) -> Result<Vec<u8>> {
        to_cbor(self)
    }
}
