use std::fmt;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};
use smol_str::SmolStr;

use crate::error::{FlistError, Result};
use crate::poid::Poid;
use crate::types::{ElemId, FieldId};

pub type FlistMap = IndexMap<Key, FlistValue>;

// ─── Key ────────────────────────────────────────────────────────────────────

/// A map key in detached data: a field identifier or an element id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    Name(SmolStr),
    Id(i64),
}

impl Key {
    pub fn to_field_id(&self) -> Result<FieldId> {
        match self {
            Key::Name(name) => Ok(FieldId::Name(name.clone())),
            Key::Id(n) => u32::try_from(*n)
                .map(FieldId::Number)
                .map_err(|_| FlistError::FieldNotFound(SmolStr::new(n.to_string()))),
        }
    }

    pub fn to_elem_id(&self) -> ElemId {
        match self {
            Key::Name(name) => ElemId::Text(name.clone()),
            Key::Id(n) => ElemId::Id(*n),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Name(n) => f.write_str(n),
            Key::Id(n) => write!(f, "{n}"),
        }
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Key::Name(SmolStr::new(s))
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Key::Name(SmolStr::from(s))
    }
}

impl From<SmolStr> for Key {
    fn from(s: SmolStr) -> Self {
        Key::Name(s)
    }
}

impl From<i64> for Key {
    fn from(n: i64) -> Self {
        Key::Id(n)
    }
}

impl From<i32> for Key {
    fn from(n: i32) -> Self {
        Key::Id(n as i64)
    }
}

impl From<u32> for Key {
    fn from(n: u32) -> Self {
        Key::Id(n as i64)
    }
}

// ─── FlistValue ─────────────────────────────────────────────────────────────

/// Detached flist data.
///
/// This is what callers build records from and what [`Record::asdict`]
/// returns. It holds no reference to live record storage, so it can be sent
/// to another thread.
///
/// [`Record::asdict`]: crate::flist::Record::asdict
#[derive(Debug, Clone, PartialEq, Default)]
pub enum FlistValue {
    #[default]
    Null,
    Int(i64),
    Float(f64),
    Str(SmolStr),
    Bytes(Vec<u8>),
    /// Epoch seconds.
    Timestamp(i64),
    Decimal(SmolStr),
    Poid(Poid),
    /// Positional POID parts: `(type, id, revision, database)`.
    Tuple(Vec<FlistValue>),
    List(Vec<FlistValue>),
    Object(FlistMap),
}

impl FlistValue {
    /// A list of field names, each standing for an unset field.
    pub fn names<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        FlistValue::List(names.into_iter().map(FlistValue::from).collect())
    }

    pub fn object() -> Self {
        FlistValue::Object(FlistMap::default())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FlistValue::Str(s) | FlistValue::Decimal(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FlistValue::Int(i) | FlistValue::Timestamp(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&FlistMap> {
        match self {
            FlistValue::Object(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&Vec<FlistValue>> {
        match self {
            FlistValue::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn get(&self, key: impl Into<Key>) -> Option<&FlistValue> {
        self.as_object()?.get(&key.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, FlistValue::Null)
    }

    /// Empty containers and null are falsy.
    pub fn is_truthy(&self) -> bool {
        match self {
            FlistValue::Null => false,
            FlistValue::List(items) | FlistValue::Tuple(items) => !items.is_empty(),
            FlistValue::Object(map) => !map.is_empty(),
            _ => true,
        }
    }

    /// Short description of the variant for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            FlistValue::Null => "null",
            FlistValue::Int(_) => "int",
            FlistValue::Float(_) => "float",
            FlistValue::Str(_) => "str",
            FlistValue::Bytes(_) => "bytes",
            FlistValue::Timestamp(_) => "timestamp",
            FlistValue::Decimal(_) => "decimal",
            FlistValue::Poid(_) => "poid",
            FlistValue::Tuple(_) => "tuple",
            FlistValue::List(_) => "list",
            FlistValue::Object(_) => "mapping",
        }
    }
}

// ─── Serialize ──────────────────────────────────────────────────────────────

impl Serialize for FlistValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            FlistValue::Null => serializer.serialize_none(),
            FlistValue::Int(i) | FlistValue::Timestamp(i) => serializer.serialize_i64(*i),
            FlistValue::Float(f) => serializer.serialize_f64(*f),
            FlistValue::Str(s) | FlistValue::Decimal(s) => serializer.serialize_str(s),
            FlistValue::Bytes(b) => serializer.serialize_str(&BASE64.encode(b)),
            FlistValue::Poid(p) => p.serialize(serializer),
            FlistValue::Tuple(items) | FlistValue::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for v in items {
                    seq.serialize_element(v)?;
                }
                seq.end()
            }
            FlistValue::Object(map) => {
                let mut m = serializer.serialize_map(Some(map.len()))?;
                for (k, v) in map {
                    m.serialize_entry(&k.to_string(), v)?;
                }
                m.end()
            }
        }
    }
}

// ─── From impls ─────────────────────────────────────────────────────────────

impl From<i64> for FlistValue {
    fn from(n: i64) -> Self {
        FlistValue::Int(n)
    }
}

impl From<i32> for FlistValue {
    fn from(n: i32) -> Self {
        FlistValue::Int(n as i64)
    }
}

impl From<u32> for FlistValue {
    fn from(n: u32) -> Self {
        FlistValue::Int(n as i64)
    }
}

impl From<bool> for FlistValue {
    fn from(b: bool) -> Self {
        FlistValue::Int(b as i64)
    }
}

impl From<f64> for FlistValue {
    fn from(n: f64) -> Self {
        FlistValue::Float(n)
    }
}

impl From<&str> for FlistValue {
    fn from(s: &str) -> Self {
        FlistValue::Str(SmolStr::new(s))
    }
}

impl From<String> for FlistValue {
    fn from(s: String) -> Self {
        FlistValue::Str(SmolStr::from(s))
    }
}

impl From<SmolStr> for FlistValue {
    fn from(s: SmolStr) -> Self {
        FlistValue::Str(s)
    }
}

impl From<Vec<u8>> for FlistValue {
    fn from(b: Vec<u8>) -> Self {
        FlistValue::Bytes(b)
    }
}

impl From<&[u8]> for FlistValue {
    fn from(b: &[u8]) -> Self {
        FlistValue::Bytes(b.to_vec())
    }
}

impl From<Poid> for FlistValue {
    fn from(p: Poid) -> Self {
        FlistValue::Poid(p)
    }
}

impl From<DateTime<Utc>> for FlistValue {
    fn from(t: DateTime<Utc>) -> Self {
        FlistValue::Timestamp(t.timestamp())
    }
}

impl From<Vec<FlistValue>> for FlistValue {
    fn from(items: Vec<FlistValue>) -> Self {
        FlistValue::List(items)
    }
}

impl From<FlistMap> for FlistValue {
    fn from(map: FlistMap) -> Self {
        FlistValue::Object(map)
    }
}

impl<T: Into<FlistValue>> From<Option<T>> for FlistValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(FlistValue::Null, Into::into)
    }
}

impl From<(&str, i64)> for FlistValue {
    fn from((poid_type, id): (&str, i64)) -> Self {
        FlistValue::Tuple(vec![poid_type.into(), id.into()])
    }
}

impl From<(&str, i64, i64)> for FlistValue {
    fn from((poid_type, id, revision): (&str, i64, i64)) -> Self {
        FlistValue::Tuple(vec![poid_type.into(), id.into(), revision.into()])
    }
}

impl From<(&str, i64, i64, i64)> for FlistValue {
    fn from((poid_type, id, revision, database): (&str, i64, i64, i64)) -> Self {
        FlistValue::Tuple(vec![
            poid_type.into(),
            id.into(),
            revision.into(),
            database.into(),
        ])
    }
}

// ─── From serde_json::Value ─────────────────────────────────────────────────

impl From<serde_json::Value> for FlistValue {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => FlistValue::Null,
            serde_json::Value::Bool(b) => FlistValue::from(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => FlistValue::Int(i),
                None => FlistValue::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => FlistValue::Str(SmolStr::from(s)),
            serde_json::Value::Array(arr) => {
                FlistValue::List(arr.into_iter().map(FlistValue::from).collect())
            }
            serde_json::Value::Object(obj) => FlistValue::Object(
                obj.into_iter()
                    .map(|(k, v)| (json_key(k), FlistValue::from(v)))
                    .collect(),
            ),
        }
    }
}

/// Integer-looking keys are element ids or field numbers.
pub(crate) fn json_key(k: String) -> Key {
    match k.parse::<i64>() {
        Ok(n) => Key::Id(n),
        Err(_) => Key::Name(SmolStr::from(k)),
    }
}

/// Builds a [`FlistValue::Object`].
///
/// ```
/// use flist_module::flist;
/// let data = flist!({
///     "PIN_FLD_POID" => "/account",
///     "PIN_FLD_STATUS" => 1,
///     "PIN_FLD_RESULTS" => { 0 => { "PIN_FLD_NAME" => "x" }, "*" => null },
/// });
/// assert!(data.get("PIN_FLD_RESULTS").is_some());
/// ```
#[macro_export]
macro_rules! flist {
    ({ $($key:expr => $val:tt),* $(,)? }) => {{
        #[allow(unused_mut)]
        let mut map = $crate::flist_value::FlistMap::default();
        $(
            map.insert(
                $crate::flist_value::Key::from($key),
                $crate::flist!(@value $val),
            );
        )*
        $crate::flist_value::FlistValue::Object(map)
    }};

    (@value null) => {
        $crate::flist_value::FlistValue::Null
    };

    (@value { $($inner:tt)* }) => {
        $crate::flist!({ $($inner)* })
    };

    (@value [ $($item:tt),* $(,)? ]) => {
        $crate::flist_value::FlistValue::List(vec![ $($crate::flist!(@value $item)),* ])
    };

    (@value $val:expr) => {
        $crate::flist_value::FlistValue::from($val)
    };
}
