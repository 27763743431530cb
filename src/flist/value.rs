use smol_str::SmolStr;

use super::array::ArrayField;
use super::record::Record;
use crate::flist_value::FlistValue;
use crate::poid::Poid;
use crate::types::FieldType;

/// A field value as read from a record.
///
/// Substructs and arrays come back as views onto the record's storage.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Int(i32),
    Enum(i32),
    Str(SmolStr),
    /// Epoch seconds.
    Timestamp(i64),
    Decimal(SmolStr),
    Poid(Poid),
    BinStr(Vec<u8>),
    Buf(Vec<u8>),
    Flist(Record),
    Array(ArrayField),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::Int(i) | Value::Enum(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) | Value::Decimal(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<i64> {
        match self {
            Value::Timestamp(t) => Some(*t),
            _ => None,
        }
    }

    pub fn as_poid(&self) -> Option<&Poid> {
        match self {
            Value::Poid(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::BinStr(b) | Value::Buf(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_flist(&self) -> Option<&Record> {
        match self {
            Value::Flist(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&ArrayField> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    /// The field type this value can be stored in; `None` for null.
    pub fn field_type(&self) -> Option<FieldType> {
        Some(match self {
            Value::Null => return None,
            Value::Int(_) => FieldType::Int32,
            Value::Enum(_) => FieldType::Enum,
            Value::Str(_) => FieldType::String,
            Value::Timestamp(_) => FieldType::Timestamp,
            Value::Decimal(_) => FieldType::Decimal,
            Value::Poid(_) => FieldType::Poid,
            Value::BinStr(_) => FieldType::BinaryString,
            Value::Buf(_) => FieldType::Buffer,
            Value::Flist(_) => FieldType::Substruct,
            Value::Array(_) => FieldType::Array,
        })
    }

    /// Detached copy of this value.
    pub fn to_flist_value(&self) -> FlistValue {
        match self {
            Value::Null => FlistValue::Null,
            Value::Int(i) | Value::Enum(i) => FlistValue::Int(i64::from(*i)),
            Value::Str(s) => FlistValue::Str(s.clone()),
            Value::Timestamp(t) => FlistValue::Timestamp(*t),
            Value::Decimal(d) => FlistValue::Decimal(d.clone()),
            Value::Poid(p) => FlistValue::Poid(p.clone()),
            Value::BinStr(b) | Value::Buf(b) => FlistValue::Bytes(b.clone()),
            Value::Flist(r) => r.asdict(),
            Value::Array(a) => a.asdict(),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Int(a), Value::Int(b)) | (Value::Enum(a), Value::Enum(b)) => a == b,
            (Value::Str(a), Value::Str(b)) | (Value::Decimal(a), Value::Decimal(b)) => a == b,
            (Value::Timestamp(a), Value::Timestamp(b)) => a == b,
            (Value::Poid(a), Value::Poid(b)) => a == b,
            (Value::BinStr(a), Value::BinStr(b)) | (Value::Buf(a), Value::Buf(b)) => a == b,
            (Value::Flist(a), Value::Flist(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            _ => false,
        }
    }
}

impl From<Record> for Value {
    fn from(r: Record) -> Self {
        Value::Flist(r)
    }
}

impl From<ArrayField> for Value {
    fn from(a: ArrayField) -> Self {
        Value::Array(a)
    }
}
