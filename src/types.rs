use std::fmt;

use smol_str::SmolStr;

use crate::error::{FlistError, Result};

// ─── Type Tags ──────────────────────────────────────────────────────────────
//
// Numeric codes as the engine reports them for each field type.
pub const TAG_INT: u8 = 1;
pub const TAG_ENUM: u8 = 3;
pub const TAG_STR: u8 = 5;
pub const TAG_BUF: u8 = 6;
pub const TAG_POID: u8 = 7;
pub const TAG_TSTAMP: u8 = 8;
pub const TAG_ARRAY: u8 = 9;
pub const TAG_SUBSTRUCT: u8 = 10;
pub const TAG_BINSTR: u8 = 12;
pub const TAG_DECIMAL: u8 = 14;

/// Canonical field numbers carry the type code in their top byte.
pub const FIELD_TYPE_SHIFT: u32 = 24;

// ─── FieldType ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    Int32,
    Enum,
    String,
    Buffer,
    Poid,
    Timestamp,
    Array,
    Substruct,
    BinaryString,
    Decimal,
}

impl FieldType {
    pub const ALL: [FieldType; 10] = [
        FieldType::Int32,
        FieldType::Enum,
        FieldType::String,
        FieldType::Buffer,
        FieldType::Poid,
        FieldType::Timestamp,
        FieldType::Array,
        FieldType::Substruct,
        FieldType::BinaryString,
        FieldType::Decimal,
    ];

    pub fn code(self) -> u8 {
        match self {
            FieldType::Int32 => TAG_INT,
            FieldType::Enum => TAG_ENUM,
            FieldType::String => TAG_STR,
            FieldType::Buffer => TAG_BUF,
            FieldType::Poid => TAG_POID,
            FieldType::Timestamp => TAG_TSTAMP,
            FieldType::Array => TAG_ARRAY,
            FieldType::Substruct => TAG_SUBSTRUCT,
            FieldType::BinaryString => TAG_BINSTR,
            FieldType::Decimal => TAG_DECIMAL,
        }
    }

    pub fn from_code(code: u8) -> Option<FieldType> {
        FieldType::ALL.into_iter().find(|t| t.code() == code)
    }

    /// Short name used by the engine's text and XML formats.
    pub fn as_str(self) -> &'static str {
        match self {
            FieldType::Int32 => "INT",
            FieldType::Enum => "ENUM",
            FieldType::String => "STR",
            FieldType::Buffer => "BUF",
            FieldType::Poid => "POID",
            FieldType::Timestamp => "TSTAMP",
            FieldType::Array => "ARRAY",
            FieldType::Substruct => "SUBSTRUCT",
            FieldType::BinaryString => "BINSTR",
            FieldType::Decimal => "DECIMAL",
        }
    }

    pub fn from_name(name: &str) -> Option<FieldType> {
        FieldType::ALL.into_iter().find(|t| t.as_str() == name)
    }

    /// Substructs and arrays hold records rather than scalars.
    pub fn is_container(self) -> bool {
        matches!(self, FieldType::Array | FieldType::Substruct)
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── FieldDescriptor ────────────────────────────────────────────────────────

/// A resolved field: canonical number, canonical name and declared type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldDescriptor {
    pub number: u32,
    pub name: SmolStr,
    pub field_type: FieldType,
}

impl FieldDescriptor {
    pub fn new(number: u32, name: impl Into<SmolStr>, field_type: FieldType) -> Self {
        Self {
            number,
            name: name.into(),
            field_type,
        }
    }
}

/// Builds the canonical field number from a base number and its type.
pub fn canonical_number(base: u32, field_type: FieldType) -> u32 {
    ((field_type.code() as u32) << FIELD_TYPE_SHIFT) | base
}

// ─── FieldId ────────────────────────────────────────────────────────────────

/// How a caller names a field: by `PIN_FLD_*` name or by number.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldId {
    Name(SmolStr),
    Number(u32),
}

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldId::Name(n) => f.write_str(n),
            FieldId::Number(n) => write!(f, "{n}"),
        }
    }
}

impl From<&str> for FieldId {
    fn from(s: &str) -> Self {
        FieldId::Name(SmolStr::new(s))
    }
}

impl From<&String> for FieldId {
    fn from(s: &String) -> Self {
        FieldId::Name(SmolStr::new(s))
    }
}

impl From<String> for FieldId {
    fn from(s: String) -> Self {
        FieldId::Name(SmolStr::from(s))
    }
}

impl From<SmolStr> for FieldId {
    fn from(s: SmolStr) -> Self {
        FieldId::Name(s)
    }
}

impl From<&SmolStr> for FieldId {
    fn from(s: &SmolStr) -> Self {
        FieldId::Name(s.clone())
    }
}

impl From<u32> for FieldId {
    fn from(n: u32) -> Self {
        FieldId::Number(n)
    }
}

impl From<&FieldDescriptor> for FieldId {
    fn from(d: &FieldDescriptor) -> Self {
        FieldId::Number(d.number)
    }
}

// ─── Element ids ────────────────────────────────────────────────────────────

/// Internal key of the wildcard element.
pub const ELEMID_ANY: i64 = -1;

/// An array element address as supplied by a caller.
///
/// `*`, `PIN_ELEMID_ANY`, `-1` and `"-1"` all name the wildcard element.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ElemId {
    Id(i64),
    Text(SmolStr),
}

impl ElemId {
    pub const ANY: ElemId = ElemId::Id(ELEMID_ANY);

    /// Maps every wildcard spelling to [`ELEMID_ANY`].
    pub fn normalize(&self) -> Result<i64> {
        match self {
            ElemId::Id(id) => Ok(*id),
            ElemId::Text(text) => parse_elem_id(text)
                .ok_or_else(|| FlistError::InvalidValue(format!("bad element id {text:?}"))),
        }
    }
}

pub(crate) fn parse_elem_id(text: &str) -> Option<i64> {
    match text.trim() {
        "*" | "PIN_ELEMID_ANY" => Some(ELEMID_ANY),
        t => t.parse::<i64>().ok(),
    }
}

impl From<i64> for ElemId {
    fn from(id: i64) -> Self {
        ElemId::Id(id)
    }
}

impl From<i32> for ElemId {
    fn from(id: i32) -> Self {
        ElemId::Id(id as i64)
    }
}

impl From<u32> for ElemId {
    fn from(id: u32) -> Self {
        ElemId::Id(id as i64)
    }
}

impl From<&str> for ElemId {
    fn from(s: &str) -> Self {
        ElemId::Text(SmolStr::new(s))
    }
}
