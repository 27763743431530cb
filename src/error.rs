// ─── Error ──────────────────────────────────────────────────────────────────
use smol_str::SmolStr;
use thiserror::Error;

use crate::types::FieldType;

pub type Result<T> = std::result::Result<T, FlistError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FlistError {
    /// The identifier did not resolve, or a required field is unset.
    #[error("field not found: {0}")]
    FieldNotFound(SmolStr),

    #[error("type mismatch on {field}: expected {expected}, got {actual}")]
    TypeMismatch {
        field: SmolStr,
        expected: FieldType,
        actual: SmolStr,
    },

    #[error("value {value} for {field} does not fit in a 32-bit integer")]
    Overflow { field: SmolStr, value: i128 },

    /// Malformed POID, decimal or timestamp text.
    #[error("invalid value: {0}")]
    InvalidValue(String),

    #[error("structure conflict on {field}: cannot store {actual} in a {expected} field")]
    StructureConflict {
        field: SmolStr,
        expected: FieldType,
        actual: SmolStr,
    },

    #[error("element {elem_id} not found in {field}")]
    ElementNotFound { field: SmolStr, elem_id: i64 },

    #[error("unknown flag: {0}")]
    UnknownFlag(SmolStr),

    #[error("unknown operation: {0}")]
    UnknownOperation(SmolStr),

    /// Every supported text format rejected the input.
    #[error("input is not valid JSON, XML or flist text: {0}")]
    InvalidInput(String),

    #[error("engine error {code}: {message}")]
    Engine { code: SmolStr, message: String },

    #[error("transaction error: {0}")]
    Transaction(&'static str),

    #[error("client is not connected")]
    NotConnected,

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl FlistError {
    /// Kinds that an optional get turns into its default.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            FlistError::FieldNotFound(_) | FlistError::ElementNotFound { .. }
        )
    }

    pub fn is_type_mismatch(&self) -> bool {
        matches!(
            self,
            FlistError::TypeMismatch { .. } | FlistError::Overflow { .. }
        )
    }

    pub(crate) fn mismatch(field: &str, expected: FieldType, actual: impl Into<SmolStr>) -> Self {
        FlistError::TypeMismatch {
            field: SmolStr::new(field),
            expected,
            actual: actual.into(),
        }
    }

    pub(crate) fn conflict(field: &str, expected: FieldType, actual: impl Into<SmolStr>) -> Self {
        FlistError::StructureConflict {
            field: SmolStr::new(field),
            expected,
            actual: actual.into(),
        }
    }
}

impl From<serde_json::Error> for FlistError {
    fn from(e: serde_json::Error) -> Self {
        FlistError::Serialization(e.to_string())
    }
}

impl From<quick_xml::Error> for FlistError {
    fn from(e: quick_xml::Error) -> Self {
        FlistError::Serialization(e.to_string())
    }
}
