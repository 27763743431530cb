use smol_str::SmolStr;

use super::array::ArrayField;
use super::record::Record;
use super::value::Value;
use crate::error::{FlistError, Result};
use crate::poid::Poid;
use crate::types::{FieldDescriptor, FieldId, FieldType};

impl Record {
    /// Reads a field. Unset fields fail with `FieldNotFound`.
    pub fn get(&self, field: impl Into<FieldId>) -> Result<Value> {
        let desc = self.resolve(field)?;
        self.get_resolved(&desc)
    }

    pub(crate) fn get_resolved(&self, desc: &FieldDescriptor) -> Result<Value> {
        let node = self.node.borrow();
        let entry = node
            .fields
            .get(&desc.number)
            .ok_or_else(|| FlistError::FieldNotFound(desc.name.clone()))?;
        Ok(self.view(entry))
    }

    /// `Ok(None)` when the field is unset. Unknown identifiers still fail.
    pub fn get_opt(&self, field: impl Into<FieldId>) -> Result<Option<Value>> {
        let desc = self.resolve(field)?;
        match self.get_resolved(&desc) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn get_or(&self, field: impl Into<FieldId>, default: Value) -> Result<Value> {
        Ok(self.get_opt(field)?.unwrap_or(default))
    }

    // ════════════════════════════════════════════════════════════════════════
    // Typed getters
    //
    // `Ok(None)` is an explicit null; reading a field of another type fails
    // with `TypeMismatch`.
    // ════════════════════════════════════════════════════════════════════════

    fn get_typed(&self, field: FieldId, expected: &[FieldType]) -> Result<Value> {
        let desc = self.resolve(field)?;
        if !expected.contains(&desc.field_type) {
            return Err(FlistError::mismatch(&desc.name, expected[0], desc.field_type.as_str()));
        }
        self.get_resolved(&desc)
    }

    pub fn get_int(&self, field: impl Into<FieldId>) -> Result<Option<i32>> {
        Ok(self.get_typed(field.into(), &[FieldType::Int32])?.as_i32())
    }

    pub fn get_enum(&self, field: impl Into<FieldId>) -> Result<Option<i32>> {
        Ok(self.get_typed(field.into(), &[FieldType::Enum])?.as_i32())
    }

    pub fn get_str(&self, field: impl Into<FieldId>) -> Result<Option<SmolStr>> {
        Ok(match self.get_typed(field.into(), &[FieldType::String])? {
            Value::Str(s) => Some(s),
            _ => None,
        })
    }

    /// Epoch seconds.
    pub fn get_timestamp(&self, field: impl Into<FieldId>) -> Result<Option<i64>> {
        Ok(self
            .get_typed(field.into(), &[FieldType::Timestamp])?
            .as_timestamp())
    }

    /// Decimal in its stored textual form.
    pub fn get_decimal(&self, field: impl Into<FieldId>) -> Result<Option<SmolStr>> {
        Ok(match self.get_typed(field.into(), &[FieldType::Decimal])? {
            Value::Decimal(d) => Some(d),
            _ => None,
        })
    }

    pub fn get_poid(&self, field: impl Into<FieldId>) -> Result<Option<Poid>> {
        Ok(match self.get_typed(field.into(), &[FieldType::Poid])? {
            Value::Poid(p) => Some(p),
            _ => None,
        })
    }

    /// Binary strings and buffers.
    pub fn get_bytes(&self, field: impl Into<FieldId>) -> Result<Option<Vec<u8>>> {
        Ok(
            match self.get_typed(field.into(), &[FieldType::BinaryString, FieldType::Buffer])? {
                Value::BinStr(b) | Value::Buf(b) => Some(b),
                _ => None,
            },
        )
    }

    pub fn get_flist(&self, field: impl Into<FieldId>) -> Result<Option<Record>> {
        Ok(match self.get_typed(field.into(), &[FieldType::Substruct])? {
            Value::Flist(r) => Some(r),
            _ => None,
        })
    }

    /// Arrays are never null; a virtual-empty array reads as empty.
    pub fn get_array(&self, field: impl Into<FieldId>) -> Result<ArrayField> {
        let desc = self.resolve(field)?;
        match self.get_typed(FieldId::Number(desc.number), &[FieldType::Array])? {
            Value::Array(a) => Ok(a),
            other => Err(FlistError::mismatch(
                &desc.name,
                FieldType::Array,
                other.field_type().map_or("null", FieldType::as_str),
            )),
        }
    }
}
