//! The execution interface records are sent through.
//!
//! An [`Engine`] owns the transport: it connects, runs opcodes against
//! records and converts records to and from the engine's legacy text form.
//! [`LoopbackEngine`] is the in-process implementation used by the demo and
//! the tests.

mod loopback;

pub use loopback::{LoopbackEngine, decode_text, encode_text};

use smol_str::SmolStr;

use crate::error::{FlistError, Result};
use crate::flist::Record;
use crate::flist_value::FlistValue;

// ─── Opcodes ────────────────────────────────────────────────────────────────

pub const PCM_OP_CREATE_OBJ: u32 = 1;
pub const PCM_OP_DELETE_OBJ: u32 = 2;
pub const PCM_OP_READ_OBJ: u32 = 3;
pub const PCM_OP_READ_FLDS: u32 = 4;
pub const PCM_OP_WRITE_FLDS: u32 = 5;
pub const PCM_OP_DELETE_FLDS: u32 = 6;
pub const PCM_OP_SEARCH: u32 = 7;
pub const PCM_OP_INC_FLDS: u32 = 8;
pub const PCM_OP_TRANS_OPEN: u32 = 11;
pub const PCM_OP_TRANS_ABORT: u32 = 12;
pub const PCM_OP_TRANS_COMMIT: u32 = 13;
pub const PCM_OP_GLOBAL_SEARCH: u32 = 14;
pub const PCM_OP_TEST_LOOPBACK: u32 = 43;
pub const PCM_OP_STEP_SEARCH: u32 = 51;
pub const PCM_OP_STEP_NEXT: u32 = 52;
pub const PCM_OP_STEP_END: u32 = 53;

const OPCODES: &[(&str, u32)] = &[
    ("PCM_OP_CREATE_OBJ", PCM_OP_CREATE_OBJ),
    ("PCM_OP_DELETE_OBJ", PCM_OP_DELETE_OBJ),
    ("PCM_OP_READ_OBJ", PCM_OP_READ_OBJ),
    ("PCM_OP_READ_FLDS", PCM_OP_READ_FLDS),
    ("PCM_OP_WRITE_FLDS", PCM_OP_WRITE_FLDS),
    ("PCM_OP_DELETE_FLDS", PCM_OP_DELETE_FLDS),
    ("PCM_OP_SEARCH", PCM_OP_SEARCH),
    ("PCM_OP_INC_FLDS", PCM_OP_INC_FLDS),
    ("PCM_OP_TRANS_OPEN", PCM_OP_TRANS_OPEN),
    ("PCM_OP_TRANS_ABORT", PCM_OP_TRANS_ABORT),
    ("PCM_OP_TRANS_COMMIT", PCM_OP_TRANS_COMMIT),
    ("PCM_OP_GLOBAL_SEARCH", PCM_OP_GLOBAL_SEARCH),
    ("PCM_OP_TEST_LOOPBACK", PCM_OP_TEST_LOOPBACK),
    ("PCM_OP_STEP_SEARCH", PCM_OP_STEP_SEARCH),
    ("PCM_OP_STEP_NEXT", PCM_OP_STEP_NEXT),
    ("PCM_OP_STEP_END", PCM_OP_STEP_END),
];

/// Looks an opcode up in the built-in table.
pub fn builtin_opcode(name: &str) -> Option<u32> {
    OPCODES
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, code)| *code)
}

/// Reverse of [`builtin_opcode`], for log lines.
pub fn builtin_opcode_name(code: u32) -> Option<&'static str> {
    OPCODES.iter().find(|(_, c)| *c == code).map(|(n, _)| *n)
}

/// An opcode given by name or by number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Opcode {
    Name(SmolStr),
    Number(u32),
}

impl From<&str> for Opcode {
    fn from(name: &str) -> Self {
        Opcode::Name(SmolStr::new(name))
    }
}

impl From<u32> for Opcode {
    fn from(code: u32) -> Self {
        Opcode::Number(code)
    }
}

// ─── Engine ─────────────────────────────────────────────────────────────────

pub trait Engine {
    /// Opens the session and returns its database number.
    fn connect(&mut self) -> Result<u64>;

    fn disconnect(&mut self) -> Result<()>;

    /// Runs `opcode` on `input`. With `by_reference` the engine may treat
    /// `input` as its own working copy; the caller writes the output back
    /// into it.
    fn execute(
        &mut self,
        input: &Record,
        opcode: u32,
        flags: u32,
        by_reference: bool,
    ) -> Result<FlistValue>;

    fn opcode_by_name(&self, name: &str) -> Result<u32> {
        builtin_opcode(name).ok_or_else(|| FlistError::UnknownOperation(SmolStr::new(name)))
    }

    /// The engine's legacy line-oriented text form.
    fn encode_text(&self, record: &Record) -> Result<String>;

    fn decode_text(&self, text: &str) -> Result<FlistValue>;
}

impl<E: Engine + ?Sized> Engine for Box<E> {
    fn connect(&mut self) -> Result<u64> {
        (**self).connect()
    }

    fn disconnect(&mut self) -> Result<()> {
        (**self).disconnect()
    }

    fn execute(
        &mut self,
        input: &Record,
        opcode: u32,
        flags: u32,
        by_reference: bool,
    ) -> Result<FlistValue> {
        (**self).execute(input, opcode, flags, by_reference)
    }

    fn opcode_by_name(&self, name: &str) -> Result<u32> {
        (**self).opcode_by_name(name)
    }

    fn encode_text(&self, record: &Record) -> Result<String> {
        (**self).encode_text(record)
    }

    fn decode_text(&self, text: &str) -> Result<FlistValue> {
        (**self).decode_text(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opcode_table() {
        assert_eq!(builtin_opcode("PCM_OP_SEARCH"), Some(7));
        assert_eq!(builtin_opcode("PCM_OP_TEST_LOOPBACK"), Some(PCM_OP_TEST_LOOPBACK));
        assert_eq!(builtin_opcode("FAKE_OPCODE"), None);
        assert_eq!(builtin_opcode_name(13), Some("PCM_OP_TRANS_COMMIT"));
    }

    #[test]
    fn default_lookup_reports_unknown_names() {
        let engine = LoopbackEngine::new();
        assert_eq!(engine.opcode_by_name("PCM_OP_READ_OBJ").unwrap(), 3);
        assert!(matches!(
            engine.opcode_by_name("FAKE_OPCODE"),
            Err(FlistError::UnknownOperation(name)) if name == "FAKE_OPCODE"
        ));
    }
}
