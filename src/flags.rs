//! Symbolic opcode, search and XML flags.
//!
//! Callers pass flags as a name, a number or a list of either; everything
//! is ORed into one `u32` before it reaches the engine.

use smol_str::SmolStr;

use crate::error::{FlistError, Result};

pub const PCM_OPFLG_COUNT_ONLY: u32 = 0x0010;
pub const PCM_OPFLG2_BY_REF: u32 = 0x0001;
pub const PCM_TRANS_OPEN_READONLY: u32 = 0x0000;
pub const PCM_TRANS_OPEN_READWRITE: u32 = 0x10000;
pub const PIN_XML_BY_TYPE: u32 = 0x0004;
pub const PIN_XML_BY_NAME: u32 = 0x0008;
pub const SRCH_DISTINCT: u32 = 256;
pub const SRCH_EXACT: u32 = 512;
pub const PIN_ELEMID_ANY: u32 = 0xFFFF_FFFF;

static ALL_FLAGS: &[(&str, u32)] = &[
    ("PCM_BUF_FLAG_XBUF", 0x0001),
    ("PCM_BUF_FLAG_XBUF_READ", 0x0002),
    ("PCM_FLDFLG_TYPE_ONLY", 0x0002),
    ("PCM_FLDFLG_NO_QUOTE", 0x0004),
    ("PCM_FLDFLG_WRWNP", 0x0008),
    ("PCM_FLDFLG_FIFO", 0x0100),
    ("PCM_FLDFLG_CMPREV", 0x0010),
    ("PCM_FLDFLG_UNICODE", 0x0020),
    ("PCM_FLDFLG_ENCRYPTED", 0x0040),
    ("PCM_FLDFLG_FLIST_HEAP", 0x0100),
    ("PCM_FLDFLG_DO_ROBJ", 0x0200),
    ("PCM_FLDFLG_DB_ONLY", 0x0400),
    ("PCM_FLDFLG_ID_ONLY", 0x0800),
    ("PCM_FLDFLG_REV_ONLY", 0x1000),
    ("PCM_RECID_ALL", 0xFFFF_FFFF),
    ("PCM_RECID_ASSIGN", 0xFFFF_FFFE),
    ("PCM_RECID_MAX", 0xFFFF_0000),
    ("PIN_ELEMID_ANY", PIN_ELEMID_ANY),
    ("PIN_ELEMID_ASSIGN", 0xFFFF_FFFE),
    ("PIN_ELEMID_MAX", 0xFFFF_0000),
    ("SRCH_CALC_ONLY", 0xFF),
    ("SRCH_CALC_ONLY_1", 1),
    ("SRCH_DISTINCT", SRCH_DISTINCT),
    ("SRCH_EXACT", SRCH_EXACT),
    ("SRCH_WITHOUT_POID", 1024),
    ("SRCH_UNION_TT", 2048),
    ("SRCH_ACCURATE", 4096),
    ("PIN_TYPE_NO", 0),
    ("PIN_TYPE_YES", 1),
    ("PIN_BOOLEAN_FALSE", 0),
    ("PIN_BOOLEAN_TRUE", 1),
    ("PIN_RESULT_FAIL", 0),
    ("PIN_RESULT_PASS", 1),
    ("PCM_CONTEXT_CLOSE_FD_ONLY", 0x01),
    ("PCM_OPFLG_NO_DESCEND", 0x0002),
    ("PCM_OPFLG_CM_LOOPBACK", 0x0002),
    ("PCM_OPFLG_META_ONLY", 0x0004),
    ("PCM_OPFLG_EM_LOOPBACK", 0x0004),
    ("PCM_OPFLG_SUPPRESS_DESC", 0x0008),
    ("PCM_OPFLG_CUST_FLDS_ONLY", 0x8000),
    ("PCM_OPFLG_REV_CHECK", 0x0008),
    ("PCM_OPFLG_SET_REV_DELETED", 0x0008),
    ("PCM_OPFLG_FM_LOOPBACK", 0x0008),
    ("PCM_OPFLG_TIMOS_LOOPBACK", 0x0010),
    ("PCM_OPFLG_TIMOS_PEER_LOOPBACK", 0x0020),
    ("PCM_OPFLG_READ_DB", 0x0200_0000),
    ("PCM_OPFLG_COUNT_ONLY", PCM_OPFLG_COUNT_ONLY),
    ("PCM_OPFLG_NO_LOCK", 0x0800_0000),
    ("PCM_OPFLG_ADD_ENTRY", 0x0020),
    ("PCM_OPFLG_USE_POID_GIVEN", 0x0040),
    ("PCM_OPFLG_USE_LOCATOR_SRVC", 0x0040),
    ("PCM_OPFLG_CALC_ONLY", 0x0080),
    ("PCM_OPFLG_READ_RESULT", 0x0100),
    ("PCM_OPFLG_SORT_DESC", 0x0010),
    ("PCM_OPFLG_SORT_ASCE", 0x0080),
    ("PCM_OPFLG_NO_RESULTS", 0x0200),
    ("PCM_OPFLG_CACHEABLE", 0x0400),
    ("PCM_OPFLG_SUPPRESS_AUDIT", 0x0800),
    ("PCM_OPFLG_IGNORE_ERR", 0x1000),
    ("PCM_OPFLG_READ_UNCOMMITTED", 0x0800),
    ("PCM_OPFLG_READ_DELETED_FIELDS", 0x0020_0000),
    ("PCM_OPFLG_USE_NULL", 0x1000),
    ("PCM_OPFLG_NO_DB_FILTER", 0x1000),
    ("PCM_OPFLG_USE_POID_NEAREST", 0x8000),
    ("PCM_OPFLG_USE_POID_PREV", 0x2000),
    ("PCM_OPFLG_USE_POID_NEXT", 0x4000),
    ("PCM_OPFLG_BRAND_READ", 0x2000),
    ("PCM_OPFLG_USE_ROUTING_DB_CACHE", 0x10000),
    ("PCM_OPFLG_LOCK_OBJ", 0x20000),
    ("PCM_TRANS_OPEN_LOCK_OBJ", 0x20000),
    ("PCM_OPFLG_LOCK_DEFAULT", 0x0040_0000),
    ("PCM_TRANS_OPEN_LOCK_DEFAULT", 0x0040_0000),
    ("PCM_OPFLG_LOCK_NONE", 0x0020_0000),
    ("PCM_OPFLG_SEARCH_DB", 0x0080_0000),
    ("PCM_OPFLG_SEARCH_PARTITIONS", 0x1000_0000),
    ("PCM_OPFLG_SEARCH_ONE_PARTITION", 0x2000_0000),
    ("PCM_OPFLG_EXEC_SPROC_ON_DB", 0x0080_0000),
    ("PCM_OPFLG_SEARCH_SDS", 0x40000),
    ("PCM_OPFLG_ORDER_BY_REC_ID", 0x80000),
    ("PCM_OPFLG_SRCH_CALC_RESULTS", 0x0010_0000),
    ("PCM_TRANS_OPEN_READONLY", PCM_TRANS_OPEN_READONLY),
    ("PCM_TRANS_OPEN_READWRITE", PCM_TRANS_OPEN_READWRITE),
    ("PCM_TRANS_OPEN_GLOBALTRANSACTION", 0x2000_0000),
    ("PCM_OPFLG_USE_GIVEN_POID_DB_NUMBER", 0x4000_0000),
    ("PCM_OPFLG2_BY_REF", PCM_OPFLG2_BY_REF),
    ("PCM_OPFLG_RATE_WITH_DISCOUNTING", 0x0010_0000),
    ("PCM_SEARCH_EXEC_ONTIMOS", 0x10000),
    ("PIN_XML_TYPE", 0x0001),
    ("PIN_XML_FLDNO", 0x0002),
    ("PIN_XML_BY_TYPE", PIN_XML_BY_TYPE),
    ("PIN_XML_BY_NAME", PIN_XML_BY_NAME),
    ("PIN_XML_BY_SHORT_NAME", 0x0010),
    ("PIN_STR_MODE_DETAIL", 0),
    ("PIN_STR_MODE_COMPACT", 1),
    ("PIN_STR_MODE_BINARY", 2),
    ("PIN_STR_MODE_MASK", 4),
    ("XA_TRANS_NOFLAGS", 0),
    ("XA_TRANS_FOR_RECOVERY_OPS", 1),
    ("XA_TRANS_TMJOIN", 2),
    ("XA_TRANS_TMRESUME", 3),
    ("XA_TRANS_TWOPHASE", 0),
    ("XA_TRANS_ONEPHASE", 1),
];

/// Looks up a single symbolic flag.
pub fn lookup(name: &str) -> Option<u32> {
    ALL_FLAGS
        .iter()
        .find(|(flag, _)| *flag == name)
        .map(|(_, value)| *value)
}

// ─── FlagSpec ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlagSpec {
    Name(SmolStr),
    Value(u32),
    List(Vec<FlagSpec>),
}

impl FlagSpec {
    pub const NONE: FlagSpec = FlagSpec::Value(0);

    /// ORs every flag together. Unknown names fail with `UnknownFlag`.
    pub fn resolve(&self) -> Result<u32> {
        match self {
            FlagSpec::Value(v) => Ok(*v),
            FlagSpec::Name(name) => {
                lookup(name).ok_or_else(|| FlistError::UnknownFlag(name.clone()))
            }
            FlagSpec::List(items) => items
                .iter()
                .try_fold(0u32, |acc, item| Ok(acc | item.resolve()?)),
        }
    }
}

impl Default for FlagSpec {
    fn default() -> Self {
        FlagSpec::NONE
    }
}

impl From<u32> for FlagSpec {
    fn from(v: u32) -> Self {
        FlagSpec::Value(v)
    }
}

impl From<&str> for FlagSpec {
    fn from(name: &str) -> Self {
        FlagSpec::Name(SmolStr::new(name))
    }
}

impl<T: Into<FlagSpec>> From<Vec<T>> for FlagSpec {
    fn from(items: Vec<T>) -> Self {
        FlagSpec::List(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<FlagSpec> + Clone> From<&[T]> for FlagSpec {
    fn from(items: &[T]) -> Self {
        FlagSpec::List(items.iter().cloned().map(Into::into).collect())
    }
}

/// Shorthand for `FlagSpec::from(spec).resolve()`.
pub fn resolve(spec: impl Into<FlagSpec>) -> Result<u32> {
    spec.into().resolve()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_numbers_and_lists() {
        assert_eq!(resolve("PCM_TRANS_OPEN_READWRITE").unwrap(), 0x10000);
        assert_eq!(resolve(0x20u32).unwrap(), 0x20);
        assert_eq!(resolve(vec!["SRCH_DISTINCT", "SRCH_EXACT"]).unwrap(), 768);

        let mixed = FlagSpec::List(vec![FlagSpec::from("SRCH_EXACT"), FlagSpec::from(1u32)]);
        assert_eq!(mixed.resolve().unwrap(), 513);
    }

    #[test]
    fn unknown_flag_fails() {
        let err = resolve(vec!["SRCH_EXACT", "SRCH_WHATEVER"]).unwrap_err();
        assert_eq!(err, FlistError::UnknownFlag("SRCH_WHATEVER".into()));
    }

    #[test]
    fn empty_list_is_zero() {
        assert_eq!(resolve(Vec::<u32>::new()).unwrap(), 0);
    }
}
