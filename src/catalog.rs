//! Field name/number resolution.
//!
//! The directory behind the catalog is external; [`FieldCatalog`] only
//! memoizes what it answers. Numeric identifiers may be legacy aliases
//! (e.g. `16` for `PIN_FLD_POID`) that carry no type, so numbers are always
//! resolved through their name to the canonical number and type.

use std::cell::RefCell;
use std::num::NonZeroUsize;

use lru::LruCache;
use rustc_hash::FxHashMap;
use smol_str::SmolStr;
use tracing::debug;

use crate::error::{FlistError, Result};
use crate::types::{FieldDescriptor, FieldId, FieldType, canonical_number};

/// The catalog interface: where field names, numbers and types come from.
pub trait FieldDirectory {
    /// Canonical number and declared type of a field name.
    fn lookup_by_name(&self, name: &str) -> Option<(u32, FieldType)>;

    /// Name of a field number. The type may be missing for alias numbers.
    fn lookup_by_number(&self, number: u32) -> Option<(SmolStr, Option<FieldType>)>;
}

// ─── FieldCatalog ───────────────────────────────────────────────────────────

pub struct FieldCatalog {
    directory: Box<dyn FieldDirectory>,
    by_name: RefCell<LruCache<SmolStr, FieldDescriptor>>,
    by_number: RefCell<LruCache<u32, FieldDescriptor>>,
}

impl FieldCatalog {
    pub fn new(directory: impl FieldDirectory + 'static, capacity: NonZeroUsize) -> Self {
        Self {
            directory: Box::new(directory),
            by_name: RefCell::new(LruCache::new(capacity)),
            by_number: RefCell::new(LruCache::new(capacity)),
        }
    }

    pub fn resolve(&self, id: impl Into<FieldId>) -> Result<FieldDescriptor> {
        match id.into() {
            FieldId::Name(name) => self.resolve_name(&name),
            FieldId::Number(number) => self.resolve_number(number),
        }
    }

    pub fn resolve_name(&self, name: &str) -> Result<FieldDescriptor> {
        if let Some(desc) = self.by_name.borrow_mut().get(name) {
            return Ok(desc.clone());
        }
        let (number, field_type) = self
            .directory
            .lookup_by_name(name)
            .ok_or_else(|| FlistError::FieldNotFound(SmolStr::new(name)))?;
        debug!(field = name, number, %field_type, "catalog miss by name");

        let desc = FieldDescriptor::new(number, name, field_type);
        self.by_name.borrow_mut().put(desc.name.clone(), desc.clone());
        self.by_number.borrow_mut().put(number, desc.clone());
        Ok(desc)
    }

    pub fn resolve_number(&self, number: u32) -> Result<FieldDescriptor> {
        if let Some(desc) = self.by_number.borrow_mut().get(&number) {
            return Ok(desc.clone());
        }
        let (name, _) = self
            .directory
            .lookup_by_number(number)
            .ok_or_else(|| FlistError::FieldNotFound(SmolStr::new(number.to_string())))?;
        debug!(number, field = %name, "catalog miss by number");

        // The alias number's own type is unreliable; go through the name.
        let desc = self.resolve_name(&name)?;
        self.by_number.borrow_mut().put(number, desc.clone());
        Ok(desc)
    }

    /// Drops every memoized descriptor.
    pub fn reset(&self) {
        self.by_name.borrow_mut().clear();
        self.by_number.borrow_mut().clear();
    }

    pub fn cached_len(&self) -> (usize, usize) {
        (self.by_name.borrow().len(), self.by_number.borrow().len())
    }
}

impl std::fmt::Debug for FieldCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (names, numbers) = self.cached_len();
        f.debug_struct("FieldCatalog")
            .field("cached_names", &names)
            .field("cached_numbers", &numbers)
            .finish()
    }
}

// ─── StaticDirectory ────────────────────────────────────────────────────────

/// An in-memory directory.
///
/// Fields are registered by base number; the canonical number carries the
/// type code in its top byte, and both numbers resolve to the name.
#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
    by_name: FxHashMap<SmolStr, (u32, FieldType)>,
    by_number: FxHashMap<u32, (SmolStr, Option<FieldType>)>,
}

impl StaticDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_field(mut self, name: &str, base: u32, field_type: FieldType) -> Self {
        self.register(name, base, field_type);
        self
    }

    pub fn register(&mut self, name: &str, base: u32, field_type: FieldType) {
        let name = SmolStr::new(name);
        let canonical = canonical_number(base, field_type);
        self.by_name.insert(name.clone(), (canonical, field_type));
        self.by_number.insert(canonical, (name.clone(), Some(field_type)));
        self.by_number.entry(base).or_insert((name, None));
    }

    /// The `PIN_FLD_*` fields used by searches, transactions and tests.
    pub fn builtin() -> Self {
        let mut dir = Self::new();
        for (name, base, field_type) in BUILTIN_FIELDS {
            dir.register(name, *base, *field_type);
        }
        dir
    }
}

impl FieldDirectory for StaticDirectory {
    fn lookup_by_name(&self, name: &str) -> Option<(u32, FieldType)> {
        self.by_name.get(name).copied()
    }

    fn lookup_by_number(&self, number: u32) -> Option<(SmolStr, Option<FieldType>)> {
        self.by_number.get(&number).cloned()
    }
}

static BUILTIN_FIELDS: &[(&str, u32, FieldType)] = &[
    ("PIN_FLD_POID", 16, FieldType::Poid),
    ("PIN_FLD_ACCOUNT_OBJ", 40, FieldType::Poid),
    ("PIN_FLD_SERVICE_OBJ", 41, FieldType::Poid),
    ("PIN_FLD_ITEM_OBJ", 107, FieldType::Poid),
    ("PIN_FLD_CREATED_T", 19, FieldType::Timestamp),
    ("PIN_FLD_MOD_T", 20, FieldType::Timestamp),
    ("PIN_FLD_END_T", 62, FieldType::Timestamp),
    ("PIN_FLD_FLAGS", 71, FieldType::Int32),
    ("PIN_FLD_COUNT", 105, FieldType::Int32),
    ("PIN_FLD_RESULTS_LIMIT", 9055, FieldType::Int32),
    ("PIN_FLD_STATUS", 145, FieldType::Enum),
    ("PIN_FLD_STATUS_FLAGS", 146, FieldType::Int32),
    ("PIN_FLD_TYPE", 150, FieldType::Enum),
    ("PIN_FLD_TEMPLATE", 98, FieldType::String),
    ("PIN_FLD_NAME", 17, FieldType::String),
    ("PIN_FLD_DESCR", 54, FieldType::String),
    ("PIN_FLD_LOGIN", 59, FieldType::String),
    ("PIN_FLD_USAGE_TYPE", 7752, FieldType::String),
    ("PIN_FLD_RATE_TAG", 2215, FieldType::String),
    ("PIN_FLD_EVENT_TYPE", 1573, FieldType::String),
    ("PIN_FLD_SERVICE_TYPE", 3109, FieldType::String),
    ("PIN_FLD_CUSTOMER_SEGMENT_LIST", 7854, FieldType::String),
    ("PIN_FLD_AMOUNT", 57, FieldType::Decimal),
    ("PIN_FLD_QUANTITY", 58, FieldType::Decimal),
    ("PIN_FLD_DUE", 72, FieldType::Decimal),
    ("PIN_FLD_SELECTOR", 2223, FieldType::BinaryString),
    ("PIN_FLD_BUFFER", 64, FieldType::Buffer),
    ("PIN_FLD_INHERITED_INFO", 1114, FieldType::Substruct),
    ("PIN_FLD_EVENT", 1200, FieldType::Substruct),
    ("PIN_FLD_ARGS", 84, FieldType::Array),
    ("PIN_FLD_RESULTS", 85, FieldType::Array),
    ("PIN_FLD_VALUES", 86, FieldType::Array),
    ("PIN_FLD_FIELD", 87, FieldType::Array),
    ("PIN_FLD_BALANCES", 1100, FieldType::Array),
    ("PIN_FLD_PRODUCTS", 1101, FieldType::Array),
    ("PIN_FLD_SERVICES", 1102, FieldType::Array),
];
