use std::cell::Cell;
use std::rc::Rc;

use smol_str::SmolStr;

use crate::catalog::FieldCatalog;
use crate::error::Result;
use crate::types::{FieldDescriptor, FieldId};

pub mod array;
mod node;
mod read_op;
pub mod record;
mod value;
mod write_op;

pub use array::ArrayField;
pub use record::{Record, RecordIter};
pub use value::Value;

/// State shared by every record of one client: the field catalog and the
/// session database used to default POIDs.
#[derive(Debug)]
pub struct FlistContext {
    catalog: FieldCatalog,
    database: Cell<u64>,
    xml_root: SmolStr,
}

impl FlistContext {
    pub fn new(catalog: FieldCatalog, database: u64) -> Rc<Self> {
        Self::with_xml_root(catalog, database, SmolStr::new_static("flist"))
    }

    pub fn with_xml_root(catalog: FieldCatalog, database: u64, xml_root: SmolStr) -> Rc<Self> {
        Rc::new(Self {
            catalog,
            database: Cell::new(database),
            xml_root,
        })
    }

    pub fn catalog(&self) -> &FieldCatalog {
        &self.catalog
    }

    pub fn resolve(&self, field: impl Into<FieldId>) -> Result<FieldDescriptor> {
        self.catalog.resolve(field)
    }

    pub fn database(&self) -> u64 {
        self.database.get()
    }

    pub fn set_database(&self, database: u64) {
        self.database.set(database);
    }

    pub fn xml_root(&self) -> &str {
        &self.xml_root
    }
}

#[cfg(test)]
mod tests;
