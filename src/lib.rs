//! Typed, recursive billing records ("flists") with a field catalog, a
//! search builder, JSON/XML/CBOR codecs and a client that runs opcodes
//! through an [`Engine`](engine::Engine).

pub mod catalog;
pub mod client;
pub mod config;
pub mod deserialization;
pub mod engine;
pub mod error;
pub mod flags;
pub mod flist;
pub mod flist_value;
pub mod poid;
pub mod search;
pub mod serialization;
pub mod types;
pub mod xml;

pub use catalog::{FieldCatalog, FieldDirectory, StaticDirectory};
pub use client::{Client, SearchOutcome, Transaction, TransactionState};
pub use config::{ClientConfig, PinLogLevel};
pub use engine::{Engine, LoopbackEngine, Opcode};
pub use error::{FlistError, Result};
pub use flags::FlagSpec;
pub use flist::array::SortOrder;
pub use flist::{ArrayField, FlistContext, Record, Value};
pub use flist_value::{FlistMap, FlistValue, Key};
pub use poid::Poid;
pub use search::{ResultShape, SearchBuilder};
pub use types::{ElemId, FieldDescriptor, FieldId, FieldType};
pub use xml::XmlStyle;
