//! Owned storage behind [`Record`](super::Record) views.
//!
//! Every substruct and every array element is its own `Rc<RefCell<FlistNode>>`.
//! A view clones the `Rc`, so fetching the same child twice yields views of
//! the same node. Assigning or deleting a field swaps the slot's `Rc`; views
//! handed out earlier keep the node they were made from.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::rc::Rc;

use indexmap::IndexMap;
use smol_str::SmolStr;

use crate::poid::Poid;
use crate::types::{ELEMID_ANY, FieldDescriptor};

pub(crate) type NodeRef = Rc<RefCell<FlistNode>>;

pub(crate) fn new_node(node: FlistNode) -> NodeRef {
    Rc::new(RefCell::new(node))
}

// ─── Slot ───────────────────────────────────────────────────────────────────

/// What a field holds. `Null` is present-but-unset, not absent.
#[derive(Debug, Clone)]
pub(crate) enum Slot {
    Null,
    Int(i32),
    Enum(i32),
    Str(SmolStr),
    Timestamp(i64),
    Decimal(SmolStr),
    Poid(Poid),
    BinStr(Vec<u8>),
    Buf(Vec<u8>),
    Flist(NodeRef),
    Array(ArrayData),
}

impl Slot {
    /// Clones scalars and duplicates child nodes.
    pub(crate) fn deep_copy(&self) -> Slot {
        match self {
            Slot::Flist(node) => Slot::Flist(new_node(node.borrow().deep_copy())),
            Slot::Array(data) => Slot::Array(data.deep_copy()),
            other => other.clone(),
        }
    }

    /// An array with no elements is present but virtual.
    pub(crate) fn is_virtual(&self) -> bool {
        matches!(self, Slot::Array(data) if data.elems.is_empty())
    }

    pub(crate) fn count(&self, recursive: bool) -> usize {
        match self {
            Slot::Flist(node) if recursive => 1 + node.borrow().count(true),
            Slot::Array(data) if recursive => 1 + data.count(true),
            _ => 1,
        }
    }

    pub(crate) fn deep_eq(&self, other: &Slot) -> bool {
        match (self, other) {
            (Slot::Flist(a), Slot::Flist(b)) => {
                Rc::ptr_eq(a, b) || a.borrow().deep_eq(&b.borrow())
            }
            (Slot::Array(a), Slot::Array(b)) => a.deep_eq(b),
            (Slot::Null, Slot::Null) => true,
            (Slot::Int(a), Slot::Int(b)) | (Slot::Enum(a), Slot::Enum(b)) => a == b,
            (Slot::Str(a), Slot::Str(b)) | (Slot::Decimal(a), Slot::Decimal(b)) => a == b,
            (Slot::Timestamp(a), Slot::Timestamp(b)) => a == b,
            (Slot::Poid(a), Slot::Poid(b)) => a == b,
            (Slot::BinStr(a), Slot::BinStr(b)) | (Slot::Buf(a), Slot::Buf(b)) => a == b,
            _ => false,
        }
    }

    /// Ordering used to sort array elements. Nulls sort first; containers
    /// compare equal.
    pub(crate) fn sort_cmp(&self, other: &Slot) -> Ordering {
        match (self, other) {
            (Slot::Null, Slot::Null) => Ordering::Equal,
            (Slot::Null, _) => Ordering::Less,
            (_, Slot::Null) => Ordering::Greater,
            (Slot::Int(a) | Slot::Enum(a), Slot::Int(b) | Slot::Enum(b)) => a.cmp(b),
            (Slot::Str(a), Slot::Str(b)) => a.cmp(b),
            (Slot::Timestamp(a), Slot::Timestamp(b)) => a.cmp(b),
            (Slot::Decimal(a), Slot::Decimal(b)) => {
                let (a, b) = (a.parse::<f64>(), b.parse::<f64>());
                match (a, b) {
                    (Ok(a), Ok(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
                    _ => Ordering::Equal,
                }
            }
            (Slot::Poid(a), Slot::Poid(b)) => a.cmp(b),
            (Slot::BinStr(a) | Slot::Buf(a), Slot::BinStr(b) | Slot::Buf(b)) => a.cmp(b),
            _ => Ordering::Equal,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct FieldEntry {
    pub desc: FieldDescriptor,
    pub slot: Slot,
}

// ─── FlistNode ──────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub(crate) struct FlistNode {
    /// Keyed by canonical field number, in insertion order.
    pub fields: IndexMap<u32, FieldEntry>,
}

impl FlistNode {
    pub(crate) fn deep_copy(&self) -> FlistNode {
        FlistNode {
            fields: self
                .fields
                .iter()
                .map(|(number, entry)| {
                    (
                        *number,
                        FieldEntry {
                            desc: entry.desc.clone(),
                            slot: entry.slot.deep_copy(),
                        },
                    )
                })
                .collect(),
        }
    }

    /// Entries that count as fields: everything but virtual arrays.
    pub(crate) fn live_entries(&self) -> impl Iterator<Item = (&u32, &FieldEntry)> {
        self.fields.iter().filter(|(_, e)| !e.slot.is_virtual())
    }

    pub(crate) fn len(&self) -> usize {
        self.live_entries().count()
    }

    pub(crate) fn count(&self, recursive: bool) -> usize {
        self.live_entries()
            .map(|(_, entry)| entry.slot.count(recursive))
            .sum()
    }

    pub(crate) fn deep_eq(&self, other: &FlistNode) -> bool {
        self.len() == other.len()
            && self.live_entries().all(|(number, entry)| {
                other
                    .fields
                    .get(number)
                    .is_some_and(|o| !o.slot.is_virtual() && entry.slot.deep_eq(&o.slot))
            })
    }
}

// ─── ArrayData ──────────────────────────────────────────────────────────────

/// Sparse elements of one array field. `None` is an explicit null element.
#[derive(Debug, Clone, Default)]
pub(crate) struct ArrayData {
    pub elems: IndexMap<i64, Option<NodeRef>>,
}

impl ArrayData {
    /// The single null element at id 0 that an unset array reads as.
    pub(crate) fn single_null() -> Self {
        let mut elems = IndexMap::new();
        elems.insert(0, None);
        Self { elems }
    }

    pub(crate) fn deep_copy(&self) -> ArrayData {
        ArrayData {
            elems: self
                .elems
                .iter()
                .map(|(id, elem)| {
                    let copy = elem.as_ref().map(|node| new_node(node.borrow().deep_copy()));
                    (*id, copy)
                })
                .collect(),
        }
    }

    /// Element id a lookup lands on: the wildcard falls back to the first
    /// element when no `-1` entry exists.
    pub(crate) fn locate(&self, elem_id: i64) -> Option<i64> {
        if self.elems.contains_key(&elem_id) {
            Some(elem_id)
        } else if elem_id == ELEMID_ANY {
            self.elems.keys().next().copied()
        } else {
            None
        }
    }

    pub(crate) fn count(&self, recursive: bool) -> usize {
        if !recursive {
            return self.elems.len();
        }
        self.elems
            .values()
            .map(|elem| elem.as_ref().map_or(1, |node| node.borrow().count(true)))
            .sum()
    }

    pub(crate) fn deep_eq(&self, other: &ArrayData) -> bool {
        self.elems.len() == other.elems.len()
            && self.elems.iter().all(|(id, elem)| match (elem, other.elems.get(id)) {
                (None, Some(None)) => true,
                (Some(a), Some(Some(b))) => Rc::ptr_eq(a, b) || a.borrow().deep_eq(&b.borrow()),
                _ => false,
            })
    }
}
