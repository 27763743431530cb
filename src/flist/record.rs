use std::fmt;
use std::rc::Rc;

use smol_str::SmolStr;

use super::FlistContext;
use super::array::{ArrayField, SortOrder};
use super::node::{FieldEntry, FlistNode, NodeRef, Slot, new_node};
use super::value::Value;
use super::write_op::{build_node, node_from_names};
use crate::error::{FlistError, Result};
use crate::flist_value::{FlistMap, FlistValue, Key};
use crate::types::{FieldDescriptor, FieldId};

/// A view onto one flist node.
///
/// Cloning a `Record` clones the view, not the data; use [`Record::copy`]
/// for an independent duplicate. Mutation goes through `&self` because any
/// number of views may share a node.
#[derive(Clone)]
pub struct Record {
    pub(crate) ctx: Rc<FlistContext>,
    pub(crate) node: NodeRef,
}

impl Record {
    pub fn new(ctx: &Rc<FlistContext>) -> Self {
        Self::from_node(Rc::clone(ctx), new_node(FlistNode::default()))
    }

    /// Builds a record from detached data: a mapping of fields, or a list of
    /// field names that become unset fields.
    pub fn from_data(ctx: &Rc<FlistContext>, data: impl Into<FlistValue>) -> Result<Self> {
        let node = match data.into() {
            FlistValue::Null => FlistNode::default(),
            FlistValue::Object(map) => build_node(ctx, map)?,
            FlistValue::List(names) => node_from_names(ctx, names)?,
            other => {
                return Err(FlistError::InvalidValue(format!(
                    "cannot build a record from a {}",
                    other.kind()
                )));
            }
        };
        Ok(Self::from_node(Rc::clone(ctx), new_node(node)))
    }

    pub(crate) fn from_node(ctx: Rc<FlistContext>, node: NodeRef) -> Self {
        Self { ctx, node }
    }

    pub fn context(&self) -> &Rc<FlistContext> {
        &self.ctx
    }

    /// An empty record sharing this record's context.
    pub fn sibling(&self) -> Record {
        Record::new(&self.ctx)
    }

    pub fn resolve(&self, field: impl Into<FieldId>) -> Result<FieldDescriptor> {
        self.ctx.resolve(field)
    }

    /// True when both views look at the same storage node.
    pub fn same_node(&self, other: &Record) -> bool {
        Rc::ptr_eq(&self.node, &other.node)
    }

    pub(crate) fn view(&self, entry: &FieldEntry) -> Value {
        match &entry.slot {
            Slot::Null => Value::Null,
            Slot::Int(i) => Value::Int(*i),
            Slot::Enum(i) => Value::Enum(*i),
            Slot::Str(s) => Value::Str(s.clone()),
            Slot::Timestamp(t) => Value::Timestamp(*t),
            Slot::Decimal(d) => Value::Decimal(d.clone()),
            Slot::Poid(p) => Value::Poid(p.clone()),
            Slot::BinStr(b) => Value::BinStr(b.clone()),
            Slot::Buf(b) => Value::Buf(b.clone()),
            Slot::Flist(node) => Value::Flist(Record::from_node(Rc::clone(&self.ctx), Rc::clone(node))),
            Slot::Array(_) => Value::Array(ArrayField::new(self.clone(), entry.desc.clone())),
        }
    }

    // ════════════════════════════════════════════════════════════════════════
    // Structure
    // ════════════════════════════════════════════════════════════════════════

    /// True for set fields, explicit nulls and virtual-empty arrays.
    pub fn contains(&self, field: impl Into<FieldId>) -> Result<bool> {
        let desc = self.resolve(field)?;
        Ok(self.contains_resolved(&desc))
    }

    pub(crate) fn contains_resolved(&self, desc: &FieldDescriptor) -> bool {
        self.node.borrow().fields.contains_key(&desc.number)
    }

    pub fn delete(&self, field: impl Into<FieldId>) -> Result<()> {
        self.pop(field).map(|_| ())
    }

    /// Removes a field and returns what it held.
    pub fn pop(&self, field: impl Into<FieldId>) -> Result<Value> {
        let desc = self.resolve(field)?;
        let removed = self.node.borrow_mut().fields.shift_remove(&desc.number);
        let entry = removed.ok_or_else(|| FlistError::FieldNotFound(desc.name.clone()))?;
        // The array view would address the now-absent field; hand back a
        // detached record holding the removed elements instead.
        Ok(match entry.slot {
            Slot::Array(_) => {
                let holder = self.sibling();
                holder.node.borrow_mut().fields.insert(desc.number, entry);
                Value::Array(ArrayField::new(holder, desc))
            }
            _ => self.view(&entry),
        })
    }

    pub fn clear(&self) {
        self.node.borrow_mut().fields.clear();
    }

    /// Number of fields, not counting virtual-empty arrays.
    pub fn len(&self) -> usize {
        self.node.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Field count; `recursive` adds substruct contents and one per array
    /// element (null elements count 1, others their own recursive count).
    pub fn count(&self, recursive: bool) -> usize {
        self.node.borrow().count(recursive)
    }

    // ════════════════════════════════════════════════════════════════════════
    // Iteration
    // ════════════════════════════════════════════════════════════════════════

    /// Iterates over a snapshot of the field set taken now; fields deleted
    /// before they are reached are skipped.
    pub fn iter(&self) -> RecordIter {
        let numbers: Vec<u32> = self.node.borrow().live_entries().map(|(n, _)| *n).collect();
        RecordIter {
            record: self.clone(),
            numbers: numbers.into_iter(),
        }
    }

    pub fn fields(&self) -> Vec<FieldDescriptor> {
        self.node
            .borrow()
            .live_entries()
            .map(|(_, e)| e.desc.clone())
            .collect()
    }

    pub fn keys(&self) -> Vec<SmolStr> {
        self.node
            .borrow()
            .live_entries()
            .map(|(_, e)| e.desc.name.clone())
            .collect()
    }

    pub fn values(&self) -> Vec<Value> {
        self.iter().map(|(_, v)| v).collect()
    }

    // ════════════════════════════════════════════════════════════════════════
    // Copy and merge
    // ════════════════════════════════════════════════════════════════════════

    pub fn copy(&self) -> Record {
        let node = self.node.borrow().deep_copy();
        Record::from_node(Rc::clone(&self.ctx), new_node(node))
    }

    /// Recursive merge: substructs and arrays present on both sides merge
    /// (arrays element by element); everything else is overwritten.
    pub fn update(&self, other: &Record) -> Result<()> {
        for (desc, value) in other.iter() {
            self.merge_field(&desc, &value)?;
        }
        Ok(())
    }

    pub fn update_from(&self, data: impl Into<FlistValue>) -> Result<()> {
        let other = Record::from_data(&self.ctx, data)?;
        self.update(&other)
    }

    fn merge_field(&self, desc: &FieldDescriptor, value: &Value) -> Result<()> {
        match value {
            Value::Flist(theirs) => {
                if let Ok(Value::Flist(ours)) = self.get_resolved(desc) {
                    return ours.update(theirs);
                }
            }
            Value::Array(theirs) if self.contains_resolved(desc) => {
                return ArrayField::new(self.clone(), desc.clone()).update(theirs);
            }
            _ => {}
        }
        self.set_resolved_value(desc, value)
    }

    /// `copy()` of `self` updated with `other`.
    pub fn add(&self, other: &Record) -> Result<Record> {
        let out = self.copy();
        out.update(other)?;
        Ok(out)
    }

    pub fn sort(&self, field: impl Into<FieldId>, keys: &[&str], order: SortOrder) -> Result<()> {
        self.get_array(field)?.sort(keys, order)
    }

    pub fn sort_reverse(&self, field: impl Into<FieldId>, keys: &[&str]) -> Result<()> {
        self.sort(field, keys, SortOrder::Descending)
    }

    /// Detached copy of the whole record.
    pub fn asdict(&self) -> FlistValue {
        let mut map = FlistMap::default();
        for (desc, value) in self.iter() {
            map.insert(Key::Name(desc.name), value.to_flist_value());
        }
        FlistValue::Object(map)
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Record) -> bool {
        self.same_node(other) || self.node.borrow().deep_eq(&other.node.borrow())
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.iter().map(|(desc, value)| (desc.name, value)))
            .finish()
    }
}

// ─── Iterator ───────────────────────────────────────────────────────────────

pub struct RecordIter {
    record: Record,
    numbers: std::vec::IntoIter<u32>,
}

impl Iterator for RecordIter {
    type Item = (FieldDescriptor, Value);

    fn next(&mut self) -> Option<Self::Item> {
        for number in self.numbers.by_ref() {
            let node = self.record.node.borrow();
            if let Some(entry) = node.fields.get(&number) {
                if !entry.slot.is_virtual() {
                    return Some((entry.desc.clone(), self.record.view(entry)));
                }
            }
        }
        None
    }
}

impl IntoIterator for &Record {
    type Item = (FieldDescriptor, Value);
    type IntoIter = RecordIter;

    fn into_iter(self) -> RecordIter {
        self.iter()
    }
}
