//! Array fields.
//!
//! An [`ArrayField`] is addressed through its parent record and field, so it
//! always reflects the parent's current state. The elements it hands out are
//! record views of their own and keep their node if the element is later
//! replaced.

use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;

use super::node::{ArrayData, FieldEntry, NodeRef, Slot, new_node};
use super::record::Record;
use super::write_op::build_element;
use crate::error::{FlistError, Result};
use crate::flist_value::{FlistMap, FlistValue, Key};
use crate::types::{ELEMID_ANY, ElemId, FieldDescriptor};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

#[derive(Clone)]
pub struct ArrayField {
    parent: Record,
    desc: FieldDescriptor,
}

impl ArrayField {
    pub(crate) fn new(parent: Record, desc: FieldDescriptor) -> Self {
        Self { parent, desc }
    }

    pub fn field(&self) -> &FieldDescriptor {
        &self.desc
    }

    pub fn parent(&self) -> &Record {
        &self.parent
    }

    fn with_data<R>(&self, f: impl FnOnce(Option<&ArrayData>) -> R) -> R {
        let node = self.parent.node.borrow();
        match node.fields.get(&self.desc.number).map(|e| &e.slot) {
            Some(Slot::Array(data)) => f(Some(data)),
            _ => f(None),
        }
    }

    /// Runs `f` on the array's data, creating the field if it is absent.
    fn with_data_mut<R>(&self, f: impl FnOnce(&mut ArrayData) -> R) -> R {
        let mut node = self.parent.node.borrow_mut();
        let entry = node
            .fields
            .entry(self.desc.number)
            .or_insert_with(|| FieldEntry {
                desc: self.desc.clone(),
                slot: Slot::Array(ArrayData::default()),
            });
        let mut data = match std::mem::replace(&mut entry.slot, Slot::Null) {
            Slot::Array(data) => data,
            _ => ArrayData::default(),
        };
        let out = f(&mut data);
        entry.slot = Slot::Array(data);
        out
    }

    fn not_found(&self, elem_id: i64) -> FlistError {
        FlistError::ElementNotFound {
            field: self.desc.name.clone(),
            elem_id,
        }
    }

    fn element_view(&self, elem: &Option<NodeRef>) -> Option<Record> {
        elem.as_ref()
            .map(|node| Record::from_node(Rc::clone(&self.parent.ctx), Rc::clone(node)))
    }

    // ════════════════════════════════════════════════════════════════════════
    // Element access
    // ════════════════════════════════════════════════════════════════════════

    /// The element at `elem_id`; `Ok(None)` for an explicit null element.
    ///
    /// The wildcard returns the `-1` element if there is one, otherwise the
    /// first element.
    pub fn get(&self, elem_id: impl Into<ElemId>) -> Result<Option<Record>> {
        let id = elem_id.into().normalize()?;
        self.with_data(|data| {
            let data = data.ok_or_else(|| self.not_found(id))?;
            let found = data.locate(id).ok_or_else(|| self.not_found(id))?;
            Ok(data.elems.get(&found).and_then(|elem| self.element_view(elem)))
        })
    }

    /// Like [`get`](Self::get), but a missing element yields `default`.
    pub fn get_or(&self, elem_id: impl Into<ElemId>, default: Option<Record>) -> Result<Option<Record>> {
        match self.get(elem_id) {
            Err(e) if e.is_not_found() => Ok(default),
            other => other,
        }
    }

    pub fn contains(&self, elem_id: impl Into<ElemId>) -> Result<bool> {
        let id = elem_id.into().normalize()?;
        Ok(self.with_data(|data| data.and_then(|d| d.locate(id)).is_some()))
    }

    /// Stores a copy of `record` (or a null element) at `elem_id`.
    pub fn set(&self, elem_id: impl Into<ElemId>, record: Option<&Record>) -> Result<()> {
        let id = elem_id.into().normalize()?;
        let elem = record.map(|r| new_node(r.node.borrow().deep_copy()));
        self.with_data_mut(|data| data.elems.insert(id, elem));
        Ok(())
    }

    /// Stores an element built from detached data (mapping, name list or null).
    pub fn set_value(&self, elem_id: impl Into<ElemId>, data: impl Into<FlistValue>) -> Result<()> {
        let id = elem_id.into().normalize()?;
        let elem = build_element(&self.parent.ctx, &self.desc, data.into())?;
        self.with_data_mut(|d| d.elems.insert(id, elem));
        Ok(())
    }

    /// Replaces every element; see [`Record::set`] for the accepted shapes.
    pub fn set_all(&self, data: impl Into<FlistValue>) -> Result<()> {
        self.parent.set(&self.desc, data)
    }

    /// Removes one element. Removing the last one leaves the field present
    /// but virtual-empty.
    pub fn delete(&self, elem_id: impl Into<ElemId>) -> Result<()> {
        self.pop(elem_id).map(|_| ())
    }

    pub fn pop(&self, elem_id: impl Into<ElemId>) -> Result<Option<Record>> {
        let id = elem_id.into().normalize()?;
        let found = self
            .with_data(|data| data.and_then(|d| d.locate(id)))
            .ok_or_else(|| self.not_found(id))?;
        let removed = self.with_data_mut(|data| data.elems.shift_remove(&found));
        Ok(removed.and_then(|elem| self.element_view(&elem)))
    }

    /// Drops every element; the field stays present and virtual-empty.
    pub fn clear(&self) {
        self.with_data_mut(|data| data.elems.clear());
    }

    // ════════════════════════════════════════════════════════════════════════
    // Inspection
    // ════════════════════════════════════════════════════════════════════════

    pub fn len(&self) -> usize {
        self.with_data(|data| data.map_or(0, |d| d.elems.len()))
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// False when empty or holding a single null element.
    pub fn is_truthy(&self) -> bool {
        self.with_data(|data| match data {
            None => false,
            Some(d) => match d.elems.len() {
                0 => false,
                1 => d.elems.values().all(Option::is_some),
                _ => true,
            },
        })
    }

    pub fn count(&self, recursive: bool) -> usize {
        self.with_data(|data| data.map_or(0, |d| d.count(recursive)))
    }

    pub fn keys(&self) -> Vec<i64> {
        self.with_data(|data| data.map_or_else(Vec::new, |d| d.elems.keys().copied().collect()))
    }

    /// Snapshot of `(elem_id, element)` pairs.
    pub fn items(&self) -> Vec<(i64, Option<Record>)> {
        self.with_data(|data| {
            data.map_or_else(Vec::new, |d| {
                d.elems
                    .iter()
                    .map(|(id, elem)| (*id, self.element_view(elem)))
                    .collect()
            })
        })
    }

    pub fn values(&self) -> Vec<Option<Record>> {
        self.items().into_iter().map(|(_, elem)| elem).collect()
    }

    pub fn iter(&self) -> std::vec::IntoIter<(i64, Option<Record>)> {
        self.items().into_iter()
    }

    pub fn asdict(&self) -> FlistValue {
        let map: FlistMap = self
            .items()
            .into_iter()
            .map(|(id, elem)| (Key::Id(id), elem.map_or(FlistValue::Null, |r| r.asdict())))
            .collect();
        FlistValue::Object(map)
    }

    // ════════════════════════════════════════════════════════════════════════
    // Merge and sort
    // ════════════════════════════════════════════════════════════════════════

    /// Copies every element of `other` over the element with the same id.
    pub fn update(&self, other: &ArrayField) -> Result<()> {
        for (id, elem) in other.items() {
            self.set(id, elem.as_ref())?;
        }
        Ok(())
    }

    pub fn update_from(&self, data: impl Into<FlistValue>) -> Result<()> {
        let holder = self.parent.sibling();
        holder.set(&self.desc, data)?;
        self.update(&ArrayField::new(holder, self.desc.clone()))
    }

    /// Reorders elements by the given fields of each element. Element ids
    /// are kept; null elements and missing keys sort first.
    pub fn sort(&self, keys: &[&str], order: SortOrder) -> Result<()> {
        if keys.is_empty() {
            return Err(FlistError::InvalidValue("provide at least one sort key".into()));
        }
        let numbers = keys
            .iter()
            .map(|k| self.parent.resolve(*k).map(|d| d.number))
            .collect::<Result<Vec<u32>>>()?;

        self.with_data_mut(|data| {
            let mut elems: Vec<_> = data.elems.drain(..).collect();
            elems.sort_by(|(_, a), (_, b)| {
                let ord = compare_elements(a, b, &numbers);
                match order {
                    SortOrder::Ascending => ord,
                    SortOrder::Descending => ord.reverse(),
                }
            });
            data.elems.extend(elems);
        });
        Ok(())
    }

    /// Whether this array holds the wildcard element itself.
    pub fn has_wildcard(&self) -> bool {
        self.with_data(|data| data.is_some_and(|d| d.elems.contains_key(&ELEMID_ANY)))
    }

    pub(crate) fn data_copy(&self) -> ArrayData {
        self.with_data(|data| data.map(ArrayData::deep_copy).unwrap_or_default())
    }
}

fn compare_elements(
    a: &Option<NodeRef>,
    b: &Option<NodeRef>,
    numbers: &[u32],
) -> Ordering {
    let (a, b) = match (a, b) {
        (None, None) => return Ordering::Equal,
        (None, Some(_)) => return Ordering::Less,
        (Some(_), None) => return Ordering::Greater,
        (Some(a), Some(b)) => (a.borrow(), b.borrow()),
    };
    for number in numbers {
        let ord = match (a.fields.get(number), b.fields.get(number)) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (Some(x), Some(y)) => x.slot.sort_cmp(&y.slot),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

impl PartialEq for ArrayField {
    fn eq(&self, other: &ArrayField) -> bool {
        self.with_data(|mine| {
            other.with_data(|theirs| match (mine, theirs) {
                (Some(a), Some(b)) => a.deep_eq(b),
                (a, b) => a.map_or(0, |d| d.elems.len()) == 0 && b.map_or(0, |d| d.elems.len()) == 0,
            })
        })
    }
}

impl fmt::Debug for ArrayField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.items()).finish()
    }
}
