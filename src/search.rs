//! Search input builder.
//!
//! Turns a query template plus argument and result shapes into the record
//! the search opcode expects:
//!
//! ```text
//! PIN_FLD_POID      /search (type only)
//! PIN_FLD_FLAGS     search flags
//! PIN_FLD_TEMPLATE  "select X from /account where F1 = V1"
//! PIN_FLD_ARGS      [1] { F1: V1 } [2] { F2: V2 } ...
//! PIN_FLD_RESULTS   [*] { result shape }
//! ```

use std::rc::Rc;

use smol_str::SmolStr;

use crate::error::{FlistError, Result};
use crate::flags::{FlagSpec, PCM_OPFLG_COUNT_ONLY};
use crate::flist::{FlistContext, Record};
use crate::flist_value::{FlistMap, FlistValue, Key};
use crate::types::{ELEMID_ANY, FieldDescriptor, FieldId, FieldType};

const POID_FIELD: &str = "PIN_FLD_POID";
const FLAGS_FIELD: &str = "PIN_FLD_FLAGS";
const TEMPLATE_FIELD: &str = "PIN_FLD_TEMPLATE";
const ARGS_FIELD: &str = "PIN_FLD_ARGS";
const RESULTS_FIELD: &str = "PIN_FLD_RESULTS";
const SEARCH_POID_TYPE: &str = "/search";

/// What the search should return per matching object.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ResultShape {
    /// Every field (`{*: {}}`).
    #[default]
    All,
    /// A single null element; what count-only searches send.
    Null,
    /// Only the listed fields: a list of names or a nested mapping.
    Shape(FlistValue),
}

impl ResultShape {
    pub fn names<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        ResultShape::Shape(FlistValue::names(names))
    }
}

impl From<FlistValue> for ResultShape {
    fn from(shape: FlistValue) -> Self {
        ResultShape::Shape(shape)
    }
}

impl From<Vec<&str>> for ResultShape {
    fn from(names: Vec<&str>) -> Self {
        ResultShape::names(names)
    }
}

// ─── SearchBuilder ──────────────────────────────────────────────────────────

/// Fluent builder for search input records.
///
/// Arguments keep their insertion order and may repeat a field, which a
/// mapping could not express (`where F1 in (V1, V2)`).
///
/// ```ignore
/// let input = SearchBuilder::new("select X from /account where F1 = V1 ")
///     .arg("PIN_FLD_STATUS", 10100)
///     .results(ResultShape::names(["PIN_FLD_POID"]))
///     .build(client.context())?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct SearchBuilder {
    template: SmolStr,
    args: Vec<(FieldId, FlistValue)>,
    results: ResultShape,
    flags: FlagSpec,
    count_only: bool,
}

impl SearchBuilder {
    pub fn new(template: impl Into<SmolStr>) -> Self {
        Self {
            template: template.into(),
            ..Self::default()
        }
    }

    /// Appends one argument. A mapping value on an array field is wrapped
    /// into a one-element array.
    pub fn arg(mut self, field: impl Into<FieldId>, value: impl Into<FlistValue>) -> Self {
        self.args.push((field.into(), value.into()));
        self
    }

    /// Appends every entry of a mapping as an argument, in order.
    pub fn args(mut self, args: FlistMap) -> Result<Self> {
        for (key, value) in args {
            self.args.push((key.to_field_id()?, value));
        }
        Ok(self)
    }

    pub fn results(mut self, shape: impl Into<ResultShape>) -> Self {
        self.results = shape.into();
        self
    }

    /// Flags stored in `PIN_FLD_FLAGS` of the search record.
    pub fn flags(mut self, flags: impl Into<FlagSpec>) -> Self {
        self.flags = flags.into();
        self
    }

    /// Sends a null result array and asks the engine for a count only.
    pub fn count_only(mut self, count_only: bool) -> Self {
        self.count_only = count_only;
        self
    }

    pub fn is_count_only(&self) -> bool {
        self.count_only
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    /// Opcode flags for executing the built record: `base`, plus
    /// `PCM_OPFLG_COUNT_ONLY` for count-only searches.
    pub fn opcode_flags(&self, base: impl Into<FlagSpec>) -> Result<u32> {
        let flags = base.into().resolve()?;
        Ok(if self.count_only { flags | PCM_OPFLG_COUNT_ONLY } else { flags })
    }

    pub fn build(&self, ctx: &Rc<FlistContext>) -> Result<Record> {
        let record = Record::new(ctx);
        record.set(POID_FIELD, SEARCH_POID_TYPE)?;
        // flags are a C int; keep the bit pattern
        record.set(FLAGS_FIELD, self.flags.resolve()? as i32)?;
        record.set(TEMPLATE_FIELD, self.template.as_str())?;

        let mut args = FlistMap::default();
        for (elem_id, (field, value)) in (1i64..).zip(&self.args) {
            let desc = ctx.resolve(field.clone())?;
            let mut entry = FlistMap::default();
            entry.insert(Key::Name(desc.name.clone()), arg_value(ctx, &desc, value.clone())?);
            args.insert(Key::Id(elem_id), FlistValue::Object(entry));
        }
        record.set(ARGS_FIELD, FlistValue::Object(args))?;

        let results = match (&self.results, self.count_only) {
            (_, true) | (ResultShape::Null, _) => FlistValue::Null,
            (ResultShape::All, _) => wildcard(FlistValue::object()),
            (ResultShape::Shape(shape), _) => wildcard(result_shape(ctx, shape.clone())?),
        };
        record.set(RESULTS_FIELD, results)?;
        Ok(record)
    }
}

fn wildcard(element: FlistValue) -> FlistValue {
    let mut map = FlistMap::default();
    map.insert(Key::Id(ELEMID_ANY), element);
    FlistValue::Object(map)
}

fn arg_value(ctx: &FlistContext, desc: &FieldDescriptor, value: FlistValue) -> Result<FlistValue> {
    let FlistValue::Object(map) = value else {
        return Ok(value);
    };
    let mut out = FlistMap::default();
    for (key, inner) in map {
        let inner_desc = ctx.resolve(key.to_field_id()?)?;
        let converted = arg_value(ctx, &inner_desc, inner)?;
        out.insert(Key::Name(inner_desc.name), converted);
    }
    let out = FlistValue::Object(out);
    Ok(if desc.field_type == FieldType::Array {
        FlistValue::List(vec![out])
    } else {
        out
    })
}

/// Array fields in a result shape become `{*: shape-or-empty}`; everything
/// else is passed through.
fn result_shape(ctx: &FlistContext, shape: FlistValue) -> Result<FlistValue> {
    let entries: Vec<(Key, FlistValue)> = match shape {
        FlistValue::Null => Vec::new(),
        FlistValue::Object(map) => map.into_iter().collect(),
        FlistValue::List(names) | FlistValue::Tuple(names) => names
            .into_iter()
            .map(|name| match name {
                FlistValue::Str(s) => Ok((Key::Name(s), FlistValue::Null)),
                FlistValue::Int(n) => Ok((Key::Id(n), FlistValue::Null)),
                other => Err(FlistError::InvalidValue(format!(
                    "result fields must be names, got {}",
                    other.kind()
                ))),
            })
            .collect::<Result<_>>()?,
        other => {
            return Err(FlistError::InvalidValue(format!(
                "a result shape is a list of names or a mapping, not a {}",
                other.kind()
            )));
        }
    };

    let mut out = FlistMap::default();
    for (key, value) in entries {
        let desc = ctx.resolve(key.to_field_id()?)?;
        let value = if desc.field_type == FieldType::Array {
            let inner = if value.is_truthy() {
                result_shape(ctx, value)?
            } else {
                FlistValue::object()
            };
            wildcard(inner)
        } else {
            value
        };
        out.insert(Key::Name(desc.name), value);
    }
    Ok(FlistValue::Object(out))
}
