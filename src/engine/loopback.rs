use std::fmt::Write as _;

use chrono::DateTime;
use rustc_hash::FxHashMap;
use smol_str::SmolStr;
use tracing::debug;

use super::{Engine, PCM_OP_TRANS_ABORT, PCM_OP_TRANS_COMMIT, PCM_OP_TRANS_OPEN, builtin_opcode_name};
use crate::error::{FlistError, Result};
use crate::flist::{Record, Value};
use crate::flist_value::{FlistMap, FlistValue, Key};
use crate::poid::Poid;
use crate::types::{FieldDescriptor, FieldType, parse_elem_id};

const POID_FIELD: &str = "PIN_FLD_POID";

/// In-process engine: every opcode echoes its input back unless a reply has
/// been registered for it, and transaction opcodes track a single open
/// transaction. Like a real engine it refuses input without a POID.
#[derive(Debug)]
pub struct LoopbackEngine {
    database: u64,
    connected: bool,
    transaction: Option<FlistValue>,
    replies: FxHashMap<u32, FlistValue>,
    calls: Vec<(u32, u32)>,
}

impl Default for LoopbackEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopbackEngine {
    pub fn new() -> Self {
        Self::with_database(1)
    }

    pub fn with_database(database: u64) -> Self {
        Self {
            database,
            connected: false,
            transaction: None,
            replies: FxHashMap::default(),
            calls: Vec::new(),
        }
    }

    /// Answers `opcode` with `reply` instead of echoing the input.
    pub fn with_reply(mut self, opcode: u32, reply: FlistValue) -> Self {
        self.replies.insert(opcode, reply);
        self
    }

    /// `(opcode, flags)` of every executed call, oldest first.
    pub fn calls(&self) -> &[(u32, u32)] {
        &self.calls
    }

    pub fn in_transaction(&self) -> bool {
        self.transaction.is_some()
    }

    fn engine_error(code: &str, message: impl Into<String>) -> FlistError {
        FlistError::Engine {
            code: SmolStr::new(code),
            message: message.into(),
        }
    }
}

impl Engine for LoopbackEngine {
    fn connect(&mut self) -> Result<u64> {
        self.connected = true;
        Ok(self.database)
    }

    fn disconnect(&mut self) -> Result<()> {
        self.connected = false;
        self.transaction = None;
        Ok(())
    }

    fn execute(&mut self, input: &Record, opcode: u32, flags: u32, by_reference: bool) -> Result<FlistValue> {
        if !self.connected {
            return Err(FlistError::NotConnected);
        }
        debug!(
            opcode,
            name = builtin_opcode_name(opcode).unwrap_or("?"),
            flags,
            by_reference,
            "loopback execute"
        );
        self.calls.push((opcode, flags));

        if !input.contains(POID_FIELD)? {
            return Err(Self::engine_error("PIN_ERR_MISSING_ARG", "PIN_FLD_POID is required"));
        }

        match opcode {
            PCM_OP_TRANS_OPEN => {
                if self.transaction.is_some() {
                    return Err(Self::engine_error("PIN_ERR_TRANS_ALREADY_OPEN", "a transaction is already open"));
                }
                let data = input.asdict();
                self.transaction = Some(data.clone());
                Ok(data)
            }
            PCM_OP_TRANS_COMMIT | PCM_OP_TRANS_ABORT => self
                .transaction
                .take()
                .ok_or_else(|| Self::engine_error("PIN_ERR_TRANS_NOT_OPEN", "no transaction is open")),
            _ => Ok(match self.replies.get(&opcode) {
                Some(reply) => reply.clone(),
                None => input.asdict(),
            }),
        }
    }

    fn encode_text(&self, record: &Record) -> Result<String> {
        encode_text(record)
    }

    fn decode_text(&self, text: &str) -> Result<FlistValue> {
        decode_text(text)
    }
}

// ════════════════════════════════════════════════════════════════════════
// Legacy text
// ════════════════════════════════════════════════════════════════════════
//
// One field per line:
//
//   0 PIN_FLD_POID            POID [0] 0.0.0.1 /account -1 0
//   0 PIN_FLD_RESULTS        ARRAY [2] allocated 1, used 1
//   1     PIN_FLD_NAME         STR [0] "x"
//   0 PIN_FLD_CREATED_T     TSTAMP [0] (1548979200) 2019-02-01T00:00:00+00:00
//   0 PIN_FLD_SELECTOR     BINSTR [0] 3 010203
//   0 PIN_FLD_EVENT     SUBSTRUCT [0] NULL
//
// Children follow their container one depth lower.

const NULL_TOKEN: &str = "NULL";

pub fn encode_text(record: &Record) -> Result<String> {
    let mut out = String::new();
    encode_fields(&mut out, record, 0);
    Ok(out)
}

fn encode_fields(out: &mut String, record: &Record, depth: usize) {
    for (desc, value) in record.iter() {
        match value {
            Value::Array(array) => {
                for (elem_id, elem) in array.items() {
                    encode_container(out, &desc, depth, elem_id, elem.as_ref());
                }
            }
            Value::Flist(child) => encode_container(out, &desc, depth, 0, Some(&child)),
            Value::Null if desc.field_type.is_container() => encode_container(out, &desc, depth, 0, None),
            scalar => {
                write_prefix(out, &desc, depth, 0);
                out.push_str(&scalar_text(&scalar));
                out.push('\n');
            }
        }
    }
}

fn encode_container(out: &mut String, desc: &FieldDescriptor, depth: usize, elem_id: i64, child: Option<&Record>) {
    write_prefix(out, desc, depth, elem_id);
    match child {
        Some(child) => {
            let used = child.len();
            let _ = writeln!(out, "allocated {used}, used {used}");
            encode_fields(out, child, depth + 1);
        }
        None => {
            out.push_str(NULL_TOKEN);
            out.push('\n');
        }
    }
}

fn write_prefix(out: &mut String, desc: &FieldDescriptor, depth: usize, elem_id: i64) {
    let indent = "    ".repeat(depth);
    let _ = write!(
        out,
        "{depth} {indent}{:<24} {:>9} [{elem_id}] ",
        desc.name,
        desc.field_type.as_str()
    );
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::Null => NULL_TOKEN.to_string(),
        Value::Int(i) | Value::Enum(i) => i.to_string(),
        Value::Str(s) => quote(s),
        Value::Decimal(d) => d.to_string(),
        Value::Poid(p) => p.to_string(),
        Value::Timestamp(t) => match DateTime::from_timestamp(*t, 0) {
            Some(at) => format!("({t}) {}", at.to_rfc3339()),
            None => format!("({t})"),
        },
        Value::BinStr(b) | Value::Buf(b) => {
            let mut text = format!("{} ", b.len());
            for byte in b {
                let _ = write!(text, "{byte:02X}");
            }
            text
        }
        Value::Flist(_) | Value::Array(_) => String::new(),
    }
}

// ─── Decoding ───────────────────────────────────────────────────────────────

struct Line<'a> {
    number: usize,
    depth: usize,
    name: &'a str,
    field_type: FieldType,
    elem_id: i64,
    rest: &'a str,
}

fn invalid(number: usize, message: impl std::fmt::Display) -> FlistError {
    FlistError::InvalidInput(format!("line {number}: {message}"))
}

/// Splits off the first whitespace-delimited token.
fn token(text: &str) -> Option<(&str, &str)> {
    let text = text.trim_start();
    if text.is_empty() {
        return None;
    }
    let end = text.find(char::is_whitespace).unwrap_or(text.len());
    Some((&text[..end], &text[end..]))
}

fn parse_line(number: usize, text: &str) -> Result<Line<'_>> {
    let missing = |what: &str| invalid(number, format!("missing {what}"));
    let (depth, rest) = token(text).ok_or_else(|| missing("depth"))?;
    let depth = depth
        .parse::<usize>()
        .map_err(|_| invalid(number, format!("bad depth {depth:?}")))?;
    let (name, rest) = token(rest).ok_or_else(|| missing("field name"))?;
    let (type_name, rest) = token(rest).ok_or_else(|| missing("field type"))?;
    let field_type =
        FieldType::from_name(type_name).ok_or_else(|| invalid(number, format!("unknown type {type_name:?}")))?;
    let (elem, rest) = token(rest).ok_or_else(|| missing("element id"))?;
    let elem_id = elem
        .strip_prefix('[')
        .and_then(|e| e.strip_suffix(']'))
        .and_then(parse_elem_id)
        .ok_or_else(|| invalid(number, format!("bad element id {elem:?}")))?;
    Ok(Line {
        number,
        depth,
        name,
        field_type,
        elem_id,
        rest: rest.trim(),
    })
}

pub fn decode_text(text: &str) -> Result<FlistValue> {
    let lines = text
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| parse_line(i + 1, line))
        .collect::<Result<Vec<_>>>()?;
    if lines.is_empty() {
        return Err(FlistError::InvalidInput("empty flist text".into()));
    }

    let mut pos = 0;
    let map = decode_level(&lines, &mut pos, 0)?;
    match lines.get(pos) {
        Some(line) => Err(invalid(line.number, format!("unexpected depth {}", line.depth))),
        None => Ok(FlistValue::Object(map)),
    }
}

fn decode_level(lines: &[Line<'_>], pos: &mut usize, depth: usize) -> Result<FlistMap> {
    let mut map = FlistMap::default();
    while let Some(line) = lines.get(*pos) {
        if line.depth < depth {
            break;
        }
        if line.depth > depth {
            return Err(invalid(line.number, format!("unexpected depth {}", line.depth)));
        }
        *pos += 1;

        let key = Key::Name(SmolStr::new(line.name));
        let value = if line.field_type.is_container() {
            if line.rest == NULL_TOKEN {
                FlistValue::Null
            } else {
                FlistValue::Object(decode_level(lines, pos, depth + 1)?)
            }
        } else {
            decode_scalar(line)?
        };

        if line.field_type == FieldType::Array {
            let elems = map.entry(key).or_insert_with(FlistValue::object);
            if let FlistValue::Object(elems) = elems {
                elems.insert(Key::Id(line.elem_id), value);
            }
        } else {
            map.insert(key, value);
        }
    }
    Ok(map)
}

fn decode_scalar(line: &Line<'_>) -> Result<FlistValue> {
    let rest = line.rest;
    if rest == NULL_TOKEN {
        return Ok(FlistValue::Null);
    }
    let bad = || invalid(line.number, format!("bad {} value {rest:?}", line.field_type));
    match line.field_type {
        FieldType::Int32 | FieldType::Enum => rest.parse::<i64>().map(FlistValue::Int).map_err(|_| bad()),
        FieldType::String => unquote(rest).map(FlistValue::Str).ok_or_else(bad),
        FieldType::Decimal => Ok(FlistValue::Decimal(SmolStr::new(rest))),
        FieldType::Poid => Poid::parse(rest).map(FlistValue::Poid).map_err(|_| bad()),
        FieldType::Timestamp => rest
            .strip_prefix('(')
            .and_then(|r| r.split_once(')'))
            .and_then(|(secs, _)| secs.trim().parse::<i64>().ok())
            .map(FlistValue::Timestamp)
            .ok_or_else(bad),
        FieldType::BinaryString | FieldType::Buffer => decode_bytes(rest).map(FlistValue::Bytes).ok_or_else(bad),
        FieldType::Array | FieldType::Substruct => Err(bad()),
    }
}

/// One line per field, so line breaks inside a string are escaped.
fn quote(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

fn unquote(text: &str) -> Option<SmolStr> {
    let inner = text.strip_prefix('"')?.strip_suffix('"')?;
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next()? {
                'n' => out.push('\n'),
                'r' => out.push('\r'),
                escaped => out.push(escaped),
            },
            '"' => return None,
            c => out.push(c),
        }
    }
    Some(SmolStr::from(out))
}

fn decode_bytes(text: &str) -> Option<Vec<u8>> {
    let (len, rest) = token(text)?;
    let len = len.parse::<usize>().ok()?;
    let hex = rest.trim();
    if hex.len() != len.checked_mul(2)? {
        return None;
    }
    (0..len)
        .map(|i| hex.get(i * 2..i * 2 + 2).and_then(|pair| u8::from_str_radix(pair, 16).ok()))
        .collect()
}
