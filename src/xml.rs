//! Record <-> XML.
//!
//! Two tagging styles are written; the importer reads either:
//!
//! ```text
//! ByName  <PIN_FLD_STATUS>1</PIN_FLD_STATUS>
//! ByType  <ENUM name="PIN_FLD_STATUS" type="3">1</ENUM>
//! ```
//!
//! Array elements carry an `elem` attribute. The format cannot tell a null
//! substruct or element from an empty one; both import as empty records.

use std::rc::Rc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use quick_xml::events::{BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use smol_str::SmolStr;

use crate::error::{FlistError, Result};
use crate::flags::{self, FlagSpec};
use crate::flist::{FlistContext, Record, Value};
use crate::flist_value::{FlistMap, FlistValue, Key};
use crate::types::{FieldDescriptor, FieldType, parse_elem_id};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum XmlStyle {
    /// Tag is the field name.
    #[default]
    ByName,
    /// Tag is the type name; `name` and `type` attributes identify the field.
    ByType,
}

impl XmlStyle {
    /// Picks the style from `PIN_XML_BY_TYPE` / `PIN_XML_BY_NAME`; other
    /// known flags fall back to [`XmlStyle::ByName`].
    pub fn from_flags(spec: impl Into<FlagSpec>) -> Result<Self> {
        let bits = spec.into().resolve()?;
        Ok(if bits & flags::PIN_XML_BY_TYPE != 0 {
            XmlStyle::ByType
        } else {
            XmlStyle::ByName
        })
    }
}

// ─── Export ─────────────────────────────────────────────────────────────────

pub fn to_xml(record: &Record, style: XmlStyle, root: &str) -> Result<String> {
    let mut writer = Writer::new(Vec::new());
    let root = BytesStart::new(root);
    writer.write_event(Event::Start(root.clone()))?;
    write_fields(&mut writer, record, style)?;
    writer.write_event(Event::End(root.to_end()))?;
    String::from_utf8(writer.into_inner()).map_err(|e| FlistError::Serialization(e.to_string()))
}

fn write_fields(writer: &mut Writer<Vec<u8>>, record: &Record, style: XmlStyle) -> Result<()> {
    for (desc, value) in record.iter() {
        match value {
            Value::Array(array) => {
                for (elem_id, elem) in array.items() {
                    let tag = start_tag(&desc, style, Some(elem_id));
                    write_child(writer, tag, elem.as_ref(), style)?;
                }
            }
            Value::Flist(child) => write_child(writer, start_tag(&desc, style, None), Some(&child), style)?,
            Value::Null => write_child(writer, start_tag(&desc, style, None), None, style)?,
            scalar => {
                let tag = start_tag(&desc, style, None);
                let text = scalar_text(&scalar);
                writer.write_event(Event::Start(tag.clone()))?;
                writer.write_event(Event::Text(BytesText::new(&text)))?;
                writer.write_event(Event::End(tag.to_end()))?;
            }
        }
    }
    Ok(())
}

/// A substruct or array element; null and empty records both come out as
/// an empty element.
fn write_child(
    writer: &mut Writer<Vec<u8>>,
    tag: BytesStart<'static>,
    child: Option<&Record>,
    style: XmlStyle,
) -> Result<()> {
    match child {
        Some(child) if !child.is_empty() => {
            writer.write_event(Event::Start(tag.clone()))?;
            write_fields(writer, child, style)?;
            writer.write_event(Event::End(tag.to_end()))?;
        }
        _ => writer.write_event(Event::Empty(tag))?,
    }
    Ok(())
}

fn start_tag(desc: &FieldDescriptor, style: XmlStyle, elem_id: Option<i64>) -> BytesStart<'static> {
    let mut tag = match style {
        XmlStyle::ByName => BytesStart::new(desc.name.to_string()),
        XmlStyle::ByType => {
            let mut tag = BytesStart::new(desc.field_type.as_str());
            tag.push_attribute(("name", desc.name.as_str()));
            tag.push_attribute(("type", desc.field_type.code().to_string().as_str()));
            tag
        }
    };
    if let Some(id) = elem_id {
        tag.push_attribute(("elem", id.to_string().as_str()));
    }
    tag
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::Int(i) | Value::Enum(i) => i.to_string(),
        Value::Str(s) | Value::Decimal(s) => s.to_string(),
        Value::Timestamp(t) => t.to_string(),
        Value::Poid(p) => p.to_string(),
        Value::BinStr(b) | Value::Buf(b) => BASE64.encode(b),
        Value::Null | Value::Flist(_) | Value::Array(_) => String::new(),
    }
}

// ─── Import ─────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct XmlNode {
    tag: String,
    attrs: Vec<(String, String)>,
    text: String,
    /// Written as `<tag/>`.
    self_closing: bool,
    children: Vec<XmlNode>,
}

impl XmlNode {
    fn attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// The field a child element stands for: its `name` attribute, else its
    /// tag.
    fn field_name(&self) -> &str {
        self.attr("name").unwrap_or(&self.tag)
    }
}

fn invalid(e: impl std::fmt::Display) -> FlistError {
    FlistError::InvalidInput(e.to_string())
}

fn parse_tree(text: &str) -> Result<XmlNode> {
    let mut reader = Reader::from_str(text);

    let mut stack: Vec<XmlNode> = Vec::new();
    let mut root: Option<XmlNode> = None;
    loop {
        match reader.read_event().map_err(invalid)? {
            Event::Start(e) => stack.push(node_from(&e)?),
            Event::Empty(e) => {
                let node = XmlNode {
                    self_closing: true,
                    ..node_from(&e)?
                };
                attach(&mut stack, &mut root, node)?;
            }
            Event::End(_) => {
                let mut node = stack.pop().ok_or_else(|| invalid("unbalanced end tag"))?;
                // Whitespace between child elements is layout, not a value.
                if !node.children.is_empty() && node.text.trim().is_empty() {
                    node.text.clear();
                }
                attach(&mut stack, &mut root, node)?;
            }
            Event::Text(t) => {
                let text = t.unescape().map_err(invalid)?;
                match stack.last_mut() {
                    Some(top) => top.text.push_str(&text),
                    None if text.trim().is_empty() => {}
                    None => return Err(invalid("text outside the root element")),
                }
            }
            Event::CData(c) => match stack.last_mut() {
                Some(top) => top.text.push_str(&String::from_utf8_lossy(&c)),
                None => return Err(invalid("CDATA outside the root element")),
            },
            Event::Eof => break,
            _ => {}
        }
    }
    if !stack.is_empty() {
        return Err(invalid("unclosed element"));
    }
    root.ok_or_else(|| invalid("no root element"))
}

fn node_from(start: &BytesStart<'_>) -> Result<XmlNode> {
    let tag = String::from_utf8(start.name().as_ref().to_vec()).map_err(invalid)?;
    let mut attrs = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(invalid)?;
        let key = String::from_utf8(attr.key.as_ref().to_vec()).map_err(invalid)?;
        let value = attr.unescape_value().map_err(invalid)?.into_owned();
        attrs.push((key, value));
    }
    Ok(XmlNode {
        tag,
        attrs,
        ..XmlNode::default()
    })
}

fn attach(stack: &mut [XmlNode], root: &mut Option<XmlNode>, node: XmlNode) -> Result<()> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(node);
    } else if root.is_none() {
        *root = Some(node);
    } else {
        return Err(invalid("more than one root element"));
    }
    Ok(())
}

fn import_children(ctx: &FlistContext, node: &XmlNode) -> Result<FlistValue> {
    let mut map = FlistMap::default();
    for child in &node.children {
        let desc = ctx.resolve(child.field_name())?;
        let key = Key::Name(desc.name.clone());
        match desc.field_type {
            FieldType::Substruct => {
                map.insert(key, import_children(ctx, child)?);
            }
            FieldType::Array => {
                let elem_id = child
                    .attr("elem")
                    .and_then(parse_elem_id)
                    .ok_or_else(|| FlistError::InvalidValue(format!("{} element without a valid elem id", desc.name)))?;
                let element = import_children(ctx, child)?;
                let elems = map.entry(key).or_insert_with(FlistValue::object);
                if let FlistValue::Object(elems) = elems {
                    elems.insert(Key::Id(elem_id), element);
                }
            }
            _ if child.self_closing => {
                map.insert(key, FlistValue::Null);
            }
            FieldType::BinaryString | FieldType::Buffer => {
                let bytes = BASE64.decode(child.text.trim()).map_err(|e| {
                    FlistError::InvalidValue(format!("{} is not base64: {e}", desc.name))
                })?;
                map.insert(key, FlistValue::Bytes(bytes));
            }
            FieldType::String => {
                map.insert(key, FlistValue::Str(SmolStr::new(&child.text)));
            }
            _ if child.text.trim().is_empty() => {
                map.insert(key, FlistValue::Null);
            }
            _ => {
                map.insert(key, FlistValue::Str(SmolStr::new(child.text.trim())));
            }
        }
    }
    Ok(FlistValue::Object(map))
}

/// Reads a document in either tagging style. The root element's name is
/// not checked.
pub fn from_xml(ctx: &Rc<FlistContext>, text: &str) -> Result<Record> {
    let tree = parse_tree(text)?;
    let data = import_children(ctx, &tree)?;
    Record::from_data(ctx, data)
}

impl Record {
    /// XML under the context's root element name.
    pub fn to_xml(&self, style: XmlStyle) -> Result<String> {
        to_xml(self, style, self.context().xml_root())
    }

    pub fn to_xml_with_root(&self, style: XmlStyle, root: &str) -> Result<String> {
        to_xml(self, style, root)
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroUsize;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::catalog::{FieldCatalog, StaticDirectory};
    use crate::flist;

    fn ctx() -> Rc<FlistContext> {
        let catalog = FieldCatalog::new(StaticDirectory::builtin(), NonZeroUsize::new(64).unwrap());
        FlistContext::new(catalog, 1)
    }

    #[test]
    fn by_name_output() {
        let ctx = ctx();
        let record = Record::from_data(
            &ctx,
            flist!({
                "PIN_FLD_POID" => "/account",
                "PIN_FLD_NAME" => "a<b",
                "PIN_FLD_RESULTS" => { 0 => { "PIN_FLD_STATUS" => 1 } },
            }),
        )
        .unwrap();
        assert_eq!(
            record.to_xml(XmlStyle::ByName).unwrap(),
            "<flist><PIN_FLD_POID>0.0.0.1 /account -1 0</PIN_FLD_POID>\
             <PIN_FLD_NAME>a&lt;b</PIN_FLD_NAME>\
             <PIN_FLD_RESULTS elem=\"0\"><PIN_FLD_STATUS>1</PIN_FLD_STATUS></PIN_FLD_RESULTS></flist>"
        );
    }

    #[test]
    fn by_type_output() {
        let ctx = ctx();
        let record = Record::from_data(&ctx, flist!({ "PIN_FLD_STATUS" => 2, "PIN_FLD_EVENT" => null })).unwrap();
        assert_eq!(
            record.to_xml_with_root(XmlStyle::ByType, "foo").unwrap(),
            "<foo><ENUM name=\"PIN_FLD_STATUS\" type=\"3\">2</ENUM>\
             <SUBSTRUCT name=\"PIN_FLD_EVENT\" type=\"10\"/></foo>"
        );
    }

    #[test]
    fn style_from_flags() {
        assert_eq!(XmlStyle::from_flags("PIN_XML_BY_TYPE").unwrap(), XmlStyle::ByType);
        assert_eq!(XmlStyle::from_flags("PIN_XML_BY_NAME").unwrap(), XmlStyle::ByName);
        assert_eq!(XmlStyle::from_flags(0u32).unwrap(), XmlStyle::ByName);
        assert!(matches!(XmlStyle::from_flags("illegalflag"), Err(FlistError::UnknownFlag(_))));
    }

    #[test]
    fn both_styles_round_trip() {
        let ctx = ctx();
        let record = Record::from_data(
            &ctx,
            flist!({
                "PIN_FLD_POID" => "/account",
                "PIN_FLD_STATUS" => 1,
                "PIN_FLD_CREATED_T" => 1_700_000_000i64,
                "PIN_FLD_AMOUNT" => "3.25",
                "PIN_FLD_SELECTOR" => (vec![9u8, 8, 7]),
                "PIN_FLD_INHERITED_INFO" => { "PIN_FLD_POID" => ("/service", 1234) },
                "PIN_FLD_VALUES" => [ { "PIN_FLD_STATUS" => 1 }, { "PIN_FLD_STATUS" => 2 } ],
                "PIN_FLD_RESULTS" => { (-1) => { "PIN_FLD_STATUS" => 5 }, 0 => { "PIN_FLD_STATUS" => 6 } },
            }),
        )
        .unwrap();

        for style in [XmlStyle::ByName, XmlStyle::ByType] {
            let xml = record.to_xml(style).unwrap();
            assert_eq!(from_xml(&ctx, &xml).unwrap(), record, "style {style:?}");
        }
    }

    #[test]
    fn null_containers_come_back_empty() {
        let ctx = ctx();
        let record = Record::from_data(
            &ctx,
            flist!({
                "PIN_FLD_POID" => "/account",
                "PIN_FLD_INHERITED_INFO" => null,
                "PIN_FLD_EVENT" => {},
                "PIN_FLD_VALUES" => null,
                "PIN_FLD_ARGS" => { 0 => {} },
            }),
        )
        .unwrap();
        let expected = Record::from_data(
            &ctx,
            flist!({
                "PIN_FLD_POID" => "/account",
                "PIN_FLD_INHERITED_INFO" => {},
                "PIN_FLD_EVENT" => {},
                "PIN_FLD_VALUES" => { 0 => {} },
                "PIN_FLD_ARGS" => { 0 => {} },
            }),
        )
        .unwrap();

        for style in [XmlStyle::ByName, XmlStyle::ByType] {
            let xml = record.to_xml(style).unwrap();
            assert_eq!(from_xml(&ctx, &xml).unwrap(), expected);
        }
    }

    #[test]
    fn empty_scalar_imports_as_null() {
        let ctx = ctx();
        let record = from_xml(&ctx, "<flist><PIN_FLD_NAME/><PIN_FLD_STATUS>3</PIN_FLD_STATUS></flist>").unwrap();
        assert_eq!(record.get("PIN_FLD_NAME").unwrap(), Value::Null);
        assert_eq!(record.get_enum("PIN_FLD_STATUS").unwrap(), Some(3));
    }

    #[test]
    fn string_text_is_kept_verbatim() {
        let ctx = ctx();
        let record = Record::from_data(
            &ctx,
            flist!({
                "PIN_FLD_NAME" => "  padded  ",
                "PIN_FLD_DESCR" => "",
                "PIN_FLD_RATE_TAG" => null,
            }),
        )
        .unwrap();

        for style in [XmlStyle::ByName, XmlStyle::ByType] {
            let back = from_xml(&ctx, &record.to_xml(style).unwrap()).unwrap();
            assert_eq!(back.get_str("PIN_FLD_NAME").unwrap().as_deref(), Some("  padded  "));
            assert_eq!(back.get_str("PIN_FLD_DESCR").unwrap().as_deref(), Some(""));
            assert_eq!(back.get("PIN_FLD_RATE_TAG").unwrap(), Value::Null);
            assert_eq!(back, record, "style {style:?}");
        }
    }

    #[test]
    fn layout_whitespace_is_ignored() {
        let ctx = ctx();
        let xml = "<?xml version=\"1.0\"?>\n<flist>\n  <PIN_FLD_STATUS> 3 </PIN_FLD_STATUS>\n  \
                   <PIN_FLD_INHERITED_INFO>\n    <PIN_FLD_RATE_TAG>gold</PIN_FLD_RATE_TAG>\n  \
                   </PIN_FLD_INHERITED_INFO>\n</flist>\n";
        let record = from_xml(&ctx, xml).unwrap();
        assert_eq!(record.get_enum("PIN_FLD_STATUS").unwrap(), Some(3));
        let info = record.get_flist("PIN_FLD_INHERITED_INFO").unwrap().unwrap();
        assert_eq!(info.get_str("PIN_FLD_RATE_TAG").unwrap().as_deref(), Some("gold"));
    }

    #[test]
    fn malformed_input() {
        let ctx = ctx();
        assert!(matches!(from_xml(&ctx, "{\"a\": 1}"), Err(FlistError::InvalidInput(_))));
        assert!(matches!(from_xml(&ctx, "<flist><a></flist>"), Err(FlistError::InvalidInput(_))));
        assert!(matches!(from_xml(&ctx, ""), Err(FlistError::InvalidInput(_))));
        assert!(matches!(
            from_xml(&ctx, "<flist><PIN_FLD_RESULTS/></flist>"),
            Err(FlistError::InvalidValue(_))
        ));
        assert!(from_xml(&ctx, "<flist><PIN_FLD_NOPE>1</PIN_FLD_NOPE></flist>")
            .unwrap_err()
            .is_not_found());
    }
}
