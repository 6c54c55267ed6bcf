//! XML wire format
//!
//! ```xml
//! <?xml version="1.0" encoding="utf-8"?>
//! <events>
//!   <event>
//!     <EventName type="string">Checkout</EventName>
//!     <tags array="true"><item type="string">new</item></tags>
//!     <address><city type="string">Oslo</city></address>
//!   </event>
//! </events>
//! ```
//!
//! Leaves carry their type tag in a `type` attribute so decoding restores the
//! exact leaf kind. Sequences are marked `array="true"` and hold `<item>`
//! children. Member names that are not valid XML names are escaped as
//! `_xHHHH_`. Leaf text is kept verbatim, whitespace included.

use std::fmt::Write as _;

use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event as XmlEvent};

use super::{TextEncoding, escape_non_ascii};
use crate::event::{Event, LeafValue};
use crate::{MAX_DEPTH, ProtocolError, Result};

const ROOT: &str = "events";
const EVENT: &str = "event";
const ITEM: &str = "item";
const ATTR_TYPE: &str = "type";
const ATTR_ARRAY: &str = "array";

// =============================================================================
// Serialize
// =============================================================================

pub(super) fn serialize(events: &[Event], encoding: TextEncoding) -> Result<String> {
    let mut writer = Writer::new(Vec::new());

    writer
        .write_event(XmlEvent::Decl(BytesDecl::new("1.0", Some(encoding.charset()), None)))
        .map_err(ProtocolError::xml)?;
    writer
        .write_event(XmlEvent::Start(BytesStart::new(ROOT)))
        .map_err(ProtocolError::xml)?;
    for event in events {
        write_element(&mut writer, EVENT, event, 0)?;
    }
    writer
        .write_event(XmlEvent::End(BytesEnd::new(ROOT)))
        .map_err(ProtocolError::xml)?;

    let text = String::from_utf8(writer.into_inner()).map_err(ProtocolError::xml)?;

    Ok(match encoding {
        TextEncoding::Utf8 => text,
        TextEncoding::Ascii => escape_non_ascii(&text, |c, out| {
            let _ = write!(out, "&#x{:X};", u32::from(c));
        }),
    })
}

fn write_element(writer: &mut Writer<Vec<u8>>, name: &str, event: &Event, depth: usize) -> Result<()> {
    if depth > MAX_DEPTH {
        return Err(ProtocolError::cycle(name));
    }

    let mut start = BytesStart::new(name);
    match event {
        Event::Primitive(leaf) => {
            start.push_attribute((ATTR_TYPE, leaf.tag().as_ref()));
            let text = leaf.to_string();
            writer.write_event(XmlEvent::Start(start)).map_err(ProtocolError::xml)?;
            writer
                .write_event(XmlEvent::Text(BytesText::new(&text)))
                .map_err(ProtocolError::xml)?;
        }
        Event::Sequence(items) => {
            start.push_attribute((ATTR_ARRAY, "true"));
            writer.write_event(XmlEvent::Start(start)).map_err(ProtocolError::xml)?;
            for item in items {
                write_element(writer, ITEM, item, depth + 1)?;
            }
        }
        Event::Object(members) => {
            writer.write_event(XmlEvent::Start(start)).map_err(ProtocolError::xml)?;
            for (member, value) in members {
                write_element(writer, &encode_name(member)?, value, depth + 1)?;
            }
        }
    }
    writer
        .write_event(XmlEvent::End(BytesEnd::new(name)))
        .map_err(ProtocolError::xml)?;
    Ok(())
}

// =============================================================================
// Name escaping
// =============================================================================

fn is_name_char(c: char, first: bool) -> bool {
    if first {
        c.is_ascii_alphabetic() || c == '_'
    } else {
        c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.')
    }
}

/// Length of an escape sequence `_xHHHH_` or `_xHHHHHHHH_` at the start of `s`
fn escape_len(s: &str) -> Option<usize> {
    let bytes = s.as_bytes();
    if !s.starts_with("_x") {
        return None;
    }
    [4, 8].into_iter().find_map(|digits| {
        let end = 2 + digits;
        let hex = bytes.get(2..end)?;
        (hex.iter().all(u8::is_ascii_hexdigit) && bytes.get(end) == Some(&b'_')).then_some(end + 1)
    })
}

/// Escape a member name into a valid XML element name
pub(super) fn encode_name(name: &str) -> Result<String> {
    if name.is_empty() {
        return Err(ProtocolError::unsupported("empty member name in XML"));
    }

    let mut out = String::with_capacity(name.len());
    for (i, c) in name.char_indices() {
        let literal_escape = c == '_' && escape_len(&name[i..]).is_some();
        if is_name_char(c, i == 0) && !literal_escape {
            out.push(c);
        } else {
            let code = u32::from(c);
            if code <= 0xFFFF {
                let _ = write!(out, "_x{code:04X}_");
            } else {
                let _ = write!(out, "_x{code:08X}_");
            }
        }
    }
    Ok(out)
}

/// Reverse [`encode_name`]
pub(super) fn decode_name(name: &str) -> Result<String> {
    let mut out = String::with_capacity(name.len());
    let mut rest = name;
    while !rest.is_empty() {
        match escape_len(rest) {
            Some(len) => {
                let code = u32::from_str_radix(&rest[2..len - 1], 16)
                    .map_err(|e| ProtocolError::invalid_payload(e.to_string()))?;
                let c = char::from_u32(code).ok_or_else(|| {
                    ProtocolError::invalid_payload(format!("invalid escaped character in '{name}'"))
                })?;
                out.push(c);
                rest = &rest[len..];
            }
            None => {
                let mut chars = rest.chars();
                if let Some(c) = chars.next() {
                    out.push(c);
                }
                rest = chars.as_str();
            }
        }
    }
    Ok(out)
}

// =============================================================================
// Deserialize
// =============================================================================

#[derive(Debug, Default)]
struct Element {
    name: String,
    tag: Option<String>,
    array: bool,
    text: String,
    children: Vec<Element>,
}

impl Element {
    fn from_start(start: &BytesStart<'_>) -> Result<Self> {
        let name = std::str::from_utf8(start.name().as_ref())
            .map_err(ProtocolError::xml)?
            .to_string();

        let mut element = Self {
            name,
            ..Self::default()
        };
        for attr in start.attributes() {
            let attr = attr.map_err(ProtocolError::xml)?;
            match attr.key.as_ref() {
                b"type" => {
                    element.tag = Some(attr.unescape_value().map_err(ProtocolError::xml)?.into_owned());
                }
                b"array" => {
                    element.array = attr.unescape_value().map_err(ProtocolError::xml)? == "true";
                }
                _ => {}
            }
        }
        Ok(element)
    }

    fn into_event(self, depth: usize) -> Result<Event> {
        if depth > MAX_DEPTH {
            return Err(ProtocolError::invalid_payload("XML nesting too deep"));
        }

        if let Some(tag) = self.tag {
            if !self.children.is_empty() {
                return Err(ProtocolError::invalid_payload(format!(
                    "leaf element <{}> has child elements",
                    self.name
                )));
            }
            return LeafValue::parse(&tag, &self.text).map(Event::Primitive);
        }

        if self.array {
            return self
                .children
                .into_iter()
                .map(|child| child.into_event(depth + 1))
                .collect::<Result<Vec<_>>>()
                .map(Event::Sequence);
        }

        let mut members = Vec::with_capacity(self.children.len());
        for child in self.children {
            let name = decode_name(&child.name)?;
            members.push((name, child.into_event(depth + 1)?));
        }
        Ok(Event::Object(members))
    }
}

fn attach(element: Element, stack: &mut [Element], root: &mut Option<Element>) -> Result<()> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None if root.is_some() => {
            return Err(ProtocolError::invalid_payload("multiple root elements"));
        }
        None => *root = Some(element),
    }
    Ok(())
}

fn parse_document(text: &str) -> Result<Element> {
    let mut reader = Reader::from_str(text);
    let mut stack: Vec<Element> = Vec::new();
    let mut root = None;

    loop {
        match reader.read_event().map_err(ProtocolError::xml)? {
            XmlEvent::Start(start) => {
                if stack.len() > MAX_DEPTH + 2 {
                    return Err(ProtocolError::invalid_payload("XML nesting too deep"));
                }
                stack.push(Element::from_start(&start)?);
            }
            XmlEvent::Empty(start) => {
                let element = Element::from_start(&start)?;
                attach(element, &mut stack, &mut root)?;
            }
            XmlEvent::End(_) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| ProtocolError::invalid_payload("unbalanced closing tag"))?;
                attach(element, &mut stack, &mut root)?;
            }
            XmlEvent::Text(text) => {
                let text = text.unescape().map_err(ProtocolError::xml)?;
                match stack.last_mut() {
                    Some(top) => top.text.push_str(&text),
                    None if text.trim().is_empty() => {}
                    None => {
                        return Err(ProtocolError::invalid_payload(
                            "text outside the root element",
                        ));
                    }
                }
            }
            XmlEvent::CData(data) => {
                let data = std::str::from_utf8(&data).map_err(ProtocolError::xml)?;
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(data);
                }
            }
            XmlEvent::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(ProtocolError::invalid_payload("unclosed element"));
    }
    root.ok_or_else(|| ProtocolError::invalid_payload("empty XML document"))
}

pub(super) fn deserialize(text: &str) -> Result<Vec<Event>> {
    let root = parse_document(text)?;
    if root.name != ROOT {
        return Err(ProtocolError::invalid_payload(format!(
            "expected <{ROOT}> root element, found <{}>",
            root.name
        )));
    }

    root.children
        .into_iter()
        .map(|child| {
            if child.name != EVENT {
                return Err(ProtocolError::invalid_payload(format!(
                    "expected <{EVENT}> element, found <{}>",
                    child.name
                )));
            }
            child.into_event(0)
        })
        .collect()
}
