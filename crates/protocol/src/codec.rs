//! Self-describing binary codec
//!
//! Used only for the client's offline queue. Every value is preceded by a
//! type tag so a reader needs no schema to reconstruct the event.
//!
//! # Layout
//!
//! All integers are little-endian. Strings (tags, names, text) are a `u32`
//! byte length followed by UTF-8.
//!
//! ```text
//! value    := tag body
//! leaf     := <kind name>     fixed-width or length-prefixed payload
//! enum     := "enum:<type>"   i32
//! sequence := "seq"           count:u32 element_tag item*
//! object   := <any other tag> count:u32 (name value)*
//! ```
//!
//! `element_tag` is the shared tag of all items, or `any` when they differ.
//! Items are always fully tagged. Any tag the decoder does not recognize is
//! read as an object, so objects written under a concrete type name still
//! decode to a generic ordered map.

use std::collections::HashSet;

use bytes::Bytes;
use chrono::{DateTime, TimeDelta};

use crate::event::{Decimal, ENUM_TAG_PREFIX, Event, LeafValue};
use crate::schema::LeafKind;
use crate::{MAX_DEPTH, ProtocolError, Result};

const TAG_SEQUENCE: &str = "seq";
const TAG_OBJECT: &str = "object";
const TAG_ANY: &str = "any";

/// Smallest encoded value: an empty tag
const MIN_VALUE_SIZE: usize = 4;

/// Enumeration types known to the decoding side
///
/// Enumerations whose type is registered decode back to [`LeafValue::Enum`];
/// all others decode to their raw [`LeafValue::I32`].
#[derive(Debug, Clone, Default)]
pub struct EnumRegistry {
    names: HashSet<String>,
}

impl EnumRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an enumeration type name
    pub fn register(&mut self, type_name: impl Into<String>) -> &mut Self {
        self.names.insert(type_name.into());
        self
    }

    /// Check if a type name is registered
    pub fn contains(&self, type_name: &str) -> bool {
        self.names.contains(type_name)
    }
}

// =============================================================================
// Encoding
// =============================================================================

/// Encode an event to bytes
///
/// # Errors
///
/// - `UnsupportedType` for values the layout cannot represent
/// - `CycleDetected` if nesting exceeds [`MAX_DEPTH`]
pub fn encode(event: &Event) -> Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(128);
    encode_value(&mut buf, event, 0)?;
    Ok(buf)
}

fn encode_value(buf: &mut Vec<u8>, event: &Event, depth: usize) -> Result<()> {
    if depth > MAX_DEPTH {
        return Err(ProtocolError::cycle(format!("depth {depth}")));
    }

    match event {
        Event::Primitive(value) => encode_leaf(buf, value),
        Event::Sequence(items) => {
            write_str(buf, TAG_SEQUENCE)?;
            write_len(buf, items.len())?;
            write_str(buf, &element_tag(items))?;
            for item in items {
                encode_value(buf, item, depth + 1)?;
            }
            Ok(())
        }
        Event::Object(members) => {
            write_str(buf, TAG_OBJECT)?;
            write_len(buf, members.len())?;
            for (name, value) in members {
                write_str(buf, name)?;
                encode_value(buf, value, depth + 1)?;
            }
            Ok(())
        }
    }
}

fn tag_of(event: &Event) -> std::borrow::Cow<'_, str> {
    match event {
        Event::Primitive(v) => v.tag(),
        Event::Sequence(_) => TAG_SEQUENCE.into(),
        Event::Object(_) => TAG_OBJECT.into(),
    }
}

fn element_tag(items: &[Event]) -> String {
    let mut tags = items.iter().map(tag_of);
    match tags.next() {
        Some(first) if tags.all(|t| t == first) => first.into_owned(),
        _ => TAG_ANY.to_string(),
    }
}

fn encode_leaf(buf: &mut Vec<u8>, value: &LeafValue) -> Result<()> {
    if let LeafValue::Enum { type_name, .. } = value
        && type_name.is_empty()
    {
        return Err(ProtocolError::unsupported("enumeration without a type name"));
    }
    write_str(buf, &value.tag())?;

    match value {
        LeafValue::String(v) => write_str(buf, v)?,
        LeafValue::I8(v) => buf.extend_from_slice(&v.to_le_bytes()),
        LeafValue::U8(v) => buf.push(*v),
        LeafValue::I16(v) => buf.extend_from_slice(&v.to_le_bytes()),
        LeafValue::U16(v) => buf.extend_from_slice(&v.to_le_bytes()),
        LeafValue::I32(v) => buf.extend_from_slice(&v.to_le_bytes()),
        LeafValue::U32(v) => buf.extend_from_slice(&v.to_le_bytes()),
        LeafValue::I64(v) => buf.extend_from_slice(&v.to_le_bytes()),
        LeafValue::U64(v) => buf.extend_from_slice(&v.to_le_bytes()),
        LeafValue::F32(v) => buf.extend_from_slice(&v.to_le_bytes()),
        LeafValue::F64(v) => buf.extend_from_slice(&v.to_le_bytes()),
        LeafValue::Bool(v) => buf.push(u8::from(*v)),
        LeafValue::Decimal(v) => {
            buf.extend_from_slice(&v.mantissa().to_le_bytes());
            buf.extend_from_slice(&v.scale().to_le_bytes());
        }
        LeafValue::DateTime(v) => {
            buf.extend_from_slice(&v.timestamp().to_le_bytes());
            buf.extend_from_slice(&v.timestamp_subsec_nanos().to_le_bytes());
        }
        LeafValue::Duration(v) => {
            buf.extend_from_slice(&v.num_seconds().to_le_bytes());
            buf.extend_from_slice(&v.subsec_nanos().to_le_bytes());
        }
        LeafValue::Bytes(v) => {
            write_len(buf, v.len())?;
            buf.extend_from_slice(v);
        }
        LeafValue::Chars(v) => write_str(buf, &v.iter().collect::<String>())?,
        LeafValue::Char(v) => buf.extend_from_slice(&u32::from(*v).to_le_bytes()),
        LeafValue::Enum { value, .. } => buf.extend_from_slice(&value.to_le_bytes()),
    }
    Ok(())
}

/// Write a length as u32, rejecting lengths that do not fit
#[inline]
fn write_len(buf: &mut Vec<u8>, len: usize) -> Result<()> {
    let len = u32::try_from(len)
        .map_err(|_| ProtocolError::unsupported(format!("length {len} exceeds u32 range")))?;
    buf.extend_from_slice(&len.to_le_bytes());
    Ok(())
}

/// Write a length-prefixed UTF-8 string
#[inline]
fn write_str(buf: &mut Vec<u8>, s: &str) -> Result<()> {
    write_len(buf, s.len())?;
    buf.extend_from_slice(s.as_bytes());
    Ok(())
}

// =============================================================================
// Decoding
// =============================================================================

/// Decode an event from bytes
///
/// Enumerations decode to their raw 32-bit value.
///
/// # Errors
///
/// Returns `MalformedStream` on truncated or corrupt input, never on an
/// unrecognized type tag.
pub fn decode(bytes: &[u8]) -> Result<Event> {
    Reader::new(bytes, None).read_root()
}

/// Decode an event, resolving registered enumeration types
pub fn decode_with_registry(bytes: &[u8], registry: &EnumRegistry) -> Result<Event> {
    Reader::new(bytes, Some(registry)).read_root()
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
    registry: Option<&'a EnumRegistry>,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8], registry: Option<&'a EnumRegistry>) -> Self {
        Self {
            buf,
            pos: 0,
            registry,
        }
    }

    fn read_root(mut self) -> Result<Event> {
        let event = self.read_value(0)?;
        if self.pos != self.buf.len() {
            return Err(ProtocolError::malformed(
                self.pos,
                format!("{} trailing bytes", self.buf.len() - self.pos),
            ));
        }
        Ok(event)
    }

    #[inline]
    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(ProtocolError::malformed(
                self.pos,
                format!(
                    "unexpected end of stream: need {n} bytes, {} left",
                    self.remaining()
                ),
            ));
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn read_len(&mut self) -> Result<usize> {
        Ok(u32::from_le_bytes(self.read_array()?) as usize)
    }

    fn read_str(&mut self) -> Result<&'a str> {
        let start = self.pos;
        let len = self.read_len()?;
        let bytes = self.take(len)?;
        std::str::from_utf8(bytes)
            .map_err(|e| ProtocolError::malformed(start, format!("invalid UTF-8: {e}")))
    }

    /// Read an element count, bounded by what the remaining bytes could hold
    fn read_count(&mut self, min_element_size: usize) -> Result<usize> {
        let start = self.pos;
        let count = self.read_len()?;
        if count > self.remaining() / min_element_size {
            return Err(ProtocolError::malformed(
                start,
                format!("count {count} exceeds remaining input"),
            ));
        }
        Ok(count)
    }

    fn read_value(&mut self, depth: usize) -> Result<Event> {
        if depth > MAX_DEPTH {
            return Err(ProtocolError::malformed(
                self.pos,
                format!("nesting deeper than {MAX_DEPTH} levels"),
            ));
        }

        let tag = self.read_str()?;

        if tag == TAG_SEQUENCE {
            let count = self.read_count(MIN_VALUE_SIZE)?;
            self.read_str()?;
            let mut items = Vec::with_capacity(count);
            for _ in 0..count {
                items.push(self.read_value(depth + 1)?);
            }
            return Ok(Event::Sequence(items));
        }

        if let Some(type_name) = tag.strip_prefix(ENUM_TAG_PREFIX) {
            let value = i32::from_le_bytes(self.read_array()?);
            return Ok(Event::Primitive(self.resolve_enum(type_name, value)));
        }

        match LeafKind::from_name(tag) {
            Some(kind) => self.read_leaf(kind).map(Event::Primitive),
            None => self.read_object(depth),
        }
    }

    fn resolve_enum(&self, type_name: &str, value: i32) -> LeafValue {
        match self.registry {
            Some(registry) if registry.contains(type_name) => LeafValue::Enum {
                type_name: type_name.to_string(),
                value,
            },
            _ => LeafValue::I32(value),
        }
    }

    fn read_object(&mut self, depth: usize) -> Result<Event> {
        let count = self.read_count(2 * MIN_VALUE_SIZE)?;
        let mut members: Vec<(String, Event)> = Vec::with_capacity(count);
        for _ in 0..count {
            let name_pos = self.pos;
            let name = self.read_str()?;
            if members.iter().any(|(k, _)| k == name) {
                return Err(ProtocolError::malformed(
                    name_pos,
                    format!("duplicate member '{name}'"),
                ));
            }
            let value = self.read_value(depth + 1)?;
            members.push((name.to_string(), value));
        }
        Ok(Event::Object(members))
    }

    fn read_leaf(&mut self, kind: LeafKind) -> Result<LeafValue> {
        let start = self.pos;
        let value = match kind {
            LeafKind::String => LeafValue::String(self.read_str()?.to_string()),
            LeafKind::I8 => LeafValue::I8(i8::from_le_bytes(self.read_array()?)),
            LeafKind::U8 => LeafValue::U8(u8::from_le_bytes(self.read_array()?)),
            LeafKind::I16 => LeafValue::I16(i16::from_le_bytes(self.read_array()?)),
            LeafKind::U16 => LeafValue::U16(u16::from_le_bytes(self.read_array()?)),
            LeafKind::I32 => LeafValue::I32(i32::from_le_bytes(self.read_array()?)),
            LeafKind::U32 => LeafValue::U32(u32::from_le_bytes(self.read_array()?)),
            LeafKind::I64 => LeafValue::I64(i64::from_le_bytes(self.read_array()?)),
            LeafKind::U64 => LeafValue::U64(u64::from_le_bytes(self.read_array()?)),
            LeafKind::F32 => LeafValue::F32(f32::from_le_bytes(self.read_array()?)),
            LeafKind::F64 => LeafValue::F64(f64::from_le_bytes(self.read_array()?)),
            LeafKind::Bool => match self.read_array::<1>()?[0] {
                0 => LeafValue::Bool(false),
                1 => LeafValue::Bool(true),
                other => {
                    return Err(ProtocolError::malformed(
                        start,
                        format!("invalid boolean byte {other}"),
                    ));
                }
            },
            LeafKind::Decimal => {
                let mantissa = i128::from_le_bytes(self.read_array()?);
                let scale = u32::from_le_bytes(self.read_array()?);
                let decimal = Decimal::new(mantissa, scale)
                    .map_err(|e| ProtocolError::malformed(start, e.to_string()))?;
                LeafValue::Decimal(decimal)
            }
            LeafKind::DateTime => {
                let secs = i64::from_le_bytes(self.read_array()?);
                let nanos = u32::from_le_bytes(self.read_array()?);
                let dt = DateTime::from_timestamp(secs, nanos).ok_or_else(|| {
                    ProtocolError::malformed(start, "timestamp out of range")
                })?;
                LeafValue::DateTime(dt)
            }
            LeafKind::Duration => {
                let secs = i64::from_le_bytes(self.read_array()?);
                let nanos = i32::from_le_bytes(self.read_array()?);
                let delta = TimeDelta::try_seconds(secs)
                    .and_then(|d| d.checked_add(&TimeDelta::nanoseconds(i64::from(nanos))))
                    .ok_or_else(|| ProtocolError::malformed(start, "duration out of range"))?;
                LeafValue::Duration(delta)
            }
            LeafKind::Bytes => {
                let len = self.read_len()?;
                LeafValue::Bytes(Bytes::copy_from_slice(self.take(len)?))
            }
            LeafKind::Chars => LeafValue::Chars(self.read_str()?.chars().collect()),
            LeafKind::Char => {
                let code = u32::from_le_bytes(self.read_array()?);
                let c = char::from_u32(code).ok_or_else(|| {
                    ProtocolError::malformed(start, format!("invalid character U+{code:X}"))
                })?;
                LeafValue::Char(c)
            }
            LeafKind::Enum => LeafValue::I32(i32::from_le_bytes(self.read_array()?)),
        };
        Ok(value)
    }
}
