//! JSON wire format
//!
//! Leaves map to the closest JSON type. Types JSON lacks are written as text
//! (decimal, datetime, base64 bytes) or numbers (duration in nanoseconds,
//! enumeration value). Decoding yields `i64`, `u64` or `f64` for numbers and
//! skips `null` members.

use std::fmt::Write as _;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::{Map, Number, Value};

use super::{TextEncoding, escape_non_ascii};
use crate::event::{Event, LeafValue};
use crate::{MAX_DEPTH, ProtocolError, Result};

pub(super) fn serialize(events: &[Event], encoding: TextEncoding) -> Result<String> {
    let values = events
        .iter()
        .map(|event| to_value(event, 0))
        .collect::<Result<Vec<_>>>()?;
    let text = serde_json::to_string(&Value::Array(values))?;

    Ok(match encoding {
        TextEncoding::Utf8 => text,
        TextEncoding::Ascii => escape_non_ascii(&text, |c, out| {
            let mut units = [0u16; 2];
            for unit in c.encode_utf16(&mut units) {
                let _ = write!(out, "\\u{unit:04x}");
            }
        }),
    })
}

fn to_value(event: &Event, depth: usize) -> Result<Value> {
    if depth > MAX_DEPTH {
        return Err(ProtocolError::cycle(format!("depth {depth}")));
    }

    match event {
        Event::Primitive(leaf) => leaf_to_value(leaf),
        Event::Sequence(items) => items
            .iter()
            .map(|item| to_value(item, depth + 1))
            .collect::<Result<Vec<_>>>()
            .map(Value::Array),
        Event::Object(members) => {
            let mut map = Map::with_capacity(members.len());
            for (name, value) in members {
                map.insert(name.clone(), to_value(value, depth + 1)?);
            }
            Ok(Value::Object(map))
        }
    }
}

fn float(v: f64) -> Result<Value> {
    Number::from_f64(v)
        .map(Value::Number)
        .ok_or_else(|| ProtocolError::unsupported(format!("non-finite float {v} in JSON")))
}

fn leaf_to_value(leaf: &LeafValue) -> Result<Value> {
    let value = match leaf {
        LeafValue::String(v) => Value::String(v.clone()),
        LeafValue::I8(v) => Value::from(*v),
        LeafValue::U8(v) => Value::from(*v),
        LeafValue::I16(v) => Value::from(*v),
        LeafValue::U16(v) => Value::from(*v),
        LeafValue::I32(v) => Value::from(*v),
        LeafValue::U32(v) => Value::from(*v),
        LeafValue::I64(v) => Value::from(*v),
        LeafValue::U64(v) => Value::from(*v),
        LeafValue::F32(v) => float(f64::from(*v))?,
        LeafValue::F64(v) => float(*v)?,
        LeafValue::Bool(v) => Value::Bool(*v),
        LeafValue::Decimal(_) | LeafValue::DateTime(_) | LeafValue::Chars(_) | LeafValue::Char(_) => {
            Value::String(leaf.to_string())
        }
        LeafValue::Duration(v) => {
            let nanos = v.num_nanoseconds().ok_or_else(|| {
                ProtocolError::unsupported("duration exceeds nanosecond range")
            })?;
            Value::from(nanos)
        }
        LeafValue::Bytes(v) => Value::String(STANDARD.encode(v)),
        LeafValue::Enum { value, .. } => Value::from(*value),
    };
    Ok(value)
}

pub(super) fn deserialize(text: &str) -> Result<Vec<Event>> {
    let root: Value = serde_json::from_str(text)?;
    let Value::Array(items) = root else {
        return Err(ProtocolError::invalid_payload(
            "expected a JSON array of events",
        ));
    };

    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| {
            from_value(item, 0)?.ok_or_else(|| {
                ProtocolError::invalid_payload(format!("event {i} is null"))
            })
        })
        .collect()
}

fn from_value(value: Value, depth: usize) -> Result<Option<Event>> {
    if depth > MAX_DEPTH {
        return Err(ProtocolError::invalid_payload("JSON nesting too deep"));
    }

    let event = match value {
        Value::Null => return Ok(None),
        Value::Bool(v) => Event::from(v),
        Value::Number(n) => {
            if let Some(v) = n.as_i64() {
                Event::from(v)
            } else if let Some(v) = n.as_u64() {
                Event::from(v)
            } else {
                Event::from(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        Value::String(v) => Event::from(v),
        Value::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for (i, item) in items.into_iter().enumerate() {
                let event = from_value(item, depth + 1)?.ok_or_else(|| {
                    ProtocolError::invalid_payload(format!("null sequence element at index {i}"))
                })?;
                out.push(event);
            }
            Event::Sequence(out)
        }
        Value::Object(map) => {
            let mut members = Vec::with_capacity(map.len());
            for (name, value) in map {
                if let Some(event) = from_value(value, depth + 1)? {
                    members.push((name, event));
                }
            }
            Event::Object(members)
        }
    };
    Ok(Some(event))
}
