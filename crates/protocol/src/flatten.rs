//! Flatten engine
//!
//! Turns a nested [`Event`] into an ordered list of `(path, leaf)` pairs and
//! back. Paths join member names with `.` and sequence positions with `[i]`,
//! e.g. `order.items[0].sku`. Order is source member order, then sequence
//! index.
//!
//! Member names containing `.` or `[` flatten fine but cannot be told apart
//! from nesting when unflattening.

use crate::event::{Event, LeafValue};
use crate::{MAX_DEPTH, ProtocolError, Result};

/// Ordered `(path, leaf)` pairs produced by [`flatten`]
pub type FlatFields = Vec<(String, LeafValue)>;

/// Flatten an event into ordered `(path, leaf)` pairs
///
/// # Errors
///
/// Returns `CycleDetected` if nesting exceeds [`MAX_DEPTH`].
pub fn flatten(event: &Event) -> Result<FlatFields> {
    let mut out = Vec::new();
    flatten_into(event, String::new(), 0, &mut out)?;
    Ok(out)
}

fn flatten_into(event: &Event, path: String, depth: usize, out: &mut FlatFields) -> Result<()> {
    if depth > MAX_DEPTH {
        return Err(ProtocolError::cycle(path));
    }

    match event {
        Event::Primitive(value) => out.push((path, value.clone())),
        Event::Sequence(items) => {
            for (i, item) in items.iter().enumerate() {
                flatten_into(item, format!("{path}[{i}]"), depth + 1, out)?;
            }
        }
        Event::Object(members) => {
            for (name, value) in members {
                let child = if path.is_empty() {
                    name.clone()
                } else {
                    format!("{path}.{name}")
                };
                flatten_into(value, child, depth + 1, out)?;
            }
        }
    }
    Ok(())
}

// =============================================================================
// Unflatten
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Name(String),
    Index(usize),
}

fn parse_path(path: &str) -> Result<Vec<Segment>> {
    let invalid = |msg: &str| ProtocolError::invalid_payload(format!("path '{path}': {msg}"));

    let mut segments = Vec::new();
    let mut rest = path;

    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix('[') {
            let close = after.find(']').ok_or_else(|| invalid("unclosed '['"))?;
            let index = after[..close]
                .parse::<usize>()
                .map_err(|_| invalid("index is not a number"))?;
            segments.push(Segment::Index(index));
            rest = &after[close + 1..];
        } else {
            let body = if segments.is_empty() {
                rest
            } else {
                rest.strip_prefix('.').ok_or_else(|| invalid("expected '.' or '['"))?
            };
            let end = body.find(['.', '[']).unwrap_or(body.len());
            if end == 0 {
                return Err(invalid("empty member name"));
            }
            segments.push(Segment::Name(body[..end].to_string()));
            rest = &body[end..];
        }

        if segments.len() > MAX_DEPTH {
            return Err(invalid("nesting too deep"));
        }
    }

    Ok(segments)
}

/// Rebuild a nested event from `(path, leaf)` pairs
///
/// Sequence indices must appear in order without gaps. An empty input yields
/// an empty object.
pub fn unflatten<I>(fields: I) -> Result<Event>
where
    I: IntoIterator<Item = (String, LeafValue)>,
{
    let mut root: Option<Event> = None;

    for (path, value) in fields {
        let segments = parse_path(&path)?;
        match root.as_mut() {
            None => root = Some(build(&segments, value, &path)?),
            Some(node) => insert(node, &segments, value, &path)?,
        }
    }

    Ok(root.unwrap_or(Event::Object(Vec::new())))
}

fn build(segments: &[Segment], value: LeafValue, path: &str) -> Result<Event> {
    match segments.split_first() {
        None => Ok(Event::Primitive(value)),
        Some((Segment::Name(name), rest)) => {
            Ok(Event::Object(vec![(name.clone(), build(rest, value, path)?)]))
        }
        Some((Segment::Index(0), rest)) => Ok(Event::Sequence(vec![build(rest, value, path)?])),
        Some((Segment::Index(i), _)) => Err(ProtocolError::invalid_payload(format!(
            "path '{path}': index {i} skips earlier elements"
        ))),
    }
}

fn insert(node: &mut Event, segments: &[Segment], value: LeafValue, path: &str) -> Result<()> {
    match (node, segments.split_first()) {
        (Event::Object(members), Some((Segment::Name(name), rest))) => {
            match members.iter_mut().find(|(k, _)| k == name) {
                Some((_, child)) => insert(child, rest, value, path),
                None => {
                    members.push((name.clone(), build(rest, value, path)?));
                    Ok(())
                }
            }
        }
        (Event::Sequence(items), Some((Segment::Index(i), rest))) => {
            let i = *i;
            if i < items.len() {
                insert(&mut items[i], rest, value, path)
            } else if i == items.len() {
                items.push(build(rest, value, path)?);
                Ok(())
            } else {
                Err(ProtocolError::invalid_payload(format!(
                    "path '{path}': index {i} skips earlier elements"
                )))
            }
        }
        (_, None) => Err(ProtocolError::invalid_payload(format!(
            "duplicate path '{path}'"
        ))),
        _ => Err(ProtocolError::invalid_payload(format!(
            "path '{path}' conflicts with an earlier path"
        ))),
    }
}
