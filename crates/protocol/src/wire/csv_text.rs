//! CSV wire format
//!
//! The header is the first event's flattened path list; each event becomes one
//! row under that header. Later events with a different shape lose the paths
//! the header lacks and leave its extra columns empty. This is a limitation of
//! the format and is logged, not corrected.
//!
//! CSV carries no types: decoding infers booleans, integers and finite floats
//! and keeps everything else as text. Empty cells are skipped.

use std::collections::HashMap;

use super::TextEncoding;
use crate::event::{Event, LeafValue};
use crate::flatten::{flatten, unflatten};
use crate::{ProtocolError, Result};

pub(super) fn serialize(events: &[Event], encoding: TextEncoding) -> Result<String> {
    let Some(first) = events.first() else {
        return Ok(String::new());
    };

    let header: Vec<String> = flatten(first)?.into_iter().map(|(path, _)| path).collect();
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(&header)?;

    let mut mismatched = 0usize;
    for event in events {
        let fields = flatten(event)?;
        let by_path: HashMap<&str, &LeafValue> =
            fields.iter().map(|(path, value)| (path.as_str(), value)).collect();

        if fields.len() != header.len() || header.iter().any(|h| !by_path.contains_key(h.as_str())) {
            mismatched += 1;
        }

        let row: Vec<String> = header
            .iter()
            .map(|h| by_path.get(h.as_str()).map(|v| v.to_string()).unwrap_or_default())
            .collect();
        writer.write_record(&row)?;
    }

    if mismatched > 0 {
        tracing::warn!(
            events = events.len(),
            mismatched,
            columns = header.len(),
            "CSV batch mixes event shapes; fields outside the header were dropped"
        );
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| ProtocolError::Csv(csv::Error::from(e.into_error())))?;
    let text = String::from_utf8(bytes)
        .map_err(|e| ProtocolError::invalid_payload(format!("CSV output is not UTF-8: {e}")))?;

    if encoding == TextEncoding::Ascii && !text.is_ascii() {
        return Err(ProtocolError::unsupported(
            "CSV cannot escape non-ASCII text",
        ));
    }
    Ok(text)
}

fn infer(text: &str) -> LeafValue {
    match text {
        "true" => return LeafValue::Bool(true),
        "false" => return LeafValue::Bool(false),
        _ => {}
    }
    if let Ok(v) = text.parse::<i64>() {
        return LeafValue::I64(v);
    }
    if let Ok(v) = text.parse::<u64>() {
        return LeafValue::U64(v);
    }
    if let Ok(v) = text.parse::<f64>()
        && v.is_finite()
    {
        return LeafValue::F64(v);
    }
    LeafValue::String(text.to_string())
}

pub(super) fn deserialize(text: &str) -> Result<Vec<Event>> {
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(text.as_bytes());
    let header = reader.headers()?.clone();

    let mut events = Vec::new();
    for record in reader.records() {
        let record = record?;
        let fields = header
            .iter()
            .zip(record.iter())
            .filter(|(_, cell)| !cell.is_empty())
            .map(|(path, cell)| (path.to_string(), infer(cell)));
        events.push(unflatten(fields)?);
    }
    Ok(events)
}
