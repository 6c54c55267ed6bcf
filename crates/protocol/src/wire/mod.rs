//! Wire format multiplexer
//!
//! Serializes event sequences to JSON, XML or CSV text for network transport
//! and back. A single event is always sent as a one-element sequence so the
//! receiving side decodes every payload the same way.
//!
//! # Content types
//!
//! | Format | MIME type          |
//! |--------|--------------------|
//! | CSV    | `text/csv`         |
//! | JSON   | `application/json` |
//! | XML    | `application/xml`  |
//!
//! # Example
//!
//! ```
//! use beacon_protocol::{Event, WireFormat, wire};
//!
//! let events = vec![Event::builder().field("EventName", "Login").build()];
//! let text = wire::serialize(&events, WireFormat::Json).unwrap();
//! assert_eq!(text, r#"[{"EventName":"Login"}]"#);
//!
//! let decoded = wire::deserialize(&text, WireFormat::Json).unwrap();
//! assert_eq!(decoded, events);
//! ```

mod csv_text;
mod json;
mod xml;


use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use crate::event::Event;
use crate::{ProtocolError, Result};

/// Text format used on the network
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireFormat {
    /// Top-level JSON array, one element per event (default)
    #[default]
    Json,
    /// `<events>` root with one `<event>` child per event
    Xml,
    /// One row per event, header from the first event's paths
    Csv,
}

impl WireFormat {
    /// All formats
    pub const ALL: [WireFormat; 3] = [Self::Json, Self::Xml, Self::Csv];

    /// Get the MIME type of this format
    #[inline]
    pub const fn content_type(self) -> &'static str {
        match self {
            Self::Json => "application/json",
            Self::Xml => "application/xml",
            Self::Csv => "text/csv",
        }
    }

    /// Get the short name of this format
    #[inline]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Xml => "xml",
            Self::Csv => "csv",
        }
    }

    /// Resolve a format from a `Content-Type` value
    ///
    /// Parameters such as `charset` are ignored, matching is case-insensitive.
    pub fn from_content_type(content_type: &str) -> Result<Self> {
        let mime = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim();

        Self::ALL
            .into_iter()
            .find(|f| f.content_type().eq_ignore_ascii_case(mime))
            .ok_or_else(|| ProtocolError::UnsupportedFormat(content_type.to_string()))
    }

    /// Build a `Content-Type` header value with a charset parameter
    pub fn content_type_header(self, encoding: TextEncoding) -> String {
        format!("{}; charset={}", self.content_type(), encoding.charset())
    }
}

impl FromStr for WireFormat {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|f| f.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ProtocolError::UnsupportedFormat(s.to_string()))
    }
}

impl fmt::Display for WireFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Character repertoire of serialized wire text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextEncoding {
    /// Unrestricted UTF-8 (default)
    #[default]
    #[serde(alias = "utf-8")]
    Utf8,
    /// 7-bit ASCII; other characters are escaped where the format allows
    #[serde(alias = "us-ascii")]
    Ascii,
}

impl TextEncoding {
    /// Charset label for `Content-Type` and XML declarations
    #[inline]
    pub const fn charset(self) -> &'static str {
        match self {
            Self::Utf8 => "utf-8",
            Self::Ascii => "us-ascii",
        }
    }
}

/// Serialize events as UTF-8 text
pub fn serialize(events: &[Event], format: WireFormat) -> Result<String> {
    serialize_with(events, format, TextEncoding::Utf8)
}

/// Serialize events with an explicit text encoding
///
/// # Errors
///
/// - `UnsupportedType` for values the format cannot carry
/// - `CycleDetected` if nesting exceeds the depth guard
pub fn serialize_with(events: &[Event], format: WireFormat, encoding: TextEncoding) -> Result<String> {
    match format {
        WireFormat::Json => json::serialize(events, encoding),
        WireFormat::Xml => xml::serialize(events, encoding),
        WireFormat::Csv => csv_text::serialize(events, encoding),
    }
}

/// Deserialize events from text
pub fn deserialize(text: &str, format: WireFormat) -> Result<Vec<Event>> {
    match format {
        WireFormat::Json => json::deserialize(text),
        WireFormat::Xml => xml::deserialize(text),
        WireFormat::Csv => csv_text::deserialize(text),
    }
}

/// Deserialize a request body described by its `Content-Type`
///
/// # Errors
///
/// Returns `UnsupportedFormat` for an unknown MIME type before looking at the body.
pub fn deserialize_body(body: &[u8], content_type: &str) -> Result<Vec<Event>> {
    let format = WireFormat::from_content_type(content_type)?;
    let text = std::str::from_utf8(body)
        .map_err(|e| ProtocolError::invalid_payload(format!("body is not valid UTF-8: {e}")))?;
    deserialize(text, format)
}

/// Replace every non-ASCII character using `escape`
fn escape_non_ascii(text: &str, escape: impl Fn(char, &mut String)) -> String {
    if text.is_ascii() {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len() + 16);
    for c in text.chars() {
        if c.is_ascii() {
            out.push(c);
        } else {
            escape(c, &mut out);
        }
    }
    out
}
