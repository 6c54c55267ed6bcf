//! Event model
//!
//! An [`Event`] is an arbitrarily shaped attribute bag: a tree whose leaves are
//! [`LeafValue`]s and whose inner nodes are ordered sequences or ordered named
//! members. Producers build events explicitly; nothing here inspects native
//! Rust structures.
//!
//! ```
//! use beacon_protocol::Event;
//!
//! let event = Event::builder()
//!     .field("EventName", "Checkout")
//!     .field("amount", 42_i64)
//!     .field("tags", Event::sequence(["a", "b"]))
//!     .build();
//!
//! assert_eq!(event.get("amount").and_then(|e| e.as_leaf()).map(|v| v.to_string()), Some("42".into()));
//! ```

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use chrono::{DateTime, SecondsFormat, TimeDelta, Utc};

use crate::schema::LeafKind;
use crate::{ProtocolError, Result};

/// Prefix of the type tag carried by enumeration leaves
pub const ENUM_TAG_PREFIX: &str = "enum:";

/// Largest decimal scale (digits after the point)
pub const MAX_DECIMAL_SCALE: u32 = 28;

/// Largest decimal mantissa magnitude (96 bits)
const MAX_DECIMAL_MANTISSA: u128 = (1u128 << 96) - 1;

// =============================================================================
// Decimal
// =============================================================================

/// Exact decimal number: `mantissa * 10^-scale`
///
/// Equality is structural, `1.50` and `1.5` are distinct values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Decimal {
    mantissa: i128,
    scale: u32,
}

impl Decimal {
    /// Create a decimal, rejecting mantissas wider than 96 bits and scales above 28
    pub fn new(mantissa: i128, scale: u32) -> Result<Self> {
        if mantissa.unsigned_abs() > MAX_DECIMAL_MANTISSA {
            return Err(ProtocolError::unsupported(format!(
                "decimal mantissa {mantissa} exceeds 96 bits"
            )));
        }
        if scale > MAX_DECIMAL_SCALE {
            return Err(ProtocolError::unsupported(format!(
                "decimal scale {scale} exceeds {MAX_DECIMAL_SCALE}"
            )));
        }
        Ok(Self { mantissa, scale })
    }

    /// Unscaled integer value
    #[inline]
    pub fn mantissa(&self) -> i128 {
        self.mantissa
    }

    /// Number of digits after the decimal point
    #[inline]
    pub fn scale(&self) -> u32 {
        self.scale
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = self.mantissa.unsigned_abs().to_string();
        let sign = if self.mantissa < 0 { "-" } else { "" };
        let scale = self.scale as usize;

        if scale == 0 {
            return write!(f, "{sign}{digits}");
        }

        let padded = format!("{digits:0>width$}", width = scale + 1);
        let (int_part, frac_part) = padded.split_at(padded.len() - scale);
        write!(f, "{sign}{int_part}.{frac_part}")
    }
}

impl FromStr for Decimal {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || ProtocolError::invalid_payload(format!("invalid decimal '{s}'"));

        let (negative, unsigned) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s.strip_prefix('+').unwrap_or(s)),
        };
        let (int_part, frac_part) = unsigned.split_once('.').unwrap_or((unsigned, ""));

        if int_part.is_empty() && frac_part.is_empty() {
            return Err(invalid());
        }
        if !int_part.bytes().chain(frac_part.bytes()).all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }

        let mut mantissa: i128 = 0;
        for b in int_part.bytes().chain(frac_part.bytes()) {
            mantissa = mantissa
                .checked_mul(10)
                .and_then(|m| m.checked_add(i128::from(b - b'0')))
                .ok_or_else(invalid)?;
        }
        if negative {
            mantissa = -mantissa;
        }

        let scale = u32::try_from(frac_part.len()).map_err(|_| invalid())?;
        Self::new(mantissa, scale)
    }
}

// =============================================================================
// Leaf values
// =============================================================================

/// A primitive value at a leaf of an event
#[derive(Debug, Clone, PartialEq)]
pub enum LeafValue {
    String(String),
    I8(i8),
    U8(u8),
    I16(i16),
    U16(u16),
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
    F32(f32),
    F64(f64),
    Bool(bool),
    Decimal(Decimal),
    DateTime(DateTime<Utc>),
    Duration(TimeDelta),
    Bytes(Bytes),
    Chars(Vec<char>),
    Char(char),
    /// Enumeration member, carried as its underlying 32-bit value
    Enum { type_name: String, value: i32 },
}

impl LeafValue {
    /// Get the kind of this value
    pub fn kind(&self) -> LeafKind {
        match self {
            Self::String(_) => LeafKind::String,
            Self::I8(_) => LeafKind::I8,
            Self::U8(_) => LeafKind::U8,
            Self::I16(_) => LeafKind::I16,
            Self::U16(_) => LeafKind::U16,
            Self::I32(_) => LeafKind::I32,
            Self::U32(_) => LeafKind::U32,
            Self::I64(_) => LeafKind::I64,
            Self::U64(_) => LeafKind::U64,
            Self::F32(_) => LeafKind::F32,
            Self::F64(_) => LeafKind::F64,
            Self::Bool(_) => LeafKind::Bool,
            Self::Decimal(_) => LeafKind::Decimal,
            Self::DateTime(_) => LeafKind::DateTime,
            Self::Duration(_) => LeafKind::Duration,
            Self::Bytes(_) => LeafKind::Bytes,
            Self::Chars(_) => LeafKind::Chars,
            Self::Char(_) => LeafKind::Char,
            Self::Enum { .. } => LeafKind::Enum,
        }
    }

    /// Self-describing type tag: the kind name, or `enum:<type>` for enumerations
    pub fn tag(&self) -> Cow<'_, str> {
        match self {
            Self::Enum { type_name, .. } => Cow::Owned(format!("{ENUM_TAG_PREFIX}{type_name}")),
            other => Cow::Borrowed(other.kind().as_str()),
        }
    }

    /// Borrow the text of a string leaf
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Parse a value from its textual form, given its type tag
    pub fn parse(tag: &str, text: &str) -> Result<Self> {
        if let Some(type_name) = tag.strip_prefix(ENUM_TAG_PREFIX) {
            let value = parse_number(tag, text)?;
            return Ok(Self::Enum {
                type_name: type_name.to_string(),
                value,
            });
        }

        let kind = LeafKind::from_name(tag)
            .ok_or_else(|| ProtocolError::unsupported(format!("unknown leaf type '{tag}'")))?;

        let value = match kind {
            LeafKind::String => Self::String(text.to_string()),
            LeafKind::I8 => Self::I8(parse_number(tag, text)?),
            LeafKind::U8 => Self::U8(parse_number(tag, text)?),
            LeafKind::I16 => Self::I16(parse_number(tag, text)?),
            LeafKind::U16 => Self::U16(parse_number(tag, text)?),
            LeafKind::I32 => Self::I32(parse_number(tag, text)?),
            LeafKind::U32 => Self::U32(parse_number(tag, text)?),
            LeafKind::I64 => Self::I64(parse_number(tag, text)?),
            LeafKind::U64 => Self::U64(parse_number(tag, text)?),
            LeafKind::F32 => Self::F32(parse_number(tag, text)?),
            LeafKind::F64 => Self::F64(parse_number(tag, text)?),
            LeafKind::Bool => Self::Bool(parse_number(tag, text)?),
            LeafKind::Decimal => Self::Decimal(text.trim().parse()?),
            LeafKind::DateTime => Self::DateTime(
                DateTime::parse_from_rfc3339(text.trim())
                    .map_err(|e| invalid_text(tag, text, e))?
                    .with_timezone(&Utc),
            ),
            LeafKind::Duration => Self::Duration(TimeDelta::nanoseconds(parse_number(tag, text)?)),
            LeafKind::Bytes => Self::Bytes(Bytes::from(
                STANDARD
                    .decode(text.trim())
                    .map_err(|e| invalid_text(tag, text, e))?,
            )),
            LeafKind::Chars => Self::Chars(text.chars().collect()),
            LeafKind::Char => {
                let mut chars = text.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Self::Char(c),
                    _ => return Err(invalid_text(tag, text, "expected exactly one character")),
                }
            }
            LeafKind::Enum => {
                return Err(ProtocolError::unsupported(
                    "enumeration tag without a type name",
                ));
            }
        };
        Ok(value)
    }
}

fn parse_number<T>(tag: &str, text: &str) -> Result<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    text.trim().parse().map_err(|e| invalid_text(tag, text, e))
}

fn invalid_text(tag: &str, text: &str, err: impl fmt::Display) -> ProtocolError {
    ProtocolError::invalid_payload(format!("invalid {tag} value '{text}': {err}"))
}

impl fmt::Display for LeafValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(v) => f.write_str(v),
            Self::I8(v) => write!(f, "{v}"),
            Self::U8(v) => write!(f, "{v}"),
            Self::I16(v) => write!(f, "{v}"),
            Self::U16(v) => write!(f, "{v}"),
            Self::I32(v) => write!(f, "{v}"),
            Self::U32(v) => write!(f, "{v}"),
            Self::I64(v) => write!(f, "{v}"),
            Self::U64(v) => write!(f, "{v}"),
            Self::F32(v) => write!(f, "{v}"),
            Self::F64(v) => write!(f, "{v}"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Decimal(v) => write!(f, "{v}"),
            Self::DateTime(v) => f.write_str(&v.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            Self::Duration(v) => match v.num_nanoseconds() {
                Some(nanos) => write!(f, "{nanos}"),
                None => write!(f, "{v}"),
            },
            Self::Bytes(v) => f.write_str(&STANDARD.encode(v)),
            Self::Chars(v) => {
                for c in v {
                    write!(f, "{c}")?;
                }
                Ok(())
            }
            Self::Char(v) => write!(f, "{v}"),
            Self::Enum { value, .. } => write!(f, "{value}"),
        }
    }
}

macro_rules! leaf_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for LeafValue {
                fn from(v: $ty) -> Self {
                    Self::$variant(v.into())
                }
            }

            impl From<$ty> for Event {
                fn from(v: $ty) -> Self {
                    Self::Primitive(LeafValue::$variant(v.into()))
                }
            }
        )*
    };
}

leaf_from! {
    String => String,
    &str => String,
    i8 => I8,
    u8 => U8,
    i16 => I16,
    u16 => U16,
    i32 => I32,
    u32 => U32,
    i64 => I64,
    u64 => U64,
    f32 => F32,
    f64 => F64,
    bool => Bool,
    Decimal => Decimal,
    DateTime<Utc> => DateTime,
    TimeDelta => Duration,
    Bytes => Bytes,
    Vec<char> => Chars,
    char => Char,
}

// =============================================================================
// Events
// =============================================================================

/// A structured record: a leaf, an ordered sequence, or ordered named members
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Primitive(LeafValue),
    Sequence(Vec<Event>),
    Object(Vec<(String, Event)>),
}

impl Event {
    /// Start building an object event
    pub fn builder() -> ObjectBuilder {
        ObjectBuilder::default()
    }

    /// Create an object event from named members, keeping their order
    pub fn object<K, I>(members: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Event)>,
    {
        Self::Object(members.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Create a sequence event
    pub fn sequence<T, I>(items: I) -> Self
    where
        T: Into<Event>,
        I: IntoIterator<Item = T>,
    {
        Self::Sequence(items.into_iter().map(Into::into).collect())
    }

    /// Create an enumeration leaf
    pub fn enumeration(type_name: impl Into<String>, value: i32) -> Self {
        Self::Primitive(LeafValue::Enum {
            type_name: type_name.into(),
            value,
        })
    }

    /// Borrow the leaf value, if this is a primitive
    pub fn as_leaf(&self) -> Option<&LeafValue> {
        match self {
            Self::Primitive(v) => Some(v),
            _ => None,
        }
    }

    /// Check if this event is a primitive
    #[inline]
    pub fn is_leaf(&self) -> bool {
        matches!(self, Self::Primitive(_))
    }

    /// Look up a direct member of an object by name
    pub fn get(&self, name: &str) -> Option<&Event> {
        match self {
            Self::Object(members) => members.iter().find(|(k, _)| k == name).map(|(_, v)| v),
            _ => None,
        }
    }
}

impl From<LeafValue> for Event {
    fn from(v: LeafValue) -> Self {
        Self::Primitive(v)
    }
}

impl From<Vec<Event>> for Event {
    fn from(items: Vec<Event>) -> Self {
        Self::Sequence(items)
    }
}

/// Builder for object events
#[derive(Debug, Default)]
#[must_use]
pub struct ObjectBuilder {
    members: Vec<(String, Event)>,
}

impl ObjectBuilder {
    /// Append a member; members keep insertion order
    pub fn field(mut self, name: impl Into<String>, value: impl Into<Event>) -> Self {
        self.members.push((name.into(), value.into()));
        self
    }

    /// Append a member only when a value is present
    pub fn field_opt(self, name: impl Into<String>, value: Option<impl Into<Event>>) -> Self {
        match value {
            Some(v) => self.field(name, v),
            None => self,
        }
    }

    /// Finish the object
    pub fn build(self) -> Event {
        Event::Object(self.members)
    }
}
