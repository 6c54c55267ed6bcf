//! Leaf kinds
//!
//! The closed set of primitive kinds an event leaf may carry. Kind names
//! double as codec type tags, XML `type` attributes and schema hash input,
//! so they are part of the persisted format and must not change.

/// Kind of a leaf value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LeafKind {
    /// UTF-8 text
    String,
    /// Signed 8-bit integer
    I8,
    /// Unsigned byte
    U8,
    /// Signed 16-bit integer
    I16,
    /// Unsigned 16-bit integer
    U16,
    /// Signed 32-bit integer
    I32,
    /// Unsigned 32-bit integer
    U32,
    /// Signed 64-bit integer
    I64,
    /// Unsigned 64-bit integer
    U64,
    /// 32-bit float
    F32,
    /// 64-bit float
    F64,
    /// Boolean
    Bool,
    /// Exact decimal
    Decimal,
    /// UTC timestamp
    DateTime,
    /// Signed time span
    Duration,
    /// Raw byte sequence
    Bytes,
    /// Character sequence
    Chars,
    /// Single character
    Char,
    /// Named enumeration carried as its 32-bit value
    Enum,
}

impl LeafKind {
    /// All kinds, in tag order
    pub const ALL: [LeafKind; 19] = [
        Self::String,
        Self::I8,
        Self::U8,
        Self::I16,
        Self::U16,
        Self::I32,
        Self::U32,
        Self::I64,
        Self::U64,
        Self::F32,
        Self::F64,
        Self::Bool,
        Self::Decimal,
        Self::DateTime,
        Self::Duration,
        Self::Bytes,
        Self::Chars,
        Self::Char,
        Self::Enum,
    ];

    /// Get the stable name of this kind
    #[inline]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::I8 => "i8",
            Self::U8 => "u8",
            Self::I16 => "i16",
            Self::U16 => "u16",
            Self::I32 => "i32",
            Self::U32 => "u32",
            Self::I64 => "i64",
            Self::U64 => "u64",
            Self::F32 => "f32",
            Self::F64 => "f64",
            Self::Bool => "bool",
            Self::Decimal => "decimal",
            Self::DateTime => "datetime",
            Self::Duration => "duration",
            Self::Bytes => "bytes",
            Self::Chars => "chars",
            Self::Char => "char",
            Self::Enum => "enum",
        }
    }

    /// Parse a kind from its stable name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == name)
    }

    /// Check if this kind is an integer of any width
    #[inline]
    pub const fn is_integer(self) -> bool {
        matches!(
            self,
            Self::I8
                | Self::U8
                | Self::I16
                | Self::U16
                | Self::I32
                | Self::U32
                | Self::I64
                | Self::U64
                | Self::Enum
        )
    }

    /// Check if this kind is textual
    #[inline]
    pub const fn is_text(self) -> bool {
        matches!(self, Self::String | Self::Chars | Self::Char)
    }
}

impl std::fmt::Display for LeafKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
