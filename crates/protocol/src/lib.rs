//! Beacon Protocol - event model and encodings shared by client and server
//!
//! This crate provides the types and transforms every other crate builds on:
//! - `Event` / `LeafValue` - Arbitrarily shaped attribute bags with typed leaves
//! - `flatten` / `unflatten` - Nested event to ordered `(path, leaf)` pairs and back
//! - `codec` - Self-describing binary encoding for the client's offline queue
//! - `wire` - JSON, XML and CSV text encodings for network transport
//!
//! # Design Principles
//!
//! - **Explicit construction**: producers build `Event` values; nothing inspects native types
//! - **Schema-optional decode**: binary decode never needs the producer's types
//! - **Bounded recursion**: every recursive walk stops at [`MAX_DEPTH`]

pub mod codec;
mod error;
mod event;
mod flatten;
mod schema;
pub mod wire;

pub use codec::{EnumRegistry, decode, decode_with_registry, encode};
pub use error::ProtocolError;
pub use event::{Decimal, ENUM_TAG_PREFIX, Event, LeafValue, MAX_DECIMAL_SCALE, ObjectBuilder};
pub use flatten::{FlatFields, flatten, unflatten};
pub use schema::LeafKind;
pub use wire::{TextEncoding, WireFormat};

// Re-export bytes for convenience
pub use bytes::Bytes;

/// Result type for protocol operations
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Deepest nesting accepted by flatten, codec and wire formats
///
/// Event graphs are trees, so exceeding this means a runaway or cyclic producer.
pub const MAX_DEPTH: usize = 64;

#[cfg(test)]
mod flatten_test;
