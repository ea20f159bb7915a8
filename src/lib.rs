//! Decoder for bit-packed and versioned replay protocol streams.
//!
//! A replay file is a container of independently-encoded sub-streams
//! (game events, message events, tracker events, header, details,
//! init-data, attributes). Two schema-directed wire encodings cover all of
//! them except attributes: [`bitpacked`] (no per-value tags, schema
//! dictates layout) and [`versioned`] (one category tag per value, so a
//! schema mismatch can be skipped instead of failing). [`facade`] maps
//! each sub-stream kind to the right decoder and root type-id.

pub mod attributes;
pub mod bitbuffer;
pub mod bitpacked;
pub mod decode;
pub mod error;
pub mod events;
pub mod facade;
pub mod schema;
pub mod value;
pub mod versioned;

pub use decode::Decoder;
pub use error::{CorruptedReason, Error, Result};
pub use events::{Event, EventStream, EventTypeMap};
pub use facade::{Protocol, SchemaRegistry};
pub use schema::{ChoiceField, Descriptor, IntBounds, Schema, StructField, TypeId};
pub use value::{BitArray, Blob, Value};
