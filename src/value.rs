//! The decoded value tree produced by both decoders.

use std::collections::BTreeMap;

/// A blob decodes to text on successful UTF-8, or to raw bytes otherwise.
/// Modeled as an explicit sum type rather than folding the duality into
/// `Value::Blob` itself, so callers always know which they received.
#[derive(Debug, Clone, PartialEq)]
pub enum Blob {
    Text(String),
    Bytes(Vec<u8>),
}

impl Blob {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        match String::from_utf8(bytes) {
            Ok(text) => Blob::Text(text),
            Err(err) => Blob::Bytes(err.into_bytes()),
        }
    }
}

/// A raw, unaligned bit payload together with its declared bit length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitArray {
    pub bit_len: u64,
    pub bits: Vec<u8>,
}

/// A polymorphic decoded value, as described by the schema model.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Bool(bool),
    Blob(Blob),
    BitArray(BitArray),
    FourCc(String),
    Real32(f32),
    Real64(f64),
    Array(Vec<Value>),
    Optional(Option<Box<Value>>),
    /// A single-key mapping, produced by a `choice` descriptor.
    Choice(String, Box<Value>),
    /// A named mapping, produced by a `struct` descriptor.
    Struct(BTreeMap<String, Value>),
    Null,
}

impl Value {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_struct(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Struct(map) => Some(map),
            _ => None,
        }
    }

    pub fn into_struct(self) -> Option<BTreeMap<String, Value>> {
        match self {
            Value::Struct(map) => Some(map),
            _ => None,
        }
    }

    /// The numeric value carried by a `choice`-shaped value such as
    /// `svaruint32`, i.e. the value of its single present variant.
    ///
    /// The wire format assumes the choice has exactly one present variant;
    /// this returns that variant's value, or `0` if the mapping is empty
    /// (absent delta). Behavior for a choice with more than one key is
    /// undefined by the source protocol and not specially handled here.
    pub fn choice_numeric_value(&self) -> i64 {
        match self {
            Value::Choice(_, inner) => inner.as_i64().unwrap_or(0),
            _ => 0,
        }
    }
}
