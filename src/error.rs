//! Crate-wide error type.

use std::fmt;

/// Errors produced while decoding a replay sub-stream.
///
/// Both variants are fatal for the sub-stream being decoded: neither the
/// bit-packed nor the versioned decoder attempts to resynchronize after
/// either one. Invalid UTF-8 inside a `blob` is deliberately *not* an
/// error variant here — it is handled inline by falling back to raw bytes,
/// per the `blob` decode rules.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The byte source was exhausted in the middle of an expected value.
    #[error("truncated while decoding {0}")]
    Truncated(&'static str),

    /// A structural mismatch was found: a versioned tag disagreed with the
    /// schema, a choice selected an undeclared variant, or an event-id was
    /// not present in the event-type map.
    #[error("corrupted: {0}")]
    Corrupted(CorruptedReason),
}

/// What, specifically, was corrupted. Kept separate from `Error` so call
/// sites can build a reason without allocating a `String` for the common
/// cases.
#[derive(Debug, Clone)]
pub enum CorruptedReason {
    /// A versioned value's leading tag byte did not match the category the
    /// schema expected for that field.
    UnexpectedTag { expected: u8, found: u8 },
    /// A `choice` descriptor's wire tag had no matching declared field.
    UnknownChoiceTag(i64),
    /// An event-id read from the stream had no entry in the event-type map.
    UnknownEventId(i64),
}

impl fmt::Display for CorruptedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CorruptedReason::UnexpectedTag { expected, found } => write!(
                f,
                "expected category tag {}, found {}",
                expected, found
            ),
            CorruptedReason::UnknownChoiceTag(tag) => write!(f, "unknown choice tag {}", tag),
            CorruptedReason::UnknownEventId(id) => write!(f, "unknown event id {}", id),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
