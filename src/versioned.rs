//! The versioned, self-describing decoder.
//!
//! Every value on the wire is preceded by a 1-byte category tag, which lets
//! the decoder skip over fields the schema no longer declares — the
//! forward-compatibility mechanism newer replay builds rely on.

use std::collections::BTreeMap;

use crate::bitbuffer::BitBuffer;
use crate::error::{CorruptedReason, Error, Result};
use crate::schema::{Descriptor, Schema, TypeId};
use crate::value::{BitArray, Blob, Value};

const PARENT_FIELD: &str = "__parent";

/// Wire category tags, fixed across all protocol builds.
mod tag {
    pub const ARRAY: u8 = 0;
    pub const BITBLOB: u8 = 1;
    pub const BLOB: u8 = 2;
    pub const CHOICE: u8 = 3;
    pub const OPTIONAL: u8 = 4;
    pub const STRUCT: u8 = 5;
    pub const U8: u8 = 6;
    pub const U32: u8 = 7;
    pub const U64: u8 = 8;
    pub const VINT: u8 = 9;
}

/// A versioned, self-describing decoder bound to one byte source and one
/// schema. Unlike `BitPackedDecoder`, type-ids are resolved lazily on every
/// call, so forward references within the schema are fine.
pub struct VersionedDecoder<'a> {
    buffer: BitBuffer<'a>,
    schema: &'a Schema,
}

impl<'a> VersionedDecoder<'a> {
    pub fn new(data: &'a [u8], schema: &'a Schema) -> Self {
        Self {
            buffer: BitBuffer::new(data),
            schema,
        }
    }

    pub fn byte_align(&mut self) {
        self.buffer.byte_align();
    }

    pub fn done(&mut self) -> bool {
        self.buffer.done()
    }

    /// Decode one instance of `type_id`.
    pub fn instance(&mut self, type_id: TypeId) -> Result<Value> {
        let descriptor = self
            .schema
            .get(type_id)
            .ok_or_else(|| Error::Corrupted(CorruptedReason::UnknownEventId(type_id as i64)))?
            .clone();
        self.decode(&descriptor)
    }

    fn expect_tag(&mut self, expected: u8) -> Result<()> {
        let found = self.buffer.read_bits(8)? as u8;
        if found != expected {
            return Err(Error::Corrupted(CorruptedReason::UnexpectedTag {
                expected,
                found,
            }));
        }
        Ok(())
    }

    fn vint(&mut self) -> Result<i64> {
        let mut b = self.buffer.read_bits(8)? as u32;
        let negative = b & 1 != 0;
        let mut result: i64 = ((b >> 1) & 0x3f) as i64;
        let mut bits = 6u32;
        while b & 0x80 != 0 {
            b = self.buffer.read_bits(8)? as u32;
            result |= ((b & 0x7f) as i64) << bits;
            bits += 7;
        }
        Ok(if negative { -result } else { result })
    }

    fn decode(&mut self, descriptor: &Descriptor) -> Result<Value> {
        match descriptor {
            Descriptor::Array(_, elem) => {
                self.expect_tag(tag::ARRAY)?;
                let len = self.vint()?.max(0) as usize;
                let mut out = Vec::with_capacity(len);
                for _ in 0..len {
                    out.push(self.instance(*elem)?);
                }
                Ok(Value::Array(out))
            }
            Descriptor::BitArray(_) => {
                self.expect_tag(tag::BITBLOB)?;
                let len = self.vint()?.max(0) as u64;
                let byte_len = ((len + 7) / 8) as usize;
                let bits = self.buffer.read_aligned_bytes(byte_len)?;
                Ok(Value::BitArray(BitArray { bit_len: len, bits }))
            }
            Descriptor::Blob(_) => {
                self.expect_tag(tag::BLOB)?;
                let len = self.vint()?.max(0) as usize;
                let bytes = self.buffer.read_aligned_bytes(len)?;
                Ok(Value::Blob(Blob::from_bytes(bytes)))
            }
            Descriptor::Bool => {
                self.expect_tag(tag::U8)?;
                Ok(Value::Bool(self.buffer.read_bits(8)? != 0))
            }
            Descriptor::Choice { fields, .. } => {
                self.expect_tag(tag::CHOICE)?;
                let tag = self.vint()?;
                match fields.get(&tag) {
                    Some(field) => {
                        let value = self.instance(field.type_id)?;
                        Ok(Value::Choice(field.name.clone(), Box::new(value)))
                    }
                    None => {
                        // Forward-compat: an undeclared tag is skipped, not
                        // an error, and yields an empty mapping.
                        self.skip_instance()?;
                        Ok(Value::Struct(BTreeMap::new()))
                    }
                }
            }
            Descriptor::FourCc => {
                self.expect_tag(tag::U32)?;
                let bytes = self.buffer.read_aligned_bytes(4)?;
                Ok(Value::FourCc(String::from_utf8_lossy(&bytes).into_owned()))
            }
            Descriptor::Int(_) => {
                self.expect_tag(tag::VINT)?;
                Ok(Value::Int(self.vint()?))
            }
            Descriptor::Null => Ok(Value::Null),
            Descriptor::Optional(inner) => {
                self.expect_tag(tag::OPTIONAL)?;
                let present = self.buffer.read_bits(8)? != 0;
                if present {
                    Ok(Value::Optional(Some(Box::new(self.instance(*inner)?))))
                } else {
                    Ok(Value::Optional(None))
                }
            }
            Descriptor::Real32 => {
                self.expect_tag(tag::U32)?;
                let bytes = self.buffer.read_aligned_bytes(4)?;
                let arr: [u8; 4] = bytes.try_into().expect("4 aligned bytes");
                Ok(Value::Real32(f32::from_be_bytes(arr)))
            }
            Descriptor::Real64 => {
                self.expect_tag(tag::U64)?;
                let bytes = self.buffer.read_aligned_bytes(8)?;
                let arr: [u8; 8] = bytes.try_into().expect("8 aligned bytes");
                Ok(Value::Real64(f64::from_be_bytes(arr)))
            }
            Descriptor::Struct(fields) => {
                self.expect_tag(tag::STRUCT)?;
                let mut map = BTreeMap::new();
                let mut replaced: Option<Value> = None;
                let count = self.vint()?.max(0);
                for _ in 0..count {
                    let wire_tag = self.vint()?;
                    match fields.iter().find(|f| f.tag == wire_tag) {
                        Some(field) if field.name == PARENT_FIELD => {
                            let parent = self.instance(field.type_id)?;
                            match parent {
                                Value::Struct(parent_map) => map.extend(parent_map),
                                other if fields.len() == 1 => replaced = Some(other),
                                other => {
                                    map.insert(PARENT_FIELD.to_string(), other);
                                }
                            }
                        }
                        Some(field) => {
                            let value = self.instance(field.type_id)?;
                            map.insert(field.name.clone(), value);
                        }
                        None => {
                            self.skip_instance()?;
                        }
                    }
                }
                Ok(replaced.unwrap_or(Value::Struct(map)))
            }
        }
    }

    /// Structurally traverse and discard one value, using only its wire
    /// category tag — no schema knowledge required. This is what lets the
    /// decoder ignore fields a newer wire has that this schema doesn't
    /// declare.
    fn skip_instance(&mut self) -> Result<()> {
        let category = self.buffer.read_bits(8)? as u8;
        match category {
            tag::ARRAY => {
                let len = self.vint()?.max(0);
                for _ in 0..len {
                    self.skip_instance()?;
                }
            }
            tag::BITBLOB => {
                let len = self.vint()?.max(0) as u64;
                let byte_len = ((len + 7) / 8) as usize;
                self.buffer.read_aligned_bytes(byte_len)?;
            }
            tag::BLOB => {
                let len = self.vint()?.max(0) as usize;
                self.buffer.read_aligned_bytes(len)?;
            }
            tag::CHOICE => {
                self.vint()?;
                self.skip_instance()?;
            }
            tag::OPTIONAL => {
                let present = self.buffer.read_bits(8)? != 0;
                if present {
                    self.skip_instance()?;
                }
            }
            tag::STRUCT => {
                let count = self.vint()?.max(0);
                for _ in 0..count {
                    self.vint()?;
                    self.skip_instance()?;
                }
            }
            tag::U8 => {
                self.buffer.read_aligned_bytes(1)?;
            }
            tag::U32 => {
                self.buffer.read_aligned_bytes(4)?;
            }
            tag::U64 => {
                self.buffer.read_aligned_bytes(8)?;
            }
            tag::VINT => {
                self.vint()?;
            }
            other => {
                return Err(Error::Corrupted(CorruptedReason::UnexpectedTag {
                    expected: tag::VINT,
                    found: other,
                }))
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ChoiceField, IntBounds, StructField};
    use std::collections::BTreeMap as Map;

    #[test]
    fn vint_round_trip() {
        // +100 -> [0xC8, 0x01]; -1 -> [0x03]; +50 -> [0x64]
        let schema = Schema::new(vec![Descriptor::Int(IntBounds::new(0, 0))]);
        let data = [tag::VINT, 0xC8, 0x01];
        let mut decoder = VersionedDecoder::new(&data, &schema);
        assert_eq!(decoder.instance(0).unwrap(), Value::Int(100));

        let data = [tag::VINT, 0x03];
        let mut decoder = VersionedDecoder::new(&data, &schema);
        assert_eq!(decoder.instance(0).unwrap(), Value::Int(-1));

        let data = [tag::VINT, 0x64];
        let mut decoder = VersionedDecoder::new(&data, &schema);
        assert_eq!(decoder.instance(0).unwrap(), Value::Int(50));
    }

    #[test]
    fn optional_absent() {
        let schema = Schema::new(vec![
            Descriptor::Int(IntBounds::new(0, 0)),
            Descriptor::Optional(0),
        ]);
        let data = [tag::OPTIONAL, 0x00];
        let mut decoder = VersionedDecoder::new(&data, &schema);
        assert_eq!(decoder.instance(1).unwrap(), Value::Optional(None));
    }

    #[test]
    fn struct_with_unknown_field_is_skipped() {
        // Declared fields = [("x", int-ref, tag=1)]. Wire: struct, count=2,
        // entry (tag=1, value=1) matching "x", then entry (tag=2, a vint
        // payload) with no declared field, which must be skipped without
        // disturbing the decoded result.
        let schema = Schema::new(vec![
            Descriptor::Int(IntBounds::new(0, 0)),
            Descriptor::Struct(vec![StructField::new("x", 0, 1)]),
        ]);
        let data = [
            tag::STRUCT,
            0x04, // vint count = 2
            0x02, // vint wire tag = 1
            tag::VINT,
            0x02, // vint value = 1
            0x04, // vint wire tag = 2 (undeclared)
            tag::VINT,
            0x0A, // vint payload = 5, to be skipped
        ];
        let mut decoder = VersionedDecoder::new(&data, &schema);
        let result = decoder.instance(1).unwrap().into_struct().unwrap();
        assert_eq!(result.get("x"), Some(&Value::Int(1)));
        assert_eq!(result.len(), 1);
    }

    #[test]
    fn choice_unknown_tag_skips_and_returns_empty() {
        let mut fields = Map::new();
        fields.insert(
            0,
            ChoiceField {
                name: "a".to_string(),
                type_id: 0,
            },
        );
        let schema = Schema::new(vec![
            Descriptor::Int(IntBounds::new(0, 0)),
            Descriptor::Choice {
                bounds: IntBounds::new(0, 0),
                fields,
            },
        ]);
        // tag CHOICE, vint tag = 5 (unknown), payload tag VINT + value
        let data = [tag::CHOICE, 0x0a, tag::VINT, 0x02];
        let mut decoder = VersionedDecoder::new(&data, &schema);
        let result = decoder.instance(1).unwrap();
        assert_eq!(result, Value::Struct(BTreeMap::new()));
    }

    #[test]
    fn unexpected_tag_is_corrupted() {
        let schema = Schema::new(vec![Descriptor::Bool]);
        let data = [tag::U32]; // wrong tag for bool
        let mut decoder = VersionedDecoder::new(&data, &schema);
        assert!(matches!(decoder.instance(0), Err(Error::Corrupted(_))));
    }
}
