//! The bit-packed, schema-directed decoder.
//!
//! Layout on the wire is entirely determined by the schema: there are no
//! per-value tags. Each descriptor in the schema table is pre-bound, at
//! construction time, to a `Resolver` closure that reads a value of that
//! type from the buffer — the same strategy as the original's closures,
//! generalized to a `Vec<Box<dyn Fn(...)>>` per design note §9(b).

use std::collections::BTreeMap;
use std::rc::Rc;

use crate::bitbuffer::BitBuffer;
use crate::error::{CorruptedReason, Error, Result};
use crate::schema::{Descriptor, Schema, TypeId};
use crate::value::{BitArray, Blob, Value};

const PARENT_FIELD: &str = "__parent";

type Resolver = Rc<dyn Fn(&mut BitBuffer, &[Resolver]) -> Result<Value>>;

/// A bit-packed decoder bound to one byte source and one schema.
///
/// Resolvers are precomputed in schema-table order at construction; a
/// composite descriptor may only reference type-ids already bound, i.e.
/// strictly smaller than its own index (`Schema::is_backward_referencing`).
pub struct BitPackedDecoder<'a> {
    buffer: BitBuffer<'a>,
    resolvers: Vec<Resolver>,
}

impl<'a> BitPackedDecoder<'a> {
    pub fn new(data: &'a [u8], schema: &Schema) -> Self {
        let mut resolvers: Vec<Resolver> = Vec::with_capacity(schema.len());
        for (_, descriptor) in schema.iter() {
            resolvers.push(bind(descriptor));
        }
        Self {
            buffer: BitBuffer::new(data),
            resolvers,
        }
    }

    /// Decode one instance of `type_id` from the current buffer position.
    pub fn instance(&mut self, type_id: TypeId) -> Result<Value> {
        let resolver = self.resolvers[type_id].clone();
        resolver(&mut self.buffer, &self.resolvers)
    }

    pub fn byte_align(&mut self) {
        self.buffer.byte_align();
    }

    pub fn done(&mut self) -> bool {
        self.buffer.done()
    }
}

fn bind(descriptor: &Descriptor) -> Resolver {
    match descriptor.clone() {
        Descriptor::Int(bounds) => Rc::new(move |buf, _| {
            let raw = buf.read_bits(bounds.width as u32)? as i64;
            Ok(Value::Int(bounds.offset + raw))
        }),
        Descriptor::Bool => Rc::new(|buf, _| Ok(Value::Bool(buf.read_bits(1)? != 0))),
        Descriptor::Blob(bounds) => Rc::new(move |buf, _| {
            let len = buf.read_bits(bounds.width as u32)? as i64 + bounds.offset;
            let bytes = buf.read_aligned_bytes(len.max(0) as usize)?;
            Ok(Value::Blob(Blob::from_bytes(bytes)))
        }),
        Descriptor::BitArray(bounds) => Rc::new(move |buf, _| {
            let len = (buf.read_bits(bounds.width as u32)? as i64 + bounds.offset).max(0) as u64;
            let bits = buf.read_bit_blob(len)?;
            Ok(Value::BitArray(BitArray { bit_len: len, bits }))
        }),
        Descriptor::FourCc => Rc::new(|buf, _| {
            let raw = buf.read_bits(32)? as u32;
            let bytes = raw.to_be_bytes();
            let text = String::from_utf8_lossy(&bytes).into_owned();
            Ok(Value::FourCc(text))
        }),
        Descriptor::Real32 => Rc::new(|buf, _| {
            let bytes = buf.read_unaligned_bytes(4)?;
            let arr: [u8; 4] = bytes.try_into().expect("read_unaligned_bytes(4) returns 4 bytes");
            Ok(Value::Real32(f32::from_be_bytes(arr)))
        }),
        Descriptor::Real64 => Rc::new(|buf, _| {
            let bytes = buf.read_unaligned_bytes(8)?;
            let arr: [u8; 8] = bytes.try_into().expect("read_unaligned_bytes(8) returns 8 bytes");
            Ok(Value::Real64(f64::from_be_bytes(arr)))
        }),
        Descriptor::Array(bounds, elem) => Rc::new(move |buf, resolvers| {
            let len = (buf.read_bits(bounds.width as u32)? as i64 + bounds.offset).max(0) as usize;
            let mut out = Vec::with_capacity(len);
            for _ in 0..len {
                out.push(resolvers[elem](buf, resolvers)?);
            }
            Ok(Value::Array(out))
        }),
        Descriptor::Optional(inner) => Rc::new(move |buf, resolvers| {
            let present = buf.read_bits(1)? != 0;
            if present {
                Ok(Value::Optional(Some(Box::new(resolvers[inner](buf, resolvers)?))))
            } else {
                Ok(Value::Optional(None))
            }
        }),
        Descriptor::Choice { bounds, fields } => Rc::new(move |buf, resolvers| {
            let tag = buf.read_bits(bounds.width as u32)? as i64 + bounds.offset;
            let field = fields
                .get(&tag)
                .ok_or_else(|| Error::Corrupted(CorruptedReason::UnknownChoiceTag(tag)))?;
            let value = resolvers[field.type_id](buf, resolvers)?;
            Ok(Value::Choice(field.name.clone(), Box::new(value)))
        }),
        Descriptor::Struct(fields) => Rc::new(move |buf, resolvers| {
            // `__parent`, wherever it sits in the declared field list, is
            // decoded first and seeds the accumulator — matching the
            // original's `_struct`, which pulls `parent_func` out and always
            // invokes it before the other fields.
            let mut result = BTreeMap::new();
            if let Some(parent_field) = fields.iter().find(|f| f.name == PARENT_FIELD) {
                let value = resolvers[parent_field.type_id](buf, resolvers)?;
                if let Value::Struct(parent_map) = value {
                    result = parent_map;
                } else {
                    result.insert(PARENT_FIELD.to_string(), value);
                }
            }
            for field in &fields {
                if field.name == PARENT_FIELD {
                    continue;
                }
                let value = resolvers[field.type_id](buf, resolvers)?;
                result.insert(field.name.clone(), value);
            }
            Ok(Value::Struct(result))
        }),
        Descriptor::Null => Rc::new(|_, _| Ok(Value::Null)),
    }
}
