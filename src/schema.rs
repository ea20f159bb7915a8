//! The schema model: a closed set of type descriptors, addressed by index.
//!
//! A `Schema` is an ordered table of `Descriptor`s; composite descriptors
//! reference other descriptors by `TypeId`. Mirrors the teacher's
//! `parser::vlc::{Entry, Table}` — a tagged-variant table walked by index —
//! generalized from a binary fork/end tree to the richer descriptor shapes
//! this protocol needs.

/// An index into a `Schema`'s descriptor table.
pub type TypeId = usize;

/// The inclusive lower bound and bit width used to decode a length-prefixed
/// or tag-prefixed field in the bit-packed wire: `offset + read_bits(width)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntBounds {
    pub offset: i64,
    pub width: u8,
}

impl IntBounds {
    pub fn new(offset: i64, width: u8) -> Self {
        Self { offset, width }
    }
}

/// One field of a `struct` descriptor: name, referenced type, and the wire
/// tag used to match it in the versioned decoder.
#[derive(Debug, Clone)]
pub struct StructField {
    pub name: String,
    pub type_id: TypeId,
    pub tag: i64,
}

impl StructField {
    pub fn new(name: impl Into<String>, type_id: TypeId, tag: i64) -> Self {
        Self {
            name: name.into(),
            type_id,
            tag,
        }
    }
}

/// One field of a `choice` descriptor: the variant name and its type,
/// addressed by the choice's wire tag.
#[derive(Debug, Clone)]
pub struct ChoiceField {
    pub name: String,
    pub type_id: TypeId,
}

/// A type descriptor, as described in the schema model. Every schema is a
/// `Vec<Descriptor>` indexed by `TypeId`.
#[derive(Debug, Clone)]
pub enum Descriptor {
    Int(IntBounds),
    Bool,
    Blob(IntBounds),
    BitArray(IntBounds),
    FourCc,
    Real32,
    Real64,
    Array(IntBounds, TypeId),
    Optional(TypeId),
    Choice {
        bounds: IntBounds,
        fields: std::collections::BTreeMap<i64, ChoiceField>,
    },
    Struct(Vec<StructField>),
    Null,
}

/// An ordered table of descriptors for one protocol build.
///
/// The bit-packed decoder requires every descriptor to reference only
/// type-ids strictly less than its own index at load time, since it binds
/// resolvers eagerly in table order (see `bitpacked::BitPackedDecoder`).
/// The versioned decoder does not need this invariant, since it resolves
/// type-ids lazily on every `instance` call.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    descriptors: Vec<Descriptor>,
}

impl Schema {
    pub fn new(descriptors: Vec<Descriptor>) -> Self {
        Self { descriptors }
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    pub fn get(&self, type_id: TypeId) -> Option<&Descriptor> {
        self.descriptors.get(type_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (TypeId, &Descriptor)> {
        self.descriptors.iter().enumerate()
    }

    /// Returns `true` if every composite descriptor only references
    /// type-ids strictly smaller than its own index, as the bit-packed
    /// decoder's eager resolver binding requires.
    pub fn is_backward_referencing(&self) -> bool {
        for (id, descriptor) in self.iter() {
            let references_forward = match descriptor {
                Descriptor::Array(_, elem) | Descriptor::Optional(elem) => *elem >= id,
                Descriptor::Choice { fields, .. } => {
                    fields.values().any(|f| f.type_id >= id)
                }
                Descriptor::Struct(fields) => fields.iter().any(|f| f.type_id >= id),
                _ => false,
            };
            if references_forward {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backward_reference_check() {
        let schema = Schema::new(vec![
            Descriptor::Bool,
            Descriptor::Array(IntBounds::new(0, 8), 0),
        ]);
        assert!(schema.is_backward_referencing());

        let forward = Schema::new(vec![Descriptor::Array(IntBounds::new(0, 8), 1), Descriptor::Bool]);
        assert!(!forward.is_backward_referencing());
    }
}
