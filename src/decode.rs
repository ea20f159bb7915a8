//! The common interface shared by both structural decoders.

use crate::error::Result;
use crate::schema::TypeId;
use crate::value::Value;

/// Either decoder, bound to one byte source and queried by type-id.
///
/// A decoder is constructed once per sub-stream. Its buffer advances
/// monotonically, but a single constructed decoder may be queried
/// repeatedly — either to stream events (`events::events`) or to extract a
/// single root value (the facade's one-shot entry points).
pub trait Decoder {
    fn instance(&mut self, type_id: TypeId) -> Result<Value>;
    fn byte_align(&mut self);
    fn done(&mut self) -> bool;
}

impl<'a> Decoder for crate::bitpacked::BitPackedDecoder<'a> {
    fn instance(&mut self, type_id: TypeId) -> Result<Value> {
        crate::bitpacked::BitPackedDecoder::instance(self, type_id)
    }
    fn byte_align(&mut self) {
        crate::bitpacked::BitPackedDecoder::byte_align(self)
    }
    fn done(&mut self) -> bool {
        crate::bitpacked::BitPackedDecoder::done(self)
    }
}

impl<'a> Decoder for crate::versioned::VersionedDecoder<'a> {
    fn instance(&mut self, type_id: TypeId) -> Result<Value> {
        crate::versioned::VersionedDecoder::instance(self, type_id)
    }
    fn byte_align(&mut self) {
        crate::versioned::VersionedDecoder::byte_align(self)
    }
    fn done(&mut self) -> bool {
        crate::versioned::VersionedDecoder::done(self)
    }
}
