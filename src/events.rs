//! The event-stream driver: interleaves delta-encoded timestamps with
//! per-event payloads, yielding one `Event` at a time.

use std::collections::BTreeMap;

use crate::decode::Decoder;
use crate::error::{CorruptedReason, Error, Result};
use crate::schema::TypeId;
use crate::value::Value;

/// A decoded event: the struct fields the schema produced, plus the
/// bookkeeping fields every event carries (`_event`, `_eventid`,
/// `_gameloop`, and optionally `_userid`).
#[derive(Debug, Clone)]
pub struct Event {
    pub name: String,
    pub event_id: i64,
    pub gameloop: u32,
    pub user_id: Option<Value>,
    pub fields: BTreeMap<String, Value>,
}

/// Maps an event-id to the type-id of its struct descriptor and its name.
pub type EventTypeMap = BTreeMap<i64, (TypeId, String)>;

/// Lazily decodes successive events from `decoder`, maintaining a running
/// game-clock via delta-decoded timestamps.
///
/// `svaruint32_typeid` is the `choice`-wrapped varuint32 descriptor used
/// for the per-event gameloop delta; `userid_typeid` is consulted only
/// when `decode_user_id` is true.
pub struct EventStream<D: Decoder> {
    decoder: D,
    eventid_typeid: TypeId,
    svaruint32_typeid: TypeId,
    userid_typeid: Option<TypeId>,
    event_types: EventTypeMap,
    gameloop: u32,
    finished: bool,
}

impl<D: Decoder> EventStream<D> {
    pub fn new(
        decoder: D,
        eventid_typeid: TypeId,
        svaruint32_typeid: TypeId,
        userid_typeid: Option<TypeId>,
        event_types: EventTypeMap,
    ) -> Self {
        Self {
            decoder,
            eventid_typeid,
            svaruint32_typeid,
            userid_typeid,
            event_types,
            gameloop: 0,
            finished: false,
        }
    }

    fn decode_next(&mut self) -> Result<Event> {
        let delta = self
            .decoder
            .instance(self.svaruint32_typeid)?
            .choice_numeric_value();
        self.gameloop = self.gameloop.wrapping_add(delta as u32);

        let user_id = match self.userid_typeid {
            Some(type_id) => Some(self.decoder.instance(type_id)?),
            None => None,
        };

        let event_id = self
            .decoder
            .instance(self.eventid_typeid)?
            .as_i64()
            .ok_or_else(|| Error::Corrupted(CorruptedReason::UnknownEventId(0)))?;

        let (type_id, name) = self
            .event_types
            .get(&event_id)
            .cloned()
            .ok_or(Error::Corrupted(CorruptedReason::UnknownEventId(event_id)))?;

        let fields = self
            .decoder
            .instance(type_id)?
            .into_struct()
            .unwrap_or_default();

        // The next event begins on a byte boundary: mandatory, not
        // optional clean-up.
        self.decoder.byte_align();

        Ok(Event {
            name,
            event_id,
            gameloop: self.gameloop,
            user_id,
            fields,
        })
    }
}

impl<D: Decoder> Iterator for EventStream<D> {
    type Item = Result<Event>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished || self.decoder.done() {
            return None;
        }

        let result = self.decode_next();
        if result.is_err() {
            self.finished = true;
        }
        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitpacked::BitPackedDecoder;
    use crate::schema::{ChoiceField, Descriptor, IntBounds, Schema, StructField};
    use std::collections::BTreeMap as Map;

    fn svaruint32_schema_prefix() -> Vec<Descriptor> {
        // type 0: raw uint (varuint32's only variant); type 1: choice
        // wrapping it under tag 0, named "m_value" the way the real
        // protocol's svaruint32 wraps a single uint variant.
        let mut fields = Map::new();
        fields.insert(
            0,
            ChoiceField {
                name: "m_value".to_string(),
                type_id: 0,
            },
        );
        vec![
            Descriptor::Int(IntBounds::new(0, 8)),
            Descriptor::Choice {
                bounds: IntBounds::new(0, 8),
                fields,
            },
        ]
    }

    #[test]
    fn gameloop_accumulates_and_stream_terminates() {
        let mut descriptors = svaruint32_schema_prefix();
        let svaruint32_typeid = 1;
        // type 2: event-id int; type 3: event struct { a: int }.
        let eventid_typeid = descriptors.len();
        descriptors.push(Descriptor::Int(IntBounds::new(0, 8)));
        let event_struct_typeid = descriptors.len();
        descriptors.push(Descriptor::Struct(vec![StructField::new("a", 0, 0)]));
        let schema = Schema::new(descriptors);

        let mut event_types = EventTypeMap::new();
        event_types.insert(7, (event_struct_typeid, "SomeEvent".to_string()));

        // One event: delta tag=0 (choice), delta value=3; event-id=7; field a=9.
        let data = [0u8, 3, 7, 9];
        let decoder = BitPackedDecoder::new(&data, &schema);
        let mut stream = EventStream::new(
            decoder,
            eventid_typeid,
            svaruint32_typeid,
            None,
            event_types,
        );

        let event = stream.next().unwrap().unwrap();
        assert_eq!(event.gameloop, 3);
        assert_eq!(event.name, "SomeEvent");
        assert_eq!(event.event_id, 7);
        assert_eq!(event.fields.get("a"), Some(&Value::Int(9)));

        assert!(stream.next().is_none());
    }

    #[test]
    fn unknown_event_id_is_corrupted_and_stops_the_stream() {
        let mut descriptors = svaruint32_schema_prefix();
        let svaruint32_typeid = 1;
        let eventid_typeid = descriptors.len();
        descriptors.push(Descriptor::Int(IntBounds::new(0, 8)));
        let schema = Schema::new(descriptors);

        let data = [0u8, 0, 42];
        let decoder = BitPackedDecoder::new(&data, &schema);
        let mut stream = EventStream::new(
            decoder,
            eventid_typeid,
            svaruint32_typeid,
            None,
            EventTypeMap::new(),
        );

        assert!(matches!(stream.next(), Some(Err(Error::Corrupted(_)))));
        assert!(stream.next().is_none());
    }
}
