//! Per-packet event decoding.
//!
//! A [`PacketReader`] owns the mapped region for one packet and decodes
//! its events front to back: stream event header (fast composite form or
//! generic struct), stream event context, per-event context, payload.
//! It also reconstructs full timestamps from truncated clock fields and
//! synthesizes the packet's lost-event pseudo-event.

use std::collections::BTreeMap;
use std::fs::File;
use std::sync::Arc;

use crate::error::DecodeError;
use crate::event::decode::DefScope;
use crate::event::{Definition, EventDefinition, LostEventInfo};
use crate::input::bitbuffer::BitBuffer;
use crate::input::index::PacketDescriptor;
use crate::input::mapped::PacketMap;
use crate::options::ReaderOptions;
use crate::trace::{EventDeclaration, Stream};

/// Name of the synthesized pseudo-event emitted for discarded events.
pub const LOST_EVENT_NAME: &str = "Lost event";

/// Reconstruct a full timestamp from a truncated clock value.
///
/// The high bits of the previous timestamp are preserved and the new low
/// bits substituted; a new value below the previous low bits means the
/// counter wrapped, adding one full period of the truncated width.
pub fn calculate_timestamp(last: u64, value: u64, bits: u32) -> u64 {
    if bits >= 64 {
        return value;
    }
    let mask = (1u64 << bits) - 1;
    let high = last & !mask;
    let low_last = last & mask;
    if (value & mask) < low_last {
        high.wrapping_add(mask + 1) | (value & mask)
    } else {
        high | (value & mask)
    }
}

/// Id and timestamp extracted from a decoded event header.
struct HeaderInfo {
    id: Option<u64>,
    timestamp: Option<(u64, u32)>,
}

/// Pull id and timestamp out of a generic struct-form event header. A
/// nested variant's active field may override both, which is how tagged
/// union header shapes carry their extended forms.
fn header_info(def: &Definition) -> HeaderInfo {
    let mut info = HeaderInfo {
        id: None,
        timestamp: None,
    };
    match def {
        Definition::EventHeader(h) => {
            info.id = Some(h.id);
            info.timestamp = Some((h.timestamp, h.timestamp_bits));
        }
        Definition::Struct(s) => {
            info.id = s.field("id").and_then(Definition::as_u64);
            if let Some(Definition::Integer { value, length }) = s.field("timestamp") {
                info.timestamp = Some((value.to_u64(), *length));
            }
            if let Some(Definition::Variant(v)) = s.field("v") {
                if let Some(inner) = v.value.as_struct() {
                    if let Some(id) = inner.field("id").and_then(Definition::as_u64) {
                        info.id = Some(id);
                    }
                    if let Some(Definition::Integer { value, length }) = inner.field("timestamp") {
                        info.timestamp = Some((value.to_u64(), *length));
                    }
                }
            }
        }
        _ => {}
    }
    info
}

pub struct PacketReader<'t> {
    stream: &'t Stream,
    descriptor: PacketDescriptor,
    map: PacketMap,
    /// Cursor in bits, relative to the packet start.
    cursor_bits: u64,
    /// Last full 64-bit timestamp seen in this stream.
    last_timestamp: u64,
    /// One lost-event pseudo-event still owed before real events.
    lost_pending: bool,
    /// End timestamp of the previous packet, for the lost-event duration.
    prev_packet_end: Option<u64>,
}

impl<'t> PacketReader<'t> {
    pub fn new(
        stream: &'t Stream,
        file: &File,
        file_bytes: u64,
        descriptor: PacketDescriptor,
        options: &ReaderOptions,
        prev_packet_end: Option<u64>,
    ) -> Result<Self, DecodeError> {
        let map = PacketMap::new(
            file,
            file_bytes,
            descriptor.offset_bytes,
            descriptor.packet_bits.div_ceil(8),
            options,
        )?;
        Ok(PacketReader {
            stream,
            cursor_bits: descriptor.payload_start_bits,
            last_timestamp: descriptor.timestamp_begin,
            lost_pending: descriptor.lost_events > 0,
            prev_packet_end,
            descriptor,
            map,
        })
    }

    pub fn descriptor(&self) -> &PacketDescriptor {
        &self.descriptor
    }

    pub fn cpu_id(&self) -> Option<u32> {
        self.descriptor.cpu_id
    }

    pub fn last_timestamp(&self) -> u64 {
        self.last_timestamp
    }

    pub fn has_more_events(&self) -> bool {
        self.lost_pending || self.cursor_bits < self.descriptor.content_bits
    }

    /// Decode the next event in this packet.
    pub fn read_event(&mut self, file: &File) -> Result<EventDefinition, DecodeError> {
        if self.lost_pending {
            self.lost_pending = false;
            return Ok(self.synthesize_lost_event());
        }

        self.map.ensure_covers(file, self.cursor_bits)?;
        let window_start = self.map.window_start_bits();
        let slice = self.map.slice();
        let limit = (self.descriptor.content_bits - window_start).min(slice.len() as u64 * 8);
        let mut buf = BitBuffer::with_limit(slice, limit);
        buf.set_position(self.cursor_bits - window_start)?;
        let start_bits = buf.position();

        // Stream event header.
        let mut header_def = None;
        let mut id = None;
        let mut raw_timestamp = None;
        if let Some(header_decl) = &self.stream.event_header {
            let scope = DefScope {
                packet_header: self.descriptor.header.as_ref(),
                packet_context: self.descriptor.context.as_ref(),
                ..Default::default()
            };
            let def = header_decl.read(&mut buf, &scope, None)?;
            let info = header_info(&def);
            id = info.id;
            raw_timestamp = info.timestamp;
            header_def = Some(def);
        }

        let timestamp = match raw_timestamp {
            Some((value, bits)) => {
                let ts = calculate_timestamp(self.last_timestamp, value, bits);
                self.last_timestamp = ts;
                ts
            }
            None => self.last_timestamp,
        };

        let declaration = self
            .stream
            .event(id)
            .cloned()
            .ok_or(DecodeError::UnknownEventId {
                id: id.unwrap_or(0),
            })?;

        // Stream event context, then per-event context, then payload.
        let mut scope = DefScope {
            packet_header: self.descriptor.header.as_ref(),
            packet_context: self.descriptor.context.as_ref(),
            event_header: header_def.as_ref(),
            ..Default::default()
        };
        let stream_context = match &self.stream.event_context {
            Some(decl) => Some(decl.read(&mut buf, &scope, None)?),
            None => None,
        };
        scope.stream_event_context = stream_context.as_ref();
        let context = match &declaration.context {
            Some(decl) => Some(decl.read(&mut buf, &scope, None)?),
            None => None,
        };
        scope.event_context = context.as_ref();
        let fields = match &declaration.fields {
            Some(decl) => Some(decl.read(&mut buf, &scope, None)?),
            None => None,
        };

        let consumed = buf.position() - start_bits;
        if consumed == 0 {
            return Err(DecodeError::EmptyEvent {
                offset_bits: self.cursor_bits,
            });
        }
        self.cursor_bits += consumed;

        Ok(EventDefinition {
            declaration,
            timestamp,
            cpu: self.descriptor.cpu_id,
            event_header: header_def,
            stream_context,
            context,
            fields,
            lost: None,
        })
    }

    /// The lost-event pseudo-event: emitted once, before any real event of
    /// a packet whose context reported discarded events.
    fn synthesize_lost_event(&mut self) -> EventDefinition {
        let begin = self.descriptor.timestamp_begin;
        let duration = match self.prev_packet_end {
            Some(prev_end) => begin.saturating_sub(prev_end),
            None => begin.saturating_add(1),
        };
        let declaration = Arc::new(EventDeclaration {
            name: LOST_EVENT_NAME.to_string(),
            id: None,
            stream_id: self.stream.id,
            log_level: None,
            context: None,
            fields: None,
            attributes: BTreeMap::new(),
        });
        EventDefinition {
            declaration,
            timestamp: begin,
            cpu: self.descriptor.cpu_id,
            event_header: None,
            stream_context: None,
            context: None,
            fields: None,
            lost: Some(LostEventInfo {
                count: self.descriptor.lost_events,
                duration,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_full_width_taken_verbatim() {
        assert_eq!(calculate_timestamp(999, 0x1234, 64), 0x1234);
    }

    #[test]
    fn test_timestamp_substitutes_low_bits() {
        // New low bits above the previous low bits: no wrap.
        assert_eq!(
            calculate_timestamp(0x1_0000_0010, 0x20, 32),
            0x1_0000_0020
        );
    }

    #[test]
    fn test_timestamp_wrap_correction() {
        // New value below the old low bits means the counter wrapped.
        assert_eq!(
            calculate_timestamp(0x1_FFFF_FFFF, 0x0000_0010, 32),
            0x2_0000_0010
        );
    }

    #[test]
    fn test_timestamp_wrap_27_bit() {
        let last = (5u64 << 27) | 0x7FF_FFFF;
        let got = calculate_timestamp(last, 3, 27);
        assert_eq!(got, (6u64 << 27) | 3);
    }
}
