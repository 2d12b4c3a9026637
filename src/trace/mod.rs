//! Trace-level data model: the output of metadata parsing.
//!
//! A [`CtfTrace`] aggregates everything the metadata declared: byte order,
//! UUID, version, the packet-header layout, streams with their per-stream
//! layouts, event declarations, clocks, environment and callsites. It is
//! mutated only while the metadata parser runs and is read-only afterward;
//! the readers in [`crate::input`] borrow it immutably.

pub mod summary;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use uuid::Uuid;

use crate::decl::{ByteOrder, Declaration};
use crate::error::MetadataError;
use crate::metadata::scope::ScopeArena;

pub use summary::TraceSummary;

/// Magic number opening every stream packet header.
pub const PACKET_MAGIC: u32 = 0xC1FC1FC1;

/// A clock declared in the metadata.
///
/// `freq` is in Hz; `offset` is in clock cycles and `offset_s` in whole
/// seconds, both added to every timestamp read against this clock.
#[derive(Clone, Debug)]
pub struct Clock {
    pub name: String,
    pub uuid: Option<Uuid>,
    pub description: Option<String>,
    pub freq: u64,
    pub offset: u64,
    pub offset_s: u64,
    pub precision: u64,
    pub absolute: bool,
}

impl Clock {
    pub fn new(name: &str) -> Self {
        Clock {
            name: name.to_string(),
            uuid: None,
            description: None,
            freq: 1_000_000_000,
            offset: 0,
            offset_s: 0,
            precision: 0,
            absolute: false,
        }
    }

    /// Convert a cycle count to nanoseconds since the clock origin.
    /// A 1 GHz clock is the common case and converts without scaling.
    pub fn cycles_to_ns(&self, cycles: u64) -> u64 {
        let base = self.offset_s.saturating_mul(1_000_000_000);
        let cycles = cycles.saturating_add(self.offset);
        if self.freq == 1_000_000_000 {
            base.saturating_add(cycles)
        } else {
            let scaled = cycles as u128 * 1_000_000_000 / self.freq as u128;
            base.saturating_add(scaled.min(u64::MAX as u128) as u64)
        }
    }
}

/// A callsite record (`callsite` block).
#[derive(Clone, Debug, Default)]
pub struct Callsite {
    pub name: Option<String>,
    pub func: Option<String>,
    pub file: Option<String>,
    pub line: Option<u64>,
    pub ip: Option<u64>,
}

/// One event type within a stream.
#[derive(Debug)]
pub struct EventDeclaration {
    pub name: String,
    pub id: Option<u64>,
    pub stream_id: Option<u64>,
    pub log_level: Option<i64>,
    /// Per-event context struct, decoded between the stream event context
    /// and the fields.
    pub context: Option<Arc<Declaration>>,
    /// The event's payload struct.
    pub fields: Option<Arc<Declaration>>,
    /// Free-form `key = "value"` attributes the metadata carried that the
    /// reader does not interpret.
    pub attributes: BTreeMap<String, String>,
}

/// One declared stream: the layouts shared by every packet and event in
/// the stream's files.
#[derive(Debug, Default)]
pub struct Stream {
    pub id: Option<u64>,
    pub event_header: Option<Arc<Declaration>>,
    pub event_context: Option<Arc<Declaration>>,
    pub packet_context: Option<Arc<Declaration>>,
    pub byte_order: Option<ByteOrder>,
    events: HashMap<u64, Arc<EventDeclaration>>,
    unset_id_event: Option<Arc<EventDeclaration>>,
}

impl Stream {
    pub fn new(id: Option<u64>) -> Self {
        Stream {
            id,
            ..Default::default()
        }
    }

    /// Register an event declaration under its id.
    ///
    /// An event with no id is only legal as the stream's single event.
    pub fn add_event(&mut self, event: EventDeclaration) -> Result<(), MetadataError> {
        match event.id {
            Some(id) => {
                if self.unset_id_event.is_some() {
                    return Err(MetadataError::InvalidAttribute {
                        attribute: "event id".to_string(),
                        message: "stream mixes events with and without ids".to_string(),
                    });
                }
                if self.events.contains_key(&id) {
                    return Err(MetadataError::DuplicateDeclaration {
                        name: format!("event id {id}"),
                    });
                }
                self.events.insert(id, Arc::new(event));
            }
            None => {
                if self.unset_id_event.is_some() || !self.events.is_empty() {
                    return Err(MetadataError::InvalidAttribute {
                        attribute: "event id".to_string(),
                        message: "an event without an id must be the stream's only event"
                            .to_string(),
                    });
                }
                self.unset_id_event = Some(Arc::new(event));
            }
        }
        Ok(())
    }

    /// Look up an event by the id the header produced. `None` matches the
    /// stream's single event, numbered or not.
    pub fn event(&self, id: Option<u64>) -> Option<&Arc<EventDeclaration>> {
        match id {
            Some(id) => self.events.get(&id).or_else(|| {
                self.unset_id_event.as_ref().filter(|_| id == 0)
            }),
            None => self.unset_id_event.as_ref().or_else(|| {
                if self.events.len() == 1 {
                    self.events.values().next()
                } else {
                    None
                }
            }),
        }
    }

    pub fn events(&self) -> impl Iterator<Item = &Arc<EventDeclaration>> {
        self.events.values().chain(self.unset_id_event.iter())
    }

    pub fn event_count(&self) -> usize {
        self.events.len() + usize::from(self.unset_id_event.is_some())
    }
}

/// The top-level aggregate a metadata parse produces.
#[derive(Debug, Default)]
pub struct CtfTrace {
    pub major: Option<u64>,
    pub minor: Option<u64>,
    pub uuid: Option<Uuid>,
    byte_order: Option<ByteOrder>,
    pub packet_header: Option<Arc<Declaration>>,
    streams: Vec<Stream>,
    pub clocks: HashMap<String, Clock>,
    pub environment: BTreeMap<String, String>,
    pub callsites: Vec<Callsite>,
}

impl CtfTrace {
    pub fn new() -> Self {
        CtfTrace::default()
    }

    /// The trace byte order, defaulting to host order until the metadata
    /// sets it.
    pub fn byte_order(&self) -> ByteOrder {
        self.byte_order.unwrap_or_else(ByteOrder::host)
    }

    pub fn byte_order_set(&self) -> Option<ByteOrder> {
        self.byte_order
    }

    /// Set the trace byte order. The first call repairs every
    /// already-registered native-order declaration; a later call with a
    /// different value fails, citing both.
    pub fn set_byte_order(
        &mut self,
        order: ByteOrder,
        scopes: &mut ScopeArena,
    ) -> Result<(), MetadataError> {
        match self.byte_order {
            None => {
                self.byte_order = Some(order);
                scopes.repair_byte_order(order);
                if let Some(header) = &self.packet_header {
                    if let Some(fixed) = header.repaired(order) {
                        self.packet_header = Some(Arc::new(fixed));
                    }
                }
                Ok(())
            }
            Some(current) if current == order => Ok(()),
            Some(current) => Err(MetadataError::ByteOrderMismatch {
                current: current.to_string(),
                requested: order.to_string(),
            }),
        }
    }

    /// Add a stream, enforcing id uniqueness and the single-unnumbered
    /// stream rule.
    pub fn add_stream(&mut self, stream: Stream) -> Result<(), MetadataError> {
        match stream.id {
            Some(id) => {
                if self.streams.iter().any(|s| s.id == Some(id)) {
                    return Err(MetadataError::DuplicateDeclaration {
                        name: format!("stream id {id}"),
                    });
                }
                if self.streams.iter().any(|s| s.id.is_none()) {
                    return Err(MetadataError::InvalidAttribute {
                        attribute: "stream id".to_string(),
                        message: "trace mixes streams with and without ids".to_string(),
                    });
                }
            }
            None => {
                if !self.streams.is_empty() {
                    return Err(MetadataError::InvalidAttribute {
                        attribute: "stream id".to_string(),
                        message: "a stream without an id must be the trace's only stream"
                            .to_string(),
                    });
                }
            }
        }
        self.streams.push(stream);
        Ok(())
    }

    pub fn stream(&self, id: Option<u64>) -> Option<&Stream> {
        match id {
            Some(id) => self
                .streams
                .iter()
                .find(|s| s.id == Some(id))
                .or_else(|| self.single_stream()),
            None => self.single_stream(),
        }
    }

    pub fn stream_mut(&mut self, id: Option<u64>) -> Option<&mut Stream> {
        if let Some(id) = id {
            if let Some(pos) = self.streams.iter().position(|s| s.id == Some(id)) {
                return Some(&mut self.streams[pos]);
            }
        }
        if self.streams.len() == 1 {
            self.streams.first_mut()
        } else {
            None
        }
    }

    fn single_stream(&self) -> Option<&Stream> {
        if self.streams.len() == 1 {
            self.streams.first()
        } else {
            None
        }
    }

    pub fn streams(&self) -> impl Iterator<Item = &Stream> {
        self.streams.iter()
    }

    pub fn stream_count(&self) -> usize {
        self.streams.len()
    }

    /// Every event declaration across every stream, for consumers that
    /// enumerate the schema.
    pub fn event_declarations(&self) -> impl Iterator<Item = &Arc<EventDeclaration>> {
        self.streams.iter().flat_map(|s| s.events())
    }

    pub fn clock(&self, name: &str) -> Option<&Clock> {
        self.clocks.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(name: &str, id: Option<u64>) -> EventDeclaration {
        EventDeclaration {
            name: name.to_string(),
            id,
            stream_id: None,
            log_level: None,
            context: None,
            fields: None,
            attributes: BTreeMap::new(),
        }
    }

    #[test]
    fn test_clock_identity_at_1ghz() {
        let c = Clock::new("monotonic");
        assert_eq!(c.cycles_to_ns(12345), 12345);
    }

    #[test]
    fn test_clock_offsets_and_scaling() {
        let mut c = Clock::new("slow");
        c.freq = 500_000_000;
        c.offset = 10;
        assert_eq!(c.cycles_to_ns(40), 100);
        let mut c = Clock::new("offset_s");
        c.offset_s = 2;
        assert_eq!(c.cycles_to_ns(5), 2_000_000_005);
    }

    #[test]
    fn test_stream_event_id_rules() {
        let mut s = Stream::new(Some(0));
        s.add_event(event("a", Some(1))).unwrap();
        assert!(s.add_event(event("b", Some(1))).is_err());
        assert!(s.add_event(event("c", None)).is_err());

        let mut s = Stream::new(Some(0));
        s.add_event(event("only", None)).unwrap();
        assert!(s.add_event(event("more", Some(2))).is_err());
        assert_eq!(s.event(None).unwrap().name, "only");
        assert_eq!(s.event(Some(0)).unwrap().name, "only");
    }

    #[test]
    fn test_single_numbered_event_matches_none_id() {
        let mut s = Stream::new(Some(0));
        s.add_event(event("only", Some(7))).unwrap();
        assert_eq!(s.event(None).unwrap().name, "only");
        assert_eq!(s.event(Some(7)).unwrap().name, "only");
        assert!(s.event(Some(8)).is_none());
    }

    #[test]
    fn test_stream_id_rules() {
        let mut t = CtfTrace::new();
        t.add_stream(Stream::new(None)).unwrap();
        assert!(t.add_stream(Stream::new(Some(1))).is_err());

        let mut t = CtfTrace::new();
        t.add_stream(Stream::new(Some(0))).unwrap();
        t.add_stream(Stream::new(Some(1))).unwrap();
        assert!(t.add_stream(Stream::new(Some(1))).is_err());
        assert!(t.add_stream(Stream::new(None)).is_err());
    }

    #[test]
    fn test_byte_order_conflict() {
        let mut t = CtfTrace::new();
        let mut scopes = ScopeArena::new();
        t.set_byte_order(ByteOrder::Big, &mut scopes).unwrap();
        assert!(t.set_byte_order(ByteOrder::Big, &mut scopes).is_ok());
        assert!(t.set_byte_order(ByteOrder::Little, &mut scopes).is_err());
    }
}
