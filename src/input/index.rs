//! Stream files and their packet indexes.
//!
//! One [`StreamInput`] wraps one physical stream file. Packets are indexed
//! lazily: each call to [`StreamInput::index_next`] parses one packet
//! header + context and appends a [`PacketDescriptor`]; reads that walk
//! forward index as they go, and seeks index only as far as the target
//! timestamp requires.

use std::fs::File;
use std::path::{Path, PathBuf};

use crate::error::DecodeError;
use crate::event::decode::DefScope;
use crate::event::Definition;
use crate::input::bitbuffer::BitBuffer;
use crate::input::mapped::PacketMap;
use crate::trace::{CtfTrace, Stream, PACKET_MAGIC};

/// Upper bound mapped for parsing one packet's header + context.
const INDEX_MAP_BYTES: u64 = 64 * 1024;

/// Everything the readers need to know about one packet without decoding
/// its events.
#[derive(Clone, Debug)]
pub struct PacketDescriptor {
    /// Byte offset of the packet in the file.
    pub offset_bytes: u64,
    /// Bits of real content (headers, contexts, events).
    pub content_bits: u64,
    /// Total packet size in bits, padding included.
    pub packet_bits: u64,
    /// Bit offset, relative to the packet start, of the first event.
    pub payload_start_bits: u64,
    pub timestamp_begin: u64,
    pub timestamp_end: u64,
    /// Events lost before this packet, as a per-packet delta.
    pub lost_events: u64,
    pub cpu_id: Option<u32>,
    pub stream_id: Option<u64>,
    /// Decoded trace packet header, kept for decode-time references.
    pub header: Option<Definition>,
    /// Decoded stream packet context, likewise.
    pub context: Option<Definition>,
}

pub struct StreamInput {
    path: PathBuf,
    file: File,
    file_bytes: u64,
    /// Stream id bound by the first packet header.
    stream_id: Option<u64>,
    packets: Vec<PacketDescriptor>,
    /// File offset where the next unindexed packet starts.
    indexed_bytes: u64,
    fully_indexed: bool,
    /// Cumulative discarded-event counter from the previous packet.
    lost_so_far: u64,
}

impl StreamInput {
    pub fn open(path: &Path) -> Result<Self, DecodeError> {
        let file = File::open(path)?;
        let file_bytes = file.metadata()?.len();
        Ok(StreamInput {
            path: path.to_path_buf(),
            file,
            file_bytes,
            stream_id: None,
            packets: Vec::new(),
            indexed_bytes: 0,
            fully_indexed: file_bytes == 0,
            lost_so_far: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file(&self) -> &File {
        &self.file
    }

    pub fn file_bytes(&self) -> u64 {
        self.file_bytes
    }

    pub fn stream_id(&self) -> Option<u64> {
        self.stream_id
    }

    pub fn packet(&self, index: usize) -> Option<&PacketDescriptor> {
        self.packets.get(index)
    }

    pub fn packet_count(&self) -> usize {
        self.packets.len()
    }

    pub fn fully_indexed(&self) -> bool {
        self.fully_indexed
    }

    pub fn last_packet(&self) -> Option<&PacketDescriptor> {
        self.packets.last()
    }

    /// Re-check the file size. Live traces grow; a file that grew past the
    /// indexed region re-opens the index for lazy continuation.
    pub fn refresh(&mut self) -> Result<(), DecodeError> {
        let len = self.file.metadata()?.len();
        if len > self.file_bytes {
            self.file_bytes = len;
            self.fully_indexed = false;
        }
        Ok(())
    }

    /// Index packets until `index` exists or the file is exhausted.
    pub fn ensure_indexed(
        &mut self,
        trace: &CtfTrace,
        index: usize,
    ) -> Result<Option<&PacketDescriptor>, DecodeError> {
        while self.packets.len() <= index && !self.fully_indexed {
            if self.index_next(trace)?.is_none() {
                break;
            }
        }
        Ok(self.packets.get(index))
    }

    /// Index every remaining packet.
    pub fn index_all(&mut self, trace: &CtfTrace) -> Result<(), DecodeError> {
        while !self.fully_indexed {
            self.index_next(trace)?;
        }
        Ok(())
    }

    /// Parse the next packet's header and context and append its
    /// descriptor. Returns `None` at end of file.
    pub fn index_next(
        &mut self,
        trace: &CtfTrace,
    ) -> Result<Option<&PacketDescriptor>, DecodeError> {
        if self.indexed_bytes >= self.file_bytes {
            self.fully_indexed = true;
            return Ok(None);
        }
        let offset = self.indexed_bytes;
        let remaining_bits = (self.file_bytes - offset) * 8;

        let map = PacketMap::direct(&self.file, self.file_bytes, offset, INDEX_MAP_BYTES)?;
        let slice = map.slice();
        let mut buf = BitBuffer::new(slice);

        // Trace packet header: magic, uuid, stream id.
        let mut header_def = None;
        let mut stream_id = None;
        if let Some(header_decl) = &trace.packet_header {
            let def = header_decl.read(&mut buf, &DefScope::default(), None)?;
            if let Some(s) = def.as_struct() {
                if let Some(magic) = s.field("magic").and_then(Definition::as_u64) {
                    if magic != PACKET_MAGIC as u64 {
                        return Err(DecodeError::BadMagic {
                            offset,
                            magic: magic as u32,
                        });
                    }
                }
                if let (Some(expected), Some(Definition::Array(got))) =
                    (trace.uuid, s.field("uuid"))
                {
                    let bytes: Vec<u8> = got
                        .elements
                        .iter()
                        .filter_map(|e| e.as_u64().map(|v| v as u8))
                        .collect();
                    if bytes.as_slice() != expected.as_bytes() {
                        return Err(DecodeError::UuidMismatch { offset });
                    }
                }
                stream_id = s.field("stream_id").and_then(Definition::as_u64);
            }
            header_def = Some(def);
        }
        if self.stream_id.is_none() {
            self.stream_id = stream_id;
        }

        let stream = lookup_stream(trace, stream_id.or(self.stream_id))?;

        // Stream packet context: sizes, timestamps, loss counter, cpu.
        let mut context_def = None;
        if let Some(context_decl) = &stream.packet_context {
            let scope = DefScope {
                packet_header: header_def.as_ref(),
                ..Default::default()
            };
            context_def = Some(context_decl.read(&mut buf, &scope, None)?);
        }
        let payload_start_bits = buf.position();

        let ctx = context_def.as_ref().and_then(Definition::as_struct);
        let ctx_u64 = |name: &str| ctx.and_then(|s| s.field(name)).and_then(Definition::as_u64);

        let (content_bits, packet_bits) = match (ctx_u64("content_size"), ctx_u64("packet_size")) {
            (Some(c), Some(p)) => (c, p),
            (Some(c), None) => (c, c),
            (None, Some(p)) => (p, p),
            (None, None) => (remaining_bits, remaining_bits),
        };
        if content_bits > packet_bits || packet_bits > remaining_bits {
            return Err(DecodeError::TruncatedPacket {
                offset,
                packet_bits,
            });
        }
        if content_bits < payload_start_bits {
            return Err(DecodeError::TruncatedPacket {
                offset,
                packet_bits: content_bits,
            });
        }

        let cumulative_lost = ctx_u64("events_discarded").unwrap_or(self.lost_so_far);
        let lost_events = cumulative_lost.saturating_sub(self.lost_so_far);
        self.lost_so_far = cumulative_lost;

        let descriptor = PacketDescriptor {
            offset_bytes: offset,
            content_bits,
            packet_bits,
            payload_start_bits,
            timestamp_begin: ctx_u64("timestamp_begin").unwrap_or(0),
            timestamp_end: ctx_u64("timestamp_end").unwrap_or(u64::MAX),
            lost_events,
            cpu_id: ctx_u64("cpu_id").map(|v| v as u32),
            stream_id: stream_id.or(self.stream_id),
            header: header_def,
            context: context_def,
        };
        self.packets.push(descriptor);
        self.indexed_bytes = offset + packet_bits.div_ceil(8);
        if self.indexed_bytes >= self.file_bytes {
            self.fully_indexed = true;
        }
        Ok(self.packets.last())
    }

    /// Index of the last known packet whose begin timestamp is at or
    /// before `timestamp`. Assumes callers have indexed far enough.
    pub fn search_packet(&self, timestamp: u64) -> Option<usize> {
        let n = self
            .packets
            .partition_point(|p| p.timestamp_begin <= timestamp);
        n.checked_sub(1)
    }
}

fn lookup_stream<'t>(
    trace: &'t CtfTrace,
    stream_id: Option<u64>,
) -> Result<&'t Stream, DecodeError> {
    trace
        .stream(stream_id)
        .ok_or_else(|| DecodeError::UnresolvedReference {
            path: format!("stream {stream_id:?}"),
        })
}
