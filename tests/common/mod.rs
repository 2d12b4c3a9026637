//! Shared helpers for the integration tests: a bit-level writer and a
//! synthetic CTF trace builder.
//!
//! The builder emits a small LTTng-flavoured trace: a packet header with
//! magic/uuid/stream_id, a packet context with sizes, timestamps, a
//! discarded-event counter and a cpu id, and a few event types exercising
//! integers, strings and length-prefixed sequences.

#![allow(dead_code)]

use std::fs;
use std::path::Path;

/// The trace UUID used by every fixture, as text and as bytes.
pub const TRACE_UUID: &str = "2a6422d0-6cee-11e0-8c08-cb07d7b3a564";
pub const TRACE_UUID_BYTES: [u8; 16] = [
    0x2a, 0x64, 0x22, 0xd0, 0x6c, 0xee, 0x11, 0xe0, 0x8c, 0x08, 0xcb, 0x07, 0xd7, 0xb3, 0xa5,
    0x64,
];

/// Bit-granularity writer mirroring the reader's packing conventions:
/// little-endian fills each byte LSB first, big-endian MSB first.
#[derive(Default)]
pub struct BitWriter {
    bytes: Vec<u8>,
    bit_pos: u64,
}

impl BitWriter {
    pub fn new() -> Self {
        BitWriter::default()
    }

    pub fn position(&self) -> u64 {
        self.bit_pos
    }

    pub fn align(&mut self, bits: u64) {
        if bits > 1 {
            let rem = self.bit_pos % bits;
            if rem != 0 {
                self.bit_pos += bits - rem;
            }
        }
    }

    fn set_bit(&mut self, bit_index: u64, set: bool) {
        let byte = (bit_index / 8) as usize;
        if byte >= self.bytes.len() {
            self.bytes.resize(byte + 1, 0);
        }
        if set {
            self.bytes[byte] |= 1 << (bit_index % 8);
        }
    }

    fn set_bit_msb(&mut self, bit_index: u64, set: bool) {
        let byte = (bit_index / 8) as usize;
        if byte >= self.bytes.len() {
            self.bytes.resize(byte + 1, 0);
        }
        if set {
            self.bytes[byte] |= 1 << (7 - bit_index % 8);
        }
    }

    pub fn write_bits_le(&mut self, value: u64, len: u32) {
        for i in 0..len as u64 {
            let bit = (value >> i) & 1 == 1;
            self.set_bit(self.bit_pos + i, bit);
        }
        self.bit_pos += len as u64;
    }

    pub fn write_bits_be(&mut self, value: u64, len: u32) {
        for i in 0..len as u64 {
            let bit = (value >> (len as u64 - 1 - i)) & 1 == 1;
            self.set_bit_msb(self.bit_pos + i, bit);
        }
        self.bit_pos += len as u64;
    }

    pub fn write_bytes(&mut self, data: &[u8]) {
        self.align(8);
        for &b in data {
            self.write_bits_le(b as u64, 8);
        }
    }

    /// Pad with zero bits up to `bits` total and return the buffer.
    pub fn into_bytes_padded(mut self, bits: u64) -> Vec<u8> {
        assert!(bits >= self.bit_pos && bits % 8 == 0);
        self.bytes.resize((bits / 8) as usize, 0);
        self.bytes
    }

    pub fn into_bytes(mut self) -> Vec<u8> {
        let len = self.bit_pos.div_ceil(8) as usize;
        self.bytes.resize(len, 0);
        self.bytes
    }
}

/// One event to encode into a packet of the standard fixture.
pub enum EventSpec {
    /// id 1: `{ uint32_t value; }`
    Alpha { ts: u64, value: u32 },
    /// id 2: `{ string msg; }`
    Msg { ts: u64, msg: String },
    /// id 3: `{ uint32_t len; uint8_t data[len]; }`
    Seq { ts: u64, data: Vec<u8> },
}

impl EventSpec {
    pub fn ts(&self) -> u64 {
        match self {
            EventSpec::Alpha { ts, .. } | EventSpec::Msg { ts, .. } | EventSpec::Seq { ts, .. } => {
                *ts
            }
        }
    }
}

/// One packet of the standard fixture.
pub struct PacketSpec {
    pub stream_id: u32,
    pub cpu_id: u32,
    pub ts_begin: u64,
    pub ts_end: u64,
    /// Cumulative discarded-event counter, as tracers write it.
    pub discarded: u64,
    pub events: Vec<EventSpec>,
    /// Pad the packet out to this many bytes (0 = no padding).
    pub pad_to_bytes: usize,
}

impl PacketSpec {
    pub fn new(stream_id: u32, cpu_id: u32, ts_begin: u64, ts_end: u64) -> Self {
        PacketSpec {
            stream_id,
            cpu_id,
            ts_begin,
            ts_end,
            discarded: 0,
            events: Vec::new(),
            pad_to_bytes: 0,
        }
    }
}

/// TSDL text for the standard fixture. `byte_order` is `le` or `be`.
pub fn standard_metadata(byte_order: &str) -> String {
    format!(
        r#"/* synthetic trace for reader tests */
typealias integer {{ size = 8; align = 8; signed = false; }} := uint8_t;
typealias integer {{ size = 16; align = 8; signed = false; }} := uint16_t;
typealias integer {{ size = 32; align = 8; signed = false; }} := uint32_t;
typealias integer {{ size = 64; align = 8; signed = false; }} := uint64_t;

trace {{
    major = 1;
    minor = 8;
    uuid = "{TRACE_UUID}";
    byte_order = {byte_order};
    packet.header := struct {{
        uint32_t magic;
        uint8_t  uuid[16];
        uint32_t stream_id;
    }};
}};

clock {{
    name = monotonic;
    freq = 1000000000;
}};

stream {{
    id = 0;
    event.header := struct {{
        uint16_t id;
        uint64_t timestamp;
    }};
    packet.context := struct {{
        uint64_t content_size;
        uint64_t packet_size;
        uint64_t timestamp_begin;
        uint64_t timestamp_end;
        uint64_t events_discarded;
        uint32_t cpu_id;
    }};
}};

event {{
    name = "alpha";
    id = 1;
    stream_id = 0;
    fields := struct {{ uint32_t value; }};
}};

event {{
    name = "msg";
    id = 2;
    stream_id = 0;
    fields := struct {{ string msg; }};
}};

event {{
    name = "seq";
    id = 3;
    stream_id = 0;
    fields := struct {{ uint32_t len; uint8_t data[len]; }};
}};
"#
    )
}

fn push_u16(out: &mut Vec<u8>, v: u16, le: bool) {
    out.extend_from_slice(&if le { v.to_le_bytes() } else { v.to_be_bytes() });
}

fn push_u32(out: &mut Vec<u8>, v: u32, le: bool) {
    out.extend_from_slice(&if le { v.to_le_bytes() } else { v.to_be_bytes() });
}

fn push_u64(out: &mut Vec<u8>, v: u64, le: bool) {
    out.extend_from_slice(&if le { v.to_le_bytes() } else { v.to_be_bytes() });
}

/// Encode one packet of the standard fixture.
pub fn encode_packet(spec: &PacketSpec, le: bool) -> Vec<u8> {
    let mut events = Vec::new();
    for event in &spec.events {
        match event {
            EventSpec::Alpha { ts, value } => {
                push_u16(&mut events, 1, le);
                push_u64(&mut events, *ts, le);
                push_u32(&mut events, *value, le);
            }
            EventSpec::Msg { ts, msg } => {
                push_u16(&mut events, 2, le);
                push_u64(&mut events, *ts, le);
                events.extend_from_slice(msg.as_bytes());
                events.push(0);
            }
            EventSpec::Seq { ts, data } => {
                push_u16(&mut events, 3, le);
                push_u64(&mut events, *ts, le);
                push_u32(&mut events, data.len() as u32, le);
                events.extend_from_slice(data);
            }
        }
    }

    // header 24 bytes + context 44 bytes.
    let content_bytes = 24 + 44 + events.len();
    let packet_bytes = content_bytes.max(spec.pad_to_bytes);

    let mut out = Vec::with_capacity(packet_bytes);
    push_u32(&mut out, 0xC1FC1FC1, le);
    out.extend_from_slice(&TRACE_UUID_BYTES);
    push_u32(&mut out, spec.stream_id, le);
    push_u64(&mut out, content_bytes as u64 * 8, le);
    push_u64(&mut out, packet_bytes as u64 * 8, le);
    push_u64(&mut out, spec.ts_begin, le);
    push_u64(&mut out, spec.ts_end, le);
    push_u64(&mut out, spec.discarded, le);
    push_u32(&mut out, spec.cpu_id, le);
    out.extend_from_slice(&events);
    out.resize(packet_bytes, 0);
    out
}

/// Write a full trace directory: metadata plus one file per stream.
pub fn write_trace(dir: &Path, metadata: &str, streams: &[(&str, Vec<PacketSpec>)], le: bool) {
    fs::write(dir.join("metadata"), metadata).unwrap();
    for (name, packets) in streams {
        let mut bytes = Vec::new();
        for packet in packets {
            bytes.extend_from_slice(&encode_packet(packet, le));
        }
        fs::write(dir.join(name), bytes).unwrap();
    }
}
