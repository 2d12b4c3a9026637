//! TSDL metadata: front end, scopes, and the trace model builder.
//!
//! The `metadata` file of a trace comes in two forms: plain TSDL text, or
//! a packetized stream (magic 0x75D11D57) whose packets wrap slices of the
//! same text. [`extract_text`] normalizes both to text;
//! [`parse_metadata`] runs the whole pipeline and returns the trace model.

pub mod ast;
pub mod lexer;
pub mod parser;
pub mod scalars;
pub mod scope;
pub mod structgen;

use byteorder::{BigEndian, ByteOrder as _, LittleEndian};

use crate::error::MetadataError;
use crate::trace::CtfTrace;

pub use structgen::MetadataBuilder;

/// Magic number of a packetized metadata stream.
pub const METADATA_MAGIC: u32 = 0x75D11D57;

/// Fixed byte size of a metadata packet header: magic, uuid, checksum,
/// content/packet sizes, three scheme bytes, major, minor.
const METADATA_PACKET_HEADER_BYTES: usize = 37;

/// True when the file carries the packetized metadata form.
pub fn is_packetized(data: &[u8]) -> bool {
    data.len() >= 4
        && (LittleEndian::read_u32(data) == METADATA_MAGIC
            || BigEndian::read_u32(data) == METADATA_MAGIC)
}

/// Normalize a metadata file to TSDL text, unwrapping metadata packets
/// when present.
pub fn extract_text(data: &[u8]) -> Result<String, MetadataError> {
    if !is_packetized(data) {
        return String::from_utf8(data.to_vec()).map_err(|e| MetadataError::Syntax {
            line: 0,
            message: format!("metadata is not valid UTF-8: {e}"),
        });
    }

    let little = LittleEndian::read_u32(data) == METADATA_MAGIC;
    let read_u32 = |bytes: &[u8]| {
        if little {
            LittleEndian::read_u32(bytes)
        } else {
            BigEndian::read_u32(bytes)
        }
    };

    let mut text = String::new();
    let mut offset = 0usize;
    while offset + METADATA_PACKET_HEADER_BYTES <= data.len() {
        let header = &data[offset..];
        if read_u32(header) != METADATA_MAGIC {
            return Err(MetadataError::Syntax {
                line: 0,
                message: format!("bad metadata packet magic at byte {offset}"),
            });
        }
        // magic(4) + uuid(16) + checksum(4) = 24 bytes before the sizes.
        let content_bits = read_u32(&header[24..]) as usize;
        let packet_bits = read_u32(&header[28..]) as usize;
        if content_bits % 8 != 0
            || packet_bits % 8 != 0
            || content_bits < METADATA_PACKET_HEADER_BYTES * 8
            || packet_bits < content_bits
        {
            return Err(MetadataError::Syntax {
                line: 0,
                message: format!("inconsistent metadata packet sizes at byte {offset}"),
            });
        }
        let content_end = offset + content_bits / 8;
        let packet_end = offset + packet_bits / 8;
        if content_end > data.len() {
            return Err(MetadataError::Syntax {
                line: 0,
                message: "metadata packet truncated".to_string(),
            });
        }
        let payload = &data[offset + METADATA_PACKET_HEADER_BYTES..content_end];
        text.push_str(&String::from_utf8_lossy(payload));
        if packet_end <= offset {
            break;
        }
        offset = packet_end.min(data.len());
        if offset == data.len() {
            break;
        }
    }
    Ok(text)
}

/// Full pipeline: metadata bytes to trace model.
pub fn parse_metadata(data: &[u8]) -> Result<CtfTrace, MetadataError> {
    let text = extract_text(data)?;
    let mut builder = MetadataBuilder::new();
    builder.generate(&text)?;
    Ok(builder.into_trace())
}
