//! Error types for metadata parsing and stream decoding.
//!
//! Two failure families exist and they behave differently:
//!
//! - [`MetadataError`]: structural problems in the TSDL metadata. These are
//!   always fatal to trace opening; there is no partially-usable trace.
//! - [`DecodeError`]: problems decoding the binary streams. These are fatal
//!   to the current read operation, but events already returned stay valid.

use std::fmt;
use std::io;

/// A structural error in the TSDL metadata.
///
/// Any of these aborts the whole metadata load.
#[derive(Debug)]
pub enum MetadataError {
    /// Lexical or syntax error in the metadata text.
    Syntax { line: usize, message: String },
    /// The full metadata form requires exactly one `trace` block.
    MissingTraceBlock,
    /// A second `trace` block was found.
    DuplicateTraceBlock,
    /// A name was declared twice in the same scope.
    DuplicateDeclaration { name: String },
    /// A referenced type or identifier could not be resolved.
    TypeNotFound { name: String },
    /// An attribute had a value that does not make sense for it.
    InvalidAttribute { attribute: String, message: String },
    /// An enum or variant value falls outside the representable range.
    ValueRange { construct: String, message: String },
    /// The trace byte order was set twice with conflicting values.
    ByteOrderMismatch { current: String, requested: String },
    /// `generate_fragment` was called before `generate`.
    FragmentBeforeGenerate,
    /// The trace UUID string could not be parsed, or a stream file's UUID
    /// does not match the metadata's.
    MalformedUuid { value: String },
    /// The metadata declares a CTF version this reader does not handle.
    UnsupportedVersion { major: u64, minor: u64 },
}

impl fmt::Display for MetadataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataError::Syntax { line, message } => {
                write!(f, "metadata syntax error at line {line}: {message}")
            }
            MetadataError::MissingTraceBlock => {
                write!(f, "metadata has no trace block")
            }
            MetadataError::DuplicateTraceBlock => {
                write!(f, "metadata has more than one trace block")
            }
            MetadataError::DuplicateDeclaration { name } => {
                write!(f, "{name} already declared in this scope")
            }
            MetadataError::TypeNotFound { name } => {
                write!(f, "type {name} has not been declared")
            }
            MetadataError::InvalidAttribute { attribute, message } => {
                write!(f, "invalid {attribute}: {message}")
            }
            MetadataError::ValueRange { construct, message } => {
                write!(f, "{construct}: {message}")
            }
            MetadataError::ByteOrderMismatch { current, requested } => {
                write!(
                    f,
                    "trace byte order already set to {current}, cannot change to {requested}"
                )
            }
            MetadataError::FragmentBeforeGenerate => {
                write!(f, "metadata fragment received before the initial metadata")
            }
            MetadataError::MalformedUuid { value } => {
                write!(f, "malformed or mismatched uuid {value}")
            }
            MetadataError::UnsupportedVersion { major, minor } => {
                write!(f, "unsupported CTF version {major}.{minor}")
            }
        }
    }
}

impl std::error::Error for MetadataError {}

/// An error decoding a binary stream.
#[derive(Debug)]
pub enum DecodeError {
    /// Underlying I/O failure opening or reading a stream file.
    Io(io::Error),
    /// A packet header magic number did not match 0xC1FC1FC1.
    BadMagic { offset: u64, magic: u32 },
    /// A packet header UUID did not match the trace UUID.
    UuidMismatch { offset: u64 },
    /// The event header produced an id with no matching event declaration.
    UnknownEventId { id: u64 },
    /// An event decoded to zero bits, which would loop forever.
    EmptyEvent { offset_bits: u64 },
    /// A read ran past the end of the mapped packet region.
    Overflow {
        position_bits: u64,
        requested_bits: u64,
        limit_bits: u64,
    },
    /// Mapping a packet region failed.
    MapFailed { offset: u64, message: String },
    /// A seek or packet switch referenced a packet that does not exist.
    NoSuchPacket { index: usize },
    /// A declared packet is larger than its containing file.
    TruncatedPacket { offset: u64, packet_bits: u64 },
    /// A decode-time reference (sequence length, variant tag) could not be
    /// resolved against the fields decoded so far.
    UnresolvedReference { path: String },
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::Io(e) => write!(f, "stream i/o error: {e}"),
            DecodeError::BadMagic { offset, magic } => {
                write!(f, "bad packet magic {magic:#010x} at offset {offset}")
            }
            DecodeError::UuidMismatch { offset } => {
                write!(f, "packet uuid mismatch at offset {offset}")
            }
            DecodeError::UnknownEventId { id } => {
                write!(f, "unknown event id {id}")
            }
            DecodeError::EmptyEvent { offset_bits } => {
                write!(f, "zero-length event at bit offset {offset_bits}")
            }
            DecodeError::Overflow {
                position_bits,
                requested_bits,
                limit_bits,
            } => {
                write!(
                    f,
                    "read of {requested_bits} bits at bit {position_bits} past end of region ({limit_bits} bits)"
                )
            }
            DecodeError::MapFailed { offset, message } => {
                write!(f, "failed to map packet at offset {offset}: {message}")
            }
            DecodeError::NoSuchPacket { index } => {
                write!(f, "no packet with index {index}")
            }
            DecodeError::TruncatedPacket {
                offset,
                packet_bits,
            } => {
                write!(
                    f,
                    "packet at offset {offset} declares {packet_bits} bits past end of file"
                )
            }
            DecodeError::UnresolvedReference { path } => {
                write!(f, "cannot resolve field reference {path}")
            }
        }
    }
}

impl std::error::Error for DecodeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DecodeError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for DecodeError {
    fn from(e: io::Error) -> Self {
        DecodeError::Io(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let e = MetadataError::DuplicateDeclaration {
            name: "my_struct".to_string(),
        };
        assert_eq!(e.to_string(), "my_struct already declared in this scope");

        let e = DecodeError::BadMagic {
            offset: 4096,
            magic: 0xdeadbeef,
        };
        assert_eq!(e.to_string(), "bad packet magic 0xdeadbeef at offset 4096");
    }

    #[test]
    fn test_io_source() {
        use std::error::Error;
        let e = DecodeError::from(io::Error::new(io::ErrorKind::NotFound, "gone"));
        assert!(e.source().is_some());
    }
}
