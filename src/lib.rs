//! ctftrace - a metadata-driven reader for Common Trace Format traces.
//!
//! CTF traces are self-describing: a `metadata` file written in TSDL
//! declares the byte-level layout of one or more binary stream files, and
//! everything the reader knows about those streams comes from there. This
//! crate implements both halves:
//!
//! - [`metadata`] - the TSDL front end and the builder that turns metadata
//!   text into a typed declaration model ([`decl`], [`trace`])
//! - [`input`] - the packet/stream readers that decode the binary streams
//!   against that model into [`event`] definitions, with seeking,
//!   live-tailing and lost-event accounting
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use ctftrace::{open_trace, ReaderOptions};
//!
//! let dir = Path::new("./my-trace");
//! let trace = ctftrace::load_metadata(dir).expect("parse metadata");
//! let mut reader = open_trace(&trace, dir, ReaderOptions::default())
//!     .expect("open streams");
//! while let Some(event) = reader.current_event() {
//!     println!("{} @ {}", event.name(), event.timestamp);
//!     if reader.advance().expect("decode") != ctftrace::ReadStatus::EventRead {
//!         break;
//!     }
//! }
//! ```

pub mod decl;
pub mod error;
pub mod event;
pub mod input;
pub mod metadata;
pub mod options;
pub mod trace;

use std::path::Path;

pub use decl::{ByteOrder, Declaration};
pub use error::{DecodeError, MetadataError};
pub use event::{Definition, EventDefinition, LostEventInfo};
pub use input::{InterruptHandle, ReadStatus, StreamInputReader, TraceReader};
pub use metadata::{parse_metadata, MetadataBuilder};
pub use options::ReaderOptions;
pub use trace::{CtfTrace, TraceSummary};

/// Read and parse the `metadata` file of a trace directory.
pub fn load_metadata(dir: &Path) -> Result<CtfTrace, MetadataError> {
    let data = std::fs::read(dir.join("metadata")).map_err(|e| MetadataError::Syntax {
        line: 0,
        message: format!("cannot read metadata: {e}"),
    })?;
    parse_metadata(&data)
}

/// Open every stream file of a trace directory under an already-parsed
/// trace model, positioned on the globally earliest event.
pub fn open_trace<'t>(
    trace: &'t CtfTrace,
    dir: &Path,
    options: ReaderOptions,
) -> Result<TraceReader<'t>, DecodeError> {
    TraceReader::open(trace, dir, options)
}
