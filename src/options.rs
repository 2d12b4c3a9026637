//! Reader configuration.
//!
//! The options here control policy decisions only; none of them change what
//! a trace decodes to, just how the reader goes about it.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Default cutoff between mapping a whole packet and mapping a sliding
/// window over it: 256 MiB.
pub const DEFAULT_DIRECT_MAP_LIMIT: u64 = 256 * 1024 * 1024;

/// Default sliding-window size for packets above the direct-map limit:
/// 16 MiB. Always forced to a multiple of 4 KiB so window-relative bit
/// alignment matches packet-relative alignment.
pub const DEFAULT_CHUNK_SIZE: u64 = 16 * 1024 * 1024;

// The JSON config file format is
// {
//   "direct_map_limit": 268435456,
//   "chunk_size": 16777216,
//   "live": false
// }
//
// All keys are optional and default as above.
#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(default)]
pub struct ReaderOptions {
    /// Packets at most this many bytes are mapped in one piece; larger
    /// packets get the chunked sliding-window treatment.
    pub direct_map_limit: u64,
    /// Window size, in bytes, for chunked packet mapping.
    pub chunk_size: u64,
    /// Live-tailing mode: running out of packets yields `Wait` instead of
    /// `Finish`, telling the caller to retry later.
    pub live: bool,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        ReaderOptions {
            direct_map_limit: DEFAULT_DIRECT_MAP_LIMIT,
            chunk_size: DEFAULT_CHUNK_SIZE,
            live: false,
        }
    }
}

impl ReaderOptions {
    /// Load options from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read reader options from {}", path.display()))?;
        let opts: ReaderOptions = serde_json::from_str(&contents)
            .with_context(|| format!("Invalid reader options in {}", path.display()))?;
        Ok(opts.normalized())
    }

    /// Clamp the chunk size to a sane, 4 KiB-aligned value.
    pub fn normalized(mut self) -> Self {
        const PAGE: u64 = 4096;
        if self.chunk_size < PAGE {
            self.chunk_size = PAGE;
        }
        self.chunk_size -= self.chunk_size % PAGE;
        self
    }
}
