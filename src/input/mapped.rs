//! Mapped packet regions.
//!
//! Each active packet reader owns exactly one [`PacketMap`]: a mapped
//! window over the packet's byte range. Small and medium packets map in
//! one piece; packets above the configured limit get a sliding window that
//! is re-mapped (the old mapping dropped deterministically) as the read
//! cursor crosses chunk boundaries.
//!
//! Window starts are chunk-aligned relative to the packet and chunk sizes
//! are multiples of 4 KiB, so a bit position aligned relative to the
//! window is aligned relative to the packet for every alignment a
//! declaration can carry.

use std::fs::File;

use log::debug;
use memmap2::{Mmap, MmapOptions};

use crate::error::DecodeError;
use crate::options::ReaderOptions;

const PAGE: u64 = 4096;

pub struct PacketMap {
    /// Byte offset of the packet in the file.
    packet_offset: u64,
    /// Total packet size in bytes.
    packet_bytes: u64,
    file_bytes: u64,
    /// Window start, in bytes, relative to the packet. Always a chunk
    /// multiple. Zero and spanning the whole packet in direct mode.
    window_start: u64,
    window_bytes: u64,
    map: Mmap,
    /// Page-alignment slack: the window's first byte within `map`.
    delta: usize,
    chunk_bytes: u64,
    chunked: bool,
}

fn map_range(file: &File, offset: u64, len: u64) -> Result<(Mmap, usize), DecodeError> {
    let aligned = offset - offset % PAGE;
    let delta = (offset - aligned) as usize;
    // Safety: the mapping is read-only and private to this reader; the
    // underlying trace file is treated as immutable for the reader's
    // lifetime.
    let map = unsafe {
        MmapOptions::new()
            .offset(aligned)
            .len(len as usize + delta)
            .map(file)
    }
    .map_err(|e| DecodeError::MapFailed {
        offset,
        message: e.to_string(),
    })?;
    Ok((map, delta))
}

impl PacketMap {
    /// Map a packet, choosing direct or chunked strategy by size.
    pub fn new(
        file: &File,
        file_bytes: u64,
        packet_offset: u64,
        packet_bytes: u64,
        options: &ReaderOptions,
    ) -> Result<Self, DecodeError> {
        let packet_bytes = packet_bytes.min(file_bytes.saturating_sub(packet_offset));
        let chunked = packet_bytes > options.direct_map_limit;
        let chunk_bytes = options.chunk_size.max(PAGE);
        let window_bytes = if chunked {
            (2 * chunk_bytes).min(packet_bytes)
        } else {
            packet_bytes
        };
        if chunked {
            debug!(
                "packet at {packet_offset} is {packet_bytes} bytes, using {chunk_bytes}-byte chunked mapping"
            );
        }
        let (map, delta) = map_range(file, packet_offset, window_bytes)?;
        Ok(PacketMap {
            packet_offset,
            packet_bytes,
            file_bytes,
            window_start: 0,
            window_bytes,
            map,
            delta,
            chunk_bytes,
            chunked,
        })
    }

    /// Map exactly `bytes` bytes at `offset`, regardless of policy. Used
    /// for packet-header parsing during indexing.
    pub fn direct(file: &File, file_bytes: u64, offset: u64, bytes: u64) -> Result<Self, DecodeError> {
        let bytes = bytes.min(file_bytes.saturating_sub(offset));
        let (map, delta) = map_range(file, offset, bytes)?;
        Ok(PacketMap {
            packet_offset: offset,
            packet_bytes: bytes,
            file_bytes,
            window_start: 0,
            window_bytes: bytes,
            map,
            delta,
            chunk_bytes: bytes.max(1),
            chunked: false,
        })
    }

    /// The window's bytes.
    pub fn slice(&self) -> &[u8] {
        &self.map[self.delta..self.delta + self.window_bytes as usize]
    }

    /// Window start in bits, relative to the packet.
    pub fn window_start_bits(&self) -> u64 {
        self.window_start * 8
    }

    /// Re-map so the window covers `packet_bit_pos` with as much room
    /// ahead as the chunk policy allows. No-op for direct maps and for
    /// positions already in the window's leading chunk.
    pub fn ensure_covers(&mut self, file: &File, packet_bit_pos: u64) -> Result<(), DecodeError> {
        if !self.chunked {
            return Ok(());
        }
        let pos_byte = packet_bit_pos / 8;
        let target_start = pos_byte - pos_byte % self.chunk_bytes;
        if target_start == self.window_start {
            return Ok(());
        }
        let window_bytes = (2 * self.chunk_bytes).min(self.packet_bytes - target_start);
        let file_offset = self.packet_offset + target_start;
        let window_bytes = window_bytes.min(self.file_bytes.saturating_sub(file_offset));
        let (map, delta) = map_range(file, file_offset, window_bytes)?;
        // The old mapping drops here, releasing it before the new window
        // outlives it.
        self.map = map;
        self.delta = delta;
        self.window_start = target_start;
        self.window_bytes = window_bytes;
        Ok(())
    }

    pub fn is_chunked(&self) -> bool {
        self.chunked
    }
}
