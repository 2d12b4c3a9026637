//! Sequential/seek reader over one stream file.
//!
//! The reader is a small state machine: `{no packet | packet N loaded}`
//! crossed with `{more events | exhausted}`. `read_next_event` decodes
//! forward, loading and lazily indexing packets as it goes; `seek` jumps
//! through the packet index and scans forward to the target timestamp.
//! In live mode, running out of packets yields [`ReadStatus::Wait`]
//! instead of [`ReadStatus::Finish`] so the caller can retry after the
//! tracer writes more data.

use std::path::Path;

use log::warn;

use crate::error::DecodeError;
use crate::event::EventDefinition;
use crate::input::index::StreamInput;
use crate::input::packet::PacketReader;
use crate::options::ReaderOptions;
use crate::trace::{CtfTrace, Stream};

/// Outcome of a read attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReadStatus {
    /// An event was decoded and is now the current event.
    EventRead,
    /// Live mode: no more data right now, retry later.
    Wait,
    /// End of stream.
    Finish,
}

pub struct StreamInputReader<'t> {
    trace: &'t CtfTrace,
    stream: &'t Stream,
    /// `None` once closed; every later call is a safe no-op.
    input: Option<StreamInput>,
    options: ReaderOptions,
    packet_reader: Option<PacketReader<'t>>,
    packet_index: usize,
    current_event: Option<EventDefinition>,
}

impl<'t> StreamInputReader<'t> {
    /// Open a stream file and position on its first packet. No event is
    /// read yet; call [`Self::read_next_event`].
    pub fn new(
        trace: &'t CtfTrace,
        path: &Path,
        options: ReaderOptions,
    ) -> Result<Self, DecodeError> {
        let mut input = StreamInput::open(path)?;
        // The first packet header binds the file to its stream.
        input.ensure_indexed(trace, 0)?;
        let stream = trace
            .stream(input.stream_id())
            .or_else(|| trace.streams().next())
            .ok_or_else(|| DecodeError::UnresolvedReference {
                path: format!("stream for {}", path.display()),
            })?;
        let mut reader = StreamInputReader {
            trace,
            stream,
            input: Some(input),
            options,
            packet_reader: None,
            packet_index: 0,
            current_event: None,
        };
        reader.load_packet(0)?;
        Ok(reader)
    }

    pub fn stream(&self) -> &'t Stream {
        self.stream
    }

    pub fn current_event(&self) -> Option<&EventDefinition> {
        self.current_event.as_ref()
    }

    /// Timestamp of the current event, used for multi-stream ordering.
    pub fn current_timestamp(&self) -> Option<u64> {
        self.current_event.as_ref().map(|e| e.timestamp)
    }

    /// CPU id of the packet the reader is positioned in.
    pub fn cpu_id(&self) -> Option<u32> {
        self.packet_reader.as_ref().and_then(|p| p.cpu_id())
    }

    pub fn is_live(&self) -> bool {
        self.options.live
    }

    /// Load packet `index`, indexing up to it if needed. Returns false at
    /// end of stream (the reader then has no packet).
    fn load_packet(&mut self, index: usize) -> Result<bool, DecodeError> {
        self.packet_index = index;
        let Some(input) = self.input.as_mut() else {
            return Ok(false);
        };
        if self.options.live {
            input.refresh()?;
        }
        let descriptor = input.ensure_indexed(self.trace, index)?.cloned();
        match descriptor {
            Some(descriptor) => {
                let prev_packet_end = index
                    .checked_sub(1)
                    .and_then(|i| input.packet(i))
                    .map(|p| p.timestamp_end);
                let reader = PacketReader::new(
                    self.stream,
                    input.file(),
                    input.file_bytes(),
                    descriptor,
                    &self.options,
                    prev_packet_end,
                )?;
                self.packet_reader = Some(reader);
                Ok(true)
            }
            None => {
                self.packet_reader = None;
                Ok(false)
            }
        }
    }

    /// Decode the next event into the current-event slot.
    pub fn read_next_event(&mut self) -> Result<ReadStatus, DecodeError> {
        if self.input.is_none() {
            return Ok(ReadStatus::Finish);
        }
        loop {
            let has_more = self
                .packet_reader
                .as_ref()
                .map(PacketReader::has_more_events)
                .unwrap_or(false);
            if has_more {
                let file = self.input.as_ref().expect("checked above").file();
                let event = self
                    .packet_reader
                    .as_mut()
                    .expect("checked above")
                    .read_event(file)?;
                self.current_event = Some(event);
                return Ok(ReadStatus::EventRead);
            }
            let next = if self.packet_reader.is_some() {
                self.packet_index + 1
            } else {
                self.packet_index
            };
            if !self.load_packet(next)? {
                return Ok(if self.options.live {
                    ReadStatus::Wait
                } else {
                    ReadStatus::Finish
                });
            }
        }
    }

    /// Seek to the first event with timestamp at or past `timestamp`.
    /// Returns the number of events skipped over. Indexing failures during
    /// the seek are logged and seeking proceeds over what was indexed.
    pub fn seek(&mut self, timestamp: u64) -> Result<u64, DecodeError> {
        let Some(input) = self.input.as_mut() else {
            return Ok(0);
        };

        // Index forward until a packet starts past the target.
        loop {
            if input.fully_indexed() {
                break;
            }
            if let Some(last) = input.last_packet() {
                if last.timestamp_begin > timestamp {
                    break;
                }
            }
            match input.index_next(self.trace) {
                Ok(Some(_)) => {}
                Ok(None) => break,
                Err(e) => {
                    // Best effort: seeking proceeds over the packets that
                    // did index.
                    warn!("packet indexing failed during seek: {e}");
                    break;
                }
            }
        }
        let target = input.search_packet(timestamp).unwrap_or(0);

        if !self.load_packet(target)? {
            self.current_event = None;
            return Ok(0);
        }
        let mut skipped = 0u64;
        loop {
            match self.read_next_event()? {
                ReadStatus::EventRead => {
                    let ts = self.current_event.as_ref().map(|e| e.timestamp).unwrap_or(0);
                    if ts >= timestamp {
                        break;
                    }
                    skipped += 1;
                }
                ReadStatus::Wait | ReadStatus::Finish => {
                    self.current_event = None;
                    break;
                }
            }
        }
        Ok(skipped)
    }

    /// Position on the stream's last event: rewind, index everything, walk
    /// to the last packet holding an event and read it to the end.
    pub fn go_to_last_event(&mut self) -> Result<(), DecodeError> {
        self.seek(0)?;
        let Some(input) = self.input.as_mut() else {
            return Ok(());
        };
        if let Err(e) = input.index_all(self.trace) {
            warn!("packet indexing failed while finding the last event: {e}");
        }

        let mut last_with_events = None;
        for i in (0..input.packet_count()).rev() {
            let p = input.packet(i).expect("index in range");
            if p.content_bits > p.payload_start_bits || p.lost_events > 0 {
                last_with_events = Some(i);
                break;
            }
        }
        let Some(index) = last_with_events else {
            self.current_event = None;
            return Ok(());
        };

        if !self.load_packet(index)? {
            return Err(DecodeError::NoSuchPacket { index });
        }
        loop {
            let has_more = self
                .packet_reader
                .as_ref()
                .map(PacketReader::has_more_events)
                .unwrap_or(false);
            if !has_more {
                break;
            }
            let file = self.input.as_ref().expect("open stream").file();
            let event = self
                .packet_reader
                .as_mut()
                .expect("packet loaded")
                .read_event(file)?;
            self.current_event = Some(event);
        }
        Ok(())
    }

    /// Release the file handle and swap in the stateless null reader.
    /// Further calls are safe no-ops.
    pub fn close(&mut self) {
        self.packet_reader = None;
        self.current_event = None;
        self.input = None;
    }

    pub fn is_closed(&self) -> bool {
        self.input.is_none()
    }
}
