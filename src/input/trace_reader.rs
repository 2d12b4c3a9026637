//! Trace-level reader: one reader per stream file, merged by timestamp.
//!
//! Every per-CPU stream file gets its own [`StreamInputReader`]; a
//! priority queue keyed by each reader's current event timestamp yields a
//! single globally ordered event sequence at O(log n) per event.
//!
//! Shutdown from another thread goes through [`InterruptHandle`]: readers
//! check the flag between events (there are no mid-event suspension
//! points) and wind down as if the trace had ended.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::warn;

use crate::error::DecodeError;
use crate::event::EventDefinition;
use crate::options::ReaderOptions;
use crate::trace::CtfTrace;

use super::stream_reader::{ReadStatus, StreamInputReader};

/// Cloneable handle that stops a reader from any thread.
#[derive(Clone, Debug, Default)]
pub struct InterruptHandle(Arc<AtomicBool>);

impl InterruptHandle {
    pub fn interrupt(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_interrupted(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

pub struct TraceReader<'t> {
    trace: &'t CtfTrace,
    readers: Vec<StreamInputReader<'t>>,
    /// Readers with a current event, keyed by (timestamp, reader index).
    queue: BinaryHeap<Reverse<(u64, usize)>>,
    /// The reader whose current event `current_event` returns.
    current: Option<usize>,
    /// Live-mode readers that reported `Wait`; retried on each advance.
    waiting: Vec<usize>,
    interrupt: InterruptHandle,
}

impl<'t> TraceReader<'t> {
    /// Open every stream file in a trace directory. The `metadata` file
    /// and dotfiles are skipped; files that do not start with a valid
    /// packet are skipped with a warning (index directories and the like),
    /// while I/O failures propagate.
    pub fn open(
        trace: &'t CtfTrace,
        dir: &Path,
        options: ReaderOptions,
    ) -> Result<Self, DecodeError> {
        let mut paths = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name == "metadata" || name.starts_with('.') {
                continue;
            }
            paths.push(entry.path());
        }
        paths.sort();

        let mut readers = Vec::new();
        for path in paths {
            match StreamInputReader::new(trace, &path, options) {
                Ok(reader) => readers.push(reader),
                Err(
                    e @ (DecodeError::BadMagic { .. }
                    | DecodeError::UuidMismatch { .. }
                    | DecodeError::Overflow { .. }
                    | DecodeError::TruncatedPacket { .. }),
                ) => {
                    warn!("skipping {}: {e}", path.display());
                }
                Err(e) => return Err(e),
            }
        }
        Self::from_readers(trace, readers)
    }

    /// Build a trace reader from already-open stream readers and position
    /// it on the globally earliest event.
    pub fn from_readers(
        trace: &'t CtfTrace,
        mut readers: Vec<StreamInputReader<'t>>,
    ) -> Result<Self, DecodeError> {
        let mut queue = BinaryHeap::new();
        let mut waiting = Vec::new();
        for (idx, reader) in readers.iter_mut().enumerate() {
            match reader.read_next_event()? {
                ReadStatus::EventRead => {
                    let ts = reader.current_timestamp().unwrap_or(0);
                    queue.push(Reverse((ts, idx)));
                }
                ReadStatus::Wait => waiting.push(idx),
                ReadStatus::Finish => {}
            }
        }
        let mut reader = TraceReader {
            trace,
            readers,
            queue,
            current: None,
            waiting,
            interrupt: InterruptHandle::default(),
        };
        // Position on the first event so current_event works immediately.
        reader.pop_next();
        Ok(reader)
    }

    pub fn trace(&self) -> &'t CtfTrace {
        self.trace
    }

    pub fn stream_input_count(&self) -> usize {
        self.readers.len()
    }

    /// A handle another thread may use to stop this reader between
    /// events.
    pub fn interrupt_handle(&self) -> InterruptHandle {
        self.interrupt.clone()
    }

    pub fn current_event(&self) -> Option<&EventDefinition> {
        self.current
            .and_then(|idx| self.readers[idx].current_event())
    }

    /// CPU id of the stream the current event came from.
    pub fn cpu_id(&self) -> Option<u32> {
        self.current.and_then(|idx| self.readers[idx].cpu_id())
    }

    fn pop_next(&mut self) -> ReadStatus {
        match self.queue.pop() {
            Some(Reverse((_, idx))) => {
                self.current = Some(idx);
                ReadStatus::EventRead
            }
            None => {
                self.current = None;
                if self.waiting.is_empty() {
                    ReadStatus::Finish
                } else {
                    ReadStatus::Wait
                }
            }
        }
    }

    /// Step to the next event in global timestamp order.
    pub fn advance(&mut self) -> Result<ReadStatus, DecodeError> {
        if self.interrupt.is_interrupted() {
            self.current = None;
            return Ok(ReadStatus::Finish);
        }

        // Waiting live readers may have new data by now.
        let waiting = std::mem::take(&mut self.waiting);
        for idx in waiting {
            match self.readers[idx].read_next_event()? {
                ReadStatus::EventRead => {
                    let ts = self.readers[idx].current_timestamp().unwrap_or(0);
                    self.queue.push(Reverse((ts, idx)));
                }
                ReadStatus::Wait => self.waiting.push(idx),
                ReadStatus::Finish => {}
            }
        }

        // The reader whose event was current gets advanced and re-queued.
        if let Some(idx) = self.current.take() {
            match self.readers[idx].read_next_event()? {
                ReadStatus::EventRead => {
                    let ts = self.readers[idx].current_timestamp().unwrap_or(0);
                    self.queue.push(Reverse((ts, idx)));
                }
                ReadStatus::Wait => self.waiting.push(idx),
                ReadStatus::Finish => {}
            }
        }

        Ok(self.pop_next())
    }

    /// Seek every stream to `timestamp` and position on the earliest
    /// event at or past it. Returns the total events skipped.
    pub fn seek(&mut self, timestamp: u64) -> Result<u64, DecodeError> {
        self.queue.clear();
        self.waiting.clear();
        self.current = None;
        let mut skipped = 0u64;
        for (idx, reader) in self.readers.iter_mut().enumerate() {
            skipped += reader.seek(timestamp)?;
            if let Some(ts) = reader.current_timestamp() {
                self.queue.push(Reverse((ts, idx)));
            }
        }
        self.pop_next();
        Ok(skipped)
    }

    /// Position on the globally last event of the trace.
    pub fn go_to_last_event(&mut self) -> Result<(), DecodeError> {
        self.queue.clear();
        self.waiting.clear();
        self.current = None;
        let mut best: Option<(u64, usize)> = None;
        for (idx, reader) in self.readers.iter_mut().enumerate() {
            reader.go_to_last_event()?;
            if let Some(ts) = reader.current_timestamp() {
                if best.map(|(b, _)| ts >= b).unwrap_or(true) {
                    best = Some((ts, idx));
                }
            }
        }
        self.current = best.map(|(_, idx)| idx);
        Ok(())
    }

    /// Close every stream reader. Safe to call more than once; reading
    /// after close reports `Finish`.
    pub fn close(&mut self) {
        for reader in &mut self.readers {
            reader.close();
        }
        self.queue.clear();
        self.waiting.clear();
        self.current = None;
    }
}
