//! Shared log generator
//!
//! `LogGenerator` is not synchronized. This wrapper is the external lock
//! that serializes local writers against the standby apply path.

use bytes::Bytes;
use parking_lot::{Mutex, MutexGuard};

use crate::error::Result;
use super::{LogCommand, LogCursor, LogGenerator, LogPayload};

/// Pending bytes copied out of the generator, flushable without the lock
///
/// The generator stays frozen until `commit(end_cursor)`, so nothing is
/// appended behind the copy.
#[derive(Debug, Clone)]
pub struct OwnedLogSpan {
    pub start_cursor: LogCursor,
    pub end_cursor: LogCursor,
    pub data: Bytes,
    pub aligned_offset: u64,
    pub aligned_data: Bytes,
}

impl OwnedLogSpan {
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Mutex-guarded [`LogGenerator`]
pub struct SharedLogGenerator {
    inner: Mutex<LogGenerator>,
}

impl SharedLogGenerator {
    pub fn new(generator: LogGenerator) -> Self {
        Self {
            inner: Mutex::new(generator),
        }
    }

    /// Direct access for call sequences that must not interleave
    pub fn lock(&self) -> MutexGuard<'_, LogGenerator> {
        self.inner.lock()
    }

    pub fn write_log<T: LogPayload + ?Sized>(&self, cmd: LogCommand, data: &T) -> Result<()> {
        self.inner.lock().write_log(cmd, data)
    }

    pub fn switch_log(&self) -> Result<u64> {
        self.inner.lock().switch_log()
    }

    pub fn check_point(&self) -> Result<u64> {
        self.inner.lock().check_point()
    }

    pub fn gen_keep_alive(&self) -> Result<()> {
        self.inner.lock().gen_keep_alive()
    }

    /// Standby path: copy framed records and move the cursor under one lock
    pub fn apply_batch(&self, data: &[u8], end_cursor: &LogCursor) -> Result<()> {
        let mut generator = self.inner.lock();
        let pos = generator.pos();
        generator.fill_batch(data)?;
        if let Err(e) = generator.update_cursor(end_cursor) {
            // Cursor rejected: the copied bytes must not stay pending.
            generator.truncate_to(pos);
            return Err(e);
        }
        Ok(())
    }

    /// Copy the pending span out; empty when nothing is pending
    pub fn take_log(&self) -> Result<OwnedLogSpan> {
        let mut generator = self.inner.lock();
        let span = generator.get_log()?;
        Ok(OwnedLogSpan {
            start_cursor: span.start_cursor,
            end_cursor: span.end_cursor,
            data: Bytes::copy_from_slice(span.data),
            aligned_offset: span.aligned_offset,
            aligned_data: Bytes::copy_from_slice(span.aligned_data),
        })
    }

    pub fn commit(&self, end_cursor: &LogCursor) -> Result<()> {
        self.inner.lock().commit(end_cursor)
    }

    pub fn is_clear(&self) -> bool {
        self.inner.lock().is_clear()
    }

    pub fn end_cursor(&self) -> LogCursor {
        self.inner.lock().end_cursor()
    }
}
