//! WAL Reader
//!
//! Walks framed records in a flushed log file or a `get_log` span.

use std::fs;
use std::path::Path;

use crate::error::{Result, WalError};
use super::{LogEntry, LogGenerator, LOG_ENTRY_HEADER_SIZE};

/// A decoded record borrowing its payload from the scanned bytes
#[derive(Debug, Clone, Copy)]
pub struct ReadEntry<'a> {
    pub entry: LogEntry,
    pub data: &'a [u8],
    /// Position of the header within the scanned bytes
    pub offset: usize,
}

/// Iterator over the records of a byte span
///
/// Stops at the EOF block or at a zero-filled tail. A damaged record yields
/// one `Corruption` error and ends the iteration.
pub struct LogReader<'a> {
    buf: &'a [u8],
    pos: usize,
    reached_eof: bool,
    done: bool,
}

impl<'a> LogReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self {
            buf,
            pos: 0,
            reached_eof: false,
            done: false,
        }
    }

    /// True once the EOF block has been seen
    pub fn reached_eof(&self) -> bool {
        self.reached_eof
    }

    /// Bytes consumed so far
    pub fn position(&self) -> usize {
        self.pos
    }

    fn read_next(&mut self) -> Result<Option<ReadEntry<'a>>> {
        let buf = self.buf;
        let rest = &buf[self.pos..];
        if rest.is_empty() {
            return Ok(None);
        }
        if LogGenerator::is_eof(rest) {
            self.reached_eof = true;
            return Ok(None);
        }
        let head = &rest[..rest.len().min(LOG_ENTRY_HEADER_SIZE)];
        if head.iter().all(|&b| b == 0) {
            return Ok(None);
        }

        let offset = self.pos;
        let mut pos = self.pos;
        let entry = LogEntry::deserialize(buf, &mut pos)?;
        let data_end = pos + entry.data_len as usize;
        if data_end > buf.len() {
            return Err(WalError::Corruption(format!(
                "Entry {} at {} truncated: needs {} bytes, {} left",
                entry.seq,
                offset,
                entry.data_len,
                buf.len() - pos
            )));
        }
        let data = &buf[pos..data_end];
        entry.check_data(data)?;

        self.pos = data_end;
        Ok(Some(ReadEntry { entry, data, offset }))
    }
}

impl<'a> Iterator for LogReader<'a> {
    type Item = Result<ReadEntry<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.read_next() {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Read a whole log file into memory for scanning
pub fn read_log_file(path: &Path) -> Result<Vec<u8>> {
    Ok(fs::read(path)?)
}
