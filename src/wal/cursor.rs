//! Log cursor
//!
//! Immutable position snapshot in the log stream.

use std::fmt;

use crate::error::{Result, WalError};
use super::{LogCommand, LogEntry};

/// Position in the log stream: file, last assigned log id, byte offset in file
///
/// Ordering compares `file_id`, then `log_id`, then `offset`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LogCursor {
    pub file_id: u64,
    pub log_id: u64,
    pub offset: u64,
}

impl LogCursor {
    pub fn new(file_id: u64, log_id: u64, offset: u64) -> Self {
        Self { file_id, log_id, offset }
    }

    /// File ids start at 1; the zeroed default cursor is invalid
    pub fn is_valid(&self) -> bool {
        self.file_id > 0
    }

    /// Build the header for the record following this cursor
    pub fn next_entry(&self, cmd: LogCommand, data: &[u8]) -> Result<LogEntry> {
        if !self.is_valid() {
            return Err(WalError::InvalidArgument(format!(
                "next_entry on invalid cursor {}",
                self
            )));
        }
        let seq = self.log_id.checked_add(1).ok_or_else(|| {
            WalError::Unexpected(format!("log id overflow at cursor {}", self))
        })?;
        LogEntry::new(cmd, seq, data)
    }

    /// Move past `entry`, which must be the record right after this cursor
    pub fn advance(&mut self, entry: &LogEntry) -> Result<()> {
        if !self.is_valid() {
            return Err(WalError::InvalidArgument(format!(
                "advance on invalid cursor {}",
                self
            )));
        }
        let expected = self.log_id.checked_add(1).ok_or_else(|| {
            WalError::Unexpected(format!("log id overflow at cursor {}", self))
        })?;
        if entry.seq != expected {
            return Err(WalError::Unexpected(format!(
                "entry seq {} does not follow cursor {}",
                entry.seq, self
            )));
        }
        let (file_id, offset) = if entry.cmd == LogCommand::SwitchLog {
            let file_id = self.file_id.checked_add(1).ok_or_else(|| {
                WalError::Unexpected(format!("file id overflow at cursor {}", self))
            })?;
            (file_id, 0)
        } else {
            let offset = self.offset.checked_add(entry.total_size() as u64).ok_or_else(|| {
                WalError::Unexpected(format!("offset overflow at cursor {}", self))
            })?;
            (self.file_id, offset)
        };
        self.log_id = entry.seq;
        self.file_id = file_id;
        self.offset = offset;
        Ok(())
    }
}

impl fmt::Display for LogCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "LogCursor{{file_id={}, log_id={}, offset={}}}",
            self.file_id, self.log_id, self.offset
        )
    }
}
