//! Write-Ahead Log (WAL) Module
//!
//! Generates WAL file images in memory; writing them to disk is up to the
//! caller.
//!
//! ## Responsibilities
//! - Frame records as `[header][payload]` with CRC32 checksums
//! - Assign monotonically increasing log ids through the cursor
//! - Keep a reserved trailer so a file can always be closed
//! - Rotate files with NOP padding, SWITCH_LOG and EOF markers
//!
//! ## File Format
//! ```text
//! ┌─────────────────────────────────────────┐
//! │ Entry 1: Header (32) │ Data             │
//! ├─────────────────────────────────────────┤
//! │ Entry 2: Header (32) │ Data             │
//! ├─────────────────────────────────────────┤
//! │ ...                                     │
//! ├─────────────────────────────────────────┤
//! │ NOP padding up to a 4 KB boundary       │
//! ├─────────────────────────────────────────┤
//! │ SWITCH_LOG (one 4 KB block)             │
//! ├─────────────────────────────────────────┤
//! │ EOF marker (one 4 KB block)             │
//! └─────────────────────────────────────────┘
//! ```

mod buffer;
mod command;
mod cursor;
mod encoder;
mod entry;
mod generator;
mod payload;
mod reader;
mod shared;

pub use buffer::AlignedBuffer;
pub use command::LogCommand;
pub use cursor::LogCursor;
pub use encoder::generate_log;
pub use entry::{LogEntry, LOG_ENTRY_HEADER_SIZE, LOG_ENTRY_MAGIC, LOG_ENTRY_VERSION};
pub use generator::{
    LogGenerator, LogSpan, DIRECT_IO_ALIGN_BITS, DIRECT_IO_ALIGN_SIZE, EOF_FLAG_BUF,
    LOG_BUF_RESERVED_SIZE, LOG_FILE_ALIGN_MASK, LOG_FILE_ALIGN_SIZE,
};
pub use payload::{decode_bincode, BincodePayload, LogPayload};
pub use reader::{read_log_file, LogReader, ReadEntry};
pub use shared::{OwnedLogSpan, SharedLogGenerator};
