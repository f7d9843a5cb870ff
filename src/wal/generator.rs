//! Log Generator
//!
//! Owns one aligned log buffer and turns a stream of records into a
//! rotatable log file image.
//!
//! ## Buffer Layout
//! ```text
//! ┌──────────────────┬──────────────────┬────────────────────────────┐
//! │ pending records  │    free space    │ reserved: NOP│SWITCH│EOF   │
//! └──────────────────┴──────────────────┴────────────────────────────┘
//! 0    start_pos  pos                   len - 3*ALIGN               len
//! ```
//!
//! ## Lifecycle
//! `init` → `start_log` → (`write_log`… → `get_log` → `commit`)* →
//! `switch_log` → `get_log` → `commit` → …, with `reset` returning to the
//! initialized state from anywhere.
//!
//! The generator is not synchronized. Local writes and the standby path
//! (`fill_batch` + `update_cursor`) must be serialized by the caller, see
//! [`SharedLogGenerator`](super::SharedLogGenerator).

use std::fmt;

use tracing::{debug, error, info, warn};

use crate::config::{validate_sizes, Config};
use crate::error::{Result, WalError};
use super::encoder::generate_log;
use super::{AlignedBuffer, LogCommand, LogCursor, LogPayload, LOG_ENTRY_HEADER_SIZE};

// =============================================================================
// Alignment Constants
// =============================================================================

/// log2 of the direct-I/O block size
pub const DIRECT_IO_ALIGN_BITS: u32 = 12;

/// Direct-I/O block size; buffer base and flush windows are aligned to it
pub const DIRECT_IO_ALIGN_SIZE: usize = 1 << DIRECT_IO_ALIGN_BITS;

pub const LOG_FILE_ALIGN_SIZE: usize = DIRECT_IO_ALIGN_SIZE;
pub const LOG_FILE_ALIGN_MASK: usize = LOG_FILE_ALIGN_SIZE - 1;

/// Trailer kept free for nop + switch_log + eof
pub const LOG_BUF_RESERVED_SIZE: usize = 3 * LOG_FILE_ALIGN_SIZE;

const EOF_MARK: &[u8] = b"end_of_log_file";

const fn build_eof_flag() -> [u8; LOG_FILE_ALIGN_SIZE] {
    let mut buf = [0u8; LOG_FILE_ALIGN_SIZE];
    let mut i = 0;
    while i < LOG_FILE_ALIGN_SIZE {
        buf[i] = EOF_MARK[i % EOF_MARK.len()];
        i += 1;
    }
    buf
}

/// Block closing every log file, identical across files
pub static EOF_FLAG_BUF: [u8; LOG_FILE_ALIGN_SIZE] = build_eof_flag();

static ZERO_BLOCK: [u8; LOG_FILE_ALIGN_SIZE] = [0u8; LOG_FILE_ALIGN_SIZE];

const SWITCH_LOG_DATA_LEN: usize = LOG_FILE_ALIGN_SIZE - LOG_ENTRY_HEADER_SIZE;

fn align_down(x: usize) -> usize {
    x & !LOG_FILE_ALIGN_MASK
}

fn align_up(x: usize) -> usize {
    (x + LOG_FILE_ALIGN_MASK) & !LOG_FILE_ALIGN_MASK
}

fn is_aligned(x: usize) -> bool {
    x & LOG_FILE_ALIGN_MASK == 0
}

// =============================================================================
// Log Span
// =============================================================================

/// Pending bytes handed out by [`LogGenerator::get_log`]
#[derive(Debug, Clone, Copy)]
pub struct LogSpan<'a> {
    /// Durable boundary: the file offset `data` starts at
    pub start_cursor: LogCursor,

    /// Append boundary; pass it to `commit` once `data` is durable
    pub end_cursor: LogCursor,

    /// Exactly the framed records in `[start_cursor, end_cursor)`
    pub data: &'a [u8],

    /// File offset of `aligned_data`, a multiple of the alignment unit
    pub aligned_offset: u64,

    /// `data` widened to whole alignment blocks for direct I/O. Bytes before
    /// `data` repeat the block already written; bytes after it are zero.
    pub aligned_data: &'a [u8],
}

impl LogSpan<'_> {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

// =============================================================================
// Log Generator
// =============================================================================

/// In-memory WAL generator
///
/// Positions in the buffer stay congruent to file offsets modulo
/// [`LOG_FILE_ALIGN_SIZE`], so every flush window starts on a block boundary
/// of the file.
pub struct LogGenerator {
    /// None until `init`
    log_buf: Option<AlignedBuffer>,

    log_file_max_size: u64,

    /// Durable boundary, advanced by `commit`
    start_cursor: LogCursor,

    /// Append boundary, advanced by every record
    end_cursor: LogCursor,

    /// Buffer position of `start_cursor`
    start_pos: usize,

    /// Buffer position of `end_cursor`
    pos: usize,

    /// Set by `get_log` and `switch_log`, cleared by a full `commit`
    is_frozen: bool,
}

impl Default for LogGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl LogGenerator {
    /// Create an uninitialized generator
    pub fn new() -> Self {
        Self {
            log_buf: None,
            log_file_max_size: 0,
            start_cursor: LogCursor::default(),
            end_cursor: LogCursor::default(),
            start_pos: 0,
            pos: 0,
            is_frozen: false,
        }
    }

    /// Allocate the buffer
    ///
    /// `log_buf_size` includes the reserved trailer. Both sizes must be
    /// multiples of [`LOG_FILE_ALIGN_SIZE`] larger than [`LOG_BUF_RESERVED_SIZE`].
    pub fn init(&mut self, log_buf_size: usize, log_file_max_size: u64) -> Result<()> {
        if self.is_inited() {
            error!("init twice");
            return Err(WalError::InvalidState("log generator already initialized".to_string()));
        }
        validate_sizes(log_buf_size, log_file_max_size).map_err(|msg| {
            error!("init(log_buf_size={}, log_file_max_size={}): {}", log_buf_size, log_file_max_size, msg);
            WalError::InvalidArgument(msg)
        })?;

        self.log_buf = Some(AlignedBuffer::new(log_buf_size, DIRECT_IO_ALIGN_SIZE)?);
        self.log_file_max_size = log_file_max_size;
        info!(
            "log generator initialized: log_buf_size={}, log_file_max_size={}",
            log_buf_size, log_file_max_size
        );
        Ok(())
    }

    /// [`init`](Self::init) from a validated config
    pub fn init_with_config(&mut self, config: &Config) -> Result<()> {
        config.validate()?;
        self.init(config.log_buf_size, config.log_file_max_size)
    }

    /// Drop cursors and pending bytes; the buffer stays allocated
    pub fn reset(&mut self) {
        if let Some(buf) = self.log_buf.as_mut() {
            buf.as_mut_slice().fill(0);
        }
        self.start_cursor = LogCursor::default();
        self.end_cursor = LogCursor::default();
        self.start_pos = 0;
        self.pos = 0;
        self.is_frozen = false;
    }

    pub fn is_log_start(&self) -> bool {
        self.start_cursor.is_valid()
    }

    /// Seed both cursors; the first record lands at `cursor.offset`
    ///
    /// `cursor.offset` must be block aligned. To resume inside a partially
    /// written block use [`start_log_with_tail`](Self::start_log_with_tail).
    pub fn start_log(&mut self, cursor: &LogCursor) -> Result<()> {
        self.start_log_with_tail(cursor, &[])
    }

    /// Seed both cursors at an arbitrary offset of an existing file
    ///
    /// `tail` is the content of the file from the block boundary below
    /// `cursor.offset` up to `cursor.offset`. It heads the first flush
    /// window, so rewriting that block with direct I/O keeps it intact.
    pub fn start_log_with_tail(&mut self, cursor: &LogCursor, tail: &[u8]) -> Result<()> {
        if !self.is_inited() {
            return Err(WalError::InvalidState("log generator not initialized".to_string()));
        }
        if !cursor.is_valid() {
            error!("start_log: invalid cursor {}", cursor);
            return Err(WalError::InvalidArgument(format!("start_log: invalid cursor {}", cursor)));
        }
        if self.is_log_start() {
            error!("start_log twice: current={}, new={}", self.start_cursor, cursor);
            return Err(WalError::InvalidState("log already started".to_string()));
        }
        let head = cursor.offset as usize & LOG_FILE_ALIGN_MASK;
        if tail.len() != head {
            error!(
                "start_log({}): expected {} tail bytes, got {}",
                cursor,
                head,
                tail.len()
            );
            return Err(WalError::InvalidArgument(format!(
                "start_log: offset {} needs {} tail bytes, got {}",
                cursor.offset,
                head,
                tail.len()
            )));
        }

        self.buf_mut()?[..head].copy_from_slice(tail);
        self.start_cursor = *cursor;
        self.end_cursor = *cursor;
        self.start_pos = head;
        self.pos = head;
        info!("start_log: {}", cursor);
        Ok(())
    }

    /// Would a payload of `size` bytes (header excluded) fit right now
    pub fn check_log_size(&self, size: usize) -> bool {
        match self.log_buf.as_ref() {
            Some(buf) if self.is_log_start() && !self.is_frozen => {
                let free = (buf.len() - LOG_BUF_RESERVED_SIZE).saturating_sub(self.pos);
                LOG_ENTRY_HEADER_SIZE
                    .checked_add(size)
                    .map_or(false, |needed| needed <= free)
            }
            _ => false,
        }
    }

    /// Foreign write: move the append boundary to a cursor produced elsewhere
    ///
    /// Used by a standby applying records it received from a peer, after
    /// copying them in with [`fill_batch`](Self::fill_batch). Must not run
    /// concurrently with local writes. With nothing pending both cursors
    /// jump to `cursor`, which must then be block aligned since the bytes
    /// before it are not in the buffer. Otherwise, within the same file, the
    /// distance from the start cursor must match the bytes filled in.
    pub fn update_cursor(&mut self, cursor: &LogCursor) -> Result<()> {
        self.check_state()?;
        if self.is_frozen {
            return Err(WalError::InvalidState("update_cursor on frozen log".to_string()));
        }
        if !cursor.is_valid() {
            error!("update_cursor: invalid cursor {}", cursor);
            return Err(WalError::InvalidArgument(format!("update_cursor: invalid cursor {}", cursor)));
        }
        if *cursor < self.end_cursor {
            error!("update_cursor: {} regresses from {}", cursor, self.end_cursor);
            return Err(WalError::InvalidArgument(format!(
                "update_cursor: {} regresses from {}",
                cursor, self.end_cursor
            )));
        }

        if *cursor == self.end_cursor {
            return Ok(());
        }

        if self.pos == self.start_pos {
            if !is_aligned(cursor.offset as usize) {
                error!("update_cursor: {} jumps to an unaligned offset", cursor);
                return Err(WalError::InvalidArgument(format!(
                    "update_cursor: offset {} is not block aligned",
                    cursor.offset
                )));
            }
            let used = align_up(self.pos);
            let buf = self.buf_mut()?;
            buf[..used].fill(0);
            self.start_cursor = *cursor;
            self.end_cursor = *cursor;
            self.start_pos = 0;
            self.pos = 0;
            return Ok(());
        }

        if cursor.file_id == self.start_cursor.file_id {
            let filled = (self.pos - self.start_pos) as u64;
            if cursor.offset != self.start_cursor.offset + filled {
                error!(
                    "update_cursor: {} does not match {} filled bytes after {}",
                    cursor, filled, self.start_cursor
                );
                return Err(WalError::InvalidArgument(format!(
                    "update_cursor: offset {} does not match filled bytes ({} after {})",
                    cursor.offset, filled, self.start_cursor.offset
                )));
            }
        }
        self.end_cursor = *cursor;
        Ok(())
    }

    /// Copy already framed records into the buffer at `pos`
    ///
    /// The cursor is not touched; follow up with [`update_cursor`](Self::update_cursor).
    pub fn fill_batch(&mut self, data: &[u8]) -> Result<()> {
        self.check_state()?;
        if self.is_frozen {
            return Err(WalError::InvalidState("fill_batch on frozen log".to_string()));
        }
        if data.is_empty() {
            return Err(WalError::InvalidArgument("fill_batch: empty batch".to_string()));
        }
        let pos = self.pos;
        let buf = self.buf_mut()?;
        let limit = buf.len() - LOG_BUF_RESERVED_SIZE;
        if pos + data.len() > limit {
            return Err(WalError::BufferNotEnough {
                needed: data.len(),
                available: limit - pos,
            });
        }
        buf[pos..pos + data.len()].copy_from_slice(data);
        self.pos += data.len();
        Ok(())
    }

    /// Append one `cmd` record carrying `data`
    ///
    /// `BufferNotEnough` is returned without logging: switch the log, flush,
    /// and retry the same write.
    pub fn write_log<T: LogPayload + ?Sized>(&mut self, cmd: LogCommand, data: &T) -> Result<()> {
        if let Err(e) = self.check_state() {
            error!("check_state()=>{}", e);
            return Err(e);
        }
        if matches!(cmd, LogCommand::SwitchLog | LogCommand::Eof) {
            return Err(WalError::InvalidArgument(format!(
                "{:?} records are written by the generator",
                cmd
            )));
        }
        match self.do_write_log(cmd, data, LOG_BUF_RESERVED_SIZE) {
            Err(e) if !e.is_retryable() => {
                warn!("generate_log(pos={})=>{}", self.pos, e);
                Err(e)
            }
            other => other,
        }
    }

    /// Hand out the pending bytes for flushing
    ///
    /// Closes the current file first when it has reached the configured
    /// maximum size. A non-empty span freezes the generator until the
    /// matching `commit`.
    pub fn get_log(&mut self) -> Result<LogSpan<'_>> {
        self.check_state()?;
        if !self.is_frozen {
            self.check_log_file_size()?;
        }
        if self.pos > self.start_pos {
            self.is_frozen = true;
        }

        let buf = self
            .log_buf
            .as_ref()
            .ok_or_else(|| WalError::InvalidState("log generator not initialized".to_string()))?
            .as_slice();
        let aligned_start = align_down(self.start_pos);
        let aligned_end = if self.pos > self.start_pos { align_up(self.pos) } else { aligned_start };
        Ok(LogSpan {
            start_cursor: self.start_cursor,
            end_cursor: self.end_cursor,
            data: &buf[self.start_pos..self.pos],
            aligned_offset: self.start_cursor.offset - (self.start_pos - aligned_start) as u64,
            aligned_data: &buf[aligned_start..aligned_end],
        })
    }

    /// Advance the durable boundary to `end_cursor`
    ///
    /// Committing up to the append boundary drains the buffer and unfreezes
    /// the generator, keeping the last partial block at the head of the
    /// buffer. A partial commit must stay within the current file.
    pub fn commit(&mut self, end_cursor: &LogCursor) -> Result<()> {
        self.check_state()?;
        if *end_cursor < self.start_cursor || *end_cursor > self.end_cursor {
            error!(
                "commit({}) out of range [{}, {}]",
                end_cursor, self.start_cursor, self.end_cursor
            );
            return Err(WalError::InvalidArgument(format!(
                "commit: {} not in [{}, {}]",
                end_cursor, self.start_cursor, self.end_cursor
            )));
        }

        if *end_cursor == self.end_cursor {
            self.drain();
            return Ok(());
        }

        let delta = end_cursor.offset.checked_sub(self.start_cursor.offset);
        match delta {
            Some(delta)
                if end_cursor.file_id == self.start_cursor.file_id
                    && self.start_pos + delta as usize <= self.pos =>
            {
                self.start_pos += delta as usize;
                self.start_cursor = *end_cursor;
                Ok(())
            }
            _ => {
                error!("commit({}) does not fall inside pending bytes", end_cursor);
                Err(WalError::InvalidArgument(format!(
                    "commit: {} does not fall inside pending bytes of file {}",
                    end_cursor, self.start_cursor.file_id
                )))
            }
        }
    }

    /// Close the current file: nop padding, SWITCH_LOG marker, EOF block
    ///
    /// Freezes the generator and returns the id of the next file.
    pub fn switch_log(&mut self) -> Result<u64> {
        self.check_state()?;
        if self.is_frozen {
            error!("switch_log on frozen log: {}", self);
            return Err(WalError::InvalidState("switch_log on frozen log".to_string()));
        }
        self.close_file()?;
        info!("switch_log: new_file_id={}", self.end_cursor.file_id);
        Ok(self.end_cursor.file_id)
    }

    /// Append a CHECKPOINT marker; returns the current file id
    pub fn check_point(&mut self) -> Result<u64> {
        self.check_state()?;
        let file_id = self.end_cursor.file_id;
        self.do_write_log(LogCommand::Checkpoint, &file_id, LOG_BUF_RESERVED_SIZE)?;
        info!("check_point: cur_log_file_id={}, cursor={}", file_id, self.end_cursor);
        Ok(file_id)
    }

    /// Append a payload-less KEEP_ALIVE marker
    pub fn gen_keep_alive(&mut self) -> Result<()> {
        self.check_state()?;
        self.do_write_log(LogCommand::KeepAlive, &[] as &[u8], LOG_BUF_RESERVED_SIZE)
    }

    /// No uncommitted bytes and cursors agree
    pub fn is_clear(&self) -> bool {
        self.start_cursor == self.end_cursor && self.start_pos == self.pos
    }

    /// Does `buf` start with the canonical EOF block
    pub fn is_eof(buf: &[u8]) -> bool {
        buf.len() >= LOG_FILE_ALIGN_SIZE && buf[..LOG_FILE_ALIGN_SIZE] == EOF_FLAG_BUF[..]
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn start_cursor(&self) -> LogCursor {
        self.start_cursor
    }

    pub fn end_cursor(&self) -> LogCursor {
        self.end_cursor
    }

    /// Buffer position of the append boundary
    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn is_frozen(&self) -> bool {
        self.is_frozen
    }

    /// Total buffer length, reserved trailer included; 0 before `init`
    pub fn capacity(&self) -> usize {
        self.log_buf.as_ref().map_or(0, AlignedBuffer::len)
    }

    pub fn log_file_max_size(&self) -> u64 {
        self.log_file_max_size
    }

    /// Log state and the head of the pending bytes at debug level
    pub fn dump_for_debug(&self) {
        debug!("log_generator: {}", self);
        if let Some(buf) = self.log_buf.as_ref() {
            let pending = &buf.as_slice()[self.start_pos..self.pos];
            let head = &pending[..pending.len().min(64)];
            let hex: String = head.iter().map(|b| format!("{:02x}", b)).collect();
            debug!("pending[{}]: {}", pending.len(), hex);
        }
    }

    // =========================================================================
    // Internal Helpers
    // =========================================================================

    fn is_inited(&self) -> bool {
        self.log_buf.is_some()
    }

    fn check_state(&self) -> Result<()> {
        if !self.is_inited() {
            Err(WalError::InvalidState("log generator not initialized".to_string()))
        } else if !self.is_log_start() {
            Err(WalError::InvalidState("log not started".to_string()))
        } else {
            Ok(())
        }
    }

    fn buf_mut(&mut self) -> Result<&mut [u8]> {
        self.log_buf
            .as_mut()
            .map(AlignedBuffer::as_mut_slice)
            .ok_or_else(|| WalError::InvalidState("log generator not initialized".to_string()))
    }

    /// Encode into the buffer minus `reserved_len` trailing bytes
    fn do_write_log<T: LogPayload + ?Sized>(
        &mut self,
        cmd: LogCommand,
        data: &T,
        reserved_len: usize,
    ) -> Result<()> {
        if self.is_frozen {
            return Err(WalError::InvalidState("write on frozen log".to_string()));
        }
        let buf = self
            .log_buf
            .as_mut()
            .ok_or_else(|| WalError::InvalidState("log generator not initialized".to_string()))?
            .as_mut_slice();
        let limit = buf.len() - reserved_len;
        generate_log(&mut buf[..limit], &mut self.pos, &mut self.end_cursor, cmd, data)
    }

    /// Rotate when the file has reached its maximum size
    fn check_log_file_size(&mut self) -> Result<()> {
        if self.end_cursor.offset + LOG_BUF_RESERVED_SIZE as u64 >= self.log_file_max_size {
            info!(
                "log file {} reached max size (offset={}, max={}), switching",
                self.end_cursor.file_id, self.end_cursor.offset, self.log_file_max_size
            );
            self.close_file()?;
        }
        Ok(())
    }

    /// nop + switch_log + eof, all or nothing, then freeze
    fn close_file(&mut self) -> Result<()> {
        let saved_pos = self.pos;
        let saved_cursor = self.end_cursor;

        let result = self
            .write_nop()
            .and_then(|_| self.write_switch_log())
            .and_then(|_| self.append_eof());

        if let Err(e) = result {
            error!("close log file {} failed: {}", saved_cursor.file_id, e);
            let pos = self.pos;
            if let Ok(buf) = self.buf_mut() {
                buf[saved_pos..pos].fill(0);
            }
            self.pos = saved_pos;
            self.end_cursor = saved_cursor;
            return Err(e);
        }
        self.is_frozen = true;
        Ok(())
    }

    /// Pad with a NOP record so the next record starts on a block boundary
    fn write_nop(&mut self) -> Result<()> {
        if is_aligned(self.pos) {
            return Ok(());
        }
        let nop_len = align_up(self.pos + LOG_ENTRY_HEADER_SIZE) - self.pos - LOG_ENTRY_HEADER_SIZE;
        self.do_write_log(LogCommand::Nop, &ZERO_BLOCK[..nop_len], 2 * LOG_FILE_ALIGN_SIZE)
    }

    /// One full block: header + next file id + zero padding
    fn write_switch_log(&mut self) -> Result<()> {
        let mut data = [0u8; SWITCH_LOG_DATA_LEN];
        data[..8].copy_from_slice(&(self.end_cursor.file_id + 1).to_le_bytes());
        self.do_write_log(LogCommand::SwitchLog, &data, LOG_FILE_ALIGN_SIZE)
    }

    fn append_eof(&mut self) -> Result<()> {
        let pos = self.pos;
        let buf = self.buf_mut()?;
        if pos + LOG_FILE_ALIGN_SIZE > buf.len() {
            return Err(WalError::BufferNotEnough {
                needed: LOG_FILE_ALIGN_SIZE,
                available: buf.len() - pos,
            });
        }
        buf[pos..pos + LOG_FILE_ALIGN_SIZE].copy_from_slice(&EOF_FLAG_BUF);
        self.pos += LOG_FILE_ALIGN_SIZE;
        Ok(())
    }

    /// Drop filled bytes past `pos` that no cursor accounts for
    pub(crate) fn truncate_to(&mut self, pos: usize) {
        if pos < self.start_pos || pos >= self.pos {
            return;
        }
        let end = self.pos;
        if let Ok(buf) = self.buf_mut() {
            buf[pos..end].fill(0);
        }
        self.pos = pos;
    }

    /// Everything up to `end_cursor` is durable
    fn drain(&mut self) {
        let pos = self.pos;
        let same_file = self.start_cursor.file_id == self.end_cursor.file_id;
        let keep_from = align_down(pos);
        let new_pos = if same_file {
            pos - keep_from
        } else {
            self.end_cursor.offset as usize & LOG_FILE_ALIGN_MASK
        };

        if let Some(buf) = self.log_buf.as_mut() {
            let buf = buf.as_mut_slice();
            if same_file {
                buf.copy_within(keep_from..pos, 0);
                buf[new_pos..pos.max(new_pos)].fill(0);
            } else {
                buf[..align_up(pos)].fill(0);
            }
        }

        self.start_cursor = self.end_cursor;
        self.start_pos = new_pos;
        self.pos = new_pos;
        self.is_frozen = false;
    }
}

impl fmt::Display for LogGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "LogGenerator{{start_cursor={}, end_cursor={}, start_pos={}, pos={}, len={}, frozen={}, file_max_size={}}}",
            self.start_cursor,
            self.end_cursor,
            self.start_pos,
            self.pos,
            self.capacity(),
            self.is_frozen,
            self.log_file_max_size
        )
    }
}
