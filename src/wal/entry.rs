//! WAL Entry definitions
//!
//! Fixed-size header framing every record in the log buffer.
//!
//! ## Header Format (little endian)
//! ```text
//! ┌───────────┬─────────────┬─────────┬──────────────┐
//! │ Magic (2) │ Version (2) │ Cmd (2) │ Reserved (2) │
//! ├───────────┴─────────────┴─────────┴──────────────┤
//! │ Seq (8)                                          │
//! ├──────────────┬───────────────┬───────────────────┤
//! │ DataLen (4)  │ DataCRC (4)   │ HeaderCRC (4)     │
//! ├──────────────┴───────────────┴───────────────────┤
//! │ Reserved (4)                                     │
//! └──────────────────────────────────────────────────┘
//! ```
//! HeaderCRC covers the first 24 bytes.

use crate::error::{Result, WalError};
use super::LogCommand;

/// Serialized size of every entry header
pub const LOG_ENTRY_HEADER_SIZE: usize = 32;

/// Magic bytes identifying an entry header ("WG")
pub const LOG_ENTRY_MAGIC: u16 = 0x4757;

/// Current header format version
pub const LOG_ENTRY_VERSION: u16 = 1;

const HEADER_CRC_OFFSET: usize = 24;

/// Header of a single framed record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogEntry {
    /// Command tag
    pub cmd: LogCommand,

    /// Log id assigned by the cursor - monotonically increasing
    pub seq: u64,

    /// Length of the payload following the header
    pub data_len: u32,

    /// CRC32 of the payload
    pub data_checksum: u32,
}

impl LogEntry {
    /// Build a header for `data`, computing its length and checksum
    pub fn new(cmd: LogCommand, seq: u64, data: &[u8]) -> Result<Self> {
        let data_len = u32::try_from(data.len()).map_err(|_| {
            WalError::InvalidArgument(format!("payload of {} bytes exceeds u32", data.len()))
        })?;
        Ok(Self {
            cmd,
            seq,
            data_len,
            data_checksum: crc32fast::hash(data),
        })
    }

    /// Size of the header alone
    pub const fn serialized_size(&self) -> usize {
        LOG_ENTRY_HEADER_SIZE
    }

    /// Header plus payload
    pub fn total_size(&self) -> usize {
        LOG_ENTRY_HEADER_SIZE + self.data_len as usize
    }

    /// Write the header into `buf[*pos..]`, advancing `pos` on success
    pub fn serialize(&self, buf: &mut [u8], pos: &mut usize) -> Result<()> {
        let start = *pos;
        let available = buf.len().saturating_sub(start);
        if available < LOG_ENTRY_HEADER_SIZE {
            return Err(WalError::BufferNotEnough {
                needed: LOG_ENTRY_HEADER_SIZE,
                available,
            });
        }

        let header = &mut buf[start..start + LOG_ENTRY_HEADER_SIZE];
        header[0..2].copy_from_slice(&LOG_ENTRY_MAGIC.to_le_bytes());
        header[2..4].copy_from_slice(&LOG_ENTRY_VERSION.to_le_bytes());
        header[4..6].copy_from_slice(&self.cmd.as_u16().to_le_bytes());
        header[6..8].fill(0);
        header[8..16].copy_from_slice(&self.seq.to_le_bytes());
        header[16..20].copy_from_slice(&self.data_len.to_le_bytes());
        header[20..24].copy_from_slice(&self.data_checksum.to_le_bytes());
        let header_crc = crc32fast::hash(&header[..HEADER_CRC_OFFSET]);
        header[24..28].copy_from_slice(&header_crc.to_le_bytes());
        header[28..32].fill(0);

        *pos = start + LOG_ENTRY_HEADER_SIZE;
        Ok(())
    }

    /// Parse a header from `buf[*pos..]`, advancing `pos` on success
    ///
    /// Validates magic, version, header checksum and command code. The
    /// payload is checked separately with [`LogEntry::check_data`].
    pub fn deserialize(buf: &[u8], pos: &mut usize) -> Result<Self> {
        let start = *pos;
        if buf.len().saturating_sub(start) < LOG_ENTRY_HEADER_SIZE {
            return Err(WalError::Corruption(format!(
                "Incomplete header at {}: {} bytes left",
                start,
                buf.len().saturating_sub(start)
            )));
        }
        let header = &buf[start..start + LOG_ENTRY_HEADER_SIZE];

        let magic = u16::from_le_bytes([header[0], header[1]]);
        if magic != LOG_ENTRY_MAGIC {
            return Err(WalError::Corruption(format!(
                "Bad magic 0x{:04x} at {}",
                magic, start
            )));
        }
        let version = u16::from_le_bytes([header[2], header[3]]);
        if version != LOG_ENTRY_VERSION {
            return Err(WalError::Corruption(format!(
                "Unsupported version {} at {}",
                version, start
            )));
        }

        let stored_crc = u32::from_le_bytes([header[24], header[25], header[26], header[27]]);
        let computed_crc = crc32fast::hash(&header[..HEADER_CRC_OFFSET]);
        if stored_crc != computed_crc {
            return Err(WalError::Corruption(format!(
                "Header CRC mismatch at {}: stored {:08x}, computed {:08x}",
                start, stored_crc, computed_crc
            )));
        }

        let code = u16::from_le_bytes([header[4], header[5]]);
        let cmd = LogCommand::from_u16(code).ok_or_else(|| {
            WalError::Corruption(format!("Unknown command 0x{:04x} at {}", code, start))
        })?;

        let mut seq = [0u8; 8];
        seq.copy_from_slice(&header[8..16]);

        *pos = start + LOG_ENTRY_HEADER_SIZE;
        Ok(Self {
            cmd,
            seq: u64::from_le_bytes(seq),
            data_len: u32::from_le_bytes([header[16], header[17], header[18], header[19]]),
            data_checksum: u32::from_le_bytes([header[20], header[21], header[22], header[23]]),
        })
    }

    /// Verify that `data` is the payload this header describes
    pub fn check_data(&self, data: &[u8]) -> Result<()> {
        if data.len() != self.data_len as usize {
            return Err(WalError::Corruption(format!(
                "Entry {} truncated: expected {} bytes, got {}",
                self.seq,
                self.data_len,
                data.len()
            )));
        }
        let crc = crc32fast::hash(data);
        if crc != self.data_checksum {
            return Err(WalError::Corruption(format!(
                "Entry {} data CRC mismatch: stored {:08x}, computed {:08x}",
                self.seq, self.data_checksum, crc
            )));
        }
        Ok(())
    }
}
