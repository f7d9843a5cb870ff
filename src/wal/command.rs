//! Log command definitions
//!
//! Tags the purpose of each framed record.

/// Command carried in every log entry header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum LogCommand {
    /// Padding up to an alignment boundary
    Nop = 0x0001,
    /// Closes the current file; the next record starts file_id + 1
    SwitchLog = 0x0002,
    /// Checkpoint marker, payload is the current file id
    Checkpoint = 0x0003,
    /// Idle marker with an empty payload
    KeepAlive = 0x0004,
    /// Tag reserved for the end-of-file block
    Eof = 0x0005,
    /// Ordinary caller write
    Write = 0x0010,
}

impl LogCommand {
    /// Converts a header code to a command.
    pub fn from_u16(code: u16) -> Option<Self> {
        match code {
            0x0001 => Some(Self::Nop),
            0x0002 => Some(Self::SwitchLog),
            0x0003 => Some(Self::Checkpoint),
            0x0004 => Some(Self::KeepAlive),
            0x0005 => Some(Self::Eof),
            0x0010 => Some(Self::Write),
            _ => None,
        }
    }

    pub const fn as_u16(self) -> u16 {
        self as u16
    }

    /// Generator-internal records, as opposed to caller data
    pub fn is_marker(self) -> bool {
        !matches!(self, Self::Write)
    }
}
