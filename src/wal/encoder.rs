//! Log record encoder
//!
//! Frames one `[header][payload]` record into a buffer. Either the record
//! is written and both `pos` and the cursor move, or neither moves and the
//! bytes past `pos` are restored to what they were.

use tracing::{error, warn};

use crate::error::{Result, WalError};
use super::{LogCommand, LogCursor, LogPayload, LOG_ENTRY_HEADER_SIZE};

/// Encode `data` as a `cmd` record at `buf[*pos..]`
///
/// `buf` is the writable region; its length is the capacity limit. Failures:
/// - `InvalidArgument`: empty buffer, `pos` past the limit, invalid cursor
/// - `LogTooLarge`: the record would not fit even at position 0
/// - `BufferNotEnough`: the record does not fit in the space left
/// - `Unexpected`: cursor/entry mismatch after the payload was encoded
pub fn generate_log<T: LogPayload + ?Sized>(
    buf: &mut [u8],
    pos: &mut usize,
    cursor: &mut LogCursor,
    cmd: LogCommand,
    data: &T,
) -> Result<()> {
    let len = buf.len();
    if len == 0 || *pos > len || !cursor.is_valid() {
        error!("generate_log(len={}, pos={}, cursor={}) invalid argument", len, *pos, cursor);
        return Err(WalError::InvalidArgument(format!(
            "generate_log(len={}, pos={}, cursor={})",
            len, *pos, cursor
        )));
    }

    let start_pos = *pos;
    let data_pos = start_pos + LOG_ENTRY_HEADER_SIZE;
    let mut end_pos = data_pos;

    let serialized = if data_pos > len {
        Err(WalError::BufferNotEnough {
            needed: LOG_ENTRY_HEADER_SIZE,
            available: len - start_pos,
        })
    } else {
        data.serialize_into(buf, &mut end_pos)
    };

    match serialized {
        Ok(()) => {}
        Err(WalError::BufferNotEnough { .. }) => {
            let size = LOG_ENTRY_HEADER_SIZE.saturating_add(data.serialized_size());
            if size > len {
                warn!("log too large(size={}, limit={})", data.serialized_size(), len);
                return Err(WalError::LogTooLarge { size, limit: len });
            }
            return Err(WalError::BufferNotEnough {
                needed: size,
                available: len - start_pos,
            });
        }
        Err(e) => return Err(e),
    }

    match frame_entry(buf, start_pos, end_pos, cursor, cmd) {
        Ok(next_cursor) => {
            *cursor = next_cursor;
            *pos = end_pos;
            Ok(())
        }
        Err(e) => {
            // Bytes past `pos` are zero while the generator owns the buffer.
            buf[start_pos..end_pos].fill(0);
            Err(e)
        }
    }
}

/// Steps after the payload landed: header from the cursor, header bytes,
/// cursor advance. Returns the advanced cursor without touching the input.
fn frame_entry(
    buf: &mut [u8],
    start_pos: usize,
    end_pos: usize,
    cursor: &LogCursor,
    cmd: LogCommand,
) -> Result<LogCursor> {
    let data_pos = start_pos + LOG_ENTRY_HEADER_SIZE;

    let entry = cursor
        .next_entry(cmd, &buf[data_pos..end_pos])
        .map_err(|e| {
            error!("cursor[{}].next_entry()=>{}", cursor, e);
            WalError::Unexpected(format!("next_entry: {}", e))
        })?;

    let mut header_pos = start_pos;
    entry
        .serialize(&mut buf[..data_pos], &mut header_pos)
        .map_err(|e| {
            error!(
                "serialize_log_entry(pos={}, seq={}, data_len={})=>{}",
                start_pos, entry.seq, entry.data_len, e
            );
            WalError::Unexpected(format!("serialize entry header: {}", e))
        })?;

    let mut next = *cursor;
    next.advance(&entry).map_err(|e| {
        error!("cursor[id={}].advance(entry.seq={})=>{}", cursor.log_id, entry.seq, e);
        WalError::Unexpected(format!("advance cursor: {}", e))
    })?;
    Ok(next)
}
