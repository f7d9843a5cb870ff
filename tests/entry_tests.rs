//! Tests for log entries, cursors, commands and payloads
//!
//! These tests verify:
//! - Header serialization and validation
//! - Cursor advancement and ordering rules
//! - Payload implementations never writing partial bytes

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use walgen::wal::{
    decode_bincode, BincodePayload, LogEntry, LogPayload, LOG_ENTRY_HEADER_SIZE,
};
use walgen::{LogCommand, LogCursor, WalError};

// =============================================================================
// Command Tests
// =============================================================================

#[test]
fn test_command_codes() {
    for cmd in [
        LogCommand::Nop,
        LogCommand::SwitchLog,
        LogCommand::Checkpoint,
        LogCommand::KeepAlive,
        LogCommand::Eof,
        LogCommand::Write,
    ] {
        assert_eq!(LogCommand::from_u16(cmd.as_u16()), Some(cmd));
    }
    assert_eq!(LogCommand::from_u16(0), None);
    assert_eq!(LogCommand::from_u16(0xFFFF), None);
    assert!(!LogCommand::Write.is_marker());
    assert!(LogCommand::KeepAlive.is_marker());
}

// =============================================================================
// Entry Tests
// =============================================================================

#[test]
fn test_entry_header_layout() {
    let entry = LogEntry::new(LogCommand::Write, 42, b"data").unwrap();
    assert_eq!(entry.serialized_size(), LOG_ENTRY_HEADER_SIZE);
    assert_eq!(entry.total_size(), LOG_ENTRY_HEADER_SIZE + 4);

    let mut buf = [0u8; LOG_ENTRY_HEADER_SIZE];
    let mut pos = 0;
    entry.serialize(&mut buf, &mut pos).unwrap();
    assert_eq!(pos, LOG_ENTRY_HEADER_SIZE);
    assert_eq!(&buf[0..2], &0x4757u16.to_le_bytes());
    assert_eq!(&buf[8..16], &42u64.to_le_bytes());
    assert_eq!(&buf[16..20], &4u32.to_le_bytes());

    let mut read_pos = 0;
    let decoded = LogEntry::deserialize(&buf, &mut read_pos).unwrap();
    assert_eq!(decoded, entry);
    decoded.check_data(b"data").unwrap();
}

#[test]
fn test_entry_serialize_short_buffer() {
    let entry = LogEntry::new(LogCommand::Write, 1, b"").unwrap();
    let mut buf = [0u8; LOG_ENTRY_HEADER_SIZE];
    let mut pos = 1;
    let result = entry.serialize(&mut buf, &mut pos);
    assert!(matches!(result, Err(WalError::BufferNotEnough { .. })));
    assert_eq!(pos, 1);
    assert!(buf.iter().all(|&b| b == 0));
}

#[test]
fn test_entry_check_data() {
    let entry = LogEntry::new(LogCommand::Write, 1, b"abc").unwrap();
    assert!(matches!(entry.check_data(b"abd"), Err(WalError::Corruption(_))));
    assert!(matches!(entry.check_data(b"ab"), Err(WalError::Corruption(_))));
}

#[test]
fn test_entry_unknown_command_rejected() {
    let entry = LogEntry::new(LogCommand::Write, 1, b"").unwrap();
    let mut buf = [0u8; LOG_ENTRY_HEADER_SIZE];
    let mut pos = 0;
    entry.serialize(&mut buf, &mut pos).unwrap();

    // Patch the command and re-seal the header checksum
    buf[4..6].copy_from_slice(&0x0099u16.to_le_bytes());
    let crc = crc32fast::hash(&buf[..24]);
    buf[24..28].copy_from_slice(&crc.to_le_bytes());

    let mut read_pos = 0;
    let result = LogEntry::deserialize(&buf, &mut read_pos);
    assert!(matches!(result, Err(WalError::Corruption(_))));
    assert_eq!(read_pos, 0);
}

// =============================================================================
// Cursor Tests
// =============================================================================

#[test]
fn test_cursor_validity() {
    assert!(!LogCursor::default().is_valid());
    assert!(LogCursor::new(1, 0, 0).is_valid());
    assert!(LogCursor::default().next_entry(LogCommand::Write, b"x").is_err());
}

#[test]
fn test_cursor_advance() {
    let mut cursor = LogCursor::new(1, 0, 0);
    let entry = cursor.next_entry(LogCommand::Write, b"hello").unwrap();
    assert_eq!(entry.seq, 1);

    cursor.advance(&entry).unwrap();
    assert_eq!(cursor, LogCursor::new(1, 1, (LOG_ENTRY_HEADER_SIZE + 5) as u64));
}

#[test]
fn test_cursor_advance_switch_log() {
    let mut cursor = LogCursor::new(3, 9, 8192);
    let entry = cursor.next_entry(LogCommand::SwitchLog, &[0u8; 64]).unwrap();
    cursor.advance(&entry).unwrap();
    assert_eq!(cursor, LogCursor::new(4, 10, 0));
}

#[test]
fn test_cursor_advance_out_of_order() {
    let mut cursor = LogCursor::new(1, 5, 100);
    let stale = LogEntry::new(LogCommand::Write, 5, b"x").unwrap();
    let result = cursor.advance(&stale);
    assert!(matches!(result, Err(WalError::Unexpected(_))));
    assert_eq!(cursor, LogCursor::new(1, 5, 100));
}

#[test]
fn test_cursor_advance_log_id_overflow() {
    let mut cursor = LogCursor::new(1, u64::MAX, 100);
    let entry = LogEntry::new(LogCommand::Write, 0, b"x").unwrap();
    let result = cursor.advance(&entry);
    assert!(matches!(result, Err(WalError::Unexpected(_))));
    assert!(result.unwrap_err().is_fatal());
    assert_eq!(cursor, LogCursor::new(1, u64::MAX, 100));
}

#[test]
fn test_cursor_ordering() {
    let a = LogCursor::new(1, 10, 500);
    let b = LogCursor::new(1, 11, 540);
    let c = LogCursor::new(2, 12, 0);
    assert!(a < b);
    assert!(b < c);
    assert!(LogCursor::new(1, 99, 0) < LogCursor::new(2, 0, 0));
    assert_eq!(a.to_string(), "LogCursor{file_id=1, log_id=10, offset=500}");
}

// =============================================================================
// Payload Tests
// =============================================================================

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct Mutation {
    key: String,
    value: Vec<u8>,
}

#[test]
fn test_bincode_payload() {
    let mutation = Mutation {
        key: "user:1".to_string(),
        value: vec![1, 2, 3],
    };
    let payload = BincodePayload::new(&mutation).unwrap();

    let mut buf = vec![0u8; payload.serialized_size()];
    let mut pos = 0;
    payload.serialize_into(&mut buf, &mut pos).unwrap();
    assert_eq!(pos, buf.len());

    let decoded: Mutation = decode_bincode(&buf).unwrap();
    assert_eq!(decoded, mutation);
}

#[test]
fn test_payload_does_not_write_when_short() {
    let payloads: Vec<Box<dyn LogPayload>> = vec![
        Box::new(b"abcdef".to_vec()),
        Box::new(Bytes::from_static(b"abcdef")),
        Box::new(123456789u64),
    ];
    for payload in payloads {
        let mut buf = [0u8; 5];
        let mut pos = 0;
        let result = payload.serialize_into(&mut buf, &mut pos);
        assert!(matches!(result, Err(WalError::BufferNotEnough { .. })));
        assert_eq!(pos, 0);
        assert_eq!(buf, [0u8; 5]);
    }
}

#[test]
fn test_decode_bincode_garbage() {
    let result: Result<Mutation, _> = decode_bincode(&[0xFF; 3]);
    assert!(matches!(result, Err(WalError::Serialization(_))));
}
