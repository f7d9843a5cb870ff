//! Tests for LogReader and on-disk log files
//!
//! These tests verify:
//! - Corruption detection (payload, header, truncation)
//! - Stopping at zero-filled tails and at the EOF block
//! - Flushing spans to files the way a caller would, then reading them back

use std::fs::OpenOptions;
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;

use tempfile::TempDir;
use walgen::wal::{read_log_file, LogReader, LogSpan, LOG_ENTRY_HEADER_SIZE};
use walgen::{Config, LogCommand, LogCursor, LogGenerator, WalError};

// =============================================================================
// Helper Functions
// =============================================================================

fn generator_with(records: &[&[u8]]) -> LogGenerator {
    let mut generator = LogGenerator::new();
    generator.init(8 * 4096, 1 << 30).unwrap();
    generator.start_log(&LogCursor::new(1, 0, 0)).unwrap();
    for record in records {
        generator.write_log(LogCommand::Write, *record).unwrap();
    }
    generator
}

fn span_bytes(records: &[&[u8]]) -> Vec<u8> {
    let mut generator = generator_with(records);
    let span = generator.get_log().unwrap();
    span.data.to_vec()
}

/// What a direct-I/O flusher does with a span
fn flush_span(dir: &Path, span: &LogSpan<'_>) {
    let config = Config::builder().log_dir(dir).build();
    let path = config.log_file_path(span.start_cursor.file_id);
    let mut file = OpenOptions::new().create(true).write(true).open(path).unwrap();
    file.seek(SeekFrom::Start(span.aligned_offset)).unwrap();
    file.write_all(span.aligned_data).unwrap();
    file.sync_data().unwrap();
}

// =============================================================================
// Decoding Tests
// =============================================================================

#[test]
fn test_read_records_in_order() {
    let data = span_bytes(&[b"alpha", b"", b"gamma"]);
    let records: Vec<_> = LogReader::new(&data).map(|r| r.unwrap()).collect();

    assert_eq!(records.len(), 3);
    assert_eq!(records[0].data, b"alpha");
    assert!(records[1].data.is_empty());
    assert_eq!(records[2].data, b"gamma");
    assert_eq!(records[1].offset, LOG_ENTRY_HEADER_SIZE + 5);
    assert_eq!(
        records.iter().map(|r| r.entry.seq).collect::<Vec<_>>(),
        vec![1, 2, 3]
    );
}

#[test]
fn test_zero_tail_ends_iteration() {
    let mut data = span_bytes(&[b"one"]);
    data.extend_from_slice(&[0u8; 100]);

    let mut reader = LogReader::new(&data);
    assert_eq!(reader.by_ref().filter(|r| r.is_ok()).count(), 1);
    assert!(!reader.reached_eof());
    assert_eq!(reader.position(), LOG_ENTRY_HEADER_SIZE + 3);
}

#[test]
fn test_empty_input() {
    let mut reader = LogReader::new(&[]);
    assert!(reader.next().is_none());
    assert!(!reader.reached_eof());
}

// =============================================================================
// Corruption Detection Tests
// =============================================================================

#[test]
fn test_payload_corruption_detected() {
    let mut data = span_bytes(&[b"good", b"payload"]);
    let last = data.len() - 1;
    data[last] ^= 0xFF;

    let results: Vec<_> = LogReader::new(&data).collect();
    assert_eq!(results.len(), 2);
    assert!(results[0].is_ok());
    assert!(matches!(results[1], Err(WalError::Corruption(_))));
}

#[test]
fn test_header_corruption_detected() {
    let mut data = span_bytes(&[b"record"]);
    // seq field
    data[9] ^= 0x01;

    let result = LogReader::new(&data).next().unwrap();
    assert!(matches!(result, Err(WalError::Corruption(_))));
}

#[test]
fn test_truncated_record_detected() {
    let data = span_bytes(&[b"a fairly long payload"]);
    let truncated = &data[..data.len() - 4];

    let results: Vec<_> = LogReader::new(truncated).collect();
    assert_eq!(results.len(), 1);
    assert!(matches!(results[0], Err(WalError::Corruption(_))));
}

#[test]
fn test_garbage_detected() {
    let data = vec![0x5Au8; 64];
    let result = LogReader::new(&data).next().unwrap();
    assert!(matches!(result, Err(WalError::Corruption(_))));
}

// =============================================================================
// File Round-Trip Tests
// =============================================================================

#[test]
fn test_flushed_files_across_rotation() {
    let temp = TempDir::new().unwrap();
    let mut generator = LogGenerator::new();
    generator.init(4 * 4096, 1 << 30).unwrap();
    generator.start_log(&LogCursor::new(1, 0, 0)).unwrap();

    let mut written = 0u64;
    let mut switches = 0;
    for i in 0..200u64 {
        let payload = format!("record-{:04}", i);
        loop {
            match generator.write_log(LogCommand::Write, payload.as_str()) {
                Ok(()) => break,
                Err(e) if e.is_retryable() => {
                    generator.switch_log().unwrap();
                    switches += 1;
                    let span = generator.get_log().unwrap();
                    flush_span(temp.path(), &span);
                    let end = span.end_cursor;
                    generator.commit(&end).unwrap();
                }
                Err(e) => panic!("unexpected error: {}", e),
            }
        }
        written += 1;

        if i % 7 == 0 {
            let span = generator.get_log().unwrap();
            flush_span(temp.path(), &span);
            let end = span.end_cursor;
            generator.commit(&end).unwrap();
        }
    }
    let span = generator.get_log().unwrap();
    flush_span(temp.path(), &span);
    let end = span.end_cursor;
    generator.commit(&end).unwrap();

    assert!(switches > 0);
    assert_eq!(end.file_id, 1 + switches);

    let mut payloads = Vec::new();
    for file_id in 1..=end.file_id {
        let bytes = read_log_file(&temp.path().join(format!("{}.log", file_id))).unwrap();
        assert_eq!(bytes.len() % 4096, 0);

        let mut reader = LogReader::new(&bytes);
        for record in reader.by_ref() {
            let record = record.unwrap();
            if record.entry.cmd == LogCommand::Write {
                payloads.push(String::from_utf8(record.data.to_vec()).unwrap());
            }
        }
        assert_eq!(reader.reached_eof(), file_id < end.file_id);
    }

    assert_eq!(payloads.len() as u64, written);
    for (i, payload) in payloads.iter().enumerate() {
        assert_eq!(payload, &format!("record-{:04}", i));
    }
}

#[test]
fn test_restart_inside_partial_block_keeps_earlier_records() {
    let temp = TempDir::new().unwrap();

    let mut first = generator_with(&[b"first", b"second"]);
    let span = first.get_log().unwrap();
    flush_span(temp.path(), &span);
    let resume = span.end_cursor;
    first.commit(&resume).unwrap();
    assert_ne!(resume.offset % 4096, 0);

    // Restart from the file: reload the partial block below the resume offset
    let path = temp.path().join("1.log");
    let image = read_log_file(&path).unwrap();
    let block_start = (resume.offset - resume.offset % 4096) as usize;
    let tail = &image[block_start..resume.offset as usize];

    let mut second = LogGenerator::new();
    second.init(8 * 4096, 1 << 30).unwrap();
    second.start_log_with_tail(&resume, tail).unwrap();
    second.write_log(LogCommand::Write, b"third".as_slice()).unwrap();
    let span = second.get_log().unwrap();
    assert_eq!(span.aligned_offset, block_start as u64);
    assert_eq!(&span.aligned_data[..tail.len()], tail);
    flush_span(temp.path(), &span);

    let image = read_log_file(&path).unwrap();
    let payloads: Vec<_> = LogReader::new(&image)
        .map(|r| r.unwrap().data.to_vec())
        .collect();
    assert_eq!(payloads, vec![b"first".to_vec(), b"second".to_vec(), b"third".to_vec()]);
}

#[test]
fn test_start_log_requires_tail_for_unaligned_offset() {
    let mut generator = LogGenerator::new();
    generator.init(8 * 4096, 1 << 30).unwrap();
    let cursor = LogCursor::new(1, 2, 90);

    assert!(matches!(generator.start_log(&cursor), Err(WalError::InvalidArgument(_))));
    assert!(matches!(
        generator.start_log_with_tail(&cursor, &[0u8; 89]),
        Err(WalError::InvalidArgument(_))
    ));
    assert!(!generator.is_log_start());

    generator.start_log_with_tail(&cursor, &[7u8; 90]).unwrap();
    assert_eq!(generator.pos(), 90);
}

#[test]
fn test_read_missing_file() {
    let temp = TempDir::new().unwrap();
    let result = read_log_file(&temp.path().join("404.log"));
    assert!(matches!(result, Err(WalError::Io(_))));
}
