//! walgen log generator driver
//!
//! Writes records through a shared generator and flushes the produced spans
//! to `<log_dir>/<file_id>.log` from a separate flusher thread.

use std::fs::{self, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::sync::Arc;
use std::thread;

use clap::Parser;
use crossbeam::channel::{bounded, Receiver, Sender};
use serde::{Deserialize, Serialize};
use tracing_subscriber::{fmt, EnvFilter};
use walgen::wal::{BincodePayload, OwnedLogSpan, SharedLogGenerator};
use walgen::{Config, LogCommand, LogCursor, LogGenerator, Result, WalError};

/// walgen log generator
#[derive(Parser, Debug)]
#[command(name = "walgen-gen")]
#[command(about = "Generate write-ahead log files")]
#[command(version)]
struct Args {
    /// Directory the log files are written to
    #[arg(short, long, default_value = "./walgen_data")]
    log_dir: String,

    /// Number of records to write
    #[arg(short = 'n', long, default_value = "10000")]
    records: u64,

    /// Payload body size in bytes
    #[arg(short = 's', long, default_value = "128")]
    record_size: usize,

    /// Log buffer size in KB (multiple of 4)
    #[arg(short, long, default_value = "2048")]
    buf_kb: usize,

    /// Maximum log file size in KB (multiple of 4)
    #[arg(short, long, default_value = "65536")]
    file_max_kb: u64,

    /// Flush after this many records
    #[arg(long, default_value = "100")]
    flush_every: u64,

    /// Write a checkpoint marker after this many records (0 disables)
    #[arg(long, default_value = "0")]
    checkpoint_every: u64,
}

/// Payload of a generated record
#[derive(Debug, Serialize, Deserialize)]
struct Record {
    id: u64,
    body: Vec<u8>,
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,walgen=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    tracing::info!("walgen-gen v{}", walgen::VERSION);
    tracing::info!("Log directory: {}", args.log_dir);

    let config = Config::builder()
        .log_dir(&args.log_dir)
        .log_buf_size(args.buf_kb * 1024)
        .log_file_max_size(args.file_max_kb * 1024)
        .build();

    if let Err(e) = run(&args, config) {
        tracing::error!("walgen-gen failed: {}", e);
        std::process::exit(1);
    }
}

fn run(args: &Args, config: Config) -> Result<()> {
    config.validate()?;
    fs::create_dir_all(&config.log_dir)?;

    let mut generator = LogGenerator::new();
    generator.init_with_config(&config)?;
    generator.start_log(&LogCursor::new(1, 0, 0))?;
    let shared = Arc::new(SharedLogGenerator::new(generator));

    let (span_tx, span_rx) = bounded::<OwnedLogSpan>(1);
    let (ack_tx, ack_rx) = bounded::<Result<LogCursor>>(1);

    let flusher = {
        let shared = Arc::clone(&shared);
        let config = config.clone();
        thread::spawn(move || {
            for span in span_rx {
                let result = write_span(&config, &span)
                    .and_then(|_| shared.commit(&span.end_cursor))
                    .map(|_| span.end_cursor);
                if ack_tx.send(result).is_err() {
                    break;
                }
            }
        })
    };

    for id in 0..args.records {
        let payload = BincodePayload::new(&Record {
            id,
            body: vec![(id % 251) as u8; args.record_size],
        })?;

        loop {
            match shared.write_log(LogCommand::Write, &payload) {
                Ok(()) => break,
                Err(e) if e.is_retryable() => {
                    let new_file_id = shared.switch_log()?;
                    tracing::info!("Buffer full, switched to file {}", new_file_id);
                    flush(&shared, &span_tx, &ack_rx)?;
                }
                Err(e) => return Err(e),
            }
        }

        if args.checkpoint_every > 0 && (id + 1) % args.checkpoint_every == 0 {
            let file_id = shared.check_point()?;
            tracing::debug!("Checkpoint in file {}", file_id);
        }
        if (id + 1) % args.flush_every.max(1) == 0 {
            flush(&shared, &span_tx, &ack_rx)?;
        }
    }

    shared.gen_keep_alive()?;
    flush(&shared, &span_tx, &ack_rx)?;

    drop(span_tx);
    flusher
        .join()
        .map_err(|_| WalError::Unexpected("flusher thread panicked".to_string()))?;

    tracing::info!(
        "Wrote {} records, end cursor {}",
        args.records,
        shared.end_cursor()
    );
    Ok(())
}

/// Hand the pending span to the flusher and wait for its commit
fn flush(
    shared: &SharedLogGenerator,
    span_tx: &Sender<OwnedLogSpan>,
    ack_rx: &Receiver<Result<LogCursor>>,
) -> Result<()> {
    let span = shared.take_log()?;
    if span.is_empty() {
        return Ok(());
    }
    span_tx
        .send(span)
        .map_err(|_| WalError::Unexpected("flusher thread stopped".to_string()))?;
    let committed = ack_rx
        .recv()
        .map_err(|_| WalError::Unexpected("flusher thread stopped".to_string()))??;
    tracing::debug!("Committed up to {}", committed);
    Ok(())
}

/// Write the aligned window of a span at its file offset
fn write_span(config: &Config, span: &OwnedLogSpan) -> Result<()> {
    let path = config.log_file_path(span.start_cursor.file_id);
    let mut file = OpenOptions::new().create(true).write(true).open(&path)?;
    file.seek(SeekFrom::Start(span.aligned_offset))?;
    file.write_all(&span.aligned_data)?;
    file.sync_data()?;
    tracing::trace!(
        "Flushed {} bytes to {} at {}",
        span.aligned_data.len(),
        path.display(),
        span.aligned_offset
    );
    Ok(())
}
