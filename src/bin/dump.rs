//! walgen log dump
//!
//! Prints every record of a log file.

use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};
use walgen::wal::{read_log_file, LogReader};
use walgen::{LogCommand, Result};

/// walgen log dump
#[derive(Parser, Debug)]
#[command(name = "walgen-dump")]
#[command(about = "Print the records of a walgen log file")]
#[command(version)]
struct Args {
    /// Log file to read
    file: PathBuf,

    /// Print the first bytes of each payload
    #[arg(short, long)]
    payloads: bool,

    /// Skip NOP and KEEP_ALIVE records
    #[arg(short, long)]
    quiet_markers: bool,
}

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt().with_env_filter(filter).init();

    let args = Args::parse();
    if let Err(e) = run(&args) {
        tracing::error!("walgen-dump failed: {}", e);
        std::process::exit(1);
    }
}

fn run(args: &Args) -> Result<()> {
    let bytes = read_log_file(&args.file)?;
    let mut reader = LogReader::new(&bytes);
    let mut count = 0u64;

    for item in reader.by_ref() {
        let record = item?;
        count += 1;
        let entry = record.entry;
        if args.quiet_markers && matches!(entry.cmd, LogCommand::Nop | LogCommand::KeepAlive) {
            continue;
        }

        let detail = match entry.cmd {
            LogCommand::SwitchLog | LogCommand::Checkpoint if record.data.len() >= 8 => {
                let mut id = [0u8; 8];
                id.copy_from_slice(&record.data[..8]);
                format!(" file_id={}", u64::from_le_bytes(id))
            }
            _ => String::new(),
        };
        println!(
            "offset={:<10} seq={:<10} cmd={:<10} len={:<8}{}",
            record.offset,
            entry.seq,
            format!("{:?}", entry.cmd),
            entry.data_len,
            detail
        );

        if args.payloads && entry.cmd == LogCommand::Write {
            let head = &record.data[..record.data.len().min(32)];
            let hex: String = head.iter().map(|b| format!("{:02x}", b)).collect();
            println!("    {}", hex);
        }
    }

    println!(
        "{} records, {} bytes scanned, eof={}",
        count,
        reader.position(),
        reader.reached_eof()
    );
    Ok(())
}
