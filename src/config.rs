//! Configuration for walgen
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;

use crate::error::{Result, WalError};
use crate::wal::{LOG_BUF_RESERVED_SIZE, LOG_FILE_ALIGN_SIZE};

/// Main configuration for a log generator
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Buffer Configuration
    // -------------------------------------------------------------------------
    /// Total size of the in-memory log buffer, reserved trailer included.
    /// Must be a multiple of the alignment unit and larger than the trailer.
    pub log_buf_size: usize,

    // -------------------------------------------------------------------------
    // File Configuration
    // -------------------------------------------------------------------------
    /// Soft limit for a single log file; `get_log` rotates once reached
    pub log_file_max_size: u64,

    /// Directory the flushing tools write `<file_id>.log` files into
    ///   {log_dir}/
    ///     ├── 1.log
    ///     ├── 2.log
    ///     └── ...
    pub log_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_buf_size: 2 * 1024 * 1024,            // 2 MB
            log_file_max_size: 64 * 1024 * 1024,      // 64 MB
            log_dir: PathBuf::from("./walgen_data"),
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Check sizes against the alignment rules of the generator
    pub fn validate(&self) -> Result<()> {
        validate_sizes(self.log_buf_size, self.log_file_max_size).map_err(WalError::Config)
    }

    /// Path of the log file with the given id
    pub fn log_file_path(&self, file_id: u64) -> PathBuf {
        self.log_dir.join(format!("{}.log", file_id))
    }
}

/// Shared by `Config::validate` and `LogGenerator::init`
pub(crate) fn validate_sizes(
    log_buf_size: usize,
    log_file_max_size: u64,
) -> std::result::Result<(), String> {
    if log_buf_size <= LOG_BUF_RESERVED_SIZE || log_buf_size % LOG_FILE_ALIGN_SIZE != 0 {
        return Err(format!(
            "log_buf_size={} must be a multiple of {} and larger than {}",
            log_buf_size, LOG_FILE_ALIGN_SIZE, LOG_BUF_RESERVED_SIZE
        ));
    }
    let align = LOG_FILE_ALIGN_SIZE as u64;
    if log_file_max_size <= LOG_BUF_RESERVED_SIZE as u64 || log_file_max_size % align != 0 {
        return Err(format!(
            "log_file_max_size={} must be a multiple of {} and larger than {}",
            log_file_max_size, LOG_FILE_ALIGN_SIZE, LOG_BUF_RESERVED_SIZE
        ));
    }
    Ok(())
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the log buffer size (in bytes)
    pub fn log_buf_size(mut self, size: usize) -> Self {
        self.config.log_buf_size = size;
        self
    }

    /// Set the maximum log file size (in bytes)
    pub fn log_file_max_size(mut self, size: u64) -> Self {
        self.config.log_file_max_size = size;
        self
    }

    /// Set the log directory
    pub fn log_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.log_dir = path.into();
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
