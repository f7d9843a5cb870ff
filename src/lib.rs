//! # walgen
//!
//! A write-ahead log generator:
//! - Frames records into a direct-I/O aligned in-memory buffer
//! - All-or-nothing appends: a failed write leaves position and cursor untouched
//! - Log file rotation with NOP padding, SWITCH_LOG and EOF markers
//! - Checkpoint and keep-alive markers
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 Caller (writer / standby)                    │
//! └───────────┬──────────────────────────────────┬──────────────┘
//!             │ write_log / switch_log            │ fill_batch /
//!             │ check_point / gen_keep_alive      │ update_cursor
//! ┌───────────▼──────────────────────────────────▼──────────────┐
//! │                      LogGenerator                            │
//! │          (start/end cursor, pos, frozen flag)               │
//! └───────────┬──────────────────────────────────┬──────────────┘
//!             │                                  │
//!             ▼                                  ▼
//!   ┌──────────────────┐              ┌─────────────────────┐
//!   │  generate_log    │              │   AlignedBuffer     │
//!   │ (record encoder) │─────────────▶│ (4 KB aligned arena)│
//!   └──────────────────┘              └──────────┬──────────┘
//!                                                │ get_log / commit
//!                                                ▼
//!                                     ┌─────────────────────┐
//!                                     │ Caller flushes span │
//!                                     └─────────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod wal;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{WalError, Result};
pub use config::Config;
pub use wal::{LogCommand, LogCursor, LogGenerator, LogPayload};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of walgen
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
