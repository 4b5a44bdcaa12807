//! # rollpoint
//!
//! Embedded recovery subsystem for a single-file SQLite datastore:
//! - Append-only transaction log with fire-and-forget writes
//! - Checksummed recovery-point snapshots (SHA-256 over the copied bytes)
//! - Point-in-time restore with pre-restore safety backup and
//!   best-effort rollback
//!
//! ## Architecture Overview
//!
//! ```text
//!   business mutations ──append──▶ ┌──────────────────┐
//!                                  │ TransactionLog   │
//!                                  │ Store (SQLite)   │
//!                                  └───────┬──────────┘
//!                 low-water mark           │
//!   ┌──────────────────┐◀──────────────────┘
//!   │ RecoveryPoint    │──snapshot──▶┌───────────────┐
//!   │ Registry         │             │ BackupManager │
//!   └───────┬──────────┘◀──verify────│ (SHA-256)     │
//!           │                        └───────────────┘
//!           ▼
//!   ┌──────────────────┐   disconnect / swap / reconnect
//!   │ Restorer         │──────────────────▶ datastore file
//!   └──────────────────┘
//! ```

pub mod api;
pub mod app;
pub mod audit;
pub mod backup;
pub mod cli;
pub mod config;
pub mod error;
pub mod registry;
pub mod restore;
pub mod service;
pub mod store;
pub mod txlog;

pub use config::Config;
pub use error::{Result, RollpointError};
pub use service::RecoveryService;

/// Package version from Cargo.toml.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
