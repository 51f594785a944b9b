//! # linkrelay
//!
//! Hands download links from a front-end (browser extension, CLI) to a local
//! download-manager daemon over a line-oriented TCP protocol:
//! - One short-lived connection per submitted link
//! - CRLF-framed command lines, injection-safe by construction
//! - Whole-exchange deadline, cancellation, bounded responses
//! - A server side usable both as the daemon front door and as a test double
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────┐   modprobe http\r\n    ┌──────────────────────────┐
//! │   RelayClient    │   do <link>\r\n        │       RelayServer        │
//! │ (one conn/link)  │ ─────────────────────▶ │ (accept loop, task/conn) │
//! │                  │ ◀───────────────────── │                          │
//! └──────────────────┘   raw bytes, EOF       └────────────┬─────────────┘
//!                                                          │ Command
//!                                                          ▼
//!                                              ┌──────────────────────────┐
//!                                              │     CommandHandler       │
//!                                              │  (Shell in the daemon)   │
//!                                              └──────────────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;
pub mod endpoint;

pub mod protocol;
pub mod network;
pub mod shell;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{ErrorKind, RelayError, Result};
pub use config::Config;
pub use endpoint::Endpoint;
pub use network::{RelayClient, RelayServer, ServerHandle};
pub use shell::Shell;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of linkrelay
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
