//! Network Module
//!
//! TCP client and server for the line protocol.
//!
//! ## Architecture
//! - Client: one short-lived connection per submitted command
//! - Server: single accept loop, one task per connection
//! - Commands routed through a [`CommandHandler`]

mod client;
mod connection;
mod handler;
mod server;
mod stats;

pub use client::{submit, Completion, RelayClient};
pub use connection::{Connection, ConnectionState};
pub use handler::CommandHandler;
pub use server::{RelayServer, ServerHandle};
pub use stats::{ServerStats, StatsSnapshot};
