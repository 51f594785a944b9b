//! Command handlers
//!
//! The server hands each completed command sequence to a handler and writes
//! back whatever bytes it returns.

use bytes::Bytes;

use crate::error::Result;
use crate::protocol::Command;

/// Turns a command sequence into response bytes
///
/// Called on the connection's task, so implementations should not block for
/// long. Returning an error closes the connection without a response.
pub trait CommandHandler: Send + Sync + 'static {
    fn handle(&self, command: &Command) -> Result<Bytes>;
}

impl<F> CommandHandler for F
where
    F: Fn(&Command) -> Result<Bytes> + Send + Sync + 'static,
{
    fn handle(&self, command: &Command) -> Result<Bytes> {
        self(command)
    }
}
