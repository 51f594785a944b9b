//! Connection Handler
//!
//! Serves one accepted connection: read a command sequence, dispatch it,
//! write the response, close.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

use crate::config::Config;
use crate::error::{RelayError, Result};
use crate::protocol::{read_command, write_response, Command, LineCodec};
use super::handler::CommandHandler;
use super::stats::ServerStats;

/// Lifecycle of a served connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Reading command lines
    AwaitingCommands,

    /// Blank line or EOF seen, handler running
    Dispatching,

    /// Writing the handler's bytes back
    Responding,

    /// Socket released
    Closed,
}

/// Handles a single client connection
pub struct Connection {
    /// Owned exclusively until the connection is closed
    stream: TcpStream,

    /// Peer address for logging
    peer_addr: String,

    state: ConnectionState,

    codec: LineCodec,

    handler: Arc<dyn CommandHandler>,

    stats: Arc<ServerStats>,

    read_timeout: Duration,

    write_timeout: Duration,
}

impl Connection {
    /// Create a new connection handler
    pub fn new(
        stream: TcpStream,
        peer: SocketAddr,
        handler: Arc<dyn CommandHandler>,
        stats: Arc<ServerStats>,
        config: &Config,
    ) -> Self {
        // Disable Nagle's algorithm; responses are small and written once
        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!("Could not set TCP_NODELAY for {}: {}", peer, e);
        }

        Self {
            stream,
            peer_addr: peer.to_string(),
            state: ConnectionState::AwaitingCommands,
            codec: LineCodec::new(config.max_line_bytes),
            handler,
            stats,
            read_timeout: config.read_timeout(),
            write_timeout: config.write_timeout(),
        }
    }

    /// Serve the connection to completion
    ///
    /// Consumes the connection; the socket is closed on every path and the
    /// connection always ends in `Closed`.
    pub async fn handle(mut self) -> Result<()> {
        tracing::debug!("Connection established from {}", self.peer_addr);

        let result = self.serve().await;
        if matches!(result, Err(ref e) if !matches!(e, RelayError::Handler(_))) {
            self.stats.record_io_error();
        }

        self.transition(ConnectionState::Closed);
        self.stats.record_closed();
        result
    }

    async fn serve(&mut self) -> Result<()> {
        let command = match self.read_commands().await? {
            Some(command) => command,
            None => return Ok(()),
        };

        self.transition(ConnectionState::Dispatching);
        self.stats.record_dispatched();

        let payload = match self.handler.handle(&command) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!("Handler failed for {}: {}", self.peer_addr, e);
                self.stats.record_handler_failure();
                return Err(match e {
                    RelayError::Handler(message) => RelayError::Handler(message),
                    other => RelayError::Handler(other.to_string()),
                });
            }
        };

        self.transition(ConnectionState::Responding);
        self.respond(payload).await
    }

    /// Read lines until a blank line or EOF
    ///
    /// `None` means the peer left without sending anything worth dispatching.
    async fn read_commands(&mut self) -> Result<Option<Command>> {
        let read = read_command(&mut self.stream, &mut self.codec);

        match tokio::time::timeout(self.read_timeout, read).await {
            Ok(Ok(Some(command))) => {
                tracing::trace!(
                    "Received {} line(s) from {}: {:?}",
                    command.len(),
                    self.peer_addr,
                    command
                );
                Ok(Some(command))
            }
            Ok(Ok(None)) => {
                tracing::debug!("Client {} sent no commands", self.peer_addr);
                Ok(None)
            }
            Ok(Err(e)) if e.is_disconnect() => {
                tracing::debug!("Client {} disconnected: {}", self.peer_addr, e);
                Ok(None)
            }
            Ok(Err(e)) => {
                tracing::warn!("Error reading from {}: {}", self.peer_addr, e);
                Err(e)
            }
            Err(_) => {
                tracing::debug!("Read timeout for client {}", self.peer_addr);
                Err(RelayError::Timeout(self.read_timeout))
            }
        }
    }

    async fn respond(&mut self, payload: Bytes) -> Result<()> {
        let write_timeout = self.write_timeout;
        let stream = &mut self.stream;
        let write = async {
            write_response(stream, &payload).await?;
            stream.shutdown().await?;
            Ok::<_, RelayError>(())
        };

        match tokio::time::timeout(write_timeout, write).await {
            Ok(Ok(())) => {
                tracing::debug!("Sent {} bytes to {}", payload.len(), self.peer_addr);
                Ok(())
            }
            Ok(Err(e)) if e.is_disconnect() => {
                tracing::debug!(
                    "Client {} disconnected before response could be sent: {}",
                    self.peer_addr,
                    e
                );
                Ok(())
            }
            Ok(Err(e)) => {
                tracing::warn!("Error writing to {}: {}", self.peer_addr, e);
                Err(e)
            }
            Err(_) => {
                tracing::debug!("Write timeout for client {}", self.peer_addr);
                Err(RelayError::Timeout(write_timeout))
            }
        }
    }

    fn transition(&mut self, next: ConnectionState) {
        tracing::trace!("{}: {:?} -> {:?}", self.peer_addr, self.state, next);
        self.state = next;
    }
}
