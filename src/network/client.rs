//! Relay Client
//!
//! Sends one command sequence per connection and collects the daemon's reply.
//!
//! ## Exchange
//! 1. connect to the endpoint
//! 2. write every line, flush, half-close the write side
//! 3. read until the daemon closes (bounded by `max_response_bytes`)
//!
//! The whole exchange runs under one deadline. The socket lives inside the
//! exchange future, so timing out or cancelling drops it and closes the
//! connection.

use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::endpoint::Endpoint;
use crate::error::{RelayError, Result};
use crate::protocol::{read_response, write_command, Command, Response};

/// Receives the outcome of [`RelayClient::submit_with`]
///
/// Exactly one of the two methods is called, once.
pub trait Completion {
    fn finished(self, response: Response);

    fn failed(self, error: RelayError);
}

impl Completion for oneshot::Sender<Result<Response>> {
    fn finished(self, response: Response) {
        // Receiver gone means nobody is waiting for the answer
        let _ = self.send(Ok(response));
    }

    fn failed(self, error: RelayError) {
        let _ = self.send(Err(error));
    }
}

/// Client for the daemon's line protocol
///
/// Holds only immutable settings, so clones can submit concurrently.
#[derive(Debug, Clone)]
pub struct RelayClient {
    endpoint: Endpoint,
    timeout: Duration,
    max_response_bytes: usize,
}

impl RelayClient {
    /// Create a client with default timeout and response limit
    pub fn new(endpoint: Endpoint) -> Self {
        let defaults = Config::default();
        Self {
            endpoint,
            timeout: defaults.timeout(),
            max_response_bytes: defaults.max_response_bytes,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            endpoint: config.endpoint.clone(),
            timeout: config.timeout(),
            max_response_bytes: config.max_response_bytes,
        }
    }

    /// Deadline for connect + write + read
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_response_bytes(mut self, limit: usize) -> Self {
        self.max_response_bytes = limit;
        self
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Ask the daemon to download `link`
    pub async fn submit(&self, link: &str) -> Result<Response> {
        self.submit_cancellable(link, &CancellationToken::new()).await
    }

    /// Like [`submit`](Self::submit), aborting with `Cancelled` once `cancel` fires
    pub async fn submit_cancellable(
        &self,
        link: &str,
        cancel: &CancellationToken,
    ) -> Result<Response> {
        let command = Command::download(link)?;
        tracing::debug!("Submitting {} to {}", link, self.endpoint);
        self.send(&command, cancel).await
    }

    /// Submit and report the outcome through `completion`
    pub async fn submit_with<C: Completion>(
        &self,
        link: &str,
        cancel: &CancellationToken,
        completion: C,
    ) {
        match self.submit_cancellable(link, cancel).await {
            Ok(response) => completion.finished(response),
            Err(e) => completion.failed(e),
        }
    }

    /// Send an arbitrary command sequence and return the raw reply
    pub async fn send(&self, command: &Command, cancel: &CancellationToken) -> Result<Response> {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                tracing::debug!("Exchange with {} cancelled", self.endpoint);
                Err(RelayError::Cancelled)
            }
            outcome = tokio::time::timeout(self.timeout, self.exchange(command)) => match outcome {
                Ok(result) => result,
                Err(_) => {
                    tracing::debug!(
                        "Exchange with {} timed out after {:?}",
                        self.endpoint,
                        self.timeout
                    );
                    Err(RelayError::Timeout(self.timeout))
                }
            },
        }
    }

    async fn exchange(&self, command: &Command) -> Result<Response> {
        let mut stream = TcpStream::connect(self.endpoint.socket_addr())
            .await
            .map_err(|source| RelayError::ConnectionFailed {
                endpoint: self.endpoint.to_string(),
                source,
            })?;
        stream.set_nodelay(true)?;

        write_command(&mut stream, command).await?;

        // Half-close: the daemon treats EOF as the end of the sequence
        stream.shutdown().await?;

        let response = read_response(&mut stream, self.max_response_bytes).await?;
        tracing::debug!("Received {} bytes from {}", response.len(), self.endpoint);
        Ok(response)
    }
}

/// One-shot submit with default settings
pub async fn submit(endpoint: &Endpoint, link: &str) -> Result<Response> {
    RelayClient::new(endpoint.clone()).submit(link).await
}
