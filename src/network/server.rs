//! TCP Server
//!
//! Accepts connections and serves each one on its own task. Used as the
//! daemon's front door and as the test double for the relay client.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};
use tokio_util::task::TaskTracker;

use crate::config::Config;
use crate::endpoint::Endpoint;
use crate::error::{RelayError, Result};
use super::connection::Connection;
use super::handler::CommandHandler;
use super::stats::{ServerStats, StatsSnapshot};

/// Pause after a failed accept (e.g. out of file descriptors)
const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

/// A bound, not yet running relay server
pub struct RelayServer {
    listener: TcpListener,
    local_addr: SocketAddr,
    config: Config,
    handler: Arc<dyn CommandHandler>,
    stats: Arc<ServerStats>,
}

impl RelayServer {
    /// Bind to `config.endpoint`
    ///
    /// Port 0 is not a valid endpoint; tests bind `127.0.0.1` through
    /// [`RelayServer::bind_addr`] to get an ephemeral port.
    pub async fn bind<H: CommandHandler>(config: Config, handler: H) -> Result<Self> {
        config.validate()?;
        let listener = TcpListener::bind(config.endpoint.socket_addr()).await?;
        Self::from_listener(listener, config, handler)
    }

    /// Bind to an explicit socket address, port 0 allowed
    pub async fn bind_addr<H: CommandHandler>(
        addr: SocketAddr,
        config: Config,
        handler: H,
    ) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Self::from_listener(listener, config, handler)
    }

    /// Bind `endpoint` with default limits and start serving
    pub async fn listen<H: CommandHandler>(endpoint: Endpoint, handler: H) -> Result<ServerHandle> {
        let config = Config::builder().endpoint(endpoint).build();
        Ok(Self::bind(config, handler).await?.spawn())
    }

    fn from_listener<H: CommandHandler>(
        listener: TcpListener,
        config: Config,
        handler: H,
    ) -> Result<Self> {
        let local_addr = listener.local_addr()?;
        Ok(Self {
            listener,
            local_addr,
            config,
            handler: Arc::new(handler),
            stats: Arc::new(ServerStats::default()),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Start the accept loop on the current runtime
    pub fn spawn(self) -> ServerHandle {
        let shutdown = CancellationToken::new();
        let tracker = TaskTracker::new();
        let local_addr = self.local_addr;
        let stats = Arc::clone(&self.stats);

        let task = tokio::spawn(self.run(shutdown.clone(), tracker.clone()));

        ServerHandle {
            local_addr,
            guard: shutdown.clone().drop_guard(),
            shutdown,
            tracker,
            task,
            stats,
        }
    }

    /// Serve until `shutdown` fires (blocking the calling task)
    pub async fn run(self, shutdown: CancellationToken, tracker: TaskTracker) {
        let limiter = Arc::new(Semaphore::new(self.config.max_connections));
        tracing::info!("Listening on {}", self.local_addr);

        loop {
            let permit = tokio::select! {
                _ = shutdown.cancelled() => break,
                permit = Arc::clone(&limiter).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let (stream, peer) = tokio::select! {
                _ = shutdown.cancelled() => break,
                accepted = self.listener.accept() => match accepted {
                    Ok(pair) => pair,
                    Err(e) => {
                        tracing::warn!("Accept failed on {}: {}", self.local_addr, e);
                        tokio::time::sleep(ACCEPT_BACKOFF).await;
                        continue;
                    }
                },
            };

            self.stats.record_accepted();
            let connection = Connection::new(
                stream,
                peer,
                Arc::clone(&self.handler),
                Arc::clone(&self.stats),
                &self.config,
            );

            tracker.spawn(async move {
                let _permit = permit;
                if let Err(e) = connection.handle().await {
                    tracing::debug!("Connection from {} ended with error: {}", peer, e);
                }
            });
        }

        tracing::info!("Stopped accepting on {}", self.local_addr);
        // listener drops here
    }
}

/// Handle to a running server
///
/// Dropping the handle stops the accept loop without waiting for in-flight
/// connections; [`ServerHandle::stop`] waits for them.
pub struct ServerHandle {
    local_addr: SocketAddr,
    shutdown: CancellationToken,
    guard: DropGuard,
    tracker: TaskTracker,
    task: JoinHandle<()>,
    stats: Arc<ServerStats>,
}

impl ServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Endpoint clients should connect to
    pub fn endpoint(&self) -> Endpoint {
        Endpoint::from_socket_addr(self.local_addr)
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Close the listening socket and wait for in-flight connections
    ///
    /// Returns the final counters; by then `closed == accepted`.
    pub async fn stop(self) -> Result<StatsSnapshot> {
        self.shutdown.cancel();
        self.task
            .await
            .map_err(|e| RelayError::Io(std::io::Error::other(e)))?;

        self.tracker.close();
        self.tracker.wait().await;

        drop(self.guard);
        let stats = self.stats.snapshot();
        tracing::info!(
            "Server on {} stopped after {} connection(s)",
            self.local_addr,
            stats.accepted
        );
        Ok(stats)
    }
}
