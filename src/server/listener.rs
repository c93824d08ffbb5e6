use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::server::registry::ConnectionRegistry;
use crate::stomp::connection::Connection;
use crate::stomp::sink::FrameSink;

#[derive(Debug, thiserror::Error)]
pub enum BindError {
    #[error("acceptor is already listening on {0}")]
    AlreadyRunning(SocketAddr),

    #[error("failed to bind {addr}: {source}")]
    Io {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
}

/// State that only exists between `start` and `stop`.
struct Running {
    local_addr: SocketAddr,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// Owns the listening socket and spawns one task per accepted connection.
///
/// An acceptor can be started again after it has been stopped; each start
/// binds a fresh socket.
pub struct Acceptor {
    registry: ConnectionRegistry,
    sink: Arc<dyn FrameSink>,
    running: Mutex<Option<Running>>,
}

impl Acceptor {
    pub fn new(sink: Arc<dyn FrameSink>) -> Self {
        Self {
            registry: ConnectionRegistry::new(),
            sink,
            running: Mutex::new(None),
        }
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    /// Binds `addr` and starts accepting in the background.
    ///
    /// Returns the address actually bound, which differs from `addr` when
    /// port 0 was requested.
    pub async fn start(&self, addr: SocketAddr) -> Result<SocketAddr, BindError> {
        let mut running = self.running.lock().await;
        if let Some(r) = running.as_ref() {
            return Err(BindError::AlreadyRunning(r.local_addr));
        }

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| BindError::Io { addr, source })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| BindError::Io { addr, source })?;
        info!("Listening on {}", local_addr);

        let (shutdown, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(accept_loop(
            listener,
            shutdown_rx,
            self.registry.clone(),
            Arc::clone(&self.sink),
        ));

        *running = Some(Running {
            local_addr,
            shutdown,
            task,
        });
        Ok(local_addr)
    }

    /// Closes the listening socket, then stops every registered connection.
    /// Does nothing when the acceptor is not running.
    pub async fn stop(&self) {
        let Some(running) = self.running.lock().await.take() else {
            return;
        };

        info!("Closing server socket {}", running.local_addr);
        running.shutdown.send_replace(true);
        if let Err(e) = running.task.await {
            error!(error = %e, "Accept loop terminated abnormally");
        }

        let stopped = self.registry.stop_all().await;
        info!(connections = stopped, "Acceptor stopped");
    }

    pub async fn is_running(&self) -> bool {
        self.running.lock().await.is_some()
    }

    pub async fn local_addr(&self) -> Option<SocketAddr> {
        self.running.lock().await.as_ref().map(|r| r.local_addr)
    }

    /// Number of live client connections.
    pub async fn connection_count(&self) -> usize {
        self.registry.len().await
    }
}

async fn accept_loop(
    listener: TcpListener,
    mut shutdown: watch::Receiver<bool>,
    registry: ConnectionRegistry,
    sink: Arc<dyn FrameSink>,
) {
    loop {
        tokio::select! {
            // Dropping the listener on the way out closes the socket.
            _ = shutdown.changed() => break,

            res = listener.accept() => match res {
                Ok((socket, peer)) => {
                    let (conn, handle) =
                        Connection::new(socket, peer, registry.clone(), Arc::clone(&sink));
                    debug!(conn = %conn.id(), peer = %peer, "Accepted connection");
                    registry.register(handle).await;

                    tokio::spawn(async move {
                        let id = conn.id();
                        if let Err(e) = conn.run().await {
                            warn!(conn = %id, peer = %peer, error = %e, "Failure reading frame");
                        }
                    });
                }

                Err(e) => {
                    error!(error = %e, "Accept failed");
                }
            }
        }
    }
}
