use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::watch;

use crate::server::registry::{ConnectionHandle, ConnectionId, ConnectionRegistry};
use crate::stomp::frame::Frame;
use crate::stomp::parser::{FrameError, read_frame};
use crate::stomp::sink::FrameSink;

/// One accepted client socket and the loop that decodes frames from it.
pub struct Connection {
    id: ConnectionId,
    peer: SocketAddr,
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    registry: ConnectionRegistry,
    sink: Arc<dyn FrameSink>,
    shutdown: watch::Receiver<bool>,
}

pub enum ConnectionState {
    Reading,
    Delivering(Frame),
    Closed(Option<FrameError>), // error that ended the connection, if any
}

impl Connection {
    /// Wraps an accepted socket. The returned handle is what goes into the
    /// registry; the connection itself is moved into its own task.
    pub fn new(
        stream: TcpStream,
        peer: SocketAddr,
        registry: ConnectionRegistry,
        sink: Arc<dyn FrameSink>,
    ) -> (Self, ConnectionHandle) {
        let id = ConnectionId::next();
        let (handle, shutdown) = ConnectionHandle::new(id, peer);
        let (read_half, write_half) = stream.into_split();

        let conn = Self {
            id,
            peer,
            reader: BufReader::new(read_half),
            writer: write_half,
            registry,
            sink,
            shutdown,
        };
        (conn, handle)
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Decodes frames until the peer disconnects, input turns out malformed,
    /// or a stop is requested through the registry handle. The connection is
    /// always torn down and deregistered before this returns.
    ///
    /// A disconnect between frames and an explicit stop count as a clean
    /// close; anything else is returned as the error that ended it.
    pub async fn run(mut self) -> Result<(), FrameError> {
        let mut state = ConnectionState::Reading;

        let outcome = loop {
            state = match state {
                ConnectionState::Reading => self.next_frame().await,

                ConnectionState::Delivering(frame) => {
                    tracing::trace!(conn = %self.id, verb = frame.verb(), "Frame decoded");
                    self.sink.deliver(self.id, frame);
                    ConnectionState::Reading
                }

                ConnectionState::Closed(err) => break err,
            };
        };

        self.stop().await;

        match outcome {
            None => Ok(()),
            Some(e) => Err(e),
        }
    }

    async fn next_frame(&mut self) -> ConnectionState {
        tokio::select! {
            _ = self.shutdown.changed() => {
                tracing::debug!(conn = %self.id, "Stop requested");
                ConnectionState::Closed(None)
            }

            res = read_frame(&mut self.reader) => match res {
                Ok(frame) => ConnectionState::Delivering(frame),

                Err(FrameError::EndOfStream { context: "verb" }) => {
                    tracing::debug!(conn = %self.id, peer = %self.peer, "Peer disconnected");
                    ConnectionState::Closed(None)
                }

                Err(e) => ConnectionState::Closed(Some(e)),
            }
        }
    }

    /// Closes input, then output, then the socket, ignoring failures, and
    /// leaves the registry.
    async fn stop(self) {
        let Connection {
            id,
            reader,
            mut writer,
            registry,
            ..
        } = self;

        drop(reader);
        let _ = writer.shutdown().await;
        // Dropping the last half closes the socket.
        drop(writer);

        if registry.remove(id).await {
            tracing::debug!(conn = %id, "Connection removed from registry");
        }
    }
}
