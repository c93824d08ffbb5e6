//! Destinations for decoded frames.
//!
//! The server does not interpret frames itself. Every fully decoded frame is
//! handed to a [`FrameSink`] together with the identity of the connection it
//! arrived on, in arrival order for that connection.

use crate::server::registry::ConnectionId;
use crate::stomp::frame::Frame;
use tokio::sync::mpsc;

/// Receives decoded frames for downstream interpretation.
///
/// Called from connection tasks, so implementations must be cheap and must
/// not block; hand work off to a channel when it is not.
pub trait FrameSink: Send + Sync {
    fn deliver(&self, conn: ConnectionId, frame: Frame);
}

/// Logs each frame and drops it.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingSink;

impl FrameSink for LoggingSink {
    fn deliver(&self, conn: ConnectionId, frame: Frame) {
        tracing::info!(
            conn = %conn,
            verb = frame.verb(),
            headers = frame.headers().len(),
            body_len = frame.body().len(),
            "frame = {}",
            frame
        );
    }
}

/// Forwards frames into an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<(ConnectionId, Frame)>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::UnboundedSender<(ConnectionId, Frame)>) -> Self {
        Self { tx }
    }

    /// Creates a sink along with the receiving end of its channel.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<(ConnectionId, Frame)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl FrameSink for ChannelSink {
    fn deliver(&self, conn: ConnectionId, frame: Frame) {
        if self.tx.send((conn, frame)).is_err() {
            tracing::warn!(conn = %conn, "Frame receiver dropped, discarding frame");
        }
    }
}
