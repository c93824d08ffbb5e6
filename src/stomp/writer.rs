use crate::stomp::frame::{Frame, LENGTH_HEADER};
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// How the end of the body is marked on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyFraming {
    /// A `length` header declaring the body size. Safe for binary bodies.
    Length,
    /// A single zero byte after the body. Only for bodies without zero bytes.
    Terminated,
}

/// Serializes a frame into its wire representation.
///
/// Any `length` header already on the frame is ignored; with
/// [`BodyFraming::Length`] it is regenerated from the actual body size.
pub fn encode_frame(frame: &Frame, framing: BodyFraming) -> Vec<u8> {
    let mut buf = Vec::with_capacity(frame.verb().len() + frame.body().len() + 64);

    buf.extend_from_slice(frame.verb().as_bytes());
    buf.push(b'\n');

    for (name, value) in frame.headers() {
        if name == LENGTH_HEADER {
            continue;
        }
        buf.extend_from_slice(name.as_bytes());
        buf.extend_from_slice(b": ");
        buf.extend_from_slice(value.as_bytes());
        buf.push(b'\n');
    }

    if framing == BodyFraming::Length {
        buf.extend_from_slice(format!("{}: {}\n", LENGTH_HEADER, frame.body().len()).as_bytes());
    }

    // Header/body separator
    buf.push(b'\n');

    buf.extend_from_slice(frame.body());

    if framing == BodyFraming::Terminated {
        buf.push(0);
    }

    buf
}

/// Encodes `frame` and writes all of it to `stream`.
pub async fn write_frame<W>(
    stream: &mut W,
    frame: &Frame,
    framing: BodyFraming,
) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    stream.write_all(&encode_frame(frame, framing)).await?;
    stream.flush().await
}
