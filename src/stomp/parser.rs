use crate::stomp::frame::{Frame, LENGTH_HEADER};
use std::collections::HashMap;
use std::io::ErrorKind;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

/// Upper bound on the buffer reserved up front for a length-prefixed body.
/// Larger bodies still decode, the buffer just grows as bytes arrive.
const BODY_PREALLOC_LIMIT: usize = 64 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The stream ended while the verb, a header line or a declared body was
    /// still expected.
    #[error("end of stream while reading {context}")]
    EndOfStream { context: &'static str },

    /// The `length` header is not a non-negative decimal integer.
    #[error("malformed length header: {value:?}")]
    MalformedLength { value: String },

    #[error("transport failure: {0}")]
    Io(#[from] std::io::Error),
}

impl FrameError {
    /// True when the peer went away between or inside frames.
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, FrameError::EndOfStream { .. })
    }
}

/// Reads exactly one frame from `reader`.
///
/// The body is located in one of two ways, chosen per frame:
///
/// - with a `length` header, exactly that many raw bytes follow the blank
///   line and nothing after them is consumed
/// - without one, bytes are collected until a zero byte (consumed, not part
///   of the body) or the end of the stream
///
/// Header lines without a colon are skipped. When a header name repeats, the
/// last value wins.
pub async fn read_frame<R>(reader: &mut R) -> Result<Frame, FrameError>
where
    R: AsyncBufRead + Unpin,
{
    let verb = read_line(reader)
        .await?
        .ok_or(FrameError::EndOfStream { context: "verb" })?;

    let mut headers = HashMap::new();
    loop {
        let line = read_line(reader)
            .await?
            .ok_or(FrameError::EndOfStream { context: "header" })?;

        if line.is_empty() {
            break;
        }

        if let Some((name, value)) = line.split_once(':') {
            headers.insert(name.trim().to_string(), value.trim().to_string());
        }
    }

    let body = match headers.get(LENGTH_HEADER) {
        Some(value) => {
            let len = value
                .parse::<usize>()
                .map_err(|_| FrameError::MalformedLength {
                    value: value.clone(),
                })?;
            read_exact_body(reader, len).await?
        }
        None => read_terminated_body(reader).await?,
    };

    Ok(Frame::new(verb, headers, body))
}

/// Reads one line without its `\n` (or `\r\n`) terminator.
///
/// Returns `None` only when the stream is already exhausted. A trailing line
/// cut off by the end of the stream is returned as is.
async fn read_line<R>(reader: &mut R) -> Result<Option<String>, FrameError>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    let n = reader.read_until(b'\n', &mut buf).await?;
    if n == 0 {
        return Ok(None);
    }

    if buf.last() == Some(&b'\n') {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
    }

    Ok(Some(String::from_utf8_lossy(&buf).into_owned()))
}

async fn read_exact_body<R>(reader: &mut R, len: usize) -> Result<Vec<u8>, FrameError>
where
    R: AsyncBufRead + Unpin,
{
    let mut body = Vec::with_capacity(len.min(BODY_PREALLOC_LIMIT));
    let n = reader.take(len as u64).read_to_end(&mut body).await.map_err(|e| {
        if e.kind() == ErrorKind::UnexpectedEof {
            FrameError::EndOfStream { context: "body" }
        } else {
            FrameError::Io(e)
        }
    })?;

    if n < len {
        return Err(FrameError::EndOfStream { context: "body" });
    }

    Ok(body)
}

async fn read_terminated_body<R>(reader: &mut R) -> Result<Vec<u8>, FrameError>
where
    R: AsyncBufRead + Unpin,
{
    let mut body = Vec::new();
    reader.read_until(0, &mut body).await?;
    if body.last() == Some(&0) {
        body.pop();
    }
    Ok(body)
}
