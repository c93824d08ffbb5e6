use bytes::Bytes;
use std::collections::HashMap;
use std::fmt;

/// Name of the header that switches a frame to length-prefixed body framing.
pub const LENGTH_HEADER: &str = "length";

/// A single decoded protocol frame.
///
/// Frames are built in one piece by the parser (or by callers that want to
/// encode one) and never change afterwards, so all fields are private and
/// only exposed through accessors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    verb: String,
    headers: HashMap<String, String>,
    body: Bytes,
}

impl Frame {
    /// Creates a frame from its parts.
    ///
    /// An absent body is represented by an empty one.
    pub fn new(
        verb: impl Into<String>,
        headers: HashMap<String, String>,
        body: impl Into<Bytes>,
    ) -> Self {
        Self {
            verb: verb.into(),
            headers,
            body: body.into(),
        }
    }

    /// The first line of the frame (e.g. `SEND`, `SUBSCRIBE`).
    pub fn verb(&self) -> &str {
        &self.verb
    }

    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    /// Looks up a header by its exact name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(|v| v.as_str())
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// The declared body length, if a well-formed `length` header is present.
    pub fn content_length(&self) -> Option<usize> {
        self.header(LENGTH_HEADER).and_then(|v| v.parse().ok())
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.verb)?;
        for (name, value) in &self.headers {
            writeln!(f, "{}: {}", name, value)?;
        }
        if !self.body.is_empty() {
            write!(f, "body: {} bytes", self.body.len())?;
        }
        Ok(())
    }
}
