//! Text frame protocol implementation.
//!
//! Frames are a verb line, `name: value` header lines, a blank line and an
//! optional body:
//!
//! ```text
//! SEND
//! destination: /queue/a
//! length: 5
//!
//! hello
//! ```
//!
//! The body ends either after the number of bytes declared by a `length`
//! header, or at the first zero byte when no such header is present.
//!
//! # Architecture
//!
//! - **`frame`**: the immutable decoded [`Frame`]
//! - **`parser`**: [`read_frame`], which decodes one frame from a buffered reader
//! - **`writer`**: encodes frames with either body framing
//! - **`sink`**: where decoded frames go
//! - **`connection`**: the per-client read loop
//!
//! # Connection State Machine
//!
//! ```text
//!        ┌─────────────┐
//!        │   Reading   │ ← Wait for the next frame (or a stop request)
//!        └──────┬──────┘
//!               │ Frame decoded
//!               ▼
//!        ┌──────────────────┐
//!        │   Delivering     │ ← Hand the frame to the sink
//!        └──────┬───────────┘
//!               ├─ → Reading (same connection)
//!               └─ EOF / error / stop → Closed
//! ```

pub mod connection;
pub mod frame;
pub mod parser;
pub mod sink;
pub mod writer;

pub use frame::Frame;
pub use parser::{FrameError, read_frame};
pub use sink::{ChannelSink, FrameSink, LoggingSink};
pub use writer::{BodyFraming, encode_frame, write_frame};
