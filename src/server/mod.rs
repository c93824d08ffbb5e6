//! Connection acceptance and bookkeeping.
//!
//! - **`listener`**: the [`Acceptor`], which owns the listening socket and
//!   spawns a task per client
//! - **`registry`**: the shared set of live connections used for shutdown
//!   fan-out and the connection count
//!
//! # Lifecycle
//!
//! ```text
//!   start(addr) ──► bind ──► accept loop ──► Connection::run (one task each)
//!                                │                   │
//!   stop() ──► close listener ───┘                   │
//!          └─► registry.stop_all() ──► shutdown ─────┘
//! ```

pub mod listener;
pub mod registry;

pub use listener::{Acceptor, BindError};
pub use registry::{ConnectionHandle, ConnectionId, ConnectionRegistry};
