//! stompd - minimal frame protocol server
//!
//! Accepts client connections and decodes the frames they send.

pub mod config;
pub mod server;
pub mod stomp;
