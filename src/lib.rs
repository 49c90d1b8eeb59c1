//! Rust client SDK for ailoop servers.
//!
//! ailoop routes structured messages between automated agents and the humans
//! supervising them: questions, authorization requests, notifications,
//! navigation commands, and task-lifecycle events. This crate provides the
//! typed message model, its JSON wire format, and an async client for the
//! server's HTTP API and WebSocket push channel.
//!
//! # Module Organization
//!
//! - [`types`] - Message envelope, content variants, tasks, health
//! - [`codec`] - JSON encoding and validated decoding
//! - [`client`] - [`AiloopClient`] over HTTP and WebSocket
//! - [`config`] - [`ClientConfig`] from code, TOML, or environment
//! - [`error`] - [`Error`] taxonomy
//! - [`clock`] - Injectable time source for message construction
//!
//! # Example
//!
//! ```
//! use ailoop_sdk::{Message, MessageContent, NotificationPriority};
//!
//! let question = Message::create_question("ops", "Restart the cluster?", None, None)?;
//! let wire = question.to_json()?;
//!
//! let decoded = Message::from_json(&wire)?;
//! assert!(matches!(
//!     decoded.content,
//!     MessageContent::Question { timeout_seconds: 60, .. }
//! ));
//! # Ok::<(), ailoop_sdk::Error>(())
//! ```

pub mod client;
pub mod clock;
pub mod codec;
pub mod config;
pub mod error;
#[cfg(feature = "logging")]
pub mod logging;
pub mod types;

// Re-exports for ergonomic access
pub use client::websocket::{ConnectionEvent, ConnectionHandler, MessageHandler};
pub use client::AiloopClient;
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::ClientConfig;
pub use error::{Error, ErrorKind, Origin, Result};
#[cfg(feature = "logging")]
pub use logging::{init_logging, init_logging_with};
pub use types::*;
