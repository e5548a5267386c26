//! # Riemann client
//!
//! A client for the [Riemann](https://riemann.io) event protocol. Events are
//! protobuf messages sent as 4-byte big-endian length-prefixed frames over
//! TCP or TLS, or as bare datagrams over UDP. It provides:
//!
//! - **Blocking**: [`SyncClient`](client::SyncClient) with a fixed
//!   two-attempt reconnect policy
//! - **Datagrams**: [`DatagramClient`](client::DatagramClient), fire-and-forget
//! - **Pipelining**: `PipelinedClient`, many requests in flight on one
//!   connection, matched to responses in FIFO order
//! - **Buffering**: `BufferedClient`, a bounded drop-oldest queue flushed on
//!   an interval with automatic reconnect
//!
//! ## Feature Flags
//!
//! - `pipelined` (default): async clients on Tokio
//! - `tls` (default): blocking TLS transport via rustls
//! - `tls-async` (default): TLS for the async clients via tokio-rustls
//!
//! ## Modules
//!
//! - [`core`]: Constants and error types
//! - [`message`]: Event and message model, protobuf encoding
//! - [`transport`]: Framing and raw connections
//! - [`client`]: The clients
//!
//! ## Example Usage
//!
//! ```no_run
//! use riemann_client::prelude::*;
//!
//! let mut client = SyncClient::tcp(ClientConfig::default());
//!
//! let event = Event::new()
//!     .with_host("web-1")
//!     .with_service("http requests")
//!     .with_metric(1024)
//!     .with_tags(["production"])
//!     .with_attribute("region", "eu-west-1");
//!
//! if !client.send(event) {
//!     eprintln!("event was not acknowledged");
//! }
//!
//! for event in client.query("tagged \"production\"") {
//!     println!("{:?} = {:?}", event.service(), event.metric());
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

// Core module (always included)
pub mod core;

// Data model and wire encoding
pub mod message;

// Framing and connections
pub mod transport;

// Client API
pub mod client;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::client::{BufferedConfig, ClientConfig, DatagramClient, SyncClient};
    pub use crate::core::{ClientError, TransportError, TransportResult};
    pub use crate::message::{Event, IntoMetric, Message, Response};

    #[cfg(feature = "pipelined")]
    pub use crate::client::{BufferedClient, BufferedStats, PipelinedClient, ResponseHandle};

    #[cfg(feature = "tls")]
    pub use crate::transport::TlsConfig;
}

// Re-export commonly used items at crate root
pub use client::{ClientConfig, SyncClient};
pub use core::ClientError;
pub use message::{Event, Message};
