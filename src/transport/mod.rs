//! Transport layer.
//!
//! Owns raw connections and the length-prefixed framing; knows nothing
//! about message semantics. It provides:
//!
//! - **Framing**: [`encode_frame`], [`read_frame`] and (async) `read_frame_async`
//! - **Blocking transports**: [`TcpTransport`], `TlsTransport`, [`UdpTransport`]
//! - **Async connectors**: `TcpConnector`, `TlsConnector` (with `pipelined`)
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │   SyncClient / PipelinedClient          │
//! ├─────────────────────────────────────────┤
//! │   Message codec (protobuf)              │
//! ├─────────────────────────────────────────┤
//! │   Framing (u32 BE length prefix)        │  ← This module
//! ├─────────────────────────────────────────┤
//! │   TCP  │  TLS over TCP  │  UDP (bare)   │
//! └─────────────────────────────────────────┘
//! ```

mod frame;
mod socket;
mod stream;

#[cfg(feature = "tls")]
mod tls;

#[cfg(feature = "pipelined")]
mod connector;

pub use frame::*;
pub use socket::*;
pub use stream::*;

#[cfg(feature = "tls")]
pub use tls::{TlsConfig, TlsConfigBuilder, TlsFactory, TlsStream, TlsTransport};

#[cfg(feature = "pipelined")]
pub use connector::*;
