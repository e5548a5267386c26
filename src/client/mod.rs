//! Riemann clients.
//!
//! - [`SyncClient`]: blocking request/response over TCP or TLS, with one
//!   reconnect per message
//! - [`DatagramClient`]: blocking fire-and-forget over UDP
//! - `PipelinedClient`: async, many requests in flight on one connection
//!   (requires `pipelined`)
//! - `BufferedClient`: async, queue plus background flush and reconnect
//!   (requires `pipelined`)

mod blocking;
mod config;
mod datagram;

#[cfg(feature = "pipelined")]
mod buffered;
#[cfg(feature = "pipelined")]
mod pipelined;
#[cfg(feature = "pipelined")]
mod queue;

pub use blocking::*;
pub use config::*;
pub use datagram::*;

#[cfg(feature = "pipelined")]
pub use buffered::{BufferedClient, BufferedStats};
#[cfg(feature = "pipelined")]
pub use pipelined::{PipelinedClient, ResponseHandle};
