//! Events, the message envelope, and their protobuf encoding.
//!
//! The domain types ([`Event`], [`Message`]) are what callers build and
//! inspect; [`wire`] holds the protobuf structs they convert to and from.

mod envelope;
mod event;
pub mod wire;

pub use envelope::*;
pub use event::*;
