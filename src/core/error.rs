//! Error types for the Riemann client.

use std::io;
use std::sync::Arc;

use thiserror::Error;

/// Errors that can occur while splitting a byte stream into frames.
#[derive(Debug, Error)]
pub enum FrameError {
    /// The peer closed before supplying the promised number of bytes.
    #[error("truncated frame: expected {expected} bytes, got {actual}")]
    Truncated {
        /// Bytes promised by the header (or the header itself).
        expected: usize,
        /// Bytes actually read before EOF.
        actual: usize,
    },

    /// Length header exceeds what we are willing to buffer.
    #[error("frame too large: {len} bytes (max {max})")]
    TooLarge {
        /// Length announced or requested.
        len: usize,
        /// Configured maximum.
        max: usize,
    },
}

/// Failure to establish or use a raw connection.
///
/// Always local to one connection attempt.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Name resolution produced no usable address.
    #[error("could not resolve {target}: {source}")]
    Resolve {
        /// The `host:port` that was looked up.
        target: String,
        /// Underlying resolver error.
        #[source]
        source: io::Error,
    },

    /// Every resolved address refused the connection.
    #[error("could not connect to {target}: {source}")]
    Connect {
        /// The `host:port` that was dialled.
        target: String,
        /// Error from the last candidate address.
        #[source]
        source: io::Error,
    },

    /// TLS handshake or server name failure.
    #[error("tls handshake with {target} failed: {reason}")]
    Handshake {
        /// The `host:port` that was dialled.
        target: String,
        /// Human-readable cause.
        reason: String,
    },

    /// Framing error on the stream.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// I/O error mid-stream.
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// A frame was read but its payload is not a valid message.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Protobuf decoding failed.
    #[error("malformed message: {0}")]
    Decode(#[from] prost::DecodeError),

    /// A response frame arrived while no request was waiting for one.
    #[error("unsolicited response frame ({len} bytes)")]
    Unsolicited {
        /// Payload length of the stray frame.
        len: usize,
    },
}

/// Errors in TLS material or client configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A certificate could not be parsed or added to the trust store.
    #[error("certificate error: {0}")]
    Certificate(String),

    /// The private key could not be parsed.
    #[error("private key error: {0}")]
    PrivateKey(String),

    /// The TLS configuration could not be assembled.
    #[error("tls configuration error: {0}")]
    Tls(String),
}

/// Top-level client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Transport failure.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Malformed response.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The operation needs an established connection.
    #[error("not connected")]
    NotConnected,

    /// The connection was torn down while the request was in flight.
    ///
    /// Every request pending at that moment carries the same cause.
    #[error("connection lost: {0}")]
    ConnectionLost(Arc<ClientError>),

    /// A request was abandoned part-way through its write.
    #[error("request cancelled while writing")]
    Cancelled,

    /// The caller explicitly disconnected.
    #[error("disconnected by client")]
    Disconnected,

    /// The client has been shut down.
    #[error("client shut down")]
    Shutdown,
}

impl ClientError {
    /// The shared disconnect cause, if this error is a lost connection.
    pub fn cause(&self) -> Option<&Arc<ClientError>> {
        match self {
            ClientError::ConnectionLost(cause) => Some(cause),
            _ => None,
        }
    }

    /// Whether the connection should be considered unusable after this error.
    pub fn is_connection_fatal(&self) -> bool {
        matches!(
            self,
            ClientError::Transport(_) | ClientError::Protocol(_) | ClientError::ConnectionLost(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_error_display() {
        let err = FrameError::Truncated {
            expected: 10,
            actual: 3,
        };
        assert_eq!(err.to_string(), "truncated frame: expected 10 bytes, got 3");
    }

    #[test]
    fn test_transport_error_from_frame() {
        let err: TransportError = FrameError::TooLarge { len: 9, max: 8 }.into();
        assert!(matches!(err, TransportError::Frame(FrameError::TooLarge { .. })));
    }

    #[test]
    fn test_connection_lost_cause() {
        let cause = Arc::new(ClientError::NotConnected);
        let err = ClientError::ConnectionLost(cause.clone());
        assert!(Arc::ptr_eq(err.cause().unwrap(), &cause));
        assert!(err.is_connection_fatal());
        assert!(!ClientError::NotConnected.is_connection_fatal());
        assert!(ClientError::NotConnected.cause().is_none());
    }
}
