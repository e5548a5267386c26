//! Protocol constants and client defaults.
//!
//! Wire-level values are fixed by the server and MUST NOT be changed.

use std::time::Duration;

// =============================================================================
// ENDPOINTS
// =============================================================================

/// Default server host.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default plain TCP (and UDP) port.
pub const DEFAULT_TCP_PORT: u16 = 5555;

/// Default TLS port.
pub const DEFAULT_TLS_PORT: u16 = 5554;

// =============================================================================
// FRAMING
// =============================================================================

/// Length header size (u32 big-endian).
pub const FRAME_HEADER_SIZE: usize = 4;

/// Largest response payload we are willing to buffer.
///
/// A length header above this is treated as a malformed frame.
pub const MAX_FRAME_SIZE: usize = 64 * 1024 * 1024;

// =============================================================================
// TIMING
// =============================================================================

/// Socket timeout for connect, read and write.
pub const DEFAULT_SOCKET_TIMEOUT: Duration = Duration::from_secs(15);

/// Buffered client flush cadence.
pub const DEFAULT_SEND_INTERVAL: Duration = Duration::from_secs(1);

/// Buffered client retry cadence after a connect or transmit failure.
pub const DEFAULT_RECONNECT_TIMEOUT: Duration = Duration::from_secs(1);

// =============================================================================
// LIMITS
// =============================================================================

/// Buffered client queue bound (oldest entries are evicted past this).
pub const DEFAULT_MAX_QUEUE_SIZE: usize = 2000;

/// Total attempts a blocking client makes per message (one reconnect).
pub const MAX_TRANSMIT_ATTEMPTS: usize = 2;
