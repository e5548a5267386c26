//! UDP datagram transport.
//!
//! Datagrams carry a bare serialized message: no length prefix and no
//! response. Acknowledgements do not exist on this path, so a successful
//! [`UdpTransport::write`] only means the datagram left the local socket.

use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};

use tracing::{debug, trace, warn};

use super::stream::resolve;
use crate::core::{TransportError, TransportResult};

/// Largest payload that fits in a single UDP datagram.
pub const MAX_DATAGRAM_SIZE: usize = 65_507;

/// Fire-and-forget UDP socket aimed at one server address.
#[derive(Debug)]
pub struct UdpTransport {
    /// The underlying UDP socket.
    socket: UdpSocket,
    /// Resolved server address.
    target: SocketAddr,
}

impl UdpTransport {
    /// Resolve `host:port` and bind a local socket of the matching family.
    ///
    /// Candidates are tried in resolver order; the first one we can bind a
    /// socket for wins.
    pub fn open(host: &str, port: u16) -> TransportResult<Self> {
        let mut last_err = None;

        for target in resolve(host, port)? {
            let local: SocketAddr = match target {
                SocketAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
                SocketAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
            };
            debug!(%target, "opening udp socket");
            match UdpSocket::bind(local) {
                Ok(socket) => return Ok(Self { socket, target }),
                Err(e) => {
                    warn!(%target, error = %e, "udp socket creation failed");
                    last_err = Some(e);
                }
            }
        }

        Err(TransportError::Connect {
            target: format!("{host}:{port}"),
            source: last_err.unwrap_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no addresses")),
        })
    }

    /// Send one datagram. Never reads a response.
    pub fn write(&mut self, payload: &[u8]) -> TransportResult<()> {
        if payload.len() > MAX_DATAGRAM_SIZE {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("datagram of {} bytes exceeds {MAX_DATAGRAM_SIZE}", payload.len()),
            )
            .into());
        }
        trace!(len = payload.len(), addr = %self.target, "sending datagram");
        self.socket.send_to(payload, self.target)?;
        Ok(())
    }

    /// Release the socket.
    ///
    /// There is no session to end over UDP, so closing cannot fail.
    pub fn close(self) {
        debug!(addr = %self.target, "closing udp socket");
    }

    /// Get the local address.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Get the server address datagrams are sent to.
    pub fn target(&self) -> SocketAddr {
        self.target
    }
}
