//! Blocking stream transports (TCP, and TLS on top of it).
//!
//! A [`Transport`] owns one connection and performs one request/response
//! exchange per [`Transport::write`]. It knows nothing about messages.

use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::{debug, trace, warn};

use super::frame::{encode_frame, read_frame};
use crate::core::constants::{DEFAULT_SOCKET_TIMEOUT, MAX_FRAME_SIZE};
use crate::core::{TransportError, TransportResult};

/// One raw duplex connection with a blocking round trip.
pub trait Transport {
    /// Send `payload` framed, then block until the full response frame is read.
    fn write(&mut self, payload: &[u8]) -> TransportResult<Vec<u8>>;

    /// Release the connection.
    fn close(&mut self) -> TransportResult<()>;
}

/// Opens transports for a client; one call per (re)connect.
pub trait TransportFactory {
    /// Transport produced by this factory.
    type Transport: Transport;

    /// Open a new connection to `host:port`.
    fn open(&self, host: &str, port: u16) -> TransportResult<Self::Transport>;
}

/// Streams that know how to shut themselves down.
pub trait CloseStream: Read + Write {
    /// Orderly shutdown of both directions.
    fn close_stream(&mut self) -> io::Result<()>;
}

impl CloseStream for TcpStream {
    fn close_stream(&mut self) -> io::Result<()> {
        self.shutdown(Shutdown::Both)
    }
}

/// Resolve `host:port` into candidate addresses, in resolver order.
pub fn resolve(host: &str, port: u16) -> TransportResult<Vec<SocketAddr>> {
    let target = format!("{host}:{port}");
    let addrs: Vec<SocketAddr> = (host, port)
        .to_socket_addrs()
        .map_err(|source| TransportError::Resolve {
            target: target.clone(),
            source,
        })?
        .collect();

    if addrs.is_empty() {
        return Err(TransportError::Resolve {
            target,
            source: io::Error::new(io::ErrorKind::NotFound, "no addresses"),
        });
    }
    Ok(addrs)
}

/// Connect to the first resolved address that accepts, with socket timeouts set.
pub fn connect_tcp(host: &str, port: u16, timeout: Duration) -> TransportResult<TcpStream> {
    let target = format!("{host}:{port}");
    let mut last_err = None;

    for addr in resolve(host, port)? {
        debug!(%addr, "opening tcp connection");
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(stream) => {
                stream.set_read_timeout(Some(timeout))?;
                stream.set_write_timeout(Some(timeout))?;
                stream.set_nodelay(true)?;
                return Ok(stream);
            }
            Err(e) => {
                warn!(%addr, error = %e, "tcp connect failed");
                last_err = Some(e);
            }
        }
    }

    Err(TransportError::Connect {
        target,
        source: last_err.unwrap_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no addresses")),
    })
}

/// Length-framed request/response over any blocking stream.
#[derive(Debug)]
pub struct StreamTransport<S> {
    stream: S,
    max_frame_size: usize,
}

/// Plain TCP transport.
pub type TcpTransport = StreamTransport<TcpStream>;

impl<S: CloseStream> StreamTransport<S> {
    /// Wrap an already-connected stream.
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            max_frame_size: MAX_FRAME_SIZE,
        }
    }

    /// Set the largest response payload accepted.
    pub fn with_max_frame_size(mut self, max: usize) -> Self {
        self.max_frame_size = max;
        self
    }

    /// Get a reference to the underlying stream.
    pub fn inner(&self) -> &S {
        &self.stream
    }
}

impl<S: CloseStream> Transport for StreamTransport<S> {
    fn write(&mut self, payload: &[u8]) -> TransportResult<Vec<u8>> {
        let frame = encode_frame(payload)?;
        trace!(len = payload.len(), "sending frame");
        self.stream.write_all(&frame)?;
        self.stream.flush()?;

        let response = read_frame(&mut self.stream, self.max_frame_size)?;
        trace!(len = response.len(), "received frame");
        Ok(response)
    }

    fn close(&mut self) -> TransportResult<()> {
        self.stream.close_stream()?;
        Ok(())
    }
}

/// Factory for plain TCP transports.
#[derive(Debug, Clone)]
pub struct TcpFactory {
    timeout: Duration,
}

impl Default for TcpFactory {
    fn default() -> Self {
        Self::new(DEFAULT_SOCKET_TIMEOUT)
    }
}

impl TcpFactory {
    /// Create a factory with the given socket timeout.
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl TransportFactory for TcpFactory {
    type Transport = TcpTransport;

    fn open(&self, host: &str, port: u16) -> TransportResult<TcpTransport> {
        Ok(StreamTransport::new(connect_tcp(host, port, self.timeout)?))
    }
}

#[cfg(test)]
mod tests {
    use std::net::TcpListener;
    use std::thread;

    use super::*;
    use crate::core::FrameError;

    #[test]
    fn test_resolve_localhost() {
        let addrs = resolve("127.0.0.1", 5555).unwrap();
        assert_eq!(addrs, vec!["127.0.0.1:5555".parse::<SocketAddr>().unwrap()]);
    }

    #[test]
    fn test_connect_refused() {
        // Bind then drop to get a port nobody listens on
        let port = TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let err = TcpFactory::default().open("127.0.0.1", port).unwrap_err();
        assert!(matches!(err, TransportError::Connect { .. }));
    }

    #[test]
    fn test_tcp_round_trip() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = thread::spawn(move || {
            let (mut sock, _) = listener.accept().unwrap();
            let request = read_frame(&mut sock, MAX_FRAME_SIZE).unwrap();
            let mut reply = request.clone();
            reply.reverse();
            sock.write_all(&encode_frame(&reply).unwrap()).unwrap();
            request
        });

        let mut transport = TcpFactory::default().open("127.0.0.1", port).unwrap();
        let response = transport.write(b"abc").unwrap();
        assert_eq!(response, b"cba");
        assert_eq!(server.join().unwrap(), b"abc");
        transport.close().unwrap();
    }

    #[test]
    fn test_peer_closes_mid_frame() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = thread::spawn(move || {
            let (mut sock, _) = listener.accept().unwrap();
            let _ = read_frame(&mut sock, MAX_FRAME_SIZE).unwrap();
            // Promise 100 bytes, deliver 2
            sock.write_all(&100u32.to_be_bytes()).unwrap();
            sock.write_all(b"xy").unwrap();
        });

        let mut transport = TcpFactory::default().open("127.0.0.1", port).unwrap();
        let err = transport.write(b"ping").unwrap_err();
        server.join().unwrap();
        assert!(matches!(
            err,
            TransportError::Frame(FrameError::Truncated {
                expected: 100,
                actual: 2
            })
        ));
    }
}
