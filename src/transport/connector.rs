//! Async stream connectors for the pipelined client.
//!
//! A [`StreamConnector`] produces any `AsyncRead + AsyncWrite` stream, so the
//! pipelined client can run over TCP, TLS or an in-memory duplex pipe.

use std::future::Future;
use std::io;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{lookup_host, TcpStream};
use tracing::{debug, warn};

use crate::core::constants::DEFAULT_SOCKET_TIMEOUT;
use crate::core::{TransportError, TransportResult};

/// Opens async duplex streams to a server.
pub trait StreamConnector: Send + Sync + 'static {
    /// Stream produced by this connector.
    type Stream: AsyncRead + AsyncWrite + Send + Unpin + 'static;

    /// Open a new connection to `host:port`.
    fn connect(
        &self,
        host: &str,
        port: u16,
    ) -> impl Future<Output = TransportResult<Self::Stream>> + Send;
}

/// Plain TCP connector.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    timeout: Duration,
}

impl Default for TcpConnector {
    fn default() -> Self {
        Self::new(DEFAULT_SOCKET_TIMEOUT)
    }
}

impl TcpConnector {
    /// Create a connector with the given connect timeout.
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl StreamConnector for TcpConnector {
    type Stream = TcpStream;

    async fn connect(&self, host: &str, port: u16) -> TransportResult<TcpStream> {
        let target = format!("{host}:{port}");
        let addrs = lookup_host((host, port))
            .await
            .map_err(|source| TransportError::Resolve {
                target: target.clone(),
                source,
            })?;

        let mut last_err = None;
        for addr in addrs {
            debug!(%addr, "opening tcp connection");
            let err = match tokio::time::timeout(self.timeout, TcpStream::connect(addr)).await {
                Ok(Ok(stream)) => {
                    stream.set_nodelay(true)?;
                    return Ok(stream);
                }
                Ok(Err(e)) => e,
                Err(_) => io::Error::new(io::ErrorKind::TimedOut, "connect timed out"),
            };
            warn!(%addr, error = %err, "tcp connect failed");
            last_err = Some(err);
        }

        match last_err {
            Some(source) => Err(TransportError::Connect { target, source }),
            None => Err(TransportError::Resolve {
                target,
                source: io::Error::new(io::ErrorKind::NotFound, "no addresses"),
            }),
        }
    }
}

/// TLS-over-TCP connector.
#[cfg(feature = "tls-async")]
#[derive(Debug, Clone)]
pub struct TlsConnector {
    tcp: TcpConnector,
    tls: super::tls::TlsConfig,
    timeout: Duration,
}

#[cfg(feature = "tls-async")]
impl TlsConnector {
    /// Create a connector with the default timeout.
    pub fn new(tls: super::tls::TlsConfig) -> Self {
        Self::with_timeout(tls, DEFAULT_SOCKET_TIMEOUT)
    }

    /// Create a connector whose connect and handshake each get `timeout`.
    pub fn with_timeout(tls: super::tls::TlsConfig, timeout: Duration) -> Self {
        Self {
            tcp: TcpConnector::new(timeout),
            tls,
            timeout,
        }
    }
}

#[cfg(feature = "tls-async")]
impl StreamConnector for TlsConnector {
    type Stream = tokio_rustls::client::TlsStream<TcpStream>;

    async fn connect(&self, host: &str, port: u16) -> TransportResult<Self::Stream> {
        let stream = self.tcp.connect(host, port).await?;
        let name = super::tls::server_name(host, port)?;
        let handshake_err = |reason: String| TransportError::Handshake {
            target: format!("{host}:{port}"),
            reason,
        };

        debug!(host, port, "performing tls handshake");
        match tokio::time::timeout(self.timeout, self.tls.connector().connect(name, stream)).await {
            Ok(Ok(tls)) => Ok(tls),
            Ok(Err(e)) => Err(handshake_err(e.to_string())),
            Err(_) => Err(handshake_err("handshake timed out".into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use super::*;

    #[tokio::test]
    async fn test_tcp_connector() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4];
            sock.read_exact(&mut buf).await.unwrap();
            buf
        });

        let mut stream = TcpConnector::default().connect("127.0.0.1", port).await.unwrap();
        stream.write_all(b"ping").await.unwrap();
        assert_eq!(&server.await.unwrap(), b"ping");
    }

    #[tokio::test]
    async fn test_tcp_connector_refused() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };
        let err = TcpConnector::default()
            .connect("127.0.0.1", port)
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Connect { .. }));
    }

    #[cfg(feature = "tls-async")]
    #[tokio::test]
    async fn test_tls_connector_round_trip() {
        use crate::transport::frame::{encode_frame, read_frame_async};
        use crate::transport::tls::test_utils::{localhost_cert, server_config};

        let cert = localhost_cert();
        let acceptor = tokio_rustls::TlsAcceptor::from(server_config(&cert));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = tokio::spawn(async move {
            let (sock, _) = listener.accept().await.unwrap();
            let mut tls = acceptor.accept(sock).await.unwrap();
            let request = read_frame_async(&mut tls, 1024).await.unwrap();
            tls.write_all(&encode_frame(&request).unwrap()).await.unwrap();
            tls.flush().await.unwrap();
        });

        let tls = crate::transport::TlsConfig::builder()
            .ca_cert_pem(cert.cert_pem)
            .build()
            .unwrap();
        let mut stream = TlsConnector::new(tls).connect("localhost", port).await.unwrap();
        stream.write_all(&encode_frame(b"hello").unwrap()).await.unwrap();
        stream.flush().await.unwrap();
        assert_eq!(read_frame_async(&mut stream, 1024).await.unwrap(), b"hello");
        server.await.unwrap();
    }
}
