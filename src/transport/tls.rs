//! TLS over TCP.
//!
//! The server certificate is always verified against the configured CA.
//! A client certificate and key may be supplied for mutual TLS.

use std::io;
use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;

use rustls::pki_types::pem::PemObject;
use rustls::pki_types::{CertificateDer, PrivateKeyDer, ServerName};
use rustls::{ClientConfig, ClientConnection, RootCertStore, StreamOwned};
use tracing::debug;

use super::stream::{connect_tcp, CloseStream, StreamTransport, TransportFactory};
use crate::core::constants::DEFAULT_SOCKET_TIMEOUT;
use crate::core::{ConfigError, TransportError, TransportResult};

/// Blocking TLS stream.
pub type TlsStream = StreamOwned<ClientConnection, TcpStream>;

/// Blocking TLS transport.
pub type TlsTransport = StreamTransport<TlsStream>;

impl CloseStream for TlsStream {
    fn close_stream(&mut self) -> io::Result<()> {
        self.conn.send_close_notify();
        if let Err(e) = self.conn.complete_io(&mut self.sock) {
            debug!(error = %e, "error sending close_notify");
        }
        self.sock.shutdown(std::net::Shutdown::Both)
    }
}

/// Parsed TLS client configuration, cheap to clone.
#[derive(Clone)]
pub struct TlsConfig {
    client_config: Arc<ClientConfig>,
}

impl std::fmt::Debug for TlsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsConfig")
            .field("client_config", &"[redacted]")
            .finish()
    }
}

/// Builder for [`TlsConfig`] from PEM material.
#[derive(Default)]
pub struct TlsConfigBuilder {
    ca_cert_pem: Option<Vec<u8>>,
    client_cert_pem: Option<Vec<u8>>,
    client_key_pem: Option<Vec<u8>>,
}

impl TlsConfigBuilder {
    /// Creates a new TLS configuration builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the trust root(s) in PEM format.
    pub fn ca_cert_pem(mut self, pem: impl Into<Vec<u8>>) -> Self {
        self.ca_cert_pem = Some(pem.into());
        self
    }

    /// Sets the client certificate chain in PEM format.
    pub fn client_cert_pem(mut self, pem: impl Into<Vec<u8>>) -> Self {
        self.client_cert_pem = Some(pem.into());
        self
    }

    /// Sets the client private key in PEM format.
    pub fn client_key_pem(mut self, pem: impl Into<Vec<u8>>) -> Self {
        self.client_key_pem = Some(pem.into());
        self
    }

    /// Builds the TLS configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the CA is missing, any material fails to parse,
    /// or only one of client certificate and key is given.
    pub fn build(self) -> Result<TlsConfig, ConfigError> {
        let ca_pem = self
            .ca_cert_pem
            .ok_or_else(|| ConfigError::Certificate("CA certificate required".into()))?;

        let ca_certs = parse_certificates(&ca_pem)?;
        if ca_certs.is_empty() {
            return Err(ConfigError::Certificate("no CA certificates found".into()));
        }

        let mut root_store = RootCertStore::empty();
        for cert in ca_certs {
            root_store
                .add(cert)
                .map_err(|e| ConfigError::Certificate(format!("failed to add CA certificate: {e}")))?;
        }

        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let builder = ClientConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()
            .map_err(|e| ConfigError::Tls(e.to_string()))?
            .with_root_certificates(root_store);

        let client_config = match (self.client_cert_pem, self.client_key_pem) {
            (Some(cert_pem), Some(key_pem)) => {
                let certs = parse_certificates(&cert_pem)?;
                if certs.is_empty() {
                    return Err(ConfigError::Certificate(
                        "no client certificates found".into(),
                    ));
                }
                let key = parse_private_key(&key_pem)?;
                builder
                    .with_client_auth_cert(certs, key)
                    .map_err(|e| ConfigError::Tls(format!("client auth error: {e}")))?
            }
            (None, None) => builder.with_no_client_auth(),
            _ => {
                return Err(ConfigError::Tls(
                    "client certificate and key must be given together".into(),
                ));
            }
        };

        Ok(TlsConfig {
            client_config: Arc::new(client_config),
        })
    }
}

impl TlsConfig {
    /// Creates a new TLS configuration builder.
    pub fn builder() -> TlsConfigBuilder {
        TlsConfigBuilder::new()
    }

    /// Wrap an existing rustls configuration.
    pub fn from_client_config(client_config: Arc<ClientConfig>) -> Self {
        Self { client_config }
    }

    /// The rustls client configuration.
    pub fn client_config(&self) -> Arc<ClientConfig> {
        Arc::clone(&self.client_config)
    }

    /// Creates an async TLS connector.
    #[cfg(feature = "tls-async")]
    pub fn connector(&self) -> tokio_rustls::TlsConnector {
        tokio_rustls::TlsConnector::from(self.client_config())
    }
}

/// Parse the server name used for SNI and certificate verification.
pub(crate) fn server_name(host: &str, port: u16) -> TransportResult<ServerName<'static>> {
    ServerName::try_from(host.to_owned()).map_err(|e| TransportError::Handshake {
        target: format!("{host}:{port}"),
        reason: format!("invalid server name: {e}"),
    })
}

/// Parse PEM-encoded certificates.
fn parse_certificates(pem: &[u8]) -> Result<Vec<CertificateDer<'static>>, ConfigError> {
    CertificateDer::pem_slice_iter(pem)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| ConfigError::Certificate(format!("failed to parse certificates: {e}")))
}

/// Parse a PEM-encoded private key.
fn parse_private_key(pem: &[u8]) -> Result<PrivateKeyDer<'static>, ConfigError> {
    PrivateKeyDer::from_pem_slice(pem)
        .map_err(|e| ConfigError::PrivateKey(format!("failed to parse private key: {e}")))
}

/// Factory for blocking TLS transports.
#[derive(Debug, Clone)]
pub struct TlsFactory {
    tls: TlsConfig,
    timeout: Duration,
}

impl TlsFactory {
    /// Create a factory with the default socket timeout.
    pub fn new(tls: TlsConfig) -> Self {
        Self::with_timeout(tls, DEFAULT_SOCKET_TIMEOUT)
    }

    /// Create a factory with a custom socket timeout.
    pub fn with_timeout(tls: TlsConfig, timeout: Duration) -> Self {
        Self { tls, timeout }
    }
}

impl TransportFactory for TlsFactory {
    type Transport = TlsTransport;

    fn open(&self, host: &str, port: u16) -> TransportResult<TlsTransport> {
        let handshake_err = |reason: String| TransportError::Handshake {
            target: format!("{host}:{port}"),
            reason,
        };

        let mut sock = connect_tcp(host, port, self.timeout)?;
        let mut conn = ClientConnection::new(self.tls.client_config(), server_name(host, port)?)
            .map_err(|e| handshake_err(e.to_string()))?;

        debug!(host, port, "performing tls handshake");
        while conn.is_handshaking() {
            conn.complete_io(&mut sock)
                .map_err(|e| handshake_err(e.to_string()))?;
        }

        Ok(StreamTransport::new(StreamOwned::new(conn, sock)))
    }
}

#[cfg(test)]
pub(crate) mod test_utils {
    use rcgen::{CertificateParams, KeyPair};
    use rustls::ServerConfig;

    use super::*;

    /// Self-signed certificate for `localhost`, usable as its own trust root.
    pub struct TestCert {
        pub cert_pem: String,
        pub key_pem: String,
    }

    pub fn localhost_cert() -> TestCert {
        let key = KeyPair::generate().unwrap();
        let params = CertificateParams::new(vec!["localhost".to_string()]).unwrap();
        let cert = params.self_signed(&key).unwrap();
        TestCert {
            cert_pem: cert.pem(),
            key_pem: key.serialize_pem(),
        }
    }

    pub fn server_config(cert: &TestCert) -> Arc<ServerConfig> {
        let certs = parse_certificates(cert.cert_pem.as_bytes()).unwrap();
        let key = parse_private_key(cert.key_pem.as_bytes()).unwrap();
        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let config = ServerConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()
            .unwrap()
            .with_no_client_auth()
            .with_single_cert(certs, key)
            .unwrap();
        Arc::new(config)
    }
}
