//! Client configuration and builders.

use std::time::Duration;

use crate::core::constants::{
    DEFAULT_HOST, DEFAULT_MAX_QUEUE_SIZE, DEFAULT_RECONNECT_TIMEOUT, DEFAULT_SEND_INTERVAL,
    DEFAULT_SOCKET_TIMEOUT, DEFAULT_TCP_PORT, DEFAULT_TLS_PORT,
};

/// Connection settings shared by every client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Server host name or address.
    pub host: String,

    /// Server port.
    pub port: u16,

    /// Socket timeout for connect, read and write.
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_TCP_PORT,
            timeout: DEFAULT_SOCKET_TIMEOUT,
        }
    }
}

impl ClientConfig {
    /// Defaults for a TLS server (port 5554).
    pub fn tls_defaults() -> Self {
        Self {
            port: DEFAULT_TLS_PORT,
            ..Self::default()
        }
    }

    /// Create a config builder.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::new()
    }

    /// `host:port`, for logging.
    pub fn target(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Builder for creating a [`ClientConfig`].
#[derive(Debug, Default)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the server host.
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    /// Set the server port.
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Set the socket timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Build the configuration.
    pub fn build(self) -> ClientConfig {
        self.config
    }
}

/// Settings for the buffered client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferedConfig {
    /// Connection settings.
    pub client: ClientConfig,

    /// Flush cadence.
    pub send_interval: Duration,

    /// Fixed retry cadence after a connect or transmit failure.
    pub reconnect_timeout: Duration,

    /// Queue bound; the oldest message is dropped past this.
    pub max_queue_size: usize,
}

impl Default for BufferedConfig {
    fn default() -> Self {
        Self {
            client: ClientConfig::default(),
            send_interval: DEFAULT_SEND_INTERVAL,
            reconnect_timeout: DEFAULT_RECONNECT_TIMEOUT,
            max_queue_size: DEFAULT_MAX_QUEUE_SIZE,
        }
    }
}

impl BufferedConfig {
    /// Create a config builder.
    pub fn builder() -> BufferedConfigBuilder {
        BufferedConfigBuilder::new()
    }
}

/// Builder for creating a [`BufferedConfig`].
#[derive(Debug, Default)]
pub struct BufferedConfigBuilder {
    config: BufferedConfig,
}

impl BufferedConfigBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the connection settings.
    pub fn client(mut self, client: ClientConfig) -> Self {
        self.config.client = client;
        self
    }

    /// Set the server host.
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.client.host = host.into();
        self
    }

    /// Set the server port.
    pub fn port(mut self, port: u16) -> Self {
        self.config.client.port = port;
        self
    }

    /// Set the flush cadence.
    pub fn send_interval(mut self, interval: Duration) -> Self {
        self.config.send_interval = interval;
        self
    }

    /// Set the retry cadence.
    pub fn reconnect_timeout(mut self, timeout: Duration) -> Self {
        self.config.reconnect_timeout = timeout;
        self
    }

    /// Set the queue bound.
    pub fn max_queue_size(mut self, size: usize) -> Self {
        self.config.max_queue_size = size;
        self
    }

    /// Build the configuration.
    pub fn build(self) -> BufferedConfig {
        self.config
    }
}
