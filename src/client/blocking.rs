//! Blocking request/response client.
//!
//! One connection, opened lazily. Each message gets at most
//! [`MAX_TRANSMIT_ATTEMPTS`] tries with a reconnect in between; after that
//! the failure is swallowed into an empty response.

use tracing::{debug, warn};

use super::config::ClientConfig;
use crate::core::constants::MAX_TRANSMIT_ATTEMPTS;
use crate::core::{ClientError, TransportResult};
use crate::message::{Event, Message};
use crate::transport::{TcpFactory, Transport, TransportFactory};

/// A blocking client over a stream transport (TCP or TLS).
///
/// Not meant to be shared between threads; give each thread its own.
///
/// # Example
///
/// ```no_run
/// use riemann_client::client::{ClientConfig, SyncClient};
/// use riemann_client::message::Event;
///
/// let mut client = SyncClient::tcp(ClientConfig::default());
/// let accepted = client.send(Event::new().with_service("queue depth").with_metric(42));
/// let results = client.query("service = \"queue depth\"");
/// ```
pub struct SyncClient<F: TransportFactory = TcpFactory> {
    config: ClientConfig,
    factory: F,
    connection: Option<F::Transport>,
}

impl SyncClient<TcpFactory> {
    /// Client over plain TCP.
    pub fn tcp(config: ClientConfig) -> Self {
        let factory = TcpFactory::new(config.timeout);
        Self::new(config, factory)
    }
}

#[cfg(feature = "tls")]
impl SyncClient<crate::transport::TlsFactory> {
    /// Client over TLS, verifying the server against `tls`'s trust roots.
    pub fn tls(config: ClientConfig, tls: crate::transport::TlsConfig) -> Self {
        let factory = crate::transport::TlsFactory::with_timeout(tls, config.timeout);
        Self::new(config, factory)
    }
}

impl<F: TransportFactory> SyncClient<F> {
    /// Create a client that opens connections through `factory`.
    pub fn new(config: ClientConfig, factory: F) -> Self {
        Self {
            config,
            factory,
            connection: None,
        }
    }

    /// Open a fresh connection, replacing any existing one.
    pub fn connect(&mut self) -> TransportResult<()> {
        self.disconnect();
        debug!(server = %self.config.target(), "connecting");
        self.connection = Some(self.factory.open(&self.config.host, self.config.port)?);
        Ok(())
    }

    /// Drop the connection. Close failures are logged, never returned.
    pub fn disconnect(&mut self) {
        if let Some(mut connection) = self.connection.take() {
            if let Err(e) = connection.close() {
                warn!(server = %self.config.target(), error = %e, "error closing connection");
            }
        }
    }

    /// Check if a connection is currently held.
    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// Get the client configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn ensure_connected(&mut self) -> TransportResult<&mut F::Transport> {
        let connection = match self.connection.take() {
            Some(connection) => connection,
            None => {
                debug!(server = %self.config.target(), "connecting");
                self.factory.open(&self.config.host, self.config.port)?
            }
        };
        Ok(self.connection.insert(connection))
    }

    fn attempt(&mut self, payload: &[u8]) -> Result<Message, ClientError> {
        let connection = self.ensure_connected()?;
        let raw = connection.write(payload)?;
        Ok(Message::decode(&raw)?)
    }

    /// Send `message` and return the response, or the last error once every
    /// attempt has failed.
    ///
    /// Unlike [`transmit`](Self::transmit) this lets callers tell a failed
    /// exchange apart from an empty response.
    pub fn try_transmit(&mut self, message: &Message) -> Result<Message, ClientError> {
        let payload = message.encode();
        let mut last_err = None;

        for attempt in 1..=MAX_TRANSMIT_ATTEMPTS {
            match self.attempt(&payload) {
                Ok(response) => return Ok(response),
                Err(e) => {
                    warn!(
                        server = %self.config.target(),
                        attempt,
                        error = %e,
                        "transmit failed"
                    );
                    self.disconnect();
                    last_err = Some(e);
                }
            }
        }

        Err(last_err.unwrap_or(ClientError::NotConnected))
    }

    /// Send `message` and return the response, or [`Message::empty`] once
    /// every attempt has failed.
    pub fn transmit(&mut self, message: &Message) -> Message {
        self.try_transmit(message).unwrap_or_else(|_| Message::empty())
    }

    /// Submit one event. True iff the server acknowledged it.
    pub fn send(&mut self, event: Event) -> bool {
        self.send_batch([event])
    }

    /// Submit several events in one message. True iff the server acknowledged it.
    pub fn send_batch(&mut self, events: impl IntoIterator<Item = Event>) -> bool {
        self.transmit(&Message::event_batch(events)).ok()
    }

    /// Evaluate a query. Empty on failure.
    pub fn query(&mut self, query: impl Into<String>) -> Vec<Event> {
        self.transmit(&Message::query(query)).into_events()
    }
}

impl<F: TransportFactory> Drop for SyncClient<F> {
    fn drop(&mut self) {
        self.disconnect();
    }
}
