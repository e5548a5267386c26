//! Fire-and-forget UDP client.
//!
//! There are no acknowledgements over UDP, so this client has no `query`
//! and `send` only reports whether the datagram left the local socket.

use tracing::{debug, warn};

use super::config::ClientConfig;
use crate::core::constants::MAX_TRANSMIT_ATTEMPTS;
use crate::core::{ClientError, TransportResult};
use crate::message::{Event, Message};
use crate::transport::UdpTransport;

/// A blocking UDP client.
#[derive(Debug)]
pub struct DatagramClient {
    config: ClientConfig,
    connection: Option<UdpTransport>,
}

impl DatagramClient {
    /// Create a client; the socket is opened lazily.
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            connection: None,
        }
    }

    /// Open a fresh socket, replacing any existing one.
    pub fn connect(&mut self) -> TransportResult<()> {
        debug!(server = %self.config.target(), "opening datagram socket");
        self.connection = Some(UdpTransport::open(&self.config.host, self.config.port)?);
        Ok(())
    }

    /// Close the socket.
    pub fn disconnect(&mut self) {
        if let Some(connection) = self.connection.take() {
            connection.close();
        }
    }

    /// Check if a socket is currently held.
    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    fn attempt(&mut self, payload: &[u8]) -> TransportResult<()> {
        let connection = match self.connection.take() {
            Some(connection) => connection,
            None => UdpTransport::open(&self.config.host, self.config.port)?,
        };
        self.connection.insert(connection).write(payload)
    }

    /// Send `message` as one datagram, reopening the socket once on failure.
    pub fn try_send(&mut self, message: &Message) -> Result<(), ClientError> {
        let payload = message.encode();
        let mut last_err = None;

        for attempt in 1..=MAX_TRANSMIT_ATTEMPTS {
            match self.attempt(&payload) {
                Ok(()) => return Ok(()),
                Err(e) => {
                    warn!(
                        server = %self.config.target(),
                        attempt,
                        error = %e,
                        "datagram send failed"
                    );
                    self.disconnect();
                    last_err = Some(e);
                }
            }
        }

        Err(last_err.map_or(ClientError::NotConnected, ClientError::from))
    }

    /// Submit one event. True iff the datagram was handed to the network.
    pub fn send(&mut self, event: Event) -> bool {
        self.send_batch([event])
    }

    /// Submit several events in one datagram.
    pub fn send_batch(&mut self, events: impl IntoIterator<Item = Event>) -> bool {
        self.try_send(&Message::event_batch(events)).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use std::net::UdpSocket;

    use super::*;

    #[test]
    fn test_send_is_fire_and_forget() {
        let server = UdpSocket::bind("127.0.0.1:0").unwrap();
        let port = server.local_addr().unwrap().port();
        let mut client = DatagramClient::new(ClientConfig::builder().port(port).build());

        let event = Event::new().with_service("udp").with_metric(7);
        assert!(client.send(event.clone()));
        assert!(client.is_connected());

        let mut buf = [0u8; 1024];
        let (len, _) = server.recv_from(&mut buf).unwrap();
        // Bare message, no length prefix
        let received = Message::decode(&buf[..len]).unwrap();
        assert_eq!(received, Message::event_batch([event]));
    }

    #[test]
    fn test_disconnect_then_send_reopens() {
        let server = UdpSocket::bind("127.0.0.1:0").unwrap();
        let port = server.local_addr().unwrap().port();
        let mut client = DatagramClient::new(ClientConfig::builder().port(port).build());

        client.connect().unwrap();
        client.disconnect();
        assert!(!client.is_connected());

        assert!(client.send(Event::new().with_service("after close")));
        assert!(client.is_connected());
        let mut buf = [0u8; 1024];
        let (len, _) = server.recv_from(&mut buf).unwrap();
        let received = Message::decode(&buf[..len]).unwrap();
        assert_eq!(received.events()[0].service(), Some("after close"));
    }

    #[test]
    fn test_oversized_batch_fails() {
        let mut client = DatagramClient::new(ClientConfig::default());
        let description = "x".repeat(70_000);
        assert!(!client.send(Event::new().with_description(description)));
        assert!(!client.is_connected());
    }
}
