//! Buffered fire-and-forget client.
//!
//! `send` only enqueues. A background task owns a [`PipelinedClient`],
//! flushes the queue every `send_interval`, and after any connect or
//! transmit failure waits a fixed `reconnect_timeout` before trying again.
//! When the queue is full the oldest message is dropped.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::config::BufferedConfig;
use super::pipelined::PipelinedClient;
use super::queue::OutgoingQueue;
use crate::core::ClientError;
use crate::message::{Event, Message};
use crate::transport::{StreamConnector, TcpConnector};

/// Counters since the client was spawned.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BufferedStats {
    /// Messages accepted by `send`.
    pub enqueued: u64,
    /// Messages evicted because the queue was full.
    pub dropped: u64,
    /// Messages the server answered.
    pub sent: u64,
    /// Messages lost to a connection failure mid-flush.
    pub failed: u64,
}

#[derive(Debug, Default)]
struct Counters {
    enqueued: AtomicU64,
    dropped: AtomicU64,
    sent: AtomicU64,
    failed: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> BufferedStats {
        BufferedStats {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            sent: self.sent.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// A client whose `send` never blocks on the network.
///
/// # Example
///
/// ```no_run
/// use riemann_client::client::{BufferedClient, BufferedConfig};
/// use riemann_client::message::Event;
///
/// # async fn run() {
/// let client = BufferedClient::tcp(BufferedConfig::default());
/// client.send(Event::new().with_service("requests").with_metric(1));
///
/// // Flush what is left before exiting
/// client.shutdown().await;
/// # }
/// ```
#[derive(Debug)]
pub struct BufferedClient {
    queue: Arc<Mutex<OutgoingQueue>>,
    counters: Arc<Counters>,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl BufferedClient {
    /// Spawn a buffered client over plain TCP.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime.
    pub fn tcp(config: BufferedConfig) -> Self {
        let connector = TcpConnector::new(config.client.timeout);
        Self::spawn(config, connector)
    }

    /// Spawn a buffered client over TLS.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime.
    #[cfg(feature = "tls-async")]
    pub fn tls(config: BufferedConfig, tls: crate::transport::TlsConfig) -> Self {
        let connector = crate::transport::TlsConnector::with_timeout(tls, config.client.timeout);
        Self::spawn(config, connector)
    }

    /// Spawn the flush loop on the current runtime.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime.
    pub fn spawn<C: StreamConnector>(config: BufferedConfig, connector: C) -> Self {
        let queue = Arc::new(Mutex::new(OutgoingQueue::new(config.max_queue_size)));
        let counters = Arc::new(Counters::default());
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let flusher = Flusher {
            client: PipelinedClient::new(config.client, connector),
            queue: Arc::clone(&queue),
            counters: Arc::clone(&counters),
            send_interval: config.send_interval,
            reconnect_timeout: config.reconnect_timeout,
        };
        let task = tokio::spawn(flusher.run(shutdown_rx));

        Self {
            queue,
            counters,
            shutdown: Some(shutdown_tx),
            task: Some(task),
        }
    }

    /// Queue one event.
    pub fn send(&self, event: Event) {
        self.send_batch([event]);
    }

    /// Queue several events as one message.
    pub fn send_batch(&self, events: impl IntoIterator<Item = Event>) {
        let evicted = self.queue.lock().push(Message::event_batch(events));
        self.counters.enqueued.fetch_add(1, Ordering::Relaxed);

        if evicted.is_some() {
            let dropped = self.counters.dropped.fetch_add(1, Ordering::Relaxed) + 1;
            warn!(dropped, "outgoing queue full, dropping oldest message");
        }
    }

    /// Messages waiting for the next flush.
    pub fn queued(&self) -> usize {
        self.queue.lock().len()
    }

    /// Snapshot of the delivery counters.
    pub fn stats(&self) -> BufferedStats {
        self.counters.snapshot()
    }

    /// Stop the flush loop after one last flush attempt.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "flush task ended abnormally");
            }
        }
    }
}

impl Drop for BufferedClient {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

struct Flusher<C: StreamConnector> {
    client: PipelinedClient<C>,
    queue: Arc<Mutex<OutgoingQueue>>,
    counters: Arc<Counters>,
    send_interval: Duration,
    reconnect_timeout: Duration,
}

impl<C: StreamConnector> Flusher<C> {
    async fn run(self, mut shutdown: oneshot::Receiver<()>) {
        loop {
            let delay = match self.flush().await {
                Ok(()) => self.send_interval,
                Err(e) => {
                    warn!(error = %e, retry_in = ?self.reconnect_timeout, "flush failed");
                    self.reconnect_timeout
                }
            };

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = &mut shutdown => break,
            }
        }

        if let Err(e) = self.flush().await {
            warn!(error = %e, lost = self.queue.lock().len(), "final flush failed");
        }
        self.client.disconnect().await;
        debug!("flush loop stopped");
    }

    /// Connect if needed, then transmit everything queued and wait for
    /// every response.
    async fn flush(&self) -> Result<(), ClientError> {
        if !self.client.is_connected() {
            self.client.connect().await?;
        }

        let batch = self.queue.lock().take();
        if batch.is_empty() {
            return Ok(());
        }

        let total = batch.len() as u64;
        let mut handles = Vec::with_capacity(batch.len());
        let mut failure = None;
        for message in &batch {
            match self.client.transmit(message).await {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }

        let mut sent = 0;
        for handle in handles {
            match handle.await {
                Ok(_) => sent += 1,
                Err(e) => {
                    failure.get_or_insert(e);
                }
            }
        }
        self.counters.sent.fetch_add(sent, Ordering::Relaxed);
        self.counters.failed.fetch_add(total - sent, Ordering::Relaxed);

        match failure {
            Some(e) => Err(e),
            None => {
                debug!(sent, "flushed queue");
                Ok(())
            }
        }
    }
}
