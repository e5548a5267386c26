//! Non-blocking pipelined client.
//!
//! Requests are written as soon as they are submitted and responses are
//! matched to them purely by arrival order; the protocol carries no
//! correlation id. One background task per connection reads frames and
//! resolves the oldest waiting [`ResponseHandle`].
//!
//! ```text
//! transmit ──► [write frame] ──► server
//!    │                             │
//!    └─► waiters: h0 h1 h2 ◄── read loop (pops front per frame)
//! ```

use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::io::{AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::{Mutex as AsyncMutex, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use super::config::ClientConfig;
use crate::core::constants::MAX_FRAME_SIZE;
use crate::core::{ClientError, ProtocolError, TransportError, TransportResult};
use crate::message::{Event, Message};
use crate::transport::{StreamConnector, TcpConnector, encode_frame, read_frame_async};

type Reply = Result<Message, Arc<ClientError>>;

/// Write side of the live connection.
struct Link<S> {
    writer: WriteHalf<S>,
    generation: u64,
    reader: JoinHandle<()>,
}

/// Requests awaiting a response, oldest first.
///
/// `live` names the connection generation the waiters belong to; it is
/// `None` whenever no connection is usable.
#[derive(Default)]
struct Waiting {
    live: Option<u64>,
    waiters: VecDeque<oneshot::Sender<Reply>>,
}

struct Shared<C: StreamConnector> {
    config: ClientConfig,
    connector: C,
    connect_gate: AsyncMutex<()>,
    link: AsyncMutex<Option<Link<C::Stream>>>,
    waiting: Mutex<Waiting>,
    generations: AtomicU64,
}

impl<C: StreamConnector> Shared<C> {
    /// Fail every waiter of `generation` with `cause` and mark it dead.
    ///
    /// Returns false if that generation was already torn down.
    fn fail_pending(&self, generation: u64, cause: &Arc<ClientError>) -> bool {
        let waiters = {
            let mut waiting = self.waiting.lock();
            if waiting.live != Some(generation) {
                return false;
            }
            waiting.live = None;
            std::mem::take(&mut waiting.waiters)
        };

        debug!(generation, pending = waiters.len(), error = %cause, "failing pending requests");
        for waiter in waiters {
            let _ = waiter.send(Err(Arc::clone(cause)));
        }
        true
    }

    /// Close the transport of `generation`, if it is still installed.
    async fn close_link(&self, generation: u64) {
        let link = {
            let mut link = self.link.lock().await;
            if link.as_ref().map(|active| active.generation) == Some(generation) {
                link.take()
            } else {
                None
            }
        };

        if let Some(mut link) = link {
            // May be the calling task; waiters are already resolved.
            link.reader.abort();
            if let Err(e) = link.writer.shutdown().await {
                debug!(generation, error = %e, "error closing connection");
            }
        }
    }

    async fn teardown(&self, generation: u64, cause: ClientError) -> Arc<ClientError> {
        let cause = Arc::new(cause);
        self.fail_pending(generation, &cause);
        self.close_link(generation).await;
        cause
    }
}

impl<C: StreamConnector> Drop for Shared<C> {
    fn drop(&mut self) {
        if let Some(link) = self.link.get_mut().take() {
            link.reader.abort();
        }
    }
}

/// Fails the connection if a `transmit` is dropped after queueing its
/// waiter but before its frame is fully written.
struct WriteGuard<C: StreamConnector> {
    shared: Arc<Shared<C>>,
    generation: u64,
    armed: bool,
}

impl<C: StreamConnector> WriteGuard<C> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl<C: StreamConnector> Drop for WriteGuard<C> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let generation = self.generation;
        warn!(generation, "transmit cancelled mid-write, dropping connection");
        let cause = Arc::new(ClientError::Cancelled);
        if !self.shared.fail_pending(generation, &cause) {
            return;
        }
        // Without a runtime the stale link is replaced by the next connect.
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            let shared = Arc::clone(&self.shared);
            runtime.spawn(async move { shared.close_link(generation).await });
        }
    }
}

/// Reads response frames for one connection generation.
async fn read_loop<C: StreamConnector>(
    shared: Weak<Shared<C>>,
    mut reader: ReadHalf<C::Stream>,
    generation: u64,
) {
    loop {
        let frame = read_frame_async(&mut reader, MAX_FRAME_SIZE).await;
        let Some(shared) = shared.upgrade() else {
            return;
        };

        let raw = match frame {
            Ok(raw) => raw,
            Err(e) => {
                warn!(generation, error = %e, "connection read failed");
                shared.teardown(generation, e.into()).await;
                return;
            }
        };
        trace!(generation, len = raw.len(), "received frame");

        let waiter = {
            let mut waiting = shared.waiting.lock();
            if waiting.live != Some(generation) {
                return;
            }
            waiting.waiters.pop_front()
        };

        let Some(waiter) = waiter else {
            let err = ProtocolError::Unsolicited { len: raw.len() };
            warn!(generation, error = %err, "dropping connection");
            shared.teardown(generation, err.into()).await;
            return;
        };

        match Message::decode(&raw) {
            Ok(message) => {
                let _ = waiter.send(Ok(message));
            }
            Err(e) => {
                warn!(generation, error = %e, "malformed response");
                let cause = Arc::new(ClientError::from(e));
                let _ = waiter.send(Err(Arc::clone(&cause)));
                shared.fail_pending(generation, &cause);
                shared.close_link(generation).await;
                return;
            }
        }
    }
}

async fn write_frame<W: AsyncWrite + Unpin>(
    writer: &mut W,
    frame: &[u8],
    timeout: Duration,
) -> TransportResult<()> {
    let write = async {
        writer.write_all(frame).await?;
        writer.flush().await
    };
    match tokio::time::timeout(timeout, write).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(io::Error::new(io::ErrorKind::TimedOut, "write timed out").into()),
    }
}

/// Resolves to the response of one transmitted request.
///
/// Fails with [`ClientError::ConnectionLost`] if the connection goes away
/// first; every request pending at that moment shares the same cause.
#[derive(Debug)]
#[must_use = "the response is lost unless the handle is awaited"]
pub struct ResponseHandle {
    rx: oneshot::Receiver<Reply>,
}

impl Future for ResponseHandle {
    type Output = Result<Message, ClientError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx).poll(cx).map(|reply| match reply {
            Ok(Ok(message)) => Ok(message),
            Ok(Err(cause)) => Err(ClientError::ConnectionLost(cause)),
            Err(_) => Err(ClientError::Shutdown),
        })
    }
}

/// An async client that keeps many requests in flight on one connection.
///
/// Cheap to clone; clones share the connection and its pending queue.
/// There is no retry here: a failed request stays failed. Use
/// [`BufferedClient`](super::BufferedClient) for queueing and reconnects.
///
/// # Example
///
/// ```no_run
/// use riemann_client::client::{ClientConfig, PipelinedClient};
/// use riemann_client::message::Event;
///
/// # async fn run() -> Result<(), riemann_client::core::ClientError> {
/// let client = PipelinedClient::tcp(ClientConfig::default());
/// client.connect().await?;
///
/// let accepted = client.send(Event::new().with_service("api latency").with_metric(12.5)).await?;
/// let slow = client.query("service = \"api latency\" and metric > 100").await?;
/// # Ok(())
/// # }
/// ```
pub struct PipelinedClient<C: StreamConnector = TcpConnector> {
    shared: Arc<Shared<C>>,
}

impl<C: StreamConnector> Clone for PipelinedClient<C> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<C: StreamConnector> fmt::Debug for PipelinedClient<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelinedClient")
            .field("server", &self.shared.config.target())
            .field("connected", &self.is_connected())
            .field("pending", &self.pending())
            .finish()
    }
}

impl PipelinedClient<TcpConnector> {
    /// Client over plain TCP.
    pub fn tcp(config: ClientConfig) -> Self {
        let connector = TcpConnector::new(config.timeout);
        Self::new(config, connector)
    }
}

#[cfg(feature = "tls-async")]
impl PipelinedClient<crate::transport::TlsConnector> {
    /// Client over TLS.
    pub fn tls(config: ClientConfig, tls: crate::transport::TlsConfig) -> Self {
        let connector = crate::transport::TlsConnector::with_timeout(tls, config.timeout);
        Self::new(config, connector)
    }
}

impl<C: StreamConnector> PipelinedClient<C> {
    /// Create a disconnected client that dials through `connector`.
    pub fn new(config: ClientConfig, connector: C) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                connector,
                connect_gate: AsyncMutex::new(()),
                link: AsyncMutex::new(None),
                waiting: Mutex::new(Waiting::default()),
                generations: AtomicU64::new(0),
            }),
        }
    }

    /// Connection settings.
    pub fn config(&self) -> &ClientConfig {
        &self.shared.config
    }

    /// Check if a usable connection is installed.
    pub fn is_connected(&self) -> bool {
        self.shared.waiting.lock().live.is_some()
    }

    /// Number of requests written but not yet answered.
    pub fn pending(&self) -> usize {
        self.shared.waiting.lock().waiters.len()
    }

    /// Connect if not already connected.
    ///
    /// Concurrent callers queue behind one another; only the first one
    /// actually dials, the rest find the connection in place.
    pub async fn connect(&self) -> Result<(), ClientError> {
        let _gate = self.shared.connect_gate.lock().await;
        if self.is_connected() {
            return Ok(());
        }

        let config = &self.shared.config;
        debug!(host = %config.host, port = config.port, "connecting");
        let stream = self.shared.connector.connect(&config.host, config.port).await?;
        let (reader, writer) = tokio::io::split(stream);
        let generation = self.shared.generations.fetch_add(1, Ordering::Relaxed) + 1;

        let mut link = self.shared.link.lock().await;
        self.shared.waiting.lock().live = Some(generation);
        let reader = tokio::spawn(read_loop(Arc::downgrade(&self.shared), reader, generation));
        let fresh = Link {
            writer,
            generation,
            reader,
        };
        if let Some(stale) = link.replace(fresh) {
            stale.reader.abort();
        }

        info!(host = %config.host, port = config.port, generation, "connected");
        Ok(())
    }

    /// Close the connection, failing every pending request.
    pub async fn disconnect(&self) {
        let _gate = self.shared.connect_gate.lock().await;
        let live = self.shared.waiting.lock().live;
        if let Some(generation) = live {
            self.shared.teardown(generation, ClientError::Disconnected).await;
        }
    }

    /// Write `message` now and return a handle to its response.
    ///
    /// Fails with [`ClientError::NotConnected`] when there is no connection;
    /// this never dials. A write failure tears the connection down.
    pub async fn transmit(&self, message: &Message) -> Result<ResponseHandle, ClientError> {
        let frame = encode_frame(&message.encode()).map_err(TransportError::from)?;

        let mut link = self.shared.link.lock().await;
        let Some(active) = link.as_mut() else {
            return Err(ClientError::NotConnected);
        };
        let generation = active.generation;

        // Enqueued under the write lock, so queue order is wire order.
        let (tx, rx) = oneshot::channel();
        {
            let mut waiting = self.shared.waiting.lock();
            if waiting.live != Some(generation) {
                return Err(ClientError::NotConnected);
            }
            waiting.waiters.push_back(tx);
        }

        let guard = WriteGuard {
            shared: Arc::clone(&self.shared),
            generation,
            armed: true,
        };
        let written = write_frame(&mut active.writer, &frame, self.shared.config.timeout).await;
        guard.disarm();
        match written {
            Ok(()) => {
                trace!(generation, len = frame.len(), "sent frame");
                Ok(ResponseHandle { rx })
            }
            Err(e) => {
                drop(link);
                warn!(generation, error = %e, "connection write failed");
                let cause = self.shared.teardown(generation, e.into()).await;
                Err(ClientError::ConnectionLost(cause))
            }
        }
    }

    /// Transmit and wait for the response.
    pub async fn request(&self, message: &Message) -> Result<Message, ClientError> {
        self.transmit(message).await?.await
    }

    /// Submit one event; resolves to the server's `ok` flag.
    pub async fn send(&self, event: Event) -> Result<bool, ClientError> {
        self.send_batch([event]).await
    }

    /// Submit several events in one message.
    pub async fn send_batch(
        &self,
        events: impl IntoIterator<Item = Event>,
    ) -> Result<bool, ClientError> {
        let message = Message::event_batch(events);
        Ok(self.request(&message).await?.ok())
    }

    /// Run a query and return the matching events.
    pub async fn query(&self, query: impl Into<String>) -> Result<Vec<Event>, ClientError> {
        let message = Message::query(query);
        Ok(self.request(&message).await?.into_events())
    }
}

#[cfg(test)]
pub(crate) mod test_utils {
    use std::sync::atomic::AtomicUsize;

    use tokio::io::DuplexStream;
    use tokio::sync::{Semaphore, mpsc};

    use super::*;
    use crate::message::Response;

    /// Connector handing out in-memory pipes; the server ends arrive on
    /// the receiver returned by [`DuplexConnector::new`].
    pub struct DuplexConnector {
        servers: mpsc::UnboundedSender<DuplexStream>,
        connects: Arc<AtomicUsize>,
        failures: AtomicUsize,
        gate: Option<Arc<Semaphore>>,
        delay: Duration,
        buffer: usize,
    }

    impl DuplexConnector {
        pub fn new() -> (Self, mpsc::UnboundedReceiver<DuplexStream>) {
            let (servers, rx) = mpsc::unbounded_channel();
            let connector = Self {
                servers,
                connects: Arc::new(AtomicUsize::new(0)),
                failures: AtomicUsize::new(0),
                gate: None,
                delay: Duration::ZERO,
                buffer: 64 * 1024,
            };
            (connector, rx)
        }

        /// Refuse the first `n` connection attempts.
        pub fn failing_first(self, n: usize) -> Self {
            self.failures.store(n, Ordering::SeqCst);
            self
        }

        /// Each connect waits for one permit on `gate`.
        pub fn gated(mut self, gate: Arc<Semaphore>) -> Self {
            self.gate = Some(gate);
            self
        }

        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        /// Size of each pipe's in-flight buffer.
        pub fn with_buffer(mut self, buffer: usize) -> Self {
            self.buffer = buffer;
            self
        }

        pub fn connects(&self) -> Arc<AtomicUsize> {
            Arc::clone(&self.connects)
        }
    }

    impl StreamConnector for DuplexConnector {
        type Stream = DuplexStream;

        async fn connect(&self, host: &str, port: u16) -> TransportResult<DuplexStream> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                gate.acquire()
                    .await
                    .map_err(|_| io::Error::other("gate closed"))?
                    .forget();
            }
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if self.failures.load(Ordering::SeqCst) > 0 {
                self.failures.fetch_sub(1, Ordering::SeqCst);
                return Err(TransportError::Connect {
                    target: format!("{host}:{port}"),
                    source: io::ErrorKind::ConnectionRefused.into(),
                });
            }

            let (client, server) = tokio::io::duplex(self.buffer);
            self.servers
                .send(server)
                .map_err(|_| io::Error::other("no server listening"))?;
            Ok(client)
        }
    }

    pub async fn next_request(stream: &mut DuplexStream) -> Message {
        let raw = read_frame_async(stream, MAX_FRAME_SIZE).await.unwrap();
        Message::decode(&raw).unwrap()
    }

    pub async fn reply(stream: &mut DuplexStream, message: &Message) {
        let frame = encode_frame(&message.encode()).unwrap();
        stream.write_all(&frame).await.unwrap();
    }

    pub fn ok_with(events: Vec<Event>) -> Message {
        Message::Response(Response {
            ok: true,
            error: None,
            events,
        })
    }

    /// Poll `check` until it holds, failing the test after about a second.
    pub async fn eventually(mut check: impl FnMut() -> bool) {
        for _ in 0..200 {
            if check() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not reached in time");
    }
}
