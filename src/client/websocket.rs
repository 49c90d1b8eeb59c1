//! Real-time push channel.
//!
//! [`WebSocketChannel`] keeps one socket to `<server>/ws` open in a spawned
//! task. When the socket drops it reconnects with exponential backoff and
//! re-subscribes every channel subscribed so far. Inbound text frames are
//! parsed as JSON and handed to each registered [`MessageHandler`] in turn.

use std::collections::BTreeSet;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::{FutureExt, SinkExt, StreamExt};
use parking_lot::{Mutex, RwLock};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message as Frame;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::{Error, Result};

/// Lifecycle events delivered to [`ConnectionHandler`]s.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// The socket is open and subscriptions are being restored.
    Connected,
    /// An open socket closed.
    Disconnected {
        /// Why, when known.
        reason: Option<String>,
    },
    /// Reconnection stopped after this many attempts.
    GaveUp {
        /// Attempts made since the last successful connect.
        attempts: u32,
    },
}

/// Receives every inbound frame as parsed JSON.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Handle one frame. An error is logged and does not affect other handlers.
    async fn handle(&self, message: Value) -> Result<()>;
}

#[async_trait]
impl<F, Fut> MessageHandler for F
where
    F: Fn(Value) -> Fut + Send + Sync,
    Fut: Future<Output = Result<()>> + Send,
{
    async fn handle(&self, message: Value) -> Result<()> {
        self(message).await
    }
}

/// Receives [`ConnectionEvent`]s.
#[async_trait]
pub trait ConnectionHandler: Send + Sync {
    /// Handle one event. An error is logged and does not affect other handlers.
    async fn on_event(&self, event: ConnectionEvent) -> Result<()>;
}

#[async_trait]
impl<F, Fut> ConnectionHandler for F
where
    F: Fn(ConnectionEvent) -> Fut + Send + Sync,
    Fut: Future<Output = Result<()>> + Send,
{
    async fn on_event(&self, event: ConnectionEvent) -> Result<()> {
        self(event).await
    }
}

/// WebSocket URL for a server base URL: `http` becomes `ws`, `https` becomes
/// `wss`, and `/ws` is appended to the path.
pub fn websocket_url(base: &Url) -> Result<Url> {
    let mut url = base.clone();
    let scheme = match base.scheme() {
        "http" => "ws",
        "https" => "wss",
        other => {
            return Err(Error::validation(format!(
                "cannot derive a WebSocket url from scheme {other}"
            )))
        },
    };
    url.set_scheme(scheme)
        .map_err(|()| Error::validation(format!("cannot set scheme {scheme} on {base}")))?;
    let path = format!("{}/ws", url.path().trim_end_matches('/'));
    url.set_path(&path);
    Ok(url)
}

/// Delay before reconnect attempt `attempt` (1-based): `base * 2^(attempt-1)`.
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
    base.saturating_mul(factor)
}

fn control_frame(kind: &str, channel: &str) -> String {
    json!({"type": kind, "channel": channel}).to_string()
}

#[derive(Default)]
struct Shared {
    subscriptions: RwLock<BTreeSet<String>>,
    message_handlers: RwLock<Vec<Arc<dyn MessageHandler>>>,
    connection_handlers: RwLock<Vec<Arc<dyn ConnectionHandler>>>,
    outbound: Mutex<Option<mpsc::UnboundedSender<String>>>,
}

impl Shared {
    async fn dispatch(&self, text: &str) {
        let value: Value = match serde_json::from_str(text) {
            Ok(value) => value,
            Err(e) => {
                tracing::error!(error = %e, "Invalid WebSocket message");
                return;
            },
        };
        let handlers = self.message_handlers.read().clone();
        for handler in handlers {
            match AssertUnwindSafe(handler.handle(value.clone()))
                .catch_unwind()
                .await
            {
                Ok(Ok(())) => {},
                Ok(Err(e)) => tracing::error!(error = %e, "Message handler error"),
                Err(_) => tracing::error!("Message handler panicked"),
            }
        }
    }

    async fn emit(&self, event: ConnectionEvent) {
        let handlers = self.connection_handlers.read().clone();
        for handler in handlers {
            match AssertUnwindSafe(handler.on_event(event.clone()))
                .catch_unwind()
                .await
            {
                Ok(Ok(())) => {},
                Ok(Err(e)) => tracing::error!(error = %e, "Connection handler error"),
                Err(_) => tracing::error!("Connection handler panicked"),
            }
        }
    }

    fn send(&self, frame: String) -> Result<()> {
        let outbound = self.outbound.lock();
        let sender = outbound
            .as_ref()
            .ok_or_else(|| Error::connection("WebSocket not connected"))?;
        sender
            .send(frame)
            .map_err(|_| Error::connection("WebSocket not connected"))
    }
}

struct Worker {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Reconnecting WebSocket with channel subscriptions.
pub struct WebSocketChannel {
    url: Url,
    reconnect_attempts: u32,
    reconnect_delay: Duration,
    shared: Arc<Shared>,
    worker: Mutex<Option<Worker>>,
}

impl std::fmt::Debug for WebSocketChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSocketChannel")
            .field("url", &self.url.as_str())
            .field("reconnect_attempts", &self.reconnect_attempts)
            .field("reconnect_delay", &self.reconnect_delay)
            .field("subscriptions", &*self.shared.subscriptions.read())
            .field("connected", &self.is_connected())
            .finish()
    }
}

impl WebSocketChannel {
    /// A channel for `url` that is not yet connected.
    pub fn new(url: Url, reconnect_attempts: u32, reconnect_delay: Duration) -> Self {
        Self {
            url,
            reconnect_attempts,
            reconnect_delay,
            shared: Arc::new(Shared::default()),
            worker: Mutex::new(None),
        }
    }

    /// The socket URL.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Returns `true` while a socket is open.
    pub fn is_connected(&self) -> bool {
        self.shared.outbound.lock().is_some()
    }

    /// Returns `true` while the connection task is alive, including while it
    /// waits to reconnect.
    pub fn is_running(&self) -> bool {
        self.worker
            .lock()
            .as_ref()
            .is_some_and(|worker| !worker.handle.is_finished())
    }

    /// Channels that will be restored on reconnect, in name order.
    pub fn subscriptions(&self) -> Vec<String> {
        self.shared.subscriptions.read().iter().cloned().collect()
    }

    /// Start the connection task. Does nothing if it is already running.
    ///
    /// Returns immediately; [`ConnectionEvent::Connected`] signals when the
    /// socket is actually open.
    pub fn connect(&self) {
        let mut worker = self.worker.lock();
        if worker
            .as_ref()
            .is_some_and(|running| !running.handle.is_finished())
        {
            return;
        }
        tracing::info!(url = %self.url, "Connecting to WebSocket");
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run(
            self.url.clone(),
            self.reconnect_attempts,
            self.reconnect_delay,
            Arc::clone(&self.shared),
            cancel.clone(),
        ));
        *worker = Some(Worker { cancel, handle });
    }

    /// Stop the connection task and close the socket.
    ///
    /// Subscriptions are kept and restored by the next [`connect`](Self::connect).
    pub async fn disconnect(&self) {
        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            worker.cancel.cancel();
            if let Err(e) = worker.handle.await {
                tracing::warn!(error = %e, "WebSocket task ended abnormally");
            }
        }
        self.shared.outbound.lock().take();
    }

    /// Subscribe to `channel`.
    pub fn subscribe(&self, channel: &str) -> Result<()> {
        self.shared.send(control_frame("subscribe", channel))?;
        self.shared.subscriptions.write().insert(channel.to_string());
        tracing::info!(channel, "Subscribed to channel");
        Ok(())
    }

    /// Unsubscribe from `channel`.
    pub fn unsubscribe(&self, channel: &str) -> Result<()> {
        self.shared.send(control_frame("unsubscribe", channel))?;
        self.shared.subscriptions.write().remove(channel);
        tracing::info!(channel, "Unsubscribed from channel");
        Ok(())
    }

    /// Register a handler for inbound frames.
    pub fn add_message_handler(&self, handler: Arc<dyn MessageHandler>) {
        self.shared.message_handlers.write().push(handler);
    }

    /// Register a handler for connection events.
    pub fn add_connection_handler(&self, handler: Arc<dyn ConnectionHandler>) {
        self.shared.connection_handlers.write().push(handler);
    }
}

impl Drop for WebSocketChannel {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.get_mut().take() {
            worker.cancel.cancel();
        }
    }
}

async fn run(
    url: Url,
    max_attempts: u32,
    base_delay: Duration,
    shared: Arc<Shared>,
    cancel: CancellationToken,
) {
    let (inbound, frames) = mpsc::unbounded_channel();
    tokio::spawn(deliver(Arc::clone(&shared), frames, cancel.clone()));

    let mut attempts = 0u32;
    loop {
        let connected = tokio::select! {
            _ = cancel.cancelled() => break,
            result = tokio_tungstenite::connect_async(url.as_str()) => result,
        };
        match connected {
            Ok((stream, _)) => {
                attempts = 0;
                let reason = session(stream, &shared, &inbound, &cancel).await;
                shared.outbound.lock().take();
                if cancel.is_cancelled() {
                    break;
                }
                tracing::warn!(reason = ?reason, "WebSocket connection closed");
                shared.emit(ConnectionEvent::Disconnected { reason }).await;
            },
            Err(e) => tracing::error!(error = %e, "WebSocket error"),
        }

        if attempts >= max_attempts {
            tracing::error!(attempts, "Max reconnection attempts reached");
            shared.emit(ConnectionEvent::GaveUp { attempts }).await;
            break;
        }
        attempts += 1;
        let delay = backoff_delay(base_delay, attempts);
        tracing::info!(attempt = attempts, ?delay, "Reconnecting to WebSocket");
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(delay) => {},
        }
    }
    shared.outbound.lock().take();
}

type Stream = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

/// Hand inbound frames to the message handlers in arrival order. Runs beside
/// the socket loop; cancellation interrupts a handler mid-call.
async fn deliver(
    shared: Arc<Shared>,
    mut frames: mpsc::UnboundedReceiver<String>,
    cancel: CancellationToken,
) {
    loop {
        let text = tokio::select! {
            _ = cancel.cancelled() => break,
            text = frames.recv() => match text {
                Some(text) => text,
                None => break,
            },
        };
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = shared.dispatch(&text) => {},
        }
    }
}

/// Drive one open socket until it closes or `cancel` fires. Returns the
/// close reason, if any.
async fn session(
    stream: Stream,
    shared: &Shared,
    inbound: &mpsc::UnboundedSender<String>,
    cancel: &CancellationToken,
) -> Option<String> {
    let (mut sink, mut source) = stream.split();
    let (sender, mut outbound) = mpsc::unbounded_channel::<String>();

    let restore: Vec<String> = shared.subscriptions.read().iter().cloned().collect();
    *shared.outbound.lock() = Some(sender);
    shared.emit(ConnectionEvent::Connected).await;

    for channel in restore {
        if let Err(e) = sink.send(Frame::text(control_frame("subscribe", &channel))).await {
            return Some(e.to_string());
        }
        tracing::debug!(channel = %channel, "Restored subscription");
    }

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                let _ = sink.send(Frame::Close(None)).await;
                return None;
            },
            Some(frame) = outbound.recv() => {
                if let Err(e) = sink.send(Frame::text(frame)).await {
                    return Some(e.to_string());
                }
            },
            incoming = source.next() => match incoming {
                Some(Ok(Frame::Text(text))) => {
                    let _ = inbound.send(text.as_str().to_owned());
                },
                Some(Ok(Frame::Close(close))) => {
                    return close.map(|frame| frame.reason.as_str().to_string());
                },
                Some(Ok(_)) => {},
                Some(Err(e)) => return Some(e.to_string()),
                None => return None,
            },
        }
    }
}
