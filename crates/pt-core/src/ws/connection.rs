//! A single streaming connection with watchdog-driven auto-reconnect.
//!
//! A started [`StreamConnection`] runs three independent tokio tasks:
//! 1. A read loop that hands every inbound frame to the attached
//!    [`MessageDispatcher`] (special messages first, then regular dispatch).
//! 2. A watchdog that ticks at `timer_interval` and starts a reconnection when
//!    nothing has been received for longer than `reconnect_wait`.
//! 3. A heartbeat loop (optional) that sends the configured ping payload.
//!
//! Reconnection runs in its own short-lived task. A successful re-dial replays
//! the dispatcher's connect frames (login + every retained subscription) and
//! only then hands the new reader to the read loop.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{HeaderName, HeaderValue};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, trace, warn};

use super::config::{ConnectionConfig, PingPayload};
use super::state::{ConnectionEvent, ConnectionState};
use crate::dispatch::MessageDispatcher;
use crate::error::FeedError;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsWriter = SplitSink<WsStream, Message>;
type WsReader = SplitStream<WsStream>;

const EVENT_CHANNEL_CAPACITY: usize = 64;
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// Owns one physical WebSocket and its read/write discipline.
///
/// The socket is never exposed; callers interact through [`send`](Self::send),
/// [`send_structured`](Self::send_structured) and the state queries.
pub struct StreamConnection<D: MessageDispatcher> {
    shared: Arc<Shared<D>>,
}

struct Shared<D: MessageDispatcher> {
    label: String,
    config: ConnectionConfig,
    dispatcher: RwLock<Option<Arc<D>>>,
    /// Send lock: the transport allows a single concurrent writer.
    writer: tokio::sync::Mutex<Option<WsWriter>>,
    state: RwLock<ConnectionState>,
    last_received: Mutex<Instant>,
    attempts: AtomicU32,
    reconnecting: AtomicBool,
    exhausted: AtomicBool,
    stop_requested: AtomicBool,
    shutdown_tx: watch::Sender<bool>,
    reader_tx: Mutex<Option<mpsc::UnboundedSender<WsReader>>>,
    event_tx: mpsc::Sender<ConnectionEvent>,
    event_rx: Mutex<Option<mpsc::Receiver<ConnectionEvent>>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    reconnect_task: Mutex<Option<JoinHandle<()>>>,
}

/// Outcome of one read-loop wait.
enum ReadEvent {
    Shutdown,
    Swap(WsReader),
    Frame(Option<Result<Message, tokio_tungstenite::tungstenite::Error>>),
}

impl<D: MessageDispatcher> StreamConnection<D> {
    /// Create a new (not yet started) connection.
    ///
    /// `label` prefixes every log line (e.g. `"okx_public"`).
    pub fn new(label: impl Into<String>, config: ConnectionConfig) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            shared: Arc::new(Shared {
                label: label.into(),
                config,
                dispatcher: RwLock::new(None),
                writer: tokio::sync::Mutex::new(None),
                state: RwLock::new(ConnectionState::Idle),
                last_received: Mutex::new(Instant::now()),
                attempts: AtomicU32::new(0),
                reconnecting: AtomicBool::new(false),
                exhausted: AtomicBool::new(false),
                stop_requested: AtomicBool::new(false),
                shutdown_tx,
                reader_tx: Mutex::new(None),
                event_tx,
                event_rx: Mutex::new(Some(event_rx)),
                tasks: Mutex::new(Vec::new()),
                reconnect_task: Mutex::new(None),
            }),
        }
    }

    /// Attach the dispatcher that classifies inbound frames.
    pub fn set_dispatcher(&self, dispatcher: Arc<D>) {
        *self.shared.dispatcher.write() = Some(dispatcher);
    }

    pub fn dispatcher(&self) -> Option<Arc<D>> {
        self.shared.dispatcher()
    }

    pub fn label(&self) -> &str {
        &self.shared.label
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.shared.config
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.state()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    pub fn is_running(&self) -> bool {
        matches!(
            self.state(),
            ConnectionState::Connecting | ConnectionState::Open | ConnectionState::Reconnecting
        )
    }

    /// `true` once reconnection gave up after `max_reconnect_attempts`.
    pub fn is_exhausted(&self) -> bool {
        self.shared.exhausted.load(Ordering::Acquire)
    }

    /// Reconnection attempts since the last successful connect.
    pub fn reconnect_attempts(&self) -> u32 {
        self.shared.attempts.load(Ordering::Acquire)
    }

    /// Take the lifecycle event stream. Returns `None` after the first call.
    pub fn take_event_receiver(&self) -> Option<mpsc::Receiver<ConnectionEvent>> {
        self.shared.event_rx.lock().take()
    }

    /// Dial the endpoint and spawn the read, watchdog and heartbeat loops.
    pub async fn start(&self) -> Result<(), FeedError> {
        let shared = &self.shared;
        shared.config.validate()?;
        {
            let mut state = shared.state.write();
            match *state {
                ConnectionState::Idle => {}
                ConnectionState::Stopped => return Err(FeedError::Stopped),
                _ => return Err(FeedError::AlreadyRunning),
            }
            if shared.dispatcher.read().is_none() {
                return Err(FeedError::HandlerNotSet);
            }
            *state = ConnectionState::Connecting;
        }

        info!("[{}] connecting to {}", shared.label, shared.config.url);
        let stream = match shared.dial().await {
            Ok(s) => s,
            Err(e) => {
                error!("[{}] connection failed: {e}", shared.label);
                shared.transition(ConnectionState::Connecting, ConnectionState::Idle);
                return Err(e);
            }
        };

        let (writer, reader) = stream.split();
        *shared.writer.lock().await = Some(writer);
        shared.replay_connect_messages().await;
        shared.touch();
        shared.attempts.store(0, Ordering::Release);

        if !shared.transition(ConnectionState::Connecting, ConnectionState::Open) {
            // stop() won the race while we were dialing.
            shared.close_writer().await;
            return Err(FeedError::Stopped);
        }
        info!("[{}] connected", shared.label);
        shared.emit(ConnectionEvent::Connected);

        let (reader_tx, reader_rx) = mpsc::unbounded_channel();
        *shared.reader_tx.lock() = Some(reader_tx);

        let mut tasks = Vec::with_capacity(3);
        tasks.push(tokio::spawn(Arc::clone(shared).read_loop(
            reader,
            reader_rx,
            shared.shutdown_tx.subscribe(),
        )));
        if shared.config.auto_reconnect {
            tasks.push(tokio::spawn(
                Arc::clone(shared).watchdog_loop(shared.shutdown_tx.subscribe()),
            ));
        }
        if shared.config.heartbeat_enabled {
            tasks.push(tokio::spawn(
                Arc::clone(shared).heartbeat_loop(shared.shutdown_tx.subscribe()),
            ));
        }
        shared.tasks.lock().extend(tasks);
        Ok(())
    }

    /// Send a text frame.
    pub async fn send(&self, text: impl Into<String>) -> Result<(), FeedError> {
        let text = text.into();
        debug!("[{}] sending: {text}", self.shared.label);
        self.shared.send_message(Message::Text(text.into())).await
    }

    /// Serialize `value` as JSON and send it as a text frame.
    pub async fn send_structured<T: Serialize + ?Sized>(&self, value: &T) -> Result<(), FeedError> {
        let text = serde_json::to_string(value).map_err(|e| FeedError::Encode(e.to_string()))?;
        self.send(text).await
    }

    /// Stop all loops and close the socket. Idempotent.
    ///
    /// Waits for an in-flight send to finish (send lock) and for every spawned
    /// task, including a reconnect in progress, to observe the shutdown signal.
    pub async fn stop(&self) {
        let shared = &self.shared;
        if shared.stop_requested.swap(true, Ordering::AcqRel) {
            return;
        }
        info!("[{}] stopping", shared.label);
        *shared.state.write() = ConnectionState::Stopped;
        shared.shutdown_tx.send_replace(true);
        shared.close_writer().await;

        let tasks: Vec<JoinHandle<()>> = shared.tasks.lock().drain(..).collect();
        let reconnect = shared.reconnect_task.lock().take();
        for task in tasks.into_iter().chain(reconnect) {
            let _ = task.await;
        }
        shared.reader_tx.lock().take();
        shared.emit(ConnectionEvent::Stopped);
        info!("[{}] stopped", shared.label);
    }
}

impl<D: MessageDispatcher> Shared<D> {
    fn dispatcher(&self) -> Option<Arc<D>> {
        self.dispatcher.read().clone()
    }

    fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    /// Move `from → to`; returns `false` (and changes nothing) if the current
    /// state is not `from`.
    fn transition(&self, from: ConnectionState, to: ConnectionState) -> bool {
        let mut state = self.state.write();
        if *state == from {
            *state = to;
            true
        } else {
            false
        }
    }

    fn touch(&self) {
        *self.last_received.lock() = Instant::now();
    }

    fn emit(&self, event: ConnectionEvent) {
        if self.event_tx.try_send(event).is_err() {
            trace!("[{}] event channel full or closed", self.label);
        }
    }

    async fn send_message(&self, msg: Message) -> Result<(), FeedError> {
        if self.state() == ConnectionState::Stopped {
            return Err(FeedError::Stopped);
        }
        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or(FeedError::NotConnected)?;
        writer.send(msg).await.map_err(FeedError::from)
    }

    async fn close_writer(&self) {
        let writer = self.writer.lock().await.take();
        if let Some(mut writer) = writer {
            match tokio::time::timeout(CLOSE_TIMEOUT, writer.close()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => debug!("[{}] close error: {e}", self.label),
                Err(_) => debug!("[{}] close timed out", self.label),
            }
        }
    }

    /// Establish the WebSocket (TLS when the scheme is `wss`).
    async fn dial(&self) -> Result<WsStream, FeedError> {
        let mut request = self.config.url.as_str().into_client_request()?;
        for (key, value) in &self.config.extra_headers {
            let name = HeaderName::from_bytes(key.as_bytes())
                .map_err(|e| FeedError::Config(format!("header {key}: {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| FeedError::Config(format!("header {key}: {e}")))?;
            request.headers_mut().insert(name, value);
        }

        let (stream, _response) =
            tokio::time::timeout(self.config.handshake_timeout, tokio_tungstenite::connect_async(request))
                .await
                .map_err(|_| FeedError::WebSocket("handshake timed out".into()))??;
        Ok(stream)
    }

    /// Send the dispatcher's login + subscription frames on a fresh socket.
    async fn replay_connect_messages(&self) {
        let Some(dispatcher) = self.dispatcher() else {
            return;
        };
        let frames = dispatcher.connect_messages();
        if frames.is_empty() {
            return;
        }
        info!("[{}] replaying {} connect frame(s)", self.label, frames.len());
        for frame in frames {
            debug!("[{}] sending: {frame}", self.label);
            if let Err(e) = self.send_message(Message::Text(frame.into())).await {
                warn!("[{}] replay send failed: {e}", self.label);
                break;
            }
        }
    }

    fn on_frame(&self, raw: &str) {
        self.touch();
        let Some(dispatcher) = self.dispatcher() else {
            return;
        };
        trace!("[{}] received: {raw}", self.label);

        match dispatcher.handle_special_message(raw) {
            Ok(true) => return,
            Ok(false) => {}
            Err(e) => warn!("[{}] special message error: {e}", self.label),
        }

        if let Err(e) = dispatcher.handle_message(raw) {
            warn!("[{}] dropped frame: {e}", self.label);
            if let Err(e) = dispatcher.handle_error(raw) {
                warn!("[{}] error handler failed: {e}", self.label);
            }
        }
    }

    fn on_socket_lost(self: &Arc<Self>) {
        if self.stop_requested.load(Ordering::Acquire) || self.state() == ConnectionState::Stopped {
            return;
        }
        self.emit(ConnectionEvent::Disconnected);
        if self.config.auto_reconnect {
            self.spawn_reconnect();
        } else {
            warn!("[{}] socket lost and auto-reconnect is disabled, stopping", self.label);
            *self.state.write() = ConnectionState::Stopped;
            self.shutdown_tx.send_replace(true);
            self.emit(ConnectionEvent::Stopped);
        }
    }

    /// Start a reconnect task unless one is already in flight.
    fn spawn_reconnect(self: &Arc<Self>) {
        if self.stop_requested.load(Ordering::Acquire) || self.state() == ConnectionState::Stopped {
            return;
        }
        if self.reconnecting.swap(true, Ordering::AcqRel) {
            return;
        }
        let shared = Arc::clone(self);
        let handle = tokio::spawn(async move {
            shared.reconnect().await;
            shared.reconnecting.store(false, Ordering::Release);
        });
        // A previous handle, if any, belongs to a finished attempt.
        self.reconnect_task.lock().replace(handle);
    }

    async fn reconnect(self: &Arc<Self>) {
        let attempt = self.attempts.fetch_add(1, Ordering::AcqRel) + 1;
        let max = self.config.max_reconnect_attempts;
        if max > 0 && attempt > max {
            self.exhaust(attempt - 1);
            return;
        }

        {
            let mut state = self.state.write();
            if *state == ConnectionState::Stopped {
                return;
            }
            *state = ConnectionState::Reconnecting;
        }
        info!("[{}] reconnecting (attempt {attempt})", self.label);
        self.emit(ConnectionEvent::Reconnecting { attempt });

        self.close_writer().await;

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        if *shutdown_rx.borrow() {
            return;
        }
        tokio::select! {
            _ = tokio::time::sleep(self.config.reconnect_wait) => {}
            _ = shutdown_rx.changed() => return,
        }
        let dialed = tokio::select! {
            r = self.dial() => r,
            _ = shutdown_rx.changed() => return,
        };

        match dialed {
            Ok(mut stream) => {
                if self.stop_requested.load(Ordering::Acquire) {
                    let _ = stream.close(None).await;
                    return;
                }
                let (writer, reader) = stream.split();
                *self.writer.lock().await = Some(writer);
                self.replay_connect_messages().await;
                self.touch();
                self.attempts.store(0, Ordering::Release);

                if !self.transition(ConnectionState::Reconnecting, ConnectionState::Open) {
                    self.close_writer().await;
                    return;
                }
                if let Some(tx) = self.reader_tx.lock().as_ref() {
                    let _ = tx.send(reader);
                }
                info!("[{}] reconnected", self.label);
                self.emit(ConnectionEvent::Reconnected);
            }
            Err(e) => {
                error!("[{}] reconnection attempt {attempt} failed: {e}", self.label);
                if max > 0 && attempt >= max {
                    self.exhaust(attempt);
                }
            }
        }
    }

    fn exhaust(&self, attempts: u32) {
        error!("[{}] max reconnection attempts reached ({attempts}), giving up", self.label);
        self.exhausted.store(true, Ordering::Release);
        *self.state.write() = ConnectionState::Stopped;
        self.emit(ConnectionEvent::ReconnectExhausted { attempts });
        self.shutdown_tx.send_replace(true);
    }

    async fn read_loop(
        self: Arc<Self>,
        reader: WsReader,
        mut reader_rx: mpsc::UnboundedReceiver<WsReader>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        let mut reader = Some(reader);
        loop {
            if *shutdown_rx.borrow() {
                break;
            }
            let event = match reader.as_mut() {
                Some(r) => tokio::select! {
                    _ = shutdown_rx.changed() => ReadEvent::Shutdown,
                    fresh = reader_rx.recv() => match fresh {
                        Some(fresh) => ReadEvent::Swap(fresh),
                        None => ReadEvent::Shutdown,
                    },
                    frame = r.next() => ReadEvent::Frame(frame),
                },
                None => tokio::select! {
                    _ = shutdown_rx.changed() => ReadEvent::Shutdown,
                    fresh = reader_rx.recv() => match fresh {
                        Some(fresh) => ReadEvent::Swap(fresh),
                        None => ReadEvent::Shutdown,
                    },
                },
            };

            match event {
                ReadEvent::Shutdown => break,
                ReadEvent::Swap(fresh) => reader = Some(fresh),
                ReadEvent::Frame(Some(Ok(msg))) => match msg {
                    Message::Text(text) => self.on_frame(&text),
                    Message::Binary(data) => match std::str::from_utf8(&data) {
                        Ok(text) => self.on_frame(text),
                        Err(_) => {
                            self.touch();
                            debug!("[{}] ignoring non-utf8 binary frame", self.label);
                        }
                    },
                    // tungstenite answers pings itself.
                    Message::Ping(_) | Message::Pong(_) => self.touch(),
                    Message::Close(frame) => {
                        warn!("[{}] received close frame: {frame:?}", self.label);
                        reader = None;
                        self.on_socket_lost();
                    }
                    Message::Frame(_) => {}
                },
                ReadEvent::Frame(Some(Err(e))) => {
                    error!("[{}] read error: {e}", self.label);
                    reader = None;
                    self.on_socket_lost();
                }
                ReadEvent::Frame(None) => {
                    warn!("[{}] stream ended", self.label);
                    reader = None;
                    self.on_socket_lost();
                }
            }
        }
        debug!("[{}] read loop exited", self.label);
    }

    async fn watchdog_loop(self: Arc<Self>, mut shutdown_rx: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.config.timer_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => break,
                _ = ticker.tick() => {
                    let state = self.state();
                    if state == ConnectionState::Stopped {
                        break;
                    }
                    let watching = matches!(state, ConnectionState::Open | ConnectionState::Reconnecting);
                    if watching && !self.reconnecting.load(Ordering::Acquire) {
                        let elapsed = self.last_received.lock().elapsed();
                        if elapsed > self.config.reconnect_wait {
                            info!("[{}] no data for {elapsed:?}, reconnecting", self.label);
                            self.spawn_reconnect();
                        }
                    }
                }
            }
        }
        debug!("[{}] watchdog exited", self.label);
    }

    async fn heartbeat_loop(self: Arc<Self>, mut shutdown_rx: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.config.heartbeat_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => break,
                _ = ticker.tick() => {
                    if self.state() == ConnectionState::Open {
                        let msg = match &self.config.heartbeat {
                            PingPayload::Text(t) => Message::Text(t.clone().into()),
                            PingPayload::Json(j) => Message::Text(j.to_string().into()),
                            PingPayload::WebSocketPing => Message::Ping(Vec::new().into()),
                        };
                        if let Err(e) = self.send_message(msg).await {
                            warn!("[{}] heartbeat send failed: {e}", self.label);
                        }
                    }
                }
            }
        }
        debug!("[{}] heartbeat exited", self.label);
    }
}
