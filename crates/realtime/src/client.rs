use crate::channel::{Channel, ChannelBuilder};
use crate::error::RealtimeError;
use crate::message::{ChannelEvent, RealtimeMessage};
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, trace, warn};
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot, watch, Mutex, RwLock};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use url::Url;

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

#[derive(Debug, Clone)]
pub struct RealtimeClientOptions {
    /// Milliseconds between heartbeats
    pub heartbeat_interval: u64,
    /// Milliseconds to wait for a join reply
    pub join_timeout: u64,
}

impl Default for RealtimeClientOptions {
    fn default() -> Self {
        Self {
            heartbeat_interval: 30000,
            join_timeout: 10000,
        }
    }
}

pub(crate) type SocketSender = Arc<RwLock<Option<mpsc::Sender<Message>>>>;
type PendingReplies = Arc<Mutex<HashMap<String, oneshot::Sender<serde_json::Value>>>>;

/// Websocket client for row-change subscriptions
///
/// One socket is shared by every channel; a writer task drains outgoing
/// frames and a reader task routes incoming frames to channels and sends
/// heartbeats.
#[derive(Clone)]
pub struct RealtimeClient {
    pub(crate) url: String,
    pub(crate) key: String,
    next_ref: Arc<AtomicU32>,
    pub(crate) channels: Arc<RwLock<HashMap<String, Arc<Channel>>>>,
    pub(crate) socket: SocketSender,
    pub(crate) options: RealtimeClientOptions,
    state: Arc<RwLock<ConnectionState>>,
    state_change: broadcast::Sender<ConnectionState>,
    pending_replies: PendingReplies,
    connect_lock: Arc<Mutex<()>>,
    shutdown: Arc<watch::Sender<bool>>,
    pub(crate) access_token: Arc<RwLock<Option<String>>>,
}

impl RealtimeClient {
    /// `url` is the project URL (`https://xyz.supabase.co`); the websocket
    /// endpoint is derived from it.
    pub fn new(url: &str, key: &str) -> Self {
        Self::new_with_options(url, key, RealtimeClientOptions::default())
    }

    pub fn new_with_options(url: &str, key: &str, options: RealtimeClientOptions) -> Self {
        let (state_change_tx, _) = broadcast::channel(16);
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            url: url.to_string(),
            key: key.to_string(),
            next_ref: Arc::new(AtomicU32::new(1)),
            channels: Arc::new(RwLock::new(HashMap::new())),
            socket: Arc::new(RwLock::new(None)),
            options,
            state: Arc::new(RwLock::new(ConnectionState::Disconnected)),
            state_change: state_change_tx,
            pending_replies: Arc::new(Mutex::new(HashMap::new())),
            connect_lock: Arc::new(Mutex::new(())),
            shutdown: Arc::new(shutdown_tx),
            access_token: Arc::new(RwLock::new(None)),
        }
    }

    /// Sets the user token sent with subsequent channel joins
    pub async fn set_auth(&self, token: Option<String>) {
        info!("Setting auth token (is_some: {})", token.is_some());
        *self.access_token.write().await = token;
    }

    pub fn on_state_change(&self) -> broadcast::Receiver<ConnectionState> {
        self.state_change.subscribe()
    }

    pub async fn get_connection_state(&self) -> ConnectionState {
        *self.state.read().await
    }

    /// Starts building a channel for `topic`; the wire topic is `realtime:{topic}`
    pub fn channel(&self, topic: &str) -> ChannelBuilder {
        ChannelBuilder::new(self, topic)
    }

    pub(crate) fn next_ref(&self) -> String {
        self.next_ref.fetch_add(1, Ordering::SeqCst).to_string()
    }

    pub(crate) fn websocket_url(&self) -> Result<Url, RealtimeError> {
        let mut url = Url::parse(&self.url)?;
        let scheme = match url.scheme() {
            "http" | "ws" => "ws",
            "https" | "wss" => "wss",
            s => {
                return Err(RealtimeError::ConnectionError(format!(
                    "Unsupported URL scheme: {}",
                    s
                )))
            }
        };
        url.set_scheme(scheme)
            .map_err(|_| RealtimeError::ConnectionError("Cannot set URL scheme".to_string()))?;
        url.set_path("/realtime/v1/websocket");
        url.query_pairs_mut()
            .clear()
            .append_pair("apikey", &self.key)
            .append_pair("vsn", "1.0.0");
        Ok(url)
    }

    async fn set_connection_state(&self, state: ConnectionState) {
        Self::set_connection_state_internal(&self.state, &self.state_change, state).await;
    }

    async fn set_connection_state_internal(
        state_arc: &RwLock<ConnectionState>,
        state_change_tx: &broadcast::Sender<ConnectionState>,
        state: ConnectionState,
    ) {
        let mut current_state = state_arc.write().await;
        if *current_state != state {
            info!("Client state changing from {:?} to {:?}", *current_state, state);
            *current_state = state;
            let _ = state_change_tx.send(state);
        }
    }

    /// Connects unless already connected. Concurrent callers share one attempt.
    pub async fn ensure_connected(&self) -> Result<(), RealtimeError> {
        let _guard = self.connect_lock.lock().await;
        if self.get_connection_state().await == ConnectionState::Connected {
            return Ok(());
        }
        self.connect().await
    }

    /// Opens the socket and spawns the reader and writer tasks.
    /// Returns once the handshake has completed.
    pub async fn connect(&self) -> Result<(), RealtimeError> {
        let ws_url = self.websocket_url()?;
        info!("Connecting to {}", ws_url.as_str().split('?').next().unwrap_or(""));
        self.set_connection_state(ConnectionState::Connecting).await;

        let ws_stream = match connect_async(ws_url.as_str()).await {
            Ok((stream, _response)) => stream,
            Err(e) => {
                error!("WebSocket connection failed: {}", e);
                self.set_connection_state(ConnectionState::Disconnected)
                    .await;
                return Err(RealtimeError::ConnectionError(format!(
                    "WebSocket connection failed: {}",
                    e
                )));
            }
        };

        let (mut write, mut read) = ws_stream.split();
        let (socket_tx, mut socket_rx) = mpsc::channel::<Message>(100);
        *self.socket.write().await = Some(socket_tx.clone());
        self.shutdown.send_replace(false);
        self.set_connection_state(ConnectionState::Connected).await;

        tokio::spawn(async move {
            debug!("Writer task started");
            while let Some(message) = socket_rx.recv().await {
                trace!("Writer task sending message: {:?}", message);
                if let Err(e) = write.send(message).await {
                    error!("WebSocket send error: {}", e);
                    break;
                }
            }
            let _ = write.close().await;
            debug!("Writer task finished");
        });

        let client = self.clone();
        let mut shutdown_rx = self.shutdown.subscribe();
        let heartbeat_period = Duration::from_millis(self.options.heartbeat_interval);

        tokio::spawn(async move {
            debug!("Reader task started");
            let mut heartbeat = tokio::time::interval(heartbeat_period);
            heartbeat.tick().await;

            loop {
                tokio::select! {
                    biased;

                    _ = shutdown_rx.changed() => {
                        debug!("Reader task received shutdown");
                        break;
                    }

                    msg_result = read.next() => {
                        match msg_result {
                            Some(Ok(Message::Text(text))) => client.route_frame(&text).await,
                            Some(Ok(msg)) if msg.is_close() => {
                                debug!("Received Close frame");
                                break;
                            }
                            Some(Ok(_)) => {}
                            Some(Err(e)) => {
                                error!("WebSocket read error: {}", e);
                                break;
                            }
                            None => {
                                debug!("WebSocket stream closed by remote");
                                break;
                            }
                        }
                    }

                    _ = heartbeat.tick() => {
                        let frame = json!({
                            "topic": "phoenix",
                            "event": ChannelEvent::Heartbeat,
                            "payload": {},
                            "ref": client.next_ref()
                        });
                        if let Err(e) = socket_tx.send(Message::Text(frame.to_string())).await {
                            error!("Failed to send heartbeat: {}", e);
                            break;
                        }
                    }
                }
            }

            // A newer connection may already own the socket slot.
            let mut socket_guard = client.socket.write().await;
            let owns_slot = socket_guard
                .as_ref()
                .map_or(true, |current| current.same_channel(&socket_tx));
            if owns_slot {
                *socket_guard = None;
                drop(socket_guard);
                client.set_connection_state(ConnectionState::Disconnected).await;
                client.close_channels().await;
            }
            debug!("Reader task finished");
        });

        Ok(())
    }

    async fn route_frame(&self, text: &str) {
        let message = match serde_json::from_str::<RealtimeMessage>(text) {
            Ok(message) => message,
            Err(e) => {
                error!("Failed to parse frame: {}. Raw: {}", e, text);
                return;
            }
        };
        trace!("frame topic='{}' event={:?}", message.topic, message.event);

        if message.event == ChannelEvent::PhoenixReply {
            if let Some(reply_ref) = &message.message_ref {
                if let Some(waiter) = self.pending_replies.lock().await.remove(reply_ref) {
                    let _ = waiter.send(message.payload);
                    return;
                }
            }
        }

        let channel = self.channels.read().await.get(&message.topic).cloned();
        match channel {
            Some(channel) => channel.handle_message(message).await,
            None if message.topic == "phoenix" => {}
            None => debug!("Frame for unknown topic {}", message.topic),
        }
    }

    /// Sends a frame and waits for the matching `phx_reply` payload
    pub(crate) async fn request(
        &self,
        topic: &str,
        event: ChannelEvent,
        payload: serde_json::Value,
    ) -> Result<serde_json::Value, RealtimeError> {
        let message_ref = self.next_ref();
        let (tx, rx) = oneshot::channel();
        self.pending_replies
            .lock()
            .await
            .insert(message_ref.clone(), tx);

        let frame = json!({
            "topic": topic,
            "event": event,
            "payload": payload,
            "ref": message_ref,
        });
        if let Err(e) = self.send_message(frame).await {
            self.pending_replies.lock().await.remove(&message_ref);
            return Err(e);
        }

        let timeout = Duration::from_millis(self.options.join_timeout);
        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(_)) => Err(RealtimeError::ConnectionError(
                "Connection closed before reply".to_string(),
            )),
            Err(_) => {
                self.pending_replies.lock().await.remove(&message_ref);
                Err(RealtimeError::SubscriptionError(format!(
                    "Timed out waiting for reply on {}",
                    topic
                )))
            }
        }
    }

    /// Closes the socket and forgets every channel
    pub async fn disconnect(&self) -> Result<(), RealtimeError> {
        info!("disconnect() called");
        self.shutdown.send_replace(true);
        if self.socket.write().await.take().is_none() {
            warn!("disconnect(): no active socket");
        }
        self.set_connection_state(ConnectionState::Disconnected)
            .await;
        self.close_channels().await;
        Ok(())
    }

    /// Forgets every channel, closing their callbacks, and fails every
    /// request still waiting for a reply.
    async fn close_channels(&self) {
        let channels: Vec<Arc<Channel>> = self
            .channels
            .write()
            .await
            .drain()
            .map(|(_, channel)| channel)
            .collect();
        for channel in channels {
            channel.close().await;
        }
        self.pending_replies.lock().await.clear();
    }

    pub(crate) async fn send_message(&self, message: serde_json::Value) -> Result<(), RealtimeError> {
        trace!("Sending message: {}", message);
        let socket_guard = self.socket.read().await;
        match socket_guard.as_ref() {
            Some(socket_tx) => socket_tx
                .send(Message::Text(message.to_string()))
                .await
                .map_err(RealtimeError::from),
            None => Err(RealtimeError::ConnectionError(
                "Client socket unavailable".to_string(),
            )),
        }
    }
}
