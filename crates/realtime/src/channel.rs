use crate::client::RealtimeClient;
use crate::error::RealtimeError;
use crate::filters::{DatabaseFilter, FilterOperator};
use crate::message::{ChannelEvent, PostgresChangeEvent, PostgresChangePayload, RealtimeMessage};
use log::{debug, error, info, trace, warn};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Row changes a channel subscribes to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseChanges {
    schema: String,
    table: String,
    event: PostgresChangeEvent,
    filter: Option<DatabaseFilter>,
}

impl DatabaseChanges {
    /// Every change on `public.{table}`
    pub fn new(table: &str) -> Self {
        Self {
            schema: "public".to_string(),
            table: table.to_string(),
            event: PostgresChangeEvent::All,
            filter: None,
        }
    }

    pub fn schema(mut self, schema: &str) -> Self {
        self.schema = schema.to_string();
        self
    }

    pub fn event(mut self, event: PostgresChangeEvent) -> Self {
        self.event = event;
        self
    }

    /// The server accepts a single filter per subscription; the last one wins.
    pub fn filter(mut self, filter: DatabaseFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn eq(self, column: &str, value: &str) -> Self {
        self.filter(DatabaseFilter::new(column, FilterOperator::Eq, value))
    }

    pub(crate) fn to_join_config(&self) -> serde_json::Value {
        let mut config = json!({
            "event": self.event.as_str(),
            "schema": self.schema,
            "table": self.table,
        });
        if let Some(filter) = &self.filter {
            config["filter"] = json!(filter.to_filter_string());
        }
        config
    }

    pub(crate) fn matches(&self, change: &PostgresChangePayload) -> bool {
        self.schema == change.schema
            && self.table == change.table
            && self.event.accepts(change.event_type)
    }
}

type CallbackFn = Box<dyn Fn(PostgresChangePayload) + Send + Sync>;

/// Active callback registration. Dropping it (or calling `unsubscribe`)
/// removes the callback and leaves the channel once it has none left.
pub struct Subscription {
    id: String,
    channel: Arc<Channel>,
    client: RealtimeClient,
    active: bool,
}

impl Subscription {
    pub fn topic(&self) -> &str {
        &self.channel.topic
    }

    pub async fn unsubscribe(mut self) -> Result<(), RealtimeError> {
        self.active = false;
        remove_callback(self.client.clone(), self.channel.clone(), self.id.clone()).await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if !self.active {
            return;
        }
        let (client, channel, id) = (self.client.clone(), self.channel.clone(), self.id.clone());
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                if let Err(e) = remove_callback(client, channel, id).await {
                    warn!("Error leaving channel: {}", e);
                }
            });
        }
    }
}

async fn remove_callback(
    client: RealtimeClient,
    channel: Arc<Channel>,
    id: String,
) -> Result<(), RealtimeError> {
    let remaining = {
        let mut callbacks = channel.callbacks.write().await;
        callbacks.remove(&id);
        callbacks.len()
    };
    if remaining > 0 {
        return Ok(());
    }

    if forget_channel(&client, &channel).await {
        info!("Leaving channel {}", channel.topic);
        let frame = json!({
            "topic": channel.topic,
            "event": ChannelEvent::PhoenixLeave,
            "payload": {},
            "ref": client.next_ref(),
        });
        // Already disconnected is fine.
        if let Err(e) = client.send_message(frame).await {
            debug!("Leave for {} not sent: {}", channel.topic, e);
        }
    }
    Ok(())
}

/// Removes `channel` from the client unless a newer join owns the topic
async fn forget_channel(client: &RealtimeClient, channel: &Arc<Channel>) -> bool {
    let mut channels = client.channels.write().await;
    let owned = channels
        .get(&channel.topic)
        .is_some_and(|current| Arc::ptr_eq(current, channel));
    if owned {
        channels.remove(&channel.topic);
    }
    owned
}

pub(crate) struct Channel {
    topic: String,
    callbacks: RwLock<HashMap<String, (DatabaseChanges, CallbackFn)>>,
}

impl Channel {
    /// Drops every callback, and with them whatever the callbacks captured
    pub(crate) async fn close(&self) {
        let dropped = std::mem::take(&mut *self.callbacks.write().await);
        debug!("Closed {} with {} callback(s)", self.topic, dropped.len());
    }

    pub(crate) async fn handle_message(&self, message: RealtimeMessage) {
        match message.event {
            ChannelEvent::PostgresChanges => {
                let change = match PostgresChangePayload::from_frame(&message.payload) {
                    Ok(change) => change,
                    Err(e) => {
                        error!("Malformed change on {}: {}", self.topic, e);
                        return;
                    }
                };
                let callbacks = self.callbacks.read().await;
                for (id, (changes, callback)) in callbacks.iter() {
                    if changes.matches(&change) {
                        trace!("Dispatching {:?} to {}", change.event_type, id);
                        (callback)(change.clone());
                    }
                }
            }
            ChannelEvent::PhoenixError | ChannelEvent::PhoenixClose => {
                warn!(
                    "Channel {} received {:?}: {}",
                    self.topic, message.event, message.payload
                );
            }
            ChannelEvent::System => {
                if message.payload.get("status").and_then(|s| s.as_str()) == Some("error") {
                    warn!("Channel {} system error: {}", self.topic, message.payload);
                } else {
                    debug!("Channel {} system message: {}", self.topic, message.payload);
                }
            }
            other => trace!("Unhandled event {:?} on {}", other, self.topic),
        }
    }
}

/// Collects change callbacks for one topic and joins it
pub struct ChannelBuilder<'a> {
    client: &'a RealtimeClient,
    topic: String,
    changes: Vec<(DatabaseChanges, CallbackFn)>,
}

impl<'a> ChannelBuilder<'a> {
    pub(crate) fn new(client: &'a RealtimeClient, topic: &str) -> Self {
        Self {
            client,
            topic: format!("realtime:{}", topic),
            changes: Vec::new(),
        }
    }

    pub fn on<F>(mut self, changes: DatabaseChanges, callback: F) -> Self
    where
        F: Fn(PostgresChangePayload) + Send + Sync + 'static,
    {
        self.changes.push((changes, Box::new(callback)));
        self
    }

    /// Connects if needed, joins the topic and waits for the server to
    /// accept the change configuration.
    pub async fn subscribe(self) -> Result<Vec<Subscription>, RealtimeError> {
        if self.changes.is_empty() {
            return Err(RealtimeError::SubscriptionError(
                "No changes registered for channel".to_string(),
            ));
        }

        self.client.ensure_connected().await?;

        let channel = {
            let mut channels = self.client.channels.write().await;
            if channels.contains_key(&self.topic) {
                return Err(RealtimeError::SubscriptionError(format!(
                    "{} is already joined",
                    self.topic
                )));
            }
            let channel = Arc::new(Channel {
                topic: self.topic.clone(),
                callbacks: RwLock::new(HashMap::new()),
            });
            channels.insert(self.topic.clone(), channel.clone());
            channel
        };

        let postgres_changes: Vec<serde_json::Value> = self
            .changes
            .iter()
            .map(|(changes, _)| changes.to_join_config())
            .collect();

        let mut payload = json!({
            "config": {
                "broadcast": { "ack": false, "self": false },
                "presence": { "key": "" },
                "postgres_changes": postgres_changes,
                "private": false
            }
        });
        if let Some(token) = self.client.access_token.read().await.as_ref() {
            payload["access_token"] = json!(token);
        }

        let mut subscriptions = Vec::new();
        {
            let mut callbacks = channel.callbacks.write().await;
            for (changes, callback) in self.changes {
                let id = uuid::Uuid::new_v4().to_string();
                callbacks.insert(id.clone(), (changes, callback));
                subscriptions.push(Subscription {
                    id,
                    channel: channel.clone(),
                    client: self.client.clone(),
                    active: true,
                });
            }
        }

        let reply = self
            .client
            .request(&self.topic, ChannelEvent::PhoenixJoin, payload)
            .await;

        let failure = match reply {
            Ok(reply) if reply.get("status").and_then(|s| s.as_str()) == Some("ok") => None,
            Ok(reply) => Some(RealtimeError::SubscriptionError(format!(
                "Join of {} rejected: {}",
                self.topic,
                reply.get("response").cloned().unwrap_or(reply)
            ))),
            Err(e) => Some(e),
        };

        if let Some(e) = failure {
            forget_channel(self.client, &channel).await;
            for mut subscription in subscriptions {
                subscription.active = false;
            }
            return Err(e);
        }

        info!("Joined {}", self.topic);
        Ok(subscriptions)
    }
}
