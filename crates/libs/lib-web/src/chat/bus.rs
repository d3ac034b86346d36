//! # Broadcast Bus
//!
//! Named groups of session delivery handles. Publishing to a group delivers the
//! event to every handle joined at that moment.
//!
//! Two implementations:
//!
//! - [`LocalBus`]: process-local registry.
//! - [`RedisBus`]: publishes through Redis pub/sub so sessions in other server
//!   processes receive the event as well. Each process keeps its own local
//!   membership and delivers whatever its pattern subscription receives. A
//!   dropped subscription is re-established with exponential backoff.
//!
//! Delivery never blocks the publisher. A handle whose queue is full or closed
//! misses the event; other members are unaffected.

use super::events::GroupEvent;
use async_trait::async_trait;
use futures_util::StreamExt;
use redis::AsyncCommands;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Sending half of a session's group queue.
pub type DeliveryHandle = mpsc::Sender<GroupEvent>;

/// Group name for a room.
pub fn room_group(room_id: i64) -> String {
    format!("chat_{}", room_id)
}

/// Group shared by every global presence connection.
pub const PRESENCE_GROUP: &str = "presence_global";

#[derive(Debug, Error)]
pub enum BusError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("encode error: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Group membership and fan-out.
#[async_trait]
pub trait BroadcastBus: Send + Sync {
    /// Add `member` to `group`. Re-joining replaces the previous handle.
    async fn join(&self, group: &str, member: Uuid, handle: DeliveryHandle);

    /// Remove `member` from `group`. Unknown members are ignored.
    async fn leave(&self, group: &str, member: Uuid);

    /// Deliver `event` to every current member of `group`.
    async fn publish(&self, group: &str, event: GroupEvent) -> Result<(), BusError>;
}

// region: --- Registry

/// Group name -> member id -> delivery handle.
///
/// Membership changes take the write lock and delivery runs under the read
/// lock, so a publish sees either the state before a join/leave or after it.
#[derive(Default)]
pub struct GroupRegistry {
    groups: RwLock<HashMap<String, HashMap<Uuid, DeliveryHandle>>>,
}

impl GroupRegistry {
    pub async fn join(&self, group: &str, member: Uuid, handle: DeliveryHandle) {
        let mut groups = self.groups.write().await;
        groups.entry(group.to_string()).or_default().insert(member, handle);
    }

    pub async fn leave(&self, group: &str, member: Uuid) {
        let mut groups = self.groups.write().await;
        if let Some(members) = groups.get_mut(group) {
            members.remove(&member);
            if members.is_empty() {
                groups.remove(group);
            }
        }
    }

    /// Deliver to every member; returns how many handles accepted the event.
    pub async fn deliver(&self, group: &str, event: &GroupEvent) -> usize {
        let groups = self.groups.read().await;
        let Some(members) = groups.get(group) else {
            return 0;
        };

        let mut delivered = 0;
        for (member, handle) in members {
            match handle.try_send(event.clone()) {
                Ok(()) => delivered += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(
                        group = %group,
                        member = %member,
                        "[BUS] QUEUE_FULL group={} member={} - event dropped for this member",
                        group,
                        member
                    );
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    debug!(group = %group, member = %member, "[BUS] Handle closed, skipping");
                }
            }
        }
        delivered
    }

    pub async fn member_count(&self, group: &str) -> usize {
        self.groups.read().await.get(group).map(HashMap::len).unwrap_or(0)
    }
}

// endregion: --- Registry

// region: --- LocalBus

/// In-process bus. All sessions must live in this process.
#[derive(Default, Clone)]
pub struct LocalBus {
    registry: Arc<GroupRegistry>,
}

impl LocalBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn member_count(&self, group: &str) -> usize {
        self.registry.member_count(group).await
    }
}

#[async_trait]
impl BroadcastBus for LocalBus {
    async fn join(&self, group: &str, member: Uuid, handle: DeliveryHandle) {
        self.registry.join(group, member, handle).await;
        debug!(group = %group, member = %member, "[BUS] JOIN");
    }

    async fn leave(&self, group: &str, member: Uuid) {
        self.registry.leave(group, member).await;
        debug!(group = %group, member = %member, "[BUS] LEAVE");
    }

    async fn publish(&self, group: &str, event: GroupEvent) -> Result<(), BusError> {
        let delivered = self.registry.deliver(group, &event).await;
        debug!(group = %group, delivered, "[BUS] PUBLISH");
        Ok(())
    }
}

// endregion: --- LocalBus

// region: --- RedisBus

/// Redis pub/sub bus for multi-process deployments.
///
/// Events are published as JSON on `<prefix>:<group>`. A background task
/// pattern-subscribes to `<prefix>:*` and hands every received event to the
/// local members of that group, including events this process published.
pub struct RedisBus {
    registry: Arc<GroupRegistry>,
    publisher: redis::aio::MultiplexedConnection,
    prefix: String,
    listener: JoinHandle<()>,
}

impl RedisBus {
    /// Connect to `redis_url` and start the subscription task.
    ///
    /// The first subscription is established before this returns, so a
    /// misconfigured URL fails startup instead of silently dropping events.
    pub async fn connect(redis_url: &str, prefix: &str) -> Result<Self, BusError> {
        let client = redis::Client::open(redis_url)?;
        let publisher = client.get_multiplexed_async_connection().await?;
        let pubsub = subscribe(&client, prefix).await?;

        let registry = Arc::new(GroupRegistry::default());
        let listener = tokio::spawn(listen(
            client,
            pubsub,
            Arc::clone(&registry),
            prefix.to_string(),
        ));

        info!(prefix = %prefix, "[BUS] Redis bus connected");

        Ok(Self {
            registry,
            publisher,
            prefix: prefix.to_string(),
            listener,
        })
    }

    fn channel(&self, group: &str) -> String {
        format!("{}:{}", self.prefix, group)
    }
}

const RESUBSCRIBE_MIN_DELAY: Duration = Duration::from_millis(250);
const RESUBSCRIBE_MAX_DELAY: Duration = Duration::from_secs(30);

/// Delay before the next resubscribe attempt.
fn next_backoff(current: Duration) -> Duration {
    (current * 2).min(RESUBSCRIBE_MAX_DELAY)
}

async fn subscribe(client: &redis::Client, prefix: &str) -> Result<redis::aio::PubSub, BusError> {
    let mut pubsub = client.get_async_pubsub().await?;
    pubsub.psubscribe(format!("{}:*", prefix)).await?;
    Ok(pubsub)
}

/// Deliver subscribed events to local members, resubscribing whenever the
/// subscription drops. Runs until the bus is dropped.
async fn listen(
    client: redis::Client,
    pubsub: redis::aio::PubSub,
    registry: Arc<GroupRegistry>,
    prefix: String,
) {
    let mut pubsub = Some(pubsub);
    let mut delay = RESUBSCRIBE_MIN_DELAY;

    loop {
        let current = match pubsub.take() {
            Some(current) => current,
            None => match subscribe(&client, &prefix).await {
                Ok(current) => {
                    info!(prefix = %prefix, "[BUS] Redis subscription restored");
                    delay = RESUBSCRIBE_MIN_DELAY;
                    current
                }
                Err(e) => {
                    error!(
                        error = %e,
                        retry_ms = delay.as_millis(),
                        "[BUS] Redis resubscribe failed, retrying in {}ms",
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                    delay = next_backoff(delay);
                    continue;
                }
            },
        };

        relay_messages(current, &registry, &prefix).await;

        warn!(prefix = %prefix, "[BUS] Redis subscription closed, resubscribing");
        tokio::time::sleep(delay).await;
        delay = next_backoff(delay);
    }
}

/// Deliver every message of one subscription until its stream ends.
async fn relay_messages(pubsub: redis::aio::PubSub, registry: &GroupRegistry, prefix: &str) {
    let channel_prefix = format!("{}:", prefix);
    let mut messages = pubsub.into_on_message();

    while let Some(msg) = messages.next().await {
        let Some(group) = msg.get_channel_name().strip_prefix(&channel_prefix) else {
            continue;
        };

        let payload: String = match msg.get_payload() {
            Ok(payload) => payload,
            Err(e) => {
                warn!(group = %group, error = %e, "[BUS] Unreadable payload");
                continue;
            }
        };

        match serde_json::from_str::<GroupEvent>(&payload) {
            Ok(event) => {
                registry.deliver(group, &event).await;
            }
            Err(e) => {
                warn!(group = %group, error = %e, "[BUS] Undecodable event");
            }
        }
    }
}

impl Drop for RedisBus {
    fn drop(&mut self) {
        self.listener.abort();
    }
}

#[async_trait]
impl BroadcastBus for RedisBus {
    async fn join(&self, group: &str, member: Uuid, handle: DeliveryHandle) {
        self.registry.join(group, member, handle).await;
    }

    async fn leave(&self, group: &str, member: Uuid) {
        self.registry.leave(group, member).await;
    }

    async fn publish(&self, group: &str, event: GroupEvent) -> Result<(), BusError> {
        let payload = serde_json::to_string(&event)?;
        let mut conn = self.publisher.clone();
        let receivers: i64 = conn.publish(self.channel(group), payload).await?;
        debug!(group = %group, receivers, "[BUS] PUBLISH (redis)");
        Ok(())
    }
}

// endregion: --- RedisBus
