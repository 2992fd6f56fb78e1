//! Background analytics events and the queues that carry them.
//!
//! Delivery is at-least-once and best effort: publishers never wait on the
//! consumer, and a lost event only delays advice or statistics.

use anyhow::{Context, Result};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, Mutex};

use crate::metrics::track_cache_operation;

pub const REDIS_QUEUE_KEY: &str = "analytics:events";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnalyticsEvent {
    GenerateAdvice { user_id: String, history_id: String },
    UpdateStatistics { user_id: String },
}

impl AnalyticsEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            AnalyticsEvent::GenerateAdvice { .. } => "generate_advice",
            AnalyticsEvent::UpdateStatistics { .. } => "update_statistics",
        }
    }
}

#[async_trait]
pub trait EventQueue: Send + Sync {
    async fn publish(&self, event: AnalyticsEvent) -> Result<()>;

    /// Next queued event, or `None` when the queue is currently empty.
    async fn next(&self) -> Result<Option<AnalyticsEvent>>;

    async fn ping(&self) -> Result<()>;
}

/// Queue living inside the API process.
pub struct InProcessQueue {
    sender: mpsc::UnboundedSender<AnalyticsEvent>,
    receiver: Mutex<mpsc::UnboundedReceiver<AnalyticsEvent>>,
}

impl InProcessQueue {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            sender,
            receiver: Mutex::new(receiver),
        }
    }
}

impl Default for InProcessQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventQueue for InProcessQueue {
    async fn publish(&self, event: AnalyticsEvent) -> Result<()> {
        self.sender
            .send(event)
            .map_err(|_| anyhow::anyhow!("Analytics queue is closed"))
    }

    async fn next(&self) -> Result<Option<AnalyticsEvent>> {
        Ok(self.receiver.lock().await.try_recv().ok())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

/// Redis list shared between the API and the standalone worker.
pub struct RedisEventQueue {
    redis: ConnectionManager,
}

impl RedisEventQueue {
    pub fn new(redis: ConnectionManager) -> Self {
        Self { redis }
    }
}

#[async_trait]
impl EventQueue for RedisEventQueue {
    async fn publish(&self, event: AnalyticsEvent) -> Result<()> {
        let mut conn = self.redis.clone();
        let payload = serde_json::to_string(&event).context("Failed to serialize event")?;
        track_cache_operation("queue_push", async {
            redis::cmd("LPUSH")
                .arg(REDIS_QUEUE_KEY)
                .arg(&payload)
                .query_async::<()>(&mut conn)
                .await
                .context("Failed to enqueue analytics event")?;
            Ok(())
        })
        .await
    }

    async fn next(&self) -> Result<Option<AnalyticsEvent>> {
        let mut conn = self.redis.clone();
        let payload: Option<String> = track_cache_operation("queue_pop", async {
            redis::cmd("RPOP")
                .arg(REDIS_QUEUE_KEY)
                .query_async(&mut conn)
                .await
                .context("Failed to dequeue analytics event")
        })
        .await?;

        match payload {
            Some(raw) => match serde_json::from_str(&raw) {
                Ok(event) => Ok(Some(event)),
                Err(err) => {
                    tracing::warn!(error = %err, payload = %raw, "Dropping malformed analytics event");
                    Ok(None)
                }
            },
            None => Ok(None),
        }
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.redis.clone();
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .context("Redis PING failed")?;
        Ok(())
    }
}
