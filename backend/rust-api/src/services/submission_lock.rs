use std::collections::HashMap;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use tokio::sync::Mutex;

use crate::metrics::track_cache_operation;

pub const SUBMISSION_LOCK_TTL: Duration = Duration::from_secs(30);

fn lock_key(user_id: &str, test_id: &str) -> String {
    format!("submit:lock:{}:{}", user_id, test_id)
}

/// Short-lived guard that serializes submissions of one user for one test.
#[async_trait]
pub trait SubmissionLock: Send + Sync {
    /// `false` when another submission currently holds the lock.
    async fn try_acquire(&self, user_id: &str, test_id: &str) -> Result<bool>;

    async fn release(&self, user_id: &str, test_id: &str) -> Result<()>;
}

pub struct RedisSubmissionLock {
    redis: ConnectionManager,
}

impl RedisSubmissionLock {
    pub fn new(redis: ConnectionManager) -> Self {
        Self { redis }
    }
}

#[async_trait]
impl SubmissionLock for RedisSubmissionLock {
    async fn try_acquire(&self, user_id: &str, test_id: &str) -> Result<bool> {
        let mut conn = self.redis.clone();
        let key = lock_key(user_id, test_id);
        track_cache_operation("lock_acquire", async {
            let reply: Option<String> = redis::cmd("SET")
                .arg(&key)
                .arg(1)
                .arg("NX")
                .arg("EX")
                .arg(SUBMISSION_LOCK_TTL.as_secs())
                .query_async(&mut conn)
                .await
                .context("Failed to acquire submission lock")?;
            Ok(reply.is_some())
        })
        .await
    }

    async fn release(&self, user_id: &str, test_id: &str) -> Result<()> {
        let mut conn = self.redis.clone();
        let key = lock_key(user_id, test_id);
        track_cache_operation("lock_release", async {
            redis::cmd("DEL")
                .arg(&key)
                .query_async::<()>(&mut conn)
                .await
                .context("Failed to release submission lock")?;
            Ok(())
        })
        .await
    }
}

pub struct InMemorySubmissionLock {
    held: Mutex<HashMap<String, Instant>>,
    ttl: Duration,
}

impl InMemorySubmissionLock {
    pub fn new(ttl: Duration) -> Self {
        Self {
            held: Mutex::new(HashMap::new()),
            ttl,
        }
    }
}

impl Default for InMemorySubmissionLock {
    fn default() -> Self {
        Self::new(SUBMISSION_LOCK_TTL)
    }
}

#[async_trait]
impl SubmissionLock for InMemorySubmissionLock {
    async fn try_acquire(&self, user_id: &str, test_id: &str) -> Result<bool> {
        let now = Instant::now();
        let mut held = self.held.lock().await;
        held.retain(|_, acquired| now.duration_since(*acquired) < self.ttl);

        let key = lock_key(user_id, test_id);
        if held.contains_key(&key) {
            return Ok(false);
        }
        held.insert(key, now);
        Ok(true)
    }

    async fn release(&self, user_id: &str, test_id: &str) -> Result<()> {
        self.held.lock().await.remove(&lock_key(user_id, test_id));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn second_acquire_fails_until_release() {
        let lock = InMemorySubmissionLock::default();

        assert!(lock.try_acquire("u1", "t1").await.unwrap());
        assert!(!lock.try_acquire("u1", "t1").await.unwrap());
        assert!(lock.try_acquire("u2", "t1").await.unwrap());

        lock.release("u1", "t1").await.unwrap();
        assert!(lock.try_acquire("u1", "t1").await.unwrap());
    }

    #[tokio::test]
    async fn expired_lock_is_reclaimed() {
        let lock = InMemorySubmissionLock::new(Duration::from_millis(5));

        assert!(lock.try_acquire("u1", "t1").await.unwrap());
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(lock.try_acquire("u1", "t1").await.unwrap());
    }
}
