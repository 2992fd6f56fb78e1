//! Document-store contracts used by the engine services.
//!
//! Each collection gets its own small trait so services only see the
//! operations they need. `mongo` holds the production adapter and `memory`
//! a process-local one for tests and local runs.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{
    AnswerAuditRecord, HistoryRecord, ProgressRecord, SubjectRecord, TestDefinition, TopicRecord,
    UserStatisticsSnapshot,
};

pub mod memory;
pub mod mongo;

pub use memory::MemoryStore;
pub use mongo::MongoStore;

#[async_trait]
pub trait TestStore: Send + Sync {
    async fn insert_test(&self, test: &TestDefinition) -> Result<()>;

    async fn find_test(&self, test_id: &str) -> Result<Option<TestDefinition>>;

    async fn find_tests(&self, test_ids: &[String]) -> Result<Vec<TestDefinition>>;

    /// Newest first.
    async fn recent_tests_for_topic(
        &self,
        topic_id: &str,
        limit: usize,
    ) -> Result<Vec<TestDefinition>>;
}

#[async_trait]
pub trait TopicDirectory: Send + Sync {
    async fn find_topic(&self, topic_id: &str) -> Result<Option<TopicRecord>>;

    async fn find_subject(&self, subject_id: &str) -> Result<Option<SubjectRecord>>;

    async fn topics_for_subject(&self, subject_id: &str, limit: usize)
        -> Result<Vec<TopicRecord>>;
}

#[async_trait]
pub trait ProgressStore: Send + Sync {
    /// Insert or overwrite the record stored under `record.id`.
    async fn upsert_progress(&self, record: &ProgressRecord) -> Result<()>;

    async fn find_progress(&self, user_id: &str, test_id: &str)
        -> Result<Option<ProgressRecord>>;

    async fn list_progress(&self, user_id: &str) -> Result<Vec<ProgressRecord>>;

    /// Returns whether a record existed.
    async fn delete_progress(&self, user_id: &str, test_id: &str) -> Result<bool>;
}

#[async_trait]
pub trait AuditStore: Send + Sync {
    async fn append_audit(&self, records: &[AnswerAuditRecord]) -> Result<()>;
}

#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn insert_history(&self, record: &HistoryRecord) -> Result<()>;

    async fn find_history(&self, history_id: &str) -> Result<Option<HistoryRecord>>;

    async fn list_history(&self, user_id: &str) -> Result<Vec<HistoryRecord>>;

    async fn attach_advice(&self, history_id: &str, advice: &str) -> Result<bool>;
}

#[async_trait]
pub trait StatisticsStore: Send + Sync {
    async fn replace_snapshot(&self, snapshot: &UserStatisticsSnapshot) -> Result<()>;

    async fn find_snapshot(&self, user_id: &str) -> Result<Option<UserStatisticsSnapshot>>;
}

/// Everything the services need from persistence, bundled for `AppState`.
#[derive(Clone)]
pub struct Stores {
    pub tests: Arc<dyn TestStore>,
    pub topics: Arc<dyn TopicDirectory>,
    pub progress: Arc<dyn ProgressStore>,
    pub audit: Arc<dyn AuditStore>,
    pub history: Arc<dyn HistoryStore>,
    pub statistics: Arc<dyn StatisticsStore>,
}

impl Stores {
    pub fn from_mongo(store: MongoStore) -> Self {
        Self::from_shared(Arc::new(store))
    }

    pub fn from_memory(store: Arc<MemoryStore>) -> Self {
        Self::from_shared(store)
    }

    fn from_shared<S>(store: Arc<S>) -> Self
    where
        S: TestStore
            + TopicDirectory
            + ProgressStore
            + AuditStore
            + HistoryStore
            + StatisticsStore
            + 'static,
    {
        Self {
            tests: store.clone(),
            topics: store.clone(),
            progress: store.clone(),
            audit: store.clone(),
            history: store.clone(),
            statistics: store,
        }
    }
}
