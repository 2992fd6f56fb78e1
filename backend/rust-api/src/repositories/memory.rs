use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{AuditStore, HistoryStore, ProgressStore, StatisticsStore, TestStore, TopicDirectory};
use crate::models::{
    AnswerAuditRecord, HistoryRecord, ProgressRecord, SubjectRecord, TestDefinition, TopicRecord,
    UserStatisticsSnapshot,
};

/// Process-local store. Keyed maps give the same upsert-by-key semantics as
/// the Mongo collections.
#[derive(Default)]
pub struct MemoryStore {
    tests: RwLock<HashMap<String, TestDefinition>>,
    topics: RwLock<HashMap<String, TopicRecord>>,
    subjects: RwLock<HashMap<String, SubjectRecord>>,
    progress: RwLock<HashMap<String, ProgressRecord>>,
    audit: RwLock<Vec<AnswerAuditRecord>>,
    history: RwLock<HashMap<String, HistoryRecord>>,
    statistics: RwLock<HashMap<String, UserStatisticsSnapshot>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn put_topic(&self, topic: TopicRecord) {
        self.topics.write().await.insert(topic.id.clone(), topic);
    }

    pub async fn put_subject(&self, subject: SubjectRecord) {
        self.subjects.write().await.insert(subject.id.clone(), subject);
    }

    pub async fn remove_test(&self, test_id: &str) -> bool {
        self.tests.write().await.remove(test_id).is_some()
    }

    pub async fn audit_records(&self) -> Vec<AnswerAuditRecord> {
        self.audit.read().await.clone()
    }

    pub async fn progress_count(&self) -> usize {
        self.progress.read().await.len()
    }
}

#[async_trait]
impl TestStore for MemoryStore {
    async fn insert_test(&self, test: &TestDefinition) -> Result<()> {
        self.tests
            .write()
            .await
            .insert(test.id.clone(), test.clone());
        Ok(())
    }

    async fn find_test(&self, test_id: &str) -> Result<Option<TestDefinition>> {
        Ok(self.tests.read().await.get(test_id).cloned())
    }

    async fn find_tests(&self, test_ids: &[String]) -> Result<Vec<TestDefinition>> {
        let tests = self.tests.read().await;
        Ok(test_ids
            .iter()
            .filter_map(|id| tests.get(id).cloned())
            .collect())
    }

    async fn recent_tests_for_topic(
        &self,
        topic_id: &str,
        limit: usize,
    ) -> Result<Vec<TestDefinition>> {
        let tests = self.tests.read().await;
        let mut matching: Vec<TestDefinition> = tests
            .values()
            .filter(|test| test.source.topic_id() == Some(topic_id))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        matching.truncate(limit);
        Ok(matching)
    }
}

#[async_trait]
impl TopicDirectory for MemoryStore {
    async fn find_topic(&self, topic_id: &str) -> Result<Option<TopicRecord>> {
        Ok(self.topics.read().await.get(topic_id).cloned())
    }

    async fn find_subject(&self, subject_id: &str) -> Result<Option<SubjectRecord>> {
        Ok(self.subjects.read().await.get(subject_id).cloned())
    }

    async fn topics_for_subject(
        &self,
        subject_id: &str,
        limit: usize,
    ) -> Result<Vec<TopicRecord>> {
        let topics = self.topics.read().await;
        let mut matching: Vec<TopicRecord> = topics
            .values()
            .filter(|topic| topic.subject_id == subject_id)
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.name.cmp(&b.name));
        matching.truncate(limit);
        Ok(matching)
    }
}

#[async_trait]
impl ProgressStore for MemoryStore {
    async fn upsert_progress(&self, record: &ProgressRecord) -> Result<()> {
        self.progress
            .write()
            .await
            .insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn find_progress(
        &self,
        user_id: &str,
        test_id: &str,
    ) -> Result<Option<ProgressRecord>> {
        let key = ProgressRecord::key(user_id, test_id);
        Ok(self.progress.read().await.get(&key).cloned())
    }

    async fn list_progress(&self, user_id: &str) -> Result<Vec<ProgressRecord>> {
        let progress = self.progress.read().await;
        let mut records: Vec<ProgressRecord> = progress
            .values()
            .filter(|record| record.user_id == user_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(records)
    }

    async fn delete_progress(&self, user_id: &str, test_id: &str) -> Result<bool> {
        let key = ProgressRecord::key(user_id, test_id);
        Ok(self.progress.write().await.remove(&key).is_some())
    }
}

#[async_trait]
impl AuditStore for MemoryStore {
    async fn append_audit(&self, records: &[AnswerAuditRecord]) -> Result<()> {
        self.audit.write().await.extend_from_slice(records);
        Ok(())
    }
}

#[async_trait]
impl HistoryStore for MemoryStore {
    async fn insert_history(&self, record: &HistoryRecord) -> Result<()> {
        self.history
            .write()
            .await
            .insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn find_history(&self, history_id: &str) -> Result<Option<HistoryRecord>> {
        Ok(self.history.read().await.get(history_id).cloned())
    }

    async fn list_history(&self, user_id: &str) -> Result<Vec<HistoryRecord>> {
        let history = self.history.read().await;
        let mut records: Vec<HistoryRecord> = history
            .values()
            .filter(|record| record.user_id == user_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| a.date.cmp(&b.date).then(a.id.cmp(&b.id)));
        Ok(records)
    }

    async fn attach_advice(&self, history_id: &str, advice: &str) -> Result<bool> {
        let mut history = self.history.write().await;
        match history.get_mut(history_id) {
            Some(record) => {
                record.advice = Some(advice.to_string());
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl StatisticsStore for MemoryStore {
    async fn replace_snapshot(&self, snapshot: &UserStatisticsSnapshot) -> Result<()> {
        self.statistics
            .write()
            .await
            .insert(snapshot.user_id.clone(), snapshot.clone());
        Ok(())
    }

    async fn find_snapshot(&self, user_id: &str) -> Result<Option<UserStatisticsSnapshot>> {
        Ok(self.statistics.read().await.get(user_id).cloned())
    }
}
