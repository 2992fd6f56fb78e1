use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::{
    bson::doc,
    options::{FindOptions, ReplaceOptions},
    Collection, Database,
};
use serde::de::DeserializeOwned;

use super::{AuditStore, HistoryStore, ProgressStore, StatisticsStore, TestStore, TopicDirectory};
use crate::metrics::track_db_operation;
use crate::models::{
    AnswerAuditRecord, HistoryRecord, ProgressRecord, SubjectRecord, TestDefinition, TopicRecord,
    UserStatisticsSnapshot,
};

const TESTS: &str = "tests";
const TOPICS: &str = "topics";
const SUBJECTS: &str = "subjects";
const PROGRESS: &str = "test_progress";
const AUDIT: &str = "answer_audit";
const HISTORY: &str = "test_history";
const STATISTICS: &str = "user_statistics";

#[derive(Clone)]
pub struct MongoStore {
    db: Database,
}

impl MongoStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn ping(&self) -> Result<()> {
        self.db
            .run_command(doc! { "ping": 1 })
            .await
            .context("MongoDB ping failed")?;
        Ok(())
    }

    fn collection<T: Send + Sync>(&self, name: &str) -> Collection<T> {
        self.db.collection(name)
    }

    fn upsert() -> ReplaceOptions {
        ReplaceOptions::builder().upsert(true).build()
    }
}

async fn collect<T>(mut cursor: mongodb::Cursor<T>, what: &str) -> Result<Vec<T>>
where
    T: DeserializeOwned + Unpin + Send + Sync,
{
    let mut items = Vec::new();
    while let Some(item) = cursor
        .try_next()
        .await
        .with_context(|| format!("Failed to iterate {}", what))?
    {
        items.push(item);
    }
    Ok(items)
}

#[async_trait]
impl TestStore for MongoStore {
    async fn insert_test(&self, test: &TestDefinition) -> Result<()> {
        track_db_operation("insert_one", TESTS, async {
            self.collection::<TestDefinition>(TESTS)
                .insert_one(test)
                .await
                .context("Failed to insert test")?;
            Ok(())
        })
        .await
    }

    async fn find_test(&self, test_id: &str) -> Result<Option<TestDefinition>> {
        track_db_operation("find_one", TESTS, async {
            self.collection::<TestDefinition>(TESTS)
                .find_one(doc! { "_id": test_id })
                .await
                .context("Failed to load test")
        })
        .await
    }

    async fn find_tests(&self, test_ids: &[String]) -> Result<Vec<TestDefinition>> {
        if test_ids.is_empty() {
            return Ok(Vec::new());
        }
        track_db_operation("find", TESTS, async {
            let cursor = self
                .collection::<TestDefinition>(TESTS)
                .find(doc! { "_id": { "$in": test_ids.to_vec() } })
                .await
                .context("Failed to query tests")?;
            collect(cursor, "tests").await
        })
        .await
    }

    async fn recent_tests_for_topic(
        &self,
        topic_id: &str,
        limit: usize,
    ) -> Result<Vec<TestDefinition>> {
        track_db_operation("find", TESTS, async {
            let options = FindOptions::builder()
                .sort(doc! { "created_at": -1 })
                .limit(limit as i64)
                .build();
            let cursor = self
                .collection::<TestDefinition>(TESTS)
                .find(doc! { "source.kind": "by_topic", "source.topic_id": topic_id })
                .with_options(options)
                .await
                .context("Failed to query tests by topic")?;
            collect(cursor, "tests").await
        })
        .await
    }
}

#[async_trait]
impl TopicDirectory for MongoStore {
    async fn find_topic(&self, topic_id: &str) -> Result<Option<TopicRecord>> {
        track_db_operation("find_one", TOPICS, async {
            self.collection::<TopicRecord>(TOPICS)
                .find_one(doc! { "_id": topic_id })
                .await
                .context("Failed to load topic")
        })
        .await
    }

    async fn find_subject(&self, subject_id: &str) -> Result<Option<SubjectRecord>> {
        track_db_operation("find_one", SUBJECTS, async {
            self.collection::<SubjectRecord>(SUBJECTS)
                .find_one(doc! { "_id": subject_id })
                .await
                .context("Failed to load subject")
        })
        .await
    }

    async fn topics_for_subject(
        &self,
        subject_id: &str,
        limit: usize,
    ) -> Result<Vec<TopicRecord>> {
        track_db_operation("find", TOPICS, async {
            let options = FindOptions::builder()
                .sort(doc! { "name": 1 })
                .limit(limit as i64)
                .build();
            let cursor = self
                .collection::<TopicRecord>(TOPICS)
                .find(doc! { "subject_id": subject_id })
                .with_options(options)
                .await
                .context("Failed to query topics")?;
            collect(cursor, "topics").await
        })
        .await
    }
}

#[async_trait]
impl ProgressStore for MongoStore {
    async fn upsert_progress(&self, record: &ProgressRecord) -> Result<()> {
        track_db_operation("replace_one", PROGRESS, async {
            self.collection::<ProgressRecord>(PROGRESS)
                .replace_one(doc! { "_id": &record.id }, record)
                .with_options(Self::upsert())
                .await
                .context("Failed to save progress")?;
            Ok(())
        })
        .await
    }

    async fn find_progress(
        &self,
        user_id: &str,
        test_id: &str,
    ) -> Result<Option<ProgressRecord>> {
        let key = ProgressRecord::key(user_id, test_id);
        track_db_operation("find_one", PROGRESS, async {
            self.collection::<ProgressRecord>(PROGRESS)
                .find_one(doc! { "_id": &key })
                .await
                .context("Failed to load progress")
        })
        .await
    }

    async fn list_progress(&self, user_id: &str) -> Result<Vec<ProgressRecord>> {
        track_db_operation("find", PROGRESS, async {
            let options = FindOptions::builder()
                .sort(doc! { "updated_at": -1 })
                .build();
            let cursor = self
                .collection::<ProgressRecord>(PROGRESS)
                .find(doc! { "user_id": user_id })
                .with_options(options)
                .await
                .context("Failed to query progress")?;
            collect(cursor, "progress records").await
        })
        .await
    }

    async fn delete_progress(&self, user_id: &str, test_id: &str) -> Result<bool> {
        let key = ProgressRecord::key(user_id, test_id);
        track_db_operation("delete_one", PROGRESS, async {
            let result = self
                .collection::<ProgressRecord>(PROGRESS)
                .delete_one(doc! { "_id": &key })
                .await
                .context("Failed to delete progress")?;
            Ok(result.deleted_count > 0)
        })
        .await
    }
}

#[async_trait]
impl AuditStore for MongoStore {
    async fn append_audit(&self, records: &[AnswerAuditRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        track_db_operation("insert_many", AUDIT, async {
            self.collection::<AnswerAuditRecord>(AUDIT)
                .insert_many(records)
                .await
                .context("Failed to write answer audit")?;
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl HistoryStore for MongoStore {
    async fn insert_history(&self, record: &HistoryRecord) -> Result<()> {
        track_db_operation("insert_one", HISTORY, async {
            self.collection::<HistoryRecord>(HISTORY)
                .insert_one(record)
                .await
                .context("Failed to insert history")?;
            Ok(())
        })
        .await
    }

    async fn find_history(&self, history_id: &str) -> Result<Option<HistoryRecord>> {
        track_db_operation("find_one", HISTORY, async {
            self.collection::<HistoryRecord>(HISTORY)
                .find_one(doc! { "_id": history_id })
                .await
                .context("Failed to load history")
        })
        .await
    }

    async fn list_history(&self, user_id: &str) -> Result<Vec<HistoryRecord>> {
        track_db_operation("find", HISTORY, async {
            let options = FindOptions::builder()
                .sort(doc! { "date": 1, "_id": 1 })
                .build();
            let cursor = self
                .collection::<HistoryRecord>(HISTORY)
                .find(doc! { "user_id": user_id })
                .with_options(options)
                .await
                .context("Failed to query history")?;
            collect(cursor, "history records").await
        })
        .await
    }

    async fn attach_advice(&self, history_id: &str, advice: &str) -> Result<bool> {
        track_db_operation("update_one", HISTORY, async {
            let result = self
                .collection::<HistoryRecord>(HISTORY)
                .update_one(
                    doc! { "_id": history_id },
                    doc! { "$set": { "advice": advice } },
                )
                .await
                .context("Failed to attach advice")?;
            Ok(result.matched_count > 0)
        })
        .await
    }
}

#[async_trait]
impl StatisticsStore for MongoStore {
    async fn replace_snapshot(&self, snapshot: &UserStatisticsSnapshot) -> Result<()> {
        track_db_operation("replace_one", STATISTICS, async {
            self.collection::<UserStatisticsSnapshot>(STATISTICS)
                .replace_one(doc! { "userId": &snapshot.user_id }, snapshot)
                .with_options(Self::upsert())
                .await
                .context("Failed to save statistics snapshot")?;
            Ok(())
        })
        .await
    }

    async fn find_snapshot(&self, user_id: &str) -> Result<Option<UserStatisticsSnapshot>> {
        track_db_operation("find_one", STATISTICS, async {
            self.collection::<UserStatisticsSnapshot>(STATISTICS)
                .find_one(doc! { "userId": user_id })
                .await
                .context("Failed to load statistics snapshot")
        })
        .await
    }
}
