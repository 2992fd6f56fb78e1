use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use validator::Validate;

use crate::error::EngineError;
use crate::metrics::{PROGRESS_RECORDS_HEALED_TOTAL, PROGRESS_SAVES_TOTAL};
use crate::models::history::percent;
use crate::models::progress::SaveProgressRequest;
use crate::models::{
    ProgressRecord, ProgressStatus, ProgressSummary, SaveOutcome, SelectedAnswer, TestDefinition,
};
use crate::repositories::{ProgressStore, TestStore};

/// Why a stored progress record no longer describes a resumable attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaleReason {
    TestMissing,
    NoQuestions,
    AlreadyAnswered,
}

impl StaleReason {
    pub fn label(&self) -> &'static str {
        match self {
            StaleReason::TestMissing => "test_missing",
            StaleReason::NoQuestions => "no_questions",
            StaleReason::AlreadyAnswered => "already_answered",
        }
    }
}

pub fn stale_reason(record: &ProgressRecord, test: Option<&TestDefinition>) -> Option<StaleReason> {
    let Some(test) = test else {
        return Some(StaleReason::TestMissing);
    };
    let total = test.total_questions();
    if total == 0 {
        return Some(StaleReason::NoQuestions);
    }
    if record.answered_count() >= total {
        return Some(StaleReason::AlreadyAnswered);
    }
    None
}

/// Keeps the last answer given for each question, in first-seen order.
pub fn dedupe_answers(answers: Vec<SelectedAnswer>) -> Vec<SelectedAnswer> {
    let mut unique: Vec<SelectedAnswer> = Vec::with_capacity(answers.len());
    for answer in answers {
        match unique
            .iter_mut()
            .find(|existing| existing.question_id == answer.question_id)
        {
            Some(existing) => *existing = answer,
            None => unique.push(answer),
        }
    }
    unique
}

#[derive(Clone)]
pub struct ProgressService {
    progress: Arc<dyn ProgressStore>,
    tests: Arc<dyn TestStore>,
}

impl ProgressService {
    pub fn new(progress: Arc<dyn ProgressStore>, tests: Arc<dyn TestStore>) -> Self {
        Self { progress, tests }
    }

    pub async fn save(
        &self,
        user_id: &str,
        test_id: &str,
        request: SaveProgressRequest,
    ) -> Result<SaveOutcome, EngineError> {
        request.validate()?;

        let test = self
            .tests
            .find_test(test_id)
            .await?
            .ok_or_else(|| EngineError::not_found("Test not found"))?;

        let answers = dedupe_answers(request.answers);
        for answer in &answers {
            let question = test.question(&answer.question_id).ok_or_else(|| {
                EngineError::validation(format!("Unknown question id: {}", answer.question_id))
            })?;
            if !question.has_option(&answer.selected_option_id) {
                return Err(EngineError::validation(format!(
                    "Unknown option {} for question {}",
                    answer.selected_option_id, answer.question_id
                )));
            }
        }

        let total = test.total_questions();
        if answers.len() >= total {
            self.progress.delete_progress(user_id, test_id).await?;
            PROGRESS_SAVES_TOTAL.with_label_values(&["completed"]).inc();
            tracing::debug!(user_id, test_id, "All questions answered, progress cleared");
            return Ok(SaveOutcome::Completed);
        }

        if request.current_question_index as usize >= total {
            return Err(EngineError::validation(format!(
                "currentQuestionIndex must be less than {}",
                total
            )));
        }

        let record = ProgressRecord {
            id: ProgressRecord::key(user_id, test_id),
            user_id: user_id.to_string(),
            test_id: test_id.to_string(),
            current_question_index: request.current_question_index,
            answers,
            time_left_seconds: request.time_left_seconds,
            status: ProgressStatus::InProgress,
            updated_at: Utc::now(),
        };
        self.progress.upsert_progress(&record).await?;
        PROGRESS_SAVES_TOTAL.with_label_values(&["in_progress"]).inc();

        Ok(SaveOutcome::InProgress(record))
    }

    /// Deletes stale records among `records` and returns the survivors with
    /// their tests.
    pub async fn heal(
        &self,
        records: Vec<ProgressRecord>,
    ) -> Result<Vec<(ProgressRecord, TestDefinition)>, EngineError> {
        let test_ids: Vec<String> = records.iter().map(|record| record.test_id.clone()).collect();
        let tests: HashMap<String, TestDefinition> = self
            .tests
            .find_tests(&test_ids)
            .await?
            .into_iter()
            .map(|test| (test.id.clone(), test))
            .collect();

        let mut survivors = Vec::with_capacity(records.len());
        for record in records {
            let test = tests.get(&record.test_id);
            match stale_reason(&record, test) {
                Some(reason) => {
                    self.progress
                        .delete_progress(&record.user_id, &record.test_id)
                        .await?;
                    PROGRESS_RECORDS_HEALED_TOTAL
                        .with_label_values(&[reason.label()])
                        .inc();
                    tracing::info!(
                        user_id = %record.user_id,
                        test_id = %record.test_id,
                        reason = reason.label(),
                        "Removed stale progress record"
                    );
                }
                None => {
                    if let Some(test) = test {
                        survivors.push((record, test.clone()));
                    }
                }
            }
        }
        Ok(survivors)
    }

    pub async fn list(&self, user_id: &str) -> Result<Vec<ProgressSummary>, EngineError> {
        let records = self.progress.list_progress(user_id).await?;
        let survivors = self.heal(records).await?;

        Ok(survivors
            .into_iter()
            .map(|(record, test)| ProgressSummary {
                progress_percent: percent(
                    record.answered_count() as u32,
                    test.total_questions() as u32,
                ),
                test_id: record.test_id,
                title: test.title,
                time_left: record.time_left_seconds,
                current_question_index: record.current_question_index,
                status: record.status,
            })
            .collect())
    }

    pub async fn get(&self, user_id: &str, test_id: &str) -> Result<ProgressRecord, EngineError> {
        let record = self
            .progress
            .find_progress(user_id, test_id)
            .await?
            .ok_or_else(|| EngineError::not_found("Progress not found"))?;

        self.heal(vec![record])
            .await?
            .into_iter()
            .next()
            .map(|(record, _)| record)
            .ok_or_else(|| EngineError::not_found("Progress not found"))
    }

    /// Returns whether a record existed.
    pub async fn delete(&self, user_id: &str, test_id: &str) -> Result<bool, EngineError> {
        Ok(self.progress.delete_progress(user_id, test_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DifficultyTier, OptionRecord, QuestionRecord, TestSource};
    use crate::repositories::MemoryStore;

    fn test_with(id: &str, questions: usize) -> TestDefinition {
        TestDefinition {
            id: id.to_string(),
            title: format!("Test {id}"),
            source: TestSource::ByCustomTopic {
                name: "Geometry".to_string(),
                description: None,
            },
            difficulty_tier: DifficultyTier::Low,
            questions: (1..=questions)
                .map(|n| QuestionRecord {
                    question_id: format!("q{n}"),
                    text: format!("Question number {n}?"),
                    options: ["a", "b", "c", "d"]
                        .iter()
                        .map(|id| OptionRecord {
                            option_id: id.to_string(),
                            text: format!("Option {id}"),
                        })
                        .collect(),
                    correct_option_id: "a".to_string(),
                    explanation: "Option a is right for this question.".to_string(),
                    question_type: None,
                })
                .collect(),
            time_limit_seconds: 600,
            created_by: "author".to_string(),
            created_at: Utc::now(),
        }
    }

    fn answer(question: &str, option: &str) -> SelectedAnswer {
        SelectedAnswer {
            question_id: question.to_string(),
            selected_option_id: option.to_string(),
        }
    }

    fn record(test_id: &str, answered: usize) -> ProgressRecord {
        ProgressRecord {
            id: ProgressRecord::key("u1", test_id),
            user_id: "u1".to_string(),
            test_id: test_id.to_string(),
            current_question_index: 0,
            answers: (1..=answered).map(|n| answer(&format!("q{n}"), "a")).collect(),
            time_left_seconds: 300,
            status: ProgressStatus::InProgress,
            updated_at: Utc::now(),
        }
    }

    async fn service_with(tests: Vec<TestDefinition>) -> (ProgressService, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        for test in &tests {
            store.insert_test(test).await.unwrap();
        }
        (ProgressService::new(store.clone(), store.clone()), store)
    }

    fn save_request(index: u32, answers: Vec<SelectedAnswer>) -> SaveProgressRequest {
        SaveProgressRequest {
            current_question_index: index,
            answers,
            time_left_seconds: 420,
        }
    }

    #[test]
    fn stale_reason_covers_every_case() {
        let test = test_with("t1", 3);
        let empty = test_with("t2", 0);

        assert_eq!(stale_reason(&record("t1", 1), Some(&test)), None);
        assert_eq!(
            stale_reason(&record("t1", 1), None),
            Some(StaleReason::TestMissing)
        );
        assert_eq!(
            stale_reason(&record("t2", 0), Some(&empty)),
            Some(StaleReason::NoQuestions)
        );
        assert_eq!(
            stale_reason(&record("t1", 3), Some(&test)),
            Some(StaleReason::AlreadyAnswered)
        );
    }

    #[test]
    fn dedupe_keeps_last_answer() {
        let answers = dedupe_answers(vec![answer("q1", "a"), answer("q2", "b"), answer("q1", "c")]);
        assert_eq!(answers, vec![answer("q1", "c"), answer("q2", "b")]);
    }

    #[tokio::test]
    async fn repeated_save_keeps_single_record_with_latest_state() {
        let (service, store) = service_with(vec![test_with("t1", 5)]).await;

        service
            .save("u1", "t1", save_request(1, vec![answer("q1", "a")]))
            .await
            .unwrap();
        let outcome = service
            .save(
                "u1",
                "t1",
                save_request(2, vec![answer("q1", "b"), answer("q2", "c")]),
            )
            .await
            .unwrap();

        assert!(matches!(outcome, SaveOutcome::InProgress(_)));
        assert_eq!(store.progress_count().await, 1);
        let stored = service.get("u1", "t1").await.unwrap();
        assert_eq!(stored.current_question_index, 2);
        assert_eq!(stored.answers.len(), 2);
        assert_eq!(stored.answers[0].selected_option_id, "b");
    }

    #[tokio::test]
    async fn answering_everything_completes_and_clears() {
        let (service, store) = service_with(vec![test_with("t1", 2)]).await;
        service
            .save("u1", "t1", save_request(1, vec![answer("q1", "a")]))
            .await
            .unwrap();

        let outcome = service
            .save(
                "u1",
                "t1",
                save_request(1, vec![answer("q1", "a"), answer("q2", "d")]),
            )
            .await
            .unwrap();

        assert!(matches!(outcome, SaveOutcome::Completed));
        assert_eq!(store.progress_count().await, 0);
    }

    #[tokio::test]
    async fn unknown_ids_and_out_of_range_index_are_rejected() {
        let (service, _) = service_with(vec![test_with("t1", 3)]).await;

        for request in [
            save_request(0, vec![answer("q9", "a")]),
            save_request(0, vec![answer("q1", "z")]),
            save_request(3, vec![answer("q1", "a")]),
        ] {
            let err = service.save("u1", "t1", request).await.unwrap_err();
            assert!(matches!(err, EngineError::Validation(_)));
        }

        let err = service
            .save("u1", "missing", save_request(0, vec![]))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));
    }

    #[tokio::test]
    async fn listing_heals_stale_records() {
        let (service, store) = service_with(vec![test_with("live", 4), test_with("done", 2)]).await;
        store.upsert_progress(&record("live", 1)).await.unwrap();
        store.upsert_progress(&record("done", 2)).await.unwrap();
        store.upsert_progress(&record("gone", 1)).await.unwrap();

        let summaries = service.list("u1").await.unwrap();

        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].test_id, "live");
        assert_eq!(summaries[0].progress_percent, 25);
        assert_eq!(summaries[0].title, "Test live");
        assert_eq!(store.progress_count().await, 1);
    }

    #[tokio::test]
    async fn get_on_stale_record_is_not_found_and_deletes_it() {
        let (service, store) = service_with(vec![]).await;
        store.upsert_progress(&record("gone", 1)).await.unwrap();

        let err = service.get("u1", "gone").await.unwrap_err();

        assert!(matches!(err, EngineError::NotFound(_)));
        assert_eq!(store.progress_count().await, 0);
    }

    #[tokio::test]
    async fn delete_reports_existence() {
        let (service, store) = service_with(vec![test_with("t1", 3)]).await;
        store.upsert_progress(&record("t1", 1)).await.unwrap();

        assert!(service.delete("u1", "t1").await.unwrap());
        assert!(!service.delete("u1", "t1").await.unwrap());
    }
}
