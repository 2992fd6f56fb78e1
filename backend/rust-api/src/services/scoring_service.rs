use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use validator::Validate;

use crate::error::EngineError;
use crate::metrics::SUBMISSIONS_TOTAL;
use crate::models::history::{percent, CorrectAnswer, SubmitTestRequest, UNANSWERED};
use crate::models::{
    AnswerAuditRecord, HistoryAnswer, HistoryRecord, Requester, SubmissionResult, TestDefinition,
    TestSource,
};
use crate::repositories::{AuditStore, HistoryStore, ProgressStore, TopicDirectory};
use crate::services::event_queue::{AnalyticsEvent, EventQueue};
use crate::services::submission_lock::SubmissionLock;
use crate::services::test_service::TestService;

#[derive(Clone)]
pub struct ScoringService {
    tests: TestService,
    topics: Arc<dyn TopicDirectory>,
    audit: Arc<dyn AuditStore>,
    history: Arc<dyn HistoryStore>,
    progress: Arc<dyn ProgressStore>,
    queue: Arc<dyn EventQueue>,
    lock: Arc<dyn SubmissionLock>,
}

struct Graded {
    score: u32,
    audit: Vec<AnswerAuditRecord>,
    answers: Vec<HistoryAnswer>,
    correct_answers: Vec<CorrectAnswer>,
}

impl ScoringService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        tests: TestService,
        topics: Arc<dyn TopicDirectory>,
        audit: Arc<dyn AuditStore>,
        history: Arc<dyn HistoryStore>,
        progress: Arc<dyn ProgressStore>,
        queue: Arc<dyn EventQueue>,
        lock: Arc<dyn SubmissionLock>,
    ) -> Self {
        Self {
            tests,
            topics,
            audit,
            history,
            progress,
            queue,
            lock,
        }
    }

    pub async fn submit(
        &self,
        requester: &Requester,
        test_id: &str,
        request: SubmitTestRequest,
    ) -> Result<SubmissionResult, EngineError> {
        request.validate()?;

        if !self.lock.try_acquire(&requester.user_id, test_id).await? {
            return Err(EngineError::Conflict(
                "A submission for this test is already being processed".to_string(),
            ));
        }

        let result = self.score(requester, test_id, request).await;

        if let Err(err) = self.lock.release(&requester.user_id, test_id).await {
            tracing::warn!(error = %err, test_id, "Failed to release submission lock");
        }
        result
    }

    async fn score(
        &self,
        requester: &Requester,
        test_id: &str,
        request: SubmitTestRequest,
    ) -> Result<SubmissionResult, EngineError> {
        let test = self.tests.readable_test(requester, test_id).await?;
        let user_id = requester.user_id.as_str();

        let graded = grade(&test, user_id, &request);
        self.audit.append_audit(&graded.audit).await?;

        let total = test.total_questions() as u32;
        let percentage = percent(graded.score, total);

        let (history_saved, history_error) = match self.resolve_subject(&test).await {
            Ok(subject_id) => {
                let record = HistoryRecord {
                    id: uuid::Uuid::new_v4().to_string(),
                    user_id: user_id.to_string(),
                    subject_id,
                    test_id: test.id.clone(),
                    topic_id: test.source.topic_id().map(str::to_string),
                    date: Utc::now(),
                    difficulty_tier: test.difficulty_tier,
                    result_percent: percentage,
                    correct: graded.score,
                    total,
                    duration_seconds: request.duration_seconds,
                    answers: graded.answers,
                    advice: None,
                };
                match self.history.insert_history(&record).await {
                    Ok(()) => {
                        self.after_history_saved(user_id, test_id, &record.id).await;
                        (true, None)
                    }
                    Err(err) => {
                        tracing::error!(error = %err, user_id, test_id, "Failed to save test history");
                        (false, Some("Failed to save test history".to_string()))
                    }
                }
            }
            Err(reason) => {
                tracing::warn!(user_id, test_id, reason = %reason, "History not saved");
                (false, Some(reason))
            }
        };

        SUBMISSIONS_TOTAL
            .with_label_values(&[if history_saved { "saved" } else { "skipped" }])
            .inc();
        tracing::info!(
            user_id,
            test_id,
            score = graded.score,
            total,
            percentage,
            history_saved,
            "Test submitted"
        );

        Ok(SubmissionResult {
            score: graded.score,
            total,
            percentage,
            correct_answers: graded.correct_answers,
            history_saved,
            history_error,
        })
    }

    /// `Err` carries the user-facing reason history cannot be written.
    async fn resolve_subject(&self, test: &TestDefinition) -> Result<String, String> {
        match &test.source {
            TestSource::ByCustomTopic { .. } => Err(
                "Tests on a custom topic are not linked to a subject, so history was not saved"
                    .to_string(),
            ),
            TestSource::ByTopic { topic_id } => match self.topics.find_topic(topic_id).await {
                Ok(Some(topic)) => Ok(topic.subject_id),
                Ok(None) => Err(format!(
                    "Topic {} no longer exists, so history was not saved",
                    topic_id
                )),
                Err(err) => {
                    tracing::error!(error = %err, topic_id, "Failed to resolve subject");
                    Err("Could not resolve the subject of this test".to_string())
                }
            },
        }
    }

    async fn after_history_saved(&self, user_id: &str, test_id: &str, history_id: &str) {
        if let Err(err) = self.progress.delete_progress(user_id, test_id).await {
            tracing::warn!(error = %err, user_id, test_id, "Failed to clear progress after submission");
        }

        let queue = self.queue.clone();
        let events = vec![
            AnalyticsEvent::GenerateAdvice {
                user_id: user_id.to_string(),
                history_id: history_id.to_string(),
            },
            AnalyticsEvent::UpdateStatistics {
                user_id: user_id.to_string(),
            },
        ];
        tokio::spawn(async move {
            for event in events {
                let kind = event.kind();
                if let Err(err) = queue.publish(event).await {
                    tracing::warn!(error = %err, kind, "Failed to enqueue analytics event");
                }
            }
        });
    }
}

fn grade(test: &TestDefinition, user_id: &str, request: &SubmitTestRequest) -> Graded {
    let submitted: HashMap<&str, &str> = request
        .answers
        .iter()
        .map(|answer| (answer.question_id.as_str(), answer.selected_option_id.as_str()))
        .collect();
    let now = Utc::now();

    let mut graded = Graded {
        score: 0,
        audit: Vec::with_capacity(test.questions.len()),
        answers: Vec::with_capacity(test.questions.len()),
        correct_answers: Vec::with_capacity(test.questions.len()),
    };

    for question in &test.questions {
        let selected = submitted
            .get(question.question_id.as_str())
            .copied()
            .unwrap_or(UNANSWERED);
        let is_correct = selected == question.correct_option_id;
        if is_correct {
            graded.score += 1;
        }

        graded.audit.push(AnswerAuditRecord {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            test_id: test.id.clone(),
            question_id: question.question_id.clone(),
            selected_option_id: selected.to_string(),
            is_correct,
            created_at: now,
        });
        graded.answers.push(HistoryAnswer {
            question_id: question.question_id.clone(),
            correct_option_id: question.correct_option_id.clone(),
            selected_option_id: selected.to_string(),
            explanation: question.explanation.clone(),
        });
        graded.correct_answers.push(CorrectAnswer {
            question_id: question.question_id.clone(),
            correct_option_id: question.correct_option_id.clone(),
            explanation: question.explanation.clone(),
            question_type: question.question_type.clone(),
        });
    }

    graded
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DifficultyTier, OptionRecord, QuestionRecord, SelectedAnswer};

    fn two_question_test() -> TestDefinition {
        TestDefinition {
            id: "t1".to_string(),
            title: "Fractions: low test".to_string(),
            source: TestSource::ByTopic {
                topic_id: "fractions".to_string(),
            },
            difficulty_tier: DifficultyTier::Low,
            questions: ["b", "d"]
                .iter()
                .enumerate()
                .map(|(index, correct)| QuestionRecord {
                    question_id: format!("q{}", index + 1),
                    text: "Which one is correct here?".to_string(),
                    options: ["a", "b", "c", "d"]
                        .iter()
                        .map(|id| OptionRecord {
                            option_id: id.to_string(),
                            text: format!("Choice {id}"),
                        })
                        .collect(),
                    correct_option_id: correct.to_string(),
                    explanation: "Because the rule says so in every case.".to_string(),
                    question_type: None,
                })
                .collect(),
            time_limit_seconds: 600,
            created_by: "author".to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn unanswered_questions_are_audited_as_none() {
        let test = two_question_test();
        let request = SubmitTestRequest {
            answers: vec![SelectedAnswer {
                question_id: "q1".to_string(),
                selected_option_id: "b".to_string(),
            }],
            duration_seconds: 90,
        };

        let graded = grade(&test, "u1", &request);

        assert_eq!(graded.score, 1);
        assert_eq!(graded.audit.len(), 2);
        assert!(graded.audit[0].is_correct);
        assert_eq!(graded.audit[1].selected_option_id, UNANSWERED);
        assert!(!graded.audit[1].is_correct);
        assert_eq!(graded.correct_answers[1].correct_option_id, "d");
    }
}
