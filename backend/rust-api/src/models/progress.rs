use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectedAnswer {
    pub question_id: String,
    pub selected_option_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    InProgress,
    Completed,
}

/// Resumable state of one user on one test. Stored under the composite key
/// `{user_id}:{test_id}` so repeated saves overwrite instead of duplicating.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressRecord {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: String,
    pub test_id: String,
    pub current_question_index: u32,
    pub answers: Vec<SelectedAnswer>,
    pub time_left_seconds: u32,
    pub status: ProgressStatus,
    #[serde(with = "crate::utils::time::bson_datetime_as_chrono")]
    pub updated_at: DateTime<Utc>,
}

impl ProgressRecord {
    pub fn key(user_id: &str, test_id: &str) -> String {
        format!("{}:{}", user_id, test_id)
    }

    pub fn answered_count(&self) -> usize {
        self.answers.len()
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SaveProgressRequest {
    pub current_question_index: u32,
    #[serde(default)]
    #[validate(length(max = 500, message = "Too many answers in a single save"))]
    pub answers: Vec<SelectedAnswer>,
    #[validate(range(max = 86400, message = "timeLeftSeconds must be at most 86400"))]
    pub time_left_seconds: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSummary {
    pub test_id: String,
    pub title: String,
    pub progress_percent: u32,
    pub time_left: u32,
    pub current_question_index: u32,
    pub status: ProgressStatus,
}

/// Result of an interim save.
#[derive(Debug, Clone)]
pub enum SaveOutcome {
    InProgress(ProgressRecord),
    Completed,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveProgressResponse {
    pub status: ProgressStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_question_index: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answers: Option<Vec<SelectedAnswer>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_left_seconds: Option<u32>,
}

impl From<SaveOutcome> for SaveProgressResponse {
    fn from(outcome: SaveOutcome) -> Self {
        match outcome {
            SaveOutcome::InProgress(record) => Self {
                status: record.status,
                current_question_index: Some(record.current_question_index),
                answers: Some(record.answers),
                time_left_seconds: Some(record.time_left_seconds),
            },
            SaveOutcome::Completed => Self {
                status: ProgressStatus::Completed,
                current_question_index: None,
                answers: None,
                time_left_seconds: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use mongodb::bson;

    use super::*;

    #[test]
    fn updated_at_is_stored_as_bson_date() {
        let record = ProgressRecord {
            id: ProgressRecord::key("alice", "t1"),
            user_id: "alice".to_string(),
            test_id: "t1".to_string(),
            current_question_index: 2,
            answers: vec![SelectedAnswer {
                question_id: "q1".to_string(),
                selected_option_id: "b".to_string(),
            }],
            time_left_seconds: 300,
            status: ProgressStatus::InProgress,
            updated_at: Utc::now(),
        };

        let document = bson::to_document(&record).unwrap();

        assert_eq!(document.get_str("_id").unwrap(), "alice:t1");
        assert!(document.get_datetime("updated_at").is_ok());

        let restored: ProgressRecord = bson::from_document(document).unwrap();
        assert_eq!(
            restored.updated_at.timestamp_millis(),
            record.updated_at.timestamp_millis()
        );
        assert_eq!(restored.answers, record.answers);
    }
}
