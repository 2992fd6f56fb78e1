use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::difficulty::DifficultyTier;
use super::progress::SelectedAnswer;
use super::question::QuestionType;

pub const UNANSWERED: &str = "none";

/// One row per question per submission; never updated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerAuditRecord {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: String,
    pub test_id: String,
    pub question_id: String,
    pub selected_option_id: String,
    pub is_correct: bool,
    #[serde(with = "crate::utils::time::bson_datetime_as_chrono")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryAnswer {
    pub question_id: String,
    pub correct_option_id: String,
    pub selected_option_id: String,
    pub explanation: String,
}

impl HistoryAnswer {
    pub fn is_correct(&self) -> bool {
        self.selected_option_id == self.correct_option_id
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryRecord {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: String,
    pub subject_id: String,
    pub test_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic_id: Option<String>,
    #[serde(with = "crate::utils::time::bson_datetime_as_chrono")]
    pub date: DateTime<Utc>,
    pub difficulty_tier: DifficultyTier,
    pub result_percent: u32,
    pub correct: u32,
    pub total: u32,
    pub duration_seconds: u32,
    pub answers: Vec<HistoryAnswer>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub advice: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SubmitTestRequest {
    #[serde(default)]
    #[validate(length(max = 500, message = "Too many answers in a single submission"))]
    pub answers: Vec<SelectedAnswer>,
    #[validate(range(max = 86400, message = "durationSeconds must be at most 86400"))]
    pub duration_seconds: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrectAnswer {
    pub question_id: String,
    pub correct_option_id: String,
    pub explanation: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub question_type: Option<QuestionType>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionResult {
    pub score: u32,
    pub total: u32,
    pub percentage: u32,
    pub correct_answers: Vec<CorrectAnswer>,
    pub history_saved: bool,
    pub history_error: Option<String>,
}

/// `round(part / whole * 100)`, zero when `whole` is zero.
pub fn percent(part: u32, whole: u32) -> u32 {
    if whole == 0 {
        return 0;
    }
    (f64::from(part) / f64::from(whole) * 100.0).round() as u32
}

#[cfg(test)]
mod tests {
    use mongodb::bson;

    use super::*;

    #[test]
    fn percent_rounds_half_up() {
        assert_eq!(percent(1, 3), 33);
        assert_eq!(percent(2, 3), 67);
        assert_eq!(percent(1, 8), 13);
        assert_eq!(percent(5, 5), 100);
    }

    #[test]
    fn percent_of_nothing_is_zero() {
        assert_eq!(percent(0, 0), 0);
    }

    #[test]
    fn timestamps_are_stored_as_bson_dates() {
        let now = Utc::now();
        let record = HistoryRecord {
            id: "h1".to_string(),
            user_id: "alice".to_string(),
            subject_id: "math".to_string(),
            test_id: "t1".to_string(),
            topic_id: None,
            date: now,
            difficulty_tier: DifficultyTier::Low,
            result_percent: 50,
            correct: 1,
            total: 2,
            duration_seconds: 60,
            answers: Vec::new(),
            advice: None,
        };
        let audit = AnswerAuditRecord {
            id: "a1".to_string(),
            user_id: "alice".to_string(),
            test_id: "t1".to_string(),
            question_id: "q1".to_string(),
            selected_option_id: "a".to_string(),
            is_correct: true,
            created_at: now,
        };

        let document = bson::to_document(&record).unwrap();
        assert_eq!(
            document.get_datetime("date").unwrap().timestamp_millis(),
            now.timestamp_millis()
        );
        let restored: HistoryRecord = bson::from_document(document).unwrap();
        assert_eq!(restored.date.timestamp_millis(), now.timestamp_millis());

        let document = bson::to_document(&audit).unwrap();
        assert!(document.get_datetime("created_at").is_ok());
    }
}
