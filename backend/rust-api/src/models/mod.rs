use serde::{Deserialize, Serialize};

pub mod difficulty;
pub mod history;
pub mod progress;
pub mod question;
pub mod statistics;
pub mod test_definition;
pub mod topic;

pub use difficulty::{DifficultyCatalog, DifficultyProfile, DifficultyTier};
pub use history::{AnswerAuditRecord, HistoryAnswer, HistoryRecord, SubmissionResult};
pub use progress::{ProgressRecord, ProgressStatus, ProgressSummary, SaveOutcome, SelectedAnswer};
pub use question::{OptionRecord, QuestionRecord, QuestionType};
pub use statistics::UserStatisticsSnapshot;
pub use test_definition::{LearnerTestView, TestDefinition, TestSource};
pub use topic::{SubjectRecord, TopicRecord};

/// Verified caller identity handed over by the authentication layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requester {
    pub user_id: String,
    pub role: String,
}

impl Requester {
    pub fn new(user_id: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            role: role.into(),
        }
    }

    pub fn is_staff(&self) -> bool {
        matches!(self.role.as_str(), "admin" | "teacher" | "content_admin")
    }
}
