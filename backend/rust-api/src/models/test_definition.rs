use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::difficulty::DifficultyTier;
use super::question::{LearnerQuestion, QuestionRecord};

/// Where the questions of a test come from. Exactly one variant is stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TestSource {
    ByTopic {
        topic_id: String,
    },
    ByCustomTopic {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
}

impl TestSource {
    pub fn topic_id(&self) -> Option<&str> {
        match self {
            TestSource::ByTopic { topic_id } => Some(topic_id.as_str()),
            TestSource::ByCustomTopic { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestDefinition {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
    pub source: TestSource,
    pub difficulty_tier: DifficultyTier,
    pub questions: Vec<QuestionRecord>,
    pub time_limit_seconds: u32,
    pub created_by: String,
    #[serde(with = "crate::utils::time::bson_datetime_as_chrono")]
    pub created_at: DateTime<Utc>,
}

impl TestDefinition {
    pub fn total_questions(&self) -> usize {
        self.questions.len()
    }

    pub fn question(&self, question_id: &str) -> Option<&QuestionRecord> {
        self.questions
            .iter()
            .find(|question| question.question_id == question_id)
    }
}

/// Learner-safe projection: answers and explanations stripped.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearnerTestView {
    pub id: String,
    pub title: String,
    pub difficulty_tier: DifficultyTier,
    pub time_limit_seconds: u32,
    pub questions: Vec<LearnerQuestion>,
}

impl From<&TestDefinition> for LearnerTestView {
    fn from(test: &TestDefinition) -> Self {
        Self {
            id: test.id.clone(),
            title: test.title.clone(),
            difficulty_tier: test.difficulty_tier,
            time_limit_seconds: test.time_limit_seconds,
            questions: test.questions.iter().map(LearnerQuestion::from).collect(),
        }
    }
}

/// Full projection including answers, for review screens.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthoritativeTestView {
    pub id: String,
    pub title: String,
    pub source: TestSource,
    pub difficulty_tier: DifficultyTier,
    pub time_limit_seconds: u32,
    pub questions: Vec<QuestionRecord>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

impl From<TestDefinition> for AuthoritativeTestView {
    fn from(test: TestDefinition) -> Self {
        Self {
            id: test.id,
            title: test.title,
            source: test.source,
            difficulty_tier: test.difficulty_tier,
            time_limit_seconds: test.time_limit_seconds,
            questions: test.questions,
            created_by: test.created_by,
            created_at: test.created_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct GenerateTestRequest {
    #[validate(length(min = 1, max = 64, message = "topicId must not be empty"))]
    pub topic_id: Option<String>,

    #[validate(length(
        min = 2,
        max = 200,
        message = "customTopicName must be between 2 and 200 characters"
    ))]
    pub custom_topic_name: Option<String>,

    #[validate(length(
        max = 2000,
        message = "customTopicDescription must be at most 2000 characters"
    ))]
    pub custom_topic_description: Option<String>,

    pub difficulty_tier: Option<String>,
}
