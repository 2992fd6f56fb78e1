use serde::{Deserialize, Serialize};

pub const OPTION_IDS: [&str; 4] = ["a", "b", "c", "d"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionRecord {
    pub option_id: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    Recall,
    Application,
    Analysis,
}

impl QuestionType {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "recall" | "knowledge" => Some(QuestionType::Recall),
            "application" | "apply" => Some(QuestionType::Application),
            "analysis" | "analyze" | "analyse" => Some(QuestionType::Analysis),
            _ => None,
        }
    }
}

/// A multiple-choice question. Candidates coming out of the parser share this
/// shape; `question_id` is provisional until the test is finalized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionRecord {
    pub question_id: String,
    pub text: String,
    pub options: Vec<OptionRecord>,
    pub correct_option_id: String,
    pub explanation: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub question_type: Option<QuestionType>,
}

impl QuestionRecord {
    pub fn has_option(&self, option_id: &str) -> bool {
        self.options.iter().any(|option| option.option_id == option_id)
    }
}

/// Question as shown to a learner: no correct answer, no explanation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearnerQuestion {
    pub question_id: String,
    pub text: String,
    pub options: Vec<OptionRecord>,
}

impl From<&QuestionRecord> for LearnerQuestion {
    fn from(question: &QuestionRecord) -> Self {
        Self {
            question_id: question.question_id.clone(),
            text: question.text.clone(),
            options: question.options.clone(),
        }
    }
}

/// Reassigns ids `q1..qN` in order.
pub fn renumber(questions: &mut [QuestionRecord]) {
    for (index, question) in questions.iter_mut().enumerate() {
        question.question_id = format!("q{}", index + 1);
    }
}
