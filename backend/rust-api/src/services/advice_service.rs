use std::sync::Arc;

use crate::error::{EngineError, GenerationError};
use crate::repositories::{HistoryStore, TestStore};
use crate::services::prompt_builder::build_advice_prompt;
use crate::services::text_generator::TextGenerator;

pub const PERFECT_SCORE_ADVICE: &str =
    "Excellent work, every answer was correct. Try a harder difficulty tier next.";

#[derive(Clone)]
pub struct AdviceService {
    history: Arc<dyn HistoryStore>,
    tests: Arc<dyn TestStore>,
    generator: Arc<dyn TextGenerator>,
}

impl AdviceService {
    pub fn new(
        history: Arc<dyn HistoryStore>,
        tests: Arc<dyn TestStore>,
        generator: Arc<dyn TextGenerator>,
    ) -> Self {
        Self {
            history,
            tests,
            generator,
        }
    }

    /// Writes study advice onto a history record and returns it.
    pub async fn generate_for_history(&self, history_id: &str) -> Result<String, EngineError> {
        let record = self
            .history
            .find_history(history_id)
            .await?
            .ok_or_else(|| EngineError::not_found("History record not found"))?;

        let missed: Vec<_> = record
            .answers
            .iter()
            .filter(|answer| !answer.is_correct())
            .collect();

        let advice = if missed.is_empty() {
            PERFECT_SCORE_ADVICE.to_string()
        } else {
            // Question texts live on the test; fall back to ids if it is gone.
            let test = self.tests.find_test(&record.test_id).await?;
            let missed: Vec<(String, String)> = missed
                .into_iter()
                .map(|answer| {
                    let text = test
                        .as_ref()
                        .and_then(|test| test.question(&answer.question_id))
                        .map(|question| question.text.clone())
                        .unwrap_or_else(|| answer.question_id.clone());
                    (text, answer.explanation.clone())
                })
                .collect();

            let prompt = build_advice_prompt(record.result_percent, &missed);
            let advice = self.generator.generate(&prompt).await?.trim().to_string();
            if advice.is_empty() {
                return Err(GenerationError::InvalidResponse("empty advice".to_string()).into());
            }
            advice
        };

        if !self.history.attach_advice(history_id, &advice).await? {
            return Err(EngineError::not_found("History record not found"));
        }
        tracing::debug!(history_id, "Advice attached");
        Ok(advice)
    }
}
