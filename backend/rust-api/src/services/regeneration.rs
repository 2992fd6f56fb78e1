use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::GenerationConfig;
use crate::error::EngineError;
use crate::metrics::{GENERATION_ATTEMPTS_TOTAL, QUESTIONS_DISCARDED_TOTAL};
use crate::models::question::renumber;
use crate::models::{DifficultyProfile, QuestionRecord};
use crate::services::prompt_builder::{build_generation_prompt, PromptInput};
use crate::services::quality_validator;
use crate::services::response_parser::parse_batch;
use crate::services::text_generator::TextGenerator;

/// What the questions should be about.
#[derive(Debug, Clone)]
pub struct GenerationRequest<'a> {
    pub topic_name: &'a str,
    pub topic_description: Option<&'a str>,
    pub reference_material: Option<&'a str>,
    pub profile: &'a DifficultyProfile,
}

/// Drives prompt -> generator -> parser -> validator until enough questions
/// pass or the attempt budget runs out. Calls are strictly sequential.
#[derive(Clone)]
pub struct RegenerationCoordinator {
    generator: Arc<dyn TextGenerator>,
    config: GenerationConfig,
}

impl RegenerationCoordinator {
    pub fn new(generator: Arc<dyn TextGenerator>, config: GenerationConfig) -> Self {
        Self { generator, config }
    }

    /// Returns at most `profile.question_count` questions with ids `q1..qN`.
    pub async fn generate(
        &self,
        request: &GenerationRequest<'_>,
    ) -> Result<Vec<QuestionRecord>, EngineError> {
        let target = request.profile.question_count as usize;
        let threshold = target as f64 * self.config.acceptance_ratio;
        let mut accepted: Vec<QuestionRecord> = Vec::with_capacity(target);

        for attempt in 1..=self.config.max_attempts.max(1) {
            let requested = target - accepted.len().min(target);
            let prompt = build_generation_prompt(&PromptInput {
                topic_name: request.topic_name,
                topic_description: request.topic_description,
                reference_material: request.reference_material,
                profile: request.profile,
                count: requested as u32,
                quality_feedback: attempt > 1,
            });

            let raw = match self.generator.generate(&prompt).await {
                Ok(raw) => raw,
                Err(err) => {
                    GENERATION_ATTEMPTS_TOTAL.with_label_values(&["error"]).inc();
                    return Err(err.into());
                }
            };

            let batch = parse_batch(&raw);
            let parsed = batch.candidates.len();
            let before = accepted.len();
            for candidate in batch.candidates {
                match quality_validator::evaluate(&candidate) {
                    Ok(()) => accepted.push(candidate),
                    Err(rejection) => {
                        debug!(reason = ?rejection, text = %candidate.text, "Rejected generated question");
                        QUESTIONS_DISCARDED_TOTAL
                            .with_label_values(&["validate", rejection.label()])
                            .inc();
                    }
                }
            }

            let enough = accepted.len() as f64 >= threshold;
            GENERATION_ATTEMPTS_TOTAL
                .with_label_values(&[if enough { "enough" } else { "short" }])
                .inc();
            info!(
                generator = self.generator.name(),
                attempt,
                requested,
                parsed,
                discarded = batch.discarded.len(),
                newly_accepted = accepted.len() - before,
                accepted = accepted.len(),
                target,
                "Generation attempt finished"
            );

            if enough {
                break;
            }
        }

        if accepted.is_empty() {
            return Err(EngineError::InsufficientQuestions {
                requested: target as u32,
            });
        }
        if (accepted.len() as f64) < threshold {
            warn!(
                accepted = accepted.len(),
                target, "Accepting test below the quality threshold"
            );
        }

        accepted.truncate(target);
        renumber(&mut accepted);
        Ok(accepted)
    }
}
