use std::sync::Arc;

use chrono::Utc;
use validator::Validate;

use crate::error::EngineError;
use crate::metrics::TESTS_GENERATED_TOTAL;
use crate::models::test_definition::{AuthoritativeTestView, GenerateTestRequest};
use crate::models::{
    DifficultyCatalog, DifficultyTier, LearnerTestView, Requester, TestDefinition, TestSource,
};
use crate::repositories::{TestStore, TopicDirectory};
use crate::services::access_policy::AccessPolicy;
use crate::services::regeneration::{GenerationRequest, RegenerationCoordinator};

#[derive(Clone)]
pub struct TestService {
    tests: Arc<dyn TestStore>,
    topics: Arc<dyn TopicDirectory>,
    catalog: Arc<DifficultyCatalog>,
    coordinator: RegenerationCoordinator,
    policy: Arc<dyn AccessPolicy>,
}

/// Topic data the generator works from once the source is resolved.
struct ResolvedSource {
    source: TestSource,
    name: String,
    description: Option<String>,
    reference_material: Option<String>,
}

impl TestService {
    pub fn new(
        tests: Arc<dyn TestStore>,
        topics: Arc<dyn TopicDirectory>,
        catalog: Arc<DifficultyCatalog>,
        coordinator: RegenerationCoordinator,
        policy: Arc<dyn AccessPolicy>,
    ) -> Self {
        Self {
            tests,
            topics,
            catalog,
            coordinator,
            policy,
        }
    }

    pub async fn generate_test(
        &self,
        requester: &Requester,
        request: GenerateTestRequest,
    ) -> Result<LearnerTestView, EngineError> {
        let result = self.generate_inner(requester, request).await;
        let outcome = match &result {
            Ok(_) => "created",
            Err(EngineError::Validation(_)) | Err(EngineError::NotFound(_)) => "rejected",
            Err(EngineError::InsufficientQuestions { .. }) => "insufficient",
            Err(EngineError::UpstreamGeneration(_)) => "upstream_error",
            Err(_) => "error",
        };
        TESTS_GENERATED_TOTAL.with_label_values(&[outcome]).inc();
        result
    }

    async fn generate_inner(
        &self,
        requester: &Requester,
        request: GenerateTestRequest,
    ) -> Result<LearnerTestView, EngineError> {
        request.validate()?;

        let tier = request
            .difficulty_tier
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| EngineError::validation("difficultyTier is required"))?
            .parse::<DifficultyTier>()
            .map_err(EngineError::Validation)?;
        let profile = self.catalog.profile(tier).ok_or_else(|| {
            EngineError::validation(format!("Difficulty tier {} is not available", tier))
        })?;

        let resolved = self.resolve_source(&request).await?;

        let questions = self
            .coordinator
            .generate(&GenerationRequest {
                topic_name: &resolved.name,
                topic_description: resolved.description.as_deref(),
                reference_material: resolved.reference_material.as_deref(),
                profile,
            })
            .await?;

        let test = TestDefinition {
            id: uuid::Uuid::new_v4().to_string(),
            title: format!("{}: {} test", resolved.name, tier),
            source: resolved.source,
            difficulty_tier: tier,
            questions,
            time_limit_seconds: profile.time_limit_seconds,
            created_by: requester.user_id.clone(),
            created_at: Utc::now(),
        };
        let test = self.create(test).await?;

        tracing::info!(
            test_id = %test.id,
            user_id = %requester.user_id,
            tier = %tier,
            questions = test.total_questions(),
            "Test generated"
        );

        Ok(LearnerTestView::from(&test))
    }

    async fn resolve_source(
        &self,
        request: &GenerateTestRequest,
    ) -> Result<ResolvedSource, EngineError> {
        let topic_id = non_blank(request.topic_id.as_deref());
        let custom_name = non_blank(request.custom_topic_name.as_deref());

        match (topic_id, custom_name) {
            (Some(_), Some(_)) => Err(EngineError::validation(
                "Provide either topicId or customTopicName, not both",
            )),
            (None, None) => Err(EngineError::validation(
                "Either topicId or customTopicName is required",
            )),
            (Some(topic_id), None) => {
                let topic = self
                    .topics
                    .find_topic(topic_id)
                    .await?
                    .ok_or_else(|| EngineError::not_found("Topic not found"))?;
                Ok(ResolvedSource {
                    source: TestSource::ByTopic {
                        topic_id: topic.id.clone(),
                    },
                    name: topic.name,
                    description: topic.description,
                    reference_material: topic.reference_material,
                })
            }
            (None, Some(name)) => {
                let description =
                    non_blank(request.custom_topic_description.as_deref()).map(str::to_string);
                Ok(ResolvedSource {
                    source: TestSource::ByCustomTopic {
                        name: name.to_string(),
                        description: description.clone(),
                    },
                    name: name.to_string(),
                    description,
                    reference_material: None,
                })
            }
        }
    }

    pub async fn create(&self, test: TestDefinition) -> Result<TestDefinition, EngineError> {
        self.tests.insert_test(&test).await?;
        Ok(test)
    }

    /// Loads a test the requester may take.
    pub async fn readable_test(
        &self,
        requester: &Requester,
        test_id: &str,
    ) -> Result<TestDefinition, EngineError> {
        let test = self
            .tests
            .find_test(test_id)
            .await?
            .ok_or_else(|| EngineError::not_found("Test not found"))?;
        if !self.policy.can_read(requester, &test) {
            return Err(EngineError::forbidden("Access to this test is denied"));
        }
        Ok(test)
    }

    pub async fn learner_view(
        &self,
        requester: &Requester,
        test_id: &str,
    ) -> Result<LearnerTestView, EngineError> {
        let test = self.readable_test(requester, test_id).await?;
        Ok(LearnerTestView::from(&test))
    }

    pub async fn authoritative_view(
        &self,
        requester: &Requester,
        test_id: &str,
    ) -> Result<AuthoritativeTestView, EngineError> {
        let test = self.readable_test(requester, test_id).await?;
        if !self.policy.can_read_answers(requester, &test) {
            return Err(EngineError::forbidden(
                "Only the test creator or staff can review answers",
            ));
        }
        Ok(AuthoritativeTestView::from(test))
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GenerationConfig;
    use crate::repositories::MemoryStore;
    use crate::services::access_policy::CreatorOrStaffPolicy;
    use crate::services::text_generator::MockTextGenerator;

    fn service(generator: Arc<MockTextGenerator>) -> TestService {
        let store = Arc::new(MemoryStore::new());
        TestService::new(
            store.clone(),
            store,
            Arc::new(DifficultyCatalog::default()),
            RegenerationCoordinator::new(generator, GenerationConfig::default()),
            Arc::new(CreatorOrStaffPolicy),
        )
    }

    fn request(topic: Option<&str>, custom: Option<&str>, tier: Option<&str>) -> GenerateTestRequest {
        GenerateTestRequest {
            topic_id: topic.map(str::to_string),
            custom_topic_name: custom.map(str::to_string),
            custom_topic_description: None,
            difficulty_tier: tier.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn source_must_be_exactly_one_of_topic_or_custom() {
        let generator = Arc::new(MockTextGenerator::with_fixed_response(""));
        let service = service(generator.clone());
        let requester = Requester::new("u1", "student");

        for bad in [
            request(Some("t1"), Some("Custom"), Some("low")),
            request(None, None, Some("low")),
            request(None, Some("Custom"), None),
            request(None, Some("Custom"), Some("extreme")),
        ] {
            let err = service.generate_test(&requester, bad).await.unwrap_err();
            assert!(matches!(err, EngineError::Validation(_)), "{err}");
        }
        assert_eq!(generator.call_count(), 0);
    }

    #[tokio::test]
    async fn unknown_topic_is_not_found() {
        let generator = Arc::new(MockTextGenerator::with_fixed_response(""));
        let service = service(generator.clone());

        let err = service
            .generate_test(
                &Requester::new("u1", "student"),
                request(Some("missing"), None, Some("mid")),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, EngineError::NotFound(_)));
        assert_eq!(generator.call_count(), 0);
    }
}
