use crate::models::{Requester, TestDefinition};

/// Decides who may see a stored test. Authentication happens upstream; this
/// only answers questions about an already verified requester.
pub trait AccessPolicy: Send + Sync {
    fn can_read(&self, requester: &Requester, test: &TestDefinition) -> bool;

    fn can_read_answers(&self, requester: &Requester, test: &TestDefinition) -> bool;
}

/// Any authenticated user may take a test; answers are visible to the
/// creator and to staff roles.
#[derive(Debug, Clone, Copy, Default)]
pub struct CreatorOrStaffPolicy;

impl AccessPolicy for CreatorOrStaffPolicy {
    fn can_read(&self, requester: &Requester, _test: &TestDefinition) -> bool {
        !requester.user_id.is_empty()
    }

    fn can_read_answers(&self, requester: &Requester, test: &TestDefinition) -> bool {
        requester.user_id == test.created_by || requester.is_staff()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DifficultyTier, TestSource};
    use chrono::Utc;

    fn test_by(creator: &str) -> TestDefinition {
        TestDefinition {
            id: "t1".to_string(),
            title: "Fractions: low test".to_string(),
            source: TestSource::ByTopic {
                topic_id: "fractions".to_string(),
            },
            difficulty_tier: DifficultyTier::Low,
            questions: Vec::new(),
            time_limit_seconds: 600,
            created_by: creator.to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn answers_visible_to_creator_and_staff_only() {
        let policy = CreatorOrStaffPolicy;
        let test = test_by("alice");

        assert!(policy.can_read_answers(&Requester::new("alice", "student"), &test));
        assert!(policy.can_read_answers(&Requester::new("tom", "teacher"), &test));
        assert!(!policy.can_read_answers(&Requester::new("bob", "student"), &test));
        assert!(policy.can_read(&Requester::new("bob", "student"), &test));
    }
}
