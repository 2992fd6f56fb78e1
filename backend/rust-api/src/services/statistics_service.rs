use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;

use crate::error::EngineError;
use crate::models::history::percent;
use crate::models::statistics::{
    Recommendation, RecommendationPriority, RecommendationType, SubjectStats, TrendPoint,
    WeakTopic,
};
use crate::models::{HistoryRecord, UserStatisticsSnapshot};
use crate::repositories::{HistoryStore, StatisticsStore, TestStore, TopicDirectory};

pub const WEAK_TOPIC_THRESHOLD: u32 = 60;
pub const WEAK_SUBJECT_THRESHOLD: u32 = 70;
const MAX_WEAK_TOPICS: usize = 5;
const TOPICS_WITH_TEST_RECOMMENDATIONS: usize = 3;
const TESTS_PER_TOPIC: usize = 3;
const MAX_WEAK_SUBJECTS: usize = 2;
const TOPICS_PER_SUBJECT: usize = 3;
const MAX_RECOMMENDATIONS: usize = 10;

/// Per-subject sums in first-seen order.
#[derive(Debug, Clone, PartialEq)]
pub struct SubjectTotals {
    pub subject_id: String,
    pub total_tests: u32,
    pub total_questions: u32,
    pub correct_answers: u32,
    pub trend: Vec<TrendPoint>,
}

impl SubjectTotals {
    pub fn average_score(&self) -> u32 {
        percent(self.correct_answers, self.total_questions)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TopicTotals {
    pub topic_id: String,
    pub subject_id: String,
    pub result_sum: u32,
    pub test_count: u32,
}

impl TopicTotals {
    pub fn average_score(&self) -> u32 {
        if self.test_count == 0 {
            return 0;
        }
        (f64::from(self.result_sum) / f64::from(self.test_count)).round() as u32
    }
}

/// `history` must be in chronological order.
pub fn subject_totals(history: &[HistoryRecord]) -> Vec<SubjectTotals> {
    let mut totals: Vec<SubjectTotals> = Vec::new();
    for record in history {
        let index = match totals
            .iter()
            .position(|entry| entry.subject_id == record.subject_id)
        {
            Some(index) => index,
            None => {
                totals.push(SubjectTotals {
                    subject_id: record.subject_id.clone(),
                    total_tests: 0,
                    total_questions: 0,
                    correct_answers: 0,
                    trend: Vec::new(),
                });
                totals.len() - 1
            }
        };
        let entry = &mut totals[index];
        entry.total_tests += 1;
        entry.total_questions += record.total;
        entry.correct_answers += record.correct;
        entry.trend.push(TrendPoint {
            date: record.date,
            score: record.result_percent,
        });
    }
    totals
}

pub fn topic_totals(history: &[HistoryRecord]) -> Vec<TopicTotals> {
    let mut totals: Vec<TopicTotals> = Vec::new();
    for record in history {
        let Some(topic_id) = record.topic_id.as_deref() else {
            continue;
        };
        match totals.iter_mut().find(|entry| entry.topic_id == topic_id) {
            Some(entry) => {
                entry.result_sum += record.result_percent;
                entry.test_count += 1;
            }
            None => totals.push(TopicTotals {
                topic_id: topic_id.to_string(),
                subject_id: record.subject_id.clone(),
                result_sum: record.result_percent,
                test_count: 1,
            }),
        }
    }
    totals
}

/// Topics averaging below the threshold, weakest first.
pub fn weakest_topics(topics: &[TopicTotals]) -> Vec<&TopicTotals> {
    let mut weak: Vec<&TopicTotals> = topics
        .iter()
        .filter(|topic| topic.average_score() < WEAK_TOPIC_THRESHOLD)
        .collect();
    weak.sort_by(|a, b| {
        a.average_score()
            .cmp(&b.average_score())
            .then_with(|| a.topic_id.cmp(&b.topic_id))
    });
    weak.truncate(MAX_WEAK_TOPICS);
    weak
}

/// Appends unless the target is already recommended or the cap is reached.
fn push_recommendation(
    recommendations: &mut Vec<Recommendation>,
    seen: &mut HashSet<String>,
    recommendation: Recommendation,
) {
    if recommendations.len() < MAX_RECOMMENDATIONS && seen.insert(recommendation.target_id.clone())
    {
        recommendations.push(recommendation);
    }
}

#[derive(Clone)]
pub struct StatisticsService {
    history: Arc<dyn HistoryStore>,
    statistics: Arc<dyn StatisticsStore>,
    topics: Arc<dyn TopicDirectory>,
    tests: Arc<dyn TestStore>,
}

impl StatisticsService {
    pub fn new(
        history: Arc<dyn HistoryStore>,
        statistics: Arc<dyn StatisticsStore>,
        topics: Arc<dyn TopicDirectory>,
        tests: Arc<dyn TestStore>,
    ) -> Self {
        Self {
            history,
            statistics,
            topics,
            tests,
        }
    }

    /// Rebuilds and stores the whole snapshot for `user_id`.
    pub async fn refresh(&self, user_id: &str) -> Result<UserStatisticsSnapshot, EngineError> {
        let history = self.history.list_history(user_id).await?;

        let subjects = subject_totals(&history);
        let topics = topic_totals(&history);
        let weak = weakest_topics(&topics);

        let mut subject_names: HashMap<String, String> = HashMap::new();
        for subject in &subjects {
            let name = self
                .topics
                .find_subject(&subject.subject_id)
                .await?
                .map(|record| record.name)
                .unwrap_or_else(|| subject.subject_id.clone());
            subject_names.insert(subject.subject_id.clone(), name);
        }

        let mut weak_topics = Vec::with_capacity(weak.len());
        for topic in &weak {
            let topic_name = self
                .topics
                .find_topic(&topic.topic_id)
                .await?
                .map(|record| record.name)
                .unwrap_or_else(|| topic.topic_id.clone());
            weak_topics.push(WeakTopic {
                topic_id: topic.topic_id.clone(),
                topic_name,
                subject_id: topic.subject_id.clone(),
                average_score: topic.average_score(),
                test_count: topic.test_count,
            });
        }

        let mut recommendations = Vec::new();
        let mut seen = HashSet::new();

        for topic in weak_topics.iter().take(TOPICS_WITH_TEST_RECOMMENDATIONS) {
            let tests = self
                .tests
                .recent_tests_for_topic(&topic.topic_id, TESTS_PER_TOPIC)
                .await?;
            for test in tests {
                push_recommendation(
                    &mut recommendations,
                    &mut seen,
                    Recommendation {
                        kind: RecommendationType::Test,
                        target_id: test.id,
                        reason: format!(
                            "Your average score on \"{}\" is {}%. Practice with this test.",
                            topic.topic_name, topic.average_score
                        ),
                        priority: RecommendationPriority::High,
                    },
                );
            }
        }

        let mut weak_subjects: Vec<&SubjectTotals> = subjects
            .iter()
            .filter(|subject| subject.average_score() < WEAK_SUBJECT_THRESHOLD)
            .collect();
        weak_subjects.sort_by_key(|subject| subject.average_score());
        for subject in weak_subjects.into_iter().take(MAX_WEAK_SUBJECTS) {
            let subject_name = subject_names
                .get(&subject.subject_id)
                .cloned()
                .unwrap_or_else(|| subject.subject_id.clone());
            let topics = self
                .topics
                .topics_for_subject(&subject.subject_id, TOPICS_PER_SUBJECT)
                .await?;
            for topic in topics {
                push_recommendation(
                    &mut recommendations,
                    &mut seen,
                    Recommendation {
                        kind: RecommendationType::Topic,
                        target_id: topic.id,
                        reason: format!(
                            "Your average in {} is {}%. Review \"{}\".",
                            subject_name,
                            subject.average_score(),
                            topic.name
                        ),
                        priority: RecommendationPriority::Medium,
                    },
                );
            }
        }

        let subject_stats = subjects
            .into_iter()
            .map(|subject| SubjectStats {
                subject_name: subject_names
                    .remove(&subject.subject_id)
                    .unwrap_or_else(|| subject.subject_id.clone()),
                average_score: subject.average_score(),
                subject_id: subject.subject_id,
                total_tests: subject.total_tests,
                total_questions: subject.total_questions,
                correct_answers: subject.correct_answers,
                progress_trend: subject.trend,
            })
            .collect();

        let snapshot = UserStatisticsSnapshot {
            user_id: user_id.to_string(),
            subject_stats,
            weak_topics,
            recommendations,
            last_updated: Utc::now(),
        };
        self.statistics.replace_snapshot(&snapshot).await?;

        tracing::debug!(
            user_id,
            tests = history.len(),
            weak_topics = snapshot.weak_topics.len(),
            recommendations = snapshot.recommendations.len(),
            "Statistics snapshot refreshed"
        );
        Ok(snapshot)
    }

    pub async fn snapshot(&self, user_id: &str) -> Result<UserStatisticsSnapshot, EngineError> {
        self.statistics
            .find_snapshot(user_id)
            .await?
            .ok_or_else(|| EngineError::not_found("No statistics yet, complete a test first"))
    }
}
