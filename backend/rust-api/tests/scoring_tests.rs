mod common;

use axum::http::StatusCode;
use serde_json::json;

use quizforge_api::{
    repositories::HistoryStore, services::advice_service::PERFECT_SCORE_ADVICE,
    services::submission_lock::SubmissionLock,
};

fn all_answered(option: &str) -> Vec<(String, String)> {
    (1..=10)
        .map(|n| (format!("q{}", n), option.to_string()))
        .collect()
}

fn as_refs(answers: &[(String, String)]) -> Vec<(&str, &str)> {
    answers
        .iter()
        .map(|(q, o)| (q.as_str(), o.as_str()))
        .collect()
}

#[tokio::test]
async fn test_perfect_submission_scores_full_marks() {
    let app = common::create_test_app(common::question_batch(10)).await;
    let token = common::token_for("alice", "student");
    let test_id = common::generate_on_topic(&app, &token, "fractions").await;

    let answers = all_answered("a");
    let (status, body) = common::submit(&app, &token, &test_id, &as_refs(&answers)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["score"], 10);
    assert_eq!(body["total"], 10);
    assert_eq!(body["percentage"], 100);
    assert_eq!(body["historySaved"], true);
    assert!(body["historyError"].is_null());

    let correct = body["correctAnswers"].as_array().unwrap();
    assert_eq!(correct.len(), 10);
    assert_eq!(correct[0]["questionId"], "q1");
    assert_eq!(correct[0]["correctOptionId"], "a");
    assert_eq!(correct[0]["type"], "application");

    assert_eq!(app.store.audit_records().await.len(), 10);

    common::drain_analytics(&app, 2).await;
    let history = app.store.list_history("alice").await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].subject_id, "math");
    assert_eq!(history[0].result_percent, 100);
    assert_eq!(history[0].advice.as_deref(), Some(PERFECT_SCORE_ADVICE));
}

#[tokio::test]
async fn test_unanswered_questions_are_audited_as_none() {
    let app = common::create_test_app(common::question_batch(10)).await;
    let token = common::token_for("alice", "student");
    let test_id = common::generate_on_topic(&app, &token, "fractions").await;

    let (status, body) =
        common::submit(&app, &token, &test_id, &[("q1", "a"), ("q2", "b"), ("q3", "a")]).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["score"], 2);
    assert_eq!(body["percentage"], 20);

    let audit = app.store.audit_records().await;
    assert_eq!(audit.len(), 10);
    let unanswered = audit
        .iter()
        .filter(|record| record.selected_option_id == "none")
        .count();
    assert_eq!(unanswered, 7);
    assert!(audit
        .iter()
        .filter(|record| record.selected_option_id == "none")
        .all(|record| !record.is_correct));
}

#[tokio::test]
async fn test_missed_questions_get_generated_advice() {
    let app = common::create_test_app(common::question_batch(10)).await;
    let token = common::token_for("alice", "student");
    let test_id = common::generate_on_topic(&app, &token, "fractions").await;

    let answers = all_answered("b");
    let (status, body) = common::submit(&app, &token, &test_id, &as_refs(&answers)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["score"], 0);

    common::drain_analytics(&app, 2).await;

    // One generation call for the test, one for the advice
    assert_eq!(app.generator.call_count(), 2);
    let prompts = app.generator.prompts().await;
    assert!(prompts[1].contains("Which fraction is equivalent to case number 1?"));

    let history = app.store.list_history("alice").await.unwrap();
    assert!(history[0].advice.as_deref().unwrap().starts_with("Question 1:"));
}

#[tokio::test]
async fn test_custom_topic_submission_skips_history() {
    let app = common::create_test_app(common::question_batch(10)).await;
    let token = common::token_for("alice", "student");

    let (status, body) = common::send(
        &app,
        "POST",
        "/api/v1/tests/generate",
        &token,
        Some(json!({ "customTopicName": "Ancient Rome", "difficultyTier": "low" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let test_id = body["id"].as_str().unwrap().to_string();

    let answers = all_answered("a");
    let (status, body) = common::submit(&app, &token, &test_id, &as_refs(&answers)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["percentage"], 100);
    assert_eq!(body["historySaved"], false);
    assert!(body["historyError"].as_str().unwrap().contains("custom topic"));
    assert_eq!(app.store.audit_records().await.len(), 10);
    assert!(app.store.list_history("alice").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_submission_clears_saved_progress() {
    let app = common::create_test_app(common::question_batch(10)).await;
    let token = common::token_for("alice", "student");
    let test_id = common::generate_on_topic(&app, &token, "fractions").await;

    common::send(
        &app,
        "PUT",
        &format!("/api/v1/progress/{}", test_id),
        &token,
        Some(json!({
            "currentQuestionIndex": 1,
            "answers": [{ "questionId": "q1", "selectedOptionId": "a" }],
            "timeLeftSeconds": 500
        })),
    )
    .await;
    assert_eq!(app.store.progress_count().await, 1);

    let (status, _) = common::submit(&app, &token, &test_id, &[("q1", "a")]).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.store.progress_count().await, 0);
}

#[tokio::test]
async fn test_concurrent_submission_conflicts() {
    let app = common::create_test_app(common::question_batch(10)).await;
    let token = common::token_for("alice", "student");
    let test_id = common::generate_on_topic(&app, &token, "fractions").await;

    // Simulate a submission already in flight
    assert!(app.lock.try_acquire("alice", &test_id).await.unwrap());

    let (status, _) = common::submit(&app, &token, &test_id, &[("q1", "a")]).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(app.store.audit_records().await.is_empty());

    app.lock.release("alice", &test_id).await.unwrap();
    let (status, _) = common::submit(&app, &token, &test_id, &[("q1", "a")]).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_failed_submission_releases_lock() {
    let app = common::create_test_app(common::question_batch(10)).await;
    let token = common::token_for("alice", "student");

    let (status, _) = common::submit(&app, &token, "missing", &[]).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    assert!(app.lock.try_acquire("alice", "missing").await.unwrap());
}

#[tokio::test]
async fn test_malformed_submission_body_is_bad_request() {
    let app = common::create_test_app(common::question_batch(10)).await;
    let token = common::token_for("alice", "student");
    let test_id = common::generate_on_topic(&app, &token, "fractions").await;

    let (status, body) = common::send(
        &app,
        "POST",
        &format!("/api/v1/tests/{}/submit", test_id),
        &token,
        Some(json!({ "answers": "q1=a" })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"]
        .as_str()
        .unwrap()
        .starts_with("Invalid request body"));
}
