#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::Utc;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use quizforge_api::{
    config::Config,
    create_router,
    middlewares::auth::JwtClaims,
    models::{DifficultyCatalog, SubjectRecord, TopicRecord},
    repositories::{MemoryStore, Stores},
    services::{
        access_policy::CreatorOrStaffPolicy, event_queue::InProcessQueue,
        submission_lock::InMemorySubmissionLock, text_generator::MockTextGenerator, AppState,
        Collaborators,
    },
};

pub const JWT_SECRET: &str = "integration-test-secret";

pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
    pub store: Arc<MemoryStore>,
    pub generator: Arc<MockTextGenerator>,
    pub lock: Arc<InMemorySubmissionLock>,
}

/// In-memory app whose generator always answers with `generator_output`.
pub async fn create_test_app(generator_output: impl Into<String>) -> TestApp {
    create_test_app_with(MockTextGenerator::with_fixed_response(generator_output)).await
}

pub async fn create_test_app_with(generator: MockTextGenerator) -> TestApp {
    create_test_app_from(generator, DifficultyCatalog::default()).await
}

pub async fn create_test_app_from(
    generator: MockTextGenerator,
    catalog: DifficultyCatalog,
) -> TestApp {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();

    let store = Arc::new(MemoryStore::new());
    let generator = Arc::new(generator);
    let lock = Arc::new(InMemorySubmissionLock::default());

    let state = Arc::new(AppState::from_parts(
        Config::in_memory(JWT_SECRET),
        Collaborators {
            stores: Stores::from_memory(store.clone()),
            catalog: Arc::new(catalog),
            generator: generator.clone(),
            queue: Arc::new(InProcessQueue::new()),
            lock: lock.clone(),
            policy: Arc::new(CreatorOrStaffPolicy),
        },
    ));

    seed_catalog(&store).await;

    TestApp {
        router: create_router(state.clone()),
        state,
        store,
        generator,
        lock,
    }
}

async fn seed_catalog(store: &MemoryStore) {
    store
        .put_subject(SubjectRecord {
            id: "math".to_string(),
            name: "Mathematics".to_string(),
        })
        .await;
    store
        .put_topic(TopicRecord {
            id: "fractions".to_string(),
            name: "Fractions".to_string(),
            description: Some("Adding, comparing and simplifying fractions".to_string()),
            subject_id: "math".to_string(),
            reference_material: None,
        })
        .await;
    store
        .put_topic(TopicRecord {
            id: "decimals".to_string(),
            name: "Decimals".to_string(),
            description: None,
            subject_id: "math".to_string(),
            reference_material: None,
        })
        .await;
}

pub fn token_for(user_id: &str, role: &str) -> String {
    let now = Utc::now().timestamp() as usize;
    let claims = JwtClaims {
        sub: user_id.to_string(),
        role: role.to_string(),
        exp: now + 3600,
        iat: now,
    };
    quizforge_api::middlewares::auth::JwtService::new(JWT_SECRET)
        .generate_token(&claims)
        .unwrap()
}

/// `count` well-formed questions, every one answered with option `a`.
pub fn question_batch(count: usize) -> String {
    (1..=count)
        .map(|n| {
            format!(
                "Question {n}: Which fraction is equivalent to case number {n}?\n\
                 A) Fraction {n}/2\n\
                 B) Fraction {n}/3\n\
                 C) Fraction {n}/4\n\
                 D) Fraction {n}/5\n\
                 Answer: A\n\
                 Explanation: Multiplying numerator and denominator by the same number keeps the value.\n\
                 Type: application\n\n"
            )
        })
        .collect()
}

pub async fn send(
    app: &TestApp,
    method: &str,
    uri: &str,
    token: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    send_to(&app.router, method, uri, token, body).await
}

pub async fn send_to(
    router: &Router,
    method: &str,
    uri: &str,
    token: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("authorization", format!("Bearer {}", token));
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_string(&json).unwrap())
        }
        None => Body::empty(),
    };

    let response = router
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

/// Generates a test on a catalog topic and returns its id.
pub async fn generate_on_topic(app: &TestApp, token: &str, topic_id: &str) -> String {
    let (status, body) = send(
        app,
        "POST",
        "/api/v1/tests/generate",
        token,
        Some(serde_json::json!({
            "topicId": topic_id,
            "difficultyTier": "low"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "generation failed: {}", body);
    body["id"].as_str().unwrap().to_string()
}

/// Runs the analytics worker until `expected` events were handled. Events
/// are published off the request path, so they may arrive late.
pub async fn drain_analytics(app: &TestApp, expected: usize) {
    let worker = app.state.analytics_worker();
    let mut processed = 0;
    for _ in 0..100 {
        processed += worker.run_once().await.unwrap();
        if processed >= expected {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    panic!("only {} of {} analytics events arrived", processed, expected);
}

pub async fn submit(
    app: &TestApp,
    token: &str,
    test_id: &str,
    answers: &[(&str, &str)],
) -> (StatusCode, Value) {
    let answers: Vec<Value> = answers
        .iter()
        .map(|(question_id, option_id)| {
            serde_json::json!({ "questionId": question_id, "selectedOptionId": option_id })
        })
        .collect();
    send(
        app,
        "POST",
        &format!("/api/v1/tests/{}/submit", test_id),
        token,
        Some(serde_json::json!({ "answers": answers, "durationSeconds": 300 })),
    )
    .await
}
