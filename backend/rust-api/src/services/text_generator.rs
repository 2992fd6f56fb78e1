//! External text-generation service.
//!
//! The engine only needs `generate(prompt) -> text`. `YandexGptClient` talks
//! to the Foundation Models completion endpoint; `UnconfiguredGenerator`
//! stands in when no API key is set; `MockTextGenerator` replays scripted
//! responses for tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::instrument;

use crate::config::GeneratorConfig;
use crate::error::GenerationError;
use crate::metrics::{GENERATOR_CALLS_TOTAL, GENERATOR_CALL_DURATION_SECONDS};

const SYSTEM_PROMPT: &str = "You are an experienced teacher who writes clear, \
unambiguous multiple-choice questions and follows formatting instructions exactly.";

#[async_trait]
pub trait TextGenerator: Send + Sync {
    fn name(&self) -> &str;

    async fn generate(&self, prompt: &str) -> Result<String, GenerationError>;
}

pub struct YandexGptClient {
    client: Client,
    config: GeneratorConfig,
}

impl YandexGptClient {
    pub fn new(config: GeneratorConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build generator HTTP client")?;
        Ok(Self { client, config })
    }

    fn model_uri(&self) -> String {
        format!("gpt://{}/{}/latest", self.config.folder_id, self.config.model)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CompletionRequest {
    model_uri: String,
    completion_options: CompletionOptions,
    messages: Vec<CompletionMessage>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CompletionOptions {
    stream: bool,
    temperature: f32,
    max_tokens: String,
}

#[derive(Serialize, Deserialize)]
struct CompletionMessage {
    role: String,
    text: String,
}

#[derive(Deserialize)]
struct CompletionResponse {
    result: CompletionResult,
}

#[derive(Deserialize)]
struct CompletionResult {
    #[serde(default)]
    alternatives: Vec<CompletionAlternative>,
}

#[derive(Deserialize)]
struct CompletionAlternative {
    message: CompletionMessage,
}

#[async_trait]
impl TextGenerator for YandexGptClient {
    fn name(&self) -> &str {
        "yandexgpt"
    }

    #[instrument(skip(self, prompt), fields(model = %self.config.model, prompt_len = prompt.len()))]
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let start = Instant::now();
        let result = self.call(prompt).await;
        let status = if result.is_ok() { "success" } else { "error" };
        GENERATOR_CALLS_TOTAL.with_label_values(&[status]).inc();
        GENERATOR_CALL_DURATION_SECONDS
            .with_label_values(&[status])
            .observe(start.elapsed().as_secs_f64());
        result
    }
}

impl YandexGptClient {
    async fn call(&self, prompt: &str) -> Result<String, GenerationError> {
        let body = CompletionRequest {
            model_uri: self.model_uri(),
            completion_options: CompletionOptions {
                stream: false,
                temperature: self.config.temperature,
                max_tokens: self.config.max_tokens.to_string(),
            },
            messages: vec![
                CompletionMessage {
                    role: "system".to_string(),
                    text: SYSTEM_PROMPT.to_string(),
                },
                CompletionMessage {
                    role: "user".to_string(),
                    text: prompt.to_string(),
                },
            ],
        };

        let response = self
            .client
            .post(&self.config.api_url)
            .header("Authorization", format!("Api-Key {}", self.config.api_key))
            .header("x-folder-id", &self.config.folder_id)
            .json(&body)
            .send()
            .await
            .map_err(|e| GenerationError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        if status == 429 {
            return Err(GenerationError::RateLimited);
        }
        if status >= 400 {
            let message = response.text().await.unwrap_or_default();
            return Err(GenerationError::Api { status, message });
        }

        let parsed: CompletionResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::InvalidResponse(e.to_string()))?;

        parsed
            .result
            .alternatives
            .into_iter()
            .next()
            .map(|alternative| alternative.message.text)
            .ok_or_else(|| GenerationError::InvalidResponse("no alternatives returned".into()))
    }
}

/// Used when no API key is configured. Every call fails, so generation
/// requests surface as upstream errors.
pub struct UnconfiguredGenerator;

#[async_trait]
impl TextGenerator for UnconfiguredGenerator {
    fn name(&self) -> &str {
        "unconfigured"
    }

    async fn generate(&self, _prompt: &str) -> Result<String, GenerationError> {
        GENERATOR_CALLS_TOTAL.with_label_values(&["error"]).inc();
        Err(GenerationError::NotConfigured)
    }
}

/// Replays queued responses in order, then falls back to a fixed default.
pub struct MockTextGenerator {
    script: Mutex<VecDeque<Result<String, GenerationError>>>,
    default_response: String,
    prompts: Mutex<Vec<String>>,
    call_count: AtomicU32,
}

impl MockTextGenerator {
    pub fn with_fixed_response(response: impl Into<String>) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            default_response: response.into(),
            prompts: Mutex::new(Vec::new()),
            call_count: AtomicU32::new(0),
        }
    }

    pub fn scripted(responses: Vec<Result<String, GenerationError>>) -> Self {
        Self {
            script: Mutex::new(responses.into()),
            default_response: String::new(),
            prompts: Mutex::new(Vec::new()),
            call_count: AtomicU32::new(0),
        }
    }

    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::Relaxed)
    }

    pub async fn prompts(&self) -> Vec<String> {
        self.prompts.lock().await.clone()
    }
}

#[async_trait]
impl TextGenerator for MockTextGenerator {
    fn name(&self) -> &str {
        "mock"
    }

    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        self.prompts.lock().await.push(prompt.to_string());

        match self.script.lock().await.pop_front() {
            Some(next) => next,
            None => Ok(self.default_response.clone()),
        }
    }
}
