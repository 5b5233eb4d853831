use std::time::Duration;

use async_trait::async_trait;
use recap_api::v1::Todo;
use serde::{Deserialize, Serialize};

use crate::store::{Sort, SortKey, StoreError, TodoFilter, TodoStore};

pub const NO_PENDING_TASKS: &str = "You have no pending tasks. Great job staying on top of things!";

const MAX_TOKENS: u32 = 100;
const TEMPERATURE: f32 = 0.7;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GenerateRequest {
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("{0}")]
    Other(String),
}

/// External text-generation capability.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, request: GenerateRequest) -> Result<String, GenerateError>;
}

#[derive(Debug, thiserror::Error)]
pub enum SummaryError {
    #[error("text generation quota exceeded: {0}")]
    RateLimited(String),

    #[error("failed to generate summary: {0}")]
    Failed(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<GenerateError> for SummaryError {
    fn from(err: GenerateError) -> Self {
        match err {
            GenerateError::RateLimited(message) => SummaryError::RateLimited(message),
            GenerateError::Other(message) => SummaryError::Failed(message),
        }
    }
}

/// Digest of all pending todos, highest priority first.
///
/// Returns [`NO_PENDING_TASKS`] without touching the generator when nothing is
/// pending.
pub async fn summarize(
    store: &dyn TodoStore,
    generator: &dyn TextGenerator,
) -> Result<String, SummaryError> {
    let pending = store
        .list(
            TodoFilter::pending(),
            Some(Sort::descending(SortKey::Priority)),
        )
        .await?;

    if pending.is_empty() {
        return Ok(String::from(NO_PENDING_TASKS));
    }

    let request = GenerateRequest {
        prompt: prompt(&pending),
        max_tokens: MAX_TOKENS,
        temperature: TEMPERATURE,
    };

    tracing::debug!(pending = pending.len(), "requesting summary");

    let text = generator.generate(request).await?;
    Ok(text.trim().to_string())
}

fn task_line(todo: &Todo) -> String {
    let mut line = format!(
        "- {} (Priority: {}, Category: {})",
        todo.title, todo.priority, todo.category
    );

    if !todo.description.is_empty() {
        line.push_str(": ");
        line.push_str(&todo.description);
    }

    line
}

pub fn prompt(pending: &[Todo]) -> String {
    let tasks = pending.iter().map(task_line).collect::<Vec<_>>().join("\n");

    format!(
        "\nHere are my current pending tasks:\n\n{tasks}\nGive me a short summary in 3-4 lines:\n\
         1. Total tasks\n2. summarize the task\n3. A quick motivational note\nKeep it concise.\n"
    )
}

/// Used when no API key is configured; every call fails.
pub struct UnconfiguredGenerator;

#[async_trait]
impl TextGenerator for UnconfiguredGenerator {
    async fn generate(&self, _request: GenerateRequest) -> Result<String, GenerateError> {
        Err(GenerateError::Other(String::from(
            "summary generation is not configured",
        )))
    }
}

const COHERE_BASE_URL: &str = "https://api.cohere.ai/v1";

/// [`TextGenerator`] backed by Cohere's generate endpoint.
pub struct CohereGenerator {
    api_key: String,
    model: String,
    url: String,
    client: reqwest::Client,
}

impl CohereGenerator {
    pub fn new(api_key: String, model: String) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self::with_client(api_key, model, COHERE_BASE_URL, client))
    }

    /// `base_url` is the API root without a trailing slash, e.g. `https://api.cohere.ai/v1`.
    pub fn with_client(
        api_key: String,
        model: String,
        base_url: &str,
        client: reqwest::Client,
    ) -> Self {
        Self {
            api_key,
            model,
            url: format!("{}/generate", base_url.trim_end_matches('/')),
            client,
        }
    }
}

#[derive(Serialize)]
struct CohereRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Deserialize)]
struct CohereResponse {
    #[serde(default)]
    generations: Vec<CohereGeneration>,
}

#[derive(Deserialize)]
struct CohereGeneration {
    text: String,
}

#[derive(Default, Deserialize)]
struct CohereErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    code: Option<String>,
}

fn is_quota_code(code: Option<&str>) -> bool {
    matches!(code, Some("insufficient_quota" | "rate_limit_exceeded"))
}

#[async_trait]
impl TextGenerator for CohereGenerator {
    async fn generate(&self, request: GenerateRequest) -> Result<String, GenerateError> {
        let body = CohereRequest {
            model: &self.model,
            prompt: &request.prompt,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|err| GenerateError::Other(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let error: CohereErrorBody = serde_json::from_str(&text).unwrap_or_default();
            let message = error.message.unwrap_or(text);

            if status == reqwest::StatusCode::TOO_MANY_REQUESTS
                || is_quota_code(error.code.as_deref())
            {
                return Err(GenerateError::RateLimited(message));
            }

            return Err(GenerateError::Other(format!("{status}: {message}")));
        }

        let response: CohereResponse = response
            .json()
            .await
            .map_err(|err| GenerateError::Other(err.to_string()))?;

        response
            .generations
            .into_iter()
            .next()
            .map(|generation| generation.text)
            .ok_or_else(|| {
                GenerateError::Other(String::from("response did not contain a summary"))
            })
    }
}
