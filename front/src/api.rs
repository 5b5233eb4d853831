use recap_api::v1::{
    ErrorResponse, MessageResponse, NewTodo, SendSummary, SummaryResponse, Todo, TodoPatch,
};
use uuid::Uuid;

pub struct Client {
    url: String,
    http: reqwest::Client,
}

impl Client {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into().trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }

    pub async fn get_todos(&self) -> eyre::Result<Vec<Todo>> {
        let response = self
            .http
            .get(format!("{}/todos", self.url))
            .send()
            .await?;

        let response = check(response, "Failed to fetch todos").await?;
        Ok(response.json().await?)
    }

    pub async fn add_todo(&self, todo: &NewTodo) -> eyre::Result<Todo> {
        let response = self
            .http
            .post(format!("{}/todos", self.url))
            .json(todo)
            .send()
            .await?;

        let response = check(response, "Failed to create todo").await?;
        Ok(response.json().await?)
    }

    pub async fn update_todo(&self, id: Uuid, patch: &TodoPatch) -> eyre::Result<Todo> {
        let response = self
            .http
            .patch(format!("{}/todos/{}", self.url, id))
            .json(patch)
            .send()
            .await?;

        let response = check(response, "Failed to update todo").await?;
        Ok(response.json().await?)
    }

    pub async fn delete_todo(&self, id: Uuid) -> eyre::Result<()> {
        let response = self
            .http
            .delete(format!("{}/todos/{}", self.url, id))
            .send()
            .await?;

        check(response, "Failed to delete todo").await?;
        Ok(())
    }

    pub async fn generate_summary(&self) -> eyre::Result<String> {
        let response = self
            .http
            .get(format!("{}/summary", self.url))
            .send()
            .await?;

        let response = check(response, "Failed to generate summary").await?;
        let summary: SummaryResponse = response.json().await?;
        Ok(summary.summary)
    }

    pub async fn send_summary(&self, summary: String) -> eyre::Result<String> {
        let response = self
            .http
            .post(format!("{}/slack/send-summary", self.url))
            .json(&SendSummary {
                summary: Some(summary),
            })
            .send()
            .await?;

        let response = check(response, "Failed to send summary to Slack").await?;
        let message: MessageResponse = response.json().await?;
        Ok(message.message)
    }
}

async fn check(response: reqwest::Response, fallback: &str) -> eyre::Result<reqwest::Response> {
    if response.status().is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    eyre::bail!("{}", error_message(&body, fallback))
}

/// The server's `message`, or `fallback` when the body carries none.
pub fn error_message(body: &str, fallback: &str) -> String {
    match serde_json::from_str::<ErrorResponse>(body) {
        Ok(ErrorResponse { message, .. }) if !message.is_empty() => message,
        _ => fallback.to_string(),
    }
}
