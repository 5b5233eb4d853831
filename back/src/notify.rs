use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::store::{StoreError, TodoFilter, TodoStore};

pub const HEADER: &str = "📋 Todo Summary";

/// Chat message made of layout blocks, as accepted by Slack incoming webhooks.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BlockMessage {
    pub blocks: Vec<Block>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Block {
    Header { text: Text },
    Section { text: Text },
    Context { elements: Vec<Text> },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Text {
    PlainText { text: String, emoji: bool },
    Mrkdwn { text: String },
}

#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct DeliveryError {
    pub message: String,
    /// Payload returned by the remote end, when it sent one.
    pub details: Option<String>,
}

/// External webhook capability.
#[async_trait]
pub trait Webhook: Send + Sync {
    async fn deliver(&self, message: &BlockMessage) -> Result<(), DeliveryError>;
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Summary is required")]
    MissingSummary,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("delivery failed: {0}")]
    Delivery(#[from] DeliveryError),
}

pub fn progress_line(completed: u64, total: u64, at: DateTime<Local>) -> String {
    format!(
        "*Progress:* {completed}/{total} tasks completed • Generated on {}",
        at.format("%-m/%-d/%Y, %-I:%M:%S %p")
    )
}

pub fn compose(summary: &str, completed: u64, total: u64, at: DateTime<Local>) -> BlockMessage {
    BlockMessage {
        blocks: vec![
            Block::Header {
                text: Text::PlainText {
                    text: String::from(HEADER),
                    emoji: true,
                },
            },
            Block::Section {
                text: Text::Mrkdwn {
                    text: summary.to_string(),
                },
            },
            Block::Context {
                elements: vec![Text::Mrkdwn {
                    text: progress_line(completed, total, at),
                }],
            },
        ],
    }
}

/// Posts `summary` with the store's live completion counts.
pub async fn send_summary(
    store: &dyn TodoStore,
    webhook: &dyn Webhook,
    summary: Option<&str>,
) -> Result<(), NotifyError> {
    let summary = match summary {
        Some(summary) if !summary.is_empty() => summary,
        _ => return Err(NotifyError::MissingSummary),
    };

    let total = store.count(TodoFilter::all()).await?;
    let completed = store.count(TodoFilter::completed()).await?;

    let message = compose(summary, completed, total, Local::now());
    webhook.deliver(&message).await?;

    tracing::info!(completed, total, "sent summary");

    Ok(())
}

/// Used when no webhook URL is configured; every delivery fails.
pub struct UnconfiguredWebhook;

#[async_trait]
impl Webhook for UnconfiguredWebhook {
    async fn deliver(&self, _message: &BlockMessage) -> Result<(), DeliveryError> {
        Err(DeliveryError {
            message: String::from("webhook is not configured"),
            details: None,
        })
    }
}

/// [`Webhook`] posting to a Slack incoming-webhook URL.
pub struct SlackWebhook {
    url: String,
    client: reqwest::Client,
}

impl SlackWebhook {
    pub fn new(url: String) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self::with_client(url, client))
    }

    pub fn with_client(url: String, client: reqwest::Client) -> Self {
        Self { url, client }
    }
}

#[async_trait]
impl Webhook for SlackWebhook {
    async fn deliver(&self, message: &BlockMessage) -> Result<(), DeliveryError> {
        let response = self
            .client
            .post(&self.url)
            .json(message)
            .send()
            .await
            .map_err(|err| DeliveryError {
                message: err.to_string(),
                details: None,
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.ok().filter(|body| !body.is_empty());
            return Err(DeliveryError {
                message: format!("webhook responded with {status}"),
                details: body,
            });
        }

        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Mutex;

    use chrono::TimeZone;
    use recap_api::v1::{NewTodo, TodoPatch};
    use wiremock::{
        matchers::{body_partial_json, method, path},
        Mock, MockServer, ResponseTemplate,
    };

    use super::*;
    use crate::store::LocalStore;

    #[derive(Default)]
    pub struct FakeWebhook {
        pub delivered: Mutex<Vec<BlockMessage>>,
        pub fail_with: Option<String>,
    }

    #[async_trait]
    impl Webhook for FakeWebhook {
        async fn deliver(&self, message: &BlockMessage) -> Result<(), DeliveryError> {
            if let Some(details) = &self.fail_with {
                return Err(DeliveryError {
                    message: String::from("webhook responded with 400 Bad Request"),
                    details: Some(details.clone()),
                });
            }

            self.delivered.lock().unwrap().push(message.clone());
            Ok(())
        }
    }

    fn context_text(message: &BlockMessage) -> &str {
        match &message.blocks[2] {
            Block::Context { elements } => match &elements[0] {
                Text::Mrkdwn { text } => text,
                other => panic!("unexpected element {other:?}"),
            },
            other => panic!("unexpected block {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_or_empty_summary_is_rejected_without_delivery() {
        let store = LocalStore::in_memory();
        let webhook = FakeWebhook::default();

        for summary in [None, Some("")] {
            let err = send_summary(&store, &webhook, summary).await.unwrap_err();
            assert!(matches!(err, NotifyError::MissingSummary));
        }

        assert!(webhook.delivered.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn whitespace_summary_is_sent_verbatim() {
        let store = LocalStore::in_memory();
        let webhook = FakeWebhook::default();

        send_summary(&store, &webhook, Some("  ")).await.unwrap();

        let delivered = webhook.delivered.lock().unwrap();
        assert_eq!(
            delivered[0].blocks[1],
            Block::Section {
                text: Text::Mrkdwn {
                    text: String::from("  ")
                }
            }
        );
    }

    #[tokio::test]
    async fn counts_come_from_the_store() {
        let store = LocalStore::in_memory();
        for title in ["one", "two", "three"] {
            let todo = store
                .insert(NewTodo {
                    title: title.to_string(),
                    ..Default::default()
                })
                .await
                .unwrap();
            if title == "one" {
                store.update(todo.id, TodoPatch::completed(true)).await.unwrap();
            }
        }
        let webhook = FakeWebhook::default();

        send_summary(&store, &webhook, Some("All good")).await.unwrap();

        let delivered = webhook.delivered.lock().unwrap();
        assert_eq!(delivered.len(), 1);
        let message = &delivered[0];
        assert_eq!(
            message.blocks[1],
            Block::Section {
                text: Text::Mrkdwn {
                    text: String::from("All good")
                }
            }
        );
        assert!(context_text(message).starts_with("*Progress:* 1/3 tasks completed • Generated on "));
    }

    #[tokio::test]
    async fn delivery_failure_keeps_remote_payload() {
        let store = LocalStore::in_memory();
        let webhook = FakeWebhook {
            fail_with: Some(String::from("invalid_blocks")),
            ..Default::default()
        };

        let err = send_summary(&store, &webhook, Some("hi")).await.unwrap_err();
        match err {
            NotifyError::Delivery(err) => assert_eq!(err.details.as_deref(), Some("invalid_blocks")),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn message_serializes_as_slack_blocks() {
        let at = Local.with_ymd_and_hms(2026, 10, 16, 20, 5, 9).unwrap();
        let json = serde_json::to_value(compose("Do things", 2, 5, at)).unwrap();

        assert_eq!(json["blocks"][0]["type"], "header");
        assert_eq!(json["blocks"][0]["text"]["type"], "plain_text");
        assert_eq!(json["blocks"][0]["text"]["text"], HEADER);
        assert_eq!(json["blocks"][0]["text"]["emoji"], true);
        assert_eq!(json["blocks"][1]["type"], "section");
        assert_eq!(json["blocks"][1]["text"]["type"], "mrkdwn");
        assert_eq!(json["blocks"][2]["type"], "context");
        assert_eq!(
            json["blocks"][2]["elements"][0]["text"],
            "*Progress:* 2/5 tasks completed • Generated on 10/16/2026, 8:05:09 PM"
        );
    }

    async fn slack_replying(response: ResponseTemplate) -> (MockServer, SlackWebhook) {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/services/T000/B000"))
            .and(body_partial_json(serde_json::json!({
                "blocks": [{ "type": "header" }, { "type": "section" }, { "type": "context" }]
            })))
            .respond_with(response)
            .mount(&server)
            .await;

        let webhook = SlackWebhook::with_client(
            format!("{}/services/T000/B000", server.uri()),
            reqwest::Client::new(),
        );
        (server, webhook)
    }

    fn message() -> BlockMessage {
        let at = Local.with_ymd_and_hms(2026, 10, 16, 9, 0, 0).unwrap();
        compose("Do things", 1, 2, at)
    }

    #[tokio::test]
    async fn slack_accepts_the_message() {
        let (_server, webhook) = slack_replying(ResponseTemplate::new(200).set_body_string("ok")).await;

        webhook.deliver(&message()).await.unwrap();
    }

    #[tokio::test]
    async fn slack_rejection_carries_the_response_body() {
        let (_server, webhook) =
            slack_replying(ResponseTemplate::new(404).set_body_string("no_service")).await;

        let err = webhook.deliver(&message()).await.unwrap_err();
        assert_eq!(err.details.as_deref(), Some("no_service"));
        assert!(err.message.contains("404"));
    }

    #[tokio::test]
    async fn slack_empty_rejection_has_no_details() {
        let (_server, webhook) = slack_replying(ResponseTemplate::new(500)).await;

        let err = webhook.deliver(&message()).await.unwrap_err();
        assert_eq!(err.details, None);
    }
}
