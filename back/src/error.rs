use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use recap_api::v1::ErrorResponse;

use crate::{notify::NotifyError, store::StoreError, summary::SummaryError};

/// Failure of a request, translated into a status code and a JSON message at the boundary.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    RateLimited(String),

    #[error("{message}")]
    Upstream {
        message: String,
        detail: Option<String>,
    },

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation(message.into())
    }

    pub fn upstream(message: impl Into<String>, detail: impl Into<Option<String>>) -> Self {
        AppError::Upstream {
            message: message.into(),
            detail: detail.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            AppError::Upstream { .. } | AppError::StoreUnavailable(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(_) => AppError::NotFound(String::from("Todo not found")),
            StoreError::Unavailable(reason) => AppError::StoreUnavailable(reason),
        }
    }
}

impl From<SummaryError> for AppError {
    fn from(err: SummaryError) -> Self {
        match err {
            SummaryError::RateLimited(_) => AppError::RateLimited(String::from(
                "Cohere API quota exceeded. Summary generation temporarily unavailable.",
            )),
            SummaryError::Failed(message) => {
                AppError::upstream("Failed to generate summary", message)
            }
            SummaryError::Store(err) => err.into(),
        }
    }
}

impl From<NotifyError> for AppError {
    fn from(err: NotifyError) -> Self {
        match err {
            NotifyError::MissingSummary => AppError::validation("Summary is required"),
            NotifyError::Store(err) => err.into(),
            NotifyError::Delivery(err) => AppError::upstream(
                "Failed to send summary to Slack",
                err.details.unwrap_or(err.message),
            ),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        let body = match self {
            AppError::Validation(message)
            | AppError::NotFound(message)
            | AppError::RateLimited(message) => ErrorResponse {
                message,
                error: None,
            },
            AppError::Upstream { message, detail } => {
                tracing::error!(detail = ?detail, "{}", message);
                ErrorResponse {
                    message,
                    error: detail,
                }
            }
            AppError::StoreUnavailable(reason) => {
                tracing::error!(reason = %reason, "store unavailable");
                ErrorResponse {
                    message: String::from("Todo store is unavailable"),
                    error: Some(reason),
                }
            }
        };

        (status, Json(body)).into_response()
    }
}
