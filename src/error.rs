//! Error handler for dennis.

use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ServerError>;

/// Enum representing server-side errors.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("SQL request failed: {0}")]
    Sql(#[from] sqlx::Error),

    #[error(transparent)]
    Crypto(#[from] crate::crypto::CryptoError),

    #[error("cache request failed: {0}")]
    Cache(#[from] redis::RedisError),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON (de)serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV writing failed: {0}")]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("message not understood: {0}")]
    Nlu(#[from] crate::nlu::NluError),

    #[error("{0} is an invalid period")]
    InvalidPeriod(String),

    #[error("{0} is an invalid currency")]
    InvalidCurrency(String),

    #[error("user with telegram id {0} already exists")]
    UserExists(i64),

    #[error("user {0} not found")]
    UserNotFound(i64),

    #[error("expense {0} is already saved")]
    AlreadySaved(i64),

    #[error("exchange rate from {from} to {to} is unavailable")]
    RateUnavailable { from: String, to: String },

    #[error("password is missing or expired")]
    MissingPassword,

    #[error("update body is not valid: {0}")]
    InvalidUpdate(serde_json::Error),

    #[error("unknown webhook path")]
    NotFound,

    #[error("internal server error, {details}")]
    Internal { details: String },
}

impl ServerError {
    /// Wrap any displayable failure as an internal error.
    pub fn internal(details: impl ToString) -> Self {
        Self::Internal {
            details: details.to_string(),
        }
    }
}

/// Structure for detailed error responses.
#[derive(Debug, Serialize)]
pub struct ResponseError {
    r#type: Option<String>,
    title: String,
    status: u16,
    detail: String,
    instance: Option<String>,
}

impl ResponseError {
    /// Update error status code.
    pub fn status(mut self, code: StatusCode) -> Self {
        self.status = code.as_u16();
        self
    }

    /// Update `title` field.
    pub fn title(mut self, title: &str) -> Self {
        self.title = title.into();
        self
    }

    /// Add detailed error.
    pub fn details(mut self, description: &str) -> Self {
        self.detail = description.into();
        self
    }

    /// Transform [`ResponseError`] into axum [`Response`].
    pub fn into_response(
        self,
    ) -> std::result::Result<Response, axum::http::Error> {
        if let Ok(body) = serde_json::to_string(&self) {
            Response::builder()
                .status(self.status)
                .header(header::CONTENT_TYPE, "application/problem+json")
                .body(body.into())
        } else {
            Ok(internal_server_error())
        }
    }
}

impl Default for ResponseError {
    fn default() -> Self {
        Self {
            r#type: None,
            title: "Internal server error.".to_owned(),
            status: StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
            detail: String::default(),
            instance: None,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let response = match &self {
            ServerError::InvalidUpdate(err) => ResponseError::default()
                .title("Update body could not be decoded.")
                .details(&err.to_string())
                .status(StatusCode::BAD_REQUEST),

            ServerError::NotFound => ResponseError::default()
                .title("Not found.")
                .status(StatusCode::NOT_FOUND),

            err => {
                tracing::error!(error = %err, "server returned 500 status");

                ResponseError::default()
            },
        };

        response
            .into_response()
            .unwrap_or_else(|_| internal_server_error())
    }
}

fn internal_server_error() -> Response {
    Response::builder()
        .status(StatusCode::INTERNAL_SERVER_ERROR)
        .header(header::CONTENT_TYPE, "application/problem+json")
        .body(
            serde_json::json!({
                "type": null,
                "title": "Internal server error.",
                "status": StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
                "detail": null,
                "instance": null,
            })
            .to_string()
            .into(),
        )
        .unwrap_or_else(|_| Response::new("Internal server error".into()))
}
