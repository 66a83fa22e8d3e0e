#[cfg(feature = "server")]
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
#[cfg(feature = "server")]
use serde_json::json;
use thiserror::Error;

use crate::classifier::QueryClassification;

#[derive(Error, Debug)]
pub enum LookupError {
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("{} not found", .0.label())]
    NotFound(QueryClassification),

    #[error("Network timeout")]
    Timeout,

    #[error("Error fetching {} data: {details}", .kind.label())]
    Upstream {
        kind: QueryClassification,
        details: String,
    },

    #[error("Response too large")]
    ResponseTooLarge,

    #[error("DNS error: {0}")]
    Dns(String),

    #[error("IO error: {0}")]
    IoError(#[from] tokio::io::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    ConfigError(#[from] config::ConfigError),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<tokio::time::error::Elapsed> for LookupError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        LookupError::Timeout
    }
}

impl LookupError {
    /// Attach the query kind to transport-level failures so callers can tell
    /// which upstream broke. Not-found, timeout and input errors pass through.
    pub fn for_kind(self, kind: QueryClassification) -> Self {
        match self {
            LookupError::InvalidQuery(_)
            | LookupError::NotFound(_)
            | LookupError::Timeout
            | LookupError::Upstream { .. } => self,
            other => LookupError::Upstream {
                kind,
                details: other.to_string(),
            },
        }
    }
}

#[cfg(feature = "server")]
impl IntoResponse for LookupError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            LookupError::InvalidQuery(_) => (
                StatusCode::BAD_REQUEST,
                json!({
                    "error": "Invalid input",
                    "message": "Please enter a valid domain name, IP address, or ASN number"
                }),
            ),
            LookupError::NotFound(_) => (StatusCode::NOT_FOUND, json!({ "error": self.to_string() })),
            LookupError::Timeout => (
                StatusCode::GATEWAY_TIMEOUT,
                json!({ "error": "Lookup timed out" }),
            ),
            LookupError::Upstream { kind, details } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({
                    "error": format!("Error fetching {} data", kind.label()),
                    "details": details
                }),
            ),
            _ => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": "Internal server error", "details": self.to_string() }),
            ),
        };

        (status, Json(body)).into_response()
    }
}
