use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::api::models::ErrorResponse;

/// Why a pipeline stage handed back a degraded value instead of real data.
///
/// Stages never fail the request outright: the caller gets one of these and
/// decides which default to substitute.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DegradedReason {
    #[error("missing credential: {0}")]
    MissingCredential(&'static str),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("unexpected status: {0}")]
    Status(u16),
    #[error("malformed response: {0}")]
    MalformedResponse(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl DegradedReason {
    /// Classifies a collaborator error, looking through anyhow context for a
    /// reqwest error so timeouts and bad statuses keep their meaning.
    pub fn from_anyhow(err: &anyhow::Error) -> DegradedReason {
        if let Some(reason) = err.downcast_ref::<DegradedReason>() {
            return reason.clone();
        }
        if let Some(req_err) = err.downcast_ref::<reqwest::Error>() {
            if let Some(status) = req_err.status() {
                return DegradedReason::Status(status.as_u16());
            }
            if req_err.is_decode() {
                return DegradedReason::MalformedResponse(format!("{:#}", err));
            }
            return DegradedReason::Transport(format!("{:#}", err));
        }
        if err.downcast_ref::<serde_json::Error>().is_some() {
            return DegradedReason::MalformedResponse(format!("{:#}", err));
        }
        DegradedReason::Internal(format!("{:#}", err))
    }
}

pub type StageResult<T> = Result<T, DegradedReason>;

/// Errors the HTTP layer reports before any stream is opened.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Query cannot be empty")]
    EmptyQuery,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::EmptyQuery => StatusCode::BAD_REQUEST,
        };
        (
            status,
            Json(ErrorResponse {
                detail: self.to_string(),
            }),
        )
            .into_response()
    }
}
