//! # API Request/Response Types
//!
//! This module defines the JSON structures for the HTTP API and the mapping
//! from engine errors to HTTP statuses.

use crate::search::SearchError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use slices_core::{SliceError, SliceId};

// =============================================================================
// HEALTH RESPONSE
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

// =============================================================================
// MUTATION RESPONSES
// =============================================================================

/// Result of an up- or down-vote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteResponse {
    #[serde(rename = "sliceID")]
    pub slice_id: u64,
    pub upvotes: i64,
}

/// Result of a like toggle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LikeResponse {
    #[serde(rename = "sliceID")]
    pub slice_id: u64,
    pub liked: bool,
}

// =============================================================================
// ERROR RESPONSES
// =============================================================================

/// Body of every error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(msg: impl Into<String>) -> Self {
        Self { error: msg.into() }
    }
}

/// Body of a 409 on insert: the ID that already exists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictResponse {
    pub error: String,
    #[serde(rename = "sliceID")]
    pub slice_id: u64,
}

impl ConflictResponse {
    #[must_use]
    pub fn new(id: SliceId) -> Self {
        Self {
            error: format!("Slice {id} already exists"),
            slice_id: id.value(),
        }
    }
}

// =============================================================================
// QUERY PARAMETERS
// =============================================================================

/// `?size=N` on the search route.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchQuery {
    pub size: Option<usize>,
}

// =============================================================================
// API ERROR
// =============================================================================

/// Everything a handler can fail with.
#[derive(Debug)]
pub enum ApiError {
    /// Engine error.
    Slice(SliceError),
    /// Insert hit an existing ID.
    Conflict(SliceId),
    /// Request parameter or body rejected before reaching the engine.
    BadRequest(String),
    /// The request ran past the resolve timeout.
    Timeout,
    /// Search gateway error.
    Search(SearchError),
    /// The blocking worker failed.
    Internal(String),
}

impl ApiError {
    /// HTTP status for this error.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Slice(e) => match e {
                SliceError::MalformedId(_) | SliceError::InvalidSlice(_) => {
                    StatusCode::BAD_REQUEST
                }
                SliceError::NotFound(_) => StatusCode::NOT_FOUND,
                SliceError::ClosureLimitExceeded { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                SliceError::DeadlineExceeded => StatusCode::GATEWAY_TIMEOUT,
                SliceError::Cancelled | SliceError::IoError(_) => StatusCode::SERVICE_UNAVAILABLE,
                SliceError::SerializationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Timeout => StatusCode::GATEWAY_TIMEOUT,
            Self::Search(SearchError::MalformedQuery(_)) => StatusCode::BAD_REQUEST,
            Self::Search(_) => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> String {
        match self {
            Self::Slice(e) => e.to_string(),
            Self::Conflict(id) => format!("Slice {id} already exists"),
            Self::BadRequest(msg) => msg.clone(),
            Self::Timeout => "Request timed out".to_string(),
            Self::Search(e) => e.to_string(),
            Self::Internal(msg) => msg.clone(),
        }
    }
}

impl From<SliceError> for ApiError {
    fn from(e: SliceError) -> Self {
        Self::Slice(e)
    }
}

impl From<SearchError> for ApiError {
    fn from(e: SearchError) -> Self {
        Self::Search(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!(status = status.as_u16(), error = %self.message(), "request failed");
        }
        match self {
            Self::Conflict(id) => (status, Json(ConflictResponse::new(id))).into_response(),
            other => (status, Json(ErrorResponse::new(other.message()))).into_response(),
        }
    }
}
