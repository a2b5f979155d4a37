// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 The stellar-anchor developers

//! # API Error Handling
//!
//! One structured error type for every API response. Errors carry an HTTP
//! status, a short machine code and a human-readable message, plus an
//! optional detail mapping, and convert directly into the JSON envelope:
//!
//! ```json
//! { "error": "Asset FAKE not supported by anchor", "code": "bad_request" }
//! ```
//!
//! The `code` field is a machine channel parallel to the HTTP status:
//! clients switch on it without parsing messages.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Map, Value};

/// API error with HTTP status, machine code and message.
///
/// Implements `IntoResponse`, so handlers return `Result<_, ApiError>` and
/// never propagate an unhandled failure to the transport.
#[derive(Debug, Clone)]
pub struct ApiError {
    /// HTTP status code for the response.
    pub status: StatusCode,
    /// Short machine-readable kind (`bad_request`, `invalid_challenge`, …).
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Optional extra fields merged into the envelope.
    pub details: Map<String, Value>,
}

impl ApiError {
    pub fn new(status: StatusCode, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.into(),
            message: message.into(),
            details: Map::new(),
        }
    }

    /// Create a 400 Bad Request error.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "bad_request", message)
    }

    /// Create a 401 Unauthorized error.
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "unauthorized", message)
    }

    /// Create a 403 Forbidden error.
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, "forbidden", message)
    }

    /// Create a 404 Not Found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found", message)
    }

    /// Create a 409 Conflict error.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, "conflict", message)
    }

    /// Create a 500 Internal Server Error. Avoid exposing internal details.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "error", message)
    }

    /// Create a 400 with the `invalid_challenge` code used by SEP-10
    /// verification failures.
    pub fn invalid_challenge(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "invalid_challenge", message)
    }

    /// Attach an extra field to the JSON envelope.
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    /// Convert a hook failure into an API error. Structured `ApiError`s a
    /// hook raised are emitted verbatim; any other failure is wrapped as a
    /// 400-class error with the message preserved and no backtrace.
    pub fn from_hook_error(err: anyhow::Error) -> Self {
        match err.downcast::<ApiError>() {
            Ok(api) => api,
            Err(other) => Self::bad_request(other.to_string()),
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code)
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut body = Map::new();
        body.insert("error".to_string(), json!(self.message));
        body.insert("code".to_string(), json!(self.code));
        for (key, value) in self.details {
            body.entry(key).or_insert(value);
        }
        (self.status, Json(Value::Object(body))).into_response()
    }
}
