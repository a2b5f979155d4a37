// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 The stellar-anchor developers

//! Axum extractor for bearer-token authentication.
//!
//! Use the `Auth` extractor in handlers to require a valid token:
//!
//! ```rust,ignore
//! async fn my_handler(Auth(subject): Auth) -> impl IntoResponse {
//!     // subject.account is the authenticated Stellar address
//! }
//! ```

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

use crate::error::ApiError;
use crate::state::AppState;

use super::jwt::{self, Claims, TokenError};

/// The authenticated subject of a request.
#[derive(Debug, Clone)]
pub struct Subject {
    /// Stellar account address (`sub` claim).
    pub account: String,
    /// Full claim set for downstream inspection.
    pub claims: Claims,
}

/// Extractor that validates the `Authorization: Bearer` header against the
/// anchor's JWT secret and exposes the authenticated subject.
#[derive(Debug)]
pub struct Auth(pub Subject);

impl FromRequestParts<AppState> for Auth {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .ok_or_else(|| ApiError::unauthorized("Authorization header is required"))?
            .to_str()
            .map_err(|_| ApiError::unauthorized("invalid Authorization header"))?;

        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| ApiError::unauthorized("expected 'Bearer <token>'"))?;

        let claims = jwt::verify(&state.config.jwt_secret, token).map_err(|e| match e {
            TokenError::Expired => ApiError::unauthorized("token has expired"),
            TokenError::Invalid => ApiError::unauthorized("token is invalid"),
        })?;

        Ok(Auth(Subject {
            account: claims.sub.clone(),
            claims,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_support::test_config;
    use crate::state::AppState;
    use axum::http::Request;

    const ACCOUNT: &str = "GCEZWKCA5VLDNRLN3RPRJMRZOX3Z6G5CHCGSNFHEYVXM3XOJMDS674JZ";

    fn state() -> AppState {
        AppState::new(test_config()).expect("test config is valid")
    }

    fn parts_with_header(value: Option<String>) -> Parts {
        let mut builder = Request::builder().uri("/test");
        if let Some(value) = value {
            builder = builder.header("Authorization", value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[tokio::test]
    async fn missing_header_is_unauthorized() {
        let state = state();
        let mut parts = parts_with_header(None);
        let err = Auth::from_request_parts(&mut parts, &state).await.unwrap_err();
        assert_eq!(err.status, axum::http::StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn malformed_scheme_is_unauthorized() {
        let state = state();
        let mut parts = parts_with_header(Some("Basic abc".to_string()));
        let err = Auth::from_request_parts(&mut parts, &state).await.unwrap_err();
        assert_eq!(err.code, "unauthorized");
    }

    #[tokio::test]
    async fn valid_token_yields_subject() {
        let state = state();
        let token = jwt::mint(&state.config.jwt_secret, &state.config.domain, ACCOUNT);
        let mut parts = parts_with_header(Some(format!("Bearer {token}")));

        let Auth(subject) = Auth::from_request_parts(&mut parts, &state).await.unwrap();
        assert_eq!(subject.account, ACCOUNT);
    }

    #[tokio::test]
    async fn token_signed_with_other_secret_is_rejected() {
        let state = state();
        let token = jwt::mint(&"x".repeat(32), &state.config.domain, ACCOUNT);
        let mut parts = parts_with_header(Some(format!("Bearer {token}")));

        let err = Auth::from_request_parts(&mut parts, &state).await.unwrap_err();
        assert_eq!(err.status, axum::http::StatusCode::UNAUTHORIZED);
    }
}
