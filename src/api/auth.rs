// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 The stellar-anchor developers

//! SEP-10 authentication routes.

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

use crate::auth::{ChallengeResponse, TokenResponse};
use crate::error::ApiError;
use crate::state::AppState;

use super::JsonOrForm;

pub fn routes() -> Router<AppState> {
    Router::new().route("/auth", get(get_challenge).post(post_challenge))
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ChallengeQuery {
    /// Client account claiming to authenticate (`G...`).
    pub account: String,
}

/// Request body for challenge verification; accepted as JSON or
/// form-urlencoded.
#[derive(Debug, Deserialize, ToSchema)]
pub struct VerifyRequest {
    /// Base64 XDR envelope, signed by the client.
    pub transaction: String,
}

#[utoipa::path(
    get,
    path = "/auth",
    tag = "Auth",
    params(ChallengeQuery),
    responses(
        (status = 200, description = "Challenge transaction", body = ChallengeResponse),
        (status = 400, description = "Malformed account")
    )
)]
pub async fn get_challenge(
    State(state): State<AppState>,
    Query(params): Query<ChallengeQuery>,
) -> Result<Json<ChallengeResponse>, ApiError> {
    let challenge = state.auth.create_challenge(&params.account).await?;
    Ok(Json(challenge))
}

#[utoipa::path(
    post,
    path = "/auth",
    tag = "Auth",
    request_body = VerifyRequest,
    responses(
        (status = 200, description = "Bearer token", body = TokenResponse),
        (status = 400, description = "Invalid challenge"),
        (status = 401, description = "Insufficient signature weight")
    )
)]
pub async fn post_challenge(
    State(state): State<AppState>,
    JsonOrForm(request): JsonOrForm<VerifyRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let (_account, token) = state.auth.verify_challenge(&request.transaction).await?;
    Ok(Json(token))
}
