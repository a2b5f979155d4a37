// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 The stellar-anchor developers

//! Discovery document route.

use axum::{
    extract::State,
    http::{header, HeaderMap},
};

use crate::state::AppState;

/// Serve the SEP-1 discovery document.
///
/// The wildcard CORS header is mandated for `stellar.toml` regardless of
/// the CORS policy on the rest of the surface, so it is set here directly.
#[utoipa::path(
    get,
    path = "/.well-known/stellar.toml",
    tag = "Discovery",
    responses((status = 200, description = "TOML discovery document", content_type = "text/plain"))
)]
pub async fn stellar_toml(State(state): State<AppState>) -> (HeaderMap, String) {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        "text/plain; charset=utf-8".parse().expect("static header"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        "*".parse().expect("static header"),
    );

    (headers, state.discovery.render().to_string())
}
