// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 The stellar-anchor developers

//! HTTP surface: route groups per SEP, assembled by [`router`] from the
//! mount set configured on [`AppState`].

use axum::{
    extract::{FromRequest, Multipart, Request},
    http::header::CONTENT_TYPE,
    routing::get,
    Json, Router,
};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use tower_http::cors::{AllowOrigin, CorsLayer};
use utoipa::OpenApi;

use crate::error::ApiError;
use crate::state::AppState;

pub mod auth;
pub mod discovery;
pub mod health;
pub mod sep24;
pub mod sep6;

/// Assemble the application router. Discovery and health are always
/// served; the SEP groups are merged iff their module is mounted.
pub fn router(state: AppState) -> Router {
    let mounts = state.discovery.mounts();

    let mut app = Router::new()
        .route("/health", get(health::health))
        .route("/.well-known/stellar.toml", get(discovery::stellar_toml))
        .route("/api-doc/openapi.json", get(openapi_json));

    if mounts.sep10 {
        app = app.merge(auth::routes());
    }
    if mounts.sep24 {
        app = app.merge(sep24::routes());
    }
    if mounts.sep6 {
        app = app.merge(sep6::routes());
    }

    app.with_state(state).layer(build_cors_layer())
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Build CORS layer from environment configuration.
///
/// - If `CORS_ALLOWED_ORIGINS` is set, only those origins are allowed.
/// - If not set, falls back to permissive CORS. Wallet clients call the
///   anchor cross-origin by design, so permissive is the usual setting.
fn build_cors_layer() -> CorsLayer {
    if let Ok(origins) = std::env::var("CORS_ALLOWED_ORIGINS") {
        let allowed: Vec<_> = origins
            .split(',')
            .map(|s| s.trim().parse().expect("invalid CORS origin"))
            .collect();
        tracing::info!(origins = %origins, "CORS: restricting to configured origins");
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(allowed))
            .allow_methods(tower_http::cors::Any)
            .allow_headers(tower_http::cors::Any)
    } else {
        CorsLayer::permissive()
    }
}

/// Body extractor accepting `application/json` or
/// `application/x-www-form-urlencoded`, per the SEP transports.
pub struct JsonOrForm<T>(pub T);

impl<S, T> FromRequest<S> for JsonOrForm<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        let bytes = axum::body::Bytes::from_request(req, state)
            .await
            .map_err(|_| ApiError::bad_request("failed to read request body"))?;

        let value = if content_type.starts_with("application/x-www-form-urlencoded") {
            serde_urlencoded::from_bytes(&bytes)
                .map_err(|e| ApiError::bad_request(format!("invalid form body: {e}")))?
        } else {
            serde_json::from_slice(&bytes)
                .map_err(|e| ApiError::bad_request(format!("invalid JSON body: {e}")))?
        };

        Ok(JsonOrForm(value))
    }
}

/// Flat field extractor for the SEP-24 initiation endpoints, which accept
/// multipart, form-urlencoded or JSON bodies.
pub struct BodyFields(pub HashMap<String, String>);

impl BodyFields {
    pub fn take(&mut self, key: &str) -> Option<String> {
        self.0.remove(key).filter(|v| !v.is_empty())
    }
}

impl FromRequest<AppState> for BodyFields {
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &AppState) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        if content_type.starts_with("multipart/form-data") {
            let mut multipart = Multipart::from_request(req, state)
                .await
                .map_err(|e| ApiError::bad_request(format!("invalid multipart body: {e}")))?;

            let mut fields = HashMap::new();
            while let Some(field) = multipart
                .next_field()
                .await
                .map_err(|e| ApiError::bad_request(format!("invalid multipart field: {e}")))?
            {
                let Some(name) = field.name().map(str::to_string) else {
                    continue;
                };
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("invalid multipart field: {e}")))?;
                fields.insert(name, text);
            }
            return Ok(BodyFields(fields));
        }

        let bytes = axum::body::Bytes::from_request(req, state)
            .await
            .map_err(|_| ApiError::bad_request("failed to read request body"))?;

        if content_type.starts_with("application/json") {
            let value: serde_json::Value = serde_json::from_slice(&bytes)
                .map_err(|e| ApiError::bad_request(format!("invalid JSON body: {e}")))?;
            let object = value
                .as_object()
                .ok_or_else(|| ApiError::bad_request("request body must be an object"))?;

            let mut fields = HashMap::new();
            for (key, value) in object {
                let text = match value {
                    serde_json::Value::String(s) => s.clone(),
                    serde_json::Value::Number(n) => n.to_string(),
                    serde_json::Value::Bool(b) => b.to_string(),
                    _ => continue,
                };
                fields.insert(key.clone(), text);
            }
            return Ok(BodyFields(fields));
        }

        let fields: HashMap<String, String> = serde_urlencoded::from_bytes(&bytes)
            .map_err(|e| ApiError::bad_request(format!("invalid form body: {e}")))?;
        Ok(BodyFields(fields))
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        discovery::stellar_toml,
        auth::get_challenge,
        auth::post_challenge,
        sep24::info,
        sep24::deposit_interactive,
        sep24::withdraw_interactive,
        sep24::get_transaction,
        sep24::list_transactions,
        sep24::interactive_redirect,
        sep24::interactive_complete,
        sep24::more_info,
        sep6::info,
        sep6::deposit,
        sep6::withdraw,
    ),
    components(schemas(
        crate::auth::service::ChallengeResponse,
        crate::auth::service::TokenResponse,
        auth::VerifyRequest,
        sep24::InteractiveResponse,
        sep24::TransferResponse,
        sep24::TransactionEnvelope,
        sep24::TransactionListEnvelope,
        sep24::CompleteRequest,
        sep24::CompleteResponse,
        sep6::DepositResponse,
        sep6::WithdrawResponse,
        health::HealthResponse,
    )),
    tags(
        (name = "Discovery", description = "SEP-1 discovery document"),
        (name = "Auth", description = "SEP-10 web authentication"),
        (name = "SEP-24", description = "Hosted interactive transfers"),
        (name = "SEP-6", description = "Programmatic transfers"),
        (name = "Health", description = "Liveness checks")
    ),
    modifiers(&SecurityAddon)
)]
struct ApiDoc;

/// Registers the bearer scheme referenced by the authenticated paths.
struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
            let scheme = Http::builder()
                .scheme(HttpAuthScheme::Bearer)
                .bearer_format("JWT")
                .description(Some("SEP-10 bearer token"))
                .build();
            components.add_security_scheme("bearer", SecurityScheme::Http(scheme));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_support::test_config;
    use crate::state::{Sep24Mount, Sep6Mount};
    use axum::{body::Body, http::Request, http::StatusCode};
    use tower::ServiceExt;

    fn full_state() -> AppState {
        AppState::new(test_config())
            .unwrap()
            .mount_sep10()
            .mount_sep24(Sep24Mount::new("https://kyc.example.com/flow").unwrap())
            .mount_sep6(Sep6Mount::default())
    }

    #[tokio::test]
    async fn router_builds_with_all_mounts() {
        let app = router(full_state());
        let _ = app.into_make_service();
    }

    #[tokio::test]
    async fn unmounted_groups_are_absent() {
        let state = AppState::new(test_config()).unwrap().mount_sep10();
        let app = router(state);

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/sep24/info")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let account = crate::stellar::strkey::encode_account_id(&[42u8; 32]);
        let response = app
            .oneshot(
                Request::builder()
                    .uri(format!("/auth?account={account}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn openapi_json_is_served() {
        let app = router(full_state());
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api-doc/openapi.json")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn generate_openapi_json() {
        let json = ApiDoc::openapi().to_pretty_json().unwrap();
        assert!(json.contains("openapi"));
    }
}
