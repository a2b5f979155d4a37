// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 The stellar-anchor developers

//! SEP-24 interactive transfer routes.
//!
//! The initiation endpoints require a bearer token; the redirect, the
//! completion call and the status page are reached by the operator page and
//! authenticate via the single-use interactive token instead.

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;
use utoipa::{IntoParams, ToSchema};

use crate::auth::Auth;
use crate::error::ApiError;
use crate::state::{AppState, Sep24Mount};
use crate::stellar::strkey;
use crate::transfers::engine::{InitiateDeposit, InitiateWithdrawal};
use crate::transfers::{Transfer, TransferFilter, TransferKind, TransferMode, TransferStatus};

use super::{BodyFields, JsonOrForm};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/sep24/info", get(info))
        .route(
            "/sep24/transactions/deposit/interactive",
            post(deposit_interactive),
        )
        .route(
            "/sep24/transactions/withdraw/interactive",
            post(withdraw_interactive),
        )
        .route("/sep24/transaction", get(get_transaction))
        .route("/sep24/transactions", get(list_transactions))
        .route("/interactive", get(interactive_redirect))
        .route("/interactive/complete", post(interactive_complete))
        // The status page is addressable both at the flat path and under
        // the /sep24 prefix used in stored more_info URLs.
        .route("/transaction/more_info", get(more_info))
        .route("/sep24/transaction/more_info", get(more_info))
}

/// Initiation response: the wallet opens `url` in a browser.
#[derive(Debug, Serialize, ToSchema)]
pub struct InteractiveResponse {
    #[serde(rename = "type")]
    pub response_type: &'static str,
    pub id: String,
    pub url: String,
}

/// Wire representation of a transfer in SEP-24 responses.
#[derive(Debug, Serialize, ToSchema)]
pub struct TransferResponse {
    pub id: String,
    pub kind: TransferKind,
    pub status: TransferStatus,
    /// Compliance quirk: `3` while the transfer is `incomplete`, absent
    /// otherwise.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_eta: Option<u32>,
    pub more_info_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount_in: Option<String>,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stellar_transaction_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_transaction_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl From<&Transfer> for TransferResponse {
    fn from(t: &Transfer) -> Self {
        Self {
            id: t.id.clone(),
            kind: t.kind,
            status: t.status,
            status_eta: (t.status == TransferStatus::Incomplete).then_some(3),
            more_info_url: t.more_info_url.clone(),
            amount_in: t.amount.clone(),
            started_at: t.created_at,
            completed_at: t.completed_at,
            stellar_transaction_id: t.stellar_transaction_id.clone(),
            external_transaction_id: t.external_transaction_id.clone(),
            message: t.message.clone(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TransactionEnvelope {
    pub transaction: TransferResponse,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TransactionListEnvelope {
    pub transactions: Vec<TransferResponse>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CompleteRequest {
    pub transaction_id: String,
    pub token: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CompleteResponse {
    pub success: bool,
    pub status: TransferStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[utoipa::path(
    get,
    path = "/sep24/info",
    tag = "SEP-24",
    responses((status = 200, description = "Capabilities per asset"))
)]
pub async fn info(State(state): State<AppState>) -> Json<serde_json::Value> {
    let mut deposit = serde_json::Map::new();
    let mut withdraw = serde_json::Map::new();

    for (code, asset) in &state.config.assets {
        deposit.insert(
            code.clone(),
            serde_json::to_value(&asset.deposit).expect("operation config serializes"),
        );
        withdraw.insert(
            code.clone(),
            serde_json::to_value(&asset.withdraw).expect("operation config serializes"),
        );
    }

    Json(serde_json::json!({
        "deposit": deposit,
        "withdraw": withdraw,
        "fee": { "enabled": false },
    }))
}

#[utoipa::path(
    post,
    path = "/sep24/transactions/deposit/interactive",
    tag = "SEP-24",
    security(("bearer" = [])),
    responses(
        (status = 200, body = InteractiveResponse),
        (status = 400, description = "Unsupported asset or disabled operation"),
        (status = 401, description = "Missing or invalid token")
    )
)]
pub async fn deposit_interactive(
    Auth(subject): Auth,
    State(state): State<AppState>,
    mut body: BodyFields,
) -> Result<Json<InteractiveResponse>, ApiError> {
    let mount = sep24_mount(&state)?;
    let asset_code = require_field(&mut body, "asset_code")?;
    check_account_field(&mut body)?;

    let transfer = state
        .engine
        .initiate_deposit(
            TransferMode::Interactive,
            InitiateDeposit {
                account: subject.account,
                asset_code,
                amount: body.take("amount"),
                memo: body.take("memo"),
                memo_type: body.take("memo_type"),
            },
            Some(&mount.interactive_url),
        )
        .await?;

    mount
        .hooks
        .on_deposit(&transfer)
        .await
        .map_err(ApiError::from_hook_error)?;

    Ok(Json(interactive_response(&state, &transfer)?))
}

#[utoipa::path(
    post,
    path = "/sep24/transactions/withdraw/interactive",
    tag = "SEP-24",
    security(("bearer" = [])),
    responses(
        (status = 200, body = InteractiveResponse),
        (status = 400, description = "Unsupported asset or disabled operation"),
        (status = 401, description = "Missing or invalid token")
    )
)]
pub async fn withdraw_interactive(
    Auth(subject): Auth,
    State(state): State<AppState>,
    mut body: BodyFields,
) -> Result<Json<InteractiveResponse>, ApiError> {
    let mount = sep24_mount(&state)?;
    let asset_code = require_field(&mut body, "asset_code")?;
    check_account_field(&mut body)?;

    let transfer = state
        .engine
        .initiate_withdrawal(
            TransferMode::Interactive,
            InitiateWithdrawal {
                account: subject.account,
                asset_code,
                amount: body.take("amount"),
                dest: body.take("dest"),
                dest_extra: body.take("dest_extra"),
                withdraw_type: body.take("type"),
            },
            Some(&mount.interactive_url),
        )
        .await?;

    mount
        .hooks
        .on_withdraw(&transfer)
        .await
        .map_err(ApiError::from_hook_error)?;

    Ok(Json(interactive_response(&state, &transfer)?))
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct TransactionQuery {
    pub id: Option<String>,
    pub stellar_transaction_id: Option<String>,
    pub external_transaction_id: Option<String>,
}

#[utoipa::path(
    get,
    path = "/sep24/transaction",
    tag = "SEP-24",
    security(("bearer" = [])),
    params(TransactionQuery),
    responses(
        (status = 200, body = TransactionEnvelope),
        (status = 404, description = "No matching transfer")
    )
)]
pub async fn get_transaction(
    Auth(subject): Auth,
    State(state): State<AppState>,
    Query(query): Query<TransactionQuery>,
) -> Result<Json<TransactionEnvelope>, ApiError> {
    let transfer = if let Some(id) = &query.id {
        state.engine.get(id).await?
    } else if let Some(tx_id) = &query.stellar_transaction_id {
        state
            .engine
            .find_by_on_chain_id(tx_id)
            .await
            .ok_or_else(|| ApiError::not_found("transfer not found"))?
    } else if let Some(external_id) = &query.external_transaction_id {
        state
            .engine
            .find_by_external_id(external_id)
            .await
            .ok_or_else(|| ApiError::not_found("transfer not found"))?
    } else {
        return Err(ApiError::bad_request(
            "id, stellar_transaction_id or external_transaction_id is required",
        ));
    };

    // Queries are scoped to the authenticated account.
    if transfer.account != subject.account {
        return Err(ApiError::not_found("transfer not found"));
    }

    Ok(Json(TransactionEnvelope {
        transaction: TransferResponse::from(&transfer),
    }))
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct TransactionListQuery {
    pub asset_code: Option<String>,
    pub kind: Option<String>,
    pub no_older_than: Option<String>,
    pub limit: Option<i64>,
}

#[utoipa::path(
    get,
    path = "/sep24/transactions",
    tag = "SEP-24",
    security(("bearer" = [])),
    params(TransactionListQuery),
    responses((status = 200, body = TransactionListEnvelope))
)]
pub async fn list_transactions(
    Auth(subject): Auth,
    State(state): State<AppState>,
    Query(query): Query<TransactionListQuery>,
) -> Result<Json<TransactionListEnvelope>, ApiError> {
    let kind = match query.kind.as_deref() {
        None => None,
        Some("deposit") => Some(TransferKind::Deposit),
        Some("withdrawal") => Some(TransferKind::Withdrawal),
        Some(other) => {
            return Err(ApiError::bad_request(format!("unknown kind '{other}'")));
        }
    };

    let not_older_than = match &query.no_older_than {
        None => None,
        Some(raw) => Some(
            DateTime::parse_from_rfc3339(raw)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|_| ApiError::bad_request("no_older_than must be RFC 3339"))?,
        ),
    };

    let filter = TransferFilter {
        asset_code: query.asset_code,
        kind,
        not_older_than,
        limit: query.limit,
    };

    let transfers = state.engine.list(&subject.account, &filter).await;
    Ok(Json(TransactionListEnvelope {
        transactions: transfers.iter().map(TransferResponse::from).collect(),
    }))
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct RedirectQuery {
    pub token: Option<String>,
    pub transaction_id: Option<String>,
}

/// Redirect the wallet's browser to the operator's interactive page,
/// preserving `token` and `transaction_id` exactly.
#[utoipa::path(
    get,
    path = "/interactive",
    tag = "SEP-24",
    params(RedirectQuery),
    responses(
        (status = 302, description = "Redirect to the operator page"),
        (status = 404, description = "Unknown transfer")
    )
)]
pub async fn interactive_redirect(
    State(state): State<AppState>,
    Query(query): Query<RedirectQuery>,
) -> Result<Response, ApiError> {
    let mount = sep24_mount(&state)?;
    let token = query
        .token
        .ok_or_else(|| ApiError::bad_request("token is required"))?;
    let transaction_id = query
        .transaction_id
        .ok_or_else(|| ApiError::bad_request("transaction_id is required"))?;

    // The transfer must exist; token validity is checked by the completion
    // call, not the redirect.
    state.engine.get(&transaction_id).await?;

    let mut url = Url::parse(&mount.interactive_url)
        .map_err(|e| ApiError::internal(format!("invalid interactive URL: {e}")))?;
    url.query_pairs_mut()
        .append_pair("transaction_id", &transaction_id)
        .append_pair("token", &token);

    Ok((
        StatusCode::FOUND,
        [(header::LOCATION, url.to_string())],
    )
        .into_response())
}

#[utoipa::path(
    post,
    path = "/interactive/complete",
    tag = "SEP-24",
    request_body = CompleteRequest,
    responses(
        (status = 200, body = CompleteResponse),
        (status = 400, description = "Wrong, consumed or expired token"),
        (status = 404, description = "Unknown transfer")
    )
)]
pub async fn interactive_complete(
    State(state): State<AppState>,
    JsonOrForm(request): JsonOrForm<CompleteRequest>,
) -> Result<Json<CompleteResponse>, ApiError> {
    let mount = sep24_mount(&state)?;

    let transfer = state
        .engine
        .complete_interactive(&request.transaction_id, &request.token)
        .await?;

    mount
        .hooks
        .on_interactive_complete(&transfer)
        .await
        .map_err(ApiError::from_hook_error)?;

    Ok(Json(CompleteResponse {
        success: true,
        status: transfer.status,
        message: transfer.message,
    }))
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct MoreInfoQuery {
    pub id: Option<String>,
}

/// Human-readable status page. Operators customize it via the
/// `render_more_info` hook; the default is a minimal page with id, kind
/// and status.
#[utoipa::path(
    get,
    path = "/transaction/more_info",
    tag = "SEP-24",
    params(MoreInfoQuery),
    responses((status = 200, description = "HTML status page", content_type = "text/html"))
)]
pub async fn more_info(
    State(state): State<AppState>,
    Query(query): Query<MoreInfoQuery>,
) -> Result<Html<String>, ApiError> {
    let id = query
        .id
        .ok_or_else(|| ApiError::bad_request("id is required"))?;
    let transfer = state.engine.get(&id).await?;

    if let Some(mount) = &state.sep24 {
        if let Some(html) = mount.hooks.render_more_info(&transfer) {
            return Ok(Html(html));
        }
    }

    Ok(Html(format!(
        "<!DOCTYPE html>\n<html>\n<head><title>Transfer {id}</title></head>\n<body>\n\
         <h1>Transfer {id}</h1>\n\
         <p>Kind: {kind}</p>\n\
         <p>Status: {status}</p>\n\
         </body>\n</html>\n",
        id = transfer.id,
        kind = transfer.kind,
        status = transfer.status.as_str(),
    )))
}

fn sep24_mount(state: &AppState) -> Result<&Sep24Mount, ApiError> {
    state
        .sep24
        .as_deref()
        .ok_or_else(|| ApiError::internal("sep24 module is not mounted"))
}

fn require_field(body: &mut BodyFields, key: &str) -> Result<String, ApiError> {
    body.take(key)
        .ok_or_else(|| ApiError::bad_request(format!("{key} is required")))
}

/// An explicit account field must at least be a well-formed address; the
/// token subject wins regardless.
fn check_account_field(body: &mut BodyFields) -> Result<(), ApiError> {
    if let Some(account) = body.take("account") {
        if !strkey::is_valid_account_id(&account) {
            return Err(ApiError::bad_request(format!(
                "invalid Stellar account '{account}'"
            )));
        }
    }
    Ok(())
}

/// The wallet-facing URL: our own redirect endpoint carrying the transfer
/// id and its interactive token.
fn interactive_response(
    state: &AppState,
    transfer: &Transfer,
) -> Result<InteractiveResponse, ApiError> {
    let token = transfer
        .interactive
        .as_ref()
        .ok_or_else(|| ApiError::internal("interactive transfer without token"))?;

    let mut url = Url::parse(&format!("{}/interactive", state.config.base_url()))
        .map_err(|e| ApiError::internal(format!("invalid base URL: {e}")))?;
    url.query_pairs_mut()
        .append_pair("transaction_id", &transfer.id)
        .append_pair("token", &token.value);

    Ok(InteractiveResponse {
        response_type: "interactive_customer_info_needed",
        id: transfer.id.clone(),
        url: url.to_string(),
    })
}
