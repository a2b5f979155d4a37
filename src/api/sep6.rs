// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 The stellar-anchor developers

//! SEP-6 programmatic transfer routes.
//!
//! Unlike SEP-24 there is no hosted page: the response itself carries the
//! settlement instructions. Hooks may override them; without hooks the
//! deposit instructs the user to send to the anchor's signing account and
//! the withdrawal hands out a random numeric memo of type `id`.

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::auth::Auth;
use crate::error::ApiError;
use crate::state::{AppState, Sep6Mount};
use crate::stellar::strkey;
use crate::transfers::engine::{InitiateDeposit, InitiateWithdrawal};
use crate::transfers::{Transfer, TransferKind, TransferMode};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/sep6/info", get(info))
        .route("/sep6/deposit", get(deposit))
        .route("/sep6/withdraw", get(withdraw))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DepositResponse {
    /// Instructions for delivering the off-chain value.
    pub how: String,
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eta: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fee_fixed: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fee_percent: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra_info: Option<serde_json::Value>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct WithdrawResponse {
    /// Stellar account the user sends the asset to.
    pub account_id: String,
    pub memo_type: String,
    pub memo: String,
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eta: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fee_fixed: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fee_percent: Option<f64>,
}

#[utoipa::path(
    get,
    path = "/sep6/info",
    tag = "SEP-6",
    responses((status = 200, description = "Capabilities per asset"))
)]
pub async fn info(State(state): State<AppState>) -> Json<serde_json::Value> {
    let mut deposit = serde_json::Map::new();
    let mut withdraw = serde_json::Map::new();

    for (code, asset) in &state.config.assets {
        deposit.insert(code.clone(), operation_info(&asset.deposit));
        withdraw.insert(code.clone(), operation_info(&asset.withdraw));
    }

    Json(serde_json::json!({
        "deposit": deposit,
        "withdraw": withdraw,
        "fee": { "enabled": false },
        "transactions": { "enabled": true, "authentication_required": true },
        "transaction": { "enabled": true, "authentication_required": true },
    }))
}

fn operation_info(op: &crate::config::OperationConfig) -> serde_json::Value {
    let mut value = serde_json::to_value(op).expect("operation config serializes");
    if let Some(object) = value.as_object_mut() {
        object.insert("authentication_required".to_string(), serde_json::json!(true));
    }
    value
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct DepositQuery {
    pub asset_code: Option<String>,
    pub account: Option<String>,
    pub amount: Option<String>,
    pub memo: Option<String>,
    pub memo_type: Option<String>,
}

#[utoipa::path(
    get,
    path = "/sep6/deposit",
    tag = "SEP-6",
    security(("bearer" = [])),
    params(DepositQuery),
    responses(
        (status = 200, body = DepositResponse),
        (status = 400, description = "Unsupported asset or disabled operation"),
        (status = 401, description = "Missing or invalid token")
    )
)]
pub async fn deposit(
    Auth(subject): Auth,
    State(state): State<AppState>,
    Query(query): Query<DepositQuery>,
) -> Result<Json<DepositResponse>, ApiError> {
    let mount = sep6_mount(&state)?;
    let asset_code = query
        .asset_code
        .ok_or_else(|| ApiError::bad_request("asset_code is required"))?;
    check_account_field(query.account.as_deref())?;

    let transfer = state
        .engine
        .initiate_deposit(
            TransferMode::Programmatic,
            InitiateDeposit {
                account: subject.account,
                asset_code,
                amount: query.amount,
                memo: query.memo,
                memo_type: query.memo_type,
            },
            None,
        )
        .await?;

    let instructions = mount
        .hooks
        .on_deposit(&transfer)
        .await
        .map_err(ApiError::from_hook_error)?
        .unwrap_or_default();

    let (_, asset) = state
        .config
        .asset(&transfer.asset_code)
        .ok_or_else(|| ApiError::internal("asset disappeared after initiation"))?;

    Ok(Json(DepositResponse {
        how: instructions.how.unwrap_or_else(|| default_deposit_how(&state, &transfer)),
        id: transfer.id.clone(),
        eta: instructions.eta,
        min_amount: asset.deposit.min_amount,
        max_amount: asset.deposit.max_amount,
        fee_fixed: asset.deposit.fee_fixed,
        fee_percent: asset.deposit.fee_percent,
        extra_info: instructions.extra_info,
    }))
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct WithdrawQuery {
    pub asset_code: Option<String>,
    #[serde(rename = "type")]
    pub withdraw_type: Option<String>,
    pub dest: Option<String>,
    pub dest_extra: Option<String>,
    pub account: Option<String>,
    pub amount: Option<String>,
}

#[utoipa::path(
    get,
    path = "/sep6/withdraw",
    tag = "SEP-6",
    security(("bearer" = [])),
    params(WithdrawQuery),
    responses(
        (status = 200, body = WithdrawResponse),
        (status = 400, description = "Unsupported asset, disabled operation or missing type/dest"),
        (status = 401, description = "Missing or invalid token")
    )
)]
pub async fn withdraw(
    Auth(subject): Auth,
    State(state): State<AppState>,
    Query(query): Query<WithdrawQuery>,
) -> Result<Json<WithdrawResponse>, ApiError> {
    let mount = sep6_mount(&state)?;
    let asset_code = query
        .asset_code
        .ok_or_else(|| ApiError::bad_request("asset_code is required"))?;
    check_account_field(query.account.as_deref())?;

    let transfer = state
        .engine
        .initiate_withdrawal(
            TransferMode::Programmatic,
            InitiateWithdrawal {
                account: subject.account,
                asset_code,
                amount: query.amount,
                dest: query.dest,
                dest_extra: query.dest_extra,
                withdraw_type: query.withdraw_type,
            },
            None,
        )
        .await?;

    let instructions = mount
        .hooks
        .on_withdraw(&transfer)
        .await
        .map_err(ApiError::from_hook_error)?
        .unwrap_or_default();

    let (_, asset) = state
        .config
        .asset(&transfer.asset_code)
        .ok_or_else(|| ApiError::internal("asset disappeared after initiation"))?;

    Ok(Json(WithdrawResponse {
        account_id: instructions
            .account_id
            .unwrap_or_else(|| state.config.signing_account()),
        memo_type: instructions.memo_type.unwrap_or_else(|| "id".to_string()),
        memo: instructions.memo.unwrap_or_else(random_numeric_memo),
        id: transfer.id.clone(),
        eta: instructions.eta,
        min_amount: asset.withdraw.min_amount,
        max_amount: asset.withdraw.max_amount,
        fee_fixed: asset.withdraw.fee_fixed,
        fee_percent: asset.withdraw.fee_percent,
    }))
}

fn sep6_mount(state: &AppState) -> Result<&Sep6Mount, ApiError> {
    state
        .sep6
        .as_deref()
        .ok_or_else(|| ApiError::internal("sep6 module is not mounted"))
}

fn check_account_field(account: Option<&str>) -> Result<(), ApiError> {
    if let Some(account) = account {
        if !strkey::is_valid_account_id(account) {
            return Err(ApiError::bad_request(format!(
                "invalid Stellar account '{account}'"
            )));
        }
    }
    Ok(())
}

fn default_deposit_how(state: &AppState, transfer: &Transfer) -> String {
    debug_assert_eq!(transfer.kind, TransferKind::Deposit);
    format!(
        "Send {} to Stellar account {}",
        transfer.asset_code,
        state.config.signing_account()
    )
}

/// Nine random digits, the default withdrawal memo.
fn random_numeric_memo() -> String {
    format!("{:09}", OsRng.next_u64() % 1_000_000_000)
}
