// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 The stellar-anchor developers

//! Transfer engine: initiation, interactive completion, operator status
//! updates and queries.
//!
//! The engine is the crate's operator-facing API as well: the settlement
//! pipeline calls [`TransferEngine::update_status`] and the id lookups
//! in-process, outside the HTTP surface.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use rand::rngs::OsRng;
use rand::RngCore;
use tracing::info;
use url::Url;
use uuid::Uuid;

use crate::config::{AnchorConfig, OperationConfig};
use crate::error::ApiError;

use super::store::{ConsumeTokenError, TransferFilter, TransferStore, TransferUpdate};
use super::{InteractiveToken, Transfer, TransferKind, TransferMode, TransferStatus};

/// Inputs for a deposit initiation.
#[derive(Debug, Clone, Default)]
pub struct InitiateDeposit {
    pub account: String,
    pub asset_code: String,
    pub amount: Option<String>,
    pub memo: Option<String>,
    pub memo_type: Option<String>,
}

/// Inputs for a withdrawal initiation.
#[derive(Debug, Clone, Default)]
pub struct InitiateWithdrawal {
    pub account: String,
    pub asset_code: String,
    pub amount: Option<String>,
    /// Off-chain destination (bank account, …). Required for programmatic
    /// withdrawals; interactive flows collect it on the operator's page.
    pub dest: Option<String>,
    pub dest_extra: Option<String>,
    /// Withdrawal method (`bank_account`, `cash`, …). Required for
    /// programmatic withdrawals.
    pub withdraw_type: Option<String>,
}

/// Optional fields accompanying an operator status update.
#[derive(Debug, Clone, Default)]
pub struct StatusUpdate {
    pub stellar_transaction_id: Option<String>,
    pub external_transaction_id: Option<String>,
    pub message: Option<String>,
    pub amount: Option<String>,
}

pub struct TransferEngine {
    config: Arc<AnchorConfig>,
    store: Arc<dyn TransferStore>,
}

impl TransferEngine {
    pub fn new(config: Arc<AnchorConfig>, store: Arc<dyn TransferStore>) -> Self {
        Self { config, store }
    }

    pub fn store(&self) -> &Arc<dyn TransferStore> {
        &self.store
    }

    /// Create a deposit transfer. `interactive_base` is the operator page
    /// base URL and must be present iff the mode is interactive.
    pub async fn initiate_deposit(
        &self,
        mode: TransferMode,
        req: InitiateDeposit,
        interactive_base: Option<&str>,
    ) -> Result<Transfer, ApiError> {
        let (asset_code, issuer) =
            self.require_enabled(&req.asset_code, TransferKind::Deposit)?;

        let transfer = self.new_transfer(
            TransferKind::Deposit,
            mode,
            asset_code,
            issuer,
            req.account,
            req.amount,
            interactive_base,
        )?;
        let transfer = transfer_with_memo(transfer, req.memo, req.memo_type);

        self.persist(transfer).await
    }

    /// Create a withdrawal transfer. Programmatic withdrawals must name a
    /// destination and a withdrawal type; absence is an error, never
    /// silently defaulted.
    pub async fn initiate_withdrawal(
        &self,
        mode: TransferMode,
        req: InitiateWithdrawal,
        interactive_base: Option<&str>,
    ) -> Result<Transfer, ApiError> {
        let (asset_code, issuer) =
            self.require_enabled(&req.asset_code, TransferKind::Withdrawal)?;

        if mode == TransferMode::Programmatic {
            if req.withdraw_type.as_deref().unwrap_or("").is_empty() {
                return Err(ApiError::bad_request("type is required"));
            }
            if req.dest.as_deref().unwrap_or("").is_empty() {
                return Err(ApiError::bad_request("dest is required"));
            }
        }

        let mut transfer = self.new_transfer(
            TransferKind::Withdrawal,
            mode,
            asset_code,
            issuer,
            req.account,
            req.amount,
            interactive_base,
        )?;
        transfer.dest = req.dest;
        transfer.dest_extra = req.dest_extra;
        if let Some(withdraw_type) = req.withdraw_type {
            transfer
                .metadata
                .insert("type".to_string(), serde_json::json!(withdraw_type));
        }

        self.persist(transfer).await
    }

    /// Complete the interactive flow for `(id, token)`: consume the token
    /// and advance the state machine, atomically.
    pub async fn complete_interactive(
        &self,
        id: &str,
        token: &str,
    ) -> Result<Transfer, ApiError> {
        let transfer = self
            .store
            .consume_interactive_token(id, token)
            .await
            .map_err(|e| match e {
                ConsumeTokenError::NotFound => ApiError::not_found("transfer not found"),
                ConsumeTokenError::WrongToken => {
                    ApiError::bad_request("interactive token does not match")
                }
                ConsumeTokenError::AlreadyConsumed => {
                    ApiError::bad_request("interactive token already used")
                }
                ConsumeTokenError::Expired => ApiError::bad_request("interactive token expired"),
            })?;

        info!(transfer_id = %transfer.id, status = transfer.status.as_str(), "interactive flow completed");
        Ok(transfer)
    }

    /// Operator-side status update. Terminal statuses stamp `completed_at`,
    /// non-terminal ones clear it.
    pub async fn update_status(
        &self,
        id: &str,
        status: TransferStatus,
        fields: StatusUpdate,
    ) -> Result<Transfer, ApiError> {
        // On-chain and external settlement ids each identify at most one
        // transfer.
        if let Some(tx_id) = &fields.stellar_transaction_id {
            if let Some(other) = self.store.get_by_on_chain_id(tx_id).await {
                if other.id != id {
                    return Err(ApiError::conflict(format!(
                        "stellar transaction id already bound to transfer {}",
                        other.id
                    )));
                }
            }
        }
        if let Some(external_id) = &fields.external_transaction_id {
            if let Some(other) = self.store.get_by_external_id(external_id).await {
                if other.id != id {
                    return Err(ApiError::conflict(format!(
                        "external transaction id already bound to transfer {}",
                        other.id
                    )));
                }
            }
        }

        let update = TransferUpdate {
            status: Some(status),
            amount: fields.amount,
            stellar_transaction_id: fields.stellar_transaction_id,
            external_transaction_id: fields.external_transaction_id,
            message: fields.message,
            completed: Some(status.is_terminal()),
            ..Default::default()
        };

        let transfer = self
            .store
            .update(id, update)
            .await
            .ok_or_else(|| ApiError::not_found("transfer not found"))?;

        info!(transfer_id = %transfer.id, status = status.as_str(), "transfer status updated");
        Ok(transfer)
    }

    pub async fn get(&self, id: &str) -> Result<Transfer, ApiError> {
        self.store
            .get_by_id(id)
            .await
            .ok_or_else(|| ApiError::not_found("transfer not found"))
    }

    pub async fn find_by_on_chain_id(&self, tx_id: &str) -> Option<Transfer> {
        self.store.get_by_on_chain_id(tx_id).await
    }

    pub async fn find_by_external_id(&self, external_id: &str) -> Option<Transfer> {
        self.store.get_by_external_id(external_id).await
    }

    pub async fn list(&self, account: &str, filter: &TransferFilter) -> Vec<Transfer> {
        self.store.list_by_account(account, filter).await
    }

    /// Resolve the asset and check that the operation is enabled. Returns
    /// the configured (case-sensitive) code and the issuer.
    fn require_enabled(
        &self,
        code: &str,
        kind: TransferKind,
    ) -> Result<(String, Option<String>), ApiError> {
        let (configured, asset) = self.config.asset(code).ok_or_else(|| {
            ApiError::bad_request(format!("Asset {code} not supported by anchor"))
        })?;

        let operation: &OperationConfig = match kind {
            TransferKind::Deposit => &asset.deposit,
            TransferKind::Withdrawal => &asset.withdraw,
        };
        if !operation.enabled {
            return Err(ApiError::bad_request(format!(
                "{kind} is not enabled for asset {configured}"
            )));
        }

        Ok((configured.to_string(), asset.issuer.clone()))
    }

    #[allow(clippy::too_many_arguments)]
    fn new_transfer(
        &self,
        kind: TransferKind,
        mode: TransferMode,
        asset_code: String,
        asset_issuer: Option<String>,
        account: String,
        amount: Option<String>,
        interactive_base: Option<&str>,
    ) -> Result<Transfer, ApiError> {
        let id = new_transfer_id();
        let now = Utc::now();

        let (interactive, interactive_url) = match (mode, interactive_base) {
            (TransferMode::Interactive, Some(base)) => {
                let token = InteractiveToken::new(new_interactive_token());
                let url = interactive_redirect_url(base, &id, &token.value)?;
                (Some(token), Some(url))
            }
            (TransferMode::Interactive, None) => {
                return Err(ApiError::internal("interactive URL not configured"))
            }
            (TransferMode::Programmatic, _) => (None, None),
        };

        Ok(Transfer {
            more_info_url: format!(
                "{}/sep24/transaction/more_info?id={id}",
                self.config.base_url()
            ),
            id,
            kind,
            mode,
            status: TransferStatus::Incomplete,
            asset_code,
            asset_issuer,
            account,
            amount,
            dest: None,
            dest_extra: None,
            memo: None,
            memo_type: None,
            interactive,
            interactive_url,
            stellar_transaction_id: None,
            external_transaction_id: None,
            message: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
            metadata: BTreeMap::new(),
        })
    }

    async fn persist(&self, transfer: Transfer) -> Result<Transfer, ApiError> {
        let transfer = self
            .store
            .create(transfer)
            .await
            .map_err(|e| ApiError::internal(e.to_string()))?;
        info!(
            transfer_id = %transfer.id,
            kind = %transfer.kind,
            asset = %transfer.asset_code,
            "transfer created"
        );
        Ok(transfer)
    }
}

fn transfer_with_memo(
    mut transfer: Transfer,
    memo: Option<String>,
    memo_type: Option<String>,
) -> Transfer {
    transfer.memo = memo;
    transfer.memo_type = memo_type;
    transfer
}

/// 16 random octets, hex-encoded to 32 characters.
pub fn new_transfer_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// 32 random octets, hex-encoded to 64 characters.
pub fn new_interactive_token() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Operator page URL carrying `transaction_id` and `token`, percent-encoded.
fn interactive_redirect_url(base: &str, id: &str, token: &str) -> Result<String, ApiError> {
    let mut url = Url::parse(base)
        .map_err(|e| ApiError::internal(format!("invalid interactive URL: {e}")))?;
    url.query_pairs_mut()
        .append_pair("transaction_id", id)
        .append_pair("token", token);
    Ok(url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_support::test_config;
    use crate::transfers::store::InMemoryTransferStore;

    const ACCOUNT: &str = "GCEZWKCA5VLDNRLN3RPRJMRZOX3Z6G5CHCGSNFHEYVXM3XOJMDS674JZ";
    const INTERACTIVE_BASE: &str = "https://kyc.example.com/flow";

    fn engine() -> TransferEngine {
        TransferEngine::new(
            Arc::new(test_config()),
            Arc::new(InMemoryTransferStore::new()),
        )
    }

    fn deposit_request(asset: &str) -> InitiateDeposit {
        InitiateDeposit {
            account: ACCOUNT.to_string(),
            asset_code: asset.to_string(),
            amount: Some("100".to_string()),
            memo: None,
            memo_type: None,
        }
    }

    #[tokio::test]
    async fn interactive_deposit_creates_token_and_urls() {
        let engine = engine();
        let transfer = engine
            .initiate_deposit(
                TransferMode::Interactive,
                deposit_request("USDC"),
                Some(INTERACTIVE_BASE),
            )
            .await
            .unwrap();

        assert_eq!(transfer.id.len(), 32);
        assert_eq!(transfer.status, TransferStatus::Incomplete);
        assert_eq!(transfer.asset_code, "USDC");
        assert!(transfer.asset_issuer.is_some());

        let token = transfer.interactive.as_ref().unwrap();
        assert_eq!(token.value.len(), 64);
        assert!(!token.consumed);

        let url = transfer.interactive_url.as_ref().unwrap();
        assert!(url.starts_with(INTERACTIVE_BASE));
        assert!(url.contains(&format!("transaction_id={}", transfer.id)));
        assert!(url.contains(&format!("token={}", token.value)));

        assert!(transfer
            .more_info_url
            .contains("/sep24/transaction/more_info?id="));
    }

    #[tokio::test]
    async fn asset_code_matches_case_insensitively() {
        let engine = engine();
        let transfer = engine
            .initiate_deposit(
                TransferMode::Interactive,
                deposit_request("usdc"),
                Some(INTERACTIVE_BASE),
            )
            .await
            .unwrap();
        assert_eq!(transfer.asset_code, "USDC");
    }

    #[tokio::test]
    async fn unknown_asset_is_rejected_with_spec_message() {
        let engine = engine();
        let err = engine
            .initiate_deposit(
                TransferMode::Interactive,
                deposit_request("FAKE"),
                Some(INTERACTIVE_BASE),
            )
            .await
            .unwrap_err();

        assert_eq!(err.code, "bad_request");
        assert_eq!(err.message, "Asset FAKE not supported by anchor");
    }

    #[tokio::test]
    async fn disabled_operation_is_rejected() {
        let mut config = test_config();
        config.assets.get_mut("USDC").unwrap().withdraw.enabled = false;
        let engine = TransferEngine::new(
            Arc::new(config),
            Arc::new(InMemoryTransferStore::new()),
        );

        let err = engine
            .initiate_withdrawal(
                TransferMode::Interactive,
                InitiateWithdrawal {
                    account: ACCOUNT.to_string(),
                    asset_code: "USDC".to_string(),
                    ..Default::default()
                },
                Some(INTERACTIVE_BASE),
            )
            .await
            .unwrap_err();
        assert_eq!(err.code, "bad_request");
        assert!(err.message.contains("not enabled"));
    }

    #[tokio::test]
    async fn programmatic_withdrawal_requires_type_and_dest() {
        let engine = engine();

        let err = engine
            .initiate_withdrawal(
                TransferMode::Programmatic,
                InitiateWithdrawal {
                    account: ACCOUNT.to_string(),
                    asset_code: "USDC".to_string(),
                    dest: Some("DE89370400440532013000".to_string()),
                    ..Default::default()
                },
                None,
            )
            .await
            .unwrap_err();
        assert_eq!(err.message, "type is required");

        let err = engine
            .initiate_withdrawal(
                TransferMode::Programmatic,
                InitiateWithdrawal {
                    account: ACCOUNT.to_string(),
                    asset_code: "USDC".to_string(),
                    withdraw_type: Some("bank_account".to_string()),
                    ..Default::default()
                },
                None,
            )
            .await
            .unwrap_err();
        assert_eq!(err.message, "dest is required");

        let transfer = engine
            .initiate_withdrawal(
                TransferMode::Programmatic,
                InitiateWithdrawal {
                    account: ACCOUNT.to_string(),
                    asset_code: "USDC".to_string(),
                    withdraw_type: Some("bank_account".to_string()),
                    dest: Some("DE89370400440532013000".to_string()),
                    ..Default::default()
                },
                None,
            )
            .await
            .unwrap();
        assert!(transfer.interactive.is_none());
        assert_eq!(transfer.dest.as_deref(), Some("DE89370400440532013000"));
    }

    #[tokio::test]
    async fn complete_interactive_transitions_and_rejects_replay() {
        let engine = engine();
        let transfer = engine
            .initiate_deposit(
                TransferMode::Interactive,
                deposit_request("USDC"),
                Some(INTERACTIVE_BASE),
            )
            .await
            .unwrap();
        let token = transfer.interactive.as_ref().unwrap().value.clone();

        let completed = engine
            .complete_interactive(&transfer.id, &token)
            .await
            .unwrap();
        assert_eq!(completed.status, TransferStatus::PendingUserTransferStart);

        let err = engine
            .complete_interactive(&transfer.id, &token)
            .await
            .unwrap_err();
        assert_eq!(err.code, "bad_request");
        assert!(err.message.contains("already used"));

        let err = engine
            .complete_interactive("0000000000000000000000000000dead", &token)
            .await
            .unwrap_err();
        assert_eq!(err.code, "not_found");
    }

    #[tokio::test]
    async fn update_status_couples_completed_at_to_terminal_states() {
        let engine = engine();
        let transfer = engine
            .initiate_deposit(
                TransferMode::Interactive,
                deposit_request("USDC"),
                Some(INTERACTIVE_BASE),
            )
            .await
            .unwrap();

        let done = engine
            .update_status(
                &transfer.id,
                TransferStatus::Completed,
                StatusUpdate {
                    stellar_transaction_id: Some("abc123".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(done.completed_at.is_some());
        assert!(done.completed_at.unwrap() >= done.created_at);

        let reopened = engine
            .update_status(
                &transfer.id,
                TransferStatus::PendingAnchor,
                StatusUpdate::default(),
            )
            .await
            .unwrap();
        assert!(reopened.completed_at.is_none());

        assert_eq!(
            engine
                .find_by_on_chain_id("abc123")
                .await
                .map(|t| t.id),
            Some(transfer.id.clone())
        );
    }

    #[tokio::test]
    async fn settlement_ids_are_unique_across_transfers() {
        let engine = engine();
        let first = engine
            .initiate_deposit(
                TransferMode::Interactive,
                deposit_request("USDC"),
                Some(INTERACTIVE_BASE),
            )
            .await
            .unwrap();
        let second = engine
            .initiate_deposit(
                TransferMode::Interactive,
                deposit_request("USDC"),
                Some(INTERACTIVE_BASE),
            )
            .await
            .unwrap();
        assert_ne!(first.id, second.id);

        engine
            .update_status(
                &first.id,
                TransferStatus::Completed,
                StatusUpdate {
                    stellar_transaction_id: Some("txhash".to_string()),
                    external_transaction_id: Some("wire-1".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let err = engine
            .update_status(
                &second.id,
                TransferStatus::Completed,
                StatusUpdate {
                    stellar_transaction_id: Some("txhash".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.code, "conflict");

        let err = engine
            .update_status(
                &second.id,
                TransferStatus::Completed,
                StatusUpdate {
                    external_transaction_id: Some("wire-1".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.code, "conflict");
    }

    #[tokio::test]
    async fn update_status_on_unknown_transfer_is_not_found() {
        let engine = engine();
        let err = engine
            .update_status(
                "ffffffffffffffffffffffffffffffff",
                TransferStatus::Completed,
                StatusUpdate::default(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.code, "not_found");
    }
}
