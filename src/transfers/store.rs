// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 The stellar-anchor developers

//! Transfer persistence port and the default in-memory implementation.
//!
//! The port is deliberately small: three lookups by distinct identifiers, an
//! account listing, a partial update, and one atomic consume operation for
//! interactive tokens. A persistent backend substitutes for the in-memory
//! default by implementing the same trait; the token index, the listing
//! order and the concurrent-safety of `consume_interactive_token` are part
//! of the contract.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::RwLock;

use super::{InteractiveToken, Transfer, TransferKind, TransferStatus};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("transfer {0} already exists")]
    DuplicateId(String),

    #[error("interactive token is already bound to another transfer")]
    DuplicateToken,
}

/// Failure modes of the atomic token consumption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConsumeTokenError {
    #[error("transfer not found")]
    NotFound,
    #[error("interactive token does not match")]
    WrongToken,
    #[error("interactive token already used")]
    AlreadyConsumed,
    #[error("interactive token expired")]
    Expired,
}

/// Filters for account listings, applied in declaration order before the
/// limit.
#[derive(Debug, Clone, Default)]
pub struct TransferFilter {
    pub asset_code: Option<String>,
    pub kind: Option<TransferKind>,
    pub not_older_than: Option<DateTime<Utc>>,
    /// Zero or negative limits are ignored.
    pub limit: Option<i64>,
}

/// Partial update: supplied fields replace, `updated_at` always refreshes,
/// `id` is preserved.
#[derive(Debug, Clone, Default)]
pub struct TransferUpdate {
    pub status: Option<TransferStatus>,
    pub amount: Option<String>,
    pub stellar_transaction_id: Option<String>,
    pub external_transaction_id: Option<String>,
    pub message: Option<String>,
    /// `Some(true)` stamps `completed_at` with the same instant as
    /// `updated_at`; `Some(false)` clears it. Stamping both with one clock
    /// read keeps `completed_at >= updated_at` exact.
    pub completed: Option<bool>,
    pub interactive: Option<InteractiveToken>,
    pub metadata: Option<BTreeMap<String, serde_json::Value>>,
}

/// Persistence port for transfer records.
#[async_trait]
pub trait TransferStore: Send + Sync {
    async fn create(&self, transfer: Transfer) -> Result<Transfer, StoreError>;

    async fn get_by_id(&self, id: &str) -> Option<Transfer>;

    async fn get_by_interactive_token(&self, token: &str) -> Option<Transfer>;

    async fn get_by_on_chain_id(&self, tx_id: &str) -> Option<Transfer>;

    async fn get_by_external_id(&self, external_id: &str) -> Option<Transfer>;

    /// Newest-first listing for one account.
    async fn list_by_account(&self, account: &str, filter: &TransferFilter) -> Vec<Transfer>;

    async fn update(&self, id: &str, update: TransferUpdate) -> Option<Transfer>;

    async fn delete(&self, id: &str) -> bool;

    /// Atomically verify and consume the interactive token, advancing the
    /// status per the state machine when the transfer is still
    /// `incomplete`. Observing the token and marking it consumed happen
    /// under one guard; a read-then-write sequence would admit a replay
    /// race.
    async fn consume_interactive_token(
        &self,
        id: &str,
        token: &str,
    ) -> Result<Transfer, ConsumeTokenError>;
}

#[derive(Default)]
struct Inner {
    transfers: HashMap<String, Transfer>,
    /// interactive token value → transfer id
    token_index: HashMap<String, String>,
}

/// In-memory store for development and tests.
#[derive(Default)]
pub struct InMemoryTransferStore {
    inner: RwLock<Inner>,
}

impl InMemoryTransferStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TransferStore for InMemoryTransferStore {
    async fn create(&self, transfer: Transfer) -> Result<Transfer, StoreError> {
        let mut inner = self.inner.write().await;
        if inner.transfers.contains_key(&transfer.id) {
            return Err(StoreError::DuplicateId(transfer.id.clone()));
        }
        if let Some(token) = &transfer.interactive {
            if inner.token_index.contains_key(&token.value) {
                return Err(StoreError::DuplicateToken);
            }
            inner
                .token_index
                .insert(token.value.clone(), transfer.id.clone());
        }
        inner.transfers.insert(transfer.id.clone(), transfer.clone());
        Ok(transfer)
    }

    async fn get_by_id(&self, id: &str) -> Option<Transfer> {
        self.inner.read().await.transfers.get(id).cloned()
    }

    async fn get_by_interactive_token(&self, token: &str) -> Option<Transfer> {
        let inner = self.inner.read().await;
        let id = inner.token_index.get(token)?;
        inner.transfers.get(id).cloned()
    }

    async fn get_by_on_chain_id(&self, tx_id: &str) -> Option<Transfer> {
        self.inner
            .read()
            .await
            .transfers
            .values()
            .find(|t| t.stellar_transaction_id.as_deref() == Some(tx_id))
            .cloned()
    }

    async fn get_by_external_id(&self, external_id: &str) -> Option<Transfer> {
        self.inner
            .read()
            .await
            .transfers
            .values()
            .find(|t| t.external_transaction_id.as_deref() == Some(external_id))
            .cloned()
    }

    async fn list_by_account(&self, account: &str, filter: &TransferFilter) -> Vec<Transfer> {
        let inner = self.inner.read().await;
        let mut matches: Vec<Transfer> = inner
            .transfers
            .values()
            .filter(|t| t.account == account)
            .filter(|t| match &filter.asset_code {
                Some(code) => t.asset_code.eq_ignore_ascii_case(code),
                None => true,
            })
            .filter(|t| match filter.kind {
                Some(kind) => t.kind == kind,
                None => true,
            })
            .filter(|t| match filter.not_older_than {
                Some(cutoff) => t.created_at >= cutoff,
                None => true,
            })
            .cloned()
            .collect();

        matches.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        match filter.limit {
            Some(limit) if limit > 0 => matches.truncate(limit as usize),
            _ => {}
        }
        matches
    }

    async fn update(&self, id: &str, update: TransferUpdate) -> Option<Transfer> {
        let mut inner = self.inner.write().await;

        // Token index maintenance happens before the mutable borrow of the
        // record itself.
        let old_token = inner
            .transfers
            .get(id)?
            .interactive
            .as_ref()
            .map(|t| t.value.clone());
        if let Some(new_token) = &update.interactive {
            if old_token.as_deref() != Some(new_token.value.as_str()) {
                if let Some(old) = &old_token {
                    inner.token_index.remove(old);
                }
                inner.token_index.insert(new_token.value.clone(), id.to_string());
            }
        }

        let now = Utc::now();
        let transfer = inner.transfers.get_mut(id)?;
        if let Some(status) = update.status {
            transfer.status = status;
        }
        if let Some(amount) = update.amount {
            transfer.amount = Some(amount);
        }
        if let Some(tx_id) = update.stellar_transaction_id {
            transfer.stellar_transaction_id = Some(tx_id);
        }
        if let Some(external_id) = update.external_transaction_id {
            transfer.external_transaction_id = Some(external_id);
        }
        if let Some(message) = update.message {
            transfer.message = Some(message);
        }
        if let Some(completed) = update.completed {
            transfer.completed_at = completed.then_some(now);
        }
        if let Some(interactive) = update.interactive {
            transfer.interactive = Some(interactive);
        }
        if let Some(metadata) = update.metadata {
            transfer.metadata = metadata;
        }
        transfer.updated_at = now;

        Some(transfer.clone())
    }

    async fn delete(&self, id: &str) -> bool {
        let mut inner = self.inner.write().await;
        match inner.transfers.remove(id) {
            Some(transfer) => {
                if let Some(token) = &transfer.interactive {
                    inner.token_index.remove(&token.value);
                }
                true
            }
            None => false,
        }
    }

    async fn consume_interactive_token(
        &self,
        id: &str,
        token: &str,
    ) -> Result<Transfer, ConsumeTokenError> {
        let mut inner = self.inner.write().await;
        let transfer = inner
            .transfers
            .get_mut(id)
            .ok_or(ConsumeTokenError::NotFound)?;

        let now = Utc::now();
        {
            let interactive = transfer
                .interactive
                .as_mut()
                .ok_or(ConsumeTokenError::WrongToken)?;
            if interactive.value != token {
                return Err(ConsumeTokenError::WrongToken);
            }
            if interactive.consumed {
                return Err(ConsumeTokenError::AlreadyConsumed);
            }
            if interactive.is_expired(now) {
                return Err(ConsumeTokenError::Expired);
            }
            interactive.consumed = true;
        }

        if let Some(next) = transfer.next_status_on_complete() {
            transfer.status = next;
        }
        transfer.updated_at = now;

        Ok(transfer.clone())
    }
}
