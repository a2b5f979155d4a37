// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 The stellar-anchor developers

//! # Transfer Lifecycle
//!
//! Transfers are the anchor's central record: one per deposit or withdrawal,
//! created by an authenticated initiation call, advanced by the operator's
//! interactive page (via a single-use token) and by the settlement pipeline
//! (via status updates), and queryable under three distinct identifiers.
//!
//! State machine:
//!
//! ```text
//! incomplete ──complete-interactive──► pending_user_transfer_start (deposit)
//!            └─complete-interactive──► pending_anchor              (withdrawal)
//! any ──update_status(s)──► s          (terminal: completed | error | refunded)
//! ```

pub mod engine;
pub mod store;

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub use engine::TransferEngine;
pub use store::{
    ConsumeTokenError, InMemoryTransferStore, StoreError, TransferFilter, TransferStore,
    TransferUpdate,
};

/// Interactive-token lifetime: 15 minutes.
pub const INTERACTIVE_TOKEN_TTL_MINS: i64 = 15;

/// Direction of a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TransferKind {
    Deposit,
    Withdrawal,
}

impl std::fmt::Display for TransferKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransferKind::Deposit => f.write_str("deposit"),
            TransferKind::Withdrawal => f.write_str("withdrawal"),
        }
    }
}

/// How the transfer was initiated: hosted interactive flow (SEP-24) or
/// programmatic (SEP-6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TransferMode {
    Interactive,
    Programmatic,
}

/// Transfer status as exposed on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TransferStatus {
    Incomplete,
    PendingUserTransferStart,
    PendingAnchor,
    PendingExternal,
    PendingUser,
    Completed,
    Error,
    Refunded,
}

impl TransferStatus {
    /// Terminal statuses set `completed_at` and end the lifecycle.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransferStatus::Completed | TransferStatus::Error | TransferStatus::Refunded
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransferStatus::Incomplete => "incomplete",
            TransferStatus::PendingUserTransferStart => "pending_user_transfer_start",
            TransferStatus::PendingAnchor => "pending_anchor",
            TransferStatus::PendingExternal => "pending_external",
            TransferStatus::PendingUser => "pending_user",
            TransferStatus::Completed => "completed",
            TransferStatus::Error => "error",
            TransferStatus::Refunded => "refunded",
        }
    }
}

/// Single-use token binding the operator's interactive page to a transfer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct InteractiveToken {
    /// Opaque random value (32 octets, hex-encoded).
    pub value: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub consumed: bool,
}

impl InteractiveToken {
    pub fn new(value: String) -> Self {
        let now = Utc::now();
        Self {
            value,
            created_at: now,
            expires_at: now + Duration::minutes(INTERACTIVE_TOKEN_TTL_MINS),
            consumed: false,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// A deposit or withdrawal record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Transfer {
    /// 16 random octets, hex-encoded (32 characters).
    pub id: String,
    pub kind: TransferKind,
    pub mode: TransferMode,
    pub status: TransferStatus,
    pub asset_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset_issuer: Option<String>,
    /// Owning account: the subject of the bearer token that created it.
    pub account: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dest: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dest_extra: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memo_type: Option<String>,
    /// Present iff the transfer is interactive.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interactive: Option<InteractiveToken>,
    /// Operator interactive page URL with `transaction_id` and `token`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interactive_url: Option<String>,
    /// Human-readable status page for this transfer.
    pub more_info_url: String,
    /// Settlement transaction hash, reported by the external pipeline.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stellar_transaction_id: Option<String>,
    /// Off-chain settlement reference, reported by the external pipeline.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_transaction_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl Transfer {
    /// Status the transfer moves to when its interactive flow completes.
    /// `None` means completion is a no-op for the status (the token is
    /// still consumed).
    pub fn next_status_on_complete(&self) -> Option<TransferStatus> {
        match (self.status, self.kind) {
            (TransferStatus::Incomplete, TransferKind::Deposit) => {
                Some(TransferStatus::PendingUserTransferStart)
            }
            (TransferStatus::Incomplete, TransferKind::Withdrawal) => {
                Some(TransferStatus::PendingAnchor)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transfer(kind: TransferKind, status: TransferStatus) -> Transfer {
        let now = Utc::now();
        Transfer {
            id: "ab".repeat(16),
            kind,
            mode: TransferMode::Interactive,
            status,
            asset_code: "USDC".to_string(),
            asset_issuer: None,
            account: "G...".to_string(),
            amount: None,
            dest: None,
            dest_extra: None,
            memo: None,
            memo_type: None,
            interactive: None,
            interactive_url: None,
            more_info_url: String::new(),
            stellar_transaction_id: None,
            external_transaction_id: None,
            message: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
            metadata: BTreeMap::new(),
        }
    }

    #[test]
    fn terminal_set_is_exactly_three_states() {
        assert!(TransferStatus::Completed.is_terminal());
        assert!(TransferStatus::Error.is_terminal());
        assert!(TransferStatus::Refunded.is_terminal());
        assert!(!TransferStatus::Incomplete.is_terminal());
        assert!(!TransferStatus::PendingAnchor.is_terminal());
        assert!(!TransferStatus::PendingUserTransferStart.is_terminal());
    }

    #[test]
    fn statuses_serialize_snake_case() {
        let json = serde_json::to_string(&TransferStatus::PendingUserTransferStart).unwrap();
        assert_eq!(json, r#""pending_user_transfer_start""#);
        assert_eq!(
            serde_json::to_string(&TransferStatus::Incomplete).unwrap(),
            r#""incomplete""#
        );
    }

    #[test]
    fn interactive_completion_advances_incomplete_only() {
        let deposit = transfer(TransferKind::Deposit, TransferStatus::Incomplete);
        assert_eq!(
            deposit.next_status_on_complete(),
            Some(TransferStatus::PendingUserTransferStart)
        );

        let withdrawal = transfer(TransferKind::Withdrawal, TransferStatus::Incomplete);
        assert_eq!(
            withdrawal.next_status_on_complete(),
            Some(TransferStatus::PendingAnchor)
        );

        let advanced = transfer(TransferKind::Deposit, TransferStatus::PendingAnchor);
        assert_eq!(advanced.next_status_on_complete(), None);

        let done = transfer(TransferKind::Withdrawal, TransferStatus::Completed);
        assert_eq!(done.next_status_on_complete(), None);
    }

    #[test]
    fn interactive_token_expiry() {
        let token = InteractiveToken::new("t".repeat(64));
        assert!(!token.consumed);
        assert!(!token.is_expired(Utc::now()));
        assert!(token.is_expired(Utc::now() + Duration::minutes(INTERACTIVE_TOKEN_TTL_MINS + 1)));
    }
}
