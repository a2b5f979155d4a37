// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 The stellar-anchor developers

//! Operator hook interfaces.
//!
//! The operator's KYC page and custody backend live outside the core and
//! are reached through these traits. Hooks are untrusted: a hook may return
//! an override of the response fields, nothing at all, or fail — failures
//! are mapped through [`crate::error::ApiError::from_hook_error`], which
//! passes structured errors through verbatim and wraps anything else as a
//! 400 with the message preserved.

use async_trait::async_trait;

use crate::transfers::Transfer;

/// Override for the programmatic deposit response.
#[derive(Debug, Clone, Default)]
pub struct DepositInstructions {
    /// Instructions for delivering the off-chain value.
    pub how: Option<String>,
    /// Estimated seconds to completion.
    pub eta: Option<i64>,
    pub extra_info: Option<serde_json::Value>,
}

/// Override for the programmatic withdrawal response.
#[derive(Debug, Clone, Default)]
pub struct WithdrawInstructions {
    /// Stellar account the user sends the asset to.
    pub account_id: Option<String>,
    pub memo: Option<String>,
    pub memo_type: Option<String>,
    pub eta: Option<i64>,
}

/// Hooks for the interactive (SEP-24) mount.
#[async_trait]
pub trait Sep24Hooks: Send + Sync {
    /// Called after an interactive deposit was created.
    async fn on_deposit(&self, _transfer: &Transfer) -> anyhow::Result<()> {
        Ok(())
    }

    /// Called after an interactive withdrawal was created.
    async fn on_withdraw(&self, _transfer: &Transfer) -> anyhow::Result<()> {
        Ok(())
    }

    /// Called after the operator page completed the interactive flow.
    async fn on_interactive_complete(&self, _transfer: &Transfer) -> anyhow::Result<()> {
        Ok(())
    }

    /// Render the `more_info` status page. `None` selects the built-in
    /// minimal page.
    fn render_more_info(&self, _transfer: &Transfer) -> Option<String> {
        None
    }
}

/// Hooks for the programmatic (SEP-6) mount.
#[async_trait]
pub trait Sep6Hooks: Send + Sync {
    /// Shape the deposit instructions. `None` keeps the defaults.
    async fn on_deposit(&self, _transfer: &Transfer) -> anyhow::Result<Option<DepositInstructions>> {
        Ok(None)
    }

    /// Shape the withdrawal instructions. `None` keeps the defaults.
    async fn on_withdraw(
        &self,
        _transfer: &Transfer,
    ) -> anyhow::Result<Option<WithdrawInstructions>> {
        Ok(None)
    }
}

/// Default no-op hooks.
pub struct NoHooks;

#[async_trait]
impl Sep24Hooks for NoHooks {}

#[async_trait]
impl Sep6Hooks for NoHooks {}
