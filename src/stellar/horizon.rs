// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 The stellar-anchor developers

//! Horizon account lookup.
//!
//! Challenge verification needs exactly one thing from the chain: the
//! client account's signer set and medium threshold. Accounts that do not
//! exist on-chain yet are still allowed to authenticate, so a 404 is
//! answered with a synthetic record carrying the master key at weight one
//! and a zero threshold.

use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::{Result, StellarError};

/// Upper bound on the signer/threshold lookup.
const LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);

/// One entry of an account's signer set.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountSigner {
    pub key: String,
    pub weight: u32,
    #[serde(rename = "type", default)]
    pub signer_type: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AccountThresholds {
    #[serde(default)]
    pub low_threshold: u32,
    #[serde(default)]
    pub med_threshold: u32,
    #[serde(default)]
    pub high_threshold: u32,
}

/// The slice of a Horizon account record the auth issuer cares about.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountRecord {
    pub id: String,
    #[serde(default)]
    pub signers: Vec<AccountSigner>,
    #[serde(default)]
    pub thresholds: AccountThresholds,
}

impl AccountRecord {
    /// Record used for accounts unknown to the network: only the master key
    /// can sign, and no threshold has to be met beyond a single signature.
    pub fn unfunded(address: &str) -> Self {
        Self {
            id: address.to_string(),
            signers: vec![AccountSigner {
                key: address.to_string(),
                weight: 1,
                signer_type: "ed25519_public_key".to_string(),
            }],
            thresholds: AccountThresholds::default(),
        }
    }
}

/// Thin Horizon client scoped to the auth issuer's needs.
#[derive(Clone)]
pub struct HorizonClient {
    base_url: String,
    http: Client,
}

impl HorizonClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let http = Client::builder()
            .timeout(LOOKUP_TIMEOUT)
            .build()
            .expect("failed to build HTTP client");

        Self {
            base_url: base_url.into(),
            http,
        }
    }

    /// Fetch the signer set and thresholds for `address`.
    pub async fn account(&self, address: &str) -> Result<AccountRecord> {
        let url = format!("{}/accounts/{}", self.base_url.trim_end_matches('/'), address);
        debug!(account = %address, "looking up account signers");

        let response = self.http.get(&url).send().await.map_err(|e| {
            if e.is_timeout() {
                StellarError::HorizonTimeout
            } else {
                StellarError::Horizon(e.to_string())
            }
        })?;

        match response.status().as_u16() {
            200 => response
                .json::<AccountRecord>()
                .await
                .map_err(|e| StellarError::Horizon(e.to_string())),
            404 => Ok(AccountRecord::unfunded(address)),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(StellarError::Horizon(format!("HTTP {status}: {body}")))
            }
        }
    }
}
