// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 The stellar-anchor developers

//! Challenge issuing and verification.

use std::sync::Arc;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::Utc;
use ed25519_dalek::SigningKey;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::Serialize;
use tracing::{info, warn};
use utoipa::ToSchema;

use crate::config::AnchorConfig;
use crate::error::ApiError;
use crate::stellar::challenge::{ChallengeEnvelope, ChallengeTransaction};
use crate::stellar::horizon::{AccountRecord, HorizonClient};
use crate::stellar::{strkey, StellarError};

use super::jwt;
use super::nonce::{ConsumeOutcome, NonceRegistry};

/// Size of the random nonce embedded in a challenge, before base64.
const NONCE_LEN: usize = 48;

/// Seam over the Horizon account lookup so verification is testable
/// without a network.
#[async_trait]
pub trait AccountLookup: Send + Sync {
    async fn account(&self, address: &str) -> crate::stellar::Result<AccountRecord>;
}

#[async_trait]
impl AccountLookup for HorizonClient {
    async fn account(&self, address: &str) -> crate::stellar::Result<AccountRecord> {
        HorizonClient::account(self, address).await
    }
}

/// Response to a challenge request.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ChallengeResponse {
    /// Base64 XDR transaction envelope for the client to sign.
    pub transaction: String,
    /// Passphrase of the network the challenge is bound to.
    pub network_passphrase: String,
}

/// Response to a successful verification.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TokenResponse {
    /// Bearer token for subsequent requests.
    pub token: String,
}

/// SEP-10 issuer: builds challenges and turns signed challenges into
/// bearer tokens.
pub struct AuthService {
    config: Arc<AnchorConfig>,
    nonces: Arc<NonceRegistry>,
    lookup: Arc<dyn AccountLookup>,
    signing_key: SigningKey,
    signing_account: [u8; 32],
}

impl AuthService {
    pub fn new(
        config: Arc<AnchorConfig>,
        nonces: Arc<NonceRegistry>,
        lookup: Arc<dyn AccountLookup>,
    ) -> Self {
        let signing_key = config.signing_key();
        let signing_account = signing_key.verifying_key().to_bytes();
        Self {
            config,
            nonces,
            lookup,
            signing_key,
            signing_account,
        }
    }

    /// Build and sign a challenge for `account`, registering its nonce.
    pub async fn create_challenge(&self, account: &str) -> Result<ChallengeResponse, ApiError> {
        let client_account = strkey::decode_account_id(account)
            .map_err(|_| ApiError::bad_request(format!("invalid Stellar account '{account}'")))?;

        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = BASE64.encode(nonce_bytes);

        let now = Utc::now().timestamp() as u64;
        let tx = ChallengeTransaction::build(
            self.signing_account,
            client_account,
            &self.config.domain,
            &self.config.domain,
            nonce.as_bytes(),
            now,
        );
        let envelope = tx.into_envelope(&self.signing_key, self.config.passphrase());

        if !self.nonces.add(&nonce).await {
            // 48 random octets colliding means the RNG is broken.
            return Err(ApiError::internal("nonce collision"));
        }

        info!(account, "issued auth challenge");
        Ok(ChallengeResponse {
            transaction: envelope.to_base64(),
            network_passphrase: self.config.passphrase().to_string(),
        })
    }

    /// Verify a signed challenge envelope. On success returns the
    /// authenticated account and a bearer token.
    pub async fn verify_challenge(
        &self,
        envelope_b64: &str,
    ) -> Result<(String, TokenResponse), ApiError> {
        let envelope = ChallengeEnvelope::from_base64(envelope_b64)
            .map_err(|e| ApiError::invalid_challenge(e.to_string()))?;

        let (client_account, nonce) = self.check_structure(&envelope)?;

        let record = match self.lookup.account(&client_account).await {
            Ok(record) => record,
            Err(StellarError::HorizonTimeout) => {
                warn!(account = %client_account, "account lookup timed out");
                return Err(ApiError::invalid_challenge(
                    "account lookup timed out, request a new challenge and retry",
                )
                .with_detail("retryable", true));
            }
            Err(e) => {
                warn!(account = %client_account, error = %e, "account lookup failed");
                return Err(ApiError::internal("account lookup failed"));
            }
        };

        self.check_signatures(&envelope, &record)?;

        match self.nonces.consume(&nonce).await {
            ConsumeOutcome::Consumed => {}
            ConsumeOutcome::Missing => {
                return Err(ApiError::invalid_challenge("unknown challenge nonce"))
            }
            ConsumeOutcome::Expired => {
                return Err(
                    ApiError::invalid_challenge("challenge nonce has expired")
                        .with_detail("retryable", true),
                )
            }
            ConsumeOutcome::AlreadyUsed => {
                return Err(ApiError::invalid_challenge("challenge has already been used"))
            }
        }

        let token = jwt::mint(&self.config.jwt_secret, &self.config.domain, &client_account);
        info!(account = %client_account, "authentication succeeded");
        Ok((client_account, TokenResponse { token }))
    }

    /// Structural checks: the envelope must be exactly the challenge this
    /// anchor issues, inside its validity window, carrying the anchor's
    /// signature. Returns the client account and the nonce string.
    fn check_structure(&self, envelope: &ChallengeEnvelope) -> Result<(String, String), ApiError> {
        let tx = &envelope.tx;

        if tx.source != self.signing_account {
            return Err(ApiError::invalid_challenge(
                "challenge source is not the anchor signing account",
            ));
        }
        if tx.sequence != 0 {
            return Err(ApiError::invalid_challenge(
                "challenge sequence number must be zero",
            ));
        }

        let now = Utc::now().timestamp() as u64;
        if now < tx.min_time || now > tx.max_time {
            return Err(ApiError::invalid_challenge("challenge has expired"));
        }

        let first = tx
            .operations
            .first()
            .ok_or_else(|| ApiError::invalid_challenge("challenge has no operations"))?;

        let expected_name = format!("{} auth", self.config.domain);
        if first.name != expected_name {
            return Err(ApiError::invalid_challenge(format!(
                "first operation must be named '{expected_name}'"
            )));
        }
        let client_bytes = first.source.ok_or_else(|| {
            ApiError::invalid_challenge("first operation carries no source account")
        })?;
        let nonce_bytes = first
            .value
            .as_ref()
            .ok_or_else(|| ApiError::invalid_challenge("challenge carries no nonce"))?;
        let nonce = String::from_utf8(nonce_bytes.clone())
            .map_err(|_| ApiError::invalid_challenge("challenge nonce is not UTF-8"))?;

        let auth_domain = tx
            .operations
            .iter()
            .find(|op| op.name == "web_auth_domain")
            .ok_or_else(|| ApiError::invalid_challenge("missing web_auth_domain operation"))?;
        if auth_domain.value.as_deref() != Some(self.config.domain.as_bytes()) {
            return Err(ApiError::invalid_challenge(
                "web_auth_domain does not match this anchor",
            ));
        }
        if auth_domain.source != Some(self.signing_account) {
            return Err(ApiError::invalid_challenge(
                "web_auth_domain operation must be sourced by the anchor",
            ));
        }

        if !envelope.signed_by(&self.signing_account, self.config.passphrase()) {
            return Err(ApiError::invalid_challenge(
                "challenge is missing the anchor signature",
            ));
        }

        Ok((strkey::encode_account_id(&client_bytes), nonce))
    }

    /// Weigh the client signatures against the account's signer set and
    /// medium threshold.
    fn check_signatures(
        &self,
        envelope: &ChallengeEnvelope,
        record: &AccountRecord,
    ) -> Result<(), ApiError> {
        let passphrase = self.config.passphrase();

        let mut total_weight: u64 = 0;
        let mut matched = 0usize;

        for signer in &record.signers {
            if signer.signer_type != "ed25519_public_key" {
                continue;
            }
            let Ok(key) = strkey::decode_account_id(&signer.key) else {
                continue;
            };
            if key == self.signing_account {
                // The anchor's own signature never counts toward the client.
                continue;
            }
            if envelope.signed_by(&key, passphrase) {
                matched += 1;
                total_weight += signer.weight as u64;
            }
        }

        if matched == 0 {
            return Err(ApiError::unauthorized(
                "no valid signature from the account's signers",
            ));
        }
        if total_weight < record.thresholds.med_threshold as u64 {
            return Err(ApiError::unauthorized(format!(
                "signature weight {total_weight} below required threshold {}",
                record.thresholds.med_threshold
            )));
        }

        Ok(())
    }
}
