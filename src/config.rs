// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 The stellar-anchor developers

//! # Anchor Configuration
//!
//! Startup-validated configuration for the anchor service. The process must
//! not begin accepting requests until [`AnchorConfig::validate`] has passed:
//! `main` loads the config from the environment, validates it, and only then
//! binds the listener.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `ANCHOR_DOMAIN` | Public domain the service is reachable at | required |
//! | `ANCHOR_SIGNING_SEED` | Stellar secret seed (`S...`) for SEP-10 signing | required |
//! | `ANCHOR_JWT_SECRET` | HMAC secret for bearer tokens (≥ 32 octets) | required |
//! | `STELLAR_NETWORK` | `public`/`mainnet`/`testnet`/`futurenet`/`standalone` | `testnet` |
//! | `HORIZON_URL` | Horizon base URL override | per network |
//! | `ANCHOR_ASSETS` | JSON map of asset code → asset configuration | required |
//! | `HOST`, `PORT` | Bind address | `127.0.0.1:8000` |

use std::collections::BTreeMap;
use std::env;
use std::str::FromStr;

use ed25519_dalek::SigningKey;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::stellar::strkey;

/// Minimum JWT secret length in octets.
const MIN_JWT_SECRET_LEN: usize = 32;

/// Configuration errors raised at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("domain must not be empty")]
    EmptyDomain,

    #[error("signing seed is not a valid Stellar secret")]
    InvalidSigningSeed,

    #[error("JWT secret must be at least {MIN_JWT_SECRET_LEN} octets, got {0}")]
    JwtSecretTooShort(usize),

    #[error("unknown Stellar network '{0}'")]
    UnknownNetwork(String),

    #[error("at least one asset must be configured")]
    NoAssets,

    #[error("sep24 interactive URL must not be empty")]
    EmptyInteractiveUrl,

    #[error("missing environment variable {0}")]
    MissingEnv(&'static str),

    #[error("failed to parse {0}: {1}")]
    Parse(&'static str, String),
}

/// Stellar network selection. `public` and `mainnet` both select the
/// production network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    #[serde(alias = "mainnet")]
    Public,
    Testnet,
    Futurenet,
    Standalone,
}

impl Network {
    pub fn passphrase(&self) -> &'static str {
        match self {
            Network::Public => "Public Global Stellar Network ; September 2015",
            Network::Testnet => "Test SDF Network ; September 2015",
            Network::Futurenet => "Test SDF Future Network ; October 2022",
            Network::Standalone => "Standalone Network ; February 2017",
        }
    }

    pub fn default_horizon_url(&self) -> &'static str {
        match self {
            Network::Public => "https://horizon.stellar.org",
            Network::Testnet => "https://horizon-testnet.stellar.org",
            Network::Futurenet => "https://horizon-futurenet.stellar.org",
            Network::Standalone => "http://localhost:8000",
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Network::Public)
    }
}

impl FromStr for Network {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "public" | "mainnet" => Ok(Network::Public),
            "testnet" => Ok(Network::Testnet),
            "futurenet" => Ok(Network::Futurenet),
            "standalone" => Ok(Network::Standalone),
            other => Err(ConfigError::UnknownNetwork(other.to_string())),
        }
    }
}

/// Lifecycle status of a configured asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetStatus {
    Live,
    Test,
    Dead,
    Private,
}

/// One entry of a required-field catalogue for deposit or withdraw.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FieldSpec {
    pub description: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub optional: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub choices: Option<Vec<String>>,
}

/// Per-operation (deposit or withdraw) profile of an asset.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OperationConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fee_fixed: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fee_percent: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<BTreeMap<String, FieldSpec>>,
}

/// Capability record for one supported asset, keyed by asset code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desc: Option<String>,
    #[serde(default = "default_display_decimals")]
    pub display_decimals: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<AssetStatus>,
    #[serde(default)]
    pub deposit: OperationConfig,
    #[serde(default)]
    pub withdraw: OperationConfig,
}

fn default_display_decimals() -> u32 {
    7
}

/// Optional documentation block for the discovery document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentationConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org_logo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org_physical_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org_official_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org_support_email: Option<String>,
}

/// Top-level anchor configuration.
#[derive(Debug, Clone)]
pub struct AnchorConfig {
    /// Public domain (no scheme), e.g. `anchor.example.com`.
    pub domain: String,
    /// Stellar secret seed used to sign challenges.
    pub signing_seed: String,
    /// HMAC secret for bearer tokens.
    pub jwt_secret: String,
    pub network: Network,
    /// Horizon base URL; defaults per network.
    pub horizon_url: String,
    /// Supported assets, keyed by case-sensitive asset code.
    pub assets: BTreeMap<String, AssetConfig>,
    /// Optional documentation block for the discovery document.
    pub documentation: Option<DocumentationConfig>,
}

impl AnchorConfig {
    /// Load from the environment. `dotenvy` has already been applied by the
    /// caller, so plain `std::env` reads suffice.
    pub fn from_env() -> Result<Self, ConfigError> {
        let domain =
            env::var("ANCHOR_DOMAIN").map_err(|_| ConfigError::MissingEnv("ANCHOR_DOMAIN"))?;
        let signing_seed = env::var("ANCHOR_SIGNING_SEED")
            .map_err(|_| ConfigError::MissingEnv("ANCHOR_SIGNING_SEED"))?;
        let jwt_secret = env::var("ANCHOR_JWT_SECRET")
            .map_err(|_| ConfigError::MissingEnv("ANCHOR_JWT_SECRET"))?;

        let network = env::var("STELLAR_NETWORK")
            .unwrap_or_else(|_| "testnet".to_string())
            .parse::<Network>()?;

        let horizon_url = env::var("HORIZON_URL")
            .unwrap_or_else(|_| network.default_horizon_url().to_string());

        let assets_json =
            env::var("ANCHOR_ASSETS").map_err(|_| ConfigError::MissingEnv("ANCHOR_ASSETS"))?;
        let assets: BTreeMap<String, AssetConfig> = serde_json::from_str(&assets_json)
            .map_err(|e| ConfigError::Parse("ANCHOR_ASSETS", e.to_string()))?;

        let documentation = match env::var("ANCHOR_DOCUMENTATION") {
            Ok(json) => Some(
                serde_json::from_str(&json)
                    .map_err(|e| ConfigError::Parse("ANCHOR_DOCUMENTATION", e.to_string()))?,
            ),
            Err(_) => None,
        };

        let config = Self {
            domain,
            signing_seed,
            jwt_secret,
            network,
            horizon_url,
            assets,
            documentation,
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration. Must pass before the listener binds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.domain.trim().is_empty() {
            return Err(ConfigError::EmptyDomain);
        }
        if strkey::decode_seed(&self.signing_seed).is_err() {
            return Err(ConfigError::InvalidSigningSeed);
        }
        if self.jwt_secret.len() < MIN_JWT_SECRET_LEN {
            return Err(ConfigError::JwtSecretTooShort(self.jwt_secret.len()));
        }
        if self.assets.is_empty() {
            return Err(ConfigError::NoAssets);
        }
        Ok(())
    }

    pub fn passphrase(&self) -> &'static str {
        self.network.passphrase()
    }

    /// Base URL for endpoints on this anchor. Hostnames beginning with
    /// `localhost` or `127.0.0.1` get plain HTTP, everything else HTTPS.
    pub fn base_url(&self) -> String {
        let scheme = if self.domain.starts_with("localhost") || self.domain.starts_with("127.0.0.1")
        {
            "http"
        } else {
            "https"
        };
        format!("{scheme}://{}", self.domain)
    }

    /// The challenge-signing key, decoded from the configured seed.
    ///
    /// Callers run after `validate()`, so the seed is known to be
    /// well-formed here.
    pub fn signing_key(&self) -> SigningKey {
        let seed = strkey::decode_seed(&self.signing_seed)
            .expect("signing seed validated at startup");
        SigningKey::from_bytes(&seed)
    }

    /// The anchor's public signing account (`G...`).
    pub fn signing_account(&self) -> String {
        strkey::encode_account_id(&self.signing_key().verifying_key().to_bytes())
    }

    /// Look up an asset by code, case-insensitively. Returns the configured
    /// (case-sensitive) code alongside the record.
    pub fn asset(&self, code: &str) -> Option<(&str, &AssetConfig)> {
        self.assets
            .iter()
            .find(|(configured, _)| configured.eq_ignore_ascii_case(code))
            .map(|(configured, asset)| (configured.as_str(), asset))
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Seed of an arbitrary fixed test keypair (strkey for `[11u8; 32]`).
    pub fn test_seed() -> String {
        strkey::encode_seed(&[11u8; 32])
    }

    /// A valid testnet config with one USDC asset, deposit and withdraw
    /// enabled.
    pub fn test_config() -> AnchorConfig {
        let mut assets = BTreeMap::new();
        assets.insert(
            "USDC".to_string(),
            AssetConfig {
                issuer: Some(
                    "GBBD47IF6LWK7P7MDEVSCWR7DPUWV3NY3DTQEVFL4NAT4AQH3ZLLFLA5".to_string(),
                ),
                name: Some("USD Coin".to_string()),
                desc: Some("Test dollar token".to_string()),
                display_decimals: 7,
                status: None,
                deposit: OperationConfig {
                    enabled: true,
                    min_amount: Some(1.0),
                    max_amount: Some(10_000.0),
                    fee_fixed: Some(0.5),
                    fee_percent: Some(1.0),
                    fields: None,
                },
                withdraw: OperationConfig {
                    enabled: true,
                    min_amount: Some(1.0),
                    max_amount: Some(10_000.0),
                    fee_fixed: None,
                    fee_percent: None,
                    fields: None,
                },
            },
        );

        AnchorConfig {
            domain: "anchor.example.com".to_string(),
            signing_seed: test_seed(),
            jwt_secret: "a".repeat(32),
            network: Network::Testnet,
            horizon_url: "https://horizon-testnet.stellar.org".to_string(),
            assets,
            documentation: None,
        }
    }
}
