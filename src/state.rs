// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 The stellar-anchor developers

//! # Application State
//!
//! Shared state passed to all request handlers via Axum's `State`
//! extractor. Collaborators (nonce registry, transfer store, auth issuer,
//! discovery publisher) are constructor-injected and `Arc`-shared, so the
//! state clones cheaply per request.
//!
//! SEP mounts are configured at build time with the `mount_*` builder
//! methods; each mount also flips the corresponding flag in the discovery
//! publisher, which invalidates its cached document.

use std::sync::Arc;

use crate::auth::{AuthService, NonceRegistry, SweeperHandle};
use crate::config::{AnchorConfig, ConfigError};
use crate::discovery::DiscoveryPublisher;
use crate::hooks::{NoHooks, Sep24Hooks, Sep6Hooks};
use crate::stellar::horizon::HorizonClient;
use crate::transfers::{InMemoryTransferStore, TransferEngine, TransferStore};

/// Configuration of the interactive (SEP-24) mount.
pub struct Sep24Mount {
    /// Base URL of the operator's interactive page. Required, non-empty.
    pub interactive_url: String,
    pub hooks: Arc<dyn Sep24Hooks>,
}

impl Sep24Mount {
    pub fn new(interactive_url: impl Into<String>) -> Result<Self, ConfigError> {
        let interactive_url = interactive_url.into();
        if interactive_url.trim().is_empty() {
            return Err(ConfigError::EmptyInteractiveUrl);
        }
        Ok(Self {
            interactive_url,
            hooks: Arc::new(NoHooks),
        })
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn Sep24Hooks>) -> Self {
        self.hooks = hooks;
        self
    }
}

/// Configuration of the programmatic (SEP-6) mount.
pub struct Sep6Mount {
    pub hooks: Arc<dyn Sep6Hooks>,
}

impl Default for Sep6Mount {
    fn default() -> Self {
        Self {
            hooks: Arc::new(NoHooks),
        }
    }
}

impl Sep6Mount {
    pub fn with_hooks(mut self, hooks: Arc<dyn Sep6Hooks>) -> Self {
        self.hooks = hooks;
        self
    }
}

/// Shared application state for all request handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AnchorConfig>,
    pub auth: Arc<AuthService>,
    pub engine: Arc<TransferEngine>,
    pub nonces: Arc<NonceRegistry>,
    pub discovery: Arc<DiscoveryPublisher>,
    pub sep24: Option<Arc<Sep24Mount>>,
    pub sep6: Option<Arc<Sep6Mount>>,
}

impl AppState {
    /// Build state with the default in-memory transfer store. The
    /// configuration is validated here; a failure means the process must
    /// not start serving.
    pub fn new(config: AnchorConfig) -> Result<Self, ConfigError> {
        Self::with_store(config, Arc::new(InMemoryTransferStore::new()))
    }

    /// Build state over a custom transfer store (a persistent backend in
    /// production deployments).
    pub fn with_store(
        config: AnchorConfig,
        store: Arc<dyn TransferStore>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let config = Arc::new(config);

        let nonces = Arc::new(NonceRegistry::new());
        let horizon = Arc::new(HorizonClient::new(config.horizon_url.clone()));
        let auth = Arc::new(AuthService::new(config.clone(), nonces.clone(), horizon));
        let engine = Arc::new(TransferEngine::new(config.clone(), store));
        let discovery = Arc::new(DiscoveryPublisher::new(config.clone()));

        Ok(Self {
            config,
            auth,
            engine,
            nonces,
            discovery,
            sep24: None,
            sep6: None,
        })
    }

    /// Replace the chain lookup used during challenge verification
    /// (an alternate Horizon instance, or a stub in tests).
    pub fn with_account_lookup(
        mut self,
        lookup: Arc<dyn crate::auth::service::AccountLookup>,
    ) -> Self {
        self.auth = Arc::new(AuthService::new(
            self.config.clone(),
            self.nonces.clone(),
            lookup,
        ));
        self
    }

    /// Mount the SEP-10 authentication module.
    pub fn mount_sep10(self) -> Self {
        self.discovery.set_mounts(|m| m.sep10 = true);
        self
    }

    /// Mount the SEP-24 interactive transfer module.
    pub fn mount_sep24(self, mount: Sep24Mount) -> Self {
        self.discovery.set_mounts(|m| m.sep24 = true);
        Self {
            sep24: Some(Arc::new(mount)),
            ..self
        }
    }

    /// Mount the SEP-6 programmatic transfer module.
    pub fn mount_sep6(self, mount: Sep6Mount) -> Self {
        self.discovery.set_mounts(|m| m.sep6 = true);
        Self {
            sep6: Some(Arc::new(mount)),
            ..self
        }
    }

    /// Start the nonce sweeper. The returned handle stops it on shutdown.
    pub fn start_sweeper(&self) -> SweeperHandle {
        SweeperHandle::spawn(self.nonces.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_support::test_config;

    #[test]
    fn state_can_be_cloned() {
        let state = AppState::new(test_config()).unwrap();
        let _cloned = state.clone();
    }

    #[test]
    fn invalid_config_is_rejected_at_construction() {
        let mut config = test_config();
        config.jwt_secret = "short".to_string();
        assert!(AppState::new(config).is_err());
    }

    #[test]
    fn mounts_update_discovery_flags() {
        let state = AppState::new(test_config()).unwrap();
        assert!(!state.discovery.mounts().sep10);

        let state = state
            .mount_sep10()
            .mount_sep24(Sep24Mount::new("https://kyc.example.com/flow").unwrap())
            .mount_sep6(Sep6Mount::default());

        let mounts = state.discovery.mounts();
        assert!(mounts.sep10 && mounts.sep24 && mounts.sep6);
        assert!(state.sep24.is_some());
        assert!(state.sep6.is_some());
    }

    #[test]
    fn sep24_mount_requires_interactive_url() {
        assert!(Sep24Mount::new("").is_err());
        assert!(Sep24Mount::new("   ").is_err());
        assert!(Sep24Mount::new("https://kyc.example.com").is_ok());
    }
}
