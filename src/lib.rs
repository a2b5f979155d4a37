// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 The stellar-anchor developers

//! # stellar-anchor
//!
//! An anchor service for the Stellar payment network: an HTTP server that
//! lets wallet clients discover the operator's capabilities (SEP-1), prove
//! control of a Stellar account via a signed-transaction challenge
//! (SEP-10), and initiate and track deposits and withdrawals interactively
//! (SEP-24) or programmatically (SEP-6).
//!
//! ## Modules
//!
//! - `api` - HTTP routers per SEP group (Axum)
//! - `auth` - Challenge issuing, nonce registry, bearer tokens
//! - `config` - Startup-validated anchor configuration
//! - `discovery` - Cached `stellar.toml` rendering
//! - `hooks` - Operator hook interfaces (KYC page, custody backend)
//! - `stellar` - StrKey, challenge XDR codec, Horizon lookup
//! - `transfers` - Transfer model, storage port, lifecycle engine
//!
//! ## Embedding
//!
//! ```rust,ignore
//! let state = AppState::new(config)?
//!     .mount_sep10()
//!     .mount_sep24(Sep24Mount::new("https://kyc.example.com/flow")?)
//!     .mount_sep6(Sep6Mount::default());
//! let app = api::router(state.clone());
//! let sweeper = state.start_sweeper();
//! // serve app, then: sweeper.shutdown()
//! ```

pub mod api;
pub mod auth;
pub mod config;
pub mod discovery;
pub mod error;
pub mod hooks;
pub mod state;
pub mod stellar;
pub mod transfers;

pub use config::AnchorConfig;
pub use error::ApiError;
pub use state::{AppState, Sep24Mount, Sep6Mount};
