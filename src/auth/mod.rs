// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 The stellar-anchor developers

//! # Web Authentication (SEP-10)
//!
//! Challenge-response authentication for Stellar accounts:
//!
//! 1. The client asks for a challenge transaction for its account.
//! 2. The anchor builds and signs the challenge, registering the embedded
//!    nonce for replay protection.
//! 3. The client co-signs the challenge and posts it back.
//! 4. The anchor verifies the structure, the signer weights against the
//!    on-chain account, consumes the nonce, and mints a bearer token.
//!
//! The bearer token is an HS256 JWT carried in `Authorization: Bearer` and
//! checked by the [`extractor::Auth`] guard on transfer endpoints.

pub mod extractor;
pub mod jwt;
pub mod nonce;
pub mod service;

pub use extractor::{Auth, Subject};
pub use jwt::Claims;
pub use nonce::{NonceRegistry, SweeperHandle};
pub use service::{AuthService, ChallengeResponse, TokenResponse};
