// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 The stellar-anchor developers

//! Stellar protocol plumbing: strkey codec, XDR encoding of challenge
//! transactions, and the Horizon account lookup used during SEP-10
//! verification.

pub mod challenge;
pub mod horizon;
pub mod strkey;
pub mod xdr;

use thiserror::Error;

/// Errors produced by the Stellar layer.
#[derive(Debug, Error)]
pub enum StellarError {
    #[error("invalid Stellar address: {0}")]
    InvalidAddress(String),

    #[error("invalid Stellar secret seed")]
    InvalidSeed,

    #[error("malformed transaction envelope: {0}")]
    MalformedEnvelope(String),

    #[error("Horizon request failed: {0}")]
    Horizon(String),

    #[error("Horizon request timed out")]
    HorizonTimeout,
}

pub type Result<T> = std::result::Result<T, StellarError>;
