// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 The stellar-anchor developers

//! Challenge-nonce registry.
//!
//! Each issued challenge embeds a random nonce; verification requires the
//! nonce to be known and unconsumed, which makes a signed challenge a
//! single-use credential. Entries expire after five minutes and a
//! background sweeper drops expired ones so the map stays bounded by
//! traffic × TTL.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::debug;

/// Nonce time-to-live: challenges are valid for five minutes.
pub const NONCE_TTL: Duration = Duration::from_secs(300);

struct NonceEntry {
    inserted_at: Instant,
    consumed: bool,
}

/// Outcome of a consume attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumeOutcome {
    Consumed,
    Missing,
    Expired,
    AlreadyUsed,
}

/// Replay-protection registry mapping nonce values to their insertion time
/// and consumption state. All operations serialize on one internal lock.
pub struct NonceRegistry {
    entries: Mutex<HashMap<String, NonceEntry>>,
    ttl: Duration,
}

impl Default for NonceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl NonceRegistry {
    pub fn new() -> Self {
        Self::with_ttl(NONCE_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Register a fresh nonce. Returns `false` if the value is already
    /// present; duplicates are never overwritten.
    pub async fn add(&self, nonce: &str) -> bool {
        let mut entries = self.entries.lock().await;
        if entries.contains_key(nonce) {
            return false;
        }
        entries.insert(
            nonce.to_string(),
            NonceEntry {
                inserted_at: Instant::now(),
                consumed: false,
            },
        );
        true
    }

    /// Whether a nonce is currently registered (consumed or not).
    pub async fn has(&self, nonce: &str) -> bool {
        self.entries.lock().await.contains_key(nonce)
    }

    /// Atomically consume a nonce. Succeeds at most once per value.
    pub async fn consume(&self, nonce: &str) -> ConsumeOutcome {
        let mut entries = self.entries.lock().await;
        match entries.get_mut(nonce) {
            None => ConsumeOutcome::Missing,
            Some(entry) if entry.consumed => ConsumeOutcome::AlreadyUsed,
            Some(entry) if entry.inserted_at.elapsed() > self.ttl => ConsumeOutcome::Expired,
            Some(entry) => {
                entry.consumed = true;
                ConsumeOutcome::Consumed
            }
        }
    }

    /// Drop entries older than the TTL.
    pub async fn sweep(&self) {
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.inserted_at.elapsed() <= self.ttl);
        let dropped = before - entries.len();
        if dropped > 0 {
            debug!(dropped, remaining = entries.len(), "swept expired nonces");
        }
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }
}

/// Handle to the background sweeper task. Dropping the handle does not stop
/// the task; call [`SweeperHandle::shutdown`] during server teardown.
pub struct SweeperHandle {
    handle: JoinHandle<()>,
}

impl SweeperHandle {
    /// Spawn a sweeper waking once per TTL interval.
    pub fn spawn(registry: Arc<NonceRegistry>) -> Self {
        let period = registry.ttl().max(Duration::from_secs(1));
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // The first tick fires immediately; skip it.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                registry.sweep().await;
            }
        });
        Self { handle }
    }

    /// Stop the sweeper.
    pub fn shutdown(self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn add_rejects_duplicates() {
        let registry = NonceRegistry::new();
        assert!(registry.add("n1").await);
        assert!(!registry.add("n1").await);
        assert!(registry.has("n1").await);
    }

    #[tokio::test]
    async fn consume_succeeds_exactly_once() {
        let registry = NonceRegistry::new();
        registry.add("n1").await;

        assert_eq!(registry.consume("n1").await, ConsumeOutcome::Consumed);
        assert_eq!(registry.consume("n1").await, ConsumeOutcome::AlreadyUsed);
        assert_eq!(registry.consume("n2").await, ConsumeOutcome::Missing);
    }

    #[tokio::test]
    async fn expired_nonce_cannot_be_consumed() {
        let registry = NonceRegistry::with_ttl(Duration::ZERO);
        registry.add("n1").await;
        assert_eq!(registry.consume("n1").await, ConsumeOutcome::Expired);
    }

    #[tokio::test]
    async fn sweep_drops_expired_entries_only() {
        let registry = NonceRegistry::with_ttl(Duration::ZERO);
        registry.add("old").await;
        registry.sweep().await;
        assert_eq!(registry.len().await, 0);

        let registry = NonceRegistry::new();
        registry.add("fresh").await;
        registry.sweep().await;
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn sweeper_task_can_be_shut_down() {
        let registry = Arc::new(NonceRegistry::new());
        let sweeper = SweeperHandle::spawn(registry.clone());
        sweeper.shutdown();
    }
}
