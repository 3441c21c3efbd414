// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod connection;
pub mod identity;
pub mod spotify;

pub use connection::ConnectionService;
pub use identity::{AuthIdentity, PrimarySession, SupabaseAuth};
pub use spotify::{ProviderRequest, SpotifyClient, SpotifyService};

use crate::models::UserId;
use anyhow::Context;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Per-user lock map shared by every operation that reads or writes a
/// user's connection rows.
///
/// Entries exist only while some task holds or waits on the lock.
pub type UserLocks = Arc<DashMap<UserId, Arc<Mutex<()>>>>;

/// Held per-user lock. Dropping it prunes the map entry once no other task
/// holds or waits on the same lock.
pub(crate) struct UserLockGuard {
    guard: Option<OwnedMutexGuard<()>>,
    locks: UserLocks,
    user_id: UserId,
}

impl Drop for UserLockGuard {
    fn drop(&mut self) {
        self.guard.take();
        // The map shard lock is held across the check, so no task can clone
        // the entry between the count and the removal
        self.locks
            .remove_if(&self.user_id, |_, lock| Arc::strong_count(lock) == 1);
    }
}

/// Acquire the lock for `user_id`, creating it if needed.
pub(crate) async fn lock_user(locks: &UserLocks, user_id: &UserId) -> UserLockGuard {
    let lock = locks
        .entry(user_id.clone())
        .or_insert_with(|| Arc::new(Mutex::new(())))
        .clone();

    UserLockGuard {
        guard: Some(lock.lock_owned().await),
        locks: locks.clone(),
        user_id: user_id.clone(),
    }
}

/// Build the HTTP client shared by every outbound call.
pub fn http_client(timeout: Duration) -> anyhow::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .context("failed building HTTP client")
}
