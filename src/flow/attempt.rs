//! Login attempt storage
//!
//! A [`LoginAttempt`] is the transient per-request state of one
//! authorization-code round trip: anti-forgery `state`, `nonce`, the
//! already-validated `next` target, and a TTL. Attempts are keyed by
//! `state` and single-use: [`AttemptStore::take`] atomically removes the
//! entry it returns, so a replayed callback finds nothing.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::redirect::SafeUri;

/// Transient state of one authorization-code round trip
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginAttempt {
	/// Provider this attempt was initiated against
	pub provider_name: String,

	/// Anti-forgery token, the storage key
	pub state: String,

	/// Replay-prevention nonce the ID token must echo
	pub nonce: String,

	/// Validated `next` target, if the client supplied an acceptable one
	pub requested_redirect: Option<SafeUri>,

	/// Creation time
	pub created_at: DateTime<Utc>,

	/// Expiration time
	pub expires_at: DateTime<Utc>,
}

impl LoginAttempt {
	pub fn new(
		provider_name: impl Into<String>,
		state: impl Into<String>,
		nonce: impl Into<String>,
		requested_redirect: Option<SafeUri>,
		ttl: chrono::Duration,
	) -> Self {
		let now = Utc::now();
		Self {
			provider_name: provider_name.into(),
			state: state.into(),
			nonce: nonce.into(),
			requested_redirect,
			created_at: now,
			expires_at: now + ttl,
		}
	}

	pub fn is_expired(&self) -> bool {
		Utc::now() > self.expires_at
	}
}

/// Result of consuming an attempt by callback `state`
#[derive(Debug, Clone)]
pub enum TakenAttempt {
	/// Live attempt; it has been removed from the store
	Found(LoginAttempt),
	/// An attempt existed but outlived its TTL; it has been removed
	Expired,
	/// No attempt stored under this `state`
	Missing,
}

/// Attempt store capability
#[async_trait]
pub trait AttemptStore: Send + Sync {
	/// Store a pending attempt under its `state`
	async fn store(&self, attempt: LoginAttempt);

	/// Atomically remove and return the attempt stored under `state`
	async fn take(&self, state: &str) -> TakenAttempt;
}

/// In-memory attempt store for development and testing
///
/// Not suitable for multi-instance deployments; production setups plug
/// in a distributed backend behind the same trait.
#[derive(Debug, Default)]
pub struct InMemoryAttemptStore {
	attempts: RwLock<HashMap<String, LoginAttempt>>,
}

impl InMemoryAttemptStore {
	pub fn new() -> Self {
		Self::default()
	}

	/// Drop expired entries; called opportunistically on writes
	async fn sweep_expired(&self) {
		let mut attempts = self.attempts.write().await;
		attempts.retain(|_, attempt| !attempt.is_expired());
	}

	#[cfg(test)]
	pub async fn len(&self) -> usize {
		self.attempts.read().await.len()
	}
}

#[async_trait]
impl AttemptStore for InMemoryAttemptStore {
	async fn store(&self, attempt: LoginAttempt) {
		self.sweep_expired().await;

		let mut attempts = self.attempts.write().await;
		attempts.insert(attempt.state.clone(), attempt);
	}

	async fn take(&self, state: &str) -> TakenAttempt {
		let mut attempts = self.attempts.write().await;
		match attempts.remove(state) {
			Some(attempt) if attempt.is_expired() => TakenAttempt::Expired,
			Some(attempt) => TakenAttempt::Found(attempt),
			None => TakenAttempt::Missing,
		}
	}
}
