//! Local session layer
//!
//! A session binds an authenticated [`LocalUser`] to the provider that
//! authenticated them. The store is a capability: production deployments
//! plug in a persistent backend, the in-memory implementation covers
//! development and tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::SessionStoreError;
use crate::mapper::LocalUser;

/// Session ID type
pub type SessionId = String;

/// An established login session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSession {
	/// Opaque session id handed to the web layer
	pub id: SessionId,

	/// Local user id the session is bound to
	pub user_id: Uuid,

	/// Identity key of the user (the email the mapping keyed on)
	pub identity_key: String,

	/// Provider that authenticated this session
	pub provider: String,

	/// Establishment time
	pub created_at: DateTime<Utc>,
}

/// Session store capability
#[async_trait]
pub trait SessionStore: Send + Sync {
	/// Create a session bound to a user and provider
	async fn create(
		&self,
		user: &LocalUser,
		provider: &str,
	) -> Result<AuthSession, SessionStoreError>;

	/// Load a session by id
	async fn get(&self, session_id: &str) -> Option<AuthSession>;

	/// Invalidate a session by id
	async fn delete(&self, session_id: &str);

	/// Mint a fresh session id
	fn new_session_id(&self) -> SessionId {
		Uuid::new_v4().to_string()
	}
}

/// In-memory session store for development and testing
pub struct InMemorySessionStore {
	sessions: Mutex<HashMap<SessionId, AuthSession>>,
}

impl InMemorySessionStore {
	pub fn new() -> Self {
		Self {
			sessions: Mutex::new(HashMap::new()),
		}
	}
}

impl Default for InMemorySessionStore {
	fn default() -> Self {
		Self::new()
	}
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
	async fn create(
		&self,
		user: &LocalUser,
		provider: &str,
	) -> Result<AuthSession, SessionStoreError> {
		let session = AuthSession {
			id: self.new_session_id(),
			user_id: user.id,
			identity_key: user.identity_key.clone(),
			provider: provider.to_string(),
			created_at: Utc::now(),
		};

		let mut sessions = self.sessions.lock().await;
		sessions.insert(session.id.clone(), session.clone());
		Ok(session)
	}

	async fn get(&self, session_id: &str) -> Option<AuthSession> {
		let sessions = self.sessions.lock().await;
		sessions.get(session_id).cloned()
	}

	async fn delete(&self, session_id: &str) {
		let mut sessions = self.sessions.lock().await;
		sessions.remove(session_id);
	}
}
