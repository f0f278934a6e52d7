//! User mapping
//!
//! Turns validated claim sets into a local user, optionally with group
//! side effects. The persisted user/group store is an external
//! capability ([`UserStore`]); the core never assumes a storage engine.
//! Custom mappers are registered as user-mapping hooks and may reject a
//! login with `MappingError::AccessDenied`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::claims::{IdTokenClaims, UserinfoClaims};
use crate::error::{MappingError, UserStoreError};
use crate::hooks::UserMappingHook;

/// A local user as seen by the core: an id and an identity key
///
/// Everything else about the user lives in the external store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalUser {
	pub id: Uuid,
	/// Identity key the user is looked up by (the email claim)
	pub identity_key: String,
}

impl LocalUser {
	pub fn new(identity_key: impl Into<String>) -> Self {
		Self {
			id: Uuid::new_v4(),
			identity_key: identity_key.into(),
		}
	}
}

/// External user/group store capability
///
/// `get_or_create_by_identity_key` must be atomic from the store's
/// perspective: concurrent calls with the same key return the same user.
#[async_trait]
pub trait UserStore: Send + Sync {
	async fn get_or_create_by_identity_key(&self, key: &str)
	-> Result<LocalUser, UserStoreError>;

	async fn add_to_group(&self, user: &LocalUser, group: &str) -> Result<(), UserStoreError>;
}

/// In-memory user store for development and testing
pub struct InMemoryUserStore {
	users: RwLock<HashMap<String, LocalUser>>,
	groups: RwLock<HashMap<Uuid, HashSet<String>>>,
}

impl InMemoryUserStore {
	pub fn new() -> Self {
		Self {
			users: RwLock::new(HashMap::new()),
			groups: RwLock::new(HashMap::new()),
		}
	}

	/// Number of distinct users the store holds
	pub async fn user_count(&self) -> usize {
		self.users.read().await.len()
	}

	/// Group names a user belongs to
	pub async fn groups_of(&self, user: &LocalUser) -> HashSet<String> {
		self.groups
			.read()
			.await
			.get(&user.id)
			.cloned()
			.unwrap_or_default()
	}
}

impl Default for InMemoryUserStore {
	fn default() -> Self {
		Self::new()
	}
}

#[async_trait]
impl UserStore for InMemoryUserStore {
	async fn get_or_create_by_identity_key(
		&self,
		key: &str,
	) -> Result<LocalUser, UserStoreError> {
		let mut users = self.users.write().await;
		let user = users
			.entry(key.to_string())
			.or_insert_with(|| LocalUser::new(key));
		Ok(user.clone())
	}

	async fn add_to_group(&self, user: &LocalUser, group: &str) -> Result<(), UserStoreError> {
		let mut groups = self.groups.write().await;
		groups
			.entry(user.id)
			.or_default()
			.insert(group.to_string());
		Ok(())
	}
}

/// Default user mapping: look up or create by the `email` claim
///
/// No group or permission side effects. The userinfo email wins; the ID
/// token's email claim is the fallback.
pub struct DefaultUserMapper {
	store: Arc<dyn UserStore>,
}

impl DefaultUserMapper {
	pub fn new(store: Arc<dyn UserStore>) -> Self {
		Self { store }
	}
}

#[async_trait]
impl UserMappingHook for DefaultUserMapper {
	async fn map_user(
		&self,
		userinfo: &UserinfoClaims,
		id_token: &IdTokenClaims,
	) -> Result<LocalUser, MappingError> {
		let email = userinfo
			.email
			.as_deref()
			.or(id_token.email.as_deref())
			.ok_or(MappingError::MissingClaim("email"))?;

		Ok(self.store.get_or_create_by_identity_key(email).await?)
	}
}

/// User mapping that mirrors the provider's `groups` claim
///
/// Maps like [`DefaultUserMapper`], then adds the user to every group
/// named in the userinfo `groups` claim. With `required_group` set, a
/// login whose claims lack that group is denied before any user is
/// created.
pub struct GroupSyncUserMapper {
	store: Arc<dyn UserStore>,
	required_group: Option<String>,
}

impl GroupSyncUserMapper {
	pub fn new(store: Arc<dyn UserStore>) -> Self {
		Self {
			store,
			required_group: None,
		}
	}

	/// Deny logins whose `groups` claim does not contain `group`
	pub fn with_required_group(mut self, group: impl Into<String>) -> Self {
		self.required_group = Some(group.into());
		self
	}
}

#[async_trait]
impl UserMappingHook for GroupSyncUserMapper {
	async fn map_user(
		&self,
		userinfo: &UserinfoClaims,
		id_token: &IdTokenClaims,
	) -> Result<LocalUser, MappingError> {
		let groups = userinfo.groups.clone().unwrap_or_default();

		if let Some(required) = &self.required_group {
			if !groups.iter().any(|g| g == required) {
				return Err(MappingError::AccessDenied(format!(
					"required group {:?} not present",
					required
				)));
			}
		}

		let email = userinfo
			.email
			.as_deref()
			.or(id_token.email.as_deref())
			.ok_or(MappingError::MissingClaim("email"))?;

		let user = self.store.get_or_create_by_identity_key(email).await?;
		for group in &groups {
			self.store.add_to_group(&user, group).await?;
		}

		Ok(user)
	}
}
