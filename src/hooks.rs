//! Hook resolution
//!
//! Extension points are addressed by reference strings of the form
//! `"<module-path>:<symbol-name>"`. Instead of loading code dynamically,
//! the embedding application registers typed capabilities in a
//! [`HookRegistry`] at startup; the [`HookResolver`] parses references,
//! checks the signature class against the expected hook slot, and caches
//! resolutions for the process lifetime. Misconfigured references fail
//! at resolution time, before traffic is served.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::claims::{IdTokenClaims, UserinfoClaims};
use crate::error::{ConfigError, HookError, MappingError};
use crate::mapper::LocalUser;

/// Per-request data passed into notify hooks
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
	/// Provider handling the request
	pub provider: String,

	/// Local session id, when one exists
	pub session_id: Option<String>,

	/// Remote address of the client, when known
	pub remote_addr: Option<String>,

	/// Anything else the embedding application wants to pass through
	pub extra: HashMap<String, Value>,
}

impl RequestContext {
	pub fn new(provider: impl Into<String>) -> Self {
		Self {
			provider: provider.into(),
			..Default::default()
		}
	}
}

/// Login-notification capability: invoked after a session is established
#[async_trait]
pub trait LoginHook: Send + Sync {
	async fn on_login(&self, ctx: &RequestContext, user: &LocalUser) -> Result<(), HookError>;
}

/// Logout-notification capability: invoked before the session is dropped
#[async_trait]
pub trait LogoutHook: Send + Sync {
	async fn on_logout(&self, ctx: &RequestContext) -> Result<(), HookError>;
}

impl std::fmt::Debug for dyn LoginHook {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str("LoginHook")
	}
}

impl std::fmt::Debug for dyn LogoutHook {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str("LogoutHook")
	}
}

/// User-mapping capability: turns validated claim sets into a local user
#[async_trait]
pub trait UserMappingHook: Send + Sync {
	async fn map_user(
		&self,
		userinfo: &UserinfoClaims,
		id_token: &IdTokenClaims,
	) -> Result<LocalUser, MappingError>;
}

/// Signature class of a hook slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookKind {
	LoginNotify,
	LogoutNotify,
	UserMapping,
}

impl std::fmt::Display for HookKind {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let name = match self {
			HookKind::LoginNotify => "login-notify",
			HookKind::LogoutNotify => "logout-notify",
			HookKind::UserMapping => "user-mapping",
		};
		f.write_str(name)
	}
}

/// A registered export: a capability tagged with its signature class
#[derive(Clone)]
pub enum HookExport {
	Login(Arc<dyn LoginHook>),
	Logout(Arc<dyn LogoutHook>),
	UserMapping(Arc<dyn UserMappingHook>),
}

impl HookExport {
	fn kind(&self) -> HookKind {
		match self {
			HookExport::Login(_) => HookKind::LoginNotify,
			HookExport::Logout(_) => HookKind::LogoutNotify,
			HookExport::UserMapping(_) => HookKind::UserMapping,
		}
	}
}

/// Named exports the embedding application makes available to hook slots
#[derive(Default)]
pub struct HookRegistry {
	exports: HashMap<String, HookExport>,
}

impl HookRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Register an export under a `module:symbol` reference
	///
	/// The reference syntax is validated here so a typo fails at startup
	/// rather than on first use.
	pub fn register(&mut self, reference: &str, export: HookExport) -> Result<(), ConfigError> {
		parse_reference(reference)?;
		if self.exports.contains_key(reference) {
			return Err(ConfigError::DuplicateHook(reference.to_string()));
		}
		self.exports.insert(reference.to_string(), export);
		Ok(())
	}

	fn get(&self, reference: &str) -> Option<&HookExport> {
		self.exports.get(reference)
	}
}

/// Split and validate a `module:symbol` reference string
fn parse_reference(reference: &str) -> Result<(&str, &str), ConfigError> {
	let invalid = |detail: &str| ConfigError::InvalidHookReference {
		reference: reference.to_string(),
		detail: detail.to_string(),
	};

	let (module, symbol) = reference
		.split_once(':')
		.ok_or_else(|| invalid("expected <module-path>:<symbol-name>"))?;

	if module.is_empty() {
		return Err(invalid("empty module path"));
	}
	if symbol.is_empty() {
		return Err(invalid("empty symbol name"));
	}
	if symbol.contains(':') {
		return Err(invalid("more than one ':'"));
	}
	if !module.split('.').all(is_identifier) {
		return Err(invalid("module path is not dotted identifiers"));
	}
	if !is_identifier(symbol) {
		return Err(invalid("symbol name is not an identifier"));
	}

	Ok((module, symbol))
}

fn is_identifier(segment: &str) -> bool {
	let mut chars = segment.chars();
	match chars.next() {
		Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
		_ => return false,
	}
	chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// No-op login-notification hook, used for unconfigured slots
pub struct NoopLoginHook;

#[async_trait]
impl LoginHook for NoopLoginHook {
	async fn on_login(&self, _ctx: &RequestContext, _user: &LocalUser) -> Result<(), HookError> {
		Ok(())
	}
}

/// No-op logout-notification hook, used for unconfigured slots
pub struct NoopLogoutHook;

#[async_trait]
impl LogoutHook for NoopLogoutHook {
	async fn on_logout(&self, _ctx: &RequestContext) -> Result<(), HookError> {
		Ok(())
	}
}

/// Resolves hook references against a registry, caching resolutions
///
/// The cache is populated during startup validation and read-only on the
/// request path; repeated resolution of the same reference returns the
/// cached capability without re-parsing.
pub struct HookResolver {
	registry: HookRegistry,
	cache: RwLock<HashMap<String, HookExport>>,
	noop_login: Arc<dyn LoginHook>,
	noop_logout: Arc<dyn LogoutHook>,
}

impl HookResolver {
	pub fn new(registry: HookRegistry) -> Self {
		Self {
			registry,
			cache: RwLock::new(HashMap::new()),
			noop_login: Arc::new(NoopLoginHook),
			noop_logout: Arc::new(NoopLogoutHook),
		}
	}

	/// Resolve a login-notification hook reference
	pub fn resolve_login(&self, reference: &str) -> Result<Arc<dyn LoginHook>, ConfigError> {
		match self.resolve(reference, HookKind::LoginNotify)? {
			HookExport::Login(hook) => Ok(hook),
			_ => unreachable!("kind checked in resolve"),
		}
	}

	/// Resolve a logout-notification hook reference
	pub fn resolve_logout(&self, reference: &str) -> Result<Arc<dyn LogoutHook>, ConfigError> {
		match self.resolve(reference, HookKind::LogoutNotify)? {
			HookExport::Logout(hook) => Ok(hook),
			_ => unreachable!("kind checked in resolve"),
		}
	}

	/// Resolve a user-mapping hook reference
	pub fn resolve_user_mapping(
		&self,
		reference: &str,
	) -> Result<Arc<dyn UserMappingHook>, ConfigError> {
		match self.resolve(reference, HookKind::UserMapping)? {
			HookExport::UserMapping(hook) => Ok(hook),
			_ => unreachable!("kind checked in resolve"),
		}
	}

	/// Resolve an optional login-notification slot, no-op when unset
	pub fn login_slot(&self, reference: Option<&str>) -> Result<Arc<dyn LoginHook>, ConfigError> {
		match reference {
			Some(reference) => self.resolve_login(reference),
			None => Ok(self.noop_login.clone()),
		}
	}

	/// Resolve an optional logout-notification slot, no-op when unset
	pub fn logout_slot(&self, reference: Option<&str>) -> Result<Arc<dyn LogoutHook>, ConfigError> {
		match reference {
			Some(reference) => self.resolve_logout(reference),
			None => Ok(self.noop_logout.clone()),
		}
	}

	/// Resolve an optional user-mapping slot, falling back to a default
	pub fn user_mapping_slot(
		&self,
		reference: Option<&str>,
		default: &Arc<dyn UserMappingHook>,
	) -> Result<Arc<dyn UserMappingHook>, ConfigError> {
		match reference {
			Some(reference) => self.resolve_user_mapping(reference),
			None => Ok(default.clone()),
		}
	}

	fn resolve(&self, reference: &str, expected: HookKind) -> Result<HookExport, ConfigError> {
		{
			let cache = self.cache.read().expect("hook cache poisoned");
			if let Some(export) = cache.get(reference) {
				if export.kind() != expected {
					return Err(ConfigError::HookKindMismatch {
						reference: reference.to_string(),
						expected,
						found: export.kind(),
					});
				}
				tracing::debug!(reference = %reference, "hook resolution cache hit");
				return Ok(export.clone());
			}
		}

		parse_reference(reference)?;
		let export = self
			.registry
			.get(reference)
			.ok_or_else(|| ConfigError::UnknownHook(reference.to_string()))?;

		if export.kind() != expected {
			return Err(ConfigError::HookKindMismatch {
				reference: reference.to_string(),
				expected,
				found: export.kind(),
			});
		}

		let export = export.clone();
		let mut cache = self.cache.write().expect("hook cache poisoned");
		cache.insert(reference.to_string(), export.clone());
		Ok(export)
	}
}
