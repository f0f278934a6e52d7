//! Provider registry
//!
//! Maps provider names to their immutable configuration. Populated once
//! at startup through the builder — duplicate names, invalid configs,
//! and unresolvable hook references are all fatal before the service
//! accepts traffic — then read concurrently by every request.

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::ProviderConfig;
use crate::error::ConfigError;
use crate::hooks::HookResolver;

/// Read-only collection of provider configurations
#[derive(Debug)]
pub struct ProviderRegistry {
	providers: HashMap<String, Arc<ProviderConfig>>,
}

impl ProviderRegistry {
	pub fn builder() -> ProviderRegistryBuilder {
		ProviderRegistryBuilder::new()
	}

	/// Look up a provider by name
	pub fn lookup(&self, name: &str) -> Result<Arc<ProviderConfig>, ConfigError> {
		self.providers
			.get(name)
			.cloned()
			.ok_or_else(|| ConfigError::UnknownProvider(name.to_string()))
	}

	/// Registered provider names
	pub fn names(&self) -> impl Iterator<Item = &str> {
		self.providers.keys().map(String::as_str)
	}

	pub fn len(&self) -> usize {
		self.providers.len()
	}

	pub fn is_empty(&self) -> bool {
		self.providers.is_empty()
	}
}

/// Startup-time builder for [`ProviderRegistry`]
#[derive(Debug, Default)]
pub struct ProviderRegistryBuilder {
	providers: HashMap<String, Arc<ProviderConfig>>,
}

impl ProviderRegistryBuilder {
	pub fn new() -> Self {
		Self::default()
	}

	/// Register a provider configuration
	///
	/// Validates the config and rejects duplicate names.
	pub fn register(mut self, config: ProviderConfig) -> Result<Self, ConfigError> {
		config.validate()?;

		if self.providers.contains_key(&config.name) {
			return Err(ConfigError::DuplicateProvider(config.name));
		}

		tracing::debug!(provider = %config.name, "provider registered");
		self.providers.insert(config.name.clone(), Arc::new(config));
		Ok(self)
	}

	/// Finalize the registry
	///
	/// Eagerly resolves every configured hook reference against the
	/// resolver so a malformed or missing hook fails here, not on the
	/// first login.
	pub fn build(self, hooks: &HookResolver) -> Result<ProviderRegistry, ConfigError> {
		for config in self.providers.values() {
			hooks.login_slot(config.login_hook.as_deref())?;
			hooks.logout_slot(config.logout_hook.as_deref())?;
			if let Some(reference) = config.user_mapping_hook.as_deref() {
				hooks.resolve_user_mapping(reference)?;
			}
		}

		tracing::info!(providers = self.providers.len(), "provider registry ready");
		Ok(ProviderRegistry {
			providers: self.providers,
		})
	}
}
