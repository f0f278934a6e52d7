//! Startup validation: misconfiguration is fatal before traffic

use std::sync::Arc;

use reinhardt_oidc::{
	ConfigError, DefaultUserMapper, HookExport, HookRegistry, HookResolver, InMemoryUserStore,
	JwksSource, ProviderConfig, ProviderRegistry, UserMappingHook,
};

fn provider(name: &str) -> ProviderConfig {
	let mut config = ProviderConfig::keycloak(
		"https://sso.example/auth/realms/demo",
		"my-client",
		"s3cret",
		"https://app.local/oidc/callback",
	);
	config.name = name.to_string();
	config
}

#[test]
fn test_duplicate_provider_names_abort_startup() {
	let error = ProviderRegistry::builder()
		.register(provider("keycloak"))
		.unwrap()
		.register(provider("keycloak"))
		.unwrap_err();

	assert_eq!(error, ConfigError::DuplicateProvider("keycloak".to_string()));
}

#[test]
fn test_malformed_hook_reference_aborts_startup() {
	let mut config = provider("keycloak");
	config.login_hook = Some("not-a-reference".to_string());

	let error = ProviderRegistry::builder()
		.register(config)
		.unwrap()
		.build(&HookResolver::new(HookRegistry::new()))
		.unwrap_err();

	assert!(matches!(error, ConfigError::InvalidHookReference { .. }));
}

#[test]
fn test_unregistered_hook_aborts_startup() {
	let mut config = provider("keycloak");
	config.user_mapping_hook = Some("myapp.auth:missing".to_string());

	let error = ProviderRegistry::builder()
		.register(config)
		.unwrap()
		.build(&HookResolver::new(HookRegistry::new()))
		.unwrap_err();

	assert_eq!(error, ConfigError::UnknownHook("myapp.auth:missing".to_string()));
}

#[test]
fn test_missing_endpoint_aborts_startup() {
	let mut config = provider("keycloak");
	config.token_endpoint = String::new();

	let error = ProviderRegistry::builder().register(config).unwrap_err();
	assert!(matches!(error, ConfigError::InvalidEndpoint { .. }));
}

#[test]
fn test_complete_configuration_starts() {
	let users = Arc::new(InMemoryUserStore::new());
	let mapper: Arc<dyn UserMappingHook> = Arc::new(DefaultUserMapper::new(users));
	let mut hooks = HookRegistry::new();
	hooks
		.register("myapp.auth:map_user", HookExport::UserMapping(mapper))
		.unwrap();
	let resolver = HookResolver::new(hooks);

	let mut config = provider("keycloak");
	config.user_mapping_hook = Some("myapp.auth:map_user".to_string());
	config.jwks_source = JwksSource::Uri(
		"https://sso.example/auth/realms/demo/protocol/openid-connect/certs".to_string(),
	);

	let registry = ProviderRegistry::builder()
		.register(config)
		.unwrap()
		.register(provider("azure"))
		.unwrap()
		.build(&resolver)
		.unwrap();

	assert_eq!(registry.len(), 2);
	assert!(registry.lookup("keycloak").is_ok());
	assert!(registry.lookup("azure").is_ok());
}
