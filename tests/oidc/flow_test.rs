//! End-to-end login flow tests against a mock identity provider

use async_trait::async_trait;
use serde_json::json;
use std::sync::{Arc, Mutex};
use url::Url;

use helpers::{MockIdpServer, TEST_KID, TEST_SECRET, id_claims, jwks_json, provider_for, sign_id_token};
use reinhardt_oidc::{
	CallbackParams, ConfigError, FailureReason, FlowError, GroupSyncUserMapper, HookError,
	HookExport, HookRegistry, HookResolver, InMemoryUserStore, LocalUser, LoginFlow, LoginHook,
	ProviderConfig, ProviderRegistry, RequestContext, TokenErrorKind, UserMappingHook,
};

#[path = "../helpers.rs"]
mod helpers;

struct TestHarness {
	server: MockIdpServer,
	flow: LoginFlow,
	users: Arc<InMemoryUserStore>,
}

async fn setup(
	mutate: impl FnOnce(&mut ProviderConfig),
	hooks: HookRegistry,
) -> TestHarness {
	let server = MockIdpServer::start(jwks_json(TEST_KID, TEST_SECRET)).await;
	let mut config = provider_for(&server);
	mutate(&mut config);

	let resolver = Arc::new(HookResolver::new(hooks));
	let registry = Arc::new(
		ProviderRegistry::builder()
			.register(config)
			.unwrap()
			.build(&resolver)
			.unwrap(),
	);
	let users = Arc::new(InMemoryUserStore::new());
	let flow = LoginFlow::new(registry, resolver, users.clone()).unwrap();

	TestHarness { server, flow, users }
}

fn nonce_from(authorization_url: &str) -> String {
	Url::parse(authorization_url)
		.unwrap()
		.query_pairs()
		.find(|(key, _)| key == "nonce")
		.map(|(_, value)| value.into_owned())
		.expect("authorization url carries a nonce")
}

/// Initiate a login and arm the mock IdP with a matching ID token
async fn begin(h: &TestHarness, next: Option<&str>, claims_aud: &str) -> CallbackParams {
	let initiated = h.flow.initiate("keycloak", next).await.unwrap();
	let nonce = nonce_from(&initiated.authorization_url);

	let mut claims = id_claims(&h.server.base_url(), &nonce);
	claims["aud"] = json!(claims_aud);
	h.server
		.set_id_token(sign_id_token(&claims, TEST_KID, TEST_SECRET));

	CallbackParams::success(initiated.state, "auth-code")
}

#[tokio::test]
async fn test_login_succeeds_with_relative_next() {
	// Arrange
	let h = setup(|_| {}, HookRegistry::new()).await;
	let params = begin(&h, Some("/profile"), "my-client").await;

	// Act
	let established = h
		.flow
		.complete("keycloak", &params, &RequestContext::new("keycloak"))
		.await
		.unwrap();

	// Assert
	assert_eq!(established.redirect_to, "/profile");
	assert_eq!(established.user.identity_key, "user@example.com");
	let session = h.flow.sessions().get(&established.session_id).await.unwrap();
	assert_eq!(session.provider, "keycloak");
	assert_eq!(session.user_id, established.user.id);
}

#[tokio::test]
async fn test_rejected_next_falls_back_to_default_landing() {
	// Arrange
	let h = setup(|_| {}, HookRegistry::new()).await;
	let params = begin(&h, Some("https://evil.example/steal"), "my-client").await;

	// Act
	let established = h
		.flow
		.complete("keycloak", &params, &RequestContext::new("keycloak"))
		.await
		.unwrap();

	// Assert: login still succeeds, target falls back
	assert_eq!(established.redirect_to, "/");
}

#[tokio::test]
async fn test_foreign_audience_fails_without_session() {
	// Arrange: ID token issued for some other client
	let h = setup(|_| {}, HookRegistry::new()).await;
	let params = begin(&h, None, "other-client").await;

	// Act
	let error = h
		.flow
		.complete("keycloak", &params, &RequestContext::new("keycloak"))
		.await
		.unwrap_err();

	// Assert
	assert_eq!(
		error.reason(),
		Some(&FailureReason::TokenInvalid(TokenErrorKind::BadAudience))
	);
	assert_eq!(h.users.user_count().await, 0);
}

#[tokio::test]
async fn test_nonce_mismatch_fails() {
	// Arrange: token carries a nonce from some other attempt
	let h = setup(|_| {}, HookRegistry::new()).await;
	let initiated = h.flow.initiate("keycloak", None).await.unwrap();
	let claims = id_claims(&h.server.base_url(), "a-nonce-from-elsewhere");
	h.server
		.set_id_token(sign_id_token(&claims, TEST_KID, TEST_SECRET));

	// Act
	let error = h
		.flow
		.complete(
			"keycloak",
			&CallbackParams::success(initiated.state, "auth-code"),
			&RequestContext::new("keycloak"),
		)
		.await
		.unwrap_err();

	// Assert
	assert_eq!(error.reason(), Some(&FailureReason::NonceMismatch));
}

#[tokio::test]
async fn test_token_endpoint_failure_is_exchange_failed() {
	// Arrange
	let h = setup(|_| {}, HookRegistry::new()).await;
	let params = begin(&h, None, "my-client").await;
	h.server.set_error_mode(helpers::ErrorMode::ServerError);

	// Act
	let error = h
		.flow
		.complete("keycloak", &params, &RequestContext::new("keycloak"))
		.await
		.unwrap_err();

	// Assert
	assert_eq!(error.reason(), Some(&FailureReason::ExchangeFailed));
}

#[tokio::test]
async fn test_custom_mapper_denies_without_required_group() {
	// Arrange: USER_FUNCTION requires membership in "admins"
	let users = Arc::new(InMemoryUserStore::new());
	let mapper: Arc<dyn UserMappingHook> =
		Arc::new(GroupSyncUserMapper::new(users.clone()).with_required_group("admins"));
	let mut hooks = HookRegistry::new();
	hooks
		.register("myapp.auth:require_admins", HookExport::UserMapping(mapper))
		.unwrap();

	let h = setup(
		|config| config.user_mapping_hook = Some("myapp.auth:require_admins".to_string()),
		hooks,
	)
	.await;
	h.server
		.set_userinfo(r#"{"sub": "user123", "email": "user@example.com", "groups": ["users"]}"#);
	let params = begin(&h, None, "my-client").await;

	// Act
	let error = h
		.flow
		.complete("keycloak", &params, &RequestContext::new("keycloak"))
		.await
		.unwrap_err();

	// Assert: expected denial, no user created
	assert_eq!(error.reason(), Some(&FailureReason::AccessDenied));
	assert_eq!(users.user_count().await, 0);
}

#[tokio::test]
async fn test_custom_mapper_syncs_groups() {
	// Arrange
	let users = Arc::new(InMemoryUserStore::new());
	let mapper: Arc<dyn UserMappingHook> =
		Arc::new(GroupSyncUserMapper::new(users.clone()).with_required_group("admins"));
	let mut hooks = HookRegistry::new();
	hooks
		.register("myapp.auth:require_admins", HookExport::UserMapping(mapper))
		.unwrap();

	let h = setup(
		|config| config.user_mapping_hook = Some("myapp.auth:require_admins".to_string()),
		hooks,
	)
	.await;
	h.server.set_userinfo(
		r#"{"sub": "user123", "email": "user@example.com", "groups": ["admins", "staff"]}"#,
	);
	let params = begin(&h, None, "my-client").await;

	// Act
	let established = h
		.flow
		.complete("keycloak", &params, &RequestContext::new("keycloak"))
		.await
		.unwrap();

	// Assert
	let groups = users.groups_of(&established.user).await;
	assert!(groups.contains("admins"));
	assert!(groups.contains("staff"));
}

struct RecordingLoginHook {
	calls: Mutex<Vec<(Option<String>, String)>>,
}

#[async_trait]
impl LoginHook for RecordingLoginHook {
	async fn on_login(&self, ctx: &RequestContext, user: &LocalUser) -> Result<(), HookError> {
		self.calls
			.lock()
			.unwrap()
			.push((ctx.session_id.clone(), user.identity_key.clone()));
		Ok(())
	}
}

struct FailingLoginHook;

#[async_trait]
impl LoginHook for FailingLoginHook {
	async fn on_login(&self, _ctx: &RequestContext, _user: &LocalUser) -> Result<(), HookError> {
		Err(HookError("notification backend down".to_string()))
	}
}

#[tokio::test]
async fn test_login_hook_receives_session_context() {
	// Arrange
	let recorder = Arc::new(RecordingLoginHook {
		calls: Mutex::new(Vec::new()),
	});
	let mut hooks = HookRegistry::new();
	hooks
		.register("myapp.auth:notify_login", HookExport::Login(recorder.clone()))
		.unwrap();

	let h = setup(
		|config| config.login_hook = Some("myapp.auth:notify_login".to_string()),
		hooks,
	)
	.await;
	let params = begin(&h, None, "my-client").await;

	// Act
	let established = h
		.flow
		.complete("keycloak", &params, &RequestContext::new("keycloak"))
		.await
		.unwrap();

	// Assert
	let calls = recorder.calls.lock().unwrap();
	assert_eq!(calls.len(), 1);
	assert_eq!(calls[0].0.as_deref(), Some(established.session_id.as_str()));
	assert_eq!(calls[0].1, "user@example.com");
}

#[tokio::test]
async fn test_failing_login_hook_is_not_fatal() {
	// Arrange
	let mut hooks = HookRegistry::new();
	hooks
		.register(
			"myapp.auth:notify_login",
			HookExport::Login(Arc::new(FailingLoginHook)),
		)
		.unwrap();

	let h = setup(
		|config| config.login_hook = Some("myapp.auth:notify_login".to_string()),
		hooks,
	)
	.await;
	let params = begin(&h, None, "my-client").await;

	// Act: the hook fails, the login must not
	let established = h
		.flow
		.complete("keycloak", &params, &RequestContext::new("keycloak"))
		.await
		.unwrap();

	// Assert
	assert!(h.flow.sessions().get(&established.session_id).await.is_some());
}

#[tokio::test]
async fn test_unknown_provider_in_callback() {
	let h = setup(|_| {}, HookRegistry::new()).await;

	let error = h
		.flow
		.complete(
			"github",
			&CallbackParams::success("some-state", "auth-code"),
			&RequestContext::new("github"),
		)
		.await
		.unwrap_err();

	assert!(matches!(
		error,
		FlowError::Configuration(ConfigError::UnknownProvider(_))
	));
}
