//! Login state machine
//!
//! Orchestrates the authorization-code flow:
//! `INITIATED -> AWAITING_CALLBACK -> EXCHANGING -> MAPPING ->
//! ESTABLISHED`, with `FAILED` reachable from every non-terminal state
//! and `LOGGED_OUT` reached from `ESTABLISHED`. Each attempt runs on its
//! own task with no shared mutable per-request state; every transition
//! into `FAILED` discards the attempt, logs the internal reason, and
//! surfaces only a generic error.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use url::Url;

use crate::claims::UserinfoClaims;
use crate::config::ProviderConfig;
use crate::error::{ConfigError, FailureReason, FlowError, MappingError, TokenErrorKind};
use crate::exchange::OAuth2Client;
use crate::flow::attempt::{AttemptStore, InMemoryAttemptStore, LoginAttempt, TakenAttempt};
use crate::hooks::{HookResolver, RequestContext, UserMappingHook};
use crate::jwks::JwksCache;
use crate::mapper::{DefaultUserMapper, LocalUser, UserStore};
use crate::redirect::{self, SafeUri};
use crate::registry::ProviderRegistry;
use crate::session::{InMemorySessionStore, SessionId, SessionStore};
use crate::token::TokenValidator;

/// States of one login attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowState {
	Initiated,
	AwaitingCallback,
	Exchanging,
	Mapping,
	Established,
	Failed,
	LoggedOut,
}

impl std::fmt::Display for FlowState {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let name = match self {
			FlowState::Initiated => "initiated",
			FlowState::AwaitingCallback => "awaiting_callback",
			FlowState::Exchanging => "exchanging",
			FlowState::Mapping => "mapping",
			FlowState::Established => "established",
			FlowState::Failed => "failed",
			FlowState::LoggedOut => "logged_out",
		};
		f.write_str(name)
	}
}

/// Query parameters of the IdP redirect back to the callback endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallbackParams {
	/// Anti-forgery token echoed by the IdP
	pub state: String,

	/// Authorization code, present on success
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub code: Option<String>,

	/// Error code, present when the IdP rejected the authorization
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub error: Option<String>,

	/// Human-readable error detail from the IdP
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub error_description: Option<String>,
}

impl CallbackParams {
	/// Successful callback carrying an authorization code
	pub fn success(state: impl Into<String>, code: impl Into<String>) -> Self {
		Self {
			state: state.into(),
			code: Some(code.into()),
			error: None,
			error_description: None,
		}
	}
}

/// Outcome of [`LoginFlow::initiate`]
#[derive(Debug, Clone)]
pub struct InitiatedLogin {
	/// Authorization URL the client must be redirected to
	pub authorization_url: String,

	/// The attempt's `state` token (also in the URL)
	pub state: String,
}

/// Outcome of a completed login
#[derive(Debug, Clone)]
pub struct EstablishedLogin {
	/// Local session bound to the user and provider
	pub session_id: SessionId,

	/// The mapped local user
	pub user: LocalUser,

	/// Where to send the client: the validated `next` target or the
	/// provider's default landing location
	pub redirect_to: String,
}

/// Outcome of [`LoginFlow::logout`]
#[derive(Debug, Clone)]
pub struct LogoutOutcome {
	/// Where to send the client after logout
	pub redirect_to: String,
}

/// The login/logout orchestrator
///
/// Holds only shared read-mostly state; per-attempt state lives in the
/// attempt store, so one instance serves any number of concurrent
/// requests.
pub struct LoginFlow {
	registry: Arc<ProviderRegistry>,
	hooks: Arc<HookResolver>,
	validator: TokenValidator,
	oauth: OAuth2Client,
	attempts: Arc<dyn AttemptStore>,
	sessions: Arc<dyn SessionStore>,
	default_mapper: Arc<dyn UserMappingHook>,
}

impl LoginFlow {
	/// Build a flow with in-memory attempt and session stores
	pub fn new(
		registry: Arc<ProviderRegistry>,
		hooks: Arc<HookResolver>,
		user_store: Arc<dyn UserStore>,
	) -> Result<Self, ConfigError> {
		let oauth = OAuth2Client::new()?;
		let validator = TokenValidator::new(Arc::new(JwksCache::new(oauth.http())));

		Ok(Self {
			registry,
			hooks,
			validator,
			oauth,
			attempts: Arc::new(InMemoryAttemptStore::new()),
			sessions: Arc::new(InMemorySessionStore::new()),
			default_mapper: Arc::new(DefaultUserMapper::new(user_store)),
		})
	}

	/// Replace the attempt store (e.g., a distributed backend)
	pub fn with_attempt_store(mut self, attempts: Arc<dyn AttemptStore>) -> Self {
		self.attempts = attempts;
		self
	}

	/// Replace the session store
	pub fn with_session_store(mut self, sessions: Arc<dyn SessionStore>) -> Self {
		self.sessions = sessions;
		self
	}

	/// Session store handle for the embedding web layer
	pub fn sessions(&self) -> Arc<dyn SessionStore> {
		self.sessions.clone()
	}

	/// Start a login attempt against a provider
	///
	/// The `next` target is validated immediately (fail fast); a
	/// rejected target falls back to the provider's default landing
	/// location without failing the login.
	pub async fn initiate(
		&self,
		provider_name: &str,
		next: Option<&str>,
	) -> Result<InitiatedLogin, FlowError> {
		let config = self.registry.lookup(provider_name)?;

		let requested_redirect = next.and_then(|candidate| {
			match redirect::validate(
				candidate,
				&config.allowed_redirect_hosts,
				config.redirect_requires_https,
			) {
				Ok(safe) => Some(safe),
				Err(error) => {
					tracing::warn!(
						provider = %config.name,
						error = %error,
						"rejected next target, falling back to default landing"
					);
					None
				}
			}
		});

		let state = random_token();
		let nonce = random_token();
		let attempt = LoginAttempt::new(
			&config.name,
			&state,
			&nonce,
			requested_redirect,
			config.attempt_ttl(),
		);
		self.attempts.store(attempt).await;

		let authorization_url = build_authorization_url(&config, &state, &nonce)?;

		self.transition(&config.name, FlowState::Initiated, FlowState::AwaitingCallback);
		Ok(InitiatedLogin {
			authorization_url,
			state,
		})
	}

	/// Discard a pending attempt without completing it
	///
	/// Abandoned attempts also expire on their own via TTL; this merely
	/// frees the entry early.
	pub async fn cancel(&self, state: &str) {
		if let TakenAttempt::Found(attempt) = self.attempts.take(state).await {
			tracing::debug!(provider = %attempt.provider_name, "login attempt cancelled");
		}
	}

	/// Complete a login attempt from the IdP callback
	pub async fn complete(
		&self,
		provider_name: &str,
		params: &CallbackParams,
		ctx: &RequestContext,
	) -> Result<EstablishedLogin, FlowError> {
		let config = self.registry.lookup(provider_name)?;
		let from = FlowState::AwaitingCallback;

		let attempt = match self.attempts.take(&params.state).await {
			TakenAttempt::Found(attempt) => attempt,
			TakenAttempt::Expired => {
				return Err(self.fail(
					&config.name,
					from,
					FailureReason::AttemptExpired,
					"attempt TTL elapsed before callback",
				));
			}
			TakenAttempt::Missing => {
				return Err(self.fail(
					&config.name,
					from,
					FailureReason::StateMismatch,
					"no login attempt for callback state",
				));
			}
		};

		// The store already matched on state; compare again in constant
		// time and pin the attempt to the provider it was initiated for.
		if !constant_time_eq(&attempt.state, &params.state)
			|| attempt.provider_name != config.name
		{
			return Err(self.fail(
				&config.name,
				from,
				FailureReason::StateMismatch,
				"state does not belong to this attempt",
			));
		}

		if let Some(error) = &params.error {
			let detail = format!(
				"provider returned {}: {}",
				error,
				params.error_description.as_deref().unwrap_or("<no description>")
			);
			return Err(self.fail(&config.name, from, FailureReason::ProviderError, &detail));
		}

		let Some(code) = params.code.as_deref() else {
			return Err(self.fail(
				&config.name,
				from,
				FailureReason::ProviderError,
				"callback missing authorization code",
			));
		};

		self.transition(&config.name, from, FlowState::Exchanging);

		let tokens = match self.oauth.exchange_code(&config, code).await {
			Ok(tokens) => tokens,
			Err(error) => {
				return Err(self.fail(
					&config.name,
					FlowState::Exchanging,
					FailureReason::ExchangeFailed,
					&error.to_string(),
				));
			}
		};

		let Some(raw_id_token) = tokens.id_token.as_deref() else {
			return Err(self.fail(
				&config.name,
				FlowState::Exchanging,
				FailureReason::TokenInvalid(TokenErrorKind::Malformed),
				"token response missing id_token",
			));
		};

		let id_claims = match self.validator.validate_id_token(raw_id_token, &config).await {
			Ok(claims) => claims,
			Err(error) => {
				return Err(self.fail(
					&config.name,
					FlowState::Exchanging,
					FailureReason::TokenInvalid(error.kind),
					&error.detail,
				));
			}
		};

		match &id_claims.nonce {
			Some(nonce) if constant_time_eq(nonce, &attempt.nonce) => {}
			_ => {
				return Err(self.fail(
					&config.name,
					FlowState::Exchanging,
					FailureReason::NonceMismatch,
					"id token nonce does not match attempt",
				));
			}
		}

		let userinfo = match &config.userinfo_endpoint {
			Some(endpoint) => {
				let raw = match self.oauth.fetch_userinfo(endpoint, &tokens.access_token).await {
					Ok(raw) => raw,
					Err(error) => {
						return Err(self.fail(
							&config.name,
							FlowState::Exchanging,
							FailureReason::ExchangeFailed,
							&error.to_string(),
						));
					}
				};
				match self.validator.validate_userinfo(&raw, &config).await {
					Ok(claims) => claims,
					Err(error) => {
						return Err(self.fail(
							&config.name,
							FlowState::Exchanging,
							FailureReason::TokenInvalid(error.kind),
							&error.detail,
						));
					}
				}
			}
			None => UserinfoClaims::from(&id_claims),
		};

		self.transition(&config.name, FlowState::Exchanging, FlowState::Mapping);

		let mapper = self
			.hooks
			.user_mapping_slot(config.user_mapping_hook.as_deref(), &self.default_mapper)?;
		let user = match mapper.map_user(&userinfo, &id_claims).await {
			Ok(user) => user,
			Err(MappingError::AccessDenied(detail)) => {
				return Err(self.fail(
					&config.name,
					FlowState::Mapping,
					FailureReason::AccessDenied,
					&detail,
				));
			}
			Err(error) => {
				return Err(self.fail(
					&config.name,
					FlowState::Mapping,
					FailureReason::MappingFailed,
					&error.to_string(),
				));
			}
		};

		let session = match self.sessions.create(&user, &config.name).await {
			Ok(session) => session,
			Err(error) => {
				return Err(self.fail(
					&config.name,
					FlowState::Mapping,
					FailureReason::SessionStore,
					&error.to_string(),
				));
			}
		};

		self.transition(&config.name, FlowState::Mapping, FlowState::Established);

		// Best-effort notification: a failing hook is logged, never fatal
		let login_hook = self.hooks.login_slot(config.login_hook.as_deref())?;
		let mut hook_ctx = ctx.clone();
		hook_ctx.session_id = Some(session.id.clone());
		if let Err(error) = login_hook.on_login(&hook_ctx, &user).await {
			tracing::warn!(
				provider = %config.name,
				error = %error,
				"login notification hook failed"
			);
		}

		let redirect_to = attempt
			.requested_redirect
			.map(SafeUri::into_string)
			.unwrap_or_else(|| config.post_login_default_uri.clone());

		tracing::info!(
			provider = %config.name,
			user = %user.identity_key,
			"login established"
		);

		Ok(EstablishedLogin {
			session_id: session.id,
			user,
			redirect_to,
		})
	}

	/// Log out an established session
	///
	/// Invokes the logout-notification hook (best-effort), invalidates
	/// the local session, and returns the validated post-logout target.
	pub async fn logout(
		&self,
		provider_name: &str,
		session_id: &str,
		next: Option<&str>,
		ctx: &RequestContext,
	) -> Result<LogoutOutcome, FlowError> {
		let config = self.registry.lookup(provider_name)?;

		let logout_hook = self.hooks.logout_slot(config.logout_hook.as_deref())?;
		if let Err(error) = logout_hook.on_logout(ctx).await {
			tracing::warn!(
				provider = %config.name,
				error = %error,
				"logout notification hook failed"
			);
		}

		self.sessions.delete(session_id).await;

		let redirect_to = next
			.and_then(|candidate| {
				match redirect::validate(
					candidate,
					&config.allowed_redirect_hosts,
					config.redirect_requires_https,
				) {
					Ok(safe) => Some(safe.into_string()),
					Err(error) => {
						tracing::warn!(
							provider = %config.name,
							error = %error,
							"rejected post-logout target, falling back to default"
						);
						None
					}
				}
			})
			.unwrap_or_else(|| config.post_logout_default_uri.clone());

		self.transition(&config.name, FlowState::Established, FlowState::LoggedOut);
		Ok(LogoutOutcome { redirect_to })
	}

	fn transition(&self, provider: &str, from: FlowState, to: FlowState) {
		tracing::debug!(provider = %provider, from = %from, to = %to, "login flow transition");
	}

	fn fail(
		&self,
		provider: &str,
		from: FlowState,
		reason: FailureReason,
		detail: &str,
	) -> FlowError {
		match reason {
			FailureReason::StateMismatch
			| FailureReason::NonceMismatch
			| FailureReason::AttemptExpired => {
				// Anti-replay failures are potential attack signals
				tracing::warn!(
					provider = %provider,
					from = %from,
					reason = %reason,
					detail = %detail,
					"login attempt failed"
				);
			}
			_ => {
				tracing::info!(
					provider = %provider,
					from = %from,
					reason = %reason,
					detail = %detail,
					"login attempt failed"
				);
			}
		}
		FlowError::Failed(reason)
	}
}

/// Authorization URL with the standard code-flow query parameters
fn build_authorization_url(
	config: &ProviderConfig,
	state: &str,
	nonce: &str,
) -> Result<String, FlowError> {
	let mut url =
		Url::parse(&config.authorization_endpoint).map_err(|_| {
			// Endpoints are validated at registration; reaching this is a bug
			FlowError::Failed(FailureReason::Internal)
		})?;

	url.query_pairs_mut()
		.append_pair("response_type", "code")
		.append_pair("client_id", &config.client_id)
		.append_pair("redirect_uri", &config.redirect_uri)
		.append_pair("scope", &config.scopes.join(" "))
		.append_pair("state", state)
		.append_pair("nonce", nonce);

	Ok(url.to_string())
}

/// 32 bytes of CSPRNG output, URL-safe base64
fn random_token() -> String {
	use base64::Engine as _;
	use base64::engine::general_purpose::URL_SAFE_NO_PAD;
	use rand::RngCore;

	let mut bytes = [0u8; 32];
	rand::thread_rng().fill_bytes(&mut bytes);
	URL_SAFE_NO_PAD.encode(bytes)
}

/// Length-guarded constant-time string comparison
fn constant_time_eq(a: &str, b: &str) -> bool {
	let (a, b) = (a.as_bytes(), b.as_bytes());
	if a.len() != b.len() {
		return false;
	}
	let mut diff = 0u8;
	for (x, y) in a.iter().zip(b.iter()) {
		diff |= x ^ y;
	}
	diff == 0
}
