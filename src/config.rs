//! Provider configuration types
//!
//! One [`ProviderConfig`] per identity provider, created at startup and
//! read-only afterwards. Configuration is passed in explicitly; there is
//! no process-global settings object.

use jsonwebtoken::jwk::JwkSet;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use url::Url;

use crate::error::ConfigError;

/// Where a provider's signing keys come from
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JwksSource {
	/// JWKS document URI, fetched and cached with a TTL
	Uri(String),

	/// Inline key set, never refreshed (air-gapped deployments, tests)
	Inline(JwkSet),
}

/// Per-provider configuration
///
/// Immutable once registered; request handling only ever reads it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
	/// Provider name, the unique registry key (e.g., "keycloak")
	pub name: String,

	/// OAuth2 client ID
	pub client_id: String,

	/// OAuth2 client secret
	pub client_secret: String,

	/// Expected `iss` value of tokens issued by this provider
	pub issuer: String,

	/// Authorization endpoint URL
	pub authorization_endpoint: String,

	/// Token endpoint URL
	pub token_endpoint: String,

	/// UserInfo endpoint URL; when absent, userinfo claims are derived
	/// from the validated ID token
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub userinfo_endpoint: Option<String>,

	/// Signing key source for token validation
	pub jwks_source: JwksSource,

	/// Requested scopes
	#[serde(default = "default_scopes")]
	pub scopes: Vec<String>,

	/// Redirect URI registered with the provider (the callback)
	pub redirect_uri: String,

	/// Hostnames a post-login/post-logout `next` target may point at
	#[serde(default)]
	pub allowed_redirect_hosts: HashSet<String>,

	/// Require https on absolute `next` targets
	#[serde(default = "default_true")]
	pub redirect_requires_https: bool,

	/// Landing location when `next` is absent or rejected
	#[serde(default = "default_landing")]
	pub post_login_default_uri: String,

	/// Landing location after logout
	#[serde(default = "default_landing")]
	pub post_logout_default_uri: String,

	/// Login-notification hook reference (`module:symbol`), optional
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub login_hook: Option<String>,

	/// Logout-notification hook reference, optional
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub logout_hook: Option<String>,

	/// User-mapping hook reference, optional (default mapper otherwise)
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub user_mapping_hook: Option<String>,

	/// Login attempt TTL in seconds
	#[serde(default = "default_attempt_ttl_secs")]
	pub attempt_ttl_secs: u64,

	/// Clock-skew tolerance for time-based claims, in seconds
	#[serde(default = "default_clock_skew_secs")]
	pub clock_skew_secs: u64,

	/// JWKS cache TTL in seconds
	#[serde(default = "default_jwks_ttl_secs")]
	pub jwks_ttl_secs: u64,
}

fn default_scopes() -> Vec<String> {
	vec![
		"openid".to_string(),
		"email".to_string(),
		"profile".to_string(),
	]
}

fn default_true() -> bool {
	true
}

fn default_landing() -> String {
	"/".to_string()
}

fn default_attempt_ttl_secs() -> u64 {
	600
}

fn default_clock_skew_secs() -> u64 {
	60
}

fn default_jwks_ttl_secs() -> u64 {
	3600
}

impl ProviderConfig {
	/// Create a configuration with explicit endpoints and defaults for
	/// everything optional
	#[allow(clippy::too_many_arguments)]
	pub fn new(
		name: impl Into<String>,
		client_id: impl Into<String>,
		client_secret: impl Into<String>,
		issuer: impl Into<String>,
		authorization_endpoint: impl Into<String>,
		token_endpoint: impl Into<String>,
		jwks_source: JwksSource,
		redirect_uri: impl Into<String>,
	) -> Self {
		Self {
			name: name.into(),
			client_id: client_id.into(),
			client_secret: client_secret.into(),
			issuer: issuer.into(),
			authorization_endpoint: authorization_endpoint.into(),
			token_endpoint: token_endpoint.into(),
			userinfo_endpoint: None,
			jwks_source,
			scopes: default_scopes(),
			redirect_uri: redirect_uri.into(),
			allowed_redirect_hosts: HashSet::new(),
			redirect_requires_https: true,
			post_login_default_uri: default_landing(),
			post_logout_default_uri: default_landing(),
			login_hook: None,
			logout_hook: None,
			user_mapping_hook: None,
			attempt_ttl_secs: default_attempt_ttl_secs(),
			clock_skew_secs: default_clock_skew_secs(),
			jwks_ttl_secs: default_jwks_ttl_secs(),
		}
	}

	/// Create a Keycloak realm configuration
	///
	/// Endpoints follow Keycloak's realm layout; `realm_url` is the full
	/// realm URL (e.g., `https://sso.example/auth/realms/demo`) and
	/// doubles as the issuer.
	pub fn keycloak(
		realm_url: &str,
		client_id: impl Into<String>,
		client_secret: impl Into<String>,
		redirect_uri: impl Into<String>,
	) -> Self {
		let realm = realm_url.trim_end_matches('/');
		let mut config = Self::new(
			"keycloak",
			client_id,
			client_secret,
			realm,
			format!("{}/protocol/openid-connect/auth", realm),
			format!("{}/protocol/openid-connect/token", realm),
			JwksSource::Uri(format!("{}/protocol/openid-connect/certs", realm)),
			redirect_uri,
		);
		config.userinfo_endpoint = Some(format!("{}/protocol/openid-connect/userinfo", realm));
		config
	}

	/// Attempt TTL as a duration
	pub fn attempt_ttl(&self) -> chrono::Duration {
		chrono::Duration::seconds(self.attempt_ttl_secs as i64)
	}

	/// Clock-skew tolerance as a duration
	pub fn clock_skew(&self) -> chrono::Duration {
		chrono::Duration::seconds(self.clock_skew_secs as i64)
	}

	/// JWKS cache TTL as a duration
	pub fn jwks_ttl(&self) -> chrono::Duration {
		chrono::Duration::seconds(self.jwks_ttl_secs as i64)
	}

	/// Validate required fields and endpoint URLs
	///
	/// Called by the registry at registration time so a malformed
	/// provider is rejected before the service accepts traffic.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.name.is_empty() {
			return Err(ConfigError::MissingField {
				provider: "<unnamed>".to_string(),
				field: "name",
			});
		}

		for (field, value) in [
			("client_id", &self.client_id),
			("client_secret", &self.client_secret),
			("issuer", &self.issuer),
			("redirect_uri", &self.redirect_uri),
		] {
			if value.is_empty() {
				return Err(ConfigError::MissingField {
					provider: self.name.clone(),
					field,
				});
			}
		}

		self.check_endpoint("authorization_endpoint", &self.authorization_endpoint)?;
		self.check_endpoint("token_endpoint", &self.token_endpoint)?;
		self.check_endpoint("redirect_uri", &self.redirect_uri)?;
		if let Some(userinfo) = &self.userinfo_endpoint {
			self.check_endpoint("userinfo_endpoint", userinfo)?;
		}
		if let JwksSource::Uri(uri) = &self.jwks_source {
			self.check_endpoint("jwks_source", uri)?;
		}

		Ok(())
	}

	fn check_endpoint(&self, field: &'static str, value: &str) -> Result<(), ConfigError> {
		let url = Url::parse(value).map_err(|e| ConfigError::InvalidEndpoint {
			provider: self.name.clone(),
			field,
			detail: e.to_string(),
		})?;

		if url.scheme() != "http" && url.scheme() != "https" {
			return Err(ConfigError::InvalidEndpoint {
				provider: self.name.clone(),
				field,
				detail: format!("unsupported scheme {}", url.scheme()),
			});
		}

		Ok(())
	}
}
