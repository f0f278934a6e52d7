//! Token endpoint client
//!
//! The two relying-party network calls of the login flow: exchanging an
//! authorization code for tokens and fetching the userinfo response.
//! Both run on a shared `reqwest` client with a bounded timeout; these
//! are the only places a login attempt may stall.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::ProviderConfig;
use crate::error::{ConfigError, ExchangeError};

/// Request timeout for token-endpoint and userinfo calls
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Token endpoint response (RFC 6749 §5.1)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
	/// OAuth2 access token, used against the userinfo endpoint
	pub access_token: String,

	/// Token type, normally `Bearer`
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub token_type: Option<String>,

	/// Access token lifetime in seconds
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub expires_in: Option<i64>,

	/// Refresh token, if the provider issued one
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub refresh_token: Option<String>,

	/// Raw ID token JWT
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub id_token: Option<String>,

	/// Granted scopes
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub scope: Option<String>,
}

/// HTTP client for the authorization-code exchange and userinfo fetch
#[derive(Clone)]
pub struct OAuth2Client {
	http: reqwest::Client,
}

impl OAuth2Client {
	/// Build a client with the default timeout
	pub fn new() -> Result<Self, ConfigError> {
		let http = reqwest::Client::builder()
			.timeout(HTTP_TIMEOUT)
			.build()
			.map_err(|e| ConfigError::HttpClient(e.to_string()))?;
		Ok(Self { http })
	}

	/// Wrap an existing `reqwest` client
	pub fn with_client(http: reqwest::Client) -> Self {
		Self { http }
	}

	/// Underlying client, shared with the JWKS cache
	pub fn http(&self) -> reqwest::Client {
		self.http.clone()
	}

	/// Exchange an authorization code for tokens at the provider's token
	/// endpoint
	pub async fn exchange_code(
		&self,
		provider: &ProviderConfig,
		code: &str,
	) -> Result<TokenResponse, ExchangeError> {
		let params = [
			("grant_type", "authorization_code"),
			("code", code),
			("redirect_uri", provider.redirect_uri.as_str()),
			("client_id", provider.client_id.as_str()),
			("client_secret", provider.client_secret.as_str()),
		];

		let response = self
			.http
			.post(&provider.token_endpoint)
			.form(&params)
			.send()
			.await?;

		let status = response.status();
		if !status.is_success() {
			return Err(ExchangeError::Endpoint {
				status: status.as_u16(),
			});
		}

		response
			.json::<TokenResponse>()
			.await
			.map_err(|e| ExchangeError::InvalidResponse(e.to_string()))
	}

	/// Fetch the raw userinfo response body with a bearer token
	///
	/// Returned as text: the token validator decides whether it is a
	/// signed JWT or a bare JSON object.
	pub async fn fetch_userinfo(
		&self,
		endpoint: &str,
		access_token: &str,
	) -> Result<String, ExchangeError> {
		let response = self
			.http
			.get(endpoint)
			.bearer_auth(access_token)
			.send()
			.await?;

		let status = response.status();
		if !status.is_success() {
			return Err(ExchangeError::Endpoint {
				status: status.as_u16(),
			});
		}

		response
			.text()
			.await
			.map_err(|e| ExchangeError::InvalidResponse(e.to_string()))
	}
}
