//! Shared fixtures: signing keys, claim builders, provider configs

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde_json::json;

use reinhardt_oidc::{JwksSource, ProviderConfig};

use super::mock_idp::MockIdpServer;

/// Key id served by the mock IdP's JWKS endpoint
pub const TEST_KID: &str = "itest-key";

/// HS256 secret matching [`TEST_KID`]
pub const TEST_SECRET: &[u8] = b"integration-test-signing-key-0001";

/// JWKS document with a single symmetric signing key
pub fn jwks_json(kid: &str, secret: &[u8]) -> String {
	json!({
		"keys": [{
			"kty": "oct",
			"use": "sig",
			"kid": kid,
			"alg": "HS256",
			"k": URL_SAFE_NO_PAD.encode(secret)
		}]
	})
	.to_string()
}

/// Sign an ID token the way the mock IdP would
pub fn sign_id_token(claims: &serde_json::Value, kid: &str, secret: &[u8]) -> String {
	let mut header = Header::new(Algorithm::HS256);
	header.kid = Some(kid.to_string());
	jsonwebtoken::encode(&header, claims, &EncodingKey::from_secret(secret)).unwrap()
}

/// Baseline ID token claims for the mock IdP
pub fn id_claims(issuer: &str, nonce: &str) -> serde_json::Value {
	let now = Utc::now().timestamp();
	json!({
		"iss": issuer,
		"sub": "user123",
		"aud": "my-client",
		"exp": now + 3600,
		"iat": now,
		"nonce": nonce,
		"email": "user@example.com"
	})
}

/// Provider configuration wired to a running mock IdP
pub fn provider_for(server: &MockIdpServer) -> ProviderConfig {
	let mut config = ProviderConfig::new(
		"keycloak",
		"my-client",
		"s3cret",
		server.base_url(),
		server.authorization_url(),
		server.token_url(),
		JwksSource::Uri(server.jwks_url()),
		"http://app.local/oidc/callback",
	);
	config.userinfo_endpoint = Some(server.userinfo_url());
	config.allowed_redirect_hosts.insert("app.local".to_string());
	config.redirect_requires_https = false;
	config
}
