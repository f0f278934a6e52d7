//! JWKS rotation tests: unknown key ids trigger one refresh-and-retry

use std::sync::Arc;

use helpers::{MockIdpServer, TEST_KID, TEST_SECRET, id_claims, jwks_json, provider_for, sign_id_token};
use reinhardt_oidc::{JwksCache, TokenErrorKind, TokenValidator};

#[path = "../helpers.rs"]
mod helpers;

const ROTATED_KID: &str = "rotated-key";
const ROTATED_SECRET: &[u8] = b"integration-test-signing-key-0002";

#[tokio::test]
async fn test_rotated_key_found_after_refresh() {
	// Arrange: prime the cache with the original key
	let server = MockIdpServer::start(jwks_json(TEST_KID, TEST_SECRET)).await;
	let provider = provider_for(&server);
	let validator = TokenValidator::new(Arc::new(JwksCache::new(reqwest::Client::new())));

	let claims = id_claims(&server.base_url(), "nonce-1");
	let original = sign_id_token(&claims, TEST_KID, TEST_SECRET);
	validator
		.validate_id_token(&original, &provider)
		.await
		.unwrap();

	// Act: the provider rotates its keys, then issues a token with the
	// new key id that is absent from the cached set
	server.set_jwks(jwks_json(ROTATED_KID, ROTATED_SECRET));
	let rotated = sign_id_token(&claims, ROTATED_KID, ROTATED_SECRET);
	let result = validator.validate_id_token(&rotated, &provider).await;

	// Assert: one refresh finds the rotated key
	assert!(result.is_ok(), "rotated key should validate after refresh");
}

#[tokio::test]
async fn test_unknown_key_fails_after_single_refresh() {
	// Arrange
	let server = MockIdpServer::start(jwks_json(TEST_KID, TEST_SECRET)).await;
	let provider = provider_for(&server);
	let validator = TokenValidator::new(Arc::new(JwksCache::new(reqwest::Client::new())));

	// Act: key id the provider never served
	let claims = id_claims(&server.base_url(), "nonce-1");
	let ghost = sign_id_token(&claims, "ghost-key", TEST_SECRET);
	let error = validator
		.validate_id_token(&ghost, &provider)
		.await
		.unwrap_err();

	// Assert
	assert_eq!(error.kind, TokenErrorKind::BadSignature);
}

#[tokio::test]
async fn test_stale_cache_not_used_for_old_key_after_rotation() {
	// Arrange: prime with the original key, then rotate
	let server = MockIdpServer::start(jwks_json(TEST_KID, TEST_SECRET)).await;
	let provider = provider_for(&server);
	let validator = TokenValidator::new(Arc::new(JwksCache::new(reqwest::Client::new())));

	let claims = id_claims(&server.base_url(), "nonce-1");
	validator
		.validate_id_token(&sign_id_token(&claims, TEST_KID, TEST_SECRET), &provider)
		.await
		.unwrap();
	server.set_jwks(jwks_json(ROTATED_KID, ROTATED_SECRET));

	// Old-kid tokens still validate from cache until its TTL elapses
	let old_token = sign_id_token(&claims, TEST_KID, TEST_SECRET);
	assert!(validator.validate_id_token(&old_token, &provider).await.is_ok());

	// New-kid tokens force the refresh; afterwards the old kid is gone
	validator
		.validate_id_token(&sign_id_token(&claims, ROTATED_KID, ROTATED_SECRET), &provider)
		.await
		.unwrap();
	let error = validator
		.validate_id_token(&old_token, &provider)
		.await
		.unwrap_err();
	assert_eq!(error.kind, TokenErrorKind::BadSignature);
}
