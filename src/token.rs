//! Token validation
//!
//! Verifies ID tokens and userinfo responses: signature against the
//! provider's key source (with a single refresh-and-retry on unknown key
//! ids), issuer equality, time-based claims within a bounded clock skew,
//! and audience membership of the provider's client id. Failures carry a
//! [`TokenErrorKind`] sub-reason; the end user only ever sees a generic
//! authentication failure.

use chrono::Utc;
use jsonwebtoken::jwk::{Jwk, JwkSet};
use jsonwebtoken::{Algorithm, DecodingKey, Header, Validation, decode, decode_header};
use std::str::FromStr;
use std::sync::Arc;

use crate::claims::{IdTokenClaims, UserinfoClaims};
use crate::config::ProviderConfig;
use crate::error::TokenError;
use crate::jwks::JwksCache;

/// Validates tokens against per-provider configuration
pub struct TokenValidator {
	jwks: Arc<JwksCache>,
}

impl TokenValidator {
	pub fn new(jwks: Arc<JwksCache>) -> Self {
		Self { jwks }
	}

	/// Validate a raw ID token
	///
	/// Signature, issuer, expiry/issued-at/not-before (within the
	/// provider's clock skew), and audience membership. Nonce equality
	/// against the login attempt is the state machine's job.
	pub async fn validate_id_token(
		&self,
		raw: &str,
		provider: &ProviderConfig,
	) -> Result<IdTokenClaims, TokenError> {
		let header = decode_header(raw)
			.map_err(|e| TokenError::malformed(format!("invalid JWT header: {}", e)))?;

		let (key, algorithm) = self.decoding_key_for(provider, &header).await?;

		let mut validation = Validation::new(algorithm);
		validation.validate_exp = false;
		validation.validate_nbf = false;
		validation.validate_aud = false;
		validation.set_required_spec_claims::<&str>(&[]);

		let data = decode::<IdTokenClaims>(raw, &key, &validation).map_err(map_decode_error)?;
		let claims = data.claims;

		self.check_id_claims(&claims, provider)?;
		Ok(claims)
	}

	/// Validate a raw userinfo response
	///
	/// Accepts either a signed JWT (verified like an ID token) or a bare
	/// JSON object. Registered claims are checked when present; userinfo
	/// responses commonly omit them.
	pub async fn validate_userinfo(
		&self,
		raw: &str,
		provider: &ProviderConfig,
	) -> Result<UserinfoClaims, TokenError> {
		let trimmed = raw.trim();

		let claims: UserinfoClaims = if trimmed.starts_with('{') {
			serde_json::from_str(trimmed)
				.map_err(|e| TokenError::malformed(format!("invalid userinfo JSON: {}", e)))?
		} else {
			let header = decode_header(trimmed)
				.map_err(|e| TokenError::malformed(format!("invalid userinfo JWT: {}", e)))?;
			let (key, algorithm) = self.decoding_key_for(provider, &header).await?;

			let mut validation = Validation::new(algorithm);
			validation.validate_exp = false;
			validation.validate_nbf = false;
			validation.validate_aud = false;
			validation.set_required_spec_claims::<&str>(&[]);

			decode::<UserinfoClaims>(trimmed, &key, &validation)
				.map_err(map_decode_error)?
				.claims
		};

		self.check_userinfo_claims(&claims, provider)?;
		Ok(claims)
	}

	/// Locate the decoding key for a token header, refreshing the key
	/// source once when the key id is unknown (rotation)
	async fn decoding_key_for(
		&self,
		provider: &ProviderConfig,
		header: &Header,
	) -> Result<(DecodingKey, Algorithm), TokenError> {
		let keys = self.jwks.keys_for(provider).await?;
		if let Some(jwk) = find_key(&keys, header) {
			return build_key(jwk, header);
		}

		tracing::debug!(
			provider = %provider.name,
			kid = ?header.kid,
			"key not in cached JWKS, refreshing"
		);
		let keys = self.jwks.refresh(provider).await?;
		match find_key(&keys, header) {
			Some(jwk) => build_key(jwk, header),
			None => Err(TokenError::bad_signature(match &header.kid {
				Some(kid) => format!("key {:?} not found in JWKS after refresh", kid),
				None => "token has no kid and key set is ambiguous".to_string(),
			})),
		}
	}

	fn check_id_claims(
		&self,
		claims: &IdTokenClaims,
		provider: &ProviderConfig,
	) -> Result<(), TokenError> {
		if claims.iss != provider.issuer {
			return Err(TokenError::bad_issuer(format!(
				"issuer {:?} does not match {:?}",
				claims.iss, provider.issuer
			)));
		}

		let now = Utc::now().timestamp();
		let skew = provider.clock_skew_secs as i64;

		if claims.exp <= now - skew {
			return Err(TokenError::expired("token has expired"));
		}
		if let Some(nbf) = claims.nbf {
			if nbf > now + skew {
				return Err(TokenError::expired("token is not yet valid (nbf)"));
			}
		}
		if claims.iat > now + skew {
			return Err(TokenError::malformed("token issued in the future (iat)"));
		}

		if !claims.has_audience(&provider.client_id) {
			return Err(TokenError::bad_audience(format!(
				"audience {:?} does not contain {:?}",
				claims.aud, provider.client_id
			)));
		}

		Ok(())
	}

	fn check_userinfo_claims(
		&self,
		claims: &UserinfoClaims,
		provider: &ProviderConfig,
	) -> Result<(), TokenError> {
		if let Some(iss) = &claims.iss {
			if iss != &provider.issuer {
				return Err(TokenError::bad_issuer(format!(
					"userinfo issuer {:?} does not match {:?}",
					iss, provider.issuer
				)));
			}
		}

		if let Some(aud) = &claims.aud {
			if !aud.iter().any(|a| a == &provider.client_id) {
				return Err(TokenError::bad_audience(format!(
					"userinfo audience {:?} does not contain {:?}",
					aud, provider.client_id
				)));
			}
		}

		if let Some(exp) = claims.exp {
			let now = Utc::now().timestamp();
			if exp <= now - provider.clock_skew_secs as i64 {
				return Err(TokenError::expired("userinfo token has expired"));
			}
		}

		Ok(())
	}
}

fn find_key<'a>(keys: &'a JwkSet, header: &Header) -> Option<&'a Jwk> {
	match &header.kid {
		Some(kid) => keys.find(kid),
		// No kid: only unambiguous with a single-key set
		None if keys.keys.len() == 1 => keys.keys.first(),
		None => None,
	}
}

fn build_key(jwk: &Jwk, header: &Header) -> Result<(DecodingKey, Algorithm), TokenError> {
	let key = DecodingKey::from_jwk(jwk)
		.map_err(|e| TokenError::bad_signature(format!("invalid JWK: {}", e)))?;

	let algorithm = jwk
		.common
		.key_algorithm
		.and_then(|ka| Algorithm::from_str(&ka.to_string()).ok())
		.unwrap_or(header.alg);

	Ok((key, algorithm))
}

fn map_decode_error(error: jsonwebtoken::errors::Error) -> TokenError {
	use jsonwebtoken::errors::ErrorKind;

	match error.kind() {
		ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm | ErrorKind::InvalidKeyFormat => {
			TokenError::bad_signature(error.to_string())
		}
		_ => TokenError::malformed(error.to_string()),
	}
}
