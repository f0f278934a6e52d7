//! JWKS caching
//!
//! Per-provider cache of the signing key set used for token validation.
//! URI sources are fetched lazily and cached with a TTL; the token
//! validator forces a single [`JwksCache::refresh`] when it encounters
//! an unknown key id (rotation). Inline sources are never refetched.

use chrono::{DateTime, Utc};
use jsonwebtoken::jwk::JwkSet;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::config::{JwksSource, ProviderConfig};
use crate::error::TokenError;

#[derive(Clone)]
struct CachedKeys {
	keys: Arc<JwkSet>,
	expires_at: DateTime<Utc>,
}

impl CachedKeys {
	fn is_expired(&self) -> bool {
		Utc::now() > self.expires_at
	}
}

/// Key-set cache keyed by provider name
pub struct JwksCache {
	http: reqwest::Client,
	cache: RwLock<HashMap<String, CachedKeys>>,
}

impl JwksCache {
	pub fn new(http: reqwest::Client) -> Self {
		Self {
			http,
			cache: RwLock::new(HashMap::new()),
		}
	}

	/// Current key set for a provider, from cache or freshly fetched
	pub async fn keys_for(&self, provider: &ProviderConfig) -> Result<Arc<JwkSet>, TokenError> {
		{
			let cache = self.cache.read().await;
			if let Some(cached) = cache.get(&provider.name) {
				if !cached.is_expired() {
					tracing::debug!(provider = %provider.name, "jwks cache hit");
					return Ok(cached.keys.clone());
				}
			}
		}

		self.refresh(provider).await
	}

	/// Refetch the provider's key set, replacing the cached entry
	///
	/// For inline sources this re-caches the configured keys without any
	/// network traffic.
	pub async fn refresh(&self, provider: &ProviderConfig) -> Result<Arc<JwkSet>, TokenError> {
		let keys = match &provider.jwks_source {
			JwksSource::Inline(keys) => Arc::new(keys.clone()),
			JwksSource::Uri(uri) => {
				tracing::debug!(provider = %provider.name, uri = %uri, "fetching jwks");
				Arc::new(self.fetch(uri).await?)
			}
		};

		let mut cache = self.cache.write().await;
		cache.insert(
			provider.name.clone(),
			CachedKeys {
				keys: keys.clone(),
				expires_at: Utc::now() + provider.jwks_ttl(),
			},
		);

		Ok(keys)
	}

	async fn fetch(&self, uri: &str) -> Result<JwkSet, TokenError> {
		let response = self
			.http
			.get(uri)
			.header("Accept", "application/json")
			.send()
			.await
			.map_err(|e| TokenError::bad_signature(format!("failed to fetch JWKS: {}", e)))?;

		if !response.status().is_success() {
			return Err(TokenError::bad_signature(format!(
				"failed to fetch JWKS: HTTP {}",
				response.status()
			)));
		}

		response
			.json::<JwkSet>()
			.await
			.map_err(|e| TokenError::bad_signature(format!("invalid JWKS document: {}", e)))
	}
}
