//! Redirect target validation
//!
//! Decides whether a client-supplied post-login/post-logout `next`
//! target is safe to redirect to. Rejection is never fatal: callers fall
//! back to the provider's default landing location.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use url::Url;

use crate::error::RedirectError;

/// A redirect target that passed validation
///
/// The only way to obtain one is through [`validate`], so any response
/// built from a `SafeUri` has been checked against the allowlist.
/// Serializable so pending attempts can live in an external store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafeUri(String);

impl SafeUri {
	pub fn as_str(&self) -> &str {
		&self.0
	}

	pub fn into_string(self) -> String {
		self.0
	}
}

impl std::fmt::Display for SafeUri {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(&self.0)
	}
}

/// Validate a client-supplied redirect target
///
/// Relative path references (leading `/`) are accepted unconditionally
/// as same-origin. Absolute URIs must be http(s) — https only when
/// `requires_https` — and their host must be a case-insensitive exact
/// match against `allowed_hosts`. Credentials, protocol-relative
/// targets, backslash separators, encoded host separators, and
/// protocol-confusing fragments are rejected outright.
pub fn validate(
	candidate: &str,
	allowed_hosts: &HashSet<String>,
	requires_https: bool,
) -> Result<SafeUri, RedirectError> {
	if candidate.is_empty() {
		return Err(RedirectError::MalformedTarget("empty target".to_string()));
	}

	if candidate
		.chars()
		.any(|c| c.is_control() || c.is_whitespace())
	{
		return Err(RedirectError::MalformedTarget(
			"control or whitespace character".to_string(),
		));
	}

	if candidate.contains('\\') {
		return Err(RedirectError::MalformedTarget(
			"backslash separator".to_string(),
		));
	}

	// Single- or double-encoded separators that survive one round of
	// decoding can smuggle an authority past a path check.
	let lowered = candidate.to_ascii_lowercase();
	if lowered.contains("%2f%2f") || lowered.contains("%5c") || lowered.contains("%252f") {
		return Err(RedirectError::EncodedSeparator);
	}

	if candidate.starts_with("//") {
		return Err(RedirectError::MalformedTarget(
			"protocol-relative target".to_string(),
		));
	}

	if let Some(fragment) = candidate.split_once('#').map(|(_, fragment)| fragment) {
		if fragment.starts_with("//") {
			return Err(RedirectError::MalformedTarget(
				"authority in fragment".to_string(),
			));
		}
	}

	match Url::parse(candidate) {
		Ok(url) => {
			let scheme = url.scheme();
			if scheme != "http" && scheme != "https" {
				return Err(RedirectError::UnsupportedScheme(scheme.to_string()));
			}
			if requires_https && scheme == "http" {
				return Err(RedirectError::InsecureScheme);
			}
			if !url.username().is_empty() || url.password().is_some() {
				return Err(RedirectError::CredentialsInUrl);
			}

			let host = url
				.host_str()
				.ok_or_else(|| RedirectError::MalformedTarget("missing host".to_string()))?;
			let allowed = allowed_hosts
				.iter()
				.any(|allowed| allowed.eq_ignore_ascii_case(host));
			if !allowed {
				return Err(RedirectError::HostNotAllowed(host.to_string()));
			}

			Ok(SafeUri(candidate.to_string()))
		}
		Err(url::ParseError::RelativeUrlWithoutBase) => {
			if !candidate.starts_with('/') {
				return Err(RedirectError::MalformedTarget(
					"relative target must be path-absolute".to_string(),
				));
			}
			Ok(SafeUri(candidate.to_string()))
		}
		Err(e) => Err(RedirectError::MalformedTarget(e.to_string())),
	}
}
