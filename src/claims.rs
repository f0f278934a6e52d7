//! Parsed OIDC claim sets
//!
//! Claim structs produced by the token validator. Both are immutable
//! once constructed and scoped to a single authentication attempt.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// ID token claims
///
/// The registered claims the relying party validates, plus whatever else
/// the provider included (retained in `additional_claims`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdTokenClaims {
	/// Issuer
	pub iss: String,

	/// Subject (provider-side user ID)
	pub sub: String,

	/// Audience: the set of client ids this token is valid for.
	/// Providers emit either a single string or an array; both parse.
	#[serde(deserialize_with = "deserialize_audience")]
	pub aud: Vec<String>,

	/// Expiration time (Unix timestamp)
	pub exp: i64,

	/// Issued at time (Unix timestamp)
	pub iat: i64,

	/// Not before (Unix timestamp, optional)
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub nbf: Option<i64>,

	/// Nonce (replay attack prevention)
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub nonce: Option<String>,

	/// Email address
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub email: Option<String>,

	/// Email verified flag
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub email_verified: Option<bool>,

	/// Additional claims (provider-specific)
	#[serde(flatten)]
	pub additional_claims: HashMap<String, Value>,
}

impl IdTokenClaims {
	/// Audience membership check: true if `client_id` is one of the
	/// audiences this token was issued for.
	pub fn has_audience(&self, client_id: &str) -> bool {
		self.aud.iter().any(|aud| aud == client_id)
	}
}

/// Userinfo claims
///
/// Fetched from the userinfo endpoint (bare JSON or signed JWT) or
/// derived from the ID token when the provider has no userinfo endpoint.
/// Registered claims are optional here: userinfo responses commonly omit
/// them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserinfoClaims {
	/// Subject (provider-side user ID)
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub sub: Option<String>,

	/// Issuer, present when the userinfo response is a signed JWT
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub iss: Option<String>,

	/// Audience, present when the userinfo response is a signed JWT
	#[serde(
		default,
		deserialize_with = "deserialize_optional_audience",
		skip_serializing_if = "Option::is_none"
	)]
	pub aud: Option<Vec<String>>,

	/// Expiration time, present when the userinfo response is a signed JWT
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub exp: Option<i64>,

	/// Email address
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub email: Option<String>,

	/// Email verified flag
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub email_verified: Option<bool>,

	/// Full name
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub name: Option<String>,

	/// Group names asserted by the provider
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub groups: Option<Vec<String>>,

	/// Additional claims (provider-specific)
	#[serde(flatten)]
	pub additional_claims: HashMap<String, Value>,
}

impl UserinfoClaims {
	/// Look up a provider-specific claim by name
	pub fn get(&self, name: &str) -> Option<&Value> {
		self.additional_claims.get(name)
	}
}

impl From<&IdTokenClaims> for UserinfoClaims {
	fn from(id_token: &IdTokenClaims) -> Self {
		// Promote the claims this struct names; the rest stay flattened
		let mut additional_claims = id_token.additional_claims.clone();
		let name = additional_claims
			.remove("name")
			.and_then(|v| v.as_str().map(str::to_string));
		let groups = additional_claims.remove("groups").and_then(|v| {
			v.as_array().map(|items| {
				items
					.iter()
					.filter_map(|item| item.as_str().map(str::to_string))
					.collect()
			})
		});

		UserinfoClaims {
			sub: Some(id_token.sub.clone()),
			iss: Some(id_token.iss.clone()),
			aud: Some(id_token.aud.clone()),
			exp: Some(id_token.exp),
			email: id_token.email.clone(),
			email_verified: id_token.email_verified,
			name,
			groups,
			additional_claims,
		}
	}
}

/// Deserialize `aud` as either a single string or an array of strings
fn deserialize_audience<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
	D: serde::Deserializer<'de>,
{
	use serde::de::{self, Visitor};

	struct AudienceVisitor;

	impl<'de> Visitor<'de> for AudienceVisitor {
		type Value = Vec<String>;

		fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
			formatter.write_str("string or array of strings")
		}

		fn visit_str<E>(self, value: &str) -> Result<Vec<String>, E>
		where
			E: de::Error,
		{
			Ok(vec![value.to_string()])
		}

		fn visit_seq<A>(self, mut seq: A) -> Result<Vec<String>, A::Error>
		where
			A: de::SeqAccess<'de>,
		{
			let mut values = Vec::new();
			while let Some(value) = seq.next_element()? {
				values.push(value);
			}
			Ok(values)
		}
	}

	deserializer.deserialize_any(AudienceVisitor)
}

fn deserialize_optional_audience<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
	D: serde::Deserializer<'de>,
{
	deserialize_audience(deserializer).map(Some)
}
