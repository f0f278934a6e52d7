//! Error types for the OIDC relying-party core
//!
//! Startup-time misconfiguration is fatal (`ConfigError`); per-request
//! failures terminate only the current login attempt and surface to the
//! end user as a generic authentication failure while the specific
//! internal reason is kept for observability.

use thiserror::Error;

use crate::hooks::HookKind;

/// Startup-fatal configuration errors
///
/// Raised while building the provider registry or resolving hook
/// references. A process receiving one of these must not serve traffic.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
	/// Two providers registered under the same name
	#[error("duplicate provider name: {0}")]
	DuplicateProvider(String),

	/// Lookup for a provider name that was never registered
	#[error("unknown provider: {0}")]
	UnknownProvider(String),

	/// A required configuration field is empty
	#[error("provider {provider}: missing required field {field}")]
	MissingField { provider: String, field: &'static str },

	/// An endpoint URL failed validation
	#[error("provider {provider}: invalid {field}: {detail}")]
	InvalidEndpoint {
		provider: String,
		field: &'static str,
		detail: String,
	},

	/// A hook reference string is not of the form `module:symbol`
	#[error("invalid hook reference {reference:?}: {detail}")]
	InvalidHookReference { reference: String, detail: String },

	/// No export is registered under the reference
	#[error("unknown hook: {0}")]
	UnknownHook(String),

	/// Two exports registered under the same reference
	#[error("duplicate hook registration: {0}")]
	DuplicateHook(String),

	/// The export exists but has the wrong signature class for the slot
	#[error("hook {reference:?} is a {found} hook, expected {expected}")]
	HookKindMismatch {
		reference: String,
		expected: HookKind,
		found: HookKind,
	},

	/// The HTTP client could not be constructed
	#[error("http client error: {0}")]
	HttpClient(String),
}

/// Token validation failure sub-kind
///
/// The closed set of reasons a token is rejected. The end user only ever
/// sees a generic authentication failure; the kind is for logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenErrorKind {
	/// `exp` in the past (or `nbf` in the future) beyond clock skew
	Expired,
	/// Signature could not be verified against the provider's key source
	BadSignature,
	/// `aud` does not contain the provider's client id
	BadAudience,
	/// `iss` does not equal the provider's configured issuer
	BadIssuer,
	/// Structurally invalid token or inconsistent claims
	Malformed,
}

impl TokenErrorKind {
	/// Stable reason code used in logs
	pub fn as_str(&self) -> &'static str {
		match self {
			TokenErrorKind::Expired => "expired",
			TokenErrorKind::BadSignature => "bad-signature",
			TokenErrorKind::BadAudience => "bad-audience",
			TokenErrorKind::BadIssuer => "bad-issuer",
			TokenErrorKind::Malformed => "malformed",
		}
	}
}

impl std::fmt::Display for TokenErrorKind {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Token validation failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid token ({kind}): {detail}")]
pub struct TokenError {
	/// Specific sub-reason
	pub kind: TokenErrorKind,
	/// Human-readable detail, never shown to end users
	pub detail: String,
}

impl TokenError {
	pub fn new(kind: TokenErrorKind, detail: impl Into<String>) -> Self {
		Self {
			kind,
			detail: detail.into(),
		}
	}

	pub fn expired(detail: impl Into<String>) -> Self {
		Self::new(TokenErrorKind::Expired, detail)
	}

	pub fn bad_signature(detail: impl Into<String>) -> Self {
		Self::new(TokenErrorKind::BadSignature, detail)
	}

	pub fn bad_audience(detail: impl Into<String>) -> Self {
		Self::new(TokenErrorKind::BadAudience, detail)
	}

	pub fn bad_issuer(detail: impl Into<String>) -> Self {
		Self::new(TokenErrorKind::BadIssuer, detail)
	}

	pub fn malformed(detail: impl Into<String>) -> Self {
		Self::new(TokenErrorKind::Malformed, detail)
	}
}

/// Rejected post-login/post-logout redirect target
///
/// Never fatal: the state machine falls back to the provider's default
/// landing URI instead of failing the login.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RedirectError {
	/// Scheme other than http/https
	#[error("unsupported scheme: {0}")]
	UnsupportedScheme(String),

	/// http target while the provider requires https
	#[error("insecure scheme: https required")]
	InsecureScheme,

	/// Absolute target whose host is not allowlisted
	#[error("host not allowed: {0}")]
	HostNotAllowed(String),

	/// Target embeds a username or password
	#[error("credentials in redirect target")]
	CredentialsInUrl,

	/// Encoded host separators (open-redirect bypass attempt)
	#[error("encoded separator in redirect target")]
	EncodedSeparator,

	/// Anything else that does not parse as a usable target
	#[error("malformed redirect target: {0}")]
	MalformedTarget(String),
}

/// Network-boundary failures during the code exchange or userinfo fetch
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExchangeError {
	/// Transport-level error
	#[error("network error: {0}")]
	Network(String),

	/// Endpoint answered with a non-success status
	#[error("endpoint returned HTTP {status}")]
	Endpoint { status: u16 },

	/// Response body did not parse
	#[error("invalid response: {0}")]
	InvalidResponse(String),
}

impl From<reqwest::Error> for ExchangeError {
	fn from(error: reqwest::Error) -> Self {
		ExchangeError::Network(error.to_string())
	}
}

impl From<serde_json::Error> for ExchangeError {
	fn from(error: serde_json::Error) -> Self {
		ExchangeError::InvalidResponse(error.to_string())
	}
}

/// Failure inside a notify hook; caught and logged, never propagated
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("hook failed: {0}")]
pub struct HookError(pub String);

/// Failure inside the external user store
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("user store error: {0}")]
pub struct UserStoreError(pub String);

/// Failure inside the session store
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("session store error: {0}")]
pub struct SessionStoreError(pub String);

/// Outcome of the user-mapping step
///
/// `AccessDenied` is the expected rejection path (audience/group policy
/// inside a mapping hook); every other variant is an internal fault.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MappingError {
	/// The mapping hook rejected the login
	#[error("access denied: {0}")]
	AccessDenied(String),

	/// A claim the mapper depends on is absent
	#[error("missing claim: {0}")]
	MissingClaim(&'static str),

	/// The external user store failed
	#[error(transparent)]
	Store(#[from] UserStoreError),

	/// Any other fault inside a mapping hook
	#[error("mapping error: {0}")]
	Internal(String),
}

/// Internal reason a login attempt failed
///
/// Retained on [`FlowError::Failed`] for observability; the user-facing
/// message stays generic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
	/// The attempt outlived its TTL before the callback arrived
	AttemptExpired,
	/// Callback `state` did not match any live attempt
	StateMismatch,
	/// ID token nonce did not match the attempt's nonce
	NonceMismatch,
	/// The IdP returned an error response instead of a code
	ProviderError,
	/// The authorization-code exchange or userinfo fetch failed
	ExchangeFailed,
	/// A token failed validation
	TokenInvalid(TokenErrorKind),
	/// The user-mapping hook rejected the login
	AccessDenied,
	/// The user-mapping hook failed for any other reason
	MappingFailed,
	/// The session store failed during establishment
	SessionStore,
	/// Anything else
	Internal,
}

impl FailureReason {
	/// Stable reason code used in logs
	pub fn as_str(&self) -> &'static str {
		match self {
			FailureReason::AttemptExpired => "attempt_expired",
			FailureReason::StateMismatch => "state_mismatch",
			FailureReason::NonceMismatch => "nonce_mismatch",
			FailureReason::ProviderError => "provider_error",
			FailureReason::ExchangeFailed => "exchange_failed",
			FailureReason::TokenInvalid(_) => "token_invalid",
			FailureReason::AccessDenied => "access_denied",
			FailureReason::MappingFailed => "mapping_failed",
			FailureReason::SessionStore => "session_store",
			FailureReason::Internal => "internal",
		}
	}
}

impl std::fmt::Display for FailureReason {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Error returned by the login state machine
///
/// `Display` is deliberately generic: per-request failures must never
/// leak the internal reason to the end user.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FlowError {
	/// The attempt failed; see [`FailureReason`] for the internal cause
	#[error("authentication failed")]
	Failed(FailureReason),

	/// The request referenced a provider or hook that is not configured
	#[error("configuration error: {0}")]
	Configuration(#[from] ConfigError),
}

impl FlowError {
	/// Internal failure reason, if this is a per-attempt failure
	pub fn reason(&self) -> Option<&FailureReason> {
		match self {
			FlowError::Failed(reason) => Some(reason),
			FlowError::Configuration(_) => None,
		}
	}
}
