//! # Reinhardt OIDC
//!
//! Multi-provider OpenID Connect relying-party authentication core.
//! Drives the login/logout protocol exchange with one or more identity
//! providers, validates tokens, maps claims to a local user through a
//! customizable hook pipeline, and enforces redirect-target safety.
//!
//! # Components
//!
//! - **Provider registry**: immutable per-provider configuration, built
//!   once at startup; duplicate names and malformed hook references are
//!   fatal before traffic is served
//! - **Login state machine**: initiate, callback/exchange, user mapping,
//!   session establishment, logout
//! - **Token validator**: signature (JWKS with rotation retry), issuer,
//!   expiry with bounded clock skew, audience membership
//! - **Redirect validator**: host-allowlisted `next` targets with a safe
//!   fallback, never a hard failure
//! - **Hook resolver**: `"<module-path>:<symbol-name>"` references to
//!   typed capabilities for login/logout notification and user mapping
//!
//! # Security Features
//!
//! - **CSRF protection**: single-use `state` validated in constant time
//! - **Replay prevention**: `nonce` round-tripped through the ID token
//! - **Open-redirect defense**: scheme/host allowlisting, rejection of
//!   credentials, protocol-relative targets, and encoded separators
//! - **Fail-closed configuration**: misconfigured providers and hooks
//!   abort startup, never degrade at request time
//!
//! # Example
//!
//! ```ignore
//! use reinhardt_oidc::{
//!     HookRegistry, HookResolver, InMemoryUserStore, LoginFlow,
//!     ProviderConfig, ProviderRegistry,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let hooks = Arc::new(HookResolver::new(HookRegistry::new()));
//!     let registry = Arc::new(
//!         ProviderRegistry::builder()
//!             .register(ProviderConfig::keycloak(
//!                 "https://sso.example/auth/realms/demo",
//!                 "my-client",
//!                 "s3cret",
//!                 "https://app.local/oidc/callback",
//!             ))
//!             .unwrap()
//!             .build(&hooks)
//!             .unwrap(),
//!     );
//!
//!     let flow = LoginFlow::new(registry, hooks, Arc::new(InMemoryUserStore::new())).unwrap();
//!
//!     // Redirect the client to `initiated.authorization_url`...
//!     let initiated = flow.initiate("keycloak", Some("/profile")).await.unwrap();
//! }
//! ```

pub mod claims;
pub mod config;
pub mod error;
pub mod exchange;
pub mod flow;
pub mod hooks;
pub mod jwks;
pub mod mapper;
pub mod redirect;
pub mod registry;
pub mod session;
pub mod token;

// Re-export claim types
pub use claims::{IdTokenClaims, UserinfoClaims};

// Re-export configuration and registry
pub use config::{JwksSource, ProviderConfig};
pub use registry::{ProviderRegistry, ProviderRegistryBuilder};

// Re-export the error taxonomy
pub use error::{
	ConfigError, ExchangeError, FailureReason, FlowError, HookError, MappingError, RedirectError,
	SessionStoreError, TokenError, TokenErrorKind, UserStoreError,
};

// Re-export the flow
pub use flow::{
	AttemptStore, CallbackParams, EstablishedLogin, FlowState, InMemoryAttemptStore,
	InitiatedLogin, LoginAttempt, LoginFlow, LogoutOutcome, TakenAttempt,
};

// Re-export hooks
pub use hooks::{
	HookExport, HookKind, HookRegistry, HookResolver, LoginHook, LogoutHook, RequestContext,
	UserMappingHook,
};

// Re-export the user mapping layer
pub use mapper::{
	DefaultUserMapper, GroupSyncUserMapper, InMemoryUserStore, LocalUser, UserStore,
};

// Re-export redirect validation
pub use redirect::{SafeUri, validate as validate_redirect};

// Re-export sessions and tokens
pub use exchange::{OAuth2Client, TokenResponse};
pub use jwks::JwksCache;
pub use session::{AuthSession, InMemorySessionStore, SessionId, SessionStore};
pub use token::TokenValidator;
