//! Test helpers for the OIDC integration tests

#[path = "helpers/fixtures.rs"]
pub mod fixtures;
#[path = "helpers/mock_idp.rs"]
pub mod mock_idp;

// Re-export commonly used helpers
pub use fixtures::{TEST_KID, TEST_SECRET, id_claims, jwks_json, provider_for, sign_id_token};
pub use mock_idp::{ErrorMode, MockIdpServer};
