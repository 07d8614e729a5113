//! Authentication test helpers

use huddle::backend::auth::JwtValidator;
use uuid::Uuid;

/// Secret shared by every fixture
pub const TEST_SECRET: &str = "huddle-test-secret";

pub fn test_validator() -> JwtValidator {
    JwtValidator::new(TEST_SECRET)
}

/// Generate a token valid for one hour
pub fn token_for(user_id: Uuid, name: &str) -> String {
    test_validator()
        .create_token(user_id, Some(name), 3600)
        .expect("Failed to generate test token")
}

/// Create authorization header value
pub fn auth_header(token: &str) -> String {
    format!("Bearer {}", token)
}
