/**
 * Bearer Token Validation
 *
 * Token issuance belongs to the account service; the hub only has to turn a
 * bearer token into an identity. `JwtValidator` does that for HS256 tokens
 * whose `sub` claim is the user id and whose optional `name` claim is the
 * display name.
 */

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use uuid::Uuid;

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// User ID
    pub sub: String,
    /// Display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
    /// Issued at time (Unix timestamp)
    pub iat: u64,
}

/// Who a session belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: Uuid,
    pub display_name: String,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Token verification failed: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error("Invalid user ID in token: {0}")]
    InvalidSubject(String),
}

/// Resolves a bearer token to an identity
pub trait TokenValidator: Send + Sync {
    fn validate_token(&self, token: &str) -> Result<Identity, AuthError>;
}

/// HS256 JWT validator
#[derive(Clone)]
pub struct JwtValidator {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl JwtValidator {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    /// Create a token for a user
    ///
    /// Used by tests and local tooling; production tokens come from the
    /// account service with the same claims.
    pub fn create_token(&self, user_id: Uuid, name: Option<&str>, ttl_secs: u64) -> Result<String, AuthError> {
        let now = unix_now();
        let claims = Claims {
            sub: user_id.to_string(),
            name: name.map(str::to_string),
            exp: now + ttl_secs,
            iat: now,
        };
        Ok(encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?)
    }
}

impl TokenValidator for JwtValidator {
    fn validate_token(&self, token: &str) -> Result<Identity, AuthError> {
        let claims = decode::<Claims>(token, &self.decoding, &self.validation)?.claims;
        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AuthError::InvalidSubject(claims.sub.clone()))?;
        Ok(Identity {
            user_id,
            display_name: claims.name.unwrap_or_default(),
        })
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
