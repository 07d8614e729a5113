/**
 * Authentication Middleware
 *
 * Protects the REST routes. The bearer token from the `Authorization`
 * header is checked with the same `TokenValidator` the websocket handshake
 * uses, and the resulting identity is attached to the request.
 */

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::backend::auth::Identity;
use crate::backend::server::state::AppState;

/// Authenticated user attached to request extensions
#[derive(Clone, Debug, PartialEq)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    pub display_name: String,
}

impl From<Identity> for AuthenticatedUser {
    fn from(identity: Identity) -> Self {
        Self {
            user_id: identity.user_id,
            display_name: identity.display_name,
        }
    }
}

/// Authentication middleware
///
/// 1. Reads the `Authorization: Bearer <token>` header
/// 2. Validates the token
/// 3. Inserts an `AuthenticatedUser` into the request extensions
///
/// Returns 401 Unauthorized if the header is missing, malformed, or the
/// token does not validate.
pub async fn auth_middleware(
    State(app_state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let token = bearer_token(&request).ok_or_else(|| {
        tracing::debug!("Missing or malformed Authorization header");
        StatusCode::UNAUTHORIZED
    })?;

    let identity = app_state.validator.validate_token(token).map_err(|e| {
        tracing::debug!("Invalid token: {}", e);
        StatusCode::UNAUTHORIZED
    })?;

    request.extensions_mut().insert(AuthenticatedUser::from(identity));

    Ok(next.run(request).await)
}

fn bearer_token(request: &Request) -> Option<&str> {
    request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Extract authenticated user from request extensions
pub fn extract_authenticated_user(request: &Request) -> Result<AuthenticatedUser, StatusCode> {
    request
        .extensions()
        .get::<AuthenticatedUser>()
        .cloned()
        .ok_or_else(|| {
            tracing::warn!("AuthenticatedUser not found in request extensions");
            StatusCode::UNAUTHORIZED
        })
}

/// Axum extractor for the user set by `auth_middleware`
#[derive(Clone, Debug)]
pub struct AuthUser(pub AuthenticatedUser);

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user = parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or_else(|| {
                tracing::warn!("AuthenticatedUser not found in request extensions");
                StatusCode::UNAUTHORIZED
            })?;

        Ok(AuthUser(user))
    }
}
