//! Caller identity from upstream proxy headers.
//!
//! DESIGN
//! ======
//! Authentication happens in front of this service: the identity proxy sets
//! `x-user-id` (required) plus optional profile headers on every request it
//! lets through. Requests without a user id are rejected with 401.

use axum::http::StatusCode;
use axum::http::request::Parts;

use super::ApiError;
use crate::services::quota::UserProfile;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_EMAIL_HEADER: &str = "x-user-email";
pub const USER_NAME_HEADER: &str = "x-user-name";
pub const USER_PHOTO_HEADER: &str = "x-user-photo";

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Please sign in to use the editor.")]
    MissingUser,
}

impl crate::error::ErrorCode for AuthError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::MissingUser => "E_UNAUTHENTICATED",
        }
    }
}

fn header(parts: &Parts, name: &str) -> Option<String> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}

// =============================================================================
// AUTH EXTRACTOR
// =============================================================================

/// Authenticated user taken from proxy headers.
/// Use as a handler parameter to require authentication.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub profile: UserProfile,
}

impl AuthUser {
    #[must_use]
    pub fn uid(&self) -> &str {
        &self.profile.uid
    }
}

impl<S> axum::extract::FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Some(uid) = header(parts, USER_ID_HEADER) else {
            return Err(ApiError::new(StatusCode::UNAUTHORIZED, &AuthError::MissingUser));
        };

        let profile = UserProfile {
            email: header(parts, USER_EMAIL_HEADER).unwrap_or_default(),
            display_name: header(parts, USER_NAME_HEADER).unwrap_or_default(),
            photo_url: header(parts, USER_PHOTO_HEADER),
            uid,
        };
        Ok(Self { profile })
    }
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;
