use axum::{extract::FromRequestParts, http::request::Parts};

use crate::chat::UserId;
use crate::error::ChatError;

/// Header the upstream auth layer sets after resolving the caller's
/// credentials. The id is trusted verbatim; token verification lives in
/// the auth service, not here.
pub const USER_ID_HEADER: &str = "x-user-id";

pub struct AuthUser(pub UserId);

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ChatError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<UserId>().ok())
            .map(AuthUser)
            .ok_or(ChatError::Unauthorized)
    }
}
