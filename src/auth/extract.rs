//! Extractors for the user hydrated by [`CurrentUserLayer`](crate::middleware::CurrentUserLayer).

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::db::User;
use crate::error::AppError;

/// Request extension written once per request by user hydration.
///
/// `None` means the request is anonymous: no session user, or the account
/// is missing or inactive. The extension's presence alone means hydration
/// already ran.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Option<User>);

/// The logged-in user. Only valid behind `RequireUserLayer`.
///
/// A missing user here is a routing bug and answers 500.
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match parts.extensions.get::<CurrentUser>() {
            Some(CurrentUser(Some(user))) => Ok(AuthUser(user.clone())),
            _ => Err(AppError::Internal(format!(
                "AuthUser extracted on unguarded route {}",
                parts.uri.path()
            ))),
        }
    }
}

/// The logged-in user if there is one.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<User>);

impl<S> FromRequestParts<S> for MaybeUser
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeUser(
            parts
                .extensions
                .get::<CurrentUser>()
                .and_then(|current| current.0.clone()),
        ))
    }
}
