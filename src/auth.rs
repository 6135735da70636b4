//! Bearer-token sessions.
//!
//! Tokens are opaque strings issued by `SessionStore::create_session`; the
//! extractors below resolve them to a `User` per request.

use axum::{async_trait, extract::FromRequestParts};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use chrono::Utc;
use http::request::Parts;

use crate::{error::AppError, models::User, routes::AppState};

/// The signed-in user. Rejects with 401 when the header is missing, the
/// token is unknown or the session expired.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

/// Like [`CurrentUser`] for endpoints that also serve anonymous visitors.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<User>);

async fn resolve(parts: &mut Parts, state: &AppState) -> Result<Option<User>, AppError> {
    let Ok(TypedHeader(Authorization(bearer))) =
        TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state).await
    else {
        return Ok(None);
    };
    Ok(state.store.user_for_token(bearer.token(), Utc::now()).await?)
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        match resolve(parts, state).await? {
            Some(user) => Ok(CurrentUser(user)),
            None => Err(AppError::Unauthenticated),
        }
    }
}

#[async_trait]
impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(MaybeUser(resolve(parts, state).await?))
    }
}
