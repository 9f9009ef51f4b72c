use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use thiserror::Error;

use super::error::ApiError;
use super::AppState;
use crate::storage::{DatabaseError, User};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("no authentication info found")]
    Missing,

    #[error("malformed authorization header")]
    Malformed,

    #[error("couldn't get user")]
    UnknownKey,
}

/// Extract the key from an `Authorization: ApiKey <key>` header.
pub fn get_api_key(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers.get(AUTHORIZATION).ok_or(AuthError::Missing)?;
    let value = value.to_str().map_err(|_| AuthError::Malformed)?;
    if value.is_empty() {
        return Err(AuthError::Missing);
    }

    match value.split(' ').collect::<Vec<_>>().as_slice() {
        ["ApiKey", key] if !key.is_empty() => Ok(key),
        _ => Err(AuthError::Malformed),
    }
}

/// The user owning the request's API key.
///
/// Handlers that take this extractor reject unauthenticated requests with 401
/// before their body runs.
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let key = get_api_key(&parts.headers)?;
        match state.db.get_user_by_api_key(key).await {
            Ok(user) => Ok(AuthUser(user)),
            Err(DatabaseError::NotFound(_)) => Err(AuthError::UnknownKey.into()),
            Err(e) => Err(e.into()),
        }
    }
}
