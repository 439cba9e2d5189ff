use axum::{
    extract::{FromRequest, FromRequestParts, Query, Request},
    http::request::Parts,
    Json,
};
use axum_extra::extract::CookieJar;
use serde::de::DeserializeOwned;

use crate::{
    db::models::UserRecord,
    names,
    rejections::{AppError, ResultExt},
    services::identity::CurrentUser,
    AppState,
};

/// Guest id minted by the guest-cookie middleware for a request that arrived
/// without one, so the first request already has an identity.
#[derive(Clone, Debug)]
pub struct IssuedGuestId(pub String);

/// Whoever is calling, if anyone: an authenticated account, a guest, or
/// nobody at all.
pub struct MaybeUser(pub Option<CurrentUser>);

impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);

        let login_token = jar
            .get(names::USER_SESSION_COOKIE_NAME)
            .map(|c| c.value().to_string());
        let guest_id = jar
            .get(names::GUEST_COOKIE_NAME)
            .map(|c| c.value().to_string())
            .or_else(|| parts.extensions.get::<IssuedGuestId>().map(|g| g.0.clone()));

        let user = state
            .identity
            .resolve(login_token.as_deref(), guest_id.as_deref())
            .await
            .reject("could not resolve user")?;

        Ok(MaybeUser(user))
    }
}

/// Guard extractor for operations that need an authenticated account.
/// Guests and anonymous callers are rejected with `Unauthorized`.
pub struct AuthGuard(pub UserRecord);

impl FromRequestParts<AppState> for AuthGuard {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let Some(login_token) = jar.get(names::USER_SESSION_COOKIE_NAME) else {
            return Err(AppError::Unauthorized);
        };

        // Guest cookies are not consulted, so no guest row is created here
        match state
            .identity
            .resolve(Some(login_token.value()), None)
            .await
            .reject("could not resolve user")?
        {
            Some(CurrentUser::Authenticated(user)) => Ok(AuthGuard(user)),
            _ => Err(AppError::Unauthorized),
        }
    }
}

/// `Json` whose rejection is our own error body.
pub struct JsonBody<T>(pub T);

impl<S: Send + Sync, T: DeserializeOwned> FromRequest<S> for JsonBody<T> {
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| {
                tracing::debug!("rejected request body: {e}");
                AppError::BadRequest("malformed request body")
            })?;
        Ok(JsonBody(value))
    }
}

/// `Query` whose rejection is our own error body.
pub struct QueryParams<T>(pub T);

impl<S: Send + Sync, T: DeserializeOwned> FromRequestParts<S> for QueryParams<T> {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|e| {
                tracing::debug!("rejected query string: {e}");
                AppError::BadRequest("malformed query string")
            })?;
        Ok(QueryParams(value))
    }
}
