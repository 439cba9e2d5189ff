use axum::{
    extract::State,
    http::{header::SET_COOKIE, HeaderMap, HeaderValue, StatusCode},
    response::IntoResponse,
    routing::{delete, get, post, put},
    Json, Router,
};
use axum_extra::extract::CookieJar;

use crate::{
    db::models::UserRecord,
    extractors::{AuthGuard, JsonBody, MaybeUser},
    models::{AuthCallbackBody, DisplayNameBody, UserResponse},
    names,
    rejections::{AppError, ResultExt},
    services::identity::{AccountProfile, DisplayNameOutcome, SignInOutcome},
    utils, AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(names::AUTH_CALLBACK_URL, post(auth_callback))
        .route(names::LOGOUT_URL, post(logout))
        .route(names::CURRENT_USER_URL, get(current_user))
        .route(names::DISPLAY_NAME_URL, put(update_display_name))
        .route(names::USER_URL, delete(delete_user))
}

fn set_cookies(cookies: &[String]) -> Result<HeaderMap, AppError> {
    let mut headers = HeaderMap::new();
    for cookie in cookies {
        headers.append(
            SET_COOKIE,
            HeaderValue::from_str(cookie).reject("could not build cookie header")?,
        );
    }
    Ok(headers)
}

async fn auth_callback(
    State(state): State<AppState>,
    jar: CookieJar,
    headers: HeaderMap,
    JsonBody(body): JsonBody<AuthCallbackBody>,
) -> Result<impl IntoResponse, AppError> {
    let presented = headers
        .get(names::IDENTITY_SECRET_HEADER)
        .and_then(|v| v.to_str().ok());
    if presented != Some(state.identity_callback_secret.as_str()) {
        tracing::warn!("identity callback with a wrong or missing secret");
        return Err(AppError::Unauthorized);
    }

    let guest_id = jar
        .get(names::GUEST_COOKIE_NAME)
        .map(|c| c.value().to_string());

    let profile = AccountProfile {
        account_id: body.account_id,
        email: body.email,
        display_name: body.display_name,
    };

    let outcome = state
        .identity
        .sign_in(profile, guest_id.as_deref())
        .await
        .reject("could not sign in")?;

    match outcome {
        SignInOutcome::SignedIn {
            login_token, user, ..
        } => {
            let headers = set_cookies(&[
                utils::cookie(
                    names::USER_SESSION_COOKIE_NAME,
                    &login_token,
                    names::LOGIN_COOKIE_MAX_AGE_SECS,
                    state.secure_cookies,
                ),
                utils::clear_cookie(names::GUEST_COOKIE_NAME, state.secure_cookies),
            ])?;
            Ok((headers, Json(UserResponse::from(user))))
        }
        SignInOutcome::MissingAccountId => Err(AppError::BadRequest("accountId is required")),
        SignInOutcome::AccountIsGuest => Err(AppError::BadRequest("accountId names a guest")),
    }
}

async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<impl IntoResponse, AppError> {
    if let Some(token) = jar.get(names::USER_SESSION_COOKIE_NAME) {
        state
            .identity
            .sign_out(token.value())
            .await
            .reject("could not sign out")?;
    }

    let headers = set_cookies(&[utils::clear_cookie(
        names::USER_SESSION_COOKIE_NAME,
        state.secure_cookies,
    )])?;
    Ok((headers, StatusCode::NO_CONTENT))
}

async fn current_user(MaybeUser(user): MaybeUser) -> Result<Json<UserResponse>, AppError> {
    let user = user.ok_or(AppError::Unauthorized)?;
    Ok(Json(UserResponse::from(user.record().clone())))
}

async fn update_display_name(
    AuthGuard(user): AuthGuard,
    State(state): State<AppState>,
    JsonBody(body): JsonBody<DisplayNameBody>,
) -> Result<Json<UserResponse>, AppError> {
    let outcome = state
        .identity
        .update_display_name(&user.id, &body.display_name)
        .await
        .reject("could not update display name")?;

    match outcome {
        DisplayNameOutcome::Updated(display_name) => Ok(Json(UserResponse::from(UserRecord {
            display_name: Some(display_name),
            ..user
        }))),
        DisplayNameOutcome::Empty => Err(AppError::BadRequest("display name is empty")),
        DisplayNameOutcome::TooLong => Err(AppError::BadRequest(
            "display name is longer than 50 characters",
        )),
    }
}

async fn delete_user(
    AuthGuard(user): AuthGuard,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let deleted = state
        .identity
        .delete_account(&user.id)
        .await
        .reject("could not delete account")?;
    if !deleted {
        return Err(AppError::NotFound);
    }

    tracing::info!(user_id = %user.id, "account deleted");
    let headers = set_cookies(&[utils::clear_cookie(
        names::USER_SESSION_COOKIE_NAME,
        state.secure_cookies,
    )])?;
    Ok((headers, StatusCode::NO_CONTENT))
}
