use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;

use crate::{
    extractors::{AuthGuard, JsonBody},
    models::{EndSessionBody, SessionResponse, StartSessionBody},
    names,
    rejections::{AppError, ResultExt},
    AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(names::START_SESSION_URL, post(start_session))
        .route(names::END_SESSION_URL, post(end_session))
        .route(names::SESSION_URL, get(session_summary))
}

async fn start_session(
    AuthGuard(user): AuthGuard,
    State(state): State<AppState>,
    JsonBody(body): JsonBody<StartSessionBody>,
) -> Result<Json<SessionResponse>, AppError> {
    let max_questions = body
        .max_questions
        .unwrap_or(names::DEFAULT_MAX_QUESTIONS)
        .clamp(names::MIN_MAX_QUESTIONS, names::MAX_MAX_QUESTIONS);

    let session = state
        .db
        .start_session(&user.id, max_questions, Utc::now())
        .await
        .reject("could not start session")?;

    Ok(Json(session.into()))
}

async fn end_session(
    AuthGuard(user): AuthGuard,
    State(state): State<AppState>,
    JsonBody(body): JsonBody<EndSessionBody>,
) -> Result<Json<SessionResponse>, AppError> {
    let session = state
        .db
        .end_session(&user.id, &body.session_id, Utc::now())
        .await
        .reject("could not end session")?
        .ok_or(AppError::NotFound)?;

    Ok(Json(session.into()))
}

async fn session_summary(
    AuthGuard(user): AuthGuard,
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionResponse>, AppError> {
    let session = state
        .db
        .find_session(&user.id, &session_id)
        .await
        .reject("could not get session")?
        .ok_or(AppError::NotFound)?;

    Ok(Json(session.into()))
}
