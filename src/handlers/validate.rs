use axum::{extract::State, routing::post, Json, Router};

use crate::{
    extractors::{JsonBody, MaybeUser},
    models::{ValidateBody, ValidateResponse},
    names,
    rejections::{AppError, ResultExt},
    services::{
        identity::CurrentUser,
        scoring::{TrackedAnswer, UntrackedOutcome, ValidationOutcome},
    },
    AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new().route(names::VALIDATE_URL, post(validate))
}

async fn validate(
    MaybeUser(user): MaybeUser,
    State(state): State<AppState>,
    JsonBody(body): JsonBody<ValidateBody>,
) -> Result<Json<ValidateResponse>, AppError> {
    let session_id = body.session_id.filter(|s| !s.is_empty());
    let question_id = body.question_id.filter(|q| !q.is_empty());

    match (session_id, question_id) {
        (Some(session_id), Some(question_id)) => {
            let Some(CurrentUser::Authenticated(user)) = user else {
                return Err(AppError::Unauthorized);
            };

            let answer = TrackedAnswer {
                user_id: user.id,
                session_id,
                question_id,
                selected_ayah_id: body.selected_ayah_id,
            };

            let outcome = state
                .scoring
                .validate(answer)
                .await
                .reject("could not validate answer")?;

            match outcome {
                ValidationOutcome::Scored { effect, correct } => {
                    Ok(Json(ValidateResponse::scored(effect, correct)))
                }
                ValidationOutcome::Replayed {
                    is_correct,
                    correct,
                } => Ok(Json(ValidateResponse::unscored(is_correct, true, correct))),
                ValidationOutcome::InvalidQuestion => Err(AppError::InvalidQuestion),
                ValidationOutcome::SessionExpired => Err(AppError::SessionExpired),
            }
        }
        (None, None) => {
            let current_ayah_id = body
                .current_ayah_id
                .ok_or(AppError::BadRequest("currentAyahId is required"))?;

            let outcome = state
                .scoring
                .validate_untracked(current_ayah_id, body.selected_ayah_id)
                .await
                .reject("could not validate answer")?;

            match outcome {
                UntrackedOutcome::Checked {
                    is_correct,
                    correct,
                } => Ok(Json(ValidateResponse::unscored(is_correct, false, correct))),
                UntrackedOutcome::NoNextVerse => {
                    Err(AppError::BadRequest("currentAyahId has no following verse"))
                }
            }
        }
        _ => Err(AppError::BadRequest(
            "sessionId and questionId must be sent together",
        )),
    }
}
