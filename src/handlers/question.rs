use std::collections::BTreeMap;

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;

use crate::{
    content::{Lang, VerseDetails, VerseRange},
    db::OpenOutcome,
    extractors::{MaybeUser, QueryParams},
    models::{AyahOption, CurrentAyah, QuestionQuery, QuestionResponse, SurahQuery, SurahSummary},
    names,
    rejections::{AppError, ResultExt},
    services::{filter::VerseFilter, identity::CurrentUser},
    AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(names::QUESTION_URL, get(question))
        .route(names::SURAHS_URL, get(surahs))
}

async fn question(
    MaybeUser(user): MaybeUser,
    State(state): State<AppState>,
    QueryParams(query): QueryParams<QuestionQuery>,
) -> Result<Json<QuestionResponse>, AppError> {
    let filter = VerseFilter::parse(query.juz.as_deref(), query.surah.as_deref())?;
    let lang = Lang::parse(query.lang.as_deref());

    // Tracked questions need an account before anything is generated
    let tracked = match query.session_id.filter(|s| !s.is_empty()) {
        Some(session_id) => match user {
            Some(CurrentUser::Authenticated(user)) => Some((user.id, session_id)),
            _ => return Err(AppError::Unauthorized),
        },
        None => None,
    };

    let generated = state.generator.generate(&filter).await?;

    let question_id = match tracked {
        Some((user_id, session_id)) => {
            let outcome = state
                .db
                .open_pending_question(
                    &user_id,
                    &session_id,
                    generated.current.id,
                    generated.correct_ayah_id,
                    Utc::now(),
                )
                .await
                .reject("could not open question")?;

            match outcome {
                OpenOutcome::Opened(id) => Some(id),
                OpenOutcome::NoActiveSession => return Err(AppError::Unauthorized),
                OpenOutcome::SessionExpired => return Err(AppError::SessionExpired),
            }
        }
        None => None,
    };

    let details = match state.content.verse_details(generated.current.id, lang).await {
        Ok(details) => details,
        Err(e) => {
            tracing::warn!(verse = generated.current.id, "verse details unavailable: {e}");
            VerseDetails::default()
        }
    };

    Ok(Json(QuestionResponse {
        question_id,
        current_ayah: CurrentAyah::new(generated.current, details),
        options: generated.options.into_iter().map(AyahOption::from).collect(),
    }))
}

async fn surahs(
    State(state): State<AppState>,
    QueryParams(query): QueryParams<SurahQuery>,
) -> Result<Json<Vec<SurahSummary>>, AppError> {
    let filter = VerseFilter::parse(query.juz.as_deref(), None)?;
    if filter.juz.is_empty() {
        return Err(AppError::BadRequest("juz is required"));
    }

    let mut surahs = BTreeMap::new();
    for juz in &filter.juz {
        let verses = state.content.verses_in(VerseRange::Juz(*juz)).await?;
        for verse in verses {
            surahs.entry(verse.surah_id).or_insert_with(|| SurahSummary {
                id: verse.surah_id,
                name: verse.surah_name,
                english_name: verse.surah_english_name,
            });
        }
    }

    let surahs = surahs.into_values().collect();
    Ok(Json(surahs))
}
