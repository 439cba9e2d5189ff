use axum::{extract::State, routing::get, Json, Router};

use crate::{
    extractors::{MaybeUser, QueryParams},
    models::{LeaderboardEntry, LeaderboardQuery, LeaderboardResponse},
    names,
    rejections::{AppError, ResultExt},
    services::identity::CurrentUser,
    AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new().route(names::LEADERBOARD_URL, get(leaderboard))
}

async fn leaderboard(
    MaybeUser(user): MaybeUser,
    State(state): State<AppState>,
    QueryParams(query): QueryParams<LeaderboardQuery>,
) -> Result<Json<LeaderboardResponse>, AppError> {
    let rows = state
        .db
        .leaderboard(query.sort_by, names::LEADERBOARD_SIZE)
        .await
        .reject("could not load leaderboard")?;

    let entries = rows
        .into_iter()
        .zip(1..)
        .map(|(row, rank)| LeaderboardEntry::new(rank, row))
        .collect();

    let me = match user {
        Some(CurrentUser::Authenticated(user)) => state
            .db
            .leaderboard_entry(query.sort_by, &user.id)
            .await
            .reject("could not load leaderboard rank")?
            .map(|(row, rank)| LeaderboardEntry::new(rank, row)),
        _ => None,
    };

    Ok(Json(LeaderboardResponse { entries, me }))
}
