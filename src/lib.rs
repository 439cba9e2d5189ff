pub mod content;
pub mod db;
pub mod extractors;
pub mod handlers;
pub mod models;
pub mod names;
pub mod rejections;
pub mod services;
pub mod utils;

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header::SET_COOKIE, HeaderValue},
    middleware::{self, Next},
    response::Response,
    routing::get,
    Router,
};
use axum_extra::extract::CookieJar;
use chrono::FixedOffset;
use tower_http::trace::TraceLayer;
use ulid::Ulid;

use content::ContentProvider;
use extractors::IssuedGuestId;
use services::{identity::IdentityService, question::QuestionGenerator, scoring::ScoringService};

#[derive(Clone)]
pub struct AppState {
    pub db: db::Db,
    pub content: Arc<dyn ContentProvider>,
    pub generator: QuestionGenerator,
    pub scoring: ScoringService,
    pub identity: IdentityService,
    pub secure_cookies: bool,
    pub identity_callback_secret: String,
}

impl AppState {
    pub fn new(
        db: db::Db,
        content: Arc<dyn ContentProvider>,
        day_offset: FixedOffset,
        secure_cookies: bool,
        identity_callback_secret: String,
    ) -> Self {
        Self {
            generator: QuestionGenerator::new(content.clone()),
            scoring: ScoringService::new(db.clone(), content.clone(), day_offset),
            identity: IdentityService::new(db.clone()),
            db,
            content,
            secure_cookies,
            identity_callback_secret,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(handlers::session::routes())
        .merge(handlers::question::routes())
        .merge(handlers::validate::routes())
        .merge(handlers::account::routes())
        .merge(handlers::leaderboard::routes())
        .route(names::HEALTH_URL, get(|| async { "ok" }))
        .layer(middleware::from_fn_with_state(state.clone(), guest_cookie))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Gives every anonymous caller a guest id. The id is visible to extractors
/// on this very request; the cookie is only set if the handler did not set
/// cookies of its own.
async fn guest_cookie(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let jar = CookieJar::from_headers(req.headers());
    if jar.get(names::GUEST_COOKIE_NAME).is_some()
        || jar.get(names::USER_SESSION_COOKIE_NAME).is_some()
    {
        return next.run(req).await;
    }

    let guest_id = Ulid::new().to_string();
    req.extensions_mut().insert(IssuedGuestId(guest_id.clone()));

    let mut response = next.run(req).await;
    if response.headers().contains_key(SET_COOKIE) {
        return response;
    }

    let cookie = utils::cookie(
        names::GUEST_COOKIE_NAME,
        &guest_id,
        names::GUEST_COOKIE_MAX_AGE_SECS,
        state.secure_cookies,
    );
    match HeaderValue::from_str(&cookie) {
        Ok(value) => {
            response.headers_mut().append(SET_COOKIE, value);
        }
        Err(e) => tracing::error!("could not build guest cookie: {e}"),
    }
    response
}
