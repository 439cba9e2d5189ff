pub const START_SESSION_URL: &str = "/session/start";
pub const END_SESSION_URL: &str = "/session/end";
pub const QUESTION_URL: &str = "/question";
pub const VALIDATE_URL: &str = "/validate";
pub const SURAHS_URL: &str = "/surahs";
pub const LEADERBOARD_URL: &str = "/leaderboard";
pub const AUTH_CALLBACK_URL: &str = "/auth/callback";
pub const LOGOUT_URL: &str = "/auth/logout";
pub const CURRENT_USER_URL: &str = "/user/current";
pub const DISPLAY_NAME_URL: &str = "/user/display-name";
pub const USER_URL: &str = "/user";
pub const HEALTH_URL: &str = "/health";

pub const SESSION_URL: &str = "/session/{id}";

pub fn session_url(session_id: &str) -> String {
    format!("/session/{session_id}")
}

// Cookies
pub const USER_SESSION_COOKIE_NAME: &str = "user_session";
pub const GUEST_COOKIE_NAME: &str = "guest_id";
pub const LOGIN_COOKIE_MAX_AGE_SECS: i64 = 30 * 24 * 3600;
pub const GUEST_COOKIE_MAX_AGE_SECS: i64 = 365 * 24 * 3600;

pub const IDENTITY_SECRET_HEADER: &str = "x-identity-secret";

// Practice session bounds
pub const MIN_MAX_QUESTIONS: i64 = 1;
pub const MAX_MAX_QUESTIONS: i64 = 100;
pub const DEFAULT_MAX_QUESTIONS: i64 = 10;

pub const LEADERBOARD_SIZE: i64 = 10;

// Display names
pub const DEFAULT_ACCOUNT_NAME: &str = "Hamba Allah";
pub const GUEST_NAME_PREFIX: &str = "Hamba";
pub const MAX_DISPLAY_NAME_CHARS: usize = 50;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
