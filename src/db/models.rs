// Database model structs

use chrono::{DateTime, Utc};

use crate::services::scoring::{SessionProgress, UserProgress};

#[derive(Clone, Debug, sqlx::FromRow)]
pub struct UserRecord {
    pub id: String,
    pub is_guest: bool,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub last_active_at: Option<DateTime<Utc>>,
    pub total_attempted: i64,
    pub total_correct: i64,
    pub current_streak: i64,
    pub longest_streak: i64,
    pub current_correct_streak: i64,
    pub longest_correct_streak: i64,
    pub total_points: i64,
}

impl UserRecord {
    pub fn progress(&self) -> UserProgress {
        UserProgress {
            current_streak: self.current_streak,
            longest_streak: self.longest_streak,
            current_correct_streak: self.current_correct_streak,
            longest_correct_streak: self.longest_correct_streak,
            last_active_at: self.last_active_at,
        }
    }
}

#[derive(Clone, Debug, sqlx::FromRow)]
pub struct SessionRecord {
    pub id: String,
    pub user_id: String,
    pub max_questions: i64,
    pub total_questions: i64,
    pub correct_answers: i64,
    pub combo_streak: i64,
    pub max_combo: i64,
    pub total_points: i64,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl SessionRecord {
    pub fn is_open(&self) -> bool {
        self.ended_at.is_none()
    }

    pub fn remaining_questions(&self) -> i64 {
        self.max_questions - self.total_questions
    }

    pub fn progress(&self) -> SessionProgress {
        SessionProgress {
            max_questions: self.max_questions,
            total_questions: self.total_questions,
            correct_answers: self.correct_answers,
            combo_streak: self.combo_streak,
            max_combo: self.max_combo,
            total_points: self.total_points,
        }
    }
}

/// A ledger row joined with the owning session, so ownership and closure can
/// be checked without a second lookup.
#[derive(Clone, Debug, sqlx::FromRow)]
pub struct PendingQuestionRecord {
    pub id: String,
    pub session_id: String,
    pub session_user_id: String,
    pub current_ayah_id: i64,
    pub correct_ayah_id: i64,
    pub answered_at: Option<DateTime<Utc>>,
    pub session_ended_at: Option<DateTime<Utc>>,
}

impl PendingQuestionRecord {
    pub fn belongs_to(&self, user_id: &str, session_id: &str) -> bool {
        self.session_user_id == user_id && self.session_id == session_id
    }
}

#[derive(Clone, Debug, sqlx::FromRow)]
pub struct AnswerRecord {
    pub user_id: String,
    pub session_id: String,
    pub ayah_id: i64,
    pub is_correct: bool,
}

#[derive(Clone, Debug, sqlx::FromRow)]
pub struct LeaderboardRow {
    pub id: String,
    pub display_name: Option<String>,
    pub longest_streak: i64,
    pub longest_correct_streak: i64,
    pub total_correct: i64,
    pub total_points: i64,
}
