use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::content::{Verse, VerseDetails};
use crate::db::models::{LeaderboardRow, SessionRecord, UserRecord};
use crate::db::LeaderboardSort;
use crate::services::scoring::AnswerEffect;

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct StartSessionBody {
    pub max_questions: Option<i64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndSessionBody {
    pub session_id: String,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct QuestionQuery {
    pub juz: Option<String>,
    pub surah: Option<String>,
    pub lang: Option<String>,
    pub session_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateBody {
    pub selected_ayah_id: u32,
    pub current_ayah_id: Option<u32>,
    pub session_id: Option<String>,
    pub question_id: Option<String>,
}

#[derive(Deserialize)]
pub struct SurahQuery {
    pub juz: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardQuery {
    #[serde(default)]
    pub sort_by: LeaderboardSort,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthCallbackBody {
    pub account_id: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayNameBody {
    pub display_name: String,
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub session_id: String,
    pub max_questions: i64,
    pub total_questions: i64,
    pub correct_answers: i64,
    pub combo_streak: i64,
    pub max_combo: i64,
    pub total_points: i64,
    pub remaining_questions: i64,
    pub finished: bool,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl From<SessionRecord> for SessionResponse {
    fn from(s: SessionRecord) -> Self {
        Self {
            remaining_questions: s.remaining_questions(),
            finished: !s.is_open(),
            session_id: s.id,
            max_questions: s.max_questions,
            total_questions: s.total_questions,
            correct_answers: s.correct_answers,
            combo_streak: s.combo_streak,
            max_combo: s.max_combo,
            total_points: s.total_points,
            started_at: s.started_at,
            ended_at: s.ended_at,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentAyah {
    pub id: u32,
    pub text: String,
    pub surah: u16,
    pub surah_name: String,
    pub surah_english_name: String,
    pub ayah: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub translation: Option<String>,
}

impl CurrentAyah {
    pub fn new(verse: Verse, details: VerseDetails) -> Self {
        Self {
            id: verse.id,
            text: verse.text,
            surah: verse.surah_id,
            surah_name: verse.surah_name,
            surah_english_name: verse.surah_english_name,
            ayah: verse.index_in_surah,
            audio: details.audio,
            translation: details.translation,
        }
    }
}

#[derive(Serialize)]
pub struct AyahOption {
    pub id: u32,
    pub text: String,
    pub surah: u16,
    pub ayah: u16,
}

impl From<Verse> for AyahOption {
    fn from(v: Verse) -> Self {
        Self {
            id: v.id,
            text: v.text,
            surah: v.surah_id,
            ayah: v.index_in_surah,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question_id: Option<String>,
    pub current_ayah: CurrentAyah,
    pub options: Vec<AyahOption>,
}

#[derive(Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ValidateResponse {
    pub is_correct: bool,
    pub points_gained: i64,
    pub already_answered: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_streak: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longest_streak: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_correct_streak: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub combo_streak: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_points: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_questions: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_finished: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correct_ayah: Option<AyahOption>,
}

impl ValidateResponse {
    pub fn scored(effect: AnswerEffect, correct: Option<Verse>) -> Self {
        let streaks = effect.is_correct;
        Self {
            is_correct: effect.is_correct,
            points_gained: effect.points_gained,
            already_answered: false,
            current_streak: streaks.then_some(effect.user.current_streak),
            longest_streak: streaks.then_some(effect.user.longest_streak),
            current_correct_streak: streaks.then_some(effect.user.current_correct_streak),
            combo_streak: streaks.then_some(effect.session.combo_streak),
            total_points: Some(effect.session.total_points),
            remaining_questions: Some(effect.session.remaining_questions()),
            session_finished: Some(effect.session_finished),
            correct_ayah: correct.map(AyahOption::from),
        }
    }

    pub fn unscored(is_correct: bool, already_answered: bool, correct: Option<Verse>) -> Self {
        Self {
            is_correct,
            already_answered,
            correct_ayah: correct.map(AyahOption::from),
            ..Default::default()
        }
    }
}

#[derive(Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SurahSummary {
    pub id: u16,
    pub name: String,
    pub english_name: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: String,
    pub is_guest: bool,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub last_active_at: Option<DateTime<Utc>>,
    pub total_attempted: i64,
    pub total_correct: i64,
    pub current_streak: i64,
    pub longest_streak: i64,
    pub current_correct_streak: i64,
    pub longest_correct_streak: i64,
    pub total_points: i64,
}

impl From<UserRecord> for UserResponse {
    fn from(u: UserRecord) -> Self {
        Self {
            id: u.id,
            is_guest: u.is_guest,
            display_name: u.display_name,
            email: u.email,
            last_active_at: u.last_active_at,
            total_attempted: u.total_attempted,
            total_correct: u.total_correct,
            current_streak: u.current_streak,
            longest_streak: u.longest_streak,
            current_correct_streak: u.current_correct_streak,
            longest_correct_streak: u.longest_correct_streak,
            total_points: u.total_points,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub rank: i64,
    pub user_id: String,
    pub display_name: Option<String>,
    pub total_points: i64,
    pub total_correct: i64,
    pub longest_streak: i64,
    pub longest_correct_streak: i64,
}

impl LeaderboardEntry {
    pub fn new(rank: i64, row: LeaderboardRow) -> Self {
        Self {
            rank,
            user_id: row.id,
            display_name: row.display_name,
            total_points: row.total_points,
            total_correct: row.total_correct,
            longest_streak: row.longest_streak,
            longest_correct_streak: row.longest_correct_streak,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardResponse {
    pub entries: Vec<LeaderboardEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub me: Option<LeaderboardEntry>,
}
