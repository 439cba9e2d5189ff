use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use color_eyre::Result;

use crate::content::{ContentProvider, Verse};
use crate::db::models::PendingQuestionRecord;
use crate::db::Db;

// ---------------------------------------------------------------------------
// Scoring rules
// ---------------------------------------------------------------------------

pub const BASE_POINTS: i64 = 10;
pub const COMBO_BONUS_THRESHOLD: i64 = 3;
pub const COMBO_BONUS_PER_STEP: i64 = 5;

/// The long-lived per-user fields an answer can change.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UserProgress {
    pub current_streak: i64,
    pub longest_streak: i64,
    pub current_correct_streak: i64,
    pub longest_correct_streak: i64,
    pub last_active_at: Option<DateTime<Utc>>,
}

/// The per-session counters an answer can change.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionProgress {
    pub max_questions: i64,
    pub total_questions: i64,
    pub correct_answers: i64,
    pub combo_streak: i64,
    pub max_combo: i64,
    pub total_points: i64,
}

impl SessionProgress {
    pub fn remaining_questions(&self) -> i64 {
        self.max_questions - self.total_questions
    }

    pub fn is_full(&self) -> bool {
        self.total_questions >= self.max_questions
    }
}

/// Result of applying one answer: the new state of both records plus what to
/// report back.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnswerEffect {
    pub is_correct: bool,
    pub points_gained: i64,
    pub user: UserProgress,
    pub session: SessionProgress,
    pub session_finished: bool,
}

/// Points for a correct answer given the combo *after* it was counted.
pub fn points_for(combo: i64) -> i64 {
    if combo >= COMBO_BONUS_THRESHOLD {
        BASE_POINTS + combo * COMBO_BONUS_PER_STEP
    } else {
        BASE_POINTS
    }
}

pub fn calendar_day(at: DateTime<Utc>, offset: FixedOffset) -> NaiveDate {
    at.with_timezone(&offset).date_naive()
}

/// Daily streak after a correct answer at `now`.
pub fn next_daily_streak(
    current: i64,
    last_active_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    offset: FixedOffset,
) -> i64 {
    let Some(last) = last_active_at else {
        return 1;
    };

    let gap = (calendar_day(now, offset) - calendar_day(last, offset)).num_days();
    match gap {
        // A clock that went backwards counts as the same day
        ..=0 => current.max(1),
        1 => current + 1,
        _ => 1,
    }
}

/// Applies one answer to a user's and a session's state.
///
/// Only a correct answer touches the daily streak and `last_active_at`; an
/// incorrect answer leaves the daily-activity clock where it was.
pub fn apply_answer(
    is_correct: bool,
    user: &UserProgress,
    session: &SessionProgress,
    now: DateTime<Utc>,
    offset: FixedOffset,
) -> AnswerEffect {
    let mut user = user.clone();
    let mut session = session.clone();

    let points_gained = if is_correct {
        user.current_streak =
            next_daily_streak(user.current_streak, user.last_active_at, now, offset);
        user.last_active_at = Some(now);
        user.current_correct_streak += 1;

        session.combo_streak += 1;
        session.correct_answers += 1;
        points_for(session.combo_streak)
    } else {
        user.current_correct_streak = 0;
        session.combo_streak = 0;
        0
    };

    user.longest_streak = user.longest_streak.max(user.current_streak);
    user.longest_correct_streak = user.longest_correct_streak.max(user.current_correct_streak);

    session.max_combo = session.max_combo.max(session.combo_streak);
    session.total_questions += 1;
    session.total_points += points_gained;

    AnswerEffect {
        is_correct,
        points_gained,
        session_finished: session.is_full(),
        user,
        session,
    }
}

// ---------------------------------------------------------------------------
// ScoringRepository trait
// ---------------------------------------------------------------------------

/// A tracked answer submission, already bound to the caller's identity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrackedAnswer {
    pub user_id: String,
    pub session_id: String,
    pub question_id: String,
    pub selected_ayah_id: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScoreOutcome {
    /// This call consumed the pending question and its writes committed.
    Scored(AnswerEffect),
    /// Another call consumed the question first; nothing was written.
    AlreadyAnswered { is_correct: bool },
    InvalidQuestion,
    SessionExpired,
}

#[cfg_attr(test, mockall::automock)]
pub trait ScoringRepository: Send + Sync {
    fn find_pending_question(
        &self,
        question_id: &str,
    ) -> impl Future<Output = Result<Option<PendingQuestionRecord>>> + Send;

    /// Consumes the pending question and applies every scoring write in one
    /// transaction.
    fn score_answer(
        &self,
        answer: TrackedAnswer,
        now: DateTime<Utc>,
        offset: FixedOffset,
    ) -> impl Future<Output = Result<ScoreOutcome>> + Send;
}

// ---------------------------------------------------------------------------
// Outcome enums
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
pub enum ValidationOutcome {
    Scored {
        effect: AnswerEffect,
        /// Present only when the answer was wrong.
        correct: Option<Verse>,
    },
    /// A repeat submission: correctness is reported, no score changed.
    Replayed {
        is_correct: bool,
        correct: Option<Verse>,
    },
    InvalidQuestion,
    SessionExpired,
}

#[derive(Clone, Debug)]
pub enum UntrackedOutcome {
    Checked {
        is_correct: bool,
        correct: Option<Verse>,
    },
    /// The submitted current verse has no following verse.
    NoNextVerse,
}

// ---------------------------------------------------------------------------
// ScoringService
// ---------------------------------------------------------------------------

pub struct ScoringService<R: ScoringRepository = Db> {
    repo: R,
    content: Arc<dyn ContentProvider>,
    day_offset: FixedOffset,
}

impl<R: ScoringRepository + Clone> Clone for ScoringService<R> {
    fn clone(&self) -> Self {
        Self {
            repo: self.repo.clone(),
            content: self.content.clone(),
            day_offset: self.day_offset,
        }
    }
}

impl<R: ScoringRepository> ScoringService<R> {
    pub fn new(repo: R, content: Arc<dyn ContentProvider>, day_offset: FixedOffset) -> Self {
        Self {
            repo,
            content,
            day_offset,
        }
    }

    pub async fn validate(&self, answer: TrackedAnswer) -> Result<ValidationOutcome> {
        self.validate_at(answer, Utc::now()).await
    }

    #[tracing::instrument(level = "debug", skip(self, answer), fields(question = %answer.question_id))]
    pub async fn validate_at(
        &self,
        answer: TrackedAnswer,
        now: DateTime<Utc>,
    ) -> Result<ValidationOutcome> {
        let Some(pending) = self.repo.find_pending_question(&answer.question_id).await? else {
            return Ok(ValidationOutcome::InvalidQuestion);
        };

        if !pending.belongs_to(&answer.user_id, &answer.session_id) {
            tracing::warn!(
                user_id = %answer.user_id,
                session_id = %answer.session_id,
                "question submitted outside its owning session"
            );
            return Ok(ValidationOutcome::InvalidQuestion);
        }

        let correct_ayah_id = u32::try_from(pending.correct_ayah_id)?;
        let is_correct = answer.selected_ayah_id == correct_ayah_id;

        if pending.answered_at.is_some() {
            tracing::warn!(user_id = %answer.user_id, "replayed answer, no score applied");
            let correct = self.correct_verse(is_correct, correct_ayah_id).await?;
            return Ok(ValidationOutcome::Replayed {
                is_correct,
                correct,
            });
        }

        if pending.session_ended_at.is_some() {
            return Ok(ValidationOutcome::SessionExpired);
        }

        // Fetched before the write so a provider failure leaves nothing half done
        let correct = self.correct_verse(is_correct, correct_ayah_id).await?;

        let outcome = match self.repo.score_answer(answer, now, self.day_offset).await? {
            ScoreOutcome::Scored(effect) => ValidationOutcome::Scored { effect, correct },
            ScoreOutcome::AlreadyAnswered { is_correct } => {
                tracing::warn!("concurrent submission lost the race, no score applied");
                ValidationOutcome::Replayed {
                    is_correct,
                    correct,
                }
            }
            ScoreOutcome::InvalidQuestion => ValidationOutcome::InvalidQuestion,
            ScoreOutcome::SessionExpired => ValidationOutcome::SessionExpired,
        };

        Ok(outcome)
    }

    /// Checks an answer without any session; nothing is persisted.
    pub async fn validate_untracked(
        &self,
        current_ayah_id: u32,
        selected_ayah_id: u32,
    ) -> Result<UntrackedOutcome> {
        if current_ayah_id == 0 || current_ayah_id >= self.content.total_verses() {
            return Ok(UntrackedOutcome::NoNextVerse);
        }

        let current = self.content.verse(current_ayah_id).await?;
        if current.is_last_in_surah() {
            return Ok(UntrackedOutcome::NoNextVerse);
        }

        let correct_ayah_id = current_ayah_id + 1;
        let is_correct = selected_ayah_id == correct_ayah_id;
        let correct = self.correct_verse(is_correct, correct_ayah_id).await?;

        Ok(UntrackedOutcome::Checked {
            is_correct,
            correct,
        })
    }

    async fn correct_verse(&self, is_correct: bool, id: u32) -> Result<Option<Verse>> {
        if is_correct {
            return Ok(None);
        }
        Ok(Some(self.content.verse(id).await?))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
