use chrono::{DateTime, Utc};
use color_eyre::Result;
use sqlx::{Sqlite, Transaction};
use ulid::Ulid;

use super::models::PendingQuestionRecord;
use super::Db;

const PENDING_SELECT: &str = r#"
    SELECT p.id, p.session_id, s.user_id AS session_user_id,
           p.current_ayah_id, p.correct_ayah_id, p.answered_at,
           s.ended_at AS session_ended_at
    FROM pending_questions p
    JOIN sessions s ON s.id = p.session_id
    WHERE p.id = ?
"#;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OpenOutcome {
    Opened(String),
    /// No session with that id belongs to the user.
    NoActiveSession,
    SessionExpired,
}

/// The result of a consume attempt on an existing pending question.
#[derive(Clone, Debug)]
pub(super) struct ConsumedQuestion {
    pub question: PendingQuestionRecord,
    /// True when some earlier call already consumed it.
    pub already_answered: bool,
}

impl Db {
    /// Binds a correct answer to a new question id inside the user's open
    /// session. The session check and the insert are one statement.
    pub async fn open_pending_question(
        &self,
        user_id: &str,
        session_id: &str,
        current_ayah_id: u32,
        correct_ayah_id: u32,
        now: DateTime<Utc>,
    ) -> Result<OpenOutcome> {
        let question_id = Ulid::new().to_string();

        let inserted = sqlx::query(
            r#"
            INSERT INTO pending_questions (id, session_id, current_ayah_id, correct_ayah_id, created_at)
            SELECT ?, id, ?, ?, ?
            FROM sessions
            WHERE id = ? AND user_id = ? AND ended_at IS NULL
            "#,
        )
        .bind(&question_id)
        .bind(i64::from(current_ayah_id))
        .bind(i64::from(correct_ayah_id))
        .bind(now)
        .bind(session_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if inserted == 1 {
            tracing::info!(%session_id, %question_id, current_ayah_id, "pending question opened");
            return Ok(OpenOutcome::Opened(question_id));
        }

        let ended_at: Option<Option<DateTime<Utc>>> =
            sqlx::query_scalar("SELECT ended_at FROM sessions WHERE id = ? AND user_id = ?")
                .bind(session_id)
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(match ended_at {
            Some(Some(_)) => OpenOutcome::SessionExpired,
            _ => OpenOutcome::NoActiveSession,
        })
    }

    pub async fn pending_question(&self, question_id: &str) -> Result<Option<PendingQuestionRecord>> {
        let question = sqlx::query_as::<_, PendingQuestionRecord>(PENDING_SELECT)
            .bind(question_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(question)
    }

    /// The compare-and-set on `answered_at`, and the only way a question is
    /// consumed. It is the first statement of the scoring transaction, so the
    /// write lock is taken before anything is read.
    pub(super) async fn consume_tx(
        tx: &mut Transaction<'_, Sqlite>,
        question_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<ConsumedQuestion>> {
        let updated = sqlx::query(
            "UPDATE pending_questions SET answered_at = ? WHERE id = ? AND answered_at IS NULL",
        )
        .bind(now)
        .bind(question_id)
        .execute(&mut **tx)
        .await?
        .rows_affected();

        let question = sqlx::query_as::<_, PendingQuestionRecord>(PENDING_SELECT)
            .bind(question_id)
            .fetch_optional(&mut **tx)
            .await?;

        Ok(question.map(|question| ConsumedQuestion {
            question,
            already_answered: updated == 0,
        }))
    }
}
