use chrono::{DateTime, Utc};
use color_eyre::{eyre::OptionExt, Result};
use sqlx::{Sqlite, Transaction};
use ulid::Ulid;

use super::models::SessionRecord;
use super::Db;

pub(super) const SESSION_COLUMNS: &str = "id, user_id, max_questions, total_questions, \
     correct_answers, combo_streak, max_combo, total_points, started_at, ended_at";

impl Db {
    /// Closes any open session of the user and opens a new one, atomically.
    /// `max_questions` must already be clamped by the caller.
    pub async fn start_session(
        &self,
        user_id: &str,
        max_questions: i64,
        now: DateTime<Utc>,
    ) -> Result<SessionRecord> {
        let session_id = Ulid::new().to_string();

        let mut tx = self.pool.begin().await?;

        let closed = sqlx::query(
            "UPDATE sessions SET ended_at = ? WHERE user_id = ? AND ended_at IS NULL",
        )
        .bind(now)
        .bind(user_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        sqlx::query(
            "INSERT INTO sessions (id, user_id, max_questions, started_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&session_id)
        .bind(user_id)
        .bind(max_questions)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        let session = Self::session_tx(&mut tx, &session_id)
            .await?
            .ok_or_eyre("session missing right after insert")?;

        tx.commit().await?;

        tracing::info!(%user_id, %session_id, max_questions, closed, "session started");
        Ok(session)
    }

    /// Ends the user's session early. Ending an already closed session is a
    /// no-op; `None` means the session does not exist for this user.
    pub async fn end_session(
        &self,
        user_id: &str,
        session_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<SessionRecord>> {
        let closed = sqlx::query(
            "UPDATE sessions SET ended_at = ? WHERE id = ? AND user_id = ? AND ended_at IS NULL",
        )
        .bind(now)
        .bind(session_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if closed > 0 {
            tracing::info!(%user_id, %session_id, "session ended early");
        }

        self.find_session(user_id, session_id).await
    }

    pub async fn find_session(
        &self,
        user_id: &str,
        session_id: &str,
    ) -> Result<Option<SessionRecord>> {
        let session = sqlx::query_as::<_, SessionRecord>(&format!(
            "SELECT {SESSION_COLUMNS} FROM sessions WHERE id = ? AND user_id = ?"
        ))
        .bind(session_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(session)
    }

    pub async fn open_sessions(&self, user_id: &str) -> Result<Vec<SessionRecord>> {
        let sessions = sqlx::query_as::<_, SessionRecord>(&format!(
            "SELECT {SESSION_COLUMNS} FROM sessions WHERE user_id = ? AND ended_at IS NULL"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(sessions)
    }

    pub(super) async fn session_tx(
        tx: &mut Transaction<'_, Sqlite>,
        session_id: &str,
    ) -> Result<Option<SessionRecord>> {
        let session = sqlx::query_as::<_, SessionRecord>(&format!(
            "SELECT {SESSION_COLUMNS} FROM sessions WHERE id = ?"
        ))
        .bind(session_id)
        .fetch_optional(&mut **tx)
        .await?;

        Ok(session)
    }
}
