use chrono::{DateTime, FixedOffset, Utc};
use color_eyre::{eyre::OptionExt, Result};

use super::models::{AnswerRecord, PendingQuestionRecord};
use super::Db;
use crate::services::scoring::{apply_answer, ScoreOutcome, ScoringRepository, TrackedAnswer};

impl Db {
    /// Consumes the pending question and, if this call won, writes the
    /// session counters, the user counters and the answer row together.
    /// Returning before `commit` rolls every statement back, including the
    /// consume.
    pub async fn record_answer(
        &self,
        answer: &TrackedAnswer,
        now: DateTime<Utc>,
        offset: FixedOffset,
    ) -> Result<ScoreOutcome> {
        let mut tx = self.pool.begin().await?;

        let Some(consumed) = Self::consume_tx(&mut tx, &answer.question_id, now).await? else {
            return Ok(ScoreOutcome::InvalidQuestion);
        };

        let pending = consumed.question;
        if !pending.belongs_to(&answer.user_id, &answer.session_id) {
            return Ok(ScoreOutcome::InvalidQuestion);
        }

        let is_correct = i64::from(answer.selected_ayah_id) == pending.correct_ayah_id;
        if consumed.already_answered {
            return Ok(ScoreOutcome::AlreadyAnswered { is_correct });
        }

        let session = Self::session_tx(&mut tx, &pending.session_id)
            .await?
            .ok_or_eyre("pending question without session")?;
        if !session.is_open() || session.remaining_questions() <= 0 {
            return Ok(ScoreOutcome::SessionExpired);
        }

        let user = Self::user_tx(&mut tx, &answer.user_id)
            .await?
            .ok_or_eyre("session owner missing")?;

        let effect = apply_answer(is_correct, &user.progress(), &session.progress(), now, offset);
        let ended_at = effect.session_finished.then_some(now);

        sqlx::query(
            r#"
            UPDATE sessions
            SET total_questions = ?, correct_answers = ?, combo_streak = ?,
                max_combo = ?, total_points = ?, ended_at = ?
            WHERE id = ?
            "#,
        )
        .bind(effect.session.total_questions)
        .bind(effect.session.correct_answers)
        .bind(effect.session.combo_streak)
        .bind(effect.session.max_combo)
        .bind(effect.session.total_points)
        .bind(ended_at)
        .bind(&session.id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            UPDATE users
            SET total_attempted = total_attempted + 1,
                total_correct = total_correct + ?,
                total_points = total_points + ?,
                current_streak = ?, longest_streak = ?,
                current_correct_streak = ?, longest_correct_streak = ?,
                last_active_at = ?
            WHERE id = ?
            "#,
        )
        .bind(i64::from(is_correct))
        .bind(effect.points_gained)
        .bind(effect.user.current_streak)
        .bind(effect.user.longest_streak)
        .bind(effect.user.current_correct_streak)
        .bind(effect.user.longest_correct_streak)
        .bind(effect.user.last_active_at)
        .bind(&user.id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO answers (user_id, session_id, ayah_id, is_correct, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&user.id)
        .bind(&session.id)
        .bind(pending.current_ayah_id)
        .bind(is_correct)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            user_id = %user.id,
            session_id = %session.id,
            points = effect.points_gained,
            combo = effect.session.combo_streak,
            session_finished = effect.session_finished,
            "score applied"
        );
        Ok(ScoreOutcome::Scored(effect))
    }

    pub async fn answers_for_session(&self, session_id: &str) -> Result<Vec<AnswerRecord>> {
        let answers = sqlx::query_as::<_, AnswerRecord>(
            "SELECT user_id, session_id, ayah_id, is_correct FROM answers WHERE session_id = ? ORDER BY id",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(answers)
    }

    pub async fn answer_count_for_user(&self, user_id: &str) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM answers WHERE user_id = ?")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

impl ScoringRepository for Db {
    async fn find_pending_question(
        &self,
        question_id: &str,
    ) -> Result<Option<PendingQuestionRecord>> {
        self.pending_question(question_id).await
    }

    async fn score_answer(
        &self,
        answer: TrackedAnswer,
        now: DateTime<Utc>,
        offset: FixedOffset,
    ) -> Result<ScoreOutcome> {
        self.record_answer(&answer, now, offset).await
    }
}
