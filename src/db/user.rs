use chrono::Utc;
use color_eyre::{eyre::OptionExt, Result};
use sqlx::{Sqlite, Transaction};
use ulid::Ulid;

use super::models::UserRecord;
use super::Db;
use crate::names;
use crate::services::identity::{AccountProfile, IdentityRepository};

pub(super) const USER_COLUMNS: &str = "id, is_guest, email, display_name, last_active_at, \
     total_attempted, total_correct, current_streak, longest_streak, \
     current_correct_streak, longest_correct_streak, total_points";

impl Db {
    pub async fn find_user(&self, user_id: &str) -> Result<Option<UserRecord>> {
        let user = sqlx::query_as::<_, UserRecord>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = ?"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// Concurrent first requests with the same guest id both end up with the
    /// single row.
    pub async fn ensure_guest(&self, guest_id: &str, display_name: &str) -> Result<UserRecord> {
        let created = sqlx::query(
            "INSERT INTO users (id, is_guest, display_name) VALUES (?, 1, ?) ON CONFLICT(id) DO NOTHING",
        )
        .bind(guest_id)
        .bind(display_name)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if created > 0 {
            tracing::info!(%guest_id, "guest user created");
        }

        self.find_user(guest_id)
            .await?
            .ok_or_eyre("guest user missing after insert")
    }

    pub async fn ensure_account(&self, profile: &AccountProfile) -> Result<UserRecord> {
        let display_name = profile
            .display_name
            .as_deref()
            .unwrap_or(names::DEFAULT_ACCOUNT_NAME);

        sqlx::query(
            r#"
            INSERT INTO users (id, is_guest, email, display_name) VALUES (?, 0, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                email = COALESCE(users.email, excluded.email),
                display_name = COALESCE(users.display_name, excluded.display_name)
            WHERE users.is_guest = 0
            "#,
        )
        .bind(&profile.account_id)
        .bind(&profile.email)
        .bind(display_name)
        .execute(&self.pool)
        .await?;

        self.find_user(&profile.account_id)
            .await?
            .ok_or_eyre("account missing after upsert")
    }

    /// Moves a guest's history onto an account in one transaction and deletes
    /// the guest. Returns false if `guest_id` is not a guest row, which makes
    /// a repeated merge a no-op.
    pub async fn merge_guest(&self, guest_id: &str, account_id: &str) -> Result<bool> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let closed = sqlx::query(
            r#"
            UPDATE sessions SET ended_at = ?
            WHERE ended_at IS NULL
              AND user_id = (SELECT id FROM users WHERE id = ? AND is_guest = 1)
            "#,
        )
        .bind(now)
        .bind(guest_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        let Some(guest) = Self::user_tx(&mut tx, guest_id).await?.filter(|u| u.is_guest) else {
            return Ok(false);
        };
        let account = Self::user_tx(&mut tx, account_id)
            .await?
            .filter(|u| !u.is_guest)
            .ok_or_eyre("merge target is not an account")?;

        let merged = merged_stats(&account, &guest);

        sqlx::query(
            r#"
            UPDATE users
            SET total_attempted = ?, total_correct = ?, total_points = ?,
                current_streak = ?, longest_streak = ?,
                current_correct_streak = ?, longest_correct_streak = ?,
                last_active_at = ?
            WHERE id = ?
            "#,
        )
        .bind(merged.total_attempted)
        .bind(merged.total_correct)
        .bind(merged.total_points)
        .bind(merged.current_streak)
        .bind(merged.longest_streak)
        .bind(merged.current_correct_streak)
        .bind(merged.longest_correct_streak)
        .bind(merged.last_active_at)
        .bind(account_id)
        .execute(&mut *tx)
        .await?;

        let sessions = sqlx::query("UPDATE sessions SET user_id = ? WHERE user_id = ?")
            .bind(account_id)
            .bind(guest_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let answers = sqlx::query("UPDATE answers SET user_id = ? WHERE user_id = ?")
            .bind(account_id)
            .bind(guest_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(guest_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(
            %guest_id,
            %account_id,
            sessions,
            answers,
            closed,
            "guest merged into account"
        );
        Ok(true)
    }

    pub async fn create_login_session(&self, user_id: &str) -> Result<String> {
        let token = Ulid::new().to_string();

        sqlx::query("INSERT INTO login_sessions (id, user_id) VALUES (?, ?)")
            .bind(&token)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        tracing::info!(%user_id, "login session created");
        Ok(token)
    }

    pub async fn user_by_login_session(&self, token: &str) -> Result<Option<UserRecord>> {
        let user = sqlx::query_as::<_, UserRecord>(&format!(
            r#"
            SELECT {USER_COLUMNS} FROM users
            WHERE id = (SELECT user_id FROM login_sessions WHERE id = ?)
            "#
        ))
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    pub async fn delete_login_session(&self, token: &str) -> Result<()> {
        sqlx::query("DELETE FROM login_sessions WHERE id = ?")
            .bind(token)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn set_display_name(&self, user_id: &str, display_name: &str) -> Result<()> {
        sqlx::query("UPDATE users SET display_name = ? WHERE id = ?")
            .bind(display_name)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Sessions, pending questions, answers and login sessions go with the
    /// user through `ON DELETE CASCADE`.
    pub async fn delete_user(&self, user_id: &str) -> Result<bool> {
        let deleted = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        if deleted > 0 {
            tracing::info!(%user_id, "user deleted");
        }
        Ok(deleted > 0)
    }

    pub(super) async fn user_tx(
        tx: &mut Transaction<'_, Sqlite>,
        user_id: &str,
    ) -> Result<Option<UserRecord>> {
        let user = sqlx::query_as::<_, UserRecord>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = ?"
        ))
        .bind(user_id)
        .fetch_optional(&mut **tx)
        .await?;

        Ok(user)
    }
}

/// Totals add up, records take the maximum, and the running streaks come
/// from whichever identity played most recently.
fn merged_stats(account: &UserRecord, guest: &UserRecord) -> UserRecord {
    let recent = if guest.last_active_at > account.last_active_at {
        guest
    } else {
        account
    };

    UserRecord {
        total_attempted: account.total_attempted + guest.total_attempted,
        total_correct: account.total_correct + guest.total_correct,
        total_points: account.total_points + guest.total_points,
        longest_streak: account.longest_streak.max(guest.longest_streak),
        longest_correct_streak: account
            .longest_correct_streak
            .max(guest.longest_correct_streak),
        current_streak: recent.current_streak,
        current_correct_streak: recent.current_correct_streak,
        last_active_at: recent.last_active_at,
        ..account.clone()
    }
}

impl IdentityRepository for Db {
    async fn find_user(&self, user_id: &str) -> Result<Option<UserRecord>> {
        Db::find_user(self, user_id).await
    }

    async fn ensure_guest(&self, guest_id: &str, display_name: &str) -> Result<UserRecord> {
        Db::ensure_guest(self, guest_id, display_name).await
    }

    async fn ensure_account(&self, profile: AccountProfile) -> Result<UserRecord> {
        Db::ensure_account(self, &profile).await
    }

    async fn merge_guest(&self, guest_id: &str, account_id: &str) -> Result<bool> {
        Db::merge_guest(self, guest_id, account_id).await
    }

    async fn create_login_session(&self, user_id: &str) -> Result<String> {
        Db::create_login_session(self, user_id).await
    }

    async fn user_by_login_session(&self, token: &str) -> Result<Option<UserRecord>> {
        Db::user_by_login_session(self, token).await
    }

    async fn delete_login_session(&self, token: &str) -> Result<()> {
        Db::delete_login_session(self, token).await
    }

    async fn set_display_name(&self, user_id: &str, display_name: &str) -> Result<()> {
        Db::set_display_name(self, user_id, display_name).await
    }

    async fn delete_user(&self, user_id: &str) -> Result<bool> {
        Db::delete_user(self, user_id).await
    }
}
