use color_eyre::Result;
use serde::Deserialize;

use super::models::LeaderboardRow;
use super::Db;

const ROW_COLUMNS: &str =
    "id, display_name, longest_streak, longest_correct_streak, total_correct, total_points";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeaderboardSort {
    Correct,
    Daily,
    /// Also used for any unrecognized sort key.
    #[default]
    #[serde(other)]
    Points,
}

impl LeaderboardSort {
    /// Primary and tie-break columns, both descending.
    fn columns(self) -> (&'static str, &'static str) {
        match self {
            LeaderboardSort::Points => ("total_points", "longest_streak"),
            LeaderboardSort::Correct => ("longest_correct_streak", "total_correct"),
            LeaderboardSort::Daily => ("longest_streak", "total_correct"),
        }
    }

    fn keys(self, row: &LeaderboardRow) -> (i64, i64) {
        match self {
            LeaderboardSort::Points => (row.total_points, row.longest_streak),
            LeaderboardSort::Correct => (row.longest_correct_streak, row.total_correct),
            LeaderboardSort::Daily => (row.longest_streak, row.total_correct),
        }
    }
}

impl Db {
    pub async fn leaderboard(&self, sort: LeaderboardSort, limit: i64) -> Result<Vec<LeaderboardRow>> {
        let (primary, secondary) = sort.columns();
        let rows = sqlx::query_as::<_, LeaderboardRow>(&format!(
            r#"
            SELECT {ROW_COLUMNS} FROM users
            WHERE is_guest = 0
            ORDER BY {primary} DESC, {secondary} DESC, id ASC
            LIMIT ?
            "#
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// The account's own row with its rank: one more than the number of
    /// accounts strictly ahead of it under `sort`.
    pub async fn leaderboard_entry(
        &self,
        sort: LeaderboardSort,
        user_id: &str,
    ) -> Result<Option<(LeaderboardRow, i64)>> {
        let row = sqlx::query_as::<_, LeaderboardRow>(&format!(
            "SELECT {ROW_COLUMNS} FROM users WHERE id = ? AND is_guest = 0"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let (primary, secondary) = sort.columns();
        let (p, s) = sort.keys(&row);
        let ahead: i64 = sqlx::query_scalar(&format!(
            r#"
            SELECT COUNT(*) FROM users
            WHERE is_guest = 0
              AND ({primary} > ? OR ({primary} = ? AND {secondary} > ?))
            "#
        ))
        .bind(p)
        .bind(p)
        .bind(s)
        .fetch_one(&self.pool)
        .await?;

        Ok(Some((row, ahead + 1)))
    }
}
