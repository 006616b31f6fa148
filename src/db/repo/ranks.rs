//! Rank achievements and consumed qualification slots.

use super::{parse_col, Repository};
use crate::domain::{QualifiedUser, RankRecord, RankTier, TierAchievement, TimeMs, UserId};
use sqlx::sqlite::SqliteConnection;
use sqlx::Row;

impl Repository {
    pub async fn fetch_rank_record(
        conn: &mut SqliteConnection,
        user: &UserId,
    ) -> Result<RankRecord, sqlx::Error> {
        let mut record = RankRecord::empty(user.clone());

        let tiers = sqlx::query("SELECT tier, achieved_at FROM rank_achievements WHERE user_id = ?")
            .bind(user.as_str())
            .fetch_all(&mut *conn)
            .await?;
        for row in &tiers {
            let tier: RankTier = parse_col(row, "tier")?;
            record.tiers.insert(
                tier,
                TierAchievement {
                    achieved_at: TimeMs::new(row.try_get("achieved_at")?),
                    qualified_users: Vec::new(),
                },
            );
        }

        let slots = sqlx::query(
            r#"
            SELECT qualified_user_id, tier, side FROM rank_qualified_users
            WHERE user_id = ? ORDER BY rowid ASC
            "#,
        )
        .bind(user.as_str())
        .fetch_all(&mut *conn)
        .await?;
        for row in &slots {
            let tier: RankTier = parse_col(row, "tier")?;
            if let Some(achievement) = record.tiers.get_mut(&tier) {
                achievement.qualified_users.push(QualifiedUser {
                    user_id: UserId::new(row.try_get::<String, _>("qualified_user_id")?),
                    side: parse_col(row, "side")?,
                });
            }
        }

        Ok(record)
    }

    pub async fn get_rank_record(&self, user: &UserId) -> Result<RankRecord, sqlx::Error> {
        let mut conn = self.pool.acquire().await?;
        Self::fetch_rank_record(&mut conn, user).await
    }

    /// Persist a newly achieved tier and consume its slots. Fails with a
    /// unique violation if the tier or any slot user is already recorded.
    pub async fn insert_achievement(
        conn: &mut SqliteConnection,
        user: &UserId,
        tier: RankTier,
        achievement: &TierAchievement,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("INSERT INTO rank_achievements (user_id, tier, achieved_at) VALUES (?, ?, ?)")
            .bind(user.as_str())
            .bind(tier.as_str())
            .bind(achievement.achieved_at.as_ms())
            .execute(&mut *conn)
            .await?;

        for slot in &achievement.qualified_users {
            sqlx::query(
                r#"
                INSERT INTO rank_qualified_users (user_id, qualified_user_id, tier, side)
                VALUES (?, ?, ?, ?)
                "#,
            )
            .bind(user.as_str())
            .bind(slot.user_id.as_str())
            .bind(tier.as_str())
            .bind(slot.side.as_str())
            .execute(&mut *conn)
            .await?;
        }
        Ok(())
    }
}
