use super::{Orchestrator, ServiceError};
use crate::db::Repository;
use crate::domain::{BonusKind, UserId};
use crate::engine::{cycle, CycleStats, CycleWindow, EngineError};
use chrono::NaiveDate;

impl Orchestrator {
    /// Current 60-day cycle of `user` as seen on `today` (UTC).
    pub async fn get_cycle_stats(
        &self,
        user: &UserId,
        today: NaiveDate,
    ) -> Result<CycleStats, ServiceError> {
        let node = self.require_node(user).await?;
        let activation = cycle::resolve_activation(node.activated_date.as_deref(), node.created_at)
            .ok_or_else(|| EngineError::Integrity(format!("no activation date for {}", user)))?;
        let window = CycleWindow::containing(activation, today);
        let (from, to) = window.bounds_ms();

        let mut conn = self.repo.pool().acquire().await?;
        let records =
            Repository::bonus_in_window(&mut conn, user, BonusKind::Matching, from, to).await?;
        Ok(CycleStats::compute(window, today, records))
    }
}
