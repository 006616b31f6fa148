//! Matching runs over the active population.

use super::ledger::credited;
use super::registrar::{load_node, store_node};
use super::{with_retry, Orchestrator, ServiceError};
use crate::db::Repository;
use crate::domain::{BonusKind, Payout, TeamSide, TimeMs, UserId};
use crate::engine::{cycle, CycleWindow, EngineError};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use sqlx::sqlite::SqliteConnection;
use tracing::{info, warn};

/// A user whose matching failed; the rest of the run is unaffected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserFailure {
    pub user_id: UserId,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub users_scanned: usize,
    pub users_matched: usize,
    pub payouts_created: usize,
    /// Units matched but not paid because of the cycle cap.
    pub units_capped: u64,
    /// Leader pairs formed per user, only for users with at least one.
    pub leader_pairs: Vec<(UserId, u32)>,
    pub failures: Vec<UserFailure>,
}

struct UserMatch {
    units_capped: u64,
    leader_pairs: u32,
    payouts: Vec<Payout>,
}

impl Orchestrator {
    /// Match every active user once.
    ///
    /// Each user is one transaction; a failure rolls back that user alone
    /// and is listed in the report. Running again without new volume
    /// creates nothing.
    pub async fn run_matching_cycle(&self) -> Result<RunReport, ServiceError> {
        let users = self.repo.active_user_ids().await?;
        let now = TimeMs::now();

        let results: Vec<(UserId, Result<Option<UserMatch>, ServiceError>)> =
            stream::iter(users)
                .map(|user| async move {
                    let result = with_retry(|| self.match_user(&user, now)).await;
                    (user, result)
                })
                .buffer_unordered(self.concurrency)
                .collect()
                .await;

        let mut report = RunReport {
            users_scanned: results.len(),
            ..Default::default()
        };
        let mut notifications = Vec::new();

        for (user, result) in results {
            match result {
                Ok(Some(matched)) => {
                    if !matched.payouts.is_empty() {
                        report.users_matched += 1;
                    }
                    report.payouts_created += matched.payouts.len();
                    report.units_capped += matched.units_capped;
                    if matched.leader_pairs > 0 {
                        report.leader_pairs.push((user, matched.leader_pairs));
                    }
                    notifications.extend(matched.payouts.iter().map(credited));
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(user_id = %user, error = %e, "Matching failed for user");
                    report.failures.push(UserFailure {
                        user_id: user,
                        error: e.to_string(),
                    });
                }
            }
        }
        report.leader_pairs.sort();
        report.failures.sort_by(|a, b| a.user_id.cmp(&b.user_id));

        info!(
            users_scanned = report.users_scanned,
            users_matched = report.users_matched,
            payouts_created = report.payouts_created,
            failures = report.failures.len(),
            "Matching run complete"
        );
        self.notify_all(notifications).await;
        Ok(report)
    }

    /// One user's match. `None` when nothing was eligible to match.
    async fn match_user(&self, user: &UserId, now: TimeMs) -> Result<Option<UserMatch>, ServiceError> {
        let mut tx = self.repo.begin().await?;
        let mut node = load_node(&mut tx, user).await?;
        if !self.calculator.is_eligible(&node) {
            return Ok(None);
        }

        let today = now
            .utc_date()
            .ok_or_else(|| EngineError::Integrity(format!("clock out of range: {}", now.as_ms())))?;
        let activation = cycle::resolve_activation(node.activated_date.as_deref(), node.created_at)
            .ok_or_else(|| EngineError::Integrity(format!("no activation date for {}", user)))?;
        let window = CycleWindow::containing(activation, today);
        let (from, to) = window.bounds_ms();
        let units_in_cycle =
            Repository::bonus_in_window(&mut tx, user, BonusKind::Matching, from, to)
                .await?
                .len() as u64;

        let outcome = self.calculator.compute(&node, units_in_cycle);
        if outcome.units_matched == 0 && outcome.leader_pairs == 0 {
            return Ok(None);
        }

        let left_users = Repository::pending_contributors(&mut tx, user, TeamSide::Left).await?;
        let right_users = Repository::pending_contributors(&mut tx, user, TeamSide::Right).await?;

        let unit_payouts =
            self.calculator
                .unit_payouts(&node, &outcome, &left_users, &right_users, now);
        let expected = unit_payouts.len();
        let mut created = self.issue_credits(&mut tx, user, unit_payouts, now).await?;
        if created.len() != expected {
            return Err(ServiceError::stale(format!("matching units of {}", user)));
        }

        if let Some(sponsor) = node.sponsor.clone() {
            let infinity = self.infinity_bonuses(&mut tx, &sponsor, &created, now).await?;
            created.extend(infinity);
        }

        self.calculator.apply(&mut node, &outcome);
        for side in [TeamSide::Left, TeamSide::Right] {
            let carry = match side {
                TeamSide::Left => node.carry_forward_left,
                TeamSide::Right => node.carry_forward_right,
            };
            if carry.is_zero() {
                Repository::settle_credits(&mut tx, user, side).await?;
            }
        }
        store_node(&mut tx, &node).await?;
        tx.commit().await?;

        if outcome.is_capped() {
            info!(
                user_id = %user,
                units_matched = outcome.units_matched,
                units_paid = outcome.units_paid,
                "Cycle cap reached, capped volume flushed"
            );
        }

        Ok(Some(UserMatch {
            units_capped: outcome.units_matched - outcome.units_paid,
            leader_pairs: outcome.leader_pairs,
            payouts: created,
        }))
    }

    /// Infinity Bonus for `sponsor` on each matching unit, at most once per
    /// unit.
    async fn infinity_bonuses(
        &self,
        conn: &mut SqliteConnection,
        sponsor: &UserId,
        matching: &[Payout],
        now: TimeMs,
    ) -> Result<Vec<Payout>, ServiceError> {
        if !self.rates.infinity_pct.is_positive()
            || Repository::fetch_node(conn, sponsor).await?.is_none()
        {
            return Ok(Vec::new());
        }

        let mut payouts = Vec::with_capacity(matching.len());
        for unit in matching {
            let amount = self.rates.infinity_pct.percent_of(unit.amount)?;
            if !amount.is_positive() {
                continue;
            }
            let mut payout = Payout::credit(
                Payout::sourced_id(BonusKind::Infinity, &unit.payout_id, sponsor),
                sponsor.clone(),
                BonusKind::Infinity,
                amount,
            );
            payout.source_ref = Some(unit.payout_id.clone());
            payouts.push(payout);
        }
        self.issue_credits(conn, sponsor, payouts, now).await
    }
}
