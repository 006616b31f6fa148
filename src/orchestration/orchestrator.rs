use crate::config::{BonusRates, Config};
use crate::db::Repository;
use crate::engine::{HoldPolicy, MatchingCalculator, RankQualifier};
use crate::notify::{Notification, NotificationSink};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Entry point for every engine operation exposed to callers.
///
/// Operations are split across the sibling modules by concern, each adding
/// an `impl Orchestrator` block.
#[derive(Clone)]
pub struct Orchestrator {
    pub(super) repo: Arc<Repository>,
    pub(super) calculator: MatchingCalculator,
    pub(super) qualifier: RankQualifier,
    pub(super) hold_policy: HoldPolicy,
    pub(super) rates: BonusRates,
    pub(super) concurrency: usize,
    notifier: Arc<dyn NotificationSink>,
}

impl Orchestrator {
    pub fn new(repo: Arc<Repository>, config: &Config, notifier: Arc<dyn NotificationSink>) -> Self {
        Self {
            repo,
            calculator: MatchingCalculator::new(config.matching.clone()),
            qualifier: RankQualifier::new(config.rank_ladder.clone()),
            hold_policy: HoldPolicy::default(),
            rates: config.bonus_rates.clone(),
            concurrency: config.matching_concurrency.max(1),
            notifier,
        }
    }

    pub fn with_hold_policy(mut self, hold_policy: HoldPolicy) -> Self {
        self.hold_policy = hold_policy;
        self
    }

    pub fn repo(&self) -> &Arc<Repository> {
        &self.repo
    }

    /// Deliver notifications after commit. Failures are logged only.
    pub(super) async fn notify_all(&self, notifications: Vec<Notification>) {
        for notification in notifications {
            if let Err(e) = self.notifier.send(&notification).await {
                warn!(
                    user_id = %notification.user_id(),
                    error = %e,
                    "Notification delivery failed"
                );
            }
        }
    }

    /// Trigger `run_matching_cycle` every `period`. The first tick fires
    /// after one full period.
    pub fn spawn_scheduler(&self, period: Duration) -> JoinHandle<()> {
        let orchestrator = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match orchestrator.run_matching_cycle().await {
                    Ok(report) => info!(
                        users_scanned = report.users_scanned,
                        users_matched = report.users_matched,
                        payouts_created = report.payouts_created,
                        failures = report.failures.len(),
                        "Scheduled matching run finished"
                    ),
                    Err(e) => warn!(error = %e, "Scheduled matching run failed"),
                }
            }
        })
    }
}
