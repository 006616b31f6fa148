//! Matching bonus math with carry-forward.
//!
//! Volume matches in whole units of `bv_per_unit`. Each paid unit becomes one
//! ledger record worth `bonus_per_unit`, which keeps the unit boundary visible
//! to per-cycle accounting. Matched volume is removed from both sides; what
//! is left on either side becomes carry-forward, and the current-volume
//! counters reset to zero, so a second run without new volume matches
//! nothing.

use crate::domain::{BonusKind, Decimal, Payout, TimeMs, TreeNode, UserId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchingConfig {
    /// Business volume consumed from each side per match unit.
    pub bv_per_unit: Decimal,
    /// Payout amount per match unit.
    pub bonus_per_unit: Decimal,
    /// Maximum paid units within one 60-day cycle; `None` is uncapped.
    pub max_units_per_cycle: Option<u64>,
}

/// Result of matching one node.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MatchOutcome {
    /// `min(combined_left, combined_right)` before matching.
    pub matchable: Decimal,
    pub units_matched: u64,
    /// Units actually paid after the cycle cap.
    pub units_paid: u64,
    /// Volume removed from each side (`units_matched * bv_per_unit`).
    pub consumed_volume: Decimal,
    pub carry_forward_left: Decimal,
    pub carry_forward_right: Decimal,
    pub leader_pairs: u32,
    pub carry_forward_leaders_left: u32,
    pub carry_forward_leaders_right: u32,
}

impl MatchOutcome {
    pub fn is_capped(&self) -> bool {
        self.units_paid < self.units_matched
    }
}

#[derive(Debug, Clone)]
pub struct MatchingCalculator {
    config: MatchingConfig,
}

impl MatchingCalculator {
    pub fn new(config: MatchingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MatchingConfig {
        &self.config
    }

    /// Active and holding volume on both sides.
    pub fn is_eligible(&self, node: &TreeNode) -> bool {
        node.is_active() && node.combined_left().is_positive() && node.combined_right().is_positive()
    }

    /// Compute the match for `node` given units already paid this cycle.
    ///
    /// Units beyond the cycle cap are still consumed from both sides; the
    /// capped volume does not carry forward.
    pub fn compute(&self, node: &TreeNode, units_in_cycle: u64) -> MatchOutcome {
        let left = node.combined_left();
        let right = node.combined_right();
        let matchable = left.min(right);

        let units_matched = matchable.whole_units(self.config.bv_per_unit);
        let remaining_cap = self
            .config
            .max_units_per_cycle
            .map(|cap| cap.saturating_sub(units_in_cycle))
            .unwrap_or(u64::MAX);
        let units_paid = units_matched.min(remaining_cap);
        let consumed_volume = Decimal::from(units_matched) * self.config.bv_per_unit;

        let leaders_left = node.leaders_left + node.carry_forward_leaders_left;
        let leaders_right = node.leaders_right + node.carry_forward_leaders_right;
        let leader_pairs = leaders_left.min(leaders_right);

        MatchOutcome {
            matchable,
            units_matched,
            units_paid,
            consumed_volume,
            carry_forward_left: left - consumed_volume,
            carry_forward_right: right - consumed_volume,
            leader_pairs,
            carry_forward_leaders_left: leaders_left - leader_pairs,
            carry_forward_leaders_right: leaders_right - leader_pairs,
        }
    }

    /// Fold an outcome back into the node.
    pub fn apply(&self, node: &mut TreeNode, outcome: &MatchOutcome) {
        node.left_volume = Decimal::zero();
        node.right_volume = Decimal::zero();
        node.carry_forward_left = outcome.carry_forward_left;
        node.carry_forward_right = outcome.carry_forward_right;
        node.leaders_left = 0;
        node.leaders_right = 0;
        node.carry_forward_leaders_left = outcome.carry_forward_leaders_left;
        node.carry_forward_leaders_right = outcome.carry_forward_leaders_right;
        node.matched_units += outcome.units_paid;
    }

    /// One pending credit per paid unit, numbered after the node's lifetime
    /// unit counter (call before `apply`).
    pub fn unit_payouts(
        &self,
        node: &TreeNode,
        outcome: &MatchOutcome,
        left_users: &[UserId],
        right_users: &[UserId],
        now: TimeMs,
    ) -> Vec<Payout> {
        (1..=outcome.units_paid)
            .map(|k| {
                let mut payout = Payout::credit(
                    Payout::matching_id(&node.user_id, node.matched_units + k),
                    node.user_id.clone(),
                    BonusKind::Matching,
                    self.config.bonus_per_unit,
                );
                payout.left_users = left_users.to_vec();
                payout.right_users = right_users.to_vec();
                payout.created_at = now;
                payout
            })
            .collect()
    }
}
