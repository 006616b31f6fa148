//! Payout hold rule tied to PAN verification and the `pv` metric.

use crate::domain::Decimal;

/// Payouts reaching `min_total_payout` need `pv >= min_pv` unless PAN is
/// verified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HoldTier {
    pub min_total_payout: Decimal,
    pub min_pv: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HoldPolicy {
    /// Sorted by `min_total_payout`, highest first.
    tiers: Vec<HoldTier>,
}

impl HoldPolicy {
    pub fn new(mut tiers: Vec<HoldTier>) -> Self {
        tiers.sort_by(|a, b| b.min_total_payout.cmp(&a.min_total_payout));
        Self { tiers }
    }

    /// Whether a payout bringing the user's lifetime total to
    /// `cumulative_payout` must be created on hold.
    ///
    /// Only the highest tier reached applies.
    pub fn requires_hold(&self, pan_verified: bool, cumulative_payout: Decimal, pv: Decimal) -> bool {
        if pan_verified {
            return false;
        }
        self.tiers
            .iter()
            .find(|tier| cumulative_payout >= tier.min_total_payout)
            .map(|tier| pv < tier.min_pv)
            .unwrap_or(false)
    }
}

impl Default for HoldPolicy {
    fn default() -> Self {
        Self::new(vec![
            HoldTier {
                min_total_payout: Decimal::from_i64(300_000),
                min_pv: Decimal::from_i64(100),
            },
            HoldTier {
                min_total_payout: Decimal::from_i64(150_000),
                min_pv: Decimal::from_i64(50),
            },
            HoldTier {
                min_total_payout: Decimal::from_i64(50_000),
                min_pv: Decimal::from_i64(25),
            },
        ])
    }
}
