//! Business-volume propagation up the parent chain.
//!
//! The aggregator does not deduplicate: applying the same order twice counts
//! it twice. Callers guarantee at-most-once application per order.

use super::{EngineError, Tree};
use crate::domain::{Decimal, TeamSide, UserId};

/// Volume added to one ancestor's side counter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeCredit {
    pub ancestor: UserId,
    pub side: TeamSide,
    pub amount: Decimal,
}

/// Credits produced by `amount` of volume originating at `user`, one per
/// ancestor, nearest first. The originating node itself is not credited.
pub fn volume_credits(
    tree: &Tree,
    user: &UserId,
    amount: Decimal,
) -> Result<Vec<VolumeCredit>, EngineError> {
    if amount.is_negative() {
        return Err(EngineError::InvalidAmount(format!(
            "business volume must be non-negative, got {}",
            amount
        )));
    }
    let ancestors = tree.ancestors(user)?;
    if amount.is_zero() {
        return Ok(Vec::new());
    }
    Ok(ancestors
        .into_iter()
        .map(|(ancestor, side)| VolumeCredit {
            ancestor,
            side,
            amount,
        })
        .collect())
}

/// Add each credit to its ancestor's side counter.
pub fn apply_credits(tree: &mut Tree, credits: &[VolumeCredit]) -> Result<(), EngineError> {
    for credit in credits {
        tree.node_mut(&credit.ancestor)?
            .add_volume(credit.side, credit.amount)?;
    }
    Ok(())
}

/// Propagate `amount` from `user` to every ancestor and return the credits.
pub fn apply_order_volume(
    tree: &mut Tree,
    user: &UserId,
    amount: Decimal,
) -> Result<Vec<VolumeCredit>, EngineError> {
    let credits = volume_credits(tree, user, amount)?;
    apply_credits(tree, &credits)?;
    Ok(credits)
}
