//! Binary tree node: placement links, subtree volumes and leadership counters.

use crate::domain::{AmountOverflow, Decimal, NodeStatus, TeamSide, TimeMs, UserId};
use serde::{Deserialize, Serialize};

/// One node per user in the binary referral tree.
///
/// `left`/`right` and `parent` must agree: if `a.left == Some(b)` then
/// `b.parent == Some(a)`. `sponsor` is the referrer that introduced the user
/// and may sit above `parent` after spillover.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeNode {
    pub user_id: UserId,
    pub sponsor: Option<UserId>,
    pub parent: Option<UserId>,
    pub left: Option<UserId>,
    pub right: Option<UserId>,
    pub left_volume: Decimal,
    pub right_volume: Decimal,
    pub carry_forward_left: Decimal,
    pub carry_forward_right: Decimal,
    pub leaders_left: u32,
    pub leaders_right: u32,
    pub carry_forward_leaders_left: u32,
    pub carry_forward_leaders_right: u32,
    /// Lifetime count of matching units paid to this user.
    pub matched_units: u64,
    pub has_ordered: bool,
    pub status: NodeStatus,
    /// Activation date in `dd-mm-yyyy` form, when known.
    pub activated_date: Option<String>,
    pub created_at: TimeMs,
    /// Optimistic-concurrency version; bumped by every persisted write.
    pub version: i64,
}

impl TreeNode {
    /// A fresh, inactive node with no links and zero volume.
    pub fn new(user_id: UserId, created_at: TimeMs) -> Self {
        Self {
            user_id,
            sponsor: None,
            parent: None,
            left: None,
            right: None,
            left_volume: Decimal::zero(),
            right_volume: Decimal::zero(),
            carry_forward_left: Decimal::zero(),
            carry_forward_right: Decimal::zero(),
            leaders_left: 0,
            leaders_right: 0,
            carry_forward_leaders_left: 0,
            carry_forward_leaders_right: 0,
            matched_units: 0,
            has_ordered: false,
            status: NodeStatus::Inactive,
            activated_date: None,
            created_at,
            version: 0,
        }
    }

    pub fn child(&self, side: TeamSide) -> Option<&UserId> {
        match side {
            TeamSide::Left => self.left.as_ref(),
            TeamSide::Right => self.right.as_ref(),
        }
    }

    pub fn set_child(&mut self, side: TeamSide, child: UserId) {
        match side {
            TeamSide::Left => self.left = Some(child),
            TeamSide::Right => self.right = Some(child),
        }
    }

    /// Which side `child` occupies under this node, if any.
    pub fn side_of_child(&self, child: &UserId) -> Option<TeamSide> {
        if self.left.as_ref() == Some(child) {
            Some(TeamSide::Left)
        } else if self.right.as_ref() == Some(child) {
            Some(TeamSide::Right)
        } else {
            None
        }
    }

    /// Add `amount` to one side's current volume. The node is left
    /// untouched when the new total is out of range.
    pub fn add_volume(&mut self, side: TeamSide, amount: Decimal) -> Result<(), AmountOverflow> {
        let volume = match side {
            TeamSide::Left => &mut self.left_volume,
            TeamSide::Right => &mut self.right_volume,
        };
        *volume = volume.try_add(amount)?;
        Ok(())
    }

    pub fn add_leader(&mut self, side: TeamSide) {
        match side {
            TeamSide::Left => self.leaders_left += 1,
            TeamSide::Right => self.leaders_right += 1,
        }
    }

    /// Current plus carried-forward volume on the left.
    pub fn combined_left(&self) -> Decimal {
        self.left_volume.saturating_add(self.carry_forward_left)
    }

    /// Current plus carried-forward volume on the right.
    pub fn combined_right(&self) -> Decimal {
        self.right_volume.saturating_add(self.carry_forward_right)
    }

    pub fn is_active(&self) -> bool {
        self.status == NodeStatus::Active
    }
}
