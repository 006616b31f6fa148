//! Rank ladder qualification from tree shape.
//!
//! A tier needs a number of qualified descendants on each side. Every
//! descendant recorded against a slot is consumed for the whole ladder and
//! never counts toward another slot.

use super::{EngineError, Tree};
use crate::domain::{
    NodeStatus, QualifiedUser, RankRecord, RankTier, TeamSide, TierAchievement, TimeMs, TreeNode,
    UserId,
};
use std::collections::HashSet;

/// Activity a descendant must show to fill a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityRule {
    Active,
    ActiveWithOrder,
}

impl ActivityRule {
    pub fn admits(&self, node: &TreeNode) -> bool {
        match self {
            ActivityRule::Active => node.status == NodeStatus::Active,
            ActivityRule::ActiveWithOrder => node.status == NodeStatus::Active && node.has_ordered,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierRequirement {
    pub tier: RankTier,
    pub left: usize,
    pub right: usize,
    pub activity: ActivityRule,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankLadder {
    requirements: Vec<TierRequirement>,
}

impl RankLadder {
    pub fn new(mut requirements: Vec<TierRequirement>) -> Self {
        requirements.sort_by_key(|r| r.tier);
        Self { requirements }
    }

    /// Ladder from `(left, right)` counts assigned to tiers in ascending
    /// order; extra entries beyond the last tier are ignored.
    pub fn from_counts(counts: &[(usize, usize)]) -> Self {
        Self::new(
            RankTier::ALL
                .iter()
                .zip(counts)
                .map(|(tier, (left, right))| TierRequirement {
                    tier: *tier,
                    left: *left,
                    right: *right,
                    activity: ActivityRule::ActiveWithOrder,
                })
                .collect(),
        )
    }

    pub fn requirements(&self) -> &[TierRequirement] {
        &self.requirements
    }
}

impl Default for RankLadder {
    fn default() -> Self {
        Self::from_counts(&[(1, 1), (2, 2), (4, 4), (8, 8), (16, 16)])
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankEvaluation {
    pub record: RankRecord,
    pub newly_achieved: Vec<RankTier>,
}

impl RankEvaluation {
    /// True when this evaluation gave the user their first tier.
    pub fn first_achievement(&self) -> bool {
        !self.newly_achieved.is_empty() && self.record.tiers.len() == self.newly_achieved.len()
    }
}

#[derive(Debug, Clone, Default)]
pub struct RankQualifier {
    ladder: RankLadder,
}

impl RankQualifier {
    pub fn new(ladder: RankLadder) -> Self {
        Self { ladder }
    }

    /// Advance `existing` as far up the ladder as the tree allows.
    ///
    /// Tiers are tried in ascending order and evaluation stops at the first
    /// one that cannot be met. Tiers already in the record stay frozen.
    /// `tree` must hold `user` and its whole subtree.
    pub fn evaluate(
        &self,
        tree: &Tree,
        user: &UserId,
        existing: RankRecord,
        now: TimeMs,
    ) -> Result<RankEvaluation, EngineError> {
        tree.node(user)?;
        let left_pool = tree.side_descendants(user, TeamSide::Left)?;
        let right_pool = tree.side_descendants(user, TeamSide::Right)?;

        let mut record = existing;
        let mut consumed = record.consumed();
        let mut newly_achieved = Vec::new();

        for requirement in self.ladder.requirements() {
            if record.has(requirement.tier) {
                continue;
            }
            let left = pick(tree, &left_pool, requirement.left, requirement.activity, &consumed);
            let right = pick(tree, &right_pool, requirement.right, requirement.activity, &consumed);
            if left.len() < requirement.left || right.len() < requirement.right {
                break;
            }

            let qualified_users: Vec<QualifiedUser> = left
                .into_iter()
                .map(|user_id| QualifiedUser {
                    user_id,
                    side: TeamSide::Left,
                })
                .chain(right.into_iter().map(|user_id| QualifiedUser {
                    user_id,
                    side: TeamSide::Right,
                }))
                .collect();
            consumed.extend(qualified_users.iter().map(|q| q.user_id.clone()));
            record.tiers.insert(
                requirement.tier,
                TierAchievement {
                    achieved_at: now,
                    qualified_users,
                },
            );
            newly_achieved.push(requirement.tier);
        }

        Ok(RankEvaluation {
            record,
            newly_achieved,
        })
    }
}

/// First `count` unconsumed descendants from `pool` admitted by `rule`.
fn pick(
    tree: &Tree,
    pool: &[UserId],
    count: usize,
    rule: ActivityRule,
    consumed: &HashSet<UserId>,
) -> Vec<UserId> {
    pool.iter()
        .filter(|id| !consumed.contains(*id))
        .filter(|id| tree.get(id).map(|n| rule.admits(n)).unwrap_or(false))
        .take(count)
        .cloned()
        .collect()
}
