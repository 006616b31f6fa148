//! Rank ladder records.

use crate::domain::{ParseEnumError, TeamSide, TimeMs, UserId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;

/// Rank tiers in ascending order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RankTier {
    #[serde(rename = "1_star")]
    OneStar,
    #[serde(rename = "2_star")]
    TwoStar,
    #[serde(rename = "3_star")]
    ThreeStar,
    #[serde(rename = "4_star")]
    FourStar,
    #[serde(rename = "5_star")]
    FiveStar,
}

impl RankTier {
    pub const ALL: [RankTier; 5] = [
        RankTier::OneStar,
        RankTier::TwoStar,
        RankTier::ThreeStar,
        RankTier::FourStar,
        RankTier::FiveStar,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RankTier::OneStar => "1_star",
            RankTier::TwoStar => "2_star",
            RankTier::ThreeStar => "3_star",
            RankTier::FourStar => "4_star",
            RankTier::FiveStar => "5_star",
        }
    }
}

impl fmt::Display for RankTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RankTier {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RankTier::ALL
            .into_iter()
            .find(|tier| tier.as_str() == s)
            .ok_or_else(|| ParseEnumError::new("rank tier", s))
    }
}

/// A descendant recorded against one qualification slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualifiedUser {
    pub user_id: UserId,
    pub side: TeamSide,
}

/// A tier achieved by a user; frozen once recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TierAchievement {
    pub achieved_at: TimeMs,
    pub qualified_users: Vec<QualifiedUser>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankRecord {
    pub user_id: UserId,
    pub tiers: BTreeMap<RankTier, TierAchievement>,
}

impl RankRecord {
    pub fn empty(user_id: UserId) -> Self {
        Self {
            user_id,
            tiers: BTreeMap::new(),
        }
    }

    pub fn has(&self, tier: RankTier) -> bool {
        self.tiers.contains_key(&tier)
    }

    pub fn highest(&self) -> Option<RankTier> {
        self.tiers.keys().next_back().copied()
    }

    /// Every descendant already recorded against any slot on the ladder.
    pub fn consumed(&self) -> HashSet<UserId> {
        self.tiers
            .values()
            .flat_map(|a| a.qualified_users.iter().map(|q| q.user_id.clone()))
            .collect()
    }
}
