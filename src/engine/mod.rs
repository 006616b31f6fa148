//! Pure computation engine for tree placement, volume and bonus logic.
//!
//! Nothing in here touches storage; the orchestration layer loads an arena,
//! runs these functions and persists the outcome.

use crate::domain::{AmountOverflow, Decimal, UserId};
use thiserror::Error;

pub mod cycle;
pub mod hold;
pub mod matching;
pub mod placement;
pub mod rank;
pub mod tree;
pub mod volume;

pub use cycle::{CycleStats, CycleWindow, CYCLE_LENGTH_DAYS};
pub use hold::{HoldPolicy, HoldTier};
pub use matching::{MatchOutcome, MatchingCalculator, MatchingConfig};
pub use placement::Placement;
pub use rank::{ActivityRule, RankEvaluation, RankLadder, RankQualifier, TierRequirement};
pub use tree::Tree;
pub use volume::VolumeCredit;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("Node not found: {0}")]
    NodeNotFound(UserId),
    #[error("User {0} is already placed in the tree")]
    AlreadyPlaced(UserId),
    #[error("{descendant} is not a descendant of {ancestor}")]
    NotADescendant {
        descendant: UserId,
        ancestor: UserId,
    },
    #[error("Insufficient balance: requested {requested}, available {available}")]
    InsufficientBalance {
        requested: Decimal,
        available: Decimal,
    },
    #[error("Duplicate payout: {0}")]
    DuplicatePayout(String),
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Tree integrity violation: {0}")]
    Integrity(String),
}

impl From<AmountOverflow> for EngineError {
    fn from(err: AmountOverflow) -> Self {
        EngineError::InvalidAmount(err.to_string())
    }
}
