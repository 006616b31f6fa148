//! Domain types for the binary-tree commission engine.
//!
//! This module provides:
//! - Lossless numeric handling via Decimal wrapper
//! - Domain primitives: TimeMs, UserId, TeamSide, NodeStatus
//! - Entity value types: TreeNode, Order, Payout, RankRecord, Wallet

pub mod decimal;
pub mod order;
pub mod payout;
pub mod primitives;
pub mod rank;
pub mod tree_node;
pub mod wallet;

pub use decimal::{AmountOverflow, Decimal};
pub use order::{Order, OrderItem, OrderStatus};
pub use payout::{BankSnapshot, BonusKind, Payout, PayoutStatus, TransactionType};
pub use primitives::{NodeStatus, ParseEnumError, TeamSide, TimeMs, UserId};
pub use rank::{QualifiedUser, RankRecord, RankTier, TierAchievement};
pub use tree_node::TreeNode;
pub use wallet::Wallet;
