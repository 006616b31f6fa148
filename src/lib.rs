pub mod api;
pub mod config;
pub mod db;
pub mod domain;
pub mod engine;
pub mod error;
pub mod notify;
pub mod orchestration;

pub use config::Config;
pub use db::{init_db, Repository};
pub use domain::{
    BonusKind, Decimal, NodeStatus, Order, OrderItem, Payout, PayoutStatus, RankRecord, RankTier,
    TeamSide, TimeMs, TreeNode, UserId, Wallet,
};
pub use engine::EngineError;
pub use error::AppError;
pub use notify::{LogNotificationSink, MockNotificationSink, NotificationSink, WebhookNotificationSink};
pub use orchestration::{Orchestrator, ServiceError};
