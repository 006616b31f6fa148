pub mod health;
pub mod matching;
pub mod orders;
pub mod payouts;
pub mod ranks;
pub mod tree;

use crate::config::Config;
use crate::domain::{Decimal, Payout, TreeNode};
use crate::error::AppError;
use crate::orchestration::Orchestrator;
use axum::{
    routing::{get, post, put},
    Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub orchestrator: Arc<Orchestrator>,
}

impl AppState {
    pub fn new(config: Config, orchestrator: Arc<Orchestrator>) -> Self {
        Self {
            config,
            orchestrator,
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route("/v1/tree/roots", post(tree::create_root))
        .route("/v1/tree/place", post(tree::place))
        .route("/v1/tree/team-side", get(tree::team_side))
        .route("/v1/tree/nodes/:user_id", get(tree::get_node))
        .route("/v1/tree/nodes/:user_id/status", put(tree::set_status))
        .route("/v1/orders", post(orders::record_order))
        .route("/v1/volume", post(orders::apply_volume))
        .route("/v1/matching/run", post(matching::run_matching))
        .route("/v1/cycles/:user_id", get(matching::get_cycle_stats))
        .route("/v1/ranks/:user_id", get(ranks::get_rank))
        .route("/v1/ranks/:user_id/evaluate", post(ranks::evaluate_rank))
        .route("/v1/payouts", get(payouts::list_payouts))
        .route(
            "/v1/payouts/:payout_id/reconcile",
            post(payouts::reconcile_payout),
        )
        .route("/v1/wallets/:user_id", get(payouts::get_wallet))
        .route(
            "/v1/wallets/:user_id/verification",
            put(payouts::update_verification),
        )
        .route("/v1/wallets/:user_id/release", post(payouts::release_holds))
        .route("/v1/wallets/:user_id/withdraw", post(payouts::withdraw))
        .layer(cors)
        .with_state(state)
}

pub(crate) fn parse_decimal(field: &str, raw: &str) -> Result<Decimal, AppError> {
    Decimal::from_str_canonical(raw)
        .map_err(|_| AppError::BadRequest(format!("{} must be a decimal string, got {:?}", field, raw)))
}

pub(crate) fn parse_enum<T: std::str::FromStr>(field: &str, raw: &str) -> Result<T, AppError> {
    raw.parse::<T>()
        .map_err(|_| AppError::BadRequest(format!("invalid {}: {}", field, raw)))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeDto {
    pub user_id: String,
    pub sponsor_id: Option<String>,
    pub parent_id: Option<String>,
    pub left_id: Option<String>,
    pub right_id: Option<String>,
    pub left_volume: String,
    pub right_volume: String,
    pub carry_forward_left: String,
    pub carry_forward_right: String,
    pub leaders_left: u32,
    pub leaders_right: u32,
    pub carry_forward_leaders_left: u32,
    pub carry_forward_leaders_right: u32,
    pub matched_units: u64,
    pub has_ordered: bool,
    pub status: String,
    pub activated_date: Option<String>,
    pub created_at: i64,
}

impl From<TreeNode> for NodeDto {
    fn from(n: TreeNode) -> Self {
        Self {
            user_id: n.user_id.0,
            sponsor_id: n.sponsor.map(|u| u.0),
            parent_id: n.parent.map(|u| u.0),
            left_id: n.left.map(|u| u.0),
            right_id: n.right.map(|u| u.0),
            left_volume: n.left_volume.to_canonical_string(),
            right_volume: n.right_volume.to_canonical_string(),
            carry_forward_left: n.carry_forward_left.to_canonical_string(),
            carry_forward_right: n.carry_forward_right.to_canonical_string(),
            leaders_left: n.leaders_left,
            leaders_right: n.leaders_right,
            carry_forward_leaders_left: n.carry_forward_leaders_left,
            carry_forward_leaders_right: n.carry_forward_leaders_right,
            matched_units: n.matched_units,
            has_ordered: n.has_ordered,
            status: n.status.as_str().to_string(),
            activated_date: n.activated_date,
            created_at: n.created_at.as_ms(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PayoutDto {
    pub payout_id: String,
    pub user_id: String,
    pub name: String,
    pub amount: String,
    pub transaction_type: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_ref: Option<String>,
    pub left_users: Vec<String>,
    pub right_users: Vec<String>,
    pub account_number: Option<String>,
    pub ifsc: Option<String>,
    pub bank_name: Option<String>,
    pub pan_number: Option<String>,
    pub pan_verified: bool,
    pub created_at: i64,
}

impl From<Payout> for PayoutDto {
    fn from(p: Payout) -> Self {
        Self {
            payout_id: p.payout_id,
            user_id: p.user_id.0,
            name: p.name.as_str().to_string(),
            amount: p.amount.to_canonical_string(),
            transaction_type: p.transaction_type.as_str().to_string(),
            status: p.status.as_str().to_string(),
            source_ref: p.source_ref,
            left_users: p.left_users.into_iter().map(|u| u.0).collect(),
            right_users: p.right_users.into_iter().map(|u| u.0).collect(),
            account_number: p.bank.account_number,
            ifsc: p.bank.ifsc,
            bank_name: p.bank.bank_name,
            pan_number: p.bank.pan_number,
            pan_verified: p.bank.pan_verified,
            created_at: p.created_at.as_ms(),
        }
    }
}
