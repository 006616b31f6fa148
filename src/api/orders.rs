use crate::api::{parse_decimal, AppState, PayoutDto};
use crate::domain::{Order, OrderItem, OrderStatus, TimeMs, UserId};
use crate::error::AppError;
use crate::orchestration::RecordStatus;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemRequest {
    pub business_volume: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRequest {
    pub order_id: String,
    pub user_id: String,
    /// Defaults to the buyer.
    pub placed_by: Option<String>,
    pub amount: String,
    pub items: Vec<OrderItemRequest>,
    pub payment_ref: Option<String>,
    pub created_at: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    pub order_id: String,
    pub status: RecordStatus,
    pub ancestors_credited: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activated_date: Option<String>,
    pub payouts: Vec<PayoutDto>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeRequest {
    pub user_id: String,
    pub amount: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeCreditDto {
    pub ancestor_id: String,
    pub side: String,
    pub amount: String,
}

pub async fn record_order(
    State(state): State<AppState>,
    Json(req): Json<OrderRequest>,
) -> Result<Json<OrderResponse>, AppError> {
    if req.order_id.trim().is_empty() {
        return Err(AppError::BadRequest("orderId must not be empty".into()));
    }
    let items = req
        .items
        .iter()
        .map(|item| {
            Ok(OrderItem {
                business_volume: parse_decimal("businessVolume", &item.business_volume)?,
            })
        })
        .collect::<Result<Vec<_>, AppError>>()?;

    let user_id = UserId::new(req.user_id);
    let order = Order {
        order_id: req.order_id,
        placed_by: req.placed_by.map(UserId::new).unwrap_or_else(|| user_id.clone()),
        user_id,
        amount: parse_decimal("amount", &req.amount)?,
        items,
        payment_ref: req.payment_ref,
        status: OrderStatus::Placed,
        created_at: req.created_at.map(TimeMs::new).unwrap_or_else(TimeMs::now),
    };

    let receipt = state.orchestrator.record_order(&order).await?;
    Ok(Json(OrderResponse {
        order_id: receipt.order_id,
        status: receipt.status,
        ancestors_credited: receipt.credits.len(),
        activated_date: receipt.activated_date,
        payouts: receipt.payouts.into_iter().map(PayoutDto::from).collect(),
    }))
}

pub async fn apply_volume(
    State(state): State<AppState>,
    Json(req): Json<VolumeRequest>,
) -> Result<Json<Vec<VolumeCreditDto>>, AppError> {
    let amount = parse_decimal("amount", &req.amount)?;
    let credits = state
        .orchestrator
        .apply_order_volume(&UserId::new(req.user_id), amount)
        .await?;
    Ok(Json(
        credits
            .into_iter()
            .map(|c| VolumeCreditDto {
                ancestor_id: c.ancestor.0,
                side: c.side.as_str().to_string(),
                amount: c.amount.to_canonical_string(),
            })
            .collect(),
    ))
}
