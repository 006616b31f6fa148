use crate::api::{parse_decimal, parse_enum, AppState, PayoutDto};
use crate::domain::{PayoutStatus, UserId, Wallet};
use crate::error::AppError;
use crate::orchestration::VerificationUpdate;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayoutsQuery {
    pub user: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PayoutsResponse {
    pub payouts: Vec<PayoutDto>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileRequest {
    pub status: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletDto {
    pub user_id: String,
    pub balance: String,
    pub total_earnings: String,
    pub total_withdrawn: String,
    pub pan_verified: bool,
    pub pv: String,
    pub pan_number: Option<String>,
    pub account_number: Option<String>,
    pub ifsc: Option<String>,
    pub bank_name: Option<String>,
}

impl From<Wallet> for WalletDto {
    fn from(w: Wallet) -> Self {
        Self {
            user_id: w.user_id.0,
            balance: w.balance.to_canonical_string(),
            total_earnings: w.total_earnings.to_canonical_string(),
            total_withdrawn: w.total_withdrawn.to_canonical_string(),
            pan_verified: w.pan_verified,
            pv: w.pv.to_canonical_string(),
            pan_number: w.pan_number,
            account_number: w.account_number,
            ifsc: w.ifsc,
            bank_name: w.bank_name,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationRequest {
    pub pan_verified: Option<bool>,
    pub pv: Option<String>,
    pub pan_number: Option<String>,
    pub account_number: Option<String>,
    pub ifsc: Option<String>,
    pub bank_name: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationResponse {
    pub wallet: WalletDto,
    pub released: Vec<PayoutDto>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseResponse {
    pub released: Vec<PayoutDto>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawRequest {
    pub amount: String,
}

pub async fn list_payouts(
    Query(params): Query<PayoutsQuery>,
    State(state): State<AppState>,
) -> Result<Json<PayoutsResponse>, AppError> {
    let payouts = state
        .orchestrator
        .list_payouts(&UserId::new(params.user))
        .await?;
    Ok(Json(PayoutsResponse {
        payouts: payouts.into_iter().map(PayoutDto::from).collect(),
    }))
}

pub async fn reconcile_payout(
    Path(payout_id): Path<String>,
    State(state): State<AppState>,
    Json(req): Json<ReconcileRequest>,
) -> Result<Json<PayoutDto>, AppError> {
    let to: PayoutStatus = parse_enum("status", &req.status)?;
    let payout = state.orchestrator.reconcile_payout(&payout_id, to).await?;
    Ok(Json(payout.into()))
}

pub async fn get_wallet(
    Path(user): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<WalletDto>, AppError> {
    let wallet = state.orchestrator.get_wallet(&UserId::new(user)).await?;
    Ok(Json(wallet.into()))
}

pub async fn update_verification(
    Path(user): Path<String>,
    State(state): State<AppState>,
    Json(req): Json<VerificationRequest>,
) -> Result<Json<VerificationResponse>, AppError> {
    let update = VerificationUpdate {
        pan_verified: req.pan_verified,
        pv: req.pv.as_deref().map(|raw| parse_decimal("pv", raw)).transpose()?,
        pan_number: req.pan_number,
        account_number: req.account_number,
        ifsc: req.ifsc,
        bank_name: req.bank_name,
    };
    let (wallet, released) = state
        .orchestrator
        .update_verification(&UserId::new(user), update)
        .await?;
    Ok(Json(VerificationResponse {
        wallet: wallet.into(),
        released: released.into_iter().map(PayoutDto::from).collect(),
    }))
}

pub async fn release_holds(
    Path(user): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<ReleaseResponse>, AppError> {
    let user = UserId::new(user);
    state.orchestrator.get_wallet(&user).await?;
    let released = state.orchestrator.release_on_hold_payouts(&user).await?;
    Ok(Json(ReleaseResponse {
        released: released.into_iter().map(PayoutDto::from).collect(),
    }))
}

pub async fn withdraw(
    Path(user): Path<String>,
    State(state): State<AppState>,
    Json(req): Json<WithdrawRequest>,
) -> Result<(StatusCode, Json<PayoutDto>), AppError> {
    let amount = parse_decimal("amount", &req.amount)?;
    let payout = state
        .orchestrator
        .withdraw(&UserId::new(user), amount)
        .await?;
    Ok((StatusCode::CREATED, Json(payout.into())))
}
