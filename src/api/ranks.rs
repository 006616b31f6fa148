use crate::api::AppState;
use crate::domain::{RankRecord, UserId};
use crate::error::AppError;
use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QualifiedUserDto {
    pub user_id: String,
    pub team: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TierDto {
    pub tier: String,
    pub achieved_at: i64,
    pub qualified_users: Vec<QualifiedUserDto>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankResponse {
    pub user_id: String,
    pub highest: Option<String>,
    pub tiers: Vec<TierDto>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub newly_achieved: Vec<String>,
}

fn rank_response(record: RankRecord, newly_achieved: Vec<String>) -> RankResponse {
    RankResponse {
        user_id: record.user_id.0.clone(),
        highest: record.highest().map(|t| t.as_str().to_string()),
        tiers: record
            .tiers
            .into_iter()
            .map(|(tier, achievement)| TierDto {
                tier: tier.as_str().to_string(),
                achieved_at: achievement.achieved_at.as_ms(),
                qualified_users: achievement
                    .qualified_users
                    .into_iter()
                    .map(|q| QualifiedUserDto {
                        user_id: q.user_id.0,
                        team: q.side.as_str().to_string(),
                    })
                    .collect(),
            })
            .collect(),
        newly_achieved,
    }
}

pub async fn get_rank(
    Path(user): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<RankResponse>, AppError> {
    let record = state.orchestrator.get_rank(&UserId::new(user)).await?;
    Ok(Json(rank_response(record, Vec::new())))
}

pub async fn evaluate_rank(
    Path(user): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<RankResponse>, AppError> {
    let evaluation = state.orchestrator.evaluate_rank(&UserId::new(user)).await?;
    let newly = evaluation
        .newly_achieved
        .iter()
        .map(|t| t.as_str().to_string())
        .collect();
    Ok(Json(rank_response(evaluation.record, newly)))
}
