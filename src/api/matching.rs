use crate::api::AppState;
use crate::domain::{TimeMs, UserId};
use crate::error::AppError;
use crate::orchestration::RunReport;
use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleQuery {
    /// `yyyy-mm-dd`; defaults to the current UTC date.
    pub today: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleStatsResponse {
    pub user_id: String,
    pub cycle_index: u32,
    pub cycle_start: String,
    pub cycle_end: String,
    pub days_passed: i64,
    pub remaining_days: i64,
    pub matching_bonus_in_cycle: String,
    pub match_count_in_cycle: u64,
}

pub async fn run_matching(State(state): State<AppState>) -> Result<Json<RunReport>, AppError> {
    Ok(Json(state.orchestrator.run_matching_cycle().await?))
}

pub async fn get_cycle_stats(
    Path(user): Path<String>,
    Query(params): Query<CycleQuery>,
    State(state): State<AppState>,
) -> Result<Json<CycleStatsResponse>, AppError> {
    let today = match params.today.as_deref() {
        Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map_err(|_| AppError::BadRequest(format!("today must be yyyy-mm-dd, got {}", raw)))?,
        None => TimeMs::now()
            .utc_date()
            .ok_or_else(|| AppError::Internal("clock out of range".into()))?,
    };

    let user = UserId::new(user);
    let stats = state.orchestrator.get_cycle_stats(&user, today).await?;
    Ok(Json(CycleStatsResponse {
        user_id: user.0,
        cycle_index: stats.cycle_index,
        cycle_start: stats.cycle_start.to_string(),
        cycle_end: stats.cycle_end.to_string(),
        days_passed: stats.days_passed,
        remaining_days: stats.remaining_days,
        matching_bonus_in_cycle: stats.matching_bonus_in_cycle.to_canonical_string(),
        match_count_in_cycle: stats.match_count_in_cycle,
    }))
}
