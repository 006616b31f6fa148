use crate::api::{parse_enum, AppState, NodeDto};
use crate::domain::{NodeStatus, TeamSide, UserId};
use crate::error::AppError;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRootRequest {
    pub user_id: String,
    pub activated_date: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceRequest {
    pub new_user_id: String,
    pub referrer_id: String,
    pub side: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceResponse {
    pub node: NodeDto,
    pub parent_id: String,
    pub side: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusRequest {
    pub status: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamSideQuery {
    pub descendant: String,
    pub ancestor: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamSideResponse {
    pub descendant: String,
    pub ancestor: String,
    pub side: String,
}

fn user_id(field: &str, raw: &str) -> Result<UserId, AppError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(AppError::BadRequest(format!("{} must not be empty", field)));
    }
    Ok(UserId::new(trimmed))
}

pub async fn create_root(
    State(state): State<AppState>,
    Json(req): Json<CreateRootRequest>,
) -> Result<(StatusCode, Json<NodeDto>), AppError> {
    let user = user_id("userId", &req.user_id)?;
    let node = state
        .orchestrator
        .create_root(&user, req.activated_date)
        .await?;
    Ok((StatusCode::CREATED, Json(node.into())))
}

pub async fn place(
    State(state): State<AppState>,
    Json(req): Json<PlaceRequest>,
) -> Result<(StatusCode, Json<PlaceResponse>), AppError> {
    let new_user = user_id("newUserId", &req.new_user_id)?;
    let referrer = user_id("referrerId", &req.referrer_id)?;
    let side: TeamSide = parse_enum("side", &req.side)?;

    let (node, placement) = state.orchestrator.place(&new_user, &referrer, side).await?;
    Ok((
        StatusCode::CREATED,
        Json(PlaceResponse {
            node: node.into(),
            parent_id: placement.parent.0,
            side: placement.side.as_str().to_string(),
        }),
    ))
}

pub async fn get_node(
    Path(user): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<NodeDto>, AppError> {
    let node = state.orchestrator.get_node(&UserId::new(user)).await?;
    Ok(Json(node.into()))
}

pub async fn set_status(
    Path(user): Path<String>,
    State(state): State<AppState>,
    Json(req): Json<StatusRequest>,
) -> Result<Json<NodeDto>, AppError> {
    let status: NodeStatus = parse_enum("status", &req.status)?;
    let node = state
        .orchestrator
        .set_status(&UserId::new(user), status)
        .await?;
    Ok(Json(node.into()))
}

pub async fn team_side(
    Query(params): Query<TeamSideQuery>,
    State(state): State<AppState>,
) -> Result<Json<TeamSideResponse>, AppError> {
    let descendant = user_id("descendant", &params.descendant)?;
    let ancestor = user_id("ancestor", &params.ancestor)?;
    let side = state.orchestrator.team_side(&descendant, &ancestor).await?;
    Ok(Json(TeamSideResponse {
        descendant: descendant.0,
        ancestor: ancestor.0,
        side: side.as_str().to_string(),
    }))
}
