use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::{
    error::{AppError, AppResult},
    models::{AggregateRating, Candidate, MediaType, RankedEntry, SentimentTier},
    services::{AccountDeletion, RankingStep},
};

use super::AppState;

// Request/Response types

#[derive(Debug, Deserialize)]
pub struct StartRankingRequest {
    pub title_id: String,
    pub media_type: MediaType,
    pub tier: SentimentTier,
}

#[derive(Debug, Deserialize)]
pub struct AnswerRequest {
    /// Parsed by the service so unknown answers surface as a domain error
    pub answer: String,
}

#[derive(Debug, Deserialize)]
pub struct RankingsQuery {
    pub tier: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RankingsResponse {
    pub user_id: String,
    pub entries: Vec<RankedEntry>,
}

// Handlers

/// Health check endpoint
pub async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}

pub async fn list_rankings(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(query): Query<RankingsQuery>,
) -> AppResult<Json<RankingsResponse>> {
    let tier = query
        .tier
        .as_deref()
        .map(str::parse::<SentimentTier>)
        .transpose()
        .map_err(AppError::InvalidInput)?;

    let entries = state.ranking.rankings(&user_id, tier).await?;
    Ok(Json(RankingsResponse { user_id, entries }))
}

/// Starts placing a title; 201 when it commits without any comparisons
pub async fn start_ranking(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(request): Json<StartRankingRequest>,
) -> AppResult<(StatusCode, Json<RankingStep>)> {
    let candidate = Candidate {
        title_id: request.title_id,
        media_type: request.media_type,
    };
    let step = state
        .ranking
        .start_ranking(&user_id, candidate, request.tier)
        .await?;

    Ok((step_status(&step), Json(step)))
}

pub async fn delete_entry(
    State(state): State<AppState>,
    Path((user_id, title_id)): Path<(String, String)>,
) -> AppResult<Json<RankedEntry>> {
    let removed = state.ranking.delete_entry(&user_id, &title_id).await?;
    Ok(Json(removed))
}

pub async fn current_prompt(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> AppResult<Json<RankingStep>> {
    let step = state.ranking.current_prompt(&user_id).await?;
    Ok(Json(step))
}

pub async fn answer(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(request): Json<AnswerRequest>,
) -> AppResult<(StatusCode, Json<RankingStep>)> {
    let step = state.ranking.answer(&user_id, &request.answer).await?;
    Ok((step_status(&step), Json(step)))
}

pub async fn commit(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> AppResult<(StatusCode, Json<RankingStep>)> {
    let step = state.ranking.commit(&user_id).await?;
    Ok((step_status(&step), Json(step)))
}

pub async fn cancel(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> AppResult<StatusCode> {
    state.ranking.cancel(&user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_account(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> AppResult<Json<AccountDeletion>> {
    let deletion = state.ranking.delete_account(&user_id).await?;
    Ok(Json(deletion))
}

pub async fn get_aggregate(
    State(state): State<AppState>,
    Path(title_id): Path<String>,
) -> AppResult<Json<AggregateRating>> {
    let aggregate = state.ranking.aggregate(&title_id).await?;
    Ok(Json(aggregate))
}

/// Rebuilds the aggregate from every user's entries; `null` once nobody rates it
pub async fn recompute_aggregate(
    State(state): State<AppState>,
    Path(title_id): Path<String>,
) -> AppResult<Json<Option<AggregateRating>>> {
    let aggregate = state.ranking.recompute_aggregate(&title_id).await?;
    Ok(Json(aggregate))
}

fn step_status(step: &RankingStep) -> StatusCode {
    match step {
        RankingStep::Committed { .. } => StatusCode::CREATED,
        RankingStep::Compare { .. } | RankingStep::Resolved { .. } => StatusCode::OK,
    }
}
