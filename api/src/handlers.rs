//! Axum handlers binding the external verb set (spec.md §6) to HTTP. Each
//! handler does I/O and status-code shaping only; the actual rules live in
//! `engine::Lifecycle` / `engine::Aggregator`.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use shared::{Bucket, IntervalPatch, PortfolioFilter, ResourceStatus, ServiceLine, Stage};

use crate::{error::ApiResult, state::AppState};

fn parse_service_line(raw: &str) -> ApiResult<ServiceLine> {
    ServiceLine::parse(raw).ok_or_else(|| crate::error::ApiError::bad_request("InvalidServiceLine", format!("unknown service line {raw}")))
}

fn parse_stage(raw: &str) -> ApiResult<Stage> {
    Stage::parse(raw).ok_or_else(|| crate::error::ApiError::bad_request("InvalidStage", format!("unknown stage {raw}")))
}

fn parse_status(raw: &str) -> ApiResult<ResourceStatus> {
    ResourceStatus::parse(raw)
        .ok_or_else(|| crate::error::ApiError::bad_request("InvalidStatus", format!("unknown resource status {raw}")))
}

#[derive(Debug, Serialize)]
struct TimelineResponse {
    category: Option<String>,
    stored_rows: usize,
    per_service_line: Vec<ServiceLineTimeline>,
}

#[derive(Debug, Serialize)]
struct ServiceLineTimeline {
    service_line: ServiceLine,
    resource_category: Option<String>,
    intervals: Vec<shared::StageInterval>,
}

pub async fn compute_timeline(State(state): State<AppState>, Path(opportunity_id): Path<String>) -> ApiResult<impl IntoResponse> {
    let (bundle, stored_rows) = state.lifecycle.calculate_and_store(&opportunity_id, ResourceStatus::Predicted).await?;

    let per_service_line = bundle
        .per_service_line
        .into_iter()
        .map(|(service_line, intervals)| ServiceLineTimeline {
            service_line,
            resource_category: bundle
                .service_line_categories
                .iter()
                .find(|(sl, _)| *sl == service_line)
                .map(|(_, name)| name.clone()),
            intervals,
        })
        .collect();

    Ok(Json(TimelineResponse { category: bundle.category, stored_rows, per_service_line }))
}

pub async fn get_timeline(
    State(state): State<AppState>,
    Path(opportunity_id): Path<String>,
) -> ApiResult<Json<Vec<shared::OpportunityResourceTimeline>>> {
    Ok(Json(state.lifecycle.get_timeline(&opportunity_id).await?))
}

#[derive(Debug, Serialize)]
struct DeletedCount {
    deleted: u64,
}

pub async fn delete_timeline(State(state): State<AppState>, Path(opportunity_id): Path<String>) -> ApiResult<impl IntoResponse> {
    let deleted = state.lifecycle.delete_timeline(&opportunity_id).await?;
    Ok(Json(DeletedCount { deleted }))
}

#[derive(Debug, Deserialize)]
pub struct PatchStatusRequest {
    pub service_line: Option<String>,
    pub stage: Option<String>,
    pub status: String,
}

#[derive(Debug, Serialize)]
struct UpdatedCount {
    updated: u64,
}

pub async fn patch_status(
    State(state): State<AppState>,
    Path(opportunity_id): Path<String>,
    Json(req): Json<PatchStatusRequest>,
) -> ApiResult<impl IntoResponse> {
    let service_line = req.service_line.as_deref().map(parse_service_line).transpose()?;
    let stage = req.stage.as_deref().map(parse_stage).transpose()?;
    let status = parse_status(&req.status)?;
    let updated = state.lifecycle.patch_status(&opportunity_id, service_line, stage, status).await?;
    Ok(Json(UpdatedCount { updated }))
}

#[derive(Debug, Deserialize)]
pub struct PatchIntervalRequest {
    pub stage_start_date: chrono::NaiveDate,
    pub stage_end_date: chrono::NaiveDate,
    pub duration_weeks: u32,
    pub fte_required: f64,
    pub resource_status: String,
}

pub async fn patch_interval(
    State(state): State<AppState>,
    Path((opportunity_id, service_line, stage)): Path<(String, String, String)>,
    Json(req): Json<PatchIntervalRequest>,
) -> ApiResult<Json<shared::OpportunityResourceTimeline>> {
    let service_line = parse_service_line(&service_line)?;
    let stage = parse_stage(&stage)?;
    let resource_status = parse_status(&req.resource_status)?;

    let patch = IntervalPatch {
        stage_start_date: req.stage_start_date,
        stage_end_date: req.stage_end_date,
        duration_weeks: req.duration_weeks,
        fte_required: req.fte_required,
        resource_status,
    };

    Ok(Json(state.lifecycle.patch_interval(&opportunity_id, service_line, stage, patch).await?))
}

#[derive(Debug, Deserialize)]
pub struct GenerateBulkRequest {
    #[serde(default)]
    pub regenerate_predicted: bool,
}

pub async fn generate_bulk(
    State(state): State<AppState>,
    Json(req): Json<GenerateBulkRequest>,
) -> ApiResult<Json<engine::BulkGenerationResult>> {
    let result = state.lifecycle.generate_bulk(req.regenerate_predicted).await?;
    tracing::info!(
        generated = result.generated,
        updated = result.updated,
        skipped = result.skipped,
        errors = result.errors,
        "bulk timeline generation complete"
    );
    Ok(Json(result))
}

pub async fn generation_stats(State(state): State<AppState>) -> ApiResult<Json<engine::GenerationStats>> {
    Ok(Json(state.lifecycle.generation_stats().await?))
}

pub async fn clear_predicted(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let deleted = state.lifecycle.clear_predicted().await?;
    Ok(Json(DeletedCount { deleted }))
}

#[derive(Debug, Deserialize)]
pub struct PortfolioForecastRequest {
    #[serde(default)]
    pub filter: PortfolioFilter,
    pub bucket: String,
}

pub async fn portfolio_forecast(
    State(state): State<AppState>,
    Json(req): Json<PortfolioForecastRequest>,
) -> ApiResult<Json<engine::PortfolioForecast>> {
    let bucket = Bucket::parse(&req.bucket)
        .ok_or_else(|| crate::error::ApiError::bad_request("InvalidBucket", format!("unknown bucket {}", req.bucket)))?;
    Ok(Json(state.aggregator.portfolio_forecast(&req.filter, bucket).await?))
}

#[derive(Debug, Serialize)]
struct TimelineBoundsResponse {
    earliest: Option<chrono::NaiveDate>,
    latest: Option<chrono::NaiveDate>,
}

pub async fn timeline_bounds(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let (earliest, latest) = state.aggregator.timeline_bounds().await?;
    Ok(Json(TimelineBoundsResponse { earliest, latest }))
}

pub async fn route_not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(serde_json::json!({ "error": "NotFound", "message": "no such route" })))
}
