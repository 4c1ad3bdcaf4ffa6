use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use super::ApiResult;
use crate::{
    dtos::{
        CorrectionListQuery, CreateCorrectionRequest, RejectCorrectionRequest,
        SubmitCorrectionRequest, UpdateCorrectionRequest,
    },
    middleware::ActorContext,
    models::Correction,
    startup::AppState,
    utils::ValidatedJson,
};

pub async fn create_correction(
    State(state): State<AppState>,
    actor: ActorContext,
    ValidatedJson(req): ValidatedJson<CreateCorrectionRequest>,
) -> ApiResult<(StatusCode, Json<Correction>)> {
    let correction = state.corrections.create_draft(&actor, req.into()).await?;
    Ok((StatusCode::CREATED, Json(correction)))
}

pub async fn list_corrections(
    State(state): State<AppState>,
    _actor: ActorContext,
    Query(query): Query<CorrectionListQuery>,
) -> ApiResult<Json<Vec<Correction>>> {
    let corrections = state
        .corrections
        .list_for_target(query.target_type, query.target_id)
        .await?;
    Ok(Json(corrections))
}

pub async fn get_correction(
    State(state): State<AppState>,
    _actor: ActorContext,
    Path(correction_id): Path<Uuid>,
) -> ApiResult<Json<Correction>> {
    Ok(Json(state.corrections.get(correction_id).await?))
}

pub async fn update_correction(
    State(state): State<AppState>,
    actor: ActorContext,
    Path(correction_id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<UpdateCorrectionRequest>,
) -> ApiResult<Json<Correction>> {
    let correction = state
        .corrections
        .update_draft(&actor, correction_id, req.into())
        .await?;
    Ok(Json(correction))
}

pub async fn submit_correction(
    State(state): State<AppState>,
    actor: ActorContext,
    Path(correction_id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<SubmitCorrectionRequest>,
) -> ApiResult<Json<Correction>> {
    let correction = state
        .corrections
        .submit(&actor, correction_id, req.attachments)
        .await?;
    Ok(Json(correction))
}

pub async fn approve_and_execute(
    State(state): State<AppState>,
    actor: ActorContext,
    Path(correction_id): Path<Uuid>,
) -> ApiResult<Json<Correction>> {
    let correction = state
        .corrections
        .approve_and_execute(&actor, correction_id)
        .await?;
    Ok(Json(correction))
}

pub async fn reject_correction(
    State(state): State<AppState>,
    actor: ActorContext,
    Path(correction_id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<RejectCorrectionRequest>,
) -> ApiResult<Json<Correction>> {
    let correction = state
        .corrections
        .reject(&actor, correction_id, req.note)
        .await?;
    Ok(Json(correction))
}
