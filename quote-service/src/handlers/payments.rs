use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use super::ApiResult;
use crate::{
    dtos::{BatchPaymentRequest, FinanceConfirmRequest},
    middleware::ActorContext,
    models::QuotePayment,
    services::ledger::{BatchOutcome, DecisionOutcome},
    startup::AppState,
    utils::ValidatedJson,
};

/// Allocate one receipt over several quotes.
pub async fn create_batch_payment(
    State(state): State<AppState>,
    actor: ActorContext,
    ValidatedJson(req): ValidatedJson<BatchPaymentRequest>,
) -> ApiResult<(StatusCode, Json<BatchOutcome>)> {
    let outcome = state.ledger.create_batch_payment(&actor, req.into()).await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

pub async fn get_payment(
    State(state): State<AppState>,
    _actor: ActorContext,
    Path(payment_id): Path<Uuid>,
) -> ApiResult<Json<QuotePayment>> {
    Ok(Json(state.ledger.get_payment(payment_id).await?))
}

pub async fn finance_confirm(
    State(state): State<AppState>,
    actor: ActorContext,
    Path(payment_id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<FinanceConfirmRequest>,
) -> ApiResult<Json<DecisionOutcome>> {
    let outcome = state
        .ledger
        .finance_confirm(&actor, req.into_input(payment_id))
        .await?;
    Ok(Json(outcome))
}
