use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use super::ApiResult;
use crate::{
    dtos::{
        ChangeCollectorRequest, CreateQuoteRequest, LinkDownstreamRequest, QuoteItemRequest,
        SubmitPaymentRequest, UpdateQuoteItemRequest,
    },
    middleware::ActorContext,
    models::{CollectorHistory, Quote, QuoteCredit, QuoteItem, QuotePayment},
    services::{ledger::SubmissionOutcome, quotes::QuoteDetail},
    startup::AppState,
    utils::ValidatedJson,
};

pub async fn create_quote(
    State(state): State<AppState>,
    actor: ActorContext,
    ValidatedJson(req): ValidatedJson<CreateQuoteRequest>,
) -> ApiResult<(StatusCode, Json<Quote>)> {
    let quote = state.quotes.create(req.into_input(&actor)).await?;
    Ok((StatusCode::CREATED, Json(quote)))
}

pub async fn get_quote(
    State(state): State<AppState>,
    _actor: ActorContext,
    Path(quote_id): Path<Uuid>,
) -> ApiResult<Json<QuoteDetail>> {
    Ok(Json(state.quotes.get(quote_id).await?))
}

pub async fn list_items(
    State(state): State<AppState>,
    _actor: ActorContext,
    Path(quote_id): Path<Uuid>,
) -> ApiResult<Json<Vec<QuoteItem>>> {
    Ok(Json(state.quotes.list_items(quote_id).await?))
}

pub async fn add_item(
    State(state): State<AppState>,
    actor: ActorContext,
    Path(quote_id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<QuoteItemRequest>,
) -> ApiResult<(StatusCode, Json<QuoteDetail>)> {
    tracing::info!(quote_id = %quote_id, user_id = %actor.user_id, "Adding quote item");
    let detail = state.quotes.add_item(quote_id, req.into()).await?;
    Ok((StatusCode::CREATED, Json(detail)))
}

pub async fn update_item(
    State(state): State<AppState>,
    actor: ActorContext,
    Path((quote_id, item_id)): Path<(Uuid, Uuid)>,
    ValidatedJson(req): ValidatedJson<UpdateQuoteItemRequest>,
) -> ApiResult<Json<QuoteDetail>> {
    tracing::info!(quote_id = %quote_id, item_id = %item_id, user_id = %actor.user_id, "Updating quote item");
    Ok(Json(state.quotes.update_item(quote_id, item_id, req.into()).await?))
}

pub async fn remove_item(
    State(state): State<AppState>,
    actor: ActorContext,
    Path((quote_id, item_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<QuoteDetail>> {
    tracing::info!(quote_id = %quote_id, item_id = %item_id, user_id = %actor.user_id, "Removing quote item");
    Ok(Json(state.quotes.remove_item(quote_id, item_id).await?))
}

pub async fn submit_quote(
    State(state): State<AppState>,
    actor: ActorContext,
    Path(quote_id): Path<Uuid>,
) -> ApiResult<Json<Quote>> {
    Ok(Json(state.quotes.submit_for_approval(&actor, quote_id).await?))
}

pub async fn approve_quote(
    State(state): State<AppState>,
    actor: ActorContext,
    Path(quote_id): Path<Uuid>,
) -> ApiResult<Json<Quote>> {
    Ok(Json(state.quotes.approve(&actor, quote_id).await?))
}

pub async fn return_quote(
    State(state): State<AppState>,
    actor: ActorContext,
    Path(quote_id): Path<Uuid>,
) -> ApiResult<Json<Quote>> {
    Ok(Json(state.quotes.return_for_rework(&actor, quote_id).await?))
}

pub async fn cancel_quote(
    State(state): State<AppState>,
    actor: ActorContext,
    Path(quote_id): Path<Uuid>,
) -> ApiResult<Json<Quote>> {
    Ok(Json(state.quotes.cancel(&actor, quote_id).await?))
}

pub async fn link_downstream(
    State(state): State<AppState>,
    actor: ActorContext,
    Path(quote_id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<LinkDownstreamRequest>,
) -> ApiResult<Json<Quote>> {
    let quote = state
        .quotes
        .link_downstream(&actor, quote_id, req.downstream_type, req.downstream_id)
        .await?;
    Ok(Json(quote))
}

pub async fn change_collector(
    State(state): State<AppState>,
    actor: ActorContext,
    Path(quote_id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<ChangeCollectorRequest>,
) -> ApiResult<Json<Quote>> {
    let quote = state
        .ledger
        .change_collector(&actor, quote_id, req.collector_id)
        .await?;
    Ok(Json(quote))
}

pub async fn collector_history(
    State(state): State<AppState>,
    _actor: ActorContext,
    Path(quote_id): Path<Uuid>,
) -> ApiResult<Json<Vec<CollectorHistory>>> {
    Ok(Json(state.ledger.collector_history(quote_id).await?))
}

pub async fn submit_payment(
    State(state): State<AppState>,
    actor: ActorContext,
    Path(quote_id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<SubmitPaymentRequest>,
) -> ApiResult<(StatusCode, Json<SubmissionOutcome>)> {
    let outcome = state.ledger.submit(&actor, req.into_input(quote_id)).await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

pub async fn list_payments(
    State(state): State<AppState>,
    _actor: ActorContext,
    Path(quote_id): Path<Uuid>,
) -> ApiResult<Json<Vec<QuotePayment>>> {
    Ok(Json(state.ledger.list_payments(quote_id).await?))
}

pub async fn list_credits(
    State(state): State<AppState>,
    _actor: ActorContext,
    Path(quote_id): Path<Uuid>,
) -> ApiResult<Json<Vec<QuoteCredit>>> {
    Ok(Json(state.ledger.list_credits(quote_id).await?))
}
