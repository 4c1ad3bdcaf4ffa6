//! Customer payments, expenses, shipments and freight bills: the documents corrections act on.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use super::ApiResult;
use crate::{
    dtos::{
        AttachClaimRequest, BindStatementRequest, CreateCustomerPaymentRequest,
        CreateExpenseRequest, CreateFreightBillRequest, CreateShipmentRequest,
    },
    middleware::ActorContext,
    models::{CustomerPayment, Expense, Shipment},
    services::documents::{CustomerPaymentDetail, FreightBillDetail},
    startup::AppState,
    utils::ValidatedJson,
};

pub async fn create_customer_payment(
    State(state): State<AppState>,
    actor: ActorContext,
    ValidatedJson(req): ValidatedJson<CreateCustomerPaymentRequest>,
) -> ApiResult<(StatusCode, Json<CustomerPaymentDetail>)> {
    let detail = state
        .documents
        .create_customer_payment(&actor, req.into())
        .await?;
    Ok((StatusCode::CREATED, Json(detail)))
}

pub async fn get_customer_payment(
    State(state): State<AppState>,
    _actor: ActorContext,
    Path(payment_id): Path<Uuid>,
) -> ApiResult<Json<CustomerPaymentDetail>> {
    Ok(Json(state.documents.get_customer_payment(payment_id).await?))
}

pub async fn bind_statement(
    State(state): State<AppState>,
    _actor: ActorContext,
    Path(payment_id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<BindStatementRequest>,
) -> ApiResult<Json<CustomerPayment>> {
    let payment = state
        .documents
        .bind_statement(payment_id, req.statement_id)
        .await?;
    Ok(Json(payment))
}

pub async fn create_expense(
    State(state): State<AppState>,
    actor: ActorContext,
    ValidatedJson(req): ValidatedJson<CreateExpenseRequest>,
) -> ApiResult<(StatusCode, Json<Expense>)> {
    let expense = state.documents.create_expense(&actor, req.into()).await?;
    Ok((StatusCode::CREATED, Json(expense)))
}

pub async fn get_expense(
    State(state): State<AppState>,
    _actor: ActorContext,
    Path(expense_id): Path<Uuid>,
) -> ApiResult<Json<Expense>> {
    Ok(Json(state.documents.get_expense(expense_id).await?))
}

pub async fn void_expense(
    State(state): State<AppState>,
    actor: ActorContext,
    Path(expense_id): Path<Uuid>,
) -> ApiResult<Json<Expense>> {
    Ok(Json(state.documents.void_expense(&actor, expense_id).await?))
}

pub async fn attach_expense_to_claim(
    State(state): State<AppState>,
    _actor: ActorContext,
    Path(expense_id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<AttachClaimRequest>,
) -> ApiResult<Json<Expense>> {
    let expense = state
        .documents
        .attach_expense_to_claim(expense_id, req.claim_id)
        .await?;
    Ok(Json(expense))
}

pub async fn create_shipment(
    State(state): State<AppState>,
    _actor: ActorContext,
    ValidatedJson(req): ValidatedJson<CreateShipmentRequest>,
) -> ApiResult<(StatusCode, Json<Shipment>)> {
    let shipment = state.documents.create_shipment(req.quote_id).await?;
    Ok((StatusCode::CREATED, Json(shipment)))
}

pub async fn get_shipment(
    State(state): State<AppState>,
    _actor: ActorContext,
    Path(shipment_id): Path<Uuid>,
) -> ApiResult<Json<Shipment>> {
    Ok(Json(state.documents.get_shipment(shipment_id).await?))
}

pub async fn create_freight_bill(
    State(state): State<AppState>,
    actor: ActorContext,
    ValidatedJson(req): ValidatedJson<CreateFreightBillRequest>,
) -> ApiResult<(StatusCode, Json<FreightBillDetail>)> {
    let detail = state.documents.create_freight_bill(&actor, req.into()).await?;
    Ok((StatusCode::CREATED, Json(detail)))
}

pub async fn get_freight_bill(
    State(state): State<AppState>,
    _actor: ActorContext,
    Path(bill_id): Path<Uuid>,
) -> ApiResult<Json<FreightBillDetail>> {
    Ok(Json(state.documents.get_freight_bill(bill_id).await?))
}
