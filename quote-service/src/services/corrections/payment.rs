use super::executor::{overlay, CorrectionExecutor};
use crate::models::{AllocationInput, CorrectionTarget, CustomerPayment, CustomerPaymentStatus};
use crate::services::database::documents::{self as docs, NewCustomerPaymentRow};
use crate::services::documents::{insert_customer_payment_with_allocations, validate_allocations};
use crate::services::numbering::{self, DocumentKind};
use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use service_core::error::AppError;
use sqlx::PgConnection;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct CustomerPaymentFields {
    customer_id: Uuid,
    amount: Decimal,
    currency: String,
    note: Option<String>,
    allocations: Vec<AllocationInput>,
}

fn ensure_unsettled(payment: &CustomerPayment) -> Result<(), AppError> {
    match payment.statement_id {
        Some(statement_id) => Err(AppError::conflict(format!(
            "Customer payment {} is settled on statement {} and cannot be corrected",
            payment.payment_no, statement_id
        ))),
        None => Ok(()),
    }
}

/// Voids a customer payment and re-issues it as an unsettled draft.
#[derive(Debug, Clone, Default)]
pub struct CustomerPaymentExecutor;

#[async_trait]
impl CorrectionExecutor for CustomerPaymentExecutor {
    fn target(&self) -> CorrectionTarget {
        CorrectionTarget::Payment
    }

    async fn exists(&self, conn: &mut PgConnection, id: Uuid) -> Result<bool, AppError> {
        Ok(docs::get_customer_payment(conn, id).await?.is_some())
    }

    async fn void_old(&self, conn: &mut PgConnection, old_id: Uuid) -> Result<(), AppError> {
        let payment = docs::lock_customer_payment(&mut *conn, old_id).await?;
        ensure_unsettled(&payment)?;
        if payment.status == CustomerPaymentStatus::Void.as_str() {
            return Err(AppError::invalid_state(format!(
                "Customer payment {} is already void",
                payment.payment_no
            )));
        }
        docs::void_customer_payment(conn, old_id).await?;
        info!(payment_id = %old_id, "Customer payment voided by correction");
        Ok(())
    }

    async fn create_new(
        &self,
        conn: &mut PgConnection,
        old_id: Uuid,
        changes: &Value,
        created_by: Uuid,
    ) -> Result<Uuid, AppError> {
        let old = docs::get_customer_payment(&mut *conn, old_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Customer payment {} not found", old_id)))?;
        ensure_unsettled(&old)?;

        let allocations = docs::list_allocations(&mut *conn, old_id)
            .await?
            .into_iter()
            .map(|a| AllocationInput {
                quote_id: a.quote_id,
                amount: a.amount,
            })
            .collect();
        let snapshot = CustomerPaymentFields {
            customer_id: old.customer_id,
            amount: old.amount,
            currency: old.currency.clone(),
            note: old.note.clone(),
            allocations,
        };
        let fields = overlay(&snapshot, changes, self.target())?;
        validate_allocations(fields.amount, &fields.allocations)?;

        let payment_no = numbering::generate(
            &mut *conn,
            DocumentKind::CustomerPayment,
            "",
            Utc::now().date_naive(),
        )
        .await?;
        let row = NewCustomerPaymentRow {
            payment_no,
            customer_id: fields.customer_id,
            amount: fields.amount,
            currency: fields.currency.to_ascii_uppercase(),
            note: fields.note,
            parent_payment_id: Some(old_id),
            created_by,
        };
        let detail = insert_customer_payment_with_allocations(conn, &row, &fields.allocations).await?;

        info!(
            old_payment_id = %old_id,
            payment_id = %detail.payment.payment_id,
            payment_no = %detail.payment.payment_no,
            "Customer payment re-issued by correction"
        );
        Ok(detail.payment.payment_id)
    }
}
