use super::executor::{overlay, CorrectionExecutor};
use crate::models::{CorrectionTarget, FreightBillItemInput, FreightBillStatus};
use crate::services::database::documents as docs;
use crate::services::documents::insert_freight_bill_with_items;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use service_core::error::AppError;
use sqlx::PgConnection;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct FreightBillFields {
    carrier_name: String,
    currency: String,
    items: Vec<FreightBillItemInput>,
}

/// Voids a freight bill and re-issues it; charged shipments move to the new bill.
#[derive(Debug, Clone, Default)]
pub struct FreightBillExecutor;

#[async_trait]
impl CorrectionExecutor for FreightBillExecutor {
    fn target(&self) -> CorrectionTarget {
        CorrectionTarget::FreightBill
    }

    async fn exists(&self, conn: &mut PgConnection, id: Uuid) -> Result<bool, AppError> {
        Ok(docs::get_freight_bill(conn, id).await?.is_some())
    }

    async fn void_old(&self, conn: &mut PgConnection, old_id: Uuid) -> Result<(), AppError> {
        let bill = docs::lock_freight_bill(&mut *conn, old_id).await?;
        if bill.status == FreightBillStatus::Void.as_str() {
            return Err(AppError::invalid_state(format!(
                "Freight bill {} is already void",
                bill.bill_no
            )));
        }
        docs::void_freight_bill(&mut *conn, old_id).await?;
        let released = docs::unlink_shipments_from_bill(conn, old_id).await?;
        info!(bill_id = %old_id, released, "Freight bill voided by correction");
        Ok(())
    }

    async fn create_new(
        &self,
        conn: &mut PgConnection,
        old_id: Uuid,
        changes: &Value,
        created_by: Uuid,
    ) -> Result<Uuid, AppError> {
        let old = docs::get_freight_bill(&mut *conn, old_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Freight bill {} not found", old_id)))?;
        let items = docs::list_freight_bill_items(&mut *conn, old_id)
            .await?
            .iter()
            .map(FreightBillItemInput::from)
            .collect();

        let snapshot = FreightBillFields {
            carrier_name: old.carrier_name.clone(),
            currency: old.currency.clone(),
            items,
        };
        let fields = overlay(&snapshot, changes, self.target())?;
        if fields.carrier_name.trim().is_empty() {
            return Err(AppError::invalid_input("Carrier name is required"));
        }

        let detail = insert_freight_bill_with_items(
            conn,
            &fields.carrier_name,
            &fields.currency.to_ascii_uppercase(),
            &fields.items,
            Some(old_id),
            created_by,
        )
        .await?;

        info!(
            old_bill_id = %old_id,
            bill_id = %detail.bill.bill_id,
            bill_no = %detail.bill.bill_no,
            shipments = detail.items.len(),
            "Freight bill re-issued by correction"
        );
        Ok(detail.bill.bill_id)
    }
}
