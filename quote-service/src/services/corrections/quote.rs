use super::executor::{overlay, CorrectionExecutor};
use crate::models::{CorrectionTarget, CreateQuoteItem, PaymentStatus, Quote, VoidStatus};
use crate::services::database::quotes::{self, NewQuoteRow};
use crate::services::numbering::{self, DocumentKind};
use crate::services::quotes::validate_item;
use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use service_core::error::AppError;
use sqlx::PgConnection;
use tracing::info;
use uuid::Uuid;

/// Quote fields a correction may carry over or change.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct QuoteFields {
    customer_id: Uuid,
    customer_name: String,
    machine_model: Option<String>,
    machine_serial: Option<String>,
    currency: String,
    collector_id: Uuid,
    business_line_id: Option<Uuid>,
    notes: Option<String>,
    items: Vec<CreateQuoteItem>,
}

impl QuoteFields {
    fn snapshot(quote: &Quote, items: Vec<CreateQuoteItem>) -> Self {
        Self {
            customer_id: quote.customer_id,
            customer_name: quote.customer_name.clone(),
            machine_model: quote.machine_model.clone(),
            machine_serial: quote.machine_serial.clone(),
            currency: quote.currency.clone(),
            collector_id: quote.collector_id,
            business_line_id: quote.business_line_id,
            notes: quote.notes.clone(),
            items,
        }
    }
}

/// Voids a quote and re-issues it as a fresh draft with a new number.
#[derive(Debug, Clone, Default)]
pub struct QuoteExecutor;

#[async_trait]
impl CorrectionExecutor for QuoteExecutor {
    fn target(&self) -> CorrectionTarget {
        CorrectionTarget::Quote
    }

    async fn exists(&self, conn: &mut PgConnection, id: Uuid) -> Result<bool, AppError> {
        Ok(quotes::get_quote(conn, id).await?.is_some())
    }

    async fn void_old(&self, conn: &mut PgConnection, old_id: Uuid) -> Result<(), AppError> {
        let quote = quotes::lock_quote(&mut *conn, old_id).await?;
        if quote.void_state() == VoidStatus::Voided {
            return Err(AppError::invalid_state(format!(
                "Quote {} is already voided",
                quote.quote_no
            )));
        }
        quotes::void_quote(conn, old_id).await?;
        info!(quote_id = %old_id, quote_no = %quote.quote_no, "Quote voided by correction");
        Ok(())
    }

    async fn create_new(
        &self,
        conn: &mut PgConnection,
        old_id: Uuid,
        changes: &Value,
        created_by: Uuid,
    ) -> Result<Uuid, AppError> {
        let old = quotes::get_quote(&mut *conn, old_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Quote {} not found", old_id)))?;
        let items = quotes::get_items(&mut *conn, old_id)
            .await?
            .iter()
            .map(CreateQuoteItem::from)
            .collect();

        let fields = overlay(&QuoteFields::snapshot(&old, items), changes, self.target())?;
        if fields.customer_name.trim().is_empty() {
            return Err(AppError::invalid_input("Customer name is required"));
        }
        for item in &fields.items {
            validate_item(item)?;
        }

        let quote_no = numbering::generate(
            &mut *conn,
            DocumentKind::Quote,
            &old.owner_code,
            Utc::now().date_naive(),
        )
        .await?;
        let row = NewQuoteRow {
            quote_id: Uuid::new_v4(),
            quote_no,
            owner_code: old.owner_code.clone(),
            customer_id: fields.customer_id,
            customer_name: fields.customer_name,
            machine_model: fields.machine_model,
            machine_serial: fields.machine_serial,
            currency: fields.currency.to_ascii_uppercase(),
            collector_id: fields.collector_id,
            business_line_id: fields.business_line_id,
            parent_quote_id: Some(old_id),
            notes: fields.notes,
            created_by,
        };
        let new_quote = quotes::insert_quote(&mut *conn, &row).await?;

        for item in &fields.items {
            quotes::insert_item(&mut *conn, new_quote.quote_id, item).await?;
        }
        let total_amount = quotes::items_total(&mut *conn, new_quote.quote_id).await?;
        quotes::update_projection(
            conn,
            new_quote.quote_id,
            total_amount,
            Decimal::ZERO,
            PaymentStatus::Unpaid,
        )
        .await?;

        info!(
            old_quote_id = %old_id,
            quote_id = %new_quote.quote_id,
            quote_no = %new_quote.quote_no,
            items = fields.items.len(),
            "Quote re-issued by correction"
        );
        Ok(new_quote.quote_id)
    }
}
