//! Quote lifecycle: drafting, line items, approval, cancellation and downstream hand-off.

use crate::middleware::{authorities, ActorContext};
use crate::models::{
    CreateQuote, CreateQuoteItem, DownstreamType, Quote, QuoteItem, QuoteStatus, UpdateQuoteItem,
    VoidStatus,
};
use crate::services::database::quotes::{self, NewQuoteRow};
use crate::services::database::{self, payments, Database};
use crate::services::notifications::{self, NotificationSender};
use crate::services::numbering::{self, DocumentKind};
use crate::services::projector::{QuoteEvent, StatusProjector};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use service_core::error::AppError;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Check the numeric fields of a line item.
pub fn validate_item(item: &CreateQuoteItem) -> Result<(), AppError> {
    if item.description.trim().is_empty() {
        return Err(AppError::invalid_input("Item description is required"));
    }
    check_item_numbers(item.quantity, item.unit_price, item.exchange_rate)
}

fn check_item_numbers(quantity: Decimal, unit_price: Decimal, exchange_rate: Decimal) -> Result<(), AppError> {
    if quantity <= Decimal::ZERO {
        return Err(AppError::invalid_input("Item quantity must be greater than zero"));
    }
    if unit_price < Decimal::ZERO {
        return Err(AppError::invalid_input("Item unit price cannot be negative"));
    }
    if exchange_rate <= Decimal::ZERO {
        return Err(AppError::invalid_input("Item exchange rate must be greater than zero"));
    }
    Ok(())
}

fn ensure_editable(quote: &Quote) -> Result<(), AppError> {
    if !quote.lifecycle().is_editable() {
        return Err(AppError::invalid_state(format!(
            "Quote {} is {}; items can only change while draft or returned",
            quote.quote_no, quote.status
        )));
    }
    Ok(())
}

fn ensure_status(quote: &Quote, expected: QuoteStatus, action: &str) -> Result<(), AppError> {
    if quote.lifecycle() != expected {
        return Err(AppError::invalid_state(format!(
            "Cannot {} quote {}: expected status {}, found {}",
            action,
            quote.quote_no,
            expected.as_str(),
            quote.status
        )));
    }
    Ok(())
}

/// A quote with its line items.
#[derive(Debug, Serialize)]
pub struct QuoteDetail {
    #[serde(flatten)]
    pub quote: Quote,
    pub items: Vec<QuoteItem>,
}

#[derive(Clone)]
pub struct QuoteService {
    db: Database,
    projector: StatusProjector,
    notifier: Arc<dyn NotificationSender>,
}

impl QuoteService {
    pub fn new(db: Database, projector: StatusProjector, notifier: Arc<dyn NotificationSender>) -> Self {
        Self {
            db,
            projector,
            notifier,
        }
    }

    #[instrument(skip(self, input), fields(owner_code = %input.owner_code))]
    pub async fn create(&self, input: CreateQuote) -> Result<Quote, AppError> {
        if input.customer_name.trim().is_empty() {
            return Err(AppError::invalid_input("Customer name is required"));
        }

        let mut tx = self.db.begin().await?;
        let quote_no = numbering::generate(
            &mut tx,
            DocumentKind::Quote,
            &input.owner_code,
            Utc::now().date_naive(),
        )
        .await?;

        let row = NewQuoteRow {
            quote_id: Uuid::new_v4(),
            quote_no,
            owner_code: numbering::normalize_scope(&input.owner_code)?,
            customer_id: input.customer_id,
            customer_name: input.customer_name,
            machine_model: input.machine_model,
            machine_serial: input.machine_serial,
            currency: input.currency.to_ascii_uppercase(),
            collector_id: input.collector_id,
            business_line_id: input.business_line_id,
            parent_quote_id: None,
            notes: input.notes,
            created_by: input.created_by,
        };
        let quote = quotes::insert_quote(&mut tx, &row).await?;
        database::commit(tx).await?;

        info!(quote_id = %quote.quote_id, quote_no = %quote.quote_no, "Quote created");
        Ok(quote)
    }

    pub async fn get(&self, quote_id: Uuid) -> Result<QuoteDetail, AppError> {
        let mut conn = self.db.acquire().await?;
        let quote = quotes::get_quote(&mut conn, quote_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Quote {} not found", quote_id)))?;
        let items = quotes::get_items(&mut conn, quote_id).await?;
        Ok(QuoteDetail { quote, items })
    }

    pub async fn list_items(&self, quote_id: Uuid) -> Result<Vec<QuoteItem>, AppError> {
        let mut conn = self.db.acquire().await?;
        quotes::get_items(&mut conn, quote_id).await
    }

    #[instrument(skip(self, item))]
    pub async fn add_item(&self, quote_id: Uuid, item: CreateQuoteItem) -> Result<QuoteDetail, AppError> {
        validate_item(&item)?;

        let mut tx = self.db.begin().await?;
        let quote = quotes::lock_quote(&mut tx, quote_id).await?;
        ensure_editable(&quote)?;

        let created = quotes::insert_item(&mut tx, quote_id, &item).await?;
        info!(quote_id = %quote_id, item_id = %created.item_id, "Quote item added");

        self.finish_item_change(tx, quote_id).await
    }

    #[instrument(skip(self, changes))]
    pub async fn update_item(
        &self,
        quote_id: Uuid,
        item_id: Uuid,
        changes: UpdateQuoteItem,
    ) -> Result<QuoteDetail, AppError> {
        if changes.description.as_deref().is_some_and(|d| d.trim().is_empty()) {
            return Err(AppError::invalid_input("Item description is required"));
        }

        let mut tx = self.db.begin().await?;
        let quote = quotes::lock_quote(&mut tx, quote_id).await?;
        ensure_editable(&quote)?;

        let existing = quotes::get_item(&mut tx, quote_id, item_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Item {} not found on quote {}", item_id, quote_id)))?;
        check_item_numbers(
            changes.quantity.unwrap_or(existing.quantity),
            changes.unit_price.unwrap_or(existing.unit_price),
            changes.exchange_rate.unwrap_or(existing.exchange_rate),
        )?;
        quotes::update_item(&mut tx, &existing, &changes).await?;
        info!(quote_id = %quote_id, item_id = %item_id, "Quote item updated");

        self.finish_item_change(tx, quote_id).await
    }

    #[instrument(skip(self))]
    pub async fn remove_item(&self, quote_id: Uuid, item_id: Uuid) -> Result<QuoteDetail, AppError> {
        let mut tx = self.db.begin().await?;
        let quote = quotes::lock_quote(&mut tx, quote_id).await?;
        ensure_editable(&quote)?;

        if !quotes::delete_item(&mut tx, quote_id, item_id).await? {
            return Err(AppError::not_found(format!(
                "Item {} not found on quote {}",
                item_id, quote_id
            )));
        }
        info!(quote_id = %quote_id, item_id = %item_id, "Quote item removed");

        self.finish_item_change(tx, quote_id).await
    }

    async fn finish_item_change(
        &self,
        mut tx: sqlx::Transaction<'static, sqlx::Postgres>,
        quote_id: Uuid,
    ) -> Result<QuoteDetail, AppError> {
        let projection = self
            .projector
            .apply(&mut tx, quote_id, QuoteEvent::ItemsChanged)
            .await?;
        let items = quotes::get_items(&mut tx, quote_id).await?;
        database::commit(tx).await?;

        notifications::dispatch(self.notifier.as_ref(), projection.notifications).await;

        Ok(QuoteDetail {
            quote: projection.quote,
            items,
        })
    }

    /// DRAFT or RETURNED → APPROVAL_PENDING.
    #[instrument(skip(self, actor), fields(user_id = %actor.user_id))]
    pub async fn submit_for_approval(&self, actor: &ActorContext, quote_id: Uuid) -> Result<Quote, AppError> {
        let mut tx = self.db.begin().await?;
        let quote = quotes::lock_quote(&mut tx, quote_id).await?;
        ensure_editable(&quote)?;

        if quotes::get_items(&mut tx, quote_id).await?.is_empty() {
            return Err(AppError::invalid_input(format!(
                "Quote {} needs at least one item before approval",
                quote.quote_no
            )));
        }

        let quote = quotes::set_status(&mut tx, quote_id, QuoteStatus::ApprovalPending).await?;
        database::commit(tx).await?;

        info!(quote_id = %quote_id, "Quote submitted for approval");
        Ok(quote)
    }

    /// APPROVAL_PENDING → CONFIRMED.
    #[instrument(skip(self, actor), fields(user_id = %actor.user_id))]
    pub async fn approve(&self, actor: &ActorContext, quote_id: Uuid) -> Result<Quote, AppError> {
        actor.require(authorities::QUOTE_APPROVE)?;

        let mut tx = self.db.begin().await?;
        let quote = quotes::lock_quote(&mut tx, quote_id).await?;
        ensure_status(&quote, QuoteStatus::ApprovalPending, "approve")?;

        quotes::set_status(&mut tx, quote_id, QuoteStatus::Confirmed).await?;
        let projection = self
            .projector
            .apply(&mut tx, quote_id, QuoteEvent::Confirmed)
            .await?;
        database::commit(tx).await?;

        info!(quote_id = %quote_id, total_amount = %projection.quote.total_amount, "Quote confirmed");
        notifications::dispatch(self.notifier.as_ref(), projection.notifications).await;

        Ok(projection.quote)
    }

    /// APPROVAL_PENDING → RETURNED for rework.
    #[instrument(skip(self, actor), fields(user_id = %actor.user_id))]
    pub async fn return_for_rework(&self, actor: &ActorContext, quote_id: Uuid) -> Result<Quote, AppError> {
        actor.require(authorities::QUOTE_APPROVE)?;

        let mut tx = self.db.begin().await?;
        let quote = quotes::lock_quote(&mut tx, quote_id).await?;
        ensure_status(&quote, QuoteStatus::ApprovalPending, "return")?;

        let quote = quotes::set_status(&mut tx, quote_id, QuoteStatus::Returned).await?;
        database::commit(tx).await?;

        info!(quote_id = %quote_id, "Quote returned for rework");
        Ok(quote)
    }

    /// Cancel a quote that has no confirmed money against it.
    #[instrument(skip(self, actor), fields(user_id = %actor.user_id))]
    pub async fn cancel(&self, actor: &ActorContext, quote_id: Uuid) -> Result<Quote, AppError> {
        let mut tx = self.db.begin().await?;
        let quote = quotes::lock_quote(&mut tx, quote_id).await?;

        if quote.lifecycle() == QuoteStatus::Cancelled {
            return Err(AppError::invalid_state(format!("Quote {} is already cancelled", quote.quote_no)));
        }
        if quote.void_state() == VoidStatus::VoidPending {
            return Err(AppError::invalid_state(format!(
                "Quote {} has a pending void correction",
                quote.quote_no
            )));
        }
        if payments::has_confirmed(&mut tx, quote_id).await? {
            return Err(AppError::invalid_state(format!(
                "Quote {} has confirmed payments; correct it instead of cancelling",
                quote.quote_no
            )));
        }

        let quote = quotes::set_status(&mut tx, quote_id, QuoteStatus::Cancelled).await?;
        database::commit(tx).await?;

        info!(quote_id = %quote_id, "Quote cancelled");
        Ok(quote)
    }

    /// Link the single shipment or work order fulfilling a confirmed quote.
    #[instrument(skip(self, actor), fields(user_id = %actor.user_id))]
    pub async fn link_downstream(
        &self,
        actor: &ActorContext,
        quote_id: Uuid,
        downstream_type: DownstreamType,
        downstream_id: Uuid,
    ) -> Result<Quote, AppError> {
        let mut tx = self.db.begin().await?;
        let quote = quotes::lock_quote(&mut tx, quote_id).await?;
        ensure_status(&quote, QuoteStatus::Confirmed, "link downstream document to")?;

        if let (Some(kind), Some(id)) = (&quote.downstream_type, quote.downstream_id) {
            return Err(AppError::conflict(format!(
                "Quote {} is already linked to {} {}",
                quote.quote_no, kind, id
            )));
        }

        let quote = quotes::set_downstream(&mut tx, quote_id, downstream_type, downstream_id).await?;
        database::commit(tx).await?;

        info!(
            quote_id = %quote_id,
            downstream_type = downstream_type.as_str(),
            downstream_id = %downstream_id,
            "Downstream document linked"
        );
        Ok(quote)
    }
}
