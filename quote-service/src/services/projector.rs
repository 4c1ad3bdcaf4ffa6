//! Quote status projection and notification dedup gates.
//!
//! Anything that changes a quote's items, lifecycle or payments reports a [`QuoteEvent`] here
//! instead of recomputing on its own. The projector rewrites `total_amount`, `paid_amount` and
//! `payment_status` from the underlying rows and flips the one-way notification flags.

use crate::models::{PaymentStatus, Quote, QuoteStatus};
use crate::services::database::quotes::{self, QuoteFlag};
use crate::services::database::payments;
use crate::services::metrics::NOTIFICATIONS_TOTAL;
use crate::services::notifications::{Notification, NotificationRouting};
use service_core::error::AppError;
use sqlx::PgConnection;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// What happened to a quote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuoteEvent {
    ItemsChanged,
    Confirmed,
    PaymentsChanged,
}

/// A notification class that may fire at most once per quote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DedupGate {
    /// A line item is sourced from the headquarters warehouse.
    WarehouseCc,
    /// The quote is confirmed and fully paid.
    WarehouseShip,
}

impl DedupGate {
    pub fn label(&self) -> &'static str {
        match self {
            DedupGate::WarehouseCc => "warehouse_cc",
            DedupGate::WarehouseShip => "warehouse_ship",
        }
    }

    fn flag(&self) -> QuoteFlag {
        match self {
            DedupGate::WarehouseCc => QuoteFlag::WarehouseCcSent,
            DedupGate::WarehouseShip => QuoteFlag::WarehouseShipSent,
        }
    }

    fn is_set(&self, quote: &Quote) -> bool {
        match self {
            DedupGate::WarehouseCc => quote.is_warehouse_cc_sent,
            DedupGate::WarehouseShip => quote.is_warehouse_ship_sent,
        }
    }

    fn mark(&self, quote: &mut Quote) {
        match self {
            DedupGate::WarehouseCc => quote.is_warehouse_cc_sent = true,
            DedupGate::WarehouseShip => quote.is_warehouse_ship_sent = true,
        }
    }

    fn message(&self, quote: &Quote) -> (String, String) {
        match self {
            DedupGate::WarehouseCc => (
                format!("Quote {} uses headquarters stock", quote.quote_no),
                format!(
                    "Quote {} for {} includes parts from the headquarters warehouse.",
                    quote.quote_no, quote.customer_name
                ),
            ),
            DedupGate::WarehouseShip => (
                format!("Quote {} is ready to ship", quote.quote_no),
                format!(
                    "Quote {} for {} is confirmed and fully paid ({} {}). Please arrange shipment.",
                    quote.quote_no, quote.customer_name, quote.paid_amount, quote.currency
                ),
            ),
        }
    }
}

/// Gates an event may open.
pub fn gates_for(event: QuoteEvent) -> &'static [DedupGate] {
    match event {
        QuoteEvent::ItemsChanged => &[DedupGate::WarehouseCc],
        QuoteEvent::Confirmed => &[DedupGate::WarehouseCc, DedupGate::WarehouseShip],
        QuoteEvent::PaymentsChanged => &[DedupGate::WarehouseShip],
    }
}

/// Whether a quote in this state should be handed to the warehouse for shipping.
pub fn ready_to_ship(status: QuoteStatus, payment_status: PaymentStatus) -> bool {
    status == QuoteStatus::Confirmed && payment_status == PaymentStatus::Paid
}

/// Projection outcome: the rewritten quote plus notifications to send after commit.
#[derive(Debug)]
pub struct Projection {
    pub quote: Quote,
    pub notifications: Vec<Notification>,
}

#[derive(Debug, Clone)]
pub struct StatusProjector {
    routing: NotificationRouting,
}

impl StatusProjector {
    pub fn new(routing: NotificationRouting) -> Self {
        Self { routing }
    }

    pub fn routing(&self) -> &NotificationRouting {
        &self.routing
    }

    /// Recompute the quote's money projection and evaluate the gates for `event`.
    ///
    /// The caller must hold the quote row lock in the same transaction.
    #[instrument(skip(self, conn), fields(quote_id = %quote_id))]
    pub async fn apply(
        &self,
        conn: &mut PgConnection,
        quote_id: Uuid,
        event: QuoteEvent,
    ) -> Result<Projection, AppError> {
        let total_amount = quotes::items_total(&mut *conn, quote_id).await?;
        let paid_amount = payments::confirmed_total(&mut *conn, quote_id).await?;
        let payment_status = PaymentStatus::project(paid_amount, total_amount);

        let mut quote = quotes::update_projection(
            &mut *conn,
            quote_id,
            total_amount,
            paid_amount,
            payment_status,
        )
        .await?;

        info!(
            quote_id = %quote_id,
            event = ?event,
            total_amount = %total_amount,
            paid_amount = %paid_amount,
            payment_status = payment_status.as_str(),
            "Quote projection updated"
        );

        let mut notifications = Vec::new();
        for gate in gates_for(event) {
            if let Some(notification) = self.evaluate(&mut *conn, &mut quote, *gate).await? {
                notifications.push(notification);
            }
        }

        Ok(Projection {
            quote,
            notifications,
        })
    }

    async fn evaluate(
        &self,
        conn: &mut PgConnection,
        quote: &mut Quote,
        gate: DedupGate,
    ) -> Result<Option<Notification>, AppError> {
        if gate.is_set(quote) {
            return Ok(None);
        }

        let triggered = match gate {
            DedupGate::WarehouseCc => {
                quotes::has_item_from_warehouse(&mut *conn, quote.quote_id, &self.routing.hq_warehouse_code)
                    .await?
            }
            DedupGate::WarehouseShip => ready_to_ship(quote.lifecycle(), quote.payment_state()),
        };
        if !triggered {
            return Ok(None);
        }

        if !quotes::try_set_flag(&mut *conn, quote.quote_id, gate.flag()).await? {
            NOTIFICATIONS_TOTAL
                .with_label_values(&[gate.label(), "suppressed"])
                .inc();
            return Ok(None);
        }
        gate.mark(quote);

        let Some(recipient_id) = self.routing.warehouse_recipient(quote.business_line_id) else {
            warn!(
                quote_id = %quote.quote_id,
                gate = gate.label(),
                "No warehouse recipient configured; notification dropped"
            );
            NOTIFICATIONS_TOTAL
                .with_label_values(&[gate.label(), "no_recipient"])
                .inc();
            return Ok(None);
        };

        NOTIFICATIONS_TOTAL
            .with_label_values(&[gate.label(), "released"])
            .inc();

        let (title, body) = gate.message(quote);
        Ok(Some(Notification {
            recipient_id,
            title,
            body,
            target_url: self.routing.quote_url(quote.quote_id),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_edits_only_touch_the_cc_gate() {
        assert_eq!(gates_for(QuoteEvent::ItemsChanged), &[DedupGate::WarehouseCc]);
        assert_eq!(gates_for(QuoteEvent::PaymentsChanged), &[DedupGate::WarehouseShip]);
        assert_eq!(gates_for(QuoteEvent::Confirmed).len(), 2);
    }

    #[test]
    fn ship_gate_needs_confirmed_and_paid() {
        assert!(ready_to_ship(QuoteStatus::Confirmed, PaymentStatus::Paid));
        assert!(!ready_to_ship(QuoteStatus::Confirmed, PaymentStatus::Partial));
        assert!(!ready_to_ship(QuoteStatus::Cancelled, PaymentStatus::Paid));
        assert!(!ready_to_ship(QuoteStatus::Draft, PaymentStatus::Unpaid));
    }
}
