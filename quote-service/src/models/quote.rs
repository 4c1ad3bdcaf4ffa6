//! Quote model for quote-service.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Quote lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuoteStatus {
    Draft,
    ApprovalPending,
    Confirmed,
    Returned,
    Cancelled,
}

impl QuoteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuoteStatus::Draft => "draft",
            QuoteStatus::ApprovalPending => "approval_pending",
            QuoteStatus::Confirmed => "confirmed",
            QuoteStatus::Returned => "returned",
            QuoteStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "approval_pending" => QuoteStatus::ApprovalPending,
            "confirmed" => QuoteStatus::Confirmed,
            "returned" => QuoteStatus::Returned,
            "cancelled" => QuoteStatus::Cancelled,
            _ => QuoteStatus::Draft,
        }
    }

    /// Line items may only change while the quote is being drafted.
    pub fn is_editable(&self) -> bool {
        matches!(self, QuoteStatus::Draft | QuoteStatus::Returned)
    }
}

/// Void marker maintained by the correction workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoidStatus {
    None,
    VoidPending,
    Voided,
}

impl VoidStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoidStatus::None => "none",
            VoidStatus::VoidPending => "void_pending",
            VoidStatus::Voided => "voided",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "void_pending" => VoidStatus::VoidPending,
            "voided" => VoidStatus::Voided,
            _ => VoidStatus::None,
        }
    }
}

/// Quote-level payment projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Unpaid,
    Partial,
    Paid,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Unpaid => "unpaid",
            PaymentStatus::Partial => "partial",
            PaymentStatus::Paid => "paid",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "partial" => PaymentStatus::Partial,
            "paid" => PaymentStatus::Paid,
            _ => PaymentStatus::Unpaid,
        }
    }

    /// Project the payment status from the confirmed total.
    ///
    /// Nothing confirmed is UNPAID even for a zero-value quote; otherwise reaching the total
    /// (or exceeding it) is PAID.
    pub fn project(paid_amount: Decimal, total_amount: Decimal) -> Self {
        if paid_amount <= Decimal::ZERO {
            PaymentStatus::Unpaid
        } else if paid_amount >= total_amount {
            PaymentStatus::Paid
        } else {
            PaymentStatus::Partial
        }
    }
}

/// Kind of document a quote hands off to once confirmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownstreamType {
    Shipment,
    WorkOrder,
}

impl DownstreamType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DownstreamType::Shipment => "shipment",
            DownstreamType::WorkOrder => "work_order",
        }
    }
}

/// Quote document.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Quote {
    pub quote_id: Uuid,
    pub quote_no: String,
    pub owner_code: String,
    pub status: String,
    pub void_status: String,
    pub customer_id: Uuid,
    pub customer_name: String,
    pub machine_model: Option<String>,
    pub machine_serial: Option<String>,
    pub currency: String,
    pub total_amount: Decimal,
    pub paid_amount: Decimal,
    pub payment_status: String,
    pub collector_id: Uuid,
    pub business_line_id: Option<Uuid>,
    pub parent_quote_id: Option<Uuid>,
    pub downstream_type: Option<String>,
    pub downstream_id: Option<Uuid>,
    pub is_warehouse_cc_sent: bool,
    pub is_warehouse_ship_sent: bool,
    pub notes: Option<String>,
    pub created_by: Uuid,
    pub created_utc: DateTime<Utc>,
    pub confirmed_utc: Option<DateTime<Utc>>,
    pub cancelled_utc: Option<DateTime<Utc>>,
}

impl Quote {
    pub fn lifecycle(&self) -> QuoteStatus {
        QuoteStatus::from_string(&self.status)
    }

    pub fn void_state(&self) -> VoidStatus {
        VoidStatus::from_string(&self.void_status)
    }

    pub fn payment_state(&self) -> PaymentStatus {
        PaymentStatus::from_string(&self.payment_status)
    }
}

/// Quote line item.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct QuoteItem {
    pub item_id: Uuid,
    pub quote_id: Uuid,
    pub part_no: Option<String>,
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub exchange_rate: Decimal,
    pub amount: Decimal,
    pub warehouse_code: Option<String>,
    pub sort_order: i32,
    pub shipped_quantity: Decimal,
    pub created_utc: DateTime<Utc>,
}

/// Input for creating a draft quote.
#[derive(Debug, Clone)]
pub struct CreateQuote {
    pub owner_code: String,
    pub customer_id: Uuid,
    pub customer_name: String,
    pub machine_model: Option<String>,
    pub machine_serial: Option<String>,
    pub currency: String,
    pub collector_id: Uuid,
    pub business_line_id: Option<Uuid>,
    pub notes: Option<String>,
    pub created_by: Uuid,
}

/// Descriptive fields of a line item; everything a clone carries over.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateQuoteItem {
    #[serde(default)]
    pub part_no: Option<String>,
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    #[serde(default = "default_exchange_rate")]
    pub exchange_rate: Decimal,
    #[serde(default)]
    pub warehouse_code: Option<String>,
    #[serde(default)]
    pub sort_order: i32,
}

fn default_exchange_rate() -> Decimal {
    Decimal::ONE
}

impl From<&QuoteItem> for CreateQuoteItem {
    fn from(item: &QuoteItem) -> Self {
        Self {
            part_no: item.part_no.clone(),
            description: item.description.clone(),
            quantity: item.quantity,
            unit_price: item.unit_price,
            exchange_rate: item.exchange_rate,
            warehouse_code: item.warehouse_code.clone(),
            sort_order: item.sort_order,
        }
    }
}

/// Input for updating a line item.
#[derive(Debug, Clone, Default)]
pub struct UpdateQuoteItem {
    pub part_no: Option<String>,
    pub description: Option<String>,
    pub quantity: Option<Decimal>,
    pub unit_price: Option<Decimal>,
    pub exchange_rate: Option<Decimal>,
    pub warehouse_code: Option<String>,
    pub sort_order: Option<i32>,
}

/// Collector reassignment audit row.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CollectorHistory {
    pub history_id: Uuid,
    pub quote_id: Uuid,
    pub from_user_id: Option<Uuid>,
    pub to_user_id: Uuid,
    pub changed_by: Uuid,
    pub changed_utc: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn payment_status_is_a_function_of_paid_and_total() {
        assert_eq!(PaymentStatus::project(d("0"), d("1000.00")), PaymentStatus::Unpaid);
        assert_eq!(PaymentStatus::project(d("400.00"), d("1000.00")), PaymentStatus::Partial);
        assert_eq!(PaymentStatus::project(d("999.99"), d("1000.00")), PaymentStatus::Partial);
        assert_eq!(PaymentStatus::project(d("1000.00"), d("1000.00")), PaymentStatus::Paid);
        assert_eq!(PaymentStatus::project(d("1000.01"), d("1000.00")), PaymentStatus::Paid);
    }

    #[test]
    fn zero_total_with_nothing_paid_stays_unpaid() {
        assert_eq!(PaymentStatus::project(d("0.00"), d("0.00")), PaymentStatus::Unpaid);
    }

    #[test]
    fn status_strings_round_trip() {
        for status in [
            QuoteStatus::Draft,
            QuoteStatus::ApprovalPending,
            QuoteStatus::Confirmed,
            QuoteStatus::Returned,
            QuoteStatus::Cancelled,
        ] {
            assert_eq!(QuoteStatus::from_string(status.as_str()), status);
        }
        assert_eq!(VoidStatus::from_string("void_pending"), VoidStatus::VoidPending);
    }

    #[test]
    fn only_draft_and_returned_quotes_are_editable() {
        assert!(QuoteStatus::Draft.is_editable());
        assert!(QuoteStatus::Returned.is_editable());
        assert!(!QuoteStatus::Confirmed.is_editable());
        assert!(!QuoteStatus::Cancelled.is_editable());
    }
}
