//! Quote payment and credit models for quote-service.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Quote payment status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotePaymentStatus {
    Submitted,
    Confirmed,
    Rejected,
}

impl QuotePaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuotePaymentStatus::Submitted => "submitted",
            QuotePaymentStatus::Confirmed => "confirmed",
            QuotePaymentStatus::Rejected => "rejected",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "confirmed" => QuotePaymentStatus::Confirmed,
            "rejected" => QuotePaymentStatus::Rejected,
            _ => QuotePaymentStatus::Submitted,
        }
    }
}

/// Finance decision on a submitted payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinanceDecision {
    Confirm,
    Reject,
}

impl FinanceDecision {
    pub fn resulting_status(&self) -> QuotePaymentStatus {
        match self {
            FinanceDecision::Confirm => QuotePaymentStatus::Confirmed,
            FinanceDecision::Reject => QuotePaymentStatus::Rejected,
        }
    }
}

/// A payment recorded against a quote.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct QuotePayment {
    pub payment_id: Uuid,
    pub quote_id: Uuid,
    pub amount: Decimal,
    pub currency: String,
    pub payment_method_id: Uuid,
    pub payment_time: DateTime<Utc>,
    pub submitted_by: Uuid,
    pub status: String,
    pub is_finance_confirmed: bool,
    pub confirmer_id: Option<Uuid>,
    pub confirmed_utc: Option<DateTime<Utc>>,
    pub payment_batch_no: Option<String>,
    pub note: Option<String>,
    pub remark: Option<String>,
    pub attachments: serde_json::Value,
    pub created_utc: DateTime<Utc>,
}

impl QuotePayment {
    pub fn state(&self) -> QuotePaymentStatus {
        QuotePaymentStatus::from_string(&self.status)
    }
}

/// Prepaid credit holding the excess of a finance overpayment.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct QuoteCredit {
    pub credit_id: Uuid,
    pub origin_quote_id: Uuid,
    pub origin_payment_id: Uuid,
    pub customer_id: Uuid,
    pub amount: Decimal,
    pub currency: String,
    pub remark: String,
    pub created_by: Uuid,
    pub created_utc: DateTime<Utc>,
}

/// Input for a single payment submission.
#[derive(Debug, Clone)]
pub struct SubmitPayment {
    pub quote_id: Uuid,
    pub amount: Decimal,
    pub payment_method_id: Uuid,
    pub payment_time: DateTime<Utc>,
    pub note: Option<String>,
}

/// Input for allocating one receipt across several quotes.
#[derive(Debug, Clone)]
pub struct CreateBatchPayment {
    pub quote_ids: Vec<Uuid>,
    pub total_payment_amount: Decimal,
    pub payment_method_id: Uuid,
    pub payment_time: DateTime<Utc>,
    pub note: Option<String>,
}

/// Input for a finance decision.
#[derive(Debug, Clone)]
pub struct ConfirmPayment {
    pub payment_id: Uuid,
    pub decision: FinanceDecision,
    pub note: Option<String>,
    pub attachments: Vec<String>,
}
