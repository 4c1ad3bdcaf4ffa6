use crate::models::{ConfirmPayment, CreateBatchPayment, FinanceDecision, SubmitPayment};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct SubmitPaymentRequest {
    pub amount: Decimal,
    pub payment_method_id: Uuid,
    /// When the money was received; defaults to now.
    pub payment_time: Option<DateTime<Utc>>,
    #[validate(length(max = 1000))]
    pub note: Option<String>,
}

impl SubmitPaymentRequest {
    pub fn into_input(self, quote_id: Uuid) -> SubmitPayment {
        SubmitPayment {
            quote_id,
            amount: self.amount,
            payment_method_id: self.payment_method_id,
            payment_time: self.payment_time.unwrap_or_else(Utc::now),
            note: self.note,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct BatchPaymentRequest {
    #[validate(length(min = 1, message = "At least one quote is required"))]
    pub quote_ids: Vec<Uuid>,
    pub total_payment_amount: Decimal,
    pub payment_method_id: Uuid,
    pub payment_time: Option<DateTime<Utc>>,
    #[validate(length(max = 1000))]
    pub note: Option<String>,
}

impl From<BatchPaymentRequest> for CreateBatchPayment {
    fn from(req: BatchPaymentRequest) -> Self {
        Self {
            quote_ids: req.quote_ids,
            total_payment_amount: req.total_payment_amount,
            payment_method_id: req.payment_method_id,
            payment_time: req.payment_time.unwrap_or_else(Utc::now),
            note: req.note,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct FinanceConfirmRequest {
    pub decision: FinanceDecision,
    #[validate(length(max = 1000))]
    pub note: Option<String>,
    #[serde(default)]
    pub attachments: Vec<String>,
}

impl FinanceConfirmRequest {
    pub fn into_input(self, payment_id: Uuid) -> ConfirmPayment {
        ConfirmPayment {
            payment_id,
            decision: self.decision,
            note: self.note,
            attachments: self.attachments,
        }
    }
}
