//! Collaborator documents that corrections can void and re-create: customer payments,
//! expenses and freight bills, plus the shipments freight bills are charged against.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Customer payment status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CustomerPaymentStatus {
    Draft,
    Submitted,
    Confirmed,
    Void,
}

impl CustomerPaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CustomerPaymentStatus::Draft => "draft",
            CustomerPaymentStatus::Submitted => "submitted",
            CustomerPaymentStatus::Confirmed => "confirmed",
            CustomerPaymentStatus::Void => "void",
        }
    }
}

/// Money received from a customer, allocated over quotes and settled on a statement.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CustomerPayment {
    pub payment_id: Uuid,
    pub payment_no: String,
    pub customer_id: Uuid,
    pub amount: Decimal,
    pub currency: String,
    pub status: String,
    pub statement_id: Option<Uuid>,
    pub parent_payment_id: Option<Uuid>,
    pub note: Option<String>,
    pub created_by: Uuid,
    pub created_utc: DateTime<Utc>,
    pub voided_utc: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PaymentAllocation {
    pub allocation_id: Uuid,
    pub payment_id: Uuid,
    pub quote_id: Uuid,
    pub amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AllocationInput {
    pub quote_id: Uuid,
    pub amount: Decimal,
}

/// Input for creating a draft customer payment.
#[derive(Debug, Clone)]
pub struct CreateCustomerPayment {
    pub customer_id: Uuid,
    pub amount: Decimal,
    pub currency: String,
    pub note: Option<String>,
    pub allocations: Vec<AllocationInput>,
}

/// Expense status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpenseStatus {
    Draft,
    Submitted,
    Approved,
    Void,
}

impl ExpenseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExpenseStatus::Draft => "draft",
            ExpenseStatus::Submitted => "submitted",
            ExpenseStatus::Approved => "approved",
            ExpenseStatus::Void => "void",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Expense {
    pub expense_id: Uuid,
    pub expense_no: String,
    pub status: String,
    pub claim_id: Option<Uuid>,
    pub category: String,
    pub description: Option<String>,
    pub amount: Decimal,
    pub currency: String,
    pub incurred_date: NaiveDate,
    pub parent_expense_id: Option<Uuid>,
    pub created_by: Uuid,
    pub created_utc: DateTime<Utc>,
    pub voided_utc: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct CreateExpense {
    pub category: String,
    pub description: Option<String>,
    pub amount: Decimal,
    pub currency: String,
    pub incurred_date: NaiveDate,
}

/// Freight bill status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FreightBillStatus {
    Draft,
    Confirmed,
    Void,
}

impl FreightBillStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FreightBillStatus::Draft => "draft",
            FreightBillStatus::Confirmed => "confirmed",
            FreightBillStatus::Void => "void",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct FreightBill {
    pub bill_id: Uuid,
    pub bill_no: String,
    pub carrier_name: String,
    pub currency: String,
    pub total_amount: Decimal,
    pub status: String,
    pub parent_bill_id: Option<Uuid>,
    pub created_by: Uuid,
    pub created_utc: DateTime<Utc>,
    pub voided_utc: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct FreightBillItem {
    pub item_id: Uuid,
    pub bill_id: Uuid,
    pub shipment_id: Uuid,
    pub description: Option<String>,
    pub amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FreightBillItemInput {
    pub shipment_id: Uuid,
    #[serde(default)]
    pub description: Option<String>,
    pub amount: Decimal,
}

impl From<&FreightBillItem> for FreightBillItemInput {
    fn from(item: &FreightBillItem) -> Self {
        Self {
            shipment_id: item.shipment_id,
            description: item.description.clone(),
            amount: item.amount,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CreateFreightBill {
    pub carrier_name: String,
    pub currency: String,
    pub items: Vec<FreightBillItemInput>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Shipment {
    pub shipment_id: Uuid,
    pub shipment_no: String,
    pub quote_id: Option<Uuid>,
    pub freight_bill_id: Option<Uuid>,
    pub created_utc: DateTime<Utc>,
}
