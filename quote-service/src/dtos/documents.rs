use crate::models::{
    AllocationInput, CreateCustomerPayment, CreateExpense, CreateFreightBill, FreightBillItemInput,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCustomerPaymentRequest {
    pub customer_id: Uuid,
    pub amount: Decimal,
    #[validate(length(equal = 3, message = "Currency must be a 3-letter code"))]
    pub currency: String,
    #[validate(length(max = 1000))]
    pub note: Option<String>,
    #[validate(length(min = 1, message = "At least one allocation is required"))]
    pub allocations: Vec<AllocationInput>,
}

impl From<CreateCustomerPaymentRequest> for CreateCustomerPayment {
    fn from(req: CreateCustomerPaymentRequest) -> Self {
        Self {
            customer_id: req.customer_id,
            amount: req.amount,
            currency: req.currency,
            note: req.note,
            allocations: req.allocations,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct BindStatementRequest {
    pub statement_id: Uuid,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateExpenseRequest {
    #[validate(length(min = 1, max = 100, message = "Expense category is required"))]
    pub category: String,
    #[validate(length(max = 1000))]
    pub description: Option<String>,
    pub amount: Decimal,
    #[validate(length(equal = 3, message = "Currency must be a 3-letter code"))]
    pub currency: String,
    pub incurred_date: NaiveDate,
}

impl From<CreateExpenseRequest> for CreateExpense {
    fn from(req: CreateExpenseRequest) -> Self {
        Self {
            category: req.category,
            description: req.description,
            amount: req.amount,
            currency: req.currency,
            incurred_date: req.incurred_date,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct AttachClaimRequest {
    pub claim_id: Uuid,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct CreateShipmentRequest {
    pub quote_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateFreightBillRequest {
    #[validate(length(min = 1, max = 200, message = "Carrier name is required"))]
    pub carrier_name: String,
    #[validate(length(equal = 3, message = "Currency must be a 3-letter code"))]
    pub currency: String,
    #[validate(length(min = 1, message = "At least one shipment is required"))]
    pub items: Vec<FreightBillItemInput>,
}

impl From<CreateFreightBillRequest> for CreateFreightBill {
    fn from(req: CreateFreightBillRequest) -> Self {
        Self {
            carrier_name: req.carrier_name,
            currency: req.currency,
            items: req.items,
        }
    }
}
