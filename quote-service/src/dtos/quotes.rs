use crate::middleware::ActorContext;
use crate::models::{CreateQuote, CreateQuoteItem, DownstreamType, UpdateQuoteItem};
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateQuoteRequest {
    /// Numbering scope; defaults to the acting user's code.
    #[validate(length(min = 1, max = 8, message = "Owner code must be 1 to 8 characters"))]
    pub owner_code: Option<String>,
    pub customer_id: Uuid,
    #[validate(length(min = 1, max = 200, message = "Customer name is required"))]
    pub customer_name: String,
    pub machine_model: Option<String>,
    pub machine_serial: Option<String>,
    #[validate(length(equal = 3, message = "Currency must be a 3-letter code"))]
    pub currency: String,
    /// Defaults to the acting user.
    pub collector_id: Option<Uuid>,
    pub business_line_id: Option<Uuid>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

impl CreateQuoteRequest {
    pub fn into_input(self, actor: &ActorContext) -> CreateQuote {
        CreateQuote {
            owner_code: self.owner_code.unwrap_or_else(|| actor.user_code.clone()),
            customer_id: self.customer_id,
            customer_name: self.customer_name,
            machine_model: self.machine_model,
            machine_serial: self.machine_serial,
            currency: self.currency,
            collector_id: self.collector_id.unwrap_or(actor.user_id),
            business_line_id: self.business_line_id,
            notes: self.notes,
            created_by: actor.user_id,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct QuoteItemRequest {
    #[validate(length(max = 64))]
    pub part_no: Option<String>,
    #[validate(length(min = 1, max = 500, message = "Item description is required"))]
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub exchange_rate: Option<Decimal>,
    #[validate(length(max = 32))]
    pub warehouse_code: Option<String>,
    #[serde(default)]
    pub sort_order: i32,
}

impl From<QuoteItemRequest> for CreateQuoteItem {
    fn from(req: QuoteItemRequest) -> Self {
        Self {
            part_no: req.part_no,
            description: req.description,
            quantity: req.quantity,
            unit_price: req.unit_price,
            exchange_rate: req.exchange_rate.unwrap_or(Decimal::ONE),
            warehouse_code: req.warehouse_code,
            sort_order: req.sort_order,
        }
    }
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateQuoteItemRequest {
    #[validate(length(max = 64))]
    pub part_no: Option<String>,
    #[validate(length(min = 1, max = 500, message = "Item description cannot be empty"))]
    pub description: Option<String>,
    pub quantity: Option<Decimal>,
    pub unit_price: Option<Decimal>,
    pub exchange_rate: Option<Decimal>,
    #[validate(length(max = 32))]
    pub warehouse_code: Option<String>,
    pub sort_order: Option<i32>,
}

impl From<UpdateQuoteItemRequest> for UpdateQuoteItem {
    fn from(req: UpdateQuoteItemRequest) -> Self {
        Self {
            part_no: req.part_no,
            description: req.description,
            quantity: req.quantity,
            unit_price: req.unit_price,
            exchange_rate: req.exchange_rate,
            warehouse_code: req.warehouse_code,
            sort_order: req.sort_order,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct LinkDownstreamRequest {
    pub downstream_type: DownstreamType,
    pub downstream_id: Uuid,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ChangeCollectorRequest {
    pub collector_id: Uuid,
}
