//! Request bodies for the HTTP API. Responses serialize the domain models directly.

pub mod corrections;
pub mod documents;
pub mod payments;
pub mod quotes;

pub use corrections::{
    CorrectionListQuery, CreateCorrectionRequest, RejectCorrectionRequest,
    SubmitCorrectionRequest, UpdateCorrectionRequest,
};
pub use documents::{
    AttachClaimRequest, BindStatementRequest, CreateCustomerPaymentRequest,
    CreateExpenseRequest, CreateFreightBillRequest, CreateShipmentRequest,
};
pub use payments::{BatchPaymentRequest, FinanceConfirmRequest, SubmitPaymentRequest};
pub use quotes::{
    ChangeCollectorRequest, CreateQuoteRequest, LinkDownstreamRequest, QuoteItemRequest,
    UpdateQuoteItemRequest,
};
