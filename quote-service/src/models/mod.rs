//! Domain models for quote-service.

mod correction;
mod document;
mod payment;
mod quote;

pub use correction::{
    Correction, CorrectionStatus, CorrectionTarget, CreateCorrection, UpdateCorrection,
};
pub use document::{
    AllocationInput, CreateCustomerPayment, CreateExpense, CreateFreightBill, CustomerPayment,
    CustomerPaymentStatus, Expense, ExpenseStatus, FreightBill, FreightBillItem,
    FreightBillItemInput, FreightBillStatus, PaymentAllocation, Shipment,
};
pub use payment::{
    ConfirmPayment, CreateBatchPayment, FinanceDecision, QuoteCredit, QuotePayment,
    QuotePaymentStatus, SubmitPayment,
};
pub use quote::{
    CollectorHistory, CreateQuote, CreateQuoteItem, DownstreamType, PaymentStatus, Quote,
    QuoteItem, QuoteStatus, UpdateQuoteItem, VoidStatus,
};
