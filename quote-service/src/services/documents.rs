//! Collaborator documents: customer payments, expenses, shipments and freight bills.
//!
//! These carry just enough lifecycle for the correction executors to void and re-create them.

use crate::middleware::ActorContext;
use crate::models::{
    AllocationInput, CreateCustomerPayment, CreateExpense, CreateFreightBill, CustomerPayment,
    CustomerPaymentStatus, Expense, ExpenseStatus, FreightBill, FreightBillItem,
    FreightBillItemInput, PaymentAllocation, Shipment,
};
use crate::services::database::documents::{
    self as docs, NewCustomerPaymentRow, NewExpenseRow, NewFreightBillRow,
};
use crate::services::database::{self, quotes, Database};
use crate::services::money;
use crate::services::numbering::{self, DocumentKind};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use service_core::error::AppError;
use sqlx::PgConnection;
use tracing::{info, instrument, warn};
use uuid::Uuid;

const BILL_NO_ATTEMPTS: usize = 5;

#[derive(Debug, Serialize)]
pub struct CustomerPaymentDetail {
    #[serde(flatten)]
    pub payment: CustomerPayment,
    pub allocations: Vec<PaymentAllocation>,
}

#[derive(Debug, Serialize)]
pub struct FreightBillDetail {
    #[serde(flatten)]
    pub bill: FreightBill,
    pub items: Vec<FreightBillItem>,
}

/// Allocations must be positive, reference distinct quotes and add up to the payment amount.
pub fn validate_allocations(amount: Decimal, allocations: &[AllocationInput]) -> Result<(), AppError> {
    if money::round_money(amount) <= Decimal::ZERO {
        return Err(AppError::invalid_input("Payment amount must be greater than zero"));
    }
    if allocations.is_empty() {
        return Err(AppError::invalid_input("Payment needs at least one allocation"));
    }
    let mut seen = std::collections::HashSet::new();
    for allocation in allocations {
        if money::round_money(allocation.amount) <= Decimal::ZERO {
            return Err(AppError::invalid_input(format!(
                "Allocation to quote {} must be greater than zero",
                allocation.quote_id
            )));
        }
        if !seen.insert(allocation.quote_id) {
            return Err(AppError::invalid_input(format!(
                "Quote {} is allocated more than once",
                allocation.quote_id
            )));
        }
    }
    let allocated = money::sum_money(allocations.iter().map(|a| a.amount));
    let amount = money::round_money(amount);
    if allocated != amount {
        return Err(AppError::invalid_input(format!(
            "Allocations total {} does not match payment amount {}",
            allocated, amount
        )));
    }
    Ok(())
}

/// Bill items must be non-empty with non-negative amounts; the bill total is their sum.
pub fn freight_bill_total(items: &[FreightBillItemInput]) -> Result<Decimal, AppError> {
    if items.is_empty() {
        return Err(AppError::invalid_input("Freight bill needs at least one item"));
    }
    if let Some(item) = items.iter().find(|i| i.amount < Decimal::ZERO) {
        return Err(AppError::invalid_input(format!(
            "Freight charge for shipment {} cannot be negative",
            item.shipment_id
        )));
    }
    Ok(money::sum_money(items.iter().map(|i| i.amount)))
}

/// Insert a customer payment and its allocations. Referenced quotes must exist.
pub(crate) async fn insert_customer_payment_with_allocations(
    conn: &mut PgConnection,
    row: &NewCustomerPaymentRow,
    allocations: &[AllocationInput],
) -> Result<CustomerPaymentDetail, AppError> {
    for allocation in allocations {
        if quotes::get_quote(&mut *conn, allocation.quote_id).await?.is_none() {
            return Err(AppError::not_found(format!("Quote {} not found", allocation.quote_id)));
        }
    }

    let payment = docs::insert_customer_payment(&mut *conn, row).await?;
    let mut created = Vec::with_capacity(allocations.len());
    for allocation in allocations {
        created.push(docs::insert_allocation(&mut *conn, payment.payment_id, allocation).await?);
    }
    Ok(CustomerPaymentDetail {
        payment,
        allocations: created,
    })
}

/// Generate a freight bill number not already taken.
pub(crate) async fn next_free_bill_no(conn: &mut PgConnection) -> Result<String, AppError> {
    let today = Utc::now().date_naive();
    for _ in 0..BILL_NO_ATTEMPTS {
        let bill_no = numbering::generate(&mut *conn, DocumentKind::FreightBill, "", today).await?;
        if !docs::bill_no_exists(&mut *conn, &bill_no).await? {
            return Ok(bill_no);
        }
        warn!(bill_no = %bill_no, "Freight bill number already taken, drawing another");
    }
    Err(AppError::conflict("Could not allocate a free freight bill number"))
}

/// Insert a bill with its items and point every charged shipment at it.
pub(crate) async fn insert_freight_bill_with_items(
    conn: &mut PgConnection,
    carrier_name: &str,
    currency: &str,
    items: &[FreightBillItemInput],
    parent_bill_id: Option<Uuid>,
    created_by: Uuid,
) -> Result<FreightBillDetail, AppError> {
    let total_amount = freight_bill_total(items)?;
    for item in items {
        if docs::get_shipment(&mut *conn, item.shipment_id).await?.is_none() {
            return Err(AppError::not_found(format!("Shipment {} not found", item.shipment_id)));
        }
    }

    let row = NewFreightBillRow {
        bill_no: next_free_bill_no(&mut *conn).await?,
        carrier_name: carrier_name.to_string(),
        currency: currency.to_string(),
        total_amount,
        parent_bill_id,
        created_by,
    };
    let bill = docs::insert_freight_bill(&mut *conn, &row).await?;

    let mut created = Vec::with_capacity(items.len());
    for item in items {
        created.push(docs::insert_freight_bill_item(&mut *conn, bill.bill_id, item).await?);
        docs::link_shipment_to_bill(&mut *conn, item.shipment_id, bill.bill_id).await?;
    }

    Ok(FreightBillDetail {
        bill,
        items: created,
    })
}

#[derive(Clone)]
pub struct DocumentService {
    db: Database,
}

impl DocumentService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    // ---------------------------------------------------------------------
    // Customer payments
    // ---------------------------------------------------------------------

    #[instrument(skip(self, actor, input), fields(customer_id = %input.customer_id))]
    pub async fn create_customer_payment(
        &self,
        actor: &ActorContext,
        input: CreateCustomerPayment,
    ) -> Result<CustomerPaymentDetail, AppError> {
        validate_allocations(input.amount, &input.allocations)?;

        let mut tx = self.db.begin().await?;
        let payment_no = numbering::generate(
            &mut tx,
            DocumentKind::CustomerPayment,
            "",
            Utc::now().date_naive(),
        )
        .await?;
        let row = NewCustomerPaymentRow {
            payment_no,
            customer_id: input.customer_id,
            amount: input.amount,
            currency: input.currency.to_ascii_uppercase(),
            note: input.note,
            parent_payment_id: None,
            created_by: actor.user_id,
        };
        let detail = insert_customer_payment_with_allocations(&mut tx, &row, &input.allocations).await?;
        database::commit(tx).await?;

        info!(
            payment_id = %detail.payment.payment_id,
            payment_no = %detail.payment.payment_no,
            "Customer payment created"
        );
        Ok(detail)
    }

    pub async fn get_customer_payment(&self, payment_id: Uuid) -> Result<CustomerPaymentDetail, AppError> {
        let mut conn = self.db.acquire().await?;
        let payment = docs::get_customer_payment(&mut conn, payment_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Customer payment {} not found", payment_id)))?;
        let allocations = docs::list_allocations(&mut conn, payment_id).await?;
        Ok(CustomerPaymentDetail {
            payment,
            allocations,
        })
    }

    /// Settle a customer payment on a statement. Bound payments can no longer be corrected.
    #[instrument(skip(self))]
    pub async fn bind_statement(&self, payment_id: Uuid, statement_id: Uuid) -> Result<CustomerPayment, AppError> {
        let mut tx = self.db.begin().await?;
        let payment = docs::lock_customer_payment(&mut tx, payment_id).await?;

        if payment.status == CustomerPaymentStatus::Void.as_str() {
            return Err(AppError::invalid_state(format!(
                "Customer payment {} is void",
                payment.payment_no
            )));
        }
        if let Some(existing) = payment.statement_id {
            return Err(AppError::conflict(format!(
                "Customer payment {} is already settled on statement {}",
                payment.payment_no, existing
            )));
        }

        let payment = docs::bind_statement(&mut tx, payment_id, statement_id).await?;
        database::commit(tx).await?;

        info!(payment_id = %payment_id, statement_id = %statement_id, "Customer payment bound to statement");
        Ok(payment)
    }

    // ---------------------------------------------------------------------
    // Expenses
    // ---------------------------------------------------------------------

    #[instrument(skip(self, actor, input), fields(user_id = %actor.user_id))]
    pub async fn create_expense(&self, actor: &ActorContext, input: CreateExpense) -> Result<Expense, AppError> {
        if input.category.trim().is_empty() {
            return Err(AppError::invalid_input("Expense category is required"));
        }
        if money::round_money(input.amount) <= Decimal::ZERO {
            return Err(AppError::invalid_input("Expense amount must be greater than zero"));
        }

        let mut tx = self.db.begin().await?;
        let expense_no = numbering::generate(
            &mut tx,
            DocumentKind::Expense,
            "",
            Utc::now().date_naive(),
        )
        .await?;
        let row = NewExpenseRow {
            expense_no,
            category: input.category,
            description: input.description,
            amount: input.amount,
            currency: input.currency.to_ascii_uppercase(),
            incurred_date: input.incurred_date,
            parent_expense_id: None,
            created_by: actor.user_id,
        };
        let expense = docs::insert_expense(&mut tx, &row).await?;
        database::commit(tx).await?;

        info!(expense_id = %expense.expense_id, expense_no = %expense.expense_no, "Expense created");
        Ok(expense)
    }

    pub async fn get_expense(&self, expense_id: Uuid) -> Result<Expense, AppError> {
        let mut conn = self.db.acquire().await?;
        docs::get_expense(&mut conn, expense_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Expense {} not found", expense_id)))
    }

    /// Ordinary void: only the creator, only while DRAFT.
    #[instrument(skip(self, actor), fields(user_id = %actor.user_id))]
    pub async fn void_expense(&self, actor: &ActorContext, expense_id: Uuid) -> Result<Expense, AppError> {
        let mut tx = self.db.begin().await?;
        let expense = docs::lock_expense(&mut tx, expense_id).await?;

        if expense.created_by != actor.user_id {
            return Err(AppError::forbidden(format!(
                "Only the creator can void expense {}",
                expense.expense_no
            )));
        }
        if expense.status != ExpenseStatus::Draft.as_str() {
            return Err(AppError::invalid_state(format!(
                "Expense {} is {}; only draft expenses can be voided",
                expense.expense_no, expense.status
            )));
        }

        let expense = docs::void_expense(&mut tx, expense_id).await?;
        database::commit(tx).await?;

        info!(expense_id = %expense_id, "Expense voided");
        Ok(expense)
    }

    #[instrument(skip(self))]
    pub async fn attach_expense_to_claim(&self, expense_id: Uuid, claim_id: Uuid) -> Result<Expense, AppError> {
        let mut tx = self.db.begin().await?;
        let expense = docs::lock_expense(&mut tx, expense_id).await?;

        if expense.status == ExpenseStatus::Void.as_str() {
            return Err(AppError::invalid_state(format!("Expense {} is void", expense.expense_no)));
        }
        if let Some(existing) = expense.claim_id {
            return Err(AppError::conflict(format!(
                "Expense {} already belongs to claim {}",
                expense.expense_no, existing
            )));
        }

        let expense = docs::set_expense_claim(&mut tx, expense_id, claim_id).await?;
        database::commit(tx).await?;

        info!(expense_id = %expense_id, claim_id = %claim_id, "Expense attached to claim");
        Ok(expense)
    }

    // ---------------------------------------------------------------------
    // Shipments and freight bills
    // ---------------------------------------------------------------------

    #[instrument(skip(self))]
    pub async fn create_shipment(&self, quote_id: Option<Uuid>) -> Result<Shipment, AppError> {
        let mut tx = self.db.begin().await?;
        if let Some(quote_id) = quote_id {
            if quotes::get_quote(&mut tx, quote_id).await?.is_none() {
                return Err(AppError::not_found(format!("Quote {} not found", quote_id)));
            }
        }
        let shipment_no = numbering::generate(
            &mut tx,
            DocumentKind::Shipment,
            "",
            Utc::now().date_naive(),
        )
        .await?;
        let shipment = docs::insert_shipment(&mut tx, &shipment_no, quote_id).await?;
        database::commit(tx).await?;

        info!(shipment_id = %shipment.shipment_id, shipment_no = %shipment.shipment_no, "Shipment created");
        Ok(shipment)
    }

    pub async fn get_shipment(&self, shipment_id: Uuid) -> Result<Shipment, AppError> {
        let mut conn = self.db.acquire().await?;
        docs::get_shipment(&mut conn, shipment_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Shipment {} not found", shipment_id)))
    }

    #[instrument(skip(self, actor, input), fields(user_id = %actor.user_id))]
    pub async fn create_freight_bill(
        &self,
        actor: &ActorContext,
        input: CreateFreightBill,
    ) -> Result<FreightBillDetail, AppError> {
        if input.carrier_name.trim().is_empty() {
            return Err(AppError::invalid_input("Carrier name is required"));
        }
        freight_bill_total(&input.items)?;

        let mut tx = self.db.begin().await?;
        let detail = insert_freight_bill_with_items(
            &mut tx,
            &input.carrier_name,
            &input.currency.to_ascii_uppercase(),
            &input.items,
            None,
            actor.user_id,
        )
        .await?;
        database::commit(tx).await?;

        info!(bill_id = %detail.bill.bill_id, bill_no = %detail.bill.bill_no, "Freight bill created");
        Ok(detail)
    }

    pub async fn get_freight_bill(&self, bill_id: Uuid) -> Result<FreightBillDetail, AppError> {
        let mut conn = self.db.acquire().await?;
        let bill = docs::get_freight_bill(&mut conn, bill_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Freight bill {} not found", bill_id)))?;
        let items = docs::list_freight_bill_items(&mut conn, bill_id).await?;
        Ok(FreightBillDetail { bill, items })
    }
}
