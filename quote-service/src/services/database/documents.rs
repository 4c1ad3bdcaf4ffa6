//! Customer payment, expense, freight bill and shipment queries.

use crate::models::{
    AllocationInput, CustomerPayment, CustomerPaymentStatus, Expense, ExpenseStatus, FreightBill,
    FreightBillItem, FreightBillItemInput, FreightBillStatus, PaymentAllocation, Shipment,
};
use crate::services::metrics::DB_QUERY_DURATION;
use crate::services::money;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use service_core::error::AppError;
use sqlx::PgConnection;
use tracing::instrument;
use uuid::Uuid;

const CUSTOMER_PAYMENT_COLUMNS: &str = r#"payment_id, payment_no, customer_id, amount, currency, status,
    statement_id, parent_payment_id, note, created_by, created_utc, voided_utc"#;

const EXPENSE_COLUMNS: &str = r#"expense_id, expense_no, status, claim_id, category, description, amount,
    currency, incurred_date, parent_expense_id, created_by, created_utc, voided_utc"#;

const FREIGHT_BILL_COLUMNS: &str = r#"bill_id, bill_no, carrier_name, currency, total_amount, status,
    parent_bill_id, created_by, created_utc, voided_utc"#;

fn unique_or_database(context: &'static str, number: &str, e: sqlx::Error) -> AppError {
    match e {
        sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
            AppError::conflict(format!("Document number '{}' already exists", number))
        }
        _ => AppError::database(context, e),
    }
}

// -------------------------------------------------------------------------
// Customer payments
// -------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct NewCustomerPaymentRow {
    pub payment_no: String,
    pub customer_id: Uuid,
    pub amount: Decimal,
    pub currency: String,
    pub note: Option<String>,
    pub parent_payment_id: Option<Uuid>,
    pub created_by: Uuid,
}

#[instrument(skip(conn, row), fields(payment_no = %row.payment_no))]
pub async fn insert_customer_payment(
    conn: &mut PgConnection,
    row: &NewCustomerPaymentRow,
) -> Result<CustomerPayment, AppError> {
    let timer = DB_QUERY_DURATION
        .with_label_values(&["insert_customer_payment"])
        .start_timer();

    let sql = format!(
        r#"
        INSERT INTO customer_payments (
            payment_id, payment_no, customer_id, amount, currency, note, parent_payment_id, created_by
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING {CUSTOMER_PAYMENT_COLUMNS}
        "#
    );
    let payment = sqlx::query_as::<_, CustomerPayment>(&sql)
        .bind(Uuid::new_v4())
        .bind(&row.payment_no)
        .bind(row.customer_id)
        .bind(money::round_money(row.amount))
        .bind(&row.currency)
        .bind(&row.note)
        .bind(row.parent_payment_id)
        .bind(row.created_by)
        .fetch_one(conn)
        .await
        .map_err(|e| unique_or_database("Failed to create customer payment", &row.payment_no, e))?;

    timer.observe_duration();

    Ok(payment)
}

#[instrument(skip(conn, allocation))]
pub async fn insert_allocation(
    conn: &mut PgConnection,
    payment_id: Uuid,
    allocation: &AllocationInput,
) -> Result<PaymentAllocation, AppError> {
    sqlx::query_as::<_, PaymentAllocation>(
        r#"
        INSERT INTO customer_payment_allocations (allocation_id, payment_id, quote_id, amount)
        VALUES ($1, $2, $3, $4)
        RETURNING allocation_id, payment_id, quote_id, amount
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(payment_id)
    .bind(allocation.quote_id)
    .bind(money::round_money(allocation.amount))
    .fetch_one(conn)
    .await
    .map_err(|e| AppError::database("Failed to allocate customer payment", e))
}

#[instrument(skip(conn))]
pub async fn get_customer_payment(
    conn: &mut PgConnection,
    payment_id: Uuid,
) -> Result<Option<CustomerPayment>, AppError> {
    let sql = format!("SELECT {CUSTOMER_PAYMENT_COLUMNS} FROM customer_payments WHERE payment_id = $1");
    sqlx::query_as::<_, CustomerPayment>(&sql)
        .bind(payment_id)
        .fetch_optional(conn)
        .await
        .map_err(|e| AppError::database("Failed to get customer payment", e))
}

#[instrument(skip(conn))]
pub async fn lock_customer_payment(
    conn: &mut PgConnection,
    payment_id: Uuid,
) -> Result<CustomerPayment, AppError> {
    let sql = format!(
        "SELECT {CUSTOMER_PAYMENT_COLUMNS} FROM customer_payments WHERE payment_id = $1 FOR UPDATE"
    );
    sqlx::query_as::<_, CustomerPayment>(&sql)
        .bind(payment_id)
        .fetch_optional(conn)
        .await
        .map_err(|e| AppError::database("Failed to lock customer payment", e))?
        .ok_or_else(|| AppError::not_found(format!("Customer payment {} not found", payment_id)))
}

#[instrument(skip(conn))]
pub async fn list_allocations(
    conn: &mut PgConnection,
    payment_id: Uuid,
) -> Result<Vec<PaymentAllocation>, AppError> {
    sqlx::query_as::<_, PaymentAllocation>(
        r#"
        SELECT allocation_id, payment_id, quote_id, amount
        FROM customer_payment_allocations
        WHERE payment_id = $1
        ORDER BY quote_id
        "#,
    )
    .bind(payment_id)
    .fetch_all(conn)
    .await
    .map_err(|e| AppError::database("Failed to list allocations", e))
}

#[instrument(skip(conn))]
pub async fn bind_statement(
    conn: &mut PgConnection,
    payment_id: Uuid,
    statement_id: Uuid,
) -> Result<CustomerPayment, AppError> {
    let sql = format!(
        r#"
        UPDATE customer_payments SET statement_id = $2
        WHERE payment_id = $1
        RETURNING {CUSTOMER_PAYMENT_COLUMNS}
        "#
    );
    sqlx::query_as::<_, CustomerPayment>(&sql)
        .bind(payment_id)
        .bind(statement_id)
        .fetch_one(conn)
        .await
        .map_err(|e| AppError::database("Failed to bind statement", e))
}

#[instrument(skip(conn))]
pub async fn void_customer_payment(conn: &mut PgConnection, payment_id: Uuid) -> Result<(), AppError> {
    sqlx::query("UPDATE customer_payments SET status = $2, voided_utc = NOW() WHERE payment_id = $1")
        .bind(payment_id)
        .bind(CustomerPaymentStatus::Void.as_str())
        .execute(conn)
        .await
        .map_err(|e| AppError::database("Failed to void customer payment", e))?;
    Ok(())
}

// -------------------------------------------------------------------------
// Expenses
// -------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct NewExpenseRow {
    pub expense_no: String,
    pub category: String,
    pub description: Option<String>,
    pub amount: Decimal,
    pub currency: String,
    pub incurred_date: NaiveDate,
    pub parent_expense_id: Option<Uuid>,
    pub created_by: Uuid,
}

#[instrument(skip(conn, row), fields(expense_no = %row.expense_no))]
pub async fn insert_expense(conn: &mut PgConnection, row: &NewExpenseRow) -> Result<Expense, AppError> {
    let sql = format!(
        r#"
        INSERT INTO expenses (
            expense_id, expense_no, category, description, amount, currency, incurred_date,
            parent_expense_id, created_by
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING {EXPENSE_COLUMNS}
        "#
    );
    sqlx::query_as::<_, Expense>(&sql)
        .bind(Uuid::new_v4())
        .bind(&row.expense_no)
        .bind(&row.category)
        .bind(&row.description)
        .bind(money::round_money(row.amount))
        .bind(&row.currency)
        .bind(row.incurred_date)
        .bind(row.parent_expense_id)
        .bind(row.created_by)
        .fetch_one(conn)
        .await
        .map_err(|e| unique_or_database("Failed to create expense", &row.expense_no, e))
}

#[instrument(skip(conn))]
pub async fn get_expense(conn: &mut PgConnection, expense_id: Uuid) -> Result<Option<Expense>, AppError> {
    let sql = format!("SELECT {EXPENSE_COLUMNS} FROM expenses WHERE expense_id = $1");
    sqlx::query_as::<_, Expense>(&sql)
        .bind(expense_id)
        .fetch_optional(conn)
        .await
        .map_err(|e| AppError::database("Failed to get expense", e))
}

#[instrument(skip(conn))]
pub async fn lock_expense(conn: &mut PgConnection, expense_id: Uuid) -> Result<Expense, AppError> {
    let sql = format!("SELECT {EXPENSE_COLUMNS} FROM expenses WHERE expense_id = $1 FOR UPDATE");
    sqlx::query_as::<_, Expense>(&sql)
        .bind(expense_id)
        .fetch_optional(conn)
        .await
        .map_err(|e| AppError::database("Failed to lock expense", e))?
        .ok_or_else(|| AppError::not_found(format!("Expense {} not found", expense_id)))
}

#[instrument(skip(conn))]
pub async fn void_expense(conn: &mut PgConnection, expense_id: Uuid) -> Result<Expense, AppError> {
    let sql = format!(
        r#"
        UPDATE expenses SET status = $2, voided_utc = NOW()
        WHERE expense_id = $1
        RETURNING {EXPENSE_COLUMNS}
        "#
    );
    sqlx::query_as::<_, Expense>(&sql)
        .bind(expense_id)
        .bind(ExpenseStatus::Void.as_str())
        .fetch_one(conn)
        .await
        .map_err(|e| AppError::database("Failed to void expense", e))
}

#[instrument(skip(conn))]
pub async fn set_expense_claim(
    conn: &mut PgConnection,
    expense_id: Uuid,
    claim_id: Uuid,
) -> Result<Expense, AppError> {
    let sql = format!(
        "UPDATE expenses SET claim_id = $2 WHERE expense_id = $1 RETURNING {EXPENSE_COLUMNS}"
    );
    sqlx::query_as::<_, Expense>(&sql)
        .bind(expense_id)
        .bind(claim_id)
        .fetch_one(conn)
        .await
        .map_err(|e| AppError::database("Failed to attach expense to claim", e))
}

// -------------------------------------------------------------------------
// Freight bills
// -------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct NewFreightBillRow {
    pub bill_no: String,
    pub carrier_name: String,
    pub currency: String,
    pub total_amount: Decimal,
    pub parent_bill_id: Option<Uuid>,
    pub created_by: Uuid,
}

#[instrument(skip(conn, row), fields(bill_no = %row.bill_no))]
pub async fn insert_freight_bill(
    conn: &mut PgConnection,
    row: &NewFreightBillRow,
) -> Result<FreightBill, AppError> {
    let timer = DB_QUERY_DURATION
        .with_label_values(&["insert_freight_bill"])
        .start_timer();

    let sql = format!(
        r#"
        INSERT INTO freight_bills (
            bill_id, bill_no, carrier_name, currency, total_amount, parent_bill_id, created_by
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING {FREIGHT_BILL_COLUMNS}
        "#
    );
    let bill = sqlx::query_as::<_, FreightBill>(&sql)
        .bind(Uuid::new_v4())
        .bind(&row.bill_no)
        .bind(&row.carrier_name)
        .bind(&row.currency)
        .bind(money::round_money(row.total_amount))
        .bind(row.parent_bill_id)
        .bind(row.created_by)
        .fetch_one(conn)
        .await
        .map_err(|e| unique_or_database("Failed to create freight bill", &row.bill_no, e))?;

    timer.observe_duration();

    Ok(bill)
}

#[instrument(skip(conn))]
pub async fn bill_no_exists(conn: &mut PgConnection, bill_no: &str) -> Result<bool, AppError> {
    sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM freight_bills WHERE bill_no = $1)")
        .bind(bill_no)
        .fetch_one(conn)
        .await
        .map_err(|e| AppError::database("Failed to check freight bill number", e))
}

#[instrument(skip(conn, item))]
pub async fn insert_freight_bill_item(
    conn: &mut PgConnection,
    bill_id: Uuid,
    item: &FreightBillItemInput,
) -> Result<FreightBillItem, AppError> {
    sqlx::query_as::<_, FreightBillItem>(
        r#"
        INSERT INTO freight_bill_items (item_id, bill_id, shipment_id, description, amount)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING item_id, bill_id, shipment_id, description, amount
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(bill_id)
    .bind(item.shipment_id)
    .bind(&item.description)
    .bind(money::round_money(item.amount))
    .fetch_one(conn)
    .await
    .map_err(|e| AppError::database("Failed to add freight bill item", e))
}

#[instrument(skip(conn))]
pub async fn list_freight_bill_items(
    conn: &mut PgConnection,
    bill_id: Uuid,
) -> Result<Vec<FreightBillItem>, AppError> {
    sqlx::query_as::<_, FreightBillItem>(
        r#"
        SELECT item_id, bill_id, shipment_id, description, amount
        FROM freight_bill_items
        WHERE bill_id = $1
        ORDER BY item_id
        "#,
    )
    .bind(bill_id)
    .fetch_all(conn)
    .await
    .map_err(|e| AppError::database("Failed to list freight bill items", e))
}

#[instrument(skip(conn))]
pub async fn get_freight_bill(conn: &mut PgConnection, bill_id: Uuid) -> Result<Option<FreightBill>, AppError> {
    let sql = format!("SELECT {FREIGHT_BILL_COLUMNS} FROM freight_bills WHERE bill_id = $1");
    sqlx::query_as::<_, FreightBill>(&sql)
        .bind(bill_id)
        .fetch_optional(conn)
        .await
        .map_err(|e| AppError::database("Failed to get freight bill", e))
}

#[instrument(skip(conn))]
pub async fn lock_freight_bill(conn: &mut PgConnection, bill_id: Uuid) -> Result<FreightBill, AppError> {
    let sql = format!("SELECT {FREIGHT_BILL_COLUMNS} FROM freight_bills WHERE bill_id = $1 FOR UPDATE");
    sqlx::query_as::<_, FreightBill>(&sql)
        .bind(bill_id)
        .fetch_optional(conn)
        .await
        .map_err(|e| AppError::database("Failed to lock freight bill", e))?
        .ok_or_else(|| AppError::not_found(format!("Freight bill {} not found", bill_id)))
}

#[instrument(skip(conn))]
pub async fn void_freight_bill(conn: &mut PgConnection, bill_id: Uuid) -> Result<(), AppError> {
    sqlx::query("UPDATE freight_bills SET status = $2, voided_utc = NOW() WHERE bill_id = $1")
        .bind(bill_id)
        .bind(FreightBillStatus::Void.as_str())
        .execute(conn)
        .await
        .map_err(|e| AppError::database("Failed to void freight bill", e))?;
    Ok(())
}

// -------------------------------------------------------------------------
// Shipments
// -------------------------------------------------------------------------

/// Clear the bill reference on every shipment still charged to `bill_id`.
#[instrument(skip(conn))]
pub async fn unlink_shipments_from_bill(
    conn: &mut PgConnection,
    bill_id: Uuid,
) -> Result<u64, AppError> {
    let result = sqlx::query("UPDATE shipments SET freight_bill_id = NULL WHERE freight_bill_id = $1")
        .bind(bill_id)
        .execute(conn)
        .await
        .map_err(|e| AppError::database("Failed to unlink shipments from freight bill", e))?;
    Ok(result.rows_affected())
}

#[instrument(skip(conn))]
pub async fn insert_shipment(
    conn: &mut PgConnection,
    shipment_no: &str,
    quote_id: Option<Uuid>,
) -> Result<Shipment, AppError> {
    sqlx::query_as::<_, Shipment>(
        r#"
        INSERT INTO shipments (shipment_id, shipment_no, quote_id)
        VALUES ($1, $2, $3)
        RETURNING shipment_id, shipment_no, quote_id, freight_bill_id, created_utc
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(shipment_no)
    .bind(quote_id)
    .fetch_one(conn)
    .await
    .map_err(|e| unique_or_database("Failed to create shipment", shipment_no, e))
}

#[instrument(skip(conn))]
pub async fn get_shipment(conn: &mut PgConnection, shipment_id: Uuid) -> Result<Option<Shipment>, AppError> {
    sqlx::query_as::<_, Shipment>(
        r#"
        SELECT shipment_id, shipment_no, quote_id, freight_bill_id, created_utc
        FROM shipments
        WHERE shipment_id = $1
        "#,
    )
    .bind(shipment_id)
    .fetch_optional(conn)
    .await
    .map_err(|e| AppError::database("Failed to get shipment", e))
}

/// Point a shipment at the bill that currently charges it.
#[instrument(skip(conn))]
pub async fn link_shipment_to_bill(
    conn: &mut PgConnection,
    shipment_id: Uuid,
    bill_id: Uuid,
) -> Result<(), AppError> {
    let result = sqlx::query("UPDATE shipments SET freight_bill_id = $2 WHERE shipment_id = $1")
        .bind(shipment_id)
        .bind(bill_id)
        .execute(conn)
        .await
        .map_err(|e| AppError::database("Failed to link shipment to freight bill", e))?;

    if result.rows_affected() == 0 {
        return Err(AppError::not_found(format!("Shipment {} not found", shipment_id)));
    }
    Ok(())
}
