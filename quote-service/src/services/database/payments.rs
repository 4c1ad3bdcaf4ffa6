//! Quote payment and credit queries.

use crate::models::{QuoteCredit, QuotePayment, QuotePaymentStatus};
use crate::services::metrics::DB_QUERY_DURATION;
use crate::services::money;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use service_core::error::AppError;
use sqlx::PgConnection;
use tracing::instrument;
use uuid::Uuid;

const PAYMENT_COLUMNS: &str = r#"payment_id, quote_id, amount, currency, payment_method_id, payment_time,
    submitted_by, status, is_finance_confirmed, confirmer_id, confirmed_utc, payment_batch_no, note,
    remark, attachments, created_utc"#;

/// Values for a new payment row.
#[derive(Debug, Clone)]
pub struct NewPaymentRow {
    pub quote_id: Uuid,
    pub amount: Decimal,
    pub currency: String,
    pub payment_method_id: Uuid,
    pub payment_time: DateTime<Utc>,
    pub submitted_by: Uuid,
    pub status: QuotePaymentStatus,
    /// Set together with a CONFIRMED status.
    pub confirmer_id: Option<Uuid>,
    pub payment_batch_no: Option<String>,
    pub note: Option<String>,
    pub remark: Option<String>,
}

#[instrument(skip(conn, row), fields(quote_id = %row.quote_id, amount = %row.amount))]
pub async fn insert_payment(conn: &mut PgConnection, row: &NewPaymentRow) -> Result<QuotePayment, AppError> {
    let timer = DB_QUERY_DURATION
        .with_label_values(&["insert_payment"])
        .start_timer();

    let confirmed = row.status == QuotePaymentStatus::Confirmed;
    let sql = format!(
        r#"
        INSERT INTO quote_payments (
            payment_id, quote_id, amount, currency, payment_method_id, payment_time, submitted_by,
            status, is_finance_confirmed, confirmer_id, confirmed_utc, payment_batch_no, note, remark
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, CASE WHEN $9 THEN NOW() END, $11, $12, $13)
        RETURNING {PAYMENT_COLUMNS}
        "#
    );
    let payment = sqlx::query_as::<_, QuotePayment>(&sql)
        .bind(Uuid::new_v4())
        .bind(row.quote_id)
        .bind(money::round_money(row.amount))
        .bind(&row.currency)
        .bind(row.payment_method_id)
        .bind(row.payment_time)
        .bind(row.submitted_by)
        .bind(row.status.as_str())
        .bind(confirmed)
        .bind(row.confirmer_id)
        .bind(&row.payment_batch_no)
        .bind(&row.note)
        .bind(&row.remark)
        .fetch_one(conn)
        .await
        .map_err(|e| AppError::database("Failed to record payment", e))?;

    timer.observe_duration();

    Ok(payment)
}

#[instrument(skip(conn))]
pub async fn get_payment(conn: &mut PgConnection, payment_id: Uuid) -> Result<Option<QuotePayment>, AppError> {
    let sql = format!("SELECT {PAYMENT_COLUMNS} FROM quote_payments WHERE payment_id = $1");
    sqlx::query_as::<_, QuotePayment>(&sql)
        .bind(payment_id)
        .fetch_optional(conn)
        .await
        .map_err(|e| AppError::database("Failed to get payment", e))
}

/// Lock one payment row. Callers must already hold the owning quote's lock.
#[instrument(skip(conn))]
pub async fn lock_payment(conn: &mut PgConnection, payment_id: Uuid) -> Result<QuotePayment, AppError> {
    let sql = format!("SELECT {PAYMENT_COLUMNS} FROM quote_payments WHERE payment_id = $1 FOR UPDATE");
    sqlx::query_as::<_, QuotePayment>(&sql)
        .bind(payment_id)
        .fetch_optional(conn)
        .await
        .map_err(|e| AppError::database("Failed to lock payment", e))?
        .ok_or_else(|| AppError::not_found(format!("Payment {} not found", payment_id)))
}

/// Owning quote of a payment, without locking anything.
#[instrument(skip(conn))]
pub async fn quote_id_of(conn: &mut PgConnection, payment_id: Uuid) -> Result<Uuid, AppError> {
    sqlx::query_scalar::<_, Uuid>("SELECT quote_id FROM quote_payments WHERE payment_id = $1")
        .bind(payment_id)
        .fetch_optional(conn)
        .await
        .map_err(|e| AppError::database("Failed to look up payment", e))?
        .ok_or_else(|| AppError::not_found(format!("Payment {} not found", payment_id)))
}

#[instrument(skip(conn))]
pub async fn list_for_quote(conn: &mut PgConnection, quote_id: Uuid) -> Result<Vec<QuotePayment>, AppError> {
    let sql = format!(
        "SELECT {PAYMENT_COLUMNS} FROM quote_payments WHERE quote_id = $1 ORDER BY created_utc, payment_id"
    );
    sqlx::query_as::<_, QuotePayment>(&sql)
        .bind(quote_id)
        .fetch_all(conn)
        .await
        .map_err(|e| AppError::database("Failed to list payments", e))
}

/// Sum of CONFIRMED payment amounts; the only source of a quote's paid amount.
#[instrument(skip(conn))]
pub async fn confirmed_total(conn: &mut PgConnection, quote_id: Uuid) -> Result<Decimal, AppError> {
    let timer = DB_QUERY_DURATION
        .with_label_values(&["confirmed_total"])
        .start_timer();

    let total = sqlx::query_scalar::<_, Decimal>(
        r#"
        SELECT COALESCE(SUM(amount), 0)
        FROM quote_payments
        WHERE quote_id = $1 AND status = 'confirmed'
        "#,
    )
    .bind(quote_id)
    .fetch_one(conn)
    .await
    .map_err(|e| AppError::database("Failed to aggregate confirmed payments", e))?;

    timer.observe_duration();

    Ok(money::round_money(total))
}

#[instrument(skip(conn))]
pub async fn has_confirmed(conn: &mut PgConnection, quote_id: Uuid) -> Result<bool, AppError> {
    sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS (SELECT 1 FROM quote_payments WHERE quote_id = $1 AND status = 'confirmed')",
    )
    .bind(quote_id)
    .fetch_one(conn)
    .await
    .map_err(|e| AppError::database("Failed to check confirmed payments", e))
}

/// Record a finance decision on a SUBMITTED payment.
#[instrument(skip(conn, attachments))]
pub async fn apply_decision(
    conn: &mut PgConnection,
    payment_id: Uuid,
    status: QuotePaymentStatus,
    confirmer_id: Uuid,
    remark: Option<&str>,
    attachments: &[String],
) -> Result<QuotePayment, AppError> {
    let timer = DB_QUERY_DURATION
        .with_label_values(&["apply_decision"])
        .start_timer();

    let sql = format!(
        r#"
        UPDATE quote_payments
        SET status = $2,
            is_finance_confirmed = ($2 = 'confirmed'),
            confirmer_id = $3,
            confirmed_utc = NOW(),
            remark = COALESCE($4, remark),
            attachments = $5
        WHERE payment_id = $1 AND status = 'submitted'
        RETURNING {PAYMENT_COLUMNS}
        "#
    );
    let payment = sqlx::query_as::<_, QuotePayment>(&sql)
        .bind(payment_id)
        .bind(status.as_str())
        .bind(confirmer_id)
        .bind(remark)
        .bind(serde_json::json!(attachments))
        .fetch_optional(conn)
        .await
        .map_err(|e| AppError::database("Failed to record finance decision", e))?;

    timer.observe_duration();

    payment.ok_or_else(|| {
        AppError::invalid_state(format!("Payment {} is no longer awaiting confirmation", payment_id))
    })
}

// -------------------------------------------------------------------------
// Credits
// -------------------------------------------------------------------------

#[allow(clippy::too_many_arguments)]
#[instrument(skip(conn, remark))]
pub async fn insert_credit(
    conn: &mut PgConnection,
    origin_quote_id: Uuid,
    origin_payment_id: Uuid,
    customer_id: Uuid,
    amount: Decimal,
    currency: &str,
    remark: &str,
    created_by: Uuid,
) -> Result<QuoteCredit, AppError> {
    sqlx::query_as::<_, QuoteCredit>(
        r#"
        INSERT INTO quote_credits (
            credit_id, origin_quote_id, origin_payment_id, customer_id, amount, currency, remark, created_by
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING credit_id, origin_quote_id, origin_payment_id, customer_id, amount, currency,
                  remark, created_by, created_utc
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(origin_quote_id)
    .bind(origin_payment_id)
    .bind(customer_id)
    .bind(money::round_money(amount))
    .bind(currency)
    .bind(remark)
    .bind(created_by)
    .fetch_one(conn)
    .await
    .map_err(|e| AppError::database("Failed to record excess credit", e))
}

#[instrument(skip(conn))]
pub async fn list_credits(conn: &mut PgConnection, quote_id: Uuid) -> Result<Vec<QuoteCredit>, AppError> {
    sqlx::query_as::<_, QuoteCredit>(
        r#"
        SELECT credit_id, origin_quote_id, origin_payment_id, customer_id, amount, currency,
               remark, created_by, created_utc
        FROM quote_credits
        WHERE origin_quote_id = $1
        ORDER BY created_utc, credit_id
        "#,
    )
    .bind(quote_id)
    .fetch_all(conn)
    .await
    .map_err(|e| AppError::database("Failed to list credits", e))
}
