//! Quote, line item and collector history queries.

use crate::models::{
    CollectorHistory, CreateQuoteItem, DownstreamType, PaymentStatus, Quote, QuoteItem,
    QuoteStatus, UpdateQuoteItem, VoidStatus,
};
use crate::services::metrics::DB_QUERY_DURATION;
use crate::services::money;
use rust_decimal::Decimal;
use service_core::error::AppError;
use sqlx::PgConnection;
use tracing::instrument;
use uuid::Uuid;

const QUOTE_COLUMNS: &str = r#"quote_id, quote_no, owner_code, status, void_status, customer_id, customer_name,
    machine_model, machine_serial, currency, total_amount, paid_amount, payment_status, collector_id,
    business_line_id, parent_quote_id, downstream_type, downstream_id, is_warehouse_cc_sent,
    is_warehouse_ship_sent, notes, created_by, created_utc, confirmed_utc, cancelled_utc"#;

const ITEM_COLUMNS: &str = r#"item_id, quote_id, part_no, description, quantity, unit_price, exchange_rate, amount,
    warehouse_code, sort_order, shipped_quantity, created_utc"#;

/// Header values for a new quote row. Lifecycle and money columns take their defaults.
#[derive(Debug, Clone)]
pub struct NewQuoteRow {
    pub quote_id: Uuid,
    pub quote_no: String,
    pub owner_code: String,
    pub customer_id: Uuid,
    pub customer_name: String,
    pub machine_model: Option<String>,
    pub machine_serial: Option<String>,
    pub currency: String,
    pub collector_id: Uuid,
    pub business_line_id: Option<Uuid>,
    pub parent_quote_id: Option<Uuid>,
    pub notes: Option<String>,
    pub created_by: Uuid,
}

/// One-way notification flags on the quote row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuoteFlag {
    WarehouseCcSent,
    WarehouseShipSent,
}

#[instrument(skip(conn, row), fields(quote_no = %row.quote_no))]
pub async fn insert_quote(conn: &mut PgConnection, row: &NewQuoteRow) -> Result<Quote, AppError> {
    let timer = DB_QUERY_DURATION
        .with_label_values(&["insert_quote"])
        .start_timer();

    let sql = format!(
        r#"
        INSERT INTO quotes (
            quote_id, quote_no, owner_code, customer_id, customer_name, machine_model, machine_serial,
            currency, collector_id, business_line_id, parent_quote_id, notes, created_by
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
        RETURNING {QUOTE_COLUMNS}
        "#
    );

    let quote = sqlx::query_as::<_, Quote>(&sql)
        .bind(row.quote_id)
        .bind(&row.quote_no)
        .bind(&row.owner_code)
        .bind(row.customer_id)
        .bind(&row.customer_name)
        .bind(&row.machine_model)
        .bind(&row.machine_serial)
        .bind(&row.currency)
        .bind(row.collector_id)
        .bind(row.business_line_id)
        .bind(row.parent_quote_id)
        .bind(&row.notes)
        .bind(row.created_by)
        .fetch_one(conn)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::conflict(format!("Quote number '{}' already exists", row.quote_no))
            }
            _ => AppError::database("Failed to create quote", e),
        })?;

    timer.observe_duration();

    Ok(quote)
}

#[instrument(skip(conn))]
pub async fn get_quote(conn: &mut PgConnection, quote_id: Uuid) -> Result<Option<Quote>, AppError> {
    let timer = DB_QUERY_DURATION
        .with_label_values(&["get_quote"])
        .start_timer();

    let sql = format!("SELECT {QUOTE_COLUMNS} FROM quotes WHERE quote_id = $1");
    let quote = sqlx::query_as::<_, Quote>(&sql)
        .bind(quote_id)
        .fetch_optional(conn)
        .await
        .map_err(|e| AppError::database("Failed to get quote", e))?;

    timer.observe_duration();

    Ok(quote)
}

/// Load a quote and hold its row lock for the rest of the transaction.
///
/// Every operation that touches a quote's payments takes this lock first, so paid totals are
/// always aggregated by one writer at a time.
#[instrument(skip(conn))]
pub async fn lock_quote(conn: &mut PgConnection, quote_id: Uuid) -> Result<Quote, AppError> {
    let timer = DB_QUERY_DURATION
        .with_label_values(&["lock_quote"])
        .start_timer();

    let sql = format!("SELECT {QUOTE_COLUMNS} FROM quotes WHERE quote_id = $1 FOR UPDATE");
    let quote = sqlx::query_as::<_, Quote>(&sql)
        .bind(quote_id)
        .fetch_optional(conn)
        .await
        .map_err(|e| AppError::database("Failed to lock quote", e))?;

    timer.observe_duration();

    quote.ok_or_else(|| AppError::not_found(format!("Quote {} not found", quote_id)))
}

/// Lock several quotes in id order so concurrent batches cannot deadlock.
#[instrument(skip(conn, quote_ids), fields(count = quote_ids.len()))]
pub async fn lock_quotes(conn: &mut PgConnection, quote_ids: &[Uuid]) -> Result<Vec<Quote>, AppError> {
    let timer = DB_QUERY_DURATION
        .with_label_values(&["lock_quotes"])
        .start_timer();

    let sql = format!(
        "SELECT {QUOTE_COLUMNS} FROM quotes WHERE quote_id = ANY($1) ORDER BY quote_id FOR UPDATE"
    );
    let quotes = sqlx::query_as::<_, Quote>(&sql)
        .bind(quote_ids)
        .fetch_all(conn)
        .await
        .map_err(|e| AppError::database("Failed to lock quotes", e))?;

    timer.observe_duration();

    Ok(quotes)
}

#[instrument(skip(conn))]
pub async fn set_status(
    conn: &mut PgConnection,
    quote_id: Uuid,
    status: QuoteStatus,
) -> Result<Quote, AppError> {
    let sql = format!(
        r#"
        UPDATE quotes
        SET status = $2,
            confirmed_utc = CASE WHEN $2 = 'confirmed' THEN NOW() ELSE confirmed_utc END,
            cancelled_utc = CASE WHEN $2 = 'cancelled' THEN NOW() ELSE cancelled_utc END
        WHERE quote_id = $1
        RETURNING {QUOTE_COLUMNS}
        "#
    );
    sqlx::query_as::<_, Quote>(&sql)
        .bind(quote_id)
        .bind(status.as_str())
        .fetch_one(conn)
        .await
        .map_err(|e| AppError::database("Failed to update quote status", e))
}

#[instrument(skip(conn))]
pub async fn set_void_status(
    conn: &mut PgConnection,
    quote_id: Uuid,
    void_status: VoidStatus,
) -> Result<(), AppError> {
    sqlx::query("UPDATE quotes SET void_status = $2 WHERE quote_id = $1")
        .bind(quote_id)
        .bind(void_status.as_str())
        .execute(conn)
        .await
        .map_err(|e| AppError::database("Failed to update void status", e))?;
    Ok(())
}

/// Cancel and mark voided in one statement. Payment rows are left untouched.
#[instrument(skip(conn))]
pub async fn void_quote(conn: &mut PgConnection, quote_id: Uuid) -> Result<Quote, AppError> {
    let sql = format!(
        r#"
        UPDATE quotes
        SET status = 'cancelled', void_status = 'voided', cancelled_utc = NOW()
        WHERE quote_id = $1
        RETURNING {QUOTE_COLUMNS}
        "#
    );
    sqlx::query_as::<_, Quote>(&sql)
        .bind(quote_id)
        .fetch_one(conn)
        .await
        .map_err(|e| AppError::database("Failed to void quote", e))
}

/// Persist a recomputed money projection.
#[instrument(skip(conn))]
pub async fn update_projection(
    conn: &mut PgConnection,
    quote_id: Uuid,
    total_amount: Decimal,
    paid_amount: Decimal,
    payment_status: PaymentStatus,
) -> Result<Quote, AppError> {
    let timer = DB_QUERY_DURATION
        .with_label_values(&["update_projection"])
        .start_timer();

    let sql = format!(
        r#"
        UPDATE quotes
        SET total_amount = $2, paid_amount = $3, payment_status = $4
        WHERE quote_id = $1
        RETURNING {QUOTE_COLUMNS}
        "#
    );
    let quote = sqlx::query_as::<_, Quote>(&sql)
        .bind(quote_id)
        .bind(total_amount)
        .bind(paid_amount)
        .bind(payment_status.as_str())
        .fetch_one(conn)
        .await
        .map_err(|e| AppError::database("Failed to update quote projection", e))?;

    timer.observe_duration();

    Ok(quote)
}

#[instrument(skip(conn))]
pub async fn set_collector(
    conn: &mut PgConnection,
    quote_id: Uuid,
    collector_id: Uuid,
) -> Result<Quote, AppError> {
    let sql = format!(
        "UPDATE quotes SET collector_id = $2 WHERE quote_id = $1 RETURNING {QUOTE_COLUMNS}"
    );
    sqlx::query_as::<_, Quote>(&sql)
        .bind(quote_id)
        .bind(collector_id)
        .fetch_one(conn)
        .await
        .map_err(|e| AppError::database("Failed to change collector", e))
}

#[instrument(skip(conn))]
pub async fn set_downstream(
    conn: &mut PgConnection,
    quote_id: Uuid,
    downstream_type: DownstreamType,
    downstream_id: Uuid,
) -> Result<Quote, AppError> {
    let sql = format!(
        r#"
        UPDATE quotes SET downstream_type = $2, downstream_id = $3
        WHERE quote_id = $1
        RETURNING {QUOTE_COLUMNS}
        "#
    );
    sqlx::query_as::<_, Quote>(&sql)
        .bind(quote_id)
        .bind(downstream_type.as_str())
        .bind(downstream_id)
        .fetch_one(conn)
        .await
        .map_err(|e| AppError::database("Failed to link downstream document", e))
}

/// Flip a one-way flag. Returns `true` only for the caller that actually flipped it.
#[instrument(skip(conn))]
pub async fn try_set_flag(
    conn: &mut PgConnection,
    quote_id: Uuid,
    flag: QuoteFlag,
) -> Result<bool, AppError> {
    let sql = match flag {
        QuoteFlag::WarehouseCcSent => {
            r#"UPDATE quotes SET is_warehouse_cc_sent = TRUE
               WHERE quote_id = $1 AND is_warehouse_cc_sent = FALSE
               RETURNING quote_id"#
        }
        QuoteFlag::WarehouseShipSent => {
            r#"UPDATE quotes SET is_warehouse_ship_sent = TRUE
               WHERE quote_id = $1 AND is_warehouse_ship_sent = FALSE
               RETURNING quote_id"#
        }
    };

    let flipped = sqlx::query_scalar::<_, Uuid>(sql)
        .bind(quote_id)
        .fetch_optional(conn)
        .await
        .map_err(|e| AppError::database("Failed to set notification flag", e))?;

    Ok(flipped.is_some())
}

// -------------------------------------------------------------------------
// Line items
// -------------------------------------------------------------------------

#[instrument(skip(conn, input), fields(quote_id = %quote_id))]
pub async fn insert_item(
    conn: &mut PgConnection,
    quote_id: Uuid,
    input: &CreateQuoteItem,
) -> Result<QuoteItem, AppError> {
    let timer = DB_QUERY_DURATION
        .with_label_values(&["insert_quote_item"])
        .start_timer();

    let amount = money::line_amount(input.quantity, input.unit_price, input.exchange_rate);
    let sql = format!(
        r#"
        INSERT INTO quote_items (
            item_id, quote_id, part_no, description, quantity, unit_price, exchange_rate, amount,
            warehouse_code, sort_order
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        RETURNING {ITEM_COLUMNS}
        "#
    );
    let item = sqlx::query_as::<_, QuoteItem>(&sql)
        .bind(Uuid::new_v4())
        .bind(quote_id)
        .bind(&input.part_no)
        .bind(&input.description)
        .bind(input.quantity)
        .bind(input.unit_price)
        .bind(input.exchange_rate)
        .bind(amount)
        .bind(&input.warehouse_code)
        .bind(input.sort_order)
        .fetch_one(conn)
        .await
        .map_err(|e| AppError::database("Failed to add quote item", e))?;

    timer.observe_duration();

    Ok(item)
}

#[instrument(skip(conn))]
pub async fn get_items(conn: &mut PgConnection, quote_id: Uuid) -> Result<Vec<QuoteItem>, AppError> {
    let sql = format!(
        "SELECT {ITEM_COLUMNS} FROM quote_items WHERE quote_id = $1 ORDER BY sort_order, created_utc, item_id"
    );
    sqlx::query_as::<_, QuoteItem>(&sql)
        .bind(quote_id)
        .fetch_all(conn)
        .await
        .map_err(|e| AppError::database("Failed to get quote items", e))
}

#[instrument(skip(conn))]
pub async fn get_item(
    conn: &mut PgConnection,
    quote_id: Uuid,
    item_id: Uuid,
) -> Result<Option<QuoteItem>, AppError> {
    let sql = format!("SELECT {ITEM_COLUMNS} FROM quote_items WHERE quote_id = $1 AND item_id = $2");
    sqlx::query_as::<_, QuoteItem>(&sql)
        .bind(quote_id)
        .bind(item_id)
        .fetch_optional(conn)
        .await
        .map_err(|e| AppError::database("Failed to get quote item", e))
}

/// Apply a partial update; the line amount is recomputed from the merged values.
#[instrument(skip(conn, existing, input), fields(item_id = %existing.item_id))]
pub async fn update_item(
    conn: &mut PgConnection,
    existing: &QuoteItem,
    input: &UpdateQuoteItem,
) -> Result<QuoteItem, AppError> {
    let quantity = input.quantity.unwrap_or(existing.quantity);
    let unit_price = input.unit_price.unwrap_or(existing.unit_price);
    let exchange_rate = input.exchange_rate.unwrap_or(existing.exchange_rate);
    let amount = money::line_amount(quantity, unit_price, exchange_rate);

    let sql = format!(
        r#"
        UPDATE quote_items
        SET part_no = COALESCE($2, part_no),
            description = COALESCE($3, description),
            quantity = $4,
            unit_price = $5,
            exchange_rate = $6,
            amount = $7,
            warehouse_code = COALESCE($8, warehouse_code),
            sort_order = COALESCE($9, sort_order)
        WHERE item_id = $1
        RETURNING {ITEM_COLUMNS}
        "#
    );
    sqlx::query_as::<_, QuoteItem>(&sql)
        .bind(existing.item_id)
        .bind(&input.part_no)
        .bind(&input.description)
        .bind(quantity)
        .bind(unit_price)
        .bind(exchange_rate)
        .bind(amount)
        .bind(&input.warehouse_code)
        .bind(input.sort_order)
        .fetch_one(conn)
        .await
        .map_err(|e| AppError::database("Failed to update quote item", e))
}

#[instrument(skip(conn))]
pub async fn delete_item(conn: &mut PgConnection, quote_id: Uuid, item_id: Uuid) -> Result<bool, AppError> {
    let result = sqlx::query("DELETE FROM quote_items WHERE quote_id = $1 AND item_id = $2")
        .bind(quote_id)
        .bind(item_id)
        .execute(conn)
        .await
        .map_err(|e| AppError::database("Failed to remove quote item", e))?;
    Ok(result.rows_affected() > 0)
}

/// Sum of line amounts.
#[instrument(skip(conn))]
pub async fn items_total(conn: &mut PgConnection, quote_id: Uuid) -> Result<Decimal, AppError> {
    let total = sqlx::query_scalar::<_, Decimal>(
        "SELECT COALESCE(SUM(amount), 0) FROM quote_items WHERE quote_id = $1",
    )
    .bind(quote_id)
    .fetch_one(conn)
    .await
    .map_err(|e| AppError::database("Failed to total quote items", e))?;
    Ok(money::round_money(total))
}

/// Whether any line is sourced from `warehouse_code` (case-insensitive).
#[instrument(skip(conn))]
pub async fn has_item_from_warehouse(
    conn: &mut PgConnection,
    quote_id: Uuid,
    warehouse_code: &str,
) -> Result<bool, AppError> {
    sqlx::query_scalar::<_, bool>(
        r#"
        SELECT EXISTS (
            SELECT 1 FROM quote_items
            WHERE quote_id = $1 AND UPPER(warehouse_code) = UPPER($2)
        )
        "#,
    )
    .bind(quote_id)
    .bind(warehouse_code)
    .fetch_one(conn)
    .await
    .map_err(|e| AppError::database("Failed to check item warehouses", e))
}

// -------------------------------------------------------------------------
// Collector history
// -------------------------------------------------------------------------

#[instrument(skip(conn))]
pub async fn insert_collector_history(
    conn: &mut PgConnection,
    quote_id: Uuid,
    from_user_id: Option<Uuid>,
    to_user_id: Uuid,
    changed_by: Uuid,
) -> Result<CollectorHistory, AppError> {
    sqlx::query_as::<_, CollectorHistory>(
        r#"
        INSERT INTO collector_history (history_id, quote_id, from_user_id, to_user_id, changed_by)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING history_id, quote_id, from_user_id, to_user_id, changed_by, changed_utc
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(quote_id)
    .bind(from_user_id)
    .bind(to_user_id)
    .bind(changed_by)
    .fetch_one(conn)
    .await
    .map_err(|e| AppError::database("Failed to record collector history", e))
}

#[instrument(skip(conn))]
pub async fn list_collector_history(
    conn: &mut PgConnection,
    quote_id: Uuid,
) -> Result<Vec<CollectorHistory>, AppError> {
    sqlx::query_as::<_, CollectorHistory>(
        r#"
        SELECT history_id, quote_id, from_user_id, to_user_id, changed_by, changed_utc
        FROM collector_history
        WHERE quote_id = $1
        ORDER BY changed_utc, history_id
        "#,
    )
    .bind(quote_id)
    .fetch_all(conn)
    .await
    .map_err(|e| AppError::database("Failed to list collector history", e))
}
