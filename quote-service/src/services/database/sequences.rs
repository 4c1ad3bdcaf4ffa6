//! Durable per-scope counters behind document numbering.

use crate::services::metrics::DB_QUERY_DURATION;
use service_core::error::AppError;
use sqlx::PgConnection;
use tracing::instrument;

/// Atomically take the next value for `(scope_key, period)`.
///
/// The upsert holds the counter row lock until the caller's transaction ends, so callers of the
/// same tuple serialize while other tuples proceed. A fresh tuple starts at 1.
#[instrument(skip(conn))]
pub async fn next_value(
    conn: &mut PgConnection,
    scope_key: &str,
    period: &str,
) -> Result<i64, AppError> {
    let timer = DB_QUERY_DURATION
        .with_label_values(&["next_sequence_value"])
        .start_timer();

    let seq = sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO sequence_counters (scope_key, period, seq)
        VALUES ($1, $2, 1)
        ON CONFLICT (scope_key, period)
        DO UPDATE SET seq = sequence_counters.seq + 1, updated_utc = NOW()
        RETURNING seq
        "#,
    )
    .bind(scope_key)
    .bind(period)
    .fetch_one(conn)
    .await
    .map_err(|e| AppError::database("Failed to advance sequence", e))?;

    timer.observe_duration();

    Ok(seq)
}
