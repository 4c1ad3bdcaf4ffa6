//! Correction queries.

use crate::models::{Correction, CorrectionStatus, CorrectionTarget};
use crate::services::metrics::DB_QUERY_DURATION;
use chrono::NaiveDate;
use service_core::error::AppError;
use sqlx::PgConnection;
use tracing::instrument;
use uuid::Uuid;

const CORRECTION_COLUMNS: &str = r#"correction_id, correction_no, target_type, target_id, status, reason,
    changes_json, occurred_date, attachments, new_record_id, created_by, approved_by, approved_utc,
    submitted_utc, rejected_utc, reject_note, created_utc"#;

#[derive(Debug, Clone)]
pub struct NewCorrectionRow {
    pub correction_no: String,
    pub target_type: CorrectionTarget,
    pub target_id: Uuid,
    pub reason: String,
    pub changes_json: serde_json::Value,
    pub occurred_date: NaiveDate,
    pub created_by: Uuid,
}

#[instrument(skip(conn, row), fields(correction_no = %row.correction_no))]
pub async fn insert_correction(conn: &mut PgConnection, row: &NewCorrectionRow) -> Result<Correction, AppError> {
    let timer = DB_QUERY_DURATION
        .with_label_values(&["insert_correction"])
        .start_timer();

    let sql = format!(
        r#"
        INSERT INTO corrections (
            correction_id, correction_no, target_type, target_id, reason, changes_json,
            occurred_date, created_by
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING {CORRECTION_COLUMNS}
        "#
    );
    let correction = sqlx::query_as::<_, Correction>(&sql)
        .bind(Uuid::new_v4())
        .bind(&row.correction_no)
        .bind(row.target_type.as_str())
        .bind(row.target_id)
        .bind(&row.reason)
        .bind(&row.changes_json)
        .bind(row.occurred_date)
        .bind(row.created_by)
        .fetch_one(conn)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => AppError::conflict(
                format!("Correction number '{}' already exists", row.correction_no),
            ),
            _ => AppError::database("Failed to create correction", e),
        })?;

    timer.observe_duration();

    Ok(correction)
}

#[instrument(skip(conn))]
pub async fn get_correction(conn: &mut PgConnection, correction_id: Uuid) -> Result<Option<Correction>, AppError> {
    let sql = format!("SELECT {CORRECTION_COLUMNS} FROM corrections WHERE correction_id = $1");
    sqlx::query_as::<_, Correction>(&sql)
        .bind(correction_id)
        .fetch_optional(conn)
        .await
        .map_err(|e| AppError::database("Failed to get correction", e))
}

/// Lock a correction row so concurrent transitions serialize.
#[instrument(skip(conn))]
pub async fn lock_correction(conn: &mut PgConnection, correction_id: Uuid) -> Result<Correction, AppError> {
    let sql = format!("SELECT {CORRECTION_COLUMNS} FROM corrections WHERE correction_id = $1 FOR UPDATE");
    sqlx::query_as::<_, Correction>(&sql)
        .bind(correction_id)
        .fetch_optional(conn)
        .await
        .map_err(|e| AppError::database("Failed to lock correction", e))?
        .ok_or_else(|| AppError::not_found(format!("Correction {} not found", correction_id)))
}

#[instrument(skip(conn))]
pub async fn list_for_target(
    conn: &mut PgConnection,
    target_type: CorrectionTarget,
    target_id: Uuid,
) -> Result<Vec<Correction>, AppError> {
    let sql = format!(
        r#"
        SELECT {CORRECTION_COLUMNS} FROM corrections
        WHERE target_type = $1 AND target_id = $2
        ORDER BY created_utc, correction_id
        "#
    );
    sqlx::query_as::<_, Correction>(&sql)
        .bind(target_type.as_str())
        .bind(target_id)
        .fetch_all(conn)
        .await
        .map_err(|e| AppError::database("Failed to list corrections", e))
}

/// Whether the target already has a DRAFT or SUBMITTED correction.
#[instrument(skip(conn))]
pub async fn has_open_for_target(
    conn: &mut PgConnection,
    target_type: CorrectionTarget,
    target_id: Uuid,
) -> Result<bool, AppError> {
    sqlx::query_scalar::<_, bool>(
        r#"
        SELECT EXISTS (
            SELECT 1 FROM corrections
            WHERE target_type = $1 AND target_id = $2 AND status IN ('draft', 'submitted')
        )
        "#,
    )
    .bind(target_type.as_str())
    .bind(target_id)
    .fetch_one(conn)
    .await
    .map_err(|e| AppError::database("Failed to check open corrections", e))
}

#[instrument(skip(conn, reason, changes_json))]
pub async fn update_draft(
    conn: &mut PgConnection,
    correction_id: Uuid,
    reason: &str,
    changes_json: &serde_json::Value,
    occurred_date: NaiveDate,
) -> Result<Correction, AppError> {
    let sql = format!(
        r#"
        UPDATE corrections
        SET reason = $2, changes_json = $3, occurred_date = $4
        WHERE correction_id = $1 AND status = 'draft'
        RETURNING {CORRECTION_COLUMNS}
        "#
    );
    sqlx::query_as::<_, Correction>(&sql)
        .bind(correction_id)
        .bind(reason)
        .bind(changes_json)
        .bind(occurred_date)
        .fetch_one(conn)
        .await
        .map_err(|e| AppError::database("Failed to update correction", e))
}

#[instrument(skip(conn, attachments))]
pub async fn mark_submitted(
    conn: &mut PgConnection,
    correction_id: Uuid,
    attachments: &[String],
) -> Result<Correction, AppError> {
    let sql = format!(
        r#"
        UPDATE corrections
        SET status = $2, attachments = $3, submitted_utc = NOW()
        WHERE correction_id = $1
        RETURNING {CORRECTION_COLUMNS}
        "#
    );
    sqlx::query_as::<_, Correction>(&sql)
        .bind(correction_id)
        .bind(CorrectionStatus::Submitted.as_str())
        .bind(serde_json::json!(attachments))
        .fetch_one(conn)
        .await
        .map_err(|e| AppError::database("Failed to submit correction", e))
}

/// Flip to EXECUTED together with the successor id.
#[instrument(skip(conn))]
pub async fn mark_executed(
    conn: &mut PgConnection,
    correction_id: Uuid,
    new_record_id: Uuid,
    approved_by: Uuid,
) -> Result<Correction, AppError> {
    let timer = DB_QUERY_DURATION
        .with_label_values(&["mark_correction_executed"])
        .start_timer();

    let sql = format!(
        r#"
        UPDATE corrections
        SET status = $2, new_record_id = $3, approved_by = $4, approved_utc = NOW()
        WHERE correction_id = $1
        RETURNING {CORRECTION_COLUMNS}
        "#
    );
    let correction = sqlx::query_as::<_, Correction>(&sql)
        .bind(correction_id)
        .bind(CorrectionStatus::Executed.as_str())
        .bind(new_record_id)
        .bind(approved_by)
        .fetch_one(conn)
        .await
        .map_err(|e| AppError::database("Failed to mark correction executed", e))?;

    timer.observe_duration();

    Ok(correction)
}

#[instrument(skip(conn, note))]
pub async fn mark_rejected(
    conn: &mut PgConnection,
    correction_id: Uuid,
    rejected_by: Uuid,
    note: Option<&str>,
) -> Result<Correction, AppError> {
    let sql = format!(
        r#"
        UPDATE corrections
        SET status = $2, approved_by = $3, rejected_utc = NOW(), reject_note = $4
        WHERE correction_id = $1
        RETURNING {CORRECTION_COLUMNS}
        "#
    );
    sqlx::query_as::<_, Correction>(&sql)
        .bind(correction_id)
        .bind(CorrectionStatus::Rejected.as_str())
        .bind(rejected_by)
        .bind(note)
        .fetch_one(conn)
        .await
        .map_err(|e| AppError::database("Failed to reject correction", e))
}
