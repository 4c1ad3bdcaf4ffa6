//! Correction workflow: DRAFT → SUBMITTED → EXECUTED | REJECTED.
//!
//! Execution voids the target through its [`CorrectionExecutor`] and clones a successor in the
//! same transaction as the status flip, so a correction is never EXECUTED without a
//! `new_record_id`.

mod executor;
mod expense;
mod freight_bill;
mod payment;
mod quote;

pub use executor::{ensure_change_object, overlay, CorrectionExecutor, ExecutorRegistry};

use crate::middleware::{authorities, ActorContext};
use crate::models::{
    Correction, CorrectionStatus, CorrectionTarget, CreateCorrection, UpdateCorrection, VoidStatus,
};
use crate::services::attachments::{self, AttachmentPoint, AttachmentRuleValidator, AttachmentTarget};
use crate::services::database::corrections::{self as store, NewCorrectionRow};
use crate::services::database::{self, quotes, Database};
use crate::services::metrics::CORRECTIONS_TOTAL;
use crate::services::numbering::{self, DocumentKind};
use chrono::Utc;
use service_core::error::AppError;
use sqlx::PgConnection;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

fn require_reason(reason: &str) -> Result<(), AppError> {
    if reason.trim().is_empty() {
        return Err(AppError::invalid_input("Correction reason is required"));
    }
    Ok(())
}

fn ensure_transition(correction: &Correction, next: CorrectionStatus) -> Result<(), AppError> {
    let current = correction.state();
    if !current.can_transition_to(next) {
        return Err(AppError::invalid_state(format!(
            "Correction {} is {}; cannot move to {}",
            correction.correction_no,
            current.as_str(),
            next.as_str()
        )));
    }
    Ok(())
}

fn target_of(correction: &Correction) -> Result<CorrectionTarget, AppError> {
    correction.target().ok_or_else(|| {
        AppError::InternalError(anyhow::anyhow!(
            "Correction {} has unknown target type '{}'",
            correction.correction_no,
            correction.target_type
        ))
    })
}

fn record(target: CorrectionTarget, outcome: &str) {
    CORRECTIONS_TOTAL
        .with_label_values(&[target.as_str(), outcome])
        .inc();
}

#[derive(Clone)]
pub struct CorrectionEngine {
    db: Database,
    executors: Arc<ExecutorRegistry>,
    attachments: Arc<dyn AttachmentRuleValidator>,
}

impl CorrectionEngine {
    pub fn new(db: Database, attachments: Arc<dyn AttachmentRuleValidator>) -> Self {
        Self {
            db,
            executors: Arc::new(ExecutorRegistry::new()),
            attachments,
        }
    }

    #[instrument(skip(self, actor, input), fields(target_type = input.target_type.as_str(), target_id = %input.target_id))]
    pub async fn create_draft(
        &self,
        actor: &ActorContext,
        input: CreateCorrection,
    ) -> Result<Correction, AppError> {
        require_reason(&input.reason)?;
        let occurred_date = input
            .occurred_date
            .ok_or_else(|| AppError::invalid_input("Correction occurred_date is required"))?;
        ensure_change_object(&input.changes_json)?;

        let mut tx = self.db.begin().await?;
        let executor = self.executors.for_target(input.target_type);
        if !executor.exists(&mut tx, input.target_id).await? {
            return Err(AppError::not_found(format!(
                "{} {} not found",
                input.target_type.as_str(),
                input.target_id
            )));
        }
        if store::has_open_for_target(&mut tx, input.target_type, input.target_id).await? {
            return Err(AppError::conflict(format!(
                "{} {} already has an open correction",
                input.target_type.as_str(),
                input.target_id
            )));
        }

        let correction_no = numbering::generate(
            &mut tx,
            DocumentKind::Correction,
            "",
            Utc::now().date_naive(),
        )
        .await?;
        let row = NewCorrectionRow {
            correction_no,
            target_type: input.target_type,
            target_id: input.target_id,
            reason: input.reason.trim().to_string(),
            changes_json: match input.changes_json {
                serde_json::Value::Null => serde_json::json!({}),
                changes => changes,
            },
            occurred_date,
            created_by: actor.user_id,
        };
        let correction = store::insert_correction(&mut tx, &row).await?;
        database::commit(tx).await?;

        record(input.target_type, CorrectionStatus::Draft.as_str());
        info!(
            correction_id = %correction.correction_id,
            correction_no = %correction.correction_no,
            "Correction drafted"
        );
        Ok(correction)
    }

    /// Edit a DRAFT correction. Only its creator may do so.
    #[instrument(skip(self, actor, changes), fields(user_id = %actor.user_id))]
    pub async fn update_draft(
        &self,
        actor: &ActorContext,
        correction_id: Uuid,
        changes: UpdateCorrection,
    ) -> Result<Correction, AppError> {
        let mut tx = self.db.begin().await?;
        let correction = store::lock_correction(&mut tx, correction_id).await?;

        if correction.state() != CorrectionStatus::Draft {
            return Err(AppError::invalid_state(format!(
                "Correction {} is {}; only drafts can be edited",
                correction.correction_no, correction.status
            )));
        }
        if correction.created_by != actor.user_id {
            return Err(AppError::forbidden(format!(
                "Only the creator can edit correction {}",
                correction.correction_no
            )));
        }

        let reason = changes.reason.unwrap_or(correction.reason);
        require_reason(&reason)?;
        let changes_json = changes.changes_json.unwrap_or(correction.changes_json);
        ensure_change_object(&changes_json)?;
        let occurred_date = changes.occurred_date.unwrap_or(correction.occurred_date);

        let correction = store::update_draft(
            &mut tx,
            correction_id,
            reason.trim(),
            &changes_json,
            occurred_date,
        )
        .await?;
        database::commit(tx).await?;

        info!(correction_id = %correction_id, "Correction draft updated");
        Ok(correction)
    }

    /// DRAFT → SUBMITTED. A quote target is marked VOID_PENDING until the decision.
    #[instrument(skip(self, actor, attachment_urls), fields(user_id = %actor.user_id))]
    pub async fn submit(
        &self,
        actor: &ActorContext,
        correction_id: Uuid,
        attachment_urls: Vec<String>,
    ) -> Result<Correction, AppError> {
        let mut tx = self.db.begin().await?;
        let correction = store::lock_correction(&mut tx, correction_id).await?;

        ensure_transition(&correction, CorrectionStatus::Submitted)?;
        require_reason(&correction.reason)?;
        attachments::require(
            self.attachments.as_ref(),
            AttachmentTarget::Correction,
            AttachmentPoint::Submit,
            &attachment_urls,
        )?;
        let target = target_of(&correction)?;

        let correction = store::mark_submitted(&mut tx, correction_id, &attachment_urls).await?;
        if target == CorrectionTarget::Quote {
            mark_quote_void_state(&mut tx, correction.target_id, VoidStatus::VoidPending).await?;
        }
        database::commit(tx).await?;

        record(target, CorrectionStatus::Submitted.as_str());
        info!(
            correction_id = %correction_id,
            target_type = target.as_str(),
            target_id = %correction.target_id,
            "Correction submitted"
        );
        Ok(correction)
    }

    /// SUBMITTED → EXECUTED: void the target, clone its successor, record the lineage.
    #[instrument(skip(self, actor), fields(user_id = %actor.user_id))]
    pub async fn approve_and_execute(
        &self,
        actor: &ActorContext,
        correction_id: Uuid,
    ) -> Result<Correction, AppError> {
        actor.require(authorities::CORRECTION_APPROVE_EXECUTE)?;

        let mut tx = self.db.begin().await?;
        let correction = store::lock_correction(&mut tx, correction_id).await?;
        ensure_transition(&correction, CorrectionStatus::Executed)?;
        let target = target_of(&correction)?;

        let executor = self.executors.for_target(target);
        let executed: Result<Uuid, AppError> = async {
            executor.void_old(&mut tx, correction.target_id).await?;
            executor
                .create_new(
                    &mut tx,
                    correction.target_id,
                    &correction.changes_json,
                    actor.user_id,
                )
                .await
        }
        .await;

        let new_record_id = match executed {
            Ok(id) => id,
            Err(e) => {
                warn!(
                    correction_id = %correction_id,
                    target_type = target.as_str(),
                    error = %e,
                    "Correction execution failed; nothing applied"
                );
                record(target, "failed");
                return Err(e);
            }
        };

        let correction =
            store::mark_executed(&mut tx, correction_id, new_record_id, actor.user_id).await?;
        database::commit(tx).await?;

        record(target, CorrectionStatus::Executed.as_str());
        info!(
            correction_id = %correction_id,
            target_type = target.as_str(),
            old_record_id = %correction.target_id,
            new_record_id = %new_record_id,
            "Correction executed"
        );
        Ok(correction)
    }

    /// SUBMITTED → REJECTED. A quote target's pending void is lifted.
    #[instrument(skip(self, actor, note), fields(user_id = %actor.user_id))]
    pub async fn reject(
        &self,
        actor: &ActorContext,
        correction_id: Uuid,
        note: Option<String>,
    ) -> Result<Correction, AppError> {
        actor.require(authorities::CORRECTION_APPROVE_EXECUTE)?;

        let mut tx = self.db.begin().await?;
        let correction = store::lock_correction(&mut tx, correction_id).await?;
        ensure_transition(&correction, CorrectionStatus::Rejected)?;
        let target = target_of(&correction)?;

        let correction =
            store::mark_rejected(&mut tx, correction_id, actor.user_id, note.as_deref()).await?;
        if target == CorrectionTarget::Quote {
            mark_quote_void_state(&mut tx, correction.target_id, VoidStatus::None).await?;
        }
        database::commit(tx).await?;

        record(target, CorrectionStatus::Rejected.as_str());
        info!(correction_id = %correction_id, "Correction rejected");
        Ok(correction)
    }

    pub async fn get(&self, correction_id: Uuid) -> Result<Correction, AppError> {
        let mut conn = self.db.acquire().await?;
        store::get_correction(&mut conn, correction_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Correction {} not found", correction_id)))
    }

    pub async fn list_for_target(
        &self,
        target_type: CorrectionTarget,
        target_id: Uuid,
    ) -> Result<Vec<Correction>, AppError> {
        let mut conn = self.db.acquire().await?;
        store::list_for_target(&mut conn, target_type, target_id).await
    }
}

/// Move a quote between NONE and VOID_PENDING. A voided quote is left alone.
async fn mark_quote_void_state(
    conn: &mut PgConnection,
    quote_id: Uuid,
    void_status: VoidStatus,
) -> Result<(), AppError> {
    let quote = quotes::lock_quote(&mut *conn, quote_id).await?;
    if quote.void_state() == VoidStatus::Voided {
        return Err(AppError::invalid_state(format!(
            "Quote {} is already voided",
            quote.quote_no
        )));
    }
    quotes::set_void_status(conn, quote_id, void_status).await
}
