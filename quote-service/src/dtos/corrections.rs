use crate::models::{CorrectionTarget, CreateCorrection, UpdateCorrection};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCorrectionRequest {
    pub target_type: CorrectionTarget,
    pub target_id: Uuid,
    #[validate(length(min = 1, max = 2000, message = "Correction reason is required"))]
    pub reason: String,
    /// Field overrides applied to the re-issued record.
    #[serde(default)]
    pub changes_json: Value,
    pub occurred_date: Option<NaiveDate>,
}

impl From<CreateCorrectionRequest> for CreateCorrection {
    fn from(req: CreateCorrectionRequest) -> Self {
        Self {
            target_type: req.target_type,
            target_id: req.target_id,
            reason: req.reason,
            changes_json: req.changes_json,
            occurred_date: req.occurred_date,
        }
    }
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateCorrectionRequest {
    #[validate(length(min = 1, max = 2000, message = "Correction reason cannot be empty"))]
    pub reason: Option<String>,
    pub changes_json: Option<Value>,
    pub occurred_date: Option<NaiveDate>,
}

impl From<UpdateCorrectionRequest> for UpdateCorrection {
    fn from(req: UpdateCorrectionRequest) -> Self {
        Self {
            reason: req.reason,
            changes_json: req.changes_json,
            occurred_date: req.occurred_date,
        }
    }
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct SubmitCorrectionRequest {
    #[serde(default)]
    pub attachments: Vec<String>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct RejectCorrectionRequest {
    #[validate(length(max = 2000))]
    pub note: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CorrectionListQuery {
    pub target_type: CorrectionTarget,
    pub target_id: Uuid,
}
