//! Correction model for quote-service.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Document types a correction can void and re-create.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrectionTarget {
    Quote,
    Payment,
    Expense,
    FreightBill,
}

impl CorrectionTarget {
    pub const ALL: [CorrectionTarget; 4] = [
        CorrectionTarget::Quote,
        CorrectionTarget::Payment,
        CorrectionTarget::Expense,
        CorrectionTarget::FreightBill,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CorrectionTarget::Quote => "quote",
            CorrectionTarget::Payment => "payment",
            CorrectionTarget::Expense => "expense",
            CorrectionTarget::FreightBill => "freight_bill",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == s)
    }
}

/// Correction workflow status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrectionStatus {
    Draft,
    Submitted,
    Rejected,
    Executed,
}

impl CorrectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CorrectionStatus::Draft => "draft",
            CorrectionStatus::Submitted => "submitted",
            CorrectionStatus::Rejected => "rejected",
            CorrectionStatus::Executed => "executed",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "submitted" => CorrectionStatus::Submitted,
            "rejected" => CorrectionStatus::Rejected,
            "executed" => CorrectionStatus::Executed,
            _ => CorrectionStatus::Draft,
        }
    }

    /// Whether the workflow permits moving from `self` to `next`.
    pub fn can_transition_to(&self, next: CorrectionStatus) -> bool {
        matches!(
            (self, next),
            (CorrectionStatus::Draft, CorrectionStatus::Submitted)
                | (CorrectionStatus::Submitted, CorrectionStatus::Executed)
                | (CorrectionStatus::Submitted, CorrectionStatus::Rejected)
        )
    }

    pub fn is_open(&self) -> bool {
        matches!(self, CorrectionStatus::Draft | CorrectionStatus::Submitted)
    }
}

/// Void-and-clone request linking an old document to its replacement.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Correction {
    pub correction_id: Uuid,
    pub correction_no: String,
    pub target_type: String,
    pub target_id: Uuid,
    pub status: String,
    pub reason: String,
    pub changes_json: serde_json::Value,
    pub occurred_date: NaiveDate,
    pub attachments: serde_json::Value,
    pub new_record_id: Option<Uuid>,
    pub created_by: Uuid,
    pub approved_by: Option<Uuid>,
    pub approved_utc: Option<DateTime<Utc>>,
    pub submitted_utc: Option<DateTime<Utc>>,
    pub rejected_utc: Option<DateTime<Utc>>,
    pub reject_note: Option<String>,
    pub created_utc: DateTime<Utc>,
}

impl Correction {
    pub fn state(&self) -> CorrectionStatus {
        CorrectionStatus::from_string(&self.status)
    }

    pub fn target(&self) -> Option<CorrectionTarget> {
        CorrectionTarget::parse(&self.target_type)
    }
}

/// Input for creating a draft correction.
#[derive(Debug, Clone)]
pub struct CreateCorrection {
    pub target_type: CorrectionTarget,
    pub target_id: Uuid,
    pub reason: String,
    pub changes_json: serde_json::Value,
    pub occurred_date: Option<NaiveDate>,
}

/// Input for editing a draft correction.
#[derive(Debug, Clone, Default)]
pub struct UpdateCorrection {
    pub reason: Option<String>,
    pub changes_json: Option<serde_json::Value>,
    pub occurred_date: Option<NaiveDate>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workflow_only_moves_forward() {
        use CorrectionStatus::*;
        assert!(Draft.can_transition_to(Submitted));
        assert!(Submitted.can_transition_to(Executed));
        assert!(Submitted.can_transition_to(Rejected));

        assert!(!Draft.can_transition_to(Executed));
        assert!(!Draft.can_transition_to(Rejected));
        assert!(!Executed.can_transition_to(Executed));
        assert!(!Executed.can_transition_to(Submitted));
        assert!(!Rejected.can_transition_to(Submitted));
    }

    #[test]
    fn target_names_parse_back() {
        for target in CorrectionTarget::ALL {
            assert_eq!(CorrectionTarget::parse(target.as_str()), Some(target));
        }
        assert_eq!(CorrectionTarget::parse("work_order"), None);
    }
}
