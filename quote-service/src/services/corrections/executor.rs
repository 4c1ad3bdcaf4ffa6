//! Per-document strategies behind the correction workflow.

use super::{expense::ExpenseExecutor, freight_bill::FreightBillExecutor};
use super::{payment::CustomerPaymentExecutor, quote::QuoteExecutor};
use crate::models::CorrectionTarget;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use service_core::error::AppError;
use sqlx::PgConnection;
use uuid::Uuid;

/// Void-and-clone strategy for one correctable document type.
///
/// Both calls run inside the correction's transaction; an error from either rolls back the
/// whole execution.
#[async_trait]
pub trait CorrectionExecutor: Send + Sync {
    fn target(&self) -> CorrectionTarget;

    async fn exists(&self, conn: &mut PgConnection, id: Uuid) -> Result<bool, AppError>;

    /// Mark the old record unusable without deleting it.
    async fn void_old(&self, conn: &mut PgConnection, old_id: Uuid) -> Result<(), AppError>;

    /// Clone the old record into a fresh one in its initial state, overlay `changes`, and
    /// return the new id.
    async fn create_new(
        &self,
        conn: &mut PgConnection,
        old_id: Uuid,
        changes: &Value,
        created_by: Uuid,
    ) -> Result<Uuid, AppError>;
}

/// The fixed set of executors, one per target type.
#[derive(Debug, Clone, Default)]
pub struct ExecutorRegistry {
    quote: QuoteExecutor,
    payment: CustomerPaymentExecutor,
    expense: ExpenseExecutor,
    freight_bill: FreightBillExecutor,
}

impl ExecutorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_target(&self, target: CorrectionTarget) -> &dyn CorrectionExecutor {
        match target {
            CorrectionTarget::Quote => &self.quote,
            CorrectionTarget::Payment => &self.payment,
            CorrectionTarget::Expense => &self.expense,
            CorrectionTarget::FreightBill => &self.freight_bill,
        }
    }
}

/// Check that a change set is a JSON object (null counts as no changes).
pub fn ensure_change_object(changes: &Value) -> Result<(), AppError> {
    match changes {
        Value::Object(_) | Value::Null => Ok(()),
        _ => Err(AppError::invalid_input("changes_json must be a JSON object")),
    }
}

/// Override top-level fields of `base` with those present in `changes`.
///
/// Keys that `base` does not have are rejected, as are values of the wrong shape.
pub fn overlay<T>(base: &T, changes: &Value, target: CorrectionTarget) -> Result<T, AppError>
where
    T: Serialize + DeserializeOwned,
{
    let mut merged = serde_json::to_value(base)
        .map_err(|e| AppError::InternalError(anyhow::anyhow!("Failed to snapshot {}: {}", target.as_str(), e)))?;

    let no_changes = serde_json::Map::new();
    let patch = match changes {
        Value::Null => &no_changes,
        Value::Object(patch) => patch,
        _ => return Err(AppError::invalid_input("changes_json must be a JSON object")),
    };

    let Value::Object(fields) = &mut merged else {
        return Err(AppError::InternalError(anyhow::anyhow!(
            "{} snapshot is not an object",
            target.as_str()
        )));
    };
    for (key, value) in patch {
        if !fields.contains_key(key) {
            return Err(AppError::invalid_input(format!(
                "Field '{}' cannot be changed on a {} correction",
                key,
                target.as_str()
            )));
        }
        fields.insert(key.clone(), value.clone());
    }

    serde_json::from_value(merged).map_err(|e| {
        AppError::invalid_input(format!("Invalid {} changes: {}", target.as_str(), e))
    })
}
