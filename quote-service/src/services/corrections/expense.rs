use super::executor::{overlay, CorrectionExecutor};
use crate::models::{CorrectionTarget, ExpenseStatus};
use crate::services::database::documents::{self as docs, NewExpenseRow};
use crate::services::money;
use crate::services::numbering::{self, DocumentKind};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use service_core::error::AppError;
use sqlx::PgConnection;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct ExpenseFields {
    category: String,
    description: Option<String>,
    amount: Decimal,
    currency: String,
    incurred_date: NaiveDate,
}

/// Voids a draft expense and re-issues it without its claim link.
///
/// The void is an approved administrative action, so the creator-only rule of an ordinary
/// void does not apply; the DRAFT requirement does.
#[derive(Debug, Clone, Default)]
pub struct ExpenseExecutor;

#[async_trait]
impl CorrectionExecutor for ExpenseExecutor {
    fn target(&self) -> CorrectionTarget {
        CorrectionTarget::Expense
    }

    async fn exists(&self, conn: &mut PgConnection, id: Uuid) -> Result<bool, AppError> {
        Ok(docs::get_expense(conn, id).await?.is_some())
    }

    async fn void_old(&self, conn: &mut PgConnection, old_id: Uuid) -> Result<(), AppError> {
        let expense = docs::lock_expense(&mut *conn, old_id).await?;
        if expense.status != ExpenseStatus::Draft.as_str() {
            return Err(AppError::invalid_state(format!(
                "Expense {} is {}; only draft expenses can be voided",
                expense.expense_no, expense.status
            )));
        }
        docs::void_expense(conn, old_id).await?;
        info!(expense_id = %old_id, "Expense voided by correction");
        Ok(())
    }

    async fn create_new(
        &self,
        conn: &mut PgConnection,
        old_id: Uuid,
        changes: &Value,
        created_by: Uuid,
    ) -> Result<Uuid, AppError> {
        let old = docs::get_expense(&mut *conn, old_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Expense {} not found", old_id)))?;

        let snapshot = ExpenseFields {
            category: old.category.clone(),
            description: old.description.clone(),
            amount: old.amount,
            currency: old.currency.clone(),
            incurred_date: old.incurred_date,
        };
        let fields = overlay(&snapshot, changes, self.target())?;
        if fields.category.trim().is_empty() {
            return Err(AppError::invalid_input("Expense category is required"));
        }
        if money::round_money(fields.amount) <= Decimal::ZERO {
            return Err(AppError::invalid_input("Expense amount must be greater than zero"));
        }

        let expense_no = numbering::generate(
            &mut *conn,
            DocumentKind::Expense,
            "",
            Utc::now().date_naive(),
        )
        .await?;
        let row = NewExpenseRow {
            expense_no,
            category: fields.category,
            description: fields.description,
            amount: fields.amount,
            currency: fields.currency.to_ascii_uppercase(),
            incurred_date: fields.incurred_date,
            parent_expense_id: Some(old_id),
            created_by,
        };
        let expense = docs::insert_expense(conn, &row).await?;

        info!(
            old_expense_id = %old_id,
            expense_id = %expense.expense_id,
            expense_no = %expense.expense_no,
            "Expense re-issued by correction"
        );
        Ok(expense.expense_id)
    }
}
