//! Human-readable document numbers: `<prefix><scope><date><zero-padded seq>`.

use crate::services::database::sequences;
use chrono::NaiveDate;
use service_core::error::AppError;
use sqlx::PgConnection;

/// Counter reset period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    Month,
    Day,
}

impl Period {
    fn format(&self) -> &'static str {
        match self {
            Period::Month => "%Y%m",
            Period::Day => "%Y%m%d",
        }
    }

    pub fn key(&self, date: NaiveDate) -> String {
        date.format(self.format()).to_string()
    }
}

/// Document kinds that receive generated numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Quote,
    PaymentBatch,
    Correction,
    CustomerPayment,
    Expense,
    FreightBill,
    Shipment,
}

/// Formatting rule for one document kind.
#[derive(Debug, Clone, Copy)]
pub struct NumberingRule {
    pub prefix: &'static str,
    pub period: Period,
    pub width: usize,
}

impl DocumentKind {
    pub fn rule(&self) -> NumberingRule {
        let (prefix, period, width) = match self {
            DocumentKind::Quote => ("Q", Period::Month, 4),
            DocumentKind::PaymentBatch => ("PB", Period::Month, 4),
            DocumentKind::Correction => ("CR", Period::Day, 3),
            DocumentKind::CustomerPayment => ("PAY", Period::Month, 5),
            DocumentKind::Expense => ("EXP", Period::Month, 5),
            DocumentKind::FreightBill => ("FB", Period::Month, 5),
            DocumentKind::Shipment => ("SH", Period::Month, 5),
        };
        NumberingRule {
            prefix,
            period,
            width,
        }
    }
}

/// Normalise an actor or owner code into a numbering scope.
pub fn normalize_scope(raw: &str) -> Result<String, AppError> {
    let scope = raw.trim().to_ascii_uppercase();
    if scope.len() > 8 || !scope.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(AppError::invalid_input(format!(
            "Numbering scope '{}' must be at most 8 letters or digits",
            raw
        )));
    }
    Ok(scope)
}

/// Render a number. Sequences wider than the padding are printed in full.
pub fn format_number(rule: &NumberingRule, scope: &str, date: NaiveDate, seq: i64) -> String {
    format!(
        "{}{}{}{:0width$}",
        rule.prefix,
        scope,
        rule.period.key(date),
        seq,
        width = rule.width
    )
}

/// Generate the next number for `kind` within `(scope, period of date)`.
///
/// Runs inside the caller's transaction: a rollback also gives the counter value back.
pub async fn generate(
    conn: &mut PgConnection,
    kind: DocumentKind,
    scope: &str,
    date: NaiveDate,
) -> Result<String, AppError> {
    let rule = kind.rule();
    let scope = normalize_scope(scope)?;
    let scope_key = format!("{}:{}", rule.prefix, scope);
    let seq = sequences::next_value(conn, &scope_key, &rule.period.key(date)).await?;
    Ok(format_number(&rule, &scope, date, seq))
}
