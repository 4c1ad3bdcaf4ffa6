//! Payment ledger: single submissions, finance decisions, batch allocation and collector
//! reassignment.
//!
//! Every operation locks the affected quote rows first and runs in one transaction. The rules
//! themselves are pure functions over locked quote snapshots so they can be tested without a
//! database.

use crate::middleware::{authorities, ActorContext};
use crate::models::{
    CollectorHistory, ConfirmPayment, CreateBatchPayment, FinanceDecision, PaymentStatus, Quote,
    QuoteCredit, QuotePayment, QuotePaymentStatus, QuoteStatus, SubmitPayment, VoidStatus,
};
use crate::services::attachments::{self, AttachmentPoint, AttachmentRuleValidator, AttachmentTarget};
use crate::services::database::payments::{self, NewPaymentRow};
use crate::services::database::{self, quotes, Database};
use crate::services::metrics::{BATCH_PAYMENTS_TOTAL, FINANCE_DECISIONS_TOTAL, PAYMENTS_SUBMITTED_TOTAL};
use crate::services::money;
use crate::services::notifications::{self, NotificationSender};
use crate::services::numbering::{self, DocumentKind};
use crate::services::projector::{QuoteEvent, StatusProjector};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use service_core::error::AppError;
use sqlx::PgConnection;
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Business rules a payment operation can break.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaymentRuleViolation {
    #[error("Quote {quote_no} is not confirmed (status: {status})")]
    QuoteNotConfirmed { quote_no: String, status: &'static str },

    #[error("Quote {0} has a pending void and accepts no payments")]
    VoidPending(String),

    #[error("Quote {0} is cancelled; its payments are frozen")]
    QuoteCancelled(String),

    #[error("Quote {0} is already fully paid")]
    AlreadyPaid(String),

    #[error("Payment amount must be greater than zero")]
    NonPositiveAmount,

    #[error("Only the collector of quote {0} or finance may record payments")]
    NotCollector(String),

    #[error("Payment amount {amount} exceeds unpaid balance {unpaid}")]
    ExceedsUnpaid { amount: Decimal, unpaid: Decimal },

    #[error("Payment {payment_id} is {status}, only submitted payments can be decided")]
    PaymentNotSubmitted { payment_id: Uuid, status: &'static str },

    #[error("Batch must reference at least one quote")]
    EmptyBatch,

    #[error("Quote {0} appears more than once in the batch")]
    DuplicateQuote(Uuid),

    #[error("Customer mismatch: quote {quote_no} belongs to a different customer than quote {reference_no}")]
    CustomerMismatch { quote_no: String, reference_no: String },

    #[error("Currency mismatch: quote {quote_no} is in {found}, batch currency is {expected}")]
    CurrencyMismatch { quote_no: String, found: String, expected: String },

    #[error("Collector mismatch: quote {quote_no} is not collected by the acting user")]
    CollectorMismatch { quote_no: String },

    #[error("Quote {0} has no unpaid balance")]
    NothingToPay(String),

    #[error("Batch total {actual} does not match expected total {expected}")]
    BatchTotalMismatch { actual: Decimal, expected: Decimal },

    #[error("Collector of fully paid quote {0} can no longer change")]
    CollectorFrozen(String),
}

impl From<PaymentRuleViolation> for AppError {
    fn from(violation: PaymentRuleViolation) -> Self {
        use PaymentRuleViolation::*;
        match violation {
            QuoteNotConfirmed { .. }
            | VoidPending(_)
            | QuoteCancelled(_)
            | AlreadyPaid(_)
            | PaymentNotSubmitted { .. }
            | CollectorFrozen(_) => AppError::invalid_state(violation),
            NotCollector(_) => AppError::forbidden(violation),
            NonPositiveAmount
            | ExceedsUnpaid { .. }
            | EmptyBatch
            | DuplicateQuote(_)
            | CustomerMismatch { .. }
            | CurrencyMismatch { .. }
            | CollectorMismatch { .. }
            | NothingToPay(_)
            | BatchTotalMismatch { .. } => AppError::invalid_input(violation),
        }
    }
}

// -------------------------------------------------------------------------
// Rules
// -------------------------------------------------------------------------

/// How a single submission will be recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionPlan {
    /// Awaiting a finance decision.
    Submitted { amount: Decimal },
    /// Finance overpayment: confirmed immediately at the unpaid balance, the rest kept as credit.
    AutoConfirmed { amount: Decimal, excess: Decimal },
}

fn ensure_payable(quote: &Quote) -> Result<(), PaymentRuleViolation> {
    let status = quote.lifecycle();
    if status != QuoteStatus::Confirmed {
        return Err(PaymentRuleViolation::QuoteNotConfirmed {
            quote_no: quote.quote_no.clone(),
            status: status.as_str(),
        });
    }
    if quote.void_state() != VoidStatus::None {
        return Err(PaymentRuleViolation::VoidPending(quote.quote_no.clone()));
    }
    Ok(())
}

/// Decide how a payment of `amount` by `submitter` against a locked quote is recorded.
pub fn plan_submission(
    quote: &Quote,
    amount: Decimal,
    submitter: Uuid,
    is_finance: bool,
) -> Result<SubmissionPlan, PaymentRuleViolation> {
    ensure_payable(quote)?;

    let amount = money::round_money(amount);
    if amount <= Decimal::ZERO {
        return Err(PaymentRuleViolation::NonPositiveAmount);
    }

    let unpaid = money::unpaid_balance(quote.total_amount, quote.paid_amount);
    if unpaid <= Decimal::ZERO {
        return Err(PaymentRuleViolation::AlreadyPaid(quote.quote_no.clone()));
    }

    if !is_finance && quote.collector_id != submitter {
        return Err(PaymentRuleViolation::NotCollector(quote.quote_no.clone()));
    }

    if amount > unpaid {
        if !is_finance {
            return Err(PaymentRuleViolation::ExceedsUnpaid { amount, unpaid });
        }
        return Ok(SubmissionPlan::AutoConfirmed {
            amount: unpaid,
            excess: money::round_money(amount - unpaid),
        });
    }

    Ok(SubmissionPlan::Submitted { amount })
}

/// Check that a finance decision may be taken on `payment`.
pub fn check_finance_decision(quote: &Quote, payment: &QuotePayment) -> Result<(), PaymentRuleViolation> {
    let status = payment.state();
    if status != QuotePaymentStatus::Submitted {
        return Err(PaymentRuleViolation::PaymentNotSubmitted {
            payment_id: payment.payment_id,
            status: status.as_str(),
        });
    }
    if quote.lifecycle() == QuoteStatus::Cancelled {
        return Err(PaymentRuleViolation::QuoteCancelled(quote.quote_no.clone()));
    }
    Ok(())
}

/// Request-shape checks that need no database.
pub fn validate_batch_request(
    quote_ids: &[Uuid],
    total_payment_amount: Decimal,
) -> Result<(), PaymentRuleViolation> {
    if quote_ids.is_empty() {
        return Err(PaymentRuleViolation::EmptyBatch);
    }
    let mut seen = HashSet::with_capacity(quote_ids.len());
    for id in quote_ids {
        if !seen.insert(*id) {
            return Err(PaymentRuleViolation::DuplicateQuote(*id));
        }
    }
    if money::round_money(total_payment_amount) <= Decimal::ZERO {
        return Err(PaymentRuleViolation::NonPositiveAmount);
    }
    Ok(())
}

/// One row of a batch allocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchAllocation {
    pub quote_id: Uuid,
    pub amount: Decimal,
}

/// Allocate `total_payment_amount` over `quotes` (in request order), paying each its exact
/// unpaid balance.
pub fn plan_batch(
    quotes: &[Quote],
    total_payment_amount: Decimal,
    collector_id: Uuid,
) -> Result<Vec<BatchAllocation>, PaymentRuleViolation> {
    let Some(reference) = quotes.first() else {
        return Err(PaymentRuleViolation::EmptyBatch);
    };

    for quote in quotes {
        ensure_payable(quote)?;
    }

    for quote in quotes {
        if quote.customer_id != reference.customer_id {
            return Err(PaymentRuleViolation::CustomerMismatch {
                quote_no: quote.quote_no.clone(),
                reference_no: reference.quote_no.clone(),
            });
        }
        if quote.currency != reference.currency {
            return Err(PaymentRuleViolation::CurrencyMismatch {
                quote_no: quote.quote_no.clone(),
                found: quote.currency.clone(),
                expected: reference.currency.clone(),
            });
        }
        if quote.collector_id != collector_id {
            return Err(PaymentRuleViolation::CollectorMismatch {
                quote_no: quote.quote_no.clone(),
            });
        }
    }

    let mut allocations = Vec::with_capacity(quotes.len());
    for quote in quotes {
        let unpaid = money::unpaid_balance(quote.total_amount, quote.paid_amount);
        if unpaid <= Decimal::ZERO {
            return Err(PaymentRuleViolation::NothingToPay(quote.quote_no.clone()));
        }
        allocations.push(BatchAllocation {
            quote_id: quote.quote_id,
            amount: unpaid,
        });
    }

    let expected = money::sum_money(allocations.iter().map(|a| a.amount));
    let actual = money::round_money(total_payment_amount);
    if actual != expected {
        return Err(PaymentRuleViolation::BatchTotalMismatch { actual, expected });
    }

    Ok(allocations)
}

/// Whether reassigning the collector changes anything. Errors when attribution is frozen.
pub fn plan_collector_change(quote: &Quote, new_collector_id: Uuid) -> Result<bool, PaymentRuleViolation> {
    if quote.lifecycle() == QuoteStatus::Cancelled {
        return Err(PaymentRuleViolation::QuoteCancelled(quote.quote_no.clone()));
    }
    if quote.payment_state() == PaymentStatus::Paid {
        return Err(PaymentRuleViolation::CollectorFrozen(quote.quote_no.clone()));
    }
    Ok(quote.collector_id != new_collector_id)
}

// -------------------------------------------------------------------------
// Service
// -------------------------------------------------------------------------

/// Result of a single submission.
#[derive(Debug, Serialize)]
pub struct SubmissionOutcome {
    pub payment: QuotePayment,
    pub credit: Option<QuoteCredit>,
    pub quote: Quote,
}

/// Result of a finance decision.
#[derive(Debug, Serialize)]
pub struct DecisionOutcome {
    pub payment: QuotePayment,
    pub quote: Quote,
}

/// Result of a batch allocation.
#[derive(Debug, Serialize)]
pub struct BatchOutcome {
    pub payment_batch_no: String,
    pub total_amount: Decimal,
    pub payments: Vec<QuotePayment>,
}

#[derive(Clone)]
pub struct PaymentLedger {
    db: Database,
    projector: StatusProjector,
    attachments: Arc<dyn AttachmentRuleValidator>,
    notifier: Arc<dyn NotificationSender>,
}

/// Lock a quote and refresh its paid amount from the payment rows.
async fn lock_with_balance(conn: &mut PgConnection, quote_id: Uuid) -> Result<Quote, AppError> {
    let mut quote = quotes::lock_quote(&mut *conn, quote_id).await?;
    refresh_balance(conn, &mut quote).await?;
    Ok(quote)
}

async fn refresh_balance(conn: &mut PgConnection, quote: &mut Quote) -> Result<(), AppError> {
    quote.paid_amount = payments::confirmed_total(conn, quote.quote_id).await?;
    quote.payment_status = PaymentStatus::project(quote.paid_amount, quote.total_amount)
        .as_str()
        .to_string();
    Ok(())
}

impl PaymentLedger {
    pub fn new(
        db: Database,
        projector: StatusProjector,
        attachments: Arc<dyn AttachmentRuleValidator>,
        notifier: Arc<dyn NotificationSender>,
    ) -> Self {
        Self {
            db,
            projector,
            attachments,
            notifier,
        }
    }

    /// Record a payment against a confirmed quote.
    #[instrument(skip(self, actor, input), fields(quote_id = %input.quote_id, user_id = %actor.user_id))]
    pub async fn submit(
        &self,
        actor: &ActorContext,
        input: SubmitPayment,
    ) -> Result<SubmissionOutcome, AppError> {
        let mut tx = self.db.begin().await?;
        let quote = lock_with_balance(&mut tx, input.quote_id).await?;

        let plan = plan_submission(&quote, input.amount, actor.user_id, actor.is_finance())
            .inspect_err(|violation| {
                warn!(quote_id = %quote.quote_id, %violation, "Payment submission rejected");
            })?;

        let mut row = NewPaymentRow {
            quote_id: quote.quote_id,
            amount: Decimal::ZERO,
            currency: quote.currency.clone(),
            payment_method_id: input.payment_method_id,
            payment_time: input.payment_time,
            submitted_by: actor.user_id,
            status: QuotePaymentStatus::Submitted,
            confirmer_id: None,
            payment_batch_no: None,
            note: input.note,
            remark: None,
        };

        let outcome = match plan {
            SubmissionPlan::Submitted { amount } => {
                row.amount = amount;
                let payment = payments::insert_payment(&mut tx, &row).await?;
                database::commit(tx).await?;

                PAYMENTS_SUBMITTED_TOTAL.with_label_values(&["submitted"]).inc();
                info!(
                    payment_id = %payment.payment_id,
                    quote_id = %quote.quote_id,
                    amount = %payment.amount,
                    "Payment submitted"
                );

                SubmissionOutcome {
                    payment,
                    credit: None,
                    quote,
                }
            }
            SubmissionPlan::AutoConfirmed { amount, excess } => {
                let requested = money::round_money(input.amount);
                row.amount = amount;
                row.status = QuotePaymentStatus::Confirmed;
                row.confirmer_id = Some(actor.user_id);
                row.remark = Some(format!(
                    "Finance overpayment of {requested}: {amount} applied to quote {}, excess {excess} kept as balance credit",
                    quote.quote_no
                ));
                let payment = payments::insert_payment(&mut tx, &row).await?;

                let credit = payments::insert_credit(
                    &mut tx,
                    quote.quote_id,
                    payment.payment_id,
                    quote.customer_id,
                    excess,
                    &quote.currency,
                    &format!("Excess balance from quote {} overpayment", quote.quote_no),
                    actor.user_id,
                )
                .await?;

                let projection = self
                    .projector
                    .apply(&mut tx, quote.quote_id, QuoteEvent::PaymentsChanged)
                    .await?;
                database::commit(tx).await?;

                PAYMENTS_SUBMITTED_TOTAL
                    .with_label_values(&["auto_confirmed"])
                    .inc();
                info!(
                    payment_id = %payment.payment_id,
                    quote_id = %quote.quote_id,
                    amount = %payment.amount,
                    excess = %excess,
                    "Finance overpayment confirmed with balance credit"
                );

                notifications::dispatch(self.notifier.as_ref(), projection.notifications).await;

                SubmissionOutcome {
                    payment,
                    credit: Some(credit),
                    quote: projection.quote,
                }
            }
        };

        Ok(outcome)
    }

    /// Confirm or reject a submitted payment.
    #[instrument(skip(self, actor, input), fields(payment_id = %input.payment_id, user_id = %actor.user_id))]
    pub async fn finance_confirm(
        &self,
        actor: &ActorContext,
        input: ConfirmPayment,
    ) -> Result<DecisionOutcome, AppError> {
        actor.require(authorities::PAYMENT_FINANCE)?;

        let mut tx = self.db.begin().await?;
        let quote_id = payments::quote_id_of(&mut tx, input.payment_id).await?;
        let quote = lock_with_balance(&mut tx, quote_id).await?;
        let payment = payments::lock_payment(&mut tx, input.payment_id).await?;

        check_finance_decision(&quote, &payment)?;
        if input.decision == FinanceDecision::Confirm {
            attachments::require(
                self.attachments.as_ref(),
                AttachmentTarget::QuotePayment,
                AttachmentPoint::FinanceConfirm,
                &input.attachments,
            )?;
        }

        let status = input.decision.resulting_status();
        let payment = payments::apply_decision(
            &mut tx,
            payment.payment_id,
            status,
            actor.user_id,
            input.note.as_deref(),
            &input.attachments,
        )
        .await?;

        let (quote, pending) = match input.decision {
            FinanceDecision::Confirm => {
                let projection = self
                    .projector
                    .apply(&mut tx, quote_id, QuoteEvent::PaymentsChanged)
                    .await?;
                (projection.quote, projection.notifications)
            }
            FinanceDecision::Reject => (quote, Vec::new()),
        };

        database::commit(tx).await?;

        FINANCE_DECISIONS_TOTAL
            .with_label_values(&[status.as_str()])
            .inc();
        info!(
            payment_id = %payment.payment_id,
            quote_id = %quote_id,
            decision = status.as_str(),
            paid_amount = %quote.paid_amount,
            payment_status = %quote.payment_status,
            "Finance decision recorded"
        );

        notifications::dispatch(self.notifier.as_ref(), pending).await;

        Ok(DecisionOutcome { payment, quote })
    }

    /// Allocate one receipt over several quotes, each paid to its exact unpaid balance.
    #[instrument(skip(self, actor, input), fields(quotes = input.quote_ids.len(), user_id = %actor.user_id))]
    pub async fn create_batch_payment(
        &self,
        actor: &ActorContext,
        input: CreateBatchPayment,
    ) -> Result<BatchOutcome, AppError> {
        validate_batch_request(&input.quote_ids, input.total_payment_amount)?;

        let mut tx = self.db.begin().await?;
        let mut locked = quotes::lock_quotes(&mut tx, &input.quote_ids).await?;
        for quote in locked.iter_mut() {
            refresh_balance(&mut tx, quote).await?;
        }

        let mut ordered = Vec::with_capacity(input.quote_ids.len());
        for id in &input.quote_ids {
            let position = locked
                .iter()
                .position(|q| q.quote_id == *id)
                .ok_or_else(|| AppError::not_found(format!("Quote {} not found", id)))?;
            ordered.push(locked.swap_remove(position));
        }

        let allocations = plan_batch(&ordered, input.total_payment_amount, actor.user_id)
            .inspect_err(|violation| {
                BATCH_PAYMENTS_TOTAL.with_label_values(&["rejected"]).inc();
                warn!(%violation, "Batch payment rejected");
            })?;

        let batch_no = numbering::generate(
            &mut tx,
            DocumentKind::PaymentBatch,
            &actor.user_code,
            Utc::now().date_naive(),
        )
        .await?;

        let mut created = Vec::with_capacity(allocations.len());
        for (allocation, quote) in allocations.iter().zip(&ordered) {
            let row = NewPaymentRow {
                quote_id: allocation.quote_id,
                amount: allocation.amount,
                currency: quote.currency.clone(),
                payment_method_id: input.payment_method_id,
                payment_time: input.payment_time,
                submitted_by: actor.user_id,
                status: QuotePaymentStatus::Submitted,
                confirmer_id: None,
                payment_batch_no: Some(batch_no.clone()),
                note: input.note.clone(),
                remark: None,
            };
            created.push(payments::insert_payment(&mut tx, &row).await?);
        }

        database::commit(tx).await?;

        let total_amount = money::sum_money(created.iter().map(|p| p.amount));
        BATCH_PAYMENTS_TOTAL.with_label_values(&["created"]).inc();
        info!(
            payment_batch_no = %batch_no,
            payments = created.len(),
            total_amount = %total_amount,
            "Batch payment created"
        );

        Ok(BatchOutcome {
            payment_batch_no: batch_no,
            total_amount,
            payments: created,
        })
    }

    /// Reassign who collects a quote. A same-value change is a no-op.
    #[instrument(skip(self, actor), fields(user_id = %actor.user_id))]
    pub async fn change_collector(
        &self,
        actor: &ActorContext,
        quote_id: Uuid,
        new_collector_id: Uuid,
    ) -> Result<Quote, AppError> {
        let mut tx = self.db.begin().await?;
        let quote = lock_with_balance(&mut tx, quote_id).await?;

        if !plan_collector_change(&quote, new_collector_id)? {
            info!(quote_id = %quote_id, "Collector unchanged");
            return Ok(quote);
        }

        let updated = quotes::set_collector(&mut tx, quote_id, new_collector_id).await?;
        quotes::insert_collector_history(
            &mut tx,
            quote_id,
            Some(quote.collector_id),
            new_collector_id,
            actor.user_id,
        )
        .await?;
        database::commit(tx).await?;

        info!(
            quote_id = %quote_id,
            from_user_id = %quote.collector_id,
            to_user_id = %new_collector_id,
            "Collector changed"
        );

        Ok(updated)
    }

    pub async fn get_payment(&self, payment_id: Uuid) -> Result<QuotePayment, AppError> {
        let mut conn = self.db.acquire().await?;
        payments::get_payment(&mut conn, payment_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Payment {} not found", payment_id)))
    }

    pub async fn list_payments(&self, quote_id: Uuid) -> Result<Vec<QuotePayment>, AppError> {
        let mut conn = self.db.acquire().await?;
        payments::list_for_quote(&mut conn, quote_id).await
    }

    pub async fn list_credits(&self, quote_id: Uuid) -> Result<Vec<QuoteCredit>, AppError> {
        let mut conn = self.db.acquire().await?;
        payments::list_credits(&mut conn, quote_id).await
    }

    pub async fn collector_history(&self, quote_id: Uuid) -> Result<Vec<CollectorHistory>, AppError> {
        let mut conn = self.db.acquire().await?;
        quotes::list_collector_history(&mut conn, quote_id).await
    }
}
