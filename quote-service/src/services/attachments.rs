//! Required-attachment policy checked at workflow checkpoints.

use service_core::error::AppError;
use std::collections::HashMap;
use std::fmt;

/// Document kind an attachment rule applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttachmentTarget {
    QuotePayment,
    Correction,
}

impl AttachmentTarget {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttachmentTarget::QuotePayment => "quote_payment",
            AttachmentTarget::Correction => "correction",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "quote_payment" => Some(AttachmentTarget::QuotePayment),
            "correction" => Some(AttachmentTarget::Correction),
            _ => None,
        }
    }
}

/// Workflow step at which the rule is enforced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttachmentPoint {
    Submit,
    FinanceConfirm,
}

impl AttachmentPoint {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttachmentPoint::Submit => "submit",
            AttachmentPoint::FinanceConfirm => "finance_confirm",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "submit" => Some(AttachmentPoint::Submit),
            "finance_confirm" => Some(AttachmentPoint::FinanceConfirm),
            _ => None,
        }
    }
}

impl fmt::Display for AttachmentTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for AttachmentPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validates that the attachments supplied at a checkpoint satisfy policy.
///
/// `Err` carries one human-readable line per unmet requirement.
pub trait AttachmentRuleValidator: Send + Sync {
    fn validate(
        &self,
        target: AttachmentTarget,
        point: AttachmentPoint,
        urls: &[String],
    ) -> Result<(), Vec<String>>;
}

/// Minimum attachment counts per `(target, point)`. Checkpoints without a rule accept anything.
#[derive(Debug, Clone, Default)]
pub struct ConfiguredAttachmentRules {
    minimums: HashMap<(AttachmentTarget, AttachmentPoint), usize>,
}

impl ConfiguredAttachmentRules {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_minimum(mut self, target: AttachmentTarget, point: AttachmentPoint, min: usize) -> Self {
        self.minimums.insert((target, point), min);
        self
    }

    /// Build from `target.point` / minimum pairs such as `("correction.submit", "1")`.
    pub fn from_pairs(pairs: &[(String, String)]) -> Result<Self, AppError> {
        let mut rules = Self::new();
        for (key, value) in pairs {
            let (target, point) = key
                .split_once('.')
                .and_then(|(t, p)| Some((AttachmentTarget::parse(t)?, AttachmentPoint::parse(p)?)))
                .ok_or_else(|| {
                    AppError::ConfigError(anyhow::anyhow!(
                        "Unknown attachment checkpoint '{}'",
                        key
                    ))
                })?;
            let min = value.parse::<usize>().map_err(|e| {
                AppError::ConfigError(anyhow::anyhow!(
                    "Attachment minimum for '{}' must be a count: {}",
                    key,
                    e
                ))
            })?;
            rules = rules.with_minimum(target, point, min);
        }
        Ok(rules)
    }
}

impl AttachmentRuleValidator for ConfiguredAttachmentRules {
    fn validate(
        &self,
        target: AttachmentTarget,
        point: AttachmentPoint,
        urls: &[String],
    ) -> Result<(), Vec<String>> {
        let Some(&min) = self.minimums.get(&(target, point)) else {
            return Ok(());
        };
        let supplied = urls.iter().filter(|u| !u.trim().is_empty()).count();
        if supplied < min {
            return Err(vec![format!(
                "{} {} requires at least {} attachment(s), got {}",
                target, point, min, supplied
            )]);
        }
        Ok(())
    }
}

/// Run a validator and turn unmet requirements into a validation error.
pub fn require(
    validator: &dyn AttachmentRuleValidator,
    target: AttachmentTarget,
    point: AttachmentPoint,
    urls: &[String],
) -> Result<(), AppError> {
    validator
        .validate(target, point, urls)
        .map_err(|missing| AppError::invalid_input(format!("Missing attachments: {}", missing.join("; "))))
}
