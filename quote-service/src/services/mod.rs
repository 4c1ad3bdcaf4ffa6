pub mod attachments;
pub mod corrections;
pub mod database;
pub mod documents;
pub mod ledger;
pub mod metrics;
pub mod money;
pub mod notifications;
pub mod numbering;
pub mod projector;
pub mod quotes;

pub use attachments::{AttachmentRuleValidator, ConfiguredAttachmentRules};
pub use corrections::CorrectionEngine;
pub use database::Database;
pub use documents::DocumentService;
pub use ledger::PaymentLedger;
pub use metrics::{get_metrics, init_metrics, record_error};
pub use notifications::{
    LoggingNotificationSender, NotificationRouting, NotificationSender,
    RecordingNotificationSender,
};
pub use projector::StatusProjector;
pub use quotes::QuoteService;
