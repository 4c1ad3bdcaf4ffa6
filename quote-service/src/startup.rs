//! Application startup and lifecycle management.

use crate::config::QuoteServiceConfig;
use crate::handlers::{self, corrections, documents, payments, quotes};
use crate::services::{
    AttachmentRuleValidator, CorrectionEngine, Database, DocumentService,
    LoggingNotificationSender, NotificationSender, PaymentLedger, QuoteService, StatusProjector,
};
use axum::middleware::from_fn;
use axum::{
    routing::{get, post, put},
    Router,
};
use service_core::error::AppError;
use service_core::middleware::{metrics::metrics_middleware, tracing::request_id_middleware};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub service_name: String,
    pub service_version: String,
    pub quotes: QuoteService,
    pub ledger: PaymentLedger,
    pub corrections: CorrectionEngine,
    pub documents: DocumentService,
}

impl AppState {
    /// Wire the engines over one pool. Every engine shares the same projector and sender.
    pub fn new(
        db: Database,
        config: &QuoteServiceConfig,
        notifier: Arc<dyn NotificationSender>,
    ) -> Self {
        let projector = StatusProjector::new(config.notifications.clone());
        let attachments: Arc<dyn AttachmentRuleValidator> = Arc::new(config.attachments.clone());

        Self {
            quotes: QuoteService::new(db.clone(), projector.clone(), notifier.clone()),
            ledger: PaymentLedger::new(db.clone(), projector, attachments.clone(), notifier),
            corrections: CorrectionEngine::new(db.clone(), attachments),
            documents: DocumentService::new(db.clone()),
            service_name: config.service_name.clone(),
            service_version: config.service_version.clone(),
            db,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/metrics", get(handlers::metrics))
        // Quotes
        .route("/quotes", post(quotes::create_quote))
        .route("/quotes/:id", get(quotes::get_quote))
        .route(
            "/quotes/:id/items",
            get(quotes::list_items).post(quotes::add_item),
        )
        .route(
            "/quotes/:id/items/:item_id",
            put(quotes::update_item).delete(quotes::remove_item),
        )
        .route("/quotes/:id/submit", post(quotes::submit_quote))
        .route("/quotes/:id/approve", post(quotes::approve_quote))
        .route("/quotes/:id/return", post(quotes::return_quote))
        .route("/quotes/:id/cancel", post(quotes::cancel_quote))
        .route("/quotes/:id/downstream", post(quotes::link_downstream))
        .route("/quotes/:id/collector", put(quotes::change_collector))
        .route(
            "/quotes/:id/collector-history",
            get(quotes::collector_history),
        )
        .route(
            "/quotes/:id/payments",
            get(quotes::list_payments).post(quotes::submit_payment),
        )
        .route("/quotes/:id/credits", get(quotes::list_credits))
        // Quote payments
        .route("/payments/batch", post(payments::create_batch_payment))
        .route("/payments/:id", get(payments::get_payment))
        .route(
            "/payments/:id/finance-confirm",
            post(payments::finance_confirm),
        )
        // Corrections
        .route(
            "/corrections",
            get(corrections::list_corrections).post(corrections::create_correction),
        )
        .route(
            "/corrections/:id",
            get(corrections::get_correction).put(corrections::update_correction),
        )
        .route(
            "/corrections/:id/submit",
            post(corrections::submit_correction),
        )
        .route(
            "/corrections/:id/approve-execute",
            post(corrections::approve_and_execute),
        )
        .route(
            "/corrections/:id/reject",
            post(corrections::reject_correction),
        )
        // Correctable documents
        .route(
            "/customer-payments",
            post(documents::create_customer_payment),
        )
        .route(
            "/customer-payments/:id",
            get(documents::get_customer_payment),
        )
        .route(
            "/customer-payments/:id/statement",
            post(documents::bind_statement),
        )
        .route("/expenses", post(documents::create_expense))
        .route("/expenses/:id", get(documents::get_expense))
        .route("/expenses/:id/void", post(documents::void_expense))
        .route(
            "/expenses/:id/claim",
            post(documents::attach_expense_to_claim),
        )
        .route("/shipments", post(documents::create_shipment))
        .route("/shipments/:id", get(documents::get_shipment))
        .route("/freight-bills", post(documents::create_freight_bill))
        .route("/freight-bills/:id", get(documents::get_freight_bill))
        .layer(from_fn(metrics_middleware))
        .layer(from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    user_id = tracing::field::Empty,
                )
            }),
        )
        .with_state(state)
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    state: AppState,
}

impl Application {
    /// Build the application with the logging notification sender.
    pub async fn build(config: QuoteServiceConfig) -> Result<Self, AppError> {
        Self::build_with(config, Arc::new(LoggingNotificationSender)).await
    }

    /// Build the application with a caller-supplied notification sender.
    pub async fn build_with(
        config: QuoteServiceConfig,
        notifier: Arc<dyn NotificationSender>,
    ) -> Result<Self, AppError> {
        let db = Database::new(
            &config.database.url,
            config.database.max_connections,
            config.database.min_connections,
        )
        .await
        .map_err(|e| {
            tracing::error!("Failed to connect to PostgreSQL: {}", e);
            e
        })?;

        db.run_migrations().await.map_err(|e| {
            tracing::error!("Failed to run database migrations: {}", e);
            e
        })?;

        let state = AppState::new(db, &config, notifier);

        // Port 0 binds a random port for testing
        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind HTTP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!(
            service = %config.service_name,
            version = %config.service_version,
            "Quote service listening on port {}",
            port
        );

        Ok(Self {
            port,
            listener,
            state,
        })
    }

    /// Get the port the server is listening on.
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn db(&self) -> &Database {
        &self.state.db
    }

    pub fn state(&self) -> AppState {
        self.state.clone()
    }

    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        axum::serve(self.listener, router(self.state)).await
    }

    /// Serve until `signal` resolves, then drain in-flight requests.
    pub async fn run_with_shutdown<F>(self, signal: F) -> std::io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        axum::serve(self.listener, router(self.state))
            .with_graceful_shutdown(signal)
            .await
    }
}
