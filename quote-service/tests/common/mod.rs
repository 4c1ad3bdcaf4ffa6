#![allow(dead_code)]

use quote_service::config::{DatabaseConfig, QuoteServiceConfig};
use quote_service::middleware::authorities;
use quote_service::services::{
    ConfiguredAttachmentRules, Database, NotificationRouting, RecordingNotificationSender,
};
use quote_service::startup::Application;
use reqwest::{Client, Response};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

/// A caller as the gateway would present it.
#[derive(Debug, Clone)]
pub struct Actor {
    pub id: Uuid,
    pub code: String,
    pub authorities: Vec<&'static str>,
}

impl Actor {
    pub fn sales() -> Self {
        Self {
            id: Uuid::new_v4(),
            code: "SA".to_string(),
            authorities: vec![],
        }
    }

    pub fn finance() -> Self {
        Self {
            id: Uuid::new_v4(),
            code: "FIN".to_string(),
            authorities: vec![authorities::PAYMENT_FINANCE],
        }
    }

    pub fn approver() -> Self {
        Self {
            id: Uuid::new_v4(),
            code: "MGR".to_string(),
            authorities: vec![
                authorities::QUOTE_APPROVE,
                authorities::CORRECTION_APPROVE_EXECUTE,
            ],
        }
    }
}

#[derive(Clone)]
pub struct TestApp {
    pub address: String,
    pub port: u16,
    pub client: Client,
    pub notifier: Arc<RecordingNotificationSender>,
    pub warehouse_recipient: Uuid,
    pub db: Database,
}

impl TestApp {
    /// Spawn the service against `TEST_DATABASE_URL`. Returns `None` (and the test is skipped)
    /// when no database is configured.
    pub async fn spawn() -> Option<Self> {
        Self::spawn_with_rules(ConfiguredAttachmentRules::new()).await
    }

    pub async fn spawn_with_rules(attachments: ConfiguredAttachmentRules) -> Option<Self> {
        dotenvy::dotenv().ok();
        let Ok(database_url) = std::env::var("TEST_DATABASE_URL") else {
            eprintln!("TEST_DATABASE_URL not set; skipping");
            return None;
        };

        let warehouse_recipient = Uuid::new_v4();
        let config = QuoteServiceConfig {
            common: service_core::config::Config { port: 0 },
            service_name: "quote-service".to_string(),
            service_version: "test".to_string(),
            log_level: "info".to_string(),
            otlp_endpoint: None,
            database: DatabaseConfig {
                url: database_url,
                max_connections: 5,
                min_connections: 1,
            },
            notifications: NotificationRouting {
                hq_warehouse_code: "HQ".to_string(),
                default_recipient: Some(warehouse_recipient),
                recipients_by_business_line: HashMap::new(),
                public_base_url: "http://quotes.test".to_string(),
            },
            attachments,
        };

        let notifier = Arc::new(RecordingNotificationSender::new());
        let app = Application::build_with(config, notifier.clone())
            .await
            .expect("Failed to build test application");
        let port = app.port();
        let db = app.db().clone();
        let address = format!("http://127.0.0.1:{}", port);

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        // Wait for the server by polling the health endpoint
        let client = Client::new();
        let health_url = format!("{}/health", address);
        for _ in 0..50 {
            if client.get(&health_url).send().await.is_ok() {
                break;
            }
            tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
        }

        Some(TestApp {
            address,
            port,
            client,
            notifier,
            warehouse_recipient,
            db,
        })
    }

    fn with_actor(&self, builder: reqwest::RequestBuilder, actor: &Actor) -> reqwest::RequestBuilder {
        builder
            .header("X-User-ID", actor.id.to_string())
            .header("X-User-Code", &actor.code)
            .header("X-User-Authorities", actor.authorities.join(","))
    }

    pub async fn get(&self, path: &str, actor: &Actor) -> Response {
        self.with_actor(self.client.get(format!("{}{}", self.address, path)), actor)
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn post(&self, path: &str, actor: &Actor, body: Value) -> Response {
        self.with_actor(self.client.post(format!("{}{}", self.address, path)), actor)
            .json(&body)
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn put(&self, path: &str, actor: &Actor, body: Value) -> Response {
        self.with_actor(self.client.put(format!("{}{}", self.address, path)), actor)
            .json(&body)
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn delete(&self, path: &str, actor: &Actor) -> Response {
        self.with_actor(self.client.delete(format!("{}{}", self.address, path)), actor)
            .send()
            .await
            .expect("Failed to execute request")
    }

    /// Create a draft quote owned by `sales` with one line per `(unit_price, warehouse)`.
    pub async fn draft_quote(&self, sales: &Actor, customer_id: Uuid, lines: &[(&str, Option<&str>)]) -> Value {
        let response = self
            .post(
                "/quotes",
                sales,
                json!({
                    "customer_id": customer_id,
                    "customer_name": "Acme Mining",
                    "currency": "USD",
                    "machine_model": "EX-200"
                }),
            )
            .await;
        assert_eq!(response.status().as_u16(), 201, "create quote failed");
        let quote: Value = response.json().await.expect("Failed to parse quote");
        let quote_id = quote["quote_id"].as_str().expect("quote_id").to_string();

        for (price, warehouse) in lines {
            let response = self
                .post(
                    &format!("/quotes/{}/items", quote_id),
                    sales,
                    json!({
                        "description": "Hydraulic pump",
                        "quantity": "1",
                        "unit_price": price,
                        "warehouse_code": warehouse
                    }),
                )
                .await;
            assert_eq!(response.status().as_u16(), 201, "add item failed");
        }

        self.get_json(&format!("/quotes/{}", quote_id), sales).await
    }

    /// Create a quote and take it through approval to CONFIRMED.
    pub async fn confirmed_quote(&self, sales: &Actor, customer_id: Uuid, lines: &[(&str, Option<&str>)]) -> Value {
        let quote = self.draft_quote(sales, customer_id, lines).await;
        let quote_id = quote["quote_id"].as_str().expect("quote_id").to_string();

        let response = self
            .post(&format!("/quotes/{}/submit", quote_id), sales, json!({}))
            .await;
        assert!(response.status().is_success(), "submit quote failed");

        let response = self
            .post(&format!("/quotes/{}/approve", quote_id), &Actor::approver(), json!({}))
            .await;
        assert!(response.status().is_success(), "approve quote failed");
        response.json().await.expect("Failed to parse quote")
    }

    pub async fn get_json(&self, path: &str, actor: &Actor) -> Value {
        let response = self.get(path, actor).await;
        assert!(response.status().is_success(), "GET {} failed: {}", path, response.status());
        response.json().await.expect("Failed to parse JSON")
    }

    /// Notifications recorded for one quote number.
    pub fn notifications_for(&self, quote_no: &str) -> Vec<String> {
        self.notifier
            .sent()
            .into_iter()
            .filter(|n| n.title.contains(quote_no))
            .map(|n| n.title)
            .collect()
    }
}

/// Decimal fields serialize as strings; compare them as decimals.
pub fn amount(value: &Value) -> Decimal {
    match value {
        Value::String(s) => dec(s),
        Value::Number(n) => dec(&n.to_string()),
        other => panic!("not an amount: {}", other),
    }
}

pub fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).expect("decimal string")
}
