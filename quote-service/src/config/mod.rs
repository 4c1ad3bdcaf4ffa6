use crate::services::attachments::ConfiguredAttachmentRules;
use crate::services::notifications::NotificationRouting;
use service_core::config::{self as core_config, env_or, env_parse, parse_pairs};
use service_core::error::AppError;
use std::collections::HashMap;
use std::env;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct QuoteServiceConfig {
    pub common: core_config::Config,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub database: DatabaseConfig,
    pub notifications: NotificationRouting,
    pub attachments: ConfiguredAttachmentRules,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

impl QuoteServiceConfig {
    pub fn from_env() -> Result<Self, AppError> {
        // Handles .env and the APP__ prefix
        let common = core_config::Config::load()?;

        let url = env::var("DATABASE_URL")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| AppError::ConfigError(anyhow::anyhow!("DATABASE_URL is required but not set")))?;
        let database = DatabaseConfig {
            url,
            max_connections: env_parse("DATABASE_MAX_CONNECTIONS")?.unwrap_or(10),
            min_connections: env_parse("DATABASE_MIN_CONNECTIONS")?.unwrap_or(2),
        };
        if database.min_connections > database.max_connections {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "DATABASE_MIN_CONNECTIONS ({}) exceeds DATABASE_MAX_CONNECTIONS ({})",
                database.min_connections,
                database.max_connections
            )));
        }

        let notifications = NotificationRouting {
            hq_warehouse_code: env_or("HQ_WAREHOUSE_CODE", "HQ"),
            default_recipient: env_parse::<Uuid>("WAREHOUSE_DEFAULT_RECIPIENT")?,
            recipients_by_business_line: parse_recipients(&env_or("WAREHOUSE_RECIPIENTS", ""))?,
            public_base_url: env_or("PUBLIC_BASE_URL", "http://localhost:8080"),
        };

        let attachments = ConfiguredAttachmentRules::from_pairs(&parse_pairs(
            "ATTACHMENT_RULES",
            &env_or("ATTACHMENT_RULES", ""),
        )?)?;

        Ok(Self {
            common,
            service_name: env_or("SERVICE_NAME", "quote-service"),
            service_version: env_or("SERVICE_VERSION", env!("CARGO_PKG_VERSION")),
            log_level: env_or("LOG_LEVEL", "info"),
            otlp_endpoint: env::var("OTLP_ENDPOINT").ok().filter(|v| !v.trim().is_empty()),
            database,
            notifications,
            attachments,
        })
    }
}

/// Parse `WAREHOUSE_RECIPIENTS` (`<business line id>=<user id>,...`).
pub fn parse_recipients(raw: &str) -> Result<HashMap<Uuid, Uuid>, AppError> {
    parse_pairs("WAREHOUSE_RECIPIENTS", raw)?
        .into_iter()
        .map(|(line, user)| {
            let parse = |value: &str| {
                Uuid::parse_str(value).map_err(|e| {
                    AppError::ConfigError(anyhow::anyhow!(
                        "WAREHOUSE_RECIPIENTS value '{}' is not a uuid: {}",
                        value,
                        e
                    ))
                })
            };
            Ok((parse(&line)?, parse(&user)?))
        })
        .collect()
}
