//! Acting user extracted from gateway headers.
//!
//! The gateway authenticates the caller and forwards `X-User-ID`, `X-User-Code` (short code
//! used in document numbers) and `X-User-Authorities` (comma separated).

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use service_core::error::AppError;
use std::collections::HashSet;
use uuid::Uuid;

pub const USER_ID_HEADER: &str = "X-User-ID";
pub const USER_CODE_HEADER: &str = "X-User-Code";
pub const USER_AUTHORITIES_HEADER: &str = "X-User-Authorities";

/// Authority keys checked by this service.
pub mod authorities {
    /// Finance role: confirm or reject payments, overpay with an excess credit.
    pub const PAYMENT_FINANCE: &str = "quote.payment:finance";
    /// Approve and execute (or reject) corrections.
    pub const CORRECTION_APPROVE_EXECUTE: &str = "correction:approve_execute";
    /// Approve quotes awaiting approval.
    pub const QUOTE_APPROVE: &str = "quote:approve";
}

#[derive(Debug, Clone)]
pub struct ActorContext {
    pub user_id: Uuid,
    pub user_code: String,
    authorities: HashSet<String>,
}

impl ActorContext {
    pub fn new<I, S>(user_id: Uuid, user_code: impl Into<String>, authorities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            user_id,
            user_code: user_code.into(),
            authorities: authorities.into_iter().map(Into::into).collect(),
        }
    }

    pub fn has_authority(&self, key: &str) -> bool {
        self.authorities.contains(key)
    }

    pub fn is_finance(&self) -> bool {
        self.has_authority(authorities::PAYMENT_FINANCE)
    }

    /// Fail with `Forbidden` unless the actor holds `key`.
    pub fn require(&self, key: &str) -> Result<(), AppError> {
        if self.has_authority(key) {
            Ok(())
        } else {
            Err(AppError::forbidden(format!("Missing authority '{}'", key)))
        }
    }
}

fn header<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

#[async_trait]
impl<S> FromRequestParts<S> for ActorContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = header(parts, USER_ID_HEADER)
            .ok_or_else(|| {
                AppError::Unauthorized(anyhow::anyhow!("Missing {} header", USER_ID_HEADER))
            })?
            .parse::<Uuid>()
            .map_err(|_| {
                AppError::Unauthorized(anyhow::anyhow!("{} must be a UUID", USER_ID_HEADER))
            })?;

        let user_code = header(parts, USER_CODE_HEADER).unwrap_or_default().to_string();

        let authorities: Vec<String> = header(parts, USER_AUTHORITIES_HEADER)
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|a| !a.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        tracing::Span::current().record("user_id", tracing::field::display(user_id));

        Ok(ActorContext::new(user_id, user_code, authorities))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(builder: axum::http::request::Builder) -> Result<ActorContext, AppError> {
        let (mut parts, _) = builder.body(()).unwrap().into_parts();
        ActorContext::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn reads_user_code_and_authorities() {
        let id = Uuid::new_v4();
        let actor = extract(
            Request::builder()
                .header(USER_ID_HEADER, id.to_string())
                .header(USER_CODE_HEADER, "JD")
                .header(USER_AUTHORITIES_HEADER, "quote:approve, quote.payment:finance,"),
        )
        .await
        .unwrap();

        assert_eq!(actor.user_id, id);
        assert_eq!(actor.user_code, "JD");
        assert!(actor.is_finance());
        assert!(actor.has_authority(authorities::QUOTE_APPROVE));
        assert!(!actor.has_authority(authorities::CORRECTION_APPROVE_EXECUTE));
    }

    #[tokio::test]
    async fn missing_or_malformed_user_is_unauthorized() {
        let err = extract(Request::builder()).await.unwrap_err();
        assert_eq!(err.code(), "UNAUTHORIZED");

        let err = extract(Request::builder().header(USER_ID_HEADER, "nope"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "UNAUTHORIZED");
    }

    #[test]
    fn require_maps_to_forbidden() {
        let actor = ActorContext::new(Uuid::new_v4(), "", Vec::<String>::new());
        let err = actor.require(authorities::CORRECTION_APPROVE_EXECUTE).unwrap_err();
        assert_eq!(err.code(), "FORBIDDEN");
    }
}
