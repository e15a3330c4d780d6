//! Outbound webhook delivery and inbound signature checks
//!
//! A delivery is a single signed JSON POST. There is no retry: the caller
//! records the outcome and moves on.

use crate::db::models::WebhookEvent;
use crate::errors::{AppError, Result};
use crate::metrics;
use async_trait::async_trait;
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;
use std::time::{Duration, Instant};
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

pub const EVENT_HEADER: &str = "X-AutoPress-Event";
pub const DELIVERY_HEADER: &str = "X-AutoPress-Delivery";
pub const TIMESTAMP_HEADER: &str = "X-AutoPress-Timestamp";
pub const SIGNATURE_HEADER: &str = "X-AutoPress-Signature";

/// Where and how to deliver
#[derive(Debug, Clone)]
pub struct DeliveryTarget {
    pub url: String,
    pub secret: Option<String>,
    pub event: WebhookEvent,
}

/// Outcome of a successful delivery
#[derive(Debug, Clone)]
pub struct DeliveryReceipt {
    pub delivery_id: Uuid,
    pub status: u16,
    pub duration_ms: u64,
}

/// Trait for sending webhook payloads
#[async_trait]
pub trait WebhookDispatcher: Send + Sync {
    /// POST the payload once. Non-2xx answers are errors.
    async fn dispatch(&self, target: &DeliveryTarget, payload: &serde_json::Value)
        -> Result<DeliveryReceipt>;
}

/// Hex HMAC-SHA256 over `"{timestamp}.{body}"`
pub fn sign_payload(secret: &str, timestamp: i64, body: &[u8]) -> String {
    let mac = signing_mac(secret, &timestamp.to_string(), body);
    hex::encode(mac.finalize().into_bytes())
}

fn signing_mac(secret: &str, timestamp: &str, body: &[u8]) -> HmacSha256 {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(body);
    mac
}

/// Check a signed inbound request.
///
/// `now` is unix seconds; timestamps further than `tolerance_secs` from it
/// are rejected. The MAC covers the timestamp header exactly as sent.
pub fn verify_signature(
    secret: &str,
    timestamp: &str,
    body: &[u8],
    signature: &str,
    tolerance_secs: i64,
    now: i64,
) -> Result<()> {
    let timestamp = timestamp.trim();
    let ts: i64 = timestamp.parse().map_err(|_| AppError::InvalidSignature {
        message: "timestamp is not a unix time".to_string(),
    })?;

    if (now - ts).abs() > tolerance_secs {
        return Err(AppError::InvalidSignature {
            message: "timestamp outside tolerance".to_string(),
        });
    }

    let expected = hex::decode(signature.trim()).map_err(|_| AppError::InvalidSignature {
        message: "signature is not hex".to_string(),
    })?;

    signing_mac(secret, timestamp, body)
        .verify_slice(&expected).map_err(|_| AppError::InvalidSignature {
        message: "signature mismatch".to_string(),
    })
}

/// reqwest-backed dispatcher
pub struct HttpWebhookClient {
    client: reqwest::Client,
}

impl HttpWebhookClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("autopress/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AppError::Configuration {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self { client })
    }
}

#[async_trait]
impl WebhookDispatcher for HttpWebhookClient {
    async fn dispatch(
        &self,
        target: &DeliveryTarget,
        payload: &serde_json::Value,
    ) -> Result<DeliveryReceipt> {
        let delivery_id = Uuid::new_v4();
        let body = serde_json::to_vec(payload)?;
        let start = Instant::now();

        let mut request = self
            .client
            .post(&target.url)
            .header("Content-Type", "application/json")
            .header(EVENT_HEADER, target.event.as_str())
            .header(DELIVERY_HEADER, delivery_id.to_string());

        if let Some(secret) = target.secret.as_deref().filter(|s| !s.is_empty()) {
            let timestamp = chrono::Utc::now().timestamp();
            request = request
                .header(TIMESTAMP_HEADER, timestamp.to_string())
                .header(SIGNATURE_HEADER, sign_payload(secret, timestamp, &body));
        }

        let result = request.body(body).send().await;
        let elapsed = start.elapsed();

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                metrics::record_webhook_dispatch(target.event.as_str(), false, elapsed.as_secs_f64());
                return Err(AppError::WebhookDelivery {
                    status: None,
                    message: e.to_string(),
                });
            }
        };

        let status = response.status();
        if !status.is_success() {
            metrics::record_webhook_dispatch(target.event.as_str(), false, elapsed.as_secs_f64());
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::WebhookDelivery {
                status: Some(status.as_u16()),
                message: truncate(&body, 500),
            });
        }

        metrics::record_webhook_dispatch(target.event.as_str(), true, elapsed.as_secs_f64());
        tracing::debug!(
            delivery_id = %delivery_id,
            event = %target.event,
            status = status.as_u16(),
            duration_ms = elapsed.as_millis() as u64,
            "Webhook delivered"
        );

        Ok(DeliveryReceipt {
            delivery_id,
            status: status.as_u16(),
            duration_ms: elapsed.as_millis() as u64,
        })
    }
}

/// Serialize any payload type for [`WebhookDispatcher::dispatch`]
pub fn to_payload<T: Serialize>(value: &T) -> Result<serde_json::Value> {
    serde_json::to_value(value).map_err(Into::into)
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &s[..end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, header_exists, method, path};
    use wiremock::{Mock, MockServer, Request, ResponseTemplate};

    fn target(url: String, secret: Option<&str>) -> DeliveryTarget {
        DeliveryTarget {
            url,
            secret: secret.map(String::from),
            event: WebhookEvent::ArticleGenerate,
        }
    }

    #[test]
    fn test_signature_roundtrip() {
        let body = br#"{"article_id":"1"}"#;
        let sig = sign_payload("s3cret", 1_700_000_000, body);
        assert!(verify_signature("s3cret", "1700000000", body, &sig, 300, 1_700_000_100).is_ok());
    }

    #[test]
    fn test_tampered_body_is_rejected() {
        let sig = sign_payload("s3cret", 1_700_000_000, b"{\"a\":1}");
        let err = verify_signature("s3cret", "1700000000", b"{\"a\":2}", &sig, 300, 1_700_000_000)
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidSignature { .. }));
    }

    #[test]
    fn test_stale_timestamp_is_rejected() {
        let body = b"{}";
        let sig = sign_payload("s3cret", 1_700_000_000, body);
        let err = verify_signature("s3cret", "1700000000", body, &sig, 300, 1_700_000_301)
            .unwrap_err();
        assert!(err.to_string().contains("tolerance"));
    }

    #[test]
    fn test_signature_covers_timestamp_as_sent() {
        let body = br#"{"article_id":"1"}"#;
        // Sender signed a zero-padded header that parses to the same instant
        let sig = hex::encode(
            signing_mac("s3cret", "01700000000", body)
                .finalize()
                .into_bytes(),
        );

        assert!(verify_signature("s3cret", "01700000000", body, &sig, 300, 1_700_000_000).is_ok());
        assert!(verify_signature("s3cret", " 01700000000 ", body, &sig, 300, 1_700_000_000).is_ok());
        let err = verify_signature("s3cret", "1700000000", body, &sig, 300, 1_700_000_000)
            .unwrap_err();
        assert!(err.to_string().contains("mismatch"));
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo", 2), "h...");
        assert_eq!(truncate("ok", 10), "ok");
    }

    #[tokio::test]
    async fn test_dispatch_signs_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .and(header(EVENT_HEADER, "article.generate"))
            .and(header_exists(SIGNATURE_HEADER))
            .and(header_exists(TIMESTAMP_HEADER))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let client = HttpWebhookClient::new(Duration::from_secs(5)).unwrap();
        let payload = serde_json::json!({"article_id": "abc"});
        let receipt = client
            .dispatch(&target(format!("{}/hook", server.uri()), Some("s3cret")), &payload)
            .await
            .unwrap();
        assert_eq!(receipt.status, 200);

        let requests: Vec<Request> = server.received_requests().await.unwrap();
        let req = &requests[0];
        let ts = req.headers.get(TIMESTAMP_HEADER).unwrap().to_str().unwrap();
        let sig = req.headers.get(SIGNATURE_HEADER).unwrap().to_str().unwrap();
        let now = chrono::Utc::now().timestamp();
        assert!(verify_signature("s3cret", ts, &req.body, sig, 60, now).is_ok());
    }

    #[tokio::test]
    async fn test_dispatch_without_secret_is_unsigned() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(202))
            .mount(&server)
            .await;

        let client = HttpWebhookClient::new(Duration::from_secs(5)).unwrap();
        client
            .dispatch(&target(server.uri(), None), &serde_json::json!({}))
            .await
            .unwrap();

        let requests = server.received_requests().await.unwrap();
        assert!(requests[0].headers.get(SIGNATURE_HEADER).is_none());
    }

    #[tokio::test]
    async fn test_dispatch_non_success_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("workflow crashed"))
            .mount(&server)
            .await;

        let client = HttpWebhookClient::new(Duration::from_secs(5)).unwrap();
        let err = client
            .dispatch(&target(server.uri(), None), &serde_json::json!({}))
            .await
            .unwrap_err();

        match err {
            AppError::WebhookDelivery { status, message } => {
                assert_eq!(status, Some(500));
                assert_eq!(message, "workflow crashed");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
