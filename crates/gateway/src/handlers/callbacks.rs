//! Inbound n8n callbacks
//!
//! Authenticated by HMAC signature instead of a bearer token. When no
//! callback secret is configured, callbacks are accepted unsigned.

use axum::{body::Bytes, extract::State, http::HeaderMap, Json};

use crate::AppState;
use autopress_common::{
    db::models::Article,
    errors::{AppError, Result},
    webhooks::{verify_signature, SIGNATURE_HEADER, TIMESTAMP_HEADER},
    workflow::N8nCallback,
};

pub async fn n8n_callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Article>> {
    match state.config.n8n.callback_secret.as_deref().filter(|s| !s.is_empty()) {
        Some(secret) => {
            let timestamp = header_value(&headers, TIMESTAMP_HEADER)?;
            let signature = header_value(&headers, SIGNATURE_HEADER)?;
            let signature = signature.strip_prefix("sha256=").unwrap_or(signature);

            verify_signature(
                secret,
                timestamp,
                &body,
                signature,
                state.config.n8n.signature_tolerance_secs,
                chrono::Utc::now().timestamp(),
            )
            .inspect_err(|e| tracing::warn!(error = %e, "Rejected n8n callback"))?;
        }
        None => tracing::debug!("No callback secret configured, skipping signature check"),
    }

    let callback: N8nCallback = serde_json::from_slice(&body).map_err(|e| AppError::InvalidFormat {
        message: format!("invalid callback body: {}", e),
    })?;

    let article = state.workflow.handle_callback(callback).await?;

    Ok(Json(article))
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Result<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::InvalidSignature {
            message: format!("missing {} header", name),
        })
}
