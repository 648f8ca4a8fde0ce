//! Webhook endpoint handler.
//!
//! Verifies the delivery signature, parses the payload and hands the event to
//! the bot before returning 202 Accepted.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::AppState;
use crate::webhooks::{ParseError, SignatureError, parse_webhook};

/// Header name for GitHub event type.
const HEADER_EVENT: &str = "x-github-event";
/// Header name for GitHub delivery ID.
const HEADER_DELIVERY: &str = "x-github-delivery";
/// Header name for GitHub signature.
const HEADER_SIGNATURE: &str = "x-hub-signature-256";

/// Errors that can occur when processing a webhook.
#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("missing required header: {0}")]
    MissingHeader(&'static str),

    #[error("missing signature")]
    MissingSignature,

    #[error("invalid signature: {0}")]
    InvalidSignature(#[from] SignatureError),

    #[error("invalid payload: {0}")]
    InvalidPayload(#[from] ParseError),
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let status = match &self {
            WebhookError::MissingSignature | WebhookError::InvalidSignature(_) => StatusCode::UNAUTHORIZED,
            WebhookError::MissingHeader(_) | WebhookError::InvalidPayload(_) => StatusCode::BAD_REQUEST,
        };
        (status, self.to_string()).into_response()
    }
}

/// Handles `POST /webhook`.
///
/// Unsigned or mis-signed deliveries are rejected with 401 before the body is
/// looked at. Events the bot doesn't act on are acknowledged with 202 and
/// dropped.
pub async fn webhook_handler(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, &'static str), WebhookError> {
    let delivery_id = get_header(&headers, HEADER_DELIVERY).unwrap_or("unknown");

    let signature = get_header(&headers, HEADER_SIGNATURE).ok_or(WebhookError::MissingSignature)?;
    if let Err(e) = app_state.webhook_secret().verify(&body, signature) {
        warn!(delivery_id = %delivery_id, error = %e, "Rejected webhook signature");
        return Err(e.into());
    }

    let event_type = get_header(&headers, HEADER_EVENT).ok_or(WebhookError::MissingHeader(HEADER_EVENT))?;

    let event = match parse_webhook(event_type, &body) {
        Ok(Some(event)) => event,
        Ok(None) => {
            debug!(delivery_id = %delivery_id, event_type = %event_type, "Ignoring webhook");
            return Ok((StatusCode::ACCEPTED, "Ignored"));
        }
        Err(e) => {
            warn!(delivery_id = %delivery_id, event_type = %event_type, error = %e, "Malformed webhook");
            return Err(e.into());
        }
    };

    info!(
        delivery_id = %delivery_id,
        event_type = %event_type,
        repo = %event.repo_id(),
        "Webhook accepted"
    );
    app_state.sink().dispatch(event);

    Ok((StatusCode::ACCEPTED, "Accepted"))
}

fn get_header<'a>(headers: &'a HeaderMap, name: &'static str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}
