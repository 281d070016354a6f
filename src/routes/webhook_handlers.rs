use axum::{
    debug_handler,
    extract::State,
    http::{HeaderMap, StatusCode},
};
use bytes::Bytes;
use tracing::{error, info, warn};

use crate::{
    config::InternalErrorPolicy,
    error::{AppError, AppResult},
    state::AppState,
    webhook::{WebhookEvent, WebhookHeaders, apply_event},
};

pub const PROCESSED: &str = "Webhook processed successfully";
pub const ACKNOWLEDGED: &str = "Webhook acknowledged";

/// Sync local users from identity-provider events
#[debug_handler]
#[utoipa::path(
    post,
    tag = "webhooks",
    path = "/webhooks/clerk",
    request_body(content = String, content_type = "application/json", description = "Signed identity-provider event"),
    params(
        ("svix-id" = String, Header, description = "Delivery id"),
        ("svix-timestamp" = String, Header, description = "Unix seconds the delivery was signed at"),
        ("svix-signature" = String, Header, description = "Space separated `v1,<base64>` signatures"),
    ),
    responses(
        (status = OK, description = "Processed, or acknowledged without processing", body = String),
        (status = BAD_REQUEST, description = "Missing headers, failed verification or malformed event"),
        (status = INTERNAL_SERVER_ERROR, description = "Persisting the event failed and the provider should retry")
    )
)]
pub async fn clerk_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<(StatusCode, &'static str)> {
    info!("Identity webhook received");

    let Some(delivery) = WebhookHeaders::from_header_map(&headers) else {
        warn!("Webhook rejected: missing svix headers");
        return Err(AppError::bad_request("no svix headers"));
    };

    state.webhook_verifier.verify(&delivery, &body)?;
    info!(delivery_id = %delivery.id, "Webhook verified");

    let event: WebhookEvent = serde_json::from_slice(&body)?;
    let event_type = event.event_type.clone();
    info!(
        event_type = %event_type,
        user_id = event.data_id().unwrap_or_default(),
        "Processing webhook"
    );

    let identity_event = match event.into_identity_event() {
        Ok(identity_event) => identity_event,
        Err(err) => {
            // verified but unexpected shape; a retry would not fix it
            warn!(event_type = %event_type, error = %err, "Webhook data not understood, acknowledging");
            return Ok((StatusCode::OK, ACKNOWLEDGED));
        }
    };

    match apply_event(state.repository.as_ref(), identity_event).await {
        Ok(outcome) => {
            info!(event_type = %event_type, ?outcome, "Webhook processed");
            Ok((StatusCode::OK, PROCESSED))
        }
        Err(err) => match state.on_internal_error {
            InternalErrorPolicy::Retry => Err(AppError::InternalError(
                anyhow::Error::new(err).context("Error processing webhook event"),
            )),
            InternalErrorPolicy::Acknowledge => {
                error!(event_type = %event_type, error = ?err, "Error processing webhook event, acknowledging");
                Ok((StatusCode::OK, ACKNOWLEDGED))
            }
        },
    }
}
