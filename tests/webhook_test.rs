//! End-to-end tests for the identity webhook: signed deliveries through the
//! real router into an in-memory repository.

mod common;

use std::sync::atomic::Ordering;

use anyhow::Result;
use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use chrono::Utc;
use serde_json::json;
use social_scheduler::{
    config::InternalErrorPolicy,
    models::SubscriptionStatus,
    routes::{ACKNOWLEDGED, PROCESSED},
    webhook::WebhookVerifier,
};

use common::{SECRET, TestApp, deleted_event, signed_request, user_event};

#[tokio::test]
async fn user_created_is_idempotent() -> Result<()> {
    let app = TestApp::new();
    let event = user_event("user.created", "user_1", Some("alice@example.org"));

    let (status, body) = app.deliver("msg_1", &event).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, PROCESSED);

    // provider redelivers the same message
    let (status, _) = app.deliver("msg_1", &event).await?;
    assert_eq!(status, StatusCode::OK);

    assert_eq!(app.repository.user_count(), 1);
    let user = app.repository.user("user_1").unwrap();
    assert_eq!(user.email, "alice@example.org");
    assert_eq!(user.subscription_status, Some(SubscriptionStatus::Free));
    assert!(!user.onboarding_completed);
    Ok(())
}

#[tokio::test]
async fn user_created_without_primary_email_is_acknowledged() -> Result<()> {
    let app = TestApp::new();
    let event = user_event("user.created", "user_1", None);

    let (status, _) = app.deliver("msg_1", &event).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.repository.user_count(), 0);
    assert_eq!(app.repository.writes(), 0);
    Ok(())
}

#[tokio::test]
async fn user_updated_changes_email() -> Result<()> {
    let app = TestApp::new();
    app.repository.seed("user_1", "old@example.org");
    let before = app.repository.user("user_1").unwrap().updated_at;

    let event = user_event("user.updated", "user_1", Some("new@example.org"));
    let (status, _) = app.deliver("msg_2", &event).await?;

    assert_eq!(status, StatusCode::OK);
    let user = app.repository.user("user_1").unwrap();
    assert_eq!(user.email, "new@example.org");
    assert!(user.updated_at >= before);
    Ok(())
}

#[tokio::test]
async fn user_updated_without_primary_email_keeps_email() -> Result<()> {
    let app = TestApp::new();
    app.repository.seed("user_1", "kept@example.org");

    let event = user_event("user.updated", "user_1", None);
    let (status, body) = app.deliver("msg_2", &event).await?;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, PROCESSED);
    assert_eq!(app.repository.user("user_1").unwrap().email, "kept@example.org");
    Ok(())
}

#[tokio::test]
async fn user_updated_reads_subscription_status_from_metadata() -> Result<()> {
    let app = TestApp::new();
    app.repository.seed("user_1", "a@example.org");

    let mut event = user_event("user.updated", "user_1", Some("a@example.org"));
    event["data"]["public_metadata"] = json!({"subscription_status": "premium"});
    let (status, _) = app.deliver("msg_3", &event).await?;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        app.repository.user("user_1").unwrap().subscription_status,
        Some(SubscriptionStatus::Premium)
    );
    Ok(())
}

#[tokio::test]
async fn user_updated_for_unknown_user_is_tolerated() -> Result<()> {
    let app = TestApp::new();
    let event = user_event("user.updated", "user_missing", Some("a@example.org"));

    let (status, _) = app.deliver("msg_4", &event).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.repository.user_count(), 0);
    Ok(())
}

#[tokio::test]
async fn user_deleted_twice_is_a_noop() -> Result<()> {
    let app = TestApp::new();
    app.repository.seed("user_1", "a@example.org");
    app.repository.seed("user_2", "b@example.org");

    let (status, _) = app.deliver("msg_5", &deleted_event(Some("user_1"))).await?;
    assert_eq!(status, StatusCode::OK);
    assert!(app.repository.user("user_1").is_none());

    let (status, _) = app.deliver("msg_6", &deleted_event(Some("user_1"))).await?;
    assert_eq!(status, StatusCode::OK);
    assert!(app.repository.user("user_2").is_some());
    Ok(())
}

#[tokio::test]
async fn user_deleted_without_id_is_acknowledged() -> Result<()> {
    let app = TestApp::new();
    app.repository.seed("user_1", "a@example.org");

    let (status, _) = app.deliver("msg_7", &deleted_event(None)).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.repository.user_count(), 1);
    assert_eq!(app.repository.writes(), 0);
    Ok(())
}

#[tokio::test]
async fn unknown_event_type_touches_nothing() -> Result<()> {
    let app = TestApp::new();
    let event = json!({
        "type": "session.created",
        "object": "event",
        "data": {"id": "sess_1", "user_id": "user_1"}
    });

    let (status, body) = app.deliver("msg_8", &event).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, PROCESSED);
    assert_eq!(app.repository.writes(), 0);
    Ok(())
}

#[tokio::test]
async fn malformed_user_data_is_acknowledged() -> Result<()> {
    let app = TestApp::new();
    let event = json!({"type": "user.created", "object": "event", "data": {"email_addresses": []}});

    let (status, body) = app.deliver("msg_9", &event).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, ACKNOWLEDGED);
    assert_eq!(app.repository.writes(), 0);
    Ok(())
}

#[tokio::test]
async fn missing_headers_rejected() -> Result<()> {
    let app = TestApp::new();
    let event = user_event("user.created", "user_1", Some("a@example.org"));

    for header in ["svix-id", "svix-timestamp", "svix-signature"] {
        let mut request = signed_request("msg_10", &event)?;
        request.headers_mut().remove(header);

        let (status, body) = app.send(request).await?;
        assert_eq!(status, StatusCode::BAD_REQUEST, "without {header}");
        assert!(body.contains("no svix headers"));
    }
    assert_eq!(app.repository.writes(), 0);
    Ok(())
}

#[tokio::test]
async fn invalid_signature_rejected() -> Result<()> {
    let app = TestApp::new();
    let event = user_event("user.created", "user_1", Some("a@example.org"));

    let mut request = signed_request("msg_11", &event)?;
    request.headers_mut().insert(
        "svix-signature",
        "v1,g0hM9SsE+OTPJTGt/tmIKtSyZlE3uFJELVlNIOLJ1OE=".parse()?,
    );

    let (status, body) = app.send(request).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("webhook verification failed"));
    assert_eq!(app.repository.writes(), 0);
    Ok(())
}

#[tokio::test]
async fn stale_delivery_rejected() -> Result<()> {
    let app = TestApp::new();
    let payload = serde_json::to_vec(&user_event("user.created", "user_1", Some("a@example.org")))?;
    let timestamp = Utc::now().timestamp() - 3600;
    let signature = WebhookVerifier::new(SECRET, 300)?.sign("msg_12", timestamp, &payload)?;

    let request = Request::builder()
        .method("POST")
        .uri("/api/webhooks/clerk")
        .header("svix-id", "msg_12")
        .header("svix-timestamp", timestamp.to_string())
        .header("svix-signature", signature)
        .body(Body::from(payload))?;

    let (status, _) = app.send(request).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(app.repository.user_count(), 0);
    Ok(())
}

#[tokio::test]
async fn out_of_range_timestamps_rejected() -> Result<()> {
    let app = TestApp::new();
    let payload = serde_json::to_vec(&user_event("user.created", "user_1", Some("a@example.org")))?;
    let verifier = WebhookVerifier::new(SECRET, 300)?;

    for timestamp in [i64::MIN, i64::MAX] {
        let request = Request::builder()
            .method("POST")
            .uri("/api/webhooks/clerk")
            .header("svix-id", "msg_15")
            .header("svix-timestamp", timestamp.to_string())
            .header("svix-signature", verifier.sign("msg_15", timestamp, &payload)?)
            .body(Body::from(payload.clone()))?;

        let (status, body) = app.send(request).await?;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.contains("webhook verification failed"));
    }
    assert_eq!(app.repository.writes(), 0);
    Ok(())
}

#[tokio::test]
async fn database_failure_requests_retry_by_default() -> Result<()> {
    let app = TestApp::new();
    app.repository.fail_writes.store(true, Ordering::SeqCst);

    let event = user_event("user.created", "user_1", Some("a@example.org"));
    let (status, _) = app.deliver("msg_13", &event).await?;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    Ok(())
}

#[tokio::test]
async fn database_failure_acknowledged_when_configured() -> Result<()> {
    let app = TestApp::with_policy(InternalErrorPolicy::Acknowledge);
    app.repository.fail_writes.store(true, Ordering::SeqCst);

    let event = user_event("user.created", "user_1", Some("a@example.org"));
    let (status, body) = app.deliver("msg_14", &event).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, ACKNOWLEDGED);
    Ok(())
}
