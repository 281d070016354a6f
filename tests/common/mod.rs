#![allow(dead_code)]

use std::{
    collections::BTreeMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};

use anyhow::Result;
use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use chrono::Utc;
use serde_json::{Value, json};
use social_scheduler::{
    auth::{SessionClaims, issue_session_token},
    config::{AuthConfig, InternalErrorPolicy, SessionAlgorithm, WebhookConfig},
    models::{ConnectedAccountSummary, UpcomingPost, User},
    repository::{NewUser, Repository, UserUpdate},
    routes::build_router,
    state::AppState,
    webhook::WebhookVerifier,
};
use tower::ServiceExt;

pub const SECRET: &str = "whsec_MfKQ9r8GKYqrTwjUPD8ILPZIo2LaLaSw";
pub const SESSION_PRIVATE_KEY: &str = include_str!("../fixtures/session_es256_private.pem");
pub const SESSION_PUBLIC_KEY: &str = include_str!("../fixtures/session_es256_public.pem");

/// Repository double backed by a map, counting every write attempt
#[derive(Default)]
pub struct MemoryRepository {
    pub users: Mutex<BTreeMap<String, User>>,
    pub writes: AtomicUsize,
    pub fail_writes: AtomicBool,
}

impl MemoryRepository {
    pub fn user(&self, id: &str) -> Option<User> {
        self.users.lock().unwrap().get(id).cloned()
    }

    pub fn user_count(&self) -> usize {
        self.users.lock().unwrap().len()
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn seed(&self, id: &str, email: &str) {
        let now = Utc::now();
        self.users.lock().unwrap().insert(
            id.to_string(),
            User {
                clerk_user_id: id.to_string(),
                email: email.to_string(),
                subscription_status: None,
                onboarding_completed: false,
                created_at: now,
                updated_at: now,
            },
        );
    }

    fn begin_write(&self) -> Result<(), sqlx::Error> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(sqlx::Error::PoolTimedOut);
        }
        Ok(())
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn health_check(&self) -> bool {
        !self.fail_writes.load(Ordering::SeqCst)
    }

    async fn migrate(&self) -> Result<()> {
        Ok(())
    }

    async fn insert_user_if_absent(&self, user: &NewUser) -> Result<bool, sqlx::Error> {
        self.begin_write()?;
        let mut users = self.users.lock().unwrap();
        let conflict = users.contains_key(&user.clerk_user_id)
            || users.values().any(|u| u.email == user.email);
        if conflict {
            return Ok(false);
        }
        let now = Utc::now();
        users.insert(
            user.clerk_user_id.clone(),
            User {
                clerk_user_id: user.clerk_user_id.clone(),
                email: user.email.clone(),
                subscription_status: Some(user.subscription_status),
                onboarding_completed: user.onboarding_completed,
                created_at: now,
                updated_at: now,
            },
        );
        Ok(true)
    }

    async fn update_user(
        &self,
        clerk_user_id: &str,
        update: &UserUpdate,
    ) -> Result<bool, sqlx::Error> {
        self.begin_write()?;
        let mut users = self.users.lock().unwrap();
        let Some(user) = users.get_mut(clerk_user_id) else {
            return Ok(false);
        };
        if let Some(email) = &update.email {
            user.email = email.clone();
        }
        if let Some(status) = update.subscription_status {
            user.subscription_status = Some(status);
        }
        user.updated_at = Utc::now();
        Ok(true)
    }

    async fn delete_user(&self, clerk_user_id: &str) -> Result<bool, sqlx::Error> {
        self.begin_write()?;
        Ok(self.users.lock().unwrap().remove(clerk_user_id).is_some())
    }

    async fn find_user(&self, clerk_user_id: &str) -> Result<Option<User>, sqlx::Error> {
        Ok(self.user(clerk_user_id))
    }

    async fn connected_accounts(
        &self,
        _clerk_user_id: &str,
    ) -> Result<Vec<ConnectedAccountSummary>, sqlx::Error> {
        Ok(Vec::new())
    }

    async fn upcoming_posts(
        &self,
        _clerk_user_id: &str,
        _limit: i64,
    ) -> Result<Vec<UpcomingPost>, sqlx::Error> {
        Ok(Vec::new())
    }
}

pub struct TestApp {
    pub router: Router,
    pub repository: Arc<MemoryRepository>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_policy(InternalErrorPolicy::Retry)
    }

    pub fn with_policy(policy: InternalErrorPolicy) -> Self {
        let webhook = WebhookConfig {
            signing_secret: SECRET.to_string(),
            on_internal_error: policy,
            tolerance_seconds: 300,
        };
        let auth = AuthConfig {
            public_key: SESSION_PUBLIC_KEY.to_string(),
            algorithm: SessionAlgorithm::ES256,
            ..AuthConfig::default()
        };
        Self::build(webhook, auth)
    }

    pub fn build(webhook: WebhookConfig, auth: AuthConfig) -> Self {
        let repository = Arc::new(MemoryRepository::default());
        let state = AppState::new(repository.clone(), &webhook, &auth).unwrap();
        Self {
            router: build_router(state),
            repository,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Result<(StatusCode, String)> {
        let response = self.router.clone().oneshot(request).await?;
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
        Ok((status, String::from_utf8(body.to_vec())?))
    }

    pub async fn deliver(&self, msg_id: &str, event: &Value) -> Result<(StatusCode, String)> {
        self.send(signed_request(msg_id, event)?).await
    }
}

pub fn signed_request(msg_id: &str, event: &Value) -> Result<Request<Body>> {
    let payload = serde_json::to_vec(event)?;
    let timestamp = Utc::now().timestamp();
    let signature = WebhookVerifier::new(SECRET, 300)?.sign(msg_id, timestamp, &payload)?;

    Ok(Request::builder()
        .method("POST")
        .uri("/api/webhooks/clerk")
        .header("content-type", "application/json")
        .header("svix-id", msg_id)
        .header("svix-timestamp", timestamp.to_string())
        .header("svix-signature", signature)
        .body(Body::from(payload))?)
}

pub fn user_event(kind: &str, id: &str, email: Option<&str>) -> Value {
    let (addresses, primary) = match email {
        Some(email) => (
            json!([
                {"id": "idn_secondary", "email_address": "secondary@example.org"},
                {"id": "idn_primary", "email_address": email}
            ]),
            json!("idn_primary"),
        ),
        None => (
            json!([{"id": "idn_secondary", "email_address": "secondary@example.org"}]),
            Value::Null,
        ),
    };

    json!({
        "type": kind,
        "object": "event",
        "data": {
            "id": id,
            "object": "user",
            "email_addresses": addresses,
            "primary_email_address_id": primary,
            "public_metadata": {}
        }
    })
}

pub fn deleted_event(id: Option<&str>) -> Value {
    let mut data = json!({"object": "user", "deleted": true});
    if let Some(id) = id {
        data["id"] = json!(id);
    }
    json!({"type": "user.deleted", "object": "event", "data": data})
}

pub fn session_token(user_id: &str) -> String {
    let claims = SessionClaims::new(user_id.to_string(), Some("sess_test".to_string()), 600);
    issue_session_token(&claims, SESSION_PRIVATE_KEY).unwrap()
}
