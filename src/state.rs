use anyhow::{Context, Result};
use std::{sync::Arc, time::Duration};
use tracing::warn;

use crate::{
    auth::SessionVerifier,
    config::{AppSettings, AuthConfig, InternalErrorPolicy, WebhookConfig},
    repository::{PostgresRepository, Repository},
    webhook::WebhookVerifier,
};

#[derive(Clone)]
pub struct AppState {
    pub repository: Arc<dyn Repository>,
    pub webhook_verifier: Arc<WebhookVerifier>,
    pub on_internal_error: InternalErrorPolicy,
    /// `None` when no session key is configured; protected routes then fail closed.
    pub sessions: Option<Arc<SessionVerifier>>,
    pub sign_in_url: String,
}

impl AppState {
    pub fn new(
        repository: Arc<dyn Repository>,
        webhook: &WebhookConfig,
        auth: &AuthConfig,
    ) -> Result<Self> {
        let webhook_verifier =
            WebhookVerifier::new(&webhook.signing_secret, webhook.tolerance_seconds)
                .context("invalid webhook signing secret")?;

        let sessions = if auth.public_key.trim().is_empty() {
            warn!("auth.public_key is not set, protected routes will reject every request");
            None
        } else {
            let verifier = SessionVerifier::new(&auth.public_key, auth.algorithm)
                .context("invalid session public key")?;
            Some(Arc::new(verifier))
        };

        Ok(Self {
            repository,
            webhook_verifier: Arc::new(webhook_verifier),
            on_internal_error: webhook.on_internal_error,
            sessions,
            sign_in_url: auth.sign_in_url.clone(),
        })
    }
}

pub async fn init_state_with_pg(config: &AppSettings) -> Result<AppState> {
    let mut options = sqlx::postgres::PgPoolOptions::new();
    if let Some(max) = config.database.max_connections {
        options = options.max_connections(max);
    }
    if let Some(secs) = config.database.connection_timeout_seconds {
        options = options.acquire_timeout(Duration::from_secs(secs));
    }
    let pool = options
        .connect(&config.database.uri)
        .await
        .context("Failed to connect to the database")?;

    AppState::new(
        Arc::new(PostgresRepository { pool }),
        &config.webhook,
        &config.auth,
    )
}
