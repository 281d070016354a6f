use anyhow::Result;
use async_trait::async_trait;
use sqlx::{Pool, Postgres};
use tracing::info;

use crate::models::{ConnectedAccountSummary, SubscriptionStatus, UpcomingPost, User};

/// Fields written when a user first appears
#[derive(Debug, Clone)]
pub struct NewUser {
    pub clerk_user_id: String,
    pub email: String,
    pub subscription_status: SubscriptionStatus,
    pub onboarding_completed: bool,
}

impl NewUser {
    pub fn from_provider(clerk_user_id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            clerk_user_id: clerk_user_id.into(),
            email: email.into(),
            subscription_status: SubscriptionStatus::Free,
            onboarding_completed: false,
        }
    }
}

/// Partial update; `None` keeps the stored value. `updated_at` is always bumped.
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub email: Option<String>,
    pub subscription_status: Option<SubscriptionStatus>,
}

#[async_trait]
pub trait Repository: Send + Sync + 'static {
    async fn health_check(&self) -> bool;
    async fn migrate(&self) -> Result<()>;

    /// Insert unless a conflicting row exists. Returns whether a row was written.
    async fn insert_user_if_absent(&self, user: &NewUser) -> Result<bool, sqlx::Error>;
    /// Returns whether a row matched.
    async fn update_user(&self, clerk_user_id: &str, update: &UserUpdate)
    -> Result<bool, sqlx::Error>;
    /// Returns whether a row was removed.
    async fn delete_user(&self, clerk_user_id: &str) -> Result<bool, sqlx::Error>;

    async fn find_user(&self, clerk_user_id: &str) -> Result<Option<User>, sqlx::Error>;
    async fn connected_accounts(
        &self,
        clerk_user_id: &str,
    ) -> Result<Vec<ConnectedAccountSummary>, sqlx::Error>;
    /// Pending posts, soonest first
    async fn upcoming_posts(
        &self,
        clerk_user_id: &str,
        limit: i64,
    ) -> Result<Vec<UpcomingPost>, sqlx::Error>;
}

#[derive(Debug, Clone)]
pub struct PostgresRepository {
    pub pool: Pool<Postgres>,
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }

    async fn migrate(&self) -> Result<()> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("Database migrations completed");
        Ok(())
    }

    async fn insert_user_if_absent(&self, user: &NewUser) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO users (clerk_user_id, email, subscription_status, onboarding_completed)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(&user.clerk_user_id)
        .bind(&user.email)
        .bind(user.subscription_status)
        .bind(user.onboarding_completed)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn update_user(
        &self,
        clerk_user_id: &str,
        update: &UserUpdate,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET email = COALESCE($2, email),
                subscription_status = COALESCE($3, subscription_status),
                updated_at = now()
            WHERE clerk_user_id = $1
            "#,
        )
        .bind(clerk_user_id)
        .bind(update.email.as_deref())
        .bind(update.subscription_status)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_user(&self, clerk_user_id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM users WHERE clerk_user_id = $1")
            .bind(clerk_user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn find_user(&self, clerk_user_id: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT clerk_user_id, email, subscription_status, onboarding_completed,
                   created_at, updated_at
            FROM users
            WHERE clerk_user_id = $1
            "#,
        )
        .bind(clerk_user_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn connected_accounts(
        &self,
        clerk_user_id: &str,
    ) -> Result<Vec<ConnectedAccountSummary>, sqlx::Error> {
        sqlx::query_as::<_, ConnectedAccountSummary>(
            r#"
            SELECT uca.id, sp.name AS platform_name, uca.username_on_platform, uca.last_synced_at
            FROM user_connected_accounts uca
            JOIN social_platforms sp ON sp.id = uca.platform_id
            WHERE uca.user_id = $1
            ORDER BY sp.name, uca.created_at
            "#,
        )
        .bind(clerk_user_id)
        .fetch_all(&self.pool)
        .await
    }

    async fn upcoming_posts(
        &self,
        clerk_user_id: &str,
        limit: i64,
    ) -> Result<Vec<UpcomingPost>, sqlx::Error> {
        sqlx::query_as::<_, UpcomingPost>(
            r#"
            SELECT p.id, p.scheduled_at, p.status, ci.title, ci.content_type,
                   plat.name AS platform_name
            FROM scheduled_posts p
            JOIN content_items ci ON ci.id = p.content_item_id
            JOIN user_connected_accounts uca ON uca.id = p.connected_account_id
            JOIN social_platforms plat ON plat.id = uca.platform_id
            WHERE p.user_id = $1 AND p.status = 'pending'
            ORDER BY p.scheduled_at ASC
            LIMIT $2
            "#,
        )
        .bind(clerk_user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
    }
}
