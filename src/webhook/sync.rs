use tracing::{error, info, warn};

use super::event::{DeletedPayload, IdentityEvent, UserPayload};
use crate::repository::{NewUser, Repository, UserUpdate};

/// What an event did to the local user table
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Created,
    /// Duplicate delivery or a conflicting row; the insert was ignored.
    AlreadyExists,
    SkippedNoPrimaryEmail,
    Updated,
    NoLocalUser,
    Deleted,
    NothingToDelete,
    MissingId,
    Unhandled(String),
}

/// Apply one verified identity event. Only database failures are errors.
pub async fn apply_event(
    repository: &dyn Repository,
    event: IdentityEvent,
) -> Result<SyncOutcome, sqlx::Error> {
    match event {
        IdentityEvent::UserCreated(user) => user_created(repository, user).await,
        IdentityEvent::UserUpdated(user) => user_updated(repository, user).await,
        IdentityEvent::UserDeleted(deleted) => user_deleted(repository, deleted).await,
        IdentityEvent::Unhandled(kind) => {
            info!(event_type = %kind, "Unhandled webhook event type");
            Ok(SyncOutcome::Unhandled(kind))
        }
    }
}

async fn user_created(
    repository: &dyn Repository,
    user: UserPayload,
) -> Result<SyncOutcome, sqlx::Error> {
    let Some(email) = user.primary_email() else {
        error!(user_id = %user.id, "user.created without a primary email, skipping insert");
        return Ok(SyncOutcome::SkippedNoPrimaryEmail);
    };

    let new_user = NewUser::from_provider(&user.id, email);
    if repository.insert_user_if_absent(&new_user).await? {
        info!(user_id = %user.id, "User created in local DB");
        Ok(SyncOutcome::Created)
    } else {
        info!(user_id = %user.id, "User already present, insert ignored");
        Ok(SyncOutcome::AlreadyExists)
    }
}

async fn user_updated(
    repository: &dyn Repository,
    user: UserPayload,
) -> Result<SyncOutcome, sqlx::Error> {
    let email = user.primary_email().map(str::to_string);
    if email.is_none() {
        error!(user_id = %user.id, "user.updated without a primary email, keeping stored email");
    }

    let update = UserUpdate {
        email,
        subscription_status: user.subscription_status(),
    };
    if repository.update_user(&user.id, &update).await? {
        info!(user_id = %user.id, "User updated in local DB");
        Ok(SyncOutcome::Updated)
    } else {
        warn!(user_id = %user.id, "user.updated for a user missing from local DB");
        Ok(SyncOutcome::NoLocalUser)
    }
}

async fn user_deleted(
    repository: &dyn Repository,
    deleted: DeletedPayload,
) -> Result<SyncOutcome, sqlx::Error> {
    let Some(id) = deleted.id else {
        warn!("user.deleted received without an ID");
        return Ok(SyncOutcome::MissingId);
    };

    if repository.delete_user(&id).await? {
        info!(user_id = %id, "User deleted from local DB");
        Ok(SyncOutcome::Deleted)
    } else {
        info!(user_id = %id, "user.deleted for a user missing from local DB");
        Ok(SyncOutcome::NothingToDelete)
    }
}
