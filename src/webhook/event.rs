use serde::Deserialize;
use serde_json::Value;

use crate::models::SubscriptionStatus;

pub const USER_CREATED: &str = "user.created";
pub const USER_UPDATED: &str = "user.updated";
pub const USER_DELETED: &str = "user.deleted";

/// Outer envelope of an identity-provider event
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub object: Option<String>,
}

/// Events this service reacts to, with their payloads decoded
#[derive(Debug, Clone)]
pub enum IdentityEvent {
    UserCreated(UserPayload),
    UserUpdated(UserPayload),
    UserDeleted(DeletedPayload),
    Unhandled(String),
}

impl WebhookEvent {
    /// Provider user id carried by the event, if any
    pub fn data_id(&self) -> Option<&str> {
        self.data.get("id").and_then(Value::as_str)
    }

    pub fn into_identity_event(self) -> Result<IdentityEvent, serde_json::Error> {
        Ok(match self.event_type.as_str() {
            USER_CREATED => IdentityEvent::UserCreated(serde_json::from_value(self.data)?),
            USER_UPDATED => IdentityEvent::UserUpdated(serde_json::from_value(self.data)?),
            USER_DELETED => IdentityEvent::UserDeleted(serde_json::from_value(self.data)?),
            _ => IdentityEvent::Unhandled(self.event_type),
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmailAddress {
    pub id: String,
    pub email_address: String,
}

/// The subset of the provider's user object we mirror locally
#[derive(Debug, Clone, Deserialize)]
pub struct UserPayload {
    pub id: String,
    #[serde(default)]
    pub email_addresses: Vec<EmailAddress>,
    #[serde(default)]
    pub primary_email_address_id: Option<String>,
    #[serde(default)]
    pub public_metadata: Value,
}

impl UserPayload {
    /// The address whose id equals `primary_email_address_id`
    pub fn primary_email(&self) -> Option<&str> {
        let primary_id = self.primary_email_address_id.as_deref()?;
        self.email_addresses
            .iter()
            .find(|email| email.id == primary_id)
            .map(|email| email.email_address.as_str())
    }

    /// `public_metadata.subscription_status`, when it names a known status
    pub fn subscription_status(&self) -> Option<SubscriptionStatus> {
        self.public_metadata
            .get("subscription_status")
            .and_then(Value::as_str)
            .and_then(SubscriptionStatus::parse)
    }
}

/// Deletions carry a minimal object: `{ id, object, deleted }`
#[derive(Debug, Clone, Deserialize)]
pub struct DeletedPayload {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub deleted: bool,
}
