//! Identity-provider webhooks: delivery verification, event decoding and
//! the local user-table sync they drive.

pub mod event;
pub mod signature;
pub mod sync;

pub use event::{IdentityEvent, UserPayload, WebhookEvent};
pub use signature::{VerifyError, WebhookHeaders, WebhookVerifier};
pub use sync::{SyncOutcome, apply_event};
