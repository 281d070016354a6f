use axum::http::HeaderMap;
use base64::{Engine, engine::general_purpose::STANDARD};
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

pub const HEADER_ID: &str = "svix-id";
pub const HEADER_TIMESTAMP: &str = "svix-timestamp";
pub const HEADER_SIGNATURE: &str = "svix-signature";

const SECRET_PREFIX: &str = "whsec_";
const SIGNATURE_VERSION: &str = "v1";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum VerifyError {
    #[error("signing secret is not valid base64")]
    InvalidSecret,
    #[error("invalid signature timestamp")]
    InvalidTimestamp,
    #[error("message timestamp too old")]
    TimestampTooOld,
    #[error("message timestamp too new")]
    TimestampTooNew,
    #[error("no matching signature found")]
    NoMatchingSignature,
}

/// The three delivery headers every signed event carries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookHeaders {
    pub id: String,
    pub timestamp: String,
    pub signature: String,
}

impl WebhookHeaders {
    /// Returns `None` when any header is absent, empty or not visible ASCII.
    pub fn from_header_map(headers: &HeaderMap) -> Option<Self> {
        let get = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        Some(Self {
            id: get(HEADER_ID)?,
            timestamp: get(HEADER_TIMESTAMP)?,
            signature: get(HEADER_SIGNATURE)?,
        })
    }
}

/// Verifies Svix-style signed webhook deliveries.
///
/// The signed content is `{id}.{timestamp}.{body}`, signed with HMAC-SHA256
/// keyed by the base64 part of the `whsec_` secret. The signature header is
/// a space separated list of `v1,<base64>` entries; any one of them matching
/// is enough, which lets the provider rotate secrets.
#[derive(Clone)]
pub struct WebhookVerifier {
    key: Vec<u8>,
    tolerance_seconds: u64,
}

impl std::fmt::Debug for WebhookVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookVerifier")
            .field("tolerance_seconds", &self.tolerance_seconds)
            .finish_non_exhaustive()
    }
}

impl WebhookVerifier {
    pub fn new(secret: &str, tolerance_seconds: i64) -> Result<Self, VerifyError> {
        let encoded = secret.trim();
        let encoded = encoded.strip_prefix(SECRET_PREFIX).unwrap_or(encoded);
        let key = STANDARD
            .decode(encoded)
            .map_err(|_| VerifyError::InvalidSecret)?;
        if key.is_empty() {
            return Err(VerifyError::InvalidSecret);
        }

        Ok(Self {
            key,
            tolerance_seconds: tolerance_seconds.max(0).unsigned_abs(),
        })
    }

    pub fn verify(&self, headers: &WebhookHeaders, payload: &[u8]) -> Result<(), VerifyError> {
        self.verify_at(headers, payload, Utc::now().timestamp())
    }

    /// Verify against an explicit "now", in unix seconds
    pub fn verify_at(
        &self,
        headers: &WebhookHeaders,
        payload: &[u8],
        now: i64,
    ) -> Result<(), VerifyError> {
        let timestamp = headers
            .timestamp
            .parse::<i64>()
            .map_err(|_| VerifyError::InvalidTimestamp)?;
        // the header is untrusted, so compare without signed subtraction
        if timestamp.abs_diff(now) > self.tolerance_seconds {
            return Err(if timestamp < now {
                VerifyError::TimestampTooOld
            } else {
                VerifyError::TimestampTooNew
            });
        }

        let mac = self.mac(&headers.id, timestamp, payload)?;
        let matched = headers
            .signature
            .split_whitespace()
            .filter_map(|entry| entry.split_once(','))
            .filter(|(version, _)| *version == SIGNATURE_VERSION)
            .filter_map(|(_, sig)| STANDARD.decode(sig).ok())
            .any(|sig| mac.clone().verify_slice(&sig).is_ok());

        if matched {
            Ok(())
        } else {
            Err(VerifyError::NoMatchingSignature)
        }
    }

    /// Produce a `v1,<base64>` signature entry for the given delivery
    pub fn sign(&self, msg_id: &str, timestamp: i64, payload: &[u8]) -> Result<String, VerifyError> {
        let digest = self.mac(msg_id, timestamp, payload)?.finalize().into_bytes();
        Ok(format!("{SIGNATURE_VERSION},{}", STANDARD.encode(digest)))
    }

    fn mac(&self, msg_id: &str, timestamp: i64, payload: &[u8]) -> Result<HmacSha256, VerifyError> {
        let mut mac =
            HmacSha256::new_from_slice(&self.key).map_err(|_| VerifyError::InvalidSecret)?;
        mac.update(msg_id.as_bytes());
        mac.update(b".");
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        Ok(mac)
    }
}
