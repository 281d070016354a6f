use axum::{
    Json,
    extract::{OptionalFromRequestParts, Request, State},
    http::{HeaderMap, StatusCode, header, request::Parts},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::{
    convert::Infallible,
    time::{SystemTime, UNIX_EPOCH},
};
use thiserror::Error;
use tracing::debug;

use crate::{config::SessionAlgorithm, state::AppState};

/// Cookie the identity provider stores the session token in
pub const SESSION_COOKIE: &str = "__session";

/// Paths reachable without a session, matched by prefix
const PUBLIC_PREFIXES: &[&str] = &[
    "/sign-in",
    "/sign-up",
    "/api/webhooks",
    "/api/_ping",
    "/api/_health",
    "/api/openapi.json",
    "/api/scalar",
];

/// Static assets never go through the guard
const STATIC_EXTENSIONS: &[&str] = &[
    "html", "htm", "css", "js", "jpg", "jpeg", "webp", "png", "gif", "svg", "ttf", "woff",
    "woff2", "ico", "csv", "doc", "docx", "xls", "xlsx", "zip", "webmanifest",
];

pub fn is_public_route(path: &str) -> bool {
    PUBLIC_PREFIXES.iter().any(|prefix| path.starts_with(prefix))
}

/// Whether the guard runs for this path at all
pub fn is_guarded_path(path: &str) -> bool {
    if is_api_path(path) {
        return true;
    }
    if path.starts_with("/_next") {
        return false;
    }
    let last_segment = path.rsplit('/').next().unwrap_or_default();
    match last_segment.rsplit_once('.') {
        Some((_, ext)) => !STATIC_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()),
        None => true,
    }
}

fn is_api_path(path: &str) -> bool {
    ["/api", "/trpc"]
        .iter()
        .any(|root| path == *root || path.starts_with(&format!("{root}/")))
}

/// Session token claims
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SessionClaims {
    /// Subject (provider user id)
    pub sub: String,
    /// Session id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sid: Option<String>,
    /// Expiration time (as Unix timestamp)
    pub exp: u64,
    /// Issued at (as Unix timestamp)
    #[serde(default)]
    pub iat: u64,
}

impl SessionClaims {
    /// Create new claims with given subject and expiration duration in seconds
    pub fn new(subject: String, session_id: Option<String>, expires_in_secs: u64) -> Self {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();

        Self {
            sub: subject,
            sid: session_id,
            iat: now,
            exp: now + expires_in_secs,
        }
    }
}

/// Sign a session token with an EC private key (ES256)
pub fn issue_session_token(
    claims: &SessionClaims,
    private_key_pem: &str,
) -> Result<String, jsonwebtoken::errors::Error> {
    let encoding_key = EncodingKey::from_ec_pem(private_key_pem.as_bytes())?;
    encode(&Header::new(Algorithm::ES256), claims, &encoding_key)
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Session verification not configured")]
    NotConfigured,
    #[error("Missing session token")]
    MissingToken,
    #[error("Invalid session verification key: {0}")]
    InvalidKey(#[source] jsonwebtoken::errors::Error),
    #[error("Token verification failed: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),
}

impl SessionError {
    fn public_message(&self) -> &'static str {
        match self {
            SessionError::NotConfigured | SessionError::InvalidKey(_) => {
                "Session verification not configured"
            }
            SessionError::MissingToken => "Missing session token",
            SessionError::Token(err) => match err.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => "Token expired",
                jsonwebtoken::errors::ErrorKind::ImmatureSignature => "Token not yet valid",
                jsonwebtoken::errors::ErrorKind::InvalidToken => "Invalid token",
                jsonwebtoken::errors::ErrorKind::InvalidSignature => "Invalid signature",
                _ => "Token verification failed",
            },
        }
    }
}

/// The authenticated identity, placed in request extensions by [`session_guard`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: String,
    pub session_id: Option<String>,
}

impl<S> OptionalFromRequestParts<S> for Session
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        Ok(parts.extensions.get::<Session>().cloned())
    }
}

pub struct SessionVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl SessionVerifier {
    pub fn new(public_key_pem: &str, algorithm: SessionAlgorithm) -> Result<Self, SessionError> {
        let key = match algorithm {
            SessionAlgorithm::RS256 => DecodingKey::from_rsa_pem(public_key_pem.as_bytes()),
            SessionAlgorithm::ES256 => DecodingKey::from_ec_pem(public_key_pem.as_bytes()),
        }
        .map_err(SessionError::InvalidKey)?;

        let mut validation = Validation::new(algorithm.into());
        validation.validate_exp = true;
        validation.validate_nbf = true;

        Ok(Self { key, validation })
    }

    pub fn verify(&self, token: &str) -> Result<Session, SessionError> {
        let token_data = decode::<SessionClaims>(token, &self.key, &self.validation)?;
        Ok(Session {
            user_id: token_data.claims.sub,
            session_id: token_data.claims.sid,
        })
    }
}

/// Bearer token first, then the session cookie
fn session_token(headers: &HeaderMap) -> Option<&str> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());
    if bearer.is_some() {
        return bearer;
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|h| h.to_str().ok())
        .flat_map(|h| h.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == SESSION_COOKIE && !value.is_empty())
        .map(|(_, value)| value)
}

fn deny(state: &AppState, request: &Request, err: &SessionError) -> Response {
    let path = request.uri().path();
    if matches!(err, SessionError::NotConfigured | SessionError::InvalidKey(_)) {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "code": 1,
                "msg": err.public_message()
            })),
        )
            .into_response();
    }

    if is_api_path(path) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({
                "code": 1,
                "msg": err.public_message()
            })),
        )
            .into_response();
    }

    let original = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or(path);
    let query = serde_urlencoded::to_string([("redirect_url", original)]).unwrap_or_default();
    Redirect::temporary(&format!("{}?{query}", state.sign_in_url)).into_response()
}

/// Route protection: public and unguarded paths pass through, everything
/// else needs a verified session token.
pub async fn session_guard(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path();
    if !is_guarded_path(path) {
        return next.run(request).await;
    }

    let public = is_public_route(path);
    debug!(path, public, "session guard");
    if public {
        return next.run(request).await;
    }

    let verified = match &state.sessions {
        Some(verifier) => session_token(request.headers())
            .ok_or(SessionError::MissingToken)
            .and_then(|token| verifier.verify(token)),
        None => Err(SessionError::NotConfigured),
    };

    match verified {
        Ok(session) => {
            debug!(path, user_id = %session.user_id, "session accepted");
            request.extensions_mut().insert(session);
            next.run(request).await
        }
        Err(err) => {
            debug!(path, error = %err, "session rejected");
            deny(&state, &request, &err)
        }
    }
}
