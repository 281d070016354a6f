use crate::state::AppState;
use axum::{Json, debug_handler, extract::State, http::StatusCode};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(ToSchema, Serialize)]
pub struct Health {
    pub ok: bool,
}

/// /_ping
#[debug_handler]
#[utoipa::path(get, tag = "health", path = "/_ping", responses((status = OK, body = Health)))]
pub async fn ping() -> Json<Health> {
    Json(Health { ok: true })
}

/// /_health, 503 while the database is unreachable
#[debug_handler]
#[utoipa::path(
    get,
    tag = "health",
    path = "/_health",
    responses(
        (status = OK, body = Health),
        (status = SERVICE_UNAVAILABLE, body = Health)
    )
)]
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<Health>) {
    let ok = state.repository.health_check().await;
    let status = if ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(Health { ok }))
}
