#![allow(clippy::needless_for_each)]
mod dashboard_handlers;
mod misc_handlers;
mod webhook_handlers;
use crate::{auth::session_guard, middleware::apply_axum_middleware, state::AppState};
use axum::{Json, Router, middleware, routing::get};
use utoipa::OpenApi;
use utoipa_axum::{router::OpenApiRouter, routes};
use utoipa_scalar::{Scalar, Servable};

pub use webhook_handlers::{ACKNOWLEDGED, PROCESSED};

#[derive(OpenApi)]
#[openapi(
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "webhooks", description = "Identity-provider webhook endpoints"),
    ),
    components(schemas(misc_handlers::Health)),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "session_token",
                utoipa::openapi::security::SecurityScheme::Http(
                    utoipa::openapi::security::HttpBuilder::new()
                        .scheme(utoipa::openapi::security::HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some(
                            "Identity-provider session token, also accepted from the __session cookie",
                        ))
                        .build(),
                ),
            );
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let (api_routes, mut openapi) = OpenApiRouter::with_openapi(ApiDoc::openapi())
        .routes(routes!(misc_handlers::ping))
        .routes(routes!(misc_handlers::health))
        .routes(routes!(webhook_handlers::clerk_webhook))
        .split_for_parts();

    openapi.paths.paths = openapi
        .paths
        .paths
        .into_iter()
        .map(|(path, item)| (format!("/api{path}"), item))
        .collect::<utoipa::openapi::path::PathsMap<_, _>>();
    // the guard wraps the fallback too, so unknown protected paths are denied
    // before they 404
    let full_router = Router::new()
        .nest("/api", api_routes)
        .route("/dashboard", get(dashboard_handlers::dashboard))
        .merge(Scalar::with_url("/api/scalar", openapi.clone()))
        .route("/api/openapi.json", get(|| async move { Json(openapi) }))
        .layer(middleware::from_fn_with_state(state.clone(), session_guard))
        .with_state(state);

    // Apply middleware
    apply_axum_middleware(full_router)
}
