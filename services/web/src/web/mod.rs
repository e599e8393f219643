pub mod rest;
pub mod state;

pub use rest::{geocode_handler, health_handler, ApiDoc};
pub use state::AppState;

use crate::config::ConfigError;
use axum::http::{header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE}, HeaderValue, Method};
use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Builds the complete application router: API routes, CORS for the
/// front-end origin, and the Swagger UI.
pub fn build_router(app_state: Arc<AppState>) -> Result<Router, ConfigError> {
    let origin = app_state
        .config
        .frontend_origin
        .parse::<HeaderValue>()
        .map_err(|e| ConfigError::InvalidValue("FRONTEND_ORIGIN".to_string(), e.to_string()))?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]);

    let api_router = Router::new()
        .route("/api/geocode", get(geocode_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .with_state(app_state);

    Ok(Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi())))
}
