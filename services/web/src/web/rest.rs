//! services/web/src/web/rest.rs
//!
//! Contains the Axum handlers for the HTTP endpoints and the master
//! definition for the OpenAPI specification.

use crate::geocode::{is_valid_zip, GeocodeOutcome};
use crate::web::state::AppState;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Json,
};
use marketplace_core::domain::GeoPoint;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, warn};
use utoipa::{IntoParams, OpenApi, ToSchema};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(geocode_handler, health_handler),
    components(schemas(GeocodeResponse, ErrorBody)),
    tags(
        (name = "Marketplace Web", description = "Server-side helpers for the marketplace front-end.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

#[derive(Debug, Deserialize, IntoParams)]
pub struct GeocodeQuery {
    /// A five digit US zip code.
    pub zip: Option<String>,
}

/// Coordinates for a zip code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GeocodeResponse {
    pub lat: f64,
    pub lng: f64,
    pub display_name: String,
}

impl From<GeoPoint> for GeocodeResponse {
    fn from(point: GeoPoint) -> Self {
        Self {
            lat: point.lat,
            lng: point.lng,
            display_name: point.display_name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
}

type ApiFailure = (StatusCode, Json<ErrorBody>);

fn failure(status: StatusCode, message: &str) -> ApiFailure {
    (
        status,
        Json(ErrorBody {
            error: message.to_string(),
        }),
    )
}

//=========================================================================================
// Handlers
//=========================================================================================

/// Resolve a US zip code to coordinates.
///
/// Answers a handful of well-known codes from a static table and otherwise
/// asks the configured geocoders in order.
#[utoipa::path(
    get,
    path = "/api/geocode",
    params(GeocodeQuery),
    responses(
        (status = 200, description = "Location found", body = GeocodeResponse),
        (status = 400, description = "Invalid zip code", body = ErrorBody),
        (status = 404, description = "Location not found", body = ErrorBody),
        (status = 502, description = "Geocoding service unavailable", body = ErrorBody)
    )
)]
pub async fn geocode_handler(
    State(app_state): State<Arc<AppState>>,
    Query(query): Query<GeocodeQuery>,
) -> Result<Json<GeocodeResponse>, ApiFailure> {
    let zip = query.zip.unwrap_or_default();
    let zip = zip.trim();
    if !is_valid_zip(zip) {
        warn!("Rejected geocode request for '{}'", zip);
        return Err(failure(StatusCode::BAD_REQUEST, "Invalid zip code"));
    }

    match app_state.geocoder.resolve(zip).await {
        GeocodeOutcome::Found(point) => Ok(Json(point.into())),
        GeocodeOutcome::NotFound => Err(failure(StatusCode::NOT_FOUND, "Location not found")),
        GeocodeOutcome::Unavailable => {
            error!("No geocoder could answer for {}", zip);
            Err(failure(
                StatusCode::BAD_GATEWAY,
                "Geocoding service unavailable",
            ))
        }
    }
}

/// Liveness check; answers a plain `ok`.
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is up", body = String, content_type = "text/plain"))
)]
pub async fn health_handler() -> &'static str {
    "ok"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::geocode::tests::{point, StubProvider};
    use crate::geocode::GeocodeResolver;
    use marketplace_core::ports::GeocodeProvider;
    use std::sync::atomic::Ordering;

    fn state(providers: Vec<Arc<dyn GeocodeProvider>>) -> Arc<AppState> {
        let config = Config::from_lookup(|key| match key {
            "API_BASE_URL" => Some("http://localhost:5000/api".into()),
            "SOCKET_URL" => Some("ws://localhost:5000".into()),
            _ => None,
        })
        .unwrap();
        Arc::new(AppState {
            config: Arc::new(config),
            geocoder: GeocodeResolver::new(providers),
        })
    }

    async fn call(
        state: Arc<AppState>,
        zip: Option<&str>,
    ) -> Result<Json<GeocodeResponse>, ApiFailure> {
        geocode_handler(
            State(state),
            Query(GeocodeQuery {
                zip: zip.map(str::to_string),
            }),
        )
        .await
    }

    #[tokio::test]
    async fn malformed_zip_is_a_bad_request() {
        for zip in [None, Some(""), Some("123"), Some("12a45"), Some("123456")] {
            let (status, Json(body)) = call(state(vec![]), zip).await.unwrap_err();
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body.error, "Invalid zip code");
        }
    }

    #[tokio::test]
    async fn cached_zip_is_answered_without_providers() {
        let provider = StubProvider::new("primary", Err(()));
        let Json(body) = call(state(vec![provider.clone()]), Some("90210"))
            .await
            .unwrap();
        assert_eq!(body.display_name, "Beverly Hills, CA 90210");
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn provider_hit_is_returned() {
        let provider = StubProvider::new("primary", Ok(Some(point("Springfield, IL 62701"))));
        let Json(body) = call(state(vec![provider]), Some("62701")).await.unwrap();
        assert_eq!(body.display_name, "Springfield, IL 62701");
        assert_eq!(body.lat, 1.0);
    }

    #[tokio::test]
    async fn no_match_is_not_found() {
        let provider = StubProvider::new("primary", Ok(None));
        let (status, Json(body)) = call(state(vec![provider]), Some("99999")).await.unwrap_err();
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body.error, "Location not found");
    }

    #[tokio::test]
    async fn failing_providers_are_a_bad_gateway() {
        let provider = StubProvider::new("primary", Err(()));
        let (status, Json(body)) = call(state(vec![provider]), Some("99999")).await.unwrap_err();
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body.error, "Geocoding service unavailable");
    }

    #[tokio::test]
    async fn health_answers_plain_ok() {
        assert_eq!(health_handler().await, "ok");
    }

    #[test]
    fn response_uses_camel_case_display_name() {
        let json = serde_json::to_value(GeocodeResponse::from(point("Somewhere"))).unwrap();
        assert_eq!(json["displayName"], "Somewhere");
    }
}
