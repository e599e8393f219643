//! services/web/src/adapters/geocode.rs
//!
//! External geocoding adapters implementing the `GeocodeProvider` port:
//! Nominatim (OpenStreetMap) as the primary provider and Zippopotam as the
//! fallback. Both are normalized to `GeoPoint`.

use async_trait::async_trait;
use marketplace_core::domain::GeoPoint;
use marketplace_core::ports::{GeocodeProvider, PortError, PortResult};
use reqwest::{Client, StatusCode};
use serde::Deserialize;

fn parse_coordinate(raw: &str, what: &str) -> PortResult<f64> {
    raw.trim()
        .parse::<f64>()
        .map_err(|_| PortError::Unexpected(format!("Invalid {} '{}' from geocoder", what, raw)))
}

//=========================================================================================
// Nominatim
//=========================================================================================

#[derive(Deserialize)]
struct NominatimPlace {
    lat: String,
    lon: String,
    display_name: String,
}

/// Normalizes a Nominatim search response (a JSON array of places).
pub fn parse_nominatim(body: &str) -> PortResult<Option<GeoPoint>> {
    let places: Vec<NominatimPlace> = serde_json::from_str(body)
        .map_err(|e| PortError::Unexpected(format!("Malformed Nominatim response: {}", e)))?;
    let Some(place) = places.into_iter().next() else {
        return Ok(None);
    };
    Ok(Some(GeoPoint {
        lat: parse_coordinate(&place.lat, "latitude")?,
        lng: parse_coordinate(&place.lon, "longitude")?,
        display_name: place.display_name,
    }))
}

#[derive(Clone)]
pub struct NominatimGeocoder {
    client: Client,
    base_url: String,
    user_agent: String,
}

impl NominatimGeocoder {
    pub fn new(client: Client, base_url: impl Into<String>, user_agent: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            user_agent: user_agent.into(),
        }
    }
}

#[async_trait]
impl GeocodeProvider for NominatimGeocoder {
    fn name(&self) -> &str {
        "nominatim"
    }

    async fn lookup(&self, zip_code: &str) -> PortResult<Option<GeoPoint>> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("postalcode", zip_code),
                ("country", "us"),
                ("format", "json"),
                ("limit", "1"),
            ])
            .header(reqwest::header::USER_AGENT, &self.user_agent)
            .send()
            .await
            .map_err(|e| PortError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(PortError::Network(format!(
                "Nominatim responded {}",
                response.status()
            )));
        }
        let body = response
            .text()
            .await
            .map_err(|e| PortError::Network(e.to_string()))?;
        parse_nominatim(&body)
    }
}

//=========================================================================================
// Zippopotam
//=========================================================================================

#[derive(Deserialize)]
struct ZippopotamResponse {
    #[serde(rename = "post code")]
    post_code: String,
    #[serde(default)]
    places: Vec<ZippopotamPlace>,
}

#[derive(Deserialize)]
struct ZippopotamPlace {
    #[serde(rename = "place name")]
    place_name: String,
    #[serde(rename = "state abbreviation", default)]
    state_abbreviation: String,
    latitude: String,
    longitude: String,
}

/// Normalizes a Zippopotam `/us/{zip}` response.
pub fn parse_zippopotam(body: &str) -> PortResult<Option<GeoPoint>> {
    let response: ZippopotamResponse = serde_json::from_str(body)
        .map_err(|e| PortError::Unexpected(format!("Malformed Zippopotam response: {}", e)))?;
    let Some(place) = response.places.into_iter().next() else {
        return Ok(None);
    };
    let display_name = if place.state_abbreviation.is_empty() {
        format!("{} {}", place.place_name, response.post_code)
    } else {
        format!(
            "{}, {} {}",
            place.place_name, place.state_abbreviation, response.post_code
        )
    };
    Ok(Some(GeoPoint {
        lat: parse_coordinate(&place.latitude, "latitude")?,
        lng: parse_coordinate(&place.longitude, "longitude")?,
        display_name,
    }))
}

#[derive(Clone)]
pub struct ZippopotamGeocoder {
    client: Client,
    base_url: String,
}

impl ZippopotamGeocoder {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl GeocodeProvider for ZippopotamGeocoder {
    fn name(&self) -> &str {
        "zippopotam"
    }

    async fn lookup(&self, zip_code: &str) -> PortResult<Option<GeoPoint>> {
        let response = self
            .client
            .get(format!("{}/{}", self.base_url, zip_code))
            .send()
            .await
            .map_err(|e| PortError::Network(e.to_string()))?;

        // Zippopotam answers unknown codes with 404 and an empty object.
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(PortError::Network(format!(
                "Zippopotam responded {}",
                response.status()
            )));
        }
        let body = response
            .text()
            .await
            .map_err(|e| PortError::Network(e.to_string()))?;
        parse_zippopotam(&body)
    }
}
