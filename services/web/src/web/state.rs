//! services/web/src/web/state.rs
//!
//! Shared state for the HTTP handlers.

use crate::config::Config;
use crate::geocode::GeocodeResolver;
use std::sync::Arc;

/// Created once at startup and handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub geocoder: GeocodeResolver,
}
