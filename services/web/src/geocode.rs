//! services/web/src/geocode.rs
//!
//! Zip code resolution behind the `/api/geocode` proxy: a small static cache
//! in front of an ordered chain of external providers.

use marketplace_core::domain::GeoPoint;
use marketplace_core::ports::GeocodeProvider;
use regex::Regex;
use std::sync::{Arc, OnceLock};
use tracing::{debug, info, warn};

/// Zip codes answered without calling any external service.
const STATIC_CACHE: &[(&str, f64, f64, &str)] = &[
    ("10001", 40.7506, -73.9972, "New York, NY 10001"),
    ("10002", 40.7157, -73.9863, "New York, NY 10002"),
    ("90210", 34.0901, -118.4065, "Beverly Hills, CA 90210"),
    ("60601", 41.8858, -87.6181, "Chicago, IL 60601"),
    ("94105", 37.7898, -122.3942, "San Francisco, CA 94105"),
    ("33101", 25.7791, -80.1978, "Miami, FL 33101"),
    ("02108", 42.3576, -71.0684, "Boston, MA 02108"),
    ("73301", 30.2672, -97.7431, "Austin, TX 73301"),
];

fn zip_pattern() -> Option<&'static Regex> {
    static ZIP: OnceLock<Option<Regex>> = OnceLock::new();
    ZIP.get_or_init(|| Regex::new(r"^[0-9]{5}$").ok()).as_ref()
}

/// Exactly five ASCII digits.
pub fn is_valid_zip(zip_code: &str) -> bool {
    zip_pattern().is_some_and(|re| re.is_match(zip_code))
}

pub fn cached(zip_code: &str) -> Option<GeoPoint> {
    STATIC_CACHE
        .iter()
        .find(|(zip, ..)| *zip == zip_code)
        .map(|(_, lat, lng, name)| GeoPoint {
            lat: *lat,
            lng: *lng,
            display_name: name.to_string(),
        })
}

#[derive(Debug, Clone, PartialEq)]
pub enum GeocodeOutcome {
    Found(GeoPoint),
    /// Every provider answered, none knew the code.
    NotFound,
    /// Every provider failed outright.
    Unavailable,
}

#[derive(Clone)]
pub struct GeocodeResolver {
    providers: Vec<Arc<dyn GeocodeProvider>>,
}

impl GeocodeResolver {
    /// `providers` are tried in order; the first hit wins.
    pub fn new(providers: Vec<Arc<dyn GeocodeProvider>>) -> Self {
        Self { providers }
    }

    /// Resolves an already validated zip code.
    pub async fn resolve(&self, zip_code: &str) -> GeocodeOutcome {
        if let Some(point) = cached(zip_code) {
            debug!("Geocode cache hit for {}", zip_code);
            return GeocodeOutcome::Found(point);
        }

        let mut failures = 0;
        for provider in &self.providers {
            match provider.lookup(zip_code).await {
                Ok(Some(point)) => {
                    info!("Geocoded {} via {}", zip_code, provider.name());
                    return GeocodeOutcome::Found(point);
                }
                Ok(None) => debug!("{} has no match for {}", provider.name(), zip_code),
                Err(e) => {
                    failures += 1;
                    warn!("Geocoder {} failed for {}: {}", provider.name(), zip_code, e);
                }
            }
        }

        if !self.providers.is_empty() && failures == self.providers.len() {
            GeocodeOutcome::Unavailable
        } else {
            GeocodeOutcome::NotFound
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use marketplace_core::ports::{PortError, PortResult};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// A provider with a canned answer that counts its calls.
    pub(crate) struct StubProvider {
        pub name: &'static str,
        pub answer: Result<Option<GeoPoint>, ()>,
        pub calls: AtomicUsize,
    }

    impl StubProvider {
        pub(crate) fn new(name: &'static str, answer: Result<Option<GeoPoint>, ()>) -> Arc<Self> {
            Arc::new(Self {
                name,
                answer,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl GeocodeProvider for StubProvider {
        fn name(&self) -> &str {
            self.name
        }

        async fn lookup(&self, _zip_code: &str) -> PortResult<Option<GeoPoint>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.answer
                .clone()
                .map_err(|_| PortError::Network("connection refused".into()))
        }
    }

    pub(crate) fn point(name: &str) -> GeoPoint {
        GeoPoint {
            lat: 1.0,
            lng: 2.0,
            display_name: name.to_string(),
        }
    }

    #[test]
    fn zip_validation_requires_five_digits() {
        assert!(is_valid_zip("10001"));
        assert!(is_valid_zip("02108"));
        assert!(!is_valid_zip("1000"));
        assert!(!is_valid_zip("100011"));
        assert!(!is_valid_zip("1000a"));
        assert!(!is_valid_zip(" 10001"));
    }

    #[tokio::test]
    async fn cached_zip_skips_every_provider() {
        let primary = StubProvider::new("primary", Ok(Some(point("remote"))));
        let resolver = GeocodeResolver::new(vec![primary.clone()]);

        let outcome = resolver.resolve("10001").await;
        assert_eq!(
            outcome,
            GeocodeOutcome::Found(GeoPoint {
                lat: 40.7506,
                lng: -73.9972,
                display_name: "New York, NY 10001".into()
            })
        );
        assert_eq!(primary.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unknown_zip_falls_through_to_the_fallback() {
        let primary = StubProvider::new("primary", Ok(None));
        let fallback = StubProvider::new("fallback", Ok(Some(point("Springfield, IL 62701"))));
        let resolver = GeocodeResolver::new(vec![primary.clone(), fallback.clone()]);

        let outcome = resolver.resolve("62701").await;
        assert_eq!(outcome, GeocodeOutcome::Found(point("Springfield, IL 62701")));
        assert_eq!(primary.calls.load(Ordering::SeqCst), 1);
        assert_eq!(fallback.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn primary_failure_still_tries_the_fallback() {
        let primary = StubProvider::new("primary", Err(()));
        let fallback = StubProvider::new("fallback", Ok(None));
        let resolver = GeocodeResolver::new(vec![primary, fallback]);
        assert_eq!(resolver.resolve("62701").await, GeocodeOutcome::NotFound);
    }

    #[tokio::test]
    async fn all_providers_failing_is_unavailable() {
        let resolver = GeocodeResolver::new(vec![
            StubProvider::new("primary", Err(())),
            StubProvider::new("fallback", Err(())),
        ]);
        assert_eq!(resolver.resolve("62701").await, GeocodeOutcome::Unavailable);
    }
}
