//! Geocoding/directions collaborator interface.

use async_trait::async_trait;

use crate::model::GeoPoint;

/// Result type for geocoder operations.
pub type Result<T> = std::result::Result<T, GeocodeError>;

/// Errors raised by the geocoding collaborator.
///
/// Callers surface these as an empty result (no pin, no route); there is
/// no automatic retry.
#[derive(Debug, thiserror::Error)]
pub enum GeocodeError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected response: {0}")]
    Malformed(String),
}

/// An encoded route polyline, passed through to map rendering opaquely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Polyline {
    pub encoded: String,
}

/// External place-name and routing service.
///
/// Rate-limited and fallible; a failed call yields no result and is not
/// retried by this crate.
#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Resolve a place name to coordinates. `Ok(None)` means the place
    /// is unknown to the service.
    async fn geocode(&self, place: &str) -> Result<Option<GeoPoint>>;

    /// Fetch a route polyline through the given waypoints. `Ok(None)`
    /// means no route was found.
    async fn route_polyline(
        &self,
        origin: GeoPoint,
        waypoints: &[GeoPoint],
        destination: GeoPoint,
    ) -> Result<Option<Polyline>>;
}
