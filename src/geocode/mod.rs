//! HTTP geocoder backed by the Google Maps web APIs.
//!
//! Response parsing is split out into pure functions over the JSON
//! bodies so the status-code handling can be tested without a server.

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::config::GeocoderConfig;
use crate::interfaces::geocoder::{GeocodeError, Geocoder, Polyline, Result};
use crate::model::GeoPoint;

/// [`Geocoder`] implementation over the maps web API.
pub struct HttpGeocoder {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl HttpGeocoder {
    pub fn new(config: &GeocoderConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        }
    }
}

#[async_trait]
impl Geocoder for HttpGeocoder {
    async fn geocode(&self, place: &str) -> Result<Option<GeoPoint>> {
        let url = format!("{}/geocode/json", self.endpoint);
        debug!(place, "geocode request");

        let body: Value = self
            .client
            .get(&url)
            .query(&[("address", place), ("key", self.api_key.as_str())])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        parse_geocode_response(&body)
    }

    async fn route_polyline(
        &self,
        origin: GeoPoint,
        waypoints: &[GeoPoint],
        destination: GeoPoint,
    ) -> Result<Option<Polyline>> {
        let url = format!("{}/directions/json", self.endpoint);
        let fmt = |p: GeoPoint| format!("{},{}", p.latitude, p.longitude);
        let via = waypoints.iter().map(|p| fmt(*p)).collect::<Vec<_>>().join("|");
        debug!(waypoints = waypoints.len(), "directions request");

        let body: Value = self
            .client
            .get(&url)
            .query(&[
                ("origin", fmt(origin)),
                ("destination", fmt(destination)),
                ("waypoints", via),
                ("key", self.api_key.clone()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        parse_directions_response(&body)
    }
}

/// Interpret a geocoding response body.
///
/// `OK` yields the first result's location, `ZERO_RESULTS` yields
/// `None`, anything else is malformed (bad key, quota, unexpected
/// shape).
fn parse_geocode_response(body: &Value) -> Result<Option<GeoPoint>> {
    match body["status"].as_str() {
        Some("OK") => {
            let location = &body["results"][0]["geometry"]["location"];
            match (location["lat"].as_f64(), location["lng"].as_f64()) {
                (Some(latitude), Some(longitude)) => {
                    Ok(Some(GeoPoint::new(latitude, longitude)))
                }
                _ => Err(GeocodeError::Malformed(
                    "OK response without a location".to_string(),
                )),
            }
        }
        Some("ZERO_RESULTS") => Ok(None),
        Some(status) => Err(GeocodeError::Malformed(format!("status {status}"))),
        None => Err(GeocodeError::Malformed("missing status field".to_string())),
    }
}

/// Interpret a directions response body, extracting the overview
/// polyline of the first route.
fn parse_directions_response(body: &Value) -> Result<Option<Polyline>> {
    match body["status"].as_str() {
        Some("OK") => match body["routes"][0]["overview_polyline"]["points"].as_str() {
            Some(points) => Ok(Some(Polyline {
                encoded: points.to_string(),
            })),
            None => Err(GeocodeError::Malformed(
                "OK response without a polyline".to_string(),
            )),
        },
        Some("ZERO_RESULTS") => Ok(None),
        Some(status) => Err(GeocodeError::Malformed(format!("status {status}"))),
        None => Err(GeocodeError::Malformed("missing status field".to_string())),
    }
}
