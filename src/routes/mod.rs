//! Static route and stop lookup.
//!
//! Routes are configuration data loaded once at startup; the stop index
//! is derived from them and answers "which buses serve this stop" in a
//! single map lookup.

use std::collections::BTreeMap;

use serde::Deserialize;

/// Result type for route lookups.
pub type Result<T> = std::result::Result<T, RouteError>;

#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    #[error("failed to parse route table: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("no route for registration {0}")]
    LookupMiss(String),
}

/// One bus route: an ordered list of stop names plus identity fields.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    /// Public-facing bus number, e.g. "4".
    pub bus_number: String,
    /// Vehicle registration plate; links a driver's vehicle to a route.
    #[serde(default)]
    pub registration: Option<String>,
    /// Stop names in service order.
    pub stops: Vec<String>,
}

impl Route {
    /// Human-readable route span, "first stop - last stop".
    ///
    /// Empty string for a route with no stops.
    pub fn span_label(&self) -> String {
        match (self.stops.first(), self.stops.last()) {
            (Some(first), Some(last)) => format!("{first} - {last}"),
            _ => String::new(),
        }
    }
}

/// On-disk shape of a route table file.
#[derive(Debug, Deserialize)]
struct RouteFile {
    #[serde(rename = "BUS_ROUTES")]
    bus_routes: Vec<Route>,
}

/// The full set of routes, loaded once.
#[derive(Debug, Clone)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    pub fn new(routes: Vec<Route>) -> Self {
        Self { routes }
    }

    /// Parse a route table from its JSON file format.
    pub fn from_json(json: &str) -> Result<Self> {
        let file: RouteFile = serde_json::from_str(json)?;
        Ok(Self::new(file.bus_routes))
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Find the route assigned to a vehicle registration.
    pub fn find_by_registration(&self, registration: &str) -> Result<&Route> {
        self.routes
            .iter()
            .find(|r| r.registration.as_deref() == Some(registration))
            .ok_or_else(|| RouteError::LookupMiss(registration.to_string()))
    }
}

/// Inverted index from stop name to the bus numbers serving it.
///
/// Built in one pass over every stop of every route; lookups allocate
/// only the returned clone.
#[derive(Debug, Clone)]
pub struct StopIndex {
    by_stop: BTreeMap<String, Vec<String>>,
}

impl StopIndex {
    /// Build the index from a route table.
    pub fn build(table: &RouteTable) -> Self {
        let mut by_stop: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for route in table.routes() {
            for stop in &route.stops {
                let buses = by_stop.entry(stop.clone()).or_default();
                if !buses.contains(&route.bus_number) {
                    buses.push(route.bus_number.clone());
                }
            }
        }
        for buses in by_stop.values_mut() {
            buses.sort();
        }
        Self { by_stop }
    }

    /// Bus numbers serving a stop, sorted. Empty for unknown stops.
    pub fn routes_serving(&self, stop: &str) -> Vec<String> {
        self.by_stop.get(stop).cloned().unwrap_or_default()
    }

    /// All stop names known to the index, sorted.
    pub fn stops(&self) -> impl Iterator<Item = &str> {
        self.by_stop.keys().map(String::as_str)
    }
}
