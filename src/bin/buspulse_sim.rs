//! Standalone simulation: one simulated bus publishing into the
//! in-memory store, with a fleet subscription logging every snapshot.
//!
//! Runs until Ctrl-C. Pass a config file path as the first argument or
//! set BUSPULSE_CONFIG.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use tokio::sync::Mutex;
use tracing::{info, warn};

use buspulse::config::Config;
use buspulse::geocode::HttpGeocoder;
use buspulse::interfaces::geocoder::Geocoder;
use buspulse::interfaces::location::{
    LocationSource, PermissionGate, PermissionStatus, Result as LocationResult,
};
use buspulse::model::GeoPoint;
use buspulse::publisher::Publisher;
use buspulse::routes::{Route, RouteTable, StopIndex};
use buspulse::store::MemoryStore;
use buspulse::subscriber::{FleetEvent, FleetSink, Subscriber};
use buspulse::utils::bootstrap::{init_tracing, parse_config_path};

/// A ride from campus toward the clock tower, one step per sample.
struct SimulatedRide {
    position: Mutex<GeoPoint>,
    destination: GeoPoint,
}

impl SimulatedRide {
    fn new() -> Self {
        Self {
            position: Mutex::new(GeoPoint::new(30.35, 78.05)),
            destination: GeoPoint::new(30.4022, 78.0742),
        }
    }
}

#[async_trait]
impl LocationSource for SimulatedRide {
    async fn current_position(&self) -> LocationResult<GeoPoint> {
        let mut position = self.position.lock().await;
        if position.latitude < self.destination.latitude {
            position.latitude += 0.0005;
            position.longitude += 0.0002;
        }
        Ok(*position)
    }
}

/// No OS dialog in the simulator; permission is always granted.
struct AlwaysGranted;

#[async_trait]
impl PermissionGate for AlwaysGranted {
    async fn request_foreground_location(&self) -> PermissionStatus {
        PermissionStatus::Granted
    }
}

/// Fleet sink that logs each snapshot's active/total counts.
struct LoggingFleetSink;

impl FleetSink for LoggingFleetSink {
    fn deliver(&self, event: FleetEvent) -> BoxFuture<'static, ()> {
        Box::pin(async move {
            match event {
                FleetEvent::Snapshot(fleet) => {
                    let active = fleet.values().filter(|v| v.is_active()).count();
                    info!(publishers = fleet.len(), active, "fleet snapshot");
                    for (id, view) in &fleet {
                        info!(publisher_id = %id, view = ?view, "publisher view");
                    }
                }
                FleetEvent::Error(e) => warn!(error = %e, "fleet subscription error"),
            }
        })
    }
}

fn builtin_routes() -> RouteTable {
    RouteTable::new(vec![
        Route {
            bus_number: "4".to_string(),
            registration: Some("UK07PA1234".to_string()),
            stops: vec![
                "Clock Tower".to_string(),
                "Railway Station".to_string(),
                "ISBT".to_string(),
            ],
        },
        Route {
            bus_number: "7".to_string(),
            registration: Some("UK07PB5678".to_string()),
            stops: vec![
                "Clock Tower".to_string(),
                "Rajpur Road".to_string(),
                "University".to_string(),
            ],
        },
    ])
}

fn load_routes(path: Option<&str>) -> Result<RouteTable, Box<dyn std::error::Error>> {
    match path {
        Some(path) => {
            let json = std::fs::read_to_string(path)?;
            Ok(RouteTable::from_json(&json)?)
        }
        None => Ok(builtin_routes()),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config = Config::load(parse_config_path().as_deref())?;
    info!(
        publisher_id = %config.publisher.id,
        interval_ms = config.publisher.interval_ms,
        "starting simulation"
    );

    let routes = load_routes(config.routes.path.as_deref())?;
    let index = StopIndex::build(&routes);
    for stop in index.stops() {
        info!(stop, buses = ?index.routes_serving(stop), "stop served by");
    }

    if !config.geocoder.api_key.is_empty() {
        let geocoder = HttpGeocoder::new(&config.geocoder);
        match geocoder.geocode("Clock Tower, Dehradun").await {
            Ok(Some(point)) => info!(
                latitude = point.latitude,
                longitude = point.longitude,
                "geocoded clock tower"
            ),
            Ok(None) => info!("clock tower not found by geocoder"),
            Err(e) => warn!(error = %e, "geocoding failed, continuing without it"),
        }
    }

    let store = Arc::new(MemoryStore::with_capacity(config.store.channel_capacity));

    let subscriber = Subscriber::new(store.clone());
    let subscription = subscriber.subscribe_all(Box::new(LoggingFleetSink));

    let publisher = Publisher::new(
        config.publisher.id.clone(),
        store,
        Arc::new(SimulatedRide::new()),
        Arc::new(AlwaysGranted),
        &config.publisher,
    );
    publisher.start(config.publisher.meta()).await?;

    tokio::signal::ctrl_c().await?;
    info!("shutting down");

    publisher.stop().await;
    subscription.close();
    Ok(())
}
