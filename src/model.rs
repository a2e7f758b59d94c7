//! Record types shared by publishers, subscribers, and the rendezvous store.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Result type for model construction.
pub type Result<T> = std::result::Result<T, ModelError>;

/// Errors raised while constructing validated record types.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("latitude {0} outside [-90, 90]")]
    LatitudeOutOfRange(f64),

    #[error("longitude {0} outside [-180, 180]")]
    LongitudeOutOfRange(f64),
}

/// A raw coordinate pair, as produced by a device fix or a geocoder.
///
/// Unvalidated; validation happens when the pair is lifted into a
/// [`PositionSample`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// One instantaneous position reading.
///
/// `captured_at` is expected to be non-decreasing per publisher in
/// well-behaved operation; the store does not enforce it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionSample {
    pub latitude: f64,
    pub longitude: f64,
    pub captured_at: DateTime<Utc>,
}

impl PositionSample {
    /// Build a sample from a device fix, validating coordinate ranges.
    pub fn new(point: GeoPoint, captured_at: DateTime<Utc>) -> Result<Self> {
        if !(-90.0..=90.0).contains(&point.latitude) {
            return Err(ModelError::LatitudeOutOfRange(point.latitude));
        }
        if !(-180.0..=180.0).contains(&point.longitude) {
            return Err(ModelError::LongitudeOutOfRange(point.longitude));
        }
        Ok(Self {
            latitude: point.latitude,
            longitude: point.longitude,
            captured_at,
        })
    }

    pub fn point(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }
}

/// Descriptive fields supplied when a publish loop starts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublisherMeta {
    /// Driver display name.
    pub display_name: Option<String>,
    /// Bus number or fleet label.
    pub vehicle_label: Option<String>,
    /// Human-readable route description, e.g. "Clock Tower - University".
    pub route_label: Option<String>,
}

/// The per-publisher record in the rendezvous store.
///
/// Single logical writer: the publisher's own loop. Overwritten in full
/// on every successful tick; `active` is flipped to false on stop or on
/// the first failed sample. The record persists after stop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublisherState {
    pub position: PositionSample,
    pub active: bool,
    #[serde(default)]
    pub meta: PublisherMeta,
}

/// One entry in a publisher's append-only position log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionLogEntry {
    pub position: PositionSample,
}

/// What a subscriber knows about one publisher.
///
/// Explicit tri-state: a publisher that has never written is `Absent`
/// (never a zeroed position), one that stopped keeps its last known
/// position, and a live one carries the current sample.
#[derive(Debug, Clone, PartialEq)]
pub enum PublisherView {
    Absent,
    Inactive {
        last_known: PositionSample,
        meta: PublisherMeta,
    },
    Active {
        position: PositionSample,
        meta: PublisherMeta,
    },
}

impl PublisherView {
    /// Derive the view from a stored record (or its absence).
    pub fn from_record(record: Option<PublisherState>) -> Self {
        match record {
            None => Self::Absent,
            Some(state) if state.active => Self::Active {
                position: state.position,
                meta: state.meta,
            },
            Some(state) => Self::Inactive {
                last_known: state.position,
                meta: state.meta,
            },
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active { .. })
    }
}

/// Full snapshot of every publisher that has ever written, keyed by id.
///
/// Replaced wholesale on each fleet notification; subscribers never
/// patch individual entries.
pub type FleetView = BTreeMap<String, PublisherView>;
