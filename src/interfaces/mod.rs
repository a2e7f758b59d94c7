//! Abstract interfaces for buspulse components.
//!
//! These traits define the contracts for:
//! - The rendezvous store (per-publisher records, append-only logs,
//!   change notifications)
//! - Device location sampling and the permission gate
//! - The geocoding/directions collaborator

pub mod geocoder;
pub mod location;
pub mod store;

pub use geocoder::{GeocodeError, Geocoder, Polyline};
pub use location::{LocationError, LocationSource, PermissionGate, PermissionStatus};
pub use store::{ChangeEvent, ChangeKind, RendezvousStore, StoreError};
