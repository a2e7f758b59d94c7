//! Device location sampling and permission interfaces.

use async_trait::async_trait;

use crate::model::GeoPoint;

/// Result type for location sampling.
pub type Result<T> = std::result::Result<T, LocationError>;

/// Errors raised by the device location source.
#[derive(Debug, thiserror::Error)]
pub enum LocationError {
    #[error("position unavailable: {0}")]
    Unavailable(String),
}

/// Outcome of a foreground location permission request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionStatus {
    Granted,
    Denied,
}

/// Interactive permission prompt, treated as a black box.
///
/// The OS dialog and any "open settings" remediation flow belong to the
/// embedding application, not to this crate.
#[async_trait]
pub trait PermissionGate: Send + Sync {
    /// Request foreground location permission, prompting if necessary.
    async fn request_foreground_location(&self) -> PermissionStatus;
}

/// Source of current device position fixes.
///
/// Sampling is the only meaningfully blocking operation in the publish
/// loop; one call per tick.
#[async_trait]
pub trait LocationSource: Send + Sync {
    /// Read the current device position.
    async fn current_position(&self) -> Result<GeoPoint>;
}
