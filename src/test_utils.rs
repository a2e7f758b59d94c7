//! Test doubles for the trait seams.
//!
//! Scripted and failure-injecting implementations so the publish and
//! subscribe paths can be exercised without a device or an external
//! store.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use tokio::sync::{broadcast, Mutex, RwLock};
use uuid::Uuid;

use crate::interfaces::location::{
    LocationError, LocationSource, PermissionGate, PermissionStatus, Result as LocationResult,
};
use crate::interfaces::store::{ChangeEvent, RendezvousStore, Result as StoreResult, StoreError};
use crate::model::{GeoPoint, PositionLogEntry, PublisherState};
use crate::subscriber::{FleetEvent, FleetSink, ViewEvent, ViewSink};

/// Permission gate with a fixed answer.
pub struct StaticPermissionGate {
    status: PermissionStatus,
}

impl StaticPermissionGate {
    pub fn granted() -> Self {
        Self {
            status: PermissionStatus::Granted,
        }
    }

    pub fn denied() -> Self {
        Self {
            status: PermissionStatus::Denied,
        }
    }
}

#[async_trait]
impl PermissionGate for StaticPermissionGate {
    async fn request_foreground_location(&self) -> PermissionStatus {
        self.status
    }
}

/// Location source that replays a script of outcomes, then errors.
pub struct ScriptedLocationSource {
    script: Mutex<VecDeque<LocationResult<GeoPoint>>>,
}

impl ScriptedLocationSource {
    /// Script of successful fixes; exhaustion yields `Unavailable`.
    pub fn with_fixes(fixes: Vec<GeoPoint>) -> Self {
        Self {
            script: Mutex::new(fixes.into_iter().map(Ok).collect()),
        }
    }

    /// Explicit script of per-read outcomes.
    pub fn with_results(results: Vec<LocationResult<GeoPoint>>) -> Self {
        Self {
            script: Mutex::new(results.into_iter().collect()),
        }
    }
}

#[async_trait]
impl LocationSource for ScriptedLocationSource {
    async fn current_position(&self) -> LocationResult<GeoPoint> {
        self.script
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Err(LocationError::Unavailable("position script exhausted".into())))
    }
}

/// Location source that always returns the same fix.
pub struct FixedLocationSource {
    fix: GeoPoint,
}

impl FixedLocationSource {
    pub fn new(fix: GeoPoint) -> Self {
        Self { fix }
    }
}

#[async_trait]
impl LocationSource for FixedLocationSource {
    async fn current_position(&self) -> LocationResult<GeoPoint> {
        Ok(self.fix)
    }
}

/// Store wrapper that injects failures per write operation.
pub struct FlakyStore {
    inner: Arc<dyn RendezvousStore>,
    fail_state_writes: RwLock<bool>,
    fail_log_appends: RwLock<bool>,
    fail_inactive_writes: RwLock<bool>,
}

impl FlakyStore {
    pub fn new(inner: Arc<dyn RendezvousStore>) -> Self {
        Self {
            inner,
            fail_state_writes: RwLock::new(false),
            fail_log_appends: RwLock::new(false),
            fail_inactive_writes: RwLock::new(false),
        }
    }

    pub async fn set_fail_state_writes(&self, fail: bool) {
        *self.fail_state_writes.write().await = fail;
    }

    pub async fn set_fail_log_appends(&self, fail: bool) {
        *self.fail_log_appends.write().await = fail;
    }

    pub async fn set_fail_inactive_writes(&self, fail: bool) {
        *self.fail_inactive_writes.write().await = fail;
    }
}

#[async_trait]
impl RendezvousStore for FlakyStore {
    async fn put_state(&self, publisher_id: &str, state: PublisherState) -> StoreResult<()> {
        if *self.fail_state_writes.read().await {
            return Err(StoreError::Unavailable("injected state write failure".into()));
        }
        self.inner.put_state(publisher_id, state).await
    }

    async fn mark_inactive(&self, publisher_id: &str) -> StoreResult<()> {
        if *self.fail_inactive_writes.read().await {
            return Err(StoreError::Unavailable("injected inactive write failure".into()));
        }
        self.inner.mark_inactive(publisher_id).await
    }

    async fn get_state(&self, publisher_id: &str) -> StoreResult<Option<PublisherState>> {
        self.inner.get_state(publisher_id).await
    }

    async fn append_log(&self, publisher_id: &str, entry: PositionLogEntry) -> StoreResult<Uuid> {
        if *self.fail_log_appends.read().await {
            return Err(StoreError::Unavailable("injected log append failure".into()));
        }
        self.inner.append_log(publisher_id, entry).await
    }

    async fn get_log(&self, publisher_id: &str) -> StoreResult<Vec<PositionLogEntry>> {
        self.inner.get_log(publisher_id).await
    }

    async fn list_publishers(&self) -> StoreResult<Vec<String>> {
        self.inner.list_publishers().await
    }

    fn changes(&self) -> broadcast::Receiver<ChangeEvent> {
        self.inner.changes()
    }
}

/// Sink recording every single-publisher event it receives.
#[derive(Default)]
pub struct CollectingViewSink {
    events: Arc<Mutex<Vec<ViewEvent>>>,
}

impl CollectingViewSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared handle to the recorded events; clone before boxing the sink.
    pub fn events(&self) -> Arc<Mutex<Vec<ViewEvent>>> {
        self.events.clone()
    }
}

impl ViewSink for CollectingViewSink {
    fn deliver(&self, event: ViewEvent) -> BoxFuture<'static, ()> {
        let events = self.events.clone();
        Box::pin(async move {
            events.lock().await.push(event);
        })
    }
}

/// Sink recording every fleet event it receives.
#[derive(Default)]
pub struct CollectingFleetSink {
    events: Arc<Mutex<Vec<FleetEvent>>>,
}

impl CollectingFleetSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Arc<Mutex<Vec<FleetEvent>>> {
        self.events.clone()
    }
}

impl FleetSink for CollectingFleetSink {
    fn deliver(&self, event: FleetEvent) -> BoxFuture<'static, ()> {
        let events = self.events.clone();
        Box::pin(async move {
            events.lock().await.push(event);
        })
    }
}
