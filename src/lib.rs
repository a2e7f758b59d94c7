//! buspulse - live vehicle position publish/subscribe core
//!
//! A moving publisher (a bus driver's device) samples its position on a
//! fixed interval and writes it to a rendezvous store; any number of
//! subscribers observe one publisher or the whole fleet through
//! snapshot-delivering change subscriptions.

pub mod config;
pub mod geocode;
pub mod interfaces;
pub mod model;
pub mod publisher;
pub mod routes;
pub mod store;
pub mod subscriber;
pub mod utils;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
