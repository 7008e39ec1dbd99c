//! Event collection and delivery
//!
//! This module buffers interaction events in memory and ships them to a
//! collection endpoint in batches.
//!
//! ## Architecture
//!
//! The collector never blocks or fails the code that produces events:
//! - [`TrackingClient::track`] is synchronous and returns the finished event
//! - Delivery happens on flush, through a [`Transport`]
//! - A failed batch is requeued ahead of newer events and resent on the next flush
//! - On teardown, [`TrackingClient::destroy`] hands the remaining events to a
//!   [`BeaconTransport`] when one is configured
//!
//! ## Usage
//!
//! Configure the endpoint in `~/.config/clicktrail/config.toml`:
//!
//! ```toml
//! [tracking]
//! endpoint = "https://telemetry.example.com/api/track"
//! batch_size = 20
//! flush_interval_ms = 5000
//! ```

mod http;
mod tracker;
mod transport;

pub use http::{batch_id, HttpTransport, MAX_BEACON_BYTES};
pub use tracker::{FlushOutcome, FlushStats, SkipReason, TrackingClient, TrackingClientBuilder};
pub use transport::{BeaconTransport, Transport};
