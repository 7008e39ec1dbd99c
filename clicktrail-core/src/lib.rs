//! # clicktrail-core
//!
//! Core library for clicktrail - an interaction telemetry collector.
//!
//! This library provides:
//! - Domain types for interaction events
//! - User and session identity with durable client storage
//! - An in-memory event buffer with batched, retrying delivery
//! - Click heat map aggregation
//! - Configuration management
//! - Logging infrastructure
//!
//! ## Architecture
//!
//! Events flow one way:
//! - **Capture:** the host describes an interaction ([`capture`], [`heatmap::HeatmapClickSource`])
//! - **Buffer:** [`TrackingClient::track`] completes the event and queues it
//! - **Deliver:** flushes ship batches through a [`collector::Transport`];
//!   failed batches are requeued and resent first
//!
//! Independently, [`heatmap::compute_grid`] rebuilds a density grid from any
//! event history, typically [`TrackingClient::recent_events`].
//!
//! ## Example
//!
//! ```rust,no_run
//! use clicktrail_core::identity::{FileStorage, Identity};
//! use clicktrail_core::{Config, EventData, TrackingClient};
//!
//! # async fn run() -> clicktrail_core::Result<()> {
//! let config = Config::load()?;
//! let identity = Identity::new(Some(&FileStorage::open_default()));
//!
//! let client = TrackingClient::http(&config.tracking, identity)?;
//! client.start();
//! client.track("pageview", EventData::default());
//! client.destroy().await;
//! # Ok(())
//! # }
//! ```

// Re-export commonly used items at the crate root
pub use collector::{FlushOutcome, TrackingClient};
pub use config::Config;
pub use error::{Error, Result};
pub use identity::Identity;
pub use types::*;

// Public modules
pub mod capture;
pub mod collector;
pub mod config;
pub mod error;
pub mod heatmap;
pub mod identity;
pub mod logging;
pub mod types;
