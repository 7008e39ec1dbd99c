//! Delivery boundary between the tracking client and the network
//!
//! Two kinds of transport exist:
//! - [`Transport`]: request/response delivery that is awaited and whose
//!   failures trigger a requeue
//! - [`BeaconTransport`]: fire-and-forget delivery used when the host is about
//!   to tear down, where no response can be observed

use async_trait::async_trait;

use crate::error::Result;
use crate::types::Event;

/// Awaited request/response delivery
#[async_trait]
pub trait Transport: Send + Sync {
    /// Deliver one batch. `Ok` means the whole batch was accepted.
    async fn deliver(&self, batch: &[Event]) -> Result<()>;
}

/// Unload-safe fire-and-forget delivery
pub trait BeaconTransport: Send + Sync {
    /// Schedule delivery of `batch` without waiting for it.
    ///
    /// Returns an error only if the send could not be scheduled.
    fn send_beacon(&self, batch: &[Event]) -> Result<()>;
}
