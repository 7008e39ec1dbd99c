//! Event buffering and flush control
//!
//! The [`TrackingClient`] owns the queue of undelivered events. Events are
//! appended by [`TrackingClient::track`] and shipped when:
//! - the queue reaches the batch size
//! - the periodic flush timer fires
//! - flush is explicitly called
//! - the client is destroyed (immediate, best-effort)
//!
//! A failed delivery puts the whole batch back at the front of the queue, so
//! the next flush resends it ahead of anything tracked in the meantime.

use std::collections::VecDeque;
use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::{broadcast, Notify};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::config::TrackingConfig;
use crate::error::Result;
use crate::identity::{generate_id, Identity};
use crate::types::{Event, EventData, PageContext};

use super::http::HttpTransport;
use super::transport::{BeaconTransport, Transport};

const NOTIFY_CAPACITY: usize = 256;

/// Result of a single [`TrackingClient::flush`] call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Nothing was attempted
    Skipped(SkipReason),
    /// The transport accepted the batch
    Delivered { events: usize },
    /// The batch was handed to the beacon transport
    Beaconed { events: usize },
    /// Delivery failed and the batch is back at the front of the queue
    Requeued { events: usize },
}

/// Why a flush did nothing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The queue was empty
    Empty,
    /// A regular flush is already waiting on the transport
    InFlight,
}

/// Delivery statistics
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FlushStats {
    /// Flushes that swapped out a batch
    pub flushes: usize,
    /// Events accepted by the transport
    pub events_delivered: usize,
    /// Events handed to the beacon transport
    pub events_beaconed: usize,
    /// Events put back on the queue after a failure
    pub events_requeued: usize,
    /// Failed transport deliveries
    pub delivery_failures: usize,
    /// Successful beacon sends
    pub beacons_sent: usize,
    /// Beacon sends that could not be scheduled
    pub beacon_failures: usize,
}

/// Buffers interaction events and delivers them in batches
///
/// Cloning is cheap; all clones share one queue.
#[derive(Clone)]
pub struct TrackingClient {
    inner: Arc<Inner>,
}

struct Inner {
    identity: Identity,
    batch_size: usize,
    flush_interval: Duration,
    history_limit: usize,
    transport: Arc<dyn Transport>,
    beacon: Option<Arc<dyn BeaconTransport>>,
    state: Mutex<BufferState>,
    page: Mutex<PageContext>,
    notifier: broadcast::Sender<Event>,
    /// Signalled when the last delivery in flight finishes
    idle: Notify,
    timer: Mutex<Option<JoinHandle<()>>>,
}

#[derive(Default)]
struct BufferState {
    queue: Vec<Event>,
    /// Deliveries awaiting the transport; regular flushes require zero
    in_flight: usize,
    last_timestamp: i64,
    /// Newest first
    history: VecDeque<Event>,
    stats: FlushStats,
}

impl BufferState {
    /// Put a failed batch back ahead of everything queued since
    fn requeue(&mut self, mut batch: Vec<Event>) {
        batch.append(&mut self.queue);
        self.queue = batch;
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.get_mut().take() {
            timer.abort();
        }
    }
}

/// Builder for [`TrackingClient`]
pub struct TrackingClientBuilder {
    identity: Identity,
    transport: Arc<dyn Transport>,
    beacon: Option<Arc<dyn BeaconTransport>>,
    batch_size: usize,
    flush_interval: Duration,
    history_limit: usize,
    page: PageContext,
}

impl TrackingClientBuilder {
    /// Take batch size, flush interval and history limit from configuration
    pub fn config(mut self, config: &TrackingConfig) -> Self {
        self.batch_size = config.batch_size;
        self.flush_interval = config.flush_interval();
        self.history_limit = config.history_limit;
        self
    }

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = interval;
        self
    }

    pub fn history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    /// Transport used by immediate flushes
    pub fn beacon(mut self, beacon: Arc<dyn BeaconTransport>) -> Self {
        self.beacon = Some(beacon);
        self
    }

    pub fn page_context(mut self, page: PageContext) -> Self {
        self.page = page;
        self
    }

    pub fn build(self) -> TrackingClient {
        let (notifier, _) = broadcast::channel(NOTIFY_CAPACITY);
        let flush_interval = if self.flush_interval.is_zero() {
            TrackingConfig::default().flush_interval()
        } else {
            self.flush_interval
        };

        TrackingClient {
            inner: Arc::new(Inner {
                identity: self.identity,
                batch_size: self.batch_size.max(1),
                flush_interval,
                history_limit: self.history_limit,
                transport: self.transport,
                beacon: self.beacon,
                state: Mutex::new(BufferState::default()),
                page: Mutex::new(self.page),
                notifier,
                idle: Notify::new(),
                timer: Mutex::new(None),
            }),
        }
    }
}

impl TrackingClient {
    /// Start building a client around `transport`
    pub fn builder(identity: Identity, transport: Arc<dyn Transport>) -> TrackingClientBuilder {
        let defaults = TrackingConfig::default();
        TrackingClientBuilder {
            identity,
            transport,
            beacon: None,
            batch_size: defaults.batch_size,
            flush_interval: defaults.flush_interval(),
            history_limit: defaults.history_limit,
            page: PageContext::default(),
        }
    }

    /// Create a client delivering over HTTP
    ///
    /// The HTTP transport doubles as the beacon transport when
    /// `tracking.beacon` is enabled.
    pub fn http(config: &TrackingConfig, identity: Identity) -> Result<Self> {
        let transport = Arc::new(HttpTransport::new(config)?);
        let mut builder = Self::builder(identity, transport.clone()).config(config);
        if config.beacon {
            builder = builder.beacon(transport);
        }
        Ok(builder.build())
    }

    /// Record an event and queue it for delivery
    ///
    /// Fields not set in `data` are filled from the identity and the current
    /// page context. When the queue reaches the batch size a flush is spawned
    /// on the current Tokio runtime. Never blocks and never fails.
    pub fn track(&self, event_type: impl Into<String>, data: EventData) -> Event {
        let page = self.inner.page.lock().clone();

        let (event, batch_ready) = {
            let mut state = self.inner.state.lock();

            let timestamp = match data.timestamp {
                Some(ts) => ts,
                None => {
                    let now = Utc::now().timestamp_millis().max(state.last_timestamp);
                    state.last_timestamp = now;
                    now
                }
            };

            let event = Event {
                event_id: data.event_id.unwrap_or_else(|| generate_id("evt")),
                user_id: data
                    .user_id
                    .unwrap_or_else(|| self.inner.identity.user_id().to_string()),
                session_id: data
                    .session_id
                    .unwrap_or_else(|| self.inner.identity.session_id().to_string()),
                timestamp,
                event_type: event_type.into(),
                url: data.url.unwrap_or(page.url),
                referrer: data.referrer.or(page.referrer),
                title: data.title.or(page.title),
                target: data.target,
                position: data.position,
                device: data.device.or(page.device),
                metadata: data.metadata,
            };

            state.queue.push(event.clone());
            if self.inner.history_limit > 0 {
                state.history.push_front(event.clone());
                state.history.truncate(self.inner.history_limit);
            }

            (event, state.queue.len() >= self.inner.batch_size)
        };

        tracing::trace!(
            event_id = %event.event_id,
            event_type = %event.event_type,
            "Tracked event"
        );

        // No receivers is fine
        let _ = self.inner.notifier.send(event.clone());

        if batch_ready {
            self.spawn_flush();
        }

        event
    }

    fn spawn_flush(&self) {
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let client = self.clone();
                runtime.spawn(async move {
                    client.flush(false).await;
                });
            }
            Err(_) => {
                tracing::debug!("No async runtime, size-triggered flush deferred");
            }
        }
    }

    /// Send queued events
    ///
    /// Skips when the queue is empty, or when a regular flush is already in
    /// flight and `immediate` is false. An immediate flush with a beacon
    /// transport fires the beacon and returns without awaiting anything.
    pub async fn flush(&self, immediate: bool) -> FlushOutcome {
        let beacon = if immediate {
            self.inner.beacon.clone()
        } else {
            None
        };

        let batch = {
            let mut state = self.inner.state.lock();
            if state.queue.is_empty() {
                return FlushOutcome::Skipped(SkipReason::Empty);
            }
            if state.in_flight > 0 && !immediate {
                return FlushOutcome::Skipped(SkipReason::InFlight);
            }
            if beacon.is_none() {
                state.in_flight += 1;
            }
            state.stats.flushes += 1;
            std::mem::take(&mut state.queue)
        };

        match beacon {
            Some(beacon) => self.send_beacon(beacon.as_ref(), batch),
            None => self.deliver(batch).await,
        }
    }

    fn send_beacon(&self, beacon: &dyn BeaconTransport, batch: Vec<Event>) -> FlushOutcome {
        let events = batch.len();

        match beacon.send_beacon(&batch) {
            Ok(()) => {
                let mut state = self.inner.state.lock();
                state.stats.beacons_sent += 1;
                state.stats.events_beaconed += events;
                tracing::debug!(events, "Sent events by beacon");
                FlushOutcome::Beaconed { events }
            }
            Err(e) => {
                let mut state = self.inner.state.lock();
                state.requeue(batch);
                state.stats.beacon_failures += 1;
                state.stats.events_requeued += events;
                tracing::error!(events, error = %e, "Beacon send failed");
                FlushOutcome::Requeued { events }
            }
        }
    }

    async fn deliver(&self, batch: Vec<Event>) -> FlushOutcome {
        let events = batch.len();
        let mut in_flight = InFlight {
            inner: &self.inner,
            batch: Some(batch),
        };

        let result = self.inner.transport.deliver(in_flight.batch()).await;

        let mut state = self.inner.state.lock();
        match result {
            Ok(()) => {
                in_flight.batch = None;
                state.stats.events_delivered += events;
                tracing::debug!(events, "Delivered events");
                FlushOutcome::Delivered { events }
            }
            Err(e) => {
                // The batch stays in `in_flight` and is requeued when it drops
                state.stats.delivery_failures += 1;
                state.stats.events_requeued += events;
                tracing::error!(events, error = %e, "Failed to deliver events, requeued");
                FlushOutcome::Requeued { events }
            }
        }
    }

    /// Wait until no delivery is awaiting the transport
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            tokio::pin!(notified);
            // Register before checking so a wakeup in between is not missed
            notified.as_mut().enable();

            if !self.is_sending() {
                return;
            }
            notified.await;
        }
    }

    /// Deliver everything queued, including batches taken by flushes
    /// already in flight
    ///
    /// Stops at the first failed delivery of its own and returns that
    /// `Requeued` outcome; otherwise returns once the queue is empty and
    /// nothing is in flight.
    pub async fn drain(&self) -> FlushOutcome {
        let mut last = FlushOutcome::Skipped(SkipReason::Empty);
        loop {
            self.wait_idle().await;
            match self.flush(false).await {
                FlushOutcome::Skipped(SkipReason::Empty) => {
                    let state = self.inner.state.lock();
                    if state.in_flight == 0 && state.queue.is_empty() {
                        return last;
                    }
                }
                FlushOutcome::Skipped(SkipReason::InFlight) => {}
                outcome @ FlushOutcome::Requeued { .. } => return outcome,
                outcome => last = outcome,
            }
        }
    }

    /// Start the periodic flush timer
    ///
    /// Returns false if no Tokio runtime is running. Calling it again while
    /// the timer runs does nothing.
    pub fn start(&self) -> bool {
        let mut timer = self.inner.timer.lock();
        if timer.is_some() {
            return true;
        }

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(_) => {
                tracing::warn!("No async runtime, periodic flush disabled");
                return false;
            }
        };

        let period = self.inner.flush_interval;
        let weak = Arc::downgrade(&self.inner);
        *timer = Some(runtime.spawn(flush_periodically(weak, period)));

        tracing::debug!(interval_ms = period.as_millis() as u64, "Flush timer started");
        true
    }

    /// Stop the flush timer and flush everything immediately
    ///
    /// A flush already waiting on the transport is left to finish on its own.
    pub async fn destroy(&self) -> FlushOutcome {
        if let Some(timer) = self.inner.timer.lock().take() {
            timer.abort();
        }

        let outcome = self.flush(true).await;
        tracing::info!(?outcome, "Tracking client destroyed");
        outcome
    }

    /// Receive every event passed to [`track`](Self::track) from now on
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.inner.notifier.subscribe()
    }

    /// Most recent tracked events, newest first
    pub fn recent_events(&self) -> Vec<Event> {
        self.inner.state.lock().history.iter().cloned().collect()
    }

    pub fn set_page_context(&self, page: PageContext) {
        *self.inner.page.lock() = page;
    }

    pub fn page_context(&self) -> PageContext {
        self.inner.page.lock().clone()
    }

    pub fn user_id(&self) -> &str {
        self.inner.identity.user_id()
    }

    pub fn session_id(&self) -> &str {
        self.inner.identity.session_id()
    }

    /// Get number of events waiting for delivery
    pub fn pending_count(&self) -> usize {
        self.inner.state.lock().queue.len()
    }

    /// Check if there are any events waiting for delivery
    pub fn has_pending(&self) -> bool {
        !self.inner.state.lock().queue.is_empty()
    }

    /// Check if any delivery is waiting on the transport
    pub fn is_sending(&self) -> bool {
        self.inner.state.lock().in_flight > 0
    }

    /// Get current delivery statistics
    pub fn stats(&self) -> FlushStats {
        self.inner.state.lock().stats.clone()
    }

    pub fn batch_size(&self) -> usize {
        self.inner.batch_size
    }

    pub fn flush_interval(&self) -> Duration {
        self.inner.flush_interval
    }
}

/// A batch handed to the transport
///
/// Dropping it releases its in-flight slot and requeues the batch unless the
/// delivery succeeded, which also covers a flush future dropped mid-await.
struct InFlight<'a> {
    inner: &'a Inner,
    batch: Option<Vec<Event>>,
}

impl InFlight<'_> {
    fn batch(&self) -> &[Event] {
        self.batch.as_deref().unwrap_or_default()
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let idle = {
            let mut state = self.inner.state.lock();
            if let Some(batch) = self.batch.take() {
                state.requeue(batch);
            }
            state.in_flight = state.in_flight.saturating_sub(1);
            state.in_flight == 0
        };
        if idle {
            self.inner.idle.notify_waiters();
        }
    }
}

async fn flush_periodically(inner: Weak<Inner>, period: Duration) {
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        interval.tick().await;
        let Some(inner) = inner.upgrade() else {
            break;
        };
        // Detached so aborting the timer never cancels a delivery
        let client = TrackingClient { inner };
        tokio::spawn(async move {
            client.flush(false).await;
        });
    }
}
