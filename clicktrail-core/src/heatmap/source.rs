//! Passive click capture for heat maps
//!
//! [`HeatmapClickSource`] turns pointer samples on a page into
//! `heatmap_click` events. Which targets are recorded is decided by a
//! predicate supplied by the host (for example "skip interactive elements,
//! they already emit their own clicks").

use crate::capture::PointerSample;
use crate::collector::TrackingClient;
use crate::types::{Event, EventData, TargetInfo, EVENT_HEATMAP_CLICK};

/// Records page clicks for one page identifier
pub struct HeatmapClickSource<F> {
    page_identifier: String,
    accept: F,
}

impl<F> HeatmapClickSource<F>
where
    F: Fn(&TargetInfo) -> bool,
{
    pub fn new(page_identifier: impl Into<String>, accept: F) -> Self {
        Self {
            page_identifier: page_identifier.into(),
            accept,
        }
    }

    pub fn page_identifier(&self) -> &str {
        &self.page_identifier
    }

    /// Payload for `sample`, or `None` if the predicate rejects its target
    pub fn event_data(&self, sample: &PointerSample) -> Option<EventData> {
        if !(self.accept)(&sample.target) {
            return None;
        }

        let target = TargetInfo {
            page_identifier: Some(self.page_identifier.clone()),
            width: sample.element.map(|b| b.width).or(sample.target.width),
            height: sample.element.map(|b| b.height).or(sample.target.height),
            ..sample.target.clone()
        };

        Some(
            EventData::default()
                .with_target(target)
                .with_position(sample.position()),
        )
    }

    /// Track `sample` as a `heatmap_click` on `client`
    pub fn record(&self, client: &TrackingClient, sample: &PointerSample) -> Option<Event> {
        let data = self.event_data(sample)?;
        Some(client.track(EVENT_HEATMAP_CLICK, data))
    }
}

impl HeatmapClickSource<fn(&TargetInfo) -> bool> {
    /// Source that records every click
    pub fn all(page_identifier: impl Into<String>) -> Self {
        fn accept_all(_: &TargetInfo) -> bool {
            true
        }
        Self::new(page_identifier, accept_all as fn(&TargetInfo) -> bool)
    }
}
