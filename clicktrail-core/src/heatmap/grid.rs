//! Density grid computation
//!
//! Turns an event history into click counts per grid cell for one page.
//! The grid is rebuilt from scratch on every call; nothing is cached.

use std::collections::HashMap;

use serde::Serialize;

use crate::types::{Event, EVENT_CLICK, EVENT_HEATMAP_CLICK};

use super::filter::HeatmapFilter;

/// Intensity below which a cell is drawn in the low colour
pub const LOW_TIER_LIMIT: f64 = 0.33;
/// Intensity below which a cell is drawn in the medium colour
pub const MEDIUM_TIER_LIMIT: f64 = 0.66;

const DEFAULT_BUCKET_SIZE: f64 = 5.0;

/// Grid resolution and saturation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridParams {
    /// Cell size; coordinates snap to the nearest multiple
    pub bucket_size: f64,
    /// Count that reaches full intensity when no cell has more clicks
    pub threshold: u32,
}

impl Default for GridParams {
    fn default() -> Self {
        Self {
            bucket_size: DEFAULT_BUCKET_SIZE,
            threshold: 10,
        }
    }
}

/// Colour tier of a cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IntensityTier {
    Low,
    Medium,
    High,
}

impl IntensityTier {
    pub fn from_intensity(intensity: f64) -> Self {
        if intensity < LOW_TIER_LIMIT {
            IntensityTier::Low
        } else if intensity < MEDIUM_TIER_LIMIT {
            IntensityTier::Medium
        } else {
            IntensityTier::High
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            IntensityTier::Low => "low",
            IntensityTier::Medium => "medium",
            IntensityTier::High => "high",
        }
    }
}

impl std::fmt::Display for IntensityTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One grid cell with its accumulated clicks
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DensityPoint {
    pub x: f64,
    pub y: f64,
    pub count: u32,
    /// `count / max_count`, capped at 1
    pub intensity: f64,
}

impl DensityPoint {
    pub fn tier(&self) -> IntensityTier {
        IntensityTier::from_intensity(self.intensity)
    }

    /// Opacity for a renderer whose fully saturated cell uses `max_opacity`
    pub fn opacity(&self, max_opacity: f64) -> f64 {
        self.intensity * max_opacity
    }
}

/// Computed heat map for one page
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DensityGrid {
    /// Cells in the order they were first hit
    pub points: Vec<DensityPoint>,
    /// Divisor used for intensities; always at least 1
    pub max_count: u32,
}

impl DensityGrid {
    /// True when no click survived filtering ("no data")
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Clicks counted across all cells
    pub fn total_clicks(&self) -> u64 {
        self.points.iter().map(|p| u64::from(p.count)).sum()
    }

    /// Cell at exactly `(x, y)`, if any
    pub fn cell(&self, x: f64, y: f64) -> Option<&DensityPoint> {
        self.points.iter().find(|p| p.x == x && p.y == y)
    }

    pub fn iter(&self) -> impl Iterator<Item = &DensityPoint> {
        self.points.iter()
    }
}

/// Check if an event type carries a click position
pub fn is_position_bearing(event_type: &str) -> bool {
    event_type == EVENT_CLICK || event_type == EVENT_HEATMAP_CLICK
}

/// Build the density grid for `page_identifier`
///
/// Only click events are counted. Events without a page identifier match any
/// page. A non-positive bucket size falls back to the default of 5.
pub fn compute_grid(
    history: &[Event],
    page_identifier: &str,
    filter: Option<&HeatmapFilter>,
    params: &GridParams,
) -> DensityGrid {
    let bucket = if params.bucket_size.is_finite() && params.bucket_size > 0.0 {
        params.bucket_size
    } else {
        DEFAULT_BUCKET_SIZE
    };

    let mut cells: Vec<((i64, i64), u32)> = Vec::new();
    let mut index: HashMap<(i64, i64), usize> = HashMap::new();

    let relevant = history.iter().filter(|event| {
        is_position_bearing(&event.event_type)
            && event
                .page_identifier()
                .map_or(true, |page| page == page_identifier)
            && filter.map_or(true, |f| f.matches(event))
    });

    for event in relevant {
        let Some((x, y)) = resolve_coordinates(event) else {
            continue;
        };
        let key = (snap(x, bucket), snap(y, bucket));

        match index.get(&key) {
            Some(&i) => cells[i].1 += 1,
            None => {
                index.insert(key, cells.len());
                cells.push((key, 1));
            }
        }
    }

    let observed_max = cells.iter().map(|(_, count)| *count).max().unwrap_or(0);
    let max_count = observed_max.max(params.threshold).max(1);

    let points = cells
        .into_iter()
        .map(|((cx, cy), count)| DensityPoint {
            x: cx as f64 * bucket,
            y: cy as f64 * bucket,
            count,
            intensity: (f64::from(count) / f64::from(max_count)).min(1.0),
        })
        .collect();

    DensityGrid { points, max_count }
}

/// Page-relative coordinates where present, raw pointer coordinates otherwise
fn resolve_coordinates(event: &Event) -> Option<(f64, f64)> {
    let position = event.position.as_ref()?;
    let x = usable(position.page_x).or_else(|| usable(Some(position.x)))?;
    let y = usable(position.page_y).or_else(|| usable(Some(position.y)))?;
    Some((x, y))
}

fn usable(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}

/// Cell index of `value`, rounding to the nearest multiple of `bucket`
/// (halves round up)
fn snap(value: f64, bucket: f64) -> i64 {
    (value / bucket + 0.5).floor() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PositionInfo, TargetInfo};

    fn click_at(x: f64, y: f64) -> Event {
        Event {
            event_id: format!("evt_{}_{}", x, y),
            user_id: "user_1".to_string(),
            session_id: "session_1".to_string(),
            timestamp: 1_000,
            event_type: EVENT_CLICK.to_string(),
            url: "https://example.com/".to_string(),
            referrer: None,
            title: None,
            target: None,
            position: Some(PositionInfo {
                x,
                y,
                ..Default::default()
            }),
            device: None,
            metadata: serde_json::Map::new(),
        }
    }

    fn on_page(mut event: Event, page: &str, category: Option<&str>) -> Event {
        event.target = Some(TargetInfo {
            page_identifier: Some(page.to_string()),
            category: category.map(str::to_string),
            ..Default::default()
        });
        event
    }

    #[test]
    fn test_empty_history_yields_empty_grid() {
        let grid = compute_grid(&[], "/", None, &GridParams::default());
        assert!(grid.is_empty());
        assert_eq!(grid.len(), 0);
        assert_eq!(grid.max_count, 10);
    }

    #[test]
    fn test_single_click_is_floored_by_threshold() {
        let grid = compute_grid(&[click_at(10.0, 10.0)], "/", None, &GridParams::default());

        assert_eq!(grid.len(), 1);
        let point = grid.cell(10.0, 10.0).unwrap();
        assert_eq!(point.count, 1);
        assert!((point.intensity - 0.1).abs() < 1e-12);
        assert_eq!(point.tier(), IntensityTier::Low);
    }

    #[test]
    fn test_zero_threshold_never_divides_by_zero() {
        let params = GridParams {
            threshold: 0,
            ..Default::default()
        };
        let grid = compute_grid(&[click_at(10.0, 10.0)], "/", None, &params);

        assert_eq!(grid.max_count, 1);
        assert_eq!(grid.points[0].intensity, 1.0);

        let empty = compute_grid(&[], "/", None, &params);
        assert_eq!(empty.max_count, 1);
    }

    #[test]
    fn test_nearby_clicks_share_a_cell() {
        let history = vec![click_at(101.0, 101.0), click_at(102.0, 102.0)];
        let grid = compute_grid(&history, "/", None, &GridParams::default());

        assert_eq!(grid.len(), 1);
        assert_eq!(grid.cell(100.0, 100.0).unwrap().count, 2);
    }

    #[test]
    fn test_rounding_is_to_nearest_multiple() {
        let history = vec![
            click_at(101.0, 101.0),
            click_at(103.0, 103.0),
            click_at(102.5, 97.5),
        ];
        let grid = compute_grid(&history, "/", None, &GridParams::default());

        assert_eq!(grid.cell(100.0, 100.0).unwrap().count, 1);
        assert_eq!(grid.cell(105.0, 105.0).unwrap().count, 1);
        assert_eq!(grid.cell(105.0, 100.0).unwrap().count, 1);
    }

    #[test]
    fn test_custom_bucket_size() {
        let params = GridParams {
            bucket_size: 20.0,
            threshold: 1,
        };
        let history = vec![click_at(11.0, 49.0), click_at(25.0, 45.0)];
        let grid = compute_grid(&history, "/", None, &params);

        assert_eq!(grid.len(), 1);
        assert_eq!(grid.cell(20.0, 40.0).unwrap().count, 2);
    }

    #[test]
    fn test_invalid_bucket_falls_back_to_default() {
        let params = GridParams {
            bucket_size: 0.0,
            threshold: 10,
        };
        let grid = compute_grid(&[click_at(12.0, 12.0)], "/", None, &params);
        assert!(grid.cell(10.0, 10.0).is_some());
    }

    #[test]
    fn test_intensity_relative_to_busiest_cell() {
        let mut history = vec![click_at(0.0, 0.0); 20];
        history.extend(vec![click_at(50.0, 50.0); 10]);
        history.push(click_at(200.0, 200.0));

        let grid = compute_grid(&history, "/", None, &GridParams::default());

        assert_eq!(grid.max_count, 20);
        assert_eq!(grid.cell(0.0, 0.0).unwrap().intensity, 1.0);
        assert_eq!(grid.cell(0.0, 0.0).unwrap().tier(), IntensityTier::High);
        assert_eq!(grid.cell(50.0, 50.0).unwrap().tier(), IntensityTier::Medium);
        assert_eq!(grid.cell(200.0, 200.0).unwrap().tier(), IntensityTier::Low);
        assert_eq!(grid.total_clicks(), 31);
    }

    #[test]
    fn test_page_coordinates_preferred() {
        let mut event = click_at(10.0, 10.0);
        if let Some(position) = event.position.as_mut() {
            position.page_x = Some(10.0);
            position.page_y = Some(810.0);
        }
        let grid = compute_grid(&[event], "/", None, &GridParams::default());

        assert!(grid.cell(10.0, 810.0).is_some());
        assert!(grid.cell(10.0, 10.0).is_none());
    }

    #[test]
    fn test_events_without_usable_coordinates_dropped() {
        let mut no_position = click_at(0.0, 0.0);
        no_position.position = None;
        let nan = click_at(f64::NAN, 5.0);
        let mut nan_page_falls_back = click_at(30.0, 30.0);
        if let Some(position) = nan_page_falls_back.position.as_mut() {
            position.page_x = Some(f64::INFINITY);
        }

        let grid = compute_grid(
            &[no_position, nan, nan_page_falls_back],
            "/",
            None,
            &GridParams::default(),
        );

        assert_eq!(grid.len(), 1);
        assert!(grid.cell(30.0, 30.0).is_some());
    }

    #[test]
    fn test_recorded_event_missing_raw_y_dropped() {
        let recorded: Vec<Event> = serde_json::from_str(
            r#"[
                {"eventId": "evt_a", "userId": "u", "sessionId": "s", "timestamp": 1,
                 "eventType": "click", "url": "/", "position": {"pageX": 40}},
                {"eventId": "evt_b", "userId": "u", "sessionId": "s", "timestamp": 2,
                 "eventType": "click", "url": "/", "position": {"pageX": 40, "pageY": 20}}
            ]"#,
        )
        .unwrap();

        let grid = compute_grid(&recorded, "/", None, &GridParams::default());

        assert_eq!(grid.len(), 1);
        assert_eq!(grid.cell(40.0, 20.0).unwrap().count, 1);
    }

    #[test]
    fn test_only_click_types_counted() {
        let mut pageview = click_at(10.0, 10.0);
        pageview.event_type = "pageview".to_string();
        let mut passive = click_at(10.0, 10.0);
        passive.event_type = EVENT_HEATMAP_CLICK.to_string();

        let grid = compute_grid(
            &[pageview, passive, click_at(10.0, 10.0)],
            "/",
            None,
            &GridParams::default(),
        );

        assert_eq!(grid.cell(10.0, 10.0).unwrap().count, 2);
    }

    #[test]
    fn test_page_identifier_filtering() {
        let history = vec![
            on_page(click_at(10.0, 10.0), "/pricing", None),
            on_page(click_at(10.0, 10.0), "/docs", None),
            click_at(10.0, 10.0),
        ];
        let grid = compute_grid(&history, "/pricing", None, &GridParams::default());

        assert_eq!(grid.cell(10.0, 10.0).unwrap().count, 2);
    }

    #[test]
    fn test_category_not_in_allow_list_excluded() {
        let history = vec![
            on_page(click_at(10.0, 10.0), "/", Some("nav")),
            on_page(click_at(10.0, 10.0), "/", Some("ads")),
            on_page(click_at(10.0, 10.0), "/", None),
        ];
        let filter = HeatmapFilter {
            categories: vec!["nav".to_string()],
            ..Default::default()
        };
        let grid = compute_grid(&history, "/", Some(&filter), &GridParams::default());

        assert_eq!(grid.cell(10.0, 10.0).unwrap().count, 2);
    }

    #[test]
    fn test_time_range_filtering() {
        let mut early = click_at(10.0, 10.0);
        early.timestamp = 100;
        let mut middle = click_at(10.0, 10.0);
        middle.timestamp = 200;
        let mut late = click_at(10.0, 10.0);
        late.timestamp = 300;

        let filter = HeatmapFilter {
            start_time: Some(150),
            end_time: Some(250),
            ..Default::default()
        };
        let grid = compute_grid(
            &[early, middle, late],
            "/",
            Some(&filter),
            &GridParams::default(),
        );

        assert_eq!(grid.total_clicks(), 1);
    }

    #[test]
    fn test_compute_grid_is_idempotent() {
        let history = vec![
            click_at(1.0, 2.0),
            click_at(40.0, 41.0),
            click_at(2.0, 1.0),
            on_page(click_at(300.0, 120.0), "/", Some("nav")),
        ];
        let params = GridParams::default();

        let first = compute_grid(&history, "/", None, &params);
        let second = compute_grid(&history, "/", None, &params);
        assert_eq!(first, second);
    }

    #[test]
    fn test_cells_keep_first_seen_order() {
        let history = vec![click_at(50.0, 50.0), click_at(0.0, 0.0), click_at(50.0, 50.0)];
        let grid = compute_grid(&history, "/", None, &GridParams::default());

        assert_eq!((grid.points[0].x, grid.points[0].y), (50.0, 50.0));
        assert_eq!((grid.points[1].x, grid.points[1].y), (0.0, 0.0));
    }

    #[test]
    fn test_opacity_scales_with_intensity() {
        let point = DensityPoint {
            x: 0.0,
            y: 0.0,
            count: 5,
            intensity: 0.5,
        };
        assert!((point.opacity(0.8) - 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_tier_boundaries() {
        assert_eq!(IntensityTier::from_intensity(0.0), IntensityTier::Low);
        assert_eq!(IntensityTier::from_intensity(0.329), IntensityTier::Low);
        assert_eq!(IntensityTier::from_intensity(0.33), IntensityTier::Medium);
        assert_eq!(IntensityTier::from_intensity(0.659), IntensityTier::Medium);
        assert_eq!(IntensityTier::from_intensity(0.66), IntensityTier::High);
        assert_eq!(IntensityTier::from_intensity(1.0), IntensityTier::High);
    }
}
