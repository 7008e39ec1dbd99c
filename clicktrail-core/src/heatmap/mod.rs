//! Click heat maps
//!
//! Aggregates positioned click events into a grid of density points:
//! - [`compute_grid`] is a pure function of the event history and parameters
//! - [`HeatmapFilter`] / [`TimeRange`] narrow which clicks are counted
//! - [`ColorScheme`] maps intensity tiers to colours for renderers
//! - [`HeatmapClickSource`] records passive page clicks as events

mod filter;
mod grid;
mod palette;
mod source;

pub use filter::{HeatmapFilter, TimeRange};
pub use grid::{
    compute_grid, is_position_bearing, DensityGrid, DensityPoint, GridParams, IntensityTier,
    LOW_TIER_LIMIT, MEDIUM_TIER_LIMIT,
};
pub use palette::{ColorScheme, Palette, Rgba};
pub use source::HeatmapClickSource;
