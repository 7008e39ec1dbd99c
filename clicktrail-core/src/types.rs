//! Core domain types for clicktrail
//!
//! These types describe a single interaction event as it is buffered and
//! shipped to the collection endpoint. The serialized form uses camelCase
//! keys and omits absent optional fields.
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **Event** | One immutable interaction record (click, page view, form submit) |
//! | **Target** | The element the interaction happened on |
//! | **Position** | Pointer coordinates in raw, page, viewport and element space |
//! | **Page identifier** | Logical page name used to group clicks for heat maps |
//! | **Page context** | The url/referrer/title/device the host is currently showing |

use serde::{Deserialize, Deserializer, Serialize};

/// Plain click on a tracked element
pub const EVENT_CLICK: &str = "click";
/// Passive click recorded for heat maps
pub const EVENT_HEATMAP_CLICK: &str = "heatmap_click";
/// Page view
pub const EVENT_PAGEVIEW: &str = "pageview";
/// Form submission
pub const EVENT_FORM_SUBMIT: &str = "form_submit";

// ============================================
// Event
// ============================================

/// A complete interaction event.
///
/// Built by [`crate::TrackingClient::track`]; never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// Unique within a process lifetime (`evt_...`)
    pub event_id: String,
    pub user_id: String,
    pub session_id: String,
    /// Unix epoch milliseconds
    pub timestamp: i64,
    /// Open tag; see the `EVENT_*` constants for the well-known ones
    pub event_type: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referrer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<TargetInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<PositionInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<DeviceInfo>,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl Event {
    /// Logical page this event belongs to, if the target carries one
    pub fn page_identifier(&self) -> Option<&str> {
        self.target.as_ref()?.page_identifier.as_deref()
    }

    /// Category of the target, if any
    pub fn category(&self) -> Option<&str> {
        self.target.as_ref()?.category.as_deref()
    }
}

/// Descriptor of the element an event happened on
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, rename = "class", skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,

    // Form metadata
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub form_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub form_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub form_action: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub form_method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<FormField>>,

    // Categorization
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,

    // Heat map grouping and element dimensions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_identifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
}

/// A named form control observed at submit time. Values are never captured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormField {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    pub has_value: bool,
}

/// Pointer coordinates attached to an event.
///
/// `x`/`y` are the raw pointer coordinates as reported by the host. The other
/// pairs are optional refinements: page-relative (scroll included),
/// viewport-relative and element-relative.
///
/// A raw coordinate missing from the input reads as NaN, so a malformed
/// position is skipped by aggregation instead of failing the whole record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionInfo {
    #[serde(default = "missing_coordinate", deserialize_with = "raw_coordinate")]
    pub x: f64,
    #[serde(default = "missing_coordinate", deserialize_with = "raw_coordinate")]
    pub y: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_y: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viewport_x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viewport_y: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relative_x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relative_y: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viewport_width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viewport_height: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scroll_x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scroll_y: Option<f64>,
}

fn missing_coordinate() -> f64 {
    f64::NAN
}

/// NaN serializes as `null`; read it back the same way
fn raw_coordinate<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
}

/// Class of device the host runs on
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    #[default]
    Desktop,
    Mobile,
    Tablet,
}

impl DeviceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceType::Desktop => "desktop",
            DeviceType::Mobile => "mobile",
            DeviceType::Tablet => "tablet",
        }
    }
}

impl std::str::FromStr for DeviceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "desktop" => Ok(DeviceType::Desktop),
            "mobile" => Ok(DeviceType::Mobile),
            "tablet" => Ok(DeviceType::Tablet),
            _ => Err(format!("unknown device type: {}", s)),
        }
    }
}

impl std::fmt::Display for DeviceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Device descriptor supplied by the host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    #[serde(rename = "type")]
    pub device_type: DeviceType,
    pub browser: String,
    pub os: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os_version: Option<String>,
    /// `WIDTHxHEIGHT`
    pub screen_size: String,
}

impl Default for DeviceInfo {
    fn default() -> Self {
        Self {
            device_type: DeviceType::Desktop,
            browser: "unknown".to_string(),
            os: "unknown".to_string(),
            os_version: None,
            screen_size: "0x0".to_string(),
        }
    }
}

// ============================================
// Track input
// ============================================

/// Caller-supplied part of an event.
///
/// Every field is optional. Fields left as `None` are auto-filled by the
/// tracking client; fields set here take precedence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventData {
    #[serde(default)]
    pub event_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub timestamp: Option<i64>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub referrer: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub target: Option<TargetInfo>,
    #[serde(default)]
    pub position: Option<PositionInfo>,
    #[serde(default)]
    pub device: Option<DeviceInfo>,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl EventData {
    pub fn with_target(mut self, target: TargetInfo) -> Self {
        self.target = Some(target);
        self
    }

    pub fn with_position(mut self, position: PositionInfo) -> Self {
        self.position = Some(position);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// What the host is currently showing; used to auto-fill events.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageContext {
    pub url: String,
    pub referrer: Option<String>,
    pub title: Option<String>,
    pub device: Option<DeviceInfo>,
}

impl PageContext {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }
}
