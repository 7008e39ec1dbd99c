//! Payload builders for common interactions
//!
//! Hosts translate their native input events into the plain descriptors
//! below; these helpers shape them into [`EventData`] for
//! [`crate::TrackingClient::track`].

use serde_json::json;

use crate::types::{EventData, FormField, PositionInfo, TargetInfo};

/// Bounding box of an element in viewport coordinates
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ElementBox {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

/// A pointer press as observed by the host
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointerSample {
    /// Viewport-relative pointer position
    pub client_x: f64,
    pub client_y: f64,
    pub scroll_x: f64,
    pub scroll_y: f64,
    pub viewport_width: f64,
    pub viewport_height: f64,
    /// Box of the element under the pointer, if known
    pub element: Option<ElementBox>,
    /// Descriptor of the element under the pointer
    pub target: TargetInfo,
}

impl PointerSample {
    /// Position with page, viewport and element-relative variants filled in
    pub fn position(&self) -> PositionInfo {
        PositionInfo {
            x: self.client_x,
            y: self.client_y,
            page_x: Some(self.client_x + self.scroll_x),
            page_y: Some(self.client_y + self.scroll_y),
            viewport_x: Some(self.client_x),
            viewport_y: Some(self.client_y),
            relative_x: self.element.map(|b| self.client_x - b.left),
            relative_y: self.element.map(|b| self.client_y - b.top),
            viewport_width: Some(self.viewport_width),
            viewport_height: Some(self.viewport_height),
            scroll_x: Some(self.scroll_x),
            scroll_y: Some(self.scroll_y),
        }
    }
}

/// A form at submit time
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormSnapshot {
    pub id: Option<String>,
    pub class_name: Option<String>,
    pub action: Option<String>,
    pub method: Option<String>,
    pub controls: Vec<FormField>,
}

/// Page view of `url`, with its path and query string in metadata
pub fn pageview(url: &str, title: Option<&str>) -> EventData {
    let (path, search) = match reqwest::Url::parse(url) {
        Ok(parsed) => (
            parsed.path().to_string(),
            parsed.query().map(|q| format!("?{}", q)).unwrap_or_default(),
        ),
        Err(_) => (url.to_string(), String::new()),
    };

    EventData {
        url: Some(url.to_string()),
        title: title.map(str::to_string),
        ..Default::default()
    }
    .with_metadata("path", json!(path))
    .with_metadata("search", json!(search))
}

/// Click on a tracked element
pub fn click(sample: &PointerSample, category: Option<&str>, label: Option<&str>) -> EventData {
    let target = TargetInfo {
        tag_name: sample.target.tag_name.as_deref().map(str::to_lowercase),
        id: Some(sample.target.id.clone().unwrap_or_default()),
        category: category.map(str::to_string),
        label: label.map(str::to_string),
        ..sample.target.clone()
    };
    let position = PositionInfo {
        x: sample.client_x,
        y: sample.client_y,
        viewport_width: Some(sample.viewport_width),
        viewport_height: Some(sample.viewport_height),
        ..Default::default()
    };

    EventData::default()
        .with_target(target)
        .with_position(position)
}

/// Form submission; only control names, types and presence of a value are kept
pub fn form_submit(form: &FormSnapshot, form_name: &str) -> EventData {
    let id = form.id.clone().unwrap_or_default();
    let target = TargetInfo {
        tag_name: Some("form".to_string()),
        id: Some(id.clone()),
        class_name: Some(form.class_name.clone().unwrap_or_default()),
        form_id: Some(id),
        form_action: Some(form.action.clone().unwrap_or_default()),
        form_method: Some(form.method.clone().unwrap_or_else(|| "get".to_string())),
        ..Default::default()
    };
    let fields: Vec<&FormField> = form
        .controls
        .iter()
        .filter(|field| !field.name.is_empty())
        .collect();

    EventData::default()
        .with_target(target)
        .with_metadata("formName", json!(form_name))
        .with_metadata("fields", json!(fields))
}
