//! The map engine boundary.
//!
//! `MapEngine` is the capability set the controller relies on: source and
//! layer registration, the feature-state store, filters, layout properties,
//! popups and the cursor. `TerminalEngine` implements it on top of a braille
//! canvas and also owns projection, hit-testing and pointer event synthesis.

#[cfg(test)]
pub(crate) mod fixtures;
mod render;
mod source;
mod terminal;

pub use render::MapFrame;
pub use source::{GeoJsonSource, GeoJsonSourceSpec, SourceData, SourceError, SourceFeature};
pub use terminal::{NavButton, SourceSlot, TerminalEngine};

use crate::geo::LngLat;
use crate::style::{Expression, FeatureState, LayerSpec, LayoutProperty};

/// Feature identifier, generated from the feature's position when requested
pub type FeatureId = u64;

/// Options the map view is constructed from
#[derive(Debug, Clone, PartialEq)]
pub struct MapView {
    pub container: String,
    pub style: String,
    pub center: LngLat,
    pub zoom: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    /// Zoom in/out and reset-north buttons
    Navigation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Cursor {
    #[default]
    Default,
    Pointer,
}

/// A transient text box anchored at a map coordinate
#[derive(Debug, Clone, PartialEq)]
pub struct Popup {
    pub lng_lat: LngLat,
    pub html: String,
    /// Close when the map is next clicked
    pub close_on_click: bool,
}

impl Popup {
    pub fn new(lng_lat: LngLat, html: impl Into<String>) -> Self {
        Self {
            lng_lat,
            html: html.into(),
            close_on_click: true,
        }
    }

    /// Popup content with markup removed
    pub fn text(&self) -> String {
        let mut out = String::with_capacity(self.html.len());
        let mut in_tag = false;
        for ch in self.html.chars() {
            match ch {
                '<' => in_tag = true,
                '>' if in_tag => in_tag = false,
                _ if !in_tag => out.push(ch),
                _ => {}
            }
        }
        out
    }
}

/// Imperative map API used by the controller.
///
/// Mutators never fail towards the caller: a bad layer or source id is
/// reported by the engine itself and the call is ignored.
pub trait MapEngine {
    fn add_control(&mut self, control: Control);

    fn add_source(&mut self, id: &str, spec: GeoJsonSourceSpec);

    fn add_layer(&mut self, layer: LayerSpec);

    /// Merge `state` into the feature's existing state
    fn set_feature_state(&mut self, source: &str, id: FeatureId, state: FeatureState);

    fn feature_state(&self, source: &str, id: FeatureId) -> FeatureState;

    /// Replace the layer's filter; `None` shows every feature
    fn set_filter(&mut self, layer_id: &str, filter: Option<Expression>);

    fn set_layout_property(&mut self, layer_id: &str, property: LayoutProperty);

    fn show_popup(&mut self, popup: Popup);

    fn set_cursor(&mut self, cursor: Cursor);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_popup_text_strips_markup() {
        let popup = Popup::new(LngLat::default(), "<b>Alberta</b>: 4262635");
        assert_eq!(popup.text(), "Alberta: 4262635");
        assert!(popup.close_on_click);
    }
}
