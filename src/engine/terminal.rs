use std::collections::{BTreeSet, HashMap};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;

use geojson::FeatureCollection;
use glam::DVec2;
use tracing::{debug, error, info, trace};

use crate::event::{EventKind, MapEvent, PointerEvent, RenderedFeature};
use crate::geo::LngLat;
use crate::map::{Basemap, Viewport};
use crate::style::{Expression, FeatureState, LayerSpec, LayoutProperty};

use super::render::{MapFrame, Scene};
use super::source::{GeoJsonSource, GeoJsonSourceSpec, SourceData, SourceError};
use super::{Control, Cursor, FeatureId, MapEngine, MapView, Popup};

pub(super) type Sources = HashMap<String, SourceSlot>;
pub(super) type FeatureStates = HashMap<String, HashMap<FeatureId, FeatureState>>;

/// Lifecycle of a registered source
#[derive(Debug)]
pub enum SourceSlot {
    Loading,
    Ready(GeoJsonSource),
    Failed(String),
}

impl SourceSlot {
    pub fn ready(&self) -> Option<&GeoJsonSource> {
        match self {
            SourceSlot::Ready(source) => Some(source),
            _ => None,
        }
    }
}

struct PendingLoad {
    source: String,
    generate_id: bool,
    rx: Receiver<Result<FeatureCollection, SourceError>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavButton {
    ZoomIn,
    ZoomOut,
    Reset,
}

impl NavButton {
    /// Top to bottom
    pub const ALL: [NavButton; 3] = [NavButton::ZoomIn, NavButton::ZoomOut, NavButton::Reset];

    pub fn glyph(self) -> char {
        match self {
            NavButton::ZoomIn => '+',
            NavButton::ZoomOut => '−',
            NavButton::Reset => '⌖',
        }
    }
}

/// Map engine drawing into a terminal character grid.
///
/// Coordinates passed in are braille pixels relative to the map area
/// (2 per column, 4 per row).
pub struct TerminalEngine {
    viewport: Viewport,
    home: (LngLat, f64),
    basemap: Basemap,
    controls: Vec<Control>,
    sources: Sources,
    pending: Vec<PendingLoad>,
    layers: Vec<LayerSpec>,
    feature_states: FeatureStates,
    popup: Option<Popup>,
    cursor: Cursor,
    /// Layers with a rendered feature under the pointer
    pointer_over: BTreeSet<String>,
    events: Vec<MapEvent>,
    loaded: bool,
}

impl TerminalEngine {
    pub fn new(view: &MapView, basemap: Basemap, width: usize, height: usize) -> Self {
        debug!(container = %view.container, style = %view.style, "creating map view");
        Self {
            viewport: Viewport::new(view.center, view.zoom, width, height),
            home: (view.center, view.zoom),
            basemap,
            controls: Vec::new(),
            sources: HashMap::new(),
            pending: Vec::new(),
            layers: Vec::new(),
            feature_states: HashMap::new(),
            popup: None,
            cursor: Cursor::Default,
            pointer_over: BTreeSet::new(),
            events: Vec::new(),
            loaded: false,
        }
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    /// Update the canvas size (braille pixels) when the terminal resizes
    pub fn resize(&mut self, width: usize, height: usize) {
        self.viewport.width = width;
        self.viewport.height = height;
    }

    pub fn pan(&mut self, dx: i32, dy: i32) {
        self.viewport.pan(dx, dy);
    }

    pub fn zoom_in(&mut self) {
        self.viewport.zoom_in();
    }

    pub fn zoom_out(&mut self) {
        self.viewport.zoom_out();
    }

    pub fn zoom_in_at(&mut self, px: i32, py: i32) {
        self.viewport.zoom_in_at(px, py);
    }

    pub fn zoom_out_at(&mut self, px: i32, py: i32) {
        self.viewport.zoom_out_at(px, py);
    }

    /// Return to the center and zoom the view was created with
    pub fn reset_view(&mut self) {
        let (center, zoom) = self.home;
        self.viewport = Viewport::new(center, zoom, self.viewport.width, self.viewport.height);
    }

    pub fn popup(&self) -> Option<&Popup> {
        self.popup.as_ref()
    }

    pub fn close_popup(&mut self) -> bool {
        self.popup.take().is_some()
    }

    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    pub fn has_control(&self, control: Control) -> bool {
        self.controls.contains(&control)
    }

    pub fn layer(&self, id: &str) -> Option<&LayerSpec> {
        self.layers.iter().find(|l| l.id == id)
    }

    pub fn source(&self, id: &str) -> Option<&SourceSlot> {
        self.sources.get(id)
    }

    /// Events produced since the last call; the first call yields `Load`
    pub fn drain_events(&mut self) -> Vec<MapEvent> {
        if !self.loaded {
            self.loaded = true;
            self.events.insert(0, MapEvent::load());
        }
        std::mem::take(&mut self.events)
    }

    /// Install source data that finished loading in the background
    pub fn poll_sources(&mut self) {
        let mut still_pending = Vec::with_capacity(self.pending.len());
        for load in self.pending.drain(..) {
            let slot = match load.rx.try_recv() {
                Ok(Ok(fc)) => {
                    let source = GeoJsonSource::from_collection(fc, load.generate_id);
                    let count = source.features().len();
                    info!(source = %load.source, features = count, "source loaded");
                    SourceSlot::Ready(source)
                }
                Ok(Err(e)) => {
                    error!(source = %load.source, error = %e, "source failed to load");
                    SourceSlot::Failed(e.to_string())
                }
                Err(TryRecvError::Empty) => {
                    still_pending.push(load);
                    continue;
                }
                Err(TryRecvError::Disconnected) => {
                    error!(source = %load.source, "source loader exited without a result");
                    SourceSlot::Failed("loader exited".to_string())
                }
            };
            self.sources.insert(load.source, slot);
        }
        self.pending = still_pending;
    }

    /// Features of `layer_id` rendered at `lng_lat`, topmost first. Hidden
    /// layers and features excluded by the layer filter are not rendered.
    pub fn query_rendered_features(&self, layer_id: &str, lng_lat: LngLat) -> Vec<RenderedFeature> {
        let Some(layer) = self.layer(layer_id).filter(|l| l.is_visible()) else {
            return Vec::new();
        };
        let Some(source) = self.sources.get(&layer.source).and_then(SourceSlot::ready) else {
            return Vec::new();
        };
        let states = self.feature_states.get(&layer.source);
        let empty = FeatureState::new();

        source
            .features_at(DVec2::new(lng_lat.lng, lng_lat.lat))
            .filter_map(|feature| {
                let state = match feature.id.and_then(|id| states?.get(&id)) {
                    Some(state) => state,
                    None => &empty,
                };
                let ctx = crate::style::EvalContext {
                    properties: &feature.properties,
                    state,
                };
                layer.passes_filter(&ctx).then(|| RenderedFeature {
                    id: feature.id,
                    source: layer.source.clone(),
                    layer: layer.id.clone(),
                    properties: feature.properties.clone(),
                    state: state.clone(),
                })
            })
            .collect()
    }

    fn pointer_event(&self, px: i32, py: i32, features: Vec<RenderedFeature>) -> PointerEvent {
        PointerEvent {
            lng_lat: self.viewport.unproject(px, py),
            point: (px, py),
            features,
        }
    }

    fn emit(&mut self, kind: EventKind, layer: &str, ev: PointerEvent) {
        self.events.push(MapEvent::pointer(kind, layer, ev));
    }

    /// Pointer moved to (px, py): emits enter/move/leave per layer
    pub fn pointer_moved(&mut self, px: i32, py: i32) {
        let lng_lat = self.viewport.unproject(px, py);
        let layer_ids: Vec<String> = self.layers.iter().map(|l| l.id.clone()).collect();

        for id in layer_ids {
            let features = self.query_rendered_features(&id, lng_lat);
            let was_over = self.pointer_over.contains(&id);

            if features.is_empty() {
                if was_over {
                    self.pointer_over.remove(&id);
                    let ev = self.pointer_event(px, py, Vec::new());
                    self.emit(EventKind::MouseLeave, &id, ev);
                }
                continue;
            }

            if !was_over {
                self.pointer_over.insert(id.clone());
                let ev = self.pointer_event(px, py, features.clone());
                self.emit(EventKind::MouseEnter, &id, ev);
            }
            let ev = self.pointer_event(px, py, features);
            self.emit(EventKind::MouseMove, &id, ev);
        }
    }

    /// Pointer left the map area: every layer it was over gets a leave
    pub fn pointer_left(&mut self) {
        for id in std::mem::take(&mut self.pointer_over) {
            let ev = PointerEvent {
                lng_lat: self.viewport.center,
                point: (-1, -1),
                features: Vec::new(),
            };
            self.emit(EventKind::MouseLeave, &id, ev);
        }
    }

    /// Primary click at (px, py)
    pub fn click(&mut self, px: i32, py: i32) {
        if let Some(button) = self.navigation_button_at(px, py) {
            self.press(button);
            return;
        }

        if self.popup.as_ref().is_some_and(|p| p.close_on_click) {
            self.popup = None;
        }

        let lng_lat = self.viewport.unproject(px, py);
        let layer_ids: Vec<String> = self.layers.iter().map(|l| l.id.clone()).collect();
        for id in layer_ids {
            let features = self.query_rendered_features(&id, lng_lat);
            if !features.is_empty() {
                let ev = self.pointer_event(px, py, features);
                self.emit(EventKind::Click, &id, ev);
            }
        }
    }

    /// Character cells of the navigation buttons, when the control is added
    pub fn navigation_layout(&self) -> Vec<(usize, usize, NavButton)> {
        let cols = self.viewport.width / 2;
        let rows = self.viewport.height / 4;
        if !self.has_control(Control::Navigation) || cols < 3 || rows < NavButton::ALL.len() {
            return Vec::new();
        }
        NavButton::ALL
            .iter()
            .enumerate()
            .map(|(row, &button)| (cols - 2, row, button))
            .collect()
    }

    fn navigation_button_at(&self, px: i32, py: i32) -> Option<NavButton> {
        if px < 0 || py < 0 {
            return None;
        }
        let (cx, cy) = (px as usize / 2, py as usize / 4);
        self.navigation_layout()
            .into_iter()
            .find(|&(bx, by, _)| bx == cx && by == cy)
            .map(|(_, _, button)| button)
    }

    pub fn press(&mut self, button: NavButton) {
        trace!(?button, "navigation control");
        match button {
            NavButton::ZoomIn => self.zoom_in(),
            NavButton::ZoomOut => self.zoom_out(),
            NavButton::Reset => self.reset_view(),
        }
    }

    /// Draw the current state at the viewport's size
    pub fn render(&self) -> MapFrame {
        let scene = Scene {
            basemap: &self.basemap,
            layers: &self.layers,
            sources: &self.sources,
            states: &self.feature_states,
            viewport: &self.viewport,
        };
        scene.render(self.viewport.width / 2, self.viewport.height / 4)
    }

    fn layer_mut(&mut self, id: &str) -> Option<&mut LayerSpec> {
        let layer = self.layers.iter_mut().find(|l| l.id == id);
        if layer.is_none() {
            error!(layer = id, "layer does not exist in the map's style");
        }
        layer
    }
}

impl MapEngine for TerminalEngine {
    fn add_control(&mut self, control: Control) {
        if !self.controls.contains(&control) {
            self.controls.push(control);
        }
    }

    fn add_source(&mut self, id: &str, spec: GeoJsonSourceSpec) {
        if self.sources.contains_key(id) {
            error!(source = id, "there is already a source with this id");
            return;
        }

        let data = match spec.data {
            SourceData::Inline(fc) => {
                let slot = SourceSlot::Ready(GeoJsonSource::from_collection(fc, spec.generate_id));
                self.sources.insert(id.to_string(), slot);
                return;
            }
            remote => remote,
        };

        info!(source = id, data = ?data, "loading source");
        let (tx, rx) = mpsc::channel();
        let spawned = thread::Builder::new()
            .name(format!("source-{id}"))
            .spawn(move || {
                // Receiver may be gone if the app quit mid-load
                let _ = tx.send(data.load());
            });

        match spawned {
            Ok(_) => {
                self.sources.insert(id.to_string(), SourceSlot::Loading);
                self.pending.push(PendingLoad {
                    source: id.to_string(),
                    generate_id: spec.generate_id,
                    rx,
                });
            }
            Err(e) => {
                error!(source = id, error = %e, "could not start source loader");
                let slot = SourceSlot::Failed(e.to_string());
                self.sources.insert(id.to_string(), slot);
            }
        }
    }

    fn add_layer(&mut self, layer: LayerSpec) {
        if self.layer(&layer.id).is_some() {
            error!(layer = %layer.id, "layer already exists");
            return;
        }
        if !self.sources.contains_key(&layer.source) {
            error!(layer = %layer.id, source = %layer.source, "source not found");
            return;
        }
        debug!(layer = %layer.id, "layer added");
        self.layers.push(layer);
    }

    fn set_feature_state(&mut self, source: &str, id: FeatureId, state: FeatureState) {
        if !self.sources.contains_key(source) {
            error!(source, "cannot set feature state: source does not exist");
            return;
        }
        trace!(source, id, ?state, "feature state");
        self.feature_states
            .entry(source.to_string())
            .or_default()
            .entry(id)
            .or_default()
            .extend(state);
    }

    fn feature_state(&self, source: &str, id: FeatureId) -> FeatureState {
        self.feature_states
            .get(source)
            .and_then(|states| states.get(&id))
            .cloned()
            .unwrap_or_default()
    }

    fn set_filter(&mut self, layer_id: &str, filter: Option<Expression>) {
        if let Some(layer) = self.layer_mut(layer_id) {
            layer.filter = filter;
        }
    }

    fn set_layout_property(&mut self, layer_id: &str, property: LayoutProperty) {
        if let Some(layer) = self.layer_mut(layer_id) {
            match property {
                LayoutProperty::Visibility(v) => layer.layout.visibility = v,
            }
        }
    }

    fn show_popup(&mut self, popup: Popup) {
        self.popup = Some(popup);
    }

    fn set_cursor(&mut self, cursor: Cursor) {
        self.cursor = cursor;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::fixtures::{self, LAYER, SOURCE};
    use crate::style::{Rgb, Visibility};
    use serde_json::json;

    fn state(value: serde_json::Value) -> FeatureState {
        value.as_object().cloned().unwrap_or_default()
    }

    fn hover(on: bool) -> FeatureState {
        state(json!({ "hover": on }))
    }

    fn hits(engine: &TerminalEngine, at: LngLat) -> usize {
        engine.query_rendered_features(LAYER, at).len()
    }

    #[test]
    fn test_first_drain_yields_load_once() {
        let mut engine = fixtures::bare_engine();
        assert_eq!(engine.drain_events(), vec![MapEvent::load()]);
        assert!(engine.drain_events().is_empty());
    }

    #[test]
    fn test_enter_move_leave_sequence() {
        let mut engine = fixtures::engine_with_provinces();
        let (ax, ay) = fixtures::pixel_of(&engine, fixtures::ALBERTA);
        let (ox, oy) = fixtures::pixel_of(&engine, fixtures::ONTARIO);
        let (wx, wy) = fixtures::pixel_of(&engine, fixtures::OUTSIDE);
        engine.drain_events();

        engine.pointer_moved(ax, ay);
        let kinds: Vec<_> = engine.drain_events().iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![EventKind::MouseEnter, EventKind::MouseMove]);

        engine.pointer_moved(ox, oy);
        let events = engine.drain_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::MouseMove);
        let features = &events[0].pointer_payload().unwrap().features;
        assert_eq!(features[0].properties["PRENAME"], json!("Ontario"));
        assert_eq!(features[0].id, Some(1));

        engine.pointer_moved(wx, wy);
        let events = engine.drain_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::MouseLeave);
        assert_eq!(events[0].target, crate::event::Target::layer(LAYER));
    }

    #[test]
    fn test_pointer_left_map_area() {
        let mut engine = fixtures::engine_with_provinces();
        let (ax, ay) = fixtures::pixel_of(&engine, fixtures::ALBERTA);
        engine.pointer_moved(ax, ay);
        engine.drain_events();

        engine.pointer_left();
        let kinds: Vec<_> = engine.drain_events().iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![EventKind::MouseLeave]);

        engine.pointer_left();
        assert!(engine.drain_events().is_empty());
    }

    #[test]
    fn test_filter_and_visibility_limit_hits() {
        let mut engine = fixtures::engine_with_provinces();
        let ontario = Expression::eq(Expression::get("PRENAME"), Expression::literal("Ontario"));
        engine.set_filter(LAYER, Some(ontario));
        assert_eq!(hits(&engine, fixtures::ALBERTA), 0);
        assert_eq!(hits(&engine, fixtures::ONTARIO), 1);

        engine.set_layout_property(LAYER, LayoutProperty::Visibility(Visibility::None));
        assert_eq!(hits(&engine, fixtures::ONTARIO), 0);
    }

    #[test]
    fn test_feature_state_merges() {
        let mut engine = fixtures::engine_with_provinces();
        engine.set_feature_state(SOURCE, 2, hover(true));
        engine.set_feature_state(SOURCE, 2, state(json!({ "selected": 1 })));
        let state = engine.feature_state(SOURCE, 2);
        assert_eq!(state["hover"], json!(true));
        assert_eq!(state["selected"], json!(1));
        assert!(engine.feature_state(SOURCE, 3).is_empty());

        // Unknown source is reported and ignored
        engine.set_feature_state("nope", 2, hover(true));
        assert!(engine.feature_state("nope", 2).is_empty());
    }

    #[test]
    fn test_click_closes_popup_then_reports_features() {
        let mut engine = fixtures::engine_with_provinces();
        engine.show_popup(Popup::new(LngLat::default(), "old"));
        let (ax, ay) = fixtures::pixel_of(&engine, fixtures::ALBERTA);
        engine.drain_events();

        engine.click(ax, ay);
        assert!(engine.popup().is_none());
        let events = engine.drain_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::Click);
    }

    #[test]
    fn test_navigation_control() {
        let mut engine = fixtures::engine_with_provinces();
        assert!(engine.navigation_layout().is_empty());
        engine.add_control(Control::Navigation);
        let layout = engine.navigation_layout();
        assert_eq!(layout.len(), 3);

        let zoom = engine.viewport().zoom;
        let (cx, cy, button) = layout[0];
        assert_eq!(button, NavButton::ZoomIn);
        engine.click((cx * 2) as i32, (cy * 4) as i32);
        assert_eq!(engine.viewport().zoom, zoom + 0.5);
        let events = engine.drain_events();
        assert!(events.iter().all(|e| e.kind != EventKind::Click));

        engine.press(NavButton::Reset);
        assert_eq!(engine.viewport().zoom, zoom);
    }

    #[test]
    fn test_unknown_layer_is_ignored() {
        let mut engine = fixtures::engine_with_provinces();
        engine.set_filter("missing", Some(Expression::has("PRENAME")));
        engine.set_layout_property("missing", LayoutProperty::Visibility(Visibility::None));
        let layer = engine.layer(LAYER).unwrap();
        assert!(layer.filter.is_none() && layer.is_visible());
    }

    #[test]
    fn test_layer_requires_source() {
        let mut engine = fixtures::bare_engine();
        engine.add_layer(fixtures::fill_layer());
        assert!(engine.layer(LAYER).is_none());
    }

    #[test]
    fn test_render_highlights_hovered_feature() {
        let mut engine = fixtures::engine_with_provinces();
        let (ax, ay) = fixtures::pixel_of(&engine, fixtures::ALBERTA);
        let (cx, cy) = (ax as usize / 2, ay as usize / 4);

        let idle = engine.render().fill(cx, cy).unwrap();
        engine.set_feature_state(SOURCE, 0, hover(true));
        let hovered = engine.render().fill(cx, cy).unwrap();

        // Alberta is in the 1M-5M bucket
        assert_eq!(hovered, Rgb(0xbd, 0x00, 0x26));
        assert_ne!(idle, hovered);

        let (wx, wy) = fixtures::pixel_of(&engine, fixtures::OUTSIDE);
        let background = engine.render().fill(wx as usize / 2, wy as usize / 4);
        assert_eq!(background, Some(Basemap::new().background));
    }

    #[test]
    fn test_path_source_loads_in_background() {
        let dir = std::env::temp_dir().join(format!("provmap-src-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("provinces.geojson");
        std::fs::write(&path, fixtures::PROVINCES_GEOJSON).unwrap();

        let mut engine = fixtures::bare_engine();
        engine.add_source(
            SOURCE,
            GeoJsonSourceSpec {
                data: SourceData::Path(path),
                generate_id: true,
            },
        );
        assert!(matches!(engine.source(SOURCE), Some(SourceSlot::Loading)));

        for _ in 0..200 {
            engine.poll_sources();
            if !matches!(engine.source(SOURCE), Some(SourceSlot::Loading)) {
                break;
            }
            thread::sleep(std::time::Duration::from_millis(10));
        }
        let features = engine
            .source(SOURCE)
            .and_then(SourceSlot::ready)
            .map(|s| s.features().len());
        assert_eq!(features, Some(4));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_failed_source_is_reported_not_fatal() {
        let mut engine = fixtures::bare_engine();
        engine.add_source(
            SOURCE,
            GeoJsonSourceSpec {
                data: SourceData::locate("/nonexistent/provinces.geojson"),
                generate_id: true,
            },
        );
        for _ in 0..200 {
            engine.poll_sources();
            if !matches!(engine.source(SOURCE), Some(SourceSlot::Loading)) {
                break;
            }
            thread::sleep(std::time::Duration::from_millis(10));
        }
        assert!(matches!(engine.source(SOURCE), Some(SourceSlot::Failed(_))));
    }
}
