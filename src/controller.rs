//! Event wiring for the province choropleth.
//!
//! The controller owns the two pieces of UI-derived state (the hovered
//! feature and the selected boundary) and a binding table from
//! `(EventKind, Target)` to handlers. Everything else lives in the engine.

use std::collections::HashMap;

use serde_json::Value;
use tracing::{debug, info};

use crate::engine::{Control, Cursor, FeatureId, GeoJsonSourceSpec, MapEngine, MapView, Popup};
use crate::event::{EventKind, MapEvent, Payload, Target};
use crate::style::{
    Assertion, Expression, FeatureState, FillPaint, LayerKind, LayerSpec, Layout, LayoutProperty,
    Rgb, Visibility,
};

/// Dropdown value meaning "no filter"
pub const ALL_BOUNDARIES: &str = "All";
/// Element ids of the UI controls
pub const BOUNDARY_FIELDSET: &str = "boundaryfieldset";
pub const LAYER_CHECK: &str = "layercheck";

const HOVER: &str = "hover";
const BASE_COLOR: &str = "#fd8d3c";
/// Population thresholds and the color used at or above each
const POPULATION_STEPS: [(f64, &str); 4] = [
    (100_000.0, "#fc4e2a"),
    (500_000.0, "#e31a1c"),
    (1_000_000.0, "#bd0026"),
    (5_000_000.0, "#800026"),
];
const OUTLINE_COLOR: &str = "white";

pub type Handler = fn(&mut MapController, &mut dyn MapEngine, &MapEvent);

#[derive(Debug, Clone, PartialEq)]
pub struct ControllerSettings {
    pub view: MapView,
    pub source_id: String,
    pub source: GeoJsonSourceSpec,
    pub layer_id: String,
    pub name_property: String,
    pub population_property: String,
}

/// The boundary selected in the dropdown
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum BoundaryFilter {
    #[default]
    All,
    Name(String),
}

impl BoundaryFilter {
    pub fn from_value(value: &str) -> Self {
        if value == ALL_BOUNDARIES {
            BoundaryFilter::All
        } else {
            BoundaryFilter::Name(value.to_string())
        }
    }

    /// `All` keeps every feature that has a name at all
    pub fn expression(&self, name_property: &str) -> Expression {
        match self {
            BoundaryFilter::All => Expression::has(name_property),
            BoundaryFilter::Name(name) => {
                let name = Expression::literal(name.as_str());
                Expression::eq(Expression::get(name_property), name)
            }
        }
    }
}

pub struct MapController {
    settings: ControllerSettings,
    hovered: Option<FeatureId>,
    filter: BoundaryFilter,
    bindings: HashMap<(EventKind, Target), Vec<Handler>>,
}

impl MapController {
    pub fn new(settings: ControllerSettings) -> Self {
        Self {
            settings,
            hovered: None,
            filter: BoundaryFilter::All,
            bindings: HashMap::new(),
        }
    }

    pub fn settings(&self) -> &ControllerSettings {
        &self.settings
    }

    /// The view the engine is created with
    pub fn map_view(&self) -> &MapView {
        &self.settings.view
    }

    /// Currently highlighted feature
    pub fn hovered(&self) -> Option<FeatureId> {
        self.hovered
    }

    pub fn filter(&self) -> &BoundaryFilter {
        &self.filter
    }

    /// Add the navigation control and build the binding table. Source and
    /// layer are registered once the engine reports `Load`.
    pub fn initialize(&mut self, engine: &mut dyn MapEngine) {
        engine.add_control(Control::Navigation);

        let layer = Target::layer(self.settings.layer_id.as_str());
        let boundary = Target::element(BOUNDARY_FIELDSET);
        let checkbox = Target::element(LAYER_CHECK);
        self.bindings.clear();
        self.bind(EventKind::Load, Target::Map, on_load);
        self.bind(EventKind::Click, layer.clone(), log_clicked_name);
        self.bind(EventKind::Click, layer.clone(), open_feature_popup);
        self.bind(EventKind::MouseEnter, layer.clone(), show_pointer_cursor);
        self.bind(EventKind::MouseLeave, layer.clone(), reset_cursor);
        self.bind(EventKind::MouseMove, layer.clone(), move_hover);
        self.bind(EventKind::MouseLeave, layer, clear_hover);
        self.bind(EventKind::Change, boundary, apply_boundary_filter);
        self.bind(EventKind::Change, checkbox, apply_layer_visibility);
        debug!(bindings = self.bindings.len(), "controller initialized");
    }

    fn bind(&mut self, kind: EventKind, target: Target, handler: Handler) {
        self.bindings
            .entry((kind, target))
            .or_default()
            .push(handler);
    }

    pub fn is_bound(&self, kind: EventKind, target: &Target) -> bool {
        self.bindings.contains_key(&(kind, target.clone()))
    }

    /// Run every handler bound to the event, in registration order
    pub fn dispatch(&mut self, engine: &mut dyn MapEngine, event: &MapEvent) {
        let key = (event.kind, event.target.clone());
        let Some(handlers) = self.bindings.get(&key).cloned() else {
            return;
        };
        for handler in handlers {
            handler(self, engine, event);
        }
    }

    /// The population choropleth layer
    pub fn choropleth_layer(&self) -> LayerSpec {
        let fill_color = Expression::Step {
            input: Box::new(Expression::get(self.settings.population_property.as_str())),
            base: Box::new(Expression::literal(BASE_COLOR)),
            stops: POPULATION_STEPS
                .iter()
                .map(|&(step, color)| (step, Expression::literal(color)))
                .collect(),
        };
        let hovered = Expression::Assert(
            Assertion::Boolean,
            vec![
                Expression::FeatureState(HOVER.into()),
                Expression::literal(false),
            ],
        );
        let fill_opacity = Expression::Case {
            branches: vec![(hovered, Expression::literal(1))],
            fallback: Box::new(Expression::literal(0.5)),
        };

        LayerSpec {
            id: self.settings.layer_id.clone(),
            kind: LayerKind::Fill,
            source: self.settings.source_id.clone(),
            paint: FillPaint {
                fill_color,
                fill_opacity,
                fill_outline_color: Some(Expression::literal(OUTLINE_COLOR)),
            },
            layout: Layout::default(),
            filter: None,
        }
    }

    fn set_hover(&self, engine: &mut dyn MapEngine, id: FeatureId, on: bool) {
        let mut state = FeatureState::new();
        state.insert(HOVER.into(), Value::Bool(on));
        engine.set_feature_state(&self.settings.source_id, id, state);
    }
}

/// Render an attribute the way it reads in a popup
pub fn display_value(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => "unknown".to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => match n.as_f64() {
            Some(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
            _ => n.to_string(),
        },
        Some(other) => other.to_string(),
    }
}

fn short_count(n: f64) -> String {
    if n >= 1_000_000.0 {
        format!("{}M", n / 1_000_000.0)
    } else if n >= 1_000.0 {
        format!("{}k", n / 1_000.0)
    } else {
        format!("{n}")
    }
}

/// Choropleth classes, lowest first, for the legend
pub fn legend() -> Vec<(Rgb, String)> {
    let mut classes = Vec::with_capacity(POPULATION_STEPS.len() + 1);
    let mut lower: Option<f64> = None;
    let mut color = BASE_COLOR;
    for &(threshold, next) in &POPULATION_STEPS {
        let label = match lower {
            None => format!("< {}", short_count(threshold)),
            Some(lo) => format!("{} - {}", short_count(lo), short_count(threshold)),
        };
        classes.push((color, label));
        lower = Some(threshold);
        color = next;
    }
    if let Some(lo) = lower {
        classes.push((color, format!(">= {}", short_count(lo))));
    }
    classes
        .into_iter()
        .filter_map(|(color, label)| Some((color.parse::<Rgb>().ok()?, label)))
        .collect()
}

fn on_load(c: &mut MapController, engine: &mut dyn MapEngine, _event: &MapEvent) {
    engine.add_source(&c.settings.source_id, c.settings.source.clone());
    engine.add_layer(c.choropleth_layer());
}

fn log_clicked_name(c: &mut MapController, _engine: &mut dyn MapEngine, event: &MapEvent) {
    let Some(feature) = event.pointer_payload().and_then(|p| p.features.first()) else {
        return;
    };
    let name = display_value(feature.properties.get(&c.settings.name_property));
    info!(name = %name, "clicked");
}

fn open_feature_popup(c: &mut MapController, engine: &mut dyn MapEngine, event: &MapEvent) {
    let Some(pointer) = event.pointer_payload() else {
        return;
    };
    let Some(feature) = pointer.features.first() else {
        return;
    };
    let name = display_value(feature.properties.get(&c.settings.name_property));
    let population = display_value(feature.properties.get(&c.settings.population_property));
    let html = format!("Province/Territory: {name} Population: {population}");
    engine.show_popup(Popup::new(pointer.lng_lat, html));
}

fn show_pointer_cursor(_c: &mut MapController, engine: &mut dyn MapEngine, _event: &MapEvent) {
    engine.set_cursor(Cursor::Pointer);
}

fn reset_cursor(_c: &mut MapController, engine: &mut dyn MapEngine, _event: &MapEvent) {
    engine.set_cursor(Cursor::Default);
}

/// Clear the previous highlight before setting the new one, so exactly one
/// feature is ever flagged
fn move_hover(c: &mut MapController, engine: &mut dyn MapEngine, event: &MapEvent) {
    let Some(feature) = event.pointer_payload().and_then(|p| p.features.first()) else {
        return;
    };
    if let Some(prev) = c.hovered {
        c.set_hover(engine, prev, false);
    }
    c.hovered = feature.id;
    if let Some(id) = c.hovered {
        c.set_hover(engine, id, true);
    }
}

fn clear_hover(c: &mut MapController, engine: &mut dyn MapEngine, _event: &MapEvent) {
    if let Some(prev) = c.hovered.take() {
        c.set_hover(engine, prev, false);
    }
}

fn apply_boundary_filter(c: &mut MapController, engine: &mut dyn MapEngine, event: &MapEvent) {
    let Payload::Value(value) = &event.payload else {
        return;
    };
    debug!(boundary = %value, "boundary selected");
    c.filter = BoundaryFilter::from_value(value);
    let filter = c.filter.expression(&c.settings.name_property);
    engine.set_filter(&c.settings.layer_id, Some(filter));
}

fn apply_layer_visibility(c: &mut MapController, engine: &mut dyn MapEngine, event: &MapEvent) {
    let Payload::Checked(checked) = event.payload else {
        return;
    };
    let visibility = Visibility::from_checked(checked);
    engine.set_layout_property(&c.settings.layer_id, LayoutProperty::Visibility(visibility));
}
