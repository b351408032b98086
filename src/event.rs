use crate::engine::FeatureId;
use crate::geo::LngLat;
use crate::style::{FeatureState, Properties};

/// What happened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Load,
    Click,
    MouseEnter,
    MouseLeave,
    MouseMove,
    Change,
}

/// Where it happened: the map as a whole, one style layer, or a UI element
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Target {
    Map,
    Layer(String),
    Element(String),
}

impl Target {
    pub fn layer(id: impl Into<String>) -> Self {
        Target::Layer(id.into())
    }

    pub fn element(id: impl Into<String>) -> Self {
        Target::Element(id.into())
    }
}

/// A feature as seen under the pointer: its properties and current state
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedFeature {
    pub id: Option<FeatureId>,
    pub source: String,
    pub layer: String,
    pub properties: Properties,
    pub state: FeatureState,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PointerEvent {
    pub lng_lat: LngLat,
    /// Braille pixel position inside the map area
    pub point: (i32, i32),
    /// Topmost first
    pub features: Vec<RenderedFeature>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    None,
    Pointer(PointerEvent),
    /// Current value of a select control
    Value(String),
    /// Current state of a checkbox
    Checked(bool),
}

#[derive(Debug, Clone, PartialEq)]
pub struct MapEvent {
    pub kind: EventKind,
    pub target: Target,
    pub payload: Payload,
}

impl MapEvent {
    pub fn load() -> Self {
        Self {
            kind: EventKind::Load,
            target: Target::Map,
            payload: Payload::None,
        }
    }

    pub fn pointer(kind: EventKind, layer: &str, pointer: PointerEvent) -> Self {
        Self {
            kind,
            target: Target::layer(layer),
            payload: Payload::Pointer(pointer),
        }
    }

    pub fn selected(element: &str, value: impl Into<String>) -> Self {
        Self {
            kind: EventKind::Change,
            target: Target::element(element),
            payload: Payload::Value(value.into()),
        }
    }

    pub fn checked(element: &str, checked: bool) -> Self {
        Self {
            kind: EventKind::Change,
            target: Target::element(element),
            payload: Payload::Checked(checked),
        }
    }

    pub fn pointer_payload(&self) -> Option<&PointerEvent> {
        match &self.payload {
            Payload::Pointer(p) => Some(p),
            _ => None,
        }
    }
}
