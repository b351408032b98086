use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::trace;

use super::color::Rgb;
use super::expression::{EvalContext, Expression};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Visible,
    None,
}

impl Visibility {
    pub fn from_checked(checked: bool) -> Self {
        if checked {
            Visibility::Visible
        } else {
            Visibility::None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerKind {
    Fill,
}

/// Layout properties that can be changed after the layer is added
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutProperty {
    Visibility(Visibility),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Layout {
    #[serde(default)]
    pub visibility: Visibility,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FillPaint {
    #[serde(rename = "fill-color")]
    pub fill_color: Expression,
    #[serde(rename = "fill-opacity")]
    pub fill_opacity: Expression,
    #[serde(
        rename = "fill-outline-color",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub fill_outline_color: Option<Expression>,
}

/// Paint values of one feature after expression evaluation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedFill {
    pub color: Rgb,
    pub opacity: f64,
    pub outline: Rgb,
}

impl FillPaint {
    /// Evaluate every paint property for one feature. A property whose
    /// expression fails or yields an unusable value takes its default.
    pub fn resolve(&self, ctx: &EvalContext<'_>) -> ResolvedFill {
        let color = eval_color(&self.fill_color, ctx).unwrap_or(Rgb::BLACK);
        let opacity = match self.fill_opacity.evaluate(ctx) {
            Ok(v) => v.as_f64().unwrap_or(1.0),
            Err(e) => {
                trace!(error = %e, "fill-opacity fell back to default");
                1.0
            }
        };
        let outline = self
            .fill_outline_color
            .as_ref()
            .and_then(|expr| eval_color(expr, ctx))
            .unwrap_or(color);
        ResolvedFill {
            color,
            opacity,
            outline,
        }
    }
}

fn eval_color(expr: &Expression, ctx: &EvalContext<'_>) -> Option<Rgb> {
    match expr.evaluate(ctx) {
        Ok(Value::String(s)) => s.parse().ok(),
        Ok(_) => None,
        Err(e) => {
            trace!(error = %e, "color expression fell back to default");
            None
        }
    }
}

/// A style layer, shaped like a MapLibre style layer object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerSpec {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: LayerKind,
    pub source: String,
    pub paint: FillPaint,
    #[serde(default)]
    pub layout: Layout,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<Expression>,
}

impl LayerSpec {
    pub fn is_visible(&self) -> bool {
        self.layout.visibility == Visibility::Visible
    }

    /// A layer without a filter renders every feature of its source
    pub fn passes_filter(&self, ctx: &EvalContext<'_>) -> bool {
        self.filter.as_ref().is_none_or(|f| f.matches(ctx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::expression::{FeatureState, Properties};
    use serde_json::json;

    fn sample_layer() -> LayerSpec {
        serde_json::from_value(json!({
            "id": "provterr-fill",
            "type": "fill",
            "source": "canada-provterr",
            "paint": {
                "fill-color": ["step", ["get", "POP2021"], "#fd8d3c", 100000, "#fc4e2a"],
                "fill-opacity": ["case", ["boolean", ["feature-state", "hover"], false], 1, 0.5],
                "fill-outline-color": "white"
            }
        }))
        .unwrap()
    }

    fn resolve(layer: &LayerSpec, properties: &Properties, state: &FeatureState) -> ResolvedFill {
        layer.paint.resolve(&EvalContext { properties, state })
    }

    #[test]
    fn test_deserialize_style_layer() {
        let layer = sample_layer();
        assert_eq!(layer.kind, LayerKind::Fill);
        assert!(layer.is_visible());
        assert!(layer.filter.is_none());
        assert_eq!(
            layer.paint.fill_outline_color,
            Some(Expression::literal("white"))
        );
    }

    #[test]
    fn test_resolve_with_state() {
        let layer = sample_layer();
        let props: Properties = json!({ "POP2021": 500_000 }).as_object().cloned().unwrap();
        let mut state = FeatureState::new();

        let idle = resolve(&layer, &props, &state);
        assert_eq!(idle.color, Rgb(0xfc, 0x4e, 0x2a));
        assert_eq!(idle.opacity, 0.5);
        assert_eq!(idle.outline, Rgb::WHITE);

        state.insert("hover".into(), json!(true));
        let hovered = resolve(&layer, &props, &state);
        assert_eq!(hovered.opacity, 1.0);
    }

    #[test]
    fn test_resolve_missing_population_uses_defaults() {
        let layer = sample_layer();
        let props = Properties::new();
        let state = FeatureState::new();
        let fill = resolve(&layer, &props, &state);
        assert_eq!(fill.color, Rgb::BLACK);
        assert_eq!(fill.outline, Rgb::WHITE);
    }

    #[test]
    fn test_visibility_serializes_lowercase() {
        let none = serde_json::to_value(Visibility::None).unwrap();
        let visible = serde_json::to_value(Visibility::Visible).unwrap();
        assert_eq!(none, json!("none"));
        assert_eq!(visible, json!("visible"));
        assert_eq!(Visibility::from_checked(false), Visibility::None);
    }
}
