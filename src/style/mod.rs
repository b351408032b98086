mod color;
mod expression;
mod layer;

pub use color::{ColorError, Rgb};
pub use expression::{
    Assertion, EvalContext, EvalError, Expression, ExpressionError, FeatureState, Properties,
};
pub use layer::{FillPaint, LayerKind, LayerSpec, Layout, LayoutProperty, ResolvedFill, Visibility};
