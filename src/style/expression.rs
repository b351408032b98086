use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// GeoJSON feature properties
pub type Properties = Map<String, Value>;

/// Per-feature mutable state (e.g. `{"hover": true}`)
pub type FeatureState = Map<String, Value>;

#[derive(Debug, Error, PartialEq)]
pub enum ExpressionError {
    #[error("unknown expression operator `{0}`")]
    UnknownOperator(String),
    #[error("`{op}` expects {expected} arguments, got {got}")]
    Arity {
        op: &'static str,
        expected: &'static str,
        got: usize,
    },
    #[error("`{0}` expects a string literal as its first argument")]
    PropertyName(&'static str),
    #[error("`step` stops must be ascending numeric literals")]
    StepStops,
    #[error("`match` labels must be string or number literals")]
    MatchLabel,
    #[error("array literals must be wrapped in [\"literal\", ...]")]
    BareArray,
}

#[derive(Debug, Error, PartialEq)]
pub enum EvalError {
    #[error("expected {expected} but found {found}")]
    Type {
        expected: &'static str,
        found: &'static str,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "==" => CompareOp::Eq,
            "!=" => CompareOp::Ne,
            "<" => CompareOp::Lt,
            "<=" => CompareOp::Le,
            ">" => CompareOp::Gt,
            ">=" => CompareOp::Ge,
            _ => return None,
        })
    }

    fn name(self) -> &'static str {
        match self {
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        }
    }
}

/// Type assertion operators: return the first argument of the asserted type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assertion {
    Boolean,
    Number,
    String,
}

impl Assertion {
    fn name(self) -> &'static str {
        match self {
            Assertion::Boolean => "boolean",
            Assertion::Number => "number",
            Assertion::String => "string",
        }
    }

    fn accepts(self, value: &Value) -> bool {
        match self {
            Assertion::Boolean => value.is_boolean(),
            Assertion::Number => value.is_number(),
            Assertion::String => value.is_string(),
        }
    }
}

/// A data-driven style expression in the JSON array form used by
/// MapLibre/Mapbox style documents, e.g. `["get", "POP2021"]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub enum Expression {
    Literal(Value),
    Get(String),
    Has(String),
    FeatureState(String),
    Compare(CompareOp, Box<Expression>, Box<Expression>),
    Not(Box<Expression>),
    All(Vec<Expression>),
    Any(Vec<Expression>),
    Step {
        input: Box<Expression>,
        base: Box<Expression>,
        stops: Vec<(f64, Expression)>,
    },
    Case {
        branches: Vec<(Expression, Expression)>,
        fallback: Box<Expression>,
    },
    Match {
        input: Box<Expression>,
        arms: Vec<(Vec<Value>, Expression)>,
        fallback: Box<Expression>,
    },
    Coalesce(Vec<Expression>),
    Assert(Assertion, Vec<Expression>),
}

/// Everything an expression may read while being evaluated for one feature
#[derive(Clone, Copy)]
pub struct EvalContext<'a> {
    pub properties: &'a Properties,
    pub state: &'a FeatureState,
}

impl Expression {
    pub fn literal(value: impl Into<Value>) -> Self {
        Expression::Literal(value.into())
    }

    pub fn get(property: impl Into<String>) -> Self {
        Expression::Get(property.into())
    }

    pub fn has(property: impl Into<String>) -> Self {
        Expression::Has(property.into())
    }

    pub fn eq(left: Expression, right: Expression) -> Self {
        Expression::Compare(CompareOp::Eq, Box::new(left), Box::new(right))
    }

    /// Parse the JSON array form
    pub fn parse(value: &Value) -> Result<Self, ExpressionError> {
        let items = match value {
            Value::Array(items) => items,
            other => return Ok(Expression::Literal(other.clone())),
        };

        let (op, args) = match items.split_first() {
            Some((Value::String(op), args)) => (op.as_str(), args),
            _ => return Err(ExpressionError::BareArray),
        };

        let parse_all = |args: &[Value]| {
            args.iter()
                .map(Expression::parse)
                .collect::<Result<Vec<_>, _>>()
        };

        match op {
            "literal" => match args {
                [v] => Ok(Expression::Literal(v.clone())),
                _ => Err(arity("literal", "1", args.len())),
            },
            "get" => Ok(Expression::Get(property_name("get", args)?)),
            "has" => Ok(Expression::Has(property_name("has", args)?)),
            "feature-state" => {
                let key = property_name("feature-state", args)?;
                Ok(Expression::FeatureState(key))
            }
            "!" => match args {
                [inner] => Ok(Expression::Not(Box::new(Expression::parse(inner)?))),
                _ => Err(arity("!", "1", args.len())),
            },
            "all" => Ok(Expression::All(parse_all(args)?)),
            "any" => Ok(Expression::Any(parse_all(args)?)),
            "coalesce" => Ok(Expression::Coalesce(parse_all(args)?)),
            "boolean" | "number" | "string" => {
                let assertion = match op {
                    "boolean" => Assertion::Boolean,
                    "number" => Assertion::Number,
                    _ => Assertion::String,
                };
                if args.is_empty() {
                    return Err(arity(assertion.name(), "at least 1", 0));
                }
                Ok(Expression::Assert(assertion, parse_all(args)?))
            }
            "step" => parse_step(args),
            "case" => parse_case(args),
            "match" => parse_match(args),
            other => match CompareOp::from_name(other) {
                Some(cmp) => match args {
                    [l, r] => Ok(Expression::Compare(
                        cmp,
                        Box::new(Expression::parse(l)?),
                        Box::new(Expression::parse(r)?),
                    )),
                    _ => Err(arity(cmp.name(), "2", args.len())),
                },
                None => Err(ExpressionError::UnknownOperator(other.to_string())),
            },
        }
    }

    /// Serialize back to the JSON array form
    pub fn to_json(&self) -> Value {
        match self {
            Expression::Literal(v @ (Value::Array(_) | Value::Object(_))) => {
                Value::Array(vec!["literal".into(), v.clone()])
            }
            Expression::Literal(v) => v.clone(),
            Expression::Get(p) => op_array("get", [Value::from(p.as_str())]),
            Expression::Has(p) => op_array("has", [Value::from(p.as_str())]),
            Expression::FeatureState(k) => op_array("feature-state", [Value::from(k.as_str())]),
            Expression::Compare(cmp, l, r) => op_array(cmp.name(), [l.to_json(), r.to_json()]),
            Expression::Not(inner) => op_array("!", [inner.to_json()]),
            Expression::All(items) => op_array("all", items.iter().map(Expression::to_json)),
            Expression::Any(items) => op_array("any", items.iter().map(Expression::to_json)),
            Expression::Coalesce(items) => {
                op_array("coalesce", items.iter().map(Expression::to_json))
            }
            Expression::Assert(a, items) => {
                op_array(a.name(), items.iter().map(Expression::to_json))
            }
            Expression::Step { input, base, stops } => {
                let mut out = vec![input.to_json(), base.to_json()];
                for (stop, output) in stops {
                    out.push(number_value(*stop));
                    out.push(output.to_json());
                }
                op_array("step", out)
            }
            Expression::Case { branches, fallback } => {
                let mut out = Vec::with_capacity(branches.len() * 2 + 1);
                for (cond, output) in branches {
                    out.push(cond.to_json());
                    out.push(output.to_json());
                }
                out.push(fallback.to_json());
                op_array("case", out)
            }
            Expression::Match {
                input,
                arms,
                fallback,
            } => {
                let mut out = vec![input.to_json()];
                for (labels, output) in arms {
                    match labels.as_slice() {
                        [single] => out.push(single.clone()),
                        many => out.push(Value::Array(many.to_vec())),
                    }
                    out.push(output.to_json());
                }
                out.push(fallback.to_json());
                op_array("match", out)
            }
        }
    }

    pub fn evaluate(&self, ctx: &EvalContext<'_>) -> Result<Value, EvalError> {
        match self {
            Expression::Literal(v) => Ok(v.clone()),
            Expression::Get(p) => Ok(ctx.properties.get(p).cloned().unwrap_or(Value::Null)),
            Expression::Has(p) => Ok(Value::Bool(ctx.properties.contains_key(p))),
            Expression::FeatureState(k) => Ok(ctx.state.get(k).cloned().unwrap_or(Value::Null)),
            Expression::Compare(cmp, l, r) => {
                let l = l.evaluate(ctx)?;
                let r = r.evaluate(ctx)?;
                compare(*cmp, &l, &r).map(Value::Bool)
            }
            Expression::Not(inner) => Ok(Value::Bool(!expect_bool(&inner.evaluate(ctx)?)?)),
            Expression::All(items) => {
                for item in items {
                    if !expect_bool(&item.evaluate(ctx)?)? {
                        return Ok(Value::Bool(false));
                    }
                }
                Ok(Value::Bool(true))
            }
            Expression::Any(items) => {
                for item in items {
                    if expect_bool(&item.evaluate(ctx)?)? {
                        return Ok(Value::Bool(true));
                    }
                }
                Ok(Value::Bool(false))
            }
            Expression::Coalesce(items) => {
                for item in items {
                    match item.evaluate(ctx) {
                        Ok(Value::Null) | Err(_) => continue,
                        Ok(v) => return Ok(v),
                    }
                }
                Ok(Value::Null)
            }
            Expression::Assert(assertion, items) => {
                let mut last = Value::Null;
                for item in items {
                    let v = item.evaluate(ctx)?;
                    if assertion.accepts(&v) {
                        return Ok(v);
                    }
                    last = v;
                }
                Err(EvalError::Type {
                    expected: assertion.name(),
                    found: type_name(&last),
                })
            }
            Expression::Step { input, base, stops } => {
                let x = expect_number(&input.evaluate(ctx)?)?;
                // Stops are ascending: the last stop not above the input wins
                let idx = stops.partition_point(|(stop, _)| *stop <= x);
                match idx.checked_sub(1) {
                    Some(i) => stops[i].1.evaluate(ctx),
                    None => base.evaluate(ctx),
                }
            }
            Expression::Case { branches, fallback } => {
                for (cond, output) in branches {
                    if expect_bool(&cond.evaluate(ctx)?)? {
                        return output.evaluate(ctx);
                    }
                }
                fallback.evaluate(ctx)
            }
            Expression::Match {
                input,
                arms,
                fallback,
            } => {
                let v = input.evaluate(ctx)?;
                for (labels, output) in arms {
                    if labels.iter().any(|label| values_equal(label, &v)) {
                        return output.evaluate(ctx);
                    }
                }
                fallback.evaluate(ctx)
            }
        }
    }

    /// Filter semantics: only an explicit `true` lets a feature through
    pub fn matches(&self, ctx: &EvalContext<'_>) -> bool {
        matches!(self.evaluate(ctx), Ok(Value::Bool(true)))
    }
}

impl TryFrom<Value> for Expression {
    type Error = ExpressionError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Expression::parse(&value)
    }
}

impl From<Expression> for Value {
    fn from(expr: Expression) -> Self {
        expr.to_json()
    }
}

fn arity(op: &'static str, expected: &'static str, got: usize) -> ExpressionError {
    ExpressionError::Arity { op, expected, got }
}

fn property_name(op: &'static str, args: &[Value]) -> Result<String, ExpressionError> {
    match args {
        [Value::String(name)] => Ok(name.clone()),
        [_] => Err(ExpressionError::PropertyName(op)),
        _ => Err(arity(op, "1", args.len())),
    }
}

fn op_array(op: &str, args: impl IntoIterator<Item = Value>) -> Value {
    let mut out = vec![Value::from(op)];
    out.extend(args);
    Value::Array(out)
}

/// Integral numbers keep their integer JSON form, so `100000` stays `100000`
fn number_value(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        Value::from(n as i64)
    } else {
        Value::from(n)
    }
}

fn parse_step(args: &[Value]) -> Result<Expression, ExpressionError> {
    // input, base, then (stop, output) pairs
    let [input, base, pairs @ ..] = args else {
        return Err(arity("step", "an even number (at least 2) of", args.len()));
    };
    if pairs.len() % 2 != 0 {
        return Err(arity("step", "an even number (at least 2) of", args.len()));
    }
    let mut stops = Vec::with_capacity(pairs.len() / 2);
    let mut prev = f64::NEG_INFINITY;
    for pair in pairs.chunks_exact(2) {
        let stop = pair[0].as_f64().ok_or(ExpressionError::StepStops)?;
        if stop <= prev {
            return Err(ExpressionError::StepStops);
        }
        prev = stop;
        stops.push((stop, Expression::parse(&pair[1])?));
    }
    Ok(Expression::Step {
        input: Box::new(Expression::parse(input)?),
        base: Box::new(Expression::parse(base)?),
        stops,
    })
}

fn parse_case(args: &[Value]) -> Result<Expression, ExpressionError> {
    let [pairs @ .., fallback] = args else {
        return Err(arity("case", "an odd number (at least 3) of", 0));
    };
    if pairs.is_empty() || pairs.len() % 2 != 0 {
        return Err(arity("case", "an odd number (at least 3) of", args.len()));
    }
    let mut branches = Vec::with_capacity(pairs.len() / 2);
    for pair in pairs.chunks_exact(2) {
        branches.push((Expression::parse(&pair[0])?, Expression::parse(&pair[1])?));
    }
    Ok(Expression::Case {
        branches,
        fallback: Box::new(Expression::parse(fallback)?),
    })
}

fn parse_match(args: &[Value]) -> Result<Expression, ExpressionError> {
    let [input, pairs @ .., fallback] = args else {
        return Err(arity("match", "an even number (at least 4) of", args.len()));
    };
    if pairs.is_empty() || pairs.len() % 2 != 0 {
        return Err(arity("match", "an even number (at least 4) of", args.len()));
    }
    let input = Expression::parse(input)?;
    let mut arms = Vec::with_capacity(pairs.len() / 2);
    for pair in pairs.chunks_exact(2) {
        let labels = match &pair[0] {
            Value::Array(labels) => labels.clone(),
            single => vec![single.clone()],
        };
        if labels.is_empty() || !labels.iter().all(|l| l.is_string() || l.is_number()) {
            return Err(ExpressionError::MatchLabel);
        }
        arms.push((labels, Expression::parse(&pair[1])?));
    }
    Ok(Expression::Match {
        input: Box::new(input),
        arms,
        fallback: Box::new(Expression::parse(fallback)?),
    })
}

pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn expect_bool(value: &Value) -> Result<bool, EvalError> {
    value.as_bool().ok_or(EvalError::Type {
        expected: "boolean",
        found: type_name(value),
    })
}

fn expect_number(value: &Value) -> Result<f64, EvalError> {
    value.as_f64().ok_or(EvalError::Type {
        expected: "number",
        found: type_name(value),
    })
}

/// Equality that treats `1` and `1.0` as the same number
fn values_equal(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

fn compare(op: CompareOp, l: &Value, r: &Value) -> Result<bool, EvalError> {
    match op {
        CompareOp::Eq => Ok(values_equal(l, r)),
        CompareOp::Ne => Ok(!values_equal(l, r)),
        _ => {
            let ordering = match (l, r) {
                (Value::Number(_), Value::Number(_)) => {
                    let (x, y) = (expect_number(l)?, expect_number(r)?);
                    x.partial_cmp(&y)
                }
                (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
                (Value::Number(_) | Value::String(_), other) | (other, _) => {
                    return Err(EvalError::Type {
                        expected: "number or string",
                        found: type_name(other),
                    });
                }
            };
            let Some(ordering) = ordering else {
                return Ok(false);
            };
            Ok(match op {
                CompareOp::Lt => ordering.is_lt(),
                CompareOp::Le => ordering.is_le(),
                CompareOp::Gt => ordering.is_gt(),
                _ => ordering.is_ge(),
            })
        }
    }
}
