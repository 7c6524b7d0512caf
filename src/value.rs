use crate::{expr::Constant, stream::TelemetryStreamCollection};

/// Numeric value. Integral numbers are kept apart from floating point ones,
/// as arithmetic on two integral operands stays integral.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    pub fn as_f64(self) -> f64 {
        match self {
            Number::Int(i) => i as f64,
            Number::Float(f) => f,
        }
    }

    pub fn is_zero(self) -> bool {
        match self {
            Number::Int(i) => i == 0,
            Number::Float(f) => f == 0.0,
        }
    }
}

impl From<i64> for Number {
    fn from(v: i64) -> Self {
        Number::Int(v)
    }
}

impl From<f64> for Number {
    fn from(v: f64) -> Self {
        Number::Float(v)
    }
}

impl std::fmt::Display for Number {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Number::Int(i) => write!(f, "{i}"),
            // Debug keeps the fractional part, so `3.0` does not read back as an integer.
            Number::Float(v) => write!(f, "{v:?}"),
        }
    }
}

/// Value flowing between function calls during evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(Number),
    Text(String),
    Series(TelemetryStreamCollection),
}

impl Value {
    /// Name of the value kind, for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Number(_) => "Number",
            Value::Text(_) => "String",
            Value::Series(_) => "TelemetryStreamCollection",
        }
    }

    pub fn as_number(&self) -> Option<Number> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn into_series(self) -> Option<TelemetryStreamCollection> {
        match self {
            Value::Series(s) => Some(s),
            _ => None,
        }
    }
}

impl From<Constant> for Value {
    fn from(constant: Constant) -> Self {
        match constant {
            Constant::Str(s) => Value::Text(s),
            Constant::Num(n) => Value::Number(n),
        }
    }
}

impl From<Number> for Value {
    fn from(n: Number) -> Self {
        Value::Number(n)
    }
}

impl From<TelemetryStreamCollection> for Value {
    fn from(c: TelemetryStreamCollection) -> Self {
        Value::Series(c)
    }
}
