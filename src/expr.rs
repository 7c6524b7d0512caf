use crate::{domain::ItemName, value::Number};

/// Resolved literal value.
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    Str(String),
    Num(Number),
}

impl Constant {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Constant::Str(s) => Some(s),
            Constant::Num(_) => None,
        }
    }

    pub fn as_number(&self) -> Option<Number> {
        match self {
            Constant::Num(n) => Some(*n),
            Constant::Str(_) => None,
        }
    }

    /// Formats the constant as it would be written in a definition.
    pub fn to_pretty_string(&self) -> String {
        match self {
            Constant::Str(s) => format!("\"{}\"", escape(s)),
            Constant::Num(n) => n.to_string(),
        }
    }
}

/// The value itself, without quotes. Used when naming evaluated streams.
impl std::fmt::Display for Constant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Constant::Str(s) => f.write_str(s),
            Constant::Num(n) => n.fmt(f),
        }
    }
}

impl From<&str> for Constant {
    fn from(s: &str) -> Self {
        Constant::Str(s.to_owned())
    }
}

impl From<String> for Constant {
    fn from(s: String) -> Self {
        Constant::Str(s)
    }
}

impl From<i64> for Constant {
    fn from(v: i64) -> Self {
        Constant::Num(Number::Int(v))
    }
}

impl From<f64> for Constant {
    fn from(v: f64) -> Self {
        Constant::Num(Number::Float(v))
    }
}

/// Formal parameter of a definition.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Variable(ItemName);

impl Variable {
    pub fn new(name: ItemName) -> Self {
        Self(name)
    }

    pub fn name(&self) -> &ItemName {
        &self.0
    }
}

impl std::fmt::Display for Variable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Argument at a definition reference site: either a literal or one of the
/// referencing definition's own variables.
#[derive(Debug, Clone, PartialEq)]
pub enum Parameter {
    Constant(Constant),
    Variable(Variable),
}

impl Parameter {
    pub fn to_pretty_string(&self) -> String {
        match self {
            Parameter::Constant(c) => c.to_pretty_string(),
            Parameter::Variable(v) => v.to_string(),
        }
    }
}

/// Body expression of a streams definition.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Constant(Constant),
    Variable(Variable),

    /// Call into the function registry. Arithmetic operators are written as calls
    /// to `Add`, `Sub`, `Mul` and `Div`.
    FunctionCall {
        name: ItemName,
        args: Vec<Expression>,
    },

    /// Call into a reducer that fetches project data.
    ReducerCall {
        name: ItemName,
        args: Vec<Expression>,
    },
}

impl Expression {
    /// Formats the expression as a human-readable string (code).
    /// Operators are written in call form, so the output parses back into
    /// the same expression.
    pub fn to_pretty_string(&self) -> String {
        match self {
            Expression::Constant(c) => c.to_pretty_string(),
            Expression::Variable(v) => v.to_string(),
            Expression::FunctionCall { name, args } | Expression::ReducerCall { name, args } => {
                let args = args
                    .iter()
                    .map(Expression::to_pretty_string)
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("{name}({args})")
            }
        }
    }

    /// Visit every variable referenced by this expression, in source order.
    pub fn for_each_variable<'a>(&'a self, f: &mut impl FnMut(&'a Variable)) {
        match self {
            Expression::Constant(_) => {}
            Expression::Variable(v) => f(v),
            Expression::FunctionCall { args, .. } | Expression::ReducerCall { args, .. } => {
                for arg in args {
                    arg.for_each_variable(f);
                }
            }
        }
    }
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}
