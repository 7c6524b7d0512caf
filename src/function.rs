//! Stream algebra available to definitions.
//!
//! Functions are looked up case-insensitively. The stock set is
//! `Add`, `Sub`, `Mul`, `Div`, `Idempotent`, `Filter` and `FilterZero`;
//! hosts may register more.

use std::{collections::HashMap, sync::Arc};

use log::debug;

use crate::{error::FunctionError, stream::TelemetryStreamCollection, value::Value};

pub mod arithmetic;
pub mod filter;

use arithmetic::{Arithmetic, Operator};
use filter::{Filter, FilterZero};

/// Names of the functions every registry starts with.
const STOCK_FUNCTIONS: [&str; 7] = [
    "Add",
    "Sub",
    "Mul",
    "Div",
    Idempotent::NAME,
    Filter::NAME,
    FilterZero::NAME,
];

/// Whether `name` is one of the stock functions, ignoring case.
pub fn is_stock_function(name: &str) -> bool {
    STOCK_FUNCTIONS.iter().any(|f| f.eq_ignore_ascii_case(name))
}

/// A function callable from a streams expression.
pub trait TelemetryFunction: Send + Sync {
    fn name(&self) -> &'static str;

    fn compute(&self, params: Vec<Value>) -> Result<Value, FunctionError>;
}

/// Functions by lower-cased name.
pub struct FunctionRegistry {
    functions: HashMap<String, Arc<dyn TelemetryFunction>>,
}

impl FunctionRegistry {
    /// Registry with the stock functions.
    pub fn new() -> Self {
        let mut registry = Self {
            functions: HashMap::new(),
        };
        let stock: [Arc<dyn TelemetryFunction>; 7] = [
            Arc::new(Arithmetic::new(Operator::Add)),
            Arc::new(Arithmetic::new(Operator::Sub)),
            Arc::new(Arithmetic::new(Operator::Mul)),
            Arc::new(Arithmetic::new(Operator::Div)),
            Arc::new(Idempotent),
            Arc::new(Filter),
            Arc::new(FilterZero),
        ];
        for function in stock {
            registry
                .functions
                .insert(function.name().to_ascii_lowercase(), function);
        }
        registry
    }

    /// Add a function. Names are unique regardless of case.
    pub fn register(&mut self, function: Arc<dyn TelemetryFunction>) -> Result<(), FunctionError> {
        use std::collections::hash_map::Entry;

        match self.functions.entry(function.name().to_ascii_lowercase()) {
            Entry::Occupied(_) => Err(FunctionError::AlreadyRegistered {
                function: function.name().to_owned(),
            }),
            Entry::Vacant(e) => {
                debug!("Registering function `{}`", function.name());
                e.insert(function);
                Ok(())
            }
        }
    }

    pub fn get(&self, name: &str) -> Result<&Arc<dyn TelemetryFunction>, FunctionError> {
        self.functions
            .get(&name.to_ascii_lowercase())
            .ok_or_else(|| FunctionError::Unknown(name.to_owned()))
    }

    /// Call the named function.
    pub fn compute(&self, name: &str, params: Vec<Value>) -> Result<Value, FunctionError> {
        self.get(name)?.compute(params)
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.functions.values().map(|func| func.name()).collect();
        names.sort_unstable();
        f.debug_struct("FunctionRegistry")
            .field("functions", &names)
            .finish()
    }
}

/// Returns its only parameter unchanged.
#[derive(Debug, Clone, Copy)]
pub struct Idempotent;

impl Idempotent {
    pub const NAME: &'static str = "Idempotent";
}

impl TelemetryFunction for Idempotent {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn compute(&self, params: Vec<Value>) -> Result<Value, FunctionError> {
        let [value] = take_params::<1>(Self::NAME, params)?;
        Ok(value)
    }
}

/// Check the parameter count and move the parameters out into an array.
fn take_params<const N: usize>(
    function: &'static str,
    params: Vec<Value>,
) -> Result<[Value; N], FunctionError> {
    let actual = params.len();
    params.try_into().map_err(|_| FunctionError::Arity {
        function,
        expected: N,
        actual,
    })
}

/// Require the parameter to be a stream collection.
fn expect_series(
    function: &'static str,
    index: usize,
    value: Value,
) -> Result<TelemetryStreamCollection, FunctionError> {
    match value {
        Value::Series(series) => Ok(series),
        other => Err(FunctionError::ParameterType {
            function,
            index,
            expected: "TelemetryStreamCollection",
            actual: other.kind(),
        }),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::{
        domain::{Project, User},
        stream::{Interval, TelemetryDataPoint, TelemetryStream},
        value::Number,
    };

    pub(crate) fn project() -> Project {
        Project::new("Default", User::new("owner@example.com"))
    }

    pub(crate) fn interval(days: u32) -> Interval {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 1, days).unwrap();
        Interval::days(start, end).unwrap()
    }

    /// Collection with one stream per entry; every stream has as many points
    /// as the interval has days.
    pub(crate) fn collection(streams: &[(&str, &[Option<f64>])]) -> TelemetryStreamCollection {
        let days = streams.first().map_or(1, |(_, values)| values.len().max(1)) as u32;
        let interval = interval(days);
        let mut collection = TelemetryStreamCollection::new("test", project(), interval);
        for (tag, values) in streams {
            let points = interval
                .periods()
                .into_iter()
                .zip(values.iter())
                .map(|(period, v)| TelemetryDataPoint::new(period, v.map(Number::Float)))
                .collect();
            collection.add(TelemetryStream::with_points(Some(tag.to_string()), points));
        }
        collection
    }

    pub(crate) fn values(collection: &TelemetryStreamCollection, tag: &str) -> Vec<Option<f64>> {
        collection
            .get(Some(tag))
            .unwrap()
            .values()
            .map(|v| v.map(Number::as_f64))
            .collect()
    }

    #[test]
    fn stock_function_names() {
        assert!(is_stock_function("add"));
        assert!(is_stock_function("FILTERZERO"));
        assert!(is_stock_function("Idempotent"));
        assert!(!is_stock_function("Commit"));
    }

    #[test]
    fn lookup_ignores_case() {
        let registry = FunctionRegistry::new();
        let result = registry
            .compute("mUl", vec![Value::Number(Number::Int(6)), Value::Number(Number::Int(7))])
            .unwrap();
        assert_eq!(result, Value::Number(Number::Int(42)));
    }

    #[test]
    fn unknown_function() {
        let registry = FunctionRegistry::new();
        let err = registry.compute("Pow", vec![]).unwrap_err();
        assert!(matches!(err, FunctionError::Unknown(name) if name == "Pow"));
    }

    #[test]
    fn idempotent_arity() {
        let registry = FunctionRegistry::new();
        let value = Value::Text("x".into());
        assert_eq!(
            registry.compute("idempotent", vec![value.clone()]).unwrap(),
            value
        );
        let err = registry
            .compute("Idempotent", vec![value.clone(), value])
            .unwrap_err();
        assert!(matches!(
            err,
            FunctionError::Arity {
                expected: 1,
                actual: 2,
                ..
            }
        ));
    }

    struct Negate;

    impl TelemetryFunction for Negate {
        fn name(&self) -> &'static str {
            "Negate"
        }

        fn compute(&self, params: Vec<Value>) -> Result<Value, FunctionError> {
            let [value] = take_params::<1>("Negate", params)?;
            match value {
                Value::Number(n) => Ok(Value::Number(Number::Float(-n.as_f64()))),
                other => Err(FunctionError::ParameterType {
                    function: "Negate",
                    index: 0,
                    expected: "Number",
                    actual: other.kind(),
                }),
            }
        }
    }

    #[test]
    fn register_custom_function() {
        let mut registry = FunctionRegistry::new();
        registry.register(Arc::new(Negate)).unwrap();
        assert_eq!(
            registry
                .compute("negate", vec![Value::Number(Number::Int(2))])
                .unwrap(),
            Value::Number(Number::Float(-2.0))
        );
        assert!(matches!(
            registry.register(Arc::new(Negate)),
            Err(FunctionError::AlreadyRegistered { .. })
        ));
    }
}
