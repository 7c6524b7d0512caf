use crate::{
    error::FunctionError,
    stream::{TelemetryDataPoint, TelemetryStream, TelemetryStreamCollection},
    value::{Number, Value},
};

use super::{take_params, TelemetryFunction};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Add,
    Sub,
    Mul,
    Div,
}

impl Operator {
    pub fn name(self) -> &'static str {
        match self {
            Operator::Add => "Add",
            Operator::Sub => "Sub",
            Operator::Mul => "Mul",
            Operator::Div => "Div",
        }
    }

    /// Integral operands give an integral result, except for division which
    /// is always carried out in floating point.
    pub fn apply(self, a: Number, b: Number) -> Number {
        match (self, a, b) {
            (Operator::Add, Number::Int(a), Number::Int(b)) => Number::Int(a.wrapping_add(b)),
            (Operator::Sub, Number::Int(a), Number::Int(b)) => Number::Int(a.wrapping_sub(b)),
            (Operator::Mul, Number::Int(a), Number::Int(b)) => Number::Int(a.wrapping_mul(b)),
            (op, a, b) => {
                let (a, b) = (a.as_f64(), b.as_f64());
                Number::Float(match op {
                    Operator::Add => a + b,
                    Operator::Sub => a - b,
                    Operator::Mul => a * b,
                    Operator::Div => a / b,
                })
            }
        }
    }
}

/// Binary arithmetic over numbers and stream collections. A number paired with
/// a collection is broadcast to the collection's shape first.
#[derive(Debug, Clone, Copy)]
pub struct Arithmetic {
    operator: Operator,
}

impl Arithmetic {
    pub fn new(operator: Operator) -> Self {
        Self { operator }
    }

    /// Combine two aligned collections point by point. A missing value on
    /// either side stays missing.
    fn combine(
        &self,
        a: &TelemetryStreamCollection,
        b: &TelemetryStreamCollection,
    ) -> Result<TelemetryStreamCollection, FunctionError> {
        let function = self.operator.name();
        let mismatch = |what| FunctionError::Mismatch { function, what };

        if a.project() != b.project() {
            return Err(mismatch("projects"));
        }
        if a.interval() != b.interval() {
            return Err(mismatch("intervals"));
        }
        if a.len() != b.len() {
            return Err(mismatch("stream counts"));
        }

        let mut result = a.empty_like();
        for left in a.streams() {
            let right = b.get(left.tag()).ok_or_else(|| FunctionError::MissingTag {
                function,
                tag: left.tag().unwrap_or("<untagged>").to_owned(),
            })?;
            if left.points().len() != right.points().len() {
                return Err(mismatch("lengths"));
            }

            let mut stream = TelemetryStream::new(left.tag().map(str::to_owned));
            for (l, r) in left.points().iter().zip(right.points()) {
                if l.period != r.period {
                    return Err(mismatch("time periods"));
                }
                let value = match (l.value, r.value) {
                    (Some(x), Some(y)) => Some(self.operator.apply(x, y)),
                    _ => None,
                };
                stream.push(TelemetryDataPoint::new(l.period, value));
            }
            result.add(stream);
        }
        Ok(result)
    }
}

impl TelemetryFunction for Arithmetic {
    fn name(&self) -> &'static str {
        self.operator.name()
    }

    fn compute(&self, params: Vec<Value>) -> Result<Value, FunctionError> {
        let function = self.operator.name();
        let [a, b] = take_params::<2>(function, params)?;

        match (a, b) {
            (Value::Number(a), Value::Number(b)) => Ok(Value::Number(self.operator.apply(a, b))),
            (Value::Series(a), Value::Number(b)) => {
                let b = a.broadcast(b);
                self.combine(&a, &b).map(Value::Series)
            }
            (Value::Number(a), Value::Series(b)) => {
                let a = b.broadcast(a);
                self.combine(&a, &b).map(Value::Series)
            }
            (Value::Series(a), Value::Series(b)) => self.combine(&a, &b).map(Value::Series),
            (a, b) => {
                let (index, actual) = match &a {
                    Value::Text(_) => (0, a.kind()),
                    _ => (1, b.kind()),
                };
                Err(FunctionError::ParameterType {
                    function,
                    index,
                    expected: "Number or TelemetryStreamCollection",
                    actual,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function::tests::{collection, values};

    fn call(op: Operator, a: Value, b: Value) -> Result<Value, FunctionError> {
        Arithmetic::new(op).compute(vec![a, b])
    }

    fn int(i: i64) -> Value {
        Value::Number(Number::Int(i))
    }

    fn float(f: f64) -> Value {
        Value::Number(Number::Float(f))
    }

    fn assert_close(actual: &[Option<f64>], expected: &[Option<f64>]) {
        assert_eq!(actual.len(), expected.len());
        for (a, e) in actual.iter().zip(expected) {
            match (a, e) {
                (Some(a), Some(e)) => assert!((a - e).abs() < 1e-9, "{a} != {e}"),
                (a, e) => assert_eq!(a, e),
            }
        }
    }

    #[test]
    fn integer_arithmetic_stays_integral() {
        assert_eq!(call(Operator::Add, int(2), int(3)).unwrap(), int(5));
        assert_eq!(call(Operator::Sub, int(2), int(3)).unwrap(), int(-1));
        assert_eq!(call(Operator::Mul, int(2), int(3)).unwrap(), int(6));
        assert_eq!(call(Operator::Add, int(2), float(0.5)).unwrap(), float(2.5));
    }

    #[test]
    fn division_is_floating() {
        assert_eq!(call(Operator::Div, int(3), int(2)).unwrap(), float(1.5));

        let inf = call(Operator::Div, int(1), int(0)).unwrap();
        assert_eq!(inf.as_number().unwrap().as_f64(), f64::INFINITY);

        let nan = call(Operator::Div, int(0), int(0)).unwrap();
        assert!(nan.as_number().unwrap().as_f64().is_nan());
    }

    #[test]
    fn broadcast_number() {
        let series = collection(&[("a", &[Some(2.0), Some(3.0)])]);
        let result = call(Operator::Mul, Value::Series(series), float(0.1))
            .unwrap()
            .into_series()
            .unwrap();
        assert_close(&values(&result, "a"), &[Some(0.2), Some(0.3)]);

        let series = collection(&[("a", &[Some(2.0), None])]);
        let result = call(Operator::Sub, int(10), Value::Series(series))
            .unwrap()
            .into_series()
            .unwrap();
        assert_close(&values(&result, "a"), &[Some(8.0), None]);
    }

    #[test]
    fn pairwise_by_tag() {
        let a = collection(&[("x", &[Some(1.0), Some(2.0)]), ("y", &[Some(10.0), None])]);
        let b = collection(&[("y", &[Some(5.0), Some(5.0)]), ("x", &[Some(1.0), Some(1.0)])]);
        let result = call(Operator::Add, Value::Series(a), Value::Series(b))
            .unwrap()
            .into_series()
            .unwrap();
        assert_close(&values(&result, "x"), &[Some(2.0), Some(3.0)]);
        assert_close(&values(&result, "y"), &[Some(15.0), None]);
    }

    #[test]
    fn different_tags_fail() {
        let a = collection(&[("x", &[Some(1.0)])]);
        let b = collection(&[("z", &[Some(1.0)])]);
        let err = call(Operator::Add, Value::Series(a), Value::Series(b)).unwrap_err();
        assert!(matches!(err, FunctionError::MissingTag { tag, .. } if tag == "x"));

        let a = collection(&[("x", &[Some(1.0)])]);
        let b = collection(&[("x", &[Some(1.0)]), ("y", &[Some(1.0)])]);
        assert!(call(Operator::Add, Value::Series(a), Value::Series(b)).is_err());
    }

    #[test]
    fn mismatched_periods_fail() {
        let a = collection(&[("x", &[Some(1.0), Some(2.0)])]);
        let b = collection(&[("x", &[Some(1.0)])]);
        // Different interval lengths.
        assert!(matches!(
            call(Operator::Add, Value::Series(a.clone()), Value::Series(b)),
            Err(FunctionError::Mismatch { what: "intervals", .. })
        ));

        // Same interval, but the second stream is shifted by a day.
        let mut shifted = a.empty_like();
        let stream = a.get(Some("x")).unwrap();
        let points = stream.points();
        shifted.add(TelemetryStream::with_points(
            Some("x".into()),
            vec![points[1], points[0]],
        ));
        assert!(matches!(
            call(Operator::Add, Value::Series(a), Value::Series(shifted)),
            Err(FunctionError::Mismatch { what: "time periods", .. })
        ));
    }

    #[test]
    fn text_parameter_rejected() {
        let err = call(Operator::Add, Value::Text("1".into()), int(1)).unwrap_err();
        assert!(matches!(err, FunctionError::ParameterType { index: 0, .. }));
        assert!(call(Operator::Add, int(1), int(1)).is_ok());
        let err = Arithmetic::new(Operator::Add).compute(vec![int(1)]).unwrap_err();
        assert!(matches!(err, FunctionError::Arity { expected: 2, .. }));
    }
}
