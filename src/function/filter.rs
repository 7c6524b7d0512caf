use std::cmp::Ordering;

use log::trace;

use crate::{
    error::FunctionError,
    stream::{TelemetryStream, TelemetryStreamCollection},
    value::Value,
};

use super::{expect_series, take_params, TelemetryFunction};

/// Drops the streams that carry no information: every value is missing or zero.
#[derive(Debug, Clone, Copy)]
pub struct FilterZero;

impl FilterZero {
    pub const NAME: &'static str = "FilterZero";
}

impl TelemetryFunction for FilterZero {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn compute(&self, params: Vec<Value>) -> Result<Value, FunctionError> {
        let [series] = take_params::<1>(Self::NAME, params)?;
        let series = expect_series(Self::NAME, 0, series)?;

        let mut result = series.empty_like();
        for stream in series.into_streams() {
            if stream.values().flatten().any(|v| !v.is_zero()) {
                result.add(stream);
            }
        }
        Ok(Value::Series(result))
    }
}

/// Scalar summary of a stream used to order and select streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rank {
    Avg,
    Max,
    Min,
    Last,
    Delta,
    SimpleDelta,
}

impl Rank {
    pub fn parse(name: &str) -> Option<Self> {
        let rank = match name.to_ascii_lowercase().as_str() {
            "avg" => Rank::Avg,
            "max" => Rank::Max,
            "min" => Rank::Min,
            "last" => Rank::Last,
            "delta" => Rank::Delta,
            "simpledelta" => Rank::SimpleDelta,
            _ => return None,
        };
        Some(rank)
    }

    /// Rank of the stream over its finite values. Only `Max` and `Min` have no
    /// rank when there are no such values; the others fall back to zero.
    pub fn of(self, stream: &TelemetryStream) -> Option<f64> {
        let finite = || {
            stream
                .values()
                .flatten()
                .map(|v| v.as_f64())
                .filter(|v| v.is_finite())
        };

        match self {
            Rank::Avg => {
                let (sum, count) = finite().fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
                Some(if count == 0 { 0.0 } else { sum / count as f64 })
            }
            Rank::Max => finite().reduce(f64::max),
            Rank::Min => finite().reduce(f64::min),
            Rank::Last => Some(finite().next_back().unwrap_or(0.0)),
            Rank::Delta => {
                let mut values = finite();
                let Some(first) = values.next() else {
                    return Some(0.0);
                };
                let (sum, _) = values.fold((0.0, first), |(sum, prev), v| (sum + (v - prev).abs(), v));
                Some(sum)
            }
            Rank::SimpleDelta => match (finite().next(), finite().next_back()) {
                (Some(first), Some(last)) => Some(last - first),
                _ => Some(0.0),
            },
        }
    }
}

/// How the cutoff selects streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Above,
    Below,
    Top,
    Bottom,
    TopPercent,
    BottomPercent,
}

impl Mode {
    pub fn parse(name: &str) -> Option<Self> {
        let mode = match name.to_ascii_lowercase().as_str() {
            "above" => Mode::Above,
            "below" => Mode::Below,
            "top" => Mode::Top,
            "bottom" => Mode::Bottom,
            "toppercent" => Mode::TopPercent,
            "bottompercent" => Mode::BottomPercent,
            _ => return None,
        };
        Some(mode)
    }
}

/// `Filter(series, rank, mode, cutoff)`: select streams by their rank.
///
/// `Above` and `Below` compare each rank with the cutoff. The other modes sort
/// the streams by ascending rank, keeping the order of equally ranked streams,
/// and take the upper or lower end of that order.
#[derive(Debug, Clone, Copy)]
pub struct Filter;

impl Filter {
    pub const NAME: &'static str = "Filter";

    fn invalid(message: impl Into<String>) -> FunctionError {
        FunctionError::InvalidArgument {
            function: Self::NAME,
            message: message.into(),
        }
    }

    fn text(index: usize, value: Value) -> Result<String, FunctionError> {
        match value {
            Value::Text(text) => Ok(text),
            other => Err(FunctionError::ParameterType {
                function: Self::NAME,
                index,
                expected: "String",
                actual: other.kind(),
            }),
        }
    }

    fn cutoff(value: Value) -> Result<f64, FunctionError> {
        match value {
            Value::Number(n) => Ok(n.as_f64()),
            Value::Text(text) => text
                .trim()
                .parse::<f64>()
                .map_err(|_| Self::invalid(format!("cutoff `{text}` is not a number"))),
            other => Err(FunctionError::ParameterType {
                function: Self::NAME,
                index: 3,
                expected: "Number",
                actual: other.kind(),
            }),
        }
    }

    fn percent(cutoff: f64) -> Result<f64, FunctionError> {
        if (0.0..=100.0).contains(&cutoff) {
            Ok(cutoff)
        } else {
            Err(Self::invalid(format!(
                "percentage {cutoff} is outside of [0, 100]"
            )))
        }
    }

    /// Number of streams selected by a count cutoff, clamped to `len`.
    fn count(cutoff: f64, len: usize) -> usize {
        if cutoff <= 0.0 || cutoff.is_nan() {
            0
        } else {
            (cutoff.trunc() as usize).min(len)
        }
    }

    pub fn apply(
        series: TelemetryStreamCollection,
        rank: Rank,
        mode: Mode,
        cutoff: f64,
    ) -> Result<TelemetryStreamCollection, FunctionError> {
        let mut result = series.empty_like();
        let mut ranked: Vec<_> = series
            .into_streams()
            .into_iter()
            .map(|stream| (rank.of(&stream), stream))
            .collect();

        let keep = |range: std::ops::Range<usize>, ranked: Vec<(Option<f64>, TelemetryStream)>| {
            ranked
                .into_iter()
                .skip(range.start)
                .take(range.end - range.start)
                .map(|(_, stream)| stream)
        };

        let len = ranked.len();
        let selected: Vec<TelemetryStream> = match mode {
            Mode::Above | Mode::Below => ranked
                .into_iter()
                .filter(|(r, _)| match (r, mode) {
                    (Some(r), Mode::Above) => *r > cutoff,
                    (Some(r), _) => *r < cutoff,
                    (None, _) => false,
                })
                .map(|(_, stream)| stream)
                .collect(),
            relative => {
                // Stable, so equally ranked streams keep their order.
                ranked.sort_by(|(a, _), (b, _)| compare_rank(*a, *b));
                let range = match relative {
                    Mode::Top => len - Self::count(cutoff, len)..len,
                    Mode::Bottom => 0..Self::count(cutoff, len),
                    Mode::TopPercent => {
                        let p = Self::percent(cutoff)?;
                        let from = (len as f64 - len as f64 * p / 100.0).floor().max(0.0);
                        (from as usize).min(len)..len
                    }
                    Mode::BottomPercent => {
                        let p = Self::percent(cutoff)?;
                        let to = (len as f64 * p / 100.0).ceil();
                        0..(to as usize).min(len)
                    }
                    Mode::Above | Mode::Below => 0..len,
                };
                keep(range, ranked).collect()
            }
        };

        trace!(
            "Filter {rank:?} {mode:?} {cutoff} kept {} of {len} stream(s)",
            selected.len()
        );
        for stream in selected {
            result.add(stream);
        }
        Ok(result)
    }
}

/// Streams without a rank order before every ranked stream.
fn compare_rank(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.total_cmp(&b),
        (a, b) => a.is_some().cmp(&b.is_some()),
    }
}

impl TelemetryFunction for Filter {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn compute(&self, params: Vec<Value>) -> Result<Value, FunctionError> {
        let [series, rank, mode, cutoff] = take_params::<4>(Self::NAME, params)?;
        let series = expect_series(Self::NAME, 0, series)?;

        let rank_name = Self::text(1, rank)?;
        let rank = Rank::parse(&rank_name)
            .ok_or_else(|| Self::invalid(format!("unknown rank function `{rank_name}`")))?;
        let mode_name = Self::text(2, mode)?;
        let mode = Mode::parse(&mode_name)
            .ok_or_else(|| Self::invalid(format!("unknown filter mode `{mode_name}`")))?;
        let cutoff = Self::cutoff(cutoff)?;

        Self::apply(series, rank, mode, cutoff).map(Value::Series)
    }
}
