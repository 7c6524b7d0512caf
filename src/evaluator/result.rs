//! Objects produced by evaluation, ready to be rendered.

use std::sync::Arc;

use crate::{
    definition::{ChartDefinition, ReportDefinition, StreamsDefinition},
    stream::TelemetryDataPoint,
    value::Number,
};

/// Named series of data points. The name tells the definition, the values it
/// was evaluated with, and the tag of the underlying stream, e.g.
/// `Commits<*>:alice@example.com`.
#[derive(Debug, Clone, PartialEq)]
pub struct Stream {
    pub name: String,
    pub data: Vec<TelemetryDataPoint>,
}

#[derive(Debug, Clone)]
pub struct StreamsObject {
    pub definition: Arc<StreamsDefinition>,
    pub streams: Vec<Stream>,
}

impl StreamsObject {
    pub fn get(&self, name: &str) -> Option<&Stream> {
        self.streams.iter().find(|s| s.name == name)
    }
}

/// Resolved Y-axis. Bounds are only set for an axis that is not auto-scaled.
#[derive(Debug, Clone, PartialEq)]
pub struct YAxis {
    pub label: String,
    pub is_integer: bool,
    pub lower: Option<Number>,
    pub upper: Option<Number>,
}

impl YAxis {
    pub fn is_auto_scale(&self) -> bool {
        self.lower.is_none() && self.upper.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct SubChart {
    pub streams: StreamsObject,
    pub y_axis: YAxis,
}

#[derive(Debug, Clone)]
pub struct ChartObject {
    pub definition: Arc<ChartDefinition>,
    pub sub_charts: Vec<SubChart>,
}

#[derive(Debug, Clone)]
pub struct ReportObject {
    pub definition: Arc<ReportDefinition>,
    pub charts: Vec<ChartObject>,
}
