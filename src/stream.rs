use chrono::{Datelike, Days, Months, NaiveDate};

use crate::{domain::Project, value::Number};

/// Length of a single period of an interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Granularity {
    Day,
    Week,
    Month,
}

/// Time interval telemetry is computed over, split into consecutive periods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Interval {
    granularity: Granularity,
    start: NaiveDate,
    end: NaiveDate,
}

#[derive(Debug, Clone, Copy, thiserror::Error)]
#[error("Start of the interval is after the end")]
pub struct InvalidInterval;

impl Interval {
    pub fn new(
        granularity: Granularity,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Self, InvalidInterval> {
        if start > end {
            return Err(InvalidInterval);
        }
        Ok(Self {
            granularity,
            start,
            end,
        })
    }

    pub fn days(start: NaiveDate, end: NaiveDate) -> Result<Self, InvalidInterval> {
        Self::new(Granularity::Day, start, end)
    }

    pub fn granularity(&self) -> Granularity {
        self.granularity
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// Consecutive periods covering the interval. Weeks are counted from the
    /// start date, months are calendar months beginning with the start's month.
    pub fn periods(&self) -> Vec<Period> {
        let mut periods = Vec::new();
        let mut cursor = match self.granularity {
            Granularity::Month => self.start.with_day(1).unwrap_or(self.start),
            Granularity::Day | Granularity::Week => self.start,
        };
        while cursor <= self.end {
            let period = Period {
                granularity: self.granularity,
                start: cursor,
            };
            periods.push(period);
            match period.next_start() {
                Some(next) => cursor = next,
                None => break,
            }
        }
        periods
    }
}

/// A single day, week or month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Period {
    granularity: Granularity,
    start: NaiveDate,
}

impl Period {
    pub fn granularity(&self) -> Granularity {
        self.granularity
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    fn next_start(&self) -> Option<NaiveDate> {
        match self.granularity {
            Granularity::Day => self.start.checked_add_days(Days::new(1)),
            Granularity::Week => self.start.checked_add_days(Days::new(7)),
            Granularity::Month => self.start.checked_add_months(Months::new(1)),
        }
    }
}

/// Value of a stream for one period. A missing value means no data.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TelemetryDataPoint {
    pub period: Period,
    pub value: Option<Number>,
}

impl TelemetryDataPoint {
    pub fn new(period: Period, value: Option<Number>) -> Self {
        Self { period, value }
    }
}

/// Ordered sequence of data points, optionally tagged with the value it was
/// discriminated by (for example, a project member).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TelemetryStream {
    tag: Option<String>,
    points: Vec<TelemetryDataPoint>,
}

impl TelemetryStream {
    pub fn new(tag: Option<String>) -> Self {
        Self {
            tag,
            points: Vec::new(),
        }
    }

    pub fn with_points(tag: Option<String>, points: Vec<TelemetryDataPoint>) -> Self {
        Self { tag, points }
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    pub fn points(&self) -> &[TelemetryDataPoint] {
        &self.points
    }

    pub fn push(&mut self, point: TelemetryDataPoint) {
        self.points.push(point);
    }

    pub fn values(&self) -> impl DoubleEndedIterator<Item = Option<Number>> + '_ {
        self.points.iter().map(|p| p.value)
    }
}

/// Streams computed for the same project and interval.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryStreamCollection {
    name: String,
    project: Project,
    interval: Interval,
    streams: Vec<TelemetryStream>,
}

impl TelemetryStreamCollection {
    pub fn new(name: impl Into<String>, project: Project, interval: Interval) -> Self {
        Self {
            name: name.into(),
            project,
            interval,
            streams: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn project(&self) -> &Project {
        &self.project
    }

    pub fn interval(&self) -> &Interval {
        &self.interval
    }

    pub fn streams(&self) -> &[TelemetryStream] {
        &self.streams
    }

    pub fn into_streams(self) -> Vec<TelemetryStream> {
        self.streams
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    pub fn add(&mut self, stream: TelemetryStream) {
        self.streams.push(stream);
    }

    /// Stream carrying the tag, if any.
    pub fn get(&self, tag: Option<&str>) -> Option<&TelemetryStream> {
        self.streams.iter().find(|s| s.tag() == tag)
    }

    /// Empty collection for the same name, project, and interval.
    pub fn empty_like(&self) -> Self {
        Self::new(self.name.clone(), self.project.clone(), self.interval)
    }

    /// Collection shaped like this one, with every data point set to `value`.
    pub fn broadcast(&self, value: Number) -> Self {
        let mut result = self.empty_like();
        for stream in &self.streams {
            let points = stream
                .points()
                .iter()
                .map(|p| TelemetryDataPoint::new(p.period, Some(value)))
                .collect();
            result.add(TelemetryStream::with_points(stream.tag.clone(), points));
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::User;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn day_periods() {
        let interval = Interval::days(d(2024, 2, 27), d(2024, 3, 1)).unwrap();
        let starts: Vec<_> = interval.periods().iter().map(Period::start).collect();
        assert_eq!(
            starts,
            [d(2024, 2, 27), d(2024, 2, 28), d(2024, 2, 29), d(2024, 3, 1)]
        );
    }

    #[test]
    fn week_and_month_periods() {
        let weeks = Interval::new(Granularity::Week, d(2024, 1, 1), d(2024, 1, 20)).unwrap();
        assert_eq!(weeks.periods().len(), 3);

        let months = Interval::new(Granularity::Month, d(2024, 1, 15), d(2024, 3, 2)).unwrap();
        let starts: Vec<_> = months.periods().iter().map(Period::start).collect();
        assert_eq!(starts, [d(2024, 1, 1), d(2024, 2, 1), d(2024, 3, 1)]);
    }

    #[test]
    fn invalid_interval() {
        assert!(Interval::days(d(2024, 1, 2), d(2024, 1, 1)).is_err());
    }

    #[test]
    fn broadcast_keeps_shape() {
        let project = Project::new("Default", User::new("a@example.com"));
        let interval = Interval::days(d(2024, 1, 1), d(2024, 1, 2)).unwrap();
        let mut collection = TelemetryStreamCollection::new("c", project, interval);
        let points = interval
            .periods()
            .into_iter()
            .map(|p| TelemetryDataPoint::new(p, None))
            .collect();
        collection.add(TelemetryStream::with_points(Some("x".into()), points));

        let filled = collection.broadcast(Number::Int(7));
        assert_eq!(filled.len(), 1);
        let stream = filled.get(Some("x")).unwrap();
        assert_eq!(stream.points().len(), 2);
        assert!(stream.values().all(|v| v == Some(Number::Int(7))));
        assert_eq!(filled.project(), collection.project());
    }
}
