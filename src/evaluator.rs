//! Evaluation of definitions against project data.
//!
//! A report evaluates each chart it references, a chart evaluates the streams
//! and Y-axis definitions of each entry. Every referenced definition gets a
//! fresh [VariableResolver] binding its declared variables to the arguments
//! written at the reference, which are either literals or variables of the
//! referencing definition.

use std::sync::Arc;

use log::{debug, trace};

use crate::{
    definition::{
        ChartDefinition, DefinitionRef, NumberType, ReportDefinition, StreamsDefinition,
        YAxisDefinition,
    },
    domain::{ItemName, Project},
    error::EvaluationError,
    expr::{Constant, Expression, Parameter, Variable},
    function::{FunctionRegistry, Idempotent},
    reducer::ReducerRegistry,
    resolver::DefinitionResolver,
    stream::{Interval, TelemetryStreamCollection},
    value::{Number, Value},
    variables::VariableResolver,
};

pub mod result;

use result::{ChartObject, ReportObject, Stream, StreamsObject, SubChart, YAxis};

/// Evaluates definitions with the given functions and reducers. Holds no
/// state of its own, so one evaluator can serve any number of requests.
#[derive(Debug, Clone, Copy)]
pub struct Evaluator<'a> {
    functions: &'a FunctionRegistry,
    reducers: &'a ReducerRegistry,
}

impl<'a> Evaluator<'a> {
    pub fn new(functions: &'a FunctionRegistry, reducers: &'a ReducerRegistry) -> Self {
        Self {
            functions,
            reducers,
        }
    }

    /// Evaluate the named chart with literal values for its variables.
    pub fn evaluate_chart_request(
        &self,
        resolver: &DefinitionResolver,
        name: &str,
        params: Vec<Constant>,
        project: &Project,
        interval: &Interval,
    ) -> Result<ChartObject, EvaluationError> {
        let definition = resolver.resolve_chart_definition(name)?;
        let variables = bind_literals(&definition.name, &definition.variables, params)?;
        self.evaluate_chart(&definition, resolver, &variables, project, interval)
    }

    /// Evaluate the named report with literal values for its variables.
    pub fn evaluate_report_request(
        &self,
        resolver: &DefinitionResolver,
        name: &str,
        params: Vec<Constant>,
        project: &Project,
        interval: &Interval,
    ) -> Result<ReportObject, EvaluationError> {
        let definition = resolver.resolve_report_definition(name)?;
        let variables = bind_literals(&definition.name, &definition.variables, params)?;
        self.evaluate_report(&definition, resolver, &variables, project, interval)
    }

    pub fn evaluate_report(
        &self,
        definition: &Arc<ReportDefinition>,
        resolver: &DefinitionResolver,
        variables: &VariableResolver,
        project: &Project,
        interval: &Interval,
    ) -> Result<ReportObject, EvaluationError> {
        debug!("Evaluating report `{}` for {project}", definition.name);

        let mut charts = Vec::with_capacity(definition.charts.len());
        for reference in &definition.charts {
            let chart = resolver.resolve_chart_definition(&reference.name)?;
            let child = bind(reference, &chart.variables, variables)?;
            charts.push(self.evaluate_chart(&chart, resolver, &child, project, interval)?);
        }

        Ok(ReportObject {
            definition: definition.clone(),
            charts,
        })
    }

    pub fn evaluate_chart(
        &self,
        definition: &Arc<ChartDefinition>,
        resolver: &DefinitionResolver,
        variables: &VariableResolver,
        project: &Project,
        interval: &Interval,
    ) -> Result<ChartObject, EvaluationError> {
        debug!("Evaluating chart `{}` for {project}", definition.name);

        let mut sub_charts = Vec::with_capacity(definition.entries.len());
        for entry in &definition.entries {
            let streams = resolver.resolve_streams_definition(&entry.streams.name)?;
            let y_axis = resolver.resolve_y_axis_definition(&entry.y_axis.name)?;

            let streams_vars = bind(&entry.streams, &streams.variables, variables)?;
            let streams = self.evaluate_streams(&streams, &streams_vars, project, interval)?;

            let y_axis_vars = bind(&entry.y_axis, &y_axis.variables, variables)?;
            let y_axis = resolve_y_axis(&y_axis, &y_axis_vars)?;

            sub_charts.push(SubChart { streams, y_axis });
        }

        Ok(ChartObject {
            definition: definition.clone(),
            sub_charts,
        })
    }

    /// Evaluate the body of a streams definition. It must produce a stream
    /// collection, whose streams are named after the definition.
    pub fn evaluate_streams(
        &self,
        definition: &Arc<StreamsDefinition>,
        variables: &VariableResolver,
        project: &Project,
        interval: &Interval,
    ) -> Result<StreamsObject, EvaluationError> {
        trace!("Evaluating streams `{}`", definition.name);

        let value = self.resolve_expression(&definition.expression, variables, project, interval)?;
        let value = self.functions.compute(Idempotent::NAME, vec![value])?;
        let Value::Series(collection) = value else {
            return Err(EvaluationError::NotStreamCollection(
                definition.name.to_string(),
            ));
        };

        let base = stream_base_name(&definition.name, &definition.variables, variables)?;
        let streams = collection
            .into_streams()
            .into_iter()
            .map(|stream| {
                let name = match stream.tag() {
                    Some(tag) => format!("{base}:{tag}"),
                    None => base.clone(),
                };
                Stream {
                    name,
                    data: stream.points().to_vec(),
                }
            })
            .collect();

        Ok(StreamsObject {
            definition: definition.clone(),
            streams,
        })
    }

    fn resolve_expression(
        &self,
        expression: &Expression,
        variables: &VariableResolver,
        project: &Project,
        interval: &Interval,
    ) -> Result<Value, EvaluationError> {
        match expression {
            Expression::Constant(c) => Ok(c.clone().into()),
            Expression::Variable(v) => Ok(variables.resolve(v)?.clone().into()),
            Expression::FunctionCall { name, args } => {
                let params = self.resolve_args(args, variables, project, interval)?;
                trace!("Calling function `{name}` with {} parameter(s)", params.len());
                Ok(self.functions.compute(name, params)?)
            }
            Expression::ReducerCall { name, args } => {
                let params = self.resolve_args(args, variables, project, interval)?;
                // Functions registered by the host are not known to the parser.
                if self.reducers.get(name).is_none() {
                    if let Ok(function) = self.functions.get(name) {
                        trace!("Calling registered function `{name}`");
                        return Ok(function.compute(params)?);
                    }
                }
                self.resolve_reducer_call(name, params, project, interval)
                    .map(Value::Series)
            }
        }
    }

    /// Evaluate call arguments from left to right.
    fn resolve_args(
        &self,
        args: &[Expression],
        variables: &VariableResolver,
        project: &Project,
        interval: &Interval,
    ) -> Result<Vec<Value>, EvaluationError> {
        args.iter()
            .map(|arg| self.resolve_expression(arg, variables, project, interval))
            .collect()
    }

    fn resolve_reducer_call(
        &self,
        name: &ItemName,
        params: Vec<Value>,
        project: &Project,
        interval: &Interval,
    ) -> Result<TelemetryStreamCollection, EvaluationError> {
        let options = params
            .into_iter()
            .map(|param| match param {
                Value::Text(text) => Ok(text),
                other => Err(EvaluationError::ReducerParameterNotString {
                    reducer: name.to_string(),
                    kind: other.kind(),
                }),
            })
            .collect::<Result<Vec<_>, _>>()?;

        let reducer = self
            .reducers
            .get(name)
            .ok_or_else(|| EvaluationError::UnknownReducer(name.to_string()))?;
        debug!("Calling reducer `{name}` for {project} with {options:?}");
        Ok(reducer.compute(project, interval, &options)?)
    }
}

/// Bind the arguments written at `reference` to the declared variables of
/// the referenced definition. Variable arguments take their value from `outer`.
fn bind(
    reference: &DefinitionRef,
    declared: &[Variable],
    outer: &VariableResolver,
) -> Result<VariableResolver, EvaluationError> {
    check_count(&reference.name, declared.len(), reference.arguments.len())?;

    let mut child = VariableResolver::new();
    for (variable, argument) in declared.iter().zip(&reference.arguments) {
        let value = match argument {
            Parameter::Constant(c) => c.clone(),
            Parameter::Variable(v) => outer.resolve(v)?.clone(),
        };
        child.add(variable.clone(), value)?;
    }
    Ok(child)
}

fn bind_literals(
    name: &ItemName,
    declared: &[Variable],
    params: Vec<Constant>,
) -> Result<VariableResolver, EvaluationError> {
    check_count(name, declared.len(), params.len())?;

    let mut variables = VariableResolver::new();
    for (variable, value) in declared.iter().zip(params) {
        variables.add(variable.clone(), value)?;
    }
    Ok(variables)
}

fn check_count(name: &ItemName, expected: usize, actual: usize) -> Result<(), EvaluationError> {
    if expected == actual {
        Ok(())
    } else {
        Err(EvaluationError::ParameterCountMismatch {
            name: name.to_string(),
            expected,
            actual,
        })
    }
}

/// `Name` or `Name<v1, v2>` with the values bound to the declared variables.
fn stream_base_name(
    name: &ItemName,
    declared: &[Variable],
    variables: &VariableResolver,
) -> Result<String, EvaluationError> {
    if declared.is_empty() {
        return Ok(name.to_string());
    }
    let values = variables
        .values_of(declared)?
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    Ok(format!("{name}<{values}>"))
}

fn resolve_y_axis(
    definition: &YAxisDefinition,
    variables: &VariableResolver,
) -> Result<YAxis, EvaluationError> {
    let label = match resolve_parameter(&definition.label, variables)? {
        Constant::Str(label) => label,
        Constant::Num(_) => {
            return Err(EvaluationError::LabelNotString {
                name: definition.name.to_string(),
            })
        }
    };

    let (lower, upper) = match &definition.bounds {
        None => (None, None),
        Some((lower, upper)) => {
            let bound = |p: &Parameter| -> Result<Number, EvaluationError> {
                match resolve_parameter(p, variables)? {
                    Constant::Num(n) => Ok(n),
                    Constant::Str(_) => Err(EvaluationError::BoundNotNumber {
                        name: definition.name.to_string(),
                    }),
                }
            };
            (Some(bound(lower)?), Some(bound(upper)?))
        }
    };

    Ok(YAxis {
        label,
        is_integer: definition.number_type == NumberType::Integer,
        lower,
        upper,
    })
}

fn resolve_parameter(
    parameter: &Parameter,
    variables: &VariableResolver,
) -> Result<Constant, EvaluationError> {
    match parameter {
        Parameter::Constant(c) => Ok(c.clone()),
        Parameter::Variable(v) => variables.resolve(v).cloned(),
    }
}

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;

    use super::*;
    use crate::{
        domain::User,
        error::ReducerError,
        function::tests::{interval, project},
        manager::DefinitionManager,
        reducer::{Reducer, ReducerOptions},
        scope::ShareScope,
        stream::{TelemetryDataPoint, TelemetryStream},
    };

    /// Commits per member: alice 1, 2, 3 and bob 0, none, 4.
    #[derive(Default)]
    struct Commit {
        calls: Mutex<Vec<Vec<String>>>,
    }

    impl Reducer for Commit {
        fn name(&self) -> &str {
            "Commit"
        }

        fn compute(
            &self,
            project: &Project,
            interval: &Interval,
            options: &[String],
        ) -> Result<TelemetryStreamCollection, ReducerError> {
            let opts = ReducerOptions::new(self.name(), options, 1)?;
            self.calls.lock().push(options.to_vec());
            let member = opts.str_or(0, "*");

            let data: [(&str, [Option<i64>; 3]); 2] = [
                ("alice", [Some(1), Some(2), Some(3)]),
                ("bob", [Some(0), None, Some(4)]),
            ];
            let mut collection = TelemetryStreamCollection::new(self.name(), project.clone(), *interval);
            for (tag, values) in data {
                if member != "*" && member != tag {
                    continue;
                }
                let points = interval
                    .periods()
                    .into_iter()
                    .zip(values)
                    .map(|(p, v)| TelemetryDataPoint::new(p, v.map(Number::Int)))
                    .collect();
                collection.add(TelemetryStream::with_points(Some(tag.to_owned()), points));
            }
            Ok(collection)
        }
    }

    /// Single untagged stream of ones.
    struct Total;

    impl Reducer for Total {
        fn name(&self) -> &str {
            "Total"
        }

        fn compute(
            &self,
            project: &Project,
            interval: &Interval,
            _options: &[String],
        ) -> Result<TelemetryStreamCollection, ReducerError> {
            let points = interval
                .periods()
                .into_iter()
                .map(|p| TelemetryDataPoint::new(p, Some(Number::Int(1))))
                .collect();
            let mut collection = TelemetryStreamCollection::new("Total", project.clone(), *interval);
            collection.add(TelemetryStream::with_points(None, points));
            Ok(collection)
        }
    }

    const DEFINITIONS: &str = r#"
        streams Commits(member) = {"Commits", Commit(member)};
        streams Doubled(member) = {"Doubled", Commit(member) * 2};
        streams Everything() = {"Everything", Total()};
        streams Constant() = {"Not a stream", 1 + 2};
        streams WrongOption() = {"Wrong", Commit(1)};
        streams NoReducer() = {"No reducer", Deploys()};
        streams Pair(member, kind) = {"Pair", Commit(member)};
        streams Active(cutoff) = {"Active", Filter(Commit("*"), "sum", "Above", cutoff)};

        yaxis Count(label) = {label, "integer"};
        yaxis Range(label, lower, upper) = {label, "double", lower, upper};

        chart Development(member) = {"Development",
            (Commits(member), Count("Commits")),
            (Doubled("alice"), Range("Twice", 0, member))
        };
        chart Pairs(member) = {"Pairs", (Pair(member, "lit"), Count("Commits"))};
        chart Simple(member) = {"Simple", (Commits(member), Count("Commits"))};
        chart Mismatch() = {"Mismatch", (Commits(), Count("Commits"))};
        chart NumericLabel() = {"Numeric label", (Everything(), Count(5))};
        chart TextBound() = {"Text bound", (Everything(), Range("x", "low", 1))};

        report Weekly(member) = {"Weekly", Simple(member), Simple("bob")};
    "#;

    struct Fixture {
        manager: DefinitionManager,
        functions: FunctionRegistry,
        reducers: ReducerRegistry,
        commit: Arc<Commit>,
        user: User,
    }

    impl Fixture {
        fn new() -> Self {
            crate::init_log();

            let user = User::new("alice@example.com");
            let manager = DefinitionManager::non_persistent(None);
            for result in manager.add_sources(&user, &ShareScope::Private, DEFINITIONS) {
                result.unwrap();
            }

            let commit = Arc::new(Commit::default());
            let mut reducers = ReducerRegistry::new();
            reducers.register(commit.clone());
            reducers.register(Arc::new(Total));

            Self {
                manager,
                functions: FunctionRegistry::new(),
                reducers,
                commit,
                user,
            }
        }

        fn evaluator(&self) -> Evaluator {
            Evaluator::new(&self.functions, &self.reducers)
        }

        fn resolver(&self) -> DefinitionResolver {
            DefinitionResolver::new(&self.manager, &self.user)
        }

        fn streams(&self, name: &str, values: &[Constant]) -> Result<StreamsObject, EvaluationError> {
            let definition = self.resolver().resolve_streams_definition(name)?;
            let mut variables = VariableResolver::new();
            for (variable, value) in definition.variables.iter().zip(values) {
                variables.add(variable.clone(), value.clone()).unwrap();
            }
            self.evaluator()
                .evaluate_streams(&definition, &variables, &project(), &interval(3))
        }

        fn chart(&self, name: &str, params: Vec<Constant>) -> Result<ChartObject, EvaluationError> {
            self.evaluator().evaluate_chart_request(
                &self.resolver(),
                name,
                params,
                &project(),
                &interval(3),
            )
        }
    }

    fn values(stream: &Stream) -> Vec<Option<Number>> {
        stream.data.iter().map(|p| p.value).collect()
    }

    #[test]
    fn stream_names() {
        let fixture = Fixture::new();

        let result = fixture.streams("Commits", &[Constant::from("*")]).unwrap();
        let names: Vec<_> = result.streams.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["Commits<*>:alice", "Commits<*>:bob"]);
        assert_eq!(
            values(result.get("Commits<*>:bob").unwrap()),
            [Some(Number::Int(0)), None, Some(Number::Int(4))]
        );

        let result = fixture.streams("Everything", &[]).unwrap();
        assert_eq!(result.streams.len(), 1);
        assert_eq!(result.streams[0].name, "Everything");
        assert_eq!(result.streams[0].data.len(), 3);
    }

    #[test]
    fn variables_reach_reducer() {
        let fixture = Fixture::new();
        let result = fixture.streams("Commits", &[Constant::from("bob")]).unwrap();
        assert_eq!(result.streams.len(), 1);
        assert_eq!(result.streams[0].name, "Commits<bob>:bob");
        assert_eq!(*fixture.commit.calls.lock(), [vec!["bob".to_owned()]]);
    }

    #[test]
    fn arithmetic_on_reducer_output() {
        let fixture = Fixture::new();
        let result = fixture.streams("Doubled", &[Constant::from("alice")]).unwrap();
        assert_eq!(
            values(&result.streams[0]),
            [
                Some(Number::Int(2)),
                Some(Number::Int(4)),
                Some(Number::Int(6))
            ]
        );
    }

    #[test]
    fn body_must_be_stream_collection() {
        let fixture = Fixture::new();
        let err = fixture.streams("Constant", &[]).unwrap_err();
        assert!(matches!(err, EvaluationError::NotStreamCollection(name) if name == "Constant"));
    }

    #[test]
    fn reducer_errors() {
        let fixture = Fixture::new();
        let err = fixture.streams("WrongOption", &[]).unwrap_err();
        assert!(matches!(
            err,
            EvaluationError::ReducerParameterNotString { kind: "Number", .. }
        ));

        let err = fixture.streams("NoReducer", &[]).unwrap_err();
        assert!(matches!(err, EvaluationError::UnknownReducer(name) if name == "Deploys"));
    }

    #[test]
    fn function_errors_propagate() {
        let fixture = Fixture::new();
        let err = fixture
            .streams("Active", &[Constant::from(1)])
            .unwrap_err();
        assert!(matches!(err, EvaluationError::Function(_)));
    }

    #[test]
    fn unbound_variable() {
        let fixture = Fixture::new();
        let err = fixture.streams("Commits", &[]).unwrap_err();
        assert!(matches!(err, EvaluationError::UnboundVariable(name) if name == "member"));
    }

    #[test]
    fn chart_arguments_reach_entries() {
        let fixture = Fixture::new();

        // `member` is also the upper bound of the second entry's axis.
        let err = fixture
            .chart("Development", vec![Constant::from("*")])
            .unwrap_err();
        assert!(matches!(err, EvaluationError::BoundNotNumber { name } if name == "Range"));

        let err = fixture
            .chart("Development", vec![Constant::from(10)])
            .unwrap_err();
        assert!(matches!(
            err,
            EvaluationError::ReducerParameterNotString { .. }
        ));
    }

    #[test]
    fn stream_name_lists_values_in_order() {
        let fixture = Fixture::new();
        let chart = fixture.chart("Pairs", vec![Constant::from("bob")]).unwrap();
        let streams = &chart.sub_charts[0].streams.streams;
        assert_eq!(streams.len(), 1);
        assert_eq!(streams[0].name, "Pair<bob, lit>:bob");
    }

    #[test]
    fn chart_entries() {
        let fixture = Fixture::new();
        let chart = fixture.chart("Simple", vec![Constant::from("*")]).unwrap();
        assert_eq!(chart.definition.name, "Simple");
        assert_eq!(chart.sub_charts.len(), 1);

        let sub = &chart.sub_charts[0];
        assert_eq!(sub.streams.streams.len(), 2);
        assert_eq!(
            sub.y_axis,
            YAxis {
                label: "Commits".into(),
                is_integer: true,
                lower: None,
                upper: None,
            }
        );
        assert!(sub.y_axis.is_auto_scale());
    }

    #[test]
    fn bounded_axis() {
        let fixture = Fixture::new();
        fixture
            .manager
            .add_source(
                &fixture.user,
                &ShareScope::Private,
                r#"chart Bounded(top) = {"Bounded", (Doubled("alice"), Range("Twice", 0, top))};"#,
            )
            .unwrap();

        let chart = fixture.chart("Bounded", vec![Constant::from(7.5)]).unwrap();
        let y_axis = &chart.sub_charts[0].y_axis;
        assert_eq!(y_axis.label, "Twice");
        assert!(!y_axis.is_integer);
        assert_eq!(y_axis.lower, Some(Number::Int(0)));
        assert_eq!(y_axis.upper, Some(Number::Float(7.5)));
        assert_eq!(
            chart.sub_charts[0].streams.streams[0].name,
            "Doubled<alice>:alice"
        );
    }

    #[test]
    fn chart_errors() {
        let fixture = Fixture::new();

        let err = fixture.chart("Mismatch", vec![]).unwrap_err();
        assert!(matches!(
            err,
            EvaluationError::ParameterCountMismatch {
                expected: 1,
                actual: 0,
                ..
            }
        ));

        let err = fixture.chart("NumericLabel", vec![]).unwrap_err();
        assert!(matches!(err, EvaluationError::LabelNotString { name } if name == "Count"));

        let err = fixture.chart("TextBound", vec![]).unwrap_err();
        assert!(matches!(err, EvaluationError::BoundNotNumber { .. }));

        let err = fixture
            .chart("Simple", vec![Constant::from("*"), Constant::from("*")])
            .unwrap_err();
        assert!(matches!(
            err,
            EvaluationError::ParameterCountMismatch {
                expected: 1,
                actual: 2,
                ..
            }
        ));

        let err = fixture.chart("Missing", vec![]).unwrap_err();
        assert!(matches!(err, EvaluationError::DefinitionNotFound { .. }));
    }

    #[test]
    fn report() {
        let fixture = Fixture::new();
        let report = fixture
            .evaluator()
            .evaluate_report_request(
                &fixture.resolver(),
                "Weekly",
                vec![Constant::from("alice")],
                &project(),
                &interval(3),
            )
            .unwrap();

        assert_eq!(report.definition.title, "Weekly");
        assert_eq!(report.charts.len(), 2);
        let names: Vec<_> = report
            .charts
            .iter()
            .map(|c| c.sub_charts[0].streams.streams[0].name.as_str())
            .collect();
        assert_eq!(names, ["Commits<alice>:alice", "Commits<bob>:bob"]);
    }

    #[test]
    fn private_definitions_are_hidden_from_others() {
        let fixture = Fixture::new();
        let bob = User::new("bob@example.com");
        let resolver = DefinitionResolver::new(&fixture.manager, &bob);
        let err = fixture
            .evaluator()
            .evaluate_chart_request(&resolver, "Simple", vec![Constant::from("*")], &project(), &interval(3))
            .unwrap_err();
        assert!(matches!(err, EvaluationError::DefinitionNotFound { .. }));
    }

    /// Keeps the streams whose tag starts with the given prefix.
    struct TagPrefix;

    impl crate::function::TelemetryFunction for TagPrefix {
        fn name(&self) -> &'static str {
            "TagPrefix"
        }

        fn compute(&self, params: Vec<Value>) -> Result<Value, crate::error::FunctionError> {
            let mut params = params.into_iter();
            let (Some(Value::Series(series)), Some(Value::Text(prefix))) =
                (params.next(), params.next())
            else {
                return Err(crate::error::FunctionError::InvalidArgument {
                    function: "TagPrefix",
                    message: "expected a collection and a prefix".into(),
                });
            };
            let mut result = series.empty_like();
            for stream in series.into_streams() {
                if stream.tag().is_some_and(|t| t.starts_with(&prefix)) {
                    result.add(stream);
                }
            }
            Ok(Value::Series(result))
        }
    }

    #[test]
    fn registered_function_is_callable() {
        let mut fixture = Fixture::new();
        fixture.functions.register(Arc::new(TagPrefix)).unwrap();
        fixture
            .manager
            .add_source(
                &fixture.user,
                &ShareScope::Private,
                r#"streams Bs() = {"B members", TagPrefix(Commit("*"), "b")};"#,
            )
            .unwrap();

        let result = fixture.streams("Bs", &[]).unwrap();
        let names: Vec<_> = result.streams.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["Bs:bob"]);
    }
}
