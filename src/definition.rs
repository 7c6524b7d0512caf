use std::{collections::HashSet, sync::Arc};

use crate::{
    domain::{ItemName, User},
    error::ConfigurationError,
    expr::{Expression, Parameter, Variable},
    parse,
    scope::ShareScope,
};

/// Kind of a telemetry definition. All kinds share one name space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DefinitionKind {
    Streams,
    Chart,
    YAxis,
    Report,
}

impl DefinitionKind {
    pub const ALL: [DefinitionKind; 4] = [
        DefinitionKind::Streams,
        DefinitionKind::Chart,
        DefinitionKind::YAxis,
        DefinitionKind::Report,
    ];

    /// Keyword that starts a definition of this kind.
    pub fn keyword(self) -> &'static str {
        match self {
            DefinitionKind::Streams => "streams",
            DefinitionKind::Chart => "chart",
            DefinitionKind::YAxis => "yaxis",
            DefinitionKind::Report => "report",
        }
    }
}

impl std::fmt::Display for DefinitionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.keyword())
    }
}

/// Streams definition: a description and an expression that must evaluate to
/// a stream collection.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamsDefinition {
    pub name: ItemName,
    pub variables: Vec<Variable>,
    pub description: String,
    pub expression: Expression,
}

/// Use of another definition, with arguments for its declared variables.
#[derive(Debug, Clone, PartialEq)]
pub struct DefinitionRef {
    pub name: ItemName,
    pub arguments: Vec<Parameter>,
}

impl DefinitionRef {
    pub fn to_pretty_string(&self) -> String {
        format!("{}({})", self.name, join_pretty(&self.arguments))
    }
}

/// One plotted series of a chart: the streams and the axis they are drawn against.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartEntry {
    pub streams: DefinitionRef,
    pub y_axis: DefinitionRef,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChartDefinition {
    pub name: ItemName,
    pub variables: Vec<Variable>,
    pub title: String,
    pub entries: Vec<ChartEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumberType {
    Integer,
    Double,
}

impl NumberType {
    pub fn keyword(self) -> &'static str {
        match self {
            NumberType::Integer => "integer",
            NumberType::Double => "double",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct YAxisDefinition {
    pub name: ItemName,
    pub variables: Vec<Variable>,
    pub label: Parameter,
    pub number_type: NumberType,

    /// Lower and upper bound. `None` for an auto-scaled axis.
    pub bounds: Option<(Parameter, Parameter)>,
}

impl YAxisDefinition {
    pub fn is_auto_scale(&self) -> bool {
        self.bounds.is_none()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportDefinition {
    pub name: ItemName,
    pub variables: Vec<Variable>,
    pub title: String,
    pub charts: Vec<DefinitionRef>,
}

/// Parsed body of a definition of any kind.
#[derive(Debug, Clone, PartialEq)]
pub enum DefinitionAst {
    Streams(Arc<StreamsDefinition>),
    Chart(Arc<ChartDefinition>),
    YAxis(Arc<YAxisDefinition>),
    Report(Arc<ReportDefinition>),
}

impl DefinitionAst {
    pub fn kind(&self) -> DefinitionKind {
        match self {
            DefinitionAst::Streams(_) => DefinitionKind::Streams,
            DefinitionAst::Chart(_) => DefinitionKind::Chart,
            DefinitionAst::YAxis(_) => DefinitionKind::YAxis,
            DefinitionAst::Report(_) => DefinitionKind::Report,
        }
    }

    pub fn name(&self) -> &ItemName {
        match self {
            DefinitionAst::Streams(d) => &d.name,
            DefinitionAst::Chart(d) => &d.name,
            DefinitionAst::YAxis(d) => &d.name,
            DefinitionAst::Report(d) => &d.name,
        }
    }

    pub fn variables(&self) -> &[Variable] {
        match self {
            DefinitionAst::Streams(d) => &d.variables,
            DefinitionAst::Chart(d) => &d.variables,
            DefinitionAst::YAxis(d) => &d.variables,
            DefinitionAst::Report(d) => &d.variables,
        }
    }

    /// Canonical source text. Parsing it yields an equal AST.
    pub fn to_pretty_string(&self) -> String {
        let body = match self {
            DefinitionAst::Streams(d) => format!(
                "{}, {}",
                quote(&d.description),
                d.expression.to_pretty_string()
            ),
            DefinitionAst::Chart(d) => {
                let mut body = quote(&d.title);
                for entry in &d.entries {
                    body.push_str(&format!(
                        ", ({}, {})",
                        entry.streams.to_pretty_string(),
                        entry.y_axis.to_pretty_string()
                    ));
                }
                body
            }
            DefinitionAst::YAxis(d) => {
                let mut body = format!(
                    "{}, {}",
                    d.label.to_pretty_string(),
                    quote(d.number_type.keyword())
                );
                if let Some((lower, upper)) = &d.bounds {
                    body.push_str(&format!(
                        ", {}, {}",
                        lower.to_pretty_string(),
                        upper.to_pretty_string()
                    ));
                }
                body
            }
            DefinitionAst::Report(d) => {
                let mut body = quote(&d.title);
                for chart in &d.charts {
                    body.push_str(", ");
                    body.push_str(&chart.to_pretty_string());
                }
                body
            }
        };

        let variables = self
            .variables()
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "{} {}({variables}) = {{{body}}};",
            self.kind(),
            self.name()
        )
    }

    /// Check that variables are declared once and that the body only uses declared ones.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let name = self.name().to_string();

        let mut declared = HashSet::new();
        for variable in self.variables() {
            if !declared.insert(variable) {
                return Err(ConfigurationError::DuplicateDeclaration {
                    name,
                    variable: variable.to_string(),
                });
            }
        }

        let mut undeclared = None;
        let mut check = |v: &Variable| {
            if undeclared.is_none() && !declared.contains(v) {
                undeclared = Some(v.to_string());
            }
        };
        match self {
            DefinitionAst::Streams(d) => d.expression.for_each_variable(&mut |v| check(v)),
            DefinitionAst::Chart(d) => {
                for entry in &d.entries {
                    ref_variables(&entry.streams, &mut check);
                    ref_variables(&entry.y_axis, &mut check);
                }
            }
            DefinitionAst::YAxis(d) => {
                param_variable(&d.label, &mut check);
                if let Some((lower, upper)) = &d.bounds {
                    param_variable(lower, &mut check);
                    param_variable(upper, &mut check);
                }
            }
            DefinitionAst::Report(d) => {
                for chart in &d.charts {
                    ref_variables(chart, &mut check);
                }
            }
        }

        match undeclared {
            Some(variable) => Err(ConfigurationError::UndeclaredVariable { name, variable }),
            None => Ok(()),
        }
    }
}

fn ref_variables(r: &DefinitionRef, f: &mut impl FnMut(&Variable)) {
    for arg in &r.arguments {
        param_variable(arg, f);
    }
}

fn param_variable(p: &Parameter, f: &mut impl FnMut(&Variable)) {
    if let Parameter::Variable(v) = p {
        f(v);
    }
}

fn join_pretty(params: &[Parameter]) -> String {
    params
        .iter()
        .map(Parameter::to_pretty_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn quote(s: &str) -> String {
    crate::expr::Constant::Str(s.to_owned()).to_pretty_string()
}

/// A registered definition: the parsed AST together with who owns it, who can
/// see it, and the text it was defined with.
#[derive(Debug, Clone)]
pub struct TelemetryDefinition {
    owner: User,
    scope: ShareScope,
    source: String,
    ast: DefinitionAst,
}

impl TelemetryDefinition {
    /// Parse a single definition from its source text.
    pub fn parse(
        owner: User,
        scope: ShareScope,
        source: impl Into<String>,
    ) -> Result<Self, ConfigurationError> {
        let source = source.into();
        let ast = parse::parse_definition(&source)?;
        Self::new(owner, scope, source, ast)
    }

    /// Build a definition from an already parsed AST. The source text is the
    /// canonical form of the AST.
    pub fn from_ast(
        owner: User,
        scope: ShareScope,
        ast: DefinitionAst,
    ) -> Result<Self, ConfigurationError> {
        let source = ast.to_pretty_string();
        Self::new(owner, scope, source, ast)
    }

    pub(crate) fn new(
        owner: User,
        scope: ShareScope,
        source: String,
        ast: DefinitionAst,
    ) -> Result<Self, ConfigurationError> {
        ast.validate()?;
        Ok(Self {
            owner,
            scope,
            source,
            ast,
        })
    }

    pub fn name(&self) -> &ItemName {
        self.ast.name()
    }

    pub fn kind(&self) -> DefinitionKind {
        self.ast.kind()
    }

    pub fn owner(&self) -> &User {
        &self.owner
    }

    pub fn share_scope(&self) -> &ShareScope {
        &self.scope
    }

    /// Text the definition was created from.
    pub fn definition_string(&self) -> &str {
        &self.source
    }

    pub fn ast(&self) -> &DefinitionAst {
        &self.ast
    }

    pub fn as_streams(&self) -> Option<&Arc<StreamsDefinition>> {
        match &self.ast {
            DefinitionAst::Streams(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_chart(&self) -> Option<&Arc<ChartDefinition>> {
        match &self.ast {
            DefinitionAst::Chart(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_y_axis(&self) -> Option<&Arc<YAxisDefinition>> {
        match &self.ast {
            DefinitionAst::YAxis(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_report(&self) -> Option<&Arc<ReportDefinition>> {
        match &self.ast {
            DefinitionAst::Report(d) => Some(d),
            _ => None,
        }
    }
}
