use std::sync::Arc;

use log::trace;

use crate::{
    definition::{
        ChartDefinition, DefinitionKind, ReportDefinition, StreamsDefinition, TelemetryDefinition,
        YAxisDefinition,
    },
    domain::User,
    error::EvaluationError,
    manager::DefinitionManager,
};

/// Looks up definitions on behalf of one user, including the ones shared
/// with them.
#[derive(Debug, Clone, Copy)]
pub struct DefinitionResolver<'a> {
    manager: &'a DefinitionManager,
    user: &'a User,
}

impl<'a> DefinitionResolver<'a> {
    pub fn new(manager: &'a DefinitionManager, user: &'a User) -> Self {
        Self { manager, user }
    }

    pub fn user(&self) -> &'a User {
        self.user
    }

    pub fn manager(&self) -> &'a DefinitionManager {
        self.manager
    }

    fn resolve<T>(
        &self,
        kind: DefinitionKind,
        name: &str,
        extract: impl FnOnce(&TelemetryDefinition) -> Option<&Arc<T>>,
    ) -> Result<Arc<T>, EvaluationError> {
        trace!("Resolving {kind} definition `{name}` for `{}`", self.user);
        let not_found = || EvaluationError::DefinitionNotFound {
            kind,
            name: name.to_owned(),
        };
        let definition = self
            .manager
            .get(self.user, name, true, kind)
            .ok_or_else(not_found)?;
        extract(&*definition).cloned().ok_or_else(not_found)
    }

    pub fn resolve_streams_definition(
        &self,
        name: &str,
    ) -> Result<Arc<StreamsDefinition>, EvaluationError> {
        self.resolve(DefinitionKind::Streams, name, TelemetryDefinition::as_streams)
    }

    pub fn resolve_chart_definition(
        &self,
        name: &str,
    ) -> Result<Arc<ChartDefinition>, EvaluationError> {
        self.resolve(DefinitionKind::Chart, name, TelemetryDefinition::as_chart)
    }

    pub fn resolve_y_axis_definition(
        &self,
        name: &str,
    ) -> Result<Arc<YAxisDefinition>, EvaluationError> {
        self.resolve(DefinitionKind::YAxis, name, TelemetryDefinition::as_y_axis)
    }

    pub fn resolve_report_definition(
        &self,
        name: &str,
    ) -> Result<Arc<ReportDefinition>, EvaluationError> {
        self.resolve(DefinitionKind::Report, name, TelemetryDefinition::as_report)
    }
}
