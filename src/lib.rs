//! Telemetry is an engine to define and evaluate software engineering metrics.
//! Users describe what they want to see in a small declarative language,
//! and the engine evaluates those descriptions against the time series data
//! of a project to produce charts and reports ready to be rendered.
//!
//! # Definitions
//! There are four kinds of definitions:
//! - streams
//! - yaxis
//! - chart
//! - report
//!
//! Every definition has a name, a list of variables it is parameterized
//! with, an owner, and a share scope. All definitions, regardless of their kind
//! and owner, share a single name space.
//!
//! ```text
//! streams Commits(member) = {"Commits", FilterZero(Commit(member))};
//! yaxis Count(label) = {label, "integer"};
//! chart Development(member) = {"Development", (Commits(member), Count("Commits"))};
//! report Overview(member) = {"Project overview", Development(member)};
//! ```
//!
//! ### Streams
//! A streams definition holds an expression that computes a collection of
//! time series. The data is provided by reducers, which are implemented by
//! the host application and fetch metrics of a project for an interval. Any
//! call to a name that is not a known function is a call to a reducer.
//! Reducers only accept string arguments.
//!
//! Collections can be combined with the arithmetic operators and the
//! functions of [function::FunctionRegistry]. A number combined with a
//! collection is applied to each of its data points.
//!
//! ### Y-Axis
//! Describes the axis streams are plotted against: the label, whether the
//! values are integral, and optionally the lower and upper bounds. An axis
//! without bounds is scaled to fit the data.
//!
//! ### Chart & Report
//! A chart pairs streams with axes, and a report lists charts. They pass
//! their own variables or literals down to the definitions they reference.
//!
//! ## Sharing
//! A definition is private to its owner, shared with the members of a project,
//! or shared with everyone. See [scope::ShareScope].
//!
//! # Evaluation
//! [manager::DefinitionManager] stores the definitions,
//! [resolver::DefinitionResolver] finds the ones visible to a user, and
//! [evaluator::Evaluator] turns them into [evaluator::result] objects for a
//! project and an interval. Definitions are immutable once registered, so
//! evaluation does not lock the manager beyond the lookups.

/// User, project, and name types shared by the whole engine.
pub mod domain;

/// Who can see a definition.
pub mod scope;

/// Source positions for diagnostics.
pub mod span;

/// Expressions written in definition bodies.
pub mod expr;

/// Values flowing through evaluation.
pub mod value;

/// Time series data.
pub mod stream;

/// The four definition kinds and the registered definition.
pub mod definition;

/// Parser of the definition language.
pub mod parse;

/// Storage of definitions of one kind.
pub mod repository;

/// Registry of all definitions, shared between requests.
pub mod manager;

/// Loading definition files from a directory.
pub mod loader;

/// Engine configuration.
pub mod config;

/// Lookup of definitions on behalf of a user.
pub mod resolver;

/// Variable bindings of one evaluation frame.
pub mod variables;

/// Evaluation of definitions into renderable objects.
pub mod evaluator;

/// Functions callable from streams expressions.
pub mod function;

/// Data providers implemented by the host.
pub mod reducer;

/// Errors of registration and evaluation.
pub mod error;

pub use config::EngineConfig;
pub use definition::{DefinitionKind, TelemetryDefinition};
pub use domain::{ItemName, Project, User};
pub use error::{ConfigurationError, EvaluationError, FunctionError, ReducerError};
pub use evaluator::Evaluator;
pub use manager::DefinitionManager;
pub use resolver::DefinitionResolver;
pub use scope::ShareScope;

#[cfg(test)]
pub fn init_log() {
    use log::*;

    static INIT: std::sync::Once = std::sync::Once::new();

    INIT.call_once(|| {
        let _ = flexi_logger::Logger::with(LevelFilter::Trace)
            .format(format)
            .start();
    });

    fn format(
        write: &mut dyn std::io::Write,
        _: &mut flexi_logger::DeferredNow,
        record: &Record,
    ) -> std::io::Result<()> {
        write.write_all(
            format!(
                "[{} {}:{}] {} - {}",
                record.level(),
                record.file().unwrap_or_default(),
                record.line().unwrap_or_default(),
                record.module_path().unwrap_or_default(),
                record.args()
            )
            .as_bytes(),
        )
    }
}
