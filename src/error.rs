//! Error kinds surfaced at the boundary of the engine. Each is returned to the
//! caller of registration or evaluation; nothing is retried.

use thiserror::Error;

use crate::{definition::DefinitionKind, parse::ParseError};

/// Invalid definition set up: duplicate names, malformed definition text,
/// or scope misuse.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("Definition `{name}` already exists for owner `{owner}`")]
    DuplicateForOwner { name: String, owner: String },

    #[error("Definition name `{name}` is already used by the {kind} definition owned by `{owner}`")]
    NameTaken {
        name: String,
        kind: DefinitionKind,
        owner: String,
    },

    #[error("Malformed definition. {0}")]
    Parse(#[from] ParseError),

    #[error("Definition `{name}` declares variable `{variable}` more than once")]
    DuplicateDeclaration { name: String, variable: String },

    #[error("Definition `{name}` references undeclared variable `{variable}`")]
    UndeclaredVariable { name: String, variable: String },

    #[error("Share scope `{0}` is not shared with a project")]
    NotProjectScoped(String),

    #[error("Unknown share scope `{0}`")]
    UnknownShareScope(String),
}

/// Failure while resolving or evaluating definitions.
#[derive(Debug, Error)]
pub enum EvaluationError {
    #[error("Unable to find {kind} definition `{name}`")]
    DefinitionNotFound { kind: DefinitionKind, name: String },

    #[error("Streams definition `{0}` is not evaluable to a stream collection")]
    NotStreamCollection(String),

    #[error("`{name}` expects {expected} parameter(s), but {actual} were supplied")]
    ParameterCountMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },

    #[error("Y-axis `{name}` label does not resolve to a string")]
    LabelNotString { name: String },

    #[error("Y-axis `{name}` bound does not resolve to a number")]
    BoundNotNumber { name: String },

    #[error("Variable `{0}` is not bound")]
    UnboundVariable(String),

    #[error("Variable `{0}` is already bound")]
    DuplicateVariable(String),

    #[error("Reducer `{reducer}` only accepts string parameters, got {kind}")]
    ReducerParameterNotString { reducer: String, kind: &'static str },

    #[error("Unknown reducer `{0}`")]
    UnknownReducer(String),

    #[error(transparent)]
    Function(#[from] FunctionError),

    #[error(transparent)]
    Reducer(#[from] ReducerError),
}

/// Failure inside the function library.
#[derive(Debug, Error)]
pub enum FunctionError {
    #[error("Unknown function `{0}`")]
    Unknown(String),

    #[error("Function `{function}` is already registered")]
    AlreadyRegistered { function: String },

    #[error("Function `{function}` takes {expected} parameter(s), got {actual}")]
    Arity {
        function: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Function `{function}` parameter {index} must be {expected}, got {actual}")]
    ParameterType {
        function: &'static str,
        index: usize,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("Function `{function}` cannot combine streams of different {what}")]
    Mismatch {
        function: &'static str,
        what: &'static str,
    },

    #[error("Function `{function}`: stream tagged `{tag}` has no counterpart")]
    MissingTag { function: &'static str, tag: String },

    #[error("Function `{function}`: {message}")]
    InvalidArgument {
        function: &'static str,
        message: String,
    },
}

/// Failure reported by a reducer.
#[derive(Debug, Error)]
pub enum ReducerError {
    #[error("Reducer `{reducer}` takes at most {max} option(s), got {actual}")]
    TooManyOptions {
        reducer: String,
        max: usize,
        actual: usize,
    },

    #[error("Reducer `{reducer}` option {index} `{value}` is invalid: {reason}")]
    InvalidOption {
        reducer: String,
        index: usize,
        value: String,
        reason: String,
    },

    #[error("Reducer `{reducer}` could not fetch data. {message}")]
    DataService { reducer: String, message: String },
}
