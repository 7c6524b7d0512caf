//! Reducers turn raw project metrics into stream collections.
//!
//! A reducer is called with the project, the interval, and the string options
//! written in the definition, e.g. `Commits("*", "true")`. Reducers own the
//! client of whatever data service backs them.

use std::{collections::HashMap, sync::Arc};

use log::debug;

use crate::{
    domain::Project,
    error::ReducerError,
    stream::{Interval, TelemetryStreamCollection},
};

pub trait Reducer: Send + Sync {
    fn name(&self) -> &str;

    fn compute(
        &self,
        project: &Project,
        interval: &Interval,
        options: &[String],
    ) -> Result<TelemetryStreamCollection, ReducerError>;
}

/// Reducers by name. Unlike functions, reducer names are case sensitive.
#[derive(Default)]
pub struct ReducerRegistry {
    reducers: HashMap<String, Arc<dyn Reducer>>,
}

impl ReducerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a reducer, returning the one it replaces.
    pub fn register(&mut self, reducer: Arc<dyn Reducer>) -> Option<Arc<dyn Reducer>> {
        debug!("Registering reducer `{}`", reducer.name());
        self.reducers.insert(reducer.name().to_owned(), reducer)
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Reducer>> {
        self.reducers.get(name)
    }

    pub fn len(&self) -> usize {
        self.reducers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reducers.is_empty()
    }
}

impl std::fmt::Debug for ReducerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.reducers.keys().collect();
        names.sort_unstable();
        f.debug_struct("ReducerRegistry")
            .field("reducers", &names)
            .finish()
    }
}

/// Positional options passed to a reducer. Missing options take the default
/// supplied by the reducer.
#[derive(Debug, Clone, Copy)]
pub struct ReducerOptions<'a> {
    reducer: &'a str,
    options: &'a [String],
}

impl<'a> ReducerOptions<'a> {
    /// Fails if more than `max` options were given.
    pub fn new(reducer: &'a str, options: &'a [String], max: usize) -> Result<Self, ReducerError> {
        if options.len() > max {
            return Err(ReducerError::TooManyOptions {
                reducer: reducer.to_owned(),
                max,
                actual: options.len(),
            });
        }
        Ok(Self { reducer, options })
    }

    pub fn len(&self) -> usize {
        self.options.len()
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&'a str> {
        self.options.get(index).map(String::as_str)
    }

    pub fn str_or(&self, index: usize, default: &'a str) -> &'a str {
        self.get(index).unwrap_or(default)
    }

    /// `true` or `false`, ignoring case.
    pub fn bool_or(&self, index: usize, default: bool) -> Result<bool, ReducerError> {
        let Some(value) = self.get(index) else {
            return Ok(default);
        };
        if value.eq_ignore_ascii_case("true") {
            Ok(true)
        } else if value.eq_ignore_ascii_case("false") {
            Ok(false)
        } else {
            Err(self.invalid(index, value, "expected `true` or `false`"))
        }
    }

    pub fn number_or(&self, index: usize, default: f64) -> Result<f64, ReducerError> {
        match self.get(index) {
            None => Ok(default),
            Some(value) => value
                .trim()
                .parse()
                .map_err(|e: std::num::ParseFloatError| self.invalid(index, value, e.to_string())),
        }
    }

    fn invalid(&self, index: usize, value: &str, reason: impl Into<String>) -> ReducerError {
        ReducerError::InvalidOption {
            reducer: self.reducer.to_owned(),
            index,
            value: value.to_owned(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function::tests::{interval, project};

    fn options(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn too_many_options() {
        let given = options(&["a", "b", "c"]);
        let err = ReducerOptions::new("Commits", &given, 2).unwrap_err();
        assert!(matches!(
            err,
            ReducerError::TooManyOptions {
                max: 2,
                actual: 3,
                ..
            }
        ));
        assert!(ReducerOptions::new("Commits", &given, 3).is_ok());
    }

    #[test]
    fn defaults_for_missing_options() {
        let given = options(&["alice"]);
        let opts = ReducerOptions::new("Commits", &given, 3).unwrap();
        assert_eq!(opts.str_or(0, "*"), "alice");
        assert_eq!(opts.str_or(1, "*"), "*");
        assert!(opts.bool_or(1, true).unwrap());
        assert_eq!(opts.number_or(2, 1.5).unwrap(), 1.5);
    }

    #[test]
    fn parse_options() {
        let given = options(&["TRUE", " 2.5 ", "yes", "many"]);
        let opts = ReducerOptions::new("Commits", &given, 4).unwrap();
        assert!(opts.bool_or(0, false).unwrap());
        assert_eq!(opts.number_or(1, 0.0).unwrap(), 2.5);

        let err = opts.bool_or(2, false).unwrap_err();
        assert!(matches!(err, ReducerError::InvalidOption { index: 2, value, .. } if value == "yes"));
        assert!(opts.number_or(3, 0.0).is_err());
    }

    struct Empty;

    impl Reducer for Empty {
        fn name(&self) -> &str {
            "Empty"
        }

        fn compute(
            &self,
            project: &Project,
            interval: &Interval,
            options: &[String],
        ) -> Result<TelemetryStreamCollection, ReducerError> {
            ReducerOptions::new(self.name(), options, 0)?;
            Ok(TelemetryStreamCollection::new(
                self.name(),
                project.clone(),
                *interval,
            ))
        }
    }

    #[test]
    fn registry_is_case_sensitive() {
        let mut registry = ReducerRegistry::new();
        assert!(registry.register(Arc::new(Empty)).is_none());
        assert!(registry.get("Empty").is_some());
        assert!(registry.get("empty").is_none());
        assert!(registry.register(Arc::new(Empty)).is_some());
        assert_eq!(registry.len(), 1);

        let reducer = registry.get("Empty").unwrap();
        let result = reducer.compute(&project(), &interval(3), &[]).unwrap();
        assert!(result.is_empty());
        assert!(reducer
            .compute(&project(), &interval(3), &options(&["x"]))
            .is_err());
    }
}
