use std::collections::HashMap;

use crate::{
    error::EvaluationError,
    expr::{Constant, Variable},
};

/// Binding of formal variables to constants for one evaluation frame.
/// Each variable can be bound once.
#[derive(Debug, Default, Clone)]
pub struct VariableResolver {
    bindings: HashMap<Variable, Constant>,
}

impl VariableResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, variable: Variable, value: Constant) -> Result<(), EvaluationError> {
        use std::collections::hash_map::Entry;

        match self.bindings.entry(variable) {
            Entry::Occupied(e) => Err(EvaluationError::DuplicateVariable(e.key().to_string())),
            Entry::Vacant(e) => {
                e.insert(value);
                Ok(())
            }
        }
    }

    pub fn resolve(&self, variable: &Variable) -> Result<&Constant, EvaluationError> {
        self.bindings
            .get(variable)
            .ok_or_else(|| EvaluationError::UnboundVariable(variable.to_string()))
    }

    /// Values bound to the variables, in the given order.
    pub fn values_of<'a>(
        &'a self,
        variables: &'a [Variable],
    ) -> Result<Vec<&'a Constant>, EvaluationError> {
        variables.iter().map(|v| self.resolve(v)).collect()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}
