use std::collections::BTreeMap;
use std::fmt;

use num::BigInt;

use crate::smt::sorts::SmtSort;
use crate::smt::terms::SmtTerm;

/// Result of a satisfiability check.
#[derive(Debug, Clone, PartialEq)]
pub enum SatResult {
    Sat,
    Unsat,
    /// Includes timeouts; carries the solver's reason.
    Unknown(String),
}

/// Assignments extracted from a SAT result.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Model {
    pub values: BTreeMap<String, ModelValue>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ModelValue {
    Int(BigInt),
    Bool(bool),
    Str(String),
    /// Arrays and records, rendered by the backend.
    Other(String),
}

impl Model {
    pub fn get_int(&self, name: &str) -> Option<&BigInt> {
        match self.values.get(name) {
            Some(ModelValue::Int(n)) => Some(n),
            _ => None,
        }
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        match self.values.get(name) {
            Some(ModelValue::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Display for ModelValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelValue::Int(n) => write!(f, "{n}"),
            ModelValue::Bool(b) => write!(f, "{b}"),
            ModelValue::Str(s) => write!(f, "{s:?}"),
            ModelValue::Other(s) => write!(f, "{s}"),
        }
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (name, value) in &self.values {
            if !first {
                write!(f, ", ")?;
            }
            first = false;
            write!(f, "{name} = {value}")?;
        }
        Ok(())
    }
}

/// Abstract SMT solver interface.
pub trait SmtSolver {
    type Error: std::error::Error;

    /// Declare a new variable.
    fn declare_var(&mut self, name: &str, sort: &SmtSort) -> Result<(), Self::Error>;

    /// Assert a constraint.
    fn assert(&mut self, term: &SmtTerm) -> Result<(), Self::Error>;

    fn check_sat(&mut self) -> Result<SatResult, Self::Error>;

    /// Check satisfiability and extract a model over the given variables if SAT.
    fn check_sat_with_model(
        &mut self,
        var_names: &[(&str, &SmtSort)],
    ) -> Result<(SatResult, Option<Model>), Self::Error>;

    /// Drop every declaration and assertion.
    fn reset(&mut self) -> Result<(), Self::Error>;
}

/// Creates solver instances, one per verification worker.
pub trait SolverFactory: Sync {
    type Solver: SmtSolver;

    fn create(&self, timeout_ms: u64) -> Self::Solver;
}

impl<F, S> SolverFactory for F
where
    F: Fn(u64) -> S + Sync,
    S: SmtSolver,
{
    type Solver = S;

    fn create(&self, timeout_ms: u64) -> S {
        self(timeout_ms)
    }
}
