//! Solver-agnostic SMT terms and the solver seam.

pub mod smtlib;
pub mod solver;
pub mod sorts;
pub mod terms;
#[cfg(feature = "z3")]
pub mod z3_backend;

pub use solver::{Model, ModelValue, SatResult, SmtSolver, SolverFactory};
pub use sorts::{DatatypeSort, SmtSort};
pub use terms::SmtTerm;
#[cfg(feature = "z3")]
pub use z3_backend::{Z3Error, Z3Solver};
