#![forbid(unsafe_code)]

//! Bounded symbolic verification of contract functions.
//!
//! Each function's specification statements are compiled into a contract,
//! its body is split into straight-line paths, and every path is evaluated
//! symbolically into solver obligations.

pub mod config;
pub mod context;
pub mod discharge;
pub mod error;
pub mod eval;
pub mod paths;
pub mod report;
pub mod smt;
pub mod spec_compiler;
pub mod state;
pub mod typemap;
pub mod verify;
pub mod visitor;

pub use config::{LoopMode, SmtProfile, VerifyOptions};
pub use context::VerificationContext;
pub use discharge::{discharge, Check, Obligation, ObligationKind};
pub use error::VerifyError;
pub use eval::{EvalMode, Evaluator};
pub use paths::{Path, PathGenerator, PathSet};
pub use report::{FunctionOutcome, FunctionReport, ObligationResult, PathReport, Verdict, VerificationReport};
pub use spec_compiler::{CompiledSpec, NameGen};
pub use verify::verify_program;
#[cfg(feature = "z3")]
pub use verify::verify_program_z3;
