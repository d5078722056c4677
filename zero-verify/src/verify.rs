use rayon::prelude::*;
use tracing::{debug, info, warn};
use zero_ast::{Contract, Function, Program};

use crate::config::VerifyOptions;
use crate::context::VerificationContext;
use crate::discharge::discharge;
use crate::error::VerifyError;
use crate::eval::Evaluator;
use crate::paths::{Path, PathGenerator};
use crate::report::{FunctionOutcome, FunctionReport, ObligationResult, PathReport, VerificationReport};
use crate::smt::{SmtSolver, SolverFactory};
use crate::spec_compiler::CompiledSpec;

/// Verify every function with a body in `program`.
///
/// Only type-resolution failures abort the run. Configuration errors are
/// reported per function and unsupported constructs per path.
pub fn verify_program<F: SolverFactory>(
    program: &Program,
    options: &VerifyOptions,
    factory: &F,
) -> Result<VerificationReport, VerifyError> {
    let ctx = VerificationContext::new(program, *options)?;
    let mut report = VerificationReport::default();

    for contract in &program.contracts {
        info!(contract = %contract.name, functions = contract.functions.len(), "verifying contract");
        for id in &contract.functions {
            let Some(function) = ctx.index().function(*id) else {
                continue;
            };
            if function.body.is_none() {
                continue;
            }
            report.functions.push(verify_function(&ctx, contract, function, factory));
        }
    }

    let (proved, refuted, unknown) = report.tally();
    info!(proved, refuted, unknown, "verification finished");
    Ok(report)
}

fn verify_function<F: SolverFactory>(
    ctx: &VerificationContext<'_>,
    contract: &Contract,
    function: &Function,
    factory: &F,
) -> FunctionReport {
    let outcome = match check_function(ctx, function, factory) {
        Ok(outcome) => outcome,
        Err(err) => {
            warn!(contract = %contract.name, function = %function.name, error = %err, "function not verified");
            FunctionOutcome::ConfigurationError(err)
        }
    };
    FunctionReport {
        contract: contract.name.clone(),
        function: function.name.clone(),
        outcome,
    }
}

fn check_function<F: SolverFactory>(
    ctx: &VerificationContext<'_>,
    function: &Function,
    factory: &F,
) -> Result<FunctionOutcome, VerifyError> {
    if let Some(err) = ctx.spec_error(function.id) {
        return Err(err.clone());
    }
    let Some(spec) = ctx.spec(function.id) else {
        return Err(VerifyError::configuration(&function.name, function.span, "no compiled specification"));
    };
    let Some(body) = &spec.body else {
        return Err(VerifyError::configuration(&function.name, function.span, "function has no body"));
    };

    let set = PathGenerator::new(ctx.options(), &function.name).generate(body)?;
    info!(
        function = %function.name,
        candidates = set.candidates,
        discarded = set.discarded,
        paths = set.paths.len(),
        "verifying function"
    );
    let options = ctx.options();
    let paths: Vec<PathReport> = if options.parallel {
        set.paths
            .par_iter()
            .enumerate()
            .map_init(
                || factory.create(options.timeout_ms),
                |solver, (i, path)| verify_path(ctx, function, spec, i, path, solver),
            )
            .collect()
    } else {
        let mut solver = factory.create(options.timeout_ms);
        set.paths
            .iter()
            .enumerate()
            .map(|(i, path)| verify_path(ctx, function, spec, i, path, &mut solver))
            .collect()
    };

    Ok(FunctionOutcome::Checked {
        candidates: set.candidates,
        discarded: set.discarded,
        paths,
    })
}

fn verify_path<S: SmtSolver>(
    ctx: &VerificationContext<'_>,
    function: &Function,
    spec: &CompiledSpec,
    index: usize,
    path: &Path,
    solver: &mut S,
) -> PathReport {
    let obligations = match Evaluator::new(ctx, function, spec).run(spec.wrap(&path.stmts)) {
        Ok(obligations) => obligations,
        Err(err) => {
            warn!(function = %function.name, path = index, error = %err, "path skipped");
            return PathReport::Skipped {
                reason: format!("path skipped: {err}"),
            };
        }
    };
    debug!(function = %function.name, path = index, obligations = obligations.len(), "path evaluated");
    PathReport::Checked {
        obligations: obligations
            .iter()
            .map(|ob| ObligationResult {
                kind: ob.kind,
                description: ob.description.clone(),
                span: ob.span,
                verdict: discharge(solver, ob),
            })
            .collect(),
    }
}

/// [`verify_program`] with one Z3 instance per worker.
#[cfg(feature = "z3")]
pub fn verify_program_z3(program: &Program, options: &VerifyOptions) -> Result<VerificationReport, VerifyError> {
    verify_program(program, options, &crate::smt::Z3Solver::with_timeout_ms)
}
