//! Verification obligations and the protocol that turns them into verdicts.

use std::fmt;

use tracing::{debug, trace};
use zero_ast::Span;

use crate::error::VerifyError;
use crate::report::Verdict;
use crate::smt::{smtlib, Model, SatResult, SmtSolver, SmtSort, SmtTerm};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ObligationKind {
    /// `assert(P)`: P holds on every execution of the path.
    Assert,
    /// `ok(P)`: some non-reverting execution satisfies P.
    Ok,
    /// `err(P)`: some reverting execution satisfies P.
    Err,
    /// A recorded revert source can never fire.
    NoRevert,
    /// The path reverts exactly when a `reverts_if` condition holds.
    RevertsIf,
}

impl fmt::Display for ObligationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ObligationKind::Assert => "assert",
            ObligationKind::Ok => "ok",
            ObligationKind::Err => "err",
            ObligationKind::NoRevert => "no-revert",
            ObligationKind::RevertsIf => "reverts-if",
        };
        f.write_str(s)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Check {
    /// `hypothesis ⇒ goal` for every assignment; the query is its negation.
    Validity,
    /// `hypothesis ∧ goal` for some assignment.
    Satisfiability,
}

/// A solver query produced by the evaluator. Pure data; discharging it is
/// independent of the state that produced it.
#[derive(Clone, Debug, PartialEq)]
pub struct Obligation {
    pub kind: ObligationKind,
    pub check: Check,
    pub description: String,
    pub span: Span,
    pub hypothesis: SmtTerm,
    pub goal: SmtTerm,
    /// Every symbol the terms may mention, in declaration order.
    pub symbols: Vec<(String, SmtSort)>,
}

impl Obligation {
    /// The term handed to the solver.
    pub fn query(&self) -> SmtTerm {
        match self.check {
            Check::Validity => SmtTerm::and(vec![self.hypothesis.clone(), self.goal.clone().not()]),
            Check::Satisfiability => SmtTerm::and(vec![self.hypothesis.clone(), self.goal.clone()]),
        }
    }
}

/// Run one obligation through `solver`.
///
/// The solver is reset first, so one instance can serve a whole worker.
/// Backend failures are reported as `Unknown`, never as a proof.
pub fn discharge<S: SmtSolver>(solver: &mut S, obligation: &Obligation) -> Verdict {
    let query = obligation.query();
    trace!(
        kind = %obligation.kind,
        query = %smtlib::script(&obligation.symbols, &query),
        "discharging obligation"
    );
    let verdict = match check(solver, obligation, &query) {
        Ok(verdict) => verdict,
        Err(err) => {
            let err = VerifyError::Solver {
                message: err.to_string(),
            };
            Verdict::Unknown {
                reason: err.to_string(),
            }
        }
    };
    debug!(kind = %obligation.kind, description = %obligation.description, %verdict, "obligation discharged");
    verdict
}

fn check<S: SmtSolver>(solver: &mut S, obligation: &Obligation, query: &SmtTerm) -> Result<Verdict, S::Error> {
    solver.reset()?;
    for (name, sort) in &obligation.symbols {
        solver.declare_var(name, sort)?;
    }
    solver.assert(query)?;
    let names: Vec<(&str, &SmtSort)> = obligation
        .symbols
        .iter()
        .map(|(name, sort)| (name.as_str(), sort))
        .collect();
    let (result, model) = solver.check_sat_with_model(&names)?;

    Ok(match (obligation.check, result) {
        (_, SatResult::Unknown(reason)) => Verdict::Unknown { reason },
        (Check::Validity, SatResult::Unsat) => Verdict::Proved { witness: None },
        (Check::Validity, SatResult::Sat) => Verdict::Refuted {
            model: model.unwrap_or_default(),
        },
        (Check::Satisfiability, SatResult::Sat) => Verdict::Proved { witness: model },
        (Check::Satisfiability, SatResult::Unsat) => Verdict::Refuted {
            model: Model::default(),
        },
    })
}
