//! Per-function, per-path, per-obligation results.

use std::fmt;

use zero_ast::Span;

use crate::discharge::ObligationKind;
use crate::error::VerifyError;
use crate::smt::Model;

#[derive(Clone, Debug, PartialEq)]
pub enum Verdict {
    /// Validity checks carry no witness; existence checks carry the satisfying model.
    Proved { witness: Option<Model> },
    /// Validity checks carry the counterexample; existence checks an empty model.
    Refuted { model: Model },
    /// Timeouts, solver `unknown` and backend failures.
    Unknown { reason: String },
}

impl Verdict {
    pub fn is_proved(&self) -> bool {
        matches!(self, Verdict::Proved { .. })
    }

    pub fn is_refuted(&self) -> bool {
        matches!(self, Verdict::Refuted { .. })
    }

    pub fn counterexample(&self) -> Option<&Model> {
        match self {
            Verdict::Refuted { model } => Some(model),
            _ => None,
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Proved { witness: Some(w) } if !w.is_empty() => write!(f, "PROVED (witness: {w})"),
            Verdict::Proved { .. } => write!(f, "PROVED"),
            Verdict::Refuted { model } if !model.is_empty() => write!(f, "REFUTED (counterexample: {model})"),
            Verdict::Refuted { .. } => write!(f, "REFUTED"),
            Verdict::Unknown { reason } => write!(f, "UNKNOWN ({reason})"),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ObligationResult {
    pub kind: ObligationKind,
    pub description: String,
    pub span: Span,
    pub verdict: Verdict,
}

#[derive(Clone, Debug, PartialEq)]
pub enum PathReport {
    Checked { obligations: Vec<ObligationResult> },
    Skipped { reason: String },
}

#[derive(Clone, Debug)]
pub enum FunctionOutcome {
    Checked {
        candidates: usize,
        discarded: usize,
        paths: Vec<PathReport>,
    },
    ConfigurationError(VerifyError),
}

#[derive(Clone, Debug)]
pub struct FunctionReport {
    pub contract: String,
    pub function: String,
    pub outcome: FunctionOutcome,
}

impl FunctionReport {
    /// Obligations of every checked path, in path order.
    pub fn obligations(&self) -> impl Iterator<Item = &ObligationResult> {
        let paths: &[PathReport] = match &self.outcome {
            FunctionOutcome::Checked { paths, .. } => paths,
            FunctionOutcome::ConfigurationError(_) => &[],
        };
        paths.iter().flat_map(|p| match p {
            PathReport::Checked { obligations } => obligations.as_slice(),
            PathReport::Skipped { .. } => &[],
        })
    }

    pub fn skipped(&self) -> impl Iterator<Item = &str> {
        let paths: &[PathReport] = match &self.outcome {
            FunctionOutcome::Checked { paths, .. } => paths,
            FunctionOutcome::ConfigurationError(_) => &[],
        };
        paths.iter().filter_map(|p| match p {
            PathReport::Skipped { reason } => Some(reason.as_str()),
            PathReport::Checked { .. } => None,
        })
    }

    pub fn all_proved(&self) -> bool {
        matches!(self.outcome, FunctionOutcome::Checked { .. })
            && self.skipped().next().is_none()
            && self.obligations().all(|o| o.verdict.is_proved())
    }
}

#[derive(Clone, Debug, Default)]
pub struct VerificationReport {
    pub functions: Vec<FunctionReport>,
}

impl VerificationReport {
    pub fn function(&self, contract: &str, function: &str) -> Option<&FunctionReport> {
        self.functions
            .iter()
            .find(|f| f.contract == contract && f.function == function)
    }

    pub fn all_proved(&self) -> bool {
        self.functions.iter().all(FunctionReport::all_proved)
    }

    /// (proved, refuted, unknown) over every obligation.
    pub fn tally(&self) -> (usize, usize, usize) {
        let mut counts = (0, 0, 0);
        for o in self.functions.iter().flat_map(FunctionReport::obligations) {
            match o.verdict {
                Verdict::Proved { .. } => counts.0 += 1,
                Verdict::Refuted { .. } => counts.1 += 1,
                Verdict::Unknown { .. } => counts.2 += 1,
            }
        }
        counts
    }
}

impl fmt::Display for VerificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for func in &self.functions {
            writeln!(f, "{}.{}", func.contract, func.function)?;
            match &func.outcome {
                FunctionOutcome::ConfigurationError(err) => writeln!(f, "  error: {err}")?,
                FunctionOutcome::Checked {
                    candidates,
                    discarded,
                    paths,
                } => {
                    writeln!(
                        f,
                        "  {} path(s) checked ({candidates} candidate(s), {discarded} discarded)",
                        paths.len()
                    )?;
                    for (i, path) in paths.iter().enumerate() {
                        match path {
                            PathReport::Skipped { reason } => writeln!(f, "  path {i}: {reason}")?,
                            PathReport::Checked { obligations } if obligations.is_empty() => {
                                writeln!(f, "  path {i}: nothing to check")?
                            }
                            PathReport::Checked { obligations } => {
                                writeln!(f, "  path {i}:")?;
                                for o in obligations {
                                    writeln!(f, "    [{}] {}: {}", o.kind, o.description, o.verdict)?;
                                }
                            }
                        }
                    }
                }
            }
        }
        let (proved, refuted, unknown) = self.tally();
        write!(f, "{proved} proved, {refuted} refuted, {unknown} unknown")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use num::BigInt;

    use crate::smt::ModelValue;

    fn result(kind: ObligationKind, verdict: Verdict) -> ObligationResult {
        ObligationResult {
            kind,
            description: "x >= 1".to_string(),
            span: zero_ast::span(0, 0),
            verdict,
        }
    }

    #[test]
    fn renders_paths_and_skips() {
        let model = Model {
            values: BTreeMap::from([("x".to_string(), ModelValue::Int(BigInt::from(0)))]),
        };
        let report = VerificationReport {
            functions: vec![FunctionReport {
                contract: "C".to_string(),
                function: "g".to_string(),
                outcome: FunctionOutcome::Checked {
                    candidates: 2,
                    discarded: 0,
                    paths: vec![
                        PathReport::Checked {
                            obligations: vec![result(ObligationKind::Assert, Verdict::Refuted { model })],
                        },
                        PathReport::Skipped {
                            reason: "path skipped: unsupported `<<`".to_string(),
                        },
                    ],
                },
            }],
        };

        let text = report.to_string();
        assert!(text.contains("C.g"));
        assert!(text.contains("[assert] x >= 1: REFUTED (counterexample: x = 0)"));
        assert!(text.contains("path 1: path skipped: unsupported `<<`"));
        assert!(text.ends_with("0 proved, 1 refuted, 0 unknown"));
        assert!(!report.all_proved());
    }

    #[test]
    fn skipped_paths_prevent_a_clean_bill() {
        let report = FunctionReport {
            contract: "C".to_string(),
            function: "f".to_string(),
            outcome: FunctionOutcome::Checked {
                candidates: 1,
                discarded: 0,
                paths: vec![PathReport::Skipped {
                    reason: "path skipped".to_string(),
                }],
            },
        };
        assert_eq!(report.obligations().count(), 0);
        assert!(!report.all_proved());
    }
}
