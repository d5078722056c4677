//! The record threaded through the evaluation of one path.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use zero_ast::{Span, TypeName};

use crate::error::VerifyError;
use crate::smt::{SmtSort, SmtTerm};
use crate::typemap::SortMapper;

/// A solver term together with its program type and well-formedness constraint.
///
/// Immutable: every operation builds a new value.
#[derive(Clone, Debug, PartialEq)]
pub struct TypedValue {
    pub ty: TypeName,
    pub term: SmtTerm,
    pub constraint: SmtTerm,
}

impl TypedValue {
    pub fn new(ty: TypeName, term: SmtTerm, constraint: SmtTerm) -> Self {
        Self { ty, term, constraint }
    }

    /// A value with no constraint of its own (literals, defaults).
    pub fn exact(ty: TypeName, term: SmtTerm) -> Self {
        Self::new(ty, term, SmtTerm::bool(true))
    }

    /// The same term and constraint viewed at another declared type.
    pub fn retyped(self, ty: &TypeName) -> Self {
        Self { ty: ty.clone(), ..self }
    }
}

/// Result of evaluating an expression.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Single(TypedValue),
    Tuple(Vec<TypedValue>),
    /// Returned by calls to functions without returns.
    Unit,
}

impl Value {
    pub fn into_single(self, span: Span) -> Result<TypedValue, VerifyError> {
        match self {
            Value::Single(v) => Ok(v),
            Value::Tuple(_) => Err(VerifyError::unsupported("tuple used as a single value", span)),
            Value::Unit => Err(VerifyError::unsupported("value of a call without returns", span)),
        }
    }

    pub fn into_components(self) -> Vec<TypedValue> {
        match self {
            Value::Single(v) => vec![v],
            Value::Tuple(vs) => vs,
            Value::Unit => Vec::new(),
        }
    }
}

/// One way the path may revert on chain: `pc ∧ trigger` at the time it was recorded.
#[derive(Clone, Debug, PartialEq)]
pub struct RevertSource {
    pub term: SmtTerm,
    pub reason: String,
    pub span: Span,
}

/// Variable bindings captured once, right after the entry declarations.
#[derive(Debug)]
pub struct Checkpoint {
    variables: HashMap<String, TypedValue>,
}

#[derive(Clone, Debug, Default)]
pub struct State {
    variables: HashMap<String, TypedValue>,
    path_terms: Vec<SmtTerm>,
    path_constraints: Vec<SmtTerm>,
    reverts: Vec<RevertSource>,
    assumptions: Vec<SmtTerm>,
    symbols: Vec<(String, SmtSort)>,
    used_symbols: HashSet<String>,
    checkpoint: Option<Arc<Checkpoint>>,
    fresh: u64,
}

impl State {
    pub fn new() -> Self {
        Self::default()
    }

    /// A path-local name, disjoint from the compiler's `tmp_N` names.
    pub fn fresh_name(&mut self, base: &str) -> String {
        let n = self.fresh;
        self.fresh += 1;
        format!("{base}!{n}")
    }

    fn symbol_for(&mut self, base: &str) -> String {
        if !base.is_empty() && !self.used_symbols.contains(base) {
            return base.to_string();
        }
        loop {
            let candidate = self.fresh_name(if base.is_empty() { "v" } else { base });
            if !self.used_symbols.contains(&candidate) {
                return candidate;
            }
        }
    }

    /// A fresh solver symbol of type `ty`, assumed well-formed.
    pub fn fresh_value(&mut self, mapper: &SortMapper<'_>, base: &str, ty: &TypeName) -> Result<TypedValue, VerifyError> {
        let sort = mapper.sort_for(ty)?;
        let symbol = self.symbol_for(base);
        let term = SmtTerm::var(&symbol);
        let wf = mapper.well_formed(&term, ty)?;
        self.used_symbols.insert(symbol.clone());
        self.symbols.push((symbol, sort));
        self.assumptions.push(wf.clone());
        Ok(TypedValue::new(ty.clone(), term, wf))
    }

    /// Bind `name` to a fresh, well-formed value.
    pub fn declare(&mut self, mapper: &SortMapper<'_>, name: &str, ty: &TypeName) -> Result<TypedValue, VerifyError> {
        let v = self.fresh_value(mapper, name, ty)?;
        self.variables.insert(name.to_string(), v.clone());
        Ok(v)
    }

    /// Bind `name` to the zero value of its type.
    pub fn declare_default(&mut self, mapper: &SortMapper<'_>, name: &str, ty: &TypeName) -> Result<TypedValue, VerifyError> {
        let v = TypedValue::exact(ty.clone(), mapper.default_value(ty)?);
        self.variables.insert(name.to_string(), v.clone());
        Ok(v)
    }

    pub fn read(&self, name: &str) -> Option<&TypedValue> {
        self.variables.get(name)
    }

    pub fn write(&mut self, name: &str, value: TypedValue) {
        self.variables.insert(name.to_string(), value);
    }

    /// Conjoin a boolean value into the path condition.
    pub fn assume(&mut self, fact: &TypedValue) {
        self.path_terms.push(fact.term.clone());
        if !fact.constraint.is_true() {
            self.path_constraints.push(fact.constraint.clone());
        }
    }

    /// Evaluate under an extra guard. Returns the mark to hand to [`State::pop_condition`].
    pub fn push_condition(&mut self, guard: SmtTerm) -> usize {
        let mark = self.path_terms.len();
        self.path_terms.push(guard);
        mark
    }

    /// Drop the guard pushed at `mark`. Facts assumed under it stay, as `guard => facts`.
    pub fn pop_condition(&mut self, mark: usize) {
        if mark >= self.path_terms.len() {
            return;
        }
        let mut scoped: Vec<SmtTerm> = self.path_terms.drain(mark..).collect();
        let guard = scoped.remove(0);
        if !scoped.is_empty() {
            self.path_terms.push(guard.implies(SmtTerm::and(scoped)));
        }
    }

    /// Add a fact every value of the program satisfies (element well-formedness at reads).
    pub fn assume_well_formed(&mut self, fact: SmtTerm) {
        if !fact.is_true() {
            self.assumptions.push(fact);
        }
    }

    /// Record that the path reverts whenever `trigger` holds here.
    pub fn record_revert(&mut self, trigger: SmtTerm, reason: impl Into<String>, span: Span) {
        if matches!(trigger, SmtTerm::BoolLit(false)) {
            return;
        }
        let mut parts = self.path_terms.clone();
        parts.push(trigger);
        self.reverts.push(RevertSource {
            term: SmtTerm::and(parts),
            reason: reason.into(),
            span,
        });
    }

    pub fn path_condition(&self) -> SmtTerm {
        SmtTerm::and(self.path_terms.clone())
    }

    /// Constraints of the values conjoined into the path condition.
    pub fn path_constraints(&self) -> SmtTerm {
        SmtTerm::and(self.path_constraints.clone())
    }

    pub fn well_formed(&self) -> SmtTerm {
        SmtTerm::and(self.assumptions.clone())
    }

    pub fn revert_sources(&self) -> &[RevertSource] {
        &self.reverts
    }

    pub fn revert_condition(&self) -> SmtTerm {
        SmtTerm::or(self.reverts.iter().map(|r| r.term.clone()).collect())
    }

    pub fn symbols(&self) -> &[(String, SmtSort)] {
        &self.symbols
    }

    /// Capture the entry checkpoint. Later calls keep the first snapshot.
    pub fn capture_checkpoint(&mut self) {
        if self.checkpoint.is_none() {
            self.checkpoint = Some(Arc::new(Checkpoint {
                variables: self.variables.clone(),
            }));
        }
    }

    /// Swap the current bindings for the checkpoint's; returns the bindings to restore.
    pub fn enter_checkpoint(&mut self) -> Option<HashMap<String, TypedValue>> {
        let snapshot = self.checkpoint.as_ref()?.variables.clone();
        Some(std::mem::replace(&mut self.variables, snapshot))
    }

    pub fn leave_checkpoint(&mut self, saved: HashMap<String, TypedValue>) {
        self.variables = saved;
    }
}
