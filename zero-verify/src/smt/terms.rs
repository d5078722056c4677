use std::sync::Arc;

use num::BigInt;

use crate::smt::sorts::{DatatypeSort, SmtSort};

/// Abstract SMT term representation, solver-agnostic.
#[derive(Debug, Clone, PartialEq)]
pub enum SmtTerm {
    /// Variable reference by name.
    Var(String),
    IntLit(BigInt),
    BoolLit(bool),
    StrLit(String),

    // Arithmetic (unbounded integers)
    Add(Box<SmtTerm>, Box<SmtTerm>),
    Sub(Box<SmtTerm>, Box<SmtTerm>),
    Mul(Box<SmtTerm>, Box<SmtTerm>),
    Div(Box<SmtTerm>, Box<SmtTerm>),
    Mod(Box<SmtTerm>, Box<SmtTerm>),
    Neg(Box<SmtTerm>),

    // Comparison
    Eq(Box<SmtTerm>, Box<SmtTerm>),
    Lt(Box<SmtTerm>, Box<SmtTerm>),
    Le(Box<SmtTerm>, Box<SmtTerm>),
    Gt(Box<SmtTerm>, Box<SmtTerm>),
    Ge(Box<SmtTerm>, Box<SmtTerm>),

    // Boolean logic
    And(Vec<SmtTerm>),
    Or(Vec<SmtTerm>),
    Not(Box<SmtTerm>),
    Implies(Box<SmtTerm>, Box<SmtTerm>),

    Ite(Box<SmtTerm>, Box<SmtTerm>, Box<SmtTerm>),

    // Arrays
    Select(Box<SmtTerm>, Box<SmtTerm>),
    Store(Box<SmtTerm>, Box<SmtTerm>, Box<SmtTerm>),
    /// Array with every index (of the given sort) mapped to the value.
    ConstArray(SmtSort, Box<SmtTerm>),

    // Records
    Construct(Arc<DatatypeSort>, Vec<SmtTerm>),
    Field(Arc<DatatypeSort>, usize, Box<SmtTerm>),

    ForAll(Vec<(String, SmtSort)>, Box<SmtTerm>),
}

#[allow(clippy::should_implement_trait)]
impl SmtTerm {
    pub fn var(name: impl Into<String>) -> Self {
        SmtTerm::Var(name.into())
    }

    pub fn int(n: impl Into<BigInt>) -> Self {
        SmtTerm::IntLit(n.into())
    }

    pub fn bool(b: bool) -> Self {
        SmtTerm::BoolLit(b)
    }

    pub fn string(s: impl Into<String>) -> Self {
        SmtTerm::StrLit(s.into())
    }

    pub fn add(self, other: SmtTerm) -> Self {
        SmtTerm::Add(Box::new(self), Box::new(other))
    }

    pub fn sub(self, other: SmtTerm) -> Self {
        SmtTerm::Sub(Box::new(self), Box::new(other))
    }

    pub fn mul(self, other: SmtTerm) -> Self {
        SmtTerm::Mul(Box::new(self), Box::new(other))
    }

    pub fn div(self, other: SmtTerm) -> Self {
        SmtTerm::Div(Box::new(self), Box::new(other))
    }

    pub fn modulo(self, other: SmtTerm) -> Self {
        SmtTerm::Mod(Box::new(self), Box::new(other))
    }

    pub fn neg(self) -> Self {
        SmtTerm::Neg(Box::new(self))
    }

    pub fn eq(self, other: SmtTerm) -> Self {
        SmtTerm::Eq(Box::new(self), Box::new(other))
    }

    pub fn lt(self, other: SmtTerm) -> Self {
        SmtTerm::Lt(Box::new(self), Box::new(other))
    }

    pub fn le(self, other: SmtTerm) -> Self {
        SmtTerm::Le(Box::new(self), Box::new(other))
    }

    pub fn gt(self, other: SmtTerm) -> Self {
        SmtTerm::Gt(Box::new(self), Box::new(other))
    }

    pub fn ge(self, other: SmtTerm) -> Self {
        SmtTerm::Ge(Box::new(self), Box::new(other))
    }

    /// Conjunction; `true` operands are dropped and a single operand is returned as is.
    pub fn and(terms: Vec<SmtTerm>) -> Self {
        let mut kept: Vec<SmtTerm> = Vec::with_capacity(terms.len());
        for t in terms {
            match t {
                SmtTerm::BoolLit(true) => {}
                SmtTerm::BoolLit(false) => return SmtTerm::BoolLit(false),
                SmtTerm::And(inner) => kept.extend(inner),
                other => kept.push(other),
            }
        }
        match kept.len() {
            0 => SmtTerm::BoolLit(true),
            1 => kept.remove(0),
            _ => SmtTerm::And(kept),
        }
    }

    /// Disjunction; `false` operands are dropped and a single operand is returned as is.
    pub fn or(terms: Vec<SmtTerm>) -> Self {
        let mut kept: Vec<SmtTerm> = Vec::with_capacity(terms.len());
        for t in terms {
            match t {
                SmtTerm::BoolLit(false) => {}
                SmtTerm::BoolLit(true) => return SmtTerm::BoolLit(true),
                SmtTerm::Or(inner) => kept.extend(inner),
                other => kept.push(other),
            }
        }
        match kept.len() {
            0 => SmtTerm::BoolLit(false),
            1 => kept.remove(0),
            _ => SmtTerm::Or(kept),
        }
    }

    pub fn not(self) -> Self {
        match self {
            SmtTerm::BoolLit(b) => SmtTerm::BoolLit(!b),
            SmtTerm::Not(inner) => *inner,
            other => SmtTerm::Not(Box::new(other)),
        }
    }

    pub fn implies(self, other: SmtTerm) -> Self {
        SmtTerm::Implies(Box::new(self), Box::new(other))
    }

    /// Boolean equivalence.
    pub fn iff(self, other: SmtTerm) -> Self {
        self.eq(other)
    }

    pub fn ite(cond: SmtTerm, then: SmtTerm, els: SmtTerm) -> Self {
        SmtTerm::Ite(Box::new(cond), Box::new(then), Box::new(els))
    }

    pub fn select(self, index: SmtTerm) -> Self {
        SmtTerm::Select(Box::new(self), Box::new(index))
    }

    pub fn store(self, index: SmtTerm, value: SmtTerm) -> Self {
        SmtTerm::Store(Box::new(self), Box::new(index), Box::new(value))
    }

    pub fn const_array(index: SmtSort, value: SmtTerm) -> Self {
        SmtTerm::ConstArray(index, Box::new(value))
    }

    pub fn field(self, dt: &Arc<DatatypeSort>, index: usize) -> Self {
        SmtTerm::Field(Arc::clone(dt), index, Box::new(self))
    }

    pub fn forall(bound: Vec<(String, SmtSort)>, body: SmtTerm) -> Self {
        SmtTerm::ForAll(bound, Box::new(body))
    }

    pub fn is_true(&self) -> bool {
        matches!(self, SmtTerm::BoolLit(true))
    }
}
