//! Symbolic evaluation of one forwarded path.
//!
//! The evaluator walks the straight-line statements of a path over a fresh
//! [`State`], turning program values into solver terms. It never talks to the
//! solver: every `assert`/`ok`/`err` and every recorded revert source becomes an
//! [`Obligation`] that the driver discharges afterwards.

use std::sync::Arc;

use num::{BigInt, Signed, ToPrimitive};
use tracing::trace;
use zero_ast::{
    BinaryOp, ElementaryType, Expr, ExprKind, Function, Literal, ReturnStmt, Span, Stmt, TypeArena,
    TypeName, UnaryOp, UserType, VarDecl, VarDeclStmt,
};

use crate::context::VerificationContext;
use crate::discharge::{Check, Obligation, ObligationKind};
use crate::error::VerifyError;
use crate::smt::{DatatypeSort, SmtTerm};
use crate::spec_compiler::{is_snapshot_call, is_specification_call, CompiledSpec, OwnPath};
use crate::state::{State, TypedValue, Value};
use crate::typemap::{range, range_predicate};

/// What kind of code is being evaluated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EvalMode {
    /// Program code: derived values carry their range and reverts are tracked.
    Runtime,
    /// Specification code: unbounded arithmetic, nothing reverts.
    Spec,
}

pub struct Evaluator<'c, 'p> {
    ctx: &'c VerificationContext<'p>,
    function: &'p Function,
    spec: &'c CompiledSpec,
    state: State,
    mode: EvalMode,
    obligations: Vec<Obligation>,
}

fn literal_type(n: &BigInt) -> TypeName {
    if n.is_negative() {
        TypeName::Elementary(ElementaryType::Int(256))
    } else {
        TypeName::uint(256)
    }
}

fn literal(lit: &Literal) -> TypedValue {
    match lit {
        Literal::Number(n) => TypedValue::exact(literal_type(n), SmtTerm::int(n.clone())),
        Literal::Bool(b) => TypedValue::exact(TypeName::bool(), SmtTerm::bool(*b)),
        Literal::String(s) => TypedValue::exact(
            TypeName::Elementary(ElementaryType::String),
            SmtTerm::string(s.clone()),
        ),
    }
}

/// `guard => constraint`, or `true` when there is nothing to guard.
fn guarded(guard: SmtTerm, constraint: SmtTerm) -> SmtTerm {
    if constraint.is_true() {
        constraint
    } else {
        guard.implies(constraint)
    }
}

/// Every value of `source` is a value of `target` without wrapping.
fn fits(target: &TypeName, source: &TypeName) -> bool {
    if matches!(source, TypeName::UserDefined(UserType::Contract(_))) {
        return true;
    }
    match (range(target), range(source)) {
        (Some((tlo, thi)), Some((slo, shi))) => tlo <= slo && shi <= thi,
        _ => false,
    }
}

fn is_signed(ty: &TypeName) -> bool {
    matches!(ty, TypeName::Elementary(ElementaryType::Int(_)))
}

fn abs(t: SmtTerm) -> SmtTerm {
    SmtTerm::ite(t.clone().ge(SmtTerm::int(0)), t.clone(), t.neg())
}

/// Quotient rounded toward zero. Solver `div` rounds so that the remainder is
/// non-negative, which differs once an operand is negative.
fn truncating_div(l: SmtTerm, r: SmtTerm) -> SmtTerm {
    let same_sign = l.clone().ge(SmtTerm::int(0)).iff(r.clone().ge(SmtTerm::int(0)));
    let q = abs(l).div(abs(r));
    SmtTerm::ite(same_sign, q.clone(), q.neg())
}

/// Remainder with the sign of the dividend.
fn truncating_rem(l: SmtTerm, r: SmtTerm) -> SmtTerm {
    let m = abs(l.clone()).modulo(abs(r));
    SmtTerm::ite(l.ge(SmtTerm::int(0)), m.clone(), m.neg())
}

/// `term` only projects out of declared symbols. Element well-formedness may be
/// assumed on such reads; a `store` may hold an unchecked value.
fn unwritten(term: &SmtTerm) -> bool {
    match term {
        SmtTerm::Var(_) => true,
        SmtTerm::Select(base, _) | SmtTerm::Field(_, _, base) => unwritten(base),
        _ => false,
    }
}

impl<'c, 'p> Evaluator<'c, 'p> {
    pub fn new(ctx: &'c VerificationContext<'p>, function: &'p Function, spec: &'c CompiledSpec) -> Self {
        Self {
            ctx,
            function,
            spec,
            state: State::new(),
            mode: EvalMode::Runtime,
            obligations: Vec::new(),
        }
    }

    /// Evaluate prologue, body and epilogue of one path and return its obligations.
    pub fn run(mut self, path: OwnPath<'_>) -> Result<Vec<Obligation>, VerifyError> {
        self.enter()?;
        self.exec_in(path.prologue, EvalMode::Spec)?;
        self.exec_in(path.body, EvalMode::Runtime)?;
        self.exec_in(path.epilogue, EvalMode::Spec)?;
        self.check_reverts();
        Ok(self.obligations)
    }

    /// Bind the environment, the contract's state, the parameters and the
    /// named returns, then capture the entry checkpoint.
    fn enter(&mut self) -> Result<(), VerifyError> {
        let ctx = self.ctx;
        let mapper = ctx.mapper();
        self.state
            .declare(mapper, "msg", &TypeName::UserDefined(UserType::Struct(TypeArena::MSG)))?;
        self.state
            .declare(mapper, "block", &TypeName::UserDefined(UserType::Struct(TypeArena::BLOCK)))?;
        self.state.declare(mapper, "this", &TypeName::address())?;
        for v in ctx.index().state_vars(self.function.contract) {
            self.state
                .declare(mapper, &v.name, &v.ty)
                .map_err(|e| e.at_declaration(&v.name, v.span))?;
        }
        let spec = self.spec;
        for p in spec.params.iter().filter(|p| !p.name.is_empty()) {
            self.state
                .declare(mapper, &p.name, &p.ty)
                .map_err(|e| e.at_declaration(&p.name, p.span))?;
        }
        for r in &spec.returns {
            self.state
                .declare_default(mapper, &r.name, &r.ty)
                .map_err(|e| e.at_declaration(&r.name, r.span))?;
        }
        self.state.capture_checkpoint();
        Ok(())
    }

    fn exec_in(&mut self, stmts: &[Stmt], mode: EvalMode) -> Result<(), VerifyError> {
        let outer = std::mem::replace(&mut self.mode, mode);
        let result = stmts.iter().try_for_each(|s| self.exec(s));
        self.mode = outer;
        result
    }

    fn exec(&mut self, stmt: &Stmt) -> Result<(), VerifyError> {
        match stmt {
            Stmt::Block(b) => b.stmts.iter().try_for_each(|s| self.exec(s)),
            Stmt::Expr(s) => self.eval(&s.expr).map(|_| ()),
            Stmt::VarDecl(s) => self.exec_var_decl(s),
            Stmt::Return(s) => self.exec_return(s),
            Stmt::Emit(_) => Ok(()),
            Stmt::Guard(cond) => {
                let fact = self.eval_single(cond)?;
                self.state.assume(&fact);
                Ok(())
            }
            Stmt::If(s) => Err(VerifyError::unsupported("branch left in a path", s.span)),
            Stmt::For(s) => Err(VerifyError::unsupported("loop left in a path", s.span)),
            Stmt::While(s) => Err(VerifyError::unsupported("loop left in a path", s.span)),
        }
    }

    fn exec_var_decl(&mut self, s: &VarDeclStmt) -> Result<(), VerifyError> {
        let ctx = self.ctx;
        let Some(init) = &s.init else {
            for d in s.decls.iter().filter(|d| !d.name.is_empty()) {
                self.state.declare_default(ctx.mapper(), &d.name, &d.ty)?;
            }
            return Ok(());
        };

        if let ([d], ExprKind::Havoc(_)) = (s.decls.as_slice(), &init.kind) {
            self.state.declare(ctx.mapper(), &d.name, &d.ty)?;
            return Ok(());
        }

        let value = self.eval(init)?;
        if let [d] = s.decls.as_slice() {
            let v = value.into_single(init.span)?;
            self.state.write(&d.name, v.retyped(&d.ty));
            return Ok(());
        }
        let parts = value.into_components();
        if parts.len() != s.decls.len() {
            return Err(VerifyError::unsupported(
                format!("declaration of {} names from {} values", s.decls.len(), parts.len()),
                s.span,
            ));
        }
        for (d, v) in s.decls.iter().zip(parts) {
            if !d.name.is_empty() {
                self.state.write(&d.name, v.retyped(&d.ty));
            }
        }
        Ok(())
    }

    fn exec_return(&mut self, s: &ReturnStmt) -> Result<(), VerifyError> {
        let Some(expr) = &s.expr else {
            return Ok(());
        };
        let parts = self.eval(expr)?.into_components();
        let returns = &self.spec.returns;
        if parts.len() != returns.len() {
            return Err(VerifyError::unsupported(
                format!("return of {} values from a function with {} returns", parts.len(), returns.len()),
                s.span,
            ));
        }
        for (r, v) in returns.iter().zip(parts) {
            self.state.write(&r.name, v.retyped(&r.ty));
        }
        Ok(())
    }

    fn eval_single(&mut self, expr: &Expr) -> Result<TypedValue, VerifyError> {
        self.eval(expr)?.into_single(expr.span)
    }

    /// Evaluate `expr` as if `guard` held: reverts and assumptions it records are conditional on it.
    fn eval_guarded(&mut self, guard: SmtTerm, expr: &Expr) -> Result<TypedValue, VerifyError> {
        let mark = self.state.push_condition(guard);
        let result = self.eval_single(expr);
        self.state.pop_condition(mark);
        result
    }

    fn eval(&mut self, expr: &Expr) -> Result<Value, VerifyError> {
        let span = expr.span;
        match &expr.kind {
            ExprKind::Literal(lit) => Ok(Value::Single(literal(lit))),
            ExprKind::Identifier { name, .. } => self.read_identifier(name, span).map(Value::Single),
            ExprKind::Binary { op, lhs, rhs } => self.eval_binary(*op, lhs, rhs, span).map(Value::Single),
            ExprKind::Unary { op, prefix, operand } => self.eval_unary(*op, *prefix, operand, span),
            ExprKind::Assignment { op, lhs, rhs } => {
                let value = match op.0 {
                    None => self.eval(rhs)?,
                    Some(bop) => {
                        let current = self.eval_single(lhs)?;
                        let operand = self.eval_single(rhs)?;
                        Value::Single(self.compound(bop, current, operand, span)?)
                    }
                };
                self.eval_store(lhs, value, span)
            }
            ExprKind::Tuple(items) => match items.as_slice() {
                [] => Ok(Value::Unit),
                [single] => self.eval(single),
                _ => {
                    let mut parts = Vec::with_capacity(items.len());
                    for item in items {
                        parts.push(self.eval_single(item)?);
                    }
                    Ok(Value::Tuple(parts))
                }
            },
            ExprKind::Call { callee, args } => self.eval_call(callee, args, span),
            ExprKind::TypeConversion { ty, arg } => self.eval_conversion(ty, arg, span).map(Value::Single),
            ExprKind::IndexAccess { base, index } => self.read_index(base, index, span).map(Value::Single),
            ExprKind::MemberAccess { base, member, .. } => self.read_member(base, member, span).map(Value::Single),
            ExprKind::Conditional {
                cond,
                then_expr,
                else_expr,
            } => {
                let c = self.eval_single(cond)?;
                let t = self.eval_guarded(c.term.clone(), then_expr)?;
                let e = self.eval_guarded(c.term.clone().not(), else_expr)?;
                let ty = if then_expr.as_number().is_some() { e.ty.clone() } else { t.ty.clone() };
                let branch_constraint = if t.constraint.is_true() && e.constraint.is_true() {
                    SmtTerm::bool(true)
                } else {
                    SmtTerm::ite(c.term.clone(), t.constraint, e.constraint)
                };
                Ok(Value::Single(TypedValue::new(
                    ty,
                    SmtTerm::ite(c.term, t.term, e.term),
                    SmtTerm::and(vec![c.constraint, branch_constraint]),
                )))
            }
            ExprKind::Havoc(ty) => {
                let ctx = self.ctx;
                self.state.fresh_value(ctx.mapper(), "havoc", ty).map(Value::Single)
            }
            ExprKind::Unit => Ok(Value::Unit),
        }
    }

    fn read_identifier(&self, name: &str, span: Span) -> Result<TypedValue, VerifyError> {
        self.state
            .read(name)
            .cloned()
            .ok_or_else(|| VerifyError::unsupported(format!("identifier `{name}`"), span))
    }

    fn eval_binary(&mut self, op: BinaryOp, lhs: &Expr, rhs: &Expr, span: Span) -> Result<TypedValue, VerifyError> {
        match op {
            BinaryOp::BitAnd | BinaryOp::BitOr | BinaryOp::BitXor | BinaryOp::Shl | BinaryOp::Shr => {
                Err(VerifyError::unsupported(format!("`{}`", op.as_str()), span))
            }
            BinaryOp::And | BinaryOp::Or | BinaryOp::Implies => {
                let l = self.eval_single(lhs)?;
                // the right operand only runs when the left one does not decide
                let guard = if op == BinaryOp::Or {
                    l.term.clone().not()
                } else {
                    l.term.clone()
                };
                let r = self.eval_guarded(guard.clone(), rhs)?;
                let term = match op {
                    BinaryOp::And => SmtTerm::and(vec![l.term, r.term]),
                    BinaryOp::Or => SmtTerm::or(vec![l.term, r.term]),
                    _ => l.term.implies(r.term),
                };
                let constraint = SmtTerm::and(vec![l.constraint, guarded(guard, r.constraint)]);
                Ok(TypedValue::new(TypeName::bool(), term, constraint))
            }
            BinaryOp::Pow => self.eval_power(lhs, rhs, span),
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => {
                let l = self.eval_single(lhs)?;
                let r = self.eval_single(rhs)?;
                Ok(self.arithmetic(op, l, r, lhs.as_number().is_some(), span))
            }
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge | BinaryOp::Eq | BinaryOp::Ne => {
                let l = self.eval_single(lhs)?;
                let r = self.eval_single(rhs)?;
                let constraint = SmtTerm::and(vec![l.constraint, r.constraint]);
                let term = match op {
                    BinaryOp::Lt => l.term.lt(r.term),
                    BinaryOp::Le => l.term.le(r.term),
                    BinaryOp::Gt => l.term.gt(r.term),
                    BinaryOp::Ge => l.term.ge(r.term),
                    BinaryOp::Eq => l.term.eq(r.term),
                    _ => l.term.eq(r.term).not(),
                };
                Ok(TypedValue::new(TypeName::bool(), term, constraint))
            }
        }
    }

    /// `+ - * / %`. A literal left operand takes its type from the right one.
    fn arithmetic(&mut self, op: BinaryOp, l: TypedValue, r: TypedValue, lhs_literal: bool, span: Span) -> TypedValue {
        let ty = if lhs_literal { r.ty.clone() } else { l.ty.clone() };
        let mut parts = vec![l.constraint, r.constraint];
        if matches!(op, BinaryOp::Div | BinaryOp::Mod) && self.mode == EvalMode::Runtime {
            let by_zero = r.term.clone().eq(SmtTerm::int(0));
            self.state
                .record_revert(by_zero.clone(), format!("division by zero in `{}`", op.as_str()), span);
            parts.push(by_zero.not());
        }
        let signed = is_signed(&l.ty) || is_signed(&r.ty);
        let term = match op {
            BinaryOp::Add => l.term.add(r.term),
            BinaryOp::Sub => l.term.sub(r.term),
            BinaryOp::Mul => l.term.mul(r.term),
            BinaryOp::Div if signed => truncating_div(l.term, r.term),
            BinaryOp::Div => l.term.div(r.term),
            _ if signed => truncating_rem(l.term, r.term),
            _ => l.term.modulo(r.term),
        };
        self.bounded(ty, term, parts, op.as_str(), span)
    }

    /// Attach the range of `ty` to a derived value; in runtime code the
    /// complement is a revert source.
    fn bounded(&mut self, ty: TypeName, term: SmtTerm, mut parts: Vec<SmtTerm>, what: &str, span: Span) -> TypedValue {
        if self.mode == EvalMode::Runtime {
            let in_range = range_predicate(&term, &ty);
            if !in_range.is_true() {
                self.state
                    .record_revert(in_range.clone().not(), format!("overflow in `{what}` ({ty})"), span);
                parts.push(in_range);
            }
        }
        TypedValue::new(ty, term, SmtTerm::and(parts))
    }

    fn compound(&mut self, op: BinaryOp, current: TypedValue, operand: TypedValue, span: Span) -> Result<TypedValue, VerifyError> {
        match op {
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => {
                Ok(self.arithmetic(op, current, operand, false, span))
            }
            other => Err(VerifyError::unsupported(format!("`{}=`", other.as_str()), span)),
        }
    }

    fn eval_power(&mut self, lhs: &Expr, rhs: &Expr, span: Span) -> Result<TypedValue, VerifyError> {
        let Some(exponent) = rhs.as_number().and_then(ToPrimitive::to_u32) else {
            return Err(VerifyError::unsupported("`**` with a non-literal exponent", span));
        };
        if let Some(n) = lhs.as_number() {
            let folded = n.pow(exponent);
            return Ok(TypedValue::exact(literal_type(&folded), SmtTerm::int(folded)));
        }
        let base = self.eval_single(lhs)?;
        let term = (1..exponent).fold(
            if exponent == 0 { SmtTerm::int(1) } else { base.term.clone() },
            |acc, _| acc.mul(base.term.clone()),
        );
        Ok(self.bounded(base.ty, term, vec![base.constraint], "**", span))
    }

    fn eval_unary(&mut self, op: UnaryOp, prefix: bool, operand: &Expr, span: Span) -> Result<Value, VerifyError> {
        match op {
            UnaryOp::BitNot => Err(VerifyError::unsupported("`~`", span)),
            UnaryOp::Not => {
                let v = self.eval_single(operand)?;
                Ok(Value::Single(TypedValue::new(TypeName::bool(), v.term.not(), v.constraint)))
            }
            UnaryOp::Neg => {
                if let Some(n) = operand.as_number() {
                    let negated = -n.clone();
                    return Ok(Value::Single(TypedValue::exact(literal_type(&negated), SmtTerm::int(negated))));
                }
                let v = self.eval_single(operand)?;
                Ok(Value::Single(self.bounded(v.ty, v.term.neg(), vec![v.constraint], "-", span)))
            }
            UnaryOp::Inc | UnaryOp::Dec => {
                let old = self.eval_single(operand)?;
                let one = TypedValue::exact(old.ty.clone(), SmtTerm::int(1));
                let bop = if op == UnaryOp::Inc { BinaryOp::Add } else { BinaryOp::Sub };
                let new = self.arithmetic(bop, old.clone(), one, false, span);
                let stored = self.assign(operand, new)?;
                Ok(Value::Single(if prefix { stored } else { old }))
            }
            UnaryOp::Delete => {
                let current = self.eval_single(operand)?;
                let zero = self.ctx.mapper().default_value(&current.ty)?;
                self.assign(operand, TypedValue::exact(current.ty, zero))?;
                Ok(Value::Unit)
            }
        }
    }

    fn eval_store(&mut self, target: &Expr, value: Value, span: Span) -> Result<Value, VerifyError> {
        if let ExprKind::Tuple(targets) = &target.kind {
            let parts = value.into_components();
            if parts.len() != targets.len() {
                return Err(VerifyError::unsupported(
                    format!("assignment of {} values to {} targets", parts.len(), targets.len()),
                    span,
                ));
            }
            let mut stored = Vec::with_capacity(parts.len());
            for (t, v) in targets.iter().zip(parts) {
                if matches!(t.kind, ExprKind::Unit) {
                    stored.push(v);
                } else {
                    stored.push(self.assign(t, v)?);
                }
            }
            return Ok(Value::Tuple(stored));
        }
        let v = value.into_single(span)?;
        self.assign(target, v).map(Value::Single)
    }

    /// Write `value` through an lvalue, rebuilding every enclosing aggregate.
    /// Returns the value as stored (at the target's type).
    fn assign(&mut self, target: &Expr, value: TypedValue) -> Result<TypedValue, VerifyError> {
        let span = target.span;
        match &target.kind {
            ExprKind::Identifier { name, .. } => {
                let Some(current) = self.state.read(name) else {
                    return Err(VerifyError::unsupported(format!("assignment to undeclared `{name}`"), span));
                };
                let stored = value.retyped(&current.ty.clone());
                self.state.write(name, stored.clone());
                Ok(stored)
            }
            ExprKind::MemberAccess { base, member, .. } => {
                let b = self.eval_single(base)?;
                let (dt, idx, field_ty) = self.struct_field(&b.ty, member, span)?;
                let stored = value.retyped(&field_ty);
                let fields = (0..dt.fields.len())
                    .map(|k| {
                        if k == idx {
                            stored.term.clone()
                        } else {
                            b.term.clone().field(&dt, k)
                        }
                    })
                    .collect();
                let updated = TypedValue::new(
                    b.ty.clone(),
                    SmtTerm::Construct(Arc::clone(&dt), fields),
                    SmtTerm::and(vec![b.constraint, stored.constraint.clone()]),
                );
                self.assign(base, updated)?;
                Ok(stored)
            }
            ExprKind::IndexAccess { base, index } => {
                let b = self.eval_single(base)?;
                let i = self.eval_single(index)?;
                let (updated, stored) = match &b.ty {
                    TypeName::Mapping(_, value_ty) => {
                        let stored = value.retyped(value_ty);
                        let updated = TypedValue::new(
                            b.ty.clone(),
                            b.term.clone().store(i.term, stored.term.clone()),
                            SmtTerm::and(vec![b.constraint.clone(), i.constraint, stored.constraint.clone()]),
                        );
                        (updated, stored)
                    }
                    TypeName::Array(elem_ty, _) => {
                        let dt = self.record_sort(&b.ty, span)?;
                        let in_bounds = self.check_bounds(&b.term, &i.term, &dt, span);
                        let stored = value.retyped(elem_ty);
                        let data = b.term.clone().field(&dt, 0).store(i.term, stored.term.clone());
                        let length = b.term.clone().field(&dt, 1);
                        let updated = TypedValue::new(
                            b.ty.clone(),
                            SmtTerm::Construct(Arc::clone(&dt), vec![data, length]),
                            SmtTerm::and(vec![b.constraint.clone(), i.constraint, in_bounds, stored.constraint.clone()]),
                        );
                        (updated, stored)
                    }
                    other => {
                        return Err(VerifyError::unsupported(format!("index assignment into {other}"), span));
                    }
                };
                self.assign(base, updated)?;
                Ok(stored)
            }
            _ => Err(VerifyError::unsupported(format!("assignment to `{target}`"), span)),
        }
    }

    fn record_sort(&self, ty: &TypeName, span: Span) -> Result<Arc<DatatypeSort>, VerifyError> {
        let sort = self.ctx.mapper().sort_for(ty)?;
        sort.as_datatype()
            .cloned()
            .ok_or_else(|| VerifyError::unsupported(format!("member access on {ty}"), span))
    }

    fn struct_field(&self, ty: &TypeName, member: &str, span: Span) -> Result<(Arc<DatatypeSort>, usize, TypeName), VerifyError> {
        let TypeName::UserDefined(UserType::Struct(id)) = ty else {
            return Err(VerifyError::unsupported(format!("member `{member}` of {ty}"), span));
        };
        let def = self
            .ctx
            .mapper()
            .types()
            .get(*id)
            .ok_or_else(|| VerifyError::type_resolution(ty.to_string(), "unknown struct id"))?;
        let idx = def
            .member_index(member)
            .ok_or_else(|| VerifyError::unsupported(format!("member `{member}` of `{}`", def.name), span))?;
        let dt = self.record_sort(ty, span)?;
        Ok((dt, idx, def.members[idx].ty.clone()))
    }

    /// `0 <= index < length`; recorded as a revert source in runtime code.
    fn check_bounds(&mut self, base: &SmtTerm, index: &SmtTerm, dt: &Arc<DatatypeSort>, span: Span) -> SmtTerm {
        if self.mode == EvalMode::Spec {
            return SmtTerm::bool(true);
        }
        let ok = SmtTerm::and(vec![
            index.clone().ge(SmtTerm::int(0)),
            index.clone().lt(base.clone().field(dt, 1)),
        ]);
        self.state.record_revert(ok.clone().not(), "index out of bounds", span);
        ok
    }

    fn read_index(&mut self, base: &Expr, index: &Expr, span: Span) -> Result<TypedValue, VerifyError> {
        let b = self.eval_single(base)?;
        let i = self.eval_single(index)?;
        let (elem_ty, term, in_bounds) = match &b.ty {
            TypeName::Mapping(_, value_ty) => {
                ((**value_ty).clone(), b.term.clone().select(i.term), SmtTerm::bool(true))
            }
            TypeName::Array(elem_ty, _) => {
                let dt = self.record_sort(&b.ty, span)?;
                let in_bounds = self.check_bounds(&b.term, &i.term, &dt, span);
                ((**elem_ty).clone(), b.term.clone().field(&dt, 0).select(i.term), in_bounds)
            }
            other => return Err(VerifyError::unsupported(format!("index access on {other}"), span)),
        };
        if unwritten(&term) {
            let wf = self.ctx.mapper().well_formed(&term, &elem_ty)?;
            self.state.assume_well_formed(wf);
        }
        Ok(TypedValue::new(
            elem_ty,
            term,
            SmtTerm::and(vec![b.constraint, i.constraint, in_bounds]),
        ))
    }

    fn read_member(&mut self, base: &Expr, member: &str, span: Span) -> Result<TypedValue, VerifyError> {
        let b = self.eval_single(base)?;
        match &b.ty {
            TypeName::Array(..) if member == "length" => {
                let dt = self.record_sort(&b.ty, span)?;
                Ok(TypedValue::new(TypeName::uint(256), b.term.field(&dt, 1), b.constraint))
            }
            TypeName::UserDefined(UserType::Struct(_)) => {
                let (dt, idx, ty) = self.struct_field(&b.ty, member, span)?;
                Ok(TypedValue::new(ty, b.term.field(&dt, idx), b.constraint))
            }
            other => Err(VerifyError::unsupported(format!("member `{member}` of {other}"), span)),
        }
    }

    fn eval_conversion(&mut self, ty: &TypeName, arg: &Expr, span: Span) -> Result<TypedValue, VerifyError> {
        let v = self.eval_single(arg)?;
        let mapper = self.ctx.mapper();
        if mapper.sort_for(ty)? != mapper.sort_for(&v.ty)? {
            return Err(VerifyError::unsupported(format!("conversion from {} to {ty}", v.ty), span));
        }
        let wraps = matches!(
            ty,
            TypeName::Elementary(ElementaryType::Uint(_) | ElementaryType::Address)
        );
        let term = match range(ty) {
            Some((_, hi)) if wraps && !fits(ty, &v.ty) => v.term.modulo(SmtTerm::int(hi + 1u32)),
            _ => v.term,
        };
        Ok(TypedValue::new(ty.clone(), term, v.constraint))
    }

    fn single_arg<'e>(name: &str, args: &'e [Expr], span: Span) -> Result<&'e Expr, VerifyError> {
        match args {
            [arg] => Ok(arg),
            _ => Err(VerifyError::unsupported(format!("`{name}` with {} arguments", args.len()), span)),
        }
    }

    fn eval_call(&mut self, callee: &Expr, args: &[Expr], span: Span) -> Result<Value, VerifyError> {
        if let ExprKind::Identifier { name, decl: None } = &callee.kind {
            match name.as_str() {
                "require" | "assume" => {
                    let cond = Self::single_arg(name, args, span)?;
                    let fact = self.eval_single(cond)?;
                    self.state.assume(&fact);
                    return Ok(Value::Unit);
                }
                "revert" => {
                    if self.mode == EvalMode::Runtime {
                        self.state.record_revert(SmtTerm::bool(true), "explicit revert", span);
                    }
                    return Ok(Value::Unit);
                }
                "assert" | "ok" | "err" => {
                    let fact = Self::single_arg(name, args, span)?;
                    self.add_obligation(name, fact, span)?;
                    return Ok(Value::Unit);
                }
                n if is_snapshot_call(n) => return self.eval_snapshot(n, args, span).map(Value::Single),
                n if is_specification_call(n) => {
                    return Err(VerifyError::unsupported(
                        format!("`{n}` after the leading specification statements"),
                        span,
                    ));
                }
                _ => {}
            }
        }
        if let ExprKind::MemberAccess { base, member, decl: None } = &callee.kind {
            if member == "push" || member == "pop" {
                if let Some(v) = self.array_method(base, member, args, span)? {
                    return Ok(v);
                }
            }
        }
        let target = self.resolve_callee(callee, span)?;
        self.call_opaque(target, args, span)
    }

    /// `old_uint(e)` / `old_address(e)`: `e` read against the entry checkpoint.
    fn eval_snapshot(&mut self, name: &str, args: &[Expr], span: Span) -> Result<TypedValue, VerifyError> {
        let location = Self::single_arg(name, args, span)?;
        let Some(saved) = self.state.enter_checkpoint() else {
            return Err(VerifyError::unsupported(format!("`{name}` before function entry"), span));
        };
        let value = self.eval_single(location);
        self.state.leave_checkpoint(saved);
        let ty = if name == "old_address" {
            TypeName::address()
        } else {
            TypeName::uint(256)
        };
        Ok(value?.retyped(&ty))
    }

    /// `a.push(v)`, `a.push()` and `a.pop()` on dynamic arrays. `None` when
    /// `base` is not an array, so the call resolves as a member function.
    fn array_method(&mut self, base: &Expr, member: &str, args: &[Expr], span: Span) -> Result<Option<Value>, VerifyError> {
        let b = self.eval_single(base)?;
        let TypeName::Array(elem_ty, None) = &b.ty else {
            return Ok(None);
        };
        let elem_ty = (**elem_ty).clone();
        let dt = self.record_sort(&b.ty, span)?;
        let data = b.term.clone().field(&dt, 0);
        let length = b.term.clone().field(&dt, 1);
        let ctx = self.ctx;
        let mapper = ctx.mapper();

        let (updated, result) = match (member, args) {
            ("push", []) | ("push", [_]) => {
                let element = match args.first() {
                    Some(arg) => self.eval_single(arg)?.retyped(&elem_ty),
                    None => TypedValue::exact(elem_ty.clone(), mapper.default_value(&elem_ty)?),
                };
                let updated = TypedValue::new(
                    b.ty.clone(),
                    SmtTerm::Construct(
                        Arc::clone(&dt),
                        vec![
                            data.store(length.clone(), element.term.clone()),
                            length.add(SmtTerm::int(1)),
                        ],
                    ),
                    SmtTerm::and(vec![b.constraint.clone(), element.constraint.clone()]),
                );
                let result = if args.is_empty() { Value::Single(element) } else { Value::Unit };
                (updated, result)
            }
            ("pop", []) => {
                let empty = length.clone().eq(SmtTerm::int(0));
                let mut parts = vec![b.constraint.clone()];
                if self.mode == EvalMode::Runtime {
                    self.state.record_revert(empty.clone(), "pop from an empty array", span);
                    parts.push(empty.not());
                }
                let last = length.sub(SmtTerm::int(1));
                let updated = TypedValue::new(
                    b.ty.clone(),
                    SmtTerm::Construct(
                        Arc::clone(&dt),
                        vec![data.store(last.clone(), mapper.default_value(&elem_ty)?), last],
                    ),
                    SmtTerm::and(parts),
                );
                (updated, Value::Unit)
            }
            _ => {
                return Err(VerifyError::unsupported(
                    format!("`{member}` with {} arguments", args.len()),
                    span,
                ));
            }
        };
        self.assign(base, updated)?;
        Ok(Some(result))
    }

    fn resolve_callee(&mut self, callee: &Expr, span: Span) -> Result<&'p Function, VerifyError> {
        let ctx = self.ctx;
        let index = ctx.index();
        let caller = self.function.contract;
        let found = match &callee.kind {
            ExprKind::Identifier { decl: Some(id), .. } | ExprKind::MemberAccess { decl: Some(id), .. } => {
                index.function(*id)
            }
            ExprKind::Identifier { name, .. } => index.resolve_member(caller, name),
            ExprKind::MemberAccess { base, member, .. } => match base.as_identifier() {
                Some("super") => index.resolve_super(caller, member),
                Some("this") => index.resolve_member(caller, member),
                // `Lib.f(..)` / `Base.f(..)`
                Some(name) if self.state.read(name).is_none() => index
                    .contract_by_name(name)
                    .and_then(|c| index.resolve_member(c.id, member)),
                // `token.f(..)` on a contract-typed value
                _ => match self.eval_single(base)?.ty {
                    TypeName::UserDefined(UserType::Contract(id)) => index.resolve_member(id, member),
                    _ => None,
                },
            },
            _ => None,
        };
        found.ok_or_else(|| VerifyError::unsupported(format!("call to `{callee}`"), span))
    }

    /// Storage of `contract` is the caller's own storage.
    fn shares_state_with(&self, contract: zero_ast::ContractId) -> bool {
        let caller = self.function.contract;
        contract == caller
            || self
                .ctx
                .index()
                .contract(caller)
                .is_some_and(|c| c.bases.contains(&contract))
    }

    /// Call through the callee's contract, never its body.
    fn call_opaque(&mut self, callee: &'p Function, args: &[Expr], span: Span) -> Result<Value, VerifyError> {
        let ctx = self.ctx;

        // arguments are evaluated here, in the caller's mode, left to right
        let mut bound = Vec::with_capacity(args.len());
        for arg in args {
            let v = self.eval_single(arg)?;
            let name = self.state.fresh_name("arg");
            self.state.write(&name, v);
            bound.push(Expr::new(arg.span, ExprKind::Identifier { name, decl: None }));
        }

        let spec = match ctx.spec(callee.id) {
            Some(spec) if !spec.is_identity() => spec,
            _ => return self.havoc_returns(callee),
        };

        let foreign: Vec<&VarDecl> = if self.shares_state_with(callee.contract) {
            Vec::new()
        } else {
            ctx.index().state_vars(callee.contract).to_vec()
        };
        let state = &mut self.state;
        let inst = spec.instantiate(&bound, &foreign, span, &mut |base: &str| state.fresh_name(base))?;
        trace!(callee = %callee.name, statements = inst.stmts.len(), "instantiating contract");
        self.exec_in(&inst.stmts, EvalMode::Spec)?;

        if self.mode == EvalMode::Runtime && !inst.reverts.is_empty() {
            let mut conditions = Vec::with_capacity(inst.reverts.len());
            for name in &inst.reverts {
                conditions.push(self.read_identifier(name, span)?.term);
            }
            self.state
                .record_revert(SmtTerm::or(conditions), format!("`{}` reverts", callee.name), span);
        }

        let mut returns = Vec::with_capacity(inst.returns.len());
        for name in &inst.returns {
            returns.push(self.read_identifier(name, span)?);
        }
        Ok(match returns.len() {
            0 => Value::Unit,
            1 => Value::Single(returns.remove(0)),
            _ => Value::Tuple(returns),
        })
    }

    fn havoc_returns(&mut self, callee: &Function) -> Result<Value, VerifyError> {
        let ctx = self.ctx;
        let base = format!("{}$ret", callee.name);
        let mut values = Vec::with_capacity(callee.returns.len());
        for r in &callee.returns {
            values.push(self.state.fresh_value(ctx.mapper(), &base, &r.ty)?);
        }
        Ok(match values.len() {
            0 => Value::Unit,
            1 => Value::Single(values.remove(0)),
            _ => Value::Tuple(values),
        })
    }

    fn add_obligation(&mut self, check: &str, fact: &Expr, span: Span) -> Result<(), VerifyError> {
        let p = self.eval_single(fact)?;
        let wf = self.state.well_formed();
        let pc_constraints = self.state.path_constraints();
        let pc = self.state.path_condition();
        let (kind, check, hypothesis, goal) = match check {
            "assert" => (
                ObligationKind::Assert,
                Check::Validity,
                SmtTerm::and(vec![wf, pc_constraints, pc, p.constraint]),
                p.term,
            ),
            // reverting runs must stay reachable; `!revert` implies the ranges
            "ok" => (
                ObligationKind::Ok,
                Check::Satisfiability,
                SmtTerm::and(vec![wf, pc]),
                SmtTerm::and(vec![p.term, p.constraint, self.state.revert_condition().not()]),
            ),
            _ => (
                ObligationKind::Err,
                Check::Satisfiability,
                SmtTerm::and(vec![wf, pc]),
                SmtTerm::and(vec![p.term, p.constraint, self.state.revert_condition()]),
            ),
        };
        let description = self.describe(fact);
        let symbols = self.state.symbols().to_vec();
        self.obligations.push(Obligation {
            kind,
            check,
            description,
            span,
            hypothesis,
            goal,
            symbols,
        });
        Ok(())
    }

    fn describe(&self, fact: &Expr) -> String {
        if let ExprKind::Binary { lhs, .. } = &fact.kind {
            if let Some(name) = lhs.as_identifier() {
                if let Some(clause) = self.spec.clauses.iter().find(|c| c.pre_name == name) {
                    return self.spec.describe(clause);
                }
            }
        }
        fact.to_string()
    }

    /// End of an own-verification path: the recorded reverts must match the contract.
    fn check_reverts(&mut self) {
        let hypothesis = SmtTerm::and(vec![self.state.well_formed(), self.state.path_condition()]);
        let symbols = self.state.symbols().to_vec();

        if self.spec.reverts_if.is_empty() {
            for source in self.state.revert_sources() {
                self.obligations.push(Obligation {
                    kind: ObligationKind::NoRevert,
                    check: Check::Validity,
                    description: source.reason.clone(),
                    span: source.span,
                    hypothesis: hypothesis.clone(),
                    goal: source.term.clone().not(),
                    symbols: symbols.clone(),
                });
            }
            return;
        }

        let declared = self
            .spec
            .reverts_if
            .iter()
            .filter_map(|r| self.state.read(&r.name).map(|v| v.term.clone()))
            .collect();
        let description = self
            .spec
            .reverts_if
            .iter()
            .map(|r| r.cond.to_string())
            .collect::<Vec<_>>()
            .join(" || ");
        self.obligations.push(Obligation {
            kind: ObligationKind::RevertsIf,
            check: Check::Validity,
            description: format!("reverts exactly when {description}"),
            span: self.spec.reverts_if[0].span,
            hypothesis,
            goal: self.state.revert_condition().iff(SmtTerm::or(declared)),
            symbols,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num::Integer;
    use zero_ast::builder::{
        add, assign, block, boolean, call, call_expr, call_stmt, div, eq, expr_stmt, ge, gt, ident, index, le,
        member, num, ret, sub, var_decl, ProgramBuilder,
    };
    use zero_ast::{BinaryOp, ContractKind, Program};

    use crate::config::VerifyOptions;
    use crate::paths::PathGenerator;
    use crate::smt::smtlib::to_smtlib;
    use crate::smt::SmtSort;

    fn obligations_of(program: &Program, name: &str) -> Result<Vec<Obligation>, VerifyError> {
        let ctx = VerificationContext::new(program, VerifyOptions::default())?;
        let function = program
            .functions
            .iter()
            .find(|f| f.name == name)
            .expect("function");
        let spec = ctx.spec(function.id).expect("spec");
        let body = spec.body.as_ref().expect("body");
        let set = PathGenerator::new(ctx.options(), &function.name).generate(body)?;
        let path = set.paths.first().expect("one path");
        Evaluator::new(&ctx, function, spec).run(spec.wrap(&path.stmts))
    }

    fn conjuncts(term: &SmtTerm) -> Vec<SmtTerm> {
        match term {
            SmtTerm::And(parts) => parts.clone(),
            other => vec![other.clone()],
        }
    }

    fn int256() -> TypeName {
        TypeName::Elementary(ElementaryType::Int(256))
    }

    fn record(program: &Program, ty: &TypeName) -> Arc<DatatypeSort> {
        let ctx = VerificationContext::new(program, VerifyOptions::default()).expect("context");
        let sort = ctx.mapper().sort_for(ty).expect("sort");
        sort.as_datatype().cloned().expect("record")
    }

    fn with_reason<'o>(obligations: &'o [Obligation], reason: &str) -> Vec<&'o Obligation> {
        obligations
            .iter()
            .filter(|o| o.kind == ObligationKind::NoRevert && o.description == reason)
            .collect()
    }

    /// Integer value of a ground term, with the solver's `div`/`mod`.
    fn int_of(term: &SmtTerm) -> Option<BigInt> {
        let euclid = |m: BigInt, n: BigInt| {
            let (q, r) = m.div_mod_floor(&n);
            if r.is_negative() {
                (q + BigInt::from(1), r - n)
            } else {
                (q, r)
            }
        };
        Some(match term {
            SmtTerm::IntLit(n) => n.clone(),
            SmtTerm::Neg(t) => -int_of(t)?,
            SmtTerm::Add(l, r) => int_of(l)? + int_of(r)?,
            SmtTerm::Sub(l, r) => int_of(l)? - int_of(r)?,
            SmtTerm::Mul(l, r) => int_of(l)? * int_of(r)?,
            SmtTerm::Div(l, r) => euclid(int_of(l)?, int_of(r)?).0,
            SmtTerm::Mod(l, r) => euclid(int_of(l)?, int_of(r)?).1,
            SmtTerm::Ite(c, t, e) => {
                if bool_of(c)? {
                    int_of(t)?
                } else {
                    int_of(e)?
                }
            }
            _ => return None,
        })
    }

    fn bool_of(term: &SmtTerm) -> Option<bool> {
        Some(match term {
            SmtTerm::BoolLit(b) => *b,
            SmtTerm::Not(t) => !bool_of(t)?,
            SmtTerm::Ge(l, r) => int_of(l)? >= int_of(r)?,
            SmtTerm::Eq(l, r) => match (int_of(l), int_of(r)) {
                (Some(l), Some(r)) => l == r,
                _ => bool_of(l)? == bool_of(r)?,
            },
            _ => return None,
        })
    }

    fn single_function(params: &[(&str, TypeName)], returns: &[(&str, TypeName)], body: Vec<Stmt>) -> Program {
        let mut pb = ProgramBuilder::new();
        let c = pb.contract("C", ContractKind::Contract, &[]);
        pb.state_var(c, "total", TypeName::uint(256));
        pb.function(c, "f", params, returns, Some(block(body)));
        pb.finish()
    }

    #[test]
    fn unsigned_parameters_are_only_non_negative() {
        let program = single_function(
            &[("x", TypeName::uint(256))],
            &[],
            vec![call_stmt("assert", vec![ge(ident("x"), num(1))])],
        );
        let obligations = obligations_of(&program, "f").expect("evaluate");
        assert_eq!(obligations.len(), 1);
        let ob = &obligations[0];
        assert_eq!(ob.kind, ObligationKind::Assert);
        assert_eq!(ob.check, Check::Validity);
        assert_eq!(ob.goal, SmtTerm::var("x").ge(SmtTerm::int(1)));
        assert_eq!(ob.description, "x >= 1");

        let facts = conjuncts(&ob.hypothesis);
        assert!(facts.contains(&SmtTerm::var("x").ge(SmtTerm::int(0))));
        assert!(!facts.iter().any(|t| matches!(t, SmtTerm::Le(l, _) if **l == SmtTerm::var("x"))));
    }

    #[test]
    fn require_joins_the_hypothesis() {
        let program = single_function(
            &[("x", TypeName::uint(256))],
            &[],
            vec![
                call_stmt("require", vec![gt(ident("x"), num(0))]),
                call_stmt("assert", vec![ge(ident("x"), num(1))]),
            ],
        );
        let obligations = obligations_of(&program, "f").expect("evaluate");
        let facts = conjuncts(&obligations[0].hypothesis);
        assert!(facts.contains(&SmtTerm::var("x").gt(SmtTerm::int(0))));
    }

    #[test]
    fn overflow_becomes_a_revert_obligation() {
        let program = single_function(
            &[("x", TypeName::uint(256)), ("y", TypeName::uint(256))],
            &[],
            vec![var_decl("z", TypeName::uint(256), Some(add(ident("x"), ident("y"))))],
        );
        let obligations = obligations_of(&program, "f").expect("evaluate");
        assert_eq!(obligations.len(), 1);
        let ob = &obligations[0];
        assert_eq!(ob.kind, ObligationKind::NoRevert);
        let sum = SmtTerm::var("x").add(SmtTerm::var("y"));
        let overflow = SmtTerm::and(vec![range_predicate(&sum, &TypeName::uint(256)).not()]);
        assert_eq!(ob.goal, overflow.not());
        assert_eq!(ob.description, "overflow in `+` (uint256)");
    }

    #[test]
    fn old_reads_the_entry_checkpoint() {
        let program = single_function(
            &[],
            &[],
            vec![
                expr_stmt(assign(ident("total"), add(ident("total"), num(1)))),
                call_stmt(
                    "assert",
                    vec![eq(add(call("old_uint", vec![ident("total")]), num(1)), ident("total"))],
                ),
            ],
        );
        let obligations = obligations_of(&program, "f").expect("evaluate");
        let assert_ob = obligations
            .iter()
            .find(|o| o.kind == ObligationKind::Assert)
            .expect("assert");
        let bumped = SmtTerm::var("total").add(SmtTerm::int(1));
        assert_eq!(assert_ob.goal, bumped.clone().eq(bumped));
    }

    #[test]
    fn specification_arithmetic_never_reverts() {
        let program = single_function(
            &[("x", TypeName::uint(256))],
            &[("r", TypeName::uint(256))],
            vec![
                call_stmt("ensures", vec![boolean(true), eq(ident("r"), add(ident("x"), num(0)))]),
                ret(Some(ident("x"))),
            ],
        );
        let obligations = obligations_of(&program, "f").expect("evaluate");
        assert_eq!(obligations.len(), 1);
        assert_eq!(obligations[0].kind, ObligationKind::Assert);
        assert_eq!(obligations[0].description, "ensures(true, r == (x + 0))");
    }

    #[test]
    fn reverts_if_replaces_per_source_checks() {
        let program = single_function(
            &[("x", TypeName::uint(256))],
            &[],
            vec![
                call_stmt("reverts_if", vec![eq(ident("x"), num(0))]),
                var_decl("y", TypeName::uint(256), Some(div(num(10), ident("x")))),
            ],
        );
        let obligations = obligations_of(&program, "f").expect("evaluate");
        assert_eq!(obligations.len(), 1);
        assert_eq!(obligations[0].kind, ObligationKind::RevertsIf);
        assert_eq!(obligations[0].description, "reverts exactly when x == 0");
    }

    #[test]
    fn existence_claims_use_the_revert_condition() {
        let program = single_function(
            &[("x", TypeName::uint(256))],
            &[],
            vec![
                call_stmt("achieves_err", vec![boolean(true), eq(ident("x"), num(0))]),
                call_stmt("achieves_ok", vec![boolean(true), gt(ident("x"), num(0))]),
                call_stmt("require", vec![gt(add(ident("x"), num(1)), num(0))]),
                var_decl("y", TypeName::uint(256), Some(div(num(10), ident("x")))),
            ],
        );
        let obligations = obligations_of(&program, "f").expect("evaluate");
        let kinds: Vec<ObligationKind> = obligations.iter().map(|o| o.kind).collect();
        assert!(kinds.contains(&ObligationKind::Err));
        assert!(kinds.contains(&ObligationKind::Ok));
        for o in obligations.iter().filter(|o| o.kind != ObligationKind::NoRevert) {
            assert_eq!(o.check, Check::Satisfiability);
        }

        let ok = obligations.iter().find(|o| o.kind == ObligationKind::Ok).expect("ok");
        let err = obligations.iter().find(|o| o.kind == ObligationKind::Err).expect("err");
        assert_eq!(ok.hypothesis, err.hypothesis);
        // the range of `x + 1` in the `require` must not exclude reverting runs
        let sum_range = range_predicate(&SmtTerm::var("x").add(SmtTerm::int(1)), &TypeName::uint(256));
        assert!(!conjuncts(&err.hypothesis).contains(&sum_range));
    }

    #[test]
    fn environment_and_mappings_are_readable() {
        let mut pb = ProgramBuilder::new();
        let c = pb.contract("Token", ContractKind::Contract, &[]);
        pb.state_var(c, "balances", TypeName::mapping(TypeName::address(), TypeName::uint(256)));
        pb.function(
            c,
            "mine",
            &[],
            &[("b", TypeName::uint(256))],
            Some(block(vec![
                ret(Some(index(ident("balances"), member(ident("msg"), "sender")))),
            ])),
        );
        let program = pb.finish();
        let obligations = obligations_of(&program, "mine").expect("evaluate");
        assert!(obligations.is_empty());
    }

    #[test]
    fn opaque_callee_returns_fresh_values() {
        let mut pb = ProgramBuilder::new();
        let c = pb.contract("C", ContractKind::Contract, &[]);
        pb.function(
            c,
            "inc",
            &[("a", TypeName::uint(256))],
            &[("r", TypeName::uint(256))],
            Some(block(vec![
                call_stmt("ensures", vec![boolean(true), eq(ident("r"), add(ident("a"), num(1)))]),
                ret(Some(add(ident("a"), num(1)))),
            ])),
        );
        pb.function(
            c,
            "caller",
            &[("x", TypeName::uint(256))],
            &[],
            Some(block(vec![
                var_decl("y", TypeName::uint(256), Some(call("inc", vec![ident("x")]))),
                call_stmt("assert", vec![eq(ident("y"), add(ident("x"), num(1)))]),
            ])),
        );
        let program = pb.finish();
        let obligations = obligations_of(&program, "caller").expect("evaluate");
        let assert_ob = obligations
            .iter()
            .find(|o| o.kind == ObligationKind::Assert)
            .expect("assert");
        assert!(assert_ob.symbols.iter().any(|(n, _)| n.starts_with("r!")));
        assert!(conjuncts(&assert_ob.hypothesis)
            .iter()
            .any(|t| matches!(t, SmtTerm::Implies(..))));
    }

    #[test]
    fn bit_operations_are_unsupported() {
        let program = single_function(
            &[("x", TypeName::uint(256))],
            &[],
            vec![var_decl(
                "y",
                TypeName::uint(256),
                Some(zero_ast::builder::bin(BinaryOp::Shl, ident("x"), num(1))),
            )],
        );
        let err = obligations_of(&program, "f").expect_err("unsupported");
        assert_eq!(err.to_string(), "unsupported `<<`");
    }

    #[test]
    fn read_back_of_an_unchecked_write_is_not_assumed_well_formed() {
        let mut pb = ProgramBuilder::new();
        let c = pb.contract("Bank", ContractKind::Contract, &[]);
        pb.state_var(c, "bal", TypeName::mapping(TypeName::uint(256), TypeName::uint(256)));
        pb.function(
            c,
            "f",
            &[("x", TypeName::uint(256)), ("y", TypeName::uint(256))],
            &[],
            Some(block(vec![
                call_stmt("require", vec![le(ident("x"), num(10))]),
                var_decl("a", TypeName::uint(256), Some(index(ident("bal"), num(1)))),
                expr_stmt(assign(index(ident("bal"), num(0)), sub(ident("x"), ident("y")))),
                var_decl("z", TypeName::uint(256), Some(index(ident("bal"), num(0)))),
            ])),
        );
        let program = pb.finish();
        let obligations = obligations_of(&program, "f").expect("evaluate");
        let underflow = with_reason(&obligations, "overflow in `-` (uint256)");
        let [ob] = underflow.as_slice() else {
            panic!("expected one underflow check, got {obligations:?}");
        };

        let bal = SmtTerm::var("bal");
        let facts = conjuncts(&ob.hypothesis);
        assert!(facts.contains(&bal.clone().select(SmtTerm::int(1)).ge(SmtTerm::int(0))));
        let written = bal
            .store(SmtTerm::int(0), SmtTerm::var("x").sub(SmtTerm::var("y")))
            .select(SmtTerm::int(0));
        assert!(!facts.contains(&written.ge(SmtTerm::int(0))));
        assert!(!to_smtlib(&ob.hypothesis).contains("(store"));
    }

    #[test]
    fn signed_division_truncates_toward_zero() {
        assert_eq!(int_of(&SmtTerm::int(-7).div(SmtTerm::int(2))), Some(BigInt::from(-4)));
        for (a, b) in [(-7i64, 2i64), (7, -2), (-7, -2), (7, 2), (-6, 3), (6, -4)] {
            let (l, r) = (SmtTerm::int(a), SmtTerm::int(b));
            assert_eq!(int_of(&truncating_div(l.clone(), r.clone())), Some(BigInt::from(a / b)), "{a} / {b}");
            assert_eq!(int_of(&truncating_rem(l, r)), Some(BigInt::from(a % b)), "{a} % {b}");
        }

        let program = single_function(
            &[("a", int256()), ("b", int256()), ("c", int256()), ("x", TypeName::uint(256))],
            &[],
            vec![
                call_stmt("assert", vec![eq(div(ident("a"), ident("b")), ident("c"))]),
                call_stmt("assert", vec![eq(div(ident("x"), num(2)), ident("c"))]),
            ],
        );
        let obligations = obligations_of(&program, "f").expect("evaluate");
        let goals: Vec<&SmtTerm> = obligations
            .iter()
            .filter(|o| o.kind == ObligationKind::Assert)
            .map(|o| &o.goal)
            .collect();
        assert_eq!(
            goals,
            vec![
                &truncating_div(SmtTerm::var("a"), SmtTerm::var("b")).eq(SmtTerm::var("c")),
                &SmtTerm::var("x").div(SmtTerm::int(2)).eq(SmtTerm::var("c")),
            ]
        );
    }

    #[test]
    fn nested_member_write_rebuilds_from_the_innermost_access() {
        let mut pb = ProgramBuilder::new();
        let c = pb.contract("Ledger", ContractKind::Contract, &[]);
        let item = pb.struct_def(c, "Item", &[("amount", TypeName::uint(256)), ("owner", TypeName::address())]);
        let item_ty = TypeName::UserDefined(UserType::Struct(item));
        let items_ty = TypeName::array(item_ty.clone(), None);
        pb.state_var(c, "items", items_ty.clone());
        pb.function(
            c,
            "f",
            &[("i", TypeName::uint(256)), ("v", TypeName::uint(256))],
            &[],
            Some(block(vec![
                expr_stmt(assign(member(index(ident("items"), ident("i")), "amount"), ident("v"))),
                call_stmt("assert", vec![eq(member(index(ident("items"), ident("i")), "amount"), ident("v"))]),
            ])),
        );
        let program = pb.finish();
        let arr = record(&program, &items_ty);
        let rec = record(&program, &item_ty);

        let items = SmtTerm::var("items");
        let (i, v) = (SmtTerm::var("i"), SmtTerm::var("v"));
        let old_item = items.clone().field(&arr, 0).select(i.clone());
        let new_item = SmtTerm::Construct(Arc::clone(&rec), vec![v.clone(), old_item.field(&rec, 1)]);
        let rebuilt = SmtTerm::Construct(
            Arc::clone(&arr),
            vec![items.clone().field(&arr, 0).store(i.clone(), new_item), items.field(&arr, 1)],
        );
        let read_back = rebuilt.field(&arr, 0).select(i).field(&rec, 0);

        let obligations = obligations_of(&program, "f").expect("evaluate");
        let assert_ob = obligations
            .iter()
            .find(|o| o.kind == ObligationKind::Assert)
            .expect("assert");
        assert_eq!(assert_ob.goal, read_back.eq(v));
        // member write reads, index write and the final read each check bounds
        assert_eq!(with_reason(&obligations, "index out of bounds").len(), 3);
    }

    #[test]
    fn push_pop_and_length_track_the_array() {
        let mut pb = ProgramBuilder::new();
        let c = pb.contract("Stack", ContractKind::Contract, &[]);
        let xs_ty = TypeName::array(TypeName::uint(256), None);
        pb.state_var(c, "xs", xs_ty.clone());
        let push = |arg: &str| expr_stmt(call_expr(member(ident("xs"), "push"), vec![ident(arg)]));
        let pop = || expr_stmt(call_expr(member(ident("xs"), "pop"), vec![]));
        pb.function(
            c,
            "f",
            &[("v", TypeName::uint(256)), ("i", TypeName::uint(256))],
            &[],
            Some(block(vec![
                var_decl("n", TypeName::uint(256), Some(member(ident("xs"), "length"))),
                push("v"),
                call_stmt("assert", vec![eq(member(ident("xs"), "length"), add(ident("n"), num(1)))]),
                pop(),
                pop(),
                var_decl("y", TypeName::uint(256), Some(index(ident("xs"), ident("i")))),
            ])),
        );
        let program = pb.finish();
        let arr = record(&program, &xs_ty);

        let xs = SmtTerm::var("xs");
        let len = xs.clone().field(&arr, 1);
        let pushed = SmtTerm::Construct(
            Arc::clone(&arr),
            vec![
                xs.field(&arr, 0).store(len.clone(), SmtTerm::var("v")),
                len.clone().add(SmtTerm::int(1)),
            ],
        );

        let obligations = obligations_of(&program, "f").expect("evaluate");
        let assert_ob = obligations
            .iter()
            .find(|o| o.kind == ObligationKind::Assert)
            .expect("assert");
        assert_eq!(assert_ob.goal, pushed.field(&arr, 1).eq(len.add(SmtTerm::int(1))));
        assert_eq!(with_reason(&obligations, "pop from an empty array").len(), 2);
        let bounds = with_reason(&obligations, "index out of bounds");
        let [oob] = bounds.as_slice() else {
            panic!("expected one bounds check");
        };
        assert!(matches!(&oob.goal, SmtTerm::And(parts) if parts[0] == SmtTerm::var("i").ge(SmtTerm::int(0))));
    }

    #[test]
    fn super_calls_use_the_base_contract() {
        let mut pb = ProgramBuilder::new();
        let bump = |step: i64| {
            Some(block(vec![
                call_stmt("ensures", vec![boolean(true), eq(ident("r"), add(ident("x"), num(step)))]),
                ret(Some(add(ident("x"), num(step)))),
            ]))
        };
        let base = pb.contract("Base", ContractKind::Contract, &[]);
        pb.function(base, "bump", &[("x", TypeName::uint(256))], &[("r", TypeName::uint(256))], bump(1));
        let derived = pb.contract("Derived", ContractKind::Contract, &[base]);
        pb.function(derived, "bump", &[("x", TypeName::uint(256))], &[("r", TypeName::uint(256))], bump(2));
        pb.function(
            derived,
            "f",
            &[("a", TypeName::uint(256))],
            &[],
            Some(block(vec![
                var_decl(
                    "b",
                    TypeName::uint(256),
                    Some(call_expr(member(ident("super"), "bump"), vec![ident("a")])),
                ),
                call_stmt("assert", vec![gt(ident("b"), ident("a"))]),
            ])),
        );
        let program = pb.finish();
        let obligations = obligations_of(&program, "f").expect("evaluate");
        let assert_ob = obligations
            .iter()
            .find(|o| o.kind == ObligationKind::Assert)
            .expect("assert");
        let rendered = to_smtlib(&assert_ob.hypothesis);
        assert!(rendered.contains("(+ a 1)"), "{rendered}");
        assert!(!rendered.contains("(+ a 2)"), "{rendered}");
    }

    #[test]
    fn opaque_call_havocs_what_old_refers_to() {
        let mut pb = ProgramBuilder::new();
        let c = pb.contract("Counter", ContractKind::Contract, &[]);
        pb.state_var(c, "total", TypeName::uint(256));
        pb.function(
            c,
            "bump",
            &[],
            &[],
            Some(block(vec![
                call_stmt(
                    "ensures",
                    vec![boolean(true), eq(ident("total"), add(call("old_uint", vec![ident("total")]), num(1)))],
                ),
                expr_stmt(assign(ident("total"), add(ident("total"), num(1)))),
            ])),
        );
        pb.function(
            c,
            "f",
            &[],
            &[],
            Some(block(vec![
                var_decl("before", TypeName::uint(256), Some(ident("total"))),
                call_stmt("bump", vec![]),
                call_stmt("assert", vec![eq(ident("total"), add(ident("before"), num(1)))]),
            ])),
        );
        let program = pb.finish();
        let obligations = obligations_of(&program, "f").expect("evaluate");
        let assert_ob = obligations
            .iter()
            .find(|o| o.kind == ObligationKind::Assert)
            .expect("assert");

        let SmtTerm::Eq(lhs, rhs) = &assert_ob.goal else {
            panic!("unexpected goal {:?}", assert_ob.goal);
        };
        let SmtTerm::Var(after) = lhs.as_ref() else {
            panic!("`total` should be a fresh symbol after the call, got {lhs:?}");
        };
        assert_ne!(after, "total");
        assert!(assert_ob.symbols.contains(&(after.clone(), SmtSort::Int)));
        assert_eq!(**rhs, SmtTerm::var("total").add(SmtTerm::int(1)));
    }
}
