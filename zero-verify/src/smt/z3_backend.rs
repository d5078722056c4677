use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use num::BigInt;
use thiserror::Error;
use z3::ast::{self, Ast, Dynamic};
use z3::{Config, Context, DatatypeAccessor, DatatypeBuilder, FuncDecl, Params, Solver, Sort};

use crate::smt::solver::{Model, ModelValue, SatResult, SmtSolver};
use crate::smt::sorts::{DatatypeSort, SmtSort};
use crate::smt::terms::SmtTerm;

#[derive(Debug, Error)]
pub enum Z3Error {
    #[error("Z3 error: {0}")]
    Internal(String),
    #[error("unknown variable: {0}")]
    UnknownVariable(String),
    #[error("sort mismatch: expected {expected} in `{term}`")]
    SortMismatch { expected: &'static str, term: String },
}

/// Z3-backed [`SmtSolver`].
///
/// Declarations and assertions are buffered until the next reset; every
/// check builds a fresh context, so the solver owns no Z3 lifetimes and can
/// move between threads.
pub struct Z3Solver {
    timeout_ms: u64,
    decls: Vec<(String, SmtSort)>,
    assertions: Vec<SmtTerm>,
}

impl Z3Solver {
    pub fn new() -> Self {
        Self::with_timeout_ms(0)
    }

    /// `0` disables the timeout.
    pub fn with_timeout_ms(timeout_ms: u64) -> Self {
        Self {
            timeout_ms,
            decls: Vec::new(),
            assertions: Vec::new(),
        }
    }

    fn run(&self, wanted: &[(&str, &SmtSort)]) -> Result<(SatResult, Option<Model>), Z3Error> {
        let mut cfg = Config::new();
        cfg.set_model_generation(true);
        let ctx = Context::new(&cfg);
        let mut tr = Translator::new(&ctx);

        for (name, sort) in &self.decls {
            tr.declare(name, sort)?;
        }

        let solver = Solver::new(&ctx);
        if self.timeout_ms > 0 {
            let mut params = Params::new(&ctx);
            params.set_u32("timeout", self.timeout_ms.min(u64::from(u32::MAX)) as u32);
            solver.set_params(&params);
        }
        for term in &self.assertions {
            let b = tr.term_bool(term)?;
            solver.assert(&b);
        }

        match solver.check() {
            z3::SatResult::Unsat => Ok((SatResult::Unsat, None)),
            z3::SatResult::Unknown => {
                let reason = solver
                    .get_reason_unknown()
                    .unwrap_or_else(|| "unknown".to_string());
                Ok((SatResult::Unknown(reason), None))
            }
            z3::SatResult::Sat => {
                if wanted.is_empty() {
                    return Ok((SatResult::Sat, None));
                }
                let Some(z3_model) = solver.get_model() else {
                    return Ok((SatResult::Sat, None));
                };
                let mut values = BTreeMap::new();
                for (name, sort) in wanted {
                    let Some(v) = tr.vars.get(*name) else {
                        continue;
                    };
                    let Some(evaluated) = z3_model.eval(v, true) else {
                        continue;
                    };
                    values.insert(name.to_string(), model_value(&evaluated, sort));
                }
                Ok((SatResult::Sat, Some(Model { values })))
            }
        }
    }
}

impl Default for Z3Solver {
    fn default() -> Self {
        Self::new()
    }
}

impl SmtSolver for Z3Solver {
    type Error = Z3Error;

    fn declare_var(&mut self, name: &str, sort: &SmtSort) -> Result<(), Z3Error> {
        self.decls.push((name.to_string(), sort.clone()));
        Ok(())
    }

    fn assert(&mut self, term: &SmtTerm) -> Result<(), Z3Error> {
        self.assertions.push(term.clone());
        Ok(())
    }

    fn check_sat(&mut self) -> Result<SatResult, Z3Error> {
        self.run(&[]).map(|(r, _)| r)
    }

    fn check_sat_with_model(
        &mut self,
        var_names: &[(&str, &SmtSort)],
    ) -> Result<(SatResult, Option<Model>), Z3Error> {
        self.run(var_names)
    }

    fn reset(&mut self) -> Result<(), Z3Error> {
        self.decls.clear();
        self.assertions.clear();
        Ok(())
    }
}

fn model_value(v: &Dynamic<'_>, sort: &SmtSort) -> ModelValue {
    match sort {
        SmtSort::Int => v
            .as_int()
            .and_then(|i| parse_numeral(&i.to_string()))
            .map(ModelValue::Int)
            .unwrap_or_else(|| ModelValue::Other(v.to_string())),
        SmtSort::Bool => v
            .as_bool()
            .and_then(|b| b.as_bool())
            .map(ModelValue::Bool)
            .unwrap_or_else(|| ModelValue::Other(v.to_string())),
        SmtSort::String => v
            .as_string()
            .and_then(|s| s.as_string())
            .map(ModelValue::Str)
            .unwrap_or_else(|| ModelValue::Other(v.to_string())),
        _ => ModelValue::Other(v.to_string()),
    }
}

/// Parse a Z3 integer numeral (`5`, `(- 5)`).
fn parse_numeral(s: &str) -> Option<BigInt> {
    let s = s.trim();
    if let Some(inner) = s.strip_prefix("(-").and_then(|r| r.strip_suffix(')')) {
        return inner.trim().parse::<BigInt>().ok().map(|n| -n);
    }
    s.parse().ok()
}

struct Translator<'ctx> {
    ctx: &'ctx Context,
    vars: HashMap<String, Dynamic<'ctx>>,
    bound: Vec<HashMap<String, Dynamic<'ctx>>>,
    datatypes: HashMap<String, Rc<z3::DatatypeSort<'ctx>>>,
}

impl<'ctx> Translator<'ctx> {
    fn new(ctx: &'ctx Context) -> Self {
        Self {
            ctx,
            vars: HashMap::new(),
            bound: Vec::new(),
            datatypes: HashMap::new(),
        }
    }

    fn constant(&mut self, name: &str, sort: &SmtSort) -> Result<Dynamic<'ctx>, Z3Error> {
        let s = self.sort(sort)?;
        Ok(FuncDecl::new(self.ctx, name, &[], &s).apply(&[]))
    }

    fn declare(&mut self, name: &str, sort: &SmtSort) -> Result<(), Z3Error> {
        let c = self.constant(name, sort)?;
        self.vars.insert(name.to_string(), c);
        Ok(())
    }

    fn sort(&mut self, sort: &SmtSort) -> Result<Sort<'ctx>, Z3Error> {
        Ok(match sort {
            SmtSort::Bool => Sort::bool(self.ctx),
            SmtSort::Int => Sort::int(self.ctx),
            SmtSort::String => Sort::string(self.ctx),
            SmtSort::Array(index, element) => {
                let i = self.sort(index)?;
                let e = self.sort(element)?;
                Sort::array(self.ctx, &i, &e)
            }
            SmtSort::Datatype(dt) => self.datatype(dt)?.sort.clone(),
        })
    }

    fn datatype(&mut self, dt: &DatatypeSort) -> Result<Rc<z3::DatatypeSort<'ctx>>, Z3Error> {
        if let Some(existing) = self.datatypes.get(&dt.name) {
            return Ok(Rc::clone(existing));
        }
        let mut field_sorts = Vec::with_capacity(dt.fields.len());
        for (_, s) in &dt.fields {
            field_sorts.push(self.sort(s)?);
        }
        let field_names: Vec<String> = (0..dt.fields.len())
            .map(|i| dt.field_name(i).unwrap_or_default())
            .collect();
        let fields: Vec<(&str, DatatypeAccessor<'ctx>)> = field_names
            .iter()
            .zip(field_sorts)
            .map(|(n, s)| (n.as_str(), DatatypeAccessor::Sort(s)))
            .collect();
        let built = DatatypeBuilder::new(self.ctx, dt.name.as_str())
            .variant(&dt.constructor_name(), fields)
            .finish();
        let built = Rc::new(built);
        self.datatypes.insert(dt.name.clone(), Rc::clone(&built));
        Ok(built)
    }

    fn term_int(&mut self, t: &SmtTerm) -> Result<ast::Int<'ctx>, Z3Error> {
        self.term(t)?.as_int().ok_or_else(|| Z3Error::SortMismatch {
            expected: "Int",
            term: crate::smt::smtlib::to_smtlib(t),
        })
    }

    fn term_bool(&mut self, t: &SmtTerm) -> Result<ast::Bool<'ctx>, Z3Error> {
        self.term(t)?.as_bool().ok_or_else(|| Z3Error::SortMismatch {
            expected: "Bool",
            term: crate::smt::smtlib::to_smtlib(t),
        })
    }

    fn term_array(&mut self, t: &SmtTerm) -> Result<ast::Array<'ctx>, Z3Error> {
        self.term(t)?.as_array().ok_or_else(|| Z3Error::SortMismatch {
            expected: "Array",
            term: crate::smt::smtlib::to_smtlib(t),
        })
    }

    fn term(&mut self, t: &SmtTerm) -> Result<Dynamic<'ctx>, Z3Error> {
        let ctx = self.ctx;
        Ok(match t {
            SmtTerm::Var(name) => {
                let scoped = self.bound.iter().rev().find_map(|scope| scope.get(name));
                match scoped.or_else(|| self.vars.get(name)) {
                    Some(v) => v.clone(),
                    None => return Err(Z3Error::UnknownVariable(name.clone())),
                }
            }
            SmtTerm::IntLit(n) => {
                let magnitude = ast::Int::from_str(ctx, &n.magnitude().to_string())
                    .ok_or_else(|| Z3Error::Internal(format!("bad numeral {n}")))?;
                let v = if n.sign() == num::bigint::Sign::Minus {
                    magnitude.unary_minus()
                } else {
                    magnitude
                };
                Dynamic::from_ast(&v)
            }
            SmtTerm::BoolLit(b) => Dynamic::from_ast(&ast::Bool::from_bool(ctx, *b)),
            SmtTerm::StrLit(s) => {
                let v = ast::String::from_str(ctx, s).map_err(|e| Z3Error::Internal(e.to_string()))?;
                Dynamic::from_ast(&v)
            }
            SmtTerm::Add(l, r) => {
                let (l, r) = (self.term_int(l)?, self.term_int(r)?);
                Dynamic::from_ast(&ast::Int::add(ctx, &[&l, &r]))
            }
            SmtTerm::Sub(l, r) => {
                let (l, r) = (self.term_int(l)?, self.term_int(r)?);
                Dynamic::from_ast(&ast::Int::sub(ctx, &[&l, &r]))
            }
            SmtTerm::Mul(l, r) => {
                let (l, r) = (self.term_int(l)?, self.term_int(r)?);
                Dynamic::from_ast(&ast::Int::mul(ctx, &[&l, &r]))
            }
            SmtTerm::Div(l, r) => {
                let (l, r) = (self.term_int(l)?, self.term_int(r)?);
                Dynamic::from_ast(&l.div(&r))
            }
            SmtTerm::Mod(l, r) => {
                let (l, r) = (self.term_int(l)?, self.term_int(r)?);
                Dynamic::from_ast(&l.modulo(&r))
            }
            SmtTerm::Neg(inner) => Dynamic::from_ast(&self.term_int(inner)?.unary_minus()),
            SmtTerm::Eq(l, r) => {
                let (l, r) = (self.term(l)?, self.term(r)?);
                Dynamic::from_ast(&l._eq(&r))
            }
            SmtTerm::Lt(l, r) => {
                let (l, r) = (self.term_int(l)?, self.term_int(r)?);
                Dynamic::from_ast(&l.lt(&r))
            }
            SmtTerm::Le(l, r) => {
                let (l, r) = (self.term_int(l)?, self.term_int(r)?);
                Dynamic::from_ast(&l.le(&r))
            }
            SmtTerm::Gt(l, r) => {
                let (l, r) = (self.term_int(l)?, self.term_int(r)?);
                Dynamic::from_ast(&l.gt(&r))
            }
            SmtTerm::Ge(l, r) => {
                let (l, r) = (self.term_int(l)?, self.term_int(r)?);
                Dynamic::from_ast(&l.ge(&r))
            }
            SmtTerm::And(terms) | SmtTerm::Or(terms) => {
                let mut bools = Vec::with_capacity(terms.len());
                for term in terms {
                    bools.push(self.term_bool(term)?);
                }
                let refs: Vec<&ast::Bool<'ctx>> = bools.iter().collect();
                let b = if matches!(t, SmtTerm::And(_)) {
                    ast::Bool::and(ctx, &refs)
                } else {
                    ast::Bool::or(ctx, &refs)
                };
                Dynamic::from_ast(&b)
            }
            SmtTerm::Not(inner) => Dynamic::from_ast(&self.term_bool(inner)?.not()),
            SmtTerm::Implies(l, r) => {
                let (l, r) = (self.term_bool(l)?, self.term_bool(r)?);
                Dynamic::from_ast(&l.implies(&r))
            }
            SmtTerm::Ite(c, a, b) => {
                let c = self.term_bool(c)?;
                let (a, b) = (self.term(a)?, self.term(b)?);
                c.ite(&a, &b)
            }
            SmtTerm::Select(arr, idx) => {
                let arr = self.term_array(arr)?;
                let idx = self.term(idx)?;
                arr.select(&idx)
            }
            SmtTerm::Store(arr, idx, val) => {
                let arr = self.term_array(arr)?;
                let (idx, val) = (self.term(idx)?, self.term(val)?);
                Dynamic::from_ast(&arr.store(&idx, &val))
            }
            SmtTerm::ConstArray(index, value) => {
                let domain = self.sort(index)?;
                let value = self.term(value)?;
                Dynamic::from_ast(&ast::Array::const_array(ctx, &domain, &value))
            }
            SmtTerm::Construct(dt, args) => {
                let z3_dt = self.datatype(dt)?;
                let mut values = Vec::with_capacity(args.len());
                for a in args {
                    values.push(self.term(a)?);
                }
                let refs: Vec<&dyn Ast<'ctx>> = values.iter().map(|v| v as &dyn Ast<'ctx>).collect();
                let variant = z3_dt
                    .variants
                    .first()
                    .ok_or_else(|| Z3Error::Internal(format!("datatype {} has no constructor", dt.name)))?;
                variant.constructor.apply(&refs)
            }
            SmtTerm::Field(dt, index, inner) => {
                let z3_dt = self.datatype(dt)?;
                let inner = self.term(inner)?;
                let accessor = z3_dt
                    .variants
                    .first()
                    .and_then(|v| v.accessors.get(*index))
                    .ok_or_else(|| Z3Error::Internal(format!("datatype {} has no field {index}", dt.name)))?;
                accessor.apply(&[&inner])
            }
            SmtTerm::ForAll(bindings, body) => {
                let mut scope = HashMap::new();
                let mut consts = Vec::with_capacity(bindings.len());
                for (name, sort) in bindings {
                    let c = self.constant(name, sort)?;
                    scope.insert(name.clone(), c.clone());
                    consts.push(c);
                }
                self.bound.push(scope);
                let body = self.term_bool(body);
                self.bound.pop();
                let body = body?;
                let refs: Vec<&dyn Ast<'ctx>> = consts.iter().map(|c| c as &dyn Ast<'ctx>).collect();
                Dynamic::from_ast(&ast::forall_const(ctx, &refs, &[], &body))
            }
        })
    }
}
