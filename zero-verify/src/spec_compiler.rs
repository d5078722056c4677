//! Extraction of in-body specification pseudo-calls into rely/guarantee contracts.
//!
//! A function body may open with `ensures(pre, post)`, `achieves_ok(pre, post)`,
//! `achieves_err(pre, post)` and `reverts_if(cond)` statements. They are removed
//! from the body and compiled into a [`CompiledSpec`], a plain record that can
//! be wrapped around the function's own paths or instantiated at call sites.

use std::collections::HashMap;

use zero_ast::builder::{bin, call, call_stmt, expr_stmt, havoc, ident};
use zero_ast::{
    BinaryOp, Block, Expr, ExprKind, Function, FunctionId, Span, Stmt, TypeName, VarDecl,
    VarDeclStmt,
};

use crate::error::VerifyError;
use crate::visitor::{map_expr, rename_expr};

/// Monotonic source of compiler temporaries (`tmp_0`, `tmp_1`, ...).
///
/// Owned by the verification context and only used before paths are
/// verified, so names are never reused across functions or call sites.
#[derive(Debug, Default)]
pub struct NameGen {
    next: u64,
}

impl NameGen {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fresh(&mut self) -> String {
        let n = self.next;
        self.next += 1;
        format!("tmp_{n}")
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClauseKind {
    Ensures,
    AchievesOk,
    AchievesErr,
}

impl ClauseKind {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "ensures" => Some(ClauseKind::Ensures),
            "achieves_ok" => Some(ClauseKind::AchievesOk),
            "achieves_err" => Some(ClauseKind::AchievesErr),
            _ => None,
        }
    }
}

/// One `(pre, post)` pair. `old_*` calls in both have been replaced by snapshot names.
#[derive(Clone, Debug, PartialEq)]
pub struct Clause {
    pub kind: ClauseKind,
    pub span: Span,
    pub pre_name: String,
    pub pre: Expr,
    pub post_name: String,
    pub post: Expr,
}

/// A location read through `old_uint` / `old_address`.
#[derive(Clone, Debug, PartialEq)]
pub struct OldSnapshot {
    pub name: String,
    pub ty: TypeName,
    /// The `old_*` call as written.
    pub call: Expr,
    /// Its argument, the location the callee may have changed.
    pub location: Expr,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RevertClause {
    pub name: String,
    pub cond: Expr,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct CompiledSpec {
    pub function: FunctionId,
    /// The body without specification statements.
    pub body: Option<Block>,
    pub params: Vec<VarDecl>,
    /// Declared returns; unnamed ones get a stable placeholder name.
    pub returns: Vec<VarDecl>,
    pub clauses: Vec<Clause>,
    pub snapshots: Vec<OldSnapshot>,
    pub reverts_if: Vec<RevertClause>,
    prologue: Vec<Stmt>,
    epilogue: Vec<Stmt>,
}

/// A forwarded path with the own-verification blocks around it.
#[derive(Clone, Copy, Debug)]
pub struct OwnPath<'a> {
    pub prologue: &'a [Stmt],
    pub body: &'a [Stmt],
    pub epilogue: &'a [Stmt],
}

/// Statements to run at a call site, and the names they bind.
#[derive(Clone, Debug, PartialEq)]
pub struct Instantiation {
    pub stmts: Vec<Stmt>,
    /// Fresh names holding the call's return values, in declaration order.
    pub returns: Vec<String>,
    /// Fresh boolean names holding the callee's `reverts_if` conditions.
    pub reverts: Vec<String>,
}

const SNAPSHOT_CALLS: [&str; 2] = ["old_uint", "old_address"];

fn snapshot_type(name: &str) -> Option<TypeName> {
    match name {
        "old_uint" => Some(TypeName::uint(256)),
        "old_address" => Some(TypeName::address()),
        _ => None,
    }
}

fn declare(name: &str, ty: TypeName, init: Expr, span: Span) -> Stmt {
    Stmt::VarDecl(VarDeclStmt {
        span,
        decls: vec![VarDecl {
            span,
            name: name.to_string(),
            ty,
        }],
        init: Some(init),
    })
}

/// Replace every `old_*` call in `expr` with a fresh snapshot name.
fn take_snapshots(expr: &Expr, names: &mut NameGen, out: &mut Vec<OldSnapshot>) -> Result<Expr, VerifyError> {
    let mut failure = None;
    let rewritten = map_expr(expr, &mut |e| {
        let callee = e.called_name()?;
        let ty = snapshot_type(callee)?;
        let [location] = e.call_args() else {
            failure = Some(VerifyError::unsupported(format!("`{callee}` with {} arguments", e.call_args().len()), e.span));
            return None;
        };
        let name = names.fresh();
        out.push(OldSnapshot {
            name: name.clone(),
            ty,
            call: e.clone(),
            location: location.clone(),
        });
        Some(Expr::new(
            e.span,
            ExprKind::Identifier { name, decl: None },
        ))
    });
    match failure {
        Some(err) => Err(err),
        None => Ok(rewritten),
    }
}

impl CompiledSpec {
    /// Compile `function`'s specification statements. A body without any is
    /// kept unchanged and compiles to the identity contract.
    pub fn compile(function: &Function, names: &mut NameGen) -> Result<Self, VerifyError> {
        let returns = function
            .returns
            .iter()
            .enumerate()
            .map(|(i, r)| VarDecl {
                span: r.span,
                name: if r.name.is_empty() {
                    format!("{}$ret{i}", function.name)
                } else {
                    r.name.clone()
                },
                ty: r.ty.clone(),
            })
            .collect();

        let mut spec = CompiledSpec {
            function: function.id,
            body: None,
            params: function.params.clone(),
            returns,
            clauses: Vec::new(),
            snapshots: Vec::new(),
            reverts_if: Vec::new(),
            prologue: Vec::new(),
            epilogue: Vec::new(),
        };

        let Some(body) = &function.body else {
            return Ok(spec);
        };

        let mut kept = Vec::with_capacity(body.stmts.len());
        for stmt in &body.stmts {
            let Stmt::Expr(s) = stmt else {
                kept.push(stmt.clone());
                continue;
            };
            let Some(callee) = s.expr.called_name() else {
                kept.push(stmt.clone());
                continue;
            };
            let args = s.expr.call_args();

            if let Some(kind) = ClauseKind::from_name(callee) {
                let [pre, post] = args else {
                    return Err(VerifyError::configuration(
                        &function.name,
                        s.span,
                        format!("`{callee}` takes a precondition and a postcondition"),
                    ));
                };
                let pre = take_snapshots(pre, names, &mut spec.snapshots)?;
                let post = take_snapshots(post, names, &mut spec.snapshots)?;
                spec.clauses.push(Clause {
                    kind,
                    span: s.span,
                    pre_name: names.fresh(),
                    pre,
                    post_name: names.fresh(),
                    post,
                });
            } else if callee == "reverts_if" {
                let [cond] = args else {
                    return Err(VerifyError::configuration(
                        &function.name,
                        s.span,
                        "`reverts_if` takes one condition",
                    ));
                };
                spec.reverts_if.push(RevertClause {
                    name: names.fresh(),
                    cond: cond.clone(),
                    span: s.span,
                });
            } else {
                kept.push(stmt.clone());
            }
        }

        spec.body = Some(Block::new(body.span, kept));
        spec.build_own_blocks();
        Ok(spec)
    }

    /// No specification statements were found.
    pub fn is_identity(&self) -> bool {
        self.clauses.is_empty() && self.reverts_if.is_empty()
    }

    fn build_own_blocks(&mut self) {
        let mut prologue = Vec::new();
        for snap in &self.snapshots {
            prologue.push(declare(&snap.name, snap.ty.clone(), snap.call.clone(), snap.call.span));
        }
        for c in &self.clauses {
            prologue.push(declare(&c.pre_name, TypeName::bool(), c.pre.clone(), c.span));
        }
        for r in &self.reverts_if {
            prologue.push(declare(&r.name, TypeName::bool(), r.cond.clone(), r.span));
        }

        let mut epilogue = Vec::new();
        for c in &self.clauses {
            epilogue.push(declare(&c.post_name, TypeName::bool(), c.post.clone(), c.span));
        }
        for c in &self.clauses {
            let (check, op) = match c.kind {
                ClauseKind::Ensures => ("assert", BinaryOp::Implies),
                ClauseKind::AchievesOk => ("ok", BinaryOp::And),
                ClauseKind::AchievesErr => ("err", BinaryOp::And),
            };
            let fact = bin(op, ident(&c.pre_name), ident(&c.post_name));
            let mut stmt = call_stmt(check, vec![fact]);
            if let Stmt::Expr(s) = &mut stmt {
                s.span = c.span;
                s.expr.span = c.span;
            }
            epilogue.push(stmt);
        }

        self.prologue = prologue;
        self.epilogue = epilogue;
    }

    /// Source-like rendering of a clause, `old_*` calls restored.
    pub fn describe(&self, clause: &Clause) -> String {
        let restore = |e: &Expr| {
            map_expr(e, &mut |sub| {
                let name = sub.as_identifier()?;
                self.snapshots
                    .iter()
                    .find(|s| s.name == name)
                    .map(|s| s.call.clone())
            })
        };
        let keyword = match clause.kind {
            ClauseKind::Ensures => "ensures",
            ClauseKind::AchievesOk => "achieves_ok",
            ClauseKind::AchievesErr => "achieves_err",
        };
        format!("{keyword}({}, {})", restore(&clause.pre), restore(&clause.post))
    }

    /// Statements run before every own-verification path.
    pub fn prologue(&self) -> &[Stmt] {
        &self.prologue
    }

    /// Statements run after every own-verification path.
    pub fn epilogue(&self) -> &[Stmt] {
        &self.epilogue
    }

    pub fn wrap<'a>(&'a self, body: &'a [Stmt]) -> OwnPath<'a> {
        OwnPath {
            prologue: &self.prologue,
            body,
            epilogue: &self.epilogue,
        }
    }

    /// Opaque-call use of the contract at one call site.
    ///
    /// Every name the template binds (parameters, returns, temporaries and the
    /// callee's own state when it is not visible to the caller) is renamed
    /// through `fresh`, so one path may call the same function repeatedly.
    pub fn instantiate(
        &self,
        args: &[Expr],
        foreign_state: &[&VarDecl],
        span: Span,
        fresh: &mut impl FnMut(&str) -> String,
    ) -> Result<Instantiation, VerifyError> {
        if args.len() != self.params.len() {
            return Err(VerifyError::unsupported(
                format!("call with {} arguments to a function taking {}", args.len(), self.params.len()),
                span,
            ));
        }

        let mut map: HashMap<String, String> = HashMap::new();
        for v in foreign_state {
            map.insert(v.name.clone(), fresh(&v.name));
        }
        for p in &self.params {
            map.insert(p.name.clone(), fresh(&p.name));
        }
        for r in &self.returns {
            map.insert(r.name.clone(), fresh(&r.name));
        }
        for s in &self.snapshots {
            map.insert(s.name.clone(), fresh(&s.name));
        }
        for c in &self.clauses {
            map.insert(c.pre_name.clone(), fresh(&c.pre_name));
            map.insert(c.post_name.clone(), fresh(&c.post_name));
        }
        for r in &self.reverts_if {
            map.insert(r.name.clone(), fresh(&r.name));
        }
        let to = |name: &str| map.get(name).cloned().unwrap_or_else(|| name.to_string());

        let mut stmts = Vec::new();
        for v in foreign_state {
            stmts.push(declare(&to(&v.name), v.ty.clone(), havoc(v.ty.clone()), span));
        }
        for (p, arg) in self.params.iter().zip(args) {
            stmts.push(declare(&to(&p.name), p.ty.clone(), arg.clone(), arg.span));
        }
        for s in &self.snapshots {
            stmts.push(declare(&to(&s.name), s.ty.clone(), rename_expr(&s.location, &map), span));
        }
        let ensures: Vec<&Clause> = self
            .clauses
            .iter()
            .filter(|c| c.kind == ClauseKind::Ensures)
            .collect();
        for c in &ensures {
            stmts.push(declare(&to(&c.pre_name), TypeName::bool(), rename_expr(&c.pre, &map), span));
        }
        for r in &self.reverts_if {
            stmts.push(declare(&to(&r.name), TypeName::bool(), rename_expr(&r.cond, &map), span));
        }
        for r in &self.returns {
            stmts.push(declare(&to(&r.name), r.ty.clone(), havoc(r.ty.clone()), span));
        }
        // mid: whatever `old_*` looked at may have been changed by the callee
        for s in &self.snapshots {
            let location = rename_expr(&s.location, &map);
            stmts.push(expr_stmt(zero_ast::builder::assign(location, havoc(s.ty.clone()))));
        }
        for c in &ensures {
            stmts.push(declare(&to(&c.post_name), TypeName::bool(), rename_expr(&c.post, &map), span));
            stmts.push(expr_stmt(call(
                "assume",
                vec![bin(BinaryOp::Implies, ident(&to(&c.pre_name)), ident(&to(&c.post_name)))],
            )));
        }

        Ok(Instantiation {
            stmts,
            returns: self.returns.iter().map(|r| to(&r.name)).collect(),
            reverts: self.reverts_if.iter().map(|r| to(&r.name)).collect(),
        })
    }
}

/// Names of pseudo-calls consumed by the compiler; they never reach the evaluator.
pub fn is_specification_call(name: &str) -> bool {
    ClauseKind::from_name(name).is_some() || name == "reverts_if"
}

/// Names of pseudo-calls reading the entry checkpoint.
pub fn is_snapshot_call(name: &str) -> bool {
    SNAPSHOT_CALLS.contains(&name)
}
