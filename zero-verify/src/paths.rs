//! Straight-line path enumeration.
//!
//! Loops are first compiled away (bounded unrolling or one pass under a user
//! invariant). The remaining tree has k `if` statements; every k-bit mask picks
//! a branch at each `if` met in depth-first order, so exactly 2^k candidates
//! are produced. A path stops at `return` and is discarded at `revert()`.

use tracing::{debug, warn};
use zero_ast::builder::not;
use zero_ast::{BinaryOp, Block, Expr, ExprKind, ForStmt, Stmt, VarDeclStmt, WhileStmt};

use crate::config::{LoopMode, VerifyOptions};
use crate::error::VerifyError;

#[derive(Clone, Debug, PartialEq)]
pub struct Path {
    pub stmts: Vec<Stmt>,
}

#[derive(Clone, Debug, Default)]
pub struct PathSet {
    pub candidates: usize,
    pub discarded: usize,
    pub paths: Vec<Path>,
}

pub struct PathGenerator<'a> {
    options: &'a VerifyOptions,
    function: &'a str,
}

impl<'a> PathGenerator<'a> {
    pub fn new(options: &'a VerifyOptions, function: &'a str) -> Self {
        Self { options, function }
    }

    pub fn generate(&self, body: &Block) -> Result<PathSet, VerifyError> {
        let mut tree = Vec::with_capacity(body.stmts.len());
        for s in &body.stmts {
            tree.push(self.compile_loops(s)?);
        }

        let k = tree.iter().map(count_ifs).sum::<usize>();
        if k > self.options.max_branches as usize || k >= 64 {
            return Err(VerifyError::configuration(
                self.function,
                body.span,
                format!(
                    "{k} branches exceed the limit of {} (2^{k} paths)",
                    self.options.max_branches
                ),
            ));
        }

        let mut set = PathSet::default();
        for mask in 0..(1u64 << k) {
            let mut walk = Walk {
                mask,
                next_bit: 0,
                out: Vec::new(),
                end: End::Open,
            };
            walk.stmts(&tree);
            set.candidates += 1;
            if walk.end == End::Reverted {
                set.discarded += 1;
                continue;
            }
            set.paths.push(Path { stmts: walk.out });
        }
        debug!(
            function = self.function,
            branches = k,
            candidates = set.candidates,
            discarded = set.discarded,
            "paths generated"
        );
        Ok(set)
    }

    fn compile_loops(&self, stmt: &Stmt) -> Result<Stmt, VerifyError> {
        Ok(match stmt {
            Stmt::Block(b) => Stmt::Block(self.compile_block(b)?),
            Stmt::If(s) => {
                let mut s = s.clone();
                s.then_branch = Box::new(self.compile_loops(&s.then_branch)?);
                if let Some(e) = &s.else_branch {
                    s.else_branch = Some(Box::new(self.compile_loops(e)?));
                }
                Stmt::If(s)
            }
            Stmt::For(f) => self.compile_for(f)?,
            Stmt::While(w) => self.compile_while(w)?,
            other => other.clone(),
        })
    }

    fn compile_block(&self, b: &Block) -> Result<Block, VerifyError> {
        let mut stmts = Vec::with_capacity(b.stmts.len());
        for s in &b.stmts {
            stmts.push(self.compile_loops(s)?);
        }
        Ok(Block::new(b.span, stmts))
    }

    fn compile_for(&self, f: &ForStmt) -> Result<Stmt, VerifyError> {
        let body = self.compile_loops(&f.body)?;
        let step = f.step.clone().map(zero_ast::builder::expr_stmt);
        let mut out = Vec::new();
        match self.options.loop_mode {
            LoopMode::Unroll => {
                if let Some(init) = &f.init {
                    out.push(self.compile_loops(init)?);
                }
                let n = self.unroll_count(f.cond.as_ref());
                for _ in 0..n {
                    if let Some(c) = &f.cond {
                        out.push(Stmt::Guard(c.clone()));
                    }
                    out.push(body.clone());
                    out.extend(step.clone());
                }
            }
            LoopMode::Invariant => {
                self.require_leading_invariant(&body, f.span)?;
                if let Some(init) = &f.init {
                    out.push(havoc_initializer(init));
                }
                if let Some(c) = &f.cond {
                    out.push(Stmt::Guard(c.clone()));
                }
                out.push(body);
                out.extend(step);
            }
        }
        if let Some(c) = &f.cond {
            out.push(Stmt::Guard(not(c.clone())));
        }
        Ok(Stmt::Block(Block::new(f.span, out)))
    }

    fn compile_while(&self, w: &WhileStmt) -> Result<Stmt, VerifyError> {
        self.compile_for(&ForStmt {
            span: w.span,
            init: None,
            cond: Some(w.cond.clone()),
            step: None,
            body: w.body.clone(),
        })
    }

    /// Iterations implied by a literal upper bound (`i < 3` and `i != 3` unroll
    /// 3 times, `i <= 3` unrolls 4 times), else the configured default, capped
    /// by `max_unroll`. Other comparisons give no count.
    fn unroll_count(&self, cond: Option<&Expr>) -> u32 {
        let literal = cond.and_then(|c| match &c.kind {
            ExprKind::Binary { op, rhs, .. } => {
                let n = rhs.as_number().and_then(|n| u32::try_from(n).ok())?;
                match op {
                    BinaryOp::Lt | BinaryOp::Ne => Some(n),
                    BinaryOp::Le => n.checked_add(1),
                    _ => None,
                }
            }
            _ => None,
        });
        let n = literal.unwrap_or(self.options.default_unroll);
        if n > self.options.max_unroll {
            warn!(
                function = self.function,
                requested = n,
                cap = self.options.max_unroll,
                "loop unrolling capped"
            );
            return self.options.max_unroll;
        }
        n
    }

    fn require_leading_invariant(&self, body: &Stmt, span: zero_ast::Span) -> Result<(), VerifyError> {
        let first = match body {
            Stmt::Block(b) => b.stmts.first(),
            other => Some(other),
        };
        if first.and_then(Stmt::called_name) == Some("assume") {
            return Ok(());
        }
        Err(VerifyError::configuration(
            self.function,
            span,
            "invariant-mode loop body must start with `assume(<invariant>)`",
        ))
    }
}

/// The loop variable starts from an arbitrary value of its type.
fn havoc_initializer(init: &Stmt) -> Stmt {
    match init {
        Stmt::VarDecl(d) if d.decls.len() == 1 => Stmt::VarDecl(VarDeclStmt {
            span: d.span,
            decls: d.decls.clone(),
            init: Some(zero_ast::builder::havoc(d.decls[0].ty.clone())),
        }),
        other => other.clone(),
    }
}

fn count_ifs(stmt: &Stmt) -> usize {
    match stmt {
        Stmt::Block(b) => b.stmts.iter().map(count_ifs).sum(),
        Stmt::If(s) => 1 + count_ifs(&s.then_branch) + s.else_branch.as_deref().map_or(0, count_ifs),
        _ => 0,
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum End {
    Open,
    Returned,
    Reverted,
}

struct Walk {
    mask: u64,
    next_bit: u32,
    out: Vec<Stmt>,
    end: End,
}

impl Walk {
    fn stmts(&mut self, stmts: &[Stmt]) {
        for s in stmts {
            if self.end != End::Open {
                return;
            }
            self.stmt(s);
        }
    }

    fn stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Block(b) => self.stmts(&b.stmts),
            Stmt::If(s) => {
                let taken = (self.mask >> self.next_bit) & 1 == 1;
                self.next_bit += 1;
                if taken {
                    self.out.push(Stmt::Guard(s.cond.clone()));
                    self.stmt(&s.then_branch);
                } else {
                    self.out.push(Stmt::Guard(not(s.cond.clone())));
                    if let Some(e) = &s.else_branch {
                        self.stmt(e);
                    }
                }
            }
            Stmt::Return(_) => {
                self.out.push(stmt.clone());
                self.end = End::Returned;
            }
            other => {
                self.out.push(other.clone());
                if other.called_name() == Some("revert") {
                    self.end = End::Reverted;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zero_ast::builder::{
        block, call_stmt, expr_stmt, for_loop, gt, ident, if_else, if_then, incr, le, lt, num, ret,
        var_decl, while_loop,
    };
    use zero_ast::TypeName;

    fn opts() -> VerifyOptions {
        VerifyOptions::default()
    }

    fn generate(options: &VerifyOptions, stmts: Vec<Stmt>) -> Result<PathSet, VerifyError> {
        PathGenerator::new(options, "f").generate(&block(stmts))
    }

    #[test]
    fn nested_ifs_count_towards_k() {
        let body = vec![if_else(
            gt(ident("x"), num(0)),
            if_then(gt(ident("y"), num(0)), call_stmt("f", vec![])),
            call_stmt("g", vec![]),
        )];
        let set = generate(&opts(), body).expect("paths");
        assert_eq!(set.candidates, 4);
        assert_eq!(set.paths.len(), 4);
    }

    #[test]
    fn revert_paths_are_discarded() {
        let body = vec![
            if_then(gt(ident("x"), num(10)), call_stmt("revert", vec![])),
            call_stmt("assert", vec![ident("ok")]),
        ];
        let set = generate(&opts(), body).expect("paths");
        assert_eq!(set.candidates, 2);
        assert_eq!(set.discarded, 1);
        assert_eq!(set.paths.len(), 1);
        assert!(set.paths[0].stmts.iter().all(|s| s.called_name() != Some("revert")));
    }

    #[test]
    fn return_cuts_the_rest_of_the_path() {
        let body = vec![
            if_then(gt(ident("x"), num(0)), ret(Some(num(1)))),
            ret(Some(num(2))),
            call_stmt("unreachable", vec![]),
        ];
        let set = generate(&opts(), body).expect("paths");
        assert_eq!(set.paths.len(), 2);
        for p in &set.paths {
            assert!(matches!(p.stmts.last(), Some(Stmt::Return(_))));
            assert!(p.stmts.iter().all(|s| s.called_name() != Some("unreachable")));
        }
    }

    #[test]
    fn literal_bound_drives_unrolling() {
        let body = vec![for_loop(
            Some(var_decl("i", TypeName::uint(256), Some(num(0)))),
            Some(lt(ident("i"), num(3))),
            Some(incr(ident("i"))),
            block_body(),
        )];
        let set = generate(&opts(), body).expect("paths");
        let p = &set.paths[0];
        let guards = p.stmts.iter().filter(|s| matches!(s, Stmt::Guard(_))).count();
        // three entry guards and the exit guard
        assert_eq!(guards, 4);
        assert!(matches!(p.stmts.last(), Some(Stmt::Guard(_))));
    }

    #[test]
    fn inclusive_bound_runs_one_more_iteration() {
        let entries = |cond: Expr| {
            let body = vec![for_loop(
                Some(var_decl("i", TypeName::uint(256), Some(num(0)))),
                Some(cond),
                Some(incr(ident("i"))),
                block_body(),
            )];
            let set = generate(&opts(), body).expect("paths");
            set.paths[0]
                .stmts
                .iter()
                .filter(|s| s.called_name() == Some("touch"))
                .count()
        };
        assert_eq!(entries(lt(ident("i"), num(3))), 3);
        assert_eq!(entries(le(ident("i"), num(3))), 4);
        // a lower bound says nothing about the trip count
        assert_eq!(entries(gt(ident("i"), num(0))), opts().default_unroll as usize);
    }

    #[test]
    fn unrolling_is_capped() {
        let mut options = opts();
        options.max_unroll = 2;
        let body = vec![while_loop(lt(ident("i"), num(100)), block_body())];
        let set = generate(&options, body).expect("paths");
        let bodies = set.paths[0]
            .stmts
            .iter()
            .filter(|s| s.called_name() == Some("touch"))
            .count();
        assert_eq!(bodies, 2);
    }

    #[test]
    fn invariant_mode_requires_leading_assumption() {
        let mut options = opts();
        options.loop_mode = LoopMode::Invariant;
        let body = vec![while_loop(lt(ident("i"), ident("n")), block_body())];
        let err = generate(&options, body).expect_err("missing invariant");
        assert!(matches!(err, VerifyError::Configuration { .. }));

        let body = vec![for_loop(
            Some(var_decl("i", TypeName::uint(256), Some(num(0)))),
            Some(lt(ident("i"), ident("n"))),
            Some(incr(ident("i"))),
            zero_ast::builder::block_stmt(vec![
                call_stmt("assume", vec![zero_ast::builder::le(ident("i"), ident("n"))]),
                call_stmt("touch", vec![]),
            ]),
        )];
        let set = generate(&options, body).expect("paths");
        let p = &set.paths[0];
        let Stmt::VarDecl(init) = &p.stmts[0] else {
            panic!("expected loop variable declaration");
        };
        assert!(matches!(init.init.as_ref().map(|e| &e.kind), Some(ExprKind::Havoc(_))));
        let touches = p.stmts.iter().filter(|s| s.called_name() == Some("touch")).count();
        assert_eq!(touches, 1);
    }

    #[test]
    fn too_many_branches_is_a_configuration_error() {
        let mut options = opts();
        options.max_branches = 2;
        let body = (0..3)
            .map(|i| if_then(gt(ident("x"), num(i)), expr_stmt(ident("x"))))
            .collect();
        let err = generate(&options, body).expect_err("limit");
        assert!(matches!(err, VerifyError::Configuration { .. }));
    }

    fn block_body() -> Stmt {
        zero_ast::builder::block_stmt(vec![call_stmt("touch", vec![])])
    }
}
