//! Structural rewriting of statement and expression trees.

use std::collections::HashMap;

use zero_ast::{
    Block, EmitStmt, Expr, ExprKind, ExprStmt, ForStmt, IfStmt, ReturnStmt, Stmt, VarDeclStmt,
    WhileStmt,
};

/// Rebuild `expr`, letting `f` replace any subtree. When `f` returns `Some`,
/// the replacement is used as is and its children are not visited.
pub fn map_expr(expr: &Expr, f: &mut impl FnMut(&Expr) -> Option<Expr>) -> Expr {
    if let Some(replaced) = f(expr) {
        return replaced;
    }
    let mut go = |e: &Expr| Box::new(map_expr(e, &mut *f));
    let kind = match &expr.kind {
        ExprKind::Identifier { .. } | ExprKind::Literal(_) | ExprKind::Havoc(_) | ExprKind::Unit => {
            expr.kind.clone()
        }
        ExprKind::Binary { op, lhs, rhs } => ExprKind::Binary {
            op: *op,
            lhs: go(lhs),
            rhs: go(rhs),
        },
        ExprKind::Unary { op, prefix, operand } => ExprKind::Unary {
            op: *op,
            prefix: *prefix,
            operand: go(operand),
        },
        ExprKind::Assignment { op, lhs, rhs } => ExprKind::Assignment {
            op: *op,
            lhs: go(lhs),
            rhs: go(rhs),
        },
        ExprKind::Tuple(items) => ExprKind::Tuple(items.iter().map(|e| *go(e)).collect()),
        ExprKind::Call { callee, args } => ExprKind::Call {
            callee: go(callee),
            args: args.iter().map(|e| *go(e)).collect(),
        },
        ExprKind::TypeConversion { ty, arg } => ExprKind::TypeConversion {
            ty: ty.clone(),
            arg: go(arg),
        },
        ExprKind::IndexAccess { base, index } => ExprKind::IndexAccess {
            base: go(base),
            index: go(index),
        },
        ExprKind::MemberAccess { base, member, decl } => ExprKind::MemberAccess {
            base: go(base),
            member: member.clone(),
            decl: *decl,
        },
        ExprKind::Conditional {
            cond,
            then_expr,
            else_expr,
        } => ExprKind::Conditional {
            cond: go(cond),
            then_expr: go(then_expr),
            else_expr: go(else_expr),
        },
    };
    Expr::new(expr.span, kind)
}

/// Apply `f` to every expression directly held by `stmt`, recursing into nested statements.
pub fn map_stmt_exprs(stmt: &Stmt, f: &mut impl FnMut(&Expr) -> Expr) -> Stmt {
    match stmt {
        Stmt::Block(b) => Stmt::Block(map_block_exprs(b, &mut *f)),
        Stmt::Expr(s) => Stmt::Expr(ExprStmt {
            span: s.span,
            expr: f(&s.expr),
        }),
        Stmt::VarDecl(s) => Stmt::VarDecl(VarDeclStmt {
            span: s.span,
            decls: s.decls.clone(),
            init: s.init.as_ref().map(|e| f(e)),
        }),
        Stmt::If(s) => Stmt::If(IfStmt {
            span: s.span,
            cond: f(&s.cond),
            then_branch: Box::new(map_stmt_exprs(&s.then_branch, &mut *f)),
            else_branch: s.else_branch.as_ref().map(|e| Box::new(map_stmt_exprs(e, &mut *f))),
        }),
        Stmt::For(s) => Stmt::For(ForStmt {
            span: s.span,
            init: s.init.as_ref().map(|i| Box::new(map_stmt_exprs(i, &mut *f))),
            cond: s.cond.as_ref().map(|e| f(e)),
            step: s.step.as_ref().map(|e| f(e)),
            body: Box::new(map_stmt_exprs(&s.body, &mut *f)),
        }),
        Stmt::While(s) => Stmt::While(WhileStmt {
            span: s.span,
            cond: f(&s.cond),
            body: Box::new(map_stmt_exprs(&s.body, &mut *f)),
        }),
        Stmt::Return(s) => Stmt::Return(ReturnStmt {
            span: s.span,
            expr: s.expr.as_ref().map(|e| f(e)),
        }),
        Stmt::Emit(s) => Stmt::Emit(EmitStmt {
            span: s.span,
            event: f(&s.event),
        }),
        Stmt::Guard(e) => Stmt::Guard(f(e)),
    }
}

pub fn map_block_exprs(block: &Block, f: &mut impl FnMut(&Expr) -> Expr) -> Block {
    Block::new(block.span, block.stmts.iter().map(|s| map_stmt_exprs(s, &mut *f)).collect())
}

/// Rename free identifiers. Member names and function references are left alone.
pub fn rename_expr(expr: &Expr, names: &HashMap<String, String>) -> Expr {
    map_expr(expr, &mut |e| match &e.kind {
        ExprKind::Identifier { name, decl: None } => names.get(name).map(|to| {
            Expr::new(
                e.span,
                ExprKind::Identifier {
                    name: to.clone(),
                    decl: None,
                },
            )
        }),
        _ => None,
    })
}

/// Rename declared names as well as their uses.
pub fn rename_stmt(stmt: &Stmt, names: &HashMap<String, String>) -> Stmt {
    let renamed = map_stmt_exprs(stmt, &mut |e| rename_expr(e, names));
    match renamed {
        Stmt::VarDecl(mut s) => {
            for d in &mut s.decls {
                if let Some(to) = names.get(&d.name) {
                    d.name = to.clone();
                }
            }
            Stmt::VarDecl(s)
        }
        other => other,
    }
}

/// Does `expr` contain a call to any of `names`?
pub fn calls_any(expr: &Expr, names: &[&str]) -> bool {
    let mut found = false;
    map_expr(expr, &mut |e| {
        if e.called_name().is_some_and(|n| names.contains(&n)) {
            found = true;
        }
        None
    });
    found
}
