#![forbid(unsafe_code)]

//! Terse constructors for typed programs.
//!
//! Front-ends that already resolved a contract AST use these to assemble a
//! [`Program`]; tests use them in place of a parser.

use num::BigInt;

use crate::{
    AssignOp, BinaryOp, Block, Contract, ContractId, ContractKind, EmitStmt, Expr, ExprKind,
    ExprStmt, ForStmt, Function, FunctionId, IfStmt, Literal, Program, ReturnStmt, Span, Stmt,
    StructId, TypeArena, TypeName, UnaryOp, VarDecl, VarDeclStmt, Visibility, WhileStmt, span,
};

fn sp() -> Span {
    span(0, 0)
}

fn decl(name: &str, ty: TypeName) -> VarDecl {
    VarDecl {
        span: sp(),
        name: name.to_string(),
        ty,
    }
}

#[derive(Debug, Default)]
pub struct ProgramBuilder {
    types: TypeArena,
    contracts: Vec<Contract>,
    functions: Vec<Function>,
}

impl ProgramBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// `bases` is the linearized ancestor list, most-derived first.
    pub fn contract(&mut self, name: &str, kind: ContractKind, bases: &[ContractId]) -> ContractId {
        let id = ContractId(self.contracts.len() as u32);
        self.contracts.push(Contract {
            id,
            span: sp(),
            name: name.to_string(),
            kind,
            bases: bases.to_vec(),
            state_vars: Vec::new(),
            structs: Vec::new(),
            functions: Vec::new(),
        });
        id
    }

    pub fn state_var(&mut self, contract: ContractId, name: &str, ty: TypeName) {
        if let Some(c) = self.contracts.get_mut(contract.0 as usize) {
            c.state_vars.push(decl(name, ty));
        }
    }

    /// Reserve a struct id so members may refer to it before it is defined.
    pub fn reserve_struct(&mut self, contract: ContractId, name: &str) -> StructId {
        let id = self.types.reserve(name);
        if let Some(c) = self.contracts.get_mut(contract.0 as usize) {
            c.structs.push(id);
        }
        id
    }

    pub fn define_struct(&mut self, id: StructId, members: &[(&str, TypeName)]) {
        let members = members.iter().map(|(n, t)| decl(n, t.clone())).collect();
        self.types.define(id, members);
    }

    pub fn struct_def(&mut self, contract: ContractId, name: &str, members: &[(&str, TypeName)]) -> StructId {
        let id = self.reserve_struct(contract, name);
        self.define_struct(id, members);
        id
    }

    pub fn function(
        &mut self,
        contract: ContractId,
        name: &str,
        params: &[(&str, TypeName)],
        returns: &[(&str, TypeName)],
        body: Option<Block>,
    ) -> FunctionId {
        let id = FunctionId(self.functions.len() as u32);
        self.functions.push(Function {
            id,
            contract,
            span: sp(),
            name: name.to_string(),
            visibility: Visibility::Public,
            params: params.iter().map(|(n, t)| decl(n, t.clone())).collect(),
            returns: returns.iter().map(|(n, t)| decl(n, t.clone())).collect(),
            body,
        });
        if let Some(c) = self.contracts.get_mut(contract.0 as usize) {
            c.functions.push(id);
        }
        id
    }

    /// Id the next call to [`ProgramBuilder::function`] will return.
    pub fn next_function_id(&self) -> FunctionId {
        FunctionId(self.functions.len() as u32)
    }

    pub fn finish(self) -> Program {
        Program {
            types: self.types,
            contracts: self.contracts,
            functions: self.functions,
        }
    }
}

// ---- expressions ----

pub fn expr(kind: ExprKind) -> Expr {
    Expr::new(sp(), kind)
}

pub fn ident(name: &str) -> Expr {
    expr(ExprKind::Identifier {
        name: name.to_string(),
        decl: None,
    })
}

/// An identifier the front-end resolved to a function declaration.
pub fn fn_ref(name: &str, id: FunctionId) -> Expr {
    expr(ExprKind::Identifier {
        name: name.to_string(),
        decl: Some(id),
    })
}

pub fn num(n: i64) -> Expr {
    expr(ExprKind::Literal(Literal::Number(BigInt::from(n))))
}

pub fn big(n: BigInt) -> Expr {
    expr(ExprKind::Literal(Literal::Number(n)))
}

pub fn boolean(b: bool) -> Expr {
    expr(ExprKind::Literal(Literal::Bool(b)))
}

pub fn string(s: &str) -> Expr {
    expr(ExprKind::Literal(Literal::String(s.to_string())))
}

pub fn bin(op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
    expr(ExprKind::Binary {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
    })
}

pub fn add(lhs: Expr, rhs: Expr) -> Expr {
    bin(BinaryOp::Add, lhs, rhs)
}

pub fn sub(lhs: Expr, rhs: Expr) -> Expr {
    bin(BinaryOp::Sub, lhs, rhs)
}

pub fn mul(lhs: Expr, rhs: Expr) -> Expr {
    bin(BinaryOp::Mul, lhs, rhs)
}

pub fn div(lhs: Expr, rhs: Expr) -> Expr {
    bin(BinaryOp::Div, lhs, rhs)
}

pub fn eq(lhs: Expr, rhs: Expr) -> Expr {
    bin(BinaryOp::Eq, lhs, rhs)
}

pub fn ne(lhs: Expr, rhs: Expr) -> Expr {
    bin(BinaryOp::Ne, lhs, rhs)
}

pub fn lt(lhs: Expr, rhs: Expr) -> Expr {
    bin(BinaryOp::Lt, lhs, rhs)
}

pub fn le(lhs: Expr, rhs: Expr) -> Expr {
    bin(BinaryOp::Le, lhs, rhs)
}

pub fn gt(lhs: Expr, rhs: Expr) -> Expr {
    bin(BinaryOp::Gt, lhs, rhs)
}

pub fn ge(lhs: Expr, rhs: Expr) -> Expr {
    bin(BinaryOp::Ge, lhs, rhs)
}

pub fn and(lhs: Expr, rhs: Expr) -> Expr {
    bin(BinaryOp::And, lhs, rhs)
}

pub fn implies(lhs: Expr, rhs: Expr) -> Expr {
    bin(BinaryOp::Implies, lhs, rhs)
}

pub fn unary(op: UnaryOp, prefix: bool, operand: Expr) -> Expr {
    expr(ExprKind::Unary {
        op,
        prefix,
        operand: Box::new(operand),
    })
}

pub fn not(operand: Expr) -> Expr {
    unary(UnaryOp::Not, true, operand)
}

pub fn neg(operand: Expr) -> Expr {
    unary(UnaryOp::Neg, true, operand)
}

/// Postfix `e++`.
pub fn incr(operand: Expr) -> Expr {
    unary(UnaryOp::Inc, false, operand)
}

pub fn assign(lhs: Expr, rhs: Expr) -> Expr {
    expr(ExprKind::Assignment {
        op: AssignOp(None),
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
    })
}

pub fn assign_op(op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
    expr(ExprKind::Assignment {
        op: AssignOp(Some(op)),
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
    })
}

pub fn tuple(items: Vec<Expr>) -> Expr {
    expr(ExprKind::Tuple(items))
}

pub fn call_expr(callee: Expr, args: Vec<Expr>) -> Expr {
    expr(ExprKind::Call {
        callee: Box::new(callee),
        args,
    })
}

/// Call of a free name such as `require`, `assert` or `ensures`.
pub fn call(name: &str, args: Vec<Expr>) -> Expr {
    call_expr(ident(name), args)
}

pub fn convert(ty: TypeName, arg: Expr) -> Expr {
    expr(ExprKind::TypeConversion {
        ty,
        arg: Box::new(arg),
    })
}

pub fn index(base: Expr, idx: Expr) -> Expr {
    expr(ExprKind::IndexAccess {
        base: Box::new(base),
        index: Box::new(idx),
    })
}

pub fn member(base: Expr, name: &str) -> Expr {
    expr(ExprKind::MemberAccess {
        base: Box::new(base),
        member: name.to_string(),
        decl: None,
    })
}

pub fn conditional(cond: Expr, then_expr: Expr, else_expr: Expr) -> Expr {
    expr(ExprKind::Conditional {
        cond: Box::new(cond),
        then_expr: Box::new(then_expr),
        else_expr: Box::new(else_expr),
    })
}

pub fn havoc(ty: TypeName) -> Expr {
    expr(ExprKind::Havoc(ty))
}

// ---- statements ----

pub fn block(stmts: Vec<Stmt>) -> Block {
    Block::new(sp(), stmts)
}

pub fn block_stmt(stmts: Vec<Stmt>) -> Stmt {
    Stmt::Block(block(stmts))
}

pub fn expr_stmt(e: Expr) -> Stmt {
    Stmt::Expr(ExprStmt { span: e.span, expr: e })
}

/// `name(args);` as a statement.
pub fn call_stmt(name: &str, args: Vec<Expr>) -> Stmt {
    expr_stmt(call(name, args))
}

pub fn var_decl(name: &str, ty: TypeName, init: Option<Expr>) -> Stmt {
    var_decls(&[(name, ty)], init)
}

pub fn var_decls(decls: &[(&str, TypeName)], init: Option<Expr>) -> Stmt {
    Stmt::VarDecl(VarDeclStmt {
        span: sp(),
        decls: decls.iter().map(|(n, t)| decl(n, t.clone())).collect(),
        init,
    })
}

pub fn if_then(cond: Expr, then_branch: Stmt) -> Stmt {
    Stmt::If(IfStmt {
        span: sp(),
        cond,
        then_branch: Box::new(then_branch),
        else_branch: None,
    })
}

pub fn if_else(cond: Expr, then_branch: Stmt, else_branch: Stmt) -> Stmt {
    Stmt::If(IfStmt {
        span: sp(),
        cond,
        then_branch: Box::new(then_branch),
        else_branch: Some(Box::new(else_branch)),
    })
}

pub fn for_loop(init: Option<Stmt>, cond: Option<Expr>, step: Option<Expr>, body: Stmt) -> Stmt {
    Stmt::For(ForStmt {
        span: sp(),
        init: init.map(Box::new),
        cond,
        step,
        body: Box::new(body),
    })
}

pub fn while_loop(cond: Expr, body: Stmt) -> Stmt {
    Stmt::While(WhileStmt {
        span: sp(),
        cond,
        body: Box::new(body),
    })
}

pub fn ret(e: Option<Expr>) -> Stmt {
    Stmt::Return(ReturnStmt { span: sp(), expr: e })
}

pub fn emit(event: Expr) -> Stmt {
    Stmt::Emit(EmitStmt { span: sp(), event })
}
