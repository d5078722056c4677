#![forbid(unsafe_code)]

//! Typed, already-resolved contract programs.
//!
//! This is the tree the verifier consumes: every type name is resolved,
//! struct and contract references go through ids, and each contract carries its
//! linearized base list. Nothing here is mutated after construction.

use miette::SourceSpan;
use num::BigInt;

pub mod builder;
mod display;
pub mod lookup;
mod types;

pub use lookup::ProgramIndex;
pub use types::{ElementaryType, StructDef, StructId, TypeArena, TypeName, UserType};

pub type Span = SourceSpan;

pub fn span(start: usize, len: usize) -> Span {
    SourceSpan::new(start.into(), len)
}

pub fn span_between(start: usize, end: usize) -> Span {
    debug_assert!(end >= start);
    span(start, end - start)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContractId(pub u32);

/// Program-wide identity of a function declaration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FunctionId(pub u32);

#[derive(Clone, Debug, PartialEq)]
pub struct Program {
    pub types: TypeArena,
    pub contracts: Vec<Contract>,
    pub functions: Vec<Function>,
}

impl Program {
    pub fn contract(&self, id: ContractId) -> Option<&Contract> {
        self.contracts.get(id.0 as usize)
    }

    pub fn function(&self, id: FunctionId) -> Option<&Function> {
        self.functions.get(id.0 as usize)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContractKind {
    Contract,
    Interface,
    Library,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Contract {
    pub id: ContractId,
    pub span: Span,
    pub name: String,
    pub kind: ContractKind,
    /// Linearized ancestors, most-derived first, not including the contract itself.
    pub bases: Vec<ContractId>,
    pub state_vars: Vec<VarDecl>,
    pub structs: Vec<StructId>,
    pub functions: Vec<FunctionId>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Visibility {
    Public,
    External,
    Internal,
    Private,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Function {
    pub id: FunctionId,
    pub contract: ContractId,
    pub span: Span,
    pub name: String,
    pub visibility: Visibility,
    pub params: Vec<VarDecl>,
    pub returns: Vec<VarDecl>,
    /// `None` for abstract and interface functions.
    pub body: Option<Block>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct VarDecl {
    pub span: Span,
    pub name: String,
    pub ty: TypeName,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Block {
    pub span: Span,
    pub stmts: Vec<Stmt>,
}

impl Block {
    pub fn new(span: Span, stmts: Vec<Stmt>) -> Self {
        Self { span, stmts }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Stmt {
    Block(Block),
    Expr(ExprStmt),
    VarDecl(VarDeclStmt),
    If(IfStmt),
    For(ForStmt),
    While(WhileStmt),
    Return(ReturnStmt),
    Emit(EmitStmt),
    /// A bare boolean fact on the current path (branch and loop guards).
    Guard(Expr),
}

impl Stmt {
    pub fn span(&self) -> Span {
        match self {
            Stmt::Block(b) => b.span,
            Stmt::Expr(s) => s.span,
            Stmt::VarDecl(s) => s.span,
            Stmt::If(s) => s.span,
            Stmt::For(s) => s.span,
            Stmt::While(s) => s.span,
            Stmt::Return(s) => s.span,
            Stmt::Emit(s) => s.span,
            Stmt::Guard(e) => e.span,
        }
    }

    /// Name of the free function this statement calls, if it is a bare call statement.
    pub fn called_name(&self) -> Option<&str> {
        match self {
            Stmt::Expr(s) => s.expr.called_name(),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ExprStmt {
    pub span: Span,
    pub expr: Expr,
}

#[derive(Clone, Debug, PartialEq)]
pub struct VarDeclStmt {
    pub span: Span,
    pub decls: Vec<VarDecl>,
    pub init: Option<Expr>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct IfStmt {
    pub span: Span,
    pub cond: Expr,
    pub then_branch: Box<Stmt>,
    pub else_branch: Option<Box<Stmt>>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ForStmt {
    pub span: Span,
    pub init: Option<Box<Stmt>>,
    pub cond: Option<Expr>,
    pub step: Option<Expr>,
    pub body: Box<Stmt>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct WhileStmt {
    pub span: Span,
    pub cond: Expr,
    pub body: Box<Stmt>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ReturnStmt {
    pub span: Span,
    pub expr: Option<Expr>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct EmitStmt {
    pub span: Span,
    pub event: Expr,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Expr {
    pub span: Span,
    pub kind: ExprKind,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Literal {
    Number(BigInt),
    Bool(bool),
    String(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    And,
    Or,
    /// Logical implication; only produced by the specification compiler.
    Implies,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
}

impl BinaryOp {
    pub fn parse(op: &str) -> Option<Self> {
        Some(match op {
            "+" => BinaryOp::Add,
            "-" => BinaryOp::Sub,
            "*" => BinaryOp::Mul,
            "/" => BinaryOp::Div,
            "%" => BinaryOp::Mod,
            "**" => BinaryOp::Pow,
            "<" => BinaryOp::Lt,
            "<=" => BinaryOp::Le,
            ">" => BinaryOp::Gt,
            ">=" => BinaryOp::Ge,
            "==" => BinaryOp::Eq,
            "!=" => BinaryOp::Ne,
            "&&" => BinaryOp::And,
            "||" => BinaryOp::Or,
            "=>" => BinaryOp::Implies,
            "&" => BinaryOp::BitAnd,
            "|" => BinaryOp::BitOr,
            "^" => BinaryOp::BitXor,
            "<<" => BinaryOp::Shl,
            ">>" => BinaryOp::Shr,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Pow => "**",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
            BinaryOp::Implies => "=>",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
    Inc,
    Dec,
    Delete,
    BitNot,
}

impl UnaryOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnaryOp::Not => "!",
            UnaryOp::Neg => "-",
            UnaryOp::Inc => "++",
            UnaryOp::Dec => "--",
            UnaryOp::Delete => "delete",
            UnaryOp::BitNot => "~",
        }
    }
}

/// Assignment operator; `None` is plain `=`, otherwise the compound operator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AssignOp(pub Option<BinaryOp>);

#[derive(Clone, Debug, PartialEq)]
pub enum ExprKind {
    Identifier {
        name: String,
        /// Declaration the ingestion front-end resolved this name to, when it names a function.
        decl: Option<FunctionId>,
    },
    Literal(Literal),
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        prefix: bool,
        operand: Box<Expr>,
    },
    Assignment {
        op: AssignOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Tuple(Vec<Expr>),
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    TypeConversion {
        ty: TypeName,
        arg: Box<Expr>,
    },
    IndexAccess {
        base: Box<Expr>,
        index: Box<Expr>,
    },
    MemberAccess {
        base: Box<Expr>,
        member: String,
        decl: Option<FunctionId>,
    },
    Conditional {
        cond: Box<Expr>,
        then_expr: Box<Expr>,
        else_expr: Box<Expr>,
    },
    /// A fresh, otherwise unconstrained value of the given type.
    Havoc(TypeName),
    /// The value of a call to a function without returns.
    Unit,
}

impl Expr {
    pub fn new(span: Span, kind: ExprKind) -> Self {
        Self { span, kind }
    }

    pub fn as_identifier(&self) -> Option<&str> {
        match &self.kind {
            ExprKind::Identifier { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Name of the free function this expression calls (`require(..)` -> `require`).
    pub fn called_name(&self) -> Option<&str> {
        match &self.kind {
            ExprKind::Call { callee, .. } => callee.as_identifier(),
            _ => None,
        }
    }

    pub fn call_args(&self) -> &[Expr] {
        match &self.kind {
            ExprKind::Call { args, .. } => args,
            _ => &[],
        }
    }

    pub fn as_number(&self) -> Option<&BigInt> {
        match &self.kind {
            ExprKind::Literal(Literal::Number(n)) => Some(n),
            _ => None,
        }
    }
}
