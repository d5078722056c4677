#![forbid(unsafe_code)]

//! Source-like rendering of types and expressions for reports.

use std::fmt;

use crate::{Expr, ExprKind, Literal, TypeName, UnaryOp, UserType};

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeName::Elementary(e) => write!(f, "{e}"),
            TypeName::Mapping(k, v) => write!(f, "mapping({k} => {v})"),
            TypeName::Array(base, None) => write!(f, "{base}[]"),
            TypeName::Array(base, Some(n)) => write!(f, "{base}[{n}]"),
            TypeName::UserDefined(UserType::Struct(id)) => write!(f, "struct#{}", id.0),
            TypeName::UserDefined(UserType::Contract(id)) => write!(f, "contract#{}", id.0),
        }
    }
}

/// Parenthesized when compound.
struct Operand<'a>(&'a Expr);

impl fmt::Display for Operand<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.kind {
            ExprKind::Binary { .. } | ExprKind::Conditional { .. } | ExprKind::Assignment { .. } => {
                write!(f, "({})", self.0)
            }
            _ => write!(f, "{}", self.0),
        }
    }
}

fn comma_separated(f: &mut fmt::Formatter<'_>, items: &[Expr]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ExprKind::Identifier { name, .. } => write!(f, "{name}"),
            ExprKind::Literal(Literal::Number(n)) => write!(f, "{n}"),
            ExprKind::Literal(Literal::Bool(b)) => write!(f, "{b}"),
            ExprKind::Literal(Literal::String(s)) => write!(f, "{s:?}"),
            ExprKind::Binary { op, lhs, rhs } => {
                write!(f, "{} {} {}", Operand(lhs), op.as_str(), Operand(rhs))
            }
            ExprKind::Unary { op: UnaryOp::Delete, operand, .. } => write!(f, "delete {}", Operand(operand)),
            ExprKind::Unary { op, prefix: true, operand } => write!(f, "{}{}", op.as_str(), Operand(operand)),
            ExprKind::Unary { op, operand, .. } => write!(f, "{}{}", Operand(operand), op.as_str()),
            ExprKind::Assignment { op, lhs, rhs } => {
                let compound = op.0.map(|o| o.as_str()).unwrap_or_default();
                write!(f, "{lhs} {compound}= {rhs}")
            }
            ExprKind::Tuple(items) => {
                write!(f, "(")?;
                comma_separated(f, items)?;
                write!(f, ")")
            }
            ExprKind::Call { callee, args } => {
                write!(f, "{callee}(")?;
                comma_separated(f, args)?;
                write!(f, ")")
            }
            ExprKind::TypeConversion { ty, arg } => write!(f, "{ty}({arg})"),
            ExprKind::IndexAccess { base, index } => write!(f, "{}[{index}]", Operand(base)),
            ExprKind::MemberAccess { base, member, .. } => write!(f, "{}.{member}", Operand(base)),
            ExprKind::Conditional {
                cond,
                then_expr,
                else_expr,
            } => write!(f, "{} ? {} : {}", Operand(cond), Operand(then_expr), Operand(else_expr)),
            ExprKind::Havoc(ty) => write!(f, "havoc({ty})"),
            ExprKind::Unit => write!(f, "()"),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::builder::{add, assign_op, call, ge, ident, implies, index, member, mul, num};
    use crate::{BinaryOp, TypeName};

    #[test]
    fn renders_nested_operands_with_parentheses() {
        let e = ge(mul(add(ident("a"), num(1)), ident("b")), num(0));
        assert_eq!(e.to_string(), "((a + 1) * b) >= 0");
        assert_eq!(
            implies(ident("tmp_0"), call("old_uint", vec![index(ident("bal"), member(ident("msg"), "sender"))]))
                .to_string(),
            "tmp_0 => old_uint(bal[msg.sender])"
        );
        assert_eq!(assign_op(BinaryOp::Add, ident("x"), num(2)).to_string(), "x += 2");
    }

    #[test]
    fn renders_types() {
        let ty = TypeName::mapping(TypeName::address(), TypeName::array(TypeName::uint(8), Some(4)));
        assert_eq!(ty.to_string(), "mapping(address => uint8[4])");
    }
}
