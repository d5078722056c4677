use num::{BigInt, Signed};

use crate::smt::sorts::SmtSort;
use crate::smt::terms::SmtTerm;

/// Quote a symbol when it is not a simple SMT-LIB symbol.
pub fn symbol(name: &str) -> String {
    let simple = !name.is_empty()
        && !name.starts_with(|c: char| c.is_ascii_digit())
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "~!@$%^&*_-+=<>.?/".contains(c));
    if simple {
        name.to_string()
    } else {
        format!("|{name}|")
    }
}

fn int_lit(n: &BigInt) -> String {
    if n.is_negative() {
        format!("(- {})", -n)
    } else {
        n.to_string()
    }
}

fn nary(op: &str, empty: &str, terms: &[SmtTerm]) -> String {
    match terms {
        [] => empty.to_string(),
        [single] => to_smtlib(single),
        _ => {
            let inner: Vec<String> = terms.iter().map(to_smtlib).collect();
            format!("({op} {})", inner.join(" "))
        }
    }
}

/// Print an SmtTerm as SMT-LIB2 format.
pub fn to_smtlib(term: &SmtTerm) -> String {
    match term {
        SmtTerm::Var(name) => symbol(name),
        SmtTerm::IntLit(n) => int_lit(n),
        SmtTerm::BoolLit(b) => b.to_string(),
        SmtTerm::StrLit(s) => format!("\"{}\"", s.replace('"', "\"\"")),
        SmtTerm::Add(lhs, rhs) => format!("(+ {} {})", to_smtlib(lhs), to_smtlib(rhs)),
        SmtTerm::Sub(lhs, rhs) => format!("(- {} {})", to_smtlib(lhs), to_smtlib(rhs)),
        SmtTerm::Mul(lhs, rhs) => format!("(* {} {})", to_smtlib(lhs), to_smtlib(rhs)),
        SmtTerm::Div(lhs, rhs) => format!("(div {} {})", to_smtlib(lhs), to_smtlib(rhs)),
        SmtTerm::Mod(lhs, rhs) => format!("(mod {} {})", to_smtlib(lhs), to_smtlib(rhs)),
        SmtTerm::Neg(inner) => format!("(- {})", to_smtlib(inner)),
        SmtTerm::Eq(lhs, rhs) => format!("(= {} {})", to_smtlib(lhs), to_smtlib(rhs)),
        SmtTerm::Lt(lhs, rhs) => format!("(< {} {})", to_smtlib(lhs), to_smtlib(rhs)),
        SmtTerm::Le(lhs, rhs) => format!("(<= {} {})", to_smtlib(lhs), to_smtlib(rhs)),
        SmtTerm::Gt(lhs, rhs) => format!("(> {} {})", to_smtlib(lhs), to_smtlib(rhs)),
        SmtTerm::Ge(lhs, rhs) => format!("(>= {} {})", to_smtlib(lhs), to_smtlib(rhs)),
        SmtTerm::And(terms) => nary("and", "true", terms),
        SmtTerm::Or(terms) => nary("or", "false", terms),
        SmtTerm::Not(inner) => format!("(not {})", to_smtlib(inner)),
        SmtTerm::Implies(lhs, rhs) => format!("(=> {} {})", to_smtlib(lhs), to_smtlib(rhs)),
        SmtTerm::Ite(cond, then, els) => format!(
            "(ite {} {} {})",
            to_smtlib(cond),
            to_smtlib(then),
            to_smtlib(els)
        ),
        SmtTerm::Select(arr, idx) => format!("(select {} {})", to_smtlib(arr), to_smtlib(idx)),
        SmtTerm::Store(arr, idx, val) => format!(
            "(store {} {} {})",
            to_smtlib(arr),
            to_smtlib(idx),
            to_smtlib(val)
        ),
        SmtTerm::ConstArray(index, value) => {
            let range = const_array_range(value);
            format!(
                "((as const (Array {} {})) {})",
                sort_to_smtlib(index),
                range,
                to_smtlib(value)
            )
        }
        SmtTerm::Construct(dt, args) => {
            let ctor = symbol(&dt.constructor_name());
            if args.is_empty() {
                ctor
            } else {
                let inner: Vec<String> = args.iter().map(to_smtlib).collect();
                format!("({ctor} {})", inner.join(" "))
            }
        }
        SmtTerm::Field(dt, index, inner) => {
            let field = dt.field_name(*index).unwrap_or_else(|| format!("{}-{index}", dt.name));
            format!("({} {})", symbol(&field), to_smtlib(inner))
        }
        SmtTerm::ForAll(bindings, body) => {
            let vars: Vec<String> = bindings
                .iter()
                .map(|(n, s)| format!("({} {})", symbol(n), sort_to_smtlib(s)))
                .collect();
            format!("(forall ({}) {})", vars.join(" "), to_smtlib(body))
        }
    }
}

// Best effort: the printer has no sort inference, so const arrays of records
// and nested arrays print their element as `?`.
fn const_array_range(value: &SmtTerm) -> String {
    match value {
        SmtTerm::IntLit(_) => "Int".to_string(),
        SmtTerm::BoolLit(_) => "Bool".to_string(),
        SmtTerm::StrLit(_) => "String".to_string(),
        SmtTerm::Construct(dt, _) => symbol(&dt.name),
        SmtTerm::ConstArray(index, inner) => {
            format!("(Array {} {})", sort_to_smtlib(index), const_array_range(inner))
        }
        _ => "?".to_string(),
    }
}

/// Print a sort as SMT-LIB2 format.
pub fn sort_to_smtlib(sort: &SmtSort) -> String {
    match sort {
        SmtSort::Bool => "Bool".to_string(),
        SmtSort::Int => "Int".to_string(),
        SmtSort::String => "String".to_string(),
        SmtSort::Array(i, e) => format!("(Array {} {})", sort_to_smtlib(i), sort_to_smtlib(e)),
        SmtSort::Datatype(dt) => symbol(&dt.name),
    }
}

/// Render a complete query: declarations followed by the assertion and `(check-sat)`.
pub fn script(decls: &[(String, SmtSort)], assertion: &SmtTerm) -> String {
    let mut out = String::new();
    for (name, sort) in decls {
        out.push_str(&format!(
            "(declare-const {} {})\n",
            symbol(name),
            sort_to_smtlib(sort)
        ));
    }
    out.push_str(&format!("(assert {})\n(check-sat)", to_smtlib(assertion)));
    out
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::smt::sorts::DatatypeSort;

    #[test]
    fn print_simple_term() {
        let term = SmtTerm::var("x").add(SmtTerm::int(1)).ge(SmtTerm::int(0));
        assert_eq!(to_smtlib(&term), "(>= (+ x 1) 0)");
    }

    #[test]
    fn print_negative_literal_and_quoted_symbol() {
        let term = SmtTerm::var("havoc!3").eq(SmtTerm::int(-5));
        assert_eq!(to_smtlib(&term), "(= havoc!3 (- 5))");
        assert_eq!(symbol("array<Int>"), "array<Int>");
        assert_eq!(symbol("a b"), "|a b|");
    }

    #[test]
    fn print_record_access_and_store() {
        let dt = Arc::new(DatatypeSort {
            name: "Point".to_string(),
            fields: vec![("x".to_string(), SmtSort::Int), ("y".to_string(), SmtSort::Int)],
        });
        let p = SmtTerm::var("p");
        assert_eq!(to_smtlib(&p.clone().field(&dt, 1)), "(Point-y p)");
        let m = SmtTerm::var("m").store(SmtTerm::int(1), SmtTerm::int(2));
        assert_eq!(to_smtlib(&m), "(store m 1 2)");
        let c = SmtTerm::Construct(dt, vec![SmtTerm::int(0), SmtTerm::int(0)]);
        assert_eq!(to_smtlib(&c), "(mk-Point 0 0)");
    }

    #[test]
    fn script_lists_declarations_first() {
        let decls = vec![("x".to_string(), SmtSort::Int)];
        let s = script(&decls, &SmtTerm::var("x").lt(SmtTerm::int(0)));
        assert_eq!(s, "(declare-const x Int)\n(assert (< x 0))\n(check-sat)");
    }
}
