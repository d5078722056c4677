#![cfg(feature = "z3")]

use num::BigInt;
use zero_ast::builder::{
    add, assign, block, boolean, call, call_stmt, div, eq, expr_stmt, ge, gt, ident, num, var_decl, ProgramBuilder,
};
use zero_ast::{ContractKind, Program, TypeName};
use zero_verify::{verify_program_z3, FunctionReport, ObligationKind, VerificationReport, Verdict, VerifyOptions};

fn options() -> VerifyOptions {
    VerifyOptions {
        timeout_ms: 5_000,
        ..VerifyOptions::default()
    }
}

fn run(program: &Program) -> VerificationReport {
    verify_program_z3(program, &options()).expect("verification run")
}

fn verdicts(report: &FunctionReport, kind: ObligationKind) -> Vec<&Verdict> {
    report
        .obligations()
        .filter(|o| o.kind == kind)
        .map(|o| &o.verdict)
        .collect()
}

#[test]
fn require_makes_the_assertion_provable() {
    let mut pb = ProgramBuilder::new();
    let c = pb.contract("C", ContractKind::Contract, &[]);
    pb.function(
        c,
        "f",
        &[("x", TypeName::uint(256))],
        &[],
        Some(block(vec![
            call_stmt("require", vec![gt(ident("x"), num(0))]),
            call_stmt("assert", vec![ge(ident("x"), num(1))]),
        ])),
    );
    pb.function(
        c,
        "g",
        &[("x", TypeName::uint(256))],
        &[],
        Some(block(vec![call_stmt("assert", vec![ge(ident("x"), num(1))])])),
    );
    let report = run(&pb.finish());

    let f = report.function("C", "f").expect("f");
    assert!(f.all_proved(), "{report}");

    let g = report.function("C", "g").expect("g");
    let refuted = verdicts(g, ObligationKind::Assert);
    let [Verdict::Refuted { model }] = refuted.as_slice() else {
        panic!("expected one refuted assertion:\n{report}");
    };
    assert_eq!(model.get_int("x"), Some(&BigInt::from(0)));
}

#[test]
fn unchecked_addition_may_overflow() {
    let mut pb = ProgramBuilder::new();
    let c = pb.contract("C", ContractKind::Contract, &[]);
    pb.function(
        c,
        "h",
        &[("x", TypeName::uint(256)), ("y", TypeName::uint(256))],
        &[],
        Some(block(vec![var_decl("z", TypeName::uint(256), Some(add(ident("x"), ident("y"))))])),
    );
    let report = run(&pb.finish());

    let h = report.function("C", "h").expect("h");
    let refuted = verdicts(h, ObligationKind::NoRevert);
    let [Verdict::Refuted { model }] = refuted.as_slice() else {
        panic!("expected one refuted overflow check:\n{report}");
    };
    let bound = (BigInt::from(1) << 256u32) - BigInt::from(1);
    let x = model.get_int("x").expect("x in model");
    let y = model.get_int("y").expect("y in model");
    assert!(x + y > bound, "{model}");
}

/// `inc`'s body deliberately breaks its own contract: callers must still see
/// only the contract.
fn rely_guarantee_program(step: i64) -> Program {
    let mut pb = ProgramBuilder::new();
    let c = pb.contract("C", ContractKind::Contract, &[]);
    pb.function(
        c,
        "inc",
        &[("x", TypeName::uint(256))],
        &[("r", TypeName::uint(256))],
        Some(block(vec![
            call_stmt(
                "ensures",
                vec![boolean(true), eq(ident("r"), add(call("old_uint", vec![ident("x")]), num(1)))],
            ),
            expr_stmt(assign(ident("r"), add(ident("x"), num(step)))),
        ])),
    );
    pb.function(
        c,
        "caller",
        &[("a", TypeName::uint(256))],
        &[],
        Some(block(vec![
            var_decl("b", TypeName::uint(256), Some(call("inc", vec![ident("a")]))),
            call_stmt("assert", vec![eq(ident("b"), add(ident("a"), num(1)))]),
        ])),
    );
    pb.finish()
}

#[test]
fn own_contract_is_checked_against_the_body() {
    let report = run(&rely_guarantee_program(1));
    let inc = report.function("C", "inc").expect("inc");
    let asserts = verdicts(inc, ObligationKind::Assert);
    assert_eq!(asserts.len(), 1);
    assert!(asserts[0].is_proved(), "{report}");

    let report = run(&rely_guarantee_program(2));
    let inc = report.function("C", "inc").expect("inc");
    assert!(verdicts(inc, ObligationKind::Assert)[0].is_refuted(), "{report}");
}

#[test]
fn callers_rely_on_the_contract_not_the_body() {
    for step in [1, 2] {
        let report = run(&rely_guarantee_program(step));
        let caller = report.function("C", "caller").expect("caller");
        let asserts = verdicts(caller, ObligationKind::Assert);
        assert_eq!(asserts.len(), 1);
        assert!(asserts[0].is_proved(), "step {step}:\n{report}");
    }
}

#[test]
fn old_reads_the_value_at_entry() {
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
    let report = run(&pb.finish());
    let bump = report.function("Counter", "bump").expect("bump");
    let asserts = verdicts(bump, ObligationKind::Assert);
    assert_eq!(asserts.len(), 1);
    assert!(asserts[0].is_proved(), "{report}");
}

#[test]
fn reverts_if_matches_division_by_zero() {
    let mut pb = ProgramBuilder::new();
    let c = pb.contract("C", ContractKind::Contract, &[]);
    pb.function(
        c,
        "d",
        &[("x", TypeName::uint(256))],
        &[("r", TypeName::uint(256))],
        Some(block(vec![
            call_stmt("reverts_if", vec![eq(ident("x"), num(0))]),
            call_stmt("achieves_err", vec![boolean(true), eq(ident("x"), num(0))]),
            expr_stmt(assign(ident("r"), div(num(10), ident("x")))),
        ])),
    );
    let report = run(&pb.finish());
    let d = report.function("C", "d").expect("d");

    let exact = verdicts(d, ObligationKind::RevertsIf);
    assert_eq!(exact.len(), 1);
    assert!(exact[0].is_proved(), "{report}");

    let err = verdicts(d, ObligationKind::Err);
    assert_eq!(err.len(), 1);
    assert!(matches!(err[0], Verdict::Proved { witness: Some(_) }), "{report}");
}
