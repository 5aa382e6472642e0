//! End-to-end tests of the effect machinery: dynamics, handlers with
//! continuations, and failure capture at the top level.

mod common;

use common::*;
use reflet_lang_nucleus::MLTy;
use reflet_lang_runtime::{RuntimeError, Value};
use reflet_lang_syntax::{Comp, LetBinding, MatchCase, Pattern, TopItem};

#[test]
fn dynamics_nest_and_restore() {
    let mut driver = driver();
    driver
        .execute(&[TopItem::TopDynamic {
            span: None,
            name: ident("verbose"),
            init: ret(str_expr("default")),
        }])
        .unwrap();

    // now verbose = "v" in (now verbose = "w" in current verbose ; current verbose)
    let comp = Comp::Now {
        span: None,
        dynamic: ident("verbose"),
        value: str_expr("v"),
        body: Box::new(Comp::Let {
            span: None,
            bindings: vec![
                LetBinding {
                    span: None,
                    pattern: var_pattern("inner"),
                    comp: Comp::Now {
                        span: None,
                        dynamic: ident("verbose"),
                        value: str_expr("w"),
                        body: Box::new(Comp::Current { span: None, dynamic: ident("verbose") }),
                    },
                },
                LetBinding {
                    span: None,
                    pattern: var_pattern("outer"),
                    comp: Comp::Current { span: None, dynamic: ident("verbose") },
                },
            ],
            body: Box::new(ret(reflet_lang_syntax::Expr::Tuple {
                span: None,
                elems: vec![var(1), var(0)],
            })),
        }),
    };
    let value = driver.run_comp(&comp).unwrap();
    match value {
        Value::Tuple(elems) => {
            assert!(matches!(&elems[0], Value::Str(s) if s == "w"));
            assert!(matches!(&elems[1], Value::Str(s) if s == "v"));
        }
        other => panic!("expected tuple, got {other:?}"),
    }

    // outside all `now`s the default is visible
    let value = driver
        .run_comp(&Comp::Current { span: None, dynamic: ident("verbose") })
        .unwrap();
    assert!(matches!(value, Value::Str(s) if s == "default"));
}

#[test]
fn top_level_now_replaces_the_default() {
    let mut driver = driver();
    driver
        .execute(&[
            TopItem::TopDynamic {
                span: None,
                name: ident("verbose"),
                init: ret(str_expr("old")),
            },
            TopItem::TopNow { span: None, name: ident("verbose"), value: ret(str_expr("new")) },
        ])
        .unwrap();
    let value = driver
        .run_comp(&Comp::Current { span: None, dynamic: ident("verbose") })
        .unwrap();
    assert!(matches!(value, Value::Str(s) if s == "new"));
}

#[test]
fn handler_clauses_resume_with_the_yielded_value() {
    let mut driver = driver();
    driver
        .execute(&[
            TopItem::DeclMLType {
                span: None,
                name: ident("nat"),
                constructors: vec![(ident("Z"), 0), (ident("S"), 1)],
            },
            TopItem::DeclOperation {
                span: None,
                name: ident("succ"),
                arg_tys: vec![MLTy::Named(ident("nat"), vec![])],
                result_ty: MLTy::Named(ident("nat"), vec![]),
            },
        ])
        .unwrap();

    // with (handler | succ n => yield (S n)) handle (succ Z)
    let handler = op_handler(
        "succ",
        var_pattern("n"),
        yield_comp(tag("S", vec![var(1)])),
    );
    let comp = with_handler(handler, operation("succ", vec![tag("Z", vec![])]));
    let value = driver.run_comp(&comp).unwrap();
    match value {
        Value::Tag(t, args) if t.id == "S" => {
            assert!(matches!(&args[0], Value::Tag(z, _) if z.id == "Z"));
        }
        other => panic!("expected S Z, got {other:?}"),
    }
}

#[test]
fn references_are_immediate_and_persistent() {
    let mut driver = driver();
    // let r = ref "a" in (r := "b" ; !r)
    let comp = let_one(
        "r",
        Comp::RefAlloc { span: None, init: str_expr("a") },
        Comp::Sequence {
            span: None,
            first: Box::new(Comp::RefUpdate {
                span: None,
                reference: var(0),
                value: str_expr("b"),
            }),
            second: Box::new(Comp::RefLookup { span: None, reference: var(0) }),
        },
    );
    let value = driver.run_comp(&comp).unwrap();
    assert!(matches!(value, Value::Str(s) if s == "b"));
}

#[test]
fn match_failures_are_recoverable() {
    let mut driver = driver();
    let comp = Comp::Match {
        span: None,
        scrutinee: str_expr("hello"),
        cases: vec![MatchCase {
            span: None,
            pattern: Pattern::Str { span: None, value: "goodbye".to_owned() },
            body: ret(str_expr("matched")),
        }],
    };
    let err = driver.run_comp(&comp).unwrap_err();
    assert!(matches!(err, RuntimeError::MatchFail { .. }));
    assert!(!err.is_fatal());

    // and a fail item discharges them
    driver
        .execute(&[TopItem::TopFail {
            span: None,
            comp: Comp::Match {
                span: None,
                scrutinee: str_expr("hello"),
                cases: vec![],
            },
        }])
        .expect("the failure was expected");
}

#[test]
fn top_level_lets_persist_across_items() {
    let mut driver = driver();
    driver
        .execute(&[TopItem::TopLet {
            span: None,
            bindings: vec![LetBinding {
                span: None,
                pattern: var_pattern("greeting"),
                comp: ret(str_expr("hi")),
            }],
        }])
        .unwrap();
    let idx = driver.resolve(&ident("greeting")).expect("greeting is bound");
    let value = driver.run_comp(&ret(var(idx.0))).unwrap();
    assert!(matches!(value, Value::Str(s) if s == "hi"));
}
