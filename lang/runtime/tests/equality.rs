//! End-to-end tests of the equality and coercion protocols: judgemental
//! equalities installed through rules and handlers, endpoint validation,
//! and the fatality of wrong-proposition answers.

mod common;

use common::*;
use reflet_lang_nucleus::AlphaEq;
use reflet_lang_runtime::{Driver, RuntimeError, TAG_SOME, Value};
use reflet_lang_syntax::{Comp, TopItem};

/// Declarations for a product type with pairing and projections, the β-rule
/// for `fst` as an axiom, and two base types with inhabitants.
fn product_prelude(driver: &mut Driver) {
    let items = vec![
        decl_constant("X", universe()),
        decl_constant("Y", universe()),
        // times (A type) (B type) type
        decl_rule("times", vec![("A", None), ("B", None)], None),
        // pair (A type) (B type) (a : A) (b : B) : times A B
        decl_rule(
            "pair",
            vec![
                ("A", None),
                ("B", None),
                ("a", Some(ret(var(1)))),
                ("b", Some(ret(var(1)))),
            ],
            Some(rule("times", vec![ret(var(3)), ret(var(2))])),
        ),
        // fst (A type) (B type) (p : times A B) : A
        decl_rule(
            "fst",
            vec![
                ("A", None),
                ("B", None),
                ("p", Some(rule("times", vec![ret(var(1)), ret(var(0))]))),
            ],
            Some(ret(var(2))),
        ),
        // beta_fst (A type) (B type) (a : A) (b : B)
        //   : fst A B (pair A B a b) == a
        decl_rule(
            "beta_fst",
            vec![
                ("A", None),
                ("B", None),
                ("a", Some(ret(var(1)))),
                ("b", Some(ret(var(1)))),
            ],
            Some(tt_eq(
                rule(
                    "fst",
                    vec![
                        ret(var(3)),
                        ret(var(2)),
                        rule(
                            "pair",
                            vec![ret(var(3)), ret(var(2)), ret(var(1)), ret(var(0))],
                        ),
                    ],
                ),
                ret(var(1)),
            )),
        ),
        decl_constant("x0", constant("X")),
        decl_constant("y0", constant("Y")),
    ];
    driver.execute(&items).expect("prelude elaborates");
}

/// A handler clause for `equal_term` which recognizes `fst A B (pair _ _ a b)`
/// on the left and answers with the reflected β-axiom.
fn beta_handler() -> reflet_lang_syntax::Expr {
    let pattern = pair_pattern(
        jdg_pattern(tt_is_term(
            tt_spine(
                tt_constant_pattern("fst"),
                vec![
                    tt_var("A"),
                    tt_var("B"),
                    tt_spine(
                        tt_constant_pattern("pair"),
                        vec![tt_anon(), tt_anon(), tt_var("a"), tt_var("b")],
                    ),
                ],
            ),
            tt_anon(),
        )),
        jdg_pattern(tt_anon()),
    );
    // bindings (innermost last): A, B, a, b, then the continuation
    let body = let_one(
        "eq",
        tt_reflect(rule(
            "beta_fst",
            vec![ret(var(4)), ret(var(3)), ret(var(2)), ret(var(1))],
        )),
        yield_comp(tag(TAG_SOME, vec![var(0)])),
    );
    op_handler("equal_term", pattern, body)
}

fn fst_pair_comp() -> Comp {
    rule(
        "fst",
        vec![
            constant("X"),
            constant("Y"),
            rule(
                "pair",
                vec![constant("X"), constant("Y"), constant("x0"), constant("y0")],
            ),
        ],
    )
}

#[test]
fn beta_for_products_is_provable_through_the_handler() {
    let mut driver = driver();
    product_prelude(&mut driver);

    // equal (fst X Y (pair X Y x0 y0)) x0 under the β handler
    let comp = let_one(
        "l",
        fst_pair_comp(),
        let_one(
            "r",
            constant("x0"),
            with_handler(beta_handler(), operation("equal_term", vec![var(1), var(0)])),
        ),
    );
    let value = driver.run_comp(&comp).expect("equality succeeds");
    let eq = match &value {
        Value::Tag(t, args) if t.id == TAG_SOME => args[0].as_eq_term(None).unwrap(),
        other => panic!("expected Some equality, got {other:?}"),
    };

    // the witness is exactly the equation that was asked
    let lhs = driver.run_comp(&fst_pair_comp()).unwrap().as_is_term(None).unwrap();
    let rhs = driver.run_comp(&constant("x0")).unwrap().as_is_term(None).unwrap();
    assert!(eq.lhs().alpha_equal(lhs.term()));
    assert!(eq.rhs().alpha_equal(rhs.term()));
    // the reflected axiom does not hide its hypotheses: none here, the
    // arguments were closed terms
    assert!(eq.ty().alpha_equal(lhs.ty()));
}

#[test]
fn wrong_proposition_answers_are_fatal() {
    let mut driver = driver();
    product_prelude(&mut driver);
    let items = vec![
        decl_constant("x1", constant("X")),
        decl_constant("x2", constant("X")),
        // an axiom equating x0 and x1
        decl_rule("x0_is_x1", vec![], Some(tt_eq(constant("x0"), constant("x1")))),
    ];
    driver.execute(&items).unwrap();

    // a handler which answers every question with the same axiom
    fn blind_handler() -> reflet_lang_syntax::Expr {
        op_handler(
            "equal_term",
            pair_pattern(jdg_pattern(tt_anon()), jdg_pattern(tt_anon())),
            let_one(
                "eq",
                tt_reflect(constant("x0_is_x1")),
                yield_comp(tag(TAG_SOME, vec![var(0)])),
            ),
        )
    }

    // asked about (x0, x1), the axiom is a proof of the right proposition
    let comp = let_one(
        "l",
        constant("x0"),
        let_one(
            "r",
            constant("x1"),
            with_handler(blind_handler(), operation("equal_term", vec![var(1), var(0)])),
        ),
    );
    let value = driver.run_comp(&comp).expect("the honest answer is accepted");
    assert!(matches!(&value, Value::Tag(t, _) if t.id == TAG_SOME));

    // asked about (x0, x2), the same answer proves the wrong proposition
    let comp = let_one(
        "l",
        constant("x0"),
        let_one(
            "r",
            constant("x2"),
            with_handler(blind_handler(), operation("equal_term", vec![var(1), var(0)])),
        ),
    );
    let err = driver.run_comp(&comp).expect_err("the dishonest answer is rejected");
    assert!(matches!(err, RuntimeError::InvalidEqualTerm { .. }));
    assert!(err.is_fatal());
}

/// Declarations for `twist` and the η-style axiom that twisting twice is the
/// identity.
fn twist_prelude(driver: &mut Driver) {
    let items = vec![
        decl_constant("X", universe()),
        decl_constant("Y", universe()),
        decl_rule("times", vec![("A", None), ("B", None)], None),
        // twist (A type) (B type) (p : times A B) : times B A
        decl_rule(
            "twist",
            vec![
                ("A", None),
                ("B", None),
                ("p", Some(rule("times", vec![ret(var(1)), ret(var(0))]))),
            ],
            Some(rule("times", vec![ret(var(1)), ret(var(2))])),
        ),
        decl_constant("p0", rule("times", vec![constant("X"), constant("Y")])),
        // prod_eta : twist Y X (twist X Y p0) == p0
        decl_rule(
            "prod_eta",
            vec![],
            Some(tt_eq(
                rule(
                    "twist",
                    vec![
                        constant("Y"),
                        constant("X"),
                        rule("twist", vec![constant("X"), constant("Y"), constant("p0")]),
                    ],
                ),
                constant("p0"),
            )),
        ),
    ];
    driver.execute(&items).expect("prelude elaborates");
}

fn twist_twist_comp() -> Comp {
    rule(
        "twist",
        vec![
            constant("Y"),
            constant("X"),
            rule("twist", vec![constant("X"), constant("Y"), constant("p0")]),
        ],
    )
}

#[test]
fn eta_for_products_is_provable_through_the_handler() {
    let mut driver = driver();
    twist_prelude(&mut driver);
    let handler = op_handler(
        "equal_term",
        pair_pattern(jdg_pattern(tt_anon()), jdg_pattern(tt_anon())),
        let_one(
            "eq",
            tt_reflect(constant("prod_eta")),
            yield_comp(tag(TAG_SOME, vec![var(0)])),
        ),
    );
    let comp = let_one(
        "l",
        twist_twist_comp(),
        let_one(
            "r",
            constant("p0"),
            with_handler(handler, operation("equal_term", vec![var(1), var(0)])),
        ),
    );
    let value = driver.run_comp(&comp).expect("η holds under the handler");
    assert!(matches!(&value, Value::Tag(t, _) if t.id == TAG_SOME));
}

#[test]
fn coercion_accepts_a_replacement_of_the_ascribed_type() {
    let mut driver = driver();
    twist_prelude(&mut driver);

    // refl p0 does not literally have type twist (twist p0) == p0; the
    // coercion handler answers with the η axiom itself, which does.
    let handler = op_handler(
        "coerce",
        pair_pattern(jdg_pattern(tt_anon()), jdg_pattern(tt_anon())),
        let_one(
            "e",
            constant("prod_eta"),
            yield_comp(tag("Coercible", vec![var(0)])),
        ),
    );
    let target = tt_eq(twist_twist_comp(), constant("p0"));
    let comp = with_handler(handler, ascribe(tt_refl(constant("p0")), target.clone()));
    let value = driver.run_comp(&comp).expect("coercion succeeds");
    let jdg = value.as_is_term(None).unwrap();
    let expected = driver.run_comp(&target).unwrap().as_is_type(None).unwrap();
    assert!(jdg.ty().alpha_equal(expected.ty()));
}

#[test]
fn coercion_to_the_wrong_type_is_fatal() {
    let mut driver = driver();
    twist_prelude(&mut driver);
    let items = vec![decl_constant("x0", constant("X"))];
    driver.execute(&items).unwrap();

    // the handler answers with a term of an unrelated type
    let handler = op_handler(
        "coerce",
        pair_pattern(jdg_pattern(tt_anon()), jdg_pattern(tt_anon())),
        let_one("e", constant("x0"), yield_comp(tag("Coercible", vec![var(0)]))),
    );
    let target = tt_eq(twist_twist_comp(), constant("p0"));
    let comp = with_handler(handler, ascribe(tt_refl(constant("p0")), target));
    let err = driver.run_comp(&comp).expect_err("wrong coercion is rejected");
    assert!(matches!(err, RuntimeError::InvalidCoerce { .. }));
    assert!(err.is_fatal());
}

#[test]
fn unhandled_coercion_fails_recoverably() {
    let mut driver = driver();
    product_prelude(&mut driver);
    // fst X Y x0 is ill-typed: x0 : X is not a pair, and nobody coerces
    let item = TopItem::TopFail {
        span: None,
        comp: rule("fst", vec![constant("X"), constant("Y"), constant("x0")]),
    };
    driver.execute(&[item]).expect("the failure was expected");
}

#[test]
fn expected_failures_must_fail() {
    let mut driver = driver();
    product_prelude(&mut driver);
    let item = TopItem::TopFail { span: None, comp: constant("x0") };
    let err = driver.execute(&[item]).expect_err("success is reported");
    assert!(matches!(err, RuntimeError::ExpectedFailure { .. }));
}

#[test]
fn lambda_checking_pushes_through_products() {
    let mut driver = driver();
    product_prelude(&mut driver);
    // (λ x => x) : X -> X, with the binder type inferred from the ascription
    let lam = Comp::TTLambda {
        span: None,
        name: ident("x"),
        annotation: None,
        body: Box::new(ret(var(0))),
    };
    let ty = Comp::TTProd {
        span: None,
        name: ident("_"),
        dom: Box::new(constant("X")),
        cod: Box::new(constant("X")),
    };
    let value = driver.run_comp(&ascribe(lam, ty)).expect("identity checks");
    let jdg = value.as_is_term(None).unwrap();
    assert!(jdg.type_of().domain().is_some());
}
