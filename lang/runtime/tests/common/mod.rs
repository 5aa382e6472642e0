//! Shared builders for the end-to-end tests.
//!
//! The tests construct desugared syntax directly, playing the role of the
//! external parser/desugarer.
#![allow(dead_code)]

use reflet_lang_nucleus::Ident;
use reflet_lang_runtime::{Config, Driver};
use reflet_lang_syntax::{
    Comp, Expr, HandlerExpr, Idx, LetBinding, MatchCase, Pattern, RulePremise, TTPattern,
    TopItem,
};

pub fn driver() -> Driver {
    let _ = env_logger::builder().is_test(true).try_init();
    Driver::new(Config::default()).expect("driver starts")
}

pub fn ident(name: &str) -> Ident {
    Ident::from_string(name)
}

pub fn var(idx: usize) -> Expr {
    Expr::Var { span: None, idx: Idx(idx), name: ident("_") }
}

pub fn str_expr(s: &str) -> Expr {
    Expr::Str { span: None, value: s.to_owned() }
}

pub fn tag(name: &str, args: Vec<Expr>) -> Expr {
    Expr::Tag { span: None, tag: ident(name), args }
}

pub fn ret(expr: Expr) -> Comp {
    Comp::Return { span: None, expr }
}

pub fn var_pattern(name: &str) -> Pattern {
    Pattern::Var { span: None, name: ident(name) }
}

pub fn let_one(name: &str, comp: Comp, body: Comp) -> Comp {
    Comp::Let {
        span: None,
        bindings: vec![LetBinding { span: None, pattern: var_pattern(name), comp }],
        body: Box::new(body),
    }
}

pub fn operation(op: &str, args: Vec<Expr>) -> Comp {
    Comp::Operation { span: None, op: ident(op), args }
}

pub fn with_handler(handler: Expr, body: Comp) -> Comp {
    Comp::With { span: None, handler, body: Box::new(body) }
}

/// A handler with a single operation clause and no value/finally clauses.
pub fn op_handler(op: &str, pattern: Pattern, body: Comp) -> Expr {
    Expr::Handler {
        span: None,
        handler: Box::new(HandlerExpr {
            value: None,
            ops: vec![(ident(op), vec![MatchCase { span: None, pattern, body }])],
            finally: None,
        }),
    }
}

pub fn yield_comp(expr: Expr) -> Comp {
    Comp::Yield { span: None, expr }
}

// Term formers

pub fn universe() -> Comp {
    Comp::TTUniverse { span: None }
}

pub fn constant(name: &str) -> Comp {
    Comp::TTConstant { span: None, name: ident(name) }
}

pub fn rule(name: &str, args: Vec<Comp>) -> Comp {
    Comp::TTRule { span: None, name: ident(name), args }
}

pub fn tt_eq(lhs: Comp, rhs: Comp) -> Comp {
    Comp::TTEq { span: None, lhs: Box::new(lhs), rhs: Box::new(rhs) }
}

pub fn tt_refl(term: Comp) -> Comp {
    Comp::TTRefl { span: None, term: Box::new(term) }
}

pub fn tt_reflect(term: Comp) -> Comp {
    Comp::TTReflect { span: None, term: Box::new(term) }
}

pub fn ascribe(comp: Comp, ty: Comp) -> Comp {
    Comp::Ascribe { span: None, comp: Box::new(comp), ty: Box::new(ty) }
}

// Top-level items

pub fn decl_constant(name: &str, ty: Comp) -> TopItem {
    TopItem::DeclConstant { span: None, name: ident(name), ty }
}

/// `None` premise type means the premise ranges over types.
pub fn decl_rule(
    name: &str,
    premises: Vec<(&str, Option<Comp>)>,
    conclusion: Option<Comp>,
) -> TopItem {
    TopItem::DeclRule {
        span: None,
        name: ident(name),
        premises: premises
            .into_iter()
            .map(|(name, ty)| RulePremise { span: None, name: ident(name), ty })
            .collect(),
        conclusion,
    }
}

// Patterns over judgements

pub fn jdg_pattern(pattern: TTPattern) -> Pattern {
    Pattern::Judgement { span: None, pattern }
}

pub fn tt_anon() -> TTPattern {
    TTPattern::Anonymous { span: None }
}

pub fn tt_var(name: &str) -> TTPattern {
    TTPattern::Var { span: None, name: ident(name) }
}

pub fn tt_constant_pattern(name: &str) -> TTPattern {
    TTPattern::Constant { span: None, name: ident(name) }
}

pub fn tt_spine(head: TTPattern, args: Vec<TTPattern>) -> TTPattern {
    TTPattern::Spine { span: None, head: Box::new(head), args }
}

pub fn tt_is_term(term: TTPattern, ty: TTPattern) -> TTPattern {
    TTPattern::IsTerm { span: None, term: Box::new(term), ty: Box::new(ty) }
}

pub fn pair_pattern(fst: Pattern, snd: Pattern) -> Pattern {
    Pattern::Tuple { span: None, elems: vec![fst, snd] }
}
