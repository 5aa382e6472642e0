use reflet_lang_miette_util::HasSpan;

use crate::{Atom, mk_atom};

use super::{
    Binder, Sig, SigField, Term, TermKind, Ty, mk_apply, mk_bound, mk_eq, mk_lambda, mk_prod,
    mk_projection, mk_refl, mk_signature, mk_structure,
};

/// Syntax which participates in the de Bruijn discipline.
///
/// `instantiate_at` and `abstract_at` are only ever used at binder
/// boundaries: the substituents of `instantiate_at` carry no free bound
/// indices of their own, so capture cannot occur by construction.
pub trait Bindable: Sized {
    /// Replace the bound indices `lvl + i` by `es[i]`; indices above the
    /// substituted range shift down by `es.len()`.
    fn instantiate_at(&self, es: &[Term], lvl: usize) -> Self;

    /// Capture the free atoms `xs` as the bound indices `lvl, lvl + 1, …`.
    fn abstract_at(&self, xs: &[Atom], lvl: usize) -> Self;

    /// Replace the atoms `xs` simultaneously by the terms `es`.
    fn substitute(&self, xs: &[Atom], es: &[Term]) -> Self {
        self.abstract_at(xs, 0).instantiate_at(es, 0)
    }

    /// Open a binder spine by replacing the bound indices `0, 1, …` with the
    /// given (fresh) atoms.
    fn unabstract(&self, xs: &[Atom]) -> Self {
        let es: Vec<Term> = xs.iter().map(|x| mk_atom(x, None)).collect();
        self.instantiate_at(&es, 0)
    }
}

impl Bindable for Term {
    fn instantiate_at(&self, es: &[Term], lvl: usize) -> Term {
        // Identity substitutions return the argument unchanged, preserving
        // pointer equality.
        if es.is_empty() || !self.assumptions().mem_bound_from(lvl) {
            return self.clone();
        }
        let span = self.span();
        match self.kind() {
            TermKind::Type | TermKind::Atom(_) | TermKind::Constant(_) => self.clone(),
            TermKind::Bound(k) => {
                if *k < lvl {
                    self.clone()
                } else if k - lvl < es.len() {
                    es[k - lvl].clone()
                } else {
                    mk_bound(k - es.len(), span)
                }
            }
            TermKind::Lambda { binder, body, body_ty } => mk_lambda(
                span,
                binder.instantiate_at(es, lvl),
                body.instantiate_at(es, lvl + 1),
                body_ty.instantiate_at(es, lvl + 1),
            ),
            TermKind::Apply { head, binder, cod, arg } => mk_apply(
                span,
                head.instantiate_at(es, lvl),
                binder.instantiate_at(es, lvl),
                cod.instantiate_at(es, lvl + 1),
                arg.instantiate_at(es, lvl),
            ),
            TermKind::Prod { binder, cod } => mk_prod(
                span,
                binder.instantiate_at(es, lvl),
                cod.instantiate_at(es, lvl + 1),
            ),
            TermKind::Eq { ty, lhs, rhs } => mk_eq(
                span,
                ty.instantiate_at(es, lvl),
                lhs.instantiate_at(es, lvl),
                rhs.instantiate_at(es, lvl),
            ),
            TermKind::Refl { ty, term } => mk_refl(
                span,
                ty.instantiate_at(es, lvl),
                term.instantiate_at(es, lvl),
            ),
            TermKind::Signature(fields) => mk_signature(span, fields.instantiate_at(es, lvl)),
            TermKind::Structure { fields, values } => mk_structure(
                span,
                fields.instantiate_at(es, lvl),
                values.iter().map(|v| v.instantiate_at(es, lvl)).collect(),
            ),
            TermKind::Projection { term, fields, label } => mk_projection(
                span,
                term.instantiate_at(es, lvl),
                fields.instantiate_at(es, lvl),
                label.clone(),
            ),
        }
    }

    fn abstract_at(&self, xs: &[Atom], lvl: usize) -> Term {
        if xs.is_empty() || !xs.iter().any(|x| self.assumptions().mem_atom(x)) {
            return self.clone();
        }
        let span = self.span();
        match self.kind() {
            TermKind::Type | TermKind::Bound(_) | TermKind::Constant(_) => self.clone(),
            TermKind::Atom(a) => match xs.iter().position(|x| x == a) {
                Some(i) => mk_bound(lvl + i, span),
                None => self.clone(),
            },
            TermKind::Lambda { binder, body, body_ty } => mk_lambda(
                span,
                binder.abstract_at(xs, lvl),
                body.abstract_at(xs, lvl + 1),
                body_ty.abstract_at(xs, lvl + 1),
            ),
            TermKind::Apply { head, binder, cod, arg } => mk_apply(
                span,
                head.abstract_at(xs, lvl),
                binder.abstract_at(xs, lvl),
                cod.abstract_at(xs, lvl + 1),
                arg.abstract_at(xs, lvl),
            ),
            TermKind::Prod { binder, cod } => mk_prod(
                span,
                binder.abstract_at(xs, lvl),
                cod.abstract_at(xs, lvl + 1),
            ),
            TermKind::Eq { ty, lhs, rhs } => mk_eq(
                span,
                ty.abstract_at(xs, lvl),
                lhs.abstract_at(xs, lvl),
                rhs.abstract_at(xs, lvl),
            ),
            TermKind::Refl { ty, term } => {
                mk_refl(span, ty.abstract_at(xs, lvl), term.abstract_at(xs, lvl))
            }
            TermKind::Signature(fields) => mk_signature(span, fields.abstract_at(xs, lvl)),
            TermKind::Structure { fields, values } => mk_structure(
                span,
                fields.abstract_at(xs, lvl),
                values.iter().map(|v| v.abstract_at(xs, lvl)).collect(),
            ),
            TermKind::Projection { term, fields, label } => mk_projection(
                span,
                term.abstract_at(xs, lvl),
                fields.abstract_at(xs, lvl),
                label.clone(),
            ),
        }
    }
}

impl Bindable for Ty {
    fn instantiate_at(&self, es: &[Term], lvl: usize) -> Ty {
        Ty::from(self.as_term().instantiate_at(es, lvl))
    }

    fn abstract_at(&self, xs: &[Atom], lvl: usize) -> Ty {
        Ty::from(self.as_term().abstract_at(xs, lvl))
    }
}

impl Bindable for Binder {
    fn instantiate_at(&self, es: &[Term], lvl: usize) -> Binder {
        Binder { name: self.name.clone(), ty: self.ty.instantiate_at(es, lvl) }
    }

    fn abstract_at(&self, xs: &[Atom], lvl: usize) -> Binder {
        Binder { name: self.name.clone(), ty: self.ty.abstract_at(xs, lvl) }
    }
}

// Field `i` of a signature lives under `i` binders.
impl Bindable for Sig {
    fn instantiate_at(&self, es: &[Term], lvl: usize) -> Sig {
        self.iter()
            .enumerate()
            .map(|(i, field)| SigField {
                label: field.label.clone(),
                ty: field.ty.instantiate_at(es, lvl + i),
            })
            .collect()
    }

    fn abstract_at(&self, xs: &[Atom], lvl: usize) -> Sig {
        self.iter()
            .enumerate()
            .map(|(i, field)| SigField {
                label: field.label.clone(),
                ty: field.ty.abstract_at(xs, lvl + i),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AlphaEq, Ident, mk_type};

    fn binder(name: &str, ty: Ty) -> Binder {
        Binder { name: Ident::from_string(name), ty }
    }

    #[test]
    fn empty_substitution_is_pointer_identity() {
        let a = Atom::fresh("a");
        let term = mk_lambda(
            None,
            binder("x", Ty::from(mk_atom(&a, None))),
            mk_bound(0, None),
            Ty::from(mk_atom(&a, None)),
        );
        assert!(term.substitute(&[], &[]).ptr_eq(&term));
        assert!(term.instantiate_at(&[], 0).ptr_eq(&term));
        assert!(term.abstract_at(&[], 0).ptr_eq(&term));
    }

    #[test]
    fn abstract_then_unabstract_is_identity() {
        let a = Atom::fresh("a");
        let u = Atom::fresh("u");
        // body mentions the atom both directly and under a binder
        let body = mk_lambda(
            None,
            binder("y", Ty::from(mk_atom(&a, None))),
            mk_bound(0, None),
            Ty::from(mk_atom(&a, None)),
        );
        let opened = body.abstract_at(&[a.clone()], 0).unabstract(&[a.clone()]);
        assert!(opened.alpha_equal(&body));
        // a genuinely fresh atom produces a different term
        let other = body.abstract_at(&[a], 0).unabstract(&[u]);
        assert!(!other.alpha_equal(&body));
    }

    #[test]
    fn substitute_agrees_with_instantiate_of_abstract() {
        let a = Atom::fresh("a");
        let e = mk_type(None);
        let term = mk_eq(
            None,
            Ty::from(mk_type(None)),
            mk_atom(&a, None),
            mk_atom(&a, None),
        );
        let direct = term.substitute(&[a.clone()], std::slice::from_ref(&e));
        let composed = term.abstract_at(&[a], 0).instantiate_at(&[e], 0);
        assert!(direct.alpha_equal(&composed));
        assert!(!direct.assumptions().mem_bound_from(0));
    }

    #[test]
    fn instantiate_substitutes_and_shifts_under_binders() {
        let a = Atom::fresh("a");
        // Π (x : Type) => @1: the index under the binder is the one being
        // instantiated at the outer level 0.
        let prod = mk_prod(
            None,
            binder("x", Ty::from(mk_type(None))),
            Ty::from(mk_bound(1, None)),
        );
        let t = prod.instantiate_at(&[mk_atom(&a, None)], 0);
        match t.kind() {
            TermKind::Prod { cod, .. } => match cod.kind() {
                TermKind::Atom(b) => assert_eq!(b, &a),
                other => panic!("expected atom, got {other:?}"),
            },
            other => panic!("expected product, got {other:?}"),
        }
        // Π (x : Type) => @2: the index points past the substituted binder
        // and shifts down to fill the gap.
        let prod = mk_prod(
            None,
            binder("x", Ty::from(mk_type(None))),
            Ty::from(mk_bound(2, None)),
        );
        let t = prod.instantiate_at(&[mk_atom(&a, None)], 0);
        match t.kind() {
            TermKind::Prod { cod, .. } => match cod.kind() {
                TermKind::Bound(1) => {}
                other => panic!("expected @1, got {other:?}"),
            },
            other => panic!("expected product, got {other:?}"),
        }
    }
}
