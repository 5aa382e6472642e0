use super::{Binder, Sig, Term, TermKind, Ty};

/// Structural equality modulo binder names and source locations.
pub trait AlphaEq {
    fn alpha_equal(&self, other: &Self) -> bool;
}

impl AlphaEq for Term {
    fn alpha_equal(&self, other: &Term) -> bool {
        // Shared subterms are compared in constant time.
        if self.ptr_eq(other) {
            return true;
        }
        match (self.kind(), other.kind()) {
            (TermKind::Type, TermKind::Type) => true,
            (TermKind::Atom(a), TermKind::Atom(b)) => a == b,
            (TermKind::Bound(k), TermKind::Bound(l)) => k == l,
            (TermKind::Constant(c), TermKind::Constant(d)) => c == d,
            (
                TermKind::Lambda { binder: b1, body: e1, body_ty: t1 },
                TermKind::Lambda { binder: b2, body: e2, body_ty: t2 },
            ) => b1.alpha_equal(b2) && e1.alpha_equal(e2) && t1.alpha_equal(t2),
            (
                TermKind::Apply { head: h1, binder: b1, cod: c1, arg: a1 },
                TermKind::Apply { head: h2, binder: b2, cod: c2, arg: a2 },
            ) => {
                h1.alpha_equal(h2)
                    && b1.alpha_equal(b2)
                    && c1.alpha_equal(c2)
                    && a1.alpha_equal(a2)
            }
            (
                TermKind::Prod { binder: b1, cod: c1 },
                TermKind::Prod { binder: b2, cod: c2 },
            ) => b1.alpha_equal(b2) && c1.alpha_equal(c2),
            (
                TermKind::Eq { ty: t1, lhs: l1, rhs: r1 },
                TermKind::Eq { ty: t2, lhs: l2, rhs: r2 },
            ) => t1.alpha_equal(t2) && l1.alpha_equal(l2) && r1.alpha_equal(r2),
            (
                TermKind::Refl { ty: t1, term: e1 },
                TermKind::Refl { ty: t2, term: e2 },
            ) => t1.alpha_equal(t2) && e1.alpha_equal(e2),
            (TermKind::Signature(s1), TermKind::Signature(s2)) => s1.alpha_equal(s2),
            (
                TermKind::Structure { fields: s1, values: v1 },
                TermKind::Structure { fields: s2, values: v2 },
            ) => {
                s1.alpha_equal(s2)
                    && v1.len() == v2.len()
                    && v1.iter().zip(v2).all(|(a, b)| a.alpha_equal(b))
            }
            (
                TermKind::Projection { term: e1, fields: s1, label: l1 },
                TermKind::Projection { term: e2, fields: s2, label: l2 },
            ) => l1 == l2 && e1.alpha_equal(e2) && s1.alpha_equal(s2),
            _ => false,
        }
    }
}

impl AlphaEq for Ty {
    fn alpha_equal(&self, other: &Ty) -> bool {
        self.as_term().alpha_equal(other.as_term())
    }
}

impl AlphaEq for Binder {
    fn alpha_equal(&self, other: &Binder) -> bool {
        // The binder name is a printing hint.
        self.ty.alpha_equal(&other.ty)
    }
}

impl AlphaEq for Sig {
    fn alpha_equal(&self, other: &Sig) -> bool {
        // Field labels are part of the identity of a signature.
        self.len() == other.len()
            && self
                .iter()
                .zip(other)
                .all(|(a, b)| a.label == b.label && a.ty.alpha_equal(&b.ty))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Atom, Ident, mk_atom, mk_bound, mk_lambda, mk_prod, mk_type};

    fn binder(name: &str, ty: Ty) -> Binder {
        Binder { name: Ident::from_string(name), ty }
    }

    #[test]
    fn alpha_equal_is_reflexive() {
        let a = Atom::fresh("a");
        let term = mk_lambda(
            None,
            binder("x", Ty::from(mk_atom(&a, None))),
            mk_bound(0, None),
            Ty::from(mk_atom(&a, None)),
        );
        assert!(term.alpha_equal(&term));
        assert!(term.alpha_equal(&term.clone()));
    }

    #[test]
    fn binder_names_do_not_matter() {
        let dom = Ty::from(mk_type(None));
        let s = mk_prod(None, binder("x", dom.clone()), Ty::from(mk_bound(0, None)));
        let t = mk_prod(None, binder("y", dom), Ty::from(mk_bound(0, None)));
        assert!(s.alpha_equal(&t));
        assert!(t.alpha_equal(&s));
    }

    #[test]
    fn distinct_atoms_are_not_alpha_equal() {
        let a = Atom::fresh("a");
        let b = Atom::fresh("a");
        assert!(!mk_atom(&a, None).alpha_equal(&mk_atom(&b, None)));
    }
}
