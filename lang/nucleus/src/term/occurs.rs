use super::{Sig, Term, TermKind, Ty};

impl Term {
    /// Count the occurrences of the bound index `k`. Used when deciding how
    /// to display a binder, never for typing.
    pub fn occurs(&self, k: usize) -> usize {
        match self.kind() {
            TermKind::Type | TermKind::Atom(_) | TermKind::Constant(_) => 0,
            TermKind::Bound(l) => usize::from(*l == k),
            TermKind::Lambda { binder, body, body_ty } => {
                binder.ty.occurs(k) + body.occurs(k + 1) + body_ty.occurs(k + 1)
            }
            TermKind::Apply { head, binder, cod, arg } => {
                head.occurs(k) + binder.ty.occurs(k) + cod.occurs(k + 1) + arg.occurs(k)
            }
            TermKind::Prod { binder, cod } => binder.ty.occurs(k) + cod.occurs(k + 1),
            TermKind::Eq { ty, lhs, rhs } => ty.occurs(k) + lhs.occurs(k) + rhs.occurs(k),
            TermKind::Refl { ty, term } => ty.occurs(k) + term.occurs(k),
            TermKind::Signature(fields) => occurs_sig(fields, k),
            TermKind::Structure { fields, values } => {
                occurs_sig(fields, k) + values.iter().map(|v| v.occurs(k)).sum::<usize>()
            }
            TermKind::Projection { term, fields, .. } => term.occurs(k) + occurs_sig(fields, k),
        }
    }
}

impl Ty {
    pub fn occurs(&self, k: usize) -> usize {
        self.as_term().occurs(k)
    }
}

fn occurs_sig(fields: &Sig, k: usize) -> usize {
    fields.iter().enumerate().map(|(i, field)| field.ty.occurs(k + i)).sum()
}

#[cfg(test)]
mod tests {
    use crate::{Binder, Ident, Ty, mk_bound, mk_prod, mk_type};

    #[test]
    fn occurs_counts_under_binders() {
        // Π (x : Type) => @1 mentions the outer index 0 once
        let prod = mk_prod(
            None,
            Binder { name: Ident::from_string("x"), ty: Ty::from(mk_type(None)) },
            Ty::from(mk_bound(1, None)),
        );
        assert_eq!(prod.occurs(0), 1);
        assert_eq!(prod.occurs(1), 0);
    }
}
