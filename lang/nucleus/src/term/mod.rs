mod alpha;
mod occurs;
mod subst;

pub use alpha::AlphaEq;
pub use subst::Bindable;

use std::rc::Rc;

use pretty::DocAllocator;
use reflet_lang_miette_util::{HasSpan, Span};
use reflet_lang_printer::theme::ThemeExt;
use reflet_lang_printer::util::ParensIfExt;
use reflet_lang_printer::{Alloc, Builder, Precedence, Print, PrintCfg, tokens::*};

use crate::{AssumptionSet, Atom, Ident};

/// A named binder together with the type of the variable it binds.
///
/// The name is a printing hint only; the binding structure is de Bruijn.
/// Equality of terms is [`AlphaEq`], which ignores the name.
#[derive(Debug, Clone)]
pub struct Binder {
    pub name: Ident,
    pub ty: Ty,
}

/// One labelled field of a signature; the type may refer to the values of
/// earlier fields through bound indices (index 0 is the directly preceding
/// field).
#[derive(Debug, Clone)]
pub struct SigField {
    pub label: Ident,
    pub ty: Ty,
}

pub type Sig = Vec<SigField>;

/// The syntax of terms. Types are terms of sort `Type`; see [`Ty`].
#[derive(Debug, Clone)]
pub enum TermKind {
    /// The universe
    Type,
    /// A free variable
    Atom(Atom),
    /// A bound variable; 0 is the innermost binder
    Bound(usize),
    /// A constant declared in the signature
    Constant(Ident),
    /// `λ (x : A) => (e : B)`, with `e` and `B` under the binder
    Lambda { binder: Binder, body: Term, body_ty: Ty },
    /// An application, carrying the product type of its head
    Apply { head: Term, binder: Binder, cod: Ty, arg: Term },
    /// `Π (x : A) => B`
    Prod { binder: Binder, cod: Ty },
    /// The equality type `e1 == e2` at type `T`
    Eq { ty: Ty, lhs: Term, rhs: Term },
    /// The reflexivity witness `refl e` at type `T`
    Refl { ty: Ty, term: Term },
    /// A signature (record) type with dependent fields
    Signature(Sig),
    /// A structure inhabiting the given signature
    Structure { fields: Sig, values: Vec<Term> },
    /// Projection of a labelled field out of a term of signature type
    Projection { term: Term, fields: Sig, label: Ident },
}

#[derive(Debug)]
pub(crate) struct TermData {
    pub(crate) kind: TermKind,
    pub(crate) assumptions: AssumptionSet,
    pub(crate) span: Option<Span>,
}

/// A term of the theory.
///
/// Terms are immutable and cheaply cloneable. The only way to build one is
/// through the `mk_*` smart constructors in this module, which maintain the
/// invariant that `assumptions()` is the union of the assumptions of the
/// immediate subterms, with subterms under a binder wrapped by
/// [`AssumptionSet::bind`] first.
#[derive(Debug, Clone)]
pub struct Term(Rc<TermData>);

impl Term {
    fn new(kind: TermKind, assumptions: AssumptionSet, span: Option<Span>) -> Term {
        Term(Rc::new(TermData { kind, assumptions, span }))
    }

    pub fn kind(&self) -> &TermKind {
        &self.0.kind
    }

    pub fn assumptions(&self) -> &AssumptionSet {
        &self.0.assumptions
    }

    pub fn ptr_eq(&self, other: &Term) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl HasSpan for Term {
    fn span(&self) -> Option<Span> {
        self.0.span
    }
}

/// A term used as a type.
///
/// The wrapper prevents category errors in interfaces without duplicating
/// the syntax; whether the underlying term actually is a type is the
/// business of the judgement layer.
#[derive(Debug, Clone)]
pub struct Ty(Term);

impl Ty {
    pub fn as_term(&self) -> &Term {
        &self.0
    }

    pub fn into_term(self) -> Term {
        self.0
    }

    pub fn kind(&self) -> &TermKind {
        self.0.kind()
    }

    pub fn assumptions(&self) -> &AssumptionSet {
        self.0.assumptions()
    }

    pub fn ptr_eq(&self, other: &Ty) -> bool {
        self.0.ptr_eq(&other.0)
    }

    /// Whether this type is literally the universe.
    pub fn is_universe(&self) -> bool {
        matches!(self.kind(), TermKind::Type)
    }
}

impl From<Term> for Ty {
    fn from(term: Term) -> Self {
        Ty(term)
    }
}

impl HasSpan for Ty {
    fn span(&self) -> Option<Span> {
        self.0.span()
    }
}

// Smart constructors
//
// These are the only functions which create term nodes. Each one computes
// the assumption set of the new node from the assumption sets of its parts.

pub fn mk_type(span: Option<Span>) -> Term {
    Term::new(TermKind::Type, AssumptionSet::empty(), span)
}

pub fn mk_atom(atom: &Atom, span: Option<Span>) -> Term {
    Term::new(TermKind::Atom(atom.clone()), AssumptionSet::singleton(atom.clone()), span)
}

pub fn mk_bound(k: usize, span: Option<Span>) -> Term {
    Term::new(TermKind::Bound(k), AssumptionSet::bound(k), span)
}

pub fn mk_constant(name: &Ident, span: Option<Span>) -> Term {
    Term::new(TermKind::Constant(name.clone()), AssumptionSet::empty(), span)
}

pub fn mk_lambda(span: Option<Span>, binder: Binder, body: Term, body_ty: Ty) -> Term {
    let assumptions = binder
        .ty
        .assumptions()
        .clone()
        .union(&body.assumptions().bind(1))
        .union(&body_ty.assumptions().bind(1));
    Term::new(TermKind::Lambda { binder, body, body_ty }, assumptions, span)
}

pub fn mk_apply(span: Option<Span>, head: Term, binder: Binder, cod: Ty, arg: Term) -> Term {
    let assumptions = head
        .assumptions()
        .clone()
        .union(binder.ty.assumptions())
        .union(&cod.assumptions().bind(1))
        .union(arg.assumptions());
    Term::new(TermKind::Apply { head, binder, cod, arg }, assumptions, span)
}

pub fn mk_prod(span: Option<Span>, binder: Binder, cod: Ty) -> Term {
    let assumptions = binder.ty.assumptions().clone().union(&cod.assumptions().bind(1));
    Term::new(TermKind::Prod { binder, cod }, assumptions, span)
}

pub fn mk_eq(span: Option<Span>, ty: Ty, lhs: Term, rhs: Term) -> Term {
    let assumptions = ty
        .assumptions()
        .clone()
        .union(lhs.assumptions())
        .union(rhs.assumptions());
    Term::new(TermKind::Eq { ty, lhs, rhs }, assumptions, span)
}

pub fn mk_refl(span: Option<Span>, ty: Ty, term: Term) -> Term {
    let assumptions = ty.assumptions().clone().union(term.assumptions());
    Term::new(TermKind::Refl { ty, term }, assumptions, span)
}

fn sig_assumptions(fields: &Sig) -> AssumptionSet {
    let mut assumptions = AssumptionSet::empty();
    for (i, field) in fields.iter().enumerate() {
        assumptions = assumptions.union(&field.ty.assumptions().bind(i));
    }
    assumptions
}

pub fn mk_signature(span: Option<Span>, fields: Sig) -> Term {
    let assumptions = sig_assumptions(&fields);
    Term::new(TermKind::Signature(fields), assumptions, span)
}

pub fn mk_structure(span: Option<Span>, fields: Sig, values: Vec<Term>) -> Term {
    let mut assumptions = sig_assumptions(&fields);
    for value in &values {
        assumptions = assumptions.union(value.assumptions());
    }
    Term::new(TermKind::Structure { fields, values }, assumptions, span)
}

pub fn mk_projection(span: Option<Span>, term: Term, fields: Sig, label: Ident) -> Term {
    let assumptions = term.assumptions().clone().union(&sig_assumptions(&fields));
    Term::new(TermKind::Projection { term, fields, label }, assumptions, span)
}

// Printing

impl Print for Term {
    fn print_prec<'a>(
        &'a self,
        cfg: &PrintCfg,
        alloc: &'a Alloc<'a>,
        prec: Precedence,
    ) -> Builder<'a> {
        match self.kind() {
            TermKind::Type => alloc.former(TYPE),
            TermKind::Atom(atom) => atom.print_prec(cfg, alloc, prec),
            TermKind::Bound(k) => alloc.text(format!("{AT}{k}")),
            TermKind::Constant(name) => name.print_prec(cfg, alloc, prec),
            TermKind::Lambda { binder, body, .. } => alloc
                .former(LAMBDA)
                .append(alloc.space())
                .append(binder.print(cfg, alloc))
                .append(alloc.space())
                .append(FAT_ARROW)
                .append(alloc.space())
                .append(body.print(cfg, alloc))
                .parens_if(prec > Precedence::Exp),
            TermKind::Apply { head, arg, .. } => head
                .print_prec(cfg, alloc, Precedence::App)
                .append(alloc.space())
                .append(arg.print_prec(cfg, alloc, Precedence::Atom))
                .parens_if(prec > Precedence::App),
            TermKind::Prod { binder, cod } => {
                if cod.as_term().occurs(0) == 0 {
                    binder
                        .ty
                        .print_prec(cfg, alloc, Precedence::App)
                        .append(alloc.space())
                        .append(ARROW)
                        .append(alloc.space())
                        .append(cod.print(cfg, alloc))
                        .parens_if(prec > Precedence::Exp)
                } else {
                    alloc
                        .former(PROD)
                        .append(alloc.space())
                        .append(binder.print(cfg, alloc))
                        .append(alloc.space())
                        .append(FAT_ARROW)
                        .append(alloc.space())
                        .append(cod.print(cfg, alloc))
                        .parens_if(prec > Precedence::Exp)
                }
            }
            TermKind::Eq { lhs, rhs, .. } => lhs
                .print_prec(cfg, alloc, Precedence::App)
                .append(alloc.space())
                .append(JUDG_EQ)
                .append(alloc.space())
                .append(rhs.print_prec(cfg, alloc, Precedence::App))
                .parens_if(prec > Precedence::Exp),
            TermKind::Refl { term, .. } => alloc
                .former(REFL)
                .append(alloc.space())
                .append(term.print_prec(cfg, alloc, Precedence::Atom))
                .parens_if(prec > Precedence::App),
            TermKind::Signature(fields) => {
                let docs = fields.iter().map(|field| {
                    alloc
                        .tag(&field.label.id)
                        .append(alloc.space())
                        .append(COLON)
                        .append(alloc.space())
                        .append(field.ty.print(cfg, alloc))
                });
                alloc
                    .former(SIG)
                    .append(alloc.space())
                    .append(alloc.intersperse(docs, alloc.text(COMMA).append(alloc.space())).enclose("{", "}"))
            }
            TermKind::Structure { fields, values } => {
                let docs = fields.iter().zip(values).map(|(field, value)| {
                    alloc
                        .tag(&field.label.id)
                        .append(alloc.space())
                        .append(EQ)
                        .append(alloc.space())
                        .append(value.print(cfg, alloc))
                });
                alloc
                    .former(STRUCT)
                    .append(alloc.space())
                    .append(alloc.intersperse(docs, alloc.text(COMMA).append(alloc.space())).enclose("{", "}"))
            }
            TermKind::Projection { term, label, .. } => term
                .print_prec(cfg, alloc, Precedence::Atom)
                .append(DOT)
                .append(label.print(cfg, alloc)),
        }
    }
}

impl Print for Ty {
    fn print_prec<'a>(
        &'a self,
        cfg: &PrintCfg,
        alloc: &'a Alloc<'a>,
        prec: Precedence,
    ) -> Builder<'a> {
        self.0.print_prec(cfg, alloc, prec)
    }
}

impl Print for Binder {
    fn print_prec<'a>(
        &'a self,
        cfg: &PrintCfg,
        alloc: &'a Alloc<'a>,
        _prec: Precedence,
    ) -> Builder<'a> {
        self.name
            .print(cfg, alloc)
            .append(alloc.space())
            .append(COLON)
            .append(alloc.space())
            .append(self.ty.print(cfg, alloc))
            .enclose("(", ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Recompute the assumption set of a term from scratch, bypassing the
    /// cached sets maintained by the smart constructors.
    fn assumptions_of(term: &Term) -> AssumptionSet {
        fn of_ty(ty: &Ty) -> AssumptionSet {
            assumptions_of(ty.as_term())
        }
        fn of_sig(fields: &Sig) -> AssumptionSet {
            let mut acc = AssumptionSet::empty();
            for (i, field) in fields.iter().enumerate() {
                acc = acc.union(&of_ty(&field.ty).bind(i));
            }
            acc
        }
        match term.kind() {
            TermKind::Type | TermKind::Constant(_) => AssumptionSet::empty(),
            TermKind::Atom(a) => AssumptionSet::singleton(a.clone()),
            TermKind::Bound(k) => AssumptionSet::bound(*k),
            TermKind::Lambda { binder, body, body_ty } => of_ty(&binder.ty)
                .union(&assumptions_of(body).bind(1))
                .union(&of_ty(body_ty).bind(1)),
            TermKind::Apply { head, binder, cod, arg } => assumptions_of(head)
                .union(&of_ty(&binder.ty))
                .union(&of_ty(cod).bind(1))
                .union(&assumptions_of(arg)),
            TermKind::Prod { binder, cod } => {
                of_ty(&binder.ty).union(&of_ty(cod).bind(1))
            }
            TermKind::Eq { ty, lhs, rhs } => of_ty(ty)
                .union(&assumptions_of(lhs))
                .union(&assumptions_of(rhs)),
            TermKind::Refl { ty, term } => of_ty(ty).union(&assumptions_of(term)),
            TermKind::Signature(fields) => of_sig(fields),
            TermKind::Structure { fields, values } => {
                let mut acc = of_sig(fields);
                for v in values {
                    acc = acc.union(&assumptions_of(v));
                }
                acc
            }
            TermKind::Projection { term, fields, .. } => {
                assumptions_of(term).union(&of_sig(fields))
            }
        }
    }

    fn binder(name: &str, ty: Ty) -> Binder {
        Binder { name: Ident::from_string(name), ty }
    }

    #[test]
    fn lambda_assumptions_match_reference_traversal() {
        let a = Atom::fresh("a");
        let ty = Ty::from(mk_atom(&a, None));
        // λ (x : a) => x
        let term = mk_lambda(None, binder("x", ty.clone()), mk_bound(0, None), ty);
        assert_eq!(term.assumptions(), &assumptions_of(&term));
        assert!(term.assumptions().mem_atom(&a));
        assert!(!term.assumptions().mem_bound_from(0));
    }

    #[test]
    fn apply_assumptions_match_reference_traversal() {
        let a = Atom::fresh("a");
        let f = Atom::fresh("f");
        let dom = Ty::from(mk_type(None));
        let term = mk_apply(
            None,
            mk_atom(&f, None),
            binder("x", dom),
            Ty::from(mk_type(None)),
            mk_atom(&a, None),
        );
        assert_eq!(term.assumptions(), &assumptions_of(&term));
        assert!(term.assumptions().mem_atom(&a));
        assert!(term.assumptions().mem_atom(&f));
    }

    #[test]
    fn signature_assumptions_match_reference_traversal() {
        let a = Atom::fresh("a");
        let fields = vec![
            SigField { label: Ident::from_string("x"), ty: Ty::from(mk_atom(&a, None)) },
            SigField { label: Ident::from_string("y"), ty: Ty::from(mk_bound(0, None)) },
        ];
        let term = mk_signature(None, fields);
        assert_eq!(term.assumptions(), &assumptions_of(&term));
        assert!(!term.assumptions().mem_bound_from(0));
    }
}
