use log::trace;
use pretty::DocAllocator;
use reflet_lang_miette_util::{HasSpan, Span, ToMiette};
use reflet_lang_printer::theme::ThemeExt;
use reflet_lang_printer::{Alloc, Builder, Precedence, Print, PrintCfg, tokens::*};

use crate::{
    Abstraction, AlphaEq, AssumptionSet, Atom, Bindable, Binder, Ident, NucleusError, Signature,
    Term, TermKind, Ty, mk_apply, mk_constant, mk_eq, mk_lambda, mk_prod, mk_projection, mk_refl,
    mk_signature, mk_structure, mk_type,
};

type Result<T> = std::result::Result<T, NucleusError>;

/// The head of a premise or conclusion: what kind of judgement it asks for.
#[derive(Debug, Clone)]
pub enum Boundary {
    IsType,
    IsTerm(Ty),
}

/// `⊢ T type`
#[derive(Debug, Clone)]
pub struct JdgIsType {
    pub(crate) assumptions: AssumptionSet,
    pub(crate) ty: Ty,
}

/// `⊢ e : T`
#[derive(Debug, Clone)]
pub struct JdgIsTerm {
    pub(crate) assumptions: AssumptionSet,
    pub(crate) term: Term,
    pub(crate) ty: Ty,
}

/// `⊢ T1 ≡ T2`
#[derive(Debug, Clone)]
pub struct JdgEqType {
    pub(crate) assumptions: AssumptionSet,
    pub(crate) lhs: Ty,
    pub(crate) rhs: Ty,
}

/// `⊢ e1 ≡ e2 : T`
#[derive(Debug, Clone)]
pub struct JdgEqTerm {
    pub(crate) assumptions: AssumptionSet,
    pub(crate) lhs: Term,
    pub(crate) rhs: Term,
    pub(crate) ty: Ty,
}

/// A derivable proposition of the theory.
///
/// The four variants wrap payloads whose constructors are private to this
/// crate; every way of obtaining a judgement goes through an inference rule
/// below. Downstream code inspects judgements through the accessors and
/// `invert` methods, which hand out copies.
#[derive(Debug, Clone)]
pub enum Judgement {
    IsType(JdgIsType),
    IsTerm(JdgIsTerm),
    EqType(JdgEqType),
    EqTerm(JdgEqTerm),
}

/// Discharge an atom from an assumption set when it is captured by a new
/// binder: the atom turns into the bound index of the binder, which is then
/// no longer free in the enclosing judgement.
fn discharge(asmp: &AssumptionSet, atom: &Atom) -> AssumptionSet {
    asmp.abstract_atoms(std::slice::from_ref(atom), 0).bind(1)
}

impl JdgIsType {
    /// `Type` is a type.
    pub fn universe(span: Option<Span>) -> JdgIsType {
        JdgIsType { assumptions: AssumptionSet::empty(), ty: Ty::from(mk_type(span)) }
    }

    /// Π-formation: from an atom `x : A` and a type `B` possibly mentioning
    /// it, form `Π (x : A) => B`. The atom is discharged.
    pub fn prod(sgn: &Signature, name: Ident, atom: &Atom, cod: &JdgIsType) -> Result<JdgIsType> {
        let dom = sgn.atom_ty(atom).ok_or_else(|| NucleusError::unknown_atom(atom))?.clone();
        let span = cod.ty.span();
        let cod_ty = cod.ty.abstract_at(std::slice::from_ref(atom), 0);
        let assumptions =
            discharge(&cod.assumptions, atom).union(dom.assumptions());
        let ty = Ty::from(mk_prod(span, Binder { name, ty: dom }, cod_ty));
        Ok(JdgIsType { assumptions, ty })
    }

    /// Eq-formation: both endpoints must inhabit the same type up to α.
    pub fn eq(lhs: &JdgIsTerm, rhs: &JdgIsTerm, span: Option<Span>) -> Result<JdgIsType> {
        if !lhs.ty.alpha_equal(&rhs.ty) {
            return Err(NucleusError::type_mismatch(&lhs.ty, &rhs.ty));
        }
        let assumptions = lhs.assumptions.clone().union(&rhs.assumptions);
        let ty = Ty::from(mk_eq(span, lhs.ty.clone(), lhs.term.clone(), rhs.term.clone()));
        Ok(JdgIsType { assumptions, ty })
    }

    /// Signature formation from a telescope of labelled atoms; each later
    /// atom's type may mention the earlier atoms, which are all discharged.
    pub fn signature_ty(
        sgn: &Signature,
        fields: &[(Ident, Atom)],
        span: Option<Span>,
    ) -> Result<JdgIsType> {
        let mut packaged = Vec::with_capacity(fields.len());
        let mut seen: Vec<Atom> = Vec::with_capacity(fields.len());
        let mut assumptions = AssumptionSet::empty();
        for (label, atom) in fields {
            let ty = sgn.atom_ty(atom).ok_or_else(|| NucleusError::unknown_atom(atom))?;
            assumptions = assumptions.union(&ty.assumptions().abstract_atoms(&seen, 0).bind(seen.len()));
            packaged.push(crate::SigField { label: label.clone(), ty: ty.abstract_at(&seen, 0) });
            // nearest atom first for subsequent captures
            seen.insert(0, atom.clone());
        }
        Ok(JdgIsType { assumptions, ty: Ty::from(mk_signature(span, packaged)) })
    }

    /// The domain of a product type as a judgement.
    pub fn domain(&self) -> Option<JdgIsType> {
        match self.ty.kind() {
            TermKind::Prod { binder, .. } => Some(JdgIsType {
                assumptions: self.assumptions.clone().union(binder.ty.assumptions()),
                ty: binder.ty.clone(),
            }),
            _ => None,
        }
    }

    /// Inversion for products: open the Π with a fresh atom for the domain
    /// and return it together with the instantiated codomain.
    pub fn invert_prod(&self, sgn: &mut Signature) -> Option<(Atom, JdgIsType)> {
        match self.ty.kind() {
            TermKind::Prod { binder, cod } => {
                let atom = sgn.fresh_atom_raw(&binder.name.id, binder.ty.clone());
                let cod = cod.unabstract(std::slice::from_ref(&atom));
                let assumptions = self
                    .assumptions
                    .clone()
                    .union(&AssumptionSet::singleton(atom.clone()));
                Some((atom, JdgIsType { assumptions, ty: cod }))
            }
            _ => None,
        }
    }

    /// Inversion for equality types: recover the type and both endpoints as
    /// judgements.
    pub fn invert_eq(&self) -> Option<(JdgIsType, JdgIsTerm, JdgIsTerm)> {
        match self.ty.kind() {
            TermKind::Eq { ty, lhs, rhs } => {
                let ty_jdg =
                    JdgIsType { assumptions: self.assumptions.clone(), ty: ty.clone() };
                let lhs = JdgIsTerm {
                    assumptions: self.assumptions.clone(),
                    term: lhs.clone(),
                    ty: ty.clone(),
                };
                let rhs = JdgIsTerm {
                    assumptions: self.assumptions.clone(),
                    term: rhs.clone(),
                    ty: ty.clone(),
                };
                Some((ty_jdg, lhs, rhs))
            }
            _ => None,
        }
    }

    /// The telescope of a signature type, if this is one.
    pub fn invert_signature(&self) -> Option<&crate::Sig> {
        match self.ty.kind() {
            TermKind::Signature(fields) => Some(fields),
            _ => None,
        }
    }

    /// The expected type of the field at `index` in a signature type, given
    /// the judgements of the earlier field values.
    pub fn signature_field_ty(
        &self,
        index: usize,
        prior: &[JdgIsTerm],
    ) -> Result<JdgIsType> {
        let fields = match self.ty.kind() {
            TermKind::Signature(fields) => fields,
            _ => return Err(NucleusError::expected_signature(&self.ty)),
        };
        let field = fields
            .get(index)
            .ok_or_else(|| NucleusError::impossible("field index out of range"))?;
        // nearest field first
        let mut es: Vec<Term> = Vec::with_capacity(index);
        let mut assumptions = self.assumptions.clone();
        for value in prior.iter().take(index) {
            es.insert(0, value.term.clone());
            assumptions = assumptions.union(&value.assumptions);
        }
        Ok(JdgIsType { assumptions, ty: field.ty.instantiate_at(&es, 0) })
    }

    /// A type is a term of sort `Type`.
    pub fn to_is_term(&self) -> JdgIsTerm {
        JdgIsTerm {
            assumptions: self.assumptions.clone(),
            term: self.ty.as_term().clone(),
            ty: Ty::from(mk_type(None)),
        }
    }

    pub fn ty(&self) -> &Ty {
        &self.ty
    }

    pub fn assumptions(&self) -> &AssumptionSet {
        &self.assumptions
    }
}

impl JdgIsTerm {
    /// `Type : Type`. The universe is cumulative in itself.
    pub fn universe(span: Option<Span>) -> JdgIsTerm {
        JdgIsTerm {
            assumptions: AssumptionSet::empty(),
            term: mk_type(span),
            ty: Ty::from(mk_type(None)),
        }
    }

    /// Use of a hypothesis: an atom interned in the signature's atom table.
    pub fn atom(sgn: &Signature, atom: &Atom, span: Option<Span>) -> Result<JdgIsTerm> {
        let ty = sgn.atom_ty(atom).ok_or_else(|| NucleusError::unknown_atom(atom))?.clone();
        let assumptions = AssumptionSet::singleton(atom.clone()).union(ty.assumptions());
        Ok(JdgIsTerm { assumptions, term: crate::mk_atom(atom, span), ty })
    }

    /// Use of a declared constant or rule head.
    pub fn constant(sgn: &Signature, name: &Ident, span: Option<Span>) -> Result<JdgIsTerm> {
        let ty =
            sgn.constant_ty(name).ok_or_else(|| NucleusError::unknown_ident(name))?.clone();
        let assumptions = ty.assumptions().clone();
        Ok(JdgIsTerm { assumptions, term: mk_constant(name, span), ty })
    }

    /// Π-introduction: abstract the atom `x` out of the body. The atom is
    /// discharged from the assumptions.
    pub fn lambda(
        sgn: &Signature,
        name: Ident,
        atom: &Atom,
        body: &JdgIsTerm,
        span: Option<Span>,
    ) -> Result<JdgIsTerm> {
        let dom = sgn.atom_ty(atom).ok_or_else(|| NucleusError::unknown_atom(atom))?.clone();
        let body_term = body.term.abstract_at(std::slice::from_ref(atom), 0);
        let body_ty = body.ty.abstract_at(std::slice::from_ref(atom), 0);
        let binder = Binder { name, ty: dom };
        let assumptions =
            discharge(&body.assumptions, atom).union(binder.ty.assumptions());
        let term = mk_lambda(span, binder.clone(), body_term, body_ty.clone());
        let ty = Ty::from(mk_prod(None, binder, body_ty));
        Ok(JdgIsTerm { assumptions, term, ty })
    }

    /// Π-elimination. The argument must inhabit the domain up to α; callers
    /// which cannot establish that go through the coercion protocol first.
    pub fn apply(head: &JdgIsTerm, arg: &JdgIsTerm, span: Option<Span>) -> Result<JdgIsTerm> {
        let (binder, cod) = match head.ty.kind() {
            TermKind::Prod { binder, cod } => (binder.clone(), cod.clone()),
            _ => return Err(NucleusError::expected_product(&head.ty)),
        };
        if !arg.ty.alpha_equal(&binder.ty) {
            return Err(NucleusError::type_mismatch(&binder.ty, &arg.ty));
        }
        let ty = cod.instantiate_at(std::slice::from_ref(&arg.term), 0);
        let assumptions = head.assumptions.clone().union(&arg.assumptions);
        let term = mk_apply(span, head.term.clone(), binder, cod, arg.term.clone());
        Ok(JdgIsTerm { assumptions, term, ty })
    }

    /// Refl-introduction: `refl e : e == e`.
    pub fn refl(e: &JdgIsTerm, span: Option<Span>) -> JdgIsTerm {
        let term = mk_refl(span, e.ty.clone(), e.term.clone());
        let ty = Ty::from(mk_eq(None, e.ty.clone(), e.term.clone(), e.term.clone()));
        JdgIsTerm { assumptions: e.assumptions.clone(), term, ty }
    }

    /// Structure introduction: the field values must fit the signature's
    /// telescope, each field type instantiated with the earlier values.
    pub fn structure(
        sig: &JdgIsType,
        values: &[JdgIsTerm],
        span: Option<Span>,
    ) -> Result<JdgIsTerm> {
        let fields = match sig.ty.kind() {
            TermKind::Signature(fields) => fields.clone(),
            _ => return Err(NucleusError::expected_signature(&sig.ty)),
        };
        if fields.len() != values.len() {
            return Err(NucleusError::FieldCountMismatch {
                expected: fields.len(),
                actual: values.len(),
                span: span.to_miette(),
            });
        }
        let mut assumptions = sig.assumptions.clone();
        let mut prior: Vec<Term> = Vec::with_capacity(values.len());
        for (field, value) in fields.iter().zip(values) {
            let expected = field.ty.instantiate_at(&prior, 0);
            if !value.ty.alpha_equal(&expected) {
                return Err(NucleusError::type_mismatch(&expected, &value.ty));
            }
            assumptions = assumptions.union(&value.assumptions);
            prior.insert(0, value.term.clone());
        }
        let term =
            mk_structure(span, fields, values.iter().map(|v| v.term.clone()).collect());
        Ok(JdgIsTerm { assumptions, term, ty: sig.ty.clone() })
    }

    /// Projection elimination: `e.l` at the field type instantiated with the
    /// projections of the earlier fields.
    pub fn projection(e: &JdgIsTerm, label: &Ident, span: Option<Span>) -> Result<JdgIsTerm> {
        let fields = match e.ty.kind() {
            TermKind::Signature(fields) => fields.clone(),
            _ => return Err(NucleusError::expected_signature(&e.ty)),
        };
        let ty = projection_ty(&e.term, &fields, label)?;
        let term = mk_projection(span, e.term.clone(), fields, label.clone());
        Ok(JdgIsTerm { assumptions: e.assumptions.clone(), term, ty })
    }

    /// Universe cumulativity: a term of type `Type` is a type.
    pub fn to_is_type(&self) -> Result<JdgIsType> {
        if !self.ty.is_universe() {
            return Err(NucleusError::expected_universe(&self.ty));
        }
        Ok(JdgIsType { assumptions: self.assumptions.clone(), ty: Ty::from(self.term.clone()) })
    }

    /// Conversion: transport the term along a proven type equality.
    pub fn convert(&self, eq: &JdgEqType) -> Result<JdgIsTerm> {
        if !eq.lhs.alpha_equal(&self.ty) {
            return Err(NucleusError::type_mismatch(&eq.lhs, &self.ty));
        }
        Ok(JdgIsTerm {
            assumptions: self.assumptions.clone().union(&eq.assumptions),
            term: self.term.clone(),
            ty: eq.rhs.clone(),
        })
    }

    /// The presupposed typing judgement of the term's type.
    pub fn type_of(&self) -> JdgIsType {
        JdgIsType { assumptions: self.assumptions.clone(), ty: self.ty.clone() }
    }

    // Inversion principles. Subterms of a derivable judgement are
    // themselves derivable; these are the only way pattern matching takes a
    // judgement apart.

    /// Invert an application into its head and argument judgements.
    pub fn invert_apply(&self) -> Option<(JdgIsTerm, JdgIsTerm)> {
        match self.term.kind() {
            TermKind::Apply { head, binder, cod, arg } => {
                let head_jdg = JdgIsTerm {
                    assumptions: self.assumptions.clone(),
                    term: head.clone(),
                    ty: Ty::from(mk_prod(None, binder.clone(), cod.clone())),
                };
                let arg_jdg = JdgIsTerm {
                    assumptions: self.assumptions.clone(),
                    term: arg.clone(),
                    ty: binder.ty.clone(),
                };
                Some((head_jdg, arg_jdg))
            }
            _ => None,
        }
    }

    /// Invert a lambda by opening its binder with a fresh atom.
    pub fn invert_lambda(&self, sgn: &mut Signature) -> Option<(Atom, JdgIsTerm)> {
        match self.term.kind() {
            TermKind::Lambda { binder, body, body_ty } => {
                let atom = sgn.fresh_atom_raw(&binder.name.id, binder.ty.clone());
                let xs = std::slice::from_ref(&atom);
                let assumptions = self
                    .assumptions
                    .clone()
                    .union(&AssumptionSet::singleton(atom.clone()));
                let body = JdgIsTerm {
                    assumptions,
                    term: body.unabstract(xs),
                    ty: body_ty.unabstract(xs),
                };
                Some((atom, body))
            }
            _ => None,
        }
    }

    /// Invert a reflexivity witness into the underlying term judgement.
    pub fn invert_refl(&self) -> Option<JdgIsTerm> {
        match self.term.kind() {
            TermKind::Refl { ty, term } => Some(JdgIsTerm {
                assumptions: self.assumptions.clone(),
                term: term.clone(),
                ty: ty.clone(),
            }),
            _ => None,
        }
    }

    /// Invert a projection into the judgement of the projected structure.
    pub fn invert_projection(&self) -> Option<JdgIsTerm> {
        match self.term.kind() {
            TermKind::Projection { term, fields, .. } => Some(JdgIsTerm {
                assumptions: self.assumptions.clone(),
                term: term.clone(),
                ty: Ty::from(mk_signature(None, fields.clone())),
            }),
            _ => None,
        }
    }

    pub fn term(&self) -> &Term {
        &self.term
    }

    pub fn ty(&self) -> &Ty {
        &self.ty
    }

    pub fn assumptions(&self) -> &AssumptionSet {
        &self.assumptions
    }
}

impl JdgEqType {
    /// The α-equality fast path. The witness carries no assumptions: the
    /// equation holds by syntax alone.
    pub fn alpha(lhs: &JdgIsType, rhs: &JdgIsType) -> Option<JdgEqType> {
        if lhs.ty.alpha_equal(&rhs.ty) {
            trace!("α-equal types: {}", lhs.ty.print_to_string(None));
            Some(JdgEqType {
                assumptions: AssumptionSet::empty(),
                lhs: lhs.ty.clone(),
                rhs: rhs.ty.clone(),
            })
        } else {
            None
        }
    }

    /// Equality reflection at the level of types: from `p : T1 == T2` where
    /// both endpoints are types, conclude `T1 ≡ T2`.
    pub fn reflect(p: &JdgIsTerm) -> Result<JdgEqType> {
        let eq = JdgEqTerm::reflect(p)?;
        Ok(JdgEqType {
            assumptions: eq.assumptions,
            lhs: Ty::from(eq.lhs),
            rhs: Ty::from(eq.rhs),
        })
    }

    pub fn symmetry(&self) -> JdgEqType {
        JdgEqType {
            assumptions: self.assumptions.clone(),
            lhs: self.rhs.clone(),
            rhs: self.lhs.clone(),
        }
    }

    pub fn transitivity(&self, other: &JdgEqType) -> Result<JdgEqType> {
        if !self.rhs.alpha_equal(&other.lhs) {
            return Err(NucleusError::type_mismatch(&self.rhs, &other.lhs));
        }
        Ok(JdgEqType {
            assumptions: self.assumptions.clone().union(&other.assumptions),
            lhs: self.lhs.clone(),
            rhs: other.rhs.clone(),
        })
    }

    /// Expose the payload for the equality engine's endpoint checks.
    pub fn invert(&self) -> (AssumptionSet, Ty, Ty) {
        (self.assumptions.clone(), self.lhs.clone(), self.rhs.clone())
    }

    /// The left endpoint as a type judgement (presupposition of the
    /// equation).
    pub fn lhs_judgement(&self) -> JdgIsType {
        JdgIsType { assumptions: self.assumptions.clone(), ty: self.lhs.clone() }
    }

    /// The right endpoint as a type judgement.
    pub fn rhs_judgement(&self) -> JdgIsType {
        JdgIsType { assumptions: self.assumptions.clone(), ty: self.rhs.clone() }
    }

    pub fn lhs(&self) -> &Ty {
        &self.lhs
    }

    pub fn rhs(&self) -> &Ty {
        &self.rhs
    }

    pub fn assumptions(&self) -> &AssumptionSet {
        &self.assumptions
    }
}

impl JdgEqTerm {
    /// The α-equality fast path at a common type. The witness carries no
    /// assumptions.
    pub fn alpha(lhs: &JdgIsTerm, rhs: &JdgIsTerm) -> Option<JdgEqTerm> {
        if lhs.ty.alpha_equal(&rhs.ty) && lhs.term.alpha_equal(&rhs.term) {
            trace!("α-equal terms: {}", lhs.term.print_to_string(None));
            Some(JdgEqTerm {
                assumptions: AssumptionSet::empty(),
                lhs: lhs.term.clone(),
                rhs: rhs.term.clone(),
                ty: lhs.ty.clone(),
            })
        } else {
            None
        }
    }

    /// Equality reflection: a proof of `Eq T e1 e2` yields the judgemental
    /// equality `e1 ≡ e2 : T`. The conclusion inherits every hypothesis of
    /// the proof; this is what the assumption sets exist for.
    pub fn reflect(p: &JdgIsTerm) -> Result<JdgEqTerm> {
        match p.ty.kind() {
            TermKind::Eq { ty, lhs, rhs } => Ok(JdgEqTerm {
                assumptions: p.assumptions.clone(),
                lhs: lhs.clone(),
                rhs: rhs.clone(),
                ty: ty.clone(),
            }),
            _ => Err(NucleusError::expected_equality(&p.ty)),
        }
    }

    pub fn symmetry(&self) -> JdgEqTerm {
        JdgEqTerm {
            assumptions: self.assumptions.clone(),
            lhs: self.rhs.clone(),
            rhs: self.lhs.clone(),
            ty: self.ty.clone(),
        }
    }

    pub fn transitivity(&self, other: &JdgEqTerm) -> Result<JdgEqTerm> {
        if !self.ty.alpha_equal(&other.ty) {
            return Err(NucleusError::type_mismatch(&self.ty, &other.ty));
        }
        if !self.rhs.alpha_equal(&other.lhs) {
            return Err(NucleusError::NotAlphaEqual {
                lhs: self.rhs.print_to_string(None),
                rhs: other.lhs.print_to_string(None),
                span: None,
            });
        }
        Ok(JdgEqTerm {
            assumptions: self.assumptions.clone().union(&other.assumptions),
            lhs: self.lhs.clone(),
            rhs: other.rhs.clone(),
            ty: self.ty.clone(),
        })
    }

    /// Expose the payload for the equality engine's endpoint checks.
    pub fn invert(&self) -> (AssumptionSet, Term, Term, Ty) {
        (self.assumptions.clone(), self.lhs.clone(), self.rhs.clone(), self.ty.clone())
    }

    /// The left endpoint as a term judgement (presupposition of the
    /// equation).
    pub fn lhs_judgement(&self) -> JdgIsTerm {
        JdgIsTerm {
            assumptions: self.assumptions.clone(),
            term: self.lhs.clone(),
            ty: self.ty.clone(),
        }
    }

    /// The right endpoint as a term judgement.
    pub fn rhs_judgement(&self) -> JdgIsTerm {
        JdgIsTerm {
            assumptions: self.assumptions.clone(),
            term: self.rhs.clone(),
            ty: self.ty.clone(),
        }
    }

    /// The type the equation lives at, as a type judgement.
    pub fn ty_judgement(&self) -> JdgIsType {
        JdgIsType { assumptions: self.assumptions.clone(), ty: self.ty.clone() }
    }

    pub fn lhs(&self) -> &Term {
        &self.lhs
    }

    pub fn rhs(&self) -> &Term {
        &self.rhs
    }

    pub fn ty(&self) -> &Ty {
        &self.ty
    }

    pub fn assumptions(&self) -> &AssumptionSet {
        &self.assumptions
    }
}

impl From<JdgIsType> for Judgement {
    fn from(j: JdgIsType) -> Self {
        Judgement::IsType(j)
    }
}

impl From<JdgIsTerm> for Judgement {
    fn from(j: JdgIsTerm) -> Self {
        Judgement::IsTerm(j)
    }
}

impl From<JdgEqType> for Judgement {
    fn from(j: JdgEqType) -> Self {
        Judgement::EqType(j)
    }
}

impl From<JdgEqTerm> for Judgement {
    fn from(j: JdgEqTerm) -> Self {
        Judgement::EqTerm(j)
    }
}

impl Judgement {
    pub fn assumptions(&self) -> &AssumptionSet {
        match self {
            Judgement::IsType(j) => &j.assumptions,
            Judgement::IsTerm(j) => &j.assumptions,
            Judgement::EqType(j) => &j.assumptions,
            Judgement::EqTerm(j) => &j.assumptions,
        }
    }
}

/// Compute the type of a kernel-built term without re-checking it.
///
/// Every case reads off the annotations the smart constructors store, so
/// this is linear in the depth of the head of the term.
pub fn type_of_term(sgn: &Signature, term: &Term) -> Result<Ty> {
    match term.kind() {
        TermKind::Type => Ok(Ty::from(mk_type(None))),
        TermKind::Atom(atom) => {
            sgn.atom_ty(atom).cloned().ok_or_else(|| NucleusError::unknown_atom(atom))
        }
        TermKind::Bound(k) => {
            Err(NucleusError::impossible(format!("dangling bound index {k}")))
        }
        TermKind::Constant(name) => {
            sgn.constant_ty(name).cloned().ok_or_else(|| NucleusError::unknown_ident(name))
        }
        TermKind::Lambda { binder, body_ty, .. } => {
            Ok(Ty::from(mk_prod(None, binder.clone(), body_ty.clone())))
        }
        TermKind::Apply { cod, arg, .. } => {
            Ok(cod.instantiate_at(std::slice::from_ref(arg), 0))
        }
        TermKind::Prod { .. } | TermKind::Eq { .. } | TermKind::Signature(_) => {
            Ok(Ty::from(mk_type(None)))
        }
        TermKind::Refl { ty, term } => {
            Ok(Ty::from(mk_eq(None, ty.clone(), term.clone(), term.clone())))
        }
        TermKind::Structure { fields, .. } => {
            Ok(Ty::from(mk_signature(None, fields.clone())))
        }
        TermKind::Projection { term, fields, label } => projection_ty(term, fields, label),
    }
}

/// Compute the type of a term under a spine of binders, opening each binder
/// with a fresh atom and closing it again in the result.
pub fn type_of_term_abstraction(
    sgn: &mut Signature,
    abstr: &Abstraction<Term>,
) -> Result<Abstraction<Ty>> {
    match abstr {
        Abstraction::NotAbstract(term) => {
            Ok(Abstraction::NotAbstract(type_of_term(sgn, term)?))
        }
        Abstraction::Abstract { binder, body } => {
            let atom = sgn.fresh_atom_raw(&binder.name.id, binder.ty.clone());
            let opened = body.unabstract(std::slice::from_ref(&atom));
            let body_ty = type_of_term_abstraction(sgn, &opened)?;
            Ok(Abstraction::Abstract {
                binder: binder.clone(),
                body: Box::new(body_ty.abstract_at(std::slice::from_ref(&atom), 0)),
            })
        }
    }
}

/// α-equality of terms lifted through binder spines.
pub fn alpha_equal_abstraction(a: &Abstraction<Term>, b: &Abstraction<Term>) -> bool {
    a.alpha_equal(b)
}

/// Close a judgement value over an atom, turning it into an abstraction with
/// one more binder. The binder's type comes from the atom table.
pub fn abstract_judgement(
    sgn: &Signature,
    name: Ident,
    atom: &Atom,
    abstr: Abstraction<Judgement>,
) -> Result<Abstraction<Judgement>> {
    let ty = sgn.atom_ty(atom).ok_or_else(|| NucleusError::unknown_atom(atom))?.clone();
    Ok(Abstraction::abstract_over(name, ty, atom, abstr))
}

/// Open the outermost binder of an abstracted judgement with a fresh atom.
pub fn invert_abstraction(
    sgn: &mut Signature,
    abstr: &Abstraction<Judgement>,
) -> Option<(Atom, Abstraction<Judgement>)> {
    match abstr {
        Abstraction::NotAbstract(_) => None,
        Abstraction::Abstract { binder, body } => {
            let atom = sgn.fresh_atom_raw(&binder.name.id, binder.ty.clone());
            let opened = body.unabstract(std::slice::from_ref(&atom));
            Some((atom, opened))
        }
    }
}

/// Substitute a term judgement for the outermost binder of an abstracted
/// judgement. The argument must inhabit the binder's type up to α; callers
/// go through the coercion protocol first otherwise.
pub fn instantiate_abstraction(
    abstr: &Abstraction<Judgement>,
    arg: &JdgIsTerm,
) -> Result<Abstraction<Judgement>> {
    match abstr {
        Abstraction::NotAbstract(_) => {
            Err(NucleusError::impossible("instantiating a non-abstracted judgement"))
        }
        Abstraction::Abstract { binder, body } => {
            if !arg.ty.alpha_equal(&binder.ty) {
                return Err(NucleusError::type_mismatch(&binder.ty, &arg.ty));
            }
            Ok(body.instantiate_at(std::slice::from_ref(&arg.term), 0))
        }
    }
}

impl Abstraction<Judgement> {
    /// The type of the outermost binder as a judgement. The spine of a
    /// kernel-built abstraction only ever carries types read off existing
    /// judgements.
    pub fn binder_ty(&self) -> Option<JdgIsType> {
        match self {
            Abstraction::NotAbstract(_) => None,
            Abstraction::Abstract { binder, .. } => Some(JdgIsType {
                assumptions: binder.ty.assumptions().clone(),
                ty: binder.ty.clone(),
            }),
        }
    }
}

fn projection_ty(term: &Term, fields: &crate::Sig, label: &Ident) -> Result<Ty> {
    let index = fields.iter().position(|field| &field.label == label).ok_or_else(|| {
        NucleusError::UnknownField { label: label.id.clone(), span: label.span().to_miette() }
    })?;
    // Earlier fields are referenced through projections of the term itself,
    // nearest field first.
    let mut prior: Vec<Term> = Vec::with_capacity(index);
    for field in fields.iter().take(index) {
        prior.insert(
            0,
            mk_projection(None, term.clone(), fields.clone(), field.label.clone()),
        );
    }
    Ok(fields[index].ty.instantiate_at(&prior, 0))
}

impl Bindable for Judgement {
    fn instantiate_at(&self, es: &[Term], lvl: usize) -> Self {
        let hs: Vec<AssumptionSet> = es.iter().map(|e| e.assumptions().clone()).collect();
        match self {
            Judgement::IsType(j) => Judgement::IsType(JdgIsType {
                assumptions: j.assumptions.instantiate(&hs, lvl),
                ty: j.ty.instantiate_at(es, lvl),
            }),
            Judgement::IsTerm(j) => Judgement::IsTerm(JdgIsTerm {
                assumptions: j.assumptions.instantiate(&hs, lvl),
                term: j.term.instantiate_at(es, lvl),
                ty: j.ty.instantiate_at(es, lvl),
            }),
            Judgement::EqType(j) => Judgement::EqType(JdgEqType {
                assumptions: j.assumptions.instantiate(&hs, lvl),
                lhs: j.lhs.instantiate_at(es, lvl),
                rhs: j.rhs.instantiate_at(es, lvl),
            }),
            Judgement::EqTerm(j) => Judgement::EqTerm(JdgEqTerm {
                assumptions: j.assumptions.instantiate(&hs, lvl),
                lhs: j.lhs.instantiate_at(es, lvl),
                rhs: j.rhs.instantiate_at(es, lvl),
                ty: j.ty.instantiate_at(es, lvl),
            }),
        }
    }

    fn abstract_at(&self, xs: &[Atom], lvl: usize) -> Self {
        match self {
            Judgement::IsType(j) => Judgement::IsType(JdgIsType {
                assumptions: j.assumptions.abstract_atoms(xs, lvl),
                ty: j.ty.abstract_at(xs, lvl),
            }),
            Judgement::IsTerm(j) => Judgement::IsTerm(JdgIsTerm {
                assumptions: j.assumptions.abstract_atoms(xs, lvl),
                term: j.term.abstract_at(xs, lvl),
                ty: j.ty.abstract_at(xs, lvl),
            }),
            Judgement::EqType(j) => Judgement::EqType(JdgEqType {
                assumptions: j.assumptions.abstract_atoms(xs, lvl),
                lhs: j.lhs.abstract_at(xs, lvl),
                rhs: j.rhs.abstract_at(xs, lvl),
            }),
            Judgement::EqTerm(j) => Judgement::EqTerm(JdgEqTerm {
                assumptions: j.assumptions.abstract_atoms(xs, lvl),
                lhs: j.lhs.abstract_at(xs, lvl),
                rhs: j.rhs.abstract_at(xs, lvl),
                ty: j.ty.abstract_at(xs, lvl),
            }),
        }
    }
}

impl Print for Judgement {
    fn print_prec<'a>(
        &'a self,
        cfg: &PrintCfg,
        alloc: &'a Alloc<'a>,
        _prec: Precedence,
    ) -> Builder<'a> {
        let turnstile = alloc.judgement(TURNSTILE).append(alloc.space());
        match self {
            Judgement::IsType(j) => turnstile
                .append(j.ty.print(cfg, alloc))
                .append(alloc.space())
                .append(alloc.judgement("type")),
            Judgement::IsTerm(j) => turnstile
                .append(j.term.print(cfg, alloc))
                .append(alloc.space())
                .append(COLON)
                .append(alloc.space())
                .append(j.ty.print(cfg, alloc)),
            Judgement::EqType(j) => turnstile
                .append(j.lhs.print(cfg, alloc))
                .append(alloc.space())
                .append(JUDG_EQ)
                .append(alloc.space())
                .append(j.rhs.print(cfg, alloc)),
            Judgement::EqTerm(j) => turnstile
                .append(j.lhs.print(cfg, alloc))
                .append(alloc.space())
                .append(JUDG_EQ)
                .append(alloc.space())
                .append(j.rhs.print(cfg, alloc))
                .append(alloc.space())
                .append(COLON)
                .append(alloc.space())
                .append(j.ty.print(cfg, alloc)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Decl;

    fn sgn_with_base() -> (Signature, Ident) {
        let mut sgn = Signature::new();
        let base = Ident::from_string("A");
        sgn.declare(base.clone(), Decl::Constant(Ty::from(mk_type(None)))).unwrap();
        (sgn, base)
    }

    #[test]
    fn identity_function_has_product_type() {
        let (mut sgn, base) = sgn_with_base();
        let a_ty = JdgIsTerm::constant(&sgn, &base, None).unwrap().to_is_type().unwrap();
        let x = sgn.fresh_atom("x", &a_ty);
        let body = JdgIsTerm::atom(&sgn, &x, None).unwrap();
        let id = JdgIsTerm::lambda(&sgn, Ident::from_string("x"), &x, &body, None).unwrap();
        match id.ty().kind() {
            TermKind::Prod { binder, cod } => {
                assert!(binder.ty.alpha_equal(a_ty.ty()));
                assert!(matches!(cod.kind(), TermKind::Constant(_)));
            }
            other => panic!("expected product type, got {other:?}"),
        }
        // the atom was discharged
        assert!(!id.assumptions().mem_atom(&x));
    }

    #[test]
    fn beta_redex_types_correctly() {
        let (mut sgn, base) = sgn_with_base();
        let a_ty = JdgIsTerm::constant(&sgn, &base, None).unwrap().to_is_type().unwrap();
        let x = sgn.fresh_atom("x", &a_ty);
        let body = JdgIsTerm::atom(&sgn, &x, None).unwrap();
        let id = JdgIsTerm::lambda(&sgn, Ident::from_string("x"), &x, &body, None).unwrap();
        let y = sgn.fresh_atom("y", &a_ty);
        let arg = JdgIsTerm::atom(&sgn, &y, None).unwrap();
        let app = JdgIsTerm::apply(&id, &arg, None).unwrap();
        assert!(app.ty().alpha_equal(a_ty.ty()));
        assert!(app.assumptions().mem_atom(&y));
        // the computed type agrees with the stored annotations
        let recomputed = type_of_term(&sgn, app.term()).unwrap();
        assert!(recomputed.alpha_equal(app.ty()));
    }

    #[test]
    fn reflection_turns_proofs_into_equations() {
        let (mut sgn, base) = sgn_with_base();
        let a_ty = JdgIsTerm::constant(&sgn, &base, None).unwrap().to_is_type().unwrap();
        let x = sgn.fresh_atom("x", &a_ty);
        let e = JdgIsTerm::atom(&sgn, &x, None).unwrap();
        let eq_ty = JdgIsType::eq(&e, &e, None).unwrap();
        let p = sgn.fresh_atom("p", &eq_ty);
        let proof = JdgIsTerm::atom(&sgn, &p, None).unwrap();
        let eq = JdgEqTerm::reflect(&proof).unwrap();
        let (asmp, lhs, rhs, ty) = eq.invert();
        assert!(lhs.alpha_equal(e.term()));
        assert!(rhs.alpha_equal(e.term()));
        assert!(ty.alpha_equal(e.ty()));
        // the equation depends on the hypothesis p
        assert!(asmp.mem_atom(&p));
    }

    #[test]
    fn alpha_witness_carries_no_assumptions() {
        let (mut sgn, base) = sgn_with_base();
        let a_ty = JdgIsTerm::constant(&sgn, &base, None).unwrap().to_is_type().unwrap();
        let x = sgn.fresh_atom("x", &a_ty);
        let e = JdgIsTerm::atom(&sgn, &x, None).unwrap();
        let eq = JdgEqTerm::alpha(&e, &e).unwrap();
        assert!(eq.assumptions().is_empty());
        let distinct = JdgIsTerm::universe(None);
        assert!(JdgEqTerm::alpha(&e, &distinct).is_none());
    }

    #[test]
    fn reflection_rejects_non_equality_proofs() {
        let (mut sgn, base) = sgn_with_base();
        let a_ty = JdgIsTerm::constant(&sgn, &base, None).unwrap().to_is_type().unwrap();
        let x = sgn.fresh_atom("x", &a_ty);
        let e = JdgIsTerm::atom(&sgn, &x, None).unwrap();
        assert!(matches!(
            JdgEqTerm::reflect(&e),
            Err(NucleusError::ExpectedEquality { .. })
        ));
    }
}
