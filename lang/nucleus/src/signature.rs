use std::fmt;

use fxhash::FxHashMap;
use reflet_lang_miette_util::{HasSpan, ToMiette};

use crate::{
    Atom, Bindable, Binder, Boundary, Ident, JdgIsType, NucleusError, Ty, mk_prod, mk_type,
};

/// Integer key of a mutable cell in the runtime stores. The nucleus only
/// records the association between a declared name and its cell.
pub type CellId = usize;

/// Description of an ML type, carried for operation declarations and value
/// schemes. Purely informational: the runtime is dynamically checked.
#[derive(Debug, Clone)]
pub enum MLTy {
    Judgement,
    Str,
    Arrow(Box<MLTy>, Box<MLTy>),
    Tuple(Vec<MLTy>),
    List(Box<MLTy>),
    Ref(Box<MLTy>),
    Dynamic(Box<MLTy>),
    Named(Ident, Vec<MLTy>),
    Param(usize),
}

impl fmt::Display for MLTy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MLTy::Judgement => write!(f, "judgement"),
            MLTy::Str => write!(f, "mlstring"),
            MLTy::Arrow(dom, cod) => write!(f, "({dom} -> {cod})"),
            MLTy::Tuple(tys) => {
                write!(f, "(")?;
                for (i, ty) in tys.iter().enumerate() {
                    if i > 0 {
                        write!(f, " * ")?;
                    }
                    write!(f, "{ty}")?;
                }
                write!(f, ")")
            }
            MLTy::List(ty) => write!(f, "{ty} list"),
            MLTy::Ref(ty) => write!(f, "{ty} ref"),
            MLTy::Dynamic(ty) => write!(f, "{ty} dynamic"),
            MLTy::Named(name, args) => {
                for arg in args {
                    write!(f, "{arg} ")?;
                }
                write!(f, "{name}")
            }
            MLTy::Param(i) => write!(f, "'{}", (b'a' + (*i as u8 % 26)) as char),
        }
    }
}

/// An ML type scheme `∀ 'a1 … 'an . τ`.
#[derive(Debug, Clone)]
pub struct MLSchema {
    pub params: usize,
    pub ty: MLTy,
}

impl fmt::Display for MLSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.ty)
    }
}

/// A derivation rule declared by the user.
///
/// A rule is used as a constant with the iterated product type built from
/// its premises; the premises and conclusion are kept for arity checks and
/// diagnostics. Premise `i`'s boundary refers to earlier premises through
/// bound indices, index 0 being the directly preceding premise.
#[derive(Debug, Clone)]
pub struct Rule {
    pub(crate) premises: Vec<Premise>,
    pub(crate) conclusion: Boundary,
    pub(crate) ty: Ty,
}

#[derive(Debug, Clone)]
pub struct Premise {
    pub name: Ident,
    pub boundary: Boundary,
}

impl Rule {
    /// Package the premises (opened as atoms during elaboration of the rule
    /// declaration) and the conclusion type into a rule. A `None` conclusion
    /// declares a type-forming rule.
    ///
    /// The atoms are captured into bound indices; afterwards the rule no
    /// longer mentions them.
    pub fn from_atoms(
        sgn: &Signature,
        premises: &[(Ident, Atom)],
        conclusion: Option<&JdgIsType>,
    ) -> Result<Rule, NucleusError> {
        let mut packaged = Vec::with_capacity(premises.len());
        // Innermost-first capture lists: premise i sees atoms 0..i, the
        // nearest one at index 0.
        let mut seen: Vec<Atom> = Vec::with_capacity(premises.len());
        for (name, atom) in premises {
            let ty = sgn
                .atom_ty(atom)
                .ok_or_else(|| NucleusError::unknown_atom(atom))?
                .abstract_at(&seen, 0);
            let boundary = if ty.is_universe() { Boundary::IsType } else { Boundary::IsTerm(ty) };
            packaged.push(Premise { name: name.clone(), boundary });
            seen.insert(0, atom.clone());
        }
        let conclusion = match conclusion {
            None => Boundary::IsType,
            Some(jdg) => Boundary::IsTerm(jdg.ty().abstract_at(&seen, 0)),
        };
        // The type of the rule head: premises folded into an iterated product
        // around the conclusion type.
        let mut ty = match &conclusion {
            Boundary::IsType => Ty::from(mk_type(None)),
            Boundary::IsTerm(ty) => ty.clone(),
        };
        for premise in packaged.iter().rev() {
            let dom = match &premise.boundary {
                Boundary::IsType => Ty::from(mk_type(None)),
                Boundary::IsTerm(dom) => dom.clone(),
            };
            ty = Ty::from(mk_prod(None, Binder { name: premise.name.clone(), ty: dom }, ty));
        }
        Ok(Rule { premises: packaged, conclusion, ty })
    }

    pub fn arity(&self) -> usize {
        self.premises.len()
    }

    pub fn premises(&self) -> &[Premise] {
        &self.premises
    }

    /// Whether applying the rule fully yields a type rather than a term.
    pub fn forms_type(&self) -> bool {
        matches!(self.conclusion, Boundary::IsType)
    }

    /// The type of the rule used as a constant head.
    pub fn ty(&self) -> &Ty {
        &self.ty
    }
}

/// A global declaration.
#[derive(Debug, Clone)]
pub enum Decl {
    /// A primitive constant with its type
    Constant(Ty),
    /// A derivation rule
    Rule(Rule),
    /// An operation with its argument and result types
    MLOperation { arg_tys: Vec<MLTy>, result_ty: MLTy },
    /// A top-level ML value; the slot indexes the runtime's global
    /// environment
    MLValue { scheme: MLSchema, slot: usize },
    /// A dynamic variable backed by the given cell
    Dynamic(CellId),
    /// An ML sum type with its constructors and their arities
    MLType { constructors: Vec<(Ident, usize)> },
}

/// The global environment of the session.
///
/// Declarations are kept in insertion order so that elaboration is
/// reproducible; the atom table records the type of every free variable the
/// evaluator has opened a binder with.
#[derive(Debug, Default)]
pub struct Signature {
    decls: Vec<(Ident, Decl)>,
    index: FxHashMap<String, usize>,
    atoms: FxHashMap<Atom, Ty>,
    tags: FxHashMap<String, (Ident, usize)>,
}

impl Signature {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn declare(&mut self, name: Ident, decl: Decl) -> Result<(), NucleusError> {
        if self.index.contains_key(&name.id) {
            return Err(NucleusError::Redeclaration {
                name: name.id.clone(),
                span: name.span().to_miette(),
            });
        }
        if let Decl::MLType { constructors } = &decl {
            for (tag, arity) in constructors {
                self.tags.insert(tag.id.clone(), (name.clone(), *arity));
            }
        }
        self.index.insert(name.id.clone(), self.decls.len());
        self.decls.push((name, decl));
        Ok(())
    }

    pub fn lookup(&self, name: &Ident) -> Option<&Decl> {
        self.index.get(&name.id).map(|&i| &self.decls[i].1)
    }

    /// Bind a top-level ML value. Rebinding an existing ML value shadows it,
    /// as successive top-level `let`s of the same name do; every other kind
    /// of declaration is protected from redefinition.
    pub fn declare_ml_value(
        &mut self,
        name: Ident,
        scheme: MLSchema,
        slot: usize,
    ) -> Result<(), NucleusError> {
        match self.index.get(&name.id).copied() {
            None => self.declare(name, Decl::MLValue { scheme, slot }),
            Some(i) if matches!(self.decls[i].1, Decl::MLValue { .. }) => {
                self.decls[i].1 = Decl::MLValue { scheme, slot };
                Ok(())
            }
            Some(_) => Err(NucleusError::Redeclaration {
                name: name.id.clone(),
                span: name.span().to_miette(),
            }),
        }
    }

    /// The type of a constant or rule head.
    pub fn constant_ty(&self, name: &Ident) -> Option<&Ty> {
        match self.lookup(name)? {
            Decl::Constant(ty) => Some(ty),
            Decl::Rule(rule) => Some(&rule.ty),
            _ => None,
        }
    }

    /// The ML type and arity of a tag constructor, if declared.
    pub fn lookup_tag(&self, tag: &Ident) -> Option<(&Ident, usize)> {
        self.tags.get(&tag.id).map(|(name, arity)| (name, *arity))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Ident, &Decl)> {
        self.decls.iter().map(|(name, decl)| (name, decl))
    }

    /// Create a fresh atom inhabiting a derived type and intern it in the
    /// atom table. This is how the evaluator opens binders.
    pub fn fresh_atom(&mut self, hint: &str, ty: &JdgIsType) -> Atom {
        self.fresh_atom_raw(hint, ty.ty().clone())
    }

    /// Intern an atom with a type the kernel already trusts, e.g. one read
    /// off an existing judgement's binder.
    pub(crate) fn fresh_atom_raw(&mut self, hint: &str, ty: Ty) -> Atom {
        let atom = Atom::fresh(hint);
        self.atoms.insert(atom.clone(), ty);
        atom
    }

    pub fn atom_ty(&self, atom: &Atom) -> Option<&Ty> {
        self.atoms.get(atom)
    }
}
