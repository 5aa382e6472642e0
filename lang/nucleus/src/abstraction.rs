use pretty::DocAllocator;
use reflet_lang_printer::{Alloc, Builder, Precedence, Print, PrintCfg};

use crate::{AlphaEq, Atom, Bindable, Binder, Ident, Term, Ty};

/// A value of the theory under a spine of binders.
///
/// Judgements travel through the runtime possibly abstracted over free
/// variables; opening and closing the spine happens one binder at a time at
/// the abstraction boundary.
#[derive(Debug, Clone)]
pub enum Abstraction<T> {
    NotAbstract(T),
    Abstract { binder: Binder, body: Box<Abstraction<T>> },
}

impl<T> Abstraction<T> {
    pub fn not_abstract(body: T) -> Self {
        Abstraction::NotAbstract(body)
    }

    pub fn is_abstract(&self) -> bool {
        matches!(self, Abstraction::Abstract { .. })
    }

    pub fn as_not_abstract(&self) -> Option<&T> {
        match self {
            Abstraction::NotAbstract(body) => Some(body),
            Abstraction::Abstract { .. } => None,
        }
    }

    pub fn num_binders(&self) -> usize {
        let mut n = 0;
        let mut cursor = self;
        while let Abstraction::Abstract { body, .. } = cursor {
            n += 1;
            cursor = body;
        }
        n
    }
}

impl<T: Bindable> Abstraction<T> {
    /// Close the abstraction over one more binder: the atom `x` of type `ty`
    /// is captured as the new outermost binder.
    pub fn abstract_over(name: Ident, ty: Ty, x: &Atom, body: Abstraction<T>) -> Self {
        let body = body.abstract_at(std::slice::from_ref(x), 0);
        Abstraction::Abstract { binder: Binder { name, ty }, body: Box::new(body) }
    }

    /// Open the outermost binder by substituting the given term for it.
    ///
    /// Callers are responsible for `e` having the binder's type; within the
    /// kernel this is established before instantiating, outside it the
    /// coercion protocol is.
    pub fn instantiate_head(&self, e: &Term) -> Option<(Binder, Abstraction<T>)> {
        match self {
            Abstraction::NotAbstract(_) => None,
            Abstraction::Abstract { binder, body } => {
                Some((binder.clone(), body.instantiate_at(std::slice::from_ref(e), 0)))
            }
        }
    }
}

impl<T: Bindable> Bindable for Abstraction<T> {
    fn instantiate_at(&self, es: &[Term], lvl: usize) -> Self {
        match self {
            Abstraction::NotAbstract(body) => {
                Abstraction::NotAbstract(body.instantiate_at(es, lvl))
            }
            Abstraction::Abstract { binder, body } => Abstraction::Abstract {
                binder: binder.instantiate_at(es, lvl),
                body: Box::new(body.instantiate_at(es, lvl + 1)),
            },
        }
    }

    fn abstract_at(&self, xs: &[Atom], lvl: usize) -> Self {
        match self {
            Abstraction::NotAbstract(body) => {
                Abstraction::NotAbstract(body.abstract_at(xs, lvl))
            }
            Abstraction::Abstract { binder, body } => Abstraction::Abstract {
                binder: binder.abstract_at(xs, lvl),
                body: Box::new(body.abstract_at(xs, lvl + 1)),
            },
        }
    }
}

impl<T: AlphaEq> AlphaEq for Abstraction<T> {
    /// α-equality lifted through binder spines.
    fn alpha_equal(&self, other: &Self) -> bool {
        match (self, other) {
            (Abstraction::NotAbstract(a), Abstraction::NotAbstract(b)) => a.alpha_equal(b),
            (
                Abstraction::Abstract { binder: b1, body: a1 },
                Abstraction::Abstract { binder: b2, body: a2 },
            ) => b1.alpha_equal(b2) && a1.alpha_equal(a2),
            _ => false,
        }
    }
}

impl<T: Print> Print for Abstraction<T> {
    fn print_prec<'a>(
        &'a self,
        cfg: &PrintCfg,
        alloc: &'a Alloc<'a>,
        prec: Precedence,
    ) -> Builder<'a> {
        match self {
            Abstraction::NotAbstract(body) => body.print_prec(cfg, alloc, prec),
            Abstraction::Abstract { binder, body } => binder
                .name
                .print(cfg, alloc)
                .append(alloc.text(" : "))
                .append(binder.ty.print(cfg, alloc))
                .enclose("{", "}")
                .append(alloc.space())
                .append(body.print(cfg, alloc)),
        }
    }
}
