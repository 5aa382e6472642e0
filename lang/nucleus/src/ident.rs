use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use derivative::Derivative;
use pretty::DocAllocator;
use reflet_lang_miette_util::{HasSpan, Span};
use reflet_lang_printer::{Alloc, Builder, Precedence, Print, PrintCfg};

/// A plain identifier: the name of a constant, rule, operation, ML value,
/// tag or field label.
///
/// We keep the source location of the occurrence around for diagnostics, but
/// two identifiers are equal whenever their textual content is.
#[derive(Debug, Clone, Derivative)]
#[derivative(Eq, PartialEq, Hash)]
pub struct Ident {
    #[derivative(PartialEq = "ignore", Hash = "ignore")]
    pub span: Option<Span>,
    pub id: String,
}

impl Ident {
    pub fn from_string(id: &str) -> Self {
        Ident { span: None, id: id.to_owned() }
    }
}

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}

impl HasSpan for Ident {
    fn span(&self) -> Option<Span> {
        self.span
    }
}

impl Print for Ident {
    fn print_prec<'a>(
        &'a self,
        _cfg: &PrintCfg,
        alloc: &'a Alloc<'a>,
        _prec: Precedence,
    ) -> Builder<'a> {
        alloc.text(&self.id)
    }
}

/// Process-wide source of fresh atom tags.
static NEXT_ATOM: AtomicU64 = AtomicU64::new(0);

/// The name of a free variable.
///
/// Atoms are created fresh whenever the evaluator opens a binder and are
/// never shadowed: two atoms are equal exactly when their tags are. The hint
/// records the surface name of the binder the atom was opened from and is
/// used only for printing.
#[derive(Debug, Clone, Derivative)]
#[derivative(Eq, PartialEq, Hash)]
pub struct Atom {
    #[derivative(PartialEq = "ignore", Hash = "ignore")]
    hint: String,
    tag: u64,
}

impl Atom {
    /// Create a globally fresh atom. This is the only constructor.
    pub fn fresh(hint: &str) -> Self {
        Atom { hint: hint.to_owned(), tag: NEXT_ATOM.fetch_add(1, Ordering::Relaxed) }
    }

    pub fn hint(&self) -> &str {
        &self.hint
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}${}", self.hint, self.tag)
    }
}

impl Print for Atom {
    fn print_prec<'a>(
        &'a self,
        cfg: &PrintCfg,
        alloc: &'a Alloc<'a>,
        _prec: Precedence,
    ) -> Builder<'a> {
        if cfg.de_bruijn {
            alloc.text(format!("{}${}", self.hint, self.tag))
        } else {
            alloc.text(&self.hint)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_atoms_are_distinct() {
        let a = Atom::fresh("x");
        let b = Atom::fresh("x");
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
    }

    #[test]
    fn ident_equality_ignores_span() {
        let a = Ident { span: Some(Span::from_string("abc")), id: "abc".to_owned() };
        let b = Ident::from_string("abc");
        assert_eq!(a, b);
    }
}
