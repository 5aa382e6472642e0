use std::collections::BTreeSet;

use fxhash::FxHashSet;
use pretty::DocAllocator;
use reflet_lang_printer::{Alloc, Builder, Precedence, Print, PrintCfg};

use crate::Atom;

/// The set of hypotheses a term depends on.
///
/// The `atoms` part records every free atom occurring in the term or smuggled
/// in through an equality proof; this is what keeps dependencies honest in
/// the presence of equality reflection. The `bounds` part records the de
/// Bruijn indices that are free in the term, relative to the term's own
/// position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssumptionSet {
    atoms: FxHashSet<Atom>,
    bounds: BTreeSet<usize>,
}

impl AssumptionSet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn singleton(atom: Atom) -> Self {
        let mut atoms = FxHashSet::default();
        atoms.insert(atom);
        AssumptionSet { atoms, bounds: BTreeSet::new() }
    }

    pub fn bound(k: usize) -> Self {
        let mut bounds = BTreeSet::new();
        bounds.insert(k);
        AssumptionSet { atoms: FxHashSet::default(), bounds }
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty() && self.bounds.is_empty()
    }

    pub fn mem_atom(&self, atom: &Atom) -> bool {
        self.atoms.contains(atom)
    }

    /// Whether any de Bruijn index at or above `lvl` is free in the set.
    ///
    /// Substitution walks can skip entire subtrees when this is false.
    pub fn mem_bound_from(&self, lvl: usize) -> bool {
        self.bounds.range(lvl..).next().is_some()
    }

    pub fn atoms(&self) -> impl Iterator<Item = &Atom> {
        self.atoms.iter()
    }

    pub fn union(mut self, other: &AssumptionSet) -> AssumptionSet {
        self.atoms.extend(other.atoms.iter().cloned());
        self.bounds.extend(other.bounds.iter().copied());
        self
    }

    /// Adjust the set when the term it belongs to crosses `k` binders on the
    /// way out. Indices bound by the crossed binders disappear; the remaining
    /// ones are renumbered relative to the enclosing term.
    pub fn bind(&self, k: usize) -> AssumptionSet {
        let bounds = self.bounds.iter().filter(|&&n| n >= k).map(|&n| n - k).collect();
        AssumptionSet { atoms: self.atoms.clone(), bounds }
    }

    /// Adjust the set when the indices `lvl, …, lvl + hs.len() - 1` are
    /// instantiated by terms whose assumption sets are `hs`. The substituted
    /// indices are replaced by the assumptions of the substituents; indices
    /// above the range shift down to fill the gap.
    pub fn instantiate(&self, hs: &[AssumptionSet], lvl: usize) -> AssumptionSet {
        let mut result =
            AssumptionSet { atoms: self.atoms.clone(), bounds: BTreeSet::new() };
        for &n in &self.bounds {
            if n < lvl {
                result.bounds.insert(n);
            } else if n - lvl < hs.len() {
                result = result.union(&hs[n - lvl]);
            } else {
                result.bounds.insert(n - hs.len());
            }
        }
        result
    }

    /// Adjust the set when the atoms `xs` are captured by new binders: each
    /// `xs[i]` becomes the bound index `lvl + i`.
    pub fn abstract_atoms(&self, xs: &[Atom], lvl: usize) -> AssumptionSet {
        let mut result = self.clone();
        for (i, x) in xs.iter().enumerate() {
            if result.atoms.remove(x) {
                result.bounds.insert(lvl + i);
            }
        }
        result
    }
}

impl Print for AssumptionSet {
    fn print_prec<'a>(
        &'a self,
        cfg: &PrintCfg,
        alloc: &'a Alloc<'a>,
        _prec: Precedence,
    ) -> Builder<'a> {
        let atoms = self.atoms.iter().map(|a| a.print(cfg, alloc));
        let bounds = self.bounds.iter().map(|n| alloc.text(format!("@{n}")));
        alloc
            .intersperse(atoms.chain(bounds), alloc.text(", "))
            .enclose("{", "}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_drops_captured_indices() {
        let set = AssumptionSet::bound(0).union(&AssumptionSet::bound(2));
        let bound = set.bind(1);
        assert!(!bound.mem_bound_from(2));
        assert_eq!(bound, AssumptionSet::bound(1));
    }

    #[test]
    fn instantiate_replaces_indices_by_substituent_assumptions() {
        let a = Atom::fresh("a");
        let set = AssumptionSet::bound(1).union(&AssumptionSet::bound(3));
        let result = set.instantiate(&[AssumptionSet::singleton(a.clone())], 1);
        assert!(result.mem_atom(&a));
        // index 3 shifted down past the removed binder
        assert_eq!(
            result,
            AssumptionSet::singleton(a).union(&AssumptionSet::bound(2))
        );
    }

    #[test]
    fn abstract_atoms_inverts_instantiate() {
        let a = Atom::fresh("a");
        let b = Atom::fresh("b");
        let set = AssumptionSet::singleton(a.clone()).union(&AssumptionSet::singleton(b.clone()));
        let abstracted = set.abstract_atoms(&[a.clone(), b.clone()], 0);
        assert!(!abstracted.mem_atom(&a));
        assert_eq!(
            abstracted,
            AssumptionSet::bound(0).union(&AssumptionSet::bound(1))
        );
        let restored = abstracted
            .instantiate(&[AssumptionSet::singleton(a), AssumptionSet::singleton(b)], 0);
        assert_eq!(restored, set);
    }

    #[test]
    fn instantiate_below_level_keeps_indices() {
        let set = AssumptionSet::bound(0);
        let result = set.instantiate(&[AssumptionSet::empty()], 1);
        assert_eq!(result, AssumptionSet::bound(0));
    }
}
