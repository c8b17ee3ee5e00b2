use std::fmt;

use crate::analysis::Analysis;
use crate::construct::{Construct, RecExpr};
use crate::error::{EqSatError, Result};
use crate::extract::{AstSize, Extractor};
use crate::unionfind::{Id, UnionFind};
use crate::utils::HashMap;

/// An equivalence class of e-nodes, plus whatever an [`Analysis`] has
/// folded for it.
#[derive(Debug, Clone)]
pub struct EClass<L, D> {
    pub id: Id,
    /// Every e-node currently known to belong to this class, in the
    /// order they were discovered (earliest first). Extraction's
    /// deterministic tie-breaking relies on this ordering.
    pub nodes: Vec<L>,
    /// Back-edges: `(n, owner)` such that this class is among `n`'s
    /// operands, and `n` belongs to the class `owner`. Used to seed the
    /// rebuild worklist when this class is absorbed into another.
    pub parents: Vec<(L, Id)>,
    pub data: D,
}

impl<L, D> EClass<L, D> {
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// The e-graph: a union-find over e-classes, a hash-cons table mapping
/// canonical e-nodes to the class they belong to, and (optionally) an
/// [`Analysis`] folding extra data over each class.
///
/// See the crate's design notes for the five invariants this type
/// maintains between calls to [`EGraph::rebuild`], and why `add`/`union`
/// are allowed to leave them only transiently violated.
pub struct EGraph<L: Construct, N: Analysis<L> = ()> {
    pub analysis: N,
    unionfind: UnionFind,
    /// Canonical e-node -> owning class id. The single source of truth
    /// for e-node identity; everything else is derived from it.
    memo: HashMap<L, Id>,
    classes: HashMap<Id, EClass<L, N::Data>>,
    /// Pre-index of live classes by e-node discriminant, for the
    /// matcher's top-level search. Rebuilt wholesale by `rebuild`.
    classes_by_op: HashMap<L::Discriminant, Vec<Id>>,
    /// First-seen arity per discriminant; used to reject inconsistent
    /// arity for the same operator head.
    arities: HashMap<L::Discriminant, usize>,
    /// Classes whose data is a "fold value" (per
    /// `Analysis::is_fold_value`), keyed by that value, so equal folded
    /// values across different classes can be queued for union.
    fold_index: HashMap<N::Data, Id>,
    /// (possibly-stale e-node, owning class id) pairs awaiting
    /// re-canonicalization the next time `rebuild` runs.
    pending: Vec<(L, Id)>,
    dirty: bool,
}

impl<L: Construct, N: Analysis<L> + Default> Default for EGraph<L, N> {
    fn default() -> Self {
        Self::new(N::default())
    }
}

impl<L: Construct, N: Analysis<L>> EGraph<L, N> {
    pub fn new(analysis: N) -> Self {
        EGraph {
            analysis,
            unionfind: UnionFind::default(),
            memo: HashMap::default(),
            classes: HashMap::default(),
            classes_by_op: HashMap::default(),
            arities: HashMap::default(),
            fold_index: HashMap::default(),
            pending: Vec::new(),
            dirty: false,
        }
    }

    pub fn number_of_classes(&self) -> usize {
        self.classes.len()
    }

    pub fn total_size(&self) -> usize {
        self.classes.values().map(EClass::len).sum()
    }

    pub fn is_clean(&self) -> bool {
        !self.dirty
    }

    /// Canonical representative of `id`, without path compression.
    pub fn find(&self, id: Id) -> Id {
        self.unionfind.find(id)
    }

    fn find_mut(&mut self, id: Id) -> Id {
        self.unionfind.find_mut(id)
    }

    pub fn equiv(&self, a: Id, b: Id) -> bool {
        self.find(a) == self.find(b)
    }

    pub fn eclass(&self, id: Id) -> &EClass<L, N::Data> {
        let id = self.find(id);
        &self.classes[&id]
    }

    pub fn classes(&self) -> impl Iterator<Item = &EClass<L, N::Data>> {
        self.classes.values()
    }

    pub(crate) fn classes_by_discriminant(&self, disc: &L::Discriminant) -> &[Id] {
        self.classes_by_op.get(disc).map(Vec::as_slice).unwrap_or(&[])
    }

    fn check_arity(&mut self, node: &L) -> Result<()> {
        let disc = node.discriminant();
        let arity = node.operands().len();
        match self.arities.get(&disc) {
            Some(&expected) if expected != arity => {
                Err(EqSatError::ArityMismatch { expected, found: arity })
            }
            Some(_) => Ok(()),
            None => {
                self.arities.insert(disc, arity);
                Ok(())
            }
        }
    }

    /// Inserts a single canonicalized e-node, returning the id of the
    /// class it belongs to (creating a fresh singleton class if this
    /// exact canonical node hasn't been seen before). Idempotent: adding
    /// the same node twice returns the same class both times.
    pub fn add(&mut self, mut node: L) -> Result<Id> {
        node.update_operands(|id| self.find_mut(id));
        self.check_arity(&node)?;

        if let Some(&id) = self.memo.get(&node) {
            return Ok(self.find_mut(id));
        }

        let id = self.unionfind.make_set();
        for &child in node.operands() {
            if let Some(c) = self.classes.get_mut(&child) {
                c.parents.push((node.clone(), id));
            }
        }
        let data = N::make(self, &node);
        self.classes_by_op.entry(node.discriminant()).or_default().push(id);
        self.classes.insert(
            id,
            EClass { id, nodes: vec![node.clone()], parents: Vec::new(), data },
        );
        self.memo.insert(node, id);
        self.dirty = true;

        if self.analysis.is_fold_value(&self.classes[&id].data) {
            let data = self.classes[&id].data.clone();
            if let Some(&other) = self.fold_index.get(&data) {
                let other = self.find_mut(other);
                if other != id {
                    self.union(other, id);
                    return Ok(self.find_mut(id));
                }
            } else {
                self.fold_index.insert(data, id);
            }
        }
        Ok(id)
    }

    /// Recursively inserts every node of `expr`, then the root. Returns
    /// the root's class id.
    pub fn add_expr(&mut self, expr: &RecExpr<L>) -> Result<Id> {
        let mut built = Vec::with_capacity(expr.as_ref().len());
        for node in expr.as_ref() {
            let node = node.clone().map_operands(|id| built[id.val()]);
            built.push(self.add(node)?);
        }
        Ok(*built.last().expect("RecExpr is non-empty"))
    }

    /// Merges the classes of `a` and `b`. Returns `false` without doing
    /// anything if they were already the same class.
    pub fn union(&mut self, a: Id, b: Id) -> bool {
        let ra = self.find_mut(a);
        let rb = self.find_mut(b);
        if ra == rb {
            return false;
        }
        let (root, loser) = self.unionfind.union(ra, rb);
        let loser = loser.expect("ra != rb, so union always absorbs one side");
        let loser_class = self.classes.remove(&loser).expect("loser class is live");
        self.pending.extend(loser_class.parents.iter().cloned());

        // `loser_class.nodes` may duplicate nodes already in `root_class`
        // once both sides' child ids are canonicalized, and some of these
        // nodes' own child ids are themselves stale until the next
        // `rebuild` call -- `rebuild`'s final sweep over every class's
        // `nodes` is what actually restores invariant 1 and dedups; a
        // union alone only promises that once `rebuild` has run.
        let mut merged_data = {
            let root_class = self.classes.get_mut(&root).expect("root class is live");
            root_class.nodes.extend(loser_class.nodes);
            root_class.data.clone()
        };
        self.analysis.merge(&mut merged_data, loser_class.data);
        self.classes.get_mut(&root).unwrap().data = merged_data;

        self.dirty = true;
        N::modify(self, root);
        log::trace!("union: class {loser} absorbed into {root}");
        true
    }

    /// Convenience: adds both expressions, then unions their roots.
    pub fn union_exprs(&mut self, a: &RecExpr<L>, b: &RecExpr<L>) -> Result<bool> {
        let ida = self.add_expr(a)?;
        let idb = self.add_expr(b)?;
        Ok(self.union(ida, idb))
    }

    /// Restores the e-graph's invariants after a batch of `add`/`union`
    /// calls: re-canonicalizes every pending (e-node, owner) pair and
    /// discovers any new congruences this exposes, then canonicalizes and
    /// dedups every live class's stored nodes so invariant 1 ("all stored
    /// e-nodes have canonical child ids") holds on return, not just for
    /// callers that happen to re-`find` every child themselves. Returns
    /// the number of new unions performed.
    pub fn rebuild(&mut self) -> usize {
        let mut n_unions = 0;
        while let Some((node, owner)) = self.pending.pop() {
            let mut canon = node.clone();
            canon.update_operands(|id| self.find_mut(id));
            let owner = self.find_mut(owner);
            // §4.3 step 1: the pre-canonicalization key no longer
            // describes a live e-node once any of its children moved;
            // leaving it in `memo` would keep the table from being a
            // bijection over canonical e-nodes (invariant 2).
            self.memo.remove(&node);
            match self.memo.insert(canon.clone(), owner) {
                Some(existing) => {
                    let existing = self.find_mut(existing);
                    if existing != owner && self.union(existing, owner) {
                        n_unions += 1;
                    }
                }
                None => {
                    for &child in canon.operands() {
                        if let Some(c) = self.classes.get_mut(&child) {
                            c.parents.push((canon.clone(), owner));
                        }
                    }
                }
            }
        }
        self.canonicalize_classes();
        self.rebuild_classes_by_op();
        self.dirty = false;
        log::debug!(
            "rebuild: {n_unions} new union(s), {} live classes, {} nodes",
            self.number_of_classes(),
            self.total_size()
        );
        n_unions
    }

    /// Re-canonicalizes every live class's `nodes` in place and drops
    /// duplicates that canonicalization exposed, keeping the
    /// earliest-discovered copy of each (extraction's tie-breaking
    /// relies on that ordering being preserved).
    fn canonicalize_classes(&mut self) {
        let unionfind = &mut self.unionfind;
        for class in self.classes.values_mut() {
            for node in class.nodes.iter_mut() {
                node.update_operands(|id| unionfind.find_mut(id));
            }
            let mut seen = crate::utils::HashSet::default();
            class.nodes.retain(|n| seen.insert(n.clone()));
        }
    }

    fn rebuild_classes_by_op(&mut self) {
        let mut by_op: HashMap<L::Discriminant, Vec<Id>> = HashMap::default();
        for (&id, class) in &self.classes {
            let mut discs: Vec<L::Discriminant> = Vec::new();
            for node in &class.nodes {
                let d = node.discriminant();
                if !discs.contains(&d) {
                    discs.push(d.clone());
                    by_op.entry(d).or_default().push(id);
                }
            }
        }
        self.classes_by_op = by_op;
    }

    /// Extracts the cheapest (by `AstSize`) representative of `id`'s
    /// class. The single/multi convenience split lives here at the
    /// façade boundary, not inside `Extractor` itself -- see
    /// `extract_exprs` for the multi-class counterpart.
    pub fn extract_expr(&self, id: Id) -> RecExpr<L> {
        Extractor::new(self, AstSize).find_best(id).1
    }

    /// Extracts the cheapest representative of each class in `ids`, in
    /// input order. A single shared `Extractor` does the fixed-point
    /// relaxation once, regardless of how many classes are requested.
    pub fn extract_exprs(&self, ids: &[Id]) -> Vec<RecExpr<L>> {
        let extractor = Extractor::new(self, AstSize);
        ids.iter().map(|&id| extractor.find_best(id).1).collect()
    }
}

impl<L: Construct + fmt::Debug, N: Analysis<L>> fmt::Debug for EGraph<L, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EGraph")
            .field("classes", &self.classes.len())
            .field("nodes", &self.total_size())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq, Hash)]
    enum Num {
        Lit(i64),
        Add([Id; 2]),
    }

    impl Construct for Num {
        type Discriminant = u8;
        fn discriminant(&self) -> u8 {
            match self {
                Num::Lit(_) => 0,
                Num::Add(_) => 1,
            }
        }
        fn matches(&self, other: &Self) -> bool {
            self.discriminant() == other.discriminant()
        }
        fn operands(&self) -> &[Id] {
            match self {
                Num::Lit(_) => &[],
                Num::Add(ids) => ids,
            }
        }
        fn operands_mut(&mut self) -> &mut [Id] {
            match self {
                Num::Lit(_) => &mut [],
                Num::Add(ids) => ids,
            }
        }
    }

    #[test]
    fn add_is_idempotent() {
        let mut eg = EGraph::<Num, ()>::default();
        let a = eg.add(Num::Lit(1)).unwrap();
        let b = eg.add(Num::Lit(1)).unwrap();
        assert_eq!(a, b);
        assert_eq!(eg.number_of_classes(), 1);
    }

    #[test]
    fn union_merges_classes_and_equiv_reflects_it() {
        let mut eg = EGraph::<Num, ()>::default();
        let a = eg.add(Num::Lit(1)).unwrap();
        let b = eg.add(Num::Lit(2)).unwrap();
        assert!(!eg.equiv(a, b));
        assert!(eg.union(a, b));
        assert!(eg.equiv(a, b));
        assert_eq!(eg.number_of_classes(), 1);
    }

    #[test]
    fn union_of_already_equal_ids_is_a_noop() {
        let mut eg = EGraph::<Num, ()>::default();
        let a = eg.add(Num::Lit(1)).unwrap();
        assert!(!eg.union(a, a));
    }

    #[test]
    fn congruence_closure_via_rebuild() {
        let mut eg = EGraph::<Num, ()>::default();
        let one = eg.add(Num::Lit(1)).unwrap();
        let two = eg.add(Num::Lit(2)).unwrap();
        let three = eg.add(Num::Lit(3)).unwrap();
        let add1 = eg.add(Num::Add([one, two])).unwrap();
        eg.union(two, three);
        eg.rebuild();
        let add2 = eg.add(Num::Add([one, three])).unwrap();
        assert!(eg.equiv(add1, add2));
    }

    #[test]
    fn rebuild_canonicalizes_and_dedups_stored_nodes() {
        // `add1`'s class holds `Add([one, two])` as a *child* of nothing,
        // but it is itself a parent of `two`'s class: unioning `two` and
        // `three` must leave the stored node's own child id canonical
        // once `rebuild` returns, not merely resolvable via `find`.
        let mut eg = EGraph::<Num, ()>::default();
        let one = eg.add(Num::Lit(1)).unwrap();
        let two = eg.add(Num::Lit(2)).unwrap();
        let three = eg.add(Num::Lit(3)).unwrap();
        let add1 = eg.add(Num::Add([one, two])).unwrap();
        eg.union(two, three);
        eg.rebuild();

        let root = eg.find(add1);
        let canonical_three = eg.find(three);
        for node in &eg.eclass(root).nodes {
            if let Num::Add(children) = node {
                for &child in children {
                    assert_eq!(child, eg.find(child), "stored child id must already be canonical");
                    if child == canonical_three {
                        assert_eq!(child, canonical_three);
                    }
                }
            }
        }

        // Re-adding `Add([one, three])` must hash-cons onto the exact
        // same (now-canonical) stored node rather than create a
        // duplicate entry in the class.
        let before = eg.eclass(root).nodes.len();
        let add2 = eg.add(Num::Add([one, three])).unwrap();
        eg.rebuild();
        assert!(eg.equiv(add1, add2));
        assert_eq!(eg.eclass(root).nodes.len(), before);
    }

    #[test]
    fn arity_mismatch_is_rejected() {
        #[derive(Debug, Clone, PartialEq, Eq, Hash)]
        enum Bad {
            Unary([Id; 1]),
            Binary([Id; 2]),
        }
        impl Construct for Bad {
            type Discriminant = u8;
            fn discriminant(&self) -> u8 {
                0
            }
            fn matches(&self, _other: &Self) -> bool {
                true
            }
            fn operands(&self) -> &[Id] {
                match self {
                    Bad::Unary(ids) => ids,
                    Bad::Binary(ids) => ids,
                }
            }
            fn operands_mut(&mut self) -> &mut [Id] {
                match self {
                    Bad::Unary(ids) => ids,
                    Bad::Binary(ids) => ids,
                }
            }
        }
        let mut eg = EGraph::<Bad, ()>::default();
        let zero = eg.unionfind_test_id();
        assert!(eg.add(Bad::Unary([zero])).is_ok());
        assert!(eg.add(Bad::Binary([zero, zero])).is_err());
    }

    impl<L: Construct, N: Analysis<L>> EGraph<L, N> {
        #[cfg(test)]
        fn unionfind_test_id(&mut self) -> Id {
            self.unionfind.make_set()
        }
    }
}
