use std::fmt;

/// An opaque, densely-allocated e-class identifier.
///
/// `Id`s are never reused and never carry meaning outside a single
/// [`crate::egraph::EGraph`]; always compare them through
/// [`crate::egraph::EGraph::find`] rather than by raw equality when the
/// e-graph may have unioned classes since the `Id` was obtained.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct Id(u32);

impl Id {
    /// Builds an `Id` from a raw index. Mostly useful for constructing
    /// placeholder operands in a host e-node used only as a `Pattern::op`
    /// shape, where the actual operand values are ignored.
    pub fn new(i: usize) -> Self {
        Id(i as u32)
    }

    pub(crate) fn val(self) -> usize {
        self.0 as usize
    }
}

impl From<usize> for Id {
    fn from(i: usize) -> Self {
        Id::new(i)
    }
}

impl From<Id> for usize {
    fn from(id: Id) -> Self {
        id.val()
    }
}

impl fmt::Debug for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Union-find with path compression and union-by-rank.
///
/// This only tracks equivalence classes of `Id`s; it knows nothing about
/// e-nodes, e-classes, or the hash-cons table. [`crate::egraph::EGraph`]
/// layers those on top.
#[derive(Debug, Default, Clone)]
pub(crate) struct UnionFind {
    parents: Vec<Id>,
    ranks: Vec<u8>,
}

impl UnionFind {
    pub fn make_set(&mut self) -> Id {
        let id = Id::new(self.parents.len());
        self.parents.push(id);
        self.ranks.push(0);
        id
    }

    pub fn len(&self) -> usize {
        self.parents.len()
    }

    /// Finds the canonical representative of `id` without compressing paths.
    /// Always correct, just not the fast path; use [`UnionFind::find_mut`]
    /// whenever `&mut self` is available.
    pub fn find(&self, mut id: Id) -> Id {
        while self.parents[id.val()] != id {
            id = self.parents[id.val()];
        }
        id
    }

    /// Finds the canonical representative of `id`, compressing the path
    /// traversed so future lookups are cheaper.
    pub fn find_mut(&mut self, id: Id) -> Id {
        let root = self.find(id);
        let mut cur = id;
        while self.parents[cur.val()] != root {
            let next = self.parents[cur.val()];
            self.parents[cur.val()] = root;
            cur = next;
        }
        root
    }

    /// Merges the classes of `a` and `b`. Returns `(root, None)` if they
    /// were already equal, otherwise `(root, Some(absorbed))`.
    pub fn union(&mut self, a: Id, b: Id) -> (Id, Option<Id>) {
        let mut ra = self.find_mut(a);
        let mut rb = self.find_mut(b);
        if ra == rb {
            return (ra, None);
        }
        if self.ranks[ra.val()] < self.ranks[rb.val()] {
            std::mem::swap(&mut ra, &mut rb);
        }
        self.parents[rb.val()] = ra;
        if self.ranks[ra.val()] == self.ranks[rb.val()] {
            self.ranks[ra.val()] += 1;
        }
        (ra, Some(rb))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn singletons_are_their_own_root() {
        let mut uf = UnionFind::default();
        let a = uf.make_set();
        let b = uf.make_set();
        assert_eq!(uf.find(a), a);
        assert_eq!(uf.find(b), b);
        assert_ne!(a, b);
    }

    #[test]
    fn union_merges_and_is_idempotent() {
        let mut uf = UnionFind::default();
        let a = uf.make_set();
        let b = uf.make_set();
        let c = uf.make_set();
        let (root, absorbed) = uf.union(a, b);
        assert!(absorbed.is_some());
        assert_eq!(uf.find(a), root);
        assert_eq!(uf.find(b), root);
        assert_ne!(uf.find(c), root);

        let (_, absorbed_again) = uf.union(a, b);
        assert!(absorbed_again.is_none());
    }

    #[test]
    fn union_chain_collapses_to_one_root() {
        let mut uf = UnionFind::default();
        let ids: Vec<Id> = (0..5).map(|_| uf.make_set()).collect();
        for w in ids.windows(2) {
            uf.union(w[0], w[1]);
        }
        let root = uf.find(ids[0]);
        for id in &ids {
            assert_eq!(uf.find_mut(*id), root);
        }
    }
}
