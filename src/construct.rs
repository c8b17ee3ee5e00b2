use std::fmt;
use std::hash::Hash;
use std::ops::{Index, IndexMut};

use crate::unionfind::Id;
use crate::utils::HashMap;

/// The host-supplied contract for a single e-node.
///
/// A `Construct` is one "layer" of a term: either a zero-operand atom
/// (a leaf, e.g. a variable or a literal) or an operator applied to a
/// fixed number of child [`Id`]s. This crate never looks inside a host
/// e-node beyond this trait -- no numeric payloads, no symbol tables, no
/// knowledge of what the operators mean.
///
/// Implementations are ordinary enums: one variant per atom or operator
/// kind, with operator variants carrying their operand `Id`s (typically
/// in a fixed-size array or a [`smallvec::SmallVec`]).
pub trait Construct: fmt::Debug + Clone + Eq + Hash {
    /// Identifies an e-node's "shape" (which operator, or which atom
    /// variant) independent of its operand `Id`s. Used to pre-index
    /// e-classes by head so the matcher doesn't have to scan every class
    /// for every pattern node.
    type Discriminant: fmt::Debug + Clone + Eq + Hash;

    fn discriminant(&self) -> Self::Discriminant;

    /// Whether `self` and `other` are the same atom, or the same operator
    /// applied to (unspecified) operands -- i.e. same head, same arity.
    /// Does not compare operand `Id`s.
    fn matches(&self, other: &Self) -> bool;

    fn operands(&self) -> &[Id];
    fn operands_mut(&mut self) -> &mut [Id];

    fn len(&self) -> usize {
        self.operands().len()
    }

    fn is_leaf(&self) -> bool {
        self.operands().is_empty()
    }

    fn for_each_oprnd(&self, mut f: impl FnMut(Id)) {
        self.operands().iter().copied().for_each(&mut f)
    }

    fn for_each_oprnd_mut(&mut self, mut f: impl FnMut(&mut Id)) {
        self.operands_mut().iter_mut().for_each(&mut f)
    }

    fn update_operands(&mut self, mut f: impl FnMut(Id) -> Id) {
        for id in self.operands_mut() {
            *id = f(*id);
        }
    }

    fn map_operands(mut self, f: impl FnMut(Id) -> Id) -> Self
    where
        Self: Sized,
    {
        self.update_operands(f);
        self
    }

    fn all(&self, mut f: impl FnMut(Id) -> bool) -> bool {
        self.operands().iter().all(|&id| f(id))
    }

    fn any(&self, mut f: impl FnMut(Id) -> bool) -> bool {
        self.operands().iter().any(|&id| f(id))
    }

    /// Flattens `self` together with the expansion of each of its operands
    /// (obtained from `expr_of`) into a single [`RecExpr`], renumbering
    /// `Id`s so the result is self-contained. Used to build pattern and
    /// rewrite ASTs out of smaller sub-patterns.
    fn join_recexprs<F, Expr>(&self, mut expr_of: F) -> RecExpr<Self>
    where
        Self: Sized,
        F: FnMut(Id) -> Expr,
        Expr: AsRef<[Self]>,
    {
        let mut nodes = Vec::new();
        let mut node = self.clone();
        for id in node.operands_mut() {
            let expr = expr_of(*id);
            let base = nodes.len();
            let offset = |old: Id| Id::new(old.val() + base);
            for child in expr.as_ref() {
                nodes.push(child.clone().map_operands(offset));
            }
            *id = Id::new(nodes.len() - 1);
        }
        nodes.push(node);
        RecExpr::from(nodes)
    }
}

/// A flat, hash-consable term over some [`Construct`] language.
///
/// Nodes are stored in a `Vec` where every node's operands are `Id`s
/// indexing earlier positions in the same vector; the last element is
/// the root. This is the representation both real e-graph terms
/// (inserted via [`crate::egraph::EGraph::add_expr`]) and pattern/rewrite
/// ASTs are built out of.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct RecExpr<L> {
    nodes: Vec<L>,
}

impl<L> Default for RecExpr<L> {
    fn default() -> Self {
        RecExpr { nodes: Vec::new() }
    }
}

impl<L> From<Vec<L>> for RecExpr<L> {
    fn from(nodes: Vec<L>) -> Self {
        RecExpr { nodes }
    }
}

impl<L> AsRef<[L]> for RecExpr<L> {
    fn as_ref(&self) -> &[L] {
        &self.nodes
    }
}

impl<L> Index<Id> for RecExpr<L> {
    type Output = L;
    fn index(&self, id: Id) -> &L {
        &self.nodes[id.val()]
    }
}

impl<L> IndexMut<Id> for RecExpr<L> {
    fn index_mut(&mut self, id: Id) -> &mut L {
        &mut self.nodes[id.val()]
    }
}

impl<L: fmt::Debug> fmt::Debug for RecExpr<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        crate::utils::fmt_iter(["[", ", ", "]"], self.nodes.iter(), |e, f| write!(f, "{e:?}"), f)
    }
}

impl<L: Construct> RecExpr<L> {
    /// Appends `node` as a new element and returns its `Id`. `node`'s
    /// operands must already refer to earlier elements of this `RecExpr`.
    pub fn add(&mut self, node: L) -> Id {
        debug_assert!(node.operands().iter().all(|id| id.val() < self.nodes.len()));
        self.nodes.push(node);
        Id::new(self.nodes.len() - 1)
    }

    /// The `Id` of the root (last) node. Panics on an empty `RecExpr`.
    pub fn root(&self) -> Id {
        assert!(!self.nodes.is_empty(), "empty RecExpr has no root");
        Id::new(self.nodes.len() - 1)
    }

    /// Rebuilds this expression keeping only nodes reachable from the
    /// root, and hash-consing structurally identical subtrees together.
    pub fn compact(&self) -> Self {
        let mut memo: HashMap<Id, Id> = HashMap::default();
        let mut seen: HashMap<L, Id> = HashMap::default();
        let mut built: Vec<L> = Vec::new();
        fn rec<L: Construct>(
            nodes: &[L],
            id: Id,
            memo: &mut HashMap<Id, Id>,
            seen: &mut HashMap<L, Id>,
            built: &mut Vec<L>,
        ) -> Id {
            if let Some(&new_id) = memo.get(&id) {
                return new_id;
            }
            let mut node = nodes[id.val()].clone();
            for child in node.operands_mut() {
                *child = rec(nodes, *child, memo, seen, built);
            }
            let new_id = if let Some(&existing) = seen.get(&node) {
                existing
            } else {
                built.push(node.clone());
                let nid = Id::new(built.len() - 1);
                seen.insert(node, nid);
                nid
            };
            memo.insert(id, new_id);
            new_id
        }
        rec(&self.nodes, self.root(), &mut memo, &mut seen, &mut built);
        RecExpr { nodes: built }
    }
}

impl<L: Construct + fmt::Display> fmt::Display for RecExpr<L> {
    /// Writes `self` as an s-expression: `(head child child)`, or just
    /// `head` for a leaf. Requires `L`'s own `Display` impl to print only
    /// its head/tag, not recurse into its operands -- `RecExpr` does the
    /// recursion.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn rec<L: Construct + fmt::Display>(
            nodes: &[L],
            id: Id,
            f: &mut fmt::Formatter<'_>,
        ) -> fmt::Result {
            let node = &nodes[id.val()];
            if node.is_leaf() {
                return write!(f, "{node}");
            }
            write!(f, "({node}")?;
            for &child in node.operands() {
                write!(f, " ")?;
                rec(nodes, child, f)?;
            }
            write!(f, ")")
        }
        rec(&self.nodes, self.root(), f)
    }
}
