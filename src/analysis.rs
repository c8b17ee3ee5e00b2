use std::fmt::Debug;
use std::hash::Hash;
use std::marker::PhantomData;
use std::ops::BitOr;

use crate::construct::Construct;
use crate::egraph::EGraph;
use crate::unionfind::Id;

/// Records which sides of a [`Analysis::merge`] actually changed the
/// stored data, so the e-graph knows whether it needs to re-run
/// [`Analysis::modify`] and re-check downstream classes.
///
/// `DidMerge(changed_a, changed_b)`: `changed_a` is set when the merged
/// value differs from what `a` held before the call; `changed_b`
/// likewise for what `b` held.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DidMerge(pub bool, pub bool);

impl BitOr for DidMerge {
    type Output = DidMerge;
    fn bitor(self, rhs: Self) -> Self::Output {
        DidMerge(self.0 || rhs.0, self.1 || rhs.1)
    }
}

/// An e-class analysis: a lattice of facts computed bottom-up over
/// e-nodes and merged whenever two e-classes unify.
///
/// `make` computes a fresh class's data from its first e-node (and the
/// already-computed data of that node's children); `merge` combines the
/// data of two e-classes that just became one; `modify` is an optional
/// hook run after every merge that may further mutate the e-graph (for
/// example, unioning in a freshly-folded constant).
///
/// The default implementation of everything except `make`/`merge` is a
/// no-op, so an analysis that only needs to fold values doesn't have to
/// think about `modify` at all.
pub trait Analysis<L: Construct>: Sized {
    type Data: Debug + Clone + Eq + Hash;

    fn make(egraph: &mut EGraph<L, Self>, enode: &L) -> Self::Data;

    /// Combines the data of the e-class being absorbed (`b`) into the
    /// data of the surviving e-class (`a`, in place). Returns which side
    /// changed as a result.
    fn merge(&mut self, a: &mut Self::Data, b: Self::Data) -> DidMerge;

    #[allow(unused_variables)]
    fn modify(egraph: &mut EGraph<L, Self>, id: Id) {}

    /// Whether `data` is a "concrete" fold value: when it is, classes
    /// whose data compares equal are queued for union. The default
    /// analysis has no notion of a fold value, so nothing is ever
    /// auto-unioned by data equality.
    #[allow(unused_variables)]
    fn is_fold_value(&self, data: &Self::Data) -> bool {
        false
    }
}

/// The trivial analysis: no data, nothing to merge. Used when an
/// [`EGraph`] is built with no analysis at all.
impl<L: Construct> Analysis<L> for () {
    type Data = ();
    fn make(_egraph: &mut EGraph<L, Self>, _enode: &L) -> Self::Data {}
    fn merge(&mut self, _a: &mut Self::Data, _b: Self::Data) -> DidMerge {
        DidMerge(false, false)
    }
}

/// Merges two `Option`s by keeping whichever side is `Some`, preferring
/// the existing value `to` on a genuine conflict (and logging a warning,
/// since both sides claiming a different concrete value means the
/// analysis found the same class equal to two distinct facts).
pub fn merge_option<T: PartialEq>(
    to: &mut Option<T>,
    from: Option<T>,
    merge_fn: impl FnOnce(&mut T, T) -> DidMerge,
) -> DidMerge {
    match (to.as_mut(), from) {
        (None, None) => DidMerge(false, false),
        (None, Some(from_val)) => {
            *to = Some(from_val);
            DidMerge(true, false)
        }
        (Some(_), None) => DidMerge(false, true),
        (Some(to_val), Some(from_val)) => merge_fn(to_val, from_val),
    }
}

/// A ready-made [`Analysis`] driven entirely by a host closure: given an
/// e-node and the already-folded values of its children (`None` where a
/// child has no fold value yet), compute this node's fold value (or
/// `None` if it can't be folded). This matches the literal "analysis
/// callback" shape -- no separate trait impl required, just a closure.
pub struct FoldAnalysis<L, V, F> {
    fold: F,
    _marker: PhantomData<(L, V)>,
}

impl<L, V, F> FoldAnalysis<L, V, F>
where
    L: Construct,
    V: Clone + Debug + Eq + Hash,
    F: Fn(&L, &[Option<&V>]) -> Option<V>,
{
    pub fn new(fold: F) -> Self {
        FoldAnalysis { fold, _marker: PhantomData }
    }
}

impl<L, V, F> Analysis<L> for FoldAnalysis<L, V, F>
where
    L: Construct,
    V: Clone + Debug + Eq + Hash,
    F: Fn(&L, &[Option<&V>]) -> Option<V>,
{
    type Data = Option<V>;

    fn make(egraph: &mut EGraph<L, Self>, enode: &L) -> Self::Data {
        let child_vals: Vec<Option<&V>> = enode
            .operands()
            .iter()
            .map(|&id| egraph.eclass(id).data.as_ref())
            .collect();
        (egraph.analysis.fold)(enode, &child_vals)
    }

    fn merge(&mut self, a: &mut Self::Data, b: Self::Data) -> DidMerge {
        merge_option(a, b, |a, b| {
            if *a != b {
                log::warn!("analysis disagreement: keeping existing folded value");
            }
            DidMerge(false, *a != b)
        })
    }

    fn is_fold_value(&self, data: &Self::Data) -> bool {
        data.is_some()
    }
}
