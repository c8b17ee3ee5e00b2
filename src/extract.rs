use crate::analysis::Analysis;
use crate::construct::{Construct, RecExpr};
use crate::egraph::EGraph;
use crate::unionfind::Id;
use crate::utils::HashMap;

/// A cost function used to pick a representative term out of an
/// e-class's e-nodes during extraction. `Cost` must be totally ordered
/// so extraction can always decide which of two candidates is cheaper.
pub trait CostFunction<L: Construct> {
    type Cost: PartialOrd + Clone;

    /// The cost of `enode`, given the already-computed cost of each of
    /// its children (indexed the same way `enode.operands()` is).
    fn cost<C>(&mut self, enode: &L, costs: C) -> Self::Cost
    where
        C: FnMut(Id) -> Self::Cost;
}

/// Number of e-nodes in the extracted term.
#[derive(Debug, Clone, Copy, Default)]
pub struct AstSize;

impl<L: Construct> CostFunction<L> for AstSize {
    type Cost = usize;

    fn cost<C>(&mut self, enode: &L, mut costs: C) -> Self::Cost
    where
        C: FnMut(Id) -> Self::Cost,
    {
        enode.operands().iter().fold(1, |sum, &id| sum + costs(id))
    }
}

/// Depth of the extracted term (1 for a leaf).
#[derive(Debug, Clone, Copy, Default)]
pub struct AstDepth;

impl<L: Construct> CostFunction<L> for AstDepth {
    type Cost = usize;

    fn cost<C>(&mut self, enode: &L, mut costs: C) -> Self::Cost
    where
        C: FnMut(Id) -> Self::Cost,
    {
        1 + enode.operands().iter().map(|&id| costs(id)).max().unwrap_or(0)
    }
}

/// Orders costs so that a class with no costed e-node yet (`None`)
/// always loses to any class that has one.
fn cmp<T: PartialOrd>(a: &Option<T>, b: &Option<T>) -> std::cmp::Ordering {
    use std::cmp::Ordering::*;
    match (a, b) {
        (None, None) => Equal,
        (None, Some(_)) => Greater,
        (Some(_), None) => Less,
        (Some(a), Some(b)) => a.partial_cmp(b).unwrap_or(Equal),
    }
}

/// Extracts a cheapest representative term for each e-class, via
/// fixed-point relaxation: repeatedly recompute every class's best known
/// (cost, e-node) pair from its children's current best costs, until
/// nothing improves. Ties are broken by e-node insertion order (the
/// first-discovered e-node of equal cost wins, since [`EClass::nodes`]
/// preserves discovery order and [`Iterator::min_by`] keeps the first
/// minimum), then implicitly by class id via the deterministic
/// ascending-id iteration order used while relaxing.
pub struct Extractor<'a, L: Construct, N: Analysis<L>, CF: CostFunction<L>> {
    egraph: &'a EGraph<L, N>,
    cost_fn: CF,
    costs: HashMap<Id, (CF::Cost, L)>,
}

impl<'a, L: Construct, N: Analysis<L>, CF: CostFunction<L>> Extractor<'a, L, N, CF> {
    pub fn new(egraph: &'a EGraph<L, N>, cost_fn: CF) -> Self {
        let mut extractor = Extractor { egraph, cost_fn, costs: HashMap::default() };
        extractor.find_costs();
        extractor
    }

    pub fn find_best_cost(&self, id: Id) -> CF::Cost {
        let id = self.egraph.find(id);
        self.costs[&id].0.clone()
    }

    /// The cheapest node for `id`'s class and its cost.
    pub fn find_best_node(&self, id: Id) -> (CF::Cost, &L) {
        let id = self.egraph.find(id);
        let (cost, node) = &self.costs[&id];
        (cost.clone(), node)
    }

    /// The cheapest whole term rooted at `id`'s class.
    pub fn find_best(&self, id: Id) -> (CF::Cost, RecExpr<L>) {
        let mut expr = RecExpr::default();
        let mut memo: HashMap<Id, Id> = HashMap::default();
        let new_root = self.build(self.egraph.find(id), &mut expr, &mut memo);
        debug_assert_eq!(new_root, expr.root());
        (self.find_best_cost(id), expr)
    }

    fn build(&self, id: Id, expr: &mut RecExpr<L>, memo: &mut HashMap<Id, Id>) -> Id {
        let id = self.egraph.find(id);
        if let Some(&done) = memo.get(&id) {
            return done;
        }
        let (_, node) = &self.costs[&id];
        let node = node.clone().map_operands(|child| self.build(child, expr, memo));
        let new_id = expr.add(node);
        memo.insert(id, new_id);
        new_id
    }

    fn find_costs(&mut self) {
        let mut did_something = true;
        while did_something {
            did_something = false;
            let mut ids: Vec<Id> = self.egraph.classes().map(|c| c.id).collect();
            ids.sort();
            for id in ids {
                if self.make_pass(id) {
                    did_something = true;
                }
            }
        }
        for class in self.egraph.classes() {
            if !self.costs.contains_key(&class.id) {
                log::warn!("eclass {} has no node with a finite cost reachable", class.id);
            }
        }
    }

    /// Recomputes the best (cost, node) pair for `id`'s class from its
    /// nodes' current child costs. Returns whether this improved on the
    /// previously recorded best.
    fn make_pass(&mut self, id: Id) -> bool {
        let class = self.egraph.eclass(id);
        let pass_cost = class
            .nodes
            .iter()
            .filter(|n| n.operands().iter().all(|c| self.costs.contains_key(&self.egraph.find(*c))))
            .map(|n| {
                let cost = self.cost_fn.cost(n, |c| self.costs[&self.egraph.find(c)].0.clone());
                (cost, n.clone())
            })
            .min_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

        match (self.costs.get(&id), pass_cost) {
            (existing, Some((new_cost, new_node))) => {
                let better = cmp(&existing.map(|(c, _)| c.clone()), &Some(new_cost.clone()))
                    == std::cmp::Ordering::Greater;
                if better {
                    self.costs.insert(id, (new_cost, new_node));
                    true
                } else {
                    false
                }
            }
            (_, None) => false,
        }
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
    fn extracts_the_smaller_of_two_equivalent_nodes() {
        let mut eg = EGraph::<Num, ()>::default();
        let one = eg.add(Num::Lit(1)).unwrap();
        let two = eg.add(Num::Lit(2)).unwrap();
        let sum = eg.add(Num::Add([one, two])).unwrap();
        let three = eg.add(Num::Lit(3)).unwrap();
        eg.union(sum, three);
        eg.rebuild();

        let (cost, expr) = Extractor::new(&eg, AstSize).find_best(sum);
        assert_eq!(cost, 1);
        assert_eq!(expr.as_ref(), &[Num::Lit(3)]);
    }
}
