use std::fmt;
use std::sync::Arc;

use symbol_table::GlobalSymbol;

use crate::analysis::Analysis;
use crate::construct::{Construct, RecExpr};
use crate::egraph::EGraph;
use crate::error::{EqSatError, Result};
use crate::pattern::{apply_pat, Pattern, SearchMatches, Subst, Var};
use crate::unionfind::Id;

/// The right-hand side of a [`Rewrite`]: either a static pattern
/// (instantiated by reusing the bound e-class ids directly, never
/// materializing a fresh class for a substituted variable), or a
/// dynamic callback given the match's substitution and a read-only view
/// of the e-graph, which may decline to fire by returning `None`.
#[derive(Clone)]
pub enum Rhs<L: Construct, N: Analysis<L>> {
    Pattern(Pattern<L>),
    Dynamic(Arc<dyn Fn(&Subst, &EGraph<L, N>) -> Option<RecExpr<L>> + Send + Sync>),
}

impl<L: Construct + fmt::Debug, N: Analysis<L>> fmt::Debug for Rhs<L, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rhs::Pattern(p) => write!(f, "Rhs::Pattern({p:?})"),
            Rhs::Dynamic(_) => write!(f, "Rhs::Dynamic(..)"),
        }
    }
}

/// A single rewrite rule: find matches of `lhs` and apply `rhs` to each.
#[derive(Clone)]
pub struct Rewrite<L: Construct, N: Analysis<L>> {
    pub name: GlobalSymbol,
    pub lhs: Pattern<L>,
    pub rhs: Rhs<L, N>,
}

impl<L: Construct + fmt::Debug, N: Analysis<L>> fmt::Debug for Rewrite<L, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rewrite")
            .field("name", &self.name)
            .field("lhs", &self.lhs)
            .field("rhs", &self.rhs)
            .finish()
    }
}

impl<L: Construct, N: Analysis<L>> Rewrite<L, N> {
    /// Builds a rule with a static pattern right-hand side. Fails if
    /// `rhs` mentions a variable that doesn't occur in `lhs` -- there
    /// would be nothing to bind it to at apply time.
    pub fn new(name: impl Into<GlobalSymbol>, lhs: Pattern<L>, rhs: Pattern<L>) -> Result<Self> {
        let lhs_vars = lhs.vars();
        for v in rhs.vars() {
            if !lhs_vars.contains(&v) {
                return Err(EqSatError::UnboundRhsVar(v));
            }
        }
        Ok(Rewrite { name: name.into(), lhs, rhs: Rhs::Pattern(rhs) })
    }

    /// Builds a rule whose right-hand side is a host callback. There is
    /// no static right-hand side to validate here: an unbound variable
    /// in a dynamic callback would simply show up as `None` from
    /// `subst.get`, handled by the host.
    pub fn new_dynamic(
        name: impl Into<GlobalSymbol>,
        lhs: Pattern<L>,
        f: impl Fn(&Subst, &EGraph<L, N>) -> Option<RecExpr<L>> + Send + Sync + 'static,
    ) -> Self {
        Rewrite { name: name.into(), lhs, rhs: Rhs::Dynamic(Arc::new(f)) }
    }

    pub fn search(&self, egraph: &EGraph<L, N>) -> Vec<SearchMatches> {
        self.lhs.search(egraph)
    }

    /// Applies every substitution in `matches` (found for this rule's
    /// `lhs`), returning the ids of classes that were actually changed
    /// (i.e. the union with the matched class was not already true).
    pub fn apply(&self, egraph: &mut EGraph<L, N>, matches: &[SearchMatches]) -> Result<Vec<Id>> {
        let mut changed = Vec::new();
        for m in matches {
            for subst in &m.substs {
                let new_id = match &self.rhs {
                    Rhs::Pattern(pat) => apply_pat(pat.ast.as_ref(), egraph, subst)?,
                    Rhs::Dynamic(f) => match f(subst, egraph) {
                        Some(expr) => egraph.add_expr(&expr)?,
                        None => continue,
                    },
                };
                if egraph.union(new_id, m.eclass) {
                    changed.push(new_id);
                }
            }
        }
        Ok(changed)
    }
}

/// Warns (rather than failing) about duplicate rule names -- nothing in
/// this engine requires rule names to be unique, they're bookkeeping
/// keys for the scheduler and the iteration report.
pub fn check_rule_names<L: Construct, N: Analysis<L>>(rules: &[Rewrite<L, N>]) {
    let mut seen = crate::utils::HashSet::default();
    for r in rules {
        if !seen.insert(r.name) {
            log::warn!("duplicate rewrite rule name: {}", r.name);
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
        Mul([Id; 2]),
    }

    impl Construct for Num {
        type Discriminant = u8;
        fn discriminant(&self) -> u8 {
            match self {
                Num::Lit(_) => 0,
                Num::Add(_) => 1,
                Num::Mul(_) => 2,
            }
        }
        fn matches(&self, other: &Self) -> bool {
            self.discriminant() == other.discriminant()
        }
        fn operands(&self) -> &[Id] {
            match self {
                Num::Lit(_) => &[],
                Num::Add(ids) | Num::Mul(ids) => ids,
            }
        }
        fn operands_mut(&mut self) -> &mut [Id] {
            match self {
                Num::Lit(_) => &mut [],
                Num::Add(ids) | Num::Mul(ids) => ids,
            }
        }
    }

    #[test]
    fn unbound_rhs_var_is_rejected() {
        let x = Var::new("x");
        let y = Var::new("y");
        let lhs = Pattern::<Num>::var(x);
        let rhs = Pattern::<Num>::var(y);
        let result = Rewrite::<Num, ()>::new("bad-rule", lhs, rhs);
        assert!(matches!(result, Err(EqSatError::UnboundRhsVar(v)) if v == y));
    }

    #[test]
    fn commutativity_rule_applies() {
        let mut eg = EGraph::<Num, ()>::default();
        let one = eg.add(Num::Lit(1)).unwrap();
        let two = eg.add(Num::Lit(2)).unwrap();
        let add = eg.add(Num::Add([one, two])).unwrap();
        let swapped = eg.add(Num::Add([two, one])).unwrap();

        let x = Var::new("x");
        let y = Var::new("y");
        let lhs = Pattern::op(Num::Add([Id::new(0), Id::new(0)]), vec![Pattern::var(x), Pattern::var(y)]);
        let rhs = Pattern::op(Num::Add([Id::new(0), Id::new(0)]), vec![Pattern::var(y), Pattern::var(x)]);
        let rule = Rewrite::new("comm-add", lhs, rhs).unwrap();

        let matches = rule.search(&eg);
        rule.apply(&mut eg, &matches).unwrap();
        eg.rebuild();
        assert!(eg.equiv(add, swapped));
    }
}
