use std::fmt;
use std::hash::Hash;

use smallvec::SmallVec;
use symbol_table::GlobalSymbol;

use crate::analysis::Analysis;
use crate::construct::{Construct, RecExpr};
use crate::egraph::EGraph;
use crate::unionfind::Id;

/// A pattern variable: a name that unifies with whatever e-class it
/// first matches against, and must match the same class on every later
/// occurrence within one substitution.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Var(GlobalSymbol);

impl Var {
    pub fn new(name: &str) -> Self {
        Var(GlobalSymbol::from(name))
    }
}

/// Builds one [`Var`] per whitespace-separated name in `names`, e.g.
/// `vars("a b c")` is `[Var::new("a"), Var::new("b"), Var::new("c")]`.
/// A convenience for rule sets that bind several pattern variables at
/// once, mirroring how patterns are usually written out by hand.
pub fn vars(names: &str) -> Vec<Var> {
    names.split_whitespace().map(Var::new).collect()
}

impl fmt::Debug for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "?{}", self.0)
    }
}

impl fmt::Display for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "?{}", self.0)
    }
}

impl From<&str> for Var {
    fn from(s: &str) -> Self {
        Var::new(s)
    }
}

/// A binding from pattern variables to e-class ids, built up during a
/// single match attempt. Small by construction (one entry per distinct
/// variable in a pattern), so it's backed by a `SmallVec` rather than a
/// hash map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Subst {
    entries: SmallVec<[(Var, Id); 4]>,
}

impl Subst {
    pub fn get(&self, v: Var) -> Option<Id> {
        self.entries.iter().find(|(k, _)| *k == v).map(|(_, id)| *id)
    }

    pub fn insert(&mut self, v: Var, id: Id) -> Option<Id> {
        let old = self.get(v);
        if old.is_none() {
            self.entries.push((v, id));
        }
        old
    }
}

impl std::ops::Index<Var> for Subst {
    type Output = Id;
    fn index(&self, v: Var) -> &Id {
        self.entries
            .iter()
            .find(|(k, _)| *k == v)
            .map(|(_, id)| id)
            .unwrap_or_else(|| panic!("variable {v} not bound in this substitution"))
    }
}

/// A pattern node: either a real e-node whose operands index into the
/// same [`PatternAst`], or a pattern [`Var`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ENodeOrVar<L> {
    ENode(L),
    Var(Var),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ENodeOrVarDiscriminant<D> {
    ENode(D),
    Var(Var),
}

impl<L: Construct> Construct for ENodeOrVar<L> {
    type Discriminant = ENodeOrVarDiscriminant<L::Discriminant>;

    fn discriminant(&self) -> Self::Discriminant {
        match self {
            ENodeOrVar::ENode(n) => ENodeOrVarDiscriminant::ENode(n.discriminant()),
            ENodeOrVar::Var(v) => ENodeOrVarDiscriminant::Var(*v),
        }
    }

    fn matches(&self, _other: &Self) -> bool {
        unreachable!("pattern nodes are never matched against each other")
    }

    fn operands(&self) -> &[Id] {
        match self {
            ENodeOrVar::ENode(n) => n.operands(),
            ENodeOrVar::Var(_) => &[],
        }
    }

    fn operands_mut(&mut self) -> &mut [Id] {
        match self {
            ENodeOrVar::ENode(n) => n.operands_mut(),
            ENodeOrVar::Var(_) => &mut [],
        }
    }
}

impl<L: Construct + fmt::Display> fmt::Display for ENodeOrVar<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ENodeOrVar::ENode(n) => write!(f, "{n}"),
            ENodeOrVar::Var(v) => write!(f, "{v}"),
        }
    }
}

/// The flat AST a [`Pattern`] is built out of: just a [`RecExpr`] over
/// [`ENodeOrVar`].
pub type PatternAst<L> = RecExpr<ENodeOrVar<L>>;

/// A tree of e-node shapes and pattern variables, used as the
/// left-hand side of a [`crate::rewrite::Rewrite`] (searched for in an
/// e-graph) or as a static right-hand side (instantiated against a
/// substitution).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern<L: Construct> {
    pub ast: PatternAst<L>,
}

impl<L: Construct> Pattern<L> {
    pub fn new(ast: PatternAst<L>) -> Self {
        Pattern { ast: ast.compact() }
    }

    pub fn var(v: Var) -> Self {
        Pattern::new(PatternAst::from(vec![ENodeOrVar::Var(v)]))
    }

    /// A pattern matching exactly the given (necessarily leaf) atom.
    pub fn atom(atom: L) -> Self {
        assert!(atom.is_leaf(), "Pattern::atom requires a zero-operand node");
        Pattern::new(PatternAst::from(vec![ENodeOrVar::ENode(atom)]))
    }

    /// A pattern matching `shape`'s operator applied to `children`.
    /// `shape`'s own operand ids are ignored (and must still satisfy the
    /// host arity, i.e. `shape.len() == children.len()`).
    pub fn op(shape: L, children: Vec<Pattern<L>>) -> Self {
        assert_eq!(
            shape.len(),
            children.len(),
            "pattern operator arity must match the number of child patterns"
        );
        // Flatten each child pattern's AST into one combined array, then
        // append the operator node with its operands pointing at each
        // child's (renumbered) root -- same scheme `Construct::join_recexprs`
        // uses for real e-nodes, done by hand here since each child's ids
        // are meaningless outside its own AST.
        let mut nodes: Vec<ENodeOrVar<L>> = Vec::new();
        let mut child_roots = Vec::with_capacity(children.len());
        for child in &children {
            let base = nodes.len();
            for n in child.ast.as_ref() {
                nodes.push(n.clone().map_operands(|id| Id::new(id.val() + base)));
            }
            child_roots.push(Id::new(nodes.len() - 1));
        }
        let mut iter = child_roots.into_iter();
        let instantiated = shape.map_operands(|_| iter.next().expect("arity checked above"));
        nodes.push(ENodeOrVar::ENode(instantiated));
        Pattern::new(PatternAst::from(nodes))
    }

    pub fn vars(&self) -> Vec<Var> {
        let mut vars = Vec::new();
        for n in self.ast.as_ref() {
            if let ENodeOrVar::Var(v) = n {
                if !vars.contains(v) {
                    vars.push(*v);
                }
            }
        }
        vars
    }

    /// Searches every live e-class in `egraph` for matches of this
    /// pattern, pre-filtering by the root's discriminant when the root
    /// isn't itself a bare variable.
    pub fn search<N: Analysis<L>>(&self, egraph: &EGraph<L, N>) -> Vec<SearchMatches> {
        let root_idx = self.ast.as_ref().len() - 1;
        let mut out = Vec::new();
        let mut visited = crate::utils::HashSet::default();
        let candidates: Vec<Id> = match &self.ast.as_ref()[root_idx] {
            ENodeOrVar::ENode(n) => {
                egraph.classes_by_discriminant(&n.discriminant()).to_vec()
            }
            ENodeOrVar::Var(_) => egraph.classes().map(|c| c.id).collect(),
        };
        for id in candidates {
            let id = egraph.find(id);
            if !visited.insert(id) {
                continue;
            }
            if let Some(m) = self.search_eclass(egraph, id) {
                out.push(m);
            }
        }
        out
    }

    pub fn search_eclass<N: Analysis<L>>(
        &self,
        egraph: &EGraph<L, N>,
        eclass: Id,
    ) -> Option<SearchMatches> {
        let root_idx = self.ast.as_ref().len() - 1;
        let mut substs = Vec::new();
        match_pattern(egraph, self.ast.as_ref(), root_idx, eclass, &Subst::default(), &mut substs);
        if substs.is_empty() {
            None
        } else {
            Some(SearchMatches { eclass, substs })
        }
    }
}

impl<L: Construct + fmt::Display> fmt::Display for Pattern<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.ast, f)
    }
}

/// Every substitution found for one pattern anchored at one e-class.
#[derive(Debug)]
pub struct SearchMatches {
    pub eclass: Id,
    pub substs: Vec<Subst>,
}

fn match_pattern<L: Construct, N: Analysis<L>>(
    egraph: &EGraph<L, N>,
    pat: &[ENodeOrVar<L>],
    idx: usize,
    class: Id,
    subst: &Subst,
    out: &mut Vec<Subst>,
) {
    let class = egraph.find(class);
    match &pat[idx] {
        ENodeOrVar::Var(v) => match subst.get(*v) {
            Some(bound) if egraph.find(bound) == class => out.push(subst.clone()),
            Some(_) => {}
            None => {
                let mut s = subst.clone();
                s.insert(*v, class);
                out.push(s);
            }
        },
        ENodeOrVar::ENode(pnode) => {
            for enode in &egraph.eclass(class).nodes {
                if !pnode.matches(enode) {
                    continue;
                }
                match_children(egraph, pat, pnode.operands(), enode.operands(), subst, out);
            }
        }
    }
}

fn match_children<L: Construct, N: Analysis<L>>(
    egraph: &EGraph<L, N>,
    pat: &[ENodeOrVar<L>],
    pat_children: &[Id],
    enode_children: &[Id],
    subst: &Subst,
    out: &mut Vec<Subst>,
) {
    if pat_children.is_empty() {
        out.push(subst.clone());
        return;
    }
    let mut partials = vec![subst.clone()];
    for (&pchild, &echild) in pat_children.iter().zip(enode_children) {
        let mut next = Vec::new();
        for s in &partials {
            match_pattern(egraph, pat, pchild.val(), echild, s, &mut next);
        }
        partials = next;
        if partials.is_empty() {
            return;
        }
    }
    out.extend(partials);
}

/// Instantiates a (fully ground, i.e. every `Var` bound in `subst`)
/// pattern AST into real e-nodes, reusing the e-class ids already bound
/// by `subst` for variable positions rather than materializing fresh
/// classes for them. Returns the id of the resulting root class.
pub(crate) fn apply_pat<L: Construct, N: Analysis<L>>(
    pat: &[ENodeOrVar<L>],
    egraph: &mut EGraph<L, N>,
    subst: &Subst,
) -> crate::error::Result<Id> {
    let mut ids = vec![Id::new(0); pat.len()];
    for (i, node) in pat.iter().enumerate() {
        let id = match node {
            ENodeOrVar::Var(v) => subst[*v],
            ENodeOrVar::ENode(n) => {
                let n = n.clone().map_operands(|child| ids[child.val()]);
                egraph.add(n)?
            }
        };
        ids[i] = id;
    }
    Ok(*ids.last().expect("pattern ast is non-empty"))
}
