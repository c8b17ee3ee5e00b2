use std::fmt;

use symbol_table::GlobalSymbol;

use crate::analysis::Analysis;
use crate::construct::Construct;
use crate::egraph::EGraph;
use crate::error::Result;
use crate::pattern::SearchMatches;
use crate::rewrite::{check_rule_names, Rewrite};
use crate::utils::{HashMap, Instant};

/// Why a [`Runner`] stopped.
#[derive(Debug, Clone, PartialEq)]
pub enum StopReason {
    /// No rule produced any change in the last iteration: the e-graph is
    /// saturated (with respect to the given rules and limits).
    Saturated,
    IterationLimit(usize),
    NodeLimit(usize),
    TimeLimit(f64),
    Other(String),
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::Saturated => write!(f, "saturated"),
            StopReason::IterationLimit(n) => write!(f, "iteration limit ({n}) reached"),
            StopReason::NodeLimit(n) => write!(f, "node limit ({n}) reached"),
            StopReason::TimeLimit(s) => write!(f, "time limit ({s}s) reached"),
            StopReason::Other(s) => write!(f, "{s}"),
        }
    }
}

/// Per-rule bookkeeping for one iteration: how many e-classes it matched
/// in, and how many substitutions that produced in total.
#[derive(Debug, Clone, Default)]
pub struct RuleStats {
    pub matched_classes: usize,
    pub total_substs: usize,
    pub applied: usize,
}

/// Summary of a single search-then-apply-then-rebuild iteration.
#[derive(Debug, Clone, Default)]
pub struct Iteration {
    pub applied: HashMap<GlobalSymbol, RuleStats>,
    pub n_classes_before: usize,
    pub n_nodes_before: usize,
    pub n_unions: usize,
    pub elapsed: std::time::Duration,
}

/// The full record of a [`Runner::run`] call.
#[derive(Debug, Clone, Default)]
pub struct Report {
    pub iterations: Vec<Iteration>,
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} iteration(s)", self.iterations.len())?;
        for (i, it) in self.iterations.iter().enumerate() {
            writeln!(
                f,
                "  [{i}] {} classes, {} nodes before, {} new unions, {:?}",
                it.n_classes_before, it.n_nodes_before, it.n_unions, it.elapsed
            )?;
        }
        Ok(())
    }
}

/// Decides, for each iteration, which rules get to search and how many
/// of their matches get applied -- the hook real-world rule sets (e.g.
/// associativity plus commutativity together) need to avoid one
/// explosive rule dominating every iteration's budget.
pub trait RewriteScheduler<L: Construct, N: Analysis<L>> {
    fn can_stop(&mut self, _iteration: usize) -> bool {
        true
    }

    fn search_rewrite(
        &mut self,
        iteration: usize,
        egraph: &EGraph<L, N>,
        rewrite: &Rewrite<L, N>,
    ) -> Vec<SearchMatches>;

    fn apply_rewrite(
        &mut self,
        iteration: usize,
        egraph: &mut EGraph<L, N>,
        rewrite: &Rewrite<L, N>,
        matches: Vec<SearchMatches>,
    ) -> Result<usize>;
}

/// Searches and applies every rule fully, every iteration.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimpleScheduler;

impl<L: Construct, N: Analysis<L>> RewriteScheduler<L, N> for SimpleScheduler {
    fn search_rewrite(
        &mut self,
        _iteration: usize,
        egraph: &EGraph<L, N>,
        rewrite: &Rewrite<L, N>,
    ) -> Vec<SearchMatches> {
        rewrite.search(egraph)
    }

    fn apply_rewrite(
        &mut self,
        _iteration: usize,
        egraph: &mut EGraph<L, N>,
        rewrite: &Rewrite<L, N>,
        matches: Vec<SearchMatches>,
    ) -> Result<usize> {
        Ok(rewrite.apply(egraph, &matches)?.len())
    }
}

pub fn default_match_limit() -> usize {
    1000
}

pub fn default_ban_length() -> usize {
    5
}

/// Bans a rule from searching for `ban_length` iterations once it
/// matches more than `match_limit` times in one go, doubling the ban
/// each time it reoffends. Keeps one prolific rule (e.g. associativity)
/// from starving the rest of a rule set's iteration budget.
pub struct BackoffScheduler {
    match_limit: usize,
    ban_length: usize,
    stats: HashMap<GlobalSymbol, BackoffStats>,
}

#[derive(Debug, Clone, Default)]
struct BackoffStats {
    banned_until: usize,
    times_banned: usize,
}

impl Default for BackoffScheduler {
    fn default() -> Self {
        BackoffScheduler {
            match_limit: default_match_limit(),
            ban_length: default_ban_length(),
            stats: HashMap::default(),
        }
    }
}

impl BackoffScheduler {
    pub fn with_match_limit(mut self, limit: usize) -> Self {
        self.match_limit = limit;
        self
    }

    pub fn with_ban_length(mut self, len: usize) -> Self {
        self.ban_length = len;
        self
    }
}

impl<L: Construct, N: Analysis<L>> RewriteScheduler<L, N> for BackoffScheduler {
    fn search_rewrite(
        &mut self,
        iteration: usize,
        egraph: &EGraph<L, N>,
        rewrite: &Rewrite<L, N>,
    ) -> Vec<SearchMatches> {
        let stats = self.stats.entry(rewrite.name).or_default();
        if stats.banned_until > iteration {
            log::debug!("rule {} is banned until iteration {}", rewrite.name, stats.banned_until);
            return Vec::new();
        }
        let matches = rewrite.search(egraph);
        let total: usize = matches.iter().map(|m| m.substs.len()).sum();
        if total > self.match_limit {
            stats.times_banned += 1;
            let length = self.ban_length << stats.times_banned.min(10);
            stats.banned_until = iteration + length;
            log::warn!(
                "rule {} matched {total} times (limit {}), banning for {length} iterations",
                rewrite.name,
                self.match_limit
            );
        }
        matches
    }

    fn apply_rewrite(
        &mut self,
        _iteration: usize,
        egraph: &mut EGraph<L, N>,
        rewrite: &Rewrite<L, N>,
        matches: Vec<SearchMatches>,
    ) -> Result<usize> {
        Ok(rewrite.apply(egraph, &matches)?.len())
    }
}

/// Ensures `egraph.rebuild()` runs exactly once, even if applying a
/// rewrite (in particular a dynamic right-hand side) panics partway
/// through a batch.
struct RebuildOnDrop<'a, L: Construct, N: Analysis<L>> {
    egraph: &'a mut EGraph<L, N>,
    done: bool,
}

impl<'a, L: Construct, N: Analysis<L>> Drop for RebuildOnDrop<'a, L, N> {
    fn drop(&mut self) {
        if !self.done {
            self.egraph.rebuild();
        }
    }
}

const DEFAULT_ITER_LIMIT: usize = 30;
const DEFAULT_NODE_LIMIT: usize = 10_000;
const DEFAULT_TIME_LIMIT: std::time::Duration = std::time::Duration::from_secs(5);

/// The saturation driver's iteration budget when a host doesn't pick one
/// of its own, matching the bare `run(rules, iters)` operation at the
/// core's external boundary.
pub const DEFAULT_ITERS: usize = 7;

/// Convenience matching the core's external `run(rules, iters)` operation
/// directly: builds a default-configured [`Runner`] around `egraph`,
/// caps it at exactly `iters` iterations (ignoring the ambient node/time
/// limits a full `Runner` otherwise applies), and runs it to completion.
/// Use [`DEFAULT_ITERS`] for `iters` when the host doesn't care.
pub fn run_rules_for<L: Construct, N: Analysis<L> + Default>(
    egraph: EGraph<L, N>,
    rules: &[Rewrite<L, N>],
    iters: usize,
) -> Result<Runner<L, N>> {
    Runner::new(egraph).with_iter_limit(iters).run(rules)
}

/// The saturation driver: runs search-then-apply-then-rebuild rounds
/// against a fixed rule set until nothing changes or a configured limit
/// is hit, recording a [`Report`] as it goes.
pub struct Runner<L: Construct, N: Analysis<L> = ()> {
    pub egraph: EGraph<L, N>,
    pub report: Report,
    pub stop_reason: Option<StopReason>,
    iter_limit: usize,
    node_limit: usize,
    time_limit: std::time::Duration,
    start_time: Option<Instant>,
    scheduler: Box<dyn RewriteScheduler<L, N>>,
}

impl<L: Construct, N: Analysis<L> + Default> Default for Runner<L, N> {
    fn default() -> Self {
        Runner::new(EGraph::default())
    }
}

impl<L: Construct, N: Analysis<L>> Runner<L, N> {
    pub fn new(egraph: EGraph<L, N>) -> Self {
        Runner {
            egraph,
            report: Report::default(),
            stop_reason: None,
            iter_limit: DEFAULT_ITER_LIMIT,
            node_limit: DEFAULT_NODE_LIMIT,
            time_limit: DEFAULT_TIME_LIMIT,
            start_time: None,
            scheduler: Box::new(SimpleScheduler),
        }
    }

    pub fn with_iter_limit(mut self, limit: usize) -> Self {
        self.iter_limit = limit;
        self
    }

    pub fn with_node_limit(mut self, limit: usize) -> Self {
        self.node_limit = limit;
        self
    }

    pub fn with_time_limit(mut self, limit: std::time::Duration) -> Self {
        self.time_limit = limit;
        self
    }

    pub fn with_scheduler(mut self, scheduler: impl RewriteScheduler<L, N> + 'static) -> Self {
        self.scheduler = Box::new(scheduler);
        self
    }

    fn check_limits(&self) -> Option<StopReason> {
        if self.report.iterations.len() >= self.iter_limit {
            return Some(StopReason::IterationLimit(self.iter_limit));
        }
        if self.egraph.total_size() >= self.node_limit {
            return Some(StopReason::NodeLimit(self.node_limit));
        }
        if let Some(start) = self.start_time {
            let elapsed = Instant::now().duration_since(start);
            if elapsed >= self.time_limit {
                return Some(StopReason::TimeLimit(self.time_limit.as_secs_f64()));
            }
        }
        None
    }

    /// Runs iterations until saturation or a limit, mutating `self` in
    /// place and returning it for chaining. Duplicate rule names are
    /// warned about, not rejected (see the design notes).
    pub fn run(mut self, rules: &[Rewrite<L, N>]) -> Result<Self> {
        check_rule_names(rules);
        self.start_time.get_or_insert_with(Instant::now);
        loop {
            if let Some(reason) = self.check_limits() {
                log::info!("runner stopping: {reason}");
                self.stop_reason = Some(reason);
                break;
            }
            let saturated = self.run_one(rules)?;
            if saturated && self.scheduler.can_stop(self.report.iterations.len()) {
                log::info!("runner stopping: saturated");
                self.stop_reason = Some(StopReason::Saturated);
                break;
            }
        }
        Ok(self)
    }

    /// One search-then-apply-then-rebuild round. Returns whether nothing
    /// changed (i.e. the e-graph was already saturated for this rule
    /// set).
    fn run_one(&mut self, rules: &[Rewrite<L, N>]) -> Result<bool> {
        let iter_start = Instant::now();
        let n_classes_before = self.egraph.number_of_classes();
        let n_nodes_before = self.egraph.total_size();
        let iteration_idx = self.report.iterations.len();

        let mut all_matches = Vec::with_capacity(rules.len());
        for rule in rules {
            let matches = self.scheduler.search_rewrite(iteration_idx, &self.egraph, rule);
            all_matches.push(matches);
        }

        let mut stats: HashMap<GlobalSymbol, RuleStats> = HashMap::default();
        let mut total_applied = 0usize;
        let n_unions = {
            let mut guard = RebuildOnDrop { egraph: &mut self.egraph, done: false };
            for (rule, matches) in rules.iter().zip(all_matches) {
                let matched_classes = matches.len();
                let total_substs: usize = matches.iter().map(|m| m.substs.len()).sum();
                let applied = self.scheduler.apply_rewrite(
                    iteration_idx,
                    guard.egraph,
                    rule,
                    matches,
                )?;
                total_applied += applied;
                stats.insert(rule.name, RuleStats { matched_classes, total_substs, applied });
            }
            let n_unions = guard.egraph.rebuild();
            guard.done = true;
            n_unions
        };

        self.report.iterations.push(Iteration {
            applied: stats,
            n_classes_before,
            n_nodes_before,
            n_unions,
            elapsed: iter_start.elapsed(),
        });
        Ok(total_applied == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::construct::Construct;
    use crate::pattern::{Pattern, Var};
    use crate::unionfind::Id;

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
    fn empty_rule_list_is_a_single_saturated_iteration() {
        let mut eg = EGraph::<Num, ()>::default();
        eg.add(Num::Lit(1)).unwrap();
        let runner = Runner::new(eg).run(&[]).unwrap();
        assert_eq!(runner.stop_reason, Some(StopReason::Saturated));
        assert_eq!(runner.report.iterations.len(), 1);
    }

    #[test]
    fn saturates_on_a_small_commutative_rule_set() {
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

        let runner = Runner::new(eg).run(&[rule]).unwrap();
        assert!(runner.egraph.equiv(add, swapped));
        assert_eq!(runner.stop_reason, Some(StopReason::Saturated));
    }
}
