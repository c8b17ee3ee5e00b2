//! Equality saturation: e-graphs, pattern matching, rewrite rules, and
//! cost-directed extraction.
//!
//! An [`egraph::EGraph`] stores terms up to a growing equivalence
//! relation discovered by repeatedly searching for [`pattern::Pattern`]
//! matches and applying [`rewrite::Rewrite`] rules, via [`runner::Runner`].
//! Once saturated (or a search budget runs out), [`extract::Extractor`]
//! picks a cheapest representative term out of each e-class.
//!
//! Everything here is generic over a host-supplied [`construct::Construct`]
//! e-node type -- this crate has no opinion on what the operators mean,
//! only on how to find and exploit equalities between them.

mod analysis;
mod construct;
mod egraph;
mod error;
mod extract;
mod pattern;
mod rewrite;
mod runner;
mod unionfind;
mod utils;

pub use analysis::{merge_option, Analysis, DidMerge, FoldAnalysis};
pub use construct::{Construct, RecExpr};
pub use egraph::{EClass, EGraph};
pub use error::{EqSatError, Result};
pub use extract::{AstDepth, AstSize, CostFunction, Extractor};
pub use pattern::{vars, ENodeOrVar, Pattern, PatternAst, SearchMatches, Subst, Var};
pub use rewrite::{check_rule_names, Rewrite, Rhs};
pub use runner::{
    run_rules_for, BackoffScheduler, Iteration, Report, RewriteScheduler, RuleStats, Runner,
    SimpleScheduler, StopReason, DEFAULT_ITERS,
};
pub use unionfind::Id;

/// Re-exports the common entry points; `use eqsat::prelude::*;` is
/// usually enough to write a rule set and run it.
pub mod prelude {
    pub use crate::{
        vars, Analysis, Construct, DidMerge, EClass, EGraph, EqSatError, Extractor, FoldAnalysis,
        Pattern, RecExpr, Rewrite, Runner, StopReason, Subst, Var,
    };
}
