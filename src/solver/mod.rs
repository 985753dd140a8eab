//! Solver Module
//!
//! Share selection under a budget: pick each share at most once so that the
//! total cost stays within the budget and the total profit is maximal.
//! Two implementations share the [`Solver`] trait so that the backtest
//! harness can run them side by side.

pub mod brute_force;
pub mod dynamic;

use crate::config::Settings;
use crate::dataset::Action;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

pub use brute_force::{BruteForce, BruteForceReport, Combination};
pub use dynamic::DynamicProgramming;

/// Absolute slack used when comparing euro amounts against the budget
pub const BUDGET_EPSILON: f64 = 1e-9;

const REL_TOLERANCE: f64 = 1e-9;

/// Solver errors
#[derive(Error, Debug)]
pub enum SolverError {
    #[error("Too many actions for exhaustive search: {count} (max {max})")]
    TooManyActions { count: usize, max: usize },
    #[error("Invalid budget: {0}")]
    InvalidBudget(f64),
    #[error("Failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Common interface of the selection algorithms
pub trait Solver: Send + Sync {
    /// Short name used in reports
    fn name(&self) -> &'static str;

    fn solve(&self, actions: &[Action], budget: f64) -> Result<Portfolio, SolverError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    BruteForce,
    Dp,
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Algorithm::BruteForce => write!(f, "brute-force"),
            Algorithm::Dp => write!(f, "dp"),
        }
    }
}

/// How a portfolio was obtained
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolveMeta {
    pub algorithm: Algorithm,
    /// DP granularity in cents
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step_cents: Option<u32>,
    pub steps_explored: usize,
    pub steps_total: usize,
}

impl SolveMeta {
    pub fn brute_force() -> Self {
        Self {
            algorithm: Algorithm::BruteForce,
            step_cents: None,
            steps_explored: 0,
            steps_total: 0,
        }
    }

    pub fn dp(step_cents: u32) -> Self {
        Self {
            algorithm: Algorithm::Dp,
            step_cents: Some(step_cents),
            steps_explored: 0,
            steps_total: 0,
        }
    }
}

/// Selected shares with their totals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Portfolio {
    pub actions: Vec<Action>,
    pub total_cost: f64,
    pub total_profit: f64,
    pub meta: SolveMeta,
}

impl Portfolio {
    pub fn from_actions(actions: Vec<Action>, meta: SolveMeta) -> Self {
        let total_cost = actions.iter().map(|a| a.cost).sum();
        let total_profit = actions.iter().map(Action::profit).sum();
        Self {
            actions,
            total_cost,
            total_profit,
            meta,
        }
    }

    pub fn empty(meta: SolveMeta) -> Self {
        Self::from_actions(Vec::new(), meta)
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.actions.iter().map(|a| a.name.as_str()).collect()
    }
}

impl fmt::Display for Portfolio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.actions.is_empty() {
            return write!(f, "No action selected.");
        }
        writeln!(f, "{}", self.names().join(", "))?;
        writeln!(f, "Cost: {:.2}€", self.total_cost)?;
        write!(f, "Profit: {:.2}€", self.total_profit)
    }
}

/// Relative float comparison with a 1e-9 tolerance
pub fn is_close(a: f64, b: f64) -> bool {
    (a - b).abs() <= REL_TOLERANCE * a.abs().max(b.abs())
}

pub(crate) fn check_budget(budget: f64) -> Result<(), SolverError> {
    if budget.is_finite() && budget >= 0.0 {
        Ok(())
    } else {
        Err(SolverError::InvalidBudget(budget))
    }
}

/// Drop non-viable actions and those below the minimum rate.
/// Does nothing when the pre-filter is disabled.
pub fn pre_filter(actions: Vec<Action>, settings: &Settings) -> Vec<Action> {
    if !settings.pre_filter {
        return actions;
    }
    actions
        .into_iter()
        .filter(|a| a.cost > 0.0 && a.rate > 0.0 && a.rate >= settings.min_rate)
        .collect()
}

/// Drop actions that cost more than the whole budget
pub fn prune_over_budget(actions: &[Action], budget: f64) -> Vec<Action> {
    actions.iter().filter(|a| a.cost <= budget).cloned().collect()
}

/// Keep a single action per cost (in cents), the one with the best rate.
/// First-seen order of the costs is preserved.
pub fn dedupe_same_cost(actions: &[Action]) -> Vec<Action> {
    let mut by_cost: HashMap<u64, usize> = HashMap::new();
    let mut kept: Vec<Action> = Vec::new();

    for action in actions {
        match by_cost.get(&action.cost_cents()) {
            Some(&idx) => {
                if action.rate > kept[idx].rate {
                    kept[idx] = action.clone();
                }
            }
            None => {
                by_cost.insert(action.cost_cents(), kept.len());
                kept.push(action.clone());
            }
        }
    }

    kept
}

/// Pruning applied before the DP
pub fn prune_exact(actions: &[Action], budget: f64, dedupe: bool) -> Vec<Action> {
    let pruned = prune_over_budget(actions, budget);
    let pruned = if dedupe { dedupe_same_cost(&pruned) } else { pruned };
    // Sub-cent prices would weigh nothing in the DP
    pruned.into_iter().filter(|a| a.cost_cents() > 0).collect()
}
