//! Exhaustive search over every combination of shares.
//!
//! Combinations are visited by increasing size, then in lexicographic
//! order of their indices, so `n` shares give `2^n - 1` candidates. Only a
//! ranked top-N is kept in memory.

use super::{check_budget, Portfolio, SolveMeta, Solver, SolverError, BUDGET_EPSILON};
use crate::config::Settings;
use crate::dataset::Action;
use serde::Serialize;
use tracing::{debug, info};

/// One affordable combination
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Combination {
    pub actions: Vec<Action>,
    pub total_cost: f64,
    pub total_profit: f64,
}

impl Combination {
    pub fn names(&self) -> Vec<&str> {
        self.actions.iter().map(|a| a.name.as_str()).collect()
    }
}

/// Outcome of a full enumeration
#[derive(Debug, Clone, Serialize)]
pub struct BruteForceReport {
    pub total_combinations: u64,
    pub valid_combinations: u64,
    /// Best combinations first; ties keep enumeration order
    pub top: Vec<Combination>,
}

#[derive(Debug, Clone)]
pub struct BruteForce {
    top: usize,
    max_actions: usize,
}

struct Ranked {
    profit: f64,
    cost: f64,
    indices: Vec<usize>,
}

impl BruteForce {
    pub fn new(top: usize, max_actions: usize) -> Self {
        Self { top, max_actions }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.top, settings.max_brute_force_actions)
    }

    /// Enumerate every combination and rank the affordable ones
    pub fn enumerate(&self, actions: &[Action], budget: f64) -> Result<BruteForceReport, SolverError> {
        self.enumerate_top(actions, budget, self.top)
    }

    fn enumerate_top(
        &self,
        actions: &[Action],
        budget: f64,
        keep: usize,
    ) -> Result<BruteForceReport, SolverError> {
        check_budget(budget)?;
        let n = actions.len();
        if n > self.max_actions {
            return Err(SolverError::TooManyActions {
                count: n,
                max: self.max_actions,
            });
        }

        let mut total_combinations: u64 = 0;
        let mut valid_combinations: u64 = 0;
        // `keep` is user input, never size an allocation from it
        let mut ranked: Vec<Ranked> = Vec::new();

        for size in 1..=n {
            let mut indices: Vec<usize> = (0..size).collect();
            loop {
                total_combinations += 1;

                let total_cost: f64 = indices.iter().map(|&i| actions[i].cost).sum();
                if total_cost <= budget + BUDGET_EPSILON {
                    valid_combinations += 1;
                    let total_profit: f64 = indices.iter().map(|&i| actions[i].profit()).sum();
                    insert_ranked(&mut ranked, keep, total_profit, total_cost, &indices);
                }

                if !next_combination(&mut indices, n) {
                    break;
                }
            }
            debug!(size, total_combinations, "Enumerated combinations");
        }

        info!(
            actions = n,
            total_combinations, valid_combinations, "Brute force enumeration done"
        );

        let top = ranked
            .into_iter()
            .map(|r| Combination {
                actions: r.indices.iter().map(|&i| actions[i].clone()).collect(),
                total_cost: r.cost,
                total_profit: r.profit,
            })
            .collect();

        Ok(BruteForceReport {
            total_combinations,
            valid_combinations,
            top,
        })
    }
}

impl Solver for BruteForce {
    fn name(&self) -> &'static str {
        "brute-force"
    }

    fn solve(&self, actions: &[Action], budget: f64) -> Result<Portfolio, SolverError> {
        let report = self.enumerate_top(actions, budget, 1)?;
        Ok(match report.top.into_iter().next() {
            Some(best) => Portfolio::from_actions(best.actions, SolveMeta::brute_force()),
            None => Portfolio::empty(SolveMeta::brute_force()),
        })
    }
}

fn insert_ranked(ranked: &mut Vec<Ranked>, keep: usize, profit: f64, cost: f64, indices: &[usize]) {
    if keep == 0 {
        return;
    }
    if ranked.len() == keep && ranked.last().map_or(false, |worst| profit <= worst.profit) {
        return;
    }
    let pos = ranked.partition_point(|r| r.profit >= profit);
    ranked.insert(
        pos,
        Ranked {
            profit,
            cost,
            indices: indices.to_vec(),
        },
    );
    ranked.truncate(keep);
}

/// Advance `indices` to the next combination of the same size.
/// Returns false once the last one has been visited.
fn next_combination(indices: &mut [usize], n: usize) -> bool {
    let size = indices.len();
    let mut i = size;
    while i > 0 {
        i -= 1;
        if indices[i] < n - size + i {
            indices[i] += 1;
            for j in i + 1..size {
                indices[j] = indices[j - 1] + 1;
            }
            return true;
        }
    }
    false
}
