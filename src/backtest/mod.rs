//! Backtest Module
//!
//! Runs several solvers against the same prepared dataset and compares
//! their selections and run times.

use crate::dataset::Action;
use crate::solver::{Portfolio, Solver, SolverError};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use std::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

/// What happened to one solver during a run
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome {
    Completed { portfolio: Portfolio, elapsed_ms: f64 },
    Skipped { reason: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct SolverRun {
    pub solver: String,
    #[serde(flatten)]
    pub outcome: RunOutcome,
}

impl SolverRun {
    pub fn portfolio(&self) -> Option<&Portfolio> {
        match &self.outcome {
            RunOutcome::Completed { portfolio, .. } => Some(portfolio),
            RunOutcome::Skipped { .. } => None,
        }
    }

    pub fn elapsed_ms(&self) -> Option<f64> {
        match &self.outcome {
            RunOutcome::Completed { elapsed_ms, .. } => Some(*elapsed_ms),
            RunOutcome::Skipped { .. } => None,
        }
    }
}

/// Side-by-side view of the completed runs
#[derive(Debug, Clone, Default, Serialize)]
pub struct Comparison {
    pub best_solver: Option<String>,
    pub best_profit: Option<f64>,
    pub fastest_solver: Option<String>,
    /// Profit of the first completed run minus the second one
    pub profit_gap: Option<f64>,
    /// Both runs picked the same set of names
    pub same_selection: Option<bool>,
    /// Elapsed time of the first completed run divided by the second one
    pub speedup: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BacktestReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub dataset: String,
    pub budget: f64,
    pub actions: usize,
    pub runs: Vec<SolverRun>,
    pub comparison: Comparison,
}

pub struct Backtest {
    budget: f64,
}

impl Backtest {
    pub fn new(budget: f64) -> Self {
        Self { budget }
    }

    /// Run each solver in turn. A solver that refuses the input size is
    /// recorded as skipped; any other error aborts the backtest.
    pub fn run(
        &self,
        dataset: &str,
        actions: &[Action],
        solvers: &[&dyn Solver],
    ) -> Result<BacktestReport, SolverError> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        info!(%run_id, dataset, actions = actions.len(), budget = self.budget, "Starting backtest");

        let mut runs = Vec::with_capacity(solvers.len());
        for solver in solvers {
            let started = Instant::now();
            let outcome = match solver.solve(actions, self.budget) {
                Ok(portfolio) => {
                    let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
                    info!(
                        solver = solver.name(),
                        elapsed_ms,
                        total_profit = portfolio.total_profit,
                        "Solver finished"
                    );
                    RunOutcome::Completed {
                        portfolio,
                        elapsed_ms,
                    }
                }
                Err(err @ SolverError::TooManyActions { .. }) => {
                    warn!(solver = solver.name(), "Skipping solver: {}", err);
                    RunOutcome::Skipped {
                        reason: err.to_string(),
                    }
                }
                Err(err) => return Err(err),
            };
            runs.push(SolverRun {
                solver: solver.name().to_string(),
                outcome,
            });
        }

        let comparison = compare(&runs);
        Ok(BacktestReport {
            run_id,
            started_at,
            dataset: dataset.to_string(),
            budget: self.budget,
            actions: actions.len(),
            runs,
            comparison,
        })
    }
}

/// Build the comparison of completed runs
pub fn compare(runs: &[SolverRun]) -> Comparison {
    let completed: Vec<(&SolverRun, &Portfolio, f64)> = runs
        .iter()
        .filter_map(|r| Some((r, r.portfolio()?, r.elapsed_ms()?)))
        .collect();

    let mut comparison = Comparison::default();

    let mut best: Option<(&SolverRun, &Portfolio)> = None;
    for (run, portfolio, _) in &completed {
        if best.map_or(true, |(_, b)| portfolio.total_profit > b.total_profit) {
            best = Some((*run, *portfolio));
        }
    }
    if let Some((run, portfolio)) = best {
        comparison.best_solver = Some(run.solver.clone());
        comparison.best_profit = Some(portfolio.total_profit);
    }

    comparison.fastest_solver = completed
        .iter()
        .min_by(|a, b| a.2.total_cmp(&b.2))
        .map(|(run, _, _)| run.solver.clone());

    if let [(_, first, first_ms), (_, second, second_ms), ..] = completed.as_slice() {
        comparison.profit_gap = Some(first.total_profit - second.total_profit);
        let first_names: BTreeSet<&str> = first.names().into_iter().collect();
        let second_names: BTreeSet<&str> = second.names().into_iter().collect();
        comparison.same_selection = Some(first_names == second_names);
        if *second_ms > 0.0 {
            comparison.speedup = Some(first_ms / second_ms);
        }
    }

    comparison
}

impl fmt::Display for BacktestReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Backtest {} on {} (budget {:.2}€, {} actions)",
            self.run_id, self.dataset, self.budget, self.actions
        )?;
        writeln!(
            f,
            "{:<14} {:<10} {:>10} {:>10} {:>12} {:>9}",
            "solver", "status", "cost", "profit", "time (ms)", "selected"
        )?;
        for run in &self.runs {
            match &run.outcome {
                RunOutcome::Completed {
                    portfolio,
                    elapsed_ms,
                } => writeln!(
                    f,
                    "{:<14} {:<10} {:>10.2} {:>10.2} {:>12.3} {:>9}",
                    run.solver,
                    "completed",
                    portfolio.total_cost,
                    portfolio.total_profit,
                    elapsed_ms,
                    portfolio.actions.len()
                )?,
                RunOutcome::Skipped { reason } => {
                    writeln!(f, "{:<14} {:<10} {}", run.solver, "skipped", reason)?
                }
            }
        }

        let c = &self.comparison;
        if let (Some(solver), Some(profit)) = (&c.best_solver, c.best_profit) {
            write!(f, "best: {} ({:.2}€)", solver, profit)?;
        }
        if let Some(fastest) = &c.fastest_solver {
            write!(f, " | fastest: {}", fastest)?;
        }
        if let Some(gap) = c.profit_gap {
            write!(f, " | gap: {:.2}€", gap)?;
        }
        if let Some(same) = c.same_selection {
            write!(f, " | same selection: {}", if same { "yes" } else { "no" })?;
        }
        if let Some(speedup) = c.speedup {
            write!(f, " | time ratio: x{:.2}", speedup)?;
        }
        Ok(())
    }
}
