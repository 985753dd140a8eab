//! 0/1 knapsack solved by dynamic programming.
//!
//! The budget is cut into units of `step` cents. Costs are rounded up to
//! whole units, so any selection the DP accepts really fits in the
//! budget. Coarse steps are fast but lose precision, so a whole range of
//! steps is explored in parallel and the best portfolio wins. Budget left
//! over by the rounding is spent greedily on the best remaining rates.

use super::{
    check_budget, is_close, prune_exact, Portfolio, SolveMeta, Solver, SolverError, BUDGET_EPSILON,
};
use crate::config::Settings;
use crate::dataset::Action;
use rayon::prelude::*;
use std::collections::HashSet;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

/// Steps finer than this are never tried
const FLOOR_STEP_CENTS: u32 = 5;

/// Selection found for a single step
#[derive(Debug, Clone, PartialEq)]
pub struct StepResult {
    pub step_cents: u32,
    /// Indices into the pruned action list, DP picks first then greedy picks
    pub indices: Vec<usize>,
    pub total_cost: f64,
    pub total_profit: f64,
}

#[derive(Debug, Clone)]
pub struct DynamicProgramming {
    min_step_cents: u32,
    max_step_cents: u32,
    dedupe_same_cost: bool,
    time_limit: Option<Duration>,
    step_time_guard: Option<Duration>,
    workers: Option<usize>,
}

impl DynamicProgramming {
    pub fn new(settings: &Settings) -> Self {
        Self {
            min_step_cents: settings.min_step_cents,
            max_step_cents: settings.max_step_cents,
            dedupe_same_cost: settings.dedupe_same_cost,
            time_limit: settings.time_limit(),
            step_time_guard: settings.step_time_guard(),
            workers: settings.workers,
        }
    }

    /// Steps worth trying: two steps that map every cost and the budget to
    /// the same number of units give the same answer, only the first is kept.
    pub fn candidate_steps(&self, actions: &[Action], budget: f64) -> Vec<u32> {
        let costs_cents: Vec<u64> = actions.iter().map(Action::cost_cents).collect();
        let budget_cents = to_cents(budget);
        let first = self.min_step_cents.max(FLOOR_STEP_CENTS);

        let mut seen: HashSet<(u64, Vec<u64>)> = HashSet::new();
        let mut steps = Vec::new();
        for step in first..=self.max_step_cents {
            let s = u64::from(step);
            let mapping: Vec<u64> = costs_cents.iter().map(|c| c.div_ceil(s)).collect();
            if seen.insert((budget_cents / s, mapping)) {
                steps.push(step);
            }
        }
        steps
    }

    /// Run the DP for one step. Returns `None` when the per-step time guard
    /// was exceeded.
    pub fn solve_step(
        actions: &[Action],
        budget: f64,
        step_cents: u32,
        guard: Option<Duration>,
    ) -> Option<StepResult> {
        let step = u64::from(step_cents.max(1));
        let n = actions.len();
        let units: Vec<usize> = actions
            .iter()
            .map(|a| a.cost_cents().div_ceil(step) as usize)
            .collect();
        let profits: Vec<f64> = actions.iter().map(Action::profit).collect();
        let capacity = (to_cents(budget) / step) as usize;
        let width = capacity + 1;

        let started = Instant::now();

        // best[w]: best profit using exactly w units, -1 when unreachable
        let mut best = vec![-1.0_f64; width];
        best[0] = 0.0;
        let mut keep = KeepTable::new(n, width);

        for (idx, &cu) in units.iter().enumerate() {
            if cu > capacity {
                continue;
            }
            let profit = profits[idx];
            let row = idx * width;
            for w in (cu..=capacity).rev() {
                let prev = best[w - cu];
                if prev >= 0.0 {
                    let candidate = prev + profit;
                    if candidate > best[w] {
                        best[w] = candidate;
                        keep.set(row + w);
                    }
                }
            }
        }

        if let Some(guard) = guard {
            let elapsed = started.elapsed();
            if elapsed >= guard {
                debug!(step = step_cents, ?elapsed, "Step exceeded its time guard");
                return None;
            }
        }

        let w_star = (0..width)
            .max_by(|a, b| best[*a].total_cmp(&best[*b]).then(a.cmp(b)))
            .unwrap_or(0);
        if best[w_star] < 0.0 {
            return None;
        }

        let mut chosen = vec![false; n];
        let mut w = w_star;
        for idx in (0..n).rev() {
            if keep.get(idx * width + w) {
                chosen[idx] = true;
                w -= units[idx];
            }
        }

        let mut indices: Vec<usize> = (0..n).filter(|&i| chosen[i]).collect();
        let mut total_cost: f64 = indices.iter().map(|&i| actions[i].cost).sum();
        let mut total_profit: f64 = indices.iter().map(|&i| profits[i]).sum();

        // Spend what the rounding left over
        let mut remaining = budget - total_cost;
        if remaining > BUDGET_EPSILON {
            let mut rest: Vec<usize> = (0..n)
                .filter(|&i| !chosen[i] && actions[i].cost > 0.0 && actions[i].rate > 0.0)
                .collect();
            rest.sort_by(|&a, &b| {
                actions[b]
                    .rate
                    .total_cmp(&actions[a].rate)
                    .then(actions[a].cost.total_cmp(&actions[b].cost))
            });
            for i in rest {
                if actions[i].cost <= remaining + BUDGET_EPSILON {
                    indices.push(i);
                    total_cost += actions[i].cost;
                    total_profit += profits[i];
                    remaining = budget - total_cost;
                    if remaining <= BUDGET_EPSILON {
                        break;
                    }
                }
            }
        }

        trace!(step = step_cents, total_cost, total_profit, "Step solved");
        Some(StepResult {
            step_cents,
            indices,
            total_cost,
            total_profit,
        })
    }
}

impl Solver for DynamicProgramming {
    fn name(&self) -> &'static str {
        "dp"
    }

    fn solve(&self, actions: &[Action], budget: f64) -> Result<Portfolio, SolverError> {
        check_budget(budget)?;
        let pruned = prune_exact(actions, budget, self.dedupe_same_cost);
        if pruned.is_empty() {
            return Ok(Portfolio::empty(SolveMeta::dp(self.min_step_cents)));
        }

        let steps = self.candidate_steps(&pruned, budget);
        if steps.is_empty() {
            return Ok(Portfolio::empty(SolveMeta::dp(self.min_step_cents)));
        }

        let threads = self
            .workers
            .unwrap_or_else(rayon::current_num_threads)
            .min(steps.len())
            .max(1);
        let pool = rayon::ThreadPoolBuilder::new().num_threads(threads).build()?;
        debug!(
            actions = pruned.len(),
            steps = steps.len(),
            threads,
            "Exploring DP granularities"
        );

        let started = Instant::now();
        let time_limit = self.time_limit;
        let out_of_time = || time_limit.map_or(false, |limit| started.elapsed() >= limit);
        let guard = self.step_time_guard;

        let results: Vec<Option<StepResult>> = pool.install(|| {
            steps
                .par_iter()
                .map(|&step| {
                    if out_of_time() {
                        return None;
                    }
                    let result = Self::solve_step(&pruned, budget, step, guard);
                    if out_of_time() {
                        return None;
                    }
                    result
                })
                .collect()
        });

        let steps_total = steps.len();
        let steps_explored = results.iter().filter(|r| r.is_some()).count();
        if steps_explored < steps_total {
            warn!(
                discarded = steps_total - steps_explored,
                steps_total, "Some DP steps were discarded by time limits"
            );
        }

        // Increasing step order, so an exact tie keeps the finest step
        let mut best: Option<StepResult> = None;
        for candidate in results.into_iter().flatten() {
            let replace = match &best {
                None => true,
                Some(current) => is_better(&candidate, current),
            };
            if replace {
                best = Some(candidate);
            }
        }

        let Some(best) = best else {
            warn!("No DP step finished in time");
            let mut meta = SolveMeta::dp(self.min_step_cents);
            meta.steps_total = steps_total;
            return Ok(Portfolio::empty(meta));
        };

        debug!(step = best.step_cents, "Selected DP granularity");
        let chosen: Vec<Action> = best.indices.iter().map(|&i| pruned[i].clone()).collect();
        let mut meta = SolveMeta::dp(best.step_cents);
        meta.steps_explored = steps_explored;
        meta.steps_total = steps_total;

        let portfolio = Portfolio::from_actions(chosen, meta);
        info!(
            selected = portfolio.actions.len(),
            total_cost = portfolio.total_cost,
            total_profit = portfolio.total_profit,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "DP solve done"
        );
        Ok(portfolio)
    }
}

/// One decision bit per (item, weight) cell
struct KeepTable {
    bits: Vec<u64>,
}

impl KeepTable {
    fn new(items: usize, width: usize) -> Self {
        Self {
            bits: vec![0; (items * width).div_ceil(64)],
        }
    }

    fn set(&mut self, cell: usize) {
        self.bits[cell / 64] |= 1u64 << (cell % 64);
    }

    fn get(&self, cell: usize) -> bool {
        self.bits[cell / 64] & (1u64 << (cell % 64)) != 0
    }
}

fn is_better(candidate: &StepResult, current: &StepResult) -> bool {
    if is_close(candidate.total_profit, current.total_profit) {
        !is_close(candidate.total_cost, current.total_cost) && candidate.total_cost > current.total_cost
    } else {
        candidate.total_profit > current.total_profit
    }
}

fn to_cents(euros: f64) -> u64 {
    (euros * 100.0).round().max(0.0) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unbounded() -> DynamicProgramming {
        DynamicProgramming::new(&Settings::unbounded())
    }

    #[test]
    fn single_step_is_exact_on_whole_euros() {
        let actions = vec![
            Action::new("Action-1", 37.0, 0.07),
            Action::new("Action-2", 54.0, 0.11),
            Action::new("Action-3", 78.0, 0.14),
            Action::new("Action-4", 111.0, 0.21),
        ];
        let result = DynamicProgramming::solve_step(&actions, 167.0, 100, None).unwrap();
        assert_eq!(result.indices, vec![1, 3]);
        assert_eq!(result.total_cost, 165.0);
        assert!((result.total_profit - 29.25).abs() < 1e-9);
    }

    #[test]
    fn greedy_fills_budget_left_by_coarse_step() {
        // With 10€ units the 4€ share costs a whole unit and the 10€ budget
        // only fits one unit; greedy top-up then adds the cheaper share.
        let actions = vec![Action::new("big", 6.0, 0.5), Action::new("small", 4.0, 0.1)];
        let result = DynamicProgramming::solve_step(&actions, 10.0, 1000, None).unwrap();
        assert_eq!(result.indices, vec![0, 1]);
        assert_eq!(result.total_cost, 10.0);
    }

    #[test]
    fn candidate_steps_skip_identical_mappings() {
        let actions = vec![Action::new("a", 10.0, 0.1)];
        let settings = Settings {
            min_step_cents: 100,
            max_step_cents: 110,
            ..Settings::unbounded()
        };
        let dp = DynamicProgramming::new(&settings);
        // cost 1000c, budget 5000c: only steps changing either ceil(1000/s)
        // or floor(5000/s) survive
        let steps = dp.candidate_steps(&actions, 50.0);
        assert_eq!(steps.first(), Some(&100));
        for pair in steps.windows(2) {
            let (a, b) = (u64::from(pair[0]), u64::from(pair[1]));
            assert!(1000u64.div_ceil(a) != 1000u64.div_ceil(b) || 5000 / a != 5000 / b);
        }
    }

    #[test]
    fn empty_input_gives_empty_portfolio() {
        let portfolio = unbounded().solve(&[], 500.0).unwrap();
        assert!(portfolio.is_empty());
        assert_eq!(portfolio.meta.step_cents, Some(100));
    }

    #[test]
    fn never_exceeds_budget() {
        let actions: Vec<Action> = (1..=30)
            .map(|i| Action::new(format!("s{i}"), 3.37 * i as f64, 0.01 * (i % 7 + 1) as f64))
            .collect();
        let portfolio = unbounded().solve(&actions, 123.45).unwrap();
        assert!(portfolio.total_cost <= 123.45 + BUDGET_EPSILON);
        assert!(!portfolio.is_empty());
    }

    #[test]
    fn expired_time_limit_gives_empty_portfolio() {
        let settings = Settings {
            time_limit_ms: Some(0),
            ..Settings::unbounded()
        };
        let actions = vec![Action::new("a", 10.0, 0.2), Action::new("b", 20.0, 0.1)];
        let portfolio = DynamicProgramming::new(&settings).solve(&actions, 50.0).unwrap();
        assert!(portfolio.is_empty());
        assert_eq!(portfolio.meta.step_cents, Some(settings.min_step_cents));
        assert_eq!(portfolio.meta.steps_explored, 0);
        assert!(portfolio.meta.steps_total > 0);
    }

    #[test]
    fn step_over_its_time_guard_yields_nothing() {
        let actions = vec![Action::new("a", 10.0, 0.2)];
        let guarded = DynamicProgramming::solve_step(&actions, 50.0, 100, Some(Duration::ZERO));
        assert!(guarded.is_none());

        let settings = Settings {
            step_time_guard_ms: Some(0),
            ..Settings::unbounded()
        };
        let portfolio = DynamicProgramming::new(&settings).solve(&actions, 50.0).unwrap();
        assert!(portfolio.is_empty());
        assert_eq!(portfolio.meta.steps_explored, 0);
    }

    #[test]
    fn keep_table_spans_word_boundaries() {
        let mut keep = KeepTable::new(3, 50);
        for cell in [0, 63, 64, 149] {
            keep.set(cell);
        }
        assert!(keep.get(0) && keep.get(63) && keep.get(64) && keep.get(149));
        assert!(!keep.get(1) && !keep.get(65) && !keep.get(148));
    }

    #[test]
    fn rejects_negative_budget() {
        let err = unbounded().solve(&[Action::new("a", 1.0, 0.1)], -1.0).unwrap_err();
        assert!(matches!(err, SolverError::InvalidBudget(_)));
    }
}
