use invest_optimizer::config::Settings;
use invest_optimizer::dataset::{Action, Dataset};
use invest_optimizer::solver::{BruteForce, DynamicProgramming, Solver, BUDGET_EPSILON};
use pretty_assertions::assert_eq;
use std::collections::BTreeSet;

const ACTIONS_CSV: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/data/actions.csv");
const LEARNING_CSV: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/data/learning.csv");

const BEST_SELECTION: [&str; 10] = [
    "Action-4", "Action-5", "Action-6", "Action-8", "Action-10", "Action-11", "Action-13",
    "Action-18", "Action-19", "Action-20",
];

fn reference_actions(settings: &Settings) -> Vec<Action> {
    Dataset::load(ACTIONS_CSV).unwrap().prepared_actions(settings)
}

fn names(actions: &[Action]) -> BTreeSet<&str> {
    actions.iter().map(|a| a.name.as_str()).collect()
}

#[test]
fn test_pre_filter_on_reference_dataset() {
    let settings = Settings::unbounded();
    let dataset = Dataset::load(ACTIONS_CSV).unwrap();
    assert_eq!(dataset.actions.len(), 20);

    let actions = dataset.prepared_actions(&settings);
    assert_eq!(actions.len(), 18);
    assert!(!actions.iter().any(|a| a.name == "Action-14" || a.name == "Action-15"));
}

#[test]
fn test_brute_force_reference_dataset() {
    let settings = Settings::unbounded();
    let actions = reference_actions(&settings);

    let report = BruteForce::from_settings(&settings).enumerate(&actions, 500.0).unwrap();
    assert_eq!(report.total_combinations, 262_143);
    assert_eq!(report.valid_combinations, 213_809);
    assert_eq!(report.top.len(), 10);

    let best = &report.top[0];
    assert_eq!(names(&best.actions), BEST_SELECTION.into_iter().collect());
    assert_eq!(best.total_cost, 498.0);
    assert!((best.total_profit - 99.08).abs() < 1e-6);

    assert!((report.top[1].total_profit - 98.80).abs() < 1e-6);
    assert!(report.top.windows(2).all(|w| w[0].total_profit >= w[1].total_profit));
}

#[test]
fn test_dp_matches_brute_force_on_reference_dataset() {
    let settings = Settings::unbounded();
    let actions = reference_actions(&settings);

    let portfolio = DynamicProgramming::new(&settings).solve(&actions, 500.0).unwrap();
    assert_eq!(names(&portfolio.actions), BEST_SELECTION.into_iter().collect());
    assert_eq!(portfolio.total_cost, 498.0);
    assert!((portfolio.total_profit - 99.08).abs() < 1e-6);
    assert_eq!(portfolio.meta.step_cents, Some(100));
    assert_eq!(portfolio.meta.steps_explored, portfolio.meta.steps_total);

    let exhaustive = BruteForce::from_settings(&settings).solve(&actions, 500.0).unwrap();
    assert!((portfolio.total_profit - exhaustive.total_profit).abs() < 1e-6);
}

#[test]
fn test_dp_is_deterministic_across_worker_counts() {
    let single = Settings {
        workers: Some(1),
        ..Settings::unbounded()
    };
    let many = Settings {
        workers: Some(4),
        ..Settings::unbounded()
    };
    let actions = reference_actions(&single);

    let a = DynamicProgramming::new(&single).solve(&actions, 500.0).unwrap();
    let b = DynamicProgramming::new(&many).solve(&actions, 500.0).unwrap();
    assert_eq!(a, b);
}

#[test]
fn test_learning_dataset_in_decimal_format() {
    let settings = Settings::unbounded();
    let dataset = Dataset::load(LEARNING_CSV).unwrap();
    assert_eq!(dataset.delimiter, ',');

    let actions = dataset.prepared_actions(&settings);
    let report = BruteForce::new(3, 25).enumerate(&actions, 167.0).unwrap();
    let profits: Vec<String> = report
        .top
        .iter()
        .map(|c| format!("{:.2}", c.total_profit))
        .collect();
    assert_eq!(profits, vec!["29.25", "25.90", "23.31"]);

    let portfolio = DynamicProgramming::new(&settings).solve(&actions, 167.0).unwrap();
    assert_eq!(portfolio.names(), vec!["Action-2", "Action-4"]);
}

#[test]
fn test_dp_stays_within_budget_on_fractional_prices() {
    let settings = Settings::unbounded();
    let actions: Vec<Action> = (0..40)
        .map(|i| {
            let cost = 5.0 + (i as f64 * 7.31) % 60.0;
            let rate = 0.05 + ((i * 13) % 20) as f64 / 100.0;
            Action::new(format!("Share-{i}"), (cost * 100.0).round() / 100.0, rate)
        })
        .collect();

    for budget in [50.0, 137.5, 500.0] {
        let portfolio = DynamicProgramming::new(&settings).solve(&actions, budget).unwrap();
        assert!(portfolio.total_cost <= budget + BUDGET_EPSILON);
        let computed: f64 = portfolio.actions.iter().map(Action::profit).sum();
        assert!((computed - portfolio.total_profit).abs() < 1e-9);
    }
}

#[test]
fn test_dp_close_to_brute_force_on_small_fractional_set() {
    let settings = Settings {
        min_step_cents: 1,
        max_step_cents: 50,
        ..Settings::unbounded()
    };
    let actions = vec![
        Action::new("a", 12.34, 0.12),
        Action::new("b", 7.77, 0.31),
        Action::new("c", 19.99, 0.08),
        Action::new("d", 3.05, 0.22),
        Action::new("e", 15.5, 0.19),
        Action::new("f", 9.1, 0.27),
    ];

    let exact = BruteForce::from_settings(&settings).solve(&actions, 40.0).unwrap();
    let dp = DynamicProgramming::new(&settings).solve(&actions, 40.0).unwrap();
    // The finest step (5 cents) rounds each price up by under 5 cents
    assert!(dp.total_profit <= exact.total_profit + 1e-9);
    assert!(dp.total_cost <= 40.0 + BUDGET_EPSILON);
}
