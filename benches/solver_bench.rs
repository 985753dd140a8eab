use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use invest_optimizer::config::Settings;
use invest_optimizer::dataset::{Action, Dataset};
use invest_optimizer::solver::{BruteForce, DynamicProgramming, Solver};

fn synthetic_actions(n: usize) -> Vec<Action> {
    (0..n)
        .map(|i| {
            let cost = 4.0 + ((i * 37) % 110) as f64;
            let rate = 0.05 + ((i * 11) % 23) as f64 / 100.0;
            Action::new(format!("Share-{}", i + 1), cost, rate)
        })
        .collect()
}

fn benchmark_solvers_by_size(c: &mut Criterion) {
    let settings = Settings::unbounded();
    let brute_force = BruteForce::from_settings(&settings);
    let dp = DynamicProgramming::new(&settings);

    let mut group = c.benchmark_group("solvers");
    group.sample_size(10);

    for n in [8usize, 12, 16, 20] {
        let actions = synthetic_actions(n);
        group.bench_with_input(BenchmarkId::new("brute_force", n), &actions, |b, actions| {
            b.iter(|| brute_force.solve(black_box(actions), black_box(500.0)))
        });
        group.bench_with_input(BenchmarkId::new("dp", n), &actions, |b, actions| {
            b.iter(|| dp.solve(black_box(actions), black_box(500.0)))
        });
    }

    group.finish();
}

fn benchmark_dp_large(c: &mut Criterion) {
    let settings = Settings::unbounded();
    let dp = DynamicProgramming::new(&settings);

    let mut group = c.benchmark_group("dp_large");
    group.sample_size(10);

    for n in [100usize, 500, 1000] {
        let actions = synthetic_actions(n);
        group.bench_with_input(BenchmarkId::new("actions", n), &actions, |b, actions| {
            b.iter(|| dp.solve(black_box(actions), black_box(500.0)))
        });
    }

    group.finish();
}

fn benchmark_single_step(c: &mut Criterion) {
    let actions = synthetic_actions(1000);
    c.bench_function("dp_single_step_100c", |b| {
        b.iter(|| DynamicProgramming::solve_step(black_box(&actions), black_box(500.0), 100, None))
    });
}

fn benchmark_dataset_parsing(c: &mut Criterion) {
    let mut content = String::from("name;price;profit\n");
    for action in synthetic_actions(1000) {
        content.push_str(&format!(
            "{};{};{}\n",
            action.name,
            action.cost.to_string().replace('.', ","),
            action.rate * 100.0
        ));
    }
    c.bench_function("parse_dataset_1000_rows", |b| {
        b.iter(|| Dataset::parse(black_box(&content)))
    });
}

criterion_group!(
    benches,
    benchmark_solvers_by_size,
    benchmark_dp_large,
    benchmark_single_step,
    benchmark_dataset_parsing
);
criterion_main!(benches);
