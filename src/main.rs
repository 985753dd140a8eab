use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use invest_optimizer::backtest::Backtest;
use invest_optimizer::config::Settings;
use invest_optimizer::dataset::{Action, Dataset};
use invest_optimizer::solver::{BruteForce, DynamicProgramming, Solver};
use invest_optimizer::tracking::TrackingLog;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "invest_optimizer", version, about = "Pick the most profitable shares within a budget")]
struct Cli {
    /// TOML settings file
    #[arg(long, global = true, env = "INVEST_CONFIG")]
    config: Option<PathBuf>,

    /// Budget in euros
    #[arg(long, global = true, env = "INVEST_BUDGET")]
    budget: Option<f64>,

    /// Keep actions below the minimum rate
    #[arg(long, global = true)]
    no_pre_filter: bool,

    /// Verbose logging on stderr
    #[arg(long, global = true, env = "INVEST_DEBUG")]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Optimised selection (dynamic programming)
    Solve {
        csv: PathBuf,

        /// Worker threads for the step exploration
        #[arg(long, env = "INVEST_WORKERS")]
        workers: Option<usize>,

        /// Explore every step regardless of time
        #[arg(long)]
        no_time_limit: bool,
    },
    /// Exhaustive search with a ranked top-N
    BruteForce {
        csv: PathBuf,

        #[arg(long)]
        top: Option<usize>,
    },
    /// Run both solvers on each dataset and compare them
    Backtest {
        #[arg(required = true)]
        csv: Vec<PathBuf>,

        /// Print the reports as JSON
        #[arg(long)]
        json: bool,
    },
    /// Summarise and check a tracking checklist
    Progress {
        file: PathBuf,

        /// Fail when the checklist has issues
        #[arg(long)]
        strict: bool,
    },
}

fn init_tracing(debug: bool) {
    let default_level = if debug { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_settings(cli: &Cli) -> anyhow::Result<Settings> {
    let mut settings = match &cli.config {
        Some(path) => Settings::load(path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?,
        None => Settings::default(),
    };
    if let Some(budget) = cli.budget {
        settings.budget = budget;
    }
    if cli.no_pre_filter {
        settings.pre_filter = false;
    }
    match &cli.command {
        Command::Solve {
            workers,
            no_time_limit,
            ..
        } => {
            if workers.is_some() {
                settings.workers = *workers;
            }
            if *no_time_limit {
                settings.time_limit_ms = None;
                settings.step_time_guard_ms = None;
            }
        }
        Command::BruteForce { top: Some(top), .. } => settings.top = *top,
        _ => {}
    }
    settings.validate()?;
    debug!(?settings, "Effective settings");
    Ok(settings)
}

fn load_actions(path: &Path, settings: &Settings) -> anyhow::Result<Vec<Action>> {
    let dataset = Dataset::load(path)
        .with_context(|| format!("Failed to load dataset {}", path.display()))?;
    debug!(
        delimiter = ?dataset.delimiter,
        profit_format = %dataset.profit_format,
        rows = dataset.rows_read,
        rejected = dataset.rows_rejected,
        "Dataset loaded"
    );
    Ok(dataset.prepared_actions(settings))
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.debug);
    let settings = load_settings(&cli)?;
    let started = Instant::now();

    match &cli.command {
        Command::Solve { csv, .. } => {
            let actions = load_actions(csv, &settings)?;
            let portfolio = DynamicProgramming::new(&settings).solve(&actions, settings.budget)?;
            if let Some(step) = portfolio.meta.step_cents {
                debug!(step, "DP granularity");
            }
            println!("{}", portfolio);
            println!("\nTotal time: {:.4} s", started.elapsed().as_secs_f64());
        }
        Command::BruteForce { csv, .. } => {
            let actions = load_actions(csv, &settings)?;
            let report = BruteForce::from_settings(&settings).enumerate(&actions, settings.budget)?;
            println!("Total combinations: {}", report.total_combinations);
            println!(
                "Valid combinations (<= {:.2}€): {}\n",
                settings.budget, report.valid_combinations
            );
            println!("Top {} combinations by profit:", report.top.len());
            for (rank, combination) in report.top.iter().enumerate() {
                println!(
                    "{}. [{}] | Cost: {:.2}€ | Profit: {:.2}€",
                    rank + 1,
                    combination.names().join(", "),
                    combination.total_cost,
                    combination.total_profit
                );
            }
        }
        Command::Backtest { csv, json } => {
            let brute_force = BruteForce::from_settings(&settings);
            let dp = DynamicProgramming::new(&settings);
            let solvers: [&dyn Solver; 2] = [&brute_force, &dp];
            let backtest = Backtest::new(settings.budget);
            let mut reports = Vec::with_capacity(csv.len());
            for path in csv {
                let actions = load_actions(path, &settings)?;
                let report = backtest.run(&path.display().to_string(), &actions, &solvers)?;
                reports.push(report);
            }
            if *json {
                println!("{}", serde_json::to_string_pretty(&reports)?);
            } else {
                for report in &reports {
                    println!("{}\n", report);
                }
            }
        }
        Command::Progress { file, strict } => {
            let log = TrackingLog::load(file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            for summary in log.summaries() {
                println!("{}", summary);
            }
            let issues = log.validate();
            for issue in &issues {
                println!("issue: {}", issue);
            }
            if *strict && !issues.is_empty() {
                bail!("{} issue(s) found in {}", issues.len(), file.display());
            }
        }
    }

    Ok(())
}
