//! Python Bindings
//!
//! Exposes the solvers to Python so the existing notebooks and scripts can
//! call the Rust implementation directly. Results are returned as plain
//! dicts and lists. Solving releases the GIL.

use crate::backtest::Backtest;
use crate::config::Settings;
use crate::dataset::{Action, Dataset, DatasetError};
use crate::solver::{BruteForce, DynamicProgramming, Portfolio, Solver, SolverError};
use pyo3::exceptions::{PyIOError, PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::{PyDict, PyList};

fn dataset_err(err: DatasetError) -> PyErr {
    match err {
        DatasetError::Io(e) => PyErr::new::<PyIOError, _>(format!("Failed to read dataset: {}", e)),
        other => PyErr::new::<PyValueError, _>(other.to_string()),
    }
}

fn solver_err(err: SolverError) -> PyErr {
    match err {
        SolverError::ThreadPool(e) => PyErr::new::<PyRuntimeError, _>(e.to_string()),
        other => PyErr::new::<PyValueError, _>(other.to_string()),
    }
}

fn action_to_py(py: Python, action: &Action) -> PyResult<Py<PyAny>> {
    let dict = PyDict::new(py);
    dict.set_item("name", &action.name)?;
    dict.set_item("cost", action.cost)?;
    dict.set_item("rate", action.rate)?;
    dict.set_item("profit", action.profit())?;
    Ok(dict.into_py(py))
}

fn actions_to_py(py: Python, actions: &[Action]) -> PyResult<Py<PyAny>> {
    let list = PyList::empty(py);
    for action in actions {
        list.append(action_to_py(py, action)?)?;
    }
    Ok(list.into_py(py))
}

// Helper to convert a Portfolio to a Python dict
fn portfolio_to_py(py: Python, portfolio: &Portfolio) -> PyResult<Py<PyAny>> {
    let dict = PyDict::new(py);
    dict.set_item("actions", actions_to_py(py, &portfolio.actions)?)?;
    dict.set_item("total_cost", portfolio.total_cost)?;
    dict.set_item("total_profit", portfolio.total_profit)?;
    dict.set_item("algorithm", portfolio.meta.algorithm.to_string())?;
    if let Some(step) = portfolio.meta.step_cents {
        dict.set_item("step_cents", step)?;
    }
    Ok(dict.into_py(py))
}

fn load_prepared(path: &str, settings: &Settings) -> PyResult<Vec<Action>> {
    let dataset = Dataset::load(path).map_err(dataset_err)?;
    Ok(dataset.prepared_actions(settings))
}

/// Configured solver front-end
#[pyclass]
pub struct Optimizer {
    settings: Settings,
}

#[pymethods]
impl Optimizer {
    #[new]
    #[pyo3(signature = (budget=None, config=None))]
    fn new(budget: Option<f64>, config: Option<String>) -> PyResult<Self> {
        let mut settings = match config {
            Some(path) => Settings::load(path)
                .map_err(|e| PyErr::new::<PyValueError, _>(e.to_string()))?,
            None => Settings::default(),
        };
        if let Some(budget) = budget {
            settings.budget = budget;
        }
        settings
            .validate()
            .map_err(|e| PyErr::new::<PyValueError, _>(e.to_string()))?;
        Ok(Optimizer { settings })
    }

    #[getter]
    fn budget(&self) -> f64 {
        self.settings.budget
    }

    /// Optimised selection for a dataset file
    fn solve(&self, py: Python, path: String) -> PyResult<Py<PyAny>> {
        let settings = self.settings.clone();
        let portfolio = py.allow_threads(move || {
            let actions = load_prepared(&path, &settings)?;
            DynamicProgramming::new(&settings)
                .solve(&actions, settings.budget)
                .map_err(solver_err)
        })?;
        portfolio_to_py(py, &portfolio)
    }

    /// Ranked combinations from the exhaustive search
    #[pyo3(signature = (path, top=None))]
    fn brute_force(&self, py: Python, path: String, top: Option<usize>) -> PyResult<Py<PyAny>> {
        let settings = self.settings.clone();
        let report = py.allow_threads(move || {
            let actions = load_prepared(&path, &settings)?;
            let top = top.unwrap_or(settings.top);
            BruteForce::new(top, settings.max_brute_force_actions)
                .enumerate(&actions, settings.budget)
                .map_err(solver_err)
        })?;

        let dict = PyDict::new(py);
        dict.set_item("total_combinations", report.total_combinations)?;
        dict.set_item("valid_combinations", report.valid_combinations)?;
        let top = PyList::empty(py);
        for combination in &report.top {
            let entry = PyDict::new(py);
            entry.set_item("actions", actions_to_py(py, &combination.actions)?)?;
            entry.set_item("total_cost", combination.total_cost)?;
            entry.set_item("total_profit", combination.total_profit)?;
            top.append(entry)?;
        }
        dict.set_item("top", top)?;
        Ok(dict.into_py(py))
    }

    /// Backtest report as a JSON string
    fn backtest(&self, py: Python, path: String) -> PyResult<String> {
        let settings = self.settings.clone();
        py.allow_threads(move || {
            let actions = load_prepared(&path, &settings)?;
            let brute_force = BruteForce::from_settings(&settings);
            let dp = DynamicProgramming::new(&settings);
            let solvers: [&dyn Solver; 2] = [&brute_force, &dp];
            let report = Backtest::new(settings.budget)
                .run(&path, &actions, &solvers)
                .map_err(solver_err)?;
            serde_json::to_string(&report).map_err(|e| {
                PyErr::new::<PyRuntimeError, _>(format!("Failed to serialize report: {}", e))
            })
        })
    }
}

/// Load and pre-filter the actions of a dataset file
#[pyfunction]
pub fn load_actions(py: Python, path: String) -> PyResult<Py<PyAny>> {
    let actions = load_prepared(&path, &Settings::default())?;
    actions_to_py(py, &actions)
}

/// Optimised selection with default settings
#[pyfunction]
#[pyo3(signature = (path, budget=None))]
pub fn solve(py: Python, path: String, budget: Option<f64>) -> PyResult<Py<PyAny>> {
    Optimizer::new(budget, None)?.solve(py, path)
}

/// Exhaustive search with default settings
#[pyfunction]
#[pyo3(signature = (path, budget=None, top=10))]
pub fn brute_force(py: Python, path: String, budget: Option<f64>, top: usize) -> PyResult<Py<PyAny>> {
    Optimizer::new(budget, None)?.brute_force(py, path, Some(top))
}
