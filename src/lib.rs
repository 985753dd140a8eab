//! Investment Optimizer Core
//!
//! Chooses which shares to buy with a fixed budget so that the two-year
//! profit is maximal. An exhaustive brute force and an optimised dynamic
//! programming solver are provided, along with a backtest harness that
//! compares them on the same dataset. Python bindings are available with
//! the `python` feature.

pub mod backtest;
pub mod config;
pub mod dataset;
pub mod solver;
pub mod tracking;

#[cfg(feature = "python")]
pub mod bindings;

pub use crate::backtest::{Backtest, BacktestReport};
pub use crate::config::Settings;
pub use crate::dataset::{Action, Dataset};
pub use crate::solver::{BruteForce, DynamicProgramming, Portfolio, Solver};

#[cfg(feature = "python")]
use pyo3::prelude::*;

/// Python module definition
#[cfg(feature = "python")]
#[pymodule]
fn invest_optimizer(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add_class::<bindings::Optimizer>()?;
    m.add_function(wrap_pyfunction!(bindings::load_actions, m)?)?;
    m.add_function(wrap_pyfunction!(bindings::solve, m)?)?;
    m.add_function(wrap_pyfunction!(bindings::brute_force, m)?)?;
    Ok(())
}
