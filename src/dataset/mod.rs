//! Dataset Module
//!
//! Loads share lists from CSV files. Files come from different sources,
//! so the delimiter is sniffed and the profit column is detected as either
//! a percentage (`15` => 15%) or a decimal ratio (`0.15` => 15%).
//! Decimal commas are accepted everywhere.

use crate::config::Settings;
use crate::solver::pre_filter;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

const SNIFF_SAMPLE_BYTES: usize = 1024;
const DELIMITER_CANDIDATES: [u8; 4] = [b';', b',', b'\t', b' '];
const DEFAULT_DELIMITER: u8 = b';';
const UTF8_BOM: char = '\u{feff}';

/// Dataset loading errors
#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("Failed to read dataset: {0}")]
    Io(#[from] std::io::Error),
    #[error("Dataset is not valid UTF-8: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),
    #[error("Malformed CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("Dataset is empty")]
    Empty,
}

/// A share that can be bought once
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub name: String,
    /// Price in euros
    pub cost: f64,
    /// Two-year profit as a ratio of the price
    pub rate: f64,
}

impl Action {
    pub fn new(name: impl Into<String>, cost: f64, rate: f64) -> Self {
        Self {
            name: name.into(),
            cost,
            rate,
        }
    }

    /// Profit in euros after two years
    pub fn profit(&self) -> f64 {
        self.cost * self.rate
    }

    pub fn cost_cents(&self) -> u64 {
        (self.cost * 100.0).round() as u64
    }
}

/// How the profit column is expressed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfitFormat {
    Percent,
    Decimal,
}

impl fmt::Display for ProfitFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProfitFormat::Percent => write!(f, "percent"),
            ProfitFormat::Decimal => write!(f, "decimal"),
        }
    }
}

/// Parsed dataset with what was detected while reading it
#[derive(Debug, Clone, Serialize)]
pub struct Dataset {
    pub actions: Vec<Action>,
    pub delimiter: char,
    pub profit_format: ProfitFormat,
    /// Data rows, header excluded
    pub rows_read: usize,
    pub rows_rejected: usize,
}

impl Dataset {
    /// Load a dataset file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, DatasetError> {
        let bytes = fs::read(path.as_ref())?;
        debug!(path = %path.as_ref().display(), bytes = bytes.len(), "Reading dataset");
        let content = String::from_utf8(bytes)?;
        Self::parse(&content)
    }

    /// Parse dataset content (header row included)
    pub fn parse(content: &str) -> Result<Self, DatasetError> {
        let content = content.strip_prefix(UTF8_BOM).unwrap_or(content);
        if content.trim().is_empty() {
            return Err(DatasetError::Empty);
        }

        let delimiter = sniff_delimiter(content);
        let rows = read_rows(content, delimiter)?;
        let profit_format = detect_profit_format(&rows);

        debug!("Detected delimiter: {:?}", delimiter as char);
        debug!("Detected profit format: {}", profit_format);
        debug!("Rows read: {}", rows.len());

        let (actions, rejected) = parse_actions(&rows, profit_format);
        let rows_read = rows.len().saturating_sub(1);

        Ok(Dataset {
            actions,
            delimiter: delimiter as char,
            profit_format,
            rows_read,
            rows_rejected: rejected,
        })
    }

    /// Actions left after the configured pre-filter
    pub fn prepared_actions(&self, settings: &Settings) -> Vec<Action> {
        let actions = pre_filter(self.actions.clone(), settings);
        debug!(
            kept = actions.len(),
            dropped = self.actions.len() - actions.len(),
            "Pre-filtered actions"
        );
        actions
    }
}

/// Guess the delimiter from the beginning of the file.
///
/// A candidate wins when it appears the same, non-zero, number of times
/// on every complete line of the sample. Candidates are tried in order
/// `;`, `,`, tab, space. Falls back to `;`.
pub fn sniff_delimiter(content: &str) -> u8 {
    let mut end = content.len().min(SNIFF_SAMPLE_BYTES);
    while !content.is_char_boundary(end) {
        end -= 1;
    }
    let sample = &content[..end];

    let mut lines: Vec<&str> = sample.split('\n').collect();
    // The last line of a truncated sample is partial
    if end < content.len() && lines.len() > 1 {
        lines.pop();
    }
    let lines: Vec<&str> = lines
        .into_iter()
        .map(|l| l.trim_end_matches('\r'))
        .filter(|l| !l.trim().is_empty())
        .collect();

    if lines.is_empty() {
        return DEFAULT_DELIMITER;
    }

    for candidate in DELIMITER_CANDIDATES {
        let first = lines[0].bytes().filter(|b| *b == candidate).count();
        if first == 0 {
            continue;
        }
        let consistent = lines
            .iter()
            .all(|l| l.bytes().filter(|b| *b == candidate).count() == first);
        if consistent {
            return candidate;
        }
    }

    DEFAULT_DELIMITER
}

fn read_rows(content: &str, delimiter: u8) -> Result<Vec<Vec<String>>, DatasetError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(str::to_string).collect());
    }
    Ok(rows)
}

/// Trim a cell and normalise a decimal comma
pub fn clean_cell(cell: &str) -> String {
    cell.trim().replace(',', ".")
}

fn parse_number(cell: &str) -> Option<f64> {
    let cleaned = clean_cell(cell);
    let cleaned = cleaned.strip_suffix('%').unwrap_or(&cleaned).trim_end();
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Decide whether the third column holds percentages or ratios.
///
/// The header row is skipped. If at least half of the parseable values
/// are above 1.0 the column is read as percentages. An empty column
/// defaults to percentages.
pub fn detect_profit_format(rows: &[Vec<String>]) -> ProfitFormat {
    let values: Vec<f64> = rows
        .iter()
        .skip(1)
        .filter(|row| row.len() >= 3)
        .filter_map(|row| parse_number(&row[2]))
        .collect();

    if values.is_empty() {
        return ProfitFormat::Percent;
    }

    let percent_count = values.iter().filter(|v| **v > 1.0).count();
    if (percent_count as f64) >= (values.len() as f64) / 2.0 {
        ProfitFormat::Percent
    } else {
        ProfitFormat::Decimal
    }
}

/// Convert raw cells into an action, or `None` when the row is unusable
pub fn convert_row(name: &str, cost: &str, profit: &str, format: ProfitFormat) -> Option<Action> {
    let cost = parse_number(cost)?;
    if cost <= 0.0 {
        return None;
    }

    let profit = parse_number(profit)?;
    let rate = match format {
        ProfitFormat::Percent => profit / 100.0,
        ProfitFormat::Decimal => profit,
    };
    if rate <= 0.0 {
        return None;
    }

    Some(Action::new(name.trim(), cost, rate))
}

/// Turn CSV rows into valid actions. Returns the actions and the number
/// of data rows that were rejected.
pub fn parse_actions(rows: &[Vec<String>], format: ProfitFormat) -> (Vec<Action>, usize) {
    let mut actions = Vec::with_capacity(rows.len());
    let mut rejected = 0;

    for (line, row) in rows.iter().enumerate().skip(1) {
        if row.len() < 3 {
            debug!(line = line + 1, "Skipping short row");
            rejected += 1;
            continue;
        }
        match convert_row(&row[0], &row[1], &row[2], format) {
            Some(action) => actions.push(action),
            None => {
                debug!(line = line + 1, row = ?row, "Rejected row");
                rejected += 1;
            }
        }
    }

    (actions, rejected)
}
