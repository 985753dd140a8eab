//! Tracking Module
//!
//! Reads the project's progress checklist. The file is plain Markdown:
//! a level-1 heading opens a revision, deeper headings open sections, and
//! tasks are list items carrying a status marker:
//!
//! ```text
//! # Suivi du projet
//! ## 1. Force brute
//! - [x] Lire le fichier CSV
//! - [~] Filtrer selon le budget
//! - [ ] Afficher le résultat
//! Dernière mise à jour : 2025-07-02
//! ```

use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y", "%d.%m.%Y"];
const LAST_UPDATED_KEYS: [&str; 2] = ["last updated", "mise à jour"];

/// Tracking errors
#[derive(Error, Debug)]
pub enum TrackingError {
    #[error("Failed to read tracking file: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Unstarted,
    InProgress,
    Done,
}

impl Status {
    /// Map a checkbox marker (the text between the brackets)
    pub fn from_marker(marker: &str) -> Option<Self> {
        match marker {
            " " | "" => Some(Status::Unstarted),
            "x" | "X" => Some(Status::Done),
            "~" | "W" | "w" => Some(Status::InProgress),
            _ => None,
        }
    }
}

/// The two spellings of an in-progress marker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProgressMarker {
    Tilde,
    Wip,
}

impl ProgressMarker {
    fn of(task: &Task) -> Option<Self> {
        match task.marker.as_str() {
            "~" => Some(ProgressMarker::Tilde),
            "W" | "w" => Some(ProgressMarker::Wip),
            _ => None,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Unstarted => write!(f, "unstarted"),
            Status::InProgress => write!(f, "in progress"),
            Status::Done => write!(f, "done"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Task {
    pub section: String,
    pub text: String,
    pub status: Status,
    pub marker: String,
    /// 1-based line number in the file
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Section {
    pub title: String,
    pub line: usize,
    pub tasks: Vec<Task>,
}

/// Checkbox whose marker is not a known status
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnknownMarker {
    pub marker: String,
    pub text: String,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LastUpdated {
    pub raw: String,
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Revision {
    pub title: String,
    pub sections: Vec<Section>,
    pub last_updated: Option<LastUpdated>,
    pub unknown_markers: Vec<UnknownMarker>,
}

impl Revision {
    fn new(title: String) -> Self {
        Self {
            title,
            sections: Vec::new(),
            last_updated: None,
            unknown_markers: Vec::new(),
        }
    }

    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.sections.iter().flat_map(|s| s.tasks.iter())
    }

    pub fn summary(&self) -> Summary {
        let mut summary = Summary {
            revision: self.title.clone(),
            last_updated: self.last_updated.as_ref().and_then(|l| l.date),
            ..Summary::default()
        };
        for task in self.tasks() {
            match task.status {
                Status::Unstarted => summary.unstarted += 1,
                Status::InProgress => summary.in_progress += 1,
                Status::Done => summary.done += 1,
            }
        }
        summary
    }
}

/// Task counts of one revision
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Summary {
    pub revision: String,
    pub last_updated: Option<NaiveDate>,
    pub unstarted: usize,
    pub in_progress: usize,
    pub done: usize,
}

impl Summary {
    pub fn total(&self) -> usize {
        self.unstarted + self.in_progress + self.done
    }

    pub fn completion(&self) -> f64 {
        match self.total() {
            0 => 0.0,
            total => self.done as f64 / total as f64,
        }
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {}/{} done, {} in progress, {} unstarted ({:.0}%)",
            if self.revision.is_empty() { "(untitled)" } else { self.revision.as_str() },
            self.done,
            self.total(),
            self.in_progress,
            self.unstarted,
            self.completion() * 100.0
        )?;
        if let Some(date) = self.last_updated {
            write!(f, ", updated {}", date)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Issue {
    UnknownMarker { revision: usize, line: usize, marker: String },
    EmptySection { revision: usize, section: String },
    MixedProgressMarkers { revision: usize },
    MissingLastUpdated { revision: usize },
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Issue::UnknownMarker {
                revision,
                line,
                marker,
            } => write!(f, "revision {}: unknown marker [{}] on line {}", revision + 1, marker, line),
            Issue::EmptySection { revision, section } => {
                write!(f, "revision {}: section '{}' has no task", revision + 1, section)
            }
            Issue::MixedProgressMarkers { revision } => write!(
                f,
                "revision {}: both [~] and [W] are used for tasks in progress",
                revision + 1
            ),
            Issue::MissingLastUpdated { revision } => {
                write!(f, "revision {}: no last-updated line", revision + 1)
            }
        }
    }
}

/// All revisions of a tracking file, oldest first
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TrackingLog {
    pub revisions: Vec<Revision>,
}

impl TrackingLog {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, TrackingError> {
        let content = fs::read_to_string(path)?;
        Ok(Self::parse(&content))
    }

    pub fn parse(content: &str) -> Self {
        let mut revisions: Vec<Revision> = Vec::new();

        for (idx, raw) in content.lines().enumerate() {
            let line_no = idx + 1;
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }

            if let Some((level, title)) = parse_heading(line) {
                if level == 1 {
                    revisions.push(Revision::new(title.to_string()));
                } else {
                    current_revision(&mut revisions).sections.push(Section {
                        title: title.to_string(),
                        line: line_no,
                        tasks: Vec::new(),
                    });
                }
                continue;
            }

            if let Some((marker, text)) = parse_checkbox(line) {
                let revision = current_revision(&mut revisions);
                match Status::from_marker(marker) {
                    Some(status) => {
                        if revision.sections.is_empty() {
                            revision.sections.push(Section {
                                title: String::new(),
                                line: line_no,
                                tasks: Vec::new(),
                            });
                        }
                        if let Some(section) = revision.sections.last_mut() {
                            section.tasks.push(Task {
                                section: section.title.clone(),
                                text: text.to_string(),
                                status,
                                marker: marker.to_string(),
                                line: line_no,
                            });
                        }
                    }
                    None => {
                        debug!(line = line_no, marker, "Unknown checkbox marker");
                        revision.unknown_markers.push(UnknownMarker {
                            marker: marker.to_string(),
                            text: text.to_string(),
                            line: line_no,
                        });
                    }
                }
                continue;
            }

            if let Some(last_updated) = parse_last_updated(line) {
                current_revision(&mut revisions).last_updated = Some(last_updated);
            }
        }

        TrackingLog { revisions }
    }

    pub fn latest(&self) -> Option<&Revision> {
        self.revisions.last()
    }

    pub fn summaries(&self) -> Vec<Summary> {
        self.revisions.iter().map(Revision::summary).collect()
    }

    /// Structural problems of the checklist
    pub fn validate(&self) -> Vec<Issue> {
        let mut issues = Vec::new();
        for (idx, revision) in self.revisions.iter().enumerate() {
            for unknown in &revision.unknown_markers {
                issues.push(Issue::UnknownMarker {
                    revision: idx,
                    line: unknown.line,
                    marker: unknown.marker.clone(),
                });
            }
            for section in revision.sections.iter().filter(|s| s.tasks.is_empty()) {
                issues.push(Issue::EmptySection {
                    revision: idx,
                    section: section.title.clone(),
                });
            }
            let tilde = revision
                .tasks()
                .any(|t| ProgressMarker::of(t) == Some(ProgressMarker::Tilde));
            let wip = revision
                .tasks()
                .any(|t| ProgressMarker::of(t) == Some(ProgressMarker::Wip));
            if tilde && wip {
                issues.push(Issue::MixedProgressMarkers { revision: idx });
            }
            if revision.last_updated.is_none() {
                issues.push(Issue::MissingLastUpdated { revision: idx });
            }
        }
        issues
    }
}

fn current_revision(revisions: &mut Vec<Revision>) -> &mut Revision {
    if revisions.is_empty() {
        revisions.push(Revision::new(String::new()));
    }
    let last = revisions.len() - 1;
    &mut revisions[last]
}

fn parse_heading(line: &str) -> Option<(usize, &str)> {
    let level = line.chars().take_while(|c| *c == '#').count();
    if level == 0 {
        return None;
    }
    let rest = &line[level..];
    if !rest.is_empty() && !rest.starts_with(' ') {
        return None;
    }
    Some((level, rest.trim()))
}

fn parse_checkbox(line: &str) -> Option<(&str, &str)> {
    let rest = line
        .strip_prefix("- [")
        .or_else(|| line.strip_prefix("* ["))?;
    let close = rest.find(']')?;
    let after = &rest[close + 1..];
    // `- [label](url)` is a link, not a checkbox
    if after.starts_with('(') {
        return None;
    }
    Some((&rest[..close], after.trim()))
}

fn parse_last_updated(line: &str) -> Option<LastUpdated> {
    let lower = line.to_lowercase();
    if !LAST_UPDATED_KEYS.iter().any(|key| lower.contains(key)) {
        return None;
    }
    let (_, value) = line.split_once(':')?;
    let raw = value.trim_matches(|c: char| c.is_whitespace() || c == '*' || c == '_');
    let date = parse_date(raw).or_else(|| raw.split_whitespace().find_map(parse_date));
    Some(LastUpdated {
        raw: raw.to_string(),
        date,
    })
}

fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim_matches(|c: char| !c.is_ascii_alphanumeric());
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
}
