//! Core types for reported issues.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Severity levels for issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Notice,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
            Severity::Notice => write!(f, "notice"),
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "error" => Ok(Severity::Error),
            "warning" => Ok(Severity::Warning),
            "notice" => Ok(Severity::Notice),
            _ => Err(format!("unknown severity: {}", s)),
        }
    }
}

/// A line/column position in a source file. Both are 1-based.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Pos {
    pub line: usize,
    pub column: usize,
}

/// A span of source text.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Range {
    pub filename: String,
    pub start: Pos,
    pub end: Pos,
}

impl Range {
    pub fn new(filename: impl Into<String>, start: Pos, end: Pos) -> Self {
        Self {
            filename: filename.into(),
            start,
            end,
        }
    }

    /// A range covering the start of a file, used when no better location is known.
    pub fn file_start<P: AsRef<Path>>(path: P) -> Self {
        let pos = Pos { line: 1, column: 1 };
        Self::new(path.as_ref().to_string_lossy(), pos, pos)
    }
}

impl std::fmt::Display for Range {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.filename, self.start.line)
    }
}

/// Identity of the rule that emitted an issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleRef {
    pub name: String,
    pub severity: Severity,
    #[serde(default)]
    pub link: String,
}

/// A single reported issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub rule: RuleRef,
    pub message: String,
    pub range: Range,
    /// Module call sites leading to `range`, outermost first. Empty for the root module.
    #[serde(default)]
    pub callers: Vec<Range>,
}

impl Issue {
    /// Create a unique key for this issue (for deduplication/comparison).
    pub fn key(&self) -> String {
        format!("{}|{}|{}", self.rule.name, self.range, self.message)
    }
}

/// A rule whose `check` could not complete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleFailure {
    pub rule: String,
    pub message: String,
}

impl std::fmt::Display for RuleFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "rule `{}` failed: {}", self.rule, self.message)
    }
}
