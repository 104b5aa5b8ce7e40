//! Output formatting for check results.
//!
//! Supports two output formats:
//! - Default: colored terminal output for human readability
//! - JSON: structured output for programmatic consumption

use std::io::Write;

use colored::*;
use serde::{Deserialize, Serialize};

use crate::check::CheckOutcome;
use crate::issue::{Issue, RuleFailure, Severity};

// =============================================================================
// JSON Format
// =============================================================================

/// JSON report: every issue plus every rule that failed to run.
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonReport {
    pub issues: Vec<Issue>,
    pub errors: Vec<RuleFailure>,
}

impl From<&CheckOutcome> for JsonReport {
    fn from(outcome: &CheckOutcome) -> Self {
        Self {
            issues: outcome.issues.clone(),
            errors: outcome.failures.clone(),
        }
    }
}

/// Write results in JSON format.
pub fn write_json<W: Write>(out: &mut W, outcome: &CheckOutcome) -> anyhow::Result<()> {
    let report = JsonReport::from(outcome);
    serde_json::to_writer_pretty(&mut *out, &report)?;
    writeln!(out)?;
    Ok(())
}

// =============================================================================
// Default Format
// =============================================================================

/// Write results in the default (human-readable) format.
pub fn write_pretty<W: Write>(out: &mut W, outcome: &CheckOutcome) -> anyhow::Result<()> {
    if outcome.is_clean() {
        writeln!(out, "{}", "No issues found".green())?;
        return Ok(());
    }

    if !outcome.issues.is_empty() {
        writeln!(out, "{} issue(s) found:", outcome.issues.len())?;
        writeln!(out)?;
        for issue in &outcome.issues {
            write_issue(out, issue)?;
        }
    }

    if !outcome.failures.is_empty() {
        writeln!(out, "{} ({}):", "Rule errors".bold(), outcome.failures.len())?;
        for failure in &outcome.failures {
            writeln!(out, "    {} {}", "ERROR".red(), failure)?;
        }
        writeln!(out)?;
    }

    Ok(())
}

fn write_issue<W: Write>(out: &mut W, issue: &Issue) -> anyhow::Result<()> {
    writeln!(
        out,
        "{} {} ({})",
        severity_tag(issue.rule.severity),
        issue.message,
        issue.rule.name.dimmed()
    )?;
    writeln!(out, "    on {}", issue.range.to_string().blue())?;
    for caller in &issue.callers {
        writeln!(out, "    {} {}", "callers".dimmed(), caller)?;
    }
    if !issue.rule.link.is_empty() {
        writeln!(out, "    {}", issue.rule.link.dimmed())?;
    }
    writeln!(out)?;
    Ok(())
}

fn severity_tag(severity: Severity) -> ColoredString {
    match severity {
        Severity::Error => "Error:".red().bold(),
        Severity::Warning => "Warning:".yellow().bold(),
        Severity::Notice => "Notice:".blue().bold(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::issue::{Range, RuleRef};

    fn outcome() -> CheckOutcome {
        CheckOutcome {
            issues: vec![Issue {
                rule: RuleRef {
                    name: "aws_instance_previous_type".to_string(),
                    severity: Severity::Warning,
                    link: "https://example.test/rule.md".to_string(),
                },
                message: "\"t1.micro\" is previous generation instance type.".to_string(),
                range: Range::file_start("main.tf.json"),
                callers: vec![Range::file_start("root.tf.json")],
            }],
            failures: vec![RuleFailure {
                rule: "aws_instance_invalid_ami".to_string(),
                message: "timed out".to_string(),
            }],
        }
    }

    #[test]
    fn test_json_shape() {
        let mut out = Vec::new();
        write_json(&mut out, &outcome()).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();

        let issue = &value["issues"][0];
        assert_eq!(issue["rule"]["name"], "aws_instance_previous_type");
        assert_eq!(issue["rule"]["severity"], "warning");
        assert_eq!(issue["range"]["filename"], "main.tf.json");
        assert_eq!(issue["range"]["start"]["line"], 1);
        assert_eq!(issue["callers"][0]["filename"], "root.tf.json");
        assert_eq!(value["errors"][0]["rule"], "aws_instance_invalid_ami");
        assert_eq!(value["errors"][0]["message"], "timed out");
    }

    #[test]
    fn test_json_empty_lists() {
        let mut out = Vec::new();
        write_json(&mut out, &CheckOutcome::new()).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value, serde_json::json!({ "issues": [], "errors": [] }));
    }

    #[test]
    fn test_pretty_output() {
        colored::control::set_override(false);
        let mut out = Vec::new();
        write_pretty(&mut out, &outcome()).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("1 issue(s) found:"));
        assert!(text.contains("Warning: \"t1.micro\" is previous generation instance type. (aws_instance_previous_type)"));
        assert!(text.contains("on main.tf.json:1"));
        assert!(text.contains("rule `aws_instance_invalid_ami` failed: timed out"));
    }
}
