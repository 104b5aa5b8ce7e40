//! Runs the active rules against a loaded configuration.

use std::time::Instant;

use rayon::prelude::*;
use serde::Serialize;

use crate::issue::{Issue, RuleFailure};
use crate::rules::RuleHandle;
use crate::runner::Runner;

/// Issues and per-rule failures from one run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CheckOutcome {
    pub issues: Vec<Issue>,
    #[serde(rename = "errors")]
    pub failures: Vec<RuleFailure>,
}

impl CheckOutcome {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge another outcome into this one.
    pub fn merge(&mut self, other: CheckOutcome) {
        self.issues.extend(other.issues);
        self.failures.extend(other.failures);
    }

    pub fn is_clean(&self) -> bool {
        self.issues.is_empty() && self.failures.is_empty()
    }
}

/// Run every rule on the rayon pool.
///
/// Each rule collects its own issues. A rule that fails is recorded as a
/// [`RuleFailure`] and the others still run. Results are merged in the
/// order of `rules`.
pub fn run_rules(rules: &[RuleHandle], runner: &Runner) -> CheckOutcome {
    let started = Instant::now();

    let per_rule: Vec<CheckOutcome> = rules
        .par_iter()
        .map(|rule| {
            let rule_started = Instant::now();
            let mut outcome = CheckOutcome::new();
            match rule.check(runner) {
                Ok(issues) => {
                    tracing::debug!(
                        rule = rule.name(),
                        issues = issues.len(),
                        elapsed_ms = rule_started.elapsed().as_millis() as u64,
                        "rule finished"
                    );
                    outcome.issues = issues;
                }
                Err(e) => {
                    tracing::warn!(rule = rule.name(), error = %format!("{:#}", e), "rule failed");
                    outcome.failures.push(RuleFailure {
                        rule: rule.name().to_string(),
                        message: format!("{:#}", e),
                    });
                }
            }
            outcome
        })
        .collect();

    let mut result = CheckOutcome::new();
    for outcome in per_rule {
        result.merge(outcome);
    }

    tracing::info!(
        rules = rules.len(),
        issues = result.issues.len(),
        failures = result.failures.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "check finished"
    );

    result
}
