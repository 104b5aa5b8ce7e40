//! Example plugin exporting one rule over the plugin protocol.
//!
//! Install it as `tfcheck-ruleset-example` in the plugin directory and
//! enable it with `plugins: { example: { enabled: true } }`.

use tfcheck::issue::{Issue, Severity};
use tfcheck::plugin::{self, RulesetPlugin};
use tfcheck::rules::Rule;
use tfcheck::runner::Runner;
use tracing_subscriber::EnvFilter;

/// Reports the instance type of every `aws_instance`.
struct InstanceTypeRule;

impl Rule for InstanceTypeRule {
    fn name(&self) -> &str {
        "aws_instance_example_type"
    }

    fn enabled(&self) -> bool {
        true
    }

    fn severity(&self) -> Severity {
        Severity::Notice
    }

    fn link(&self) -> Option<&str> {
        Some("https://github.com/zen-systems/tfcheck/blob/main/docs/plugins.md")
    }

    fn check(&self, runner: &Runner) -> anyhow::Result<Vec<Issue>> {
        let mut issues = Vec::new();
        for resource in runner.resources("aws_instance") {
            if let Some((attr, instance_type)) = resource.string_attribute("instance_type") {
                issues.push(resource.issue(
                    self,
                    format!("instance type is {}", instance_type),
                    &attr.range,
                ));
            }
        }
        Ok(issues)
    }
}

fn main() -> anyhow::Result<()> {
    // stdout carries the protocol; logs go to stderr.
    let filter = EnvFilter::try_from_env("TFCHECK_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let ruleset = RulesetPlugin::new("example", env!("CARGO_PKG_VERSION")).rule(InstanceTypeRule);
    plugin::serve(&ruleset)
}
