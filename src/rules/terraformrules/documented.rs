//! Outputs and variables should carry a description.

use crate::issue::{Issue, Severity};
use crate::rules::{doc_link, Rule};
use crate::runner::Runner;

fn is_blank(description: &Option<String>) -> bool {
    description.as_deref().map_or(true, |d| d.trim().is_empty())
}

pub struct DocumentedOutputsRule {
    link: String,
}

impl DocumentedOutputsRule {
    const NAME: &'static str = "terraform_documented_outputs";

    pub fn new() -> Self {
        Self {
            link: doc_link(Self::NAME),
        }
    }
}

impl Default for DocumentedOutputsRule {
    fn default() -> Self {
        Self::new()
    }
}

impl Rule for DocumentedOutputsRule {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn enabled(&self) -> bool {
        false
    }

    fn severity(&self) -> Severity {
        Severity::Notice
    }

    fn link(&self) -> Option<&str> {
        Some(self.link.as_str())
    }

    fn check(&self, runner: &Runner) -> anyhow::Result<Vec<Issue>> {
        let root = runner.root();
        Ok(root
            .module
            .outputs
            .values()
            .filter(|o| is_blank(&o.description))
            .map(|o| {
                root.issue(
                    self,
                    format!("`{}` output has no description", o.name),
                    &o.decl_range,
                )
            })
            .collect())
    }
}

pub struct DocumentedVariablesRule {
    link: String,
}

impl DocumentedVariablesRule {
    const NAME: &'static str = "terraform_documented_variables";

    pub fn new() -> Self {
        Self {
            link: doc_link(Self::NAME),
        }
    }
}

impl Default for DocumentedVariablesRule {
    fn default() -> Self {
        Self::new()
    }
}

impl Rule for DocumentedVariablesRule {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn enabled(&self) -> bool {
        false
    }

    fn severity(&self) -> Severity {
        Severity::Notice
    }

    fn link(&self) -> Option<&str> {
        Some(self.link.as_str())
    }

    fn check(&self, runner: &Runner) -> anyhow::Result<Vec<Issue>> {
        let root = runner.root();
        Ok(root
            .module
            .variables
            .values()
            .filter(|v| is_blank(&v.description))
            .map(|v| {
                root.issue(
                    self,
                    format!("`{}` variable has no description", v.name),
                    &v.decl_range,
                )
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::awsrules::testing::runner;

    #[test]
    fn test_undocumented_outputs() {
        let runner = runner(
            r#"{ "output": {
                "endpoint": { "value": "x" },
                "blank": { "value": "x", "description": "" },
                "id": { "value": "x", "description": "Instance id" } } }"#,
        );
        let issues = DocumentedOutputsRule::new().check(&runner).unwrap();
        let messages: Vec<&str> = issues.iter().map(|i| i.message.as_str()).collect();
        assert_eq!(
            messages,
            vec![
                "`blank` output has no description",
                "`endpoint` output has no description",
            ]
        );
    }

    #[test]
    fn test_undocumented_variables() {
        let runner = runner(
            r#"{ "variable": {
                "no_description": { "default": "x" },
                "described": { "description": "Region to deploy in" } } }"#,
        );
        let issues = DocumentedVariablesRule::new().check(&runner).unwrap();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].message, "`no_description` variable has no description");
        assert_eq!(issues[0].rule.severity, Severity::Notice);
    }
}
