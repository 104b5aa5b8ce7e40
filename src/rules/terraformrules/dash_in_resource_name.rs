use crate::issue::{Issue, Severity};
use crate::rules::{doc_link, Rule};
use crate::runner::Runner;

/// Resource names should use underscores.
pub struct DashInResourceNameRule {
    link: String,
}

impl DashInResourceNameRule {
    const NAME: &'static str = "terraform_dash_in_resource_name";

    pub fn new() -> Self {
        Self {
            link: doc_link(Self::NAME),
        }
    }
}

impl Default for DashInResourceNameRule {
    fn default() -> Self {
        Self::new()
    }
}

impl Rule for DashInResourceNameRule {
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
            .resources
            .iter()
            .filter(|r| r.name.contains('-'))
            .map(|r| {
                root.issue(
                    self,
                    format!("`{}` resource name has a dash", r.name),
                    &r.decl_range,
                )
            })
            .collect())
    }
}
