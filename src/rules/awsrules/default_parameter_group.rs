//! Default parameter groups, which cannot be edited.

use crate::issue::{Issue, Severity};
use crate::rules::{doc_link, Rule};
use crate::runner::Runner;

const ATTRIBUTE: &str = "parameter_group_name";

pub struct DefaultParameterGroupRule {
    name: &'static str,
    resource_type: &'static str,
    link: String,
}

impl DefaultParameterGroupRule {
    fn new(name: &'static str, resource_type: &'static str) -> Self {
        Self {
            name,
            resource_type,
            link: doc_link(name),
        }
    }

    pub fn aws_db_instance() -> Self {
        Self::new("aws_db_instance_default_parameter_group", "aws_db_instance")
    }

    pub fn aws_elasticache_cluster() -> Self {
        Self::new(
            "aws_elasticache_cluster_default_parameter_group",
            "aws_elasticache_cluster",
        )
    }
}

impl Rule for DefaultParameterGroupRule {
    fn name(&self) -> &str {
        self.name
    }

    fn enabled(&self) -> bool {
        true
    }

    fn severity(&self) -> Severity {
        Severity::Notice
    }

    fn link(&self) -> Option<&str> {
        Some(self.link.as_str())
    }

    fn check(&self, runner: &Runner) -> anyhow::Result<Vec<Issue>> {
        let mut issues = Vec::new();
        for resource in runner.resources(self.resource_type) {
            let Some((attr, group)) = resource.string_attribute(ATTRIBUTE) else {
                continue;
            };
            if group.starts_with("default") {
                issues.push(resource.issue(
                    self,
                    format!("\"{}\" is default parameter group. You cannot edit it.", group),
                    &attr.range,
                ));
            }
        }
        Ok(issues)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::awsrules::testing::runner;

    #[test]
    fn test_default_parameter_group() {
        let runner = runner(
            r#"{ "resource": {
                "aws_db_instance": {
                    "a": { "parameter_group_name": "default.mysql5.6" },
                    "b": { "parameter_group_name": "application5.6" }
                },
                "aws_elasticache_cluster": {
                    "c": { "parameter_group_name": "default.redis3.2" }
                } } }"#,
        );

        let db = DefaultParameterGroupRule::aws_db_instance().check(&runner).unwrap();
        assert_eq!(db.len(), 1);
        assert_eq!(
            db[0].message,
            "\"default.mysql5.6\" is default parameter group. You cannot edit it."
        );

        let cache = DefaultParameterGroupRule::aws_elasticache_cluster()
            .check(&runner)
            .unwrap();
        assert_eq!(cache.len(), 1);
        assert_eq!(cache[0].rule.severity, Severity::Notice);
    }
}
