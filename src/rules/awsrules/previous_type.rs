//! Previous-generation instance types.

use crate::issue::{Issue, Severity};
use crate::rules::{doc_link, Rule};
use crate::runner::Runner;

const PREVIOUS_INSTANCE_FAMILIES: &[&str] = &[
    "t1", "m1", "m2", "m3", "c1", "c3", "cc2", "cg1", "cr1", "g2", "hi1", "hs1", "i2", "r3",
];

const PREVIOUS_DB_FAMILIES: &[&str] = &["db.t1", "db.m1", "db.m2", "db.m3", "db.r3"];

const PREVIOUS_CACHE_FAMILIES: &[&str] = &[
    "cache.t1", "cache.m1", "cache.m2", "cache.m3", "cache.c1", "cache.r3",
];

/// Flags instance types from a previous generation.
pub struct PreviousTypeRule {
    name: &'static str,
    resource_type: &'static str,
    attribute: &'static str,
    noun: &'static str,
    families: &'static [&'static str],
    link: String,
}

impl PreviousTypeRule {
    fn new(
        name: &'static str,
        resource_type: &'static str,
        attribute: &'static str,
        noun: &'static str,
        families: &'static [&'static str],
    ) -> Self {
        Self {
            name,
            resource_type,
            attribute,
            noun,
            families,
            link: doc_link(name),
        }
    }

    pub fn aws_instance() -> Self {
        Self::new(
            "aws_instance_previous_type",
            "aws_instance",
            "instance_type",
            "instance type",
            PREVIOUS_INSTANCE_FAMILIES,
        )
    }

    pub fn aws_db_instance() -> Self {
        Self::new(
            "aws_db_instance_previous_type",
            "aws_db_instance",
            "instance_class",
            "instance class",
            PREVIOUS_DB_FAMILIES,
        )
    }

    pub fn aws_elasticache_cluster() -> Self {
        Self::new(
            "aws_elasticache_cluster_previous_type",
            "aws_elasticache_cluster",
            "node_type",
            "node type",
            PREVIOUS_CACHE_FAMILIES,
        )
    }

    /// `t1.micro` → `t1`, `db.m1.small` → `db.m1`.
    fn family(value: &str) -> &str {
        value.rsplit_once('.').map(|(f, _)| f).unwrap_or(value)
    }
}

impl Rule for PreviousTypeRule {
    fn name(&self) -> &str {
        self.name
    }

    fn enabled(&self) -> bool {
        true
    }

    fn severity(&self) -> Severity {
        Severity::Warning
    }

    fn link(&self) -> Option<&str> {
        Some(self.link.as_str())
    }

    fn check(&self, runner: &Runner) -> anyhow::Result<Vec<Issue>> {
        let mut issues = Vec::new();
        for resource in runner.resources(self.resource_type) {
            let Some((attr, value)) = resource.string_attribute(self.attribute) else {
                continue;
            };
            let family = Self::family(&value);
            if self.families.iter().any(|f| *f == family) {
                issues.push(resource.issue(
                    self,
                    format!("\"{}\" is previous generation {}.", value, self.noun),
                    &attr.range,
                ));
            }
        }
        Ok(issues)
    }
}
