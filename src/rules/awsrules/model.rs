//! Enum-value rules derived from the provider schema.
//!
//! Each table entry becomes a `<resource>_invalid_<attribute>` rule that
//! reports literal values outside the allowed set.

use std::sync::Arc;

use crate::issue::{Issue, Severity};
use crate::rules::{doc_link, Rule, RuleHandle};
use crate::runner::Runner;

struct EnumSchema {
    resource_type: &'static str,
    attribute: &'static str,
    values: &'static [&'static str],
}

const ENUM_SCHEMAS: &[EnumSchema] = &[
    EnumSchema {
        resource_type: "aws_s3_bucket",
        attribute: "acl",
        values: &[
            "private",
            "public-read",
            "public-read-write",
            "aws-exec-read",
            "authenticated-read",
            "bucket-owner-read",
            "bucket-owner-full-control",
            "log-delivery-write",
        ],
    },
    EnumSchema {
        resource_type: "aws_spot_fleet_request",
        attribute: "excess_capacity_termination_policy",
        values: &["Default", "NoTermination"],
    },
    EnumSchema {
        resource_type: "aws_instance",
        attribute: "tenancy",
        values: &["default", "dedicated", "host"],
    },
    EnumSchema {
        resource_type: "aws_db_instance",
        attribute: "storage_type",
        values: &["standard", "gp2", "gp3", "io1"],
    },
    EnumSchema {
        resource_type: "aws_lb",
        attribute: "load_balancer_type",
        values: &["application", "network", "gateway"],
    },
    EnumSchema {
        resource_type: "aws_elasticache_cluster",
        attribute: "engine",
        values: &["memcached", "redis"],
    },
];

/// Rejects values that are not in the schema's enum.
pub struct EnumValueRule {
    name: String,
    resource_type: &'static str,
    attribute: &'static str,
    values: &'static [&'static str],
    link: String,
}

impl EnumValueRule {
    fn from_schema(schema: &EnumSchema) -> Self {
        let name = format!("{}_invalid_{}", schema.resource_type, schema.attribute);
        Self {
            link: doc_link(&name),
            name,
            resource_type: schema.resource_type,
            attribute: schema.attribute,
            values: schema.values,
        }
    }
}

impl Rule for EnumValueRule {
    fn name(&self) -> &str {
        &self.name
    }

    fn enabled(&self) -> bool {
        true
    }

    fn severity(&self) -> Severity {
        Severity::Error
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
            if !self.values.contains(&value.as_str()) {
                issues.push(resource.issue(
                    self,
                    format!("\"{}\" is an invalid value as {}", value, self.attribute),
                    &attr.range,
                ));
            }
        }
        Ok(issues)
    }
}

/// One rule per schema enum, in table order.
pub fn model_rules() -> Vec<RuleHandle> {
    ENUM_SCHEMAS
        .iter()
        .map(|schema| Arc::new(EnumValueRule::from_schema(schema)) as RuleHandle)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::awsrules::testing::runner;

    #[test]
    fn test_model_rule_names() {
        let names: Vec<String> = model_rules().iter().map(|r| r.name().to_string()).collect();
        assert_eq!(names[0], "aws_s3_bucket_invalid_acl");
        assert!(names.contains(&"aws_spot_fleet_request_invalid_excess_capacity_termination_policy".to_string()));
        assert_eq!(names.len(), ENUM_SCHEMAS.len());
    }

    #[test]
    fn test_invalid_enum_value() {
        let runner = runner(
            r#"{ "resource": { "aws_spot_fleet_request": {
                "bad": { "excess_capacity_termination_policy": "Random" },
                "good": { "excess_capacity_termination_policy": "Default" },
                "unknown": { "excess_capacity_termination_policy": "${var.policy}" } } } }"#,
        );
        let rule = EnumValueRule::from_schema(&ENUM_SCHEMAS[1]);
        let issues = rule.check(&runner).unwrap();
        assert_eq!(issues.len(), 1);
        assert_eq!(
            issues[0].message,
            "\"Random\" is an invalid value as excess_capacity_termination_policy"
        );
        assert_eq!(issues[0].rule.severity, Severity::Error);
    }
}
