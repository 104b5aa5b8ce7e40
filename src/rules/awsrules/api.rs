//! Deep-check rules that confirm referenced objects exist.

use std::sync::Arc;

use crate::issue::{Issue, Severity};
use crate::provider::LookupKind;
use crate::rules::{doc_link, Rule, RuleHandle};
use crate::runner::Runner;

use super::check_lookup;

struct ApiSchema {
    resource_type: &'static str,
    attribute: &'static str,
    kind: LookupKind,
}

const API_SCHEMAS: &[ApiSchema] = &[
    ApiSchema {
        resource_type: "aws_instance",
        attribute: "key_name",
        kind: LookupKind::KeyPair,
    },
    ApiSchema {
        resource_type: "aws_instance",
        attribute: "iam_instance_profile",
        kind: LookupKind::InstanceProfile,
    },
    ApiSchema {
        resource_type: "aws_db_instance",
        attribute: "db_subnet_group_name",
        kind: LookupKind::DbSubnetGroup,
    },
    ApiSchema {
        resource_type: "aws_elasticache_cluster",
        attribute: "subnet_group_name",
        kind: LookupKind::CacheSubnetGroup,
    },
    ApiSchema {
        resource_type: "aws_launch_configuration",
        attribute: "key_name",
        kind: LookupKind::KeyPair,
    },
];

pub struct ApiRule {
    name: String,
    resource_type: &'static str,
    attribute: &'static str,
    kind: LookupKind,
    link: String,
}

impl ApiRule {
    fn from_schema(schema: &ApiSchema) -> Self {
        let name = format!("{}_invalid_{}", schema.resource_type, schema.attribute);
        Self {
            link: doc_link(&name),
            name,
            resource_type: schema.resource_type,
            attribute: schema.attribute,
            kind: schema.kind,
        }
    }
}

impl Rule for ApiRule {
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
        check_lookup(
            self,
            runner,
            self.resource_type,
            self.attribute,
            self.kind,
            |id| format!("\"{}\" is invalid {}.", id, self.kind.label()),
        )
    }
}

pub fn api_rules() -> Vec<RuleHandle> {
    API_SCHEMAS
        .iter()
        .map(|schema| Arc::new(ApiRule::from_schema(schema)) as RuleHandle)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::awsrules::testing::{runner, FakeProvider};

    #[test]
    fn test_api_rule_names() {
        let names: Vec<String> = api_rules().iter().map(|r| r.name().to_string()).collect();
        assert_eq!(
            names,
            vec![
                "aws_instance_invalid_key_name",
                "aws_instance_invalid_iam_instance_profile",
                "aws_db_instance_invalid_db_subnet_group_name",
                "aws_elasticache_cluster_invalid_subnet_group_name",
                "aws_launch_configuration_invalid_key_name",
            ]
        );
    }

    #[test]
    fn test_invalid_key_name() {
        let provider = Arc::new(FakeProvider::with(&["prod"]));
        let runner = runner(
            r#"{ "resource": { "aws_instance": {
                "a": { "key_name": "prod" },
                "b": { "key_name": "missing" } } } }"#,
        )
        .with_provider(provider.clone());

        let issues = ApiRule::from_schema(&API_SCHEMAS[0]).check(&runner).unwrap();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].message, "\"missing\" is invalid key name.");

        let calls = provider.calls.lock().unwrap();
        assert_eq!(calls.get("key-pairs:prod"), Some(&1));
        assert_eq!(calls.get("key-pairs:missing"), Some(&1));
    }
}
