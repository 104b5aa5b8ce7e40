//! Values checked against fixed lists of known instance types and regions.

use crate::issue::{Issue, Severity};
use crate::rules::{doc_link, Rule};
use crate::runner::Runner;

const DB_INSTANCE_CLASSES: &[&str] = &[
    "db.t1.micro",
    "db.m1.small",
    "db.m1.medium",
    "db.m1.large",
    "db.m1.xlarge",
    "db.m2.xlarge",
    "db.m2.2xlarge",
    "db.m2.4xlarge",
    "db.m3.medium",
    "db.m3.large",
    "db.m3.xlarge",
    "db.m3.2xlarge",
    "db.m4.large",
    "db.m4.xlarge",
    "db.m4.2xlarge",
    "db.m4.4xlarge",
    "db.m4.10xlarge",
    "db.m4.16xlarge",
    "db.m5.large",
    "db.m5.xlarge",
    "db.m5.2xlarge",
    "db.m5.4xlarge",
    "db.m5.12xlarge",
    "db.m5.24xlarge",
    "db.r3.large",
    "db.r3.xlarge",
    "db.r3.2xlarge",
    "db.r3.4xlarge",
    "db.r3.8xlarge",
    "db.r4.large",
    "db.r4.xlarge",
    "db.r4.2xlarge",
    "db.r4.4xlarge",
    "db.r4.8xlarge",
    "db.r4.16xlarge",
    "db.r5.large",
    "db.r5.xlarge",
    "db.r5.2xlarge",
    "db.r5.4xlarge",
    "db.r5.12xlarge",
    "db.r5.24xlarge",
    "db.t2.micro",
    "db.t2.small",
    "db.t2.medium",
    "db.t2.large",
    "db.t2.xlarge",
    "db.t2.2xlarge",
    "db.t3.micro",
    "db.t3.small",
    "db.t3.medium",
    "db.t3.large",
    "db.t3.xlarge",
    "db.t3.2xlarge",
    "db.x1.16xlarge",
    "db.x1.32xlarge",
    "db.x1e.xlarge",
    "db.x1e.2xlarge",
    "db.x1e.4xlarge",
    "db.x1e.8xlarge",
    "db.x1e.16xlarge",
    "db.x1e.32xlarge",
];

const CACHE_NODE_TYPES: &[&str] = &[
    "cache.t1.micro",
    "cache.m1.small",
    "cache.m1.medium",
    "cache.m1.large",
    "cache.m1.xlarge",
    "cache.m2.xlarge",
    "cache.m2.2xlarge",
    "cache.m2.4xlarge",
    "cache.m3.medium",
    "cache.m3.large",
    "cache.m3.xlarge",
    "cache.m3.2xlarge",
    "cache.c1.xlarge",
    "cache.r3.large",
    "cache.r3.xlarge",
    "cache.r3.2xlarge",
    "cache.r3.4xlarge",
    "cache.r3.8xlarge",
    "cache.t2.micro",
    "cache.t2.small",
    "cache.t2.medium",
    "cache.t3.micro",
    "cache.t3.small",
    "cache.t3.medium",
    "cache.m4.large",
    "cache.m4.xlarge",
    "cache.m4.2xlarge",
    "cache.m4.4xlarge",
    "cache.m4.10xlarge",
    "cache.m5.large",
    "cache.m5.xlarge",
    "cache.m5.2xlarge",
    "cache.m5.4xlarge",
    "cache.m5.12xlarge",
    "cache.m5.24xlarge",
    "cache.r4.large",
    "cache.r4.xlarge",
    "cache.r4.2xlarge",
    "cache.r4.4xlarge",
    "cache.r4.8xlarge",
    "cache.r4.16xlarge",
    "cache.r5.large",
    "cache.r5.xlarge",
    "cache.r5.2xlarge",
    "cache.r5.4xlarge",
    "cache.r5.12xlarge",
    "cache.r5.24xlarge",
];

const S3_REGIONS: &[&str] = &[
    "us-east-1",
    "us-east-2",
    "us-west-1",
    "us-west-2",
    "ca-central-1",
    "eu-central-1",
    "eu-west-1",
    "eu-west-2",
    "eu-west-3",
    "eu-north-1",
    "eu-south-1",
    "ap-east-1",
    "ap-south-1",
    "ap-northeast-1",
    "ap-northeast-2",
    "ap-northeast-3",
    "ap-southeast-1",
    "ap-southeast-2",
    "sa-east-1",
    "me-south-1",
    "af-south-1",
    "cn-north-1",
    "cn-northwest-1",
    "us-gov-east-1",
    "us-gov-west-1",
];

/// Flags literal values that are not in a known list.
pub struct InvalidTypeRule {
    name: &'static str,
    resource_type: &'static str,
    attribute: &'static str,
    noun: &'static str,
    known: &'static [&'static str],
    link: String,
}

impl InvalidTypeRule {
    fn new(
        name: &'static str,
        resource_type: &'static str,
        attribute: &'static str,
        noun: &'static str,
        known: &'static [&'static str],
    ) -> Self {
        Self {
            name,
            resource_type,
            attribute,
            noun,
            known,
            link: doc_link(name),
        }
    }

    pub fn aws_db_instance() -> Self {
        Self::new(
            "aws_db_instance_invalid_type",
            "aws_db_instance",
            "instance_class",
            "DB instance class",
            DB_INSTANCE_CLASSES,
        )
    }

    pub fn aws_elasticache_cluster() -> Self {
        Self::new(
            "aws_elasticache_cluster_invalid_type",
            "aws_elasticache_cluster",
            "node_type",
            "node type",
            CACHE_NODE_TYPES,
        )
    }

    pub fn aws_s3_bucket_region() -> Self {
        Self::new(
            "aws_s3_bucket_invalid_region",
            "aws_s3_bucket",
            "region",
            "region",
            S3_REGIONS,
        )
    }
}

impl Rule for InvalidTypeRule {
    fn name(&self) -> &str {
        self.name
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
            if !self.known.contains(&value.as_str()) {
                issues.push(resource.issue(
                    self,
                    format!("\"{}\" is invalid {}.", value, self.noun),
                    &attr.range,
                ));
            }
        }
        Ok(issues)
    }
}
