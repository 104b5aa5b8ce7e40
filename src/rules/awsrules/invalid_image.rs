//! Image ids that do not exist in the account, checked against the provider.

use crate::issue::{Issue, Severity};
use crate::provider::LookupKind;
use crate::rules::{doc_link, Rule};
use crate::runner::Runner;

use super::check_lookup;

pub struct InvalidImageRule {
    name: &'static str,
    resource_type: &'static str,
    attribute: &'static str,
    noun: &'static str,
    link: String,
}

impl InvalidImageRule {
    fn new(
        name: &'static str,
        resource_type: &'static str,
        attribute: &'static str,
        noun: &'static str,
    ) -> Self {
        Self {
            name,
            resource_type,
            attribute,
            noun,
            link: doc_link(name),
        }
    }

    pub fn aws_instance() -> Self {
        Self::new("aws_instance_invalid_ami", "aws_instance", "ami", "AMI ID")
    }

    pub fn aws_launch_configuration() -> Self {
        Self::new(
            "aws_launch_configuration_invalid_image_id",
            "aws_launch_configuration",
            "image_id",
            "image ID",
        )
    }
}

impl Rule for InvalidImageRule {
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
        check_lookup(
            self,
            runner,
            self.resource_type,
            self.attribute,
            LookupKind::Image,
            |id| format!("\"{}\" is invalid {}.", id, self.noun),
        )
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::rules::awsrules::testing::{runner, FakeProvider};

    const INSTANCES: &str = r#"{ "resource": { "aws_instance": {
        "web": { "ami": "ami-1234abcd" },
        "db": { "ami": "ami-9999" },
        "dup": { "ami": "ami-9999" } } } }"#;

    #[test]
    fn test_invalid_ami() {
        let provider = Arc::new(FakeProvider::with(&["ami-1234abcd"]));
        let runner = runner(INSTANCES).with_provider(provider.clone());

        let issues = InvalidImageRule::aws_instance().check(&runner).unwrap();
        assert_eq!(issues.len(), 2);
        assert_eq!(issues[0].message, "\"ami-9999\" is invalid AMI ID.");
        assert_eq!(issues[0].rule.name, "aws_instance_invalid_ami");
    }

    #[test]
    fn test_launch_configuration_message() {
        let provider = Arc::new(FakeProvider::default());
        let runner = runner(
            r#"{ "resource": { "aws_launch_configuration": { "lc": { "image_id": "ami-0" } } } }"#,
        )
        .with_provider(provider);
        let issues = InvalidImageRule::aws_launch_configuration()
            .check(&runner)
            .unwrap();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].message, "\"ami-0\" is invalid image ID.");
    }

    #[test]
    fn test_missing_provider_is_a_failure() {
        let runner = runner(INSTANCES);
        let err = InvalidImageRule::aws_instance().check(&runner).unwrap_err();
        assert!(err.to_string().contains("provider endpoint"));
    }

    #[test]
    fn test_nothing_to_check_needs_no_provider() {
        let runner = runner(r#"{ "resource": { "aws_instance": { "web": { "instance_type": "t3.micro" } } } }"#);
        assert!(InvalidImageRule::aws_instance().check(&runner).unwrap().is_empty());
    }

    #[test]
    fn test_provider_error_propagates() {
        let mut provider = FakeProvider::default();
        provider.failing.insert("ami-9999".to_string());
        let runner = runner(INSTANCES).with_provider(Arc::new(provider));
        let err = InvalidImageRule::aws_instance().check(&runner).unwrap_err();
        assert!(err.to_string().contains("failed to look up image"));
    }
}
