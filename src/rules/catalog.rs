//! Built-in rule catalogs.

use std::sync::Arc;

use super::awsrules::{
    self, DefaultParameterGroupRule, InvalidImageRule, InvalidTypeRule, PreviousTypeRule,
    RouteNotSpecifiedTargetRule, RouteSpecifiedMultipleTargetsRule,
};
use super::terraformrules::{
    DashInResourceNameRule, DocumentedOutputsRule, DocumentedVariablesRule,
    ModulePinnedSourceRule, ModuleSemverSourceRule,
};
use super::RuleHandle;

/// The two built-in rule lists. Built once and passed to the assembler.
#[derive(Clone)]
pub struct Catalog {
    /// Rules eligible in every run
    pub default_rules: Vec<RuleHandle>,
    /// Rules eligible only in deep-check mode
    pub deep_check_rules: Vec<RuleHandle>,
}

impl Catalog {
    pub fn new(default_rules: Vec<RuleHandle>, deep_check_rules: Vec<RuleHandle>) -> Self {
        Self {
            default_rules,
            deep_check_rules,
        }
    }

    /// Hand-written rules followed by rules derived from the schema tables.
    pub fn builtin() -> Self {
        let mut default_rules = manual_default_rules();
        default_rules.extend(awsrules::model_rules());

        let mut deep_check_rules = manual_deep_check_rules();
        deep_check_rules.extend(awsrules::api_rules());

        Self::new(default_rules, deep_check_rules)
    }
}

fn manual_default_rules() -> Vec<RuleHandle> {
    vec![
        Arc::new(DefaultParameterGroupRule::aws_db_instance()),
        Arc::new(InvalidTypeRule::aws_db_instance()),
        Arc::new(PreviousTypeRule::aws_db_instance()),
        Arc::new(DefaultParameterGroupRule::aws_elasticache_cluster()),
        Arc::new(InvalidTypeRule::aws_elasticache_cluster()),
        Arc::new(PreviousTypeRule::aws_elasticache_cluster()),
        Arc::new(PreviousTypeRule::aws_instance()),
        Arc::new(RouteNotSpecifiedTargetRule::new()),
        Arc::new(RouteSpecifiedMultipleTargetsRule::new()),
        Arc::new(InvalidTypeRule::aws_s3_bucket_region()),
        Arc::new(DashInResourceNameRule::new()),
        Arc::new(DocumentedOutputsRule::new()),
        Arc::new(DocumentedVariablesRule::new()),
        Arc::new(ModulePinnedSourceRule::new()),
        Arc::new(ModuleSemverSourceRule::new()),
    ]
}

fn manual_deep_check_rules() -> Vec<RuleHandle> {
    vec![
        Arc::new(InvalidImageRule::aws_instance()),
        Arc::new(InvalidImageRule::aws_launch_configuration()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::assemble;
    use std::collections::HashSet;

    #[test]
    fn test_builtin_catalog_has_unique_names() {
        let catalog = Catalog::builtin();
        let set = assemble(&catalog, &[], true).unwrap();
        assert_eq!(
            set.len(),
            catalog.default_rules.len() + catalog.deep_check_rules.len()
        );
    }

    #[test]
    fn test_builtin_catalog_contents() {
        let catalog = Catalog::builtin();
        let defaults: HashSet<_> = catalog.default_rules.iter().map(|r| r.name()).collect();
        let deep: HashSet<_> = catalog.deep_check_rules.iter().map(|r| r.name()).collect();

        assert!(defaults.contains("aws_instance_previous_type"));
        assert!(defaults.contains("terraform_module_pinned_source"));
        assert!(defaults.contains("aws_s3_bucket_invalid_acl"));
        assert!(defaults.contains("aws_s3_bucket_invalid_region"));
        assert!(defaults.contains("aws_db_instance_invalid_type"));
        assert!(defaults.contains("aws_elasticache_cluster_invalid_type"));
        assert!(defaults.contains("aws_elasticache_cluster_previous_type"));
        assert!(deep.contains("aws_instance_invalid_ami"));
        assert!(deep.contains("aws_instance_invalid_key_name"));
        assert!(defaults.is_disjoint(&deep));
    }

    #[test]
    fn test_builtin_rules_have_links() {
        let catalog = Catalog::builtin();
        for rule in catalog.default_rules.iter().chain(&catalog.deep_check_rules) {
            let link = rule.link().unwrap_or_default();
            assert!(link.ends_with(&format!("{}.md", rule.name())), "{}", link);
        }
    }
}
