//! Rules and the rule registry.
//!
//! Every check implements [`Rule`], whatever its origin: the built-in
//! default catalog, the built-in deep-check catalog, or a plugin. The origin
//! is carried next to the rule as a [`RuleOrigin`] for diagnostics.
//!
//! The [`registry`] submodule assembles the catalogs and plugin rules into a
//! [`RuleSet`], rejects duplicate names, validates requested rule names and
//! resolves which rules are active for a run.

pub mod awsrules;
mod catalog;
mod registry;
pub mod terraformrules;

pub use catalog::Catalog;
pub use registry::{
    active_rules, assemble, validate_rule_names, Registry, RegistryError, RuleEntry, RuleSet,
};

use std::sync::Arc;

use crate::issue::{Issue, Severity};
use crate::runner::Runner;

/// A named check run against the loaded configuration.
pub trait Rule: Send + Sync {
    /// Stable, non-empty identifier, unique within an assembled rule set.
    fn name(&self) -> &str;

    /// Whether the rule runs when the configuration does not mention it.
    fn enabled(&self) -> bool;

    fn severity(&self) -> Severity;

    /// Documentation URL.
    fn link(&self) -> Option<&str> {
        None
    }

    /// Inspect the configuration and return the issues found.
    ///
    /// An error means the rule could not complete; it is reported for this
    /// rule only and does not stop other rules.
    fn check(&self, runner: &Runner) -> anyhow::Result<Vec<Issue>>;
}

/// Shared handle to a rule. Plugin rules stay owned by the plugin loader.
pub type RuleHandle = Arc<dyn Rule>;

/// Where a rule came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RuleOrigin {
    Default,
    DeepCheck,
    Plugin(String),
}

impl std::fmt::Display for RuleOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RuleOrigin::Default => write!(f, "built-in"),
            RuleOrigin::DeepCheck => write!(f, "built-in deep check"),
            RuleOrigin::Plugin(name) => write!(f, "plugin `{}`", name),
        }
    }
}

/// Rules exported by one plugin.
#[derive(Clone)]
pub struct PluginRules {
    pub plugin: String,
    pub rules: Vec<RuleHandle>,
}

/// Link to a built-in rule's documentation.
pub(crate) fn doc_link(name: &str) -> String {
    format!(
        "{}/blob/v{}/docs/rules/{}.md",
        env!("CARGO_PKG_REPOSITORY"),
        env!("CARGO_PKG_VERSION"),
        name
    )
}

#[cfg(test)]
pub(crate) mod testing {
    //! Synthetic rules for registry tests.

    use super::*;

    pub struct FakeRule {
        pub name: String,
        pub enabled: bool,
    }

    impl Rule for FakeRule {
        fn name(&self) -> &str {
            &self.name
        }

        fn enabled(&self) -> bool {
            self.enabled
        }

        fn severity(&self) -> Severity {
            Severity::Warning
        }

        fn check(&self, _runner: &Runner) -> anyhow::Result<Vec<Issue>> {
            Ok(Vec::new())
        }
    }

    pub fn rule(name: &str, enabled: bool) -> RuleHandle {
        Arc::new(FakeRule {
            name: name.to_string(),
            enabled,
        })
    }
}
