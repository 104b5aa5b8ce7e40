//! Built-in rules for AWS provider resources.

mod api;
mod default_parameter_group;
mod invalid_image;
mod invalid_type;
mod model;
mod previous_type;
mod route;

pub use api::{api_rules, ApiRule};
pub use default_parameter_group::DefaultParameterGroupRule;
pub use invalid_image::InvalidImageRule;
pub use invalid_type::InvalidTypeRule;
pub use model::{model_rules, EnumValueRule};
pub use previous_type::PreviousTypeRule;
pub use route::{RouteNotSpecifiedTargetRule, RouteSpecifiedMultipleTargetsRule};

use anyhow::Context;

use crate::issue::Issue;
use crate::provider::{LookupKind, LookupStatus};
use crate::rules::Rule;
use crate::runner::Runner;

/// Look up every `resource_type.attribute` value with the provider and
/// report the ones that do not exist.
///
/// The provider is only required when there is something to look up.
pub(crate) fn check_lookup(
    rule: &dyn Rule,
    runner: &Runner,
    resource_type: &str,
    attribute: &str,
    kind: LookupKind,
    describe: impl Fn(&str) -> String,
) -> anyhow::Result<Vec<Issue>> {
    let mut issues = Vec::new();

    for resource in runner.resources(resource_type) {
        let Some((attr, id)) = resource.string_attribute(attribute) else {
            continue;
        };
        let provider = runner.provider()?;
        let status = provider
            .lookup(kind, &id)
            .with_context(|| format!("failed to look up {} {:?}", kind.label(), id))?;
        match status {
            LookupStatus::Exists => {}
            LookupStatus::NotFound => {
                issues.push(resource.issue(rule, describe(&id), &attr.range));
            }
            LookupStatus::Unknown(reason) => {
                tracing::warn!(
                    rule = rule.name(),
                    id = %id,
                    reason = %reason,
                    "could not verify {}",
                    kind.label()
                );
            }
        }
    }

    Ok(issues)
}
