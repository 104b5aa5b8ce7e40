//! Routing target checks for `aws_route`.

use crate::issue::{Issue, Severity};
use crate::rules::{doc_link, Rule};
use crate::runner::{ResourceRef, Runner};

const RESOURCE_TYPE: &str = "aws_route";

const ROUTE_TARGETS: &[&str] = &[
    "egress_only_gateway_id",
    "gateway_id",
    "instance_id",
    "nat_gateway_id",
    "network_interface_id",
    "transit_gateway_id",
    "vpc_peering_connection_id",
];

/// Targets present on a route. Unknown values count as present; explicit nulls do not.
fn specified_targets(resource: &ResourceRef<'_>) -> usize {
    ROUTE_TARGETS
        .iter()
        .filter(|target| match resource.attribute(target) {
            Some((_, value)) => !value.is_null(),
            None => false,
        })
        .count()
}

pub struct RouteNotSpecifiedTargetRule {
    link: String,
}

impl RouteNotSpecifiedTargetRule {
    const NAME: &'static str = "aws_route_not_specified_target";

    pub fn new() -> Self {
        Self {
            link: doc_link(Self::NAME),
        }
    }
}

impl Default for RouteNotSpecifiedTargetRule {
    fn default() -> Self {
        Self::new()
    }
}

impl Rule for RouteNotSpecifiedTargetRule {
    fn name(&self) -> &str {
        Self::NAME
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
        let message = format!(
            "The routing target is not specified, each aws_route must contain either {}.",
            ROUTE_TARGETS.join(", ")
        );
        Ok(runner
            .resources(RESOURCE_TYPE)
            .iter()
            .filter(|r| specified_targets(r) == 0)
            .map(|r| r.issue(self, message.clone(), &r.resource.decl_range))
            .collect())
    }
}

pub struct RouteSpecifiedMultipleTargetsRule {
    link: String,
}

impl RouteSpecifiedMultipleTargetsRule {
    const NAME: &'static str = "aws_route_specified_multiple_targets";

    pub fn new() -> Self {
        Self {
            link: doc_link(Self::NAME),
        }
    }
}

impl Default for RouteSpecifiedMultipleTargetsRule {
    fn default() -> Self {
        Self::new()
    }
}

impl Rule for RouteSpecifiedMultipleTargetsRule {
    fn name(&self) -> &str {
        Self::NAME
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
        Ok(runner
            .resources(RESOURCE_TYPE)
            .iter()
            .filter(|r| specified_targets(r) > 1)
            .map(|r| {
                r.issue(
                    self,
                    "More than one routing target specified. It must be one.",
                    &r.resource.decl_range,
                )
            })
            .collect())
    }
}
