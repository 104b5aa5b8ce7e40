//! Built-in rules for the Terraform language itself.
//!
//! These inspect the root module only. Child modules are someone else's
//! code; their resources are still covered by the provider rules.

mod dash_in_resource_name;
mod documented;
mod module_source;

pub use dash_in_resource_name::DashInResourceNameRule;
pub use documented::{DocumentedOutputsRule, DocumentedVariablesRule};
pub use module_source::{ModulePinnedSourceRule, ModuleSemverSourceRule};
