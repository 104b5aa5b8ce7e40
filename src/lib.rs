//! tfcheck - a Terraform linter with pluggable rule sets.
//!
//! Rules come from three places: the built-in default catalog, the
//! built-in deep-check catalog (rules that query the provider) and plugin
//! processes discovered at runtime. The registry merges them into one
//! name-keyed rule set, rejects duplicate names and resolves which rules
//! run for a given configuration.
//!
//! # Architecture
//!
//! - `config`: YAML configuration and validation
//! - `runner`: loads `*.tf.json` modules and evaluates variable references
//! - `rules`: the `Rule` trait, built-in rules and the registry
//! - `plugin`: plugin discovery, the subprocess protocol and the plugin SDK
//! - `provider`: lookup client used by deep-check rules
//! - `check`: parallel rule execution
//! - `report`: output formatting (text, JSON)
//!
//! # Writing a Plugin
//!
//! See `src/bin/ruleset_example.rs`. Implement `Rule` for each check, collect
//! them in a `plugin::RulesetPlugin` and call `plugin::serve`.

pub mod check;
pub mod cli;
pub mod config;
pub mod issue;
pub mod plugin;
pub mod provider;
pub mod report;
pub mod rules;
pub mod runner;

pub use check::{run_rules, CheckOutcome};
pub use config::Config;
pub use issue::{Issue, RuleFailure, Severity};
pub use rules::{Registry, RegistryError, Rule, RuleHandle, RuleSet};
pub use runner::Runner;
