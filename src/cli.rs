//! Command-line interface for tfcheck.

use clap::{Parser, ValueEnum};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use crate::check::{self, CheckOutcome};
use crate::config::{self, Config, RuleConfig};
use crate::provider::ProviderClient;
use crate::report;
use crate::rules::Registry;
use crate::runner::{self, Runner};

/// Exit codes.
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_ERROR: i32 = 1;
pub const EXIT_ISSUES: i32 = 2;
pub const EXIT_RULE_FAILURE: i32 = 3;

/// Terraform linter with pluggable rule sets.
///
/// Checks `*.tf.json` configurations against built-in rules, optional
/// deep-check rules that query the provider, and rules exported by plugins.
#[derive(Parser)]
#[command(name = "tfcheck")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Files or directory to check (default: current directory)
    pub paths: Vec<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = Format::Default)]
    pub format: Format,

    /// Path to the config file (default: .tfcheck.yaml if present)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Variable file in JSON format (repeatable)
    #[arg(long = "var-file", value_name = "PATH")]
    pub var_file: Vec<PathBuf>,

    /// Set a variable (repeatable)
    #[arg(long = "var", value_name = "NAME=VALUE")]
    pub var: Vec<String>,

    /// Inspect module calls
    #[arg(long)]
    pub module: bool,

    /// Skip a module source when inspecting modules (repeatable)
    #[arg(long = "ignore-module", value_name = "SOURCE")]
    pub ignore_module: Vec<String>,

    /// Enable deep check rules that query the provider
    #[arg(long)]
    pub deep: bool,

    /// Enable a rule (repeatable)
    #[arg(long = "enable-rule", value_name = "NAME")]
    pub enable_rule: Vec<String>,

    /// Disable a rule (repeatable)
    #[arg(long = "disable-rule", value_name = "NAME")]
    pub disable_rule: Vec<String>,

    /// Run only the given rules (repeatable)
    #[arg(long, value_name = "NAME")]
    pub only: Vec<String>,

    /// Directory holding plugin artifacts
    #[arg(long = "plugin-dir", value_name = "DIR")]
    pub plugin_dir: Option<PathBuf>,

    /// Base URL of the provider lookup service used by deep check
    #[arg(long, value_name = "URL")]
    pub endpoint: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Default,
    Json,
}

impl Cli {
    /// Configuration expressed by the command-line flags alone.
    pub fn to_config(&self) -> Config {
        let mut config = Config {
            deep_check: self.deep,
            module: self.module,
            varfile: self.var_file.clone(),
            variables: self.var.clone(),
            plugin_dir: self.plugin_dir.clone(),
            only: self.only.clone(),
            ..Default::default()
        };
        config.provider.endpoint = self.endpoint.clone();
        for source in &self.ignore_module {
            config.ignore_module.insert(source.clone(), true);
        }
        for name in &self.enable_rule {
            config
                .rules
                .insert(name.clone(), RuleConfig::new(name.as_str(), true));
        }
        for name in &self.disable_rule {
            config
                .rules
                .insert(name.clone(), RuleConfig::new(name.as_str(), false));
        }
        config
    }
}

/// Exit code for a finished run. Rule failures take precedence over issues.
pub fn exit_code(outcome: &CheckOutcome) -> i32 {
    if !outcome.failures.is_empty() {
        EXIT_RULE_FAILURE
    } else if !outcome.issues.is_empty() {
        EXIT_ISSUES
    } else {
        EXIT_SUCCESS
    }
}

/// Run a check and print the report.
pub fn run(cli: &Cli) -> anyhow::Result<i32> {
    let config = Config::load(cli.config.as_deref())?.merge(cli.to_config());
    config::validate(&config)?;

    let registry = Registry::builtin();
    registry.validate_config(&config)?;

    let paths = if cli.paths.is_empty() {
        vec![PathBuf::from(".")]
    } else {
        cli.paths.clone()
    };
    let root = runner::load(&config, &paths)?;

    let mut runner = Runner::new(root);
    if config.deep_check {
        if config.provider.endpoint.is_some() {
            let client = ProviderClient::new(&config.provider)?;
            runner = runner.with_provider(Arc::new(client));
        } else {
            tracing::warn!("deep check is enabled without a provider endpoint");
        }
    }

    let rules = registry.new_rules(&config)?;
    let outcome = check::run_rules(&rules, &runner);

    let stdout = io::stdout();
    let mut out = stdout.lock();
    match cli.format {
        Format::Json => report::write_json(&mut out, &outcome)?,
        Format::Default => report::write_pretty(&mut out, &outcome)?,
    }

    Ok(exit_code(&outcome))
}
