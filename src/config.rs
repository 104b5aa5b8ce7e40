//! Configuration for tfcheck.
//!
//! Configuration comes from an optional `.tfcheck.yaml` file merged with
//! command-line flags. Rule registry assembly and enablement resolution
//! only ever read the finished value.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default config file looked up in the working directory.
pub const DEFAULT_CONFIG_NAME: &str = ".tfcheck.yaml";

/// Errors raised while loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Enable rules that validate values against the provider API
    pub deep_check: bool,
    /// Inspect child modules as well as the root module
    pub module: bool,
    /// Module sources (glob patterns) to skip when `module` is set
    pub ignore_module: BTreeMap<String, bool>,
    /// Variable files, applied in order
    pub varfile: Vec<PathBuf>,
    /// Variables given as `name=value`, applied after variable files
    pub variables: Vec<String>,
    /// Per-rule enablement overrides, keyed by rule name
    pub rules: BTreeMap<String, RuleConfig>,
    /// Plugins to load, keyed by plugin name
    pub plugins: BTreeMap<String, PluginConfig>,
    /// Directory holding plugin artifacts
    pub plugin_dir: Option<PathBuf>,
    /// How long a plugin may take to answer one check, in milliseconds
    pub plugin_timeout_ms: Option<u64>,
    pub provider: ProviderConfig,
    /// When non-empty, run only these rules
    #[serde(skip)]
    pub only: Vec<String>,
}

/// Per-rule override.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RuleConfig {
    #[serde(skip)]
    pub name: String,
    pub enabled: bool,
}

impl RuleConfig {
    pub fn new(name: impl Into<String>, enabled: bool) -> Self {
        Self {
            name: name.into(),
            enabled,
        }
    }
}

/// Per-plugin settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PluginConfig {
    #[serde(skip)]
    pub name: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl PluginConfig {
    pub fn new(name: impl Into<String>, enabled: bool) -> Self {
        Self {
            name: name.into(),
            enabled,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Settings for the deep-check provider client.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Base URL of the provider lookup service
    pub endpoint: Option<String>,
    /// Request timeout in milliseconds (default: 5000)
    pub timeout_ms: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout_ms: 5000,
        }
    }
}

impl Config {
    /// Parse a config from a YAML file.
    pub fn parse_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parse a config from YAML text.
    pub fn parse_str(content: &str) -> Result<Self, serde_yaml::Error> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let mut config: Config = serde_yaml::from_str(content)?;
        config.fill_names();
        Ok(config)
    }

    /// Load the config at `path`, or the default file when `path` is `None`.
    ///
    /// A missing default file yields the default config; a missing explicit
    /// file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => Self::parse_file(p),
            None => {
                let default = Path::new(DEFAULT_CONFIG_NAME);
                if default.exists() {
                    tracing::info!(path = %default.display(), "loading config file");
                    Self::parse_file(default)
                } else {
                    tracing::info!("no config file found, using defaults");
                    Ok(Self::default())
                }
            }
        }
    }

    /// Merge `other` over `self`. Scalars set in `other` win; lists and maps are unioned.
    pub fn merge(mut self, other: Config) -> Config {
        self.deep_check |= other.deep_check;
        self.module |= other.module;
        self.ignore_module.extend(other.ignore_module);
        self.varfile.extend(other.varfile);
        self.variables.extend(other.variables);
        self.rules.extend(other.rules);
        self.plugins.extend(other.plugins);
        if other.plugin_dir.is_some() {
            self.plugin_dir = other.plugin_dir;
        }
        if other.plugin_timeout_ms.is_some() {
            self.plugin_timeout_ms = other.plugin_timeout_ms;
        }
        if other.provider.endpoint.is_some() {
            self.provider.endpoint = other.provider.endpoint;
        }
        if other.provider.timeout_ms != ProviderConfig::default().timeout_ms {
            self.provider.timeout_ms = other.provider.timeout_ms;
        }
        self.only.extend(other.only);
        self.fill_names();
        self
    }

    /// Names of plugins that are enabled, in name order.
    pub fn enabled_plugins(&self) -> impl Iterator<Item = &str> {
        self.plugins
            .iter()
            .filter(|(_, p)| p.enabled)
            .map(|(name, _)| name.as_str())
    }

    /// Returns whether a module source should be skipped.
    pub fn is_module_ignored(&self, source: &str) -> bool {
        for (pattern, ignored) in &self.ignore_module {
            if !ignored {
                continue;
            }
            if pattern == source {
                return true;
            }
            if let Ok(glob) = globset::Glob::new(pattern) {
                if glob.compile_matcher().is_match(source) {
                    return true;
                }
            }
        }
        false
    }

    fn fill_names(&mut self) {
        for (name, rule) in self.rules.iter_mut() {
            rule.name = name.clone();
        }
        for (name, plugin) in self.plugins.iter_mut() {
            plugin.name = name.clone();
        }
    }
}

/// Validate a config for correctness.
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    for var in &config.variables {
        match var.split_once('=') {
            Some((name, _)) if !name.trim().is_empty() => {}
            _ => {
                return Err(ConfigError::Invalid(format!(
                    "variable {:?} must be in the form name=value",
                    var
                )))
            }
        }
    }

    for pattern in config.ignore_module.keys() {
        globset::Glob::new(pattern).map_err(|e| {
            ConfigError::Invalid(format!("invalid ignore_module pattern {:?}: {}", pattern, e))
        })?;
    }

    for name in config.plugins.keys() {
        if name.is_empty() || name.contains(['/', '\\']) {
            return Err(ConfigError::Invalid(format!("invalid plugin name {:?}", name)));
        }
    }

    if config.plugin_timeout_ms == Some(0) {
        return Err(ConfigError::Invalid(
            "plugin_timeout_ms must be greater than zero".to_string(),
        ));
    }

    if let Some(endpoint) = &config.provider.endpoint {
        if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
            return Err(ConfigError::Invalid(format!(
                "provider endpoint {:?} must be an http(s) URL",
                endpoint
            )));
        }
    }

    Ok(())
}
