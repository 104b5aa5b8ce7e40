//! Plugin discovery and loading.
//!
//! A plugin is an executable named `tfcheck-ruleset-<name>` in the plugin
//! directory. The host starts it, performs a versioned handshake over
//! line-delimited JSON on stdin/stdout and wraps every announced rule as a
//! [`Rule`](crate::rules::Rule). Plugin binaries built on this crate use
//! [`serve`] to answer the host.

mod process;
pub mod protocol;
mod serve;

pub use process::{PluginProcess, PluginRule, Timeouts};
pub use protocol::PROTOCOL_VERSION;
pub use serve::{serve, serve_io, RulesetPlugin};

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use thiserror::Error;

use crate::config::Config;
use crate::rules::PluginRules;

/// Environment variable overriding the plugin directory.
pub const PLUGIN_DIR_ENV: &str = "TFCHECK_PLUGIN_DIR";

/// File name prefix of plugin artifacts.
pub const ARTIFACT_PREFIX: &str = "tfcheck-ruleset-";

/// How long a plugin may take to answer the handshake.
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// How long a plugin may take to answer one check, unless configured.
pub const CHECK_TIMEOUT: Duration = Duration::from_secs(30);

const LOCAL_PLUGIN_DIR: &str = ".tfcheck.d/plugins";

/// Errors raised while starting plugins.
#[derive(Error, Debug)]
pub enum PluginError {
    #[error("plugin `{name}` not found at {}", path.display())]
    NotFound { name: String, path: PathBuf },

    #[error("failed to start plugin `{name}`: {source}")]
    Spawn {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("plugin `{name}` speaks protocol version {actual}, expected {expected}")]
    Incompatible {
        name: String,
        expected: u32,
        actual: u32,
    },

    #[error("plugin `{name}` exports no rules")]
    NoRules { name: String },

    #[error("plugin `{name}` failed to initialize: {message}")]
    Init { name: String, message: String },

    #[error("plugin `{name}`: {message}")]
    Protocol { name: String, message: String },

    #[error("plugin `{name}` did not answer within {timeout:?}")]
    Timeout { name: String, timeout: Duration },

    #[error("could not determine the plugin directory; set plugin_dir or {PLUGIN_DIR_ENV}")]
    NoPluginDir,
}

/// Produces the plugin rules for a configuration.
pub trait PluginSource: Send + Sync {
    fn load(&self, config: &Config) -> Result<Vec<PluginRules>, PluginError>;
}

/// Starts plugin processes from the plugin directory.
///
/// Started plugins are kept by artifact path, so loading the same
/// configuration again returns the same rule instances without spawning.
pub struct PluginLoader {
    started: Mutex<HashMap<PathBuf, PluginRules>>,
    handshake_timeout: Duration,
}

impl PluginLoader {
    pub fn new() -> Self {
        Self {
            started: Mutex::new(HashMap::new()),
            handshake_timeout: HANDSHAKE_TIMEOUT,
        }
    }

    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    fn timeouts(&self, config: &Config) -> Timeouts {
        Timeouts {
            handshake: self.handshake_timeout,
            check: config
                .plugin_timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(CHECK_TIMEOUT),
        }
    }

    /// Resolve the plugin directory for `config`.
    ///
    /// Order: `plugin_dir` from the configuration, then `TFCHECK_PLUGIN_DIR`,
    /// then `./.tfcheck.d/plugins` if it exists, then the same path under
    /// the home directory.
    pub fn plugin_root(config: &Config) -> Result<PathBuf, PluginError> {
        if let Some(dir) = &config.plugin_dir {
            return Ok(dir.clone());
        }
        if let Some(dir) = std::env::var_os(PLUGIN_DIR_ENV).filter(|v| !v.is_empty()) {
            return Ok(PathBuf::from(dir));
        }
        let local = PathBuf::from(LOCAL_PLUGIN_DIR);
        if local.is_dir() {
            return Ok(local);
        }
        directories::BaseDirs::new()
            .map(|dirs| dirs.home_dir().join(LOCAL_PLUGIN_DIR))
            .ok_or(PluginError::NoPluginDir)
    }

    /// Path of the artifact for plugin `name` under `root`.
    pub fn artifact_path(root: &Path, name: &str) -> PathBuf {
        root.join(format!(
            "{}{}{}",
            ARTIFACT_PREFIX,
            name,
            std::env::consts::EXE_SUFFIX
        ))
    }
}

impl Default for PluginLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl PluginSource for PluginLoader {
    fn load(&self, config: &Config) -> Result<Vec<PluginRules>, PluginError> {
        let names: Vec<&str> = config.enabled_plugins().collect();
        if names.is_empty() {
            return Ok(Vec::new());
        }

        let root = Self::plugin_root(config)?;
        tracing::debug!(root = %root.display(), plugins = names.len(), "loading plugins");

        let mut started = self.started.lock().unwrap_or_else(PoisonError::into_inner);
        let mut loaded = Vec::with_capacity(names.len());

        for name in names {
            let path = Self::artifact_path(&root, name);
            if let Some(rules) = started.get(&path) {
                loaded.push(rules.clone());
                continue;
            }
            if !path.is_file() {
                return Err(PluginError::NotFound {
                    name: name.to_string(),
                    path,
                });
            }

            let (process, specs) = PluginProcess::start(name, &path, self.timeouts(config))?;
            let rules = process.rules(specs);
            started.insert(path, rules.clone());
            loaded.push(rules);
        }

        Ok(loaded)
    }
}
