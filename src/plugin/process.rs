//! A running plugin process and the rules it exports.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use anyhow::anyhow;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::runtime::Runtime;

use super::protocol::{
    encode_line, peek_protocol_version, HostMessage, PluginMessage, RuleSpec, PROTOCOL_VERSION,
};
use super::PluginError;
use crate::issue::{Issue, Severity};
use crate::rules::{PluginRules, Rule, RuleHandle};
use crate::runner::Runner;

/// How long to wait for replies.
#[derive(Debug, Clone, Copy)]
pub struct Timeouts {
    pub handshake: Duration,
    pub check: Duration,
}

struct Channel {
    child: Child,
    stdin: Option<ChildStdin>,
    lines: Lines<BufReader<ChildStdout>>,
    /// Set once an exchange fails. Later replies could be out of step.
    dead: Option<String>,
}

/// A plugin subprocess. Requests are serialized by an internal mutex.
pub struct PluginProcess {
    name: String,
    path: PathBuf,
    check_timeout: Duration,
    channel: Mutex<Channel>,
    runtime: Runtime,
}

impl PluginProcess {
    /// Start the artifact at `path` and complete the handshake.
    pub fn start(
        name: &str,
        path: &Path,
        timeouts: Timeouts,
    ) -> Result<(Arc<Self>, Vec<RuleSpec>), PluginError> {
        let spawn_error = |source| PluginError::Spawn {
            name: name.to_string(),
            source,
        };

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(spawn_error)?;

        let mut child = {
            let _guard = runtime.enter();
            Command::new(path)
                .stdin(Stdio::piped())
                .stdout(Stdio::piped())
                .stderr(Stdio::inherit())
                .kill_on_drop(true)
                .spawn()
                .map_err(spawn_error)?
        };

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            return Err(PluginError::Protocol {
                name: name.to_string(),
                message: "plugin stdio was not captured".to_string(),
            });
        };

        let process = Self {
            name: name.to_string(),
            path: path.to_path_buf(),
            check_timeout: timeouts.check,
            channel: Mutex::new(Channel {
                child,
                stdin: Some(stdin),
                lines: BufReader::new(stdout).lines(),
                dead: None,
            }),
            runtime,
        };

        let line = process.exchange(
            &HostMessage::Handshake {
                protocol_version: PROTOCOL_VERSION,
            },
            timeouts.handshake,
        )?;

        if let Some(actual) = peek_protocol_version(&line) {
            if actual != PROTOCOL_VERSION {
                return Err(PluginError::Incompatible {
                    name: name.to_string(),
                    expected: PROTOCOL_VERSION,
                    actual,
                });
            }
        }

        let (version, rules) = match process.decode(&line)? {
            PluginMessage::Handshake {
                name: announced,
                version,
                rules,
                ..
            } => {
                if rules.is_empty() {
                    return Err(PluginError::NoRules {
                        name: name.to_string(),
                    });
                }
                if announced != name {
                    tracing::debug!(plugin = name, announced = %announced, "plugin announced a different name");
                }
                (version, rules)
            }
            PluginMessage::Error { message } => {
                return Err(PluginError::Init {
                    name: name.to_string(),
                    message,
                })
            }
            PluginMessage::Issues { .. } => {
                return Err(process.protocol_error("expected a handshake reply, got issues"))
            }
        };

        tracing::info!(
            plugin = name,
            version = %version,
            path = %process.path.display(),
            rules = rules.len(),
            "plugin loaded"
        );

        Ok((Arc::new(process), rules))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Wrap every announced rule so it can be registered.
    pub fn rules(self: &Arc<Self>, specs: Vec<RuleSpec>) -> PluginRules {
        PluginRules {
            plugin: self.name.clone(),
            rules: specs
                .into_iter()
                .map(|spec| {
                    Arc::new(PluginRule {
                        process: Arc::clone(self),
                        spec,
                    }) as RuleHandle
                })
                .collect(),
        }
    }

    /// Send one message and read one reply line within `timeout`.
    ///
    /// A timeout or an exited plugin marks the process dead and kills it,
    /// so a late reply is never taken as the answer to a later request.
    fn exchange(
        &self,
        message: &HostMessage<'_>,
        timeout: Duration,
    ) -> Result<String, PluginError> {
        let mut guard = self.channel.lock().unwrap_or_else(PoisonError::into_inner);
        let channel = &mut *guard;

        if let Some(reason) = &channel.dead {
            return Err(self.protocol_error(format!("plugin is stopped: {}", reason)));
        }

        let request = encode_line(message).map_err(|e| self.protocol_error(e.to_string()))?;

        let result = self.runtime.block_on(async {
            let reply = tokio::time::timeout(timeout, async {
                let stdin = channel
                    .stdin
                    .as_mut()
                    .ok_or_else(|| self.protocol_error("plugin stdin is closed"))?;
                stdin
                    .write_all(request.as_bytes())
                    .await
                    .map_err(|e| self.protocol_error(format!("failed to write request: {}", e)))?;
                stdin
                    .flush()
                    .await
                    .map_err(|e| self.protocol_error(format!("failed to write request: {}", e)))?;

                match channel.lines.next_line().await {
                    Ok(Some(line)) => Ok(line),
                    Ok(None) => Err(self.protocol_error("plugin exited")),
                    Err(e) => Err(self.protocol_error(format!("failed to read reply: {}", e))),
                }
            })
            .await;

            match reply {
                Ok(reply) => reply,
                Err(_) => Err(PluginError::Timeout {
                    name: self.name.clone(),
                    timeout,
                }),
            }
        });

        if let Err(err) = &result {
            tracing::warn!(plugin = %self.name, error = %err, "stopping plugin");
            channel.dead = Some(err.to_string());
            channel.stdin.take();
            let _ = channel.child.start_kill();
        }
        result
    }

    fn decode(&self, line: &str) -> Result<PluginMessage, PluginError> {
        serde_json::from_str(line)
            .map_err(|e| self.protocol_error(format!("malformed reply {:?}: {}", line, e)))
    }

    fn protocol_error(&self, message: impl Into<String>) -> PluginError {
        PluginError::Protocol {
            name: self.name.clone(),
            message: message.into(),
        }
    }
}

impl Drop for PluginProcess {
    fn drop(&mut self) {
        let channel = self
            .channel
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        // Closing stdin asks the plugin to exit.
        channel.stdin.take();
        let _ = channel.child.start_kill();
        let _ = self.runtime.block_on(channel.child.wait());
        tracing::debug!(plugin = %self.name, "plugin stopped");
    }
}

/// A rule executed inside a plugin process.
pub struct PluginRule {
    process: Arc<PluginProcess>,
    spec: RuleSpec,
}

impl Rule for PluginRule {
    fn name(&self) -> &str {
        &self.spec.name
    }

    fn enabled(&self) -> bool {
        self.spec.enabled
    }

    fn severity(&self) -> Severity {
        self.spec.severity
    }

    fn link(&self) -> Option<&str> {
        self.spec.link.as_deref()
    }

    fn check(&self, runner: &Runner) -> anyhow::Result<Vec<Issue>> {
        let line = self.process.exchange(
            &HostMessage::Check {
                rule: &self.spec.name,
                runner: runner.snapshot()?,
            },
            self.process.check_timeout,
        )?;
        match self.process.decode(&line)? {
            PluginMessage::Issues { issues } => Ok(issues),
            PluginMessage::Error { message } => Err(anyhow!(message)),
            PluginMessage::Handshake { .. } => Err(anyhow!(
                "plugin `{}` answered a check with a handshake",
                self.process.name()
            )),
        }
    }
}
