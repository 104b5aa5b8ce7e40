//! Plugin side of the protocol.
//!
//! A plugin binary builds a [`RulesetPlugin`] from its rules and hands it
//! to [`serve`], which answers the host until stdin is closed.

use std::io::{self, BufRead, Write};

use super::protocol::{encode_line, HostRequest, PluginMessage, RuleSpec, PROTOCOL_VERSION};
use crate::rules::{Rule, RuleHandle};
use crate::runner::Runner;

/// A named set of rules exported by a plugin binary.
pub struct RulesetPlugin {
    name: String,
    version: String,
    rules: Vec<RuleHandle>,
}

impl RulesetPlugin {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            rules: Vec::new(),
        }
    }

    pub fn rule(mut self, rule: impl Rule + 'static) -> Self {
        self.rules.push(std::sync::Arc::new(rule));
        self
    }

    fn specs(&self) -> Vec<RuleSpec> {
        self.rules
            .iter()
            .map(|rule| RuleSpec {
                name: rule.name().to_string(),
                enabled: rule.enabled(),
                severity: rule.severity(),
                link: rule.link().map(str::to_string),
            })
            .collect()
    }

    fn handle(&self, request: HostRequest) -> PluginMessage {
        match request {
            HostRequest::Handshake { protocol_version } => {
                if protocol_version != PROTOCOL_VERSION {
                    tracing::warn!(
                        host = protocol_version,
                        plugin = PROTOCOL_VERSION,
                        "host speaks a different protocol version"
                    );
                }
                // The host compares versions and rejects a mismatch.
                PluginMessage::Handshake {
                    protocol_version: PROTOCOL_VERSION,
                    name: self.name.clone(),
                    version: self.version.clone(),
                    rules: self.specs(),
                }
            }
            HostRequest::Check { rule, runner } => {
                let Some(found) = self.rules.iter().find(|r| r.name() == rule) else {
                    return PluginMessage::Error {
                        message: format!("unknown rule `{}`", rule),
                    };
                };
                let result =
                    Runner::from_snapshot(runner).and_then(|runner| found.check(&runner));
                match result {
                    Ok(issues) => PluginMessage::Issues { issues },
                    Err(e) => PluginMessage::Error {
                        message: format!("{:#}", e),
                    },
                }
            }
        }
    }
}

/// Answer host requests on stdin/stdout.
pub fn serve(plugin: &RulesetPlugin) -> anyhow::Result<()> {
    let stdin = io::stdin();
    let stdout = io::stdout();
    serve_io(plugin, stdin.lock(), stdout.lock())
}

/// Answer host requests read from `reader`, one reply line per request.
pub fn serve_io<R: BufRead, W: Write>(
    plugin: &RulesetPlugin,
    reader: R,
    mut writer: W,
) -> anyhow::Result<()> {
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let reply = match serde_json::from_str::<HostRequest>(&line) {
            Ok(request) => plugin.handle(request),
            Err(e) => PluginMessage::Error {
                message: format!("malformed request: {}", e),
            },
        };
        writer.write_all(encode_line(&reply)?.as_bytes())?;
        writer.flush()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::issue::{Issue, Severity};
    use crate::runner::ModuleInstance;

    struct CountResources;

    impl Rule for CountResources {
        fn name(&self) -> &str {
            "count_resources"
        }

        fn enabled(&self) -> bool {
            false
        }

        fn severity(&self) -> Severity {
            Severity::Notice
        }

        fn check(&self, runner: &Runner) -> anyhow::Result<Vec<Issue>> {
            let root = runner.root();
            Ok(root
                .module
                .resources
                .iter()
                .map(|r| root.issue(self, format!("found {}", r.name), &r.decl_range))
                .collect())
        }
    }

    fn replies(input: &str) -> Vec<PluginMessage> {
        let plugin = RulesetPlugin::new("counter", "1.0.0").rule(CountResources);
        let mut out = Vec::new();
        serve_io(&plugin, input.as_bytes(), &mut out).unwrap();
        String::from_utf8(out)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[test]
    fn test_handshake_lists_rules() {
        let replies = replies("{\"type\":\"handshake\",\"protocol_version\":1}\n");
        match &replies[0] {
            PluginMessage::Handshake {
                protocol_version,
                name,
                rules,
                ..
            } => {
                assert_eq!(*protocol_version, PROTOCOL_VERSION);
                assert_eq!(name, "counter");
                assert_eq!(rules.len(), 1);
                assert_eq!(rules[0].name, "count_resources");
                assert!(!rules[0].enabled);
            }
            other => panic!("unexpected reply {other:?}"),
        }
    }

    #[test]
    fn test_check_runs_rule_on_snapshot() {
        let snapshot = serde_json::to_string(&ModuleInstance::default()).unwrap();
        let input = format!(
            "{{\"type\":\"check\",\"rule\":\"count_resources\",\"runner\":{}}}\n",
            snapshot
        );
        assert_eq!(
            replies(&input),
            vec![PluginMessage::Issues { issues: Vec::new() }]
        );
    }

    #[test]
    fn test_unknown_rule_and_bad_input() {
        let input = "{\"type\":\"check\",\"rule\":\"nope\",\"runner\":{}}\n\nnot json\n";
        let replies = replies(input);
        assert_eq!(replies.len(), 2);
        assert!(matches!(&replies[0], PluginMessage::Error { message } if message.contains("unknown rule")));
        assert!(matches!(&replies[1], PluginMessage::Error { message } if message.starts_with("malformed request")));
    }
}
