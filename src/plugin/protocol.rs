//! Line-delimited JSON messages exchanged with plugin processes.
//!
//! The host writes one [`HostMessage`] per line on the plugin's stdin and
//! reads one [`PluginMessage`] per line from its stdout.

use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use serde_json::Value;

use crate::issue::{Issue, Severity};

/// Bumped whenever a message changes shape.
pub const PROTOCOL_VERSION: u32 = 1;

/// Host to plugin, as written by the host.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostMessage<'a> {
    Handshake { protocol_version: u32 },
    Check { rule: &'a str, runner: &'a RawValue },
}

/// Host to plugin, as read by the plugin.
///
/// The runner snapshot is kept as a plain value; raw values cannot be
/// read through an internally tagged enum.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostRequest {
    Handshake { protocol_version: u32 },
    Check { rule: String, runner: Value },
}

/// Rule metadata announced during the handshake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSpec {
    pub name: String,
    pub enabled: bool,
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

/// Plugin to host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PluginMessage {
    Handshake {
        protocol_version: u32,
        name: String,
        version: String,
        rules: Vec<RuleSpec>,
    },
    Issues {
        issues: Vec<Issue>,
    },
    Error {
        message: String,
    },
}

#[derive(Deserialize)]
struct Versioned {
    protocol_version: Option<u32>,
}

/// The `protocol_version` field of a reply, whatever the rest of its shape.
pub fn peek_protocol_version(line: &str) -> Option<u32> {
    serde_json::from_str::<Versioned>(line)
        .ok()
        .and_then(|v| v.protocol_version)
}

/// Serialize a message as a single line, newline included.
pub fn encode_line<T: Serialize>(message: &T) -> serde_json::Result<String> {
    let mut line = serde_json::to_string(message)?;
    line.push('\n');
    Ok(line)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_request_is_readable_by_plugin() {
        let runner = RawValue::from_string(r#"{"path":[]}"#.to_string()).unwrap();
        let line = encode_line(&HostMessage::Check {
            rule: "my_rule",
            runner: &runner,
        })
        .unwrap();
        assert!(line.ends_with('\n'));
        assert!(line.starts_with(r#"{"type":"check""#));

        match serde_json::from_str::<HostRequest>(&line).unwrap() {
            HostRequest::Check { rule, runner } => {
                assert_eq!(rule, "my_rule");
                assert_eq!(runner, serde_json::json!({ "path": [] }));
            }
            other => panic!("unexpected request {other:?}"),
        }
    }

    #[test]
    fn test_handshake_wire_format() {
        let line = encode_line(&HostMessage::Handshake {
            protocol_version: PROTOCOL_VERSION,
        })
        .unwrap();
        assert_eq!(line, "{\"type\":\"handshake\",\"protocol_version\":1}\n");

        let reply: PluginMessage = serde_json::from_str(
            r#"{"type":"handshake","protocol_version":1,"name":"example","version":"0.1.0",
                "rules":[{"name":"r","enabled":true,"severity":"notice"}]}"#,
        )
        .unwrap();
        match reply {
            PluginMessage::Handshake { rules, .. } => {
                assert_eq!(rules[0].severity, Severity::Notice);
                assert_eq!(rules[0].link, None);
            }
            other => panic!("unexpected reply {other:?}"),
        }
    }

    #[test]
    fn test_peek_protocol_version_ignores_message_shape() {
        assert_eq!(
            peek_protocol_version(r#"{"type":"hello","protocol_version":2}"#),
            Some(2)
        );
        assert_eq!(peek_protocol_version(r#"{"type":"error","message":"x"}"#), None);
        assert_eq!(peek_protocol_version("not json"), None);
    }
}
