//! Wire message types.
//!
//! Both directions of the live-page protocol are closed tagged unions,
//! encoded as JSON objects with a `type` discriminator. Every transport
//! carries the same messages.
//!
//! # Message Types
//!
//! | Direction | `type` | Payload |
//! |-----------|--------|---------|
//! | server → client | `update` | `html` snapshot |
//! | server → client | `reload` | (none) |
//! | server → client | `error` | `error` string |
//! | server → client | `error_trace` | `error` + `trace` stack frames |
//! | server → client | `console` | `level` + `lines` |
//! | client → server | `event` | `handler`, `path`, `data` |
//! | client → server | `relocate` | `path` |
//! | client → server | `init` | `path` (stream transport only) |

// ============================================================================
// Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

// ============================================================================
// ServerMessage
// ============================================================================

/// A message pushed from the server to the client.
///
/// Unrecognized `type` discriminators parse into [`ServerMessage::Unknown`]
/// so dispatch sites stay exhaustive with one explicit default arm.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    /// Full HTML snapshot for the DOM updater.
    Update {
        /// The new document HTML.
        html: String,
    },

    /// Server requests a full page reload.
    Reload,

    /// Server-side application error (non-fatal to the client).
    Error {
        /// Error message.
        error: String,
    },

    /// Server-side error with an ordered stack trace.
    ErrorTrace {
        /// Error message.
        error: String,
        /// Stack frames, outermost first.
        trace: Vec<StackFrame>,
    },

    /// Server-forwarded console output.
    Console {
        /// Output level.
        level: ConsoleLevel,
        /// Ordered output lines.
        lines: Vec<String>,
    },

    /// Message with an unrecognized `type`.
    Unknown {
        /// The unrecognized discriminator.
        kind: String,
    },
}

impl ServerMessage {
    /// Parses a message from its JSON text encoding.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] if the text is not a JSON object, carries
    /// no `type` field, or a recognized type is missing a required field.
    pub fn parse(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| Error::decode(format!("invalid JSON: {e}")))?;
        Self::from_value(value)
    }

    /// Parses a message from an already-decoded JSON value.
    ///
    /// Used by the polling transport, whose poll endpoint returns a batch
    /// array of raw values.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] on a malformed message.
    pub fn from_value(value: Value) -> Result<Self> {
        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::decode("message has no type field"))?
            .to_string();

        let message = match kind.as_str() {
            "update" => Self::Update {
                html: require_str(&value, "html")?,
            },

            "reload" => Self::Reload,

            "error" => Self::Error {
                error: require_str(&value, "error")?,
            },

            "error_trace" => Self::ErrorTrace {
                error: require_str(&value, "error")?,
                trace: value
                    .get("trace")
                    .cloned()
                    .map(serde_json::from_value)
                    .transpose()
                    .map_err(|e| Error::decode(format!("invalid trace: {e}")))?
                    .unwrap_or_default(),
            },

            "console" => Self::Console {
                level: ConsoleLevel::parse(get_str_or(&value, "level", "info")),
                lines: value
                    .get("lines")
                    .and_then(Value::as_array)
                    .map(|lines| {
                        lines
                            .iter()
                            .filter_map(Value::as_str)
                            .map(str::to_string)
                            .collect()
                    })
                    .unwrap_or_default(),
            },

            _ => Self::Unknown { kind },
        };

        Ok(message)
    }

    /// Returns the wire discriminator for logging.
    #[must_use]
    pub fn kind(&self) -> &str {
        match self {
            Self::Update { .. } => "update",
            Self::Reload => "reload",
            Self::Error { .. } => "error",
            Self::ErrorTrace { .. } => "error_trace",
            Self::Console { .. } => "console",
            Self::Unknown { kind } => kind,
        }
    }
}

/// Gets a required string field.
#[inline]
fn require_str(value: &Value, key: &str) -> Result<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| Error::decode(format!("missing field: {key}")))
}

/// Gets a string field with a default.
#[inline]
fn get_str_or<'a>(value: &'a Value, key: &str, default: &'a str) -> &'a str {
    value.get(key).and_then(Value::as_str).unwrap_or(default)
}

// ============================================================================
// StackFrame
// ============================================================================

/// One frame of a server-reported stack trace.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StackFrame {
    /// Source file name.
    pub filename: String,

    /// Line number within the file.
    pub lineno: u32,

    /// Column number, when the server knows it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub colno: Option<u32>,

    /// Function name.
    pub name: String,

    /// Source line text.
    pub line: String,
}

// ============================================================================
// ConsoleLevel
// ============================================================================

/// Level of a server-forwarded console message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleLevel {
    /// Plain output.
    Log,
    /// Informational output.
    Info,
    /// Warning output.
    Warn,
    /// Error output.
    Error,
    /// Debug output.
    Debug,
}

impl ConsoleLevel {
    /// Parses a level string, defaulting to `Info` for unknown values.
    #[must_use]
    pub fn parse(level: &str) -> Self {
        match level {
            "log" => Self::Log,
            "warn" | "warning" => Self::Warn,
            "error" => Self::Error,
            "debug" => Self::Debug,
            _ => Self::Info,
        }
    }

    /// Returns the wire string for this level.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Log => "log",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
            Self::Debug => "debug",
        }
    }
}

// ============================================================================
// ClientMessage
// ============================================================================

/// A message sent from the client to the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMessage {
    /// A user event routed to a server-side handler.
    Event {
        /// Handler name declared on the element.
        handler: String,
        /// Current page path.
        path: String,
        /// Structured event payload.
        data: EventData,
    },

    /// Client-side navigation notice.
    Relocate {
        /// The new page path.
        path: String,
    },

    /// Session bootstrap carrying the current path.
    ///
    /// Sent only by the stream transport, as its first message.
    Init {
        /// Current page path.
        path: String,
    },
}

impl ClientMessage {
    /// Encodes the message as JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if serialization fails.
    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Returns the wire discriminator for logging.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Event { .. } => "event",
            Self::Relocate { .. } => "relocate",
            Self::Init { .. } => "init",
        }
    }
}

// ============================================================================
// EventData
// ============================================================================

/// Structured payload of an `event` client message.
///
/// Only fields relevant to the event type are populated; absent fields are
/// omitted from the encoding.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventData {
    /// DOM event type (`click`, `input`, ...).
    #[serde(rename = "type")]
    pub event_type: String,

    /// Id of the originating element, when it has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Current value for value-bearing controls.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,

    /// Checked state for checkboxes and radios.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checked: Option<bool>,

    /// Key name for keyboard events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,

    /// Legacy key code for keyboard events.
    #[serde(rename = "keyCode", default, skip_serializing_if = "Option::is_none")]
    pub key_code: Option<u32>,

    /// Flat form serialization for submit events (file fields excluded).
    #[serde(rename = "formData", default, skip_serializing_if = "Option::is_none")]
    pub form_data: Option<BTreeMap<String, String>>,

    /// Declared handler arguments, JSON-decoded.
    ///
    /// Positional entries are keyed `"0"`, `"1"`, ...; `data-arg-<name>`
    /// attributes are keyed by `<name>`.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub args: Map<String, Value>,
}

impl EventData {
    /// Creates an empty payload for the given event type.
    #[inline]
    #[must_use]
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            ..Self::default()
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[test]
    fn test_parse_update() {
        let msg = ServerMessage::parse(r#"{"type":"update","html":"<div>hi</div>"}"#).unwrap();
        assert_eq!(
            msg,
            ServerMessage::Update {
                html: "<div>hi</div>".into()
            }
        );
        assert_eq!(msg.kind(), "update");
    }

    #[test]
    fn test_parse_update_missing_html_is_decode_error() {
        let err = ServerMessage::parse(r#"{"type":"update"}"#).unwrap_err();
        assert!(matches!(err, Error::Decode { .. }));
    }

    #[test]
    fn test_parse_reload() {
        let msg = ServerMessage::parse(r#"{"type":"reload"}"#).unwrap();
        assert_eq!(msg, ServerMessage::Reload);
    }

    #[test]
    fn test_parse_error() {
        let msg = ServerMessage::parse(r#"{"type":"error","error":"boom"}"#).unwrap();
        assert_eq!(msg, ServerMessage::Error { error: "boom".into() });
    }

    #[test]
    fn test_parse_error_trace() {
        let text = r#"{
            "type": "error_trace",
            "error": "division by zero",
            "trace": [
                {"filename": "pages/index.pyw", "lineno": 12, "name": "on_click", "line": "x = 1 / 0"},
                {"filename": "runtime.py", "lineno": 88, "colno": 4, "name": "dispatch", "line": "handler()"}
            ]
        }"#;

        let msg = ServerMessage::parse(text).unwrap();
        let ServerMessage::ErrorTrace { error, trace } = msg else {
            panic!("expected error_trace");
        };

        assert_eq!(error, "division by zero");
        assert_eq!(trace.len(), 2);
        assert_eq!(trace[0].filename, "pages/index.pyw");
        assert_eq!(trace[0].lineno, 12);
        assert_eq!(trace[0].colno, None);
        assert_eq!(trace[1].colno, Some(4));
        assert_eq!(trace[1].name, "dispatch");
    }

    #[test]
    fn test_parse_console() {
        let msg =
            ServerMessage::parse(r#"{"type":"console","level":"error","lines":["a","b"]}"#)
                .unwrap();
        assert_eq!(
            msg,
            ServerMessage::Console {
                level: ConsoleLevel::Error,
                lines: vec!["a".into(), "b".into()],
            }
        );
    }

    #[test]
    fn test_parse_console_defaults_level_to_info() {
        let msg = ServerMessage::parse(r#"{"type":"console","lines":[]}"#).unwrap();
        assert_eq!(
            msg,
            ServerMessage::Console {
                level: ConsoleLevel::Info,
                lines: vec![],
            }
        );
    }

    #[test]
    fn test_parse_unknown_kind() {
        let msg = ServerMessage::parse(r#"{"type":"metrics","values":[1,2]}"#).unwrap();
        assert_eq!(msg, ServerMessage::Unknown { kind: "metrics".into() });
        assert_eq!(msg.kind(), "metrics");
    }

    #[test]
    fn test_parse_missing_type_is_decode_error() {
        let err = ServerMessage::parse(r#"{"html":"<div></div>"}"#).unwrap_err();
        assert!(matches!(err, Error::Decode { .. }));
    }

    #[test]
    fn test_parse_invalid_json_is_decode_error() {
        let err = ServerMessage::parse("not json").unwrap_err();
        assert!(matches!(err, Error::Decode { .. }));
    }

    #[test]
    fn test_console_level_parse() {
        assert_eq!(ConsoleLevel::parse("error"), ConsoleLevel::Error);
        assert_eq!(ConsoleLevel::parse("warning"), ConsoleLevel::Warn);
        assert_eq!(ConsoleLevel::parse("verbose"), ConsoleLevel::Info);
    }

    #[test]
    fn test_client_event_encoding() {
        let mut data = EventData::new("click");
        data.id = Some("btn".into());

        let msg = ClientMessage::Event {
            handler: "increment".into(),
            path: "/counter".into(),
            data,
        };

        let value: Value = serde_json::from_str(&msg.encode().unwrap()).unwrap();
        assert_eq!(value["type"], "event");
        assert_eq!(value["handler"], "increment");
        assert_eq!(value["path"], "/counter");
        assert_eq!(value["data"]["type"], "click");
        assert_eq!(value["data"]["id"], "btn");
        // Absent optionals are omitted entirely.
        assert!(value["data"].get("value").is_none());
        assert!(value["data"].get("formData").is_none());
    }

    #[test]
    fn test_client_relocate_encoding() {
        let msg = ClientMessage::Relocate { path: "/about".into() };
        let value: Value = serde_json::from_str(&msg.encode().unwrap()).unwrap();
        assert_eq!(value, json!({"type": "relocate", "path": "/about"}));
    }

    #[test]
    fn test_client_init_encoding() {
        let msg = ClientMessage::Init { path: "/".into() };
        let value: Value = serde_json::from_str(&msg.encode().unwrap()).unwrap();
        assert_eq!(value, json!({"type": "init", "path": "/"}));
    }

    #[test]
    fn test_event_data_form_and_key_fields() {
        let mut data = EventData::new("submit");
        data.form_data = Some(BTreeMap::from([
            ("user".to_string(), "alice".to_string()),
            ("pass".to_string(), "secret".to_string()),
        ]));

        let value = serde_json::to_value(&data).unwrap();
        assert_eq!(value["formData"]["user"], "alice");
        assert_eq!(value["formData"]["pass"], "secret");

        let mut key_data = EventData::new("keydown");
        key_data.key = Some("Enter".into());
        key_data.key_code = Some(13);
        let value = serde_json::to_value(&key_data).unwrap();
        assert_eq!(value["key"], "Enter");
        assert_eq!(value["keyCode"], 13);
    }

    #[test]
    fn test_event_data_args_keys() {
        let mut data = EventData::new("click");
        data.args.insert("0".into(), json!(42));
        data.args.insert("row".into(), json!({"id": 7}));

        let value = serde_json::to_value(&data).unwrap();
        assert_eq!(value["args"]["0"], 42);
        assert_eq!(value["args"]["row"]["id"], 7);
    }
}
