//! Command and subscription payloads.
//!
//! A generic command nests everything under `args`:
//! ```json
//! {"cmd": "AUTHENTICATE", "args": {"access_token": "..."}, "nonce": "..."}
//! ```
//! A subscription puts the event name at the top level instead:
//! ```json
//! {"cmd": "SUBSCRIBE", "args": {"channel_id": "1"}, "evt": "MESSAGE_CREATE", "nonce": "..."}
//! ```

use serde::Serialize;
use serde_json::Value;

/// Command name for subscriptions.
pub const SUBSCRIBE: &str = "SUBSCRIBE";

/// Command name for removing a subscription.
pub const UNSUBSCRIBE: &str = "UNSUBSCRIBE";

/// Body of an outbound FRAME.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandPayload {
    /// Command name.
    pub cmd: String,
    /// Command arguments. Generic commands omit empty arguments;
    /// subscriptions always carry an object.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub args: Option<Value>,
    /// Event name, only for SUBSCRIBE / UNSUBSCRIBE.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evt: Option<String>,
    /// Correlation nonce.
    pub nonce: String,
}

fn args_are_empty(args: &Value) -> bool {
    match args {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

impl CommandPayload {
    /// A generic command.
    pub fn command(cmd: &str, args: Value, nonce: &str) -> Self {
        Self {
            cmd: cmd.to_string(),
            args: (!args_are_empty(&args)).then_some(args),
            evt: None,
            nonce: nonce.to_string(),
        }
    }

    /// A SUBSCRIBE for `event`; the name is sent upper-cased.
    pub fn subscribe(event: &str, args: Value, nonce: &str) -> Self {
        Self::event_command(SUBSCRIBE, event, args, nonce)
    }

    /// An UNSUBSCRIBE for `event`.
    pub fn unsubscribe(event: &str, args: Value, nonce: &str) -> Self {
        Self::event_command(UNSUBSCRIBE, event, args, nonce)
    }

    fn event_command(cmd: &str, event: &str, args: Value, nonce: &str) -> Self {
        let args = match args {
            Value::Null => Value::Object(Default::default()),
            other => other,
        };

        Self {
            cmd: cmd.to_string(),
            args: Some(args),
            evt: Some(event.to_uppercase()),
            nonce: nonce.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_command_shape() {
        let payload = CommandPayload::command("AUTHENTICATE", json!({"access_token": "t"}), "n1");
        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            json!({"cmd": "AUTHENTICATE", "args": {"access_token": "t"}, "nonce": "n1"})
        );
    }

    #[test]
    fn test_empty_args_omitted() {
        let null_args = CommandPayload::command("GET_GUILDS", Value::Null, "n");
        let empty_args = CommandPayload::command("GET_GUILDS", json!({}), "n");

        for payload in [null_args, empty_args] {
            let value = serde_json::to_value(&payload).unwrap();
            assert!(value.get("args").is_none());
            assert_eq!(value["cmd"], "GET_GUILDS");
        }
    }

    #[test]
    fn test_subscribe_shape() {
        let payload = CommandPayload::subscribe("message_create", json!({"channel_id": "123"}), "n2");
        let value = serde_json::to_value(&payload).unwrap();

        assert_eq!(value["cmd"], "SUBSCRIBE");
        assert_eq!(value["evt"], "MESSAGE_CREATE");
        assert_eq!(value["args"], json!({"channel_id": "123"}));
        assert!(value["args"].get("evt").is_none());
        assert_eq!(value["nonce"], "n2");
    }

    #[test]
    fn test_subscribe_keeps_empty_args() {
        for args in [json!({}), Value::Null] {
            let payload = CommandPayload::subscribe("notification_create", args, "n");
            let value = serde_json::to_value(&payload).unwrap();
            assert_eq!(value["args"], json!({}));
        }
    }

    #[test]
    fn test_unsubscribe_shape() {
        let payload = CommandPayload::unsubscribe("voice_settings_update", Value::Null, "n3");
        let value = serde_json::to_value(&payload).unwrap();

        assert_eq!(value["cmd"], "UNSUBSCRIBE");
        assert_eq!(value["evt"], "VOICE_SETTINGS_UPDATE");
        assert_eq!(value["args"], json!({}));
    }
}
