//! WebSocket control message format.
//!
//! Every frame carries one JSON object with exactly two fields:
//!
//! ```text
//! {"type": "LED_selected", "value": 2}
//! {"type": "LED_intensity", "value": "90"}
//! ```
//!
//! Confirmations use the same shape with the value rendered as a string.

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

/// Tag of the channel selection command.
pub const TAG_SELECT: &str = "LED_selected";
/// Tag of the intensity command.
pub const TAG_INTENSITY: &str = "LED_intensity";

/// Commands a client can issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Make this channel the only active one.
    SelectChannel(i64),
    /// Set the drive level of the selected channel, in percent.
    SetIntensity(i64),
}

/// Which command a confirmation echoes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    SelectChannel,
    SetIntensity,
}

impl CommandKind {
    /// Wire tag for this kind.
    pub fn tag(self) -> &'static str {
        match self {
            CommandKind::SelectChannel => TAG_SELECT,
            CommandKind::SetIntensity => TAG_INTENSITY,
        }
    }

    fn from_tag(tag: &str) -> Option<CommandKind> {
        match tag {
            TAG_SELECT => Some(CommandKind::SelectChannel),
            TAG_INTENSITY => Some(CommandKind::SetIntensity),
            _ => None,
        }
    }
}

/// Echo of an accepted command, carrying the value that was actually applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Confirmation {
    pub kind: CommandKind,
    pub value: i64,
}

impl Command {
    fn new(kind: CommandKind, value: i64) -> Command {
        match kind {
            CommandKind::SelectChannel => Command::SelectChannel(value),
            CommandKind::SetIntensity => Command::SetIntensity(value),
        }
    }

    pub fn kind(&self) -> CommandKind {
        match self {
            Command::SelectChannel(_) => CommandKind::SelectChannel,
            Command::SetIntensity(_) => CommandKind::SetIntensity,
        }
    }

    pub fn value(&self) -> i64 {
        match *self {
            Command::SelectChannel(value) | Command::SetIntensity(value) => value,
        }
    }

    /// Render the command the way the control page sends it.
    pub fn to_frame(&self) -> Vec<u8> {
        let frame = serde_json::json!({
            "type": self.kind().tag(),
            "value": self.value(),
        });
        frame.to_string().into_bytes()
    }
}

impl From<Command> for Confirmation {
    fn from(cmd: Command) -> Confirmation {
        Confirmation {
            kind: cmd.kind(),
            value: cmd.value(),
        }
    }
}

pub type DecodeResult<T> = Result<T, DecodeError>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    /// Not a JSON object with exactly a `type` and a `value` field.
    #[error("malformed message")]
    Malformed,
    #[error("unknown command {0:?}")]
    UnknownCommand(String),
    /// The value is not an integer.
    #[error("invalid command value")]
    InvalidValue,
}

/// Parse one inbound frame.
pub fn decode(raw: &[u8]) -> DecodeResult<Command> {
    let object: Map<String, Value> = match serde_json::from_slice(raw) {
        Ok(Value::Object(object)) => object,
        _ => return Err(DecodeError::Malformed),
    };
    if object.len() != 2 {
        return Err(DecodeError::Malformed);
    }

    let tag = match object.get("type") {
        Some(Value::String(tag)) => tag,
        _ => return Err(DecodeError::Malformed),
    };
    let value = object.get("value").ok_or(DecodeError::Malformed)?;

    let kind = CommandKind::from_tag(tag).ok_or_else(|| DecodeError::UnknownCommand(tag.clone()))?;
    Ok(Command::new(kind, parse_value(value)?))
}

/// Values arrive either as JSON integers or as strings holding one.
fn parse_value(value: &Value) -> DecodeResult<i64> {
    match value {
        Value::Number(number) => number.as_i64().ok_or(DecodeError::InvalidValue),
        Value::String(text) => text.trim().parse().map_err(|_| DecodeError::InvalidValue),
        _ => Err(DecodeError::InvalidValue),
    }
}

#[derive(Serialize)]
struct ConfirmationFrame<'a> {
    #[serde(rename = "type")]
    tag: &'a str,
    value: String,
}

/// Render a confirmation frame.
pub fn encode(confirmation: &Confirmation) -> Vec<u8> {
    let frame = ConfirmationFrame {
        tag: confirmation.kind.tag(),
        value: confirmation.value.to_string(),
    };
    // A struct of two strings always serializes.
    serde_json::to_vec(&frame).unwrap_or_default()
}
