//! Invocation request and result types.

use serde::{Deserialize, Serialize};

/// A chat member as seen by the sandbox: either the author of the triggering
/// message or the author of the script.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Identity {
    pub id: u64,
    /// Account name.
    pub name: String,
    /// Per-guild nickname, empty when unset.
    pub nick: String,
    /// Resolved presentation name.
    pub display_name: String,
    pub avatar_url: String,
    /// Role color, string-encoded as delivered by the platform.
    pub color: String,
    pub discriminator: u32,
    pub roles: Vec<u64>,
    /// Permission bitmask.
    pub permissions: u64,
}

/// The message whose content matched the trigger.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TriggerMessage {
    pub id: u64,
    pub content: String,
    /// Content with mentions resolved to plain names.
    pub clean: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Channel {
    pub id: u64,
    pub name: String,
}

/// Everything one script invocation needs. Immutable once constructed.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct InvocationRequest {
    /// Raw script source, appended after the generated bindings.
    pub script: String,
    pub trigger_message: TriggerMessage,
    pub message_author: Identity,
    pub script_author: Identity,
    pub channel: Channel,
    pub guild_id: u64,
    /// Caller-owned counter exposed to the script as `count`.
    pub count: i64,
    /// Regex capture groups from the trigger, in order.
    pub captures: Vec<String>,
    /// Free-form arguments, in order.
    pub arguments: Vec<String>,
}

/// Wire-level error code for an invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Success,
    InvalidRequest,
    RuntimeError,
    Timeout,
}

impl ErrorCode {
    /// Numeric value carried in the response.
    pub fn as_u32(self) -> u32 {
        match self {
            ErrorCode::Success => 0,
            ErrorCode::InvalidRequest => 3,
            ErrorCode::RuntimeError => 4,
            ErrorCode::Timeout => 5,
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCode::Success => write!(f, "success"),
            ErrorCode::InvalidRequest => write!(f, "invalid_request"),
            ErrorCode::RuntimeError => write!(f, "runtime_error"),
            ErrorCode::Timeout => write!(f, "timeout"),
        }
    }
}

/// What the caller gets back for every invocation, success or not.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InvocationResult {
    /// Printed lines joined by `\n`, kept even when the script failed.
    pub output: String,
    /// Empty on success.
    pub error: String,
    pub code: ErrorCode,
}

impl InvocationResult {
    pub fn success(output: String) -> Self {
        Self {
            output,
            error: String::new(),
            code: ErrorCode::Success,
        }
    }

    pub fn runtime_error(output: String, error: String) -> Self {
        Self {
            output,
            error,
            code: ErrorCode::RuntimeError,
        }
    }

    pub fn timeout(output: String) -> Self {
        Self {
            output,
            error: "Script timed out".to_string(),
            code: ErrorCode::Timeout,
        }
    }

    pub fn invalid_request(error: impl std::fmt::Display) -> Self {
        Self {
            output: String::new(),
            error: error.to_string(),
            code: ErrorCode::InvalidRequest,
        }
    }

    /// Returns `true` when the code is `Success`.
    pub fn is_success(&self) -> bool {
        self.code == ErrorCode::Success
    }
}
