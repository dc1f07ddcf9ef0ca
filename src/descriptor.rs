//! Error descriptors and their reconstruction on the host side.
//!
//! The page can only hand plain JSON back to the host, so a thrown error is
//! flattened into an [`ErrorDescriptor`] before it crosses and rebuilt into a
//! [`SandboxError`] after. The six identity fields carry whatever JSON value
//! the page read off the error, untyped: a `name` of `42` or a `stack` of
//! `null` comes back as exactly that. A field the page never set stays
//! `None`, which is distinct from `Some(Value::Null)`.
//!
//! Values JSON cannot represent are coerced in the page before they cross:
//! `NaN` and the infinities become `null`; functions, symbols, BigInts and
//! cyclic objects become their `String(...)` form.

use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Keeps an explicit `null` as `Some(Value::Null)`; only a missing key is `None`.
fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

/// Wire form of an error thrown inside the page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorDescriptor {
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub name: Option<Value>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub message: Option<Value>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub stack: Option<Value>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub line_number: Option<Value>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub column_number: Option<Value>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub file_name: Option<Value>,
}

/// Host-side reconstruction of an error thrown by the sandboxed function.
///
/// The fields hold exactly what was transmitted. The accessors give typed
/// views for the common case where the page sent strings and integers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxError {
    pub name: Option<Value>,
    pub message: Option<Value>,
    pub stack: Option<Value>,
    pub line_number: Option<Value>,
    pub column_number: Option<Value>,
    pub file_name: Option<Value>,
}

impl SandboxError {
    /// Returns the descriptor this error was built from.
    pub fn descriptor(&self) -> ErrorDescriptor {
        ErrorDescriptor {
            name: self.name.clone(),
            message: self.message.clone(),
            stack: self.stack.clone(),
            line_number: self.line_number.clone(),
            column_number: self.column_number.clone(),
            file_name: self.file_name.clone(),
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_ref().and_then(Value::as_str)
    }

    /// The message as text: empty when absent, JSON text when not a string.
    pub fn message(&self) -> Cow<'_, str> {
        self.message.as_ref().map(text).unwrap_or_default()
    }

    pub fn stack(&self) -> Option<&str> {
        self.stack.as_ref().and_then(Value::as_str)
    }

    pub fn line_number(&self) -> Option<u64> {
        self.line_number.as_ref().and_then(Value::as_u64)
    }

    pub fn column_number(&self) -> Option<u64> {
        self.column_number.as_ref().and_then(Value::as_u64)
    }

    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_ref().and_then(Value::as_str)
    }
}

fn text(value: &Value) -> Cow<'_, str> {
    match value {
        Value::String(s) => Cow::Borrowed(s.as_str()),
        other => Cow::Owned(other.to_string()),
    }
}

impl From<ErrorDescriptor> for SandboxError {
    fn from(descriptor: ErrorDescriptor) -> Self {
        Self {
            name: descriptor.name,
            message: descriptor.message,
            stack: descriptor.stack,
            line_number: descriptor.line_number,
            column_number: descriptor.column_number,
            file_name: descriptor.file_name,
        }
    }
}

impl fmt::Display for SandboxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = self.message();
        match self.name.as_ref().map(text) {
            Some(name) if !name.is_empty() => write!(f, "{name}: {message}"),
            _ => f.write_str(&message),
        }
    }
}

impl std::error::Error for SandboxError {}
