//! Tool-calling types.
//!
//! A [`ToolSpec`] describes a capability offered to the model; a [`ToolCall`]
//! is the model's request to invoke one. Argument validation is left to the
//! caller, which knows the closed set of tools it offered.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// A callable capability advertised to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    /// Function name the model uses to call the tool
    pub name: String,

    /// When the model should use this tool
    pub description: String,

    /// JSON Schema of the arguments object
    pub parameters: Value,
}

impl ToolSpec {
    pub fn new(name: impl Into<String>, description: impl Into<String>, parameters: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }

    /// A tool taking exactly one required string argument.
    pub fn with_string_arg(
        name: impl Into<String>,
        description: impl Into<String>,
        arg: &str,
        arg_description: &str,
    ) -> Self {
        Self::new(
            name,
            description,
            json!({
                "type": "object",
                "properties": {
                    arg: { "type": "string", "description": arg_description }
                },
                "required": [arg]
            }),
        )
    }

    /// Wire format shared by Ollama and OpenAI-compatible APIs.
    pub fn to_function_json(&self) -> Value {
        json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": self.parameters,
            }
        })
    }
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Provider-assigned call id, when the provider issues one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Name of the requested tool
    pub name: String,

    /// Arguments as sent by the model. Providers that encode arguments as a
    /// JSON string are decoded; undecodable strings are kept as `Value::String`.
    #[serde(default)]
    pub arguments: Value,
}

impl ToolCall {
    pub fn new(name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: None,
            name: name.into(),
            arguments,
        }
    }

    /// Build a call from an arguments string, as OpenAI-style APIs send it.
    pub fn from_encoded(id: Option<String>, name: impl Into<String>, raw: &str) -> Self {
        let arguments = if raw.trim().is_empty() {
            json!({})
        } else {
            serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
        };

        Self {
            id,
            name: name.into(),
            arguments,
        }
    }

    /// Read a string argument, if present and a string.
    pub fn str_arg(&self, key: &str) -> Option<&str> {
        self.arguments.get(key).and_then(Value::as_str)
    }
}
