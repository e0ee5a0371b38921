//! DTOs for the client-facing Responses API shape.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponsesToolFunction {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Value>,
}

/// A tool declaration: either `{type: "function", function: {...}}` or a
/// built-in reference `{type: "<external-type>"}` (e.g. `apply_patch`, `shell`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponsesTool {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function: Option<ResponsesToolFunction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ResponsesTool {
    pub fn is_function(&self) -> bool {
        self.kind == "function"
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolChoiceFunction {
    #[serde(rename = "type")]
    pub kind: String, // "function"
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolChoiceAllowedTools {
    #[serde(rename = "type")]
    pub kind: String, // "allowed_tools"
    pub mode: String, // "auto" | "none" | "required"
    pub tools: Vec<ResponsesTool>,
}

/// `tool_choice` may be a bare mode string, a function pin, or an allowed-tools filter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolChoice {
    Mode(String),
    Function(ToolChoiceFunction),
    AllowedTools(ToolChoiceAllowedTools),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseTextFormat {
    #[serde(rename = "type")]
    pub kind: String, // "json_schema" | "json_object"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strict: Option<bool>,
    #[serde(default, rename = "schema", skip_serializing_if = "Option::is_none")]
    pub schema: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ResponseTextConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<ResponseTextFormat>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One item of a Responses `input` list. Fields are a superset across all
/// variants; `kind` (`type`) dispatches which fields are meaningful. Unknown
/// built-in call/call-output types are recognized structurally by their
/// `_call` / `_call_output` suffix rather than an exhaustive enum, so new
/// built-ins need no core change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputItem {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl InputItem {
    pub fn kind_str(&self) -> &str {
        self.kind.as_deref().unwrap_or("")
    }

    pub fn is_call(&self) -> bool {
        self.kind_str() == "function_call" || self.kind_str().ends_with("_call")
    }

    pub fn is_call_output(&self) -> bool {
        self.kind_str() == "function_call_output" || self.kind_str().ends_with("_call_output")
    }

    /// For a `_call`/`_call_output` item, the external built-in type name
    /// (`None` for plain `function_call`/`function_call_output`).
    pub fn external_type(&self) -> Option<&str> {
        let k = self.kind_str();
        if let Some(stripped) = k.strip_suffix("_call_output") {
            if stripped != "function" {
                return Some(stripped);
            }
        } else if let Some(stripped) = k.strip_suffix("_call") {
            if stripped != "function" {
                return Some(stripped);
            }
        }
        None
    }
}

/// Either a bare string or an ordered list of input items.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponsesInput {
    Text(String),
    Items(Vec<InputItem>),
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResponsesCreateRequest {
    pub model: String,
    pub input: ResponsesInput,
    #[serde(default)]
    pub instructions: Option<String>,
    #[serde(default)]
    pub tools: Vec<ResponsesTool>,
    #[serde(default)]
    pub tool_choice: Option<ToolChoice>,
    #[serde(default)]
    pub parallel_tool_calls: Option<bool>,
    #[serde(default)]
    pub max_output_tokens: Option<u32>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub top_p: Option<f64>,
    #[serde(default)]
    pub verbosity: Option<String>,
    #[serde(default)]
    pub text: Option<ResponseTextConfig>,
    #[serde(default)]
    pub stream: bool,
    #[serde(default)]
    pub previous_response_id: Option<String>,
    #[serde(default)]
    pub store: Option<bool>,
    #[serde(default)]
    pub metadata: Option<Value>,
    #[serde(default)]
    pub reasoning: Option<Value>,
}

impl ResponsesCreateRequest {
    pub fn wants_store(&self) -> bool {
        self.store.unwrap_or(true)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseOutputText {
    #[serde(rename = "type")]
    pub kind: String, // "output_text"
    pub text: String,
}

impl ResponseOutputText {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            kind: "output_text".to_string(),
            text: text.into(),
        }
    }
}

/// One item of a Responses `output` list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseOutputItem {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Vec<ResponseOutputText>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ResponseOutputItem {
    pub fn message_text(id: String, text: String) -> Self {
        Self {
            id,
            kind: "message".to_string(),
            role: Some("assistant".to_string()),
            content: Some(vec![ResponseOutputText::new(text)]),
            call_id: None,
            name: None,
            arguments: None,
            extra: Map::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponsesCreateResponse {
    pub id: String,
    pub object: String, // "response"
    pub created_at: i64,
    pub model: String,
    pub output: Vec<ResponseOutputItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl ResponsesCreateResponse {
    pub fn empty(id: String, created_at: i64, model: String) -> Self {
        Self {
            id,
            object: "response".to_string(),
            created_at,
            model,
            output: Vec::new(),
            usage: None,
            metadata: None,
        }
    }
}
