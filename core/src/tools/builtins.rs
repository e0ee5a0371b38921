//! Default built-in tools: `apply_patch` and `shell`.

use serde_json::json;

use crate::models::{ChatToolDefinition, ChatToolFunction};

/// The canonical definition for the `apply_patch` built-in, registered under
/// the external type `"apply_patch"`.
pub fn apply_patch_tool() -> ChatToolDefinition {
    ChatToolDefinition::function(ChatToolFunction {
        name: "ob_apply_patch".to_string(),
        description: Some("Return a Cursor ApplyPatch patch as a string.".to_string()),
        parameters: Some(json!({
            "type": "object",
            "properties": {
                "patch": {
                    "type": "string",
                    "description": "The full ApplyPatch-formatted patch text.",
                }
            },
            "required": ["patch"],
            "additionalProperties": false,
        })),
    })
}

/// The canonical definition for the `shell` built-in, registered under the
/// external type `"shell"`.
pub fn shell_tool() -> ChatToolDefinition {
    ChatToolDefinition::function(ChatToolFunction {
        name: "ob_shell".to_string(),
        description: Some("Run a shell command.".to_string()),
        parameters: Some(json!({
            "type": "object",
            "properties": {
                "command": { "type": "string" },
                "timeout_ms": { "type": "integer", "minimum": 0 },
                "cwd": { "type": "string" },
            },
            "required": ["command"],
            "additionalProperties": false,
        })),
    })
}

/// The default set of built-ins, keyed by external type name.
pub fn default_builtin_tools() -> Vec<(&'static str, ChatToolDefinition)> {
    vec![("apply_patch", apply_patch_tool()), ("shell", shell_tool())]
}
