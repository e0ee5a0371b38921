//! Tool virtualization: maps Responses-API built-in tool references onto
//! upstream function tools, and back again once the upstream answers.

pub mod builtins;

use std::collections::HashMap;

use serde_json::{json, Map, Value};

use crate::error::CoreError;
use crate::models::{ChatToolDefinition, ChatToolFunction, InputItem, ResponsesTool};

/// Reserved prefix for function names the registry mints on behalf of a
/// built-in or an otherwise-unrecognized external tool type. User-declared
/// function tools may not use it.
pub const RESERVED_PREFIX: &str = "ob_";

/// Process-wide, read-only catalogue of built-in tool definitions.
pub struct ToolRegistry {
    builtins: HashMap<&'static str, ChatToolDefinition>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            builtins: HashMap::new(),
        }
    }

    /// The registry pre-populated with the shipped built-ins.
    pub fn default_registry() -> Self {
        let mut reg = Self::new();
        for (external_type, def) in builtins::default_builtin_tools() {
            reg.register_builtin(external_type, def);
        }
        reg
    }

    pub fn register_builtin(&mut self, external_type: &'static str, def: ChatToolDefinition) {
        self.builtins.insert(external_type, def);
    }

    /// The upstream function name for a given external (built-in) type.
    /// Registered built-ins use their canonical name; anything else gets a
    /// deterministic reserved-prefixed name so it can still round-trip.
    pub fn function_name_for_external(&self, external_type: &str) -> String {
        match self.builtins.get(external_type) {
            Some(def) => def.function.name.clone(),
            None => format!("{RESERVED_PREFIX}{external_type}"),
        }
    }

    /// The tool definition to advertise upstream for a given external type.
    /// Unregistered built-ins fall back to a permissive `{payload: string}` schema.
    pub fn tool_definition_for_external(&self, external_type: &str) -> ChatToolDefinition {
        if let Some(def) = self.builtins.get(external_type) {
            return def.clone();
        }
        ChatToolDefinition::function(ChatToolFunction {
            name: self.function_name_for_external(external_type),
            description: None,
            parameters: Some(json!({
                "type": "object",
                "properties": { "payload": { "type": "string" } },
                "required": ["payload"],
                "additionalProperties": false,
            })),
        })
    }

    /// Walks a declared tool list once, producing the upstream tool list plus
    /// both directions of the function-name ↔ external-type map.
    pub fn virtualize_tools(
        &self,
        tools: &[ResponsesTool],
    ) -> Result<ToolVirtualization, CoreError> {
        let mut chat_tools = Vec::with_capacity(tools.len());
        let mut function_name_map = HashMap::new();
        let mut external_name_map = HashMap::new();
        let mut seen_names: HashMap<String, ()> = HashMap::new();

        for tool in tools {
            if tool.is_function() {
                let Some(func) = &tool.function else { continue };
                if func.name.starts_with(RESERVED_PREFIX) {
                    return Err(CoreError::ReservedToolPrefix(func.name.clone()));
                }
                if seen_names.insert(func.name.clone(), ()).is_some() {
                    return Err(CoreError::DuplicateToolName(func.name.clone()));
                }
                chat_tools.push(ChatToolDefinition::function(func.clone()));
            } else {
                let external_type = tool.kind.clone();
                let function_name = self.function_name_for_external(&external_type);
                if seen_names.insert(function_name.clone(), ()).is_some() {
                    return Err(CoreError::DuplicateToolName(function_name));
                }
                chat_tools.push(self.tool_definition_for_external(&external_type));
                function_name_map.insert(function_name.clone(), external_type.clone());
                external_name_map.insert(external_type, function_name);
            }
        }

        Ok(ToolVirtualization {
            chat_tools,
            function_name_map,
            external_name_map,
        })
    }

    /// Builds the upstream function-call arguments string for a built-in call
    /// item. If the item already carries a JSON-string `arguments` field, it
    /// is returned verbatim; otherwise the non-framing fields of the item are
    /// re-serialized as the arguments object.
    pub fn args_from_call_item(&self, item: &InputItem) -> String {
        if let Some(args) = &item.arguments {
            if serde_json::from_str::<Value>(args).is_ok() {
                return args.clone();
            }
        }
        let mut obj = Map::new();
        if let Some(role) = &item.role {
            obj.insert("role".to_string(), Value::String(role.clone()));
        }
        if let Some(content) = &item.content {
            obj.insert("content".to_string(), content.clone());
        }
        if let Some(name) = &item.name {
            obj.insert("name".to_string(), Value::String(name.clone()));
        }
        if let Some(args) = &item.arguments {
            obj.insert("arguments".to_string(), Value::String(args.clone()));
        }
        if let Some(output) = &item.output {
            obj.insert("output".to_string(), output.clone());
        }
        for (k, v) in &item.extra {
            if k == "type" || k == "id" || k == "call_id" {
                continue;
            }
            obj.insert(k.clone(), v.clone());
        }
        serde_json::to_string(&Value::Object(obj)).unwrap_or_default()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::default_registry()
    }
}

/// The per-request outcome of virtualizing a declared tool list.
#[derive(Debug, Clone, Default)]
pub struct ToolVirtualization {
    pub chat_tools: Vec<ChatToolDefinition>,
    /// upstream function name -> external (built-in) type
    pub function_name_map: HashMap<String, String>,
    /// external (built-in) type -> upstream function name
    pub external_name_map: HashMap<String, String>,
}
