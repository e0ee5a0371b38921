//! Responses-request -> Chat-request translation.

use serde_json::{json, Map, Value};

use crate::error::CoreError;
use crate::models::{
    ChatCompletionRequest, ChatMessage, ChatToolDefinition, ChatToolFunction, InputItem,
    ResponsesCreateRequest, ResponsesInput, ToolChoice,
};
use crate::tools::{ToolRegistry, ToolVirtualization};

use super::model_map::ModelMapResolver;

/// The upstream request plus everything the orchestrator needs to persist or
/// to re-translate the eventual response.
pub struct TranslationOutcome {
    pub request: ChatCompletionRequest,
    pub tools: ToolVirtualization,
    /// `prior_transcript` + this turn's translated input, excluding the
    /// `instructions` system message — what gets persisted for a later
    /// `previous_response_id` turn to build on.
    pub messages_used_for_state: Vec<ChatMessage>,
}

/// Translates a `ResponsesCreateRequest` into an upstream `ChatCompletionRequest`.
///
/// `prior_transcript` is the stored message history from `previous_response_id`,
/// if the client supplied one; it is prepended ahead of everything this call
/// translates, including `instructions`.
pub fn translate_request(
    req: &ResponsesCreateRequest,
    registry: &ToolRegistry,
    model_resolver: &ModelMapResolver,
    prior_transcript: Option<&[ChatMessage]>,
    max_tokens_buffer: u32,
) -> Result<TranslationOutcome, CoreError> {
    if let Some(reasoning) = &req.reasoning {
        if !reasoning.is_object() {
            return Err(CoreError::InvalidReasoning);
        }
    }

    let resolved_model = model_resolver.resolve(&req.model)?;

    let mut tools = registry.virtualize_tools(&req.tools)?;

    let mut messages: Vec<ChatMessage> = Vec::new();
    if let Some(history) = prior_transcript {
        messages.extend(history.iter().cloned());
    }

    let mut pending_reasoning: Option<Value> = None;
    let mut saw_call_items = false;

    match &req.input {
        ResponsesInput::Text(text) => {
            let mut m = ChatMessage::new("user");
            m.content = Some(Value::String(text.clone()));
            messages.push(m);
        }
        ResponsesInput::Items(items) => {
            for item in items {
                translate_input_item(
                    item,
                    registry,
                    &mut messages,
                    &mut pending_reasoning,
                    &mut saw_call_items,
                );
            }
        }
    }

    let messages_used_for_state = messages.clone();

    // Instructions become a system message at the very front, ahead of both
    // the prior transcript and this turn's own messages.
    if let Some(instructions) = &req.instructions {
        let mut sys = ChatMessage::new("system");
        sys.content = Some(Value::String(instructions.clone()));
        messages.insert(0, sys);
    }

    // If the transcript references tool calls but the client declared no
    // tools, synthesize permissive declarations so the upstream accepts the
    // transcript, and force tool_choice=none so the model isn't invited to
    // call tools the client never advertised.
    let mut tool_choice_forced_none = false;
    if tools.chat_tools.is_empty() && saw_call_items {
        let inferred = infer_tools_from_messages(&messages);
        if !inferred.is_empty() {
            tools.chat_tools = inferred;
            tool_choice_forced_none = req.tool_choice.is_none();
        }
    }

    let tool_choice = if tool_choice_forced_none {
        Some(json!("none"))
    } else {
        req.tool_choice
            .as_ref()
            .map(|tc| normalize_tool_choice(tc, &mut tools.chat_tools, registry))
    };

    let response_format = req.text.as_ref().and_then(|t| t.format.as_ref()).map(|f| {
        if f.kind == "json_schema" {
            let mut schema_obj = Map::new();
            if let Some(name) = &f.name {
                schema_obj.insert("name".to_string(), Value::String(name.clone()));
            }
            if let Some(strict) = f.strict {
                schema_obj.insert("strict".to_string(), Value::Bool(strict));
            }
            if let Some(schema) = &f.schema {
                schema_obj.insert("schema".to_string(), schema.clone());
            }
            json!({ "type": "json_schema", "json_schema": Value::Object(schema_obj) })
        } else {
            json!({ "type": f.kind })
        }
    });

    let max_tokens = req
        .max_output_tokens
        .map(|budget| budget.saturating_add(max_tokens_buffer));

    let request = ChatCompletionRequest {
        model: resolved_model,
        messages,
        tools: tools.chat_tools.clone(),
        tool_choice,
        parallel_tool_calls: req.parallel_tool_calls,
        max_tokens,
        temperature: req.temperature,
        top_p: req.top_p,
        verbosity: req.verbosity.clone(),
        reasoning: req.reasoning.clone(),
        response_format,
        stream: Some(req.stream),
    };

    Ok(TranslationOutcome {
        request,
        tools,
        messages_used_for_state,
    })
}

fn translate_input_item(
    item: &InputItem,
    registry: &ToolRegistry,
    messages: &mut Vec<ChatMessage>,
    pending_reasoning: &mut Option<Value>,
    saw_call_items: &mut bool,
) {
    if item.kind_str() == "reasoning" {
        let mut obj = Map::new();
        for (k, v) in &item.extra {
            obj.insert(k.clone(), v.clone());
        }
        *pending_reasoning = Some(Value::Object(obj));
        return;
    }

    if item.is_call_output() {
        let mut m = ChatMessage::new("tool");
        m.tool_call_id = item.call_id.clone();
        m.content = Some(match &item.output {
            Some(Value::String(s)) => Value::String(s.clone()),
            Some(other) => Value::String(other.to_string()),
            None => Value::String(String::new()),
        });
        messages.push(m);
        return;
    }

    if item.is_call() {
        *saw_call_items = true;
        let (function_name, arguments) = match item.external_type() {
            Some(external_type) => (
                registry.function_name_for_external(external_type),
                registry.args_from_call_item(item),
            ),
            None => (
                item.name.clone().unwrap_or_default(),
                item.arguments.clone().unwrap_or_default(),
            ),
        };
        let call_id = item
            .call_id
            .clone()
            .unwrap_or_else(|| crate::ids::new_id("call"));
        let tool_call = crate::models::ChatToolCall {
            id: call_id,
            kind: "function".to_string(),
            function: crate::models::ChatToolCallFunction {
                name: function_name,
                arguments,
            },
        };

        let opens_new = match messages.last() {
            Some(last) => last.role != "assistant" || last.tool_calls.is_none(),
            None => true,
        };
        if opens_new {
            let mut m = ChatMessage::new("assistant");
            m.content = None;
            m.tool_calls = Some(vec![tool_call]);
            if let Some(reasoning) = pending_reasoning.take() {
                attach_reasoning(&mut m, reasoning);
            }
            messages.push(m);
        } else if let Some(last) = messages.last_mut() {
            last.tool_calls.get_or_insert_with(Vec::new).push(tool_call);
        }
        return;
    }

    // Plain conversational item: role + content.
    let role = item.role.clone().unwrap_or_else(|| "user".to_string());
    let mut m = ChatMessage::new(role);
    m.content = Some(canonicalize_content(item.content.as_ref()));
    if m.role == "assistant" {
        if let Some(reasoning) = pending_reasoning.take() {
            attach_reasoning(&mut m, reasoning);
        }
    }
    messages.push(m);
}

fn attach_reasoning(message: &mut ChatMessage, reasoning: Value) {
    if let Value::Object(obj) = &reasoning {
        if let Some(Value::String(s)) = obj.get("reasoning") {
            message.reasoning = Some(s.clone());
        }
        if let Some(Value::Array(details)) = obj.get("reasoning_details") {
            message.reasoning_details = Some(details.clone());
        }
    }
}

fn canonicalize_content(content: Option<&Value>) -> Value {
    match content {
        None => Value::String(String::new()),
        Some(Value::String(s)) => Value::String(s.clone()),
        Some(Value::Array(_)) | Some(Value::Object(_)) => {
            Value::String(content.unwrap().to_string())
        }
        Some(other) => Value::String(other.to_string()),
    }
}

/// Builds minimal permissive tool declarations for every distinct function
/// name referenced by tool calls already present in the translated messages.
fn infer_tools_from_messages(messages: &[ChatMessage]) -> Vec<ChatToolDefinition> {
    let mut seen = std::collections::HashSet::new();
    let mut tools = Vec::new();
    for m in messages {
        let Some(calls) = &m.tool_calls else { continue };
        for call in calls {
            if seen.insert(call.function.name.clone()) {
                tools.push(ChatToolDefinition::function(ChatToolFunction {
                    name: call.function.name.clone(),
                    description: None,
                    parameters: Some(json!({
                        "type": "object",
                        "properties": { "payload": { "type": "string" } },
                        "additionalProperties": true,
                    })),
                }));
            }
        }
    }
    tools
}

/// Normalizes a Responses `tool_choice` into the upstream's expected shape,
/// filtering the tool list in place for an `allowed_tools` filter.
///
/// Entries in an `allowed_tools` list name tools the same way `tools` does:
/// a function entry names itself, a built-in entry names itself by external
/// type (e.g. `shell`), which the registry maps to its upstream function name
/// (e.g. `ob_shell`) before it is compared against `chat_tools`.
fn normalize_tool_choice(
    choice: &ToolChoice,
    chat_tools: &mut Vec<ChatToolDefinition>,
    registry: &ToolRegistry,
) -> Value {
    match choice {
        ToolChoice::Mode(mode) => json!(mode),
        ToolChoice::Function(f) => json!({
            "type": "function",
            "function": { "name": f.name },
        }),
        ToolChoice::AllowedTools(allowed) => {
            let allowed_names: std::collections::HashSet<String> = allowed
                .tools
                .iter()
                .map(|t| {
                    if t.is_function() {
                        t.function.as_ref().map(|f| f.name.clone()).unwrap_or_default()
                    } else {
                        registry.function_name_for_external(&t.kind)
                    }
                })
                .collect();
            if !allowed_names.is_empty() {
                chat_tools.retain(|t| allowed_names.contains(&t.function.name));
            }
            json!(allowed.mode)
        }
    }
}
