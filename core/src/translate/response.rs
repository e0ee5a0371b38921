//! Chat-response -> Responses-response translation.

use serde_json::{json, Map, Value};

use crate::ids::new_id;
use crate::models::{ChatCompletionResponse, ResponseOutputItem, ResponsesCreateResponse};
use crate::tools::ToolVirtualization;

/// Translates a non-streaming upstream chat response into a `ResponsesCreateResponse`.
pub fn chat_response_to_responses(
    chat_response: &ChatCompletionResponse,
    model: &str,
    tools: &ToolVirtualization,
    response_id: String,
    created_at: i64,
) -> ResponsesCreateResponse {
    let mut output = Vec::new();

    let message = chat_response.choices.first().and_then(|c| c.message.as_ref());

    if let Some(message) = message {
        if let Some(item) = maybe_reasoning_to_output_item(message) {
            output.push(item);
        }
        if let Some(calls) = &message.tool_calls {
            for call in calls {
                output.push(tool_call_to_output_item(call, tools));
            }
        }
        let text = message.content_as_text();
        if !text.is_empty() {
            output.push(ResponseOutputItem::message_text(new_id("item"), text));
        }
    }

    ResponsesCreateResponse {
        id: response_id,
        object: "response".to_string(),
        created_at,
        model: model.to_string(),
        output,
        usage: chat_response.usage.clone(),
        metadata: None,
    }
}

fn maybe_reasoning_to_output_item(
    message: &crate::models::ChatMessage,
) -> Option<ResponseOutputItem> {
    let mut extra = Map::new();

    if let Some(reasoning) = &message.reasoning {
        if !reasoning.is_empty() {
            extra.insert(
                "openrouter_reasoning".to_string(),
                Value::String(reasoning.clone()),
            );
        }
    }

    if let Some(details) = &message.reasoning_details {
        let valid: Vec<Value> = details
            .iter()
            .filter(|d| d.is_object())
            .cloned()
            .collect();
        if !valid.is_empty() {
            let summary: Vec<Value> = valid
                .iter()
                .filter_map(|d| {
                    let obj = d.as_object()?;
                    if obj.get("type").and_then(Value::as_str) != Some("reasoning.summary") {
                        return None;
                    }
                    let text = obj.get("summary").and_then(Value::as_str)?;
                    if text.is_empty() {
                        return None;
                    }
                    Some(json!({ "type": "summary_text", "text": text }))
                })
                .collect();
            extra.insert(
                "openrouter_reasoning_details".to_string(),
                Value::Array(valid),
            );
            if !summary.is_empty() {
                extra.insert("summary".to_string(), Value::Array(summary));
            }
        }
    }

    if extra.is_empty() {
        return None;
    }

    Some(ResponseOutputItem {
        id: new_id("item"),
        kind: "reasoning".to_string(),
        role: None,
        content: None,
        call_id: None,
        name: None,
        arguments: None,
        extra,
    })
}

fn tool_call_to_output_item(
    call: &crate::models::ChatToolCall,
    tools: &ToolVirtualization,
) -> ResponseOutputItem {
    let (kind, name) = match tools.function_name_map.get(&call.function.name) {
        Some(external_type) => (format!("{external_type}_call"), external_type.clone()),
        None => ("function_call".to_string(), call.function.name.clone()),
    };
    ResponseOutputItem {
        id: new_id("item"),
        kind,
        role: None,
        content: None,
        call_id: Some(call.id.clone()),
        name: Some(name),
        arguments: Some(call.function.arguments.clone()),
        extra: Map::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChatCompletionChoice, ChatMessage, ChatToolCall, ChatToolCallFunction};

    #[test]
    fn text_only_message_becomes_single_output_item() {
        let mut message = ChatMessage::new("assistant");
        message.content = Some(Value::String("hello".to_string()));
        let chat = ChatCompletionResponse {
            id: None,
            object: None,
            created: None,
            model: None,
            choices: vec![ChatCompletionChoice {
                index: Some(0),
                message: Some(message),
                delta: None,
                finish_reason: Some("stop".to_string()),
            }],
            usage: None,
        };
        let tools = ToolVirtualization::default();
        let resp = chat_response_to_responses(&chat, "m", &tools, "resp_1".into(), 0);
        assert_eq!(resp.output.len(), 1);
        assert_eq!(resp.output[0].kind, "message");
    }

    #[test]
    fn virtualized_tool_call_gets_retyped() {
        let mut message = ChatMessage::new("assistant");
        message.tool_calls = Some(vec![ChatToolCall {
            id: "call_1".to_string(),
            kind: "function".to_string(),
            function: ChatToolCallFunction {
                name: "ob_apply_patch".to_string(),
                arguments: "{}".to_string(),
            },
        }]);
        let chat = ChatCompletionResponse {
            id: None,
            object: None,
            created: None,
            model: None,
            choices: vec![ChatCompletionChoice {
                index: Some(0),
                message: Some(message),
                delta: None,
                finish_reason: Some("tool_calls".to_string()),
            }],
            usage: None,
        };
        let mut tools = ToolVirtualization::default();
        tools
            .function_name_map
            .insert("ob_apply_patch".to_string(), "apply_patch".to_string());
        let resp = chat_response_to_responses(&chat, "m", &tools, "resp_1".into(), 0);
        assert_eq!(resp.output.len(), 1);
        assert_eq!(resp.output[0].kind, "apply_patch_call");
        assert_eq!(resp.output[0].call_id.as_deref(), Some("call_1"));
    }
}
