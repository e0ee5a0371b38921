//! The streaming state machine: turns a sequence of
//! upstream chat-completion chunks into the typed Responses event sequence,
//! buffering tool-call argument deltas until both `call_id` and `name` are
//! known for that call (providers split them across separate chunks).

use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::ids::new_id;
use crate::models::{
    ChatCompletionChunk, ChatMessage, ChatToolCall, ChatToolCallDelta, ChatToolCallFunction,
    ResponseCompletedEvent, ResponseFailedEvent, ResponseFunctionCallArgumentsDeltaEvent,
    ResponseFunctionCallArgumentsDoneEvent, ResponseOutputItem, ResponseOutputItemAddedEvent,
    ResponseOutputItemDoneEvent, ResponseOutputTextDeltaEvent, ResponseOutputTextDoneEvent,
    ResponseStreamEvent, ResponsesCreateResponse,
};
use crate::tools::ToolVirtualization;

/// Per-call accumulator, keyed by the provider's `tool_calls[].index`.
#[derive(Debug, Default)]
struct ToolCallState {
    call_id: Option<String>,
    name: Option<String>,
    arguments: String,
    /// Set once the call has an output item (i.e. both `call_id` and `name`
    /// are known). Before that, argument deltas are buffered.
    output_index: Option<usize>,
    external_type: Option<String>,
    pending_argument_deltas: Vec<String>,
}

/// Translates one response's worth of upstream stream chunks into Responses
/// events, and accumulates enough state to reconstruct the final response and
/// the synthetic assistant turn for transcript persistence.
pub struct ResponsesStreamTranslator {
    response_id: String,
    model: String,
    created_at: i64,
    tools: ToolVirtualization,
    output_items: Vec<ResponseOutputItem>,
    text_output_index: Option<usize>,
    text_content: String,
    tool_calls: HashMap<usize, ToolCallState>,
}

impl ResponsesStreamTranslator {
    pub fn new(response_id: String, model: String, created_at: i64, tools: ToolVirtualization) -> Self {
        Self {
            response_id,
            model,
            created_at,
            tools,
            output_items: Vec::new(),
            text_output_index: None,
            text_content: String::new(),
            tool_calls: HashMap::new(),
        }
    }

    /// The event(s) that must precede anything else sent to the client.
    pub fn start_events(&self) -> Vec<ResponseStreamEvent> {
        vec![ResponseStreamEvent::Created(crate::models::ResponseCreatedEvent {
            response: self.build_response(),
        })]
    }

    pub fn process_chunk(&mut self, chunk: &ChatCompletionChunk) -> Vec<ResponseStreamEvent> {
        let mut events = Vec::new();
        for choice in &chunk.choices {
            let delta = &choice.delta;
            if let Some(content) = &delta.content {
                events.extend(self.handle_text_delta(content));
            }
            if let Some(tool_calls) = &delta.tool_calls {
                if !tool_calls.is_empty() {
                    events.extend(self.handle_tool_call_deltas(tool_calls));
                }
            }
        }
        events
    }

    fn handle_text_delta(&mut self, delta: &str) -> Vec<ResponseStreamEvent> {
        let mut events = Vec::new();
        if self.text_output_index.is_none() {
            let item = ResponseOutputItem::message_text(new_id("item"), String::new());
            let output_index = self.output_items.len();
            self.text_output_index = Some(output_index);
            self.output_items.push(item.clone());
            events.push(ResponseStreamEvent::OutputItemAdded(ResponseOutputItemAddedEvent {
                output_index,
                item: serde_json::to_value(&item).expect("output item is serializable"),
            }));
        }
        self.text_content.push_str(delta);
        let idx = self.text_output_index.expect("set above");
        if let Some(content) = self.output_items[idx].content.as_mut().and_then(|c| c.first_mut()) {
            content.text = self.text_content.clone();
        }
        events.push(ResponseStreamEvent::OutputTextDelta(ResponseOutputTextDeltaEvent {
            output_index: idx,
            content_index: 0,
            delta: delta.to_string(),
        }));
        events
    }

    fn handle_tool_call_deltas(&mut self, deltas: &[ChatToolCallDelta]) -> Vec<ResponseStreamEvent> {
        let mut events = Vec::new();
        for delta in deltas {
            let state = self.tool_calls.entry(delta.index).or_default();
            if let Some(id) = &delta.id {
                if state.call_id.is_none() {
                    state.call_id = Some(id.clone());
                }
            }
            if let Some(function) = &delta.function {
                if let Some(name) = &function.name {
                    if state.name.is_none() {
                        state.name = Some(name.clone());
                        state.external_type = self.tools.function_name_map.get(name).cloned();
                    }
                }
                if let Some(args) = &function.arguments {
                    state.arguments.push_str(args);
                    if let Some(output_index) = state.output_index {
                        if let Some(item) = self.output_items.get_mut(output_index) {
                            item.arguments = Some(state.arguments.clone());
                        }
                        events.push(ResponseStreamEvent::FunctionCallArgumentsDelta(
                            ResponseFunctionCallArgumentsDeltaEvent {
                                output_index,
                                delta: args.clone(),
                            },
                        ));
                    } else {
                        state.pending_argument_deltas.push(args.clone());
                    }
                }
            }
            events.extend(self.maybe_emit_tool_call_item_added(delta.index));
        }
        events
    }

    /// Emits `output_item.added` for a tool call the first time both
    /// `call_id` and `name` are known, then flushes any argument deltas that
    /// arrived before that point.
    fn maybe_emit_tool_call_item_added(&mut self, index: usize) -> Vec<ResponseStreamEvent> {
        let mut events = Vec::new();

        let (call_id, name, external_type, already_emitted) = {
            let state = self.tool_calls.get(&index).expect("entry created by caller");
            (
                state.call_id.clone(),
                state.name.clone(),
                state.external_type.clone(),
                state.output_index.is_some(),
            )
        };
        if already_emitted {
            return events;
        }
        let (Some(call_id), Some(name)) = (call_id, name) else {
            return events;
        };

        let item_type = external_type
            .as_deref()
            .map(|t| format!("{t}_call"))
            .unwrap_or_else(|| "function_call".to_string());
        let item_name = external_type.unwrap_or(name);
        let output_index = self.output_items.len();
        let item = ResponseOutputItem {
            id: new_id("item"),
            kind: item_type,
            role: None,
            content: None,
            call_id: Some(call_id),
            name: Some(item_name),
            arguments: Some(String::new()),
            extra: Map::new(),
        };
        self.output_items.push(item.clone());

        let pending = {
            let state = self.tool_calls.get_mut(&index).expect("entry exists");
            state.output_index = Some(output_index);
            std::mem::take(&mut state.pending_argument_deltas)
        };

        events.push(ResponseStreamEvent::OutputItemAdded(ResponseOutputItemAddedEvent {
            output_index,
            item: serde_json::to_value(&item).expect("output item is serializable"),
        }));

        for delta in pending {
            events.push(ResponseStreamEvent::FunctionCallArgumentsDelta(
                ResponseFunctionCallArgumentsDeltaEvent {
                    output_index,
                    delta,
                },
            ));
        }
        let full_arguments = self
            .tool_calls
            .get(&index)
            .expect("entry exists")
            .arguments
            .clone();
        if let Some(item) = self.output_items.get_mut(output_index) {
            item.arguments = Some(full_arguments);
        }

        events
    }

    /// Events emitted once the upstream stream ends cleanly: closes any open
    /// text/tool-call output items in ascending `output_index` order, then
    /// `response.completed`.
    pub fn finish_events(&mut self) -> Vec<ResponseStreamEvent> {
        let mut events = Vec::new();

        if let Some(idx) = self.text_output_index {
            events.push(ResponseStreamEvent::OutputTextDone(ResponseOutputTextDoneEvent {
                output_index: idx,
                content_index: 0,
                text: self.text_content.clone(),
            }));
            if let Some(item) = self.output_items.get(idx) {
                events.push(ResponseStreamEvent::OutputItemDone(ResponseOutputItemDoneEvent {
                    output_index: idx,
                    item: serde_json::to_value(item).expect("output item is serializable"),
                }));
            }
        }

        let mut emitted: Vec<(usize, String)> = self
            .tool_calls
            .values()
            .filter_map(|s| s.output_index.map(|oi| (oi, s.arguments.clone())))
            .collect();
        emitted.sort_by_key(|(oi, _)| *oi);
        for (output_index, arguments) in emitted {
            events.push(ResponseStreamEvent::FunctionCallArgumentsDone(
                ResponseFunctionCallArgumentsDoneEvent {
                    output_index,
                    arguments,
                },
            ));
            if let Some(item) = self.output_items.get(output_index) {
                events.push(ResponseStreamEvent::OutputItemDone(ResponseOutputItemDoneEvent {
                    output_index,
                    item: serde_json::to_value(item).expect("output item is serializable"),
                }));
            }
        }

        events.push(ResponseStreamEvent::Completed(ResponseCompletedEvent {
            response: self.build_response(),
        }));
        events
    }

    pub fn failure_event(&self, error: Value) -> ResponseStreamEvent {
        ResponseStreamEvent::Failed(ResponseFailedEvent {
            response: self.build_response(),
            error,
        })
    }

    /// The synthetic assistant turn to append to the persisted transcript, if
    /// this response produced any text or tool calls.
    pub fn assistant_message(&self) -> Option<ChatMessage> {
        let mut calls: Vec<(usize, ChatToolCall)> = Vec::new();
        for state in self.tool_calls.values() {
            let (Some(call_id), Some(name)) = (&state.call_id, &state.name) else {
                continue;
            };
            let key = state.output_index.unwrap_or(usize::MAX);
            calls.push((
                key,
                ChatToolCall {
                    id: call_id.clone(),
                    kind: "function".to_string(),
                    function: ChatToolCallFunction {
                        name: name.clone(),
                        arguments: state.arguments.clone(),
                    },
                },
            ));
        }
        calls.sort_by_key(|(key, _)| *key);
        let tool_calls: Vec<ChatToolCall> = calls.into_iter().map(|(_, c)| c).collect();

        let content = (!self.text_content.is_empty()).then(|| Value::String(self.text_content.clone()));
        if content.is_none() && tool_calls.is_empty() {
            return None;
        }

        let mut message = ChatMessage::new("assistant");
        message.content = content;
        message.tool_calls = (!tool_calls.is_empty()).then_some(tool_calls);
        Some(message)
    }

    pub fn final_response(&self) -> ResponsesCreateResponse {
        self.build_response()
    }

    fn build_response(&self) -> ResponsesCreateResponse {
        ResponsesCreateResponse {
            id: self.response_id.clone(),
            object: "response".to_string(),
            created_at: self.created_at,
            model: self.model.clone(),
            output: self.output_items.clone(),
            usage: None,
            metadata: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChatCompletionChunkChoice, ChatCompletionDelta, ChatToolCallFunctionDelta};

    fn text_chunk(text: &str) -> ChatCompletionChunk {
        ChatCompletionChunk {
            id: None,
            choices: vec![ChatCompletionChunkChoice {
                index: Some(0),
                delta: ChatCompletionDelta {
                    role: None,
                    content: Some(text.to_string()),
                    tool_calls: None,
                },
                finish_reason: None,
            }],
        }
    }

    fn tool_call_chunk(index: usize, id: Option<&str>, name: Option<&str>, args: Option<&str>) -> ChatCompletionChunk {
        ChatCompletionChunk {
            id: None,
            choices: vec![ChatCompletionChunkChoice {
                index: Some(0),
                delta: ChatCompletionDelta {
                    role: None,
                    content: None,
                    tool_calls: Some(vec![ChatToolCallDelta {
                        index,
                        id: id.map(str::to_string),
                        function: Some(ChatToolCallFunctionDelta {
                            name: name.map(str::to_string),
                            arguments: args.map(str::to_string),
                        }),
                    }]),
                },
                finish_reason: None,
            }],
        }
    }

    #[test]
    fn text_delta_opens_item_once_and_accumulates() {
        let mut t = ResponsesStreamTranslator::new("resp_1".into(), "m".into(), 0, ToolVirtualization::default());
        let ev1 = t.process_chunk(&text_chunk("Hel"));
        let ev2 = t.process_chunk(&text_chunk("lo"));
        assert_eq!(ev1.len(), 2); // output_item.added + output_text.delta
        assert_eq!(ev2.len(), 1); // output_text.delta only
        assert_eq!(t.text_content, "Hello");
    }

    #[test]
    fn tool_call_identity_deferred_until_name_and_call_id_known() {
        let mut t = ResponsesStreamTranslator::new("resp_1".into(), "m".into(), 0, ToolVirtualization::default());
        // id arrives first, no name yet: no item opened.
        let ev1 = t.process_chunk(&tool_call_chunk(0, Some("call_1"), None, Some("{\"a\":")));
        assert!(ev1.is_empty());
        // name arrives: item opens, buffered delta flushes.
        let ev2 = t.process_chunk(&tool_call_chunk(0, None, Some("get_weather"), Some("1}")));
        assert_eq!(ev2.len(), 2); // output_item.added + flushed arguments.delta
        assert!(matches!(ev2[0], ResponseStreamEvent::OutputItemAdded(_)));
        assert!(matches!(ev2[1], ResponseStreamEvent::FunctionCallArgumentsDelta(_)));
    }

    #[test]
    fn finish_events_close_items_in_output_order_then_complete() {
        let mut t = ResponsesStreamTranslator::new("resp_1".into(), "m".into(), 0, ToolVirtualization::default());
        t.process_chunk(&text_chunk("hi"));
        t.process_chunk(&tool_call_chunk(0, Some("call_1"), Some("fn"), Some("{}")));
        let events = t.finish_events();
        let names: Vec<&str> = events.iter().map(|e| e.name()).collect();
        assert_eq!(
            names,
            vec![
                "response.output_text.done",
                "response.output_item.done",
                "response.function_call_arguments.done",
                "response.output_item.done",
                "response.completed",
            ]
        );
    }

    #[test]
    fn virtualized_tool_call_retypes_output_item() {
        let mut tools = ToolVirtualization::default();
        tools.function_name_map.insert("ob_apply_patch".to_string(), "apply_patch".to_string());
        let mut t = ResponsesStreamTranslator::new("resp_1".into(), "m".into(), 0, tools);
        t.process_chunk(&tool_call_chunk(0, Some("call_1"), Some("ob_apply_patch"), Some("{}")));
        let msg = t.assistant_message().unwrap();
        let calls = msg.tool_calls.unwrap();
        assert_eq!(calls[0].function.name, "ob_apply_patch");
        let done = t.finish_events();
        let added = done.iter().find_map(|e| match e {
            ResponseStreamEvent::OutputItemDone(ev) => ev.item.get("type").and_then(Value::as_str),
            _ => None,
        });
        assert_eq!(added, Some("apply_patch_call"));
    }

    #[test]
    fn assistant_message_none_when_empty() {
        let t = ResponsesStreamTranslator::new("resp_1".into(), "m".into(), 0, ToolVirtualization::default());
        assert!(t.assistant_message().is_none());
    }
}
