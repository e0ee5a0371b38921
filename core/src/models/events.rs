//! Response-stream event DTOs, one variant per SSE `event:` name.

use serde::Serialize;
use serde_json::Value;

use super::responses::ResponsesCreateResponse;

#[derive(Debug, Clone, Serialize)]
pub struct ResponseCreatedEvent {
    pub response: ResponsesCreateResponse,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResponseOutputItemAddedEvent {
    pub output_index: usize,
    pub item: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResponseOutputTextDeltaEvent {
    pub output_index: usize,
    pub content_index: usize,
    pub delta: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResponseOutputTextDoneEvent {
    pub output_index: usize,
    pub content_index: usize,
    pub text: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResponseFunctionCallArgumentsDeltaEvent {
    pub output_index: usize,
    pub delta: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResponseFunctionCallArgumentsDoneEvent {
    pub output_index: usize,
    pub arguments: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResponseOutputItemDoneEvent {
    pub output_index: usize,
    pub item: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResponseCompletedEvent {
    pub response: ResponsesCreateResponse,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResponseFailedEvent {
    pub response: ResponsesCreateResponse,
    pub error: Value,
}

/// A named, serializable stream event. `name()` gives the SSE `event:` field;
/// the event itself (serialized without an envelope) is the SSE `data:` field.
#[derive(Debug, Clone)]
pub enum ResponseStreamEvent {
    Created(ResponseCreatedEvent),
    OutputItemAdded(ResponseOutputItemAddedEvent),
    OutputTextDelta(ResponseOutputTextDeltaEvent),
    OutputTextDone(ResponseOutputTextDoneEvent),
    FunctionCallArgumentsDelta(ResponseFunctionCallArgumentsDeltaEvent),
    FunctionCallArgumentsDone(ResponseFunctionCallArgumentsDoneEvent),
    OutputItemDone(ResponseOutputItemDoneEvent),
    Completed(ResponseCompletedEvent),
    Failed(ResponseFailedEvent),
}

impl ResponseStreamEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Created(_) => "response.created",
            Self::OutputItemAdded(_) => "response.output_item.added",
            Self::OutputTextDelta(_) => "response.output_text.delta",
            Self::OutputTextDone(_) => "response.output_text.done",
            Self::FunctionCallArgumentsDelta(_) => "response.function_call_arguments.delta",
            Self::FunctionCallArgumentsDone(_) => "response.function_call_arguments.done",
            Self::OutputItemDone(_) => "response.output_item.done",
            Self::Completed(_) => "response.completed",
            Self::Failed(_) => "response.failed",
        }
    }

    /// Serializes just the payload (not including the event name) to compact JSON.
    pub fn data_json(&self) -> String {
        match self {
            Self::Created(e) => serde_json::to_string(e),
            Self::OutputItemAdded(e) => serde_json::to_string(e),
            Self::OutputTextDelta(e) => serde_json::to_string(e),
            Self::OutputTextDone(e) => serde_json::to_string(e),
            Self::FunctionCallArgumentsDelta(e) => serde_json::to_string(e),
            Self::FunctionCallArgumentsDone(e) => serde_json::to_string(e),
            Self::OutputItemDone(e) => serde_json::to_string(e),
            Self::Completed(e) => serde_json::to_string(e),
            Self::Failed(e) => serde_json::to_string(e),
        }
        .expect("response stream event serialization is infallible")
    }

    /// Renders this event as a wire-format SSE frame: `event: <name>\ndata: <json>\n\n`.
    pub fn to_sse(&self) -> String {
        format!("event: {}\ndata: {}\n\n", self.name(), self.data_json())
    }
}
