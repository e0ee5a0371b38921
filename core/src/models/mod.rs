//! Wire-format DTOs for both sides of the bridge: the client-facing Responses
//! shape and the upstream Chat Completions shape, plus the SSE event types and
//! the shared error envelope.

pub mod chat;
pub mod errors;
pub mod events;
pub mod responses;

pub use chat::{
    ChatCompletionChoice, ChatCompletionChunk, ChatCompletionChunkChoice, ChatCompletionDelta,
    ChatCompletionRequest, ChatCompletionResponse, ChatMessage, ChatToolCall,
    ChatToolCallDelta, ChatToolCallFunction, ChatToolCallFunctionDelta, ChatToolDefinition,
    ChatToolFunction,
};
pub use errors::{ErrorDetail, ErrorResponse};
pub use events::{
    ResponseCompletedEvent, ResponseCreatedEvent, ResponseFailedEvent,
    ResponseFunctionCallArgumentsDeltaEvent, ResponseFunctionCallArgumentsDoneEvent,
    ResponseOutputItemAddedEvent, ResponseOutputItemDoneEvent, ResponseOutputTextDeltaEvent,
    ResponseOutputTextDoneEvent, ResponseStreamEvent,
};
pub use responses::{
    InputItem, ResponseOutputItem, ResponseOutputText, ResponseTextConfig, ResponseTextFormat,
    ResponsesCreateRequest, ResponsesCreateResponse, ResponsesInput, ResponsesTool,
    ResponsesToolFunction, ToolChoice, ToolChoiceAllowedTools, ToolChoiceFunction,
};
