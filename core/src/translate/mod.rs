//! Bidirectional translation between the Responses shape and the Chat
//! Completions shape, plus client-model -> upstream-model routing.

pub mod model_map;
pub mod request;
pub mod response;

pub use model_map::ModelMapResolver;
pub use request::{translate_request, TranslationOutcome};
pub use response::chat_response_to_responses;
