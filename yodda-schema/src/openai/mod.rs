mod chat_completion_request;
mod chat_completion_response;

pub use chat_completion_request::{ChatCompletionRequest, ChatMessage};
pub use chat_completion_response::{ChatChoice, ChatCompletionResponse, ChatResponseMessage};
