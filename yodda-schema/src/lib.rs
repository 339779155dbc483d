pub mod gemini;
pub mod openai;

pub use gemini::{
    Candidate, Content, GeminiGenerateContentRequest, GeminiResponseBody, GenerationConfig, Part,
};
pub use openai::{
    ChatChoice, ChatCompletionRequest, ChatCompletionResponse, ChatMessage, ChatResponseMessage,
};
