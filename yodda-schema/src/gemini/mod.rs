mod generate_content_request;
mod v1beta_response;

pub use generate_content_request::{
    Content, GeminiGenerateContentRequest, GenerationConfig, Part,
};
pub use v1beta_response::{Candidate, GeminiResponseBody};
