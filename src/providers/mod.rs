//! Upstream LLM providers: dialects, credential resolution and the HTTP client.

pub mod client;
pub mod family;
pub mod resolver;

pub use client::{UpstreamClient, build_http_client};
pub use family::{GenerationParams, ProviderFamily};
pub use resolver::{CredentialResolver, CredentialSource, ResolvedCredential};
