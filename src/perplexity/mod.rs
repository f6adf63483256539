//! Perplexity chat-completions transport: request shape, retry, and citation extraction.

pub mod citations;
pub mod client;
pub mod types;
