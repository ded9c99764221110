//! Model backend abstraction.

pub mod base_llm;

pub use base_llm::{BaseLLM, LLMMessage, LLMResponse, Role, TokenUsage};
