//! LLM 层：客户端抽象与实现（OpenAI 兼容 / Mock）及后端选择

pub mod mock;
pub mod openai;
pub mod provider;
pub mod traits;

pub use mock::{MockLlmClient, DEFAULT_MOCK_REPLY};
pub use openai::{OpenAiClient, TokenUsage};
pub use provider::{create_llm_from_config, ModelProvider};
pub use traits::{LlmClient, LlmError};
