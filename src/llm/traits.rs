//! LLM 客户端抽象
//!
//! 所有后端（OpenAI 兼容 / Mock）实现 LlmClient：以完整历史（含截图片段）调用模型，返回回复文本。

use async_trait::async_trait;
use thiserror::Error;

use crate::memory::Message;

/// 模型调用错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LlmError {
    #[error("LLM request failed: {0}")]
    Request(String),

    #[error("Invalid LLM request: {0}")]
    InvalidRequest(String),

    #[error("LLM request timed out after {0}s")]
    Timeout(u64),

    #[error("LLM returned an empty reply")]
    EmptyReply,
}

/// LLM 客户端 trait
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// 非流式完成
    async fn complete(&self, messages: &[Message]) -> Result<String, LlmError>;

    /// 获取累计 token 使用统计：(prompt_tokens, completion_tokens, total_tokens)
    /// 默认返回 (0, 0, 0)，具体实现可覆盖
    fn token_usage(&self) -> (u64, u64, u64) {
        (0, 0, 0)
    }
}
