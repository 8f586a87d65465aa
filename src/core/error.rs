//! 错误类型与恢复动作
//!
//! 与 RecoveryEngine 配合：每次尝试内的错误都在重试循环边界被捕获，只有预算耗尽才向调用方传播。

use thiserror::Error;

use crate::driver::DriverError;
use crate::llm::LlmError;

/// 指令执行过程中可能出现的错误
#[derive(Error, Debug)]
pub enum PilotError {
    /// 模型回复无法解析为计划
    #[error("Failed to decode plan: {0}")]
    Decode(String),

    #[error("No actions returned by AI")]
    EmptyPlan,

    /// 模型返回空计划并说明了原因
    #[error("AI declined the instruction: {0}")]
    PlannerRefused(String),

    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error(transparent)]
    Driver(#[from] DriverError),

    #[error("Failed to complete instruction '{instruction}' after {attempts} attempt(s): {last_error}")]
    RetriesExhausted {
        instruction: String,
        attempts: u32,
        last_error: String,
    },

    #[error("Assertion failed: {0}")]
    AssertionFailed(String),

    #[error("Timed out after {timeout_ms}ms waiting for: {assertion}")]
    WaitTimeout { assertion: String, timeout_ms: u64 },

    #[error("Instruction '{instruction}' exceeded deadline of {deadline_ms}ms")]
    DeadlineExceeded { instruction: String, deadline_ms: u64 },

    #[error("Config error: {0}")]
    Config(String),

    #[error("Background task failed: {0}")]
    Join(String),
}

/// 恢复引擎根据错误与尝试序号给出的建议动作
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryAction {
    /// 首次失败：先尝试删除该指令的缓存条目；若确实删除则清空历史重来，否则注入提示继续
    InvalidateCache { note: String },
    /// 把提示作为用户消息注入下一轮
    RetryWithPrompt(String),
}
