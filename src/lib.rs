//! Page Pilot - 由大模型驱动的页面自动化核心
//!
//! 模块划分：
//! - **action**: 动作词汇表、动作项与计划、模型输出的线格式
//! - **agent**: 面向调用方的 Agent 门面（ai_action / ai_tap / ai_query / ai_wait_for 等）
//! - **cache**: 指令到计划的响应缓存（指纹、模式、JSON 文件持久化）
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 编排主循环、错误与恢复、运行状态、过程事件
//! - **dispatch**: 把动作项翻译为驱动调用
//! - **driver**: 页面驱动抽象、记录型驱动与 Chrome 实现（browser feature）
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / Mock）
//! - **memory**: 单次指令内的对话历史
//! - **observability**: 日志初始化
//! - **planner**: 提示词与计划构建

pub mod action;
pub mod agent;
pub mod cache;
pub mod config;
pub mod core;
pub mod dispatch;
pub mod driver;
pub mod llm;
pub mod memory;
pub mod observability;
pub mod planner;

pub use agent::Agent;
pub use core::{Orchestrator, PilotError, RunOutcome};
