//! 核心编排层：错误与恢复、运行状态、过程事件、计划 - 执行 - 重试主循环

pub mod error;
pub mod events;
pub mod orchestrator;
pub mod recovery;
pub mod state;

pub use error::{PilotError, RecoveryAction};
pub use events::{send_event, PilotEvent, SnapshotStage};
pub use orchestrator::{Orchestrator, RetryPolicy};
pub use recovery::RecoveryEngine;
pub use state::{PlanSource, RunOutcome, RunPhase};
