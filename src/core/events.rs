//! 运行过程事件：供报告/界面订阅（指令、截图、计划、动作、错误、缓存失效、结果）

use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

use crate::action::Plan;
use crate::core::{PlanSource, RunPhase};

/// 截图时机
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotStage {
    BeforePlan,
    AfterActions,
}

/// 单步过程事件（可序列化为 JSON）
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PilotEvent {
    RunStarted {
        run_id: Uuid,
        instruction: String,
        max_attempts: u32,
    },
    PhaseChanged { run_id: Uuid, phase: RunPhase },
    AttemptStarted { run_id: Uuid, attempt: u32 },
    /// 截图（base64 PNG）
    SnapshotCaptured {
        run_id: Uuid,
        stage: SnapshotStage,
        screenshot_base64: String,
    },
    PlanReady {
        run_id: Uuid,
        source: PlanSource,
        plan: Plan,
    },
    ActionDispatched {
        run_id: Uuid,
        index: usize,
        action: String,
        performed: bool,
    },
    AttemptFailed {
        run_id: Uuid,
        attempt: u32,
        error: String,
    },
    CacheInvalidation { run_id: Uuid, removed: bool },
    RunFinished {
        run_id: Uuid,
        success: bool,
        attempts: u32,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
    QueryAnswered { question: String, answer: String },
}

/// 向可选的事件通道发送；接收端已关闭时静默忽略
pub fn send_event(tx: Option<&UnboundedSender<PilotEvent>>, ev: PilotEvent) {
    if let Some(tx) = tx {
        let _ = tx.send(ev);
    }
}
