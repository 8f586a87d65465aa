//! 运行状态：重试循环所处阶段与成功结果

use serde::Serialize;
use uuid::Uuid;

use crate::action::Plan;

/// 一次指令调用的阶段：Idle → Attempting → Succeeded / Attempting（重试）/ Failed
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum RunPhase {
    Idle,
    Attempting { attempt: u32 },
    Succeeded,
    Failed,
}

impl RunPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunPhase::Succeeded | RunPhase::Failed)
    }
}

/// 计划来源
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanSource {
    Cache,
    Model,
}

/// 成功执行后的结果
#[derive(Clone, Debug, Serialize)]
pub struct RunOutcome {
    pub run_id: Uuid,
    pub instruction: String,
    /// 最终执行的计划
    pub plan: Plan,
    /// 用了第几次尝试成功（1 起）
    pub attempts: u32,
    pub source: PlanSource,
    /// 实际调用了驱动的动作数（跳过的不计）
    pub performed: usize,
}
