//! 错误恢复引擎
//!
//! 根据 PilotError 类型与尝试序号返回 RecoveryAction：只有第一次失败会建议失效缓存，
//! 其余情况把「Error executing plan: ...」连同针对错误类型的提示注入下一轮。

use crate::core::{PilotError, RecoveryAction};

#[derive(Debug, Default)]
pub struct RecoveryEngine;

impl RecoveryEngine {
    pub fn new() -> Self {
        Self
    }

    /// `attempt` 从 1 开始
    pub fn handle(&self, err: &PilotError, attempt: u32) -> RecoveryAction {
        let note = Self::note_for(err);
        if attempt == 1 {
            RecoveryAction::InvalidateCache { note }
        } else {
            RecoveryAction::RetryWithPrompt(note)
        }
    }

    /// 注入历史的错误说明
    pub fn note_for(err: &PilotError) -> String {
        let hint = match err {
            PilotError::Decode(_) => {
                " Reply with a single JSON object matching the output format, without any other text."
            }
            PilotError::EmptyPlan => {
                " The plan had no actions. Return at least one action that makes progress on the instruction."
            }
            PilotError::PlannerRefused(_) => {
                " Look at the new screenshot again; if the target is off-screen, scroll or navigate first."
            }
            PilotError::Driver(_) => {
                " The action could not be performed. Prefer a different selector or the element's visible coordinates."
            }
            _ => "",
        };
        format!("Error executing plan: {err}.{hint}")
    }
}
