//! 动作计划：一次规划得到的有序动作列表与附带信息

use serde::{Deserialize, Serialize};

use super::item::ActionItem;
use super::wire::{positive_u64, WirePlan};

/// 模型为一条指令给出的计划；缺失字段取默认值，未知字段忽略
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "WirePlan", into = "WirePlan")]
pub struct Plan {
    pub actions: Vec<ActionItem>,
    /// 模型给出的规划理由
    pub log: String,
    pub more_actions_needed_by_instruction: bool,
    /// 执行完全部动作后的等待毫秒数
    pub sleep: Option<u64>,
    /// 模型声明无法完成时的原因
    pub error: Option<String>,
}

impl Plan {
    pub fn new(actions: Vec<ActionItem>) -> Self {
        Self {
            actions,
            ..Self::default()
        }
    }

    pub fn with_log(mut self, log: impl Into<String>) -> Self {
        self.log = log.into();
        self
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }
}

impl From<WirePlan> for Plan {
    fn from(w: WirePlan) -> Self {
        Self {
            actions: w
                .actions
                .unwrap_or_default()
                .into_iter()
                .map(ActionItem::from)
                .collect(),
            log: w.log.unwrap_or_default(),
            more_actions_needed_by_instruction: w.more_actions_needed_by_instruction.unwrap_or(false),
            sleep: positive_u64(w.sleep).filter(|ms| *ms > 0),
            error: w.error.filter(|e| !e.trim().is_empty()),
        }
    }
}

impl From<Plan> for WirePlan {
    fn from(p: Plan) -> Self {
        WirePlan {
            actions: Some(p.actions.into_iter().map(Into::into).collect()),
            log: Some(p.log).filter(|l| !l.is_empty()),
            more_actions_needed_by_instruction: Some(p.more_actions_needed_by_instruction),
            sleep: p.sleep.map(|ms| ms as f64),
            error: p.error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{Locator, Point};

    #[test]
    fn test_plan_defaults_and_unknown_fields() {
        let plan: Plan = serde_json::from_str(r#"{"description": "x", "log": "ok"}"#).unwrap();
        assert!(plan.is_empty());
        assert_eq!(plan.log, "ok");
        assert!(!plan.more_actions_needed_by_instruction);
        assert_eq!(plan.sleep, None);
    }

    #[test]
    fn test_plan_blank_error_is_none() {
        let plan: Plan = serde_json::from_str(r#"{"actions": [], "error": "  "}"#).unwrap();
        assert_eq!(plan.error, None);
    }

    #[test]
    fn test_plan_serializes_through_wire_format() {
        let plan = Plan::new(vec![ActionItem::click(Locator::Coordinate(Point::new(5, 6)))])
            .with_log("click it");
        let text = serde_json::to_string(&plan).unwrap();
        assert!(text.contains("\"moreActionsNeededByInstruction\":false"));
        let back: Plan = serde_json::from_str(&text).unwrap();
        assert_eq!(back, plan);
    }
}
