//! 动作分发器
//!
//! 对 ActionItem 做穷尽匹配，每个动作至多一次驱动调用；选择器优先于坐标（已在解析时确定）。
//! 缺少目标或必要参数的动作、词汇表外的动作记录后跳过；每次分发输出结构化审计日志（JSON）。

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::action::{ActionItem, Locator};
use crate::driver::{DriverError, PageDriver};

/// 水平滚动未给距离时的默认像素
pub const DEFAULT_HORIZONTAL_SCROLL: u32 = 200;

/// 单个动作的分发结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Performed,
    /// 未调用驱动，附原因
    Skipped(String),
}

impl DispatchOutcome {
    pub fn is_performed(&self) -> bool {
        matches!(self, DispatchOutcome::Performed)
    }
}

pub struct ActionDispatcher {
    driver: Arc<dyn PageDriver>,
}

impl ActionDispatcher {
    pub fn new(driver: Arc<dyn PageDriver>) -> Self {
        Self { driver }
    }

    pub fn driver(&self) -> &Arc<dyn PageDriver> {
        &self.driver
    }

    /// 执行一个动作；驱动错误原样返回，由编排器决定是否重试
    pub async fn execute(&self, action: &ActionItem) -> Result<DispatchOutcome, DriverError> {
        let start = Instant::now();
        let result = self.dispatch(action).await;

        let (ok, outcome, detail) = match &result {
            Ok(DispatchOutcome::Performed) => (true, "performed", String::new()),
            Ok(DispatchOutcome::Skipped(reason)) => (true, "skipped", reason.clone()),
            Err(e) => (false, "error", e.to_string()),
        };
        let audit = serde_json::json!({
            "event": "action_audit",
            "action": action.label(),
            "target": target_of(action).map(describe_locator),
            "ok": ok,
            "outcome": outcome,
            "duration_ms": start.elapsed().as_millis() as u64,
            "detail": detail,
        });
        tracing::info!(audit = %audit.to_string(), "action");

        result
    }

    async fn dispatch(&self, action: &ActionItem) -> Result<DispatchOutcome, DriverError> {
        let d = &self.driver;
        match action {
            ActionItem::Click { target } => {
                let Some(t) = target else { return Ok(no_target()) };
                d.click(t).await?;
            }
            ActionItem::DoubleClick { target } => {
                let Some(t) = target else { return Ok(no_target()) };
                d.double_click(t).await?;
            }
            ActionItem::RightClick { target } => {
                let Some(t) = target else { return Ok(no_target()) };
                d.right_click(t).await?;
            }
            ActionItem::Hover { target } => {
                let Some(t) = target else { return Ok(no_target()) };
                d.hover(t).await?;
            }
            ActionItem::LongPress { target, duration_ms } => {
                let Some(t) = target else { return Ok(no_target()) };
                d.long_press(t, *duration_ms).await?;
            }
            ActionItem::Input { target, value, mode } => {
                let Some(t) = target else { return Ok(no_target()) };
                d.type_text(t, value.as_deref().unwrap_or_default(), *mode).await?;
            }
            ActionItem::ClearInput { target } => {
                let Some(t) = target else { return Ok(no_target()) };
                d.clear_input(t).await?;
            }
            ActionItem::KeyPress { key, target } => {
                let Some(key) = key.as_deref().filter(|k| !k.is_empty()) else {
                    return Ok(missing("keyName"));
                };
                d.key_press(key, target.as_ref()).await?;
            }
            ActionItem::Scroll { target, direction, distance } => {
                let distance = distance.or(direction
                    .is_horizontal()
                    .then_some(DEFAULT_HORIZONTAL_SCROLL));
                d.scroll(target.as_ref(), *direction, distance).await?;
            }
            ActionItem::Swipe { from, to, duration_ms } => {
                let (Some(from), Some(to)) = (from, to) else {
                    return Ok(missing("from/to"));
                };
                d.swipe(*from, *to, *duration_ms).await?;
            }
            ActionItem::DragAndDrop { from, to } => {
                let (Some(from), Some(to)) = (from, to) else {
                    return Ok(missing("from/to"));
                };
                d.drag_and_drop(*from, *to).await?;
            }
            ActionItem::Navigate { url } => {
                let Some(url) = url.as_deref().filter(|u| !u.trim().is_empty()) else {
                    return Ok(missing("url"));
                };
                d.navigate(url).await?;
            }
            ActionItem::Reload => d.reload().await?,
            ActionItem::GoBack => d.go_back().await?,
            ActionItem::EvaluateScript { script } => {
                let Some(script) = script.as_deref().filter(|s| !s.trim().is_empty()) else {
                    return Ok(missing("script"));
                };
                d.execute_script(script).await?;
            }
            ActionItem::Screenshot => {
                d.take_screenshot().await?;
            }
            ActionItem::Sleep { ms } => {
                tokio::time::sleep(Duration::from_millis(*ms)).await;
            }
            ActionItem::Assert { assertion } => {
                tracing::info!(assertion = ?assertion, "assert action logged");
                return Ok(DispatchOutcome::Skipped("assertion is not executed by the dispatcher".into()));
            }
            ActionItem::WaitFor { assertion, timeout_ms } => {
                tracing::info!(assertion = ?assertion, timeout_ms, "wait_for action logged");
                return Ok(DispatchOutcome::Skipped("wait_for is not executed by the dispatcher".into()));
            }
            ActionItem::Unsupported { kind } => {
                tracing::warn!(kind = %kind, "unsupported action skipped");
                return Ok(DispatchOutcome::Skipped(format!("unsupported action type '{kind}'")));
            }
        }
        Ok(DispatchOutcome::Performed)
    }
}

fn no_target() -> DispatchOutcome {
    DispatchOutcome::Skipped("no locate or elementSelector".into())
}

fn missing(field: &str) -> DispatchOutcome {
    DispatchOutcome::Skipped(format!("missing {field}"))
}

fn target_of(action: &ActionItem) -> Option<&Locator> {
    match action {
        ActionItem::Click { target }
        | ActionItem::DoubleClick { target }
        | ActionItem::RightClick { target }
        | ActionItem::Hover { target }
        | ActionItem::LongPress { target, .. }
        | ActionItem::Input { target, .. }
        | ActionItem::ClearInput { target }
        | ActionItem::KeyPress { target, .. }
        | ActionItem::Scroll { target, .. } => target.as_ref(),
        _ => None,
    }
}

/// 日志用：目标的简短描述
pub fn describe_locator(target: &Locator) -> String {
    match target {
        Locator::Selector(sel) => sel.value.clone(),
        Locator::Coordinate(p) => format!("({}, {})", p.x, p.y),
    }
}
