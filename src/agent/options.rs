//! Agent 便捷方法的选项，以及把选项拼成自然语言指令的规则

use std::time::Duration;

use crate::action::{InputMode, ScrollDirection};

/// 定位类方法（ai_tap / ai_hover 等）的选项
#[derive(Debug, Clone, Default)]
pub struct LocateOptions {
    /// 限定查找范围的描述，如 "the top navigation bar"
    pub search_area: Option<String>,
    /// 要求模型仔细分析（目标不明显时）
    pub deep_think: bool,
}

impl LocateOptions {
    pub fn within(area: impl Into<String>) -> Self {
        Self {
            search_area: Some(area.into()),
            deep_think: false,
        }
    }

    pub fn deep_think(mut self) -> Self {
        self.deep_think = true;
        self
    }

    /// 在基础指令后追加范围与深度思考提示
    pub fn decorate(&self, base: String) -> String {
        let mut out = base;
        if let Some(area) = self.search_area.as_deref().filter(|a| !a.trim().is_empty()) {
            out.push_str(&format!(" within {area}"));
        }
        if self.deep_think {
            out.push_str(" (use careful analysis)");
        }
        out
    }
}

#[derive(Debug, Clone, Default)]
pub struct InputOptions {
    pub value: String,
    pub mode: InputMode,
}

impl InputOptions {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            mode: InputMode::Replace,
        }
    }

    pub fn append(mut self) -> Self {
        self.mode = InputMode::Append;
        self
    }

    pub fn instruction(&self, locate: &str) -> String {
        match self.mode {
            InputMode::Replace => format!("Type '{}' into {} (replace existing content)", self.value, locate),
            InputMode::Append => format!("Type '{}' into {} (append to existing content)", self.value, locate),
            InputMode::Clear => format!("Clear the content of {}", locate),
        }
    }
}

/// 滚动方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScrollType {
    #[default]
    Once,
    UntilTop,
    UntilBottom,
    UntilLeft,
    UntilRight,
}

#[derive(Debug, Clone, Default)]
pub struct ScrollOptions {
    pub direction: ScrollDirection,
    pub scroll_type: ScrollType,
    pub distance: Option<u32>,
}

impl ScrollOptions {
    pub fn instruction(&self, locate: Option<&str>) -> String {
        let mut out = format!("Scroll {}", self.direction.as_str());
        if let Some(locate) = locate {
            out.push_str(&format!(" on {locate}"));
        }
        match self.scroll_type {
            ScrollType::Once => {}
            ScrollType::UntilTop => out.push_str(" until reaching the top"),
            ScrollType::UntilBottom => out.push_str(" until reaching the bottom"),
            ScrollType::UntilLeft => out.push_str(" until reaching the left edge"),
            ScrollType::UntilRight => out.push_str(" until reaching the right edge"),
        }
        if let Some(distance) = self.distance {
            out.push_str(&format!(", by {distance} pixels"));
        }
        out
    }
}

/// ai_wait_for 的选项
#[derive(Debug, Clone)]
pub struct WaitOptions {
    pub timeout: Duration,
    /// 两次检查之间的间隔
    pub check_interval: Duration,
    /// 超时是否返回 WaitTimeout 错误（否则返回 Ok(false)）
    pub throw_on_timeout: bool,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(30_000),
            check_interval: Duration::from_millis(1_000),
            throw_on_timeout: true,
        }
    }
}
