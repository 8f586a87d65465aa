//! 页面驱动抽象
//!
//! 只有截图与页面源码是必需能力；其余动作能力默认返回 `DriverError::Unsupported`，
//! 后端按需覆盖，未实现的能力会明确失败而不是静默忽略。

use async_trait::async_trait;
use thiserror::Error;

use crate::action::{InputMode, Locator, Point, ScrollDirection};

/// 驱动层错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DriverError {
    #[error("Driver does not support {0}")]
    Unsupported(&'static str),

    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Driver backend error: {0}")]
    Backend(String),
}

/// 一次尝试开始时采集的页面状态
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    /// PNG 截图（base64）
    pub screenshot_base64: String,
    pub page_source: String,
}

#[async_trait]
pub trait PageDriver: Send + Sync {
    /// 当前页面 PNG 截图（base64）
    async fn screenshot_base64(&self) -> Result<String, DriverError>;

    /// 当前页面源码（HTML 或视图层级）
    async fn page_source(&self) -> Result<String, DriverError>;

    async fn snapshot(&self) -> Result<Snapshot, DriverError> {
        Ok(Snapshot {
            screenshot_base64: self.screenshot_base64().await?,
            page_source: self.page_source().await?,
        })
    }

    async fn url(&self) -> Result<String, DriverError> {
        Err(DriverError::Unsupported("url"))
    }

    async fn click(&self, _target: &Locator) -> Result<(), DriverError> {
        Err(DriverError::Unsupported("click"))
    }

    async fn double_click(&self, _target: &Locator) -> Result<(), DriverError> {
        Err(DriverError::Unsupported("double_click"))
    }

    async fn right_click(&self, _target: &Locator) -> Result<(), DriverError> {
        Err(DriverError::Unsupported("right_click"))
    }

    async fn hover(&self, _target: &Locator) -> Result<(), DriverError> {
        Err(DriverError::Unsupported("hover"))
    }

    async fn long_press(&self, _target: &Locator, _duration_ms: u64) -> Result<(), DriverError> {
        Err(DriverError::Unsupported("long_press"))
    }

    async fn type_text(&self, _target: &Locator, _text: &str, _mode: InputMode) -> Result<(), DriverError> {
        Err(DriverError::Unsupported("type_text"))
    }

    async fn clear_input(&self, _target: &Locator) -> Result<(), DriverError> {
        Err(DriverError::Unsupported("clear_input"))
    }

    /// 按键；target 为 None 时作用于当前焦点
    async fn key_press(&self, _key: &str, _target: Option<&Locator>) -> Result<(), DriverError> {
        Err(DriverError::Unsupported("key_press"))
    }

    /// 滚动；target 为 None 时滚动整个页面，distance 为 None 时由后端决定步长
    async fn scroll(
        &self,
        _target: Option<&Locator>,
        _direction: ScrollDirection,
        _distance: Option<u32>,
    ) -> Result<(), DriverError> {
        Err(DriverError::Unsupported("scroll"))
    }

    async fn swipe(&self, _from: Point, _to: Point, _duration_ms: u64) -> Result<(), DriverError> {
        Err(DriverError::Unsupported("swipe"))
    }

    async fn drag_and_drop(&self, _from: Point, _to: Point) -> Result<(), DriverError> {
        Err(DriverError::Unsupported("drag_and_drop"))
    }

    async fn navigate(&self, _url: &str) -> Result<(), DriverError> {
        Err(DriverError::Unsupported("navigate"))
    }

    async fn reload(&self) -> Result<(), DriverError> {
        Err(DriverError::Unsupported("reload"))
    }

    async fn go_back(&self) -> Result<(), DriverError> {
        Err(DriverError::Unsupported("go_back"))
    }

    /// 在页面中执行脚本，返回 JSON 结果
    async fn execute_script(&self, _script: &str) -> Result<serde_json::Value, DriverError> {
        Err(DriverError::Unsupported("execute_script"))
    }

    /// 原始 PNG 字节
    async fn take_screenshot(&self) -> Result<Vec<u8>, DriverError> {
        Err(DriverError::Unsupported("take_screenshot"))
    }
}
