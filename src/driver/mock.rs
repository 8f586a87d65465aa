//! 记录型驱动（用于测试，无需浏览器）
//!
//! 实现全部能力，按顺序记录每次调用；可按能力名配置失败（前 N 次，或从第 N 次起）。

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::action::{InputMode, Locator, Point, ScrollDirection};
use crate::driver::{DriverError, PageDriver};

/// 1x1 PNG
pub const BLANK_PNG_BASE64: &str =
    "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

/// 一次驱动调用
#[derive(Debug, Clone, PartialEq)]
pub enum DriverCall {
    Screenshot,
    PageSource,
    Url,
    Click(Locator),
    DoubleClick(Locator),
    RightClick(Locator),
    Hover(Locator),
    LongPress(Locator, u64),
    TypeText(Locator, String, InputMode),
    ClearInput(Locator),
    KeyPress(String, Option<Locator>),
    Scroll(Option<Locator>, ScrollDirection, Option<u32>),
    Swipe(Point, Point, u64),
    DragAndDrop(Point, Point),
    Navigate(String),
    Reload,
    GoBack,
    ExecuteScript(String),
    TakeScreenshot,
}

impl DriverCall {
    /// 能力名（与失败配置的键一致）
    pub fn capability(&self) -> &'static str {
        match self {
            DriverCall::Screenshot => "screenshot",
            DriverCall::PageSource => "page_source",
            DriverCall::Url => "url",
            DriverCall::Click(_) => "click",
            DriverCall::DoubleClick(_) => "double_click",
            DriverCall::RightClick(_) => "right_click",
            DriverCall::Hover(_) => "hover",
            DriverCall::LongPress(..) => "long_press",
            DriverCall::TypeText(..) => "type_text",
            DriverCall::ClearInput(_) => "clear_input",
            DriverCall::KeyPress(..) => "key_press",
            DriverCall::Scroll(..) => "scroll",
            DriverCall::Swipe(..) => "swipe",
            DriverCall::DragAndDrop(..) => "drag_and_drop",
            DriverCall::Navigate(_) => "navigate",
            DriverCall::Reload => "reload",
            DriverCall::GoBack => "go_back",
            DriverCall::ExecuteScript(_) => "execute_script",
            DriverCall::TakeScreenshot => "take_screenshot",
        }
    }

    /// 是否为页面动作（截图、取源码、取 URL 之外的调用）
    pub fn is_action(&self) -> bool {
        !matches!(
            self,
            DriverCall::Screenshot | DriverCall::PageSource | DriverCall::Url
        )
    }
}

#[derive(Debug, Clone, Copy)]
enum FailRule {
    /// 前 n 次失败
    First(usize),
    /// 从第 n 次（1 起）开始一直失败
    From(usize),
}

#[derive(Debug, Default)]
struct State {
    calls: Vec<DriverCall>,
    counts: HashMap<&'static str, usize>,
    rules: HashMap<&'static str, FailRule>,
    script_results: VecDeque<serde_json::Value>,
}

#[derive(Debug)]
pub struct RecordingDriver {
    state: Mutex<State>,
    page_source: String,
    url: String,
}

impl Default for RecordingDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingDriver {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            page_source: "<html><body><button id=\"login\">Login</button></body></html>".to_string(),
            url: "about:blank".to_string(),
        }
    }

    pub fn with_page_source(mut self, source: impl Into<String>) -> Self {
        self.page_source = source.into();
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// 指定能力的前 `times` 次调用失败
    pub fn fail_times(self, capability: &'static str, times: usize) -> Self {
        self.lock().rules.insert(capability, FailRule::First(times));
        self
    }

    /// 指定能力从第 `nth` 次（1 起）调用开始一直失败
    pub fn fail_from_call(self, capability: &'static str, nth: usize) -> Self {
        self.lock().rules.insert(capability, FailRule::From(nth));
        self
    }

    /// execute_script 依次返回的结果；用完后返回 null
    pub fn push_script_result(&self, value: serde_json::Value) {
        self.lock().script_results.push_back(value);
    }

    pub fn calls(&self) -> Vec<DriverCall> {
        self.lock().calls.clone()
    }

    /// 仅页面动作
    pub fn action_calls(&self) -> Vec<DriverCall> {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.is_action())
            .cloned()
            .collect()
    }

    pub fn count(&self, capability: &str) -> usize {
        self.lock().counts.get(capability).copied().unwrap_or(0)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record(&self, call: DriverCall) -> Result<(), DriverError> {
        let mut state = self.lock();
        let capability = call.capability();
        let n = {
            let count = state.counts.entry(capability).or_insert(0);
            *count += 1;
            *count
        };
        state.calls.push(call);
        let fail = match state.rules.get(capability) {
            Some(FailRule::First(times)) => n <= *times,
            Some(FailRule::From(nth)) => n >= *nth,
            None => false,
        };
        if fail {
            Err(DriverError::Backend(format!("{capability} failed (call {n})")))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl PageDriver for RecordingDriver {
    async fn screenshot_base64(&self) -> Result<String, DriverError> {
        self.record(DriverCall::Screenshot)?;
        Ok(BLANK_PNG_BASE64.to_string())
    }

    async fn page_source(&self) -> Result<String, DriverError> {
        self.record(DriverCall::PageSource)?;
        Ok(self.page_source.clone())
    }

    async fn url(&self) -> Result<String, DriverError> {
        self.record(DriverCall::Url)?;
        Ok(self.url.clone())
    }

    async fn click(&self, target: &Locator) -> Result<(), DriverError> {
        self.record(DriverCall::Click(target.clone()))
    }

    async fn double_click(&self, target: &Locator) -> Result<(), DriverError> {
        self.record(DriverCall::DoubleClick(target.clone()))
    }

    async fn right_click(&self, target: &Locator) -> Result<(), DriverError> {
        self.record(DriverCall::RightClick(target.clone()))
    }

    async fn hover(&self, target: &Locator) -> Result<(), DriverError> {
        self.record(DriverCall::Hover(target.clone()))
    }

    async fn long_press(&self, target: &Locator, duration_ms: u64) -> Result<(), DriverError> {
        self.record(DriverCall::LongPress(target.clone(), duration_ms))
    }

    async fn type_text(&self, target: &Locator, text: &str, mode: InputMode) -> Result<(), DriverError> {
        self.record(DriverCall::TypeText(target.clone(), text.to_string(), mode))
    }

    async fn clear_input(&self, target: &Locator) -> Result<(), DriverError> {
        self.record(DriverCall::ClearInput(target.clone()))
    }

    async fn key_press(&self, key: &str, target: Option<&Locator>) -> Result<(), DriverError> {
        self.record(DriverCall::KeyPress(key.to_string(), target.cloned()))
    }

    async fn scroll(
        &self,
        target: Option<&Locator>,
        direction: ScrollDirection,
        distance: Option<u32>,
    ) -> Result<(), DriverError> {
        self.record(DriverCall::Scroll(target.cloned(), direction, distance))
    }

    async fn swipe(&self, from: Point, to: Point, duration_ms: u64) -> Result<(), DriverError> {
        self.record(DriverCall::Swipe(from, to, duration_ms))
    }

    async fn drag_and_drop(&self, from: Point, to: Point) -> Result<(), DriverError> {
        self.record(DriverCall::DragAndDrop(from, to))
    }

    async fn navigate(&self, url: &str) -> Result<(), DriverError> {
        self.record(DriverCall::Navigate(url.to_string()))
    }

    async fn reload(&self) -> Result<(), DriverError> {
        self.record(DriverCall::Reload)
    }

    async fn go_back(&self) -> Result<(), DriverError> {
        self.record(DriverCall::GoBack)
    }

    async fn execute_script(&self, script: &str) -> Result<serde_json::Value, DriverError> {
        self.record(DriverCall::ExecuteScript(script.to_string()))?;
        Ok(self
            .lock()
            .script_results
            .pop_front()
            .unwrap_or(serde_json::Value::Null))
    }

    async fn take_screenshot(&self) -> Result<Vec<u8>, DriverError> {
        self.record(DriverCall::TakeScreenshot)?;
        Ok(Vec::new())
    }
}
