//! Chrome 驱动（需 browser feature 与本机 Chrome/Chromium）
//!
//! headless_chrome 是同步 API，每个能力都放进 spawn_blocking。元素定位与大部分动作通过
//! `tab.evaluate` 注入脚本完成：选择器（CSS / XPath）或坐标（elementFromPoint）解析为元素，
//! 找不到时脚本返回 `'missing'`，映射为 `DriverError::ElementNotFound`。

use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use headless_chrome::protocol::cdp::Page::CaptureScreenshotFormatOption;
use headless_chrome::{Browser, LaunchOptions, Tab};

use crate::action::{InputMode, Locator, Point, ScrollDirection, SelectorKind};
use crate::config::BrowserSection;
use crate::driver::{DriverError, PageDriver};

pub struct ChromeDriver {
    _browser: Browser,
    tab: Arc<Tab>,
}

impl ChromeDriver {
    /// 启动 Chrome 并打开一个标签页；配置了 start_url 时先导航过去
    pub async fn launch(cfg: &BrowserSection) -> Result<Self, DriverError> {
        let headless = cfg.headless;
        let size = (cfg.window_width, cfg.window_height);
        let start_url = cfg.start_url.clone();
        let (browser, tab) = tokio::task::spawn_blocking(move || {
            let options = LaunchOptions::default_builder()
                .headless(headless)
                .window_size(Some(size))
                .build()
                .map_err(|e| format!("Invalid launch options: {}", e))?;
            let browser = Browser::new(options).map_err(|e| format!("Chrome launch failed: {}", e))?;
            let tab = browser
                .new_tab()
                .map_err(|e| format!("Browser tab failed: {}", e))?;
            if let Some(url) = start_url {
                tab.navigate_to(&url)
                    .and_then(|t| t.wait_until_navigated())
                    .map_err(|e| format!("Navigate failed: {}", e))?;
            }
            Ok::<_, String>((browser, tab))
        })
        .await
        .map_err(|e| DriverError::Backend(format!("Task join: {}", e)))?
        .map_err(DriverError::Backend)?;
        tracing::info!(headless, "Chrome driver ready");
        Ok(Self {
            _browser: browser,
            tab,
        })
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T, DriverError>
    where
        F: FnOnce(&Tab) -> Result<T, DriverError> + Send + 'static,
        T: Send + 'static,
    {
        let tab = Arc::clone(&self.tab);
        tokio::task::spawn_blocking(move || f(&tab))
            .await
            .map_err(|e| DriverError::Backend(format!("Task join: {}", e)))?
    }

    /// 执行脚本并取返回值
    async fn eval(&self, js: String, await_promise: bool) -> Result<serde_json::Value, DriverError> {
        self.blocking(move |tab| {
            let result = tab
                .evaluate(&js, await_promise)
                .map_err(|e| DriverError::Backend(format!("Evaluate failed: {}", e)))?;
            Ok(result.value.unwrap_or(serde_json::Value::Null))
        })
        .await
    }

    /// 在目标元素上执行一段脚本（脚本中可用变量 `el`）
    async fn on_element(&self, target: &Locator, body: &str, await_promise: bool) -> Result<(), DriverError> {
        let js = format!(
            "(function() {{ const el = {}; if (!el) return 'missing'; \
             el.scrollIntoView({{ behavior: 'instant', block: 'center' }}); {} }})()",
            resolve_js(target),
            body
        );
        match self.eval(js, await_promise).await? {
            serde_json::Value::String(s) if s == "missing" => Err(DriverError::ElementNotFound(describe(target))),
            _ => Ok(()),
        }
    }
}

/// JS 字符串字面量
fn js_str(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| "\"\"".to_string())
}

/// 解析目标元素的 JS 表达式
fn resolve_js(target: &Locator) -> String {
    match target {
        Locator::Selector(sel) => match sel.kind {
            SelectorKind::Css => format!("document.querySelector({})", js_str(&sel.value)),
            SelectorKind::XPath => format!(
                "document.evaluate({}, document, null, XPathResult.FIRST_ORDERED_NODE_TYPE, null).singleNodeValue",
                js_str(&sel.value)
            ),
        },
        Locator::Coordinate(p) => format!("document.elementFromPoint({}, {})", p.x, p.y),
    }
}

fn describe(target: &Locator) -> String {
    match target {
        Locator::Selector(sel) => format!("{} {}", sel.kind.wire_name(), sel.value),
        Locator::Coordinate(p) => format!("({}, {})", p.x, p.y),
    }
}

fn mouse_js(events: &[&str], button: u8) -> String {
    let dispatch: Vec<String> = events
        .iter()
        .map(|ev| {
            format!(
                "el.dispatchEvent(new MouseEvent('{ev}', {{ bubbles: true, cancelable: true, view: window, button: {button}, clientX: cx, clientY: cy }}));"
            )
        })
        .collect();
    format!(
        "const r = el.getBoundingClientRect(); const cx = r.left + r.width / 2; const cy = r.top + r.height / 2; {} return 'ok';",
        dispatch.join(" ")
    )
}

/// 从一点到另一点的指针事件序列（按 steps 插值），可选先后加 dragstart/drop
fn pointer_path_js(from: Point, to: Point, duration_ms: u64, drag: bool) -> String {
    format!(
        r#"new Promise((resolve) => {{
            const start = document.elementFromPoint({fx}, {fy});
            if (!start) {{ resolve('missing'); return; }}
            const opts = (x, y) => ({{ bubbles: true, cancelable: true, view: window, clientX: x, clientY: y }});
            const dt = {drag} ? new DataTransfer() : null;
            start.dispatchEvent(new MouseEvent('mousedown', opts({fx}, {fy})));
            if (dt) start.dispatchEvent(new DragEvent('dragstart', {{ ...opts({fx}, {fy}), dataTransfer: dt }}));
            const steps = 10;
            let i = 0;
            const timer = setInterval(() => {{
                i++;
                const x = {fx} + ({tx} - {fx}) * i / steps;
                const y = {fy} + ({ty} - {fy}) * i / steps;
                const over = document.elementFromPoint(x, y) || start;
                over.dispatchEvent(new MouseEvent('mousemove', opts(x, y)));
                if (dt) over.dispatchEvent(new DragEvent('dragover', {{ ...opts(x, y), dataTransfer: dt }}));
                if (i >= steps) {{
                    clearInterval(timer);
                    const end = document.elementFromPoint({tx}, {ty}) || start;
                    if (dt) end.dispatchEvent(new DragEvent('drop', {{ ...opts({tx}, {ty}), dataTransfer: dt }}));
                    end.dispatchEvent(new MouseEvent('mouseup', opts({tx}, {ty})));
                    if (dt) start.dispatchEvent(new DragEvent('dragend', {{ ...opts({tx}, {ty}), dataTransfer: dt }}));
                    resolve('ok');
                }}
            }}, Math.max(1, Math.floor({duration} / steps)));
        }})"#,
        fx = from.x,
        fy = from.y,
        tx = to.x,
        ty = to.y,
        duration = duration_ms,
        drag = drag,
    )
}

#[async_trait]
impl PageDriver for ChromeDriver {
    async fn screenshot_base64(&self) -> Result<String, DriverError> {
        let png = self.take_screenshot().await?;
        Ok(base64::engine::general_purpose::STANDARD.encode(png))
    }

    async fn page_source(&self) -> Result<String, DriverError> {
        self.blocking(|tab| {
            tab.get_content()
                .map_err(|e| DriverError::Backend(format!("Get content failed: {}", e)))
        })
        .await
    }

    async fn url(&self) -> Result<String, DriverError> {
        self.blocking(|tab| Ok(tab.get_url())).await
    }

    async fn click(&self, target: &Locator) -> Result<(), DriverError> {
        self.on_element(target, "el.click(); return 'ok';", false).await
    }

    async fn double_click(&self, target: &Locator) -> Result<(), DriverError> {
        self.on_element(target, &mouse_js(&["mousedown", "mouseup", "click", "mousedown", "mouseup", "click", "dblclick"], 0), false)
            .await
    }

    async fn right_click(&self, target: &Locator) -> Result<(), DriverError> {
        self.on_element(target, &mouse_js(&["mousedown", "mouseup", "contextmenu"], 2), false)
            .await
    }

    async fn hover(&self, target: &Locator) -> Result<(), DriverError> {
        self.on_element(target, &mouse_js(&["mouseover", "mouseenter", "mousemove"], 0), false)
            .await
    }

    async fn long_press(&self, target: &Locator, duration_ms: u64) -> Result<(), DriverError> {
        let body = format!(
            "el.dispatchEvent(new MouseEvent('mousedown', {{ bubbles: true }})); \
             return new Promise((resolve) => setTimeout(() => {{ \
             el.dispatchEvent(new MouseEvent('mouseup', {{ bubbles: true }})); resolve('ok'); }}, {duration_ms}));"
        );
        self.on_element(target, &body, true).await
    }

    async fn type_text(&self, target: &Locator, text: &str, mode: InputMode) -> Result<(), DriverError> {
        let next = match mode {
            InputMode::Replace => js_str(text),
            InputMode::Append => format!("(el.value || '') + {}", js_str(text)),
            InputMode::Clear => "''".to_string(),
        };
        let body = format!(
            "el.focus(); \
             if ('value' in el) {{ el.value = {next}; }} else {{ el.textContent = {next}; }} \
             el.dispatchEvent(new Event('input', {{ bubbles: true }})); \
             el.dispatchEvent(new Event('change', {{ bubbles: true }})); return 'ok';"
        );
        self.on_element(target, &body, false).await
    }

    async fn clear_input(&self, target: &Locator) -> Result<(), DriverError> {
        self.type_text(target, "", InputMode::Clear).await
    }

    async fn key_press(&self, key: &str, target: Option<&Locator>) -> Result<(), DriverError> {
        if let Some(target) = target {
            self.on_element(target, "el.focus(); return 'ok';", false).await?;
        }
        let key = key.to_string();
        self.blocking(move |tab| {
            tab.press_key(&key)
                .map(|_| ())
                .map_err(|e| DriverError::Backend(format!("Key press failed: {}", e)))
        })
        .await
    }

    async fn scroll(
        &self,
        target: Option<&Locator>,
        direction: ScrollDirection,
        distance: Option<u32>,
    ) -> Result<(), DriverError> {
        let amount = match distance {
            Some(d) => d.to_string(),
            None if direction.is_horizontal() => "Math.round(window.innerWidth * 0.8)".to_string(),
            None => "Math.round(window.innerHeight * 0.8)".to_string(),
        };
        let (dx, dy) = match direction {
            ScrollDirection::Up => ("0".to_string(), format!("-({amount})")),
            ScrollDirection::Down => ("0".to_string(), amount),
            ScrollDirection::Left => (format!("-({amount})"), "0".to_string()),
            ScrollDirection::Right => (amount, "0".to_string()),
        };
        match target {
            Some(target) => {
                self.on_element(target, &format!("el.scrollBy({dx}, {dy}); return 'ok';"), false)
                    .await
            }
            None => self
                .eval(format!("window.scrollBy({dx}, {dy}); 'ok'"), false)
                .await
                .map(|_| ()),
        }
    }

    async fn swipe(&self, from: Point, to: Point, duration_ms: u64) -> Result<(), DriverError> {
        match self.eval(pointer_path_js(from, to, duration_ms, false), true).await? {
            serde_json::Value::String(s) if s == "missing" => {
                Err(DriverError::ElementNotFound(describe(&Locator::Coordinate(from))))
            }
            _ => Ok(()),
        }
    }

    async fn drag_and_drop(&self, from: Point, to: Point) -> Result<(), DriverError> {
        match self.eval(pointer_path_js(from, to, 300, true), true).await? {
            serde_json::Value::String(s) if s == "missing" => {
                Err(DriverError::ElementNotFound(describe(&Locator::Coordinate(from))))
            }
            _ => Ok(()),
        }
    }

    async fn navigate(&self, url: &str) -> Result<(), DriverError> {
        let url = url.to_string();
        self.blocking(move |tab| {
            tab.navigate_to(&url)
                .and_then(|t| t.wait_until_navigated())
                .map(|_| ())
                .map_err(|e| DriverError::Backend(format!("Navigate failed: {}", e)))
        })
        .await
    }

    async fn reload(&self) -> Result<(), DriverError> {
        self.blocking(|tab| {
            tab.reload(false, None)
                .and_then(|t| t.wait_until_navigated())
                .map(|_| ())
                .map_err(|e| DriverError::Backend(format!("Reload failed: {}", e)))
        })
        .await
    }

    async fn go_back(&self) -> Result<(), DriverError> {
        self.eval("history.back(); 'ok'".to_string(), false).await?;
        self.blocking(|tab| {
            tab.wait_until_navigated()
                .map(|_| ())
                .map_err(|e| DriverError::Backend(format!("Go back failed: {}", e)))
        })
        .await
    }

    async fn execute_script(&self, script: &str) -> Result<serde_json::Value, DriverError> {
        self.eval(script.to_string(), true).await
    }

    async fn take_screenshot(&self) -> Result<Vec<u8>, DriverError> {
        self.blocking(|tab| {
            tab.capture_screenshot(CaptureScreenshotFormatOption::Png, None, None, true)
                .map_err(|e| DriverError::Backend(format!("Screenshot failed: {}", e)))
        })
        .await
    }
}
