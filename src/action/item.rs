//! 强类型动作：ActionItem 封闭枚举
//!
//! 每个变体只携带自己需要的参数；目标元素为 [`Locator`]（选择器或坐标，二者择一，选择器优先）。
//! 与线上格式的互转见 `From<WireAction>` / `From<ActionItem>`。

use serde::{Deserialize, Serialize};

use super::vocabulary::{normalize_tag, ActionKind};
use super::wire::{positive_u64, WireAction, WirePoint};

pub const DEFAULT_LONG_PRESS_MS: u64 = 1000;
pub const DEFAULT_SWIPE_MS: u64 = 500;
pub const DEFAULT_SLEEP_MS: u64 = 1000;
pub const DEFAULT_WAIT_FOR_MS: u64 = 30_000;

/// 屏幕坐标（截图像素）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    fn from_wire(p: &WirePoint) -> Option<Self> {
        p.resolve().map(|(x, y)| Self { x, y })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectorKind {
    XPath,
    Css,
}

impl SelectorKind {
    pub fn wire_name(self) -> &'static str {
        match self {
            SelectorKind::XPath => "BY_XPATH",
            SelectorKind::Css => "BY_CSS",
        }
    }

    /// 解析 selectorType；无法识别时按选择器文本推断（以 `/` 或 `(` 开头视为 XPath）
    fn resolve(declared: Option<&str>, selector: &str) -> Self {
        match declared.map(normalize_tag).as_deref() {
            Some("BY_XPATH") | Some("XPATH") => SelectorKind::XPath,
            Some("BY_CSS") | Some("CSS") | Some("BY_CSS_SELECTOR") => SelectorKind::Css,
            _ => {
                let s = selector.trim_start();
                if s.starts_with('/') || s.starts_with('(') {
                    SelectorKind::XPath
                } else {
                    SelectorKind::Css
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementSelector {
    pub kind: SelectorKind,
    pub value: String,
}

impl ElementSelector {
    pub fn css(value: impl Into<String>) -> Self {
        Self {
            kind: SelectorKind::Css,
            value: value.into(),
        }
    }

    pub fn xpath(value: impl Into<String>) -> Self {
        Self {
            kind: SelectorKind::XPath,
            value: value.into(),
        }
    }
}

/// 目标元素：选择器或坐标
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    Selector(ElementSelector),
    Coordinate(Point),
}

impl Locator {
    /// 从线上动作取目标；选择器非空时优先，否则用 locate，都没有返回 None
    fn from_wire(a: &WireAction) -> Option<Self> {
        if let Some(sel) = a.element_selector.as_deref().filter(|s| !s.trim().is_empty()) {
            return Some(Locator::Selector(ElementSelector {
                kind: SelectorKind::resolve(a.selector_type.as_deref(), sel),
                value: sel.to_string(),
            }));
        }
        a.locate
            .as_ref()
            .and_then(Point::from_wire)
            .map(Locator::Coordinate)
    }

    fn write_wire(&self, a: &mut WireAction) {
        match self {
            Locator::Selector(sel) => {
                a.element_selector = Some(sel.value.clone());
                a.selector_type = Some(sel.kind.wire_name().to_string());
            }
            Locator::Coordinate(p) => a.locate = Some(WirePoint::at(p.x, p.y)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputMode {
    #[default]
    Replace,
    Append,
    Clear,
}

impl InputMode {
    pub fn as_str(self) -> &'static str {
        match self {
            InputMode::Replace => "replace",
            InputMode::Append => "append",
            InputMode::Clear => "clear",
        }
    }

    fn parse(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("append") => InputMode::Append,
            Some("clear") => InputMode::Clear,
            _ => InputMode::Replace,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScrollDirection {
    Up,
    #[default]
    Down,
    Left,
    Right,
}

impl ScrollDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            ScrollDirection::Up => "up",
            ScrollDirection::Down => "down",
            ScrollDirection::Left => "left",
            ScrollDirection::Right => "right",
        }
    }

    pub fn is_horizontal(self) -> bool {
        matches!(self, ScrollDirection::Left | ScrollDirection::Right)
    }

    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "up" => Some(ScrollDirection::Up),
            "down" => Some(ScrollDirection::Down),
            "left" => Some(ScrollDirection::Left),
            "right" => Some(ScrollDirection::Right),
            _ => None,
        }
    }
}

/// 一个待执行的 UI 动作
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "WireAction", into = "WireAction")]
pub enum ActionItem {
    Click { target: Option<Locator> },
    DoubleClick { target: Option<Locator> },
    RightClick { target: Option<Locator> },
    Hover { target: Option<Locator> },
    LongPress { target: Option<Locator>, duration_ms: u64 },
    Input { target: Option<Locator>, value: Option<String>, mode: InputMode },
    ClearInput { target: Option<Locator> },
    KeyPress { key: Option<String>, target: Option<Locator> },
    Scroll { target: Option<Locator>, direction: ScrollDirection, distance: Option<u32> },
    Swipe { from: Option<Point>, to: Option<Point>, duration_ms: u64 },
    DragAndDrop { from: Option<Point>, to: Option<Point> },
    Navigate { url: Option<String> },
    Reload,
    GoBack,
    EvaluateScript { script: Option<String> },
    Screenshot,
    Sleep { ms: u64 },
    Assert { assertion: Option<String> },
    WaitFor { assertion: Option<String>, timeout_ms: u64 },
    /// 词汇表之外的类型：执行时记录并跳过
    Unsupported { kind: String },
}

impl ActionItem {
    /// 所属种类；词汇表外的返回 None
    pub fn kind(&self) -> Option<ActionKind> {
        Some(match self {
            ActionItem::Click { .. } => ActionKind::Click,
            ActionItem::DoubleClick { .. } => ActionKind::DoubleClick,
            ActionItem::RightClick { .. } => ActionKind::RightClick,
            ActionItem::Hover { .. } => ActionKind::Hover,
            ActionItem::LongPress { .. } => ActionKind::LongPress,
            ActionItem::Input { .. } => ActionKind::Input,
            ActionItem::ClearInput { .. } => ActionKind::ClearInput,
            ActionItem::KeyPress { .. } => ActionKind::KeyPress,
            ActionItem::Scroll { .. } => ActionKind::Scroll,
            ActionItem::Swipe { .. } => ActionKind::Swipe,
            ActionItem::DragAndDrop { .. } => ActionKind::DragAndDrop,
            ActionItem::Navigate { .. } => ActionKind::Navigate,
            ActionItem::Reload => ActionKind::Reload,
            ActionItem::GoBack => ActionKind::GoBack,
            ActionItem::EvaluateScript { .. } => ActionKind::EvaluateScript,
            ActionItem::Screenshot => ActionKind::Screenshot,
            ActionItem::Sleep { .. } => ActionKind::Sleep,
            ActionItem::Assert { .. } => ActionKind::Assert,
            ActionItem::WaitFor { .. } => ActionKind::WaitFor,
            ActionItem::Unsupported { .. } => return None,
        })
    }

    /// 日志/审计用的类型名
    pub fn label(&self) -> String {
        match self {
            ActionItem::Unsupported { kind } => kind.clone(),
            other => other.kind().map(|k| k.tag().to_string()).unwrap_or_default(),
        }
    }

    pub fn click(target: Locator) -> Self {
        ActionItem::Click { target: Some(target) }
    }

    pub fn input(target: Locator, value: impl Into<String>) -> Self {
        ActionItem::Input {
            target: Some(target),
            value: Some(value.into()),
            mode: InputMode::Replace,
        }
    }
}

impl From<WireAction> for ActionItem {
    fn from(a: WireAction) -> Self {
        let raw = a.kind.clone().unwrap_or_default();
        let Some(kind) = ActionKind::from_tag(&raw) else {
            return ActionItem::Unsupported { kind: raw };
        };
        let target = Locator::from_wire(&a);
        let from = a.from.as_ref().and_then(Point::from_wire);
        let to = a.to.as_ref().and_then(Point::from_wire);
        match kind {
            ActionKind::Click => ActionItem::Click { target },
            ActionKind::DoubleClick => ActionItem::DoubleClick { target },
            ActionKind::RightClick => ActionItem::RightClick { target },
            ActionKind::Hover => ActionItem::Hover { target },
            ActionKind::LongPress => ActionItem::LongPress {
                target,
                duration_ms: positive_u64(a.duration_ms).unwrap_or(DEFAULT_LONG_PRESS_MS),
            },
            ActionKind::Input => ActionItem::Input {
                target,
                value: a.value.or(a.text),
                mode: InputMode::parse(a.input_mode.as_deref()),
            },
            ActionKind::ClearInput => ActionItem::ClearInput { target },
            ActionKind::KeyPress => ActionItem::KeyPress {
                key: a.key_name.or(a.value).or(a.text),
                target,
            },
            ActionKind::Scroll => {
                // SCROLL_UP 等别名自带方向，优先于 direction 字段
                let tag = normalize_tag(&raw);
                let direction = tag
                    .strip_prefix("SCROLL_")
                    .and_then(ScrollDirection::parse)
                    .or_else(|| a.direction.as_deref().and_then(ScrollDirection::parse))
                    .unwrap_or_default();
                ActionItem::Scroll {
                    target,
                    direction,
                    distance: positive_u64(a.distance).map(|d| d.min(u32::MAX as u64) as u32),
                }
            }
            ActionKind::Swipe => ActionItem::Swipe {
                from,
                to,
                duration_ms: positive_u64(a.duration_ms).unwrap_or(DEFAULT_SWIPE_MS),
            },
            ActionKind::DragAndDrop => ActionItem::DragAndDrop { from, to },
            ActionKind::Navigate => ActionItem::Navigate { url: a.url.or(a.value) },
            ActionKind::Reload => ActionItem::Reload,
            ActionKind::GoBack => ActionItem::GoBack,
            ActionKind::EvaluateScript => ActionItem::EvaluateScript {
                script: a.script.or(a.value),
            },
            ActionKind::Screenshot => ActionItem::Screenshot,
            ActionKind::Sleep => ActionItem::Sleep {
                ms: positive_u64(a.sleep_ms)
                    .or(positive_u64(a.duration_ms))
                    .unwrap_or(DEFAULT_SLEEP_MS),
            },
            ActionKind::Assert => ActionItem::Assert {
                assertion: a.assertion.or(a.text),
            },
            ActionKind::WaitFor => ActionItem::WaitFor {
                assertion: a.assertion.or(a.text),
                timeout_ms: positive_u64(a.timeout_ms).unwrap_or(DEFAULT_WAIT_FOR_MS),
            },
        }
    }
}

impl From<ActionItem> for WireAction {
    fn from(item: ActionItem) -> Self {
        let mut w = WireAction {
            kind: Some(item.label()),
            ..WireAction::default()
        };
        let set_target = |w: &mut WireAction, t: &Option<Locator>| {
            if let Some(t) = t {
                t.write_wire(w);
            }
        };
        match &item {
            ActionItem::Click { target }
            | ActionItem::DoubleClick { target }
            | ActionItem::RightClick { target }
            | ActionItem::Hover { target }
            | ActionItem::ClearInput { target } => set_target(&mut w, target),
            ActionItem::LongPress { target, duration_ms } => {
                set_target(&mut w, target);
                w.duration_ms = Some(*duration_ms as f64);
            }
            ActionItem::Input { target, value, mode } => {
                set_target(&mut w, target);
                w.value = value.clone();
                w.input_mode = Some(mode.as_str().to_string());
            }
            ActionItem::KeyPress { key, target } => {
                set_target(&mut w, target);
                w.key_name = key.clone();
            }
            ActionItem::Scroll { target, direction, distance } => {
                set_target(&mut w, target);
                w.direction = Some(direction.as_str().to_string());
                w.distance = distance.map(|d| d as f64);
            }
            ActionItem::Swipe { from, to, duration_ms } => {
                w.from = from.map(|p| WirePoint::at(p.x, p.y));
                w.to = to.map(|p| WirePoint::at(p.x, p.y));
                w.duration_ms = Some(*duration_ms as f64);
            }
            ActionItem::DragAndDrop { from, to } => {
                w.from = from.map(|p| WirePoint::at(p.x, p.y));
                w.to = to.map(|p| WirePoint::at(p.x, p.y));
            }
            ActionItem::Navigate { url } => w.url = url.clone(),
            ActionItem::EvaluateScript { script } => w.script = script.clone(),
            ActionItem::Sleep { ms } => w.sleep_ms = Some(*ms as f64),
            ActionItem::Assert { assertion } => w.assertion = assertion.clone(),
            ActionItem::WaitFor { assertion, timeout_ms } => {
                w.assertion = assertion.clone();
                w.timeout_ms = Some(*timeout_ms as f64);
            }
            ActionItem::Reload
            | ActionItem::GoBack
            | ActionItem::Screenshot
            | ActionItem::Unsupported { .. } => {}
        }
        w
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> ActionItem {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_selector_wins_over_coordinate() {
        let item = parse(r#"{"type": "CLICK", "locate": {"x": 10, "y": 20}, "elementSelector": "//button"}"#);
        assert_eq!(
            item,
            ActionItem::Click {
                target: Some(Locator::Selector(ElementSelector::xpath("//button")))
            }
        );
    }

    #[test]
    fn test_selector_type_inferred_and_declared() {
        let css = parse(r##"{"type": "hover", "elementSelector": "#menu"}"##);
        assert_eq!(
            css,
            ActionItem::Hover {
                target: Some(Locator::Selector(ElementSelector::css("#menu")))
            }
        );
        let declared = parse(r#"{"type": "hover", "elementSelector": "div", "selectorType": "BY_XPATH"}"#);
        assert_eq!(
            declared,
            ActionItem::Hover {
                target: Some(Locator::Selector(ElementSelector::xpath("div")))
            }
        );
    }

    #[test]
    fn test_tap_with_rect_becomes_click_at_center() {
        let item = parse(r#"{"type": "TAP", "locate": {"left": 100, "top": 100, "width": 50, "height": 50}}"#);
        assert_eq!(item, ActionItem::click(Locator::Coordinate(Point::new(125, 125))));
    }

    #[test]
    fn test_click_without_target() {
        assert_eq!(parse(r#"{"type": "click"}"#), ActionItem::Click { target: None });
    }

    #[test]
    fn test_scroll_alias_sets_direction() {
        let item = parse(r#"{"type": "SCROLL_UP", "distance": 300}"#);
        assert_eq!(
            item,
            ActionItem::Scroll {
                target: None,
                direction: ScrollDirection::Up,
                distance: Some(300)
            }
        );
        let plain = parse(r#"{"type": "SCROLL", "direction": "left"}"#);
        assert!(matches!(
            plain,
            ActionItem::Scroll { direction: ScrollDirection::Left, distance: None, .. }
        ));
    }

    #[test]
    fn test_defaults_for_durations() {
        assert!(matches!(
            parse(r#"{"type": "LONG_PRESS", "locate": {"x": 1, "y": 1}}"#),
            ActionItem::LongPress { duration_ms: 1000, .. }
        ));
        assert!(matches!(
            parse(r#"{"type": "SWIPE", "from": {"x": 1, "y": 1}, "to": {"x": 2, "y": 2}}"#),
            ActionItem::Swipe { duration_ms: 500, .. }
        ));
        assert_eq!(parse(r#"{"type": "SLEEP"}"#), ActionItem::Sleep { ms: 1000 });
        assert_eq!(parse(r#"{"type": "SLEEP", "sleepMs": 250}"#), ActionItem::Sleep { ms: 250 });
    }

    #[test]
    fn test_input_mode_and_text_fallback() {
        let item = parse(r##"{"type": "TYPE_TEXT", "elementSelector": "#q", "text": "rust", "inputMode": "APPEND"}"##);
        assert_eq!(
            item,
            ActionItem::Input {
                target: Some(Locator::Selector(ElementSelector::css("#q"))),
                value: Some("rust".into()),
                mode: InputMode::Append,
            }
        );
    }

    #[test]
    fn test_unknown_kind_is_unsupported() {
        let item = parse(r#"{"type": "TELEPORT", "url": "x"}"#);
        assert_eq!(item, ActionItem::Unsupported { kind: "TELEPORT".into() });
        assert!(item.kind().is_none());
        assert_eq!(item.label(), "TELEPORT");
    }

    #[test]
    fn test_serialize_uses_canonical_tag() {
        let item = ActionItem::input(Locator::Coordinate(Point::new(3, 4)), "hi");
        let v = serde_json::to_value(&item).unwrap();
        assert_eq!(v["type"], "INPUT");
        assert_eq!(v["locate"]["x"], 3.0);
        assert_eq!(v["value"], "hi");
        let back: ActionItem = serde_json::from_value(v).unwrap();
        assert_eq!(back, item);
    }
}
