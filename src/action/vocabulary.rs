//! 动作词汇表：封闭的动作种类集合
//!
//! 每个种类有一个规范标签（写入缓存与提示词）、若干别名（解析模型输出时接受）、
//! 所属分组与参数说明；提示词中的「可用动作」段落由 [`describe_vocabulary`] 动态生成。

use std::fmt;

/// 动作分组（仅用于提示词排版）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionCategory {
    Mouse,
    Input,
    Scroll,
    Gesture,
    Navigation,
    Utility,
}

impl ActionCategory {
    pub const ALL: [ActionCategory; 6] = [
        ActionCategory::Mouse,
        ActionCategory::Input,
        ActionCategory::Scroll,
        ActionCategory::Gesture,
        ActionCategory::Navigation,
        ActionCategory::Utility,
    ];

    pub fn title(self) -> &'static str {
        match self {
            ActionCategory::Mouse => "Mouse",
            ActionCategory::Input => "Input",
            ActionCategory::Scroll => "Scroll",
            ActionCategory::Gesture => "Gesture",
            ActionCategory::Navigation => "Navigation",
            ActionCategory::Utility => "Utility",
        }
    }
}

/// 动作种类（不含参数）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    Click,
    DoubleClick,
    RightClick,
    Hover,
    LongPress,
    Input,
    ClearInput,
    KeyPress,
    Scroll,
    Swipe,
    DragAndDrop,
    Navigate,
    Reload,
    GoBack,
    EvaluateScript,
    Screenshot,
    Sleep,
    Assert,
    WaitFor,
}

impl ActionKind {
    pub const ALL: [ActionKind; 19] = [
        ActionKind::Click,
        ActionKind::DoubleClick,
        ActionKind::RightClick,
        ActionKind::Hover,
        ActionKind::LongPress,
        ActionKind::Input,
        ActionKind::ClearInput,
        ActionKind::KeyPress,
        ActionKind::Scroll,
        ActionKind::Swipe,
        ActionKind::DragAndDrop,
        ActionKind::Navigate,
        ActionKind::Reload,
        ActionKind::GoBack,
        ActionKind::EvaluateScript,
        ActionKind::Screenshot,
        ActionKind::Sleep,
        ActionKind::Assert,
        ActionKind::WaitFor,
    ];

    /// 规范标签（缓存文件与提示词使用）
    pub fn tag(self) -> &'static str {
        match self {
            ActionKind::Click => "CLICK",
            ActionKind::DoubleClick => "DOUBLE_CLICK",
            ActionKind::RightClick => "RIGHT_CLICK",
            ActionKind::Hover => "HOVER",
            ActionKind::LongPress => "LONG_PRESS",
            ActionKind::Input => "INPUT",
            ActionKind::ClearInput => "CLEAR_INPUT",
            ActionKind::KeyPress => "KEYBOARD_PRESS",
            ActionKind::Scroll => "SCROLL",
            ActionKind::Swipe => "SWIPE",
            ActionKind::DragAndDrop => "DRAG_AND_DROP",
            ActionKind::Navigate => "NAVIGATE",
            ActionKind::Reload => "RELOAD",
            ActionKind::GoBack => "GO_BACK",
            ActionKind::EvaluateScript => "EVALUATE_SCRIPT",
            ActionKind::Screenshot => "SCREENSHOT",
            ActionKind::Sleep => "SLEEP",
            ActionKind::Assert => "ASSERT",
            ActionKind::WaitFor => "WAIT_FOR",
        }
    }

    /// 解析时额外接受的标签
    pub fn aliases(self) -> &'static [&'static str] {
        match self {
            ActionKind::Click => &["TAP"],
            ActionKind::DoubleClick => &["DOUBLECLICK", "DBLCLICK"],
            ActionKind::RightClick => &["CONTEXT_CLICK"],
            ActionKind::Input => &["TYPE_TEXT", "TYPE"],
            ActionKind::KeyPress => &["KEY_PRESS", "PRESS_KEY"],
            ActionKind::Scroll => &[
                "SCROLL_UP",
                "SCROLL_DOWN",
                "SCROLL_LEFT",
                "SCROLL_RIGHT",
            ],
            ActionKind::DragAndDrop => &["DRAG"],
            ActionKind::Navigate => &["GOTO", "OPEN_URL"],
            ActionKind::Reload => &["REFRESH"],
            ActionKind::GoBack => &["BACK"],
            ActionKind::EvaluateScript => &["EXECUTE_SCRIPT", "SCRIPT"],
            ActionKind::Screenshot => &["TAKE_SCREENSHOT"],
            _ => &[],
        }
    }

    pub fn category(self) -> ActionCategory {
        match self {
            ActionKind::Click
            | ActionKind::DoubleClick
            | ActionKind::RightClick
            | ActionKind::Hover
            | ActionKind::LongPress => ActionCategory::Mouse,
            ActionKind::Input | ActionKind::ClearInput | ActionKind::KeyPress => {
                ActionCategory::Input
            }
            ActionKind::Scroll => ActionCategory::Scroll,
            ActionKind::Swipe | ActionKind::DragAndDrop => ActionCategory::Gesture,
            ActionKind::Navigate | ActionKind::Reload | ActionKind::GoBack => {
                ActionCategory::Navigation
            }
            ActionKind::EvaluateScript
            | ActionKind::Screenshot
            | ActionKind::Sleep
            | ActionKind::Assert
            | ActionKind::WaitFor => ActionCategory::Utility,
        }
    }

    /// 提示词中的一句话说明
    pub fn summary(self) -> &'static str {
        match self {
            ActionKind::Click => "Click an element",
            ActionKind::DoubleClick => "Double-click an element",
            ActionKind::RightClick => "Right-click an element to open its context menu",
            ActionKind::Hover => "Move the pointer over an element",
            ActionKind::LongPress => "Press and hold an element",
            ActionKind::Input => "Type text into an input element",
            ActionKind::ClearInput => "Clear the content of an input element",
            ActionKind::KeyPress => "Press a keyboard key, optionally on a focused element",
            ActionKind::Scroll => "Scroll the page or a scrollable element",
            ActionKind::Swipe => "Swipe from one point to another",
            ActionKind::DragAndDrop => "Drag from one point and drop at another",
            ActionKind::Navigate => "Open a URL in the current page",
            ActionKind::Reload => "Reload the current page",
            ActionKind::GoBack => "Go back in browser history",
            ActionKind::EvaluateScript => "Run a JavaScript snippet in the page",
            ActionKind::Screenshot => "Capture a screenshot",
            ActionKind::Sleep => "Wait for a fixed time",
            ActionKind::Assert => "State a condition that should hold (logged only)",
            ActionKind::WaitFor => "State a condition to wait for (logged only)",
        }
    }

    /// 参数说明
    pub fn params(self) -> &'static str {
        match self {
            ActionKind::Click
            | ActionKind::DoubleClick
            | ActionKind::RightClick
            | ActionKind::Hover
            | ActionKind::ClearInput => "elementSelector + selectorType, or locate {x, y}",
            ActionKind::LongPress => "elementSelector or locate; durationMs (default 1000)",
            ActionKind::Input => {
                "elementSelector or locate; value; inputMode replace|append|clear (default replace)"
            }
            ActionKind::KeyPress => "keyName (e.g. Enter, Tab, Escape); optional elementSelector or locate",
            ActionKind::Scroll => {
                "direction up|down|left|right; optional distance in pixels; optional elementSelector or locate"
            }
            ActionKind::Swipe => "from {x, y}; to {x, y}; durationMs (default 500)",
            ActionKind::DragAndDrop => "from {x, y}; to {x, y}",
            ActionKind::Navigate => "url",
            ActionKind::Reload | ActionKind::GoBack | ActionKind::Screenshot => "none",
            ActionKind::EvaluateScript => "script",
            ActionKind::Sleep => "sleepMs (default 1000)",
            ActionKind::Assert => "assertion",
            ActionKind::WaitFor => "assertion; timeoutMs",
        }
    }

    /// 按标签或别名查找（大小写不敏感，`-` 与空格视同 `_`）
    pub fn from_tag(raw: &str) -> Option<ActionKind> {
        let tag = normalize_tag(raw);
        ActionKind::ALL
            .into_iter()
            .find(|k| k.tag() == tag || k.aliases().contains(&tag.as_str()))
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

pub(crate) fn normalize_tag(raw: &str) -> String {
    raw.trim().to_ascii_uppercase().replace(['-', ' '], "_")
}

/// 生成提示词中的「可用动作」段落，按分组排列
pub fn describe_vocabulary() -> String {
    let mut out = String::new();
    for category in ActionCategory::ALL {
        out.push_str(&format!("### {}\n", category.title()));
        for kind in ActionKind::ALL.into_iter().filter(|k| k.category() == category) {
            out.push_str(&format!("- {}: {}. Params: {}\n", kind.tag(), kind.summary(), kind.params()));
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_tag_aliases_and_case() {
        assert_eq!(ActionKind::from_tag("tap"), Some(ActionKind::Click));
        assert_eq!(ActionKind::from_tag("Double-Click"), Some(ActionKind::DoubleClick));
        assert_eq!(ActionKind::from_tag("type_text"), Some(ActionKind::Input));
        assert_eq!(ActionKind::from_tag("scroll_up"), Some(ActionKind::Scroll));
        assert_eq!(ActionKind::from_tag("TELEPORT"), None);
    }

    #[test]
    fn test_tags_are_unique() {
        let mut tags: Vec<&str> = ActionKind::ALL.iter().map(|k| k.tag()).collect();
        tags.extend(ActionKind::ALL.iter().flat_map(|k| k.aliases().iter().copied()));
        let total = tags.len();
        tags.sort_unstable();
        tags.dedup();
        assert_eq!(tags.len(), total);
    }

    #[test]
    fn test_describe_vocabulary_lists_every_kind() {
        let text = describe_vocabulary();
        for kind in ActionKind::ALL {
            assert!(text.contains(kind.tag()), "missing {}", kind);
        }
        assert!(text.contains("### Gesture"));
    }
}
