//! 线上格式：模型回复与缓存文件中的动作 JSON
//!
//! 字段全部可选、数值一律按 f64 接收（模型常输出 `100.0`），驼峰命名并兼容 snake_case；
//! 未知字段忽略。`item` / `plan` 模块通过 serde `from` / `into` 在此格式与强类型之间转换。

use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};

/// 坐标：`{x, y}`，或旧式矩形 `{left, top, width, height}`（取中心点）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct WirePoint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(skip)]
    pub left: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(skip)]
    pub top: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(skip)]
    pub width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(skip)]
    pub height: Option<f64>,
}

impl WirePoint {
    pub fn at(x: i32, y: i32) -> Self {
        Self {
            x: Some(x as f64),
            y: Some(y as f64),
            ..Self::default()
        }
    }

    /// 解析为整数像素坐标；矩形取中心，缺少坐标返回 None
    pub fn resolve(&self) -> Option<(i32, i32)> {
        if let (Some(x), Some(y)) = (self.x, self.y) {
            return Some((x.round() as i32, y.round() as i32));
        }
        if let (Some(left), Some(top)) = (self.left, self.top) {
            let cx = left + self.width.unwrap_or(0.0) / 2.0;
            let cy = top + self.height.unwrap_or(0.0) / 2.0;
            return Some((cx.round() as i32, cy.round() as i32));
        }
        None
    }
}

/// 单个动作（模型输出的扁平对象）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct WireAction {
    /// 动作类型，如 CLICK、INPUT、SCROLL（大小写不敏感）
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// 目标元素中心坐标（截图像素）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locate: Option<WirePoint>,
    /// 元素选择器（XPath 或 CSS），优先于 locate
    #[serde(default, alias = "element_selector", skip_serializing_if = "Option::is_none")]
    pub element_selector: Option<String>,
    /// BY_XPATH / BY_CSS；缺省时按选择器文本推断
    #[serde(default, alias = "selector_type", skip_serializing_if = "Option::is_none")]
    pub selector_type: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub text: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub value: Option<String>,
    /// replace / append / clear
    #[serde(default, alias = "input_mode", skip_serializing_if = "Option::is_none")]
    pub input_mode: Option<String>,
    #[serde(default, alias = "key_name", skip_serializing_if = "Option::is_none")]
    pub key_name: Option<String>,
    /// up / down / left / right
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<String>,
    #[serde(default, alias = "scroll_type", skip_serializing_if = "Option::is_none")]
    pub scroll_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<WirePoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<WirePoint>,
    #[serde(default, alias = "duration_ms", skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<f64>,
    #[serde(default, alias = "sleep_ms", skip_serializing_if = "Option::is_none")]
    pub sleep_ms: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assertion: Option<String>,
    #[serde(default, alias = "timeout_ms", skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script: Option<String>,
}

/// 动作计划（模型回复的顶层对象）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct WirePlan {
    /// 按顺序执行的动作
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actions: Option<Vec<WireAction>>,
    /// 规划理由
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log: Option<String>,
    /// 执行完这些动作后指令是否仍未完成
    #[serde(
        default,
        alias = "more_actions_needed_by_instruction",
        skip_serializing_if = "Option::is_none"
    )]
    pub more_actions_needed_by_instruction: Option<bool>,
    /// 执行完动作后的等待毫秒数
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sleep: Option<f64>,
    /// 无法完成指令时的原因
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// 字符串字段宽松解析：数字与布尔转为文本，null 视为缺省
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

/// 正的毫秒/像素数值转 u64；负数与 NaN 视为缺省
pub(crate) fn positive_u64(v: Option<f64>) -> Option<u64> {
    v.filter(|n| n.is_finite() && *n >= 0.0).map(|n| n.round() as u64)
}
