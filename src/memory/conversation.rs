//! 对话历史：一次指令调用内的多轮消息
//!
//! 每次调用开始时为空；每个尝试追加「用户消息（提示词 + 截图 + 页面源码）」与「模型回复」，
//! 失败时可追加一条错误说明。缓存失效后由编排器整体清空。

use serde::{Deserialize, Serialize};

/// 消息角色（与 LLM API 一致）
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    User,
    Assistant,
}

/// 消息内容片段：文本或图片（base64）
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    Image { data_base64: String, mime: String },
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        ContentPart::Text { text: text.into() }
    }

    /// PNG 截图
    pub fn png(data_base64: impl Into<String>) -> Self {
        ContentPart::Image {
            data_base64: data_base64.into(),
            mime: "image/png".to_string(),
        }
    }

    /// `data:` URL 形式，供 OpenAI 兼容接口使用
    pub fn data_url(&self) -> Option<String> {
        match self {
            ContentPart::Image { data_base64, mime } => Some(format!("data:{mime};base64,{data_base64}")),
            ContentPart::Text { .. } => None,
        }
    }
}

/// 单条消息（可含多个片段）
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub parts: Vec<ContentPart>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self::user_parts(vec![ContentPart::text(content)])
    }

    pub fn user_parts(parts: Vec<ContentPart>) -> Self {
        Self {
            role: Role::User,
            parts,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            parts: vec![ContentPart::text(content)],
        }
    }

    /// 拼接全部文本片段（图片忽略）
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                ContentPart::Text { text } => Some(text.as_str()),
                ContentPart::Image { .. } => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn has_image(&self) -> bool {
        self.parts.iter().any(|p| matches!(p, ContentPart::Image { .. }))
    }
}

/// 单次调用的对话历史（只追加，可整体清空）
#[derive(Clone, Debug, Default)]
pub struct ConversationHistory {
    messages: Vec<Message>,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, msg: Message) {
        self.messages.push(msg);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
