//! Mock LLM 客户端（用于测试，无需 API）
//!
//! 按顺序返回预设回复；预设用完后返回默认回复（点击 (125, 125) 的单动作计划）。
//! 记录调用次数与每次收到的完整历史，便于断言「是否调用了模型」「重试时带了什么」。

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::llm::{LlmClient, LlmError};
use crate::memory::Message;

pub const DEFAULT_MOCK_REPLY: &str = r#"{ "actions": [ { "type": "TAP", "locate": { "left": 100, "top": 100, "width": 50, "height": 50 } } ], "log": "mock plan" }"#;

#[derive(Debug)]
pub struct MockLlmClient {
    replies: Mutex<VecDeque<Result<String, LlmError>>>,
    default_reply: String,
    calls: AtomicUsize,
    requests: Mutex<Vec<Vec<Message>>>,
}

impl Default for MockLlmClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            default_reply: DEFAULT_MOCK_REPLY.to_string(),
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// 依次返回给定回复
    pub fn with_replies<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mock = Self::new();
        for r in replies {
            mock.push_reply(r);
        }
        mock
    }

    /// 预设用完后的回复
    pub fn with_default_reply(mut self, reply: impl Into<String>) -> Self {
        self.default_reply = reply.into();
        self
    }

    pub fn push_reply(&self, reply: impl Into<String>) {
        lock(&self.replies).push_back(Ok(reply.into()));
    }

    pub fn push_error(&self, err: LlmError) {
        lock(&self.replies).push_back(Err(err));
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// 每次调用收到的历史（按调用顺序）
    pub fn requests(&self) -> Vec<Vec<Message>> {
        lock(&self.requests).clone()
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.requests).push(messages.to_vec());
        let next = lock(&self.replies).pop_front();
        next.unwrap_or_else(|| Ok(self.default_reply.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_then_default() {
        let mock = MockLlmClient::with_replies(["first"]);
        mock.push_error(LlmError::EmptyReply);
        let msgs = vec![Message::user("hi")];
        assert_eq!(mock.complete(&msgs).await.unwrap(), "first");
        assert_eq!(mock.complete(&msgs).await, Err(LlmError::EmptyReply));
        assert_eq!(mock.complete(&msgs).await.unwrap(), DEFAULT_MOCK_REPLY);
        assert_eq!(mock.calls(), 3);
        assert_eq!(mock.requests().len(), 3);
    }
}
