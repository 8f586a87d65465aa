//! OpenAI 兼容 API 客户端
//!
//! 通过 async_openai 调用任意 OpenAI 兼容端点（可配置 base_url）；用户消息中的截图以
//! `data:image/png;base64,...` 图片片段发送，适用于 OpenAI、DeepSeek、通义、Gemini 兼容层、Ollama 等。
//! Azure OpenAI 使用 `AzureConfig`（部署名 + api-version），其余逻辑相同。

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_openai::config::{AzureConfig, Config, OpenAIConfig};
use async_openai::types::chat::{
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestMessageContentPartImageArgs,
    ChatCompletionRequestMessageContentPartTextArgs,
    ChatCompletionRequestUserMessageArgs, ChatCompletionRequestUserMessageContentPart,
    CreateChatCompletionRequestArgs, ImageDetail, ImageUrlArgs,
};
use async_openai::Client;
use async_trait::async_trait;

use crate::llm::{LlmClient, LlmError};
use crate::memory::{ContentPart, Message, Role};

/// Token 使用统计（累计值）
#[derive(Debug, Clone, Default)]
pub struct TokenUsage {
    pub prompt_tokens: Arc<AtomicU64>,
    pub completion_tokens: Arc<AtomicU64>,
    pub total_tokens: Arc<AtomicU64>,
}

impl TokenUsage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, prompt: u64, completion: u64) {
        self.prompt_tokens.fetch_add(prompt, Ordering::Relaxed);
        self.completion_tokens.fetch_add(completion, Ordering::Relaxed);
        self.total_tokens.fetch_add(prompt + completion, Ordering::Relaxed);
    }

    pub fn get(&self) -> (u64, u64, u64) {
        (
            self.prompt_tokens.load(Ordering::Relaxed),
            self.completion_tokens.load(Ordering::Relaxed),
            self.total_tokens.load(Ordering::Relaxed),
        )
    }
}

/// OpenAI 兼容客户端：持有 Client、model 名与单次请求超时
pub struct OpenAiClient<C: Config = OpenAIConfig> {
    client: Client<C>,
    model: String,
    timeout: Duration,
    /// 累计 token 使用统计
    pub usage: TokenUsage,
}

impl OpenAiClient {
    pub fn new(base_url: Option<&str>, model: &str, api_key: Option<&str>) -> Self {
        let api_key = api_key
            .map(String::from)
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .unwrap_or_else(|| "sk-placeholder".to_string());

        let config = if let Some(url) = base_url {
            OpenAIConfig::new().with_api_base(url).with_api_key(api_key)
        } else {
            OpenAIConfig::new().with_api_key(api_key)
        };

        Self {
            client: Client::with_config(config),
            model: model.to_string(),
            timeout: Duration::from_secs(60),
            usage: TokenUsage::new(),
        }
    }
}

impl OpenAiClient<AzureConfig> {
    /// Azure OpenAI：`api_base` 为资源地址，`deployment` 同时作为请求中的 model 名
    pub fn azure(api_base: &str, api_version: &str, deployment: &str, api_key: &str) -> Self {
        let config = AzureConfig::new()
            .with_api_base(api_base)
            .with_api_version(api_version)
            .with_deployment_id(deployment)
            .with_api_key(api_key);
        Self {
            client: Client::with_config(config),
            model: deployment.to_string(),
            timeout: Duration::from_secs(60),
            usage: TokenUsage::new(),
        }
    }
}

impl<C: Config> OpenAiClient<C> {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn to_openai_messages(
        &self,
        messages: &[Message],
    ) -> Result<Vec<ChatCompletionRequestMessage>, LlmError> {
        messages.iter().map(to_openai_message).collect()
    }
}

fn invalid(e: impl std::fmt::Display) -> LlmError {
    LlmError::InvalidRequest(e.to_string())
}

fn to_openai_message(m: &Message) -> Result<ChatCompletionRequestMessage, LlmError> {
    Ok(match m.role {
        Role::Assistant => ChatCompletionRequestMessage::Assistant(
            ChatCompletionRequestAssistantMessageArgs::default()
                .content(m.text())
                .build()
                .map_err(invalid)?,
        ),
        // 纯文本用户消息走字符串形式，兼容不支持多模态数组的端点
        Role::User if !m.has_image() => ChatCompletionRequestMessage::User(
            ChatCompletionRequestUserMessageArgs::default()
                .content(m.text())
                .build()
                .map_err(invalid)?,
        ),
        Role::User => {
            let parts = m
                .parts
                .iter()
                .map(to_openai_part)
                .collect::<Result<Vec<_>, _>>()?;
            ChatCompletionRequestMessage::User(
                ChatCompletionRequestUserMessageArgs::default()
                    .content(parts)
                    .build()
                    .map_err(invalid)?,
            )
        }
    })
}

fn to_openai_part(part: &ContentPart) -> Result<ChatCompletionRequestUserMessageContentPart, LlmError> {
    Ok(match part {
        ContentPart::Text { text } => ChatCompletionRequestMessageContentPartTextArgs::default()
            .text(text.clone())
            .build()
            .map_err(invalid)?
            .into(),
        ContentPart::Image { .. } => {
            let url = part.data_url().unwrap_or_default();
            ChatCompletionRequestMessageContentPartImageArgs::default()
                .image_url(
                    ImageUrlArgs::default()
                        .url(url)
                        .detail(ImageDetail::High)
                        .build()
                        .map_err(invalid)?,
                )
                .build()
                .map_err(invalid)?
                .into()
        }
    })
}

#[async_trait]
impl<C: Config + 'static> LlmClient for OpenAiClient<C> {
    fn token_usage(&self) -> (u64, u64, u64) {
        self.usage.get()
    }

    async fn complete(&self, messages: &[Message]) -> Result<String, LlmError> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(self.to_openai_messages(messages)?)
            .build()
            .map_err(invalid)?;

        let response = tokio::time::timeout(self.timeout, self.client.chat().create(request))
            .await
            .map_err(|_| LlmError::Timeout(self.timeout.as_secs()))?
            .map_err(|e| LlmError::Request(e.to_string()))?;

        // 提取 token 使用统计
        if let Some(usage) = &response.usage {
            self.usage
                .add(usage.prompt_tokens as u64, usage.completion_tokens as u64);
            tracing::debug!(
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "llm usage"
            );
        }

        let content = response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .unwrap_or_default();

        if content.trim().is_empty() {
            return Err(LlmError::EmptyReply);
        }
        Ok(content)
    }
}
