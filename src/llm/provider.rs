//! 模型后端选择：OpenAI 兼容端点列表与 Mock
//!
//! 各后端都走 OpenAI 兼容协议，仅默认地址、默认模型与 API Key 环境变量不同。
//! - OpenAI: https://api.openai.com/v1（gpt-4o）
//! - DeepSeek: https://api.deepseek.com（deepseek-chat）
//! - 通义千问 DashScope 兼容模式（qwen-vl-max）
//! - Gemini OpenAI 兼容层、Mistral、本地 Ollama（/v1）
//! - Anthropic OpenAI 兼容端点（claude-3-5-sonnet）
//! - Azure OpenAI：资源地址必须由 llm.base_url 给出，model 即部署名

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::config::AppConfig;
use crate::llm::{LlmClient, MockLlmClient, OpenAiClient};

/// Azure 未配置 llm.api_version 时使用
pub const DEFAULT_AZURE_API_VERSION: &str = "2024-10-21";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelProvider {
    OpenAi,
    DeepSeek,
    Qwen,
    Gemini,
    Mistral,
    Ollama,
    Anthropic,
    AzureOpenAi,
    Mock,
}

impl ModelProvider {
    pub fn default_model(self) -> &'static str {
        match self {
            ModelProvider::OpenAi => "gpt-4o",
            ModelProvider::DeepSeek => "deepseek-chat",
            ModelProvider::Qwen => "qwen-vl-max",
            ModelProvider::Gemini => "gemini-1.5-pro",
            ModelProvider::Mistral => "mistral-small-latest",
            ModelProvider::Ollama => "llama3.1",
            ModelProvider::Anthropic => "claude-3-5-sonnet-latest",
            ModelProvider::AzureOpenAi => "gpt-4o",
            ModelProvider::Mock => "mock",
        }
    }

    pub fn default_base_url(self) -> Option<&'static str> {
        match self {
            ModelProvider::OpenAi => Some("https://api.openai.com/v1"),
            ModelProvider::DeepSeek => Some("https://api.deepseek.com"),
            ModelProvider::Qwen => Some("https://dashscope.aliyuncs.com/compatible-mode/v1"),
            ModelProvider::Gemini => Some("https://generativelanguage.googleapis.com/v1beta/openai"),
            ModelProvider::Mistral => Some("https://api.mistral.ai/v1"),
            ModelProvider::Ollama => Some("http://localhost:11434/v1"),
            ModelProvider::Anthropic => Some("https://api.anthropic.com/v1/"),
            ModelProvider::AzureOpenAi | ModelProvider::Mock => None,
        }
    }

    /// 默认 API Key 环境变量；Ollama 与 Mock 不需要
    pub fn api_key_env(self) -> Option<&'static str> {
        match self {
            ModelProvider::OpenAi => Some("OPENAI_API_KEY"),
            ModelProvider::DeepSeek => Some("DEEPSEEK_API_KEY"),
            ModelProvider::Qwen => Some("DASHSCOPE_API_KEY"),
            ModelProvider::Gemini => Some("GEMINI_API_KEY"),
            ModelProvider::Mistral => Some("MISTRAL_API_KEY"),
            ModelProvider::Anthropic => Some("ANTHROPIC_API_KEY"),
            ModelProvider::AzureOpenAi => Some("AZURE_OPENAI_API_KEY"),
            ModelProvider::Ollama | ModelProvider::Mock => None,
        }
    }
}

impl FromStr for ModelProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(ModelProvider::OpenAi),
            "deepseek" => Ok(ModelProvider::DeepSeek),
            "qwen" | "dashscope" => Ok(ModelProvider::Qwen),
            "gemini" => Ok(ModelProvider::Gemini),
            "mistral" => Ok(ModelProvider::Mistral),
            "ollama" => Ok(ModelProvider::Ollama),
            "anthropic" | "claude" => Ok(ModelProvider::Anthropic),
            "azure" | "azure_openai" | "azure-openai" => Ok(ModelProvider::AzureOpenAi),
            "mock" => Ok(ModelProvider::Mock),
            other => Err(format!("unknown llm provider: {other}")),
        }
    }
}

/// 根据配置与环境变量选择 LLM 后端；未知后端或缺少 API Key 时退回 Mock
pub fn create_llm_from_config(cfg: &AppConfig) -> Arc<dyn LlmClient> {
    let provider = match cfg.llm.provider.parse::<ModelProvider>() {
        Ok(p) => p,
        Err(e) => {
            tracing::warn!("{}, using Mock LLM", e);
            return Arc::new(MockLlmClient::new());
        }
    };
    if provider == ModelProvider::Mock {
        return Arc::new(MockLlmClient::new());
    }

    let key_env = cfg.llm.api_key_env.as_deref().or(provider.api_key_env());
    let api_key = match key_env {
        Some(var) => match std::env::var(var) {
            Ok(key) => Some(key),
            Err(_) => {
                tracing::warn!("{} not set, using Mock LLM", var);
                return Arc::new(MockLlmClient::new());
            }
        },
        // Ollama 不校验 Key，但客户端需要一个非空值
        None => Some("ollama".to_string()),
    };

    let model = cfg
        .llm
        .model
        .clone()
        .unwrap_or_else(|| provider.default_model().to_string());
    let timeout = Duration::from_secs(cfg.llm.timeouts.request);

    if provider == ModelProvider::AzureOpenAi {
        let Some(api_base) = cfg.llm.base_url.as_deref() else {
            tracing::warn!("llm.base_url is required for Azure OpenAI, using Mock LLM");
            return Arc::new(MockLlmClient::new());
        };
        let api_version = cfg
            .llm
            .api_version
            .as_deref()
            .unwrap_or(DEFAULT_AZURE_API_VERSION);
        let api_key = api_key.unwrap_or_default();
        let client =
            OpenAiClient::azure(api_base, api_version, &model, &api_key).with_timeout(timeout);
        tracing::info!(
            provider = ?provider,
            deployment = %client.model(),
            api_version,
            "Using LLM backend"
        );
        return Arc::new(client);
    }

    let base_url = cfg.llm.base_url.as_deref().or(provider.default_base_url());
    let client = OpenAiClient::new(base_url, &model, api_key.as_deref()).with_timeout(timeout);
    tracing::info!(provider = ?provider, model = %client.model(), "Using LLM backend");
    Arc::new(client)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_parse() {
        assert_eq!("OpenAI".parse::<ModelProvider>(), Ok(ModelProvider::OpenAi));
        assert_eq!("dashscope".parse::<ModelProvider>(), Ok(ModelProvider::Qwen));
        assert_eq!("Claude".parse::<ModelProvider>(), Ok(ModelProvider::Anthropic));
        assert_eq!("azure".parse::<ModelProvider>(), Ok(ModelProvider::AzureOpenAi));
        assert_eq!("azure_openai".parse::<ModelProvider>(), Ok(ModelProvider::AzureOpenAi));
        assert!("bard".parse::<ModelProvider>().is_err());
    }

    #[test]
    fn test_provider_defaults() {
        assert_eq!(ModelProvider::Mistral.default_model(), "mistral-small-latest");
        assert_eq!(ModelProvider::Ollama.api_key_env(), None);
        assert_eq!(ModelProvider::Mock.default_base_url(), None);
        assert_eq!(
            ModelProvider::Anthropic.default_base_url(),
            Some("https://api.anthropic.com/v1/")
        );
        assert_eq!(ModelProvider::Anthropic.api_key_env(), Some("ANTHROPIC_API_KEY"));
        assert_eq!(ModelProvider::AzureOpenAi.default_base_url(), None);
        assert_eq!(ModelProvider::AzureOpenAi.api_key_env(), Some("AZURE_OPENAI_API_KEY"));
    }

    #[test]
    fn test_mock_provider_from_config() {
        let mut cfg = AppConfig::default();
        cfg.llm.provider = "mock".into();
        let llm = create_llm_from_config(&cfg);
        assert_eq!(llm.token_usage(), (0, 0, 0));
    }
}
