//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `PILOT__*` 覆盖（双下划线表示嵌套，如 `PILOT__CACHE__MODE=read_only`）。

use std::path::PathBuf;

use serde::Deserialize;

use crate::cache::{CacheMode, KeyScheme};

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub llm: LlmSection,
    pub agent: AgentSection,
    pub cache: CacheSection,
    pub browser: BrowserSection,
}

/// [app] 段
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppSection {
    pub name: Option<String>,
}

/// [llm] 段：后端选择与超时
#[derive(Debug, Clone, Deserialize)]
pub struct LlmSection {
    /// 后端：openai / deepseek / qwen / gemini / mistral / ollama / anthropic / azure / mock
    #[serde(default = "default_provider")]
    pub provider: String,
    /// 模型名，未设置时用后端默认模型
    pub model: Option<String>,
    /// 覆盖后端默认地址（自建代理等）
    pub base_url: Option<String>,
    /// 读取 API Key 的环境变量名，未设置时用后端默认变量
    pub api_key_env: Option<String>,
    /// 仅 Azure OpenAI 使用的 api-version
    pub api_version: Option<String>,
    #[serde(default)]
    pub timeouts: LlmTimeoutsSection,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            base_url: None,
            api_key_env: None,
            api_version: None,
            timeouts: LlmTimeoutsSection::default(),
        }
    }
}

fn default_provider() -> String {
    "openai".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmTimeoutsSection {
    /// 单次模型请求超时（秒）
    #[serde(default = "default_request_timeout")]
    pub request: u64,
}

impl Default for LlmTimeoutsSection {
    fn default() -> Self {
        Self {
            request: default_request_timeout(),
        }
    }
}

fn default_request_timeout() -> u64 {
    60
}

/// [agent] 段：重试预算与提示词裁剪
#[derive(Debug, Clone, Deserialize)]
pub struct AgentSection {
    /// 每条指令的最大尝试次数（至少 1）
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// 两次尝试之间的固定等待（毫秒）
    #[serde(default)]
    pub retry_delay_ms: u64,
    /// 页面源码写入提示词前的最大字符数，0 表示不截断
    #[serde(default)]
    pub max_source_chars: usize,
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            retry_delay_ms: 0,
            max_source_chars: 0,
        }
    }
}

fn default_max_retries() -> u32 {
    3
}

/// [cache] 段：响应缓存模式与文件
#[derive(Debug, Clone, Deserialize, Default)]
pub struct CacheSection {
    #[serde(default)]
    pub mode: CacheMode,
    /// 缓存文件路径，未设置时仅在内存中缓存
    pub path: Option<PathBuf>,
    #[serde(default)]
    pub key_scheme: KeyScheme,
}

/// [browser] 段：Chrome 启动参数（仅 browser feature 使用）
#[derive(Debug, Clone, Deserialize)]
pub struct BrowserSection {
    #[serde(default = "default_headless")]
    pub headless: bool,
    #[serde(default = "default_window_width")]
    pub window_width: u32,
    #[serde(default = "default_window_height")]
    pub window_height: u32,
    /// 启动后首先打开的页面
    pub start_url: Option<String>,
}

impl Default for BrowserSection {
    fn default() -> Self {
        Self {
            headless: default_headless(),
            window_width: default_window_width(),
            window_height: default_window_height(),
            start_url: None,
        }
    }
}

fn default_headless() -> bool {
    true
}

fn default_window_width() -> u32 {
    1280
}

fn default_window_height() -> u32 {
    800
}

/// 从 config 目录加载配置，环境变量 PILOT__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 PILOT__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("PILOT")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.llm.provider, "openai");
        assert_eq!(cfg.llm.timeouts.request, 60);
        assert_eq!(cfg.agent.max_retries, 3);
        assert_eq!(cfg.cache.mode, CacheMode::ReadWrite);
        assert_eq!(cfg.cache.key_scheme, KeyScheme::Sha256);
        assert!(cfg.browser.headless);
    }

    #[test]
    fn test_load_from_explicit_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("pilot.toml");
        std::fs::write(
            &path,
            r#"
[llm]
provider = "ollama"
model = "llava"

[agent]
max_retries = 5
retry_delay_ms = 250

[cache]
mode = "read_only"
path = "cache/plans.json"
"#,
        )
        .unwrap();
        let cfg = load_config(Some(path)).unwrap();
        assert_eq!(cfg.llm.provider, "ollama");
        assert_eq!(cfg.llm.model.as_deref(), Some("llava"));
        assert_eq!(cfg.agent.max_retries, 5);
        assert_eq!(cfg.agent.retry_delay_ms, 250);
        assert_eq!(cfg.cache.mode, CacheMode::ReadOnly);
        assert_eq!(cfg.cache.path, Some(PathBuf::from("cache/plans.json")));
    }
}
