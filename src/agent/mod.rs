//! Agent 门面：面向调用方的 API
//!
//! - ai_action / ai_act：执行任意自然语言指令（走编排器的计划 - 执行 - 重试循环）
//! - ai_tap、ai_input、ai_scroll 等：把目标描述与选项拼成指令后执行
//! - ai_query 及其类型化变体、ai_assert、ai_wait_for：只看截图回答问题
//! - spawn_action / ai_action_with_deadline：后台执行与限时执行
//!
//! Orchestrator 以 Arc 持有，多个并发调用共享同一个编排器与缓存。

pub mod options;

use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use regex::Regex;
use tokio::task::JoinHandle;

use crate::cache::ResponseCache;
use crate::config::AppConfig;
use crate::core::{Orchestrator, PilotError, RetryPolicy, RunOutcome};
use crate::driver::{DriverError, PageDriver};
use crate::llm::create_llm_from_config;

pub use options::{InputOptions, LocateOptions, ScrollOptions, ScrollType, WaitOptions};

/// 注入 MutationObserver；首次调用（或页面跳转后）返回 true，之后返回「自上次调用以来 DOM 是否变化」
const TAKE_MUTATION_FLAG_JS: &str = r#"(function() {
  if (!window.__pilotObserver) {
    window.__pilotMutated = false;
    window.__pilotObserver = new MutationObserver(() => { window.__pilotMutated = true; });
    window.__pilotObserver.observe(document.documentElement || document, {
      subtree: true, childList: true, attributes: true, characterData: true
    });
    return true;
  }
  const mutated = window.__pilotMutated === true;
  window.__pilotMutated = false;
  return mutated;
})()"#;

fn number_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"-?\d+(?:\.\d+)?").ok()).as_ref()
}

/// 从回答中取第一个数字
pub fn parse_number(answer: &str) -> Option<f64> {
    let cleaned = answer.replace(',', "");
    number_re()?
        .find(&cleaned)
        .and_then(|m| m.as_str().parse::<f64>().ok())
}

/// 回答中是否包含 true（大小写不敏感）
pub fn parse_boolean(answer: &str) -> bool {
    answer.to_ascii_lowercase().contains("true")
}

/// 后台执行中的指令
pub struct ActionHandle {
    instruction: String,
    handle: JoinHandle<Result<RunOutcome, PilotError>>,
}

impl ActionHandle {
    pub fn instruction(&self) -> &str {
        &self.instruction
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub fn abort(&self) {
        self.handle.abort();
    }

    /// 等待完成；任务 panic 或被取消时返回 PilotError::Join
    pub async fn join(self) -> Result<RunOutcome, PilotError> {
        self.handle
            .await
            .map_err(|e| PilotError::Join(e.to_string()))?
    }
}

#[derive(Clone)]
pub struct Agent {
    orchestrator: Arc<Orchestrator>,
}

impl Agent {
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
        }
    }

    /// 按配置组装：模型后端、响应缓存、重试预算、源码截断
    pub fn from_config(cfg: &AppConfig, driver: Arc<dyn PageDriver>) -> Self {
        let llm = create_llm_from_config(cfg);
        let cache = Arc::new(
            ResponseCache::new(cfg.cache.mode, cfg.cache.path.clone())
                .with_key_scheme(cfg.cache.key_scheme),
        );
        let policy = RetryPolicy::new(cfg.agent.max_retries)
            .with_delay(Duration::from_millis(cfg.agent.retry_delay_ms));
        tracing::info!(
            cache_mode = %cfg.cache.mode,
            cache_path = ?cfg.cache.path,
            max_attempts = policy.max_attempts,
            "agent configured"
        );
        Self::new(
            Orchestrator::new(driver, llm, cache)
                .with_policy(policy)
                .with_max_source_chars(cfg.agent.max_source_chars),
        )
    }

    pub fn orchestrator(&self) -> &Arc<Orchestrator> {
        &self.orchestrator
    }

    pub fn cache(&self) -> &Arc<ResponseCache> {
        self.orchestrator.cache()
    }

    pub async fn ai_action(&self, instruction: &str) -> Result<RunOutcome, PilotError> {
        self.orchestrator.run(instruction).await
    }

    pub async fn ai_act(&self, instruction: &str) -> Result<RunOutcome, PilotError> {
        self.ai_action(instruction).await
    }

    pub async fn ai_tap(
        &self,
        locate: &str,
        opts: &LocateOptions,
    ) -> Result<RunOutcome, PilotError> {
        self.ai_action(&opts.decorate(format!("Tap {locate}"))).await
    }

    pub async fn ai_double_click(
        &self,
        locate: &str,
        opts: &LocateOptions,
    ) -> Result<RunOutcome, PilotError> {
        self.ai_action(&opts.decorate(format!("Double click {locate}"))).await
    }

    pub async fn ai_right_click(
        &self,
        locate: &str,
        opts: &LocateOptions,
    ) -> Result<RunOutcome, PilotError> {
        self.ai_action(&opts.decorate(format!("Right click {locate}"))).await
    }

    pub async fn ai_hover(
        &self,
        locate: &str,
        opts: &LocateOptions,
    ) -> Result<RunOutcome, PilotError> {
        self.ai_action(&opts.decorate(format!("Hover over {locate}"))).await
    }

    pub async fn ai_input(
        &self,
        locate: &str,
        opts: &InputOptions,
    ) -> Result<RunOutcome, PilotError> {
        self.ai_action(&opts.instruction(locate)).await
    }

    pub async fn ai_keyboard_press(
        &self,
        key: &str,
        locate: Option<&str>,
    ) -> Result<RunOutcome, PilotError> {
        let instruction = match locate {
            Some(locate) => format!("Press the '{key}' key on {locate}"),
            None => format!("Press the '{key}' key"),
        };
        self.ai_action(&instruction).await
    }

    pub async fn ai_scroll(
        &self,
        locate: Option<&str>,
        opts: &ScrollOptions,
    ) -> Result<RunOutcome, PilotError> {
        self.ai_action(&opts.instruction(locate)).await
    }

    /// 依据当前截图回答问题
    pub async fn ai_query(&self, question: &str) -> Result<String, PilotError> {
        self.orchestrator.query(question).await
    }

    pub async fn ai_string(&self, question: &str) -> Result<String, PilotError> {
        self.ai_query(question).await
    }

    pub async fn ai_boolean(&self, question: &str) -> Result<bool, PilotError> {
        let answer = self
            .ai_query(&format!("{question}\nAnswer with true or false only."))
            .await?;
        Ok(parse_boolean(&answer))
    }

    /// 回答中没有数字时返回 Decode 错误
    pub async fn ai_number(&self, question: &str) -> Result<f64, PilotError> {
        let answer = self
            .ai_query(&format!("{question}\nAnswer with a number only."))
            .await?;
        parse_number(&answer)
            .ok_or_else(|| PilotError::Decode(format!("no number in answer: {answer}")))
    }

    pub async fn ai_assert(&self, assertion: &str) -> Result<(), PilotError> {
        let holds = self
            .ai_boolean(&format!("Is the following statement true for the current page: {assertion}"))
            .await?;
        if holds {
            Ok(())
        } else {
            Err(PilotError::AssertionFailed(assertion.to_string()))
        }
    }

    /// 等待断言成立。页面支持脚本时用 MutationObserver 判断 DOM 是否变化，
    /// 只有变化后才再次询问模型；不支持脚本时每个间隔都询问。
    /// 成立返回 Ok(true)；超时按 throw_on_timeout 返回 WaitTimeout 或 Ok(false)
    pub async fn ai_wait_for(
        &self,
        assertion: &str,
        opts: &WaitOptions,
    ) -> Result<bool, PilotError> {
        let driver = self.orchestrator.driver();
        let deadline = Instant::now() + opts.timeout;
        let question = format!("Is the following statement true for the current page: {assertion}");
        let mut observing = true;
        let mut checks = 0u32;

        loop {
            let changed = if observing {
                match driver.execute_script(TAKE_MUTATION_FLAG_JS).await {
                    Ok(v) => v.as_bool().unwrap_or(true),
                    Err(DriverError::Unsupported(_)) => {
                        tracing::debug!("execute_script unsupported, polling instead");
                        observing = false;
                        true
                    }
                    // 页面跳转中等暂时性失败按「已变化」处理，照常询问
                    Err(e) => {
                        tracing::debug!(error = %e, "mutation check failed, checking anyway");
                        true
                    }
                }
            } else {
                true
            };

            if changed || checks == 0 {
                checks += 1;
                if self.ai_boolean(&question).await? {
                    tracing::info!(assertion, checks, "wait_for satisfied");
                    return Ok(true);
                }
            }

            let now = Instant::now();
            if now >= deadline {
                break;
            }
            tokio::time::sleep(opts.check_interval.min(deadline - now)).await;
        }

        tracing::warn!(assertion, checks, "wait_for timed out");
        if opts.throw_on_timeout {
            Err(PilotError::WaitTimeout {
                assertion: assertion.to_string(),
                timeout_ms: opts.timeout.as_millis() as u64,
            })
        } else {
            Ok(false)
        }
    }

    /// 在后台任务中执行指令
    pub fn spawn_action(&self, instruction: impl Into<String>) -> ActionHandle {
        let orchestrator = Arc::clone(&self.orchestrator);
        let instruction = instruction.into();
        let task_instruction = instruction.clone();
        let handle = tokio::spawn(async move { orchestrator.run(&task_instruction).await });
        ActionHandle {
            instruction,
            handle,
        }
    }

    /// 限时执行；超时后放弃等待并返回 DeadlineExceeded（已执行的动作不会回滚）
    pub async fn ai_action_with_deadline(
        &self,
        instruction: &str,
        deadline: Duration,
    ) -> Result<RunOutcome, PilotError> {
        tokio::time::timeout(deadline, self.ai_action(instruction))
            .await
            .map_err(|_| PilotError::DeadlineExceeded {
                instruction: instruction.to_string(),
                deadline_ms: deadline.as_millis() as u64,
            })?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::RecordingDriver;
    use crate::llm::MockLlmClient;

    fn agent(replies: &[&str]) -> (Agent, Arc<RecordingDriver>, Arc<MockLlmClient>) {
        let driver = Arc::new(RecordingDriver::new());
        let llm = Arc::new(MockLlmClient::with_replies(replies.iter().copied()));
        let orch = Orchestrator::new(driver.clone(), llm.clone(), Arc::new(ResponseCache::memory_only()));
        (Agent::new(orch), driver, llm)
    }

    #[test]
    fn test_parse_number_and_boolean() {
        assert_eq!(parse_number("There are 1,234 items"), Some(1234.0));
        assert_eq!(parse_number("-3.5 degrees"), Some(-3.5));
        assert_eq!(parse_number("none"), None);
        assert!(parse_boolean("TRUE."));
        assert!(!parse_boolean("false"));
    }

    #[tokio::test]
    async fn test_ai_tap_builds_instruction() {
        let (agent, _driver, llm) = agent(&[]);
        agent
            .ai_tap("the login button", &LocateOptions::within("the header"))
            .await
            .unwrap();
        let first = &llm.requests()[0][0];
        assert!(first.text().contains("Tap the login button within the header"));
    }

    #[tokio::test]
    async fn test_ai_number_and_boolean() {
        let (agent, _driver, _llm) = agent(&["about 42", "True", "no digits"]);
        assert_eq!(agent.ai_number("how many?").await.unwrap(), 42.0);
        assert!(agent.ai_boolean("logged in?").await.unwrap());
        assert!(matches!(
            agent.ai_number("how many?").await.unwrap_err(),
            PilotError::Decode(_)
        ));
    }

    #[tokio::test]
    async fn test_ai_assert_failure() {
        let (agent, _driver, _llm) = agent(&["false"]);
        let err = agent.ai_assert("the cart is empty").await.unwrap_err();
        assert!(matches!(err, PilotError::AssertionFailed(a) if a == "the cart is empty"));
    }

    #[tokio::test]
    async fn test_wait_for_only_asks_after_mutation() {
        let (agent, driver, llm) = agent(&["false", "true"]);
        // 第一次安装 observer（返回 null 视为已变化），第二次无变化，第三次有变化
        driver.push_script_result(serde_json::Value::Null);
        driver.push_script_result(serde_json::Value::Bool(false));
        driver.push_script_result(serde_json::Value::Bool(true));
        let opts = WaitOptions {
            timeout: Duration::from_secs(5),
            check_interval: Duration::from_millis(1),
            throw_on_timeout: true,
        };
        assert!(agent.ai_wait_for("the dialog is closed", &opts).await.unwrap());
        assert_eq!(llm.calls(), 2);
        assert_eq!(driver.count("execute_script"), 3);
    }

    #[tokio::test]
    async fn test_wait_for_script_failure_still_checks() {
        let driver = Arc::new(RecordingDriver::new().fail_times("execute_script", 1));
        let llm = Arc::new(MockLlmClient::with_replies(["true"]));
        let agent = Agent::new(Orchestrator::new(
            driver.clone(),
            llm.clone(),
            Arc::new(ResponseCache::memory_only()),
        ));
        let opts = WaitOptions {
            timeout: Duration::from_secs(1),
            check_interval: Duration::from_millis(1),
            throw_on_timeout: true,
        };
        assert!(agent.ai_wait_for("the page has loaded", &opts).await.unwrap());
        assert_eq!(llm.calls(), 1);
        assert_eq!(driver.count("execute_script"), 1);
    }

    #[tokio::test]
    async fn test_wait_for_timeout() {
        let llm = Arc::new(MockLlmClient::new().with_default_reply("false"));
        let agent = Agent::new(Orchestrator::new(
            Arc::new(RecordingDriver::new()),
            llm.clone(),
            Arc::new(ResponseCache::memory_only()),
        ));
        let mock_false = WaitOptions {
            timeout: Duration::from_millis(20),
            check_interval: Duration::from_millis(5),
            throw_on_timeout: false,
        };
        assert!(!agent.ai_wait_for("never", &mock_false).await.unwrap());
        let throwing = WaitOptions {
            throw_on_timeout: true,
            ..mock_false
        };
        assert!(matches!(
            agent.ai_wait_for("never", &throwing).await.unwrap_err(),
            PilotError::WaitTimeout { .. }
        ));
        assert!(llm.calls() >= 2);
    }

    #[tokio::test]
    async fn test_spawn_action_runs_in_background() {
        let (agent, driver, _llm) = agent(&[]);
        let handle = agent.spawn_action("tap the button");
        assert_eq!(handle.instruction(), "tap the button");
        let outcome = handle.join().await.unwrap();
        assert_eq!(outcome.attempts, 1);
        assert_eq!(driver.action_calls().len(), 1);
    }

    #[tokio::test]
    async fn test_deadline_exceeded() {
        let driver = Arc::new(RecordingDriver::new());
        let llm = Arc::new(MockLlmClient::with_replies([
            r#"{"actions": [{"type": "SLEEP", "sleepMs": 5000}]}"#,
        ]));
        let agent = Agent::new(Orchestrator::new(driver, llm, Arc::new(ResponseCache::memory_only())));
        let err = agent
            .ai_action_with_deadline("wait", Duration::from_millis(20))
            .await
            .unwrap_err();
        assert!(matches!(err, PilotError::DeadlineExceeded { deadline_ms: 20, .. }));
    }
}
