//! Planner：指令 + 页面快照 → 动作计划
//!
//! 历史为空时先查响应缓存（唯一的快速路径）；未命中则拼提示词、附截图与页面源码调用模型，
//! 用 parse_plan 解析回复。历史中恰好只有一问一答且解析成功时写入缓存。

use std::sync::{Arc, OnceLock};

use regex::Regex;
use tracing::{debug, info};

use crate::action::Plan;
use crate::cache::ResponseCache;
use crate::core::{PilotError, PlanSource};
use crate::driver::Snapshot;
use crate::llm::LlmClient;
use crate::memory::{ContentPart, ConversationHistory, Message};
use crate::planner::prompt::{planning_prompt, query_prompt, retry_prompt};

/// 规划结果及其来源
#[derive(Debug, Clone)]
pub struct Planned {
    pub plan: Plan,
    pub source: PlanSource,
}

fn fence_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)```[A-Za-z0-9_-]*\s*(.*?)\s*```").ok())
        .as_ref()
}

/// 解析模型回复：去掉代码块标记，取最外层 `{...}`，反序列化为 Plan
pub fn parse_plan(output: &str) -> Result<Plan, PilotError> {
    let trimmed = output.trim();
    let body = fence_re()
        .and_then(|re| re.captures(trimmed))
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .unwrap_or(trimmed);

    let json_str = match (body.find('{'), body.rfind('}')) {
        (Some(start), Some(end)) if end > start => &body[start..=end],
        _ => body,
    };

    serde_json::from_str(json_str)
        .map_err(|e| PilotError::Decode(format!("{}: {}", e, preview(json_str, 200))))
}

fn preview(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        format!("{}...", s.chars().take(max).collect::<String>())
    } else {
        s.to_string()
    }
}

fn truncate_source(source: &str, max_chars: usize) -> String {
    if max_chars == 0 || source.chars().count() <= max_chars {
        source.to_string()
    } else {
        source.chars().take(max_chars).collect::<String>() + "\n...[truncated]"
    }
}

/// Planner：持有 LLM 与共享缓存
pub struct Planner {
    llm: Arc<dyn LlmClient>,
    cache: Arc<ResponseCache>,
    max_source_chars: usize,
}

impl Planner {
    pub fn new(llm: Arc<dyn LlmClient>, cache: Arc<ResponseCache>) -> Self {
        Self {
            llm,
            cache,
            max_source_chars: 0,
        }
    }

    /// 页面源码写入提示词前的最大字符数，0 表示不截断
    pub fn with_max_source_chars(mut self, max_chars: usize) -> Self {
        self.max_source_chars = max_chars;
        self
    }

    pub fn cache(&self) -> &Arc<ResponseCache> {
        &self.cache
    }

    /// 获取 LLM 累计 token 使用统计
    pub fn token_usage(&self) -> (u64, u64, u64) {
        self.llm.token_usage()
    }

    pub async fn plan(
        &self,
        instruction: &str,
        snapshot: &Snapshot,
        history: &mut ConversationHistory,
    ) -> Result<Planned, PilotError> {
        if history.is_empty() {
            if let Some(plan) = self.cache.get(instruction) {
                info!(actions = plan.len(), "plan served from cache");
                return Ok(Planned {
                    plan,
                    source: PlanSource::Cache,
                });
            }
        }

        let prompt = if history.is_empty() {
            planning_prompt(instruction)
        } else {
            retry_prompt(instruction)
        };
        let source = truncate_source(&snapshot.page_source, self.max_source_chars);
        history.push(Message::user_parts(vec![
            ContentPart::text(prompt),
            ContentPart::png(snapshot.screenshot_base64.clone()),
            ContentPart::text(format!("Page source:\n{source}")),
        ]));

        let reply = self.llm.complete(history.messages()).await?;
        debug!(reply = %preview(&reply, 500), "planner reply");
        history.push(Message::assistant(reply.clone()));

        let plan = parse_plan(&reply)?;
        if history.len() == 2 {
            self.cache.put(instruction, &plan);
        }
        Ok(Planned {
            plan,
            source: PlanSource::Model,
        })
    }

    /// 删除该指令的缓存条目，返回是否删除
    pub fn invalidate_cache(&self, instruction: &str) -> bool {
        self.cache.invalidate(instruction)
    }

    /// 依据截图回答问题：一次模型调用，不走缓存也不写历史
    pub async fn query(&self, question: &str, screenshot_base64: &str) -> Result<String, PilotError> {
        let msg = Message::user_parts(vec![
            ContentPart::text(query_prompt(question)),
            ContentPart::png(screenshot_base64),
        ]);
        let answer = self.llm.complete(std::slice::from_ref(&msg)).await?;
        debug!(question, answer = %preview(&answer, 200), "query answered");
        Ok(answer.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{ActionItem, ElementSelector, Locator, Point};
    use crate::llm::{LlmError, MockLlmClient};
    use crate::memory::Role;

    const CLICK_PLAN: &str =
        r#"{"actions": [{"type": "CLICK", "elementSelector": "//button"}], "log": "click"}"#;

    fn snapshot() -> Snapshot {
        Snapshot {
            screenshot_base64: "AAAA".into(),
            page_source: "<button>Go</button>".into(),
        }
    }

    #[test]
    fn test_parse_plan_plain_json() {
        let plan = parse_plan(CLICK_PLAN).unwrap();
        assert_eq!(
            plan.actions,
            vec![ActionItem::click(Locator::Selector(ElementSelector::xpath("//button")))]
        );
    }

    #[test]
    fn test_parse_plan_strips_fences_and_prose() {
        let fenced = format!("Here you go:\n```json\n{CLICK_PLAN}\n```\nGood luck");
        assert_eq!(parse_plan(&fenced).unwrap().log, "click");
        let bare = "```\n{\"actions\": []}\n```";
        assert!(parse_plan(bare).unwrap().is_empty());
        let prose = format!("Sure! {CLICK_PLAN} done");
        assert_eq!(parse_plan(&prose).unwrap().len(), 1);
    }

    #[test]
    fn test_parse_plan_decode_error() {
        let err = parse_plan("I cannot help with that").unwrap_err();
        assert!(matches!(err, PilotError::Decode(_)));
        let err = parse_plan(r#"{"actions": "click"}"#).unwrap_err();
        assert!(matches!(err, PilotError::Decode(_)));
    }

    #[tokio::test]
    async fn test_cache_hit_skips_model() {
        let llm = Arc::new(MockLlmClient::new());
        let cache = Arc::new(ResponseCache::memory_only());
        let cached = Plan::new(vec![ActionItem::click(Locator::Coordinate(Point::new(1, 2)))]);
        cache.put("press go", &cached);
        let planner = Planner::new(llm.clone(), cache);
        let mut history = ConversationHistory::new();
        let planned = planner.plan("press go", &snapshot(), &mut history).await.unwrap();
        assert_eq!(planned.source, PlanSource::Cache);
        assert_eq!(planned.plan, cached);
        assert_eq!(llm.calls(), 0);
        assert!(history.is_empty());
    }

    #[tokio::test]
    async fn test_first_model_plan_is_cached() {
        let llm = Arc::new(MockLlmClient::with_replies([CLICK_PLAN]));
        let cache = Arc::new(ResponseCache::memory_only());
        let planner = Planner::new(llm.clone(), cache.clone());
        let mut history = ConversationHistory::new();
        let planned = planner.plan("press go", &snapshot(), &mut history).await.unwrap();
        assert_eq!(planned.source, PlanSource::Model);
        assert_eq!(history.len(), 2);
        assert_eq!(cache.get("press go"), Some(planned.plan));

        let request = &llm.requests()[0];
        assert_eq!(request.len(), 1);
        assert_eq!(request[0].role, Role::User);
        assert_eq!(request[0].parts.len(), 3);
        assert!(request[0].has_image());
        assert!(request[0].text().contains("<button>Go</button>"));
    }

    #[tokio::test]
    async fn test_retry_uses_history_and_skips_cache() {
        let llm = Arc::new(MockLlmClient::with_replies([CLICK_PLAN]));
        let cache = Arc::new(ResponseCache::memory_only());
        cache.put("press go", &Plan::default());
        let planner = Planner::new(llm.clone(), cache.clone());
        let mut history = ConversationHistory::new();
        history.push(Message::user("Error executing plan: boom"));
        let planned = planner.plan("press go", &snapshot(), &mut history).await.unwrap();
        assert_eq!(planned.source, PlanSource::Model);
        assert_eq!(llm.calls(), 1);
        assert_eq!(history.len(), 3);
        assert!(llm.requests()[0][1].text().starts_with("Previous attempt failed."));
        // 非首轮不写缓存
        assert_eq!(cache.get("press go"), Some(Plan::default()));
    }

    #[tokio::test]
    async fn test_decode_failure_is_not_cached() {
        let llm = Arc::new(MockLlmClient::with_replies(["not json"]));
        let cache = Arc::new(ResponseCache::memory_only());
        let planner = Planner::new(llm, cache.clone());
        let mut history = ConversationHistory::new();
        let err = planner.plan("x", &snapshot(), &mut history).await.unwrap_err();
        assert!(matches!(err, PilotError::Decode(_)));
        assert_eq!(history.len(), 2);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_llm_error_propagates() {
        let llm = Arc::new(MockLlmClient::new());
        llm.push_error(LlmError::Timeout(5));
        let planner = Planner::new(llm, Arc::new(ResponseCache::memory_only()));
        let mut history = ConversationHistory::new();
        let err = planner.plan("x", &snapshot(), &mut history).await.unwrap_err();
        assert!(matches!(err, PilotError::Llm(LlmError::Timeout(5))));
    }

    #[test]
    fn test_truncate_source() {
        assert_eq!(truncate_source("abcdef", 0), "abcdef");
        assert_eq!(truncate_source("abcdef", 3), "abc\n...[truncated]");
    }

    #[tokio::test]
    async fn test_query_sends_single_message() {
        let llm = Arc::new(MockLlmClient::with_replies(["  42 items \n"]));
        let planner = Planner::new(llm.clone(), Arc::new(ResponseCache::memory_only()));
        let answer = planner.query("how many items?", "AAAA").await.unwrap();
        assert_eq!(answer, "42 items");
        assert_eq!(llm.requests()[0].len(), 1);
    }
}
