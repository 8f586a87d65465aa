//! 编排器：计划 - 执行 - 重试主循环
//!
//! 每条指令最多 `max_attempts` 次尝试；每次尝试都重新采集快照、规划、按顺序执行动作。
//! 空计划视为失败。第一次失败（且仅第一次）会尝试删除该指令的缓存条目：若确实删除，
//! 清空历史让下一次尝试从头开始；否则把错误说明注入历史继续重试。
//! 所有单次尝试内的错误都在这里捕获，只有预算耗尽才以 RetriesExhausted 返回。

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::cache::ResponseCache;
use crate::core::events::{send_event, PilotEvent, SnapshotStage};
use crate::core::{PilotError, RecoveryAction, RecoveryEngine, RunOutcome, RunPhase};
use crate::dispatch::ActionDispatcher;
use crate::driver::PageDriver;
use crate::llm::LlmClient;
use crate::memory::{ConversationHistory, Message};
use crate::planner::{Planned, Planner};

/// 重试预算
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// 最大尝试次数（至少 1）
    pub max_attempts: u32,
    /// 两次尝试之间的固定等待
    pub retry_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_delay: Duration::ZERO,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Self::default()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }
}

pub struct Orchestrator {
    driver: Arc<dyn PageDriver>,
    planner: Planner,
    dispatcher: ActionDispatcher,
    recovery: RecoveryEngine,
    policy: RetryPolicy,
    event_tx: Option<UnboundedSender<PilotEvent>>,
}

impl Orchestrator {
    pub fn new(
        driver: Arc<dyn PageDriver>,
        llm: Arc<dyn LlmClient>,
        cache: Arc<ResponseCache>,
    ) -> Self {
        Self {
            dispatcher: ActionDispatcher::new(Arc::clone(&driver)),
            planner: Planner::new(llm, cache),
            driver,
            recovery: RecoveryEngine::new(),
            policy: RetryPolicy::default(),
            event_tx: None,
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_max_source_chars(mut self, max_chars: usize) -> Self {
        self.planner = self.planner.with_max_source_chars(max_chars);
        self
    }

    /// 订阅运行事件
    pub fn with_event_sender(mut self, tx: UnboundedSender<PilotEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn planner(&self) -> &Planner {
        &self.planner
    }

    pub fn driver(&self) -> &Arc<dyn PageDriver> {
        &self.driver
    }

    pub fn cache(&self) -> &Arc<ResponseCache> {
        self.planner.cache()
    }

    /// 执行一条自然语言指令
    pub async fn run(&self, instruction: &str) -> Result<RunOutcome, PilotError> {
        let run_id = Uuid::new_v4();
        self.run_attempts(run_id, instruction)
            .instrument(info_span!("run", %run_id))
            .await
    }

    async fn run_attempts(&self, run_id: Uuid, instruction: &str) -> Result<RunOutcome, PilotError> {
        let tx = self.event_tx.as_ref();
        let max_attempts = self.policy.max_attempts.max(1);
        info!(instruction, max_attempts, "instruction received");
        send_event(
            tx,
            PilotEvent::RunStarted {
                run_id,
                instruction: instruction.to_string(),
                max_attempts,
            },
        );

        self.set_phase(run_id, RunPhase::Idle);

        let mut history = ConversationHistory::new();
        let mut last_error = String::new();

        for attempt in 1..=max_attempts {
            self.set_phase(run_id, RunPhase::Attempting { attempt });
            send_event(tx, PilotEvent::AttemptStarted { run_id, attempt });

            match self.attempt(run_id, instruction, &mut history).await {
                Ok((planned, performed)) => {
                    info!(attempt, source = ?planned.source, performed, "instruction completed");
                    self.set_phase(run_id, RunPhase::Succeeded);
                    send_event(
                        tx,
                        PilotEvent::RunFinished {
                            run_id,
                            success: true,
                            attempts: attempt,
                            timestamp: chrono::Utc::now(),
                        },
                    );
                    return Ok(RunOutcome {
                        run_id,
                        instruction: instruction.to_string(),
                        plan: planned.plan,
                        attempts: attempt,
                        source: planned.source,
                        performed,
                    });
                }
                Err(err) => {
                    warn!(attempt, error = %err, "attempt failed");
                    send_event(
                        tx,
                        PilotEvent::AttemptFailed {
                            run_id,
                            attempt,
                            error: err.to_string(),
                        },
                    );

                    match self.recovery.handle(&err, attempt) {
                        RecoveryAction::InvalidateCache { note } => {
                            let removed = self.planner.invalidate_cache(instruction);
                            send_event(tx, PilotEvent::CacheInvalidation { run_id, removed });
                            if removed {
                                // 旧计划已删除：不追加错误说明，下一次尝试是全新的规划周期
                                info!("stale cached plan removed, restarting from a fresh history");
                                history.clear();
                            } else {
                                history.push(Message::user(note));
                            }
                        }
                        RecoveryAction::RetryWithPrompt(note) => history.push(Message::user(note)),
                    }
                    last_error = err.to_string();

                    if attempt < max_attempts && !self.policy.retry_delay.is_zero() {
                        tokio::time::sleep(self.policy.retry_delay).await;
                    }
                }
            }
        }

        error!(attempts = max_attempts, last_error = %last_error, "instruction failed");
        self.set_phase(run_id, RunPhase::Failed);
        send_event(
            tx,
            PilotEvent::RunFinished {
                run_id,
                success: false,
                attempts: max_attempts,
                timestamp: chrono::Utc::now(),
            },
        );
        Err(PilotError::RetriesExhausted {
            instruction: instruction.to_string(),
            attempts: max_attempts,
            last_error,
        })
    }

    /// 广播阶段变化；进入终态时附带本编排器累计的 token 用量
    fn set_phase(&self, run_id: Uuid, phase: RunPhase) {
        if phase.is_terminal() {
            let (prompt, completion, total) = self.planner.token_usage();
            info!(
                phase = ?phase,
                prompt_tokens = prompt,
                completion_tokens = completion,
                total_tokens = total,
                "run finished"
            );
        } else {
            debug!(phase = ?phase, "phase changed");
        }
        send_event(self.event_tx.as_ref(), PilotEvent::PhaseChanged { run_id, phase });
    }

    /// 单次尝试：快照 → 规划 → 顺序执行 → 可选等待 → 动作后截图。返回计划与实际执行的动作数
    async fn attempt(
        &self,
        run_id: Uuid,
        instruction: &str,
        history: &mut ConversationHistory,
    ) -> Result<(Planned, usize), PilotError> {
        let tx = self.event_tx.as_ref();

        let snapshot = self.driver.snapshot().await?;
        send_event(
            tx,
            PilotEvent::SnapshotCaptured {
                run_id,
                stage: SnapshotStage::BeforePlan,
                screenshot_base64: snapshot.screenshot_base64.clone(),
            },
        );

        let planned = self.planner.plan(instruction, &snapshot, history).await?;
        send_event(
            tx,
            PilotEvent::PlanReady {
                run_id,
                source: planned.source,
                plan: planned.plan.clone(),
            },
        );

        if planned.plan.is_empty() {
            return Err(match &planned.plan.error {
                Some(reason) => PilotError::PlannerRefused(reason.clone()),
                None => PilotError::EmptyPlan,
            });
        }
        if let Some(reason) = &planned.plan.error {
            warn!(reason = %reason, "plan carries an error but has actions, executing anyway");
        }
        info!(
            source = ?planned.source,
            actions = planned.plan.len(),
            log = %planned.plan.log,
            "executing plan"
        );

        let mut performed = 0;
        for (index, action) in planned.plan.actions.iter().enumerate() {
            let outcome = self.dispatcher.execute(action).await?;
            if outcome.is_performed() {
                performed += 1;
            }
            send_event(
                tx,
                PilotEvent::ActionDispatched {
                    run_id,
                    index,
                    action: action.label(),
                    performed: outcome.is_performed(),
                },
            );
        }

        if let Some(ms) = planned.plan.sleep {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }

        // 动作已生效，动作后截图失败只记录，不触发重试
        match self.driver.screenshot_base64().await {
            Ok(shot) => send_event(
                tx,
                PilotEvent::SnapshotCaptured {
                    run_id,
                    stage: SnapshotStage::AfterActions,
                    screenshot_base64: shot,
                },
            ),
            Err(e) => warn!(error = %e, "post-action screenshot failed"),
        }

        Ok((planned, performed))
    }

    /// 依据当前截图回答问题
    pub async fn query(&self, question: &str) -> Result<String, PilotError> {
        let screenshot = self.driver.screenshot_base64().await?;
        let answer = self.planner.query(question, &screenshot).await?;
        send_event(
            self.event_tx.as_ref(),
            PilotEvent::QueryAnswered {
                question: question.to_string(),
                answer: answer.clone(),
            },
        );
        Ok(answer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{ActionItem, Locator, Plan, Point};
    use crate::core::PlanSource;
    use crate::driver::{DriverCall, RecordingDriver};
    use crate::llm::MockLlmClient;

    const GOOD: &str = r#"{"actions": [{"type": "CLICK", "locate": {"x": 10, "y": 20}}]}"#;
    const EMPTY: &str = r#"{"actions": []}"#;

    fn build(
        replies: &[&str],
        cache: Arc<ResponseCache>,
    ) -> (Orchestrator, Arc<RecordingDriver>, Arc<MockLlmClient>) {
        let driver = Arc::new(RecordingDriver::new());
        let llm = Arc::new(MockLlmClient::with_replies(replies.iter().copied()));
        let orch = Orchestrator::new(driver.clone(), llm.clone(), cache);
        (orch, driver, llm)
    }

    #[test]
    fn test_retry_policy_clamps_to_one() {
        assert_eq!(RetryPolicy::new(0).max_attempts, 1);
        assert_eq!(RetryPolicy::default().max_attempts, 3);
    }

    #[tokio::test]
    async fn test_success_on_first_attempt() {
        let (orch, driver, llm) = build(&[GOOD], Arc::new(ResponseCache::memory_only()));
        let outcome = orch.run("click the thing").await.unwrap();
        assert_eq!(outcome.attempts, 1);
        assert_eq!(outcome.source, PlanSource::Model);
        assert_eq!(outcome.performed, 1);
        assert_eq!(llm.calls(), 1);
        assert_eq!(
            driver.action_calls(),
            vec![DriverCall::Click(Locator::Coordinate(Point::new(10, 20)))]
        );
        // 快照一次 + 动作后截图一次
        assert_eq!(driver.count("screenshot"), 2);
    }

    #[tokio::test]
    async fn test_empty_plan_is_retried() {
        let (orch, driver, llm) = build(&[EMPTY, GOOD], Arc::new(ResponseCache::memory_only()));
        let outcome = orch.run("click").await.unwrap();
        assert_eq!(outcome.attempts, 2);
        assert_eq!(llm.calls(), 2);
        assert_eq!(driver.action_calls().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_plan_with_error_reports_refusal() {
        let refuse = r#"{"actions": [], "error": "no such button"}"#;
        let (orch, _driver, _llm) = build(&[refuse], Arc::new(ResponseCache::memory_only()));
        let orch = orch.with_policy(RetryPolicy::new(1));
        let err = orch.run("click").await.unwrap_err();
        match err {
            PilotError::RetriesExhausted { attempts, last_error, .. } => {
                assert_eq!(attempts, 1);
                assert!(last_error.contains("no such button"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_post_action_screenshot_failure_is_not_fatal() {
        let driver = Arc::new(RecordingDriver::new().fail_from_call("screenshot", 2));
        let llm = Arc::new(MockLlmClient::with_replies([GOOD]));
        let orch = Orchestrator::new(driver.clone(), llm, Arc::new(ResponseCache::memory_only()));
        let outcome = orch.run("click").await.unwrap();
        assert_eq!(outcome.attempts, 1);
        assert_eq!(driver.action_calls().len(), 1);
    }

    #[tokio::test]
    async fn test_snapshot_failure_counts_as_attempt() {
        let driver = Arc::new(RecordingDriver::new().fail_times("screenshot", 1));
        let llm = Arc::new(MockLlmClient::with_replies([GOOD]));
        let orch = Orchestrator::new(driver, llm.clone(), Arc::new(ResponseCache::memory_only()));
        let outcome = orch.run("click").await.unwrap();
        assert_eq!(outcome.attempts, 2);
        assert_eq!(llm.calls(), 1);
    }

    #[tokio::test]
    async fn test_events_are_emitted_in_order() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let (orch, _driver, _llm) = build(&[GOOD], Arc::new(ResponseCache::memory_only()));
        let orch = orch.with_event_sender(tx);
        orch.run("click").await.unwrap();
        drop(orch);
        let mut kinds = Vec::new();
        while let Some(ev) = rx.recv().await {
            kinds.push(serde_json::to_value(&ev).unwrap()["type"].as_str().unwrap().to_string());
        }
        assert_eq!(
            kinds,
            vec![
                "run_started",
                "phase_changed",
                "phase_changed",
                "attempt_started",
                "snapshot_captured",
                "plan_ready",
                "action_dispatched",
                "snapshot_captured",
                "phase_changed",
                "run_finished",
            ]
        );
    }

    #[tokio::test]
    async fn test_phases_start_idle_and_end_terminal() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let (orch, _driver, _llm) = build(
            &["nope", "nope"],
            Arc::new(ResponseCache::memory_only()),
        );
        let orch = orch.with_policy(RetryPolicy::new(2)).with_event_sender(tx);
        orch.run("click").await.unwrap_err();
        drop(orch);
        let mut phases = Vec::new();
        while let Some(ev) = rx.recv().await {
            if let PilotEvent::PhaseChanged { phase, .. } = ev {
                phases.push(phase);
            }
        }
        assert_eq!(
            phases,
            vec![
                RunPhase::Idle,
                RunPhase::Attempting { attempt: 1 },
                RunPhase::Attempting { attempt: 2 },
                RunPhase::Failed,
            ]
        );
        assert!(phases.last().is_some_and(RunPhase::is_terminal));
        assert!(!phases[0].is_terminal());
    }

    #[tokio::test]
    async fn test_query_uses_screenshot_only() {
        let (orch, driver, llm) = build(&["yes"], Arc::new(ResponseCache::memory_only()));
        assert_eq!(orch.query("is it logged in?").await.unwrap(), "yes");
        assert_eq!(driver.count("screenshot"), 1);
        assert_eq!(driver.count("page_source"), 0);
        assert_eq!(llm.calls(), 1);
    }

    #[tokio::test]
    async fn test_cached_plan_replayed_without_model() {
        let cache = Arc::new(ResponseCache::memory_only());
        cache.put(
            "click",
            &Plan::new(vec![ActionItem::click(Locator::Coordinate(Point::new(7, 7)))]),
        );
        let (orch, driver, llm) = build(&[], cache);
        let outcome = orch.run("click").await.unwrap();
        assert_eq!(outcome.source, PlanSource::Cache);
        assert_eq!(llm.calls(), 0);
        assert_eq!(
            driver.action_calls(),
            vec![DriverCall::Click(Locator::Coordinate(Point::new(7, 7)))]
        );
    }
}
