use crate::registry::AgentDefinition;
use atelier_core::{AgentExecution, AgentTask, AtelierError, FailureKind};
use atelier_provider::{classify_failure, CapabilityProvider, InvokeOptions, RetryPolicy};
use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use uuid::Uuid;

/// Type alias for the injectable sleep function used in tests.
#[cfg(test)]
type SleepFn = Box<
    dyn Fn(u64) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send>> + Send + Sync,
>;

/// Outputs of a task's dependencies, threaded into its prompt.
#[derive(Debug, Clone, Default)]
pub struct HandoffContext {
    entries: Vec<(String, String)>,
}

impl HandoffContext {
    /// An empty context (first-phase tasks).
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one labelled dependency output.
    pub fn push(&mut self, label: impl Into<String>, output: impl Into<String>) {
        self.entries.push((label.into(), output.into()));
    }

    /// Renders the context for the `{context}` prompt slot.
    pub fn render(&self) -> String {
        if self.entries.is_empty() {
            return "(none)".to_string();
        }
        self.entries
            .iter()
            .map(|(label, output)| format!("--- {label} ---\n{output}"))
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// Terminal outcome of one task after all attempts.
#[derive(Debug, Clone)]
pub enum TaskOutcome {
    /// The final attempt produced this text.
    Succeeded(String),
    /// No attempt succeeded.
    Failed {
        /// Terminal classification. Exhausted transient retries end
        /// permanent.
        kind: FailureKind,
        /// Why the task failed.
        reason: String,
    },
}

/// Executes single agent tasks against the capability provider.
///
/// Handles prompt assembly, the per-attempt timeout, failure
/// classification, and retry with exponential backoff. Every attempt —
/// including failed ones — yields an [`AgentExecution`] record.
pub struct AgentExecutor {
    provider: Arc<dyn CapabilityProvider>,
    policy: RetryPolicy,
    /// Injectable sleep for tests (skips real backoff delays).
    #[cfg(test)]
    sleep_fn: Option<SleepFn>,
}

impl AgentExecutor {
    /// Creates an executor over the given provider.
    pub fn new(provider: Arc<dyn CapabilityProvider>, policy: RetryPolicy) -> Self {
        Self {
            provider,
            policy,
            #[cfg(test)]
            sleep_fn: None,
        }
    }

    async fn do_sleep(&self, ms: u64) {
        #[cfg(test)]
        if let Some(ref f) = self.sleep_fn {
            f(ms).await;
            return;
        }
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    /// Runs one task to a terminal outcome.
    ///
    /// Produces at most `task.max_retries + 1` attempt records; the last
    /// record's `success` matches the outcome.
    pub async fn execute(
        &self,
        task: &AgentTask,
        agent: &AgentDefinition,
        context: &HandoffContext,
    ) -> (Vec<AgentExecution>, TaskOutcome) {
        let prompt = agent
            .prompt_template
            .replace("{task}", &task.prompt_input)
            .replace("{context}", &context.render());
        let options = InvokeOptions {
            model_tier: task.model_tier,
            max_tokens: agent.max_tokens,
            temperature: agent.temperature,
            timeout_ms: task.timeout_ms,
        };

        let mut records = Vec::new();
        let mut last_error = String::new();

        for attempt in 0..=task.max_retries {
            let start = Instant::now();
            let result = match tokio::time::timeout(
                Duration::from_millis(task.timeout_ms),
                self.provider.invoke(&prompt, &options),
            )
            .await
            {
                Ok(inner) => inner,
                Err(_) => Err(AtelierError::Invocation {
                    kind: FailureKind::Transient,
                    message: format!("provider call timed out after {}ms", task.timeout_ms),
                }),
            };
            let latency_ms = start.elapsed().as_millis() as u64;

            match result {
                Ok(response) => {
                    let cost = task.model_tier.cost_per_1k_tokens()
                        * (response.tokens_used as f64 / 1000.0);
                    records.push(AgentExecution {
                        id: Uuid::new_v4(),
                        task_id: task.id,
                        agent_id: task.agent_id.clone(),
                        model_tier: task.model_tier,
                        attempt,
                        input: prompt.clone(),
                        output: Some(response.text.clone()),
                        success: true,
                        error: None,
                        tokens_used: response.tokens_used,
                        latency_ms,
                        cost,
                        timestamp: Utc::now(),
                        tools_used: response.tools_used,
                        sources: response.sources,
                    });
                    info!(
                        task_id = %task.id,
                        agent = %task.agent_id,
                        attempt,
                        latency_ms,
                        "task attempt succeeded"
                    );
                    return (records, TaskOutcome::Succeeded(response.text));
                }
                Err(e) => {
                    let kind = classify_failure(&e);
                    let message = e.to_string();
                    records.push(AgentExecution {
                        id: Uuid::new_v4(),
                        task_id: task.id,
                        agent_id: task.agent_id.clone(),
                        model_tier: task.model_tier,
                        attempt,
                        input: prompt.clone(),
                        output: None,
                        success: false,
                        error: Some(message.clone()),
                        tokens_used: 0,
                        latency_ms,
                        cost: 0.0,
                        timestamp: Utc::now(),
                        tools_used: Vec::new(),
                        sources: Vec::new(),
                    });

                    if kind == FailureKind::Permanent {
                        warn!(
                            task_id = %task.id,
                            agent = %task.agent_id,
                            attempt,
                            error = %message,
                            "permanent failure, not retrying"
                        );
                        return (
                            records,
                            TaskOutcome::Failed {
                                kind: FailureKind::Permanent,
                                reason: message,
                            },
                        );
                    }

                    if attempt < task.max_retries {
                        let delay = self.policy.backoff_delay_ms(attempt);
                        info!(
                            task_id = %task.id,
                            attempt,
                            delay_ms = delay,
                            error = %message,
                            "transient failure, backing off"
                        );
                        self.do_sleep(delay).await;
                    }
                    last_error = message;
                }
            }
        }

        // Transient retries exhausted: terminal failure is permanent.
        warn!(
            task_id = %task.id,
            agent = %task.agent_id,
            attempts = task.max_retries + 1,
            "retries exhausted"
        );
        (
            records,
            TaskOutcome::Failed {
                kind: FailureKind::Permanent,
                reason: format!(
                    "retries exhausted after {} attempts: {last_error}",
                    task.max_retries + 1
                ),
            },
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use atelier_core::{AtelierResult, ModelTier};
    use atelier_provider::ProviderResponse;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// A provider that returns a scripted sequence of results.
    struct ScriptedProvider {
        results: tokio::sync::Mutex<Vec<AtelierResult<ProviderResponse>>>,
        calls: AtomicU32,
    }

    impl ScriptedProvider {
        fn new(results: Vec<AtelierResult<ProviderResponse>>) -> Self {
            Self {
                results: tokio::sync::Mutex::new(results),
                calls: AtomicU32::new(0),
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CapabilityProvider for ScriptedProvider {
        async fn invoke(
            &self,
            _prompt: &str,
            _options: &InvokeOptions,
        ) -> AtelierResult<ProviderResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut results = self.results.lock().await;
            if results.is_empty() {
                return Err(AtelierError::Provider("script exhausted".into()));
            }
            results.remove(0)
        }
    }

    /// A provider that never answers within any timeout.
    struct HangingProvider;

    #[async_trait]
    impl CapabilityProvider for HangingProvider {
        async fn invoke(
            &self,
            _prompt: &str,
            _options: &InvokeOptions,
        ) -> AtelierResult<ProviderResponse> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(ProviderResponse::default())
        }
    }

    fn instant_executor(provider: Arc<dyn CapabilityProvider>) -> AgentExecutor {
        AgentExecutor {
            provider,
            policy: RetryPolicy::instant(),
            sleep_fn: Some(Box::new(|_| Box::pin(async {}))),
        }
    }

    fn test_agent() -> AgentDefinition {
        AgentDefinition {
            id: "writer".into(),
            name: "Writer".into(),
            capabilities: vec![atelier_core::Capability::Writing],
            default_tier: ModelTier::Standard,
            prompt_template: "Role prompt.\n\nTask: {task}\n\nContext:\n{context}".into(),
            max_tokens: 1024,
            temperature: 0.7,
            priority: 0,
        }
    }

    fn ok_response(text: &str, tokens: u64) -> ProviderResponse {
        ProviderResponse {
            text: text.into(),
            tokens_used: tokens,
            tools_used: vec![],
            sources: vec![],
        }
    }

    #[tokio::test]
    async fn test_success_on_first_attempt() {
        let provider = Arc::new(ScriptedProvider::new(vec![Ok(ok_response("draft", 2000))]));
        let executor = instant_executor(provider.clone());
        let task = AgentTask::new("writer", "draft essay", ModelTier::Standard);

        let (records, outcome) = executor
            .execute(&task, &test_agent(), &HandoffContext::new())
            .await;

        assert_eq!(records.len(), 1);
        assert!(records[0].success);
        assert_eq!(records[0].attempt, 0);
        let expected_cost = ModelTier::Standard.cost_per_1k_tokens() * 2.0;
        assert!((records[0].cost - expected_cost).abs() < 1e-9);
        assert!(matches!(outcome, TaskOutcome::Succeeded(ref t) if t == "draft"));
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_transient_failure_retries_then_succeeds() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Err(AtelierError::Provider("429 rate limit".into())),
            Ok(ok_response("second try", 100)),
        ]));
        let executor = instant_executor(provider.clone());
        let task = AgentTask::new("writer", "draft", ModelTier::Standard);

        let (records, outcome) = executor
            .execute(&task, &test_agent(), &HandoffContext::new())
            .await;

        assert_eq!(records.len(), 2);
        assert!(!records[0].success);
        assert_eq!(records[0].cost, 0.0);
        assert!(records[1].success);
        assert!(matches!(outcome, TaskOutcome::Succeeded(_)));
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn test_permanent_failure_stops_immediately() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Err(AtelierError::Provider("400 invalid input".into())),
            Ok(ok_response("never reached", 10)),
        ]));
        let executor = instant_executor(provider.clone());
        let task = AgentTask::new("writer", "draft", ModelTier::Standard).with_max_retries(3);

        let (records, outcome) = executor
            .execute(&task, &test_agent(), &HandoffContext::new())
            .await;

        assert_eq!(records.len(), 1);
        assert!(matches!(
            outcome,
            TaskOutcome::Failed {
                kind: FailureKind::Permanent,
                ..
            }
        ));
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_retry_exhaustion_record_count() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Err(AtelierError::Provider("503 unavailable".into())),
            Err(AtelierError::Provider("503 unavailable".into())),
            Err(AtelierError::Provider("503 unavailable".into())),
        ]));
        let executor = instant_executor(provider.clone());
        let task = AgentTask::new("writer", "draft", ModelTier::Standard).with_max_retries(2);

        let (records, outcome) = executor
            .execute(&task, &test_agent(), &HandoffContext::new())
            .await;

        // max_retries = 2 means exactly 3 attempts.
        assert_eq!(records.len(), 3);
        assert!(records.iter().all(|r| !r.success));
        assert!(matches!(outcome, TaskOutcome::Failed { .. }));
        assert_eq!(provider.calls(), 3);
    }

    #[tokio::test]
    async fn test_timeout_is_transient_until_exhausted() {
        let executor = instant_executor(Arc::new(HangingProvider));
        let task = AgentTask::new("writer", "draft", ModelTier::Standard)
            .with_max_retries(2)
            .with_timeout_ms(10);

        let (records, outcome) = executor
            .execute(&task, &test_agent(), &HandoffContext::new())
            .await;

        assert_eq!(records.len(), 3);
        assert!(records
            .iter()
            .all(|r| r.error.as_deref().unwrap_or("").contains("timed out")));
        match outcome {
            TaskOutcome::Failed { kind, reason } => {
                assert_eq!(kind, FailureKind::Permanent);
                assert!(reason.contains("retries exhausted"));
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_prompt_carries_task_and_context() {
        let provider = Arc::new(ScriptedProvider::new(vec![Ok(ok_response("ok", 10))]));
        let executor = instant_executor(provider);
        let task = AgentTask::new("writer", "draft the essay", ModelTier::Standard);
        let mut context = HandoffContext::new();
        context.push("researcher", "tides are caused by the moon");

        let (records, _) = executor
            .execute(&task, &test_agent(), &context)
            .await;

        let prompt = &records[0].input;
        assert!(prompt.contains("draft the essay"));
        assert!(prompt.contains("--- researcher ---"));
        assert!(prompt.contains("tides are caused by the moon"));
    }

    #[test]
    fn test_empty_context_renders_placeholder() {
        assert_eq!(HandoffContext::new().render(), "(none)");
    }
}
