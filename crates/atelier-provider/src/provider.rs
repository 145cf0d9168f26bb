use atelier_core::{AtelierResult, ModelTier};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Options for one capability invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvokeOptions {
    /// Abstract cost/quality profile the provider should map to a model.
    pub model_tier: ModelTier,
    /// Output token ceiling.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
    /// Caller-enforced call timeout. Providers may also enforce it
    /// internally; the executor treats an elapsed timeout as transient.
    pub timeout_ms: u64,
}

impl Default for InvokeOptions {
    fn default() -> Self {
        Self {
            model_tier: ModelTier::Standard,
            max_tokens: 4096,
            temperature: 0.7,
            timeout_ms: 60_000,
        }
    }
}

/// The result of one successful invocation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderResponse {
    /// The generated text.
    pub text: String,
    /// Tokens consumed by the call.
    pub tokens_used: u64,
    /// Tools the provider used while answering.
    #[serde(default)]
    pub tools_used: Vec<String>,
    /// Source references backing the answer.
    #[serde(default)]
    pub sources: Vec<String>,
}

/// Events emitted during a streaming invocation.
///
/// Consumers may forward partial chunks live; the executor buffers until
/// the terminal event and works with the aggregated response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// A chunk of generated text.
    TextDelta {
        /// The text fragment.
        text: String,
    },
    /// The stream finished successfully.
    Done,
    /// The stream failed.
    Error {
        /// Failure description.
        message: String,
    },
}

/// Trait for capability-provider backends.
///
/// This is the only boundary the engine has with actual language-model
/// backends. Implementations must be cheap to share (`Send + Sync`): the
/// orchestrator holds one behind an `Arc` and fans invocations out across
/// worker tasks.
#[async_trait]
pub trait CapabilityProvider: Send + Sync {
    /// Non-streaming invocation: one prompt in, one response out.
    async fn invoke(&self, prompt: &str, options: &InvokeOptions)
        -> AtelierResult<ProviderResponse>;

    /// Streaming invocation.
    ///
    /// Returns a receiver of incremental [`StreamEvent`]s plus a join
    /// handle resolving to the final aggregated response. The default
    /// implementation adapts [`CapabilityProvider::invoke`] into a
    /// single-chunk stream, so non-streaming backends get streaming
    /// support for free.
    async fn invoke_stream(
        &self,
        prompt: &str,
        options: &InvokeOptions,
    ) -> AtelierResult<(
        mpsc::Receiver<StreamEvent>,
        JoinHandle<AtelierResult<ProviderResponse>>,
    )> {
        let response = self.invoke(prompt, options).await?;
        let (tx, rx) = mpsc::channel(2);
        let handle = tokio::spawn(async move {
            let _ = tx
                .send(StreamEvent::TextDelta {
                    text: response.text.clone(),
                })
                .await;
            let _ = tx.send(StreamEvent::Done).await;
            Ok(response)
        });
        Ok((rx, handle))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use atelier_core::AtelierError;

    struct EchoProvider;

    #[async_trait]
    impl CapabilityProvider for EchoProvider {
        async fn invoke(
            &self,
            prompt: &str,
            _options: &InvokeOptions,
        ) -> AtelierResult<ProviderResponse> {
            Ok(ProviderResponse {
                text: format!("echo: {prompt}"),
                tokens_used: prompt.len() as u64,
                tools_used: vec![],
                sources: vec![],
            })
        }
    }

    struct BrokenProvider;

    #[async_trait]
    impl CapabilityProvider for BrokenProvider {
        async fn invoke(
            &self,
            _prompt: &str,
            _options: &InvokeOptions,
        ) -> AtelierResult<ProviderResponse> {
            Err(AtelierError::Provider("503 unavailable".into()))
        }
    }

    #[tokio::test]
    async fn test_invoke_round_trip() {
        let provider = EchoProvider;
        let resp = provider
            .invoke("hello", &InvokeOptions::default())
            .await
            .unwrap();
        assert_eq!(resp.text, "echo: hello");
        assert_eq!(resp.tokens_used, 5);
    }

    #[tokio::test]
    async fn test_default_stream_adapter_yields_chunk_then_done() {
        let provider = EchoProvider;
        let (mut rx, handle) = provider
            .invoke_stream("hi", &InvokeOptions::default())
            .await
            .unwrap();

        let first = rx.recv().await.unwrap();
        assert!(matches!(first, StreamEvent::TextDelta { ref text } if text == "echo: hi"));
        let second = rx.recv().await.unwrap();
        assert!(matches!(second, StreamEvent::Done));
        assert!(rx.recv().await.is_none());

        let final_resp = handle.await.unwrap().unwrap();
        assert_eq!(final_resp.text, "echo: hi");
    }

    #[tokio::test]
    async fn test_default_stream_adapter_propagates_error() {
        let provider = BrokenProvider;
        let result = provider.invoke_stream("hi", &InvokeOptions::default()).await;
        assert!(result.is_err());
    }

    #[test]
    fn test_stream_event_serialization() {
        let event = StreamEvent::TextDelta {
            text: "chunk".into(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"text_delta\""));
    }
}
