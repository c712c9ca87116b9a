use gemchat_core::types::ChatRequest;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::ChatError;
use crate::persona::PersonaResolver;
use crate::relay::{RelayOutcome, StreamRelay};
use crate::session::SessionFactory;
use crate::stream::{RelayEvent, RelaySink};

/// How a chat request ended, and which mentioned personas were found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatOutcome {
    pub relay: RelayOutcome,
    /// Every resolved persona, not just the one applied. Empty when the
    /// request failed before resolution finished.
    pub persona_ids: Vec<String>,
}

/// Persona resolution, session opening and relaying for one chat request.
pub struct ChatPipeline {
    resolver: PersonaResolver,
    sessions: SessionFactory,
    relay: StreamRelay,
}

impl ChatPipeline {
    pub fn new(resolver: PersonaResolver, sessions: SessionFactory, relay: StreamRelay) -> Self {
        Self {
            resolver,
            sessions,
            relay,
        }
    }

    pub fn sessions(&self) -> &SessionFactory {
        &self.sessions
    }

    /// Run a request through to the relay.
    ///
    /// Failures before the first fragment could be relayed come back as
    /// `Err` with nothing emitted; from the relay on, the relay reports its
    /// own failures to the sink.
    pub async fn run(
        &self,
        request: ChatRequest,
        sink: &dyn RelaySink,
        cancel: &CancellationToken,
    ) -> Result<ChatOutcome, ChatError> {
        if request.prompt.trim().is_empty() {
            return Err(ChatError::InvalidRequest("prompt is empty".to_string()));
        }

        let resolved = self.resolver.resolve(request).await?;
        info!(
            persona_ids = ?resolved.persona_ids,
            model = self.sessions.select_model(&resolved.request),
            history = resolved.request.request.history.len(),
            "chat request resolved"
        );

        let session = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Ok(ChatOutcome {
                    relay: RelayOutcome::Cancelled,
                    persona_ids: resolved.persona_ids,
                })
            }
            session = self.sessions.open_session(&resolved.request) => session?,
        };

        let prompt = &resolved.request.request.prompt;
        let relay = self.relay.relay(session, sink, prompt, cancel).await;
        Ok(ChatOutcome {
            relay,
            persona_ids: resolved.persona_ids,
        })
    }

    /// Like [`run`](Self::run), but never fails: a pre-relay error is logged
    /// and reported to the client as `Error` followed by `End`.
    pub async fn handle(
        &self,
        request: ChatRequest,
        sink: &dyn RelaySink,
        cancel: &CancellationToken,
    ) -> ChatOutcome {
        match self.run(request, sink, cancel).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(error = %e, "chat request failed before streaming");
                let relay = if cancel.is_cancelled()
                    || sink.emit(RelayEvent::Error).await.is_err()
                    || sink.emit(RelayEvent::End).await.is_err()
                {
                    RelayOutcome::Cancelled
                } else {
                    RelayOutcome::Failed { chunks: 0 }
                };
                ChatOutcome {
                    relay,
                    persona_ids: Vec::new(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use gemchat_core::types::Persona;
    use gemchat_store::StoreError;

    use crate::persona::PersonaStore;
    use crate::provider::GenerativeProvider;
    use crate::session::GeminiSettings;
    use crate::testing::{chunk, CollectingSink, FakeProvider, Script};

    struct StaticStore(Vec<Persona>);

    #[async_trait]
    impl PersonaStore for StaticStore {
        async fn get_personas_by_ids(&self, ids: &[String]) -> Result<Vec<Persona>, StoreError> {
            Ok(self.0.iter().filter(|p| ids.contains(&p.id)).cloned().collect())
        }
    }

    struct FailingStore;

    #[async_trait]
    impl PersonaStore for FailingStore {
        async fn get_personas_by_ids(&self, _ids: &[String]) -> Result<Vec<Persona>, StoreError> {
            Err(StoreError::NotFound {
                entity: "table",
                id: "personas".to_string(),
            })
        }
    }

    fn terse() -> Persona {
        Persona {
            id: "p1".to_string(),
            user_id: None,
            name: "Terse".to_string(),
            description: None,
            system_prompt: "You are terse.".to_string(),
            model_used: "gemini-2.5-pro".to_string(),
            api_key_id: "k1".to_string(),
            created_at: "2025-01-01T00:00:00.000000Z".to_string(),
            updated_at: "2025-01-01T00:00:00.000000Z".to_string(),
        }
    }

    fn pipeline(store: Arc<dyn PersonaStore>, provider: Arc<dyn GenerativeProvider>) -> ChatPipeline {
        ChatPipeline::new(
            PersonaResolver::new(store),
            SessionFactory::new(
                provider,
                GeminiSettings {
                    default_model: "gemini-2.0-flash".to_string(),
                    default_api_key: "AIza-default".to_string(),
                    allowed_models: vec![
                        "gemini-2.0-flash".to_string(),
                        "gemini-2.0-pro".to_string(),
                        "gemini-2.5-pro".to_string(),
                    ],
                },
            ),
            StreamRelay::new(Duration::from_secs(5), Duration::from_secs(30)),
        )
    }

    fn request(prompt: &str, model: &str, mentions: &[&str]) -> ChatRequest {
        let mut req = ChatRequest::new(prompt, model);
        if !mentions.is_empty() {
            req.mentioned_persona_ids = Some(mentions.iter().map(|m| m.to_string()).collect());
        }
        req
    }

    #[tokio::test]
    async fn mentioned_persona_shapes_the_session() {
        let provider = FakeProvider::new(Script::Fragments(vec![Some("Hi")]));
        let pipeline = pipeline(Arc::new(StaticStore(vec![terse()])), provider.clone());
        let sink = CollectingSink::new();

        let outcome = pipeline
            .handle(
                request("Hello", "gemini-2.0-flash", &["p1"]),
                &sink,
                &CancellationToken::new(),
            )
            .await;

        assert_eq!(outcome.relay, RelayOutcome::Completed { chunks: 1 });
        assert_eq!(outcome.persona_ids, vec!["p1".to_string()]);
        let specs = provider.specs();
        assert_eq!(specs[0].system_instruction.as_deref(), Some("You are terse."));
        assert_eq!(specs[0].model, "gemini-2.5-pro");
        assert_eq!(provider.prompts(), vec!["Hello".to_string()]);
    }

    #[tokio::test]
    async fn missing_persona_uses_requested_model() {
        let provider = FakeProvider::new(Script::Fragments(vec![Some("ok")]));
        let pipeline = pipeline(Arc::new(StaticStore(vec![])), provider.clone());
        let sink = CollectingSink::new();

        let outcome = pipeline
            .handle(
                request("Hello", "gemini-2.0-pro", &["missing-id"]),
                &sink,
                &CancellationToken::new(),
            )
            .await;
        assert!(outcome.persona_ids.is_empty());

        let specs = provider.specs();
        assert_eq!(specs[0].model, "gemini-2.0-pro");
        assert!(specs[0].system_instruction.is_none());
    }

    #[tokio::test]
    async fn fragments_reach_the_client_in_order() {
        let provider = FakeProvider::new(Script::Fragments(vec![Some("Hel"), Some("lo")]));
        let pipeline = pipeline(Arc::new(StaticStore(vec![])), provider);
        let sink = CollectingSink::new();

        pipeline
            .handle(
                request("Hi", "gemini-2.0-flash", &[]),
                &sink,
                &CancellationToken::new(),
            )
            .await;
        assert_eq!(sink.events(), vec![chunk("Hel"), chunk("lo"), RelayEvent::End]);
    }

    #[tokio::test]
    async fn blank_prompt_never_reaches_the_provider() {
        let provider = FakeProvider::new(Script::Fragments(vec![Some("x")]));
        let pipeline = pipeline(Arc::new(StaticStore(vec![])), provider.clone());
        let sink = CollectingSink::new();

        let err = pipeline
            .run(
                request("   ", "gemini-2.0-flash", &[]),
                &sink,
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::InvalidRequest(_)));
        assert!(sink.events().is_empty());

        let outcome = pipeline
            .handle(
                request("", "gemini-2.0-flash", &[]),
                &sink,
                &CancellationToken::new(),
            )
            .await;
        assert_eq!(outcome.relay, RelayOutcome::Failed { chunks: 0 });
        assert_eq!(sink.events(), vec![RelayEvent::Error, RelayEvent::End]);
        assert!(provider.specs().is_empty());
    }

    #[tokio::test]
    async fn store_failure_is_reported_generically() {
        let provider = FakeProvider::new(Script::Fragments(vec![Some("x")]));
        let pipeline = pipeline(Arc::new(FailingStore), provider.clone());
        let sink = CollectingSink::new();

        let outcome = pipeline
            .handle(
                request("Hello", "gemini-2.0-flash", &["p1"]),
                &sink,
                &CancellationToken::new(),
            )
            .await;
        assert_eq!(outcome.relay, RelayOutcome::Failed { chunks: 0 });
        assert!(outcome.persona_ids.is_empty());
        assert_eq!(sink.events(), vec![RelayEvent::Error, RelayEvent::End]);
        assert!(provider.specs().is_empty());
    }

    #[tokio::test]
    async fn session_open_failure_is_reported_generically() {
        let pipeline = pipeline(Arc::new(StaticStore(vec![])), FakeProvider::failing_open());
        let sink = CollectingSink::new();

        let err = pipeline
            .run(
                request("Hello", "gemini-2.0-flash", &[]),
                &sink,
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::Provider(_)));

        pipeline
            .handle(
                request("Hello", "gemini-2.0-flash", &[]),
                &sink,
                &CancellationToken::new(),
            )
            .await;
        assert_eq!(sink.events(), vec![RelayEvent::Error, RelayEvent::End]);
    }

    #[tokio::test]
    async fn cancelled_request_emits_nothing() {
        let provider = FakeProvider::new(Script::Fragments(vec![Some("x")]));
        let pipeline = pipeline(Arc::new(StaticStore(vec![])), provider);
        let sink = CollectingSink::new();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = pipeline
            .handle(request("Hello", "gemini-2.0-flash", &[]), &sink, &cancel)
            .await;
        assert_eq!(outcome.relay, RelayOutcome::Cancelled);
        assert!(sink.events().is_empty());
    }
}
