//! Shared fakes for the relay and pipeline tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures_util::{stream, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::provider::{
    ChatSession, ChunkStream, GenerateResponse, GenerativeProvider, ProviderError, SessionSpec,
};
use crate::stream::{RelayEvent, RelaySink, SinkClosed};

/// What a scripted session yields once its prompt is sent.
#[derive(Clone)]
pub enum Script {
    /// These fragments, then the end of the stream. `None` marks a failure.
    Fragments(Vec<Option<&'static str>>),
    /// These fragments, then nothing ever again.
    Hang(Vec<&'static str>),
    /// `stream_prompt` itself fails.
    RejectPrompt,
}

pub struct ScriptedSession {
    script: Script,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl ScriptedSession {
    pub fn boxed(script: Script) -> Box<dyn ChatSession> {
        Box::new(Self {
            script,
            prompts: Arc::default(),
        })
    }
}

#[async_trait]
impl ChatSession for ScriptedSession {
    async fn stream_prompt(self: Box<Self>, prompt: &str) -> Result<ChunkStream, ProviderError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        match self.script {
            Script::Fragments(items) => Ok(Box::pin(stream::iter(items.into_iter().map(
                |item| match item {
                    Some(text) => Ok(text.to_string()),
                    None => Err(ProviderError::Unavailable("scripted failure".to_string())),
                },
            )))),
            Script::Hang(items) => Ok(Box::pin(
                stream::iter(items.into_iter().map(|t| Ok(t.to_string())))
                    .chain(stream::pending()),
            )),
            Script::RejectPrompt => Err(ProviderError::Api {
                status: 400,
                message: "API key not valid".to_string(),
            }),
        }
    }
}

/// Provider that hands out scripted sessions and records what it was asked.
pub struct FakeProvider {
    script: Script,
    fail_open: bool,
    pub specs: Mutex<Vec<SessionSpec>>,
    pub prompts: Arc<Mutex<Vec<String>>>,
}

impl FakeProvider {
    pub fn new(script: Script) -> Arc<Self> {
        Arc::new(Self {
            script,
            fail_open: false,
            specs: Mutex::new(Vec::new()),
            prompts: Arc::default(),
        })
    }

    pub fn failing_open() -> Arc<Self> {
        Arc::new(Self {
            script: Script::Fragments(vec![]),
            fail_open: true,
            specs: Mutex::new(Vec::new()),
            prompts: Arc::default(),
        })
    }

    pub fn specs(&self) -> Vec<SessionSpec> {
        self.specs.lock().unwrap().clone()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl GenerativeProvider for FakeProvider {
    fn name(&self) -> &str {
        "fake"
    }

    async fn open_session(&self, spec: SessionSpec) -> Result<Box<dyn ChatSession>, ProviderError> {
        self.specs.lock().unwrap().push(spec);
        if self.fail_open {
            return Err(ProviderError::Unavailable("unreachable".to_string()));
        }
        Ok(Box::new(ScriptedSession {
            script: self.script.clone(),
            prompts: self.prompts.clone(),
        }))
    }

    async fn generate_text(
        &self,
        model: &str,
        _api_key: &str,
        prompt: &str,
    ) -> Result<GenerateResponse, ProviderError> {
        Ok(GenerateResponse {
            total_tokens: prompt.len() as u64,
            text: format!("{model}: {prompt}"),
        })
    }
}

/// Collects emitted events. Can be told to close after a number of events,
/// or to cancel a token when the first chunk arrives.
#[derive(Default)]
pub struct CollectingSink {
    events: Mutex<Vec<RelayEvent>>,
    close_after: Option<usize>,
    cancel_on_chunk: Option<CancellationToken>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn closing_after(n: usize) -> Self {
        Self {
            close_after: Some(n),
            ..Self::default()
        }
    }

    pub fn cancelling_on_chunk(token: CancellationToken) -> Self {
        Self {
            cancel_on_chunk: Some(token),
            ..Self::default()
        }
    }

    pub fn events(&self) -> Vec<RelayEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl RelaySink for CollectingSink {
    async fn emit(&self, event: RelayEvent) -> Result<(), SinkClosed> {
        let mut events = self.events.lock().unwrap();
        if self.close_after.is_some_and(|n| events.len() >= n) {
            return Err(SinkClosed);
        }
        if let (Some(token), RelayEvent::Chunk { .. }) = (&self.cancel_on_chunk, &event) {
            token.cancel();
        }
        events.push(event);
        Ok(())
    }
}

pub fn chunk(text: &str) -> RelayEvent {
    RelayEvent::Chunk {
        text: text.to_string(),
    }
}
