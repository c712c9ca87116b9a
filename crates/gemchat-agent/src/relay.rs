use std::time::Duration;

use futures_util::StreamExt;
use gemchat_core::config::GeminiConfig;
use tokio::time::{timeout_at, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::provider::{ChatSession, ProviderError};
use crate::stream::{RelayEvent, RelaySink};

/// How a relayed request ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayOutcome {
    /// Stream exhausted; `End` was delivered.
    Completed { chunks: usize },
    /// `Error` then `End` were sent after `chunks` fragments.
    Failed { chunks: usize },
    /// Client went away; nothing further was sent.
    Cancelled,
}

enum Interrupted {
    Provider { error: ProviderError, chunks: usize },
    SinkClosed,
}

/// Forwards a session's fragments to a client connection.
#[derive(Debug, Clone)]
pub struct StreamRelay {
    first_chunk_timeout: Duration,
    stream_timeout: Duration,
}

impl StreamRelay {
    pub fn new(first_chunk_timeout: Duration, stream_timeout: Duration) -> Self {
        Self {
            first_chunk_timeout,
            stream_timeout,
        }
    }

    pub fn from_config(cfg: &GeminiConfig) -> Self {
        Self::new(
            Duration::from_secs(cfg.first_chunk_timeout_secs),
            Duration::from_secs(cfg.stream_timeout_secs),
        )
    }

    /// Send `prompt` and forward every non-empty fragment, in arrival order,
    /// as one `Chunk`.
    ///
    /// The last event is always `End`, preceded by a single `Error` when the
    /// provider fails or a timeout expires. Once `cancel` fires or the sink
    /// reports the client gone, the provider stream is dropped and nothing
    /// more is emitted.
    pub async fn relay(
        &self,
        session: Box<dyn ChatSession>,
        sink: &dyn RelaySink,
        prompt: &str,
        cancel: &CancellationToken,
    ) -> RelayOutcome {
        let forwarded = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("relay cancelled");
                return RelayOutcome::Cancelled;
            }
            r = self.forward(session, sink, prompt) => r,
        };

        match forwarded {
            Ok(chunks) => {
                if sink.emit(RelayEvent::End).await.is_err() {
                    return RelayOutcome::Cancelled;
                }
                debug!(chunks, "stream completed");
                RelayOutcome::Completed { chunks }
            }
            Err(Interrupted::SinkClosed) => {
                debug!("client gone, dropping provider stream");
                RelayOutcome::Cancelled
            }
            Err(Interrupted::Provider { error, chunks }) => {
                warn!(error = %error, chunks, "stream failed");
                if sink.emit(RelayEvent::Error).await.is_err()
                    || sink.emit(RelayEvent::End).await.is_err()
                {
                    return RelayOutcome::Cancelled;
                }
                RelayOutcome::Failed { chunks }
            }
        }
    }

    async fn forward(
        &self,
        session: Box<dyn ChatSession>,
        sink: &dyn RelaySink,
        prompt: &str,
    ) -> Result<usize, Interrupted> {
        let started = Instant::now();
        let fail = |error: ProviderError, chunks: usize| Interrupted::Provider { error, chunks };

        let (until, expired) = self.limit(started, 0);
        let mut stream = match timeout_at(until, session.stream_prompt(prompt)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return Err(fail(e, 0)),
            Err(_) => return Err(fail(expired, 0)),
        };

        let mut chunks = 0;
        loop {
            let (until, expired) = self.limit(started, chunks);
            let next = match timeout_at(until, stream.next()).await {
                Ok(next) => next,
                Err(_) => return Err(fail(expired, chunks)),
            };
            match next {
                None => return Ok(chunks),
                Some(Err(e)) => return Err(fail(e, chunks)),
                Some(Ok(text)) if text.is_empty() => continue,
                Some(Ok(text)) => {
                    sink.emit(RelayEvent::Chunk { text })
                        .await
                        .map_err(|_| Interrupted::SinkClosed)?;
                    chunks += 1;
                }
            }
        }
    }

    /// The deadline for the next step and the error to report if it passes.
    /// Until the first fragment arrives the tighter first-chunk bound applies.
    fn limit(&self, started: Instant, chunks: usize) -> (Instant, ProviderError) {
        let total = started + self.stream_timeout;
        let first = started + self.first_chunk_timeout;
        if chunks == 0 && first < total {
            (
                first,
                ProviderError::Timeout {
                    stage: "first chunk",
                    secs: self.first_chunk_timeout.as_secs(),
                },
            )
        } else {
            (
                total,
                ProviderError::Timeout {
                    stage: "stream end",
                    secs: self.stream_timeout.as_secs(),
                },
            )
        }
    }
}
