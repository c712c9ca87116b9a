//! Google Gemini (Generative Language API) provider.
//!
//! Streaming uses `models/{model}:streamGenerateContent?alt=sse`, where every
//! `data:` line is a complete `GenerateContentResponse` JSON object. The key
//! travels in the `x-goog-api-key` header so it never lands in access logs.

use async_trait::async_trait;
use futures_util::{Stream, StreamExt};
use gemchat_core::config::GeminiConfig;
use gemchat_core::types::{Content, Role};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::provider::{
    ChatSession, ChunkStream, GenerateResponse, GenerativeProvider, ProviderError, SessionSpec,
};
use crate::stream::{parse_sse_line, SseParsed};

pub struct GeminiProvider {
    client: reqwest::Client,
    base_url: String,
    generation_config: Option<Value>,
}

impl GeminiProvider {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            generation_config: None,
        }
    }

    pub fn from_config(cfg: &GeminiConfig) -> Self {
        let mut provider = Self::new(&cfg.base_url);
        provider.generation_config = generation_config(cfg.temperature, cfg.max_output_tokens);
        provider
    }

    fn endpoint(&self, model: &str, method: &str) -> String {
        format!("{}/models/{}:{}", self.base_url, model, method)
    }
}

/// `generationConfig` is only sent when something is actually configured.
fn generation_config(temperature: Option<f32>, max_output_tokens: Option<u32>) -> Option<Value> {
    let mut cfg = serde_json::Map::new();
    if let Some(t) = temperature {
        cfg.insert("temperature".to_string(), serde_json::json!(t));
    }
    if let Some(n) = max_output_tokens {
        cfg.insert("maxOutputTokens".to_string(), serde_json::json!(n));
    }
    (!cfg.is_empty()).then_some(Value::Object(cfg))
}

/// Build a `generateContent` / `streamGenerateContent` request body.
/// The prompt becomes the final user turn after the history.
fn build_body(
    history: &[Content],
    prompt: &str,
    system_instruction: Option<&str>,
    generation_config: Option<&Value>,
) -> Value {
    let mut contents: Vec<Value> = history.iter().map(content_json).collect();
    contents.push(serde_json::json!({
        "role": "user",
        "parts": [{ "text": prompt }]
    }));

    let mut body = serde_json::json!({ "contents": contents });
    if let Some(si) = system_instruction {
        body["systemInstruction"] = serde_json::json!({ "parts": [{ "text": si }] });
    }
    if let Some(gc) = generation_config {
        body["generationConfig"] = gc.clone();
    }
    body
}

fn content_json(content: &Content) -> Value {
    let role = match content.role {
        Role::User => "user",
        Role::Model => "model",
    };
    let parts: Vec<Value> = content
        .parts
        .iter()
        .map(|p| serde_json::json!({ "text": p.text }))
        .collect();
    serde_json::json!({ "role": role, "parts": parts })
}

/// Map non-2xx responses to provider errors, keeping the API's own message.
async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
    let status = resp.status().as_u16();
    if !resp.status().is_success() {
        let text = resp.text().await.unwrap_or_default();
        warn!(status, body = %text, "Gemini API error");
        return Err(api_error(status, text));
    }
    Ok(resp)
}

/// Error for a non-2xx body; the envelope's message when it parses, else the raw text.
fn api_error(status: u16, body: String) -> ProviderError {
    let message = serde_json::from_str::<ErrorEnvelope>(&body)
        .map(|e| e.error.message)
        .unwrap_or(body);
    ProviderError::Api { status, message }
}

#[async_trait]
impl GenerativeProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn open_session(&self, spec: SessionSpec) -> Result<Box<dyn ChatSession>, ProviderError> {
        if spec.api_key.trim().is_empty() {
            return Err(ProviderError::Unavailable("no Gemini API key".to_string()));
        }
        Ok(Box::new(GeminiSession {
            client: self.client.clone(),
            url: format!("{}?alt=sse", self.endpoint(&spec.model, "streamGenerateContent")),
            model: spec.model,
            api_key: spec.api_key,
            system_instruction: spec.system_instruction,
            history: spec.history,
            generation_config: self.generation_config.clone(),
        }))
    }

    async fn generate_text(
        &self,
        model: &str,
        api_key: &str,
        prompt: &str,
    ) -> Result<GenerateResponse, ProviderError> {
        let body = build_body(&[], prompt, None, self.generation_config.as_ref());
        debug!(model, "sending generateContent request");

        let resp = self
            .client
            .post(self.endpoint(model, "generateContent"))
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()
            .await?;
        let resp = check_status(resp).await?;

        let api_resp: GenerateContentResponse = resp
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;
        if let Some(err) = api_resp.error {
            return Err(err.into());
        }
        if let Some(reason) = api_resp.prompt_feedback.and_then(|f| f.block_reason) {
            return Err(ProviderError::Blocked(reason));
        }

        Ok(GenerateResponse {
            total_tokens: api_resp
                .usage_metadata
                .map(|u| u.total_token_count)
                .unwrap_or(0),
            text: api_resp
                .candidates
                .first()
                .map(Candidate::text)
                .unwrap_or_default(),
        })
    }
}

/// One bound conversation: model, key, persona instruction and history.
struct GeminiSession {
    client: reqwest::Client,
    url: String,
    model: String,
    api_key: String,
    system_instruction: Option<String>,
    history: Vec<Content>,
    generation_config: Option<Value>,
}

#[async_trait]
impl ChatSession for GeminiSession {
    async fn stream_prompt(self: Box<Self>, prompt: &str) -> Result<ChunkStream, ProviderError> {
        let body = build_body(
            &self.history,
            prompt,
            self.system_instruction.as_deref(),
            self.generation_config.as_ref(),
        );
        debug!(
            model = %self.model,
            history = self.history.len(),
            persona = self.system_instruction.is_some(),
            "opening Gemini stream"
        );

        let resp = self
            .client
            .post(&self.url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;
        let resp = check_status(resp).await?;

        Ok(Box::pin(text_stream(resp.bytes_stream())))
    }
}

/// Turn an SSE byte stream into text fragments.
///
/// Lines are split on raw bytes so a multi-byte character cut across two
/// network chunks is decoded intact.
fn text_stream<S, B, E>(bytes: S) -> impl Stream<Item = Result<String, ProviderError>> + Send
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Send + 'static,
    ProviderError: From<E>,
{
    async_stream::try_stream! {
        futures_util::pin_mut!(bytes);
        let mut line_buf: Vec<u8> = Vec::new();

        while let Some(chunk) = bytes.next().await {
            let chunk = chunk.map_err(ProviderError::from)?;
            line_buf.extend_from_slice(chunk.as_ref());

            while let Some(pos) = line_buf.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = line_buf.drain(..=pos).collect();
                let line = String::from_utf8_lossy(&line).into_owned();
                if let Some(text) = parse_event_line(line.trim())? {
                    yield text;
                }
            }
        }

        // Final line without a trailing newline.
        let line = String::from_utf8_lossy(&line_buf).into_owned();
        if let Some(text) = parse_event_line(line.trim())? {
            yield text;
        }
    }
}

fn parse_event_line(line: &str) -> Result<Option<String>, ProviderError> {
    match parse_sse_line(line) {
        Some(SseParsed::Data(data)) => parse_data(&data),
        _ => Ok(None),
    }
}

/// Extract the text of one streamed response object.
///
/// `Ok(None)` for payloads without a candidate (usage-only tails, `[DONE]`).
/// An `error` object or a blocked prompt ends the stream with an error.
fn parse_data(data: &str) -> Result<Option<String>, ProviderError> {
    let data = data.trim();
    if data.is_empty() || data == "[DONE]" {
        return Ok(None);
    }

    let chunk: GenerateContentResponse = serde_json::from_str(data)
        .map_err(|e| ProviderError::Parse(format!("invalid Gemini stream data: {e}")))?;
    if let Some(err) = chunk.error {
        return Err(err.into());
    }
    if let Some(reason) = chunk.prompt_feedback.and_then(|f| f.block_reason) {
        return Err(ProviderError::Blocked(reason));
    }

    Ok(chunk.candidates.first().map(Candidate::text))
}

// ── Response types ───────────────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
    usage_metadata: Option<UsageMetadata>,
    error: Option<ApiErrorBody>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

impl Candidate {
    fn text(&self) -> String {
        self.content
            .as_ref()
            .map(|c| {
                c.parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect::<String>()
            })
            .unwrap_or_default()
    }
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    total_token_count: u64,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    code: u16,
    #[serde(default)]
    message: String,
}

impl From<ApiErrorBody> for ProviderError {
    fn from(e: ApiErrorBody) -> Self {
        ProviderError::Api {
            status: e.code,
            message: e.message,
        }
    }
}
