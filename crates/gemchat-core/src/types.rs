use serde::{Deserialize, Serialize};

/// Speaker of a conversation turn, in Gemini's vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Part {
    #[serde(default)]
    pub text: String,
}

/// One turn of conversation history.
/// Wire: `{ "role": "user", "parts": [{ "text": "..." }] }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Content {
    pub role: Role,
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Content {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            parts: vec![Part { text: text.into() }],
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text)
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self::new(Role::Model, text)
    }
}

/// Inbound chat request, one per message send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub prompt: String,
    /// Prior turns, oldest first.
    #[serde(default)]
    pub history: Vec<Content>,
    #[serde(default)]
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mentioned_persona_ids: Option<Vec<String>>,
}

impl ChatRequest {
    pub fn new(prompt: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            history: Vec::new(),
            model: model.into(),
            api_key: None,
            mentioned_persona_ids: None,
        }
    }

    /// The request's own credential. Blank keys count as absent.
    pub fn credential(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }

    /// Mentioned persona ids; empty when the field is absent.
    pub fn mentions(&self) -> &[String] {
        self.mentioned_persona_ids.as_deref().unwrap_or(&[])
    }
}

/// A chat request after persona resolution. Never persisted.
///
/// With no resolved persona both overrides are `None` and the value behaves
/// exactly like the wrapped request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichedChatRequest {
    pub request: ChatRequest,
    pub system_instruction: Option<String>,
    pub persona_model: Option<String>,
}

impl From<ChatRequest> for EnrichedChatRequest {
    fn from(request: ChatRequest) -> Self {
        Self {
            request,
            system_instruction: None,
            persona_model: None,
        }
    }
}

/// A stored persona in its canonical shape.
///
/// `api_key_id` is always the bare id of the linked api_keys row; the store
/// adapter normalises it before a persona leaves the storage layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Persona {
    pub id: String,
    pub user_id: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub system_prompt: String,
    pub model_used: String,
    pub api_key_id: String,
    pub created_at: String,
    pub updated_at: String,
}
