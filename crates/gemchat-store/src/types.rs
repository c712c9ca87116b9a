use serde::{Deserialize, Serialize};

/// A stored Gemini credential.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiKey {
    pub id: String,
    pub user_id: Option<String>,
    pub api_key: String,
    pub description: Option<String>,
    /// Always starts at 0.
    pub token_used: i64,
    pub created_at: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewApiKey {
    #[serde(default)]
    pub user_id: Option<String>,
    pub api_key: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewPersona {
    #[serde(default)]
    pub user_id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub system_prompt: String,
    pub model_used: String,
    pub api_key_id: String,
}

/// Partial persona update; `None` leaves a column untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PersonaUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub system_prompt: Option<String>,
    pub model_used: Option<String>,
    pub api_key_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chatroom {
    pub id: String,
    pub user_id: Option<String>,
    pub title: String,
    /// Enrolled personas, in enrollment order.
    pub persona_ids: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewChatroom {
    #[serde(default)]
    pub user_id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub persona_ids: Vec<String>,
}

/// `persona_ids: Some(..)` replaces the whole enrollment set.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatroomUpdate {
    pub title: Option<String>,
    pub persona_ids: Option<Vec<String>>,
}

/// Who wrote a stored message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
        }
    }
}

impl std::str::FromStr for MessageRole {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            other => Err(format!("unknown message role: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatroomMessage {
    pub id: String,
    pub chatroom_id: String,
    pub role: MessageRole,
    pub content: String,
    /// Persona that answered (assistant turns) or was mentioned.
    pub persona_id: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewMessage {
    pub chatroom_id: String,
    pub role: MessageRole,
    pub content: String,
    #[serde(default)]
    pub persona_id: Option<String>,
}
