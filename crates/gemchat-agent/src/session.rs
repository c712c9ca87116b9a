use std::sync::Arc;

use gemchat_core::config::GeminiConfig;
use gemchat_core::types::EnrichedChatRequest;
use tracing::debug;

use crate::provider::{ChatSession, GenerativeProvider, ProviderError, SessionSpec};

/// Process-wide provider defaults, fixed at startup.
#[derive(Debug, Clone)]
pub struct GeminiSettings {
    pub default_model: String,
    pub default_api_key: String,
    pub allowed_models: Vec<String>,
}

impl GeminiSettings {
    /// Build settings from config. Fails when no default key is configured.
    pub fn from_config(cfg: &GeminiConfig) -> gemchat_core::Result<Self> {
        Ok(Self {
            default_model: cfg.model.clone(),
            default_api_key: cfg.require_api_key()?.to_string(),
            allowed_models: cfg.allowed_models.clone(),
        })
    }

    /// Exact match against the allow-list.
    pub fn is_allowed(&self, model: &str) -> bool {
        self.allowed_models.iter().any(|m| m == model)
    }
}

/// Opens one provider session per chat request.
pub struct SessionFactory {
    provider: Arc<dyn GenerativeProvider>,
    settings: GeminiSettings,
}

impl SessionFactory {
    pub fn new(provider: Arc<dyn GenerativeProvider>, settings: GeminiSettings) -> Self {
        Self { provider, settings }
    }

    pub fn settings(&self) -> &GeminiSettings {
        &self.settings
    }

    /// Persona model first, then the requested model if it is on the
    /// allow-list, then the configured default.
    pub fn select_model<'a>(&'a self, request: &'a EnrichedChatRequest) -> &'a str {
        if let Some(model) = request.persona_model.as_deref() {
            return model;
        }
        let requested = request.request.model.as_str();
        if self.settings.is_allowed(requested) {
            requested
        } else {
            &self.settings.default_model
        }
    }

    /// The request's own key when it carries a non-blank one, else the default.
    pub fn select_credential<'a>(&'a self, request: &'a EnrichedChatRequest) -> &'a str {
        request
            .request
            .credential()
            .unwrap_or(&self.settings.default_api_key)
    }

    pub async fn open_session(
        &self,
        request: &EnrichedChatRequest,
    ) -> Result<Box<dyn ChatSession>, ProviderError> {
        let model = self.select_model(request).to_string();
        let own_key = request.request.credential().is_some();
        debug!(
            provider = self.provider.name(),
            %model,
            own_key,
            "opening provider session"
        );

        self.provider
            .open_session(SessionSpec {
                model,
                api_key: self.select_credential(request).to_string(),
                system_instruction: request.system_instruction.clone(),
                history: request.request.history.clone(),
            })
            .await
    }
}
