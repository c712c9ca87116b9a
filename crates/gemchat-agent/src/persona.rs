use std::sync::Arc;

use async_trait::async_trait;
use gemchat_core::types::{ChatRequest, EnrichedChatRequest, Persona};
use gemchat_store::{PersonaRepo, StoreError};
use tracing::{debug, warn};

/// Batch persona lookup used during chat resolution.
#[async_trait]
pub trait PersonaStore: Send + Sync {
    /// Every persona whose id is in `ids`, in storage order (creation time,
    /// then id). Unknown ids are skipped.
    async fn get_personas_by_ids(&self, ids: &[String]) -> Result<Vec<Persona>, StoreError>;
}

#[async_trait]
impl PersonaStore for PersonaRepo {
    async fn get_personas_by_ids(&self, ids: &[String]) -> Result<Vec<Persona>, StoreError> {
        self.get_by_ids(ids)
    }
}

/// A request after persona resolution, plus the ids that were found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPersonas {
    pub request: EnrichedChatRequest,
    pub persona_ids: Vec<String>,
}

/// Applies mentioned personas to a chat request.
pub struct PersonaResolver {
    store: Arc<dyn PersonaStore>,
}

impl PersonaResolver {
    pub fn new(store: Arc<dyn PersonaStore>) -> Self {
        Self { store }
    }

    /// Resolve the request's mentions in one batch lookup.
    ///
    /// When several personas match, the first one in storage order supplies
    /// the system instruction and model; the rest only show up in
    /// `persona_ids`. Missing ids are logged and skipped. Persona records are
    /// never modified, so resolving the same request twice gives the same
    /// result.
    pub async fn resolve(&self, request: ChatRequest) -> Result<ResolvedPersonas, StoreError> {
        let mentioned = dedup(request.mentions());
        if mentioned.is_empty() {
            return Ok(unchanged(request));
        }

        let personas = self.store.get_personas_by_ids(&mentioned).await?;

        if personas.len() < mentioned.len() {
            let missing: Vec<&str> = mentioned
                .iter()
                .filter(|id| !personas.iter().any(|p| &p.id == *id))
                .map(String::as_str)
                .collect();
            warn!(?missing, "mentioned personas not found");
        }

        let Some(first) = personas.first() else {
            return Ok(unchanged(request));
        };
        debug!(persona = %first.id, name = %first.name, matched = personas.len(), "persona applied");

        let request = EnrichedChatRequest {
            request,
            system_instruction: Some(first.system_prompt.clone()),
            persona_model: Some(first.model_used.clone()),
        };
        Ok(ResolvedPersonas {
            request,
            persona_ids: personas.into_iter().map(|p| p.id).collect(),
        })
    }
}

fn unchanged(request: ChatRequest) -> ResolvedPersonas {
    ResolvedPersonas {
        request: request.into(),
        persona_ids: Vec::new(),
    }
}

/// Drop repeated ids, keeping the first occurrence.
fn dedup(ids: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(ids.len());
    for id in ids {
        if !out.contains(id) {
            out.push(id.clone());
        }
    }
    out
}
