use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_BIND: &str = "127.0.0.1";
pub const MAX_PAYLOAD_BYTES: usize = 512 * 1024; // 512 KB hard cap per frame (history rides along)
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_FIRST_CHUNK_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_STREAM_TIMEOUT_SECS: u64 = 300;

/// Models a chat request may ask for by name. Anything else falls back to
/// `gemini.model`.
pub const ALLOWED_MODELS: &[&str] = &[
    "gemini-2.0-flash",
    "gemini-2.0-pro",
    "gemini-2.5-flash",
    "gemini-2.5-pro",
];

/// Top-level config (gemchat.toml + GEMCHAT_* env overrides).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GemchatConfig {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub gemini: GeminiConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind: DEFAULT_BIND.to_string(),
        }
    }
}

/// Gemini provider settings. The API key here is the process-wide default
/// credential; chat requests may carry their own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    pub api_key: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_gemini_base_url")]
    pub base_url: String,
    #[serde(default = "default_allowed_models")]
    pub allowed_models: Vec<String>,
    pub temperature: Option<f32>,
    pub max_output_tokens: Option<u32>,
    /// Upper bound on the wait for the first streamed fragment.
    #[serde(default = "default_first_chunk_timeout")]
    pub first_chunk_timeout_secs: u64,
    /// Upper bound on a whole streamed reply.
    #[serde(default = "default_stream_timeout")]
    pub stream_timeout_secs: u64,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_model(),
            base_url: default_gemini_base_url(),
            allowed_models: default_allowed_models(),
            temperature: None,
            max_output_tokens: None,
            first_chunk_timeout_secs: DEFAULT_FIRST_CHUNK_TIMEOUT_SECS,
            stream_timeout_secs: DEFAULT_STREAM_TIMEOUT_SECS,
        }
    }
}

impl GeminiConfig {
    /// The default credential, or a configuration error when none is set.
    /// Called once at startup: without a key the server must not come up.
    pub fn require_api_key(&self) -> crate::error::Result<&str> {
        match self.api_key.as_deref().map(str::trim) {
            Some(key) if !key.is_empty() => Ok(key),
            _ => Err(crate::error::GemchatError::Config(
                "no default Gemini API key; set gemini.api_key in gemchat.toml or GEMINI_API_KEY"
                    .to_string(),
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}
fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}
fn default_gemini_base_url() -> String {
    DEFAULT_GEMINI_BASE_URL.to_string()
}
fn default_allowed_models() -> Vec<String> {
    ALLOWED_MODELS.iter().map(|m| m.to_string()).collect()
}
fn default_first_chunk_timeout() -> u64 {
    DEFAULT_FIRST_CHUNK_TIMEOUT_SECS
}
fn default_stream_timeout() -> u64 {
    DEFAULT_STREAM_TIMEOUT_SECS
}
fn default_db_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.gemchat/gemchat.db", home)
}

impl GemchatConfig {
    /// Load config from a TOML file with env var overrides.
    ///
    /// Precedence, lowest to highest:
    ///   1. built-in defaults
    ///   2. the TOML file (explicit path, else ~/.gemchat/gemchat.toml)
    ///   3. plain `GEMINI_API_KEY`, `GEMINI_MODEL`, `PORT`
    ///   4. `GEMCHAT_<SECTION>__<KEY>` (e.g. `GEMCHAT_GEMINI__API_KEY`)
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        let config: GemchatConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::raw().only(&["GEMINI_API_KEY"]).map(|_| "gemini.api_key".into()))
            .merge(Env::raw().only(&["GEMINI_MODEL"]).map(|_| "gemini.model".into()))
            .merge(Env::raw().only(&["PORT"]).map(|_| "gateway.port".into()))
            .merge(Env::prefixed("GEMCHAT_").split("__"))
            .extract()
            .map_err(|e| crate::error::GemchatError::Config(e.to_string()))?;

        Ok(config)
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.gemchat/gemchat.toml", home)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_every_section() {
        let cfg = GemchatConfig::default();
        assert_eq!(cfg.gateway.port, DEFAULT_PORT);
        assert_eq!(cfg.gemini.model, "gemini-2.0-flash");
        assert_eq!(cfg.gemini.allowed_models.len(), ALLOWED_MODELS.len());
        assert!(cfg.gemini.api_key.is_none());
    }

    #[test]
    fn missing_api_key_is_a_config_error() {
        let mut gemini = GeminiConfig::default();
        assert!(gemini.require_api_key().is_err());

        gemini.api_key = Some("   ".to_string());
        assert!(gemini.require_api_key().is_err());

        gemini.api_key = Some("AIza-test".to_string());
        assert_eq!(gemini.require_api_key().unwrap(), "AIza-test");
    }

    #[test]
    fn toml_and_env_layers_merge() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "gemchat.toml",
                r#"
                [gemini]
                api_key = "from-file"
                model = "gemini-2.5-flash"

                [gateway]
                port = 4000
                "#,
            )?;
            jail.set_env("GEMCHAT_GEMINI__API_KEY", "from-env");

            let cfg = GemchatConfig::load(Some("gemchat.toml")).map_err(|e| e.to_string())?;
            assert_eq!(cfg.gemini.api_key.as_deref(), Some("from-env"));
            assert_eq!(cfg.gemini.model, "gemini-2.5-flash");
            assert_eq!(cfg.gateway.port, 4000);
            assert_eq!(cfg.gateway.bind, DEFAULT_BIND);
            Ok(())
        });
    }

    #[test]
    fn plain_gemini_env_vars_are_honoured() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("GEMINI_API_KEY", "legacy-key");
            jail.set_env("GEMINI_MODEL", "gemini-2.0-pro");

            let cfg = GemchatConfig::load(Some("absent.toml")).map_err(|e| e.to_string())?;
            assert_eq!(cfg.gemini.api_key.as_deref(), Some("legacy-key"));
            assert_eq!(cfg.gemini.model, "gemini-2.0-pro");
            Ok(())
        });
    }
}
