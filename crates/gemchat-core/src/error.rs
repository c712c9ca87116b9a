use thiserror::Error;

#[derive(Debug, Error)]
pub enum GemchatError {
    /// Unreadable config file or a required setting left unset.
    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, GemchatError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_names_the_setting() {
        let err = GemchatError::Config("gemini.api_key is empty".to_string());
        assert_eq!(
            err.to_string(),
            "Configuration error: gemini.api_key is empty"
        );
    }
}
