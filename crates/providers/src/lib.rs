//! Chat backends for Threadline.
//!
//! All backends implement the `threadline_core::Chat` trait.

pub mod openai_compat;

pub use openai_compat::OpenAiCompatChat;

use std::sync::Arc;
use threadline_config::AppConfig;
use threadline_core::chat::Chat;
use threadline_core::error::ProviderError;
use threadline_core::prompt::User;

/// Build the configured chat backend.
pub fn build_from_config(config: &AppConfig) -> Result<Arc<dyn Chat>, ProviderError> {
    let api_key = config.api_key.clone().ok_or_else(|| {
        ProviderError::NotConfigured(
            "no API key; set THREADLINE_API_KEY or api_key in config.toml".into(),
        )
    })?;

    let user = User {
        name: config.user.name.clone(),
        email: config.user.email.clone(),
    };
    let chat = OpenAiCompatChat::new(
        "openai",
        &config.api_url,
        api_key,
        &config.default_model,
        user,
    )?
    .with_temperature(config.default_temperature)
    .with_streaming(config.stream);

    Ok(Arc::new(chat))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_key_is_not_configured() {
        let config = AppConfig::default();
        assert!(matches!(
            build_from_config(&config),
            Err(ProviderError::NotConfigured(_))
        ));
    }

    #[test]
    fn builds_from_config() {
        let config = AppConfig {
            api_key: Some("sk-test".into()),
            default_model: "gpt-3.5-turbo".into(),
            stream: false,
            ..AppConfig::default()
        };
        let chat = build_from_config(&config).unwrap();
        assert_eq!(chat.model(), "gpt-3.5-turbo");
        assert!(!chat.is_streaming());
    }
}
