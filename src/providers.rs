use std::sync::Arc;

use chat_provider_mock::MockProvider;
use chat_provider_openai::{OpenAiChatProvider, OpenAiProviderConfig};

use crate::config::{Config, ProviderKind};
use crate::provider::{ProviderInitError, RunProvider};

/// Builds the run provider selected by `config`.
pub fn provider_for_config(config: &Config) -> Result<Arc<dyn RunProvider>, ProviderInitError> {
    match config.provider {
        ProviderKind::OpenAi => {
            let mut provider_config =
                OpenAiProviderConfig::new(&config.base_url, &config.model)
                    .with_api_key(&config.api_key);
            if let Some(timeout) = config.timeout {
                provider_config = provider_config.with_timeout(timeout);
            }

            Ok(Arc::new(OpenAiChatProvider::new(provider_config)?))
        }
        ProviderKind::Mock => Ok(Arc::new(MockProvider::default())),
    }
}

#[cfg(test)]
mod tests {
    use crate::config::Cli;

    use super::*;

    fn config_with(pairs: &'static [(&'static str, &'static str)]) -> Config {
        Config::resolve(Cli::default(), |key| {
            pairs
                .iter()
                .find(|(name, _)| *name == key)
                .map(|(_, value)| value.to_string())
        })
        .expect("config")
    }

    #[test]
    fn default_config_selects_openai_provider() {
        let provider = provider_for_config(&config_with(&[])).expect("provider");
        let profile = provider.profile();

        assert_eq!(profile.provider_id, "openai");
        assert_eq!(profile.model_id, "qwen3-coder");
        assert_eq!(
            profile.endpoint.as_deref(),
            Some("http://localhost:11434/v1/chat/completions")
        );
    }

    #[test]
    fn mock_provider_is_selectable() {
        let provider =
            provider_for_config(&config_with(&[("CODYBOT_PROVIDER", "mock")])).expect("provider");

        assert_eq!(provider.profile().provider_id, "mock");
    }

    #[test]
    fn invalid_base_url_surfaces_init_error() {
        let error =
            match provider_for_config(&config_with(&[("OPENAI_BASE_URL", "::not a url::")])) {
                Ok(_) => panic!("invalid base url should fail"),
                Err(error) => error,
            };

        assert!(error.message().contains("invalid base URL"));
    }
}
