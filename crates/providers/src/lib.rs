//! LLM Provider implementations for RelayChat.
//!
//! All providers implement the `relaychat_core::Provider` trait.
//! [`build_from_config`] picks the provider the configuration allows.

pub mod azure;

pub use azure::AzureOpenAiProvider;

use async_trait::async_trait;
use relaychat_config::LlmConfig;
use relaychat_core::error::ProviderError;
use relaychat_core::provider::{ProviderRequest, ProviderResponse};
use relaychat_core::Provider;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Build the provider described by `config`.
///
/// When credentials are missing the returned provider fails every request
/// with [`ProviderError::NotConfigured`]; the conversation driver refuses
/// turns before reaching it.
pub fn build_from_config(config: &LlmConfig) -> Arc<dyn Provider> {
    let agent_config = match config.agent_config() {
        Ok(c) => c,
        Err(e) => {
            warn!(error = %e, "Azure OpenAI credentials incomplete");
            return Arc::new(UnconfiguredProvider::new(e.to_string()));
        }
    };

    match AzureOpenAiProvider::new(
        &agent_config,
        Duration::from_secs(config.request_timeout_secs),
    ) {
        Ok(provider) => {
            info!(
                deployment = %agent_config.model_name,
                api_version = %agent_config.api_version,
                "Azure OpenAI provider ready"
            );
            Arc::new(provider)
        }
        Err(e) => {
            warn!(error = %e, "Failed to build Azure OpenAI provider");
            Arc::new(UnconfiguredProvider::new(e.to_string()))
        }
    }
}

/// A provider that has no service behind it.
pub struct UnconfiguredProvider {
    reason: String,
}

impl UnconfiguredProvider {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl Provider for UnconfiguredProvider {
    fn name(&self) -> &str {
        "unconfigured"
    }

    async fn complete(
        &self,
        _request: ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        Err(ProviderError::NotConfigured(self.reason.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relaychat_core::Message;

    #[tokio::test]
    async fn missing_credentials_give_unconfigured_provider() {
        let provider = build_from_config(&LlmConfig::default());
        assert_eq!(provider.name(), "unconfigured");

        let err = provider
            .complete(ProviderRequest::new("gpt-4o", vec![Message::user("hi")]))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::NotConfigured(_)));
        assert!(err.to_string().contains("AZURE_OPENAI_API_KEY"));
    }

    #[test]
    fn full_credentials_give_azure_provider() {
        let config = LlmConfig {
            endpoint: Some("https://myresource.openai.azure.com".into()),
            api_key: Some("key".into()),
            deployment: Some("gpt-4o".into()),
            ..LlmConfig::default()
        };
        assert_eq!(build_from_config(&config).name(), "azure-openai");
    }
}
