//! Provider selection from configuration.

use std::sync::Arc;
use threadscout_core::error::ProviderError;
use threadscout_core::provider::Provider;

use crate::anthropic::AnthropicProvider;

/// Build the configured model provider.
pub fn build_from_config(
    config: &threadscout_config::AppConfig,
) -> Result<Arc<dyn Provider>, ProviderError> {
    let api_key = config
        .api_key
        .clone()
        .filter(|k| !k.is_empty())
        .ok_or_else(|| {
            ProviderError::NotConfigured(
                "no API key (set THREADSCOUT_API_KEY or ANTHROPIC_API_KEY)".into(),
            )
        })?;

    match config.provider.as_str() {
        "anthropic" => {
            let mut provider = AnthropicProvider::new(api_key);
            if let Some(ref url) = config.api_url {
                provider = provider.with_base_url(url);
            }
            Ok(Arc::new(provider))
        }
        other => Err(ProviderError::NotConfigured(format!(
            "unsupported provider '{other}'"
        ))),
    }
}
