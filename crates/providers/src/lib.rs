//! Language-model provider implementations for Envoy.
//!
//! All providers implement the `envoy_core::Provider` trait.
//! [`build_from_config`] resolves credentials and builds the configured backend.

pub mod openai_compat;

pub use openai_compat::OpenAiCompatProvider;

use envoy_config::AppConfig;
use envoy_core::error::ProviderError;
use envoy_core::provider::Provider;
use std::sync::Arc;
use std::time::Duration;

/// Build the provider described by `config`.
///
/// `explicit_key` wins over every other credential source. Fails with
/// [`ProviderError::NotConfigured`] when no API key can be resolved.
pub fn build_from_config(
    config: &AppConfig,
    explicit_key: Option<&str>,
) -> Result<Arc<dyn Provider>, ProviderError> {
    let api_key = config.resolve_api_key(explicit_key).ok_or_else(|| {
        ProviderError::NotConfigured(
            "no API key found; set api_key in config.toml or ENVOY_API_KEY / OPENAI_API_KEY".into(),
        )
    })?;

    build_with_key(config, api_key)
}

/// Build the configured provider with an already-resolved key.
pub fn build_with_key(
    config: &AppConfig,
    api_key: impl Into<String>,
) -> Result<Arc<dyn Provider>, ProviderError> {
    let provider = OpenAiCompatProvider::new(
        provider_name(&config.api_url),
        &config.api_url,
        api_key,
        Duration::from_secs(config.request_timeout_secs),
    )?;

    tracing::debug!(provider = provider.name(), url = %config.api_url, "Provider configured");
    Ok(Arc::new(provider))
}

/// A display name for well-known endpoints.
fn provider_name(api_url: &str) -> &'static str {
    if api_url.contains("api.openai.com") {
        "openai"
    } else if api_url.contains("openrouter.ai") {
        "openrouter"
    } else if api_url.contains("localhost:11434") {
        "ollama"
    } else {
        "openai-compatible"
    }
}
