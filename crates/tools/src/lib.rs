//! Built-in tool implementations for Envoy.
//!
//! Tools let the personal AI act for its owner during a negotiation.
//! Today that means settling payments requested by the service agent.

pub mod payment;

use envoy_config::{AppConfig, PaymentMode};
use envoy_core::error::{Error, Result};
use envoy_core::tool::ToolRegistry;
use std::sync::Arc;
use std::time::Duration;

pub use payment::{
    DryRunGateway, HttpPaymentGateway, PaymentGateway, PaymentReceipt, PaymentRequest, PaymentTool,
};

/// Build the tool registry described by `config`.
///
/// With `payments.mode = "disabled"` the registry is empty and the model is
/// offered no tools at all.
pub fn default_registry(config: &AppConfig) -> Result<ToolRegistry> {
    let mut registry = ToolRegistry::new();

    let gateway: Arc<dyn PaymentGateway> = match config.payments.mode {
        PaymentMode::Disabled => return Ok(registry),
        PaymentMode::DryRun => Arc::new(DryRunGateway::new()),
        PaymentMode::Http => {
            let endpoint = config.payments.endpoint.clone().ok_or_else(|| Error::Config {
                message: "payments.endpoint is required for http payments".into(),
            })?;
            let gateway = HttpPaymentGateway::new(
                endpoint,
                config.payments.api_key.clone(),
                Duration::from_secs(config.request_timeout_secs),
            )
            .map_err(|message| Error::Config { message })?;
            Arc::new(gateway)
        }
    };

    tracing::debug!(gateway = gateway.name(), "Payment tool enabled");
    registry.register(Box::new(PaymentTool::new(gateway)));
    Ok(registry)
}
