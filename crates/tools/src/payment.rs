//! Payment tool: settles a charge the service agent asks the owner to pay.
//!
//! The tool itself only shapes the request and the reply text; the actual
//! settlement happens behind a [`PaymentGateway`]. A successful charge is
//! reported with the `[PAYMENT_SUCCEEDED]` marker, which also ends the
//! conversation on the next turn.

use async_trait::async_trait;
use envoy_core::error::ToolError;
use envoy_core::message::Message;
use envoy_core::sentinel::{PAYMENT_FAILED, PAYMENT_SUCCEEDED};
use envoy_core::tool::{Tool, ToolResult, decode_arguments};
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, LazyLock, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};

const TOOL_NAME: &str = "process_payment";

static PAYMENT_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"https?://[^\s<>"'\)\]]+"#).expect("payment link pattern compiles")
});

/// Arguments the model may pass. Every field is optional; the link falls
/// back to the first URL in the message that prompted the call.
#[derive(Debug, Default, Deserialize)]
struct PaymentArgs {
    payment_link: Option<String>,
    amount: Option<f64>,
    currency: Option<String>,
    memo: Option<String>,
}

/// What gets sent to the gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub payment_link: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
    /// Agent paying (the owner's personal AI)
    pub payer: String,
    /// Agent being paid
    pub payee: String,
}

/// Outcome of a settlement attempt that reached the gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PaymentReceipt {
    Succeeded { reference: String },
    Declined { reason: String },
}

/// Where payments are actually settled.
///
/// `Err` is reserved for transport problems; a refused charge is
/// `Ok(PaymentReceipt::Declined)`.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    fn name(&self) -> &str;

    async fn charge(&self, request: &PaymentRequest) -> Result<PaymentReceipt, String>;
}

/// Approves every charge locally and keeps a ledger of what it saw.
#[derive(Default)]
pub struct DryRunGateway {
    ledger: Mutex<Vec<PaymentRequest>>,
    decline_reason: Option<String>,
}

impl DryRunGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// A gateway that refuses every charge with `reason`.
    pub fn declining(reason: impl Into<String>) -> Self {
        Self {
            ledger: Mutex::new(Vec::new()),
            decline_reason: Some(reason.into()),
        }
    }

    /// Every request seen so far, oldest first.
    pub fn ledger(&self) -> Vec<PaymentRequest> {
        self.ledger.lock().map(|l| l.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl PaymentGateway for DryRunGateway {
    fn name(&self) -> &str {
        "dry_run"
    }

    async fn charge(&self, request: &PaymentRequest) -> Result<PaymentReceipt, String> {
        if let Ok(mut ledger) = self.ledger.lock() {
            ledger.push(request.clone());
        }

        Ok(match &self.decline_reason {
            Some(reason) => PaymentReceipt::Declined { reason: reason.clone() },
            None => PaymentReceipt::Succeeded {
                reference: format!("dry-run-{}", uuid::Uuid::new_v4().simple()),
            },
        })
    }
}

/// Forwards charges to a payment service over HTTP.
///
/// The service receives the [`PaymentRequest`] as JSON and answers with
/// `{"status": "succeeded", "reference": ...}` or
/// `{"status": "declined", "reason": ...}`.
pub struct HttpPaymentGateway {
    endpoint: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl HttpPaymentGateway {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, String> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| format!("failed to create HTTP client: {e}"))?;

        Ok(Self {
            endpoint: endpoint.into(),
            api_key,
            client,
        })
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    fn name(&self) -> &str {
        "http"
    }

    async fn charge(&self, request: &PaymentRequest) -> Result<PaymentReceipt, String> {
        let mut builder = self.client.post(&self.endpoint).json(request);
        if let Some(key) = &self.api_key {
            builder = builder.header("Authorization", format!("Bearer {key}"));
        }

        let response = builder.send().await.map_err(|e| format!("request failed: {e}"))?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(format!("payment service returned HTTP {}: {body}", status.as_u16()));
        }

        response
            .json::<PaymentReceipt>()
            .await
            .map_err(|e| format!("unreadable payment service response: {e}"))
    }
}

/// The `process_payment` tool.
pub struct PaymentTool {
    gateway: Arc<dyn PaymentGateway>,
}

impl PaymentTool {
    pub fn new(gateway: Arc<dyn PaymentGateway>) -> Self {
        Self { gateway }
    }
}

/// First http(s) URL in `text`, with trailing punctuation stripped.
pub fn find_payment_link(text: &str) -> Option<String> {
    PAYMENT_LINK
        .find(text)
        .map(|m| m.as_str().trim_end_matches(['.', ',', ';', ':', '!', '?']).to_string())
}

#[async_trait]
impl Tool for PaymentTool {
    fn name(&self) -> &str {
        TOOL_NAME
    }

    fn description(&self) -> &str {
        "Process a payment for the owner. Use this tool only if the service agent explicitly \
         requires payment (for example by sending a payment link)."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "payment_link": {
                    "type": "string",
                    "description": "The payment link sent by the service agent"
                },
                "amount": {
                    "type": "number",
                    "minimum": 0,
                    "description": "Amount to pay, if stated"
                },
                "currency": {
                    "type": "string",
                    "description": "ISO currency code, e.g. USD"
                },
                "memo": {
                    "type": "string",
                    "description": "What the payment is for"
                }
            },
            "additionalProperties": false
        })
    }

    async fn execute(
        &self,
        arguments: serde_json::Value,
        origin: &Message,
    ) -> Result<ToolResult, ToolError> {
        let args: PaymentArgs = decode_arguments(TOOL_NAME, arguments)?;

        let Some(payment_link) = args
            .payment_link
            .filter(|l| !l.trim().is_empty())
            .or_else(|| find_payment_link(&origin.content))
        else {
            warn!(payee = %origin.sender, "Payment requested without a link");
            return Ok(ToolResult::failure(format!(
                "{PAYMENT_FAILED} No payment link was provided. Ask {} for one.",
                origin.sender
            )));
        };

        let request = PaymentRequest {
            payment_link,
            amount: args.amount,
            currency: args.currency,
            memo: args.memo,
            payer: origin.receiver.clone(),
            payee: origin.sender.clone(),
        };

        debug!(gateway = self.gateway.name(), link = %request.payment_link, "Charging");

        let receipt = self
            .gateway
            .charge(&request)
            .await
            .map_err(|reason| ToolError::ExecutionFailed {
                tool_name: TOOL_NAME.into(),
                reason,
            })?;

        let data = serde_json::to_value(&receipt).ok();
        let result = match &receipt {
            PaymentReceipt::Succeeded { reference } => {
                info!(payee = %request.payee, reference = %reference, "Payment succeeded");
                ToolResult::success(format!(
                    "{PAYMENT_SUCCEEDED} Paid {} via {} (reference {reference}).",
                    request.payee, request.payment_link
                ))
            }
            PaymentReceipt::Declined { reason } => {
                warn!(payee = %request.payee, reason = %reason, "Payment declined");
                ToolResult::failure(format!("{PAYMENT_FAILED} The payment was declined: {reason}"))
            }
        };

        Ok(match data {
            Some(data) => result.with_data(data),
            None => result,
        })
    }
}
