//! `cardgate`: the redirect-card provider adapter.
//!
//! A single POST carrying a card-payment flag returns a hosted checkout URL
//! in the response body. The upstream is inconsistent about content type —
//! sometimes a JSON object, sometimes the bare URL as raw text — so the
//! response is parsed defensively: JSON first, falling back to treating the
//! whole trimmed body as the URL. The transaction stays `pending` until the
//! push notification resolves it.

use std::sync::Arc;

use async_trait::async_trait;
use paygate_provider::adapter::{
    AdapterError, InitPaymentOutcome, ProviderAdapter, RefundOutcome, VerifyPaymentOutcome, WebhookOutcome,
};
use paygate_provider::config::require_str;
use paygate_provider::http::default_http_client;
use paygate_types::money::{CurrencyCode, Money};
use paygate_types::status::CanonicalStatus;
use paygate_types::transaction::Customer;
use serde_json::{Value, json};

const PROVIDER_SHORT_NAME: &str = "cardgate";

pub struct CardGateAdapter {
    base_url: String,
    client_code: String,
    shared_secret: String,
    http: reqwest::Client,
}

impl CardGateAdapter {
    /// Required keys: `base_url`, `client_code`, `shared_secret`.
    pub fn from_config(config: &Value) -> Result<Self, AdapterError> {
        Ok(CardGateAdapter {
            base_url: require_str(config, "base_url")?.to_string(),
            client_code: require_str(config, "client_code")?.to_string(),
            shared_secret: require_str(config, "shared_secret")?.to_string(),
            http: default_http_client(),
        })
    }

    fn checksum(&self, ext_tx_id: &str, amount: Money) -> String {
        let message = format!("{ext_tx_id}{}{}", self.client_code, amount.to_fixed_string());
        paygate_crypto::hmac_sha256(self.shared_secret.as_bytes(), message.as_bytes())
    }

    fn map_status(upstream_status: &str) -> CanonicalStatus {
        match upstream_status.to_ascii_uppercase().as_str() {
            "AUTHORIZED" | "CAPTURED" | "SETTLED" => CanonicalStatus::Completed,
            "PENDING" | "INITIATED" | "AWAITING_3DS" => CanonicalStatus::Pending,
            "DECLINED" | "FAILED" | "EXPIRED" | "VOIDED" => CanonicalStatus::Failed,
            "REFUNDED" | "CHARGEBACK" => CanonicalStatus::Refunded,
            _ => CanonicalStatus::Pending,
        }
    }

    /// Parses the init response body for the hosted redirect URL. The
    /// upstream may answer with a JSON object carrying a `redirectUrl` field
    /// or with the raw URL as the entire response body.
    fn extract_redirect_url(body: &str) -> Result<(String, Value), AdapterError> {
        match serde_json::from_str::<Value>(body) {
            Ok(parsed) => {
                let url = parsed
                    .get("redirectUrl")
                    .and_then(Value::as_str)
                    .ok_or_else(|| AdapterError::InitializationFailed("response missing redirectUrl".into()))?
                    .to_string();
                Ok((url, parsed))
            }
            Err(_) => {
                let trimmed = body.trim();
                if trimmed.is_empty() {
                    return Err(AdapterError::InitializationFailed("empty response body".into()));
                }
                Ok((trimmed.to_string(), json!({ "raw": trimmed })))
            }
        }
    }
}

#[async_trait]
impl ProviderAdapter for CardGateAdapter {
    fn short_name(&self) -> &str {
        PROVIDER_SHORT_NAME
    }

    async fn init_payment(
        &self,
        amount: Money,
        _currency: CurrencyCode,
        _customer: &Customer,
        metadata: &Value,
    ) -> Result<InitPaymentOutcome, AdapterError> {
        let ext_tx_id = metadata
            .get("ext_transaction_id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| format!("cardgate-{}", self.client_code));
        let checksum = self.checksum(&ext_tx_id, amount);

        let response = self
            .http
            .post(format!("{}/checkout", self.base_url))
            .json(&json!({
                "extTransactionId": ext_tx_id,
                "clientCode": self.client_code,
                "amount": amount.to_fixed_string(),
                "cardPayment": true,
                "checksum": checksum,
            }))
            .send()
            .await
            .map_err(|e| AdapterError::InitializationFailed(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(AdapterError::InitializationFailed(format!("upstream returned {status}")));
        }

        let body = response.text().await.map_err(|e| AdapterError::InitializationFailed(e.to_string()))?;
        let (payment_url, extra) = Self::extract_redirect_url(&body)?;
        let provider_tx_id = extra
            .get("reference")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| ext_tx_id.clone());

        Ok(InitPaymentOutcome {
            provider_tx_id,
            status: CanonicalStatus::Pending,
            payment_url: Some(payment_url),
            extra,
        })
    }

    async fn verify_payment(&self, provider_tx_id: &str) -> Result<VerifyPaymentOutcome, AdapterError> {
        let response = self
            .http
            .get(format!("{}/transactions/{provider_tx_id}", self.base_url))
            .send()
            .await
            .map_err(|e| AdapterError::VerificationFailed(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(AdapterError::VerificationFailed(format!("upstream returned {status}")));
        }

        let parsed: Value = response
            .json()
            .await
            .map_err(|e| AdapterError::VerificationFailed(e.to_string()))?;
        let upstream_status = parsed.get("status").and_then(Value::as_str).unwrap_or("PENDING");

        Ok(VerifyPaymentOutcome {
            status: Self::map_status(upstream_status),
            amount: None,
            currency: None,
            extra: parsed,
        })
    }

    async fn refund_payment(
        &self,
        provider_tx_id: &str,
        amount: Option<Money>,
        reason: Option<&str>,
    ) -> Result<RefundOutcome, AdapterError> {
        let response = self
            .http
            .post(format!("{}/transactions/{provider_tx_id}/refund", self.base_url))
            .json(&json!({
                "amount": amount.map(|a| a.to_fixed_string()),
                "reason": reason,
            }))
            .send()
            .await
            .map_err(|e| AdapterError::RefundFailed(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(AdapterError::RefundFailed(format!("upstream returned {status}")));
        }

        let parsed: Value = response.json().await.map_err(|e| AdapterError::RefundFailed(e.to_string()))?;
        let refund_id = parsed
            .get("refundId")
            .and_then(Value::as_str)
            .unwrap_or(provider_tx_id)
            .to_string();
        let currency = parsed
            .get("currency")
            .and_then(Value::as_str)
            .and_then(|c| CurrencyCode::parse(c).ok())
            .unwrap_or(CurrencyCode::parse("ZAR").expect("static currency code is valid"));

        Ok(RefundOutcome {
            refund_id,
            status: CanonicalStatus::Refunded,
            amount: amount.unwrap_or_else(Money::zero),
            currency,
            extra: parsed,
        })
    }

    fn verify_webhook_signature(&self, raw_bytes: &[u8], signature: Option<&str>) -> bool {
        match signature {
            Some(sig) => paygate_crypto::verify_hmac_sha256(self.shared_secret.as_bytes(), raw_bytes, sig),
            None => true,
        }
    }

    async fn handle_webhook(&self, payload: &Value) -> Result<WebhookOutcome, AdapterError> {
        let provider_tx_id = payload
            .get("reference")
            .and_then(Value::as_str)
            .ok_or_else(|| AdapterError::InvalidWebhookPayload("missing reference".into()))?
            .to_string();
        let upstream_status = payload
            .get("status")
            .and_then(Value::as_str)
            .ok_or_else(|| AdapterError::InvalidWebhookPayload("missing status".into()))?;
        let event_type = payload
            .get("eventType")
            .and_then(Value::as_str)
            .unwrap_or("transaction.status_update")
            .to_string();

        Ok(WebhookOutcome {
            status: Self::map_status(upstream_status),
            provider_tx_id,
            event_type,
            extra: payload.clone(),
        })
    }
}

/// Registers this adapter's factory into a [`paygate_provider::ProviderRegistry`].
pub fn register(registry: &mut paygate_provider::ProviderRegistry) {
    registry.register(PROVIDER_SHORT_NAME, |config: &Value| {
        CardGateAdapter::from_config(config).map(|a| Arc::new(a) as Arc<dyn ProviderAdapter>)
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter() -> CardGateAdapter {
        CardGateAdapter::from_config(&json!({
            "base_url": "https://sandbox.cardgate.example",
            "client_code": "CL003",
            "shared_secret": "cardgate-secret",
        }))
        .unwrap()
    }

    #[test]
    fn extracts_redirect_url_from_json_body() {
        let (url, extra) = CardGateAdapter::extract_redirect_url(r#"{"redirectUrl":"https://pay.example/r/abc","reference":"txn_1"}"#).unwrap();
        assert_eq!(url, "https://pay.example/r/abc");
        assert_eq!(extra.get("reference").and_then(Value::as_str), Some("txn_1"));
    }

    #[test]
    fn extracts_redirect_url_from_raw_text_body() {
        let (url, _) = CardGateAdapter::extract_redirect_url("  https://pay.example/r/xyz  \n").unwrap();
        assert_eq!(url, "https://pay.example/r/xyz");
    }

    #[test]
    fn empty_body_is_an_error() {
        assert!(CardGateAdapter::extract_redirect_url("   ").is_err());
    }

    #[test]
    fn maps_known_status_codes() {
        assert_eq!(CardGateAdapter::map_status("captured"), CanonicalStatus::Completed);
        assert_eq!(CardGateAdapter::map_status("PENDING"), CanonicalStatus::Pending);
        assert_eq!(CardGateAdapter::map_status("declined"), CanonicalStatus::Failed);
        assert_eq!(CardGateAdapter::map_status("CHARGEBACK"), CanonicalStatus::Refunded);
    }

    #[test]
    fn checksum_is_64_hex_chars() {
        let a = adapter();
        let amount = Money::new(rust_decimal::Decimal::new(12999, 2)).unwrap();
        let digest = a.checksum("EXT-777", amount);
        assert_eq!(digest.len(), 64);
    }
}
