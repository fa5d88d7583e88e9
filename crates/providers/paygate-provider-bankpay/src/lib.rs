//! `standard_bank_pay`: the async-push provider adapter.
//!
//! One POST to the upstream init endpoint returns an upstream reference and
//! expects a later push notification — no `payment_url`, no synchronous
//! terminal status. Refunds are not supported. Webhook signatures are not
//! carried in-band for this provider; the caller validates payload
//! semantics instead.

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

const PROVIDER_SHORT_NAME: &str = "standard_bank_pay";

pub struct BankPayAdapter {
    base_url: String,
    client_code: String,
    shared_secret: String,
    http: reqwest::Client,
}

impl BankPayAdapter {
    /// Builds an adapter instance from the merchant's decrypted config blob.
    /// Required keys: `base_url`, `client_code`, `shared_secret`.
    pub fn from_config(config: &Value) -> Result<Self, AdapterError> {
        Ok(BankPayAdapter {
            base_url: require_str(config, "base_url")?.to_string(),
            client_code: require_str(config, "client_code")?.to_string(),
            shared_secret: require_str(config, "shared_secret")?.to_string(),
            http: default_http_client(),
        })
    }

    /// Checksum over `ext_tx_id ‖ client_code ‖ amount ‖ msisdn`, exactly as
    /// documented by the upstream: no separators, amount
    /// formatted with exactly two decimal places.
    fn checksum(&self, ext_tx_id: &str, amount: Money, msisdn: &str) -> String {
        let message = format!("{ext_tx_id}{}{}{msisdn}", self.client_code, amount.to_fixed_string());
        paygate_crypto::hmac_sha256(self.shared_secret.as_bytes(), message.as_bytes())
    }

    fn map_status(paygate_request_status: &str) -> CanonicalStatus {
        match paygate_request_status {
            "processed" => CanonicalStatus::Completed,
            "open" | "scheduled" => CanonicalStatus::Pending,
            "denied" | "canceled" | "cancelled" | "expired" => CanonicalStatus::Failed,
            "reversed" => CanonicalStatus::Refunded,
            _ => CanonicalStatus::Pending,
        }
    }

    fn map_webhook_event(event_type: &str) -> CanonicalStatus {
        match event_type {
            "PAYMENT_SETTLED" => CanonicalStatus::Completed,
            "PAYMENT_FAILED" | "PAYMENT_DECLINED" => CanonicalStatus::Failed,
            "PAYMENT_REVERSED" => CanonicalStatus::Refunded,
            _ => CanonicalStatus::Pending,
        }
    }
}

#[async_trait]
impl ProviderAdapter for BankPayAdapter {
    fn short_name(&self) -> &str {
        PROVIDER_SHORT_NAME
    }

    async fn init_payment(
        &self,
        amount: Money,
        _currency: CurrencyCode,
        customer: &Customer,
        metadata: &Value,
    ) -> Result<InitPaymentOutcome, AdapterError> {
        let msisdn = customer
            .phone
            .clone()
            .ok_or_else(|| AdapterError::InitializationFailed("customer.phone is required".into()))?;
        let ext_tx_id = metadata
            .get("ext_transaction_id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let checksum = self.checksum(&ext_tx_id, amount, &msisdn);
        let body = json!({
            "extTransactionId": ext_tx_id,
            "clientCode": self.client_code,
            "amount": amount.to_fixed_string(),
            "msisdn": msisdn,
            "checksum": checksum,
        });

        let response = self
            .http
            .post(format!("{}/payment/initiate", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| AdapterError::InitializationFailed(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(AdapterError::InitializationFailed(format!("upstream returned {status}: {text}")));
        }

        let parsed: Value = response
            .json()
            .await
            .map_err(|e| AdapterError::InitializationFailed(e.to_string()))?;
        let provider_tx_id = parsed
            .get("sbp_txn_ref")
            .and_then(Value::as_str)
            .ok_or_else(|| AdapterError::InitializationFailed("response missing sbp_txn_ref".into()))?
            .to_string();

        Ok(InitPaymentOutcome {
            provider_tx_id,
            status: CanonicalStatus::Pending,
            payment_url: None,
            extra: parsed,
        })
    }

    async fn verify_payment(&self, provider_tx_id: &str) -> Result<VerifyPaymentOutcome, AdapterError> {
        let response = self
            .http
            .get(format!("{}/status", self.base_url))
            .query(&[("requestReference", provider_tx_id)])
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
        let upstream_status = parsed.get("paymentRequestStatus").and_then(Value::as_str).unwrap_or("open");

        Ok(VerifyPaymentOutcome {
            status: Self::map_status(upstream_status),
            amount: None,
            currency: None,
            extra: parsed,
        })
    }

    async fn refund_payment(
        &self,
        _provider_tx_id: &str,
        _amount: Option<Money>,
        _reason: Option<&str>,
    ) -> Result<RefundOutcome, AdapterError> {
        Err(AdapterError::RefundUnsupported)
    }

    fn verify_webhook_signature(&self, _raw_bytes: &[u8], _signature: Option<&str>) -> bool {
        true
    }

    async fn handle_webhook(&self, payload: &Value) -> Result<WebhookOutcome, AdapterError> {
        let provider_tx_id = payload
            .get("sbp_txn_ref")
            .and_then(Value::as_str)
            .ok_or_else(|| AdapterError::InvalidWebhookPayload("missing sbp_txn_ref".into()))?
            .to_string();
        let event_type = payload
            .get("event_type")
            .and_then(Value::as_str)
            .ok_or_else(|| AdapterError::InvalidWebhookPayload("missing event_type".into()))?
            .to_string();

        Ok(WebhookOutcome {
            status: Self::map_webhook_event(&event_type),
            provider_tx_id,
            event_type,
            extra: payload.clone(),
        })
    }
}

/// Registers this adapter's factory into a [`paygate_provider::ProviderRegistry`].
pub fn register(registry: &mut paygate_provider::ProviderRegistry) {
    registry.register(PROVIDER_SHORT_NAME, |config: &Value| {
        BankPayAdapter::from_config(config).map(|a| Arc::new(a) as Arc<dyn ProviderAdapter>)
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter() -> BankPayAdapter {
        BankPayAdapter::from_config(&json!({
            "base_url": "https://sandbox.example",
            "client_code": "CL001",
            "shared_secret": "top-secret",
        }))
        .unwrap()
    }

    #[test]
    fn maps_known_status_codes() {
        assert_eq!(BankPayAdapter::map_status("processed"), CanonicalStatus::Completed);
        assert_eq!(BankPayAdapter::map_status("open"), CanonicalStatus::Pending);
        assert_eq!(BankPayAdapter::map_status("scheduled"), CanonicalStatus::Pending);
        assert_eq!(BankPayAdapter::map_status("denied"), CanonicalStatus::Failed);
        assert_eq!(BankPayAdapter::map_status("cancelled"), CanonicalStatus::Failed);
        assert_eq!(BankPayAdapter::map_status("expired"), CanonicalStatus::Failed);
        assert_eq!(BankPayAdapter::map_status("reversed"), CanonicalStatus::Refunded);
    }

    #[test]
    fn unknown_status_defaults_to_pending() {
        assert_eq!(BankPayAdapter::map_status("something_new"), CanonicalStatus::Pending);
    }

    #[test]
    fn checksum_is_64_hex_chars() {
        let a = adapter();
        let amount = Money::new(rust_decimal::Decimal::new(5000, 2)).unwrap();
        let digest = a.checksum("EXT-001", amount, "26650123456");
        assert_eq!(digest.len(), 64);
    }

    #[test]
    fn missing_config_fails_fast() {
        let err = BankPayAdapter::from_config(&json!({"base_url": "https://x"}));
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn refund_is_unsupported() {
        let a = adapter();
        let result = a.refund_payment("txn_1", None, None).await;
        assert!(matches!(result, Err(AdapterError::RefundUnsupported)));
    }

    #[tokio::test]
    async fn webhook_maps_settled_event() {
        let a = adapter();
        let outcome = a
            .handle_webhook(&json!({"event_type": "PAYMENT_SETTLED", "sbp_txn_ref": "txn_12345"}))
            .await
            .unwrap();
        assert_eq!(outcome.status, CanonicalStatus::Completed);
        assert_eq!(outcome.provider_tx_id, "txn_12345");
    }
}
