//! Maps [`GatewayError`] onto the `{success, data|error, details?}` envelope
//! and its HTTP status code. This is the sole place in the repo that
//! translates the gateway's typed errors into HTTP.

use axum::Json;
use axum::extract::{FromRequest, Request};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use paygate_types::GatewayError;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub success: bool,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

/// Thin wrapper so handlers can `?` out of a `GatewayResult` straight into an
/// Axum response without every call site writing its own match.
pub struct ApiError(pub GatewayError);

impl From<GatewayError> for ApiError {
    fn from(e: GatewayError) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, details) = status_and_details(&self.0);
        tracing::warn!(error = %self.0, status = %status, "request failed");
        let body = ErrorBody {
            success: false,
            error: self.0.to_string(),
            details,
        };
        (status, Json(body)).into_response()
    }
}

/// A `Json<T>` extractor whose rejection maps to the gateway's own
/// `ValidationError` (→ 400), not Axum's default 415/422, so every malformed
/// request body surfaces through the same envelope.
pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| GatewayError::validation(format!("invalid request body: {e}")))?;
        Ok(ValidatedJson(value))
    }
}

fn status_and_details(e: &GatewayError) -> (StatusCode, Option<Value>) {
    match e {
        GatewayError::Validation(_) => (StatusCode::BAD_REQUEST, None),
        GatewayError::Unauthorized => (StatusCode::UNAUTHORIZED, None),
        GatewayError::NotFound(_) => (StatusCode::NOT_FOUND, None),
        GatewayError::ProviderNotConfigured(_) => (StatusCode::BAD_REQUEST, None),
        GatewayError::PaymentInitializationError(_) => (StatusCode::BAD_REQUEST, None),
        GatewayError::PaymentVerificationError(_) => (StatusCode::BAD_GATEWAY, None),
        GatewayError::RefundUnsupported { provider, original_reference } => (
            StatusCode::BAD_REQUEST,
            Some(serde_json::json!({"provider": provider, "original_reference": original_reference})),
        ),
        GatewayError::RefundError(_) => (StatusCode::BAD_REQUEST, None),
        GatewayError::InvariantViolation(_) => (StatusCode::INTERNAL_SERVER_ERROR, None),
        GatewayError::WebhookVerificationError(_) => (StatusCode::INTERNAL_SERVER_ERROR, None),
        GatewayError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, None),
    }
}
