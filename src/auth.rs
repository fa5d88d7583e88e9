//! The `X-API-Key` gate every merchant endpoint sits behind.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use paygate_types::{Account, GatewayError};

use crate::errors::ApiError;
use crate::state::AppState;

const API_KEY_HEADER: &str = "x-api-key";

/// An Axum extractor: pulls `X-API-Key` off the request, resolves it to its
/// owning [`Account`], or fails the whole handler with 401 before the body
/// is even read.
pub struct AuthenticatedAccount(pub Account);

impl FromRequestParts<AppState> for AuthenticatedAccount {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let presented_key = parts
            .headers
            .get(API_KEY_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or(GatewayError::Unauthorized)?;

        let account = state.merchants.authenticate_api_key(presented_key).await?;
        Ok(AuthenticatedAccount(account))
    }
}
