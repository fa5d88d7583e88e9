//! Static provider registry rows and per-merchant provider configuration.

use chrono::Utc;
use paygate_types::{GatewayError, GatewayResult, Provider, ProviderConfig};
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::rows::{ProviderConfigRow, ProviderRow};

#[derive(Clone)]
pub struct ProviderRepository {
    pool: PgPool,
}

impl ProviderRepository {
    pub fn new(pool: PgPool) -> Self {
        ProviderRepository { pool }
    }

    /// Returns the static registry row for `short_name`, creating it on
    /// first use. Providers are enumerable ahead of time (the set of
    /// supported adapters) but nothing prevents a config being onboarded for
    /// one before an admin has explicitly registered it.
    pub async fn find_or_create(&self, short_name: &str) -> GatewayResult<Provider> {
        if let Some(existing) = self.find_by_short_name(short_name).await? {
            return Ok(existing);
        }
        let now = Utc::now();
        let row = sqlx::query_as::<_, ProviderRow>(
            r#"
            INSERT INTO providers (id, short_name, created_at, updated_at)
            VALUES ($1, $2, $3, $3)
            ON CONFLICT (short_name) DO UPDATE SET short_name = EXCLUDED.short_name
            RETURNING id, short_name, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(short_name)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(row.into())
    }

    pub async fn find_by_short_name(&self, short_name: &str) -> GatewayResult<Option<Provider>> {
        let row = sqlx::query_as::<_, ProviderRow>(
            "SELECT id, short_name, created_at, updated_at FROM providers WHERE short_name = $1",
        )
        .bind(short_name)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(row.map(Into::into))
    }

    /// Loads a merchant's active configuration for a provider, decrypted by
    /// the caller before being handed to an adapter factory.
    /// `GatewayError::ProviderNotConfigured` when absent or inactive.
    pub async fn load(&self, merchant_id: Uuid, provider_short_name: &str) -> GatewayResult<ProviderConfig> {
        let row = sqlx::query_as::<_, ProviderConfigRow>(
            r#"
            SELECT pc.id, pc.merchant_id, pc.provider_id, p.short_name AS provider_short_name,
                   pc.is_active, pc.config, pc.created_at, pc.updated_at
            FROM provider_configs pc
            JOIN providers p ON p.id = pc.provider_id
            WHERE pc.merchant_id = $1 AND p.short_name = $2 AND pc.is_active = TRUE
            "#,
        )
        .bind(merchant_id)
        .bind(provider_short_name)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?;

        row.map(Into::into)
            .ok_or_else(|| GatewayError::ProviderNotConfigured(provider_short_name.to_string()))
    }

    /// Picks one active configuration for `provider_short_name`, arbitrarily
    /// (oldest first). Used only by the webhook pipeline, which
    /// receives events on a provider-scoped path with no merchant context
    /// of its own — see DESIGN.md for why a single representative config
    /// stands in for signature verification and payload parsing before the
    /// owning transaction (and its merchant) is resolved.
    pub async fn find_any_active_config(&self, provider_short_name: &str) -> GatewayResult<Option<ProviderConfig>> {
        let row = sqlx::query_as::<_, ProviderConfigRow>(
            r#"
            SELECT pc.id, pc.merchant_id, pc.provider_id, p.short_name AS provider_short_name,
                   pc.is_active, pc.config, pc.created_at, pc.updated_at
            FROM provider_configs pc
            JOIN providers p ON p.id = pc.provider_id
            WHERE p.short_name = $1 AND pc.is_active = TRUE
            ORDER BY pc.created_at ASC
            LIMIT 1
            "#,
        )
        .bind(provider_short_name)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(row.map(Into::into))
    }

    /// Creates or replaces a merchant's configuration for a provider.
    /// Admin-surface only; the core never calls this.
    pub async fn upsert(
        &self,
        merchant_id: Uuid,
        provider_short_name: &str,
        config: Value,
        is_active: bool,
    ) -> GatewayResult<ProviderConfig> {
        let provider = self.find_or_create(provider_short_name).await?;
        let now = Utc::now();

        let row = sqlx::query_as::<_, ProviderConfigRow>(
            r#"
            INSERT INTO provider_configs (id, merchant_id, provider_id, is_active, config, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $6)
            ON CONFLICT (merchant_id, provider_id)
            DO UPDATE SET is_active = EXCLUDED.is_active, config = EXCLUDED.config, updated_at = EXCLUDED.updated_at
            RETURNING id, merchant_id, provider_id, $7 AS provider_short_name, is_active, config, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(merchant_id)
        .bind(provider.id)
        .bind(is_active)
        .bind(config)
        .bind(now)
        .bind(provider_short_name)
        .fetch_one(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(row.into())
    }
}

fn storage_err(e: sqlx::Error) -> GatewayError {
    GatewayError::Storage(e.to_string())
}
