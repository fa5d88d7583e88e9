//! Merchant and Account persistence.

use chrono::Utc;
use paygate_types::{Account, GatewayError, GatewayResult, Merchant, SignupRequest};
use sqlx::PgPool;
use uuid::Uuid;

use crate::rows::{AccountRow, MerchantRow};

#[derive(Clone)]
pub struct MerchantRepository {
    pool: PgPool,
}

impl MerchantRepository {
    pub fn new(pool: PgPool) -> Self {
        MerchantRepository { pool }
    }

    /// Creates a Merchant and its Account atomically. Fails with
    /// `GatewayError::Validation` on a username collision.
    pub async fn create_merchant_and_account(
        &self,
        data: &SignupRequest,
        password_digest: String,
        api_key_hash: String,
    ) -> GatewayResult<(Merchant, Account)> {
        let mut tx = self.pool.begin().await.map_err(storage_err)?;
        let now = Utc::now();
        let merchant_id = Uuid::new_v4();

        let merchant_row = sqlx::query_as::<_, MerchantRow>(
            r#"
            INSERT INTO merchants (id, name, email, phone, business_name, business_category, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
            RETURNING id, name, email, phone, business_name, business_category, created_at, updated_at
            "#,
        )
        .bind(merchant_id)
        .bind(&data.name)
        .bind(&data.email)
        .bind(&data.phone)
        .bind(&data.business_name)
        .bind(&data.business_category)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(storage_err)?;

        let account_id = Uuid::new_v4();
        let account_row = sqlx::query_as::<_, AccountRow>(
            r#"
            INSERT INTO accounts (id, merchant_id, username, password_digest, api_key_hash, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, merchant_id, username, password_digest, api_key_hash, created_at
            "#,
        )
        .bind(account_id)
        .bind(merchant_id)
        .bind(&data.username)
        .bind(password_digest)
        .bind(api_key_hash)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db) = &e {
                if db.is_unique_violation() {
                    return GatewayError::validation(format!("username '{}' is already taken", data.username));
                }
            }
            storage_err(e)
        })?;

        tx.commit().await.map_err(storage_err)?;
        Ok((merchant_row.into(), account_row.into()))
    }

    pub async fn find_account_by_username(&self, username: &str) -> GatewayResult<Option<Account>> {
        let row = sqlx::query_as::<_, AccountRow>(
            "SELECT id, merchant_id, username, password_digest, api_key_hash, created_at FROM accounts WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(row.map(Into::into))
    }

    pub async fn find_account_by_api_key_hash(&self, api_key_hash: &str) -> GatewayResult<Option<Account>> {
        let row = sqlx::query_as::<_, AccountRow>(
            "SELECT id, merchant_id, username, password_digest, api_key_hash, created_at FROM accounts WHERE api_key_hash = $1",
        )
        .bind(api_key_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(row.map(Into::into))
    }

    /// Rotates an account's stored API-key hash. Used by `login`: since
    /// only the hash is retained at rest, a login cannot reveal the
    /// original plaintext key again, so it issues and persists a fresh one
    /// instead — see DESIGN.md.
    pub async fn update_api_key_hash(&self, account_id: Uuid, api_key_hash: &str) -> GatewayResult<()> {
        sqlx::query("UPDATE accounts SET api_key_hash = $2 WHERE id = $1")
            .bind(account_id)
            .bind(api_key_hash)
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    pub async fn find_merchant(&self, id: Uuid) -> GatewayResult<Option<Merchant>> {
        let row = sqlx::query_as::<_, MerchantRow>(
            "SELECT id, name, email, phone, business_name, business_category, created_at, updated_at FROM merchants WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(row.map(Into::into))
    }
}

fn storage_err(e: sqlx::Error) -> GatewayError {
    GatewayError::Storage(e.to_string())
}
